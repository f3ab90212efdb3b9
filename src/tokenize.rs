// imports
use crate::error::{PrepError, Result};

use flate2::read::GzDecoder;
use indexmap::IndexMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use tracing::{debug, info};

// defines the behavior needed for tokenizing a corpus
pub trait Tokenizer {
    type Tokens<'a>: Iterator<Item = &'a str>
    where
        Self: 'a;

    fn tokenize<'a>(&'a self, text: &'a str) -> Self::Tokens<'a>;
}

/// Splits on any unicode whitespace, dropping empty tokens.
#[derive(Clone, Copy, Debug, Default)]
pub struct WhitespaceTokenizer;

impl Tokenizer for WhitespaceTokenizer {
    type Tokens<'a> = std::str::SplitWhitespace<'a>;

    fn tokenize<'a>(&'a self, text: &'a str) -> Self::Tokens<'a> {
        text.split_whitespace()
    }
}

/// A tokenized corpus. Every distinct token is interned once, in the
/// order it is first seen, together with its frequency; the corpus itself
/// is kept as the sequence of intern indices.
#[derive(Clone, Debug, Default)]
pub struct Corpus {
    frequencies: IndexMap<String, u64>,
    sequence: Vec<u32>,
}

impl Corpus {

    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_text(text: &str) -> Result<Self> {
        let mut corpus = Corpus::new();
        corpus.push_text(&WhitespaceTokenizer, text)?;
        Ok(corpus)
    }

    /// Appends the tokens of `text` to the corpus. Tokens of consecutive
    /// calls are contiguous, so windows span line boundaries.
    pub fn push_text<T: Tokenizer>(&mut self, tokenizer: &T, text: &str) -> Result<()> {

        for token in tokenizer.tokenize(text) {
            let index = match self.frequencies.get_full_mut(token) {
                Some((index, _, count)) => {
                    *count += 1;
                    index
                }
                None => self.frequencies.insert_full(token.to_owned(), 1).0,
            };
            let index = u32::try_from(index)
                .map_err(|_| PrepError::configuration("corpus has more distinct tokens than fit in 32 bits"))?;
            self.sequence.push(index);
        }
        Ok(())
    }

    pub fn from_reader<R: BufRead, T: Tokenizer>(mut reader: R, tokenizer: &T) -> Result<Self> {

        let mut corpus = Corpus::new();
        let mut line = String::new();
        let mut n_lines: usize = 0;
        loop {
            line.clear();
            if reader.read_line(&mut line)? == 0 {
                break;
            }
            corpus.push_text(tokenizer, &line)?;
            n_lines += 1;
            if n_lines % 1_000_000 == 0 {
                debug!("read {} lines, {} tokens so far", n_lines, corpus.len());
            }
        }
        Ok(corpus)
    }

    /// Reads and tokenizes a corpus file on whitespace; files ending in
    /// `.gz` are decompressed on the fly.
    pub fn load(file_path: &str) -> Result<Self> {

        let f = File::open(file_path)?;
        let corpus = if file_path.ends_with(".gz") {
            Corpus::from_reader(BufReader::new(GzDecoder::new(f)), &WhitespaceTokenizer)?
        } else {
            Corpus::from_reader(BufReader::new(f), &WhitespaceTokenizer)?
        };

        info!("loaded corpus {}: {} tokens, {} distinct", file_path, corpus.len(), corpus.frequencies.len());
        Ok(corpus)
    }

    /// Token frequencies in first-seen order.
    pub fn frequencies(&self) -> &IndexMap<String, u64> {
        &self.frequencies
    }

    /// The corpus as intern indices into [`Corpus::frequencies`].
    pub fn sequence(&self) -> &[u32] {
        &self.sequence
    }

    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }
}
