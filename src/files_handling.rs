//! Reading and writing of the pipeline artifacts.
//!
//! Each artifact type implements [`SaveFile`] (and [`ReadFile`] where the
//! pipeline reads it back); callers go through [`save_output`] and
//! [`read_input`]. Every writer produces the same bytes for the same input.

// imports
use crate::cooccurrence::{Cooccurrence, PairKey, PairStats};
use crate::error::{PrepError, Result};
use crate::vocabulary::{Vocabulary, VocabularyEntry};
use crate::weighting::InteractionRecord;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use ndarray::Array2;
use ndarray_npy::{read_npy, write_npy};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

pub const VOCAB_HEADER: [&str; 3] = ["token", "count", "proportion"];

pub const INTERACTION_HEADER: [&str; 9] = [
    "row_token_id", "col_token_id", "row_token", "col_token",
    "count", "value", "neg_weight", "glove_weight", "glove_value",
];

pub fn read_input<R: ReadFile>(file_path: &str) -> Result<R> {
    R::read_file(file_path)
}

/// Saves `item` under `output_dir`, creating the directory when missing.
/// Returns the path written.
pub fn save_output<S: SaveFile + ?Sized>(output_dir: &str, file_name: &str, item: &S) -> Result<PathBuf> {
    fs::create_dir_all(output_dir)?;
    item.save_file(output_dir, file_name)
}

pub trait ReadFile: Sized {
    fn read_file(file_path: &str) -> Result<Self>;
}

pub trait SaveFile {
    fn save_file(&self, output_dir: &str, file_name: &str) -> Result<PathBuf>;
}

fn out_path(output_dir: &str, file_name: &str, extension: &str) -> PathBuf {
    Path::new(output_dir).join(format!("{}.{}", file_name, extension))
}

// `token,count,proportion`, one row per id
impl SaveFile for Vocabulary {
    fn save_file(&self, output_dir: &str, file_name: &str) -> Result<PathBuf> {

        let out = out_path(output_dir, file_name, "csv");
        let mut wrt = csv::WriterBuilder::new().has_headers(false).from_path(&out)?;
        wrt.write_record(VOCAB_HEADER)?;
        for entry in self.entries() {
            wrt.serialize(entry)?;
        }
        wrt.flush()?;
        Ok(out)
    }
}

/// The plain token list, one token per line in id order.
pub struct TokenList<'a>(pub &'a Vocabulary);

impl SaveFile for TokenList<'_> {
    fn save_file(&self, output_dir: &str, file_name: &str) -> Result<PathBuf> {

        let out = out_path(output_dir, file_name, "txt");
        let tokens: Vec<&str> = self.0.entries().iter().map(|entry| entry.token.as_str()).collect();
        fs::write(&out, tokens.join("\n"))?;
        Ok(out)
    }
}

/// The interaction table, optionally gzip compressed.
pub struct InteractionTable<'a> {
    pub records: &'a [InteractionRecord<'a>],
    pub compress: bool,
}

impl InteractionTable<'_> {
    fn write_records<W: Write>(&self, writer: W) -> Result<W> {

        let mut wrt = csv::WriterBuilder::new().has_headers(false).from_writer(writer);
        wrt.write_record(INTERACTION_HEADER)?;
        for record in self.records {
            wrt.serialize(record)?;
        }
        wrt.into_inner().map_err(|e| PrepError::Io(e.into_error()))
    }
}

impl SaveFile for InteractionTable<'_> {
    fn save_file(&self, output_dir: &str, file_name: &str) -> Result<PathBuf> {

        if self.compress {
            let out = out_path(output_dir, file_name, "csv.gz");
            let f = BufWriter::new(File::create(&out)?);
            let writer = self.write_records(GzEncoder::new(f, Compression::default()))?;
            writer.finish()?.flush()?;
            Ok(out)
        } else {
            let out = out_path(output_dir, file_name, "csv");
            let f = BufWriter::new(File::create(&out)?);
            self.write_records(f)?.flush()?;
            Ok(out)
        }
    }
}

impl SaveFile for Array2<f64> {
    fn save_file(&self, output_dir: &str, file_name: &str) -> Result<PathBuf> {
        let out = out_path(output_dir, file_name, "npy");
        write_npy(&out, self)?;
        Ok(out)
    }
}

impl ReadFile for Array2<f64> {
    fn read_file(file_path: &str) -> Result<Self> {
        Ok(read_npy(file_path)?)
    }
}

/// Vocabulary and merged co-occurrence counts of a corpus, saved so the
/// weighting can be re-run without scanning the corpus again.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CoocSnapshot {
    pub window: usize,
    pub count_cutoff: u64,
    pub vocabulary: Vec<VocabularyEntry>,
    // ordered by key
    pub pairs: Vec<(PairKey, PairStats)>,
}

impl CoocSnapshot {
    pub fn new(vocab: &Vocabulary, cooc: &Cooccurrence) -> Self {
        Self {
            window: cooc.window(),
            count_cutoff: vocab.count_cutoff(),
            vocabulary: vocab.entries().to_vec(),
            pairs: cooc.to_sorted(),
        }
    }

    pub fn into_parts(self) -> Result<(Vocabulary, Cooccurrence)> {
        let vocab = Vocabulary::from_entries(self.vocabulary, self.count_cutoff)?;
        if let Some((key, _)) = self.pairs.iter().find(|(key, _)| key.col() as usize >= vocab.len()) {
            return Err(PrepError::configuration(format!(
                "saved counts reference id {} outside the vocabulary of {} tokens", key.col(), vocab.len()
            )));
        }
        let cooc = Cooccurrence::from_sorted(self.window, self.pairs)?;
        Ok((vocab, cooc))
    }
}

// gzip compressed bincode
impl SaveFile for CoocSnapshot {
    fn save_file(&self, output_dir: &str, file_name: &str) -> Result<PathBuf> {

        let out = out_path(output_dir, file_name, "bin.gz");
        let f = BufWriter::new(File::create(&out)?);
        let mut writer = GzEncoder::new(f, Compression::default());
        bincode::serialize_into(&mut writer, self)?;
        writer.finish()?.flush()?;
        Ok(out)
    }
}

impl ReadFile for CoocSnapshot {
    fn read_file(file_path: &str) -> Result<Self> {
        let f = BufReader::new(File::open(file_path)?);
        let reader = GzDecoder::new(f);
        Ok(bincode::deserialize_from(reader)?)
    }
}
