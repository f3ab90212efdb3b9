// imports
use crate::config::VocabParams;
use crate::error::{PrepError, Result};
use crate::tokenize::Corpus;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::info;

/// Token standing for everything excluded from the vocabulary.
pub const UNK: &str = "<UNK>";

/// Dense vocabulary id, the position of the token in the vocabulary.
pub type TokenId = u32;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VocabularyEntry {
    pub token: String,
    pub count: u64,
    pub proportion: f64,
}

/// Vocabulary ordered by count descending; the position of an entry is
/// its id. Immutable once built.
#[derive(Clone, Debug)]
pub struct Vocabulary {
    entries: Vec<VocabularyEntry>,
    t2i: HashMap<String, TokenId>,
    unk_id: TokenId,
    total_tokens: u64,
    count_cutoff: u64,
}

impl Vocabulary {

    /// Smallest count whose descending-order prefix covers `coverage` of
    /// all tokens, None for no counts. `counts` must be sorted descending.
    fn coverage_cutoff(counts: &[u64], total: u64, coverage: f64) -> Option<u64> {

        let mut cumulative: u64 = 0;
        let cumprop: Vec<f64> = counts.iter().map(|count| {
            cumulative += count;
            cumulative as f64 / total as f64
        }).collect();

        // float rounding can leave coverage 1.0 just out of reach
        let index = cumprop.partition_point(|p| *p < coverage);
        counts.get(index).or_else(|| counts.last()).copied()
    }

    /// Builds the vocabulary from token frequencies given in first-seen
    /// order, which breaks frequency ties.
    pub fn build(frequencies: &IndexMap<String, u64>, params: &VocabParams) -> Result<Vocabulary> {

        params.validate()?;

        let total: u64 = frequencies.values().sum();
        if total == 0 {
            return Err(PrepError::EmptyCorpus);
        }

        // rank by frequency, the sort is stable so ties keep first-seen order
        let mut ranked: Vec<(&str, u64)> = frequencies
            .iter()
            .filter(|(_, count)| **count > 0)
            .map(|(token, count)| (token.as_str(), *count))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1));

        let counts: Vec<u64> = ranked.iter().map(|(_, count)| *count).collect();
        let count_cutoff = Vocabulary::coverage_cutoff(&counts, total, params.coverage).ok_or(PrepError::EmptyCorpus)?;
        info!("count cutoff: {}; token coverage: {}", count_cutoff, params.coverage);

        // <UNK> goes first so that it precedes tokens of equal count after sorting
        let cap = params.vocab_size.unwrap_or(ranked.len());
        let mut entries: Vec<VocabularyEntry> = vec![VocabularyEntry { token: UNK.to_string(), count: 0, proportion: 0.0 }];
        let mut known: u64 = 0;
        for (token, count) in ranked.iter().filter(|(token, _)| *token != UNK).take(cap) {
            if *count < count_cutoff {
                break;
            }
            known += count;
            entries.push(VocabularyEntry { token: token.to_string(), count: *count, proportion: 0.0 });
        }
        entries[0].count = total - known;

        entries.sort_by(|a, b| b.count.cmp(&a.count));
        for entry in entries.iter_mut() {
            entry.proportion = entry.count as f64 / total as f64;
        }

        info!("vocab created, size: {} (including {}) out of {} distinct tokens", entries.len(), UNK, frequencies.len());
        Vocabulary::from_entries(entries, count_cutoff)
    }

    /// Rebuilds a vocabulary from entries already in id order.
    pub fn from_entries(entries: Vec<VocabularyEntry>, count_cutoff: u64) -> Result<Vocabulary> {

        if entries.len() > TokenId::MAX as usize {
            return Err(PrepError::configuration("vocabulary does not fit 32 bit ids"));
        }

        let mut t2i: HashMap<String, TokenId> = HashMap::with_capacity(entries.len());
        for (i, entry) in entries.iter().enumerate() {
            if t2i.insert(entry.token.to_owned(), i as TokenId).is_some() {
                return Err(PrepError::configuration(format!("token {:?} appears twice in the vocabulary", entry.token)));
            }
        }
        let unk_id = *t2i
            .get(UNK)
            .ok_or_else(|| PrepError::configuration(format!("vocabulary has no {} entry", UNK)))?;
        let total_tokens = entries.iter().map(|entry| entry.count).sum();

        Ok(Self { entries, t2i, unk_id, total_tokens, count_cutoff })
    }

    /// Id of `token`, or the id of [`UNK`] for excluded tokens.
    pub fn id_of(&self, token: &str) -> TokenId {
        self.t2i.get(token).copied().unwrap_or(self.unk_id)
    }

    /// Maps every corpus token to its vocabulary id.
    pub fn encode(&self, corpus: &Corpus) -> Vec<TokenId> {
        let lookup: Vec<TokenId> = corpus.frequencies().keys().map(|token| self.id_of(token)).collect();
        corpus.sequence().iter().map(|index| lookup[*index as usize]).collect()
    }

    pub fn token(&self, id: TokenId) -> &str {
        &self.entries[id as usize].token
    }

    pub fn entry(&self, id: TokenId) -> &VocabularyEntry {
        &self.entries[id as usize]
    }

    pub fn entries(&self) -> &[VocabularyEntry] {
        &self.entries
    }

    pub fn unk_id(&self) -> TokenId {
        self.unk_id
    }

    pub fn total_tokens(&self) -> u64 {
        self.total_tokens
    }

    pub fn count_cutoff(&self) -> u64 {
        self.count_cutoff
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
