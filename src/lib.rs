pub mod config;
pub mod cooccurrence;
pub mod error;
pub mod files_handling;
pub mod logging;
mod pipeline;
pub mod tokenize;
pub mod vocabulary;
pub mod weighting;

pub use config::{Config, CoocParams, GloveParams, OutputParams, Params, VocabParams};
pub use cooccurrence::{Cooccurrence, PairKey, PairStats};
pub use error::{PrepError, Result};
pub use pipeline::{Pipeline, COOC_FILE, INTERACTION_FILE, VOCAB_FILE};
pub use tokenize::{Corpus, Tokenizer, WhitespaceTokenizer};
pub use vocabulary::{TokenId, Vocabulary, VocabularyEntry, UNK};
pub use weighting::InteractionRecord;
