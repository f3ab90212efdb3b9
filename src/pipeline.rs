// imports
use crate::config::{CoocParams, Params, VocabParams};
use crate::cooccurrence::Cooccurrence;
use crate::error::{PrepError, Result};
use crate::files_handling::{read_input, save_output, CoocSnapshot, InteractionTable, TokenList};
use crate::tokenize::Corpus;
use crate::vocabulary::Vocabulary;
use crate::weighting::{summarize, to_ndarray, transform};

use std::path::Path;
use std::time::Instant;
use tracing::{info, warn};

pub const VOCAB_FILE: &str = "vocab";
pub const INTERACTION_FILE: &str = "interaction";
pub const COOC_FILE: &str = "cooc";

pub struct Pipeline {}

impl Pipeline {

    // runs the main procedure of 3 steps -
    // -> logging of the parameters
    // -> vocabulary and cooccurrences counting (or loading saved counts)
    // -> weighting and saving of the tables

    pub fn run(params: &Params) -> Result<()> {

        info!("entering program...");
        info!("{}", params);

        Pipeline::execute(params)
    }

    pub fn execute(params: &Params) -> Result<()> {

        params.validate()?;

        // run the counting stage unless saved counts were requested and exist
        let (vocab, cooc) = match Pipeline::load_saved_counts(params)? {
            Some(parts) => parts,
            None => {
                let timer = Instant::now();
                info!("starting vocab building...");
                let corpus = Corpus::load(&params.corpus_file)?;
                let (vocab, cooc) = Pipeline::count(&corpus, &params.vocab, &params.cooc)?;

                save_output(&params.output_dir, COOC_FILE, &CoocSnapshot::new(&vocab, &cooc))?;
                info!("finished counting and saved counts, took {} seconds ...", timer.elapsed().as_secs());
                (vocab, cooc)
            }
        };

        let timer = Instant::now();
        Pipeline::emit(vocab, cooc, params)?;
        info!("finished weighting and saved tables, took {} seconds ...", timer.elapsed().as_secs());
        Ok(())
    }

    /// Builds the vocabulary of `corpus` and counts its co-occurrences.
    pub fn count(corpus: &Corpus, vocab_params: &VocabParams, cooc_params: &CoocParams) -> Result<(Vocabulary, Cooccurrence)> {

        // fail on bad parameters before any scan
        vocab_params.validate()?;
        cooc_params.validate()?;
        if corpus.is_empty() {
            return Err(PrepError::EmptyCorpus);
        }

        let vocab = Vocabulary::build(corpus.frequencies(), vocab_params)?;
        let ids = vocab.encode(corpus);
        let cooc = Cooccurrence::aggregate(&ids, cooc_params)?;
        Ok((vocab, cooc))
    }

    fn load_saved_counts(params: &Params) -> Result<Option<(Vocabulary, Cooccurrence)>> {

        if !params.saved_counts {
            return Ok(None);
        }

        let path = Path::new(&params.output_dir).join(format!("{}.bin.gz", COOC_FILE));
        if !path.exists() {
            warn!("saved_counts is set but {} does not exist, counting from the corpus", path.display());
            return Ok(None);
        }

        let snapshot: CoocSnapshot = read_input(&path.to_string_lossy())?;
        if snapshot.window != params.cooc.window {
            return Err(PrepError::configuration(format!(
                "saved counts were built with context_size {}, not {}", snapshot.window, params.cooc.window
            )));
        }

        let (vocab, cooc) = snapshot.into_parts()?;
        info!("loaded saved counts from {}: {} tokens in vocab, {} pairs; vocabulary parameters are not re-applied", path.display(), vocab.len(), cooc.len());
        Ok(Some((vocab, cooc)))
    }

    fn emit(vocab: Vocabulary, cooc: Cooccurrence, params: &Params) -> Result<()> {

        let output_dir = &params.output_dir;

        let path = save_output(output_dir, VOCAB_FILE, &vocab)?;
        info!("vocabulary table saved: {}", path.display());
        let path = save_output(output_dir, VOCAB_FILE, &TokenList(&vocab))?;
        info!("vocabulary saved: {}", path.display());

        let records = transform(cooc, &vocab, &params.glove)?;

        if params.output.write_npy {
            let matrix = to_ndarray(&records);
            for (column, min, max) in summarize(&matrix) {
                info!("{}: min {}, max {}", column, min, max);
            }
            let path = save_output(output_dir, INTERACTION_FILE, &matrix)?;
            info!("interaction matrix saved: {}", path.display());
        }

        let table = InteractionTable { records: &records, compress: params.output.compress };
        let path = save_output(output_dir, INTERACTION_FILE, &table)?;
        info!("interaction table saved: {}, {} rows", path.display(), records.len());

        Ok(())
    }

}
