use crate::error::{PrepError, Result};

use serde::Deserialize;
use std::fmt::Display;
use std::fs;

/// Vocabulary builder parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct VocabParams {
    pub vocab_size: Option<usize>,
    pub coverage: f64,
}

impl Default for VocabParams {
    fn default() -> Self {
        Self {
            vocab_size: None,
            coverage: 0.9,
        }
    }
}

impl VocabParams {
    pub fn validate(&self) -> Result<()> {
        // written so that NaN fails as well
        if !(self.coverage > 0.0 && self.coverage <= 1.0) {
            return Err(PrepError::configuration(format!(
                "coverage {} is not in (0, 1]",
                self.coverage
            )));
        }
        Ok(())
    }
}

/// Co-occurrence aggregator parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct CoocParams {
    pub window: usize,
    /// 0 lets rayon pick one worker per core.
    pub num_threads: usize,
    pub chunk_tokens: usize,
}

impl Default for CoocParams {
    fn default() -> Self {
        Self {
            window: 5,
            num_threads: 0,
            chunk_tokens: 1 << 20,
        }
    }
}

impl CoocParams {
    pub fn validate(&self) -> Result<()> {
        if self.window == 0 {
            return Err(PrepError::configuration("context_size must be at least 1"));
        }
        if self.chunk_tokens == 0 {
            return Err(PrepError::configuration("chunk_tokens must be at least 1"));
        }
        Ok(())
    }
}

/// Weight transform parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct GloveParams {
    pub count_minimum: u64,
    pub alpha: f64,
    pub x_max: f64,
}

impl Default for GloveParams {
    fn default() -> Self {
        Self {
            count_minimum: 10,
            alpha: 0.75,
            x_max: 100.0,
        }
    }
}

impl GloveParams {
    pub fn validate(&self) -> Result<()> {
        if !(self.x_max.is_finite() && self.x_max > 0.0) {
            return Err(PrepError::configuration(format!(
                "glove_x_max {} must be a positive number",
                self.x_max
            )));
        }
        if !(self.alpha.is_finite() && self.alpha > 0.0) {
            return Err(PrepError::configuration(format!(
                "glove_alpha {} must be a positive number",
                self.alpha
            )));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct OutputParams {
    pub compress: bool,
    pub write_npy: bool,
}

#[derive(Clone, Debug)]
pub struct Params {
    pub corpus_file: String,
    pub output_dir: String,
    pub saved_counts: bool,
    /// Run log written next to the console output.
    pub log_file: Option<String>,
    pub vocab: VocabParams,
    pub cooc: CoocParams,
    pub glove: GloveParams,
    pub output: OutputParams,
}

impl Params {
    pub fn validate(&self) -> Result<()> {
        self.vocab.validate()?;
        self.cooc.validate()?;
        self.glove.validate()?;
        Ok(())
    }
}

impl Display for Params {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "using parameters:
        corpus_file: {}
        output_dir: {}
        saved_counts: {}
        log_file: {:?}
        vocab_size: {:?}
        coverage: {}
        context_size: {}
        num_threads: {}
        chunk_tokens: {}
        count_minimum: {}
        glove_alpha: {}
        glove_x_max: {}
        compress: {}
        write_npy: {}",
        self.corpus_file, self.output_dir, self.saved_counts, self.log_file, self.vocab.vocab_size, self.vocab.coverage,
        self.cooc.window, self.cooc.num_threads, self.cooc.chunk_tokens,
        self.glove.count_minimum, self.glove.alpha, self.glove.x_max,
        self.output.compress, self.output.write_npy)
    }
}

// the flat layout of the json configuration file
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct JsonTypes {
    corpus_file: String,
    output_dir: String,
    #[serde(default)]
    vocab_size: Option<usize>,
    #[serde(default = "default_coverage")]
    coverage: f64,
    #[serde(default = "default_context_size", alias = "window_size")]
    context_size: usize,
    #[serde(default = "default_count_minimum")]
    count_minimum: u64,
    #[serde(default = "default_glove_alpha")]
    glove_alpha: f64,
    #[serde(default = "default_glove_x_max")]
    glove_x_max: f64,
    #[serde(default)]
    num_threads: usize,
    #[serde(default = "default_chunk_tokens")]
    chunk_tokens: usize,
    #[serde(default)]
    saved_counts: bool,
    #[serde(default)]
    log_file: Option<String>,
    #[serde(default)]
    compress: bool,
    #[serde(default)]
    write_npy: bool,
}

fn default_coverage() -> f64 { VocabParams::default().coverage }
fn default_context_size() -> usize { CoocParams::default().window }
fn default_chunk_tokens() -> usize { CoocParams::default().chunk_tokens }
fn default_count_minimum() -> u64 { GloveParams::default().count_minimum }
fn default_glove_alpha() -> f64 { GloveParams::default().alpha }
fn default_glove_x_max() -> f64 { GloveParams::default().x_max }

impl From<JsonTypes> for Params {
    fn from(json: JsonTypes) -> Self {
        Params {
            corpus_file: json.corpus_file,
            output_dir: json.output_dir,
            saved_counts: json.saved_counts,
            log_file: json.log_file,
            vocab: VocabParams {
                vocab_size: json.vocab_size,
                coverage: json.coverage,
            },
            cooc: CoocParams {
                window: json.context_size,
                num_threads: json.num_threads,
                chunk_tokens: json.chunk_tokens,
            },
            glove: GloveParams {
                count_minimum: json.count_minimum,
                alpha: json.glove_alpha,
                x_max: json.glove_x_max,
            },
            output: OutputParams {
                compress: json.compress,
                write_npy: json.write_npy,
            },
        }
    }
}

pub struct Config {
    params: Params,
}

impl Config {

    pub fn get_params(&self) -> Params {
        self.params.clone()
    }

    /// Builds the configuration from the process arguments, which hold a
    /// single path to a json file.
    pub fn new(args: &[String]) -> Result<Config> {

        if args.len() != 2 {
            return Err(PrepError::configuration("input should be a path to json file only"));
        }

        let json = fs::read_to_string(&args[1])?;
        Config::from_json_str(&json)
    }

    pub fn from_json_str(json: &str) -> Result<Config> {

        let json: JsonTypes = serde_json::from_str(json)
            .map_err(|e| PrepError::configuration(format!("cannot parse json configuration: {}", e)))?;

        let params = Params::from(json);
        params.validate()?;

        Ok(Self { params })
    }

}
