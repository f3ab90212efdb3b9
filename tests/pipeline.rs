use std::fs;
use std::path::Path;

use glove_prep::files_handling::{read_input, INTERACTION_HEADER};
use glove_prep::{Config, CoocParams, GloveParams, OutputParams, Params, Pipeline, PrepError, VocabParams};
use ndarray::Array2;

const CORPUS: &str = "anarchism originated as a term of abuse first used against early working class radicals \
including the diggers of the english revolution and the sans culottes of the french revolution \
whilst the term is still used in a pejorative way to describe any act that used violent means \
to destroy the organization of society it has also been taken up as a positive label by self \
defined anarchists the word anarchism is derived from the greek without archons ruler chief king";

fn write_corpus(dir: &Path) -> String {
    let path = dir.join("text8");
    // repeat so that pairs pass the support filter; the trailing space keeps
    // the last token of one copy apart from the first of the next
    fs::write(&path, format!("{} ", CORPUS).repeat(12)).unwrap();
    path.to_str().unwrap().to_string()
}

fn params(corpus_file: &str, output_dir: &Path) -> Params {
    Params {
        corpus_file: corpus_file.to_string(),
        output_dir: output_dir.to_str().unwrap().to_string(),
        saved_counts: false,
        log_file: None,
        vocab: VocabParams::default(),
        cooc: CoocParams::default(),
        glove: GloveParams::default(),
        output: OutputParams::default(),
    }
}

fn read(dir: &Path, name: &str) -> Vec<u8> {
    fs::read(dir.join(name)).unwrap()
}

#[test]
fn writes_vocabulary_and_interaction_tables() {
    let dir = tempfile::tempdir().unwrap();
    let corpus_file = write_corpus(dir.path());
    let out = dir.path().join("out");

    let mut p = params(&corpus_file, &out);
    p.output.write_npy = true;
    Pipeline::execute(&p).unwrap();

    let tokens = fs::read_to_string(out.join("vocab.txt")).unwrap();
    let tokens: Vec<&str> = tokens.split('\n').collect();
    assert_eq!(tokens[0], "the");
    assert!(tokens.contains(&"<UNK>"));

    let vocab_csv = fs::read_to_string(out.join("vocab.csv")).unwrap();
    assert_eq!(vocab_csv.lines().count(), tokens.len() + 1);
    let total: u64 = vocab_csv
        .lines()
        .skip(1)
        .map(|line| line.split(',').nth(1).unwrap().parse::<u64>().unwrap())
        .sum();
    assert_eq!(total, 12 * CORPUS.split_whitespace().count() as u64);

    let interaction = fs::read_to_string(out.join("interaction.csv")).unwrap();
    let mut lines = interaction.lines();
    assert_eq!(lines.next().unwrap(), INTERACTION_HEADER.join(","));
    let rows: Vec<Vec<&str>> = lines.map(|line| line.split(',').collect()).collect();
    assert!(!rows.is_empty());
    for row in &rows {
        assert_eq!(row.len(), 9);
        assert_ne!(row[0], row[1]);
        assert!(row[4].parse::<u64>().unwrap() >= 10);
        let glove_weight: f64 = row[7].parse().unwrap();
        assert!((0.0..=1.0).contains(&glove_weight));
        assert!(row[8].parse::<f64>().unwrap().is_finite());
    }

    let matrix: Array2<f64> = read_input(out.join("interaction.npy").to_str().unwrap()).unwrap();
    assert_eq!(matrix.dim(), (rows.len(), 7));
    assert!(out.join("cooc.bin.gz").exists());
}

#[test]
fn reruns_are_byte_identical() {
    let dir = tempfile::tempdir().unwrap();
    let corpus_file = write_corpus(dir.path());
    let first = dir.path().join("first");
    let second = dir.path().join("second");

    Pipeline::execute(&params(&corpus_file, &first)).unwrap();

    // another worker count and chunking must not change a byte
    let mut p = params(&corpus_file, &second);
    p.cooc.num_threads = 3;
    p.cooc.chunk_tokens = 37;
    Pipeline::execute(&p).unwrap();

    for name in ["vocab.csv", "vocab.txt", "interaction.csv", "cooc.bin.gz"] {
        assert_eq!(read(&first, name), read(&second, name), "{} differs", name);
    }
}

#[test]
fn saved_counts_skip_the_corpus() {
    let dir = tempfile::tempdir().unwrap();
    let corpus_file = write_corpus(dir.path());
    let out = dir.path().join("out");

    Pipeline::execute(&params(&corpus_file, &out)).unwrap();
    let strict = read(&out, "interaction.csv");

    // the corpus is gone, the saved counts are enough
    let mut p = params(&dir.path().join("missing").to_string_lossy(), &out);
    p.saved_counts = true;
    p.glove.count_minimum = 1;
    p.output.compress = true;
    Pipeline::execute(&p).unwrap();
    assert!(out.join("interaction.csv.gz").exists());
    assert_eq!(read(&out, "interaction.csv"), strict);

    p.cooc.window = 3;
    assert!(matches!(Pipeline::execute(&p), Err(PrepError::Configuration { .. })));
}

#[test]
fn configuration_file_drives_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let corpus_file = write_corpus(dir.path());
    let out = dir.path().join("out");
    let config_path = dir.path().join("config.json");
    let json = serde_json::json!({
        "corpus_file": corpus_file,
        "output_dir": out.to_str().unwrap(),
        "vocab_size": 20,
        "coverage": 1.0,
        "context_size": 2,
        "count_minimum": 1
    });
    fs::write(&config_path, json.to_string()).unwrap();

    let args = vec!["glove_prep".to_string(), config_path.to_str().unwrap().to_string()];
    let p = Config::new(&args).unwrap().get_params();
    assert_eq!(p.vocab.vocab_size, Some(20));
    Pipeline::execute(&p).unwrap();

    let tokens = fs::read_to_string(out.join("vocab.txt")).unwrap();
    assert_eq!(tokens.split('\n').count(), 21);
}

#[test]
fn missing_corpus_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let p = params(&dir.path().join("nope").to_string_lossy(), dir.path());
    assert!(matches!(Pipeline::execute(&p), Err(PrepError::Io(_))));
}

#[test]
fn empty_corpus_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("empty.txt");
    fs::write(&path, "\n \n").unwrap();
    let p = params(path.to_str().unwrap(), &dir.path().join("out"));
    assert!(matches!(Pipeline::execute(&p), Err(PrepError::EmptyCorpus)));
}
