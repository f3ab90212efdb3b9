use std::env;
use std::path::Path;
extern crate glove_prep;
use glove_prep::files_handling::{read_input, CoocSnapshot};
use glove_prep::{PrepError, COOC_FILE};


// this executable looks into saved counts: for each given token it prints the
// k partners with the largest distance-weighted co-occurrence value.
// treated as binary executable so it can be ran independently from main
//
// example: ... data 10 king queen

fn main() -> Result<(), PrepError> {

    let args: Vec<String> = env::args().collect();
    if args.len() < 4 {
        return Err(PrepError::configuration("usage: inspect <output_dir> <k> <token>..."));
    }
    let k: usize = args[2]
        .parse()
        .map_err(|_| PrepError::configuration(format!("k should be a number, got {}", args[2])))?;

    let path = Path::new(&args[1]).join(format!("{}.bin.gz", COOC_FILE));
    let snapshot: CoocSnapshot = read_input(&path.to_string_lossy())?;
    let (vocab, cooc) = snapshot.into_parts()?;

    for token in &args[3..] {

        let id = vocab.id_of(token);
        if vocab.token(id) != token.as_str() {
            println!("{} is not in the vocabulary, showing {}", token, vocab.token(id));
        }

        println!("searching {} strongest partners of {}", k, vocab.token(id));
        for (i, (partner, stats)) in cooc.strongest_partners(id, k).iter().enumerate() {
            println!("{} : {} ? {} count = {}, value = {}", i, vocab.token(id), vocab.token(*partner), stats.count, stats.value(cooc.unit_scale()));
        }
        println!();
    }

    Ok(())
}
