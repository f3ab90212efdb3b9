// imports
use crate::config::CoocParams;
use crate::error::{PrepError, Result};
use crate::vocabulary::TokenId;

use rayon::{prelude::*, ThreadPoolBuilder};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::ops::Range;
use std::time::Instant;
use tracing::{debug, info};

/// Units of value per distance-1 observation once the window is too wide
/// for `lcm(1, ..., window)` to fit.
pub const FIXED_POINT_SCALE: u64 = 1 << 32;

fn gcd(a: u64, b: u64) -> u64 {
    if b == 0 { a } else { gcd(b, a % b) }
}

fn lcm_up_to(window: usize) -> Option<u64> {
    (1..=window as u64).try_fold(1u64, |acc, d| (acc / gcd(acc, d)).checked_mul(d))
}

/// Whether every `1/d` of the window is a whole number of units.
pub fn is_exact(window: usize) -> bool {
    lcm_up_to(window).map_or(false, |lcm| lcm <= FIXED_POINT_SCALE)
}

/// Units of value per distance-1 observation: `lcm(1, ..., window)` while
/// it stays within [`FIXED_POINT_SCALE`], the fixed point scale otherwise.
pub fn unit_scale(window: usize) -> u64 {
    match lcm_up_to(window) {
        Some(lcm) if lcm <= FIXED_POINT_SCALE => lcm,
        _ => FIXED_POINT_SCALE,
    }
}

/// Unordered pair of vocabulary ids, stored with the smaller id first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PairKey {
    row: TokenId,
    col: TokenId,
}

impl PairKey {
    pub fn new(a: TokenId, b: TokenId) -> Self {
        if a <= b {
            Self { row: a, col: b }
        } else {
            Self { row: b, col: a }
        }
    }

    pub fn row(&self) -> TokenId {
        self.row
    }

    pub fn col(&self) -> TokenId {
        self.col
    }
}

/// Aggregated observations of one pair. The distance-decayed weight is
/// kept as an integer number of `1 / unit_scale` units. Integer sums do not
/// depend on the order they are added in, so neither chunking nor merge
/// order can change a value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairStats {
    pub count: u64,
    pub units: u64,
}

impl PairStats {
    fn observe(&mut self, units: u64) {
        self.count += 1;
        self.units = self.units.saturating_add(units);
    }

    fn absorb(&mut self, other: &PairStats) {
        self.count += other.count;
        self.units = self.units.saturating_add(other.units);
    }

    /// The unit sum hit `u64::MAX` and no longer holds the true value.
    pub fn is_saturated(&self) -> bool {
        self.units == u64::MAX
    }

    /// Sum of `1/d` over every observation.
    pub fn value(&self, unit_scale: u64) -> f64 {
        self.units as f64 / unit_scale as f64
    }
}

pub type CoocMap = HashMap<PairKey, PairStats>;

/// Forward window with the integer weight of each distance precomputed.
#[derive(Clone, Debug)]
pub struct Window {
    size: usize,
    unit_scale: u64,
    // units[d - 1] == unit_scale / d, rounded to nearest
    units: Vec<u64>,
}

impl Window {
    pub fn new(size: usize) -> Result<Window> {
        if size == 0 {
            return Err(PrepError::configuration("context_size must be at least 1"));
        }
        let unit_scale = unit_scale(size);
        // exact division whenever d divides the scale
        let units = (1..=size as u64).map(|d| (unit_scale + d / 2) / d).collect();
        Ok(Self { size, unit_scale, units })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn unit_scale(&self) -> u64 {
        self.unit_scale
    }
}

/// Counts every window starting at positions `0..owned` of `chunk`.
/// Positions past `owned` are lookahead only: they complete windows but
/// never start one.
pub fn count_window(chunk: &[TokenId], owned: usize, window: &Window, tup2cooc: &mut CoocMap) {

    for i in 0..owned.min(chunk.len()) {

        let token_i = chunk[i];
        for (d, units) in window.units.iter().enumerate() {

            let j = i + d + 1;
            if j >= chunk.len() { break }

            // self pairs are never counted
            let context_j = chunk[j];
            if token_i == context_j { continue }

            tup2cooc.entry(PairKey::new(token_i, context_j)).or_default().observe(*units);
        }
    }
}

/// Contiguous ranges of at most `chunk_tokens` positions covering `0..len`.
pub fn chunk_ranges(len: usize, chunk_tokens: usize) -> Vec<Range<usize>> {
    let chunk_tokens = chunk_tokens.max(1);
    (0..len).step_by(chunk_tokens).map(|i| i..(i + chunk_tokens).min(len)).collect()
}

/// Counts the windows starting inside `slice`, reading `window` extra
/// tokens of lookahead past its end.
pub fn count_slice(ids: &[TokenId], slice: &Range<usize>, window: &Window, tup2cooc: &mut CoocMap) {
    let end = (slice.end + window.size()).min(ids.len());
    count_window(&ids[slice.start..end], slice.end - slice.start, window, tup2cooc);
}

/// Adds every pair of `from` into `into`.
pub fn merge(into: &mut CoocMap, from: CoocMap) {
    for (key, stats) in from {
        into.entry(key).or_default().absorb(&stats);
    }
}

fn merge_maps(a: CoocMap, b: CoocMap) -> CoocMap {
    // fold the smaller map into the larger one
    let (mut large, small) = if a.len() >= b.len() { (a, b) } else { (b, a) };
    merge(&mut large, small);
    large
}

/// Symmetric co-occurrence counts of a corpus, one record per unordered pair.
#[derive(Clone, Debug, PartialEq)]
pub struct Cooccurrence {
    window: usize,
    unit_scale: u64,
    pairs: CoocMap,
}

impl Cooccurrence {

    /// Single threaded scan of the whole sequence.
    pub fn aggregate_serial(ids: &[TokenId], window_size: usize) -> Result<Cooccurrence> {
        let window = Window::new(window_size)?;
        let mut pairs = CoocMap::new();
        count_window(ids, ids.len(), &window, &mut pairs);
        Ok(Self { window: window.size, unit_scale: window.unit_scale, pairs })
    }

    /// Scans the sequence in parallel chunks. Every worker folds its chunks
    /// into a map of its own; the maps are then reduced pairwise. The result
    /// does not depend on the number of workers or on the chunk size.
    pub fn aggregate(ids: &[TokenId], params: &CoocParams) -> Result<Cooccurrence> {

        params.validate()?;
        let window = Window::new(params.window)?;

        let timer = Instant::now();
        let slices = chunk_ranges(ids.len(), params.chunk_tokens);
        let n_slices = slices.len();
        let pool = ThreadPoolBuilder::new().num_threads(params.num_threads).build()?;
        info!("counting co-occurrences of {} tokens in {} chunks on {} threads", ids.len(), n_slices, pool.current_num_threads());

        let pairs = pool.install(|| {
            slices
                .par_iter()
                .enumerate()
                .fold(CoocMap::new, |mut tup2cooc, (chunk_i, slice)| {
                    count_slice(ids, slice, &window, &mut tup2cooc);
                    debug!("counted chunk {} / {}, positions {:?}, local pairs: {}", chunk_i + 1, n_slices, slice, tup2cooc.len());
                    tup2cooc
                })
                .reduce(CoocMap::new, merge_maps)
        });

        info!("found {} distinct pairs, took {} seconds", pairs.len(), timer.elapsed().as_secs());
        Ok(Self { window: window.size, unit_scale: window.unit_scale, pairs })
    }

    /// Rebuilds counts saved with [`Cooccurrence::to_sorted`].
    pub fn from_sorted(window_size: usize, sorted: Vec<(PairKey, PairStats)>) -> Result<Cooccurrence> {
        let window = Window::new(window_size)?;
        let mut pairs = CoocMap::with_capacity(sorted.len());
        for (key, stats) in sorted {
            if key.row == key.col {
                return Err(PrepError::configuration(format!("saved counts hold a self pair for id {}", key.row)));
            }
            pairs.insert(key, stats);
        }
        Ok(Self { window: window.size, unit_scale: window.unit_scale, pairs })
    }

    pub fn into_pairs(self) -> CoocMap {
        self.pairs
    }

    /// Pairs ordered by key.
    pub fn to_sorted(&self) -> Vec<(PairKey, PairStats)> {
        let mut sorted: Vec<(PairKey, PairStats)> = self.pairs.iter().map(|(key, stats)| (*key, *stats)).collect();
        sorted.par_sort_unstable_by_key(|(key, _)| *key);
        sorted
    }

    pub fn get(&self, a: TokenId, b: TokenId) -> Option<&PairStats> {
        self.pairs.get(&PairKey::new(a, b))
    }

    /// Distance-decayed weight of a pair, 0 when never observed.
    pub fn value(&self, a: TokenId, b: TokenId) -> f64 {
        self.get(a, b).map_or(0.0, |stats| stats.value(self.unit_scale))
    }

    /// The `k` partners of `id` with the largest value, ties broken by
    /// partner id.
    pub fn strongest_partners(&self, id: TokenId, k: usize) -> Vec<(TokenId, PairStats)> {
        let mut partners: Vec<(TokenId, PairStats)> = self
            .pairs
            .iter()
            .filter_map(|(key, stats)| match (key.row == id, key.col == id) {
                (true, _) => Some((key.col, *stats)),
                (_, true) => Some((key.row, *stats)),
                _ => None,
            })
            .collect();
        partners.sort_by(|a, b| b.1.units.cmp(&a.1.units).then(a.0.cmp(&b.0)));
        partners.truncate(k);
        partners
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PairKey, &PairStats)> {
        self.pairs.iter()
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn unit_scale(&self) -> u64 {
        self.unit_scale
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VocabParams;
    use crate::tokenize::Corpus;
    use crate::vocabulary::Vocabulary;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn encode(text: &str) -> (Vocabulary, Vec<TokenId>) {
        let corpus = Corpus::from_text(text).unwrap();
        let vocab = Vocabulary::build(corpus.frequencies(), &VocabParams { vocab_size: None, coverage: 1.0 }).unwrap();
        let ids = vocab.encode(&corpus);
        (vocab, ids)
    }

    fn random_ids(rng: &mut StdRng, len: usize, vocab: u32) -> Vec<TokenId> {
        (0..len).map(|_| rng.gen_range(0..vocab)).collect()
    }

    #[test]
    fn unit_scale_is_exact_up_to_twenty_two() {
        assert_eq!(unit_scale(1), 1);
        assert_eq!(unit_scale(5), 60);
        assert_eq!(unit_scale(10), 2520);
        assert_eq!(unit_scale(22), 232_792_560);
        assert!(is_exact(22));
        assert!(!is_exact(23));
        assert_eq!(unit_scale(23), FIXED_POINT_SCALE);
        assert_eq!(unit_scale(1_000), FIXED_POINT_SCALE);
        assert_eq!(Window::new(5).unwrap().unit_scale(), 60);
        assert_eq!(Window::new(5).unwrap().units, vec![60, 30, 20, 15, 12]);
        assert!(Window::new(0).is_err());
    }

    #[test]
    fn wide_windows_are_counted() {
        let mut rng = StdRng::seed_from_u64(5);
        let ids = random_ids(&mut rng, 3_000, 40);
        let serial = Cooccurrence::aggregate_serial(&ids, 47).unwrap();
        assert_eq!(serial.unit_scale(), FIXED_POINT_SCALE);
        assert!(!serial.is_empty());

        for (num_threads, chunk_tokens) in [(2, 1), (3, 61), (0, 1_000)] {
            let params = CoocParams { window: 47, num_threads, chunk_tokens };
            assert_eq!(Cooccurrence::aggregate(&ids, &params).unwrap(), serial);
        }

        // one observation at distance 30, within rounding of 1/30
        let mut ids: Vec<TokenId> = vec![0; 31];
        ids[30] = 1;
        let cooc = Cooccurrence::aggregate_serial(&ids, 100).unwrap();
        assert_eq!(cooc.get(0, 1).unwrap().count, 30);
        let expected: f64 = (1..=30).map(|d| 1.0 / d as f64).sum();
        assert!((cooc.value(0, 1) - expected).abs() < 1e-8);
    }

    #[test]
    fn unit_sums_saturate() {
        let mut stats = PairStats { count: 1, units: u64::MAX - 1 };
        assert!(!stats.is_saturated());
        stats.observe(60);
        assert!(stats.is_saturated());
        stats.absorb(&PairStats { count: 2, units: 5 });
        assert_eq!(stats, PairStats { count: 4, units: u64::MAX });
    }

    #[test]
    fn pair_key_is_unordered() {
        assert_eq!(PairKey::new(7, 2), PairKey::new(2, 7));
        assert_eq!(PairKey::new(7, 2).row(), 2);
        assert_eq!(PairKey::new(7, 2).col(), 7);
    }

    #[test]
    fn small_corpus_counts() {
        let (vocab, ids) = encode("a b a c a b");
        let cooc = Cooccurrence::aggregate_serial(&ids, 2).unwrap();
        let (a, b, c) = (vocab.id_of("a"), vocab.id_of("b"), vocab.id_of("c"));

        // (a,b) at positions 0-1, 1-2 and 4-5
        assert_eq!(cooc.get(a, b).unwrap().count, 3);
        assert_eq!(cooc.value(a, b), 3.0);
        assert_eq!(cooc.get(b, a), cooc.get(a, b));
        // (a,c) at 2-3 and 3-4
        assert_eq!(cooc.get(a, c).unwrap().count, 2);
        assert_eq!(cooc.value(a, c), 2.0);
        // (b,c) at 1-3 and 3-5, both at distance 2
        assert_eq!(cooc.get(b, c).unwrap().count, 2);
        assert_eq!(cooc.value(b, c), 1.0);

        assert!(cooc.get(a, a).is_none());
        assert_eq!(cooc.len(), 3);
    }

    #[test]
    fn distance_decay() {
        let (vocab, ids) = encode("x y z x");
        let cooc = Cooccurrence::aggregate_serial(&ids, 3).unwrap();
        let (x, y, z) = (vocab.id_of("x"), vocab.id_of("y"), vocab.id_of("z"));

        // x-y at distances 1 and 2, x-z at 2 and 1, y-z at 1; x-x at 3 is skipped
        assert_eq!(cooc.get(x, y).unwrap().count, 2);
        assert_eq!(cooc.value(x, y), 1.5);
        assert_eq!(cooc.value(x, z), 1.5);
        assert_eq!(cooc.get(y, z).unwrap().count, 1);
        assert_eq!(cooc.value(y, z), 1.0);
        assert!(cooc.get(x, x).is_none());
    }

    #[test]
    fn window_one_counts_neighbours_only() {
        let mut rng = StdRng::seed_from_u64(1);
        let ids = random_ids(&mut rng, 2_000, 30);
        let cooc = Cooccurrence::aggregate_serial(&ids, 1).unwrap();

        let mut expected = CoocMap::new();
        for w in ids.windows(2) {
            if w[0] != w[1] {
                expected.entry(PairKey::new(w[0], w[1])).or_default().observe(1);
            }
        }
        assert_eq!(cooc.pairs, expected);
        for (_, stats) in cooc.iter() {
            assert_eq!(stats.value(cooc.unit_scale()), stats.count as f64);
        }
    }

    #[test]
    fn no_self_pairs() {
        let mut rng = StdRng::seed_from_u64(2);
        // a tiny vocabulary makes repeats inside a window common
        let ids = random_ids(&mut rng, 5_000, 4);
        let cooc = Cooccurrence::aggregate_serial(&ids, 7).unwrap();
        assert!(!cooc.is_empty());
        assert!(cooc.iter().all(|(key, stats)| key.row() < key.col() && stats.count > 0 && stats.units > 0));
    }

    #[test]
    fn random_chunk_boundaries_merge_to_the_serial_scan() {
        let mut rng = StdRng::seed_from_u64(3);
        for round in 0..20 {
            let len = rng.gen_range(0..3_000);
            let window_size = rng.gen_range(1..40);
            let ids = random_ids(&mut rng, len, 50);
            let window = Window::new(window_size).unwrap();
            let serial = Cooccurrence::aggregate_serial(&ids, window_size).unwrap();

            // random cut points, including empty and single token chunks
            let mut cuts: Vec<usize> = (0..rng.gen_range(0..20)).map(|_| rng.gen_range(0..=len)).collect();
            cuts.push(0);
            cuts.push(len);
            cuts.sort_unstable();

            let mut partials: Vec<CoocMap> = cuts
                .windows(2)
                .map(|cut| {
                    let mut tup2cooc = CoocMap::new();
                    count_slice(&ids, &(cut[0]..cut[1]), &window, &mut tup2cooc);
                    tup2cooc
                })
                .collect();
            // merge order must not matter either
            if round % 2 == 1 {
                partials.reverse();
            }
            let merged = partials.into_iter().fold(CoocMap::new(), merge_maps);

            assert_eq!(merged, serial.pairs, "round {} window {} cuts {:?}", round, window_size, cuts);
        }
    }

    #[test]
    fn parallel_matches_serial_for_any_threads_and_chunks() {
        let mut rng = StdRng::seed_from_u64(4);
        let ids = random_ids(&mut rng, 20_000, 200);
        let serial = Cooccurrence::aggregate_serial(&ids, 5).unwrap();

        for (num_threads, chunk_tokens) in [(1, 20_000), (2, 1), (3, 777), (4, 4_096), (0, 100_000)] {
            let params = CoocParams { window: 5, num_threads, chunk_tokens };
            let parallel = Cooccurrence::aggregate(&ids, &params).unwrap();
            assert_eq!(parallel, serial, "threads {} chunk {}", num_threads, chunk_tokens);
        }
    }

    #[test]
    fn chunk_ranges_cover_everything() {
        assert_eq!(chunk_ranges(10, 4), vec![0..4, 4..8, 8..10]);
        assert_eq!(chunk_ranges(8, 4), vec![0..4, 4..8]);
        assert!(chunk_ranges(0, 4).is_empty());
    }

    #[test]
    fn sorted_roundtrip_keeps_counts() {
        let (_, ids) = encode("the cat sat on the mat and the dog sat on the cat");
        let cooc = Cooccurrence::aggregate_serial(&ids, 4).unwrap();
        let sorted = cooc.to_sorted();
        assert!(sorted.windows(2).all(|w| w[0].0 < w[1].0));

        let restored = Cooccurrence::from_sorted(4, sorted).unwrap();
        assert_eq!(restored, cooc);
    }

    #[test]
    fn strongest_partners_by_value() {
        let (vocab, ids) = encode("x y z x");
        let cooc = Cooccurrence::aggregate_serial(&ids, 3).unwrap();
        let (x, y, z) = (vocab.id_of("x"), vocab.id_of("y"), vocab.id_of("z"));

        // x-y and x-z tie at 1.5, broken by id
        let partners: Vec<TokenId> = cooc.strongest_partners(x, 5).iter().map(|(id, _)| *id).collect();
        assert_eq!(partners, vec![y, z]);
        let partners = cooc.strongest_partners(z, 1);
        assert_eq!(partners.len(), 1);
        assert_eq!(partners[0].0, x);
        assert!(cooc.strongest_partners(99, 3).is_empty());
    }

    #[test]
    fn empty_and_single_token_sequences() {
        let cooc = Cooccurrence::aggregate(&[], &CoocParams::default()).unwrap();
        assert!(cooc.is_empty());
        let cooc = Cooccurrence::aggregate(&[3], &CoocParams::default()).unwrap();
        assert!(cooc.is_empty());
    }
}
