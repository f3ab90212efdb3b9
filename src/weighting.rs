// imports
use crate::config::GloveParams;
use crate::cooccurrence::Cooccurrence;
use crate::error::{PrepError, Result};
use crate::vocabulary::{TokenId, Vocabulary};

use ndarray::{array, s, Array1, Array2};
use ndarray_stats::QuantileExt;
use rayon::prelude::*;
use serde::Serialize;
use std::cmp::Ordering;
use std::iter;
use std::time::Instant;
use tracing::info;

/// One finalized training example, a single record per unordered pair.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct InteractionRecord<'a> {
    pub row_token_id: TokenId,
    pub col_token_id: TokenId,
    pub row_token: &'a str,
    pub col_token: &'a str,
    pub count: u64,
    pub value: f64,
    pub neg_weight: f64,
    pub glove_weight: f64,
    pub glove_value: f64,
}

fn joined_bytes<'s>(row_token: &'s str, col_token: &'s str) -> impl Iterator<Item = u8> + 's {
    row_token.bytes().chain(iter::once(b' ')).chain(col_token.bytes())
}

impl InteractionRecord<'_> {
    /// Byte-wise order of `"row_token col_token"`, compared without
    /// building the joined string.
    pub fn pair_cmp(&self, other: &Self) -> Ordering {
        joined_bytes(self.row_token, self.col_token).cmp(joined_bytes(other.row_token, other.col_token))
    }
}

/// GloVe confidence weight, `(count / x_max)^alpha` saturating at 1.
pub fn glove_weight(count: u64, params: &GloveParams) -> f64 {
    (count as f64 / params.x_max).powf(params.alpha).clamp(0.0, 1.0)
}

/// Filters low-support pairs and derives the training weights of the rest.
/// Records come back in emission order.
pub fn transform<'a>(cooc: Cooccurrence, vocab: &'a Vocabulary, params: &GloveParams) -> Result<Vec<InteractionRecord<'a>>> {

    params.validate()?;

    let timer = Instant::now();
    let unit_scale = cooc.unit_scale();
    let n_pairs = cooc.len();
    let mut records: Vec<InteractionRecord<'a>> = Vec::new();

    for (key, stats) in cooc.into_pairs() {

        // support filter
        if stats.count < params.count_minimum { continue }

        if key.col() as usize >= vocab.len() {
            return Err(PrepError::configuration(format!(
                "pair ({}, {}) references an id outside the vocabulary of {} tokens",
                key.row(), key.col(), vocab.len()
            )));
        }
        let row = vocab.entry(key.row());
        let col = vocab.entry(key.col());

        if stats.is_saturated() {
            return Err(PrepError::numeric_domain(format!(
                "accumulated value of pair ({}, {}) overflowed after {} observations", row.token, col.token, stats.count
            )));
        }
        let value = stats.value(unit_scale);
        if !(value.is_finite() && value > 0.0) {
            return Err(PrepError::numeric_domain(format!(
                "value {} of pair ({}, {}) has no finite logarithm", value, row.token, col.token
            )));
        }

        let record = InteractionRecord {
            row_token_id: key.row(),
            col_token_id: key.col(),
            row_token: &row.token,
            col_token: &col.token,
            count: stats.count,
            value,
            neg_weight: row.count as f64 * col.proportion,
            glove_weight: glove_weight(stats.count, params),
            glove_value: value.ln(),
        };

        if ![record.neg_weight, record.glove_weight, record.glove_value].iter().all(|x| x.is_finite()) {
            return Err(PrepError::numeric_domain(format!(
                "non-finite weight for pair ({}, {}): {:?}", row.token, col.token, record
            )));
        }
        records.push(record);
    }

    // unique pairs, so the unstable sort is deterministic
    records.par_sort_unstable_by(|a, b| a.pair_cmp(b));

    info!("kept {} of {} pairs with count >= {}, took {} seconds", records.len(), n_pairs, params.count_minimum, timer.elapsed().as_secs());
    Ok(records)
}

/// Column names of [`to_ndarray`].
pub const MATRIX_COLUMNS: [&str; 7] = ["row_token_id", "col_token_id", "count", "value", "neg_weight", "glove_weight", "glove_value"];

/// Numeric columns of the records as an `(n, 7)` matrix, rows in record order.
pub fn to_ndarray(records: &[InteractionRecord]) -> Array2<f64> {
    let mut nd_array: Array2<f64> = Array2::zeros((records.len(), MATRIX_COLUMNS.len()));
    for (i, r) in records.iter().enumerate() {
        let line: Array1<f64> = array![
            r.row_token_id as f64, r.col_token_id as f64, r.count as f64,
            r.value, r.neg_weight, r.glove_weight, r.glove_value
        ];
        nd_array.slice_mut(s![i, ..]).assign(&line);
    }
    nd_array
}

/// (column, min, max) of the count, value and glove_value columns; empty
/// when there are no rows.
pub fn summarize(nd_array: &Array2<f64>) -> Vec<(&'static str, f64, f64)> {
    [2usize, 3, 6]
        .iter()
        .filter_map(|col| {
            let column = nd_array.column(*col);
            match (column.min(), column.max()) {
                (Ok(min), Ok(max)) => Some((MATRIX_COLUMNS[*col], *min, *max)),
                _ => None,
            }
        })
        .collect()
}
