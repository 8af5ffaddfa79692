//! Best-model selection by R²

use ordered_float::OrderedFloat;

use super::models::ModelEntry;

/// Index of the highest R² score; ties go to the earliest entry and NaN never wins
pub fn best_index<I>(scores: I) -> Option<usize>
where
    I: IntoIterator<Item = f64>,
    I::IntoIter: DoubleEndedIterator + ExactSizeIterator,
{
    scores
        .into_iter()
        .enumerate()
        .filter(|(_, score)| !score.is_nan())
        .rev()
        .max_by_key(|(_, score)| OrderedFloat(*score))
        .map(|(idx, _)| idx)
}

/// Best entry of a training run
pub fn select_best(entries: &[ModelEntry]) -> Option<usize> {
    best_index(entries.iter().map(|e| e.metrics.r2).collect::<Vec<_>>())
}
