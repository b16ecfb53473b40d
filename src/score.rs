use serde::Serialize;

use crate::answer_key::AnswerKey;
use crate::classify::ResponseMap;
use crate::error::Error;
use crate::types::SheetId;

/// One sheet's responses and integer score.
#[derive(Debug, Clone)]
pub struct ScoredSheet {
    pub sheet_id: SheetId,
    pub responses: ResponseMap,
    pub score: u32,
}

/// Awards one point per question on exact case-sensitive letter match. A
/// question absent from either side scores zero; there is no negative
/// marking or partial credit.
pub fn score_sheet(responses: &ResponseMap, key: &AnswerKey) -> u32 {
    (1..=key.num_questions())
        .filter(|&question| {
            match (responses.selection(question), key.correct_option(question)) {
                (Some(response), Some(correct)) => response == correct,
                _ => false,
            }
        })
        .count() as u32
}

/// Batch summary handed to the external report renderer.
#[derive(Debug, Clone, Serialize)]
pub struct SummaryStatistics {
    pub sheet_count: usize,
    pub mean_score: f64,
    pub max_score: u32,
    pub min_score: u32,
    /// Every sheet tied at the maximum score, never an arbitrary winner.
    pub top_sheets: Vec<SheetId>,
}

/// Folds a batch of scored sheets into summary statistics. An empty batch is
/// a distinct terminal outcome, not a zero-filled record.
pub fn summarize(batch: &[ScoredSheet]) -> Result<SummaryStatistics, Error> {
    if batch.is_empty() {
        return Err(Error::EmptyBatch);
    }

    let total: u64 = batch.iter().map(|sheet| sheet.score as u64).sum();
    let max_score = batch.iter().map(|sheet| sheet.score).max().expect("non-empty batch");
    let min_score = batch.iter().map(|sheet| sheet.score).min().expect("non-empty batch");
    let top_sheets = batch
        .iter()
        .filter(|sheet| sheet.score == max_score)
        .map(|sheet| sheet.sheet_id.clone())
        .collect();

    Ok(SummaryStatistics {
        sheet_count: batch.len(),
        mean_score: total as f64 / batch.len() as f64,
        max_score,
        min_score,
        top_sheets,
    })
}
