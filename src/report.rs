use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use log::info;
use logging_timer::time;

use crate::error::Error;
use crate::score::{ScoredSheet, SummaryStatistics};

/// A per-run output directory with a create, populate, handoff lifecycle.
/// Nothing outside this directory is touched, and results are only written
/// once the whole batch has been scored, so no fatal path leaves partial
/// output behind.
#[derive(Debug, Clone)]
pub struct OutputContext {
    dir: PathBuf,
}

impl OutputContext {
    pub fn create(dir: &Path) -> Result<Self, Error> {
        fs::create_dir_all(dir).map_err(|source| Error::OutputIo {
            path: dir.to_path_buf(),
            source,
        })?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    pub fn scores_csv_path(&self) -> PathBuf {
        self.dir.join("scores.csv")
    }

    pub fn summary_json_path(&self) -> PathBuf {
        self.dir.join("summary.json")
    }

    /// Persists the tabular result set: one row per sheet with the sheet
    /// identifier, the detected letter (or empty) per question, and the
    /// total score.
    #[time]
    pub fn write_scores_csv(
        &self,
        batch: &[ScoredSheet],
        num_questions: u32,
    ) -> Result<PathBuf, Error> {
        let path = self.scores_csv_path();
        let io_error = |source| Error::OutputIo {
            path: path.clone(),
            source,
        };

        let file = File::create(&path).map_err(io_error)?;
        let mut out = BufWriter::new(file);

        write!(out, "sheet_id").map_err(io_error)?;
        for question in 1..=num_questions {
            write!(out, ",q{question}").map_err(io_error)?;
        }
        writeln!(out, ",total_score").map_err(io_error)?;

        for sheet in batch {
            write!(out, "{}", csv_field(sheet.sheet_id.as_str())).map_err(io_error)?;
            for question in 1..=num_questions {
                match sheet.responses.selection(question) {
                    Some(letter) => write!(out, ",{letter}").map_err(io_error)?,
                    None => write!(out, ",").map_err(io_error)?,
                }
            }
            writeln!(out, ",{}", sheet.score).map_err(io_error)?;
        }

        out.flush().map_err(io_error)?;
        info!("wrote {} score row(s) to {}", batch.len(), path.display());
        Ok(path)
    }

    /// Persists the summary statistics for the external report renderer.
    pub fn write_summary_json(&self, summary: &SummaryStatistics) -> Result<PathBuf, Error> {
        let path = self.summary_json_path();
        let json = serde_json::to_string_pretty(summary).expect("summary serializes");
        fs::write(&path, json).map_err(|source| Error::OutputIo {
            path: path.clone(),
            source,
        })?;
        info!("wrote summary to {}", path.display());
        Ok(path)
    }
}

/// Sheet identifiers are file names and may contain delimiter characters.
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
