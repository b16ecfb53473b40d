use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use logging_timer::time;
use rayon::prelude::*;

use crate::answer_key::AnswerKey;
use crate::binarize::{binarize, DEFAULT_INK_THRESHOLD};
use crate::classify::classify_marks;
use crate::debug::ImageDebugWriter;
use crate::error::{Error, SheetError};
use crate::grid::{detect_bubble_grid, DEFAULT_MIN_BUBBLE_SIZE};
use crate::image_utils::{count_pixels, WHITE};
use crate::rectify::rectify_sheet;
use crate::score::{score_sheet, ScoredSheet};
use crate::types::SheetId;

const SHEET_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

#[derive(Debug, Clone)]
pub struct Options {
    pub options_per_question: usize,
    pub ink_threshold: u8,
    pub min_bubble_size: u32,
    pub debug: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            options_per_question: 4,
            ink_threshold: DEFAULT_INK_THRESHOLD,
            min_bubble_size: DEFAULT_MIN_BUBBLE_SIZE,
            debug: false,
        }
    }
}

/// Lists the sheet images in a directory, sorted by file name. Directory
/// enumeration order is platform-dependent, so the sort is what makes batch
/// output reproducible.
#[time]
pub fn enumerate_sheets(dir: &Path) -> Result<Vec<PathBuf>, Error> {
    let entries = fs::read_dir(dir).map_err(|source| Error::SheetDirIo {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| Error::SheetDirIo {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        let is_sheet = path.is_file()
            && path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| {
                    SHEET_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str())
                });
        if is_sheet {
            paths.push(path);
        }
    }

    paths.sort();
    Ok(paths)
}

/// Runs the full pipeline for one sheet: rectify, binarize, detect the
/// bubble grid, classify marks, score against the key.
#[time]
pub fn process_sheet(
    path: &Path,
    key: &AnswerKey,
    options: &Options,
) -> Result<ScoredSheet, SheetError> {
    let img = image::open(path)
        .map_err(|source| SheetError::ImageOpen {
            path: path.to_path_buf(),
            source,
        })?
        .into_luma8();

    let sheet_id = SheetId::from(
        path.file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default(),
    );

    let debug_writer = if options.debug {
        ImageDebugWriter::new(path)
    } else {
        ImageDebugWriter::disabled()
    };

    let rectified = rectify_sheet(&img);
    if let Some(quad) = &rectified.quad {
        debug!("sheet {}: boundary {:?}", sheet_id, quad);
    }
    debug_writer.write_gray("rectified", &rectified.image);

    let mask = binarize(&rectified.image, options.ink_threshold);
    debug!(
        "sheet {}: {} foreground pixel(s) after binarization",
        sheet_id,
        count_pixels(&mask, &WHITE)
    );
    debug_writer.write_gray("binarized", &mask);

    let grid = detect_bubble_grid(
        &mask,
        key.num_questions(),
        options.options_per_question,
        options.min_bubble_size,
    );
    debug_writer.write_grid("grid", &rectified.image, &grid);

    let responses = classify_marks(&mask, &grid.groups, key.num_questions());
    debug_writer.write_classified("classified", &rectified.image, &grid, &responses);

    let score = score_sheet(&responses, key);
    debug!("sheet {}: {}/{}", sheet_id, score, responses.num_questions());

    Ok(ScoredSheet {
        sheet_id,
        responses,
        score,
    })
}

/// Scores every sheet in the directory. Sheets are independent, so they fan
/// out across the rayon pool; the enumeration sort keeps the collected
/// output in identifier order. A sheet that fails to load is skipped with a
/// diagnostic and the batch continues.
#[time]
pub fn process_batch(
    dir: &Path,
    key: &AnswerKey,
    options: &Options,
) -> Result<Vec<ScoredSheet>, Error> {
    let paths = enumerate_sheets(dir)?;
    info!("processing {} sheet(s) from {}", paths.len(), dir.display());

    let batch = paths
        .par_iter()
        .filter_map(|path| match process_sheet(path, key, options) {
            Ok(sheet) => Some(sheet),
            Err(e) => {
                warn!("skipping sheet: {}", e);
                None
            }
        })
        .collect::<Vec<ScoredSheet>>();

    if batch.is_empty() {
        return Err(Error::EmptyBatch);
    }
    Ok(batch)
}
