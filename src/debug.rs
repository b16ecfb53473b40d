use std::path::{Path, PathBuf};

use image::{DynamicImage, GrayImage, RgbImage};
use imageproc::drawing::{draw_cross_mut, draw_hollow_rect_mut};
use log::warn;

use crate::classify::{option_letter, ResponseMap};
use crate::grid::DetectedGrid;
use crate::image_utils::{GREEN, RAINBOW, RED};

/// Writes per-stage debug images next to the input sheet. A disabled writer
/// is a no-op; debug output never affects pipeline results.
#[derive(Debug, Clone)]
pub struct ImageDebugWriter {
    input_path: Option<PathBuf>,
}

impl ImageDebugWriter {
    pub fn new(input_path: &Path) -> Self {
        Self {
            input_path: Some(input_path.to_path_buf()),
        }
    }

    pub const fn disabled() -> Self {
        Self { input_path: None }
    }

    fn output_path(&self, label: &str) -> Option<PathBuf> {
        let input_path = self.input_path.as_ref()?;
        let stem = input_path.file_stem()?.to_str()?;
        let mut output = input_path.clone();
        output.set_file_name(format!("{stem}_debug_{label}.png"));
        Some(output)
    }

    fn save(&self, label: &str, canvas: &RgbImage) {
        if let Some(path) = self.output_path(label) {
            if let Err(e) = canvas.save(&path) {
                warn!("failed to write debug image {}: {}", path.display(), e);
            }
        }
    }

    pub fn write_gray(&self, label: &str, image: &GrayImage) {
        if self.input_path.is_some() {
            let canvas = DynamicImage::ImageLuma8(image.clone()).to_rgb8();
            self.save(label, &canvas);
        }
    }

    /// Candidate bounding boxes, one palette color per question group, with
    /// a cross at each centroid.
    pub fn write_grid(&self, label: &str, base: &GrayImage, grid: &DetectedGrid) {
        if self.input_path.is_none() {
            return;
        }

        let mut canvas = DynamicImage::ImageLuma8(base.clone()).to_rgb8();
        for group in &grid.groups {
            let color = RAINBOW[(group.question as usize - 1) % RAINBOW.len()];
            for candidate in &group.options {
                draw_hollow_rect_mut(&mut canvas, candidate.bounds, color);
                draw_cross_mut(
                    &mut canvas,
                    color,
                    candidate.center.x.round() as i32,
                    candidate.center.y.round() as i32,
                );
            }
        }
        self.save(label, &canvas);
    }

    /// Classification outcome: the selected option in green, the rest in red.
    pub fn write_classified(
        &self,
        label: &str,
        base: &GrayImage,
        grid: &DetectedGrid,
        responses: &ResponseMap,
    ) {
        if self.input_path.is_none() {
            return;
        }

        let mut canvas = DynamicImage::ImageLuma8(base.clone()).to_rgb8();
        for group in &grid.groups {
            let selected = responses.selection(group.question);
            for (index, candidate) in group.options.iter().enumerate() {
                let color = if selected == Some(option_letter(index)) {
                    GREEN
                } else {
                    RED
                };
                draw_hollow_rect_mut(&mut canvas, candidate.bounds, color);
            }
        }
        self.save(label, &canvas);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_writer_produces_no_output_path() {
        assert!(ImageDebugWriter::disabled().output_path("rectified").is_none());
    }

    #[test]
    fn output_path_is_labeled_next_to_the_input() {
        let writer = ImageDebugWriter::new(Path::new("/scans/sheet-042.jpg"));
        assert_eq!(
            writer.output_path("binarized"),
            Some(PathBuf::from("/scans/sheet-042_debug_binarized.png"))
        );
    }
}
