use image::GrayImage;
use imageproc::contours::{find_contours, BorderType};
use imageproc::point::Point;
use imageproc::rect::Rect;
use log::warn;
use logging_timer::time;

use crate::geometry::{bounding_rect, center_of_rect};

/// Minimum bounding-box side for a bubble candidate, in pixels. Tuned for
/// the reference scan resolution; recalibrate per scan DPI via
/// `--min-bubble-size`.
pub const DEFAULT_MIN_BUBBLE_SIZE: u32 = 20;

/// Accepted width/height ratio range for near-circular bubbles.
const MIN_ASPECT_RATIO: f32 = 0.8;
const MAX_ASPECT_RATIO: f32 = 1.2;

/// A candidate mark region found in the binary mask.
#[derive(Debug, Clone)]
pub struct BubbleCandidate {
    pub contour: Vec<Point<i32>>,
    pub bounds: Rect,
    pub center: Point<f32>,
}

/// The bubbles belonging to one question, ordered left to right so that the
/// option at index `i` is letter `A + i`.
#[derive(Debug, Clone)]
pub struct QuestionGroup {
    /// 1-based question number.
    pub question: u32,
    pub options: Vec<BubbleCandidate>,
}

#[derive(Debug, Clone)]
pub struct DetectedGrid {
    pub groups: Vec<QuestionGroup>,
    /// Candidates that survived filtering but were not assigned to a
    /// complete question group.
    pub surplus_discarded: usize,
}

/// Finds bubble candidates in the binary mask and organizes them into
/// ordered question groups: survivors are sorted top to bottom, partitioned
/// sequentially into groups of `options_per_question`, and sorted left to
/// right within each group.
#[time]
pub fn detect_bubble_grid(
    mask: &GrayImage,
    num_questions: u32,
    options_per_question: usize,
    min_bubble_size: u32,
) -> DetectedGrid {
    let contours = find_contours::<i32>(mask);
    let mut candidates = contours
        .into_iter()
        .filter(|contour| contour.border_type == BorderType::Outer)
        .filter_map(|contour| {
            let bounds = bounding_rect(&contour.points);
            if could_be_bubble(&bounds, min_bubble_size) {
                Some(BubbleCandidate {
                    center: center_of_rect(&bounds),
                    bounds,
                    contour: contour.points,
                })
            } else {
                None
            }
        })
        .collect::<Vec<BubbleCandidate>>();

    candidates.sort_by_key(|candidate| candidate.bounds.top());

    let mut groups = Vec::with_capacity(num_questions as usize);
    let mut surplus_discarded = 0;
    for (index, chunk) in candidates.chunks(options_per_question).enumerate() {
        if index as u32 >= num_questions || chunk.len() < options_per_question {
            surplus_discarded += chunk.len();
            continue;
        }

        let mut options = chunk.to_vec();
        options.sort_by_key(|candidate| candidate.bounds.left());
        groups.push(QuestionGroup {
            question: index as u32 + 1,
            options,
        });
    }

    if surplus_discarded > 0 {
        warn!(
            "discarded {} surplus bubble candidate(s) beyond {} question(s) of {} option(s)",
            surplus_discarded, num_questions, options_per_question
        );
    }

    DetectedGrid {
        groups,
        surplus_discarded,
    }
}

/// Size and shape filter: both bounding-box sides at least the minimum and
/// a near-square aspect ratio.
fn could_be_bubble(bounds: &Rect, min_bubble_size: u32) -> bool {
    let aspect_ratio = bounds.width() as f32 / bounds.height() as f32;
    bounds.width() >= min_bubble_size
        && bounds.height() >= min_bubble_size
        && (MIN_ASPECT_RATIO..=MAX_ASPECT_RATIO).contains(&aspect_ratio)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_utils::WHITE;
    use imageproc::drawing::{draw_filled_circle_mut, draw_filled_rect_mut};

    const RADIUS: i32 = 12;

    fn draw_bubble(mask: &mut GrayImage, cx: i32, cy: i32) {
        draw_filled_circle_mut(mask, (cx, cy), RADIUS, WHITE);
    }

    fn grid_mask(rows: &[&[(i32, i32)]]) -> GrayImage {
        let mut mask = GrayImage::new(400, 400);
        for row in rows {
            for (cx, cy) in *row {
                draw_bubble(&mut mask, *cx, *cy);
            }
        }
        mask
    }

    #[test]
    fn groups_are_ordered_top_to_bottom_then_left_to_right() {
        // Drawn in a scrambled order; only pixel positions matter.
        let mask = grid_mask(&[
            &[(200, 150), (50, 150), (125, 150), (275, 150)],
            &[(275, 50), (50, 50), (200, 50), (125, 50)],
            &[(125, 250), (275, 250), (50, 250), (200, 250)],
        ]);

        let grid = detect_bubble_grid(&mask, 3, 4, DEFAULT_MIN_BUBBLE_SIZE);
        assert_eq!(grid.surplus_discarded, 0);
        assert_eq!(grid.groups.len(), 3);

        for (index, group) in grid.groups.iter().enumerate() {
            assert_eq!(group.question, index as u32 + 1);
            assert_eq!(group.options.len(), 4);
            let lefts = group
                .options
                .iter()
                .map(|o| o.bounds.left())
                .collect::<Vec<i32>>();
            let mut sorted = lefts.clone();
            sorted.sort_unstable();
            assert_eq!(lefts, sorted);
        }

        let row_tops = grid.groups.iter().map(|g| g.options[0].bounds.top());
        let tops = row_tops.collect::<Vec<i32>>();
        assert!(tops.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn trailing_incomplete_group_is_discarded_with_count() {
        let mask = grid_mask(&[
            &[(50, 50), (125, 50), (200, 50), (275, 50)],
            &[(50, 150), (125, 150)],
        ]);

        let grid = detect_bubble_grid(&mask, 2, 4, DEFAULT_MIN_BUBBLE_SIZE);
        assert_eq!(grid.groups.len(), 1);
        assert_eq!(grid.surplus_discarded, 2);
    }

    #[test]
    fn candidates_beyond_the_question_count_are_ignored() {
        let mask = grid_mask(&[
            &[(50, 50), (125, 50), (200, 50), (275, 50)],
            &[(50, 150), (125, 150), (200, 150), (275, 150)],
        ]);

        let grid = detect_bubble_grid(&mask, 1, 4, DEFAULT_MIN_BUBBLE_SIZE);
        assert_eq!(grid.groups.len(), 1);
        assert_eq!(grid.groups[0].question, 1);
        assert_eq!(grid.surplus_discarded, 4);
    }

    #[test]
    fn non_bubble_shapes_are_filtered_out() {
        let mut mask = grid_mask(&[&[(50, 100), (125, 100), (200, 100), (275, 100)]]);
        // Too elongated to be a bubble.
        draw_filled_rect_mut(&mut mask, Rect::at(40, 200).of_size(120, 24), WHITE);
        // Too small.
        draw_filled_circle_mut(&mut mask, (200, 250), 5, WHITE);

        let grid = detect_bubble_grid(&mask, 1, 4, DEFAULT_MIN_BUBBLE_SIZE);
        assert_eq!(grid.groups.len(), 1);
        assert_eq!(grid.surplus_discarded, 0);
    }
}
