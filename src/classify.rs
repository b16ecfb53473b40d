use image::GrayImage;
use imageproc::drawing::draw_polygon_mut;
use logging_timer::time;

use crate::grid::{BubbleCandidate, QuestionGroup};
use crate::image_utils::WHITE;

pub fn option_letter(index: usize) -> char {
    (b'A' + index as u8) as char
}

/// Per-sheet mapping from question number to the detected option letter.
/// Backed by a fixed-capacity array sized from the answer key's question
/// count, since question numbers are dense integers starting at 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseMap {
    selections: Vec<Option<char>>,
}

impl ResponseMap {
    pub fn new(num_questions: u32) -> Self {
        Self {
            selections: vec![None; num_questions as usize],
        }
    }

    /// The selected letter for a 1-based question number, if any.
    pub fn selection(&self, question: u32) -> Option<char> {
        self.selections
            .get(question.checked_sub(1)? as usize)
            .copied()
            .flatten()
    }

    fn set(&mut self, question: u32, letter: Option<char>) {
        let Some(index) = question.checked_sub(1) else {
            return;
        };
        if let Some(slot) = self.selections.get_mut(index as usize) {
            *slot = letter;
        }
    }

    pub fn num_questions(&self) -> u32 {
        self.selections.len() as u32
    }

    #[cfg(test)]
    pub fn from_selections(selections: Vec<Option<char>>) -> Self {
        Self { selections }
    }
}

/// Measures ink coverage per bubble and decides the selected option per
/// question: the option with the strictly greatest foreground count wins.
/// An all-zero group and an exact tie both resolve to no selection.
#[time]
pub fn classify_marks(
    mask: &GrayImage,
    groups: &[QuestionGroup],
    num_questions: u32,
) -> ResponseMap {
    let mut responses = ResponseMap::new(num_questions);

    for group in groups {
        let coverage = group
            .options
            .iter()
            .map(|candidate| fill_coverage(mask, candidate))
            .collect::<Vec<u32>>();

        let best = coverage.iter().copied().max().unwrap_or(0);
        let is_unique = coverage.iter().filter(|count| **count == best).count() == 1;
        let selected = if best > 0 && is_unique {
            coverage
                .iter()
                .position(|count| *count == best)
                .map(option_letter)
        } else {
            None
        };

        responses.set(group.question, selected);
    }

    responses
}

/// Counts foreground pixels of the mask inside the candidate's contour,
/// by rasterizing the contour as a filled polygon stencil.
pub fn fill_coverage(mask: &GrayImage, candidate: &BubbleCandidate) -> u32 {
    let mut polygon = candidate.contour.as_slice();
    if let (Some(first), Some(last)) = (polygon.first(), polygon.last()) {
        if polygon.len() > 1 && first == last {
            polygon = &polygon[..polygon.len() - 1];
        }
    }
    if polygon.len() < 3 {
        return 0;
    }

    let mut stencil = GrayImage::new(mask.width(), mask.height());
    draw_polygon_mut(&mut stencil, polygon, WHITE);

    let bounds = candidate.bounds;
    let mut count = 0;
    for y in bounds.top()..=bounds.bottom() {
        for x in bounds.left()..=bounds.right() {
            if x < 0 || y < 0 || x as u32 >= mask.width() || y as u32 >= mask.height() {
                continue;
            }
            let (x, y) = (x as u32, y as u32);
            if stencil.get_pixel(x, y) == &WHITE && mask.get_pixel(x, y) == &WHITE {
                count += 1;
            }
        }
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{bounding_rect, center_of_rect};
    use imageproc::drawing::draw_filled_rect_mut;
    use imageproc::point::Point;
    use imageproc::rect::Rect;

    fn square_candidate(left: i32, top: i32, side: i32) -> BubbleCandidate {
        let contour = vec![
            Point::new(left, top),
            Point::new(left + side - 1, top),
            Point::new(left + side - 1, top + side - 1),
            Point::new(left, top + side - 1),
        ];
        let bounds = bounding_rect(&contour);
        BubbleCandidate {
            center: center_of_rect(&bounds),
            bounds,
            contour,
        }
    }

    fn group_of_four(y: i32) -> QuestionGroup {
        QuestionGroup {
            question: 1,
            options: (0..4)
                .map(|i| square_candidate(10 + i * 40, y, 24))
                .collect(),
        }
    }

    #[test]
    fn all_zero_group_yields_no_selection() {
        let mask = GrayImage::new(200, 100);
        let responses = classify_marks(&mask, &[group_of_four(10)], 1);
        assert_eq!(responses.selection(1), None);
    }

    #[test]
    fn uniquely_covered_option_is_selected() {
        let mut mask = GrayImage::new(200, 100);
        // Fill the third option's region.
        draw_filled_rect_mut(&mut mask, Rect::at(90, 10).of_size(24, 24), WHITE);

        let responses = classify_marks(&mask, &[group_of_four(10)], 1);
        assert_eq!(responses.selection(1), Some('C'));
    }

    #[test]
    fn exact_tie_yields_no_selection() {
        let mut mask = GrayImage::new(200, 100);
        draw_filled_rect_mut(&mut mask, Rect::at(10, 10).of_size(24, 24), WHITE);
        draw_filled_rect_mut(&mut mask, Rect::at(50, 10).of_size(24, 24), WHITE);

        let responses = classify_marks(&mask, &[group_of_four(10)], 1);
        assert_eq!(responses.selection(1), None);
    }

    #[test]
    fn heavier_coverage_beats_outline_coverage() {
        let mut mask = GrayImage::new(200, 100);
        // Thin partial coverage on option A, solid fill on option B.
        draw_filled_rect_mut(&mut mask, Rect::at(10, 10).of_size(24, 3), WHITE);
        draw_filled_rect_mut(&mut mask, Rect::at(50, 10).of_size(24, 24), WHITE);

        let responses = classify_marks(&mask, &[group_of_four(10)], 1);
        assert_eq!(responses.selection(1), Some('B'));
    }

    #[test]
    fn selections_outside_the_key_range_read_as_none() {
        let responses = ResponseMap::new(4);
        assert_eq!(responses.selection(0), None);
        assert_eq!(responses.selection(5), None);
    }
}
