use image::GrayImage;
use imageproc::contours::{find_contours, BorderType, Contour};
use imageproc::edges::canny;
use imageproc::filter::gaussian_blur_f32;
use imageproc::geometric_transformations::{warp_into, Interpolation, Projection};
use imageproc::geometry::{approximate_polygon_dp, arc_length};
use imageproc::point::Point;
use log::info;
use logging_timer::time;

use crate::geometry::{contour_area, Quad};
use crate::image_utils::WHITE;

/// Sigma for the pre-edge-detection blur, equivalent to a 5x5 kernel.
const EDGE_BLUR_SIGMA: f32 = 1.0;
const CANNY_LOW_THRESHOLD: f32 = 75.0;
const CANNY_HIGH_THRESHOLD: f32 = 200.0;

/// Polygon approximation tolerance as a fraction of the contour perimeter.
const POLY_APPROX_EPSILON: f64 = 0.02;

/// Number of largest contours examined for a 4-corner sheet boundary.
const BOUNDARY_CANDIDATES: usize = 5;

/// A canonical top-down view of a sheet. `quad` is the detected boundary in
/// source coordinates, or `None` when no boundary was found and the image
/// passed through unrectified.
#[derive(Debug, Clone)]
pub struct Rectified {
    pub image: GrayImage,
    pub quad: Option<Quad>,
}

/// Finds the sheet's boundary quadrilateral and warps it to a top-down view.
/// A sheet without a detectable 4-corner boundary is passed through
/// unchanged; that is a degraded result, not a failure.
#[time]
pub fn rectify_sheet(img: &GrayImage) -> Rectified {
    let quad = match find_sheet_boundary(img) {
        Some(quad) => quad,
        None => {
            info!("no 4-corner sheet boundary found, continuing unrectified");
            return Rectified {
                image: img.clone(),
                quad: None,
            };
        }
    };

    match warp_quad_to_rect(img, &quad) {
        Some(image) => Rectified {
            image,
            quad: Some(quad),
        },
        None => {
            info!("sheet boundary is degenerate, continuing unrectified");
            Rectified {
                image: img.clone(),
                quad: None,
            }
        }
    }
}

/// Looks for the sheet boundary among the largest external contours of the
/// edge map: the first of the top five (by enclosed area) that simplifies to
/// exactly four vertices.
#[time]
pub fn find_sheet_boundary(img: &GrayImage) -> Option<Quad> {
    let blurred = gaussian_blur_f32(img, EDGE_BLUR_SIGMA);
    let edges = canny(&blurred, CANNY_LOW_THRESHOLD, CANNY_HIGH_THRESHOLD);

    let contours = find_contours::<i32>(&edges);
    let mut candidates = contours
        .iter()
        .filter(|contour| contour.border_type == BorderType::Outer)
        .map(|contour| (contour_area(&contour.points), contour))
        .collect::<Vec<(f64, &Contour<i32>)>>();
    candidates.sort_by(|(a, _), (b, _)| b.partial_cmp(a).expect("finite contour areas"));

    for (_, contour) in candidates.iter().take(BOUNDARY_CANDIDATES) {
        let perimeter = arc_length(&contour.points, true);
        let polygon =
            approximate_polygon_dp(&contour.points, POLY_APPROX_EPSILON * perimeter, true);
        if polygon.len() == 4 {
            let corners = [
                Point::new(polygon[0].x as f32, polygon[0].y as f32),
                Point::new(polygon[1].x as f32, polygon[1].y as f32),
                Point::new(polygon[2].x as f32, polygon[2].y as f32),
                Point::new(polygon[3].x as f32, polygon[3].y as f32),
            ];
            return Some(Quad::from_unordered(corners));
        }
    }

    None
}

/// Resamples the region bounded by `quad` into an axis-aligned rectangle
/// sized from the quadrilateral's longer opposing edges. Returns `None` when
/// the corners are collinear and no planar homography exists.
pub fn warp_quad_to_rect(img: &GrayImage, quad: &Quad) -> Option<GrayImage> {
    let (width, height) = quad.target_size();
    let destination = [
        (0.0, 0.0),
        (width as f32 - 1.0, 0.0),
        (width as f32 - 1.0, height as f32 - 1.0),
        (0.0, height as f32 - 1.0),
    ];

    let projection = Projection::from_control_points(quad.control_points(), destination)?;

    let mut warped = GrayImage::new(width, height);
    warp_into(img, &projection, Interpolation::Bilinear, WHITE, &mut warped);
    Some(warped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn uniform_image_passes_through_unrectified() {
        let img = GrayImage::from_pixel(64, 64, Luma([128]));
        let rectified = rectify_sheet(&img);
        assert!(rectified.quad.is_none());
        assert_eq!(rectified.image, img);
    }

    #[test]
    fn warp_of_axis_aligned_quad_preserves_content() {
        // Left half dark, right half bright.
        let img = GrayImage::from_fn(100, 80, |x, _| {
            if x < 50 {
                Luma([10])
            } else {
                Luma([240])
            }
        });
        let quad = Quad {
            top_left: Point::new(0.0, 0.0),
            top_right: Point::new(99.0, 0.0),
            bottom_right: Point::new(99.0, 79.0),
            bottom_left: Point::new(0.0, 79.0),
        };

        let warped = warp_quad_to_rect(&img, &quad).expect("non-degenerate quad");
        assert_eq!(warped.dimensions(), (99, 79));
        assert_eq!(warped.get_pixel(10, 40), &Luma([10]));
        assert_eq!(warped.get_pixel(90, 40), &Luma([240]));
    }

    #[test]
    fn warp_of_collinear_corners_is_rejected() {
        let img = GrayImage::new(50, 50);
        let quad = Quad {
            top_left: Point::new(0.0, 0.0),
            top_right: Point::new(10.0, 10.0),
            bottom_right: Point::new(20.0, 20.0),
            bottom_left: Point::new(30.0, 30.0),
        };
        assert!(warp_quad_to_rect(&img, &quad).is_none());
    }

    #[test]
    fn rectifies_an_axis_aligned_sheet_up_to_resampling() {
        // A bright sheet on a dark background, already axis-aligned.
        let img = GrayImage::from_fn(200, 160, |x, y| {
            if (20..180).contains(&x) && (20..140).contains(&y) {
                Luma([230])
            } else {
                Luma([20])
            }
        });

        let rectified = rectify_sheet(&img);
        assert!(rectified.quad.is_some());

        let (width, height) = rectified.image.dimensions();
        assert!((155..=165).contains(&width), "width was {width}");
        assert!((115..=125).contains(&height), "height was {height}");

        // The content should be the sheet interior, i.e. almost all bright.
        let bright = rectified
            .image
            .pixels()
            .filter(|p| p.0[0] > 200)
            .count() as f64;
        let total = (width * height) as f64;
        assert!(bright / total > 0.95, "bright ratio was {}", bright / total);
    }
}
