use image::GrayImage;
use imageproc::distance_transform::Norm;
use imageproc::filter::gaussian_blur_f32;
use imageproc::morphology::open;
use logging_timer::time;

use crate::image_utils::{BLACK, WHITE};

/// Sigma for the pre-threshold smoothing that suppresses sensor noise.
const SMOOTHING_SIGMA: f32 = 1.0;

/// Global intensity cutoff separating ink from paper. Assumes consistent
/// print/scan contrast; recalibrate via `--ink-threshold` when that does not
/// hold.
pub const DEFAULT_INK_THRESHOLD: u8 = 150;

/// Converts a rectified grayscale sheet to a denoised binary mask with ink
/// as white foreground. The opening pass removes speckle noise smaller than
/// its 3x3 kernel while preserving bubble-sized blobs.
#[time]
pub fn binarize(img: &GrayImage, ink_threshold: u8) -> GrayImage {
    let blurred = gaussian_blur_f32(img, SMOOTHING_SIGMA);

    let mut mask = GrayImage::new(img.width(), img.height());
    for (x, y, pixel) in blurred.enumerate_pixels() {
        let foreground = pixel.0[0] <= ink_threshold;
        mask.put_pixel(x, y, if foreground { WHITE } else { BLACK });
    }

    open(&mask, Norm::LInf, 1)
}
