//! Tensor conversion: cast, batch, resize and normalize

use imageproc::image::RgbImage;
use tract_tensorflow::prelude::*;

use super::Preprocess;

/// Where an output row or column samples the source image
#[derive(Debug, Clone, Copy, PartialEq)]
struct Sample {
    lo: u32,
    hi: u32,
    frac: f32,
}

/// Source positions for bilinear resize without corner alignment or half
/// pixel centers: output `i` reads source `i * input / output`, blending the
/// pixel at `floor` with its successor clamped to the last pixel.
fn samples(input: u32, output: u32) -> Vec<Sample> {
    let scale = input as f32 / output as f32;
    let last = input - 1;

    (0..output)
        .map(|i| {
            let src = i as f32 * scale;
            let floor = src.floor();
            let lo = (floor as u32).min(last);
            Sample {
                lo,
                hi: (lo + 1).min(last),
                frac: src - floor,
            }
        })
        .collect()
}

/// Build the `[1, height, width, 3]` input tensor holding `(v - mean) / scale`
/// for every channel value `v` of the bilinearly resized image.
///
/// The image must not be empty.
pub fn to_tensor(img: RgbImage, params: &Preprocess) -> Tensor {
    let rows = samples(img.height(), params.height);
    let cols = samples(img.width(), params.width);
    let value = |x: u32, y: u32, c: usize| img.get_pixel(x, y)[c] as f32;

    let (height, width) = (params.height as usize, params.width as usize);
    tract_ndarray::Array4::from_shape_fn((1, height, width, 3), |(_, y, x, c)| {
        let (row, col) = (rows[y], cols[x]);

        let top_left = value(col.lo, row.lo, c);
        let top = top_left + (value(col.hi, row.lo, c) - top_left) * col.frac;
        let bottom_left = value(col.lo, row.hi, c);
        let bottom = bottom_left + (value(col.hi, row.hi, c) - bottom_left) * col.frac;
        let resized = top + (bottom - top) * row.frac;

        (resized - params.mean) / params.scale
    })
    .into()
}
