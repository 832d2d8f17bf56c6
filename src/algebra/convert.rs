//! Channel layout conversion.

use super::ColorConversion;
use crate::{Channels, Image};

/// Fixed-point weights for BT.601 luma with 14 fractional bits.
const LUMA_WEIGHTS: [u32; 3] = [4899, 9617, 1868];

/// The number of fractional bits of [`LUMA_WEIGHTS`].
const LUMA_SHIFT: u32 = 14;

/// Computes the 8-bit luma of an RGB pixel, rounding to nearest.
#[inline]
#[allow(clippy::cast_possible_truncation)]
pub(super) fn luma([r, g, b]: [u8; 3]) -> u8 {
    let [wr, wg, wb] = LUMA_WEIGHTS;
    let sum = wr * u32::from(r) + wg * u32::from(g) + wb * u32::from(b);
    // the weights sum to 1 << LUMA_SHIFT, so the result is at most 255
    ((sum + (1 << (LUMA_SHIFT - 1))) >> LUMA_SHIFT) as u8
}

/// Converts `image` to the layout requested by `conversion`.
pub(super) fn convert(image: &Image, conversion: ColorConversion) -> Image {
    let (width, height) = image.dimensions();
    let (channels, data): (_, Vec<u8>) = match (conversion, image.channels()) {
        (ColorConversion::ToGray, Channels::Gray) | (ColorConversion::ToRgb, Channels::Rgb) => {
            return image.clone();
        }
        (ColorConversion::ToGray, Channels::Rgb | Channels::Rgba) => (
            Channels::Gray,
            image.pixels().map(|p| luma([p[0], p[1], p[2]])).collect(),
        ),
        (ColorConversion::ToRgb, Channels::Gray) => (
            Channels::Rgb,
            image.as_raw().iter().flat_map(|&v| [v; 3]).collect(),
        ),
        (ColorConversion::ToRgb, Channels::Rgba) => (
            Channels::Rgb,
            image.pixels().flat_map(|p| [p[0], p[1], p[2]]).collect(),
        ),
    };

    Image::new_unchecked(width, height, channels, data)
}
