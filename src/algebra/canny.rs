//! Canny edge detection on 8-bit single-channel images.
//!
//! - 3×3 Sobel derivatives with border clamping.
//! - L1 (`|gx| + |gy|`) or L2 gradient magnitude.
//! - Non-maximum suppression along the gradient direction quantized to four sectors.
//! - Double threshold, then hysteresis: weak pixels survive only if 8-connected to a
//!   strong one.
//!
//! The output holds `255` for edge pixels and `0` elsewhere.

use super::CannyParams;
use crate::{Channels, Image};

type Kernel3 = [[i32; 3]; 3];

const SOBEL_KERNEL_X: Kernel3 = [[-1, 0, 1], [-2, 0, 2], [-1, 0, 1]];
const SOBEL_KERNEL_Y: Kernel3 = [[-1, -2, -1], [0, 0, 0], [1, 2, 1]];

const TAN_22_5_DEG: f32 = 0.41421356;
const TAN_67_5_DEG: f32 = 2.41421356;

/// Per pixel classification after non-maximum suppression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Class {
    /// Not an edge.
    None,
    /// A local maximum between the two thresholds.
    Weak,
    /// A local maximum above the high threshold, or a weak pixel reached by hysteresis.
    Strong,
}

/// Computes Sobel derivatives with border clamping.
fn sobel(data: &[u8], w: usize, h: usize) -> (Vec<i32>, Vec<i32>) {
    let mut gx = vec![0; w * h];
    let mut gy = vec![0; w * h];

    for y in 0..h {
        let rows = [y.saturating_sub(1), y, (y + 1).min(h - 1)].map(|r| &data[r * w..(r + 1) * w]);
        for x in 0..w {
            let cols = [x.saturating_sub(1), x, (x + 1).min(w - 1)];

            let mut sum_x = 0;
            let mut sum_y = 0;
            for (ky, row) in rows.iter().enumerate() {
                for (kx, &col) in cols.iter().enumerate() {
                    let v = i32::from(row[col]);
                    sum_x += v * SOBEL_KERNEL_X[ky][kx];
                    sum_y += v * SOBEL_KERNEL_Y[ky][kx];
                }
            }

            gx[y * w + x] = sum_x;
            gy[y * w + x] = sum_y;
        }
    }

    (gx, gy)
}

/// Detects edges in `gray`, which must be a non-empty single-channel image.
#[allow(clippy::cast_precision_loss)]
pub(super) fn canny(gray: &Image, params: CannyParams) -> Image {
    debug_assert_eq!(gray.channels(), Channels::Gray);

    let (width, height) = gray.dimensions();
    let (w, h) = (width as usize, height as usize);
    let (low, high) = if params.low > params.high {
        (params.high, params.low)
    } else {
        (params.low, params.high)
    };

    let (gx, gy) = sobel(gray.as_raw(), w, h);

    // padded by one pixel of zero magnitude on every side
    let stride = w + 2;
    let mut mag = vec![0.0f32; stride * (h + 2)];
    for y in 0..h {
        for x in 0..w {
            let (dx, dy) = (gx[y * w + x] as f32, gy[y * w + x] as f32);
            mag[(y + 1) * stride + x + 1] = if params.l2_gradient {
                dx.hypot(dy)
            } else {
                dx.abs() + dy.abs()
            };
        }
    }

    let mut class = vec![Class::None; stride * (h + 2)];
    let mut stack = Vec::new();
    for y in 0..h {
        for x in 0..w {
            let i = (y + 1) * stride + x + 1;
            let m = mag[i];
            if m <= low {
                continue;
            }

            let (dx, dy) = (gx[y * w + x], gy[y * w + x]);
            let (abs_gx, abs_gy) = (dx.abs() as f32, dy.abs() as f32);

            let is_max = if abs_gy < abs_gx * TAN_22_5_DEG {
                m > mag[i - 1] && m >= mag[i + 1]
            } else if abs_gy > abs_gx * TAN_67_5_DEG {
                m > mag[i - stride] && m >= mag[i + stride]
            } else if (dx < 0) == (dy < 0) {
                m > mag[i - stride - 1] && m > mag[i + stride + 1]
            } else {
                m > mag[i - stride + 1] && m > mag[i + stride - 1]
            };

            if is_max {
                if m > high {
                    class[i] = Class::Strong;
                    stack.push(i);
                } else {
                    class[i] = Class::Weak;
                }
            }
        }
    }

    // the padding ring is never Weak, so neighbor indices stay in bounds
    while let Some(i) = stack.pop() {
        for j in [
            i - stride - 1,
            i - stride,
            i - stride + 1,
            i - 1,
            i + 1,
            i + stride - 1,
            i + stride,
            i + stride + 1,
        ] {
            if class[j] == Class::Weak {
                class[j] = Class::Strong;
                stack.push(j);
            }
        }
    }

    let mut edges = Vec::with_capacity(w * h);
    for y in 0..h {
        let row = &class[(y + 1) * stride + 1..(y + 1) * stride + 1 + w];
        edges.extend(row.iter().map(|&c| if c == Class::Strong { 255 } else { 0 }));
    }

    Image::new_unchecked(width, height, Channels::Gray, edges)
}
