//! Conversion between pixel buffers and the numeric forms the primitives work on.

use crate::{Channels, ClusterResult, Image, InputError, Palette, SampleMatrix};
use palette::{cast, cast::IntoComponents, Srgb};

/// Converts every pixel of `image` into a normalized `[r, g, b]` sample.
///
/// The first three channels are divided by `255` in their stored order; alpha is dropped
/// and a gray channel is replicated. No color space conversion takes place.
///
/// # Errors
/// Returns [`InputError::EmptyImage`] if the image has no pixels.
pub fn to_samples(image: &Image) -> Result<SampleMatrix, InputError> {
    if image.is_empty() {
        return Err(InputError::EmptyImage);
    }

    let normalize = |v: u8| f32::from(v) / 255.0;
    let samples = match image.channels() {
        Channels::Gray => image
            .as_raw()
            .iter()
            .map(|&v| [normalize(v); 3])
            .collect(),
        Channels::Rgb | Channels::Rgba => image
            .pixels()
            .map(|p| [normalize(p[0]), normalize(p[1]), normalize(p[2])])
            .collect(),
    };

    Ok(SampleMatrix::new(samples))
}

/// Checks that `labels` has one entry per pixel and that each entry indexes `colors`.
///
/// Nothing is written anywhere before every label has been checked.
fn check_labels(labels: &[u32], colors: usize, width: u32, height: u32) -> Result<(), InputError> {
    let expected = width as usize * height as usize;
    if labels.len() != expected {
        return Err(InputError::LabelCount { expected, actual: labels.len() });
    }

    match labels.iter().position(|&label| label as usize >= colors) {
        Some(pixel) => Err(InputError::LabelOutOfRange { pixel, label: labels[pixel], colors }),
        None => Ok(()),
    }
}

/// Builds a 3-channel image where pixel `i` takes the color `colors[labels[i]]`.
fn reconstruct(
    labels: &[u32],
    colors: &[Srgb<u8>],
    width: u32,
    height: u32,
) -> Result<Image, InputError> {
    check_labels(labels, colors.len(), width, height)?;

    let buf = labels
        .iter()
        .map(|&label| colors[label as usize])
        .collect::<Vec<_>>()
        .into_components();

    Ok(Image::new_unchecked(width, height, Channels::Rgb, buf))
}

/// Reconstructs an image from per-pixel cluster labels and the cluster centers.
///
/// # Errors
/// Returns [`InputError::LabelCount`] if there is not exactly one label per pixel and
/// [`InputError::LabelOutOfRange`] if a label does not index into `result.centers`.
pub fn from_cluster_result(
    result: &ClusterResult,
    width: u32,
    height: u32,
) -> Result<Image, InputError> {
    let centers = extract_palette(&result.centers);
    reconstruct(&result.labels, &centers, width, height)
}

/// Reconstructs an image from a label map and a color table.
///
/// # Errors
/// See [`from_cluster_result`].
pub fn from_label_map(
    labels: &[u32],
    table: &[Srgb<u8>],
    width: u32,
    height: u32,
) -> Result<Image, InputError> {
    reconstruct(labels, table, width, height)
}

/// Copies cluster centers into a [`Palette`], preserving their order.
#[must_use]
pub fn extract_palette(centers: &[[u8; 3]]) -> Palette {
    centers.iter().map(|&center| cast::from_array(center)).collect()
}
