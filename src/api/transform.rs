//! The single-stage pipelines.
//!
//! Every pipeline checks the destination first, computes its result into buffers it owns,
//! and assigns the destination as its very last step.

use super::{check_destination, Options, PipelineOutput};
use crate::{
    algebra::{
        CannyParams, CenterInit, ColorConversion, ContourApprox, DrawStyle, ImageAlgebra,
        RetrievalMode, TermCriteria,
    },
    extract_palette, from_cluster_result, paint, to_samples, Channels, ClusterCount, Image,
    Palette, PipelineError, PrimitiveError,
};
use palette::Srgb;
use tracing::debug;

/// The color of the lines drawn by [`contours`].
pub(super) const CONTOUR_COLOR: Srgb<u8> = Srgb::new(0, 255, 0);

/// How many nested contour levels get drawn.
pub(super) const MAX_CONTOUR_DEPTH: u32 = 100;

/// Stop after 10 iterations or once centers move by at most `1.0`.
const KMEANS_CRITERIA: TermCriteria = TermCriteria::new(10, 1.0);

/// Checks the shape of a finished result, then moves it into `destination`.
pub(super) fn commit(
    destination: &mut Image,
    result: Image,
    primitive: &'static str,
) -> Result<(), PrimitiveError> {
    if result.dimensions() != destination.dimensions() || result.channels() != Channels::Rgb {
        return Err(PrimitiveError::OutputShape { primitive });
    }
    *destination = result;
    Ok(())
}

/// Computes the Canny edge map of `source` with the fixed thresholds.
pub(super) fn edge_map<A: ImageAlgebra + ?Sized>(
    algebra: &A,
    source: &Image,
) -> Result<Image, PrimitiveError> {
    let gray = algebra.convert_color(source, ColorConversion::ToGray)?;
    algebra.detect_edges(&gray, CannyParams::STANDARD)
}

/// Draws the two-level contours of the edges of `edges_of` onto `canvas`.
pub(super) fn outline<A: ImageAlgebra + ?Sized>(
    algebra: &A,
    edges_of: &Image,
    mut canvas: Image,
    color: Srgb<u8>,
) -> Result<Image, PrimitiveError> {
    let edges = edge_map(algebra, edges_of)?;
    let found = algebra.find_contours(&edges, RetrievalMode::TwoLevel, ContourApprox::Simple)?;
    debug!(contours = found.len(), "found contours");

    let style = DrawStyle::new(color).max_depth(MAX_CONTOUR_DEPTH);
    algebra.draw_contours(&mut canvas, &found, None, &style)?;
    Ok(canvas)
}

/// Posterizes `source` to `k` colors, returning the image and its palette.
pub(super) fn quantize<A: ImageAlgebra + ?Sized>(
    algebra: &A,
    source: &Image,
    k: ClusterCount,
) -> Result<(Image, Palette), PipelineError> {
    let samples = to_samples(source)?;
    let result = algebra.cluster(&samples, k, KMEANS_CRITERIA, 1, CenterInit::Random)?;
    if result.centers.len() != k.as_usize() {
        return Err(PrimitiveError::OutputShape { primitive: "cluster" }.into());
    }
    debug!(%k, "clustered pixels");

    let (width, height) = source.dimensions();
    let image = from_cluster_result(&result, width, height)?;
    Ok((image, extract_palette(&result.centers)))
}

/// Labels the regions bounded by the edges of `source` and paints them in random colors.
///
/// Returns the painted image and the label count.
pub(super) fn label_regions<A: ImageAlgebra + ?Sized>(
    algebra: &A,
    source: &Image,
    options: &Options,
) -> Result<(Image, u32), PipelineError> {
    let edges = edge_map(algebra, source)?;
    let components = algebra.label_components(&edges)?;
    if (components.labels.width(), components.labels.height()) != source.dimensions() {
        return Err(PrimitiveError::OutputShape { primitive: "label_components" }.into());
    }

    let count = components.count();
    debug!(components = count, "labeled regions");

    let table = options.colorizer().generate(count as usize);
    let (width, height) = source.dimensions();
    let mut painted = Image::new(width, height, Channels::Rgb);
    paint(&components.labels, &table, &mut painted)?;
    Ok((painted, count))
}

/// Converts `source` to grayscale, replicated over the three destination channels.
///
/// # Errors
/// Fails if `destination` is not a 3-channel image of the source's size or if a
/// primitive fails. `destination` is left unmodified on error.
pub fn grayscale<A: ImageAlgebra + ?Sized>(
    algebra: &A,
    source: &Image,
    destination: &mut Image,
    _options: &Options,
) -> Result<PipelineOutput, PipelineError> {
    check_destination(source, destination)?;
    let gray = algebra.convert_color(source, ColorConversion::ToGray)?;
    let rgb = algebra.convert_color(&gray, ColorConversion::ToRgb)?;
    commit(destination, rgb, "convert_color")?;
    Ok(PipelineOutput::default())
}

/// Writes the Canny edge map of `source` (low 50, high 100, 3×3 aperture, L1 gradient).
///
/// # Errors
/// See [`grayscale`].
pub fn canny_edges<A: ImageAlgebra + ?Sized>(
    algebra: &A,
    source: &Image,
    destination: &mut Image,
    _options: &Options,
) -> Result<PipelineOutput, PipelineError> {
    check_destination(source, destination)?;
    let edges = edge_map(algebra, source)?;
    let rgb = algebra.convert_color(&edges, ColorConversion::ToRgb)?;
    commit(destination, rgb, "convert_color")?;
    Ok(PipelineOutput::default())
}

/// Draws the contours of the edge regions of `source` in green on top of `destination`.
///
/// Outer borders and holes are retrieved, and nesting is drawn up to 100 levels deep.
///
/// # Errors
/// See [`grayscale`].
pub fn contours<A: ImageAlgebra + ?Sized>(
    algebra: &A,
    source: &Image,
    destination: &mut Image,
    _options: &Options,
) -> Result<PipelineOutput, PipelineError> {
    check_destination(source, destination)?;
    let drawn = outline(algebra, source, destination.clone(), CONTOUR_COLOR)?;
    commit(destination, drawn, "draw_contours")?;
    Ok(PipelineOutput::default())
}

/// Posterizes `source` to [`Options::k`] colors with randomly initialized k-means.
///
/// Returns the palette, where `colors[i]` is the color of every pixel of cluster `i`.
///
/// # Errors
/// See [`grayscale`]. Clustering fails if the image has fewer pixels than clusters.
pub fn kmeans_quantize<A: ImageAlgebra + ?Sized>(
    algebra: &A,
    source: &Image,
    destination: &mut Image,
    options: &Options,
) -> Result<PipelineOutput, PipelineError> {
    check_destination(source, destination)?;
    let (quantized, palette) = quantize(algebra, source, options.k)?;
    commit(destination, quantized, "cluster")?;
    Ok(PipelineOutput { colors: Some(palette), components: None })
}

/// Paints the connected regions of the edge map of `source`.
///
/// Label `0`, the non-edge background, is black; every other label gets a random color.
///
/// # Errors
/// See [`grayscale`].
pub fn ccl<A: ImageAlgebra + ?Sized>(
    algebra: &A,
    source: &Image,
    destination: &mut Image,
    options: &Options,
) -> Result<PipelineOutput, PipelineError> {
    check_destination(source, destination)?;
    let (painted, count) = label_regions(algebra, source, options)?;
    commit(destination, painted, "label_components")?;
    Ok(PipelineOutput { colors: None, components: Some(count) })
}
