//! Pipelines that posterize before segmenting.

use super::{
    check_destination,
    transform::{commit, label_regions, outline, quantize},
    Options, PipelineOutput,
};
use crate::{algebra::ImageAlgebra, ClusterCount, Image, PipelineError};
use palette::Srgb;

/// `combined_contours` always posterizes to this many colors.
const OUTLINED_COLORS: ClusterCount = ClusterCount::new_unchecked(5);

/// The color of the outlines drawn by [`quantize_then_contours`].
const OUTLINE_COLOR: Srgb<u8> = Srgb::new(0, 0, 0);

/// Posterizes `source` to 5 colors and outlines the resulting regions in black.
///
/// The outlines are traced on the posterized image, not on `source`.
///
/// # Errors
/// See [`grayscale`](super::grayscale). Clustering fails for images with fewer than 5 pixels.
pub fn quantize_then_contours<A: ImageAlgebra + ?Sized>(
    algebra: &A,
    source: &Image,
    destination: &mut Image,
    _options: &Options,
) -> Result<PipelineOutput, PipelineError> {
    check_destination(source, destination)?;
    let (quantized, _) = quantize(algebra, source, OUTLINED_COLORS)?;
    let outlined = outline(algebra, &quantized, quantized.clone(), OUTLINE_COLOR)?;
    commit(destination, outlined, "draw_contours")?;
    Ok(PipelineOutput::default())
}

/// Posterizes `source` to [`Options::k`] colors, then paints the connected edge regions
/// of the posterized image like [`ccl`](super::ccl).
///
/// The posterized image never reaches `destination`; only its palette is returned.
///
/// # Errors
/// See [`kmeans_quantize`](super::kmeans_quantize).
pub fn quantize_then_ccl<A: ImageAlgebra + ?Sized>(
    algebra: &A,
    source: &Image,
    destination: &mut Image,
    options: &Options,
) -> Result<PipelineOutput, PipelineError> {
    check_destination(source, destination)?;
    let (quantized, palette) = quantize(algebra, source, options.k)?;
    let (painted, count) = label_regions(algebra, &quantized, options)?;
    commit(destination, painted, "label_components")?;
    Ok(PipelineOutput { colors: Some(palette), components: Some(count) })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::{
        kmeans_quantize,
        tests::{quadrants, solid, CountingAlgebra},
        Channels, InputError, NativeAlgebra, PrimitiveError, BACKGROUND,
    };
    use std::collections::HashSet;

    fn rgb(width: u32, height: u32) -> Image {
        Image::new(width, height, Channels::Rgb)
    }

    #[test]
    fn combined_ccl_returns_the_quantization_palette() {
        let source = quadrants(16, 16);
        for k in [2u16, 5, 15] {
            let options = Options::new().k(ClusterCount::try_from(k).unwrap());

            let mut destination = rgb(16, 16);
            let combined =
                quantize_then_ccl(&NativeAlgebra::new(), &source, &mut destination, &options).unwrap();
            let palette = combined.colors.unwrap();
            assert_eq!(palette.len(), usize::from(k));
            assert!(combined.components.unwrap() >= 1);

            let algebra = NativeAlgebra::new().seed(u64::from(k));
            let standalone = kmeans_quantize(&algebra, &source, &mut rgb(16, 16), &options).unwrap();
            let combined =
                quantize_then_ccl(&algebra, &source, &mut rgb(16, 16), &options).unwrap();
            assert_eq!(combined.colors, standalone.colors);
        }
    }

    #[test]
    fn combined_ccl_paints_edge_regions() {
        let source = quadrants(12, 12);
        let options = Options::new().k(ClusterCount::try_from(4u16).unwrap()).seed(8);
        let mut destination = rgb(12, 12);
        let output =
            quantize_then_ccl(&NativeAlgebra::new().seed(2), &source, &mut destination, &options)
                .unwrap();

        let count = output.components.unwrap();
        let distinct = destination.pixels().map(|p| [p[0], p[1], p[2]]).collect::<HashSet<_>>();
        assert!(distinct.len() <= count as usize);
        assert_eq!(destination.pixel(0, 0), [BACKGROUND.red, BACKGROUND.green, BACKGROUND.blue]);
    }

    #[test]
    fn combined_contours_outlines_the_posterized_image() {
        let source = quadrants(12, 12);
        let algebra = NativeAlgebra::new().seed(4);

        let mut posterized = rgb(12, 12);
        let options = Options::new().k(OUTLINED_COLORS);
        let palette = kmeans_quantize(&algebra, &source, &mut posterized, &options)
            .unwrap()
            .colors
            .unwrap();

        let mut destination = rgb(12, 12);
        let output = quantize_then_contours(&algebra, &source, &mut destination, &Options::new())
            .unwrap();
        assert_eq!(output, PipelineOutput::default());

        let mut allowed = palette.iter().map(|c| [c.red, c.green, c.blue]).collect::<HashSet<_>>();
        allowed.insert([0, 0, 0]);
        assert!(destination.pixels().all(|p| allowed.contains(&[p[0], p[1], p[2]])));

        // every pixel either keeps its posterized color or is covered by an outline
        for (out, poster) in destination.pixels().zip(posterized.pixels()) {
            assert!(out == poster || out == [0, 0, 0]);
        }
    }

    #[test]
    fn combined_contours_needs_five_pixels() {
        let mut destination = solid(2, 2, [3, 3, 3]);
        let err = quantize_then_contours(
            &NativeAlgebra::new(),
            &solid(2, 2, [200, 0, 0]),
            &mut destination,
            &Options::new(),
        )
        .unwrap_err();
        assert_eq!(err, PrimitiveError::TooFewSamples { samples: 4, k: 5 }.into());
        assert!(destination.pixels().all(|p| p == [3, 3, 3]));
    }

    #[test]
    fn combined_stages_run_in_order() {
        let source = quadrants(8, 8);

        let algebra = CountingAlgebra::new();
        quantize_then_ccl(&algebra, &source, &mut rgb(8, 8), &Options::new()).unwrap();
        assert_eq!(
            algebra.calls(),
            ["cluster", "convert_color", "detect_edges", "label_components"]
        );

        let algebra = CountingAlgebra::new();
        quantize_then_contours(&algebra, &source, &mut rgb(8, 8), &Options::new()).unwrap();
        assert_eq!(
            algebra.calls(),
            ["cluster", "convert_color", "detect_edges", "find_contours", "draw_contours"]
        );
    }

    #[test]
    fn second_stage_failure_leaves_destination_untouched() {
        let source = quadrants(8, 8);
        let algebra = CountingAlgebra::failing("label_components");
        let mut destination = solid(8, 8, [1, 2, 3]);
        let err = quantize_then_ccl(&algebra, &source, &mut destination, &Options::new()).unwrap_err();

        assert_eq!(err, PrimitiveError::EmptyInput { primitive: "label_components" }.into());
        assert!(destination.pixels().all(|p| p == [1, 2, 3]));

        let mut small = rgb(8, 7);
        let err = quantize_then_contours(&algebra, &source, &mut small, &Options::new()).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::InvalidInput(InputError::DestinationMismatch { .. })
        ));
    }
}
