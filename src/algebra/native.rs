use super::{
    canny, components, contours, convert, CannyParams, CenterInit, ColorConversion,
    ConnectedComponents, ContourApprox, Contours, DrawStyle, ImageAlgebra, RetrievalMode,
    TermCriteria,
};
use crate::{
    kmeans::{self, KmeansOptions},
    Channels, ClusterCount, ClusterResult, Image, PrimitiveError, SampleMatrix,
};
use image::GrayImage;
use tracing::trace;

/// The bundled pure Rust [`ImageAlgebra`] backend.
///
/// # Examples
/// ```
/// # use segmette::{algebra::{ColorConversion, ImageAlgebra}, Image, NativeAlgebra};
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let red = Image::filled(2, 2, &[255, 0, 0])?;
/// let gray = NativeAlgebra::new().convert_color(&red, ColorConversion::ToGray)?;
/// assert_eq!(gray.as_raw(), [76; 4]);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NativeAlgebra {
    /// The clustering seed. A fresh one is drawn for every call if `None`.
    seed: Option<u64>,
    /// Whether to cluster in parallel.
    parallel: bool,
}

impl NativeAlgebra {
    /// Creates a backend that clusters with a fresh random seed on every call.
    #[must_use]
    pub const fn new() -> Self {
        Self { seed: None, parallel: false }
    }

    /// Makes clustering reproducible by always using `seed`.
    #[must_use]
    pub const fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Runs the k-means assignment step across the [`rayon`] thread pool.
    ///
    /// Results are identical to the single-threaded ones.
    #[cfg(feature = "threads")]
    #[must_use]
    pub const fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }
}

/// Fails for images without pixels.
fn non_empty(image: &Image, primitive: &'static str) -> Result<(), PrimitiveError> {
    if image.is_empty() {
        Err(PrimitiveError::EmptyInput { primitive })
    } else {
        Ok(())
    }
}

/// Borrows a non-empty single-channel [`Image`] as an owned [`GrayImage`].
fn gray_image(image: &Image, primitive: &'static str) -> Result<GrayImage, PrimitiveError> {
    non_empty(image, primitive)?;
    if image.channels() != Channels::Gray {
        return Err(PrimitiveError::UnsupportedChannels {
            primitive,
            channels: image.channels().count(),
        });
    }
    GrayImage::from_raw(image.width(), image.height(), image.as_raw().to_vec())
        .ok_or(PrimitiveError::OutputShape { primitive })
}

/// Converts a normalized component to 8 bits, saturating out of range values.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn to_u8(v: f32) -> u8 {
    (v * 255.0).round().clamp(0.0, 255.0) as u8
}

impl ImageAlgebra for NativeAlgebra {
    fn convert_color(
        &self,
        image: &Image,
        conversion: ColorConversion,
    ) -> Result<Image, PrimitiveError> {
        non_empty(image, "convert_color")?;
        Ok(convert::convert(image, conversion))
    }

    fn detect_edges(&self, gray: &Image, params: CannyParams) -> Result<Image, PrimitiveError> {
        non_empty(gray, "detect_edges")?;
        if gray.channels() != Channels::Gray {
            return Err(PrimitiveError::UnsupportedChannels {
                primitive: "detect_edges",
                channels: gray.channels().count(),
            });
        }
        if params.aperture != 3 {
            return Err(PrimitiveError::UnsupportedAperture(params.aperture));
        }
        Ok(canny::canny(gray, params))
    }

    fn find_contours(
        &self,
        binary: &Image,
        mode: RetrievalMode,
        approx: ContourApprox,
    ) -> Result<Contours, PrimitiveError> {
        let binary = gray_image(binary, "find_contours")?;
        Ok(contours::find(&binary, mode, approx))
    }

    fn draw_contours(
        &self,
        image: &mut Image,
        contours: &Contours,
        index: Option<usize>,
        style: &DrawStyle,
    ) -> Result<(), PrimitiveError> {
        if let Some(index) = index {
            if index >= contours.len() {
                return Err(PrimitiveError::ContourIndex { index, len: contours.len() });
            }
        }
        contours::draw(image, contours, index, style);
        Ok(())
    }

    fn label_components(&self, binary: &Image) -> Result<ConnectedComponents, PrimitiveError> {
        let binary = gray_image(binary, "label_components")?;
        components::label(&binary)
    }

    fn cluster(
        &self,
        samples: &SampleMatrix,
        k: ClusterCount,
        criteria: TermCriteria,
        attempts: u32,
        init: CenterInit,
    ) -> Result<ClusterResult, PrimitiveError> {
        let seed = self.seed.unwrap_or_else(rand::random);
        let options = KmeansOptions::new()
            .criteria(criteria)
            .attempts(attempts)
            .init(init)
            .seed(seed);

        #[cfg(feature = "threads")]
        let clustering = if self.parallel {
            kmeans::cluster_par(samples, k, &options)
        } else {
            kmeans::cluster(samples, k, &options)
        }?;

        #[cfg(not(feature = "threads"))]
        let clustering = kmeans::cluster(samples, k, &options)?;

        trace!(
            seed,
            iterations = clustering.iterations,
            compactness = clustering.compactness,
            "clustered samples"
        );

        Ok(ClusterResult {
            labels: clustering.labels,
            centers: clustering.centers.iter().map(|c| c.map(to_u8)).collect(),
        })
    }
}
