//! Contains the pipeline functions, their options, and the operation registry.

mod composite;
mod registry;
mod transform;

pub use composite::{quantize_then_ccl, quantize_then_contours};
pub use registry::{run, run_operation, Pipeline};
pub use transform::{canny_edges, ccl, contours, grayscale, kmeans_quantize};

use crate::{Channels, ClusterCount, Error, Image, InputError, LabelColorizer, Palette};
use std::{
    fmt::{self, Display},
    str::FromStr,
};

/// A builder struct to specify the per call options of a pipeline.
///
/// # Examples
/// ```
/// # use segmette::{ClusterCount, Options};
/// let options = Options::new()
///     .k(ClusterCount::try_from(15u16).unwrap())
///     .seed(42);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Options {
    /// The number of clusters for quantization based operations.
    pub(crate) k: ClusterCount,
    /// The seed for label colors.
    pub(crate) seed: Option<u64>,
}

impl Options {
    /// Creates a new [`Options`] with default values.
    #[must_use]
    pub const fn new() -> Self {
        Self { k: ClusterCount::DEFAULT, seed: None }
    }

    /// Sets the number of clusters for `kmeans` and `combined_ccl`.
    ///
    /// The default is `8`. `combined_contours` always uses `5`.
    #[must_use]
    pub const fn k(mut self, k: ClusterCount) -> Self {
        self.k = k;
        self
    }

    /// Makes the label colors of `ccl` and `combined_ccl` reproducible.
    ///
    /// By default, every call paints components with fresh random colors.
    #[must_use]
    pub const fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Gets the number of clusters.
    #[must_use]
    pub const fn cluster_count(&self) -> ClusterCount {
        self.k
    }

    /// The colorizer for one call.
    fn colorizer(&self) -> LabelColorizer {
        self.seed.map_or_else(LabelColorizer::new, LabelColorizer::seeded)
    }
}

/// What a pipeline reports besides the image it writes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PipelineOutput {
    /// The quantization palette, for `kmeans` and `combined_ccl`.
    pub colors: Option<Palette>,
    /// The number of labels painted, background included, for `ccl` and `combined_ccl`.
    pub components: Option<u32>,
}

/// The registered operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// `grayscale`: luma replicated over three channels.
    Grayscale,
    /// `canny`: the Canny edge map.
    Canny,
    /// `contours`: region borders drawn in green.
    Contours,
    /// `kmeans`: the image posterized to `k` colors.
    Kmeans,
    /// `combined_contours`: a 5 color posterization with black region outlines.
    CombinedContours,
    /// `ccl`: connected edge regions painted in random colors.
    Ccl,
    /// `combined_ccl`: `ccl` applied to a `k` color posterization.
    CombinedCcl,
}

impl Operation {
    /// Every operation, in registry order.
    pub const ALL: [Self; 7] = [
        Self::Grayscale,
        Self::Canny,
        Self::Contours,
        Self::Kmeans,
        Self::CombinedContours,
        Self::Ccl,
        Self::CombinedCcl,
    ];

    /// The identifier the operation is registered under.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Grayscale => "grayscale",
            Self::Canny => "canny",
            Self::Contours => "contours",
            Self::Kmeans => "kmeans",
            Self::CombinedContours => "combined_contours",
            Self::Ccl => "ccl",
            Self::CombinedCcl => "combined_ccl",
        }
    }
}

impl Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Operation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|op| op.name() == s)
            .ok_or_else(|| Error::UnknownOperation(s.to_owned()))
    }
}

/// Checks that `source` has pixels and that `destination` is a 3-channel image of its size.
fn check_destination(source: &Image, destination: &Image) -> Result<(), InputError> {
    if source.is_empty() {
        return Err(InputError::EmptyImage);
    }
    if destination.dimensions() != source.dimensions() || destination.channels() != Channels::Rgb {
        return Err(InputError::DestinationMismatch {
            expected: source.dimensions(),
            actual: destination.dimensions(),
            channels: destination.channels().count(),
        });
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::tests::solid;

    #[test]
    fn names_round_trip() {
        for op in Operation::ALL {
            assert_eq!(op.name().parse::<Operation>().unwrap(), op);
            assert_eq!(op.to_string(), op.name());
        }
        assert_eq!(
            "Grayscale".parse::<Operation>(),
            Err(Error::UnknownOperation("Grayscale".to_owned()))
        );
    }

    #[test]
    fn destination_must_match_source() {
        let source = solid(4, 3, [1, 2, 3]);
        assert_eq!(check_destination(&source, &Image::new(4, 3, Channels::Rgb)), Ok(()));
        assert_eq!(
            check_destination(&source, &Image::new(3, 4, Channels::Rgb)),
            Err(InputError::DestinationMismatch { expected: (4, 3), actual: (3, 4), channels: 3 })
        );
        assert_eq!(
            check_destination(&source, &Image::new(4, 3, Channels::Rgba)),
            Err(InputError::DestinationMismatch { expected: (4, 3), actual: (4, 3), channels: 4 })
        );
        let empty = Image::new(0, 3, Channels::Rgb);
        assert_eq!(check_destination(&empty, &empty.clone()), Err(InputError::EmptyImage));
    }

    #[test]
    fn options_defaults() {
        let options = Options::new();
        assert_eq!(options, Options::default());
        assert_eq!(options.cluster_count().get(), 8);
        assert_eq!(options.seed, None);
        assert_eq!(
            Options::new().seed(3).colorizer().generate(10),
            LabelColorizer::seeded(3).generate(10)
        );
    }
}
