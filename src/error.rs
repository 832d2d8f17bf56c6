//! Error types for pipelines and image algebra primitives.

use crate::{Operation, MAX_CLUSTERS};
use thiserror::Error;

/// An input that a pipeline or the buffer marshaller cannot work with.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    /// The image has no pixels.
    #[error("image has no pixels")]
    EmptyImage,

    /// A raw buffer does not match the stated dimensions.
    #[error("buffer holds {actual} bytes, expected {expected}")]
    BufferLength {
        /// The number of bytes implied by the dimensions.
        expected: usize,
        /// The number of bytes supplied.
        actual: usize,
    },

    /// A pixel of an unsupported size was given.
    #[error("unsupported channel count {0}")]
    Channels(usize),

    /// The destination is not a 3-channel image of the source's size.
    #[error(
        "destination is {}x{} with {channels} channels, expected {}x{} with 3 channels",
        .actual.0, .actual.1, .expected.0, .expected.1
    )]
    DestinationMismatch {
        /// The source dimensions.
        expected: (u32, u32),
        /// The destination dimensions.
        actual: (u32, u32),
        /// The destination channel count.
        channels: usize,
    },

    /// A label array does not have one entry per pixel.
    #[error("expected {expected} labels, got {actual}")]
    LabelCount {
        /// `width * height`
        expected: usize,
        /// The number of labels supplied.
        actual: usize,
    },

    /// A label does not index into the color list it is reconstructed from.
    #[error("label {label} at pixel {pixel} is out of range for {colors} colors")]
    LabelOutOfRange {
        /// The offending pixel index.
        pixel: usize,
        /// The offending label.
        label: u32,
        /// The number of available colors.
        colors: usize,
    },

    /// A color table does not have one entry per label.
    #[error("color table has {colors} entries for {labels} labels")]
    ColorTableSize {
        /// The number of labels in the label map.
        labels: u32,
        /// The number of colors in the table.
        colors: usize,
    },

    /// The requested number of clusters is outside `1..=MAX_CLUSTERS`.
    #[error("cluster count must be in 1..={max}, got {0}", max = MAX_CLUSTERS)]
    ClusterCount(u32),
}

/// A failure raised by an [`ImageAlgebra`](crate::algebra::ImageAlgebra) primitive.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PrimitiveError {
    /// The primitive was given an image with no pixels.
    #[error("{primitive}: empty input")]
    EmptyInput {
        /// The name of the failing primitive.
        primitive: &'static str,
    },

    /// The primitive does not accept this pixel layout.
    #[error("{primitive}: unsupported input with {channels} channels")]
    UnsupportedChannels {
        /// The name of the failing primitive.
        primitive: &'static str,
        /// The channel count of the input.
        channels: usize,
    },

    /// The edge detector only supports the 3x3 Sobel aperture.
    #[error("detect_edges: unsupported aperture size {0}")]
    UnsupportedAperture(u8),

    /// Clustering needs at least as many samples as clusters.
    #[error("cluster: {samples} samples cannot form {k} clusters")]
    TooFewSamples {
        /// The number of samples.
        samples: usize,
        /// The requested number of clusters.
        k: u16,
    },

    /// A contour index does not exist.
    #[error("draw_contours: contour {index} out of range for {len} contours")]
    ContourIndex {
        /// The requested contour index.
        index: usize,
        /// The number of contours.
        len: usize,
    },

    /// The primitive returned a buffer of the wrong shape.
    #[error("{primitive}: output does not match the input dimensions")]
    OutputShape {
        /// The name of the misbehaving primitive.
        primitive: &'static str,
    },
}

/// The error returned by a single pipeline function.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    /// The caller supplied an unusable image, destination, or label set.
    #[error("invalid input: {0}")]
    InvalidInput(#[from] InputError),

    /// An image algebra primitive failed.
    #[error("primitive failure: {0}")]
    Primitive(#[from] PrimitiveError),
}

/// The error returned by [`run`](crate::run) and [`run_operation`](crate::run_operation).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// The operation identifier is not registered.
    #[error("unknown operation `{0}`")]
    UnknownOperation(String),

    /// The pipeline for `operation` failed.
    #[error("{operation} failed: {source}")]
    Pipeline {
        /// The operation that was executing.
        operation: Operation,
        /// What went wrong.
        #[source]
        source: PipelineError,
    },
}

impl Error {
    /// Returns the operation that was executing, if the failure came from a pipeline.
    #[must_use]
    pub const fn operation(&self) -> Option<Operation> {
        match self {
            Error::UnknownOperation(_) => None,
            Error::Pipeline { operation, .. } => Some(*operation),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_operation() {
        let err = Error::Pipeline {
            operation: Operation::Kmeans,
            source: PrimitiveError::TooFewSamples { samples: 4, k: 8 }.into(),
        };
        assert_eq!(
            err.to_string(),
            "kmeans failed: primitive failure: cluster: 4 samples cannot form 8 clusters"
        );
        assert_eq!(err.operation(), Some(Operation::Kmeans));
        assert_eq!(Error::UnknownOperation("blur".into()).operation(), None);
    }

    #[test]
    fn destination_mismatch_message() {
        let err = InputError::DestinationMismatch { expected: (4, 3), actual: (3, 4), channels: 3 };
        assert_eq!(
            err.to_string(),
            "destination is 3x4 with 3 channels, expected 4x3 with 3 channels"
        );
    }
}
