//! Dispatch from operation identifiers to pipeline functions.

use super::{
    canny_edges, ccl, contours, grayscale, kmeans_quantize, quantize_then_ccl,
    quantize_then_contours, Operation, Options, PipelineOutput,
};
use crate::{algebra::ImageAlgebra, Error, Image, PipelineError};
use tracing::{debug, debug_span};

/// The signature shared by every pipeline function.
pub type Pipeline<A> =
    fn(&A, &Image, &mut Image, &Options) -> Result<PipelineOutput, PipelineError>;

impl Operation {
    /// Returns the pipeline function registered for this operation.
    #[must_use]
    pub fn pipeline<A: ImageAlgebra + ?Sized>(self) -> Pipeline<A> {
        match self {
            Self::Grayscale => grayscale,
            Self::Canny => canny_edges,
            Self::Contours => contours,
            Self::Kmeans => kmeans_quantize,
            Self::CombinedContours => quantize_then_contours,
            Self::Ccl => ccl,
            Self::CombinedCcl => quantize_then_ccl,
        }
    }
}

/// Runs `operation` on `source`, writing the result into `destination`.
///
/// # Errors
/// Returns [`Error::Pipeline`] naming the operation if the pipeline fails.
/// `destination` is left unmodified in that case.
pub fn run_operation<A: ImageAlgebra + ?Sized>(
    algebra: &A,
    operation: Operation,
    source: &Image,
    destination: &mut Image,
    options: &Options,
) -> Result<PipelineOutput, Error> {
    let (width, height) = source.dimensions();
    let _span = debug_span!("pipeline", %operation, width, height).entered();

    let output = operation.pipeline::<A>()(algebra, source, destination, options)
        .map_err(|source| Error::Pipeline { operation, source })?;

    debug!(
        colors = output.colors.as_ref().map(Vec::len),
        components = output.components,
        "pipeline finished"
    );
    Ok(output)
}

/// Runs the operation registered under `name`.
///
/// # Errors
/// Returns [`Error::UnknownOperation`] without touching `destination` if `name` is not
/// registered, and otherwise fails like [`run_operation`].
///
/// # Examples
/// ```
/// # use segmette::{run, Channels, Error, Image, NativeAlgebra, Options};
/// let source = Image::new(2, 2, Channels::Rgb);
/// let mut destination = Image::new(2, 2, Channels::Rgb);
/// let result = run(&NativeAlgebra::new(), "blur", &source, &mut destination, &Options::new());
/// assert_eq!(result, Err(Error::UnknownOperation("blur".to_owned())));
/// ```
pub fn run<A: ImageAlgebra + ?Sized>(
    algebra: &A,
    name: &str,
    source: &Image,
    destination: &mut Image,
    options: &Options,
) -> Result<PipelineOutput, Error> {
    let operation = name.parse::<Operation>()?;
    run_operation(algebra, operation, source, destination, options)
}
