//! Deterministic image transform pipelines over a pluggable image algebra backend.
//!
//! `segmette` turns a source [`Image`] into a display image through one of seven
//! operations: grayscale conversion, Canny edges, contour tracing, k-means posterization,
//! connected-component labeling, and two composites that quantize before segmenting.
//!
//! The vision primitives themselves sit behind the [`ImageAlgebra`] trait.
//! [`NativeAlgebra`] is the bundled pure Rust backend.
//!
//! # Features
//! - `threads`: runs the k-means assignment step in parallel via [`rayon`]
//!   (see [`NativeAlgebra::parallel`]). Enabled by default.
//!
//! # High-Level API
//! Pick an [`Operation`] (or parse its name) and call [`run`] or [`run_operation`]:
//! ```
//! # use segmette::{run, Channels, Image, NativeAlgebra, Options, ClusterCount};
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let source = Image::filled(4, 4, &[200, 30, 30])?;
//! let mut destination = Image::new(4, 4, Channels::Rgb);
//!
//! let options = Options::new().k(ClusterCount::try_from(1u16)?);
//! let output = run(&NativeAlgebra::new(), "kmeans", &source, &mut destination, &options)?;
//!
//! assert_eq!(output.colors.map(|p| p.len()), Some(1));
//! # Ok(())
//! # }
//! ```
//!
//! Each pipeline is also available as a plain function, e.g. [`kmeans_quantize`] or
//! [`quantize_then_ccl`]. Every pipeline checks the destination before calling any
//! primitive and only overwrites it once all primitives have succeeded.

#![deny(unsafe_code, unsafe_op_in_unsafe_fn)]
#![warn(
    clippy::pedantic,
    clippy::cargo,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::todo,
    clippy::unimplemented,
    clippy::unwrap_used,
    clippy::unwrap_in_result,
    clippy::expect_used,
    clippy::unneeded_field_pattern,
    clippy::rest_pat_in_fully_bound_structs,
    clippy::unnecessary_self_imports,
    clippy::str_to_string,
    clippy::string_to_string,
    clippy::string_slice,
    missing_docs,
    clippy::missing_docs_in_private_items,
    rustdoc::all,
    clippy::float_cmp_const,
    clippy::lossy_float_literal
)]
#![allow(
    clippy::doc_markdown,
    clippy::module_name_repetitions,
    clippy::many_single_char_names,
    clippy::missing_panics_doc,
    clippy::unreadable_literal,
    clippy::wildcard_imports
)]

mod api;
mod colorize;
mod error;
mod marshal;
mod types;

pub mod algebra;
pub mod kmeans;

pub use algebra::{ImageAlgebra, NativeAlgebra};
pub use api::*;
pub use colorize::*;
pub use error::*;
pub use marshal::*;
pub use types::*;

/// The maximum supported number of clusters is `256`.
pub const MAX_CLUSTERS: u16 = u8::MAX as u16 + 1;

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::missing_docs_in_private_items)]
pub(crate) mod tests {
    use super::*;
    use crate::algebra::{
        CannyParams, ColorConversion, ConnectedComponents, ContourApprox, Contours, DrawStyle,
        RetrievalMode,
    };
    use crate::kmeans::{CenterInit, TermCriteria};
    use std::cell::{Cell, RefCell};

    /// A 3-channel image where every pixel is `[r, g, b]`.
    pub fn solid(width: u32, height: u32, rgb: [u8; 3]) -> Image {
        Image::filled(width, height, &rgb).unwrap()
    }

    /// A 3-channel black image with a white square of side `size` at `(offset, offset)`.
    pub fn square(width: u32, height: u32, offset: u32, size: u32) -> Image {
        let mut image = Image::new(width, height, Channels::Rgb);
        let data = image.as_raw_mut();
        for y in offset..offset + size {
            for x in offset..offset + size {
                let i = (y * width + x) as usize * 3;
                data[i..i + 3].fill(255);
            }
        }
        image
    }

    /// A 3-channel image with a different flat color in each quadrant.
    pub fn quadrants(width: u32, height: u32) -> Image {
        let colors = [[220, 40, 40], [40, 200, 60], [30, 60, 210], [240, 240, 240]];
        let mut data = Vec::with_capacity(width as usize * height as usize * 3);
        for y in 0..height {
            for x in 0..width {
                let q = usize::from(x >= width / 2) + 2 * usize::from(y >= height / 2);
                data.extend_from_slice(&colors[q]);
            }
        }
        Image::from_raw(width, height, Channels::Rgb, data).unwrap()
    }

    /// Wraps [`NativeAlgebra`], recording every primitive call and optionally failing one.
    #[derive(Debug, Default)]
    pub struct CountingAlgebra {
        inner: NativeAlgebra,
        calls: RefCell<Vec<&'static str>>,
        fail_on: Option<&'static str>,
        failures: Cell<usize>,
    }

    impl CountingAlgebra {
        pub fn new() -> Self {
            Self { inner: NativeAlgebra::new().seed(17), ..Self::default() }
        }

        /// Makes every call of the named primitive fail.
        pub fn failing(primitive: &'static str) -> Self {
            Self { fail_on: Some(primitive), ..Self::new() }
        }

        pub fn calls(&self) -> Vec<&'static str> {
            self.calls.borrow().clone()
        }

        pub fn failures(&self) -> usize {
            self.failures.get()
        }

        fn enter(&self, primitive: &'static str) -> Result<(), PrimitiveError> {
            self.calls.borrow_mut().push(primitive);
            if self.fail_on == Some(primitive) {
                self.failures.set(self.failures.get() + 1);
                Err(PrimitiveError::EmptyInput { primitive })
            } else {
                Ok(())
            }
        }
    }

    impl ImageAlgebra for CountingAlgebra {
        fn convert_color(
            &self,
            image: &Image,
            conversion: ColorConversion,
        ) -> Result<Image, PrimitiveError> {
            self.enter("convert_color")?;
            self.inner.convert_color(image, conversion)
        }

        fn detect_edges(&self, gray: &Image, params: CannyParams) -> Result<Image, PrimitiveError> {
            self.enter("detect_edges")?;
            self.inner.detect_edges(gray, params)
        }

        fn find_contours(
            &self,
            binary: &Image,
            mode: RetrievalMode,
            approx: ContourApprox,
        ) -> Result<Contours, PrimitiveError> {
            self.enter("find_contours")?;
            self.inner.find_contours(binary, mode, approx)
        }

        fn draw_contours(
            &self,
            image: &mut Image,
            contours: &Contours,
            index: Option<usize>,
            style: &DrawStyle,
        ) -> Result<(), PrimitiveError> {
            self.enter("draw_contours")?;
            self.inner.draw_contours(image, contours, index, style)
        }

        fn label_components(&self, binary: &Image) -> Result<ConnectedComponents, PrimitiveError> {
            self.enter("label_components")?;
            self.inner.label_components(binary)
        }

        fn cluster(
            &self,
            samples: &SampleMatrix,
            k: ClusterCount,
            criteria: TermCriteria,
            attempts: u32,
            init: CenterInit,
        ) -> Result<ClusterResult, PrimitiveError> {
            self.enter("cluster")?;
            self.inner.cluster(samples, k, criteria, attempts, init)
        }
    }
}
