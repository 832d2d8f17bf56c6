//! The primitive vision operations that pipelines are built from.
//!
//! Pipelines never touch pixels for anything but marshalling; everything else goes
//! through an [`ImageAlgebra`] backend. [`NativeAlgebra`] is the bundled one.

mod canny;
mod components;
mod contours;
mod convert;
mod native;

pub use native::NativeAlgebra;

pub use crate::kmeans::{CenterInit, TermCriteria};

use crate::{ClusterCount, ClusterResult, Image, LabelMap, PrimitiveError, SampleMatrix};
use palette::Srgb;

/// The target layout of [`ImageAlgebra::convert_color`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorConversion {
    /// A single luma channel.
    ToGray,
    /// Three color channels, dropping alpha or replicating luma.
    ToRgb,
}

/// Parameters for Canny edge detection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CannyParams {
    /// Gradients below this never become edges.
    pub low: f32,
    /// Gradients above this always become edges.
    pub high: f32,
    /// The Sobel aperture size.
    pub aperture: u8,
    /// Use `sqrt(gx² + gy²)` instead of `|gx| + |gy|` as the gradient magnitude.
    pub l2_gradient: bool,
}

impl CannyParams {
    /// The fixed thresholds every edge-based pipeline uses.
    pub const STANDARD: Self = Self { low: 50.0, high: 100.0, aperture: 3, l2_gradient: false };
}

impl Default for CannyParams {
    fn default() -> Self {
        Self::STANDARD
    }
}

/// Which contours [`ImageAlgebra::find_contours`] retrieves and how it links them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RetrievalMode {
    /// Only the outermost borders, none of them with a parent.
    External,
    /// Every border, none of them with a parent.
    List,
    /// Outer borders at the top level, each hole a child of its outer border.
    #[default]
    TwoLevel,
    /// The full nesting of outer borders and holes.
    Tree,
}

/// How contour points are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ContourApprox {
    /// Every border pixel.
    None,
    /// Only the endpoints of straight horizontal, vertical, and diagonal runs.
    #[default]
    Simple,
}

/// A closed border as a list of pixel coordinates.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Contour {
    /// The border points in tracing order.
    pub points: Vec<[i32; 2]>,
}

/// Links of a contour within the contour hierarchy.
///
/// All indices point into the same [`Contours`] list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HierarchyNode {
    /// The next contour at the same level.
    pub next: Option<usize>,
    /// The previous contour at the same level.
    pub previous: Option<usize>,
    /// The first nested contour.
    pub first_child: Option<usize>,
    /// The enclosing contour.
    pub parent: Option<usize>,
}

/// The output of [`ImageAlgebra::find_contours`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Contours {
    /// The contours.
    pub contours: Vec<Contour>,
    /// One hierarchy entry per contour.
    pub hierarchy: Vec<HierarchyNode>,
}

impl Contours {
    /// The number of contours.
    #[must_use]
    pub fn len(&self) -> usize {
        self.contours.len()
    }

    /// Whether no contour was found.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.contours.is_empty()
    }
}

/// Pixel connectivity of drawn line segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LineType {
    /// Steps may be diagonal.
    #[default]
    Connected8,
    /// Steps are only horizontal or vertical.
    Connected4,
}

/// How [`ImageAlgebra::draw_contours`] renders contours.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawStyle {
    /// The line color. Gray images take the red component.
    pub color: Srgb<u8>,
    /// The line width in pixels, at least 1.
    pub thickness: u32,
    /// The line connectivity.
    pub line: LineType,
    /// How many levels of nested contours to draw below the starting level.
    pub max_depth: u32,
}

impl DrawStyle {
    /// A 1 pixel wide, 8-connected line in the given color.
    #[must_use]
    pub const fn new(color: Srgb<u8>) -> Self {
        Self { color, thickness: 1, line: LineType::Connected8, max_depth: u32::MAX }
    }

    /// Sets the line width.
    #[must_use]
    pub const fn thickness(mut self, thickness: u32) -> Self {
        self.thickness = thickness;
        self
    }

    /// Sets the line connectivity.
    #[must_use]
    pub const fn line(mut self, line: LineType) -> Self {
        self.line = line;
        self
    }

    /// Sets the nesting depth limit.
    #[must_use]
    pub const fn max_depth(mut self, max_depth: u32) -> Self {
        self.max_depth = max_depth;
        self
    }
}

/// The bounding box and area of a connected component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ComponentStats {
    /// The leftmost column.
    pub left: u32,
    /// The topmost row.
    pub top: u32,
    /// The bounding box width.
    pub width: u32,
    /// The bounding box height.
    pub height: u32,
    /// The number of pixels.
    pub area: u32,
}

/// The output of [`ImageAlgebra::label_components`].
///
/// `stats[i]` and `centroids[i]` describe label `i`; entry `0` describes the background.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectedComponents {
    /// One label per pixel.
    pub labels: LabelMap,
    /// Per label statistics.
    pub stats: Vec<ComponentStats>,
    /// Per label `[x, y]` centroid.
    pub centroids: Vec<[f64; 2]>,
}

impl ConnectedComponents {
    /// The number of labels, background included.
    #[must_use]
    pub fn count(&self) -> u32 {
        self.labels.count()
    }
}

/// A set of primitive vision operations.
///
/// Implementations must not keep references to their inputs, and each operation either
/// returns a complete result or an error. [`draw_contours`](ImageAlgebra::draw_contours)
/// is the only in-place operation.
pub trait ImageAlgebra {
    /// Converts `image` to the requested channel layout.
    ///
    /// # Errors
    /// Fails if the input layout is not supported.
    fn convert_color(
        &self,
        image: &Image,
        conversion: ColorConversion,
    ) -> Result<Image, PrimitiveError>;

    /// Detects edges in a single-channel image, returning a single-channel 0/255 map.
    ///
    /// # Errors
    /// Fails for multi-channel input or unsupported parameters.
    fn detect_edges(&self, gray: &Image, params: CannyParams) -> Result<Image, PrimitiveError>;

    /// Traces the borders of the non-zero regions of a single-channel image.
    ///
    /// # Errors
    /// Fails for multi-channel input.
    fn find_contours(
        &self,
        binary: &Image,
        mode: RetrievalMode,
        approx: ContourApprox,
    ) -> Result<Contours, PrimitiveError>;

    /// Draws contour `index` (or every contour if `None`) onto `image`.
    ///
    /// # Errors
    /// Fails if `index` is out of range. `image` is not modified in that case.
    fn draw_contours(
        &self,
        image: &mut Image,
        contours: &Contours,
        index: Option<usize>,
        style: &DrawStyle,
    ) -> Result<(), PrimitiveError>;

    /// Labels the 8-connected non-zero regions of a single-channel image.
    ///
    /// # Errors
    /// Fails for multi-channel input.
    fn label_components(&self, binary: &Image) -> Result<ConnectedComponents, PrimitiveError>;

    /// Clusters `samples` into exactly `k` groups.
    ///
    /// # Errors
    /// Fails if there are fewer samples than clusters.
    fn cluster(
        &self,
        samples: &SampleMatrix,
        k: ClusterCount,
        criteria: TermCriteria,
        attempts: u32,
        init: CenterInit,
    ) -> Result<ClusterResult, PrimitiveError>;
}
