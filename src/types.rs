//! Contains the buffer and index types shared across the crate.

use crate::{InputError, MAX_CLUSTERS};
use image::{DynamicImage, GrayImage, RgbImage, RgbaImage};
use palette::Srgb;
use std::{
    fmt::{self, Display},
    ops::Deref,
    slice::ChunksExact,
};

/// An ordered list of representative colors, one per cluster center.
///
/// `palette[i]` is the color of every pixel that was assigned to cluster `i`.
pub type Palette = Vec<Srgb<u8>>;

/// An ordered list of display colors indexed by label.
///
/// Index `0` is reserved for the background and is always black.
pub type ColorTable = Vec<Srgb<u8>>;

/// The number of 8-bit channels per pixel of an [`Image`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channels {
    /// A single luma channel.
    Gray,
    /// Red, green, and blue.
    Rgb,
    /// Red, green, blue, and alpha.
    Rgba,
}

impl Channels {
    /// Returns the number of bytes per pixel.
    #[must_use]
    pub const fn count(self) -> usize {
        match self {
            Channels::Gray => 1,
            Channels::Rgb => 3,
            Channels::Rgba => 4,
        }
    }

    /// Returns the layout with the given number of channels, if it is supported.
    #[must_use]
    pub const fn from_count(count: usize) -> Option<Self> {
        match count {
            1 => Some(Channels::Gray),
            3 => Some(Channels::Rgb),
            4 => Some(Channels::Rgba),
            _ => None,
        }
    }
}

impl Display for Channels {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.count())
    }
}

/// An owned, row-major buffer of interleaved 8-bit pixels.
///
/// The length of the buffer is always `width * height * channels`.
///
/// # Examples
/// ```
/// # use segmette::{Channels, Image};
/// let blank = Image::new(4, 3, Channels::Rgb);
/// assert_eq!(blank.num_pixels(), 12);
/// assert_eq!(blank.as_raw().len(), 36);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    /// The number of columns.
    width: u32,
    /// The number of rows.
    height: u32,
    /// The pixel layout.
    channels: Channels,
    /// The interleaved samples in scan order.
    data: Vec<u8>,
}

impl Image {
    /// Creates a new zero-filled [`Image`].
    #[must_use]
    pub fn new(width: u32, height: u32, channels: Channels) -> Self {
        let len = width as usize * height as usize * channels.count();
        Self { width, height, channels, data: vec![0; len] }
    }

    /// Creates an [`Image`] from a raw buffer without checking its length.
    pub(crate) const fn new_unchecked(
        width: u32,
        height: u32,
        channels: Channels,
        data: Vec<u8>,
    ) -> Self {
        Self { width, height, channels, data }
    }

    /// Creates an [`Image`] from a raw interleaved buffer.
    ///
    /// # Errors
    /// Returns [`InputError::BufferLength`] if `data` does not hold exactly
    /// `width * height * channels` bytes.
    pub fn from_raw(
        width: u32,
        height: u32,
        channels: Channels,
        data: Vec<u8>,
    ) -> Result<Self, InputError> {
        let expected = width as usize * height as usize * channels.count();
        if data.len() == expected {
            Ok(Self::new_unchecked(width, height, channels, data))
        } else {
            Err(InputError::BufferLength { expected, actual: data.len() })
        }
    }

    /// Creates an image of the given size where every pixel is `pixel`.
    ///
    /// # Errors
    /// Returns [`InputError::Channels`] if `pixel` is not 1, 3, or 4 bytes long.
    pub fn filled(width: u32, height: u32, pixel: &[u8]) -> Result<Self, InputError> {
        let channels = Channels::from_count(pixel.len()).ok_or(InputError::Channels(pixel.len()))?;
        let data = pixel.repeat(width as usize * height as usize);
        Ok(Self::new_unchecked(width, height, channels, data))
    }

    /// The number of columns.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// The number of rows.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// `(width, height)`
    #[must_use]
    pub const fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// The pixel layout.
    #[must_use]
    pub const fn channels(&self) -> Channels {
        self.channels
    }

    /// The number of pixels, `width * height`.
    #[must_use]
    pub const fn num_pixels(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Whether the image has no pixels at all.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.num_pixels() == 0
    }

    /// The interleaved samples in scan order.
    #[must_use]
    pub fn as_raw(&self) -> &[u8] {
        &self.data
    }

    /// Mutable access to the interleaved samples.
    ///
    /// The length of the buffer cannot be changed through this slice.
    pub fn as_raw_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Consumes the image and returns its buffer.
    #[must_use]
    pub fn into_raw(self) -> Vec<u8> {
        self.data
    }

    /// Iterates over the pixels in scan order, one slice of `channels` bytes per pixel.
    #[must_use]
    pub fn pixels(&self) -> ChunksExact<'_, u8> {
        self.data.chunks_exact(self.channels.count())
    }

    /// Returns the bytes of the pixel at `(x, y)`.
    ///
    /// # Panics
    /// Panics if the coordinates are out of bounds.
    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> &[u8] {
        assert!(x < self.width && y < self.height, "pixel ({x}, {y}) out of bounds");
        let n = self.channels.count();
        let start = (y as usize * self.width as usize + x as usize) * n;
        &self.data[start..start + n]
    }
}

impl From<GrayImage> for Image {
    fn from(image: GrayImage) -> Self {
        let (width, height) = image.dimensions();
        Self::new_unchecked(width, height, Channels::Gray, image.into_raw())
    }
}

impl From<RgbImage> for Image {
    fn from(image: RgbImage) -> Self {
        let (width, height) = image.dimensions();
        Self::new_unchecked(width, height, Channels::Rgb, image.into_raw())
    }
}

impl From<RgbaImage> for Image {
    fn from(image: RgbaImage) -> Self {
        let (width, height) = image.dimensions();
        Self::new_unchecked(width, height, Channels::Rgba, image.into_raw())
    }
}

impl From<DynamicImage> for Image {
    fn from(image: DynamicImage) -> Self {
        match image {
            DynamicImage::ImageLuma8(image) => image.into(),
            DynamicImage::ImageRgb8(image) => image.into(),
            DynamicImage::ImageRgba8(image) => image.into(),
            image => image.into_rgba8().into(),
        }
    }
}

impl From<Image> for DynamicImage {
    #[allow(clippy::expect_used)]
    fn from(image: Image) -> Self {
        let Image { width, height, channels, data } = image;
        // the buffer length invariant of `Image` matches what `from_raw` checks
        match channels {
            Channels::Gray => DynamicImage::ImageLuma8(
                GrayImage::from_raw(width, height, data).expect("large enough buffer"),
            ),
            Channels::Rgb => DynamicImage::ImageRgb8(
                RgbImage::from_raw(width, height, data).expect("large enough buffer"),
            ),
            Channels::Rgba => DynamicImage::ImageRgba8(
                RgbaImage::from_raw(width, height, data).expect("large enough buffer"),
            ),
        }
    }
}

/// A flat, row-major list of normalized color samples, one `[f32; 3]` per pixel.
///
/// Every component lies in `0.0..=1.0`.
#[derive(Debug, Clone, PartialEq)]
#[repr(transparent)]
pub struct SampleMatrix(Vec<[f32; 3]>);

impl SampleMatrix {
    /// Creates a [`SampleMatrix`] from already normalized samples.
    #[must_use]
    pub fn new(samples: Vec<[f32; 3]>) -> Self {
        Self(samples)
    }

    /// Consumes the matrix and returns the inner samples.
    #[must_use]
    pub fn into_inner(self) -> Vec<[f32; 3]> {
        self.0
    }
}

impl Deref for SampleMatrix {
    type Target = [[f32; 3]];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<[[f32; 3]]> for SampleMatrix {
    fn as_ref(&self) -> &[[f32; 3]] {
        self
    }
}

/// The output of clustering a [`SampleMatrix`].
///
/// `labels[i]` is the index into `centers` of the cluster that pixel `i` belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ClusterResult {
    /// One cluster index per sample.
    pub labels: Vec<u32>,
    /// The representative 8-bit color of each cluster.
    pub centers: Vec<[u8; 3]>,
}

/// A per-pixel label array produced by connected-component labeling.
///
/// Label `0` is the background and `1..count` are distinct connected regions.
/// The invariant `count == max(label) + 1` is checked on construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelMap {
    /// The number of columns.
    width: u32,
    /// The number of rows.
    height: u32,
    /// One label per pixel in scan order.
    labels: Vec<u32>,
    /// The number of distinct labels, background included.
    count: u32,
}

impl LabelMap {
    /// Creates a [`LabelMap`], deriving the label count from the largest label.
    ///
    /// # Errors
    /// Returns [`InputError::EmptyImage`] if the map has no pixels, and
    /// [`InputError::LabelCount`] if `labels.len() != width * height`.
    pub fn new(width: u32, height: u32, labels: Vec<u32>) -> Result<Self, InputError> {
        let expected = width as usize * height as usize;
        if labels.len() != expected {
            return Err(InputError::LabelCount { expected, actual: labels.len() });
        }
        let max = labels.iter().copied().max().ok_or(InputError::EmptyImage)?;
        Ok(Self { width, height, labels, count: max + 1 })
    }

    /// The number of columns.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// The number of rows.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// The number of distinct labels, background included.
    #[must_use]
    pub const fn count(&self) -> u32 {
        self.count
    }

    /// The labels in scan order.
    #[must_use]
    pub fn labels(&self) -> &[u32] {
        &self.labels
    }
}

/// The number of clusters to quantize an image into.
///
/// This is a simple new type wrapper around `u16` with the invariant that it must be
/// in the range `1..=`[`MAX_CLUSTERS`].
///
/// # Examples
/// ```
/// # use segmette::ClusterCount;
/// let k = ClusterCount::try_from(15u16).unwrap();
/// assert_eq!(k.get(), 15);
/// assert!(ClusterCount::try_from(0u16).is_err());
/// assert_eq!(ClusterCount::default().get(), 8);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct ClusterCount(u16);

impl ClusterCount {
    /// The largest supported number of clusters.
    pub const MAX: Self = Self(MAX_CLUSTERS);

    /// The number of clusters used when none is given.
    pub const DEFAULT: Self = Self(8);

    /// Creates a [`ClusterCount`] without checking the range.
    pub(crate) const fn new_unchecked(value: u16) -> Self {
        Self(value)
    }

    /// Gets the inner value.
    #[must_use]
    pub const fn get(self) -> u16 {
        self.0
    }

    /// The inner value as a `usize` for indexing and allocation.
    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl Default for ClusterCount {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl TryFrom<u16> for ClusterCount {
    type Error = InputError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        if (1..=MAX_CLUSTERS).contains(&value) {
            Ok(Self(value))
        } else {
            Err(InputError::ClusterCount(value.into()))
        }
    }
}

impl TryFrom<u32> for ClusterCount {
    type Error = InputError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        u16::try_from(value)
            .map_err(|_| InputError::ClusterCount(value))
            .and_then(Self::try_from)
    }
}

impl From<ClusterCount> for u16 {
    fn from(value: ClusterCount) -> Self {
        value.get()
    }
}

impl Display for ClusterCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
