//! Random display colors for connected-component labels.
//!
//! The colors are a visualization aid only. Unless seeded, two runs over the same
//! label map paint the regions differently.

use crate::{from_label_map, Channels, ColorTable, Image, InputError, LabelMap};
use palette::Srgb;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoroshiro128PlusPlus;

/// The color of label `0`.
pub const BACKGROUND: Srgb<u8> = Srgb::new(0, 0, 0);

/// Generates color tables for label maps.
///
/// # Examples
/// ```
/// # use segmette::{LabelColorizer, BACKGROUND};
/// let table = LabelColorizer::new().generate(5);
/// assert_eq!(table.len(), 5);
/// assert_eq!(table[0], BACKGROUND);
/// ```
#[derive(Debug, Clone)]
pub struct LabelColorizer<R = Xoroshiro128PlusPlus> {
    /// The source of the label colors.
    rng: R,
}

impl LabelColorizer {
    /// Creates a colorizer seeded from system entropy.
    #[must_use]
    pub fn new() -> Self {
        Self::seeded(rand::random())
    }

    /// Creates a colorizer that always produces the same sequence of tables.
    #[must_use]
    pub fn seeded(seed: u64) -> Self {
        Self { rng: Xoroshiro128PlusPlus::seed_from_u64(seed) }
    }
}

impl Default for LabelColorizer {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Rng> LabelColorizer<R> {
    /// Creates a colorizer drawing from the given random number generator.
    pub fn with_rng(rng: R) -> Self {
        Self { rng }
    }

    /// Returns exactly `num_labels` colors.
    ///
    /// Entry `0` is [`BACKGROUND`]; every other channel is drawn uniformly from `0..=255`.
    pub fn generate(&mut self, num_labels: usize) -> ColorTable {
        let mut table = Vec::with_capacity(num_labels);
        if num_labels > 0 {
            table.push(BACKGROUND);
        }
        table.extend((1..num_labels).map(|_| {
            let [r, g, b]: [u8; 3] = self.rng.gen();
            Srgb::new(r, g, b)
        }));
        table
    }
}

/// Writes `table[label]` into `destination` for every pixel of `labels`.
///
/// `destination` is only overwritten once all checks have passed.
///
/// # Errors
/// Returns [`InputError::ColorTableSize`] if the table does not have one entry per label and
/// [`InputError::DestinationMismatch`] if `destination` is not a 3-channel image of the
/// label map's size.
pub fn paint(labels: &LabelMap, table: &[Srgb<u8>], destination: &mut Image) -> Result<(), InputError> {
    if table.len() != labels.count() as usize {
        return Err(InputError::ColorTableSize { labels: labels.count(), colors: table.len() });
    }

    let size = (labels.width(), labels.height());
    if destination.dimensions() != size || destination.channels() != Channels::Rgb {
        return Err(InputError::DestinationMismatch {
            expected: size,
            actual: destination.dimensions(),
            channels: destination.channels().count(),
        });
    }

    *destination = from_label_map(labels.labels(), table, size.0, size.1)?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn table_has_requested_length_and_black_background() {
        let mut colorizer = LabelColorizer::new();
        for n in [1, 2, 17, 300] {
            let table = colorizer.generate(n);
            assert_eq!(table.len(), n);
            assert_eq!(table[0], BACKGROUND);
        }
        assert!(colorizer.generate(0).is_empty());
    }

    #[test]
    fn seeded_tables_repeat() {
        let a = LabelColorizer::seeded(4).generate(64);
        let b = LabelColorizer::seeded(4).generate(64);
        assert_eq!(a, b);
        // 63 random colors all black would mean the generator is not being used
        assert!(a[1..].iter().any(|&c| c != BACKGROUND));
    }

    #[test]
    fn paints_label_colors() {
        let labels = LabelMap::new(3, 1, vec![0, 2, 1]).unwrap();
        let table = vec![BACKGROUND, Srgb::new(1, 2, 3), Srgb::new(4, 5, 6)];
        let mut destination = Image::new(3, 1, Channels::Rgb);
        paint(&labels, &table, &mut destination).unwrap();
        assert_eq!(destination.as_raw(), [0, 0, 0, 4, 5, 6, 1, 2, 3]);
    }

    #[test]
    fn short_table_leaves_destination_untouched() {
        let labels = LabelMap::new(2, 1, vec![0, 2]).unwrap();
        let table = LabelColorizer::seeded(1).generate(2);
        let mut destination = Image::filled(2, 1, &[9, 9, 9]).unwrap();
        assert_eq!(
            paint(&labels, &table, &mut destination),
            Err(InputError::ColorTableSize { labels: 3, colors: 2 })
        );
        assert!(destination.pixels().all(|p| p == [9, 9, 9]));
    }
}
