//! Connected-component labeling with per-component statistics.

use super::{ComponentStats, ConnectedComponents};
use crate::{LabelMap, PrimitiveError};
use image::{GrayImage, Luma};
use imageproc::region_labelling::{connected_components, Connectivity};

/// Running bounds and sums of one label.
#[derive(Debug, Clone, Copy)]
struct Accumulator {
    /// The smallest column seen.
    min_x: u32,
    /// The smallest row seen.
    min_y: u32,
    /// The largest column seen.
    max_x: u32,
    /// The largest row seen.
    max_y: u32,
    /// The number of pixels.
    area: u32,
    /// The sum of all columns.
    sum_x: u64,
    /// The sum of all rows.
    sum_y: u64,
}

impl Default for Accumulator {
    fn default() -> Self {
        Self {
            min_x: u32::MAX,
            min_y: u32::MAX,
            max_x: 0,
            max_y: 0,
            area: 0,
            sum_x: 0,
            sum_y: 0,
        }
    }
}

impl Accumulator {
    /// Adds the pixel at `(x, y)`.
    fn add(&mut self, x: u32, y: u32) {
        self.min_x = self.min_x.min(x);
        self.min_y = self.min_y.min(y);
        self.max_x = self.max_x.max(x);
        self.max_y = self.max_y.max(y);
        self.area += 1;
        self.sum_x += u64::from(x);
        self.sum_y += u64::from(y);
    }

    /// The bounding box and area; all zero for a label without pixels.
    fn stats(&self) -> ComponentStats {
        if self.area == 0 {
            return ComponentStats::default();
        }
        ComponentStats {
            left: self.min_x,
            top: self.min_y,
            width: self.max_x - self.min_x + 1,
            height: self.max_y - self.min_y + 1,
            area: self.area,
        }
    }

    /// The mean pixel position; the origin for a label without pixels.
    #[allow(clippy::cast_precision_loss)]
    fn centroid(&self) -> [f64; 2] {
        if self.area == 0 {
            return [0.0; 2];
        }
        let area = f64::from(self.area);
        [self.sum_x as f64 / area, self.sum_y as f64 / area]
    }
}

/// Labels the 8-connected non-zero regions of `binary`.
///
/// Zero pixels get label `0`. The other labels are numbered from `1` in the order their
/// first pixel appears in scan order.
pub(super) fn label(binary: &GrayImage) -> Result<ConnectedComponents, PrimitiveError> {
    let (width, height) = binary.dimensions();
    let raw = connected_components(binary, Connectivity::Eight, Luma([0u8])).into_raw();

    let max = raw.iter().copied().max().unwrap_or(0);
    let mut remap = vec![None; max as usize + 1];
    remap[0] = Some(0);
    let mut count = 1;
    let labels = raw
        .into_iter()
        .map(|l| {
            *remap[l as usize].get_or_insert_with(|| {
                count += 1;
                count - 1
            })
        })
        .collect::<Vec<u32>>();

    let mut accumulators = vec![Accumulator::default(); count as usize];
    for (i, &l) in labels.iter().enumerate() {
        #[allow(clippy::cast_possible_truncation)]
        let (x, y) = ((i % width as usize) as u32, (i / width as usize) as u32);
        accumulators[l as usize].add(x, y);
    }

    let labels = LabelMap::new(width, height, labels)
        .map_err(|_| PrimitiveError::OutputShape { primitive: "label_components" })?;

    Ok(ConnectedComponents {
        labels,
        stats: accumulators.iter().map(Accumulator::stats).collect(),
        centroids: accumulators.iter().map(Accumulator::centroid).collect(),
    })
}
