//! Lloyd's k-means over normalized color samples.
//!
//! Each iteration assigns every sample to its nearest center and then moves every center
//! to the mean of its samples. Iteration stops once the iteration budget of the
//! [`TermCriteria`] is spent or no center moved farther than its epsilon.
//! The nearest-center search compares a sample against eight centers at once.
//!
//! Use [`cluster`] (or [`cluster_par`] with the `threads` feature) directly,
//! or go through [`NativeAlgebra`](crate::algebra::NativeAlgebra).

use crate::{ClusterCount, PrimitiveError};

use std::array;

use ordered_float::OrderedFloat;
use rand::{prelude::Distribution, SeedableRng};
use rand_distr::{weighted_alias::WeightedAliasIndex, Uniform};
use rand_xoshiro::Xoroshiro128PlusPlus;
use wide::{f32x8, u32x8, CmpLe};

#[cfg(feature = "threads")]
use rayon::prelude::*;

/// A single normalized color sample.
pub type Sample = [f32; 3];

/// When to stop iterating.
///
/// At least one of the two limits should be set.
/// If only an epsilon is given, at most [`TermCriteria::DEFAULT_MAX_ITERATIONS`] iterations run.
/// If only an iteration count is given, iteration also stops once centers stop moving.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TermCriteria {
    /// The maximum number of update iterations.
    max_iterations: Option<u32>,
    /// The center movement below which the clustering counts as converged.
    epsilon: Option<f32>,
}

impl TermCriteria {
    /// The iteration budget used when only an epsilon is given.
    pub const DEFAULT_MAX_ITERATIONS: u32 = 100;

    /// Stops after `max_iterations` iterations or once no center moves more than `epsilon`.
    #[must_use]
    pub const fn new(max_iterations: u32, epsilon: f32) -> Self {
        Self { max_iterations: Some(max_iterations), epsilon: Some(epsilon) }
    }

    /// Stops only after `max_iterations` iterations (or once centers stop moving).
    #[must_use]
    pub const fn iterations(max_iterations: u32) -> Self {
        Self { max_iterations: Some(max_iterations), epsilon: None }
    }

    /// Stops once no center moves more than `epsilon`.
    #[must_use]
    pub const fn epsilon(epsilon: f32) -> Self {
        Self { max_iterations: None, epsilon: Some(epsilon) }
    }

    /// Returns the iteration budget and the squared epsilon.
    fn resolve(self) -> (u32, f32) {
        let max_iterations = self.max_iterations.unwrap_or(Self::DEFAULT_MAX_ITERATIONS);
        let epsilon = self.epsilon.unwrap_or(0.0).max(0.0);
        (max_iterations, epsilon * epsilon)
    }
}

impl Default for TermCriteria {
    fn default() -> Self {
        Self::new(10, 1.0)
    }
}

/// How the initial centers are chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CenterInit {
    /// Uniformly random points inside the bounding box of the samples.
    #[default]
    Random,
    /// k-means++: samples picked with probability proportional to their squared
    /// distance from the nearest center chosen so far.
    PlusPlus,
}

/// A builder struct to specify the parameters for k-means.
///
/// # Examples
/// ```
/// # use segmette::kmeans::{CenterInit, KmeansOptions, TermCriteria};
/// let options = KmeansOptions::new()
///     .criteria(TermCriteria::new(20, 0.01))
///     .attempts(3)
///     .init(CenterInit::PlusPlus)
///     .seed(42);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KmeansOptions {
    /// When to stop each attempt.
    criteria: TermCriteria,
    /// How many independently initialized runs to perform.
    attempts: u32,
    /// How initial centers are chosen.
    init: CenterInit,
    /// The seed value for the random number generator.
    seed: u64,
}

impl Default for KmeansOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl KmeansOptions {
    /// Creates a new [`KmeansOptions`] with default values.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            criteria: TermCriteria::new(10, 1.0),
            attempts: 1,
            init: CenterInit::Random,
            seed: 0,
        }
    }

    /// Sets the termination criteria.
    ///
    /// The default is 10 iterations or an epsilon of `1.0`, whichever comes first.
    #[must_use]
    pub const fn criteria(mut self, criteria: TermCriteria) -> Self {
        self.criteria = criteria;
        self
    }

    /// Sets the number of attempts. The attempt with the lowest compactness is returned.
    ///
    /// The default is a single attempt. `0` is treated as `1`.
    #[must_use]
    pub const fn attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    /// Sets how the initial centers are chosen.
    ///
    /// The default is [`CenterInit::Random`].
    #[must_use]
    pub const fn init(mut self, init: CenterInit) -> Self {
        self.init = init;
        self
    }

    /// Sets the seed value for the random number generator.
    ///
    /// The default seed is `0`.
    #[must_use]
    pub const fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// The result of clustering.
#[derive(Debug, Clone, PartialEq)]
pub struct Clustering {
    /// The index of the nearest center for each sample.
    pub labels: Vec<u32>,
    /// The final centers, always exactly `k` of them.
    pub centers: Vec<Sample>,
    /// The sum of squared distances from each sample to its center.
    pub compactness: f64,
    /// The number of update iterations the returned attempt ran.
    pub iterations: u32,
}

#[inline]
fn simd_argmin<const N: usize>(points: &[[f32x8; N]], query: [f32; N]) -> (u8, u8) {
    let incr = u32x8::ONE;
    let mut cur_chunk = u32x8::ZERO;
    let mut min_chunk = cur_chunk;
    let mut min_distance = f32x8::splat(f32::INFINITY);

    let query = query.map(f32x8::splat);

    for chunk in points {
        #[allow(clippy::unwrap_used)]
        let distance = array::from_fn::<_, N, _>(|i| {
            let diff = query[i] - chunk[i];
            diff * diff
        })
        .into_iter()
        .reduce(|a, b| a + b)
        .unwrap();

        #[allow(unsafe_code)]
        let mask: u32x8 = unsafe { std::mem::transmute(distance.cmp_le(min_distance)) };
        min_chunk = mask.blend(cur_chunk, min_chunk);
        min_distance = min_distance.fast_min(distance);
        cur_chunk += incr;
    }

    let mut min_lane = 0;
    let mut min_dist = f32::INFINITY;
    for (i, &v) in min_distance.as_array_ref().iter().enumerate() {
        if v < min_dist {
            min_dist = v;
            min_lane = i;
        }
    }

    let min_chunk = min_chunk.as_array_ref()[min_lane];

    #[allow(clippy::cast_possible_truncation)]
    {
        (min_chunk as u8, min_lane as u8)
    }
}

/// Transposes centers into groups of eight, padding the last group with infinitely far points.
fn pack(centers: &[Sample]) -> Vec<[f32x8; 3]> {
    let mut packed = Vec::with_capacity(centers.len().div_ceil(8));
    let chunks = centers.chunks_exact(8);
    packed.extend(
        chunks
            .clone()
            .map(|chunk| array::from_fn(|i| f32x8::new(array::from_fn(|j| chunk[j][i])))),
    );

    if !chunks.remainder().is_empty() {
        let mut arr = [[f32::INFINITY; 8]; 3];
        for (i, center) in chunks.remainder().iter().enumerate() {
            for (arr, &c) in arr.iter_mut().zip(center) {
                arr[i] = c;
            }
        }
        packed.push(arr.map(f32x8::new));
    }

    packed
}

#[inline]
fn nearest(packed: &[[f32x8; 3]], sample: Sample) -> u32 {
    let (chunk, lane) = simd_argmin(packed, sample);
    u32::from(chunk) * 8 + u32::from(lane)
}

fn squared_distance(a: Sample, b: Sample) -> f32 {
    let mut dist = 0.0;
    for c in 0..3 {
        let d = a[c] - b[c];
        dist += d * d;
    }
    dist
}

/// Assigns every sample to its nearest center.
fn assign(samples: &[Sample], centers: &[Sample], labels: &mut [u32]) {
    let packed = pack(centers);
    for (label, &sample) in labels.iter_mut().zip(samples) {
        *label = nearest(&packed, sample);
    }
}

/// Assigns every sample to its nearest center in parallel.
#[cfg(feature = "threads")]
fn assign_par(samples: &[Sample], centers: &[Sample], labels: &mut [u32]) {
    let packed = pack(centers);
    labels
        .par_iter_mut()
        .zip(samples.par_iter())
        .for_each(|(label, &sample)| *label = nearest(&packed, sample));
}

fn compactness(samples: &[Sample], centers: &[Sample], labels: &[u32]) -> f64 {
    samples
        .iter()
        .zip(labels)
        .map(|(&sample, &label)| f64::from(squared_distance(sample, centers[label as usize])))
        .sum()
}

fn random_centers(samples: &[Sample], k: usize, rng: &mut Xoroshiro128PlusPlus) -> Vec<Sample> {
    let mut min = [f32::INFINITY; 3];
    let mut max = [f32::NEG_INFINITY; 3];
    for sample in samples {
        for c in 0..3 {
            min[c] = min[c].min(sample[c]);
            max[c] = max[c].max(sample[c]);
        }
    }

    let unit = Uniform::new(0.0f32, 1.0);
    (0..k)
        .map(|_| array::from_fn(|c| min[c] + unit.sample(rng) * (max[c] - min[c])))
        .collect()
}

fn plus_plus_centers(samples: &[Sample], k: usize, rng: &mut Xoroshiro128PlusPlus) -> Vec<Sample> {
    let pick = Uniform::new(0, samples.len());
    let mut centers = Vec::with_capacity(k);
    centers.push(samples[pick.sample(rng)]);

    let mut distances = samples
        .iter()
        .map(|&s| squared_distance(s, centers[0]))
        .collect::<Vec<_>>();

    while centers.len() < k {
        // all samples coincide with a center once the weights sum to zero
        let next = match WeightedAliasIndex::new(distances.clone()) {
            Ok(weighted) => samples[weighted.sample(rng)],
            Err(_) => samples[pick.sample(rng)],
        };
        for (distance, &sample) in distances.iter_mut().zip(samples) {
            *distance = distance.min(squared_distance(sample, next));
        }
        centers.push(next);
    }

    centers
}

/// Moves each center to the mean of its samples.
///
/// An empty cluster takes over the sample of the largest cluster that lies farthest from
/// that cluster's mean.
fn update_centers(samples: &[Sample], labels: &mut [u32], k: usize) -> Vec<Sample> {
    let mut sums = vec![[0.0f64; 3]; k];
    let mut counts = vec![0u32; k];
    for (&sample, &label) in samples.iter().zip(labels.iter()) {
        let sum = &mut sums[label as usize];
        for c in 0..3 {
            sum[c] += f64::from(sample[c]);
        }
        counts[label as usize] += 1;
    }

    for empty in 0..k {
        if counts[empty] != 0 {
            continue;
        }

        let Some(largest) = (0..k).max_by_key(|&i| counts[i]) else {
            break;
        };
        if counts[largest] < 2 {
            break;
        }

        let center = mean(sums[largest], counts[largest]);
        let farthest = samples
            .iter()
            .enumerate()
            .filter(|&(i, _)| labels[i] as usize == largest)
            .max_by_key(|&(_, &sample)| OrderedFloat(squared_distance(sample, center)))
            .map(|(i, _)| i);

        if let Some(i) = farthest {
            for c in 0..3 {
                let v = f64::from(samples[i][c]);
                sums[largest][c] -= v;
                sums[empty][c] = v;
            }
            counts[largest] -= 1;
            counts[empty] = 1;
            #[allow(clippy::cast_possible_truncation)]
            {
                labels[i] = empty as u32;
            }
        }
    }

    sums.into_iter()
        .zip(counts)
        .map(|(sum, count)| mean(sum, count.max(1)))
        .collect()
}

#[allow(clippy::cast_possible_truncation)]
fn mean(sum: [f64; 3], count: u32) -> Sample {
    sum.map(|v| (v / f64::from(count)) as f32)
}

/// Runs a single attempt of Lloyd's algorithm.
fn lloyd(
    samples: &[Sample],
    k: usize,
    options: &KmeansOptions,
    rng: &mut Xoroshiro128PlusPlus,
    assign: fn(&[Sample], &[Sample], &mut [u32]),
) -> Clustering {
    let (max_iterations, epsilon) = options.criteria.resolve();

    let mut centers = match options.init {
        CenterInit::Random => random_centers(samples, k, rng),
        CenterInit::PlusPlus => plus_plus_centers(samples, k, rng),
    };

    let mut labels = vec![0; samples.len()];
    assign(samples, &centers, &mut labels);

    let mut iterations = 0;
    while iterations < max_iterations {
        iterations += 1;

        let updated = update_centers(samples, &mut labels, k);
        let shift = centers
            .iter()
            .zip(&updated)
            .map(|(&old, &new)| OrderedFloat(squared_distance(old, new)))
            .max()
            .map_or(0.0, |d| d.0);

        centers = updated;
        assign(samples, &centers, &mut labels);

        if shift <= epsilon {
            break;
        }
    }

    let compactness = compactness(samples, &centers, &labels);
    Clustering { labels, centers, compactness, iterations }
}

fn run(
    samples: &[Sample],
    k: ClusterCount,
    options: &KmeansOptions,
    assign: fn(&[Sample], &[Sample], &mut [u32]),
) -> Result<Clustering, PrimitiveError> {
    if samples.is_empty() {
        return Err(PrimitiveError::EmptyInput { primitive: "cluster" });
    }
    if samples.len() < k.as_usize() {
        return Err(PrimitiveError::TooFewSamples { samples: samples.len(), k: k.get() });
    }

    let rng = &mut Xoroshiro128PlusPlus::seed_from_u64(options.seed);

    let mut best = lloyd(samples, k.as_usize(), options, rng, assign);
    for _ in 1..options.attempts {
        let attempt = lloyd(samples, k.as_usize(), options, rng, assign);
        if attempt.compactness < best.compactness {
            best = attempt;
        }
    }

    Ok(best)
}

/// Clusters `samples` into exactly `k` groups.
///
/// # Errors
/// Fails with [`PrimitiveError::EmptyInput`] for no samples and
/// [`PrimitiveError::TooFewSamples`] if there are fewer samples than `k`.
pub fn cluster(
    samples: &[Sample],
    k: ClusterCount,
    options: &KmeansOptions,
) -> Result<Clustering, PrimitiveError> {
    run(samples, k, options, assign)
}

/// Clusters `samples` into exactly `k` groups, assigning samples in parallel.
///
/// Given the same options, the result is identical to [`cluster`].
///
/// # Errors
/// See [`cluster`].
#[cfg(feature = "threads")]
pub fn cluster_par(
    samples: &[Sample],
    k: ClusterCount,
    options: &KmeansOptions,
) -> Result<Clustering, PrimitiveError> {
    run(samples, k, options, assign_par)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn k(value: u16) -> ClusterCount {
        ClusterCount::try_from(value).unwrap()
    }

    /// Two tight blobs near black and near white.
    fn two_blobs() -> Vec<Sample> {
        let mut samples = Vec::new();
        for i in 0..50u8 {
            let jitter = f32::from(i % 5) * 0.002;
            samples.push([0.05 + jitter, 0.05, 0.05 + jitter]);
            samples.push([0.95 - jitter, 0.95, 0.95 - jitter]);
        }
        samples
    }

    #[test]
    fn simd_argmin_matches_naive_search() {
        // use a non-multiple of 8 to test remainder handling
        let centers = (0..21u8)
            .map(|i| {
                let v = f32::from(i) / 20.0;
                [v, 1.0 - v, (v * 7.0).fract()]
            })
            .collect::<Vec<_>>();
        let packed = pack(&centers);

        for i in 0..100u8 {
            let query = [f32::from(i) / 99.0, f32::from(i % 7) / 6.0, 0.5];
            let expected = centers
                .iter()
                .map(|&c| OrderedFloat(squared_distance(c, query)))
                .min()
                .unwrap()
                .0;
            let actual = squared_distance(centers[nearest(&packed, query) as usize], query);

            #[allow(clippy::float_cmp)]
            {
                assert_eq!(expected, actual);
            }
        }
    }

    #[test]
    fn separates_two_blobs() {
        let samples = two_blobs();
        let options = KmeansOptions::new().init(CenterInit::PlusPlus).seed(7);
        let result = cluster(&samples, k(2), &options).unwrap();

        assert_eq!(result.centers.len(), 2);
        assert_ne!(result.labels[0], result.labels[1]);
        for pair in result.labels.chunks_exact(2) {
            assert_eq!(pair[0], result.labels[0]);
            assert_eq!(pair[1], result.labels[1]);
        }
        assert!(result.compactness < 0.01);
    }

    #[test]
    fn labels_index_centers() {
        let samples = two_blobs();
        for init in [CenterInit::Random, CenterInit::PlusPlus] {
            let options = KmeansOptions::new().init(init).seed(3);
            let result = cluster(&samples, k(5), &options).unwrap();
            assert_eq!(result.centers.len(), 5);
            assert_eq!(result.labels.len(), samples.len());
            assert!(result.labels.iter().all(|&l| l < 5));
            assert!(result.iterations <= 10);
        }
    }

    #[test]
    fn labels_are_nearest_centers() {
        let samples = two_blobs();
        let options = KmeansOptions::new().criteria(TermCriteria::iterations(3)).seed(11);
        let result = cluster(&samples, k(3), &options).unwrap();

        for (&sample, &label) in samples.iter().zip(&result.labels) {
            let own = squared_distance(sample, result.centers[label as usize]);
            assert!(result.centers.iter().all(|&c| own <= squared_distance(sample, c)));
        }
    }

    #[test]
    fn identical_samples_keep_k_centers() {
        let samples = vec![[0.25, 0.5, 0.75]; 16];
        let result = cluster(&samples, k(4), &KmeansOptions::new()).unwrap();
        assert_eq!(result.centers.len(), 4);
        assert!(result.labels.iter().all(|&l| l < 4));
        for (&sample, &label) in samples.iter().zip(&result.labels) {
            assert_eq!(result.centers[label as usize], sample);
        }
    }

    #[test]
    fn same_seed_same_result() {
        let samples = two_blobs();
        let options = KmeansOptions::new().attempts(2).seed(99);
        let a = cluster(&samples, k(4), &options).unwrap();
        let b = cluster(&samples, k(4), &options).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    #[cfg(feature = "threads")]
    fn single_and_multi_threaded_match() {
        let samples = two_blobs();
        let options = KmeansOptions::new().init(CenterInit::PlusPlus).seed(5);
        let single = cluster(&samples, k(6), &options).unwrap();
        let par = cluster_par(&samples, k(6), &options).unwrap();
        assert_eq!(single, par);
    }

    #[test]
    fn too_few_samples() {
        let samples = vec![[0.0; 3]; 3];
        assert_eq!(
            cluster(&samples, k(4), &KmeansOptions::new()),
            Err(PrimitiveError::TooFewSamples { samples: 3, k: 4 })
        );
        assert_eq!(
            cluster(&[], k(1), &KmeansOptions::new()),
            Err(PrimitiveError::EmptyInput { primitive: "cluster" })
        );
    }
}
