//! Sample Volume synthesis: a seeded uniform field smoothed by a separable
//! Gaussian blur.
use anyhow::{anyhow, Context, Result};
use ndarray::{ArrayD, Axis, IxDyn};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use std::collections::{BTreeMap, BTreeSet};

/// Kernel half-width in standard deviations.
const TRUNCATE: f64 = 4.0;

/// Blur width used when none is configured: half the smallest extent.
pub fn auto_sigma(shape: &[usize]) -> f64 {
    shape.iter().copied().min().unwrap_or(1) as f64 / 2.0
}

/// Fill `shape` with uniform `[0, 1)` samples drawn from `rng`, then blur.
pub fn synthesize<R: Rng>(shape: &[usize], sigma: f64, rng: &mut R) -> Result<ArrayD<f64>> {
    let count: usize = shape.iter().product();
    let values: Vec<f64> = (0..count).map(|_| rng.gen::<f64>()).collect();
    let mut data = ArrayD::from_shape_vec(IxDyn(shape), values)
        .with_context(|| format!("shape sample volume {shape:?}"))?;
    gaussian_filter(&mut data, sigma);
    Ok(data)
}

/// Normalized 1-D Gaussian weights covering `[-radius, radius]`.
pub fn gaussian_kernel(sigma: f64) -> Vec<f64> {
    let radius = (TRUNCATE * sigma + 0.5) as isize;
    let weights: Vec<f64> = (-radius..=radius)
        .map(|x| (-0.5 * (x * x) as f64 / (sigma * sigma)).exp())
        .collect();
    let total: f64 = weights.iter().sum();
    weights.into_iter().map(|w| w / total).collect()
}

/// Mirror an out-of-range index back into `0..n` (`d c b a | a b c d | d c b a`).
fn reflect_index(index: isize, n: usize) -> usize {
    let n = n as isize;
    let period = 2 * n;
    let wrapped = index.rem_euclid(period);
    let mirrored = if wrapped >= n { period - 1 - wrapped } else { wrapped };
    mirrored as usize
}

/// Blur every axis in turn with the same Gaussian.
pub fn gaussian_filter(data: &mut ArrayD<f64>, sigma: f64) {
    if sigma <= 1e-15 {
        return;
    }
    let kernel = gaussian_kernel(sigma);
    let radius = (kernel.len() / 2) as isize;
    for axis in 0..data.ndim() {
        for mut lane in data.lanes_mut(Axis(axis)) {
            let source = lane.to_vec();
            let n = source.len();
            for (i, out) in lane.iter_mut().enumerate() {
                *out = kernel
                    .iter()
                    .enumerate()
                    .map(|(k, weight)| {
                        let offset = i as isize + k as isize - radius;
                        weight * source[reflect_index(offset, n)]
                    })
                    .sum();
            }
        }
    }
}

/// Threshold at the mean into exactly the values `0.0` and `1.0`.
pub fn binarize(data: &ArrayD<f64>) -> Result<ArrayD<f64>> {
    let mean = data
        .mean()
        .ok_or_else(|| anyhow!("cannot binarize an empty volume"))?;
    let binary = data.mapv(|value| if value > mean { 1.0 } else { 0.0 });
    let levels = unique_count(binary.iter());
    if levels != 2 {
        return Err(anyhow!(
            "binary sample has {levels} distinct values, expected 2"
        ));
    }
    Ok(binary)
}

pub fn unique_count<'a, I>(values: I) -> usize
where
    I: IntoIterator<Item = &'a f64>,
{
    values
        .into_iter()
        .map(|value| value.to_bits())
        .collect::<BTreeSet<_>>()
        .len()
}

/// Per-shape cache of Sample Volumes; every shape restarts the same seeded stream.
pub struct SampleVolumes {
    seed: u64,
    sigma: Option<f64>,
    cache: BTreeMap<Vec<usize>, ArrayD<f64>>,
}

impl SampleVolumes {
    pub fn new(seed: u64, sigma: Option<f64>) -> Self {
        Self {
            seed,
            sigma,
            cache: BTreeMap::new(),
        }
    }

    pub fn get(&mut self, shape: &[usize]) -> Result<&ArrayD<f64>> {
        if !self.cache.contains_key(shape) {
            let mut rng = ChaCha20Rng::seed_from_u64(self.seed);
            let sigma = self.sigma.unwrap_or_else(|| auto_sigma(shape));
            let volume = synthesize(shape, sigma, &mut rng)?;
            tracing::debug!(?shape, sigma, "synthesized sample volume");
            self.cache.insert(shape.to_vec(), volume);
        }
        self.cache
            .get(shape)
            .ok_or_else(|| anyhow!("sample volume {shape:?} missing from cache"))
    }

    pub fn cached_shapes(&self) -> usize {
        self.cache.len()
    }
}
