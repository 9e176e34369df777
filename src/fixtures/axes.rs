//! Axis signatures and the combinatorial sweep over them.
use crate::config::GenerateConfig;
use anyhow::{anyhow, Result};
use std::collections::BTreeSet;
use std::fmt;

pub const AXIS_Y: char = 'Y';
pub const AXIS_X: char = 'X';
pub const AXIS_CHANNEL: char = 'C';
pub const AXIS_SAMPLE: char = 'S';
pub const AXIS_Q: char = 'Q';

/// Ordered, distinct axis labels paired with positive extents.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AxisSignature {
    labels: Vec<char>,
    extents: Vec<usize>,
}

impl AxisSignature {
    pub fn new(labels: Vec<char>, extents: Vec<usize>) -> Result<Self> {
        if labels.len() != extents.len() {
            return Err(anyhow!(
                "{} axis labels but {} extents",
                labels.len(),
                extents.len()
            ));
        }
        let distinct: BTreeSet<char> = labels.iter().copied().collect();
        if distinct.len() != labels.len() {
            return Err(anyhow!("axis labels {labels:?} are not unique"));
        }
        if extents.contains(&0) {
            return Err(anyhow!("axis extents {extents:?} must be positive"));
        }
        Ok(Self { labels, extents })
    }

    pub fn axes(&self) -> String {
        self.labels.iter().collect()
    }

    pub fn shape(&self) -> &[usize] {
        &self.extents
    }

    pub fn ndim(&self) -> usize {
        self.labels.len()
    }

    pub fn contains(&self, label: char) -> bool {
        self.labels.contains(&label)
    }

    /// Images always carry Y and X; C aliases S, so the two never co-occur.
    pub fn is_admissible(&self) -> bool {
        self.contains(AXIS_Y)
            && self.contains(AXIS_X)
            && !(self.contains(AXIS_CHANNEL) && self.contains(AXIS_SAMPLE))
    }

    /// Append every label of `extra` not already present as a singleton axis.
    pub fn padded(&self, extra: &[char]) -> Self {
        let mut labels = self.labels.clone();
        let mut extents = self.extents.clone();
        for &label in extra {
            if !labels.contains(&label) {
                labels.push(label);
                extents.push(1);
            }
        }
        Self { labels, extents }
    }

    /// Same axes and extents in reverse order.
    pub fn reversed(&self) -> Self {
        Self {
            labels: self.labels.iter().rev().copied().collect(),
            extents: self.extents.iter().rev().copied().collect(),
        }
    }

    /// File-name fragment such as `y10_x11_z12`.
    pub fn hint(&self) -> String {
        self.labels
            .iter()
            .zip(&self.extents)
            .map(|(label, extent)| format!("{}{extent}", label.to_ascii_lowercase()))
            .collect::<Vec<_>>()
            .join("_")
    }
}

impl fmt::Display for AxisSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:?}", self.axes(), self.extents)
    }
}

/// Singleton padding applied to every base signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// Keep the signature as drawn.
    Bare,
    /// Pad with every universe axis except `C`.
    AllButChannel,
    /// Pad with every universe axis except `S`.
    AllButSample,
}

impl Completion {
    pub const ALL: [Completion; 3] = [
        Completion::Bare,
        Completion::AllButChannel,
        Completion::AllButSample,
    ];

    /// Labels to pad with, in universe order.
    pub fn padding(&self, universe: &[char]) -> Vec<char> {
        let excluded = match self {
            Completion::Bare => return Vec::new(),
            Completion::AllButChannel => AXIS_CHANNEL,
            Completion::AllButSample => AXIS_SAMPLE,
        };
        universe
            .iter()
            .copied()
            .filter(|&label| label != excluded)
            .collect()
    }

    /// Apply the padding; `None` when the result would hold both C and S.
    pub fn apply(&self, base: &AxisSignature, universe: &[char]) -> Option<AxisSignature> {
        let completed = base.padded(&self.padding(universe));
        if completed.contains(AXIS_CHANNEL) && completed.contains(AXIS_SAMPLE) {
            return None;
        }
        Some(completed)
    }
}

/// All `r`-combinations of `items`, in lexicographic index order.
pub fn combinations<T: Copy>(items: &[T], r: usize) -> Vec<Vec<T>> {
    let n = items.len();
    if r > n {
        return Vec::new();
    }
    let mut out = Vec::new();
    let mut indices: Vec<usize> = (0..r).collect();
    loop {
        out.push(indices.iter().map(|&i| items[i]).collect());
        let Some(pivot) = (0..r).rev().find(|&i| indices[i] != i + n - r) else {
            return out;
        };
        indices[pivot] += 1;
        for j in pivot + 1..r {
            indices[j] = indices[j - 1] + 1;
        }
    }
}

/// Extent for `label` at `position` within its combination.
pub fn extent_for(label: char, position: usize, config: &GenerateConfig) -> usize {
    match label {
        AXIS_CHANNEL => config.channel_extent,
        AXIS_SAMPLE => config.sample_extent,
        _ => config.base_extent + position,
    }
}

/// Build a signature for `labels` using the configured extent rule.
pub fn signature_for(labels: &[char], config: &GenerateConfig) -> Result<AxisSignature> {
    let extents = labels
        .iter()
        .enumerate()
        .map(|(position, &label)| extent_for(label, position, config))
        .collect();
    AxisSignature::new(labels.to_vec(), extents)
}

/// Every base signature: combinations of size 2..=|universe| holding Y and X.
pub fn base_signatures(config: &GenerateConfig) -> Result<Vec<AxisSignature>> {
    let universe: Vec<char> = config.axes_universe.chars().collect();
    let mut signatures = Vec::new();
    for r in 2..=universe.len() {
        for labels in combinations(&universe, r) {
            if !(labels.contains(&AXIS_Y) && labels.contains(&AXIS_X)) {
                continue;
            }
            signatures.push(signature_for(&labels, config)?);
        }
    }
    Ok(signatures)
}
