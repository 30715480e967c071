//! SMOTE (Synthetic Minority Over-sampling Technique)

use crate::data::take_rows;
use crate::error::{FloodError, Result};
use crate::preprocessing::{column_kind, numeric_values, partition_columns, ColumnKind};
use crate::synthetic::{class_counts, class_indices, ResampleResult};
use ndarray::{Array1, Array2};
use polars::prelude::*;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap};
use tracing::info;

/// Distance/index pair ordered by distance, then index
#[derive(Debug, Clone, Copy)]
struct DistIdx(f64, usize);

impl PartialEq for DistIdx {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}
impl Eq for DistIdx {}
impl PartialOrd for DistIdx {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for DistIdx {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .partial_cmp(&other.0)
            .unwrap_or(Ordering::Equal)
            .then(self.1.cmp(&other.1))
    }
}

/// One synthetic row: `base + gap * (neighbor - base)`, indices into the input rows
#[derive(Debug, Clone, Copy)]
struct Draw {
    base: usize,
    neighbor: usize,
    gap: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Smote {
    k_neighbors: usize,
    /// Target size of every class as a fraction of the majority class
    sampling_ratio: f64,
    seed: u64,
}

impl Default for Smote {
    fn default() -> Self {
        Self::new()
    }
}

impl Smote {
    pub fn new() -> Self {
        Self {
            k_neighbors: 5,
            sampling_ratio: 1.0,
            seed: 42,
        }
    }

    pub fn with_k_neighbors(mut self, k: usize) -> Self {
        self.k_neighbors = k.max(1);
        self
    }

    pub fn with_sampling_ratio(mut self, ratio: f64) -> Self {
        self.sampling_ratio = ratio.clamp(0.1, 1.0);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn k_neighbors(&self) -> usize {
        self.k_neighbors
    }

    /// Oversample an encoded feature matrix
    pub fn fit_resample(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<ResampleResult> {
        check_lengths(x.nrows(), y.len())?;
        let (draws, n_synthetic) = self.plan(x, y)?;

        let n_original = x.nrows();
        let n_total = n_original + draws.len();
        let n_features = x.ncols();

        let mut result_x = Array2::zeros((n_total, n_features));
        result_x.slice_mut(ndarray::s![..n_original, ..]).assign(x);
        for (offset, draw) in draws.iter().enumerate() {
            let base = x.row(draw.base);
            let neighbor = x.row(draw.neighbor);
            let mut row = result_x.row_mut(n_original + offset);
            for j in 0..n_features {
                row[j] = base[j] + draw.gap * (neighbor[j] - base[j]);
            }
        }

        let mut all_y = y.to_vec();
        all_y.extend(draws.iter().map(|d| y[d.base]));

        Ok(ResampleResult {
            x: result_x,
            y: Array1::from_vec(all_y),
            n_synthetic,
        })
    }

    /// Oversample an engineered, unscaled table.
    ///
    /// Neighbors are found on the numeric columns. Numeric columns are
    /// interpolated; categorical columns copy the value of the base row.
    pub fn fit_resample_frame(
        &self,
        df: &DataFrame,
        y: &Array1<f64>,
    ) -> Result<(DataFrame, Array1<f64>)> {
        check_lengths(df.height(), y.len())?;
        let (numeric, _) = partition_columns(df);
        if numeric.is_empty() {
            return Err(FloodError::Imbalance(
                "oversampling needs at least one numeric column".to_string(),
            ));
        }

        let mut points = Array2::zeros((df.height(), numeric.len()));
        for (j, name) in numeric.iter().enumerate() {
            for (i, v) in numeric_values(df, name)?.into_iter().enumerate() {
                points[[i, j]] = v;
            }
        }

        let (draws, _) = self.plan(&points, y)?;
        if draws.is_empty() {
            return Ok((df.clone(), y.clone()));
        }

        // Copies of the base rows, numeric columns then overwritten
        let original = widen_numeric(df)?;
        let bases: Vec<usize> = draws.iter().map(|d| d.base).collect();
        let mut synthetic = take_rows(&original, &bases)?;
        for name in &numeric {
            let values = numeric_values(df, name)?;
            let interpolated: Vec<f64> = draws
                .iter()
                .map(|d| values[d.base] + d.gap * (values[d.neighbor] - values[d.base]))
                .collect();
            synthetic.with_column(Column::new(name.as_str().into(), interpolated))?;
        }
        let combined = original.vstack(&synthetic)?;

        let mut labels = y.to_vec();
        labels.extend(draws.iter().map(|d| y[d.base]));

        Ok((combined, Array1::from_vec(labels)))
    }

    /// Decide every synthetic row up front: which base row, which neighbor, which gap
    fn plan(&self, points: &Array2<f64>, y: &Array1<f64>) -> Result<(Vec<Draw>, BTreeMap<i64, usize>)> {
        let counts = class_counts(y);
        if counts.len() < 2 {
            return Err(FloodError::Imbalance(format!(
                "need at least 2 classes to oversample, found {}",
                counts.len()
            )));
        }

        let max_count = counts.values().copied().max().unwrap_or(0);
        let target = ((max_count as f64) * self.sampling_ratio) as usize;
        let indices = class_indices(y);
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut draws = Vec::new();
        let mut n_synthetic = BTreeMap::new();

        for (class, members) in &indices {
            let needed = target.saturating_sub(members.len());
            n_synthetic.insert(*class, needed);
            if needed == 0 {
                continue;
            }
            if members.len() <= self.k_neighbors {
                return Err(FloodError::Imbalance(format!(
                    "class {} has {} samples, need more than k_neighbors = {}",
                    class,
                    members.len(),
                    self.k_neighbors
                )));
            }

            let neighbors: Vec<Vec<usize>> = (0..members.len())
                .map(|local| nearest_neighbors(points, members, local, self.k_neighbors))
                .collect();

            for _ in 0..needed {
                let local = rng.gen_range(0..members.len());
                let candidates = &neighbors[local];
                let pick = candidates[rng.gen_range(0..candidates.len())];
                let gap: f64 = rng.gen();
                draws.push(Draw {
                    base: members[local],
                    neighbor: members[pick],
                    gap,
                });
            }
        }

        info!(
            original = y.len(),
            synthetic = draws.len(),
            k = self.k_neighbors,
            "SMOTE resampling"
        );
        Ok((draws, n_synthetic))
    }
}

fn check_lengths(rows: usize, labels: usize) -> Result<()> {
    if rows != labels {
        return Err(FloodError::Imbalance(format!(
            "feature rows ({}) and labels ({}) differ in length",
            rows, labels
        )));
    }
    Ok(())
}

/// k nearest members of the same class, excluding the point itself by index.
/// Returned as local positions into `members`.
fn nearest_neighbors(points: &Array2<f64>, members: &[usize], local: usize, k: usize) -> Vec<usize> {
    let point = points.row(members[local]);
    let mut heap: BinaryHeap<DistIdx> = BinaryHeap::with_capacity(k + 1);

    for (other, &row_idx) in members.iter().enumerate() {
        if other == local {
            continue;
        }
        let dist = point
            .iter()
            .zip(points.row(row_idx).iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f64>();
        let candidate = DistIdx(dist, other);
        if heap.len() < k {
            heap.push(candidate);
        } else if let Some(worst) = heap.peek() {
            if candidate < *worst {
                heap.pop();
                heap.push(candidate);
            }
        }
    }

    heap.into_sorted_vec().into_iter().map(|DistIdx(_, i)| i).collect()
}

/// Interpolated values are fractional, so every numeric column becomes Float64
fn widen_numeric(df: &DataFrame) -> Result<DataFrame> {
    let mut out = df.clone();
    for column in df.get_columns() {
        if column_kind(column.dtype()) == ColumnKind::Numeric && column.dtype() != &DataType::Float64 {
            out.with_column(column.cast(&DataType::Float64)?)?;
        }
    }
    Ok(out)
}
