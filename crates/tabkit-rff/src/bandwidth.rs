//! Kernel bandwidth estimation from streamed training data.
//!
//! The bandwidth of each column is the median pairwise distance between
//! training rows, using squared L2 for Gaussian kernels and L1 for Laplacian
//! kernels. Rows are streamed exactly once into a fixed-capacity reservoir per
//! column, so the estimate never buffers more than `capacity` rows.
//!
//! Pair selection, with `n` rows in the reservoir:
//! - `n < capacity` and `n(n-1)/2 <= capacity`: every pair is measured;
//! - otherwise: the `n/2` disjoint adjacent pairs `(0,1), (2,3), ...` are
//!   measured, bounding the cost by the capacity.
//!
//! Fewer than two rows, or a median of exactly zero, fall back to `1.0`.

use log::{debug, info};

use crate::data::{read_features, ColumnType, DataView, FeatureVector};
use crate::error::{Result, RffError};
use crate::kernel::DistanceMetric;
use crate::reservoir::ReservoirSampler;
use crate::rng::TauswortheHybrid;
use crate::stats::median_in_place;

/// Default number of rows kept per column.
pub const DEFAULT_RESERVOIR_CAPACITY: usize = 5000;

/// Bandwidth used when the data cannot support an estimate.
pub const FALLBACK_BANDWIDTH: f32 = 1.0;

impl DistanceMetric {
    /// Distance between two vectors of equal logical length.
    ///
    /// Works on any mix of dense and sparse inputs; implicit zeros are
    /// accounted for without densifying.
    ///
    /// # Panics
    /// Panics if the lengths differ.
    pub fn distance(&self, a: &FeatureVector, b: &FeatureVector) -> f32 {
        assert_eq!(a.len(), b.len(), "distance between vectors of different lengths");
        let sum = match self {
            DistanceMetric::L2Squared => merged_sum(a, b, |d| d * d),
            DistanceMetric::L1 => merged_sum(a, b, f64::abs),
        };
        sum as f32
    }
}

/// Sum `f(a_i - b_i)` over every slot stored in either vector.
fn merged_sum<F: Fn(f64) -> f64>(a: &FeatureVector, b: &FeatureVector, f: F) -> f64 {
    if let (FeatureVector::Dense(x), FeatureVector::Dense(y)) = (a, b) {
        return x
            .iter()
            .zip(y)
            .map(|(&p, &q)| f(f64::from(p) - f64::from(q)))
            .sum();
    }

    let mut lhs = a.entries().peekable();
    let mut rhs = b.entries().peekable();
    let mut sum = 0.0;
    loop {
        match (lhs.peek().copied(), rhs.peek().copied()) {
            (Some((i, x)), Some((j, y))) => {
                if i == j {
                    sum += f(f64::from(x) - f64::from(y));
                    lhs.next();
                    rhs.next();
                } else if i < j {
                    sum += f(f64::from(x));
                    lhs.next();
                } else {
                    sum += f(-f64::from(y));
                    rhs.next();
                }
            }
            (Some((_, x)), None) => {
                sum += f(f64::from(x));
                lhs.next();
            }
            (None, Some((_, y))) => {
                sum += f(-f64::from(y));
                rhs.next();
            }
            (None, None) => break,
        }
    }
    sum
}

/// A column taking part in a bandwidth pass.
#[derive(Debug, Clone)]
pub struct BandwidthColumn {
    /// Column name, for messages.
    pub name: String,
    /// Index in the view's schema.
    pub index: usize,
    /// Column type; must be a scalar or a fixed-size vector.
    pub column_type: ColumnType,
    /// Metric of the kernel configured for the column.
    pub metric: DistanceMetric,
}

/// Median-distance bandwidth estimator.
#[derive(Debug, Clone, Copy)]
pub struct BandwidthEstimator {
    capacity: usize,
}

impl Default for BandwidthEstimator {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_RESERVOIR_CAPACITY,
        }
    }
}

impl BandwidthEstimator {
    /// Estimator keeping at most `capacity` rows per column.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity < 2 {
            return Err(RffError::invalid_argument(
                "reservoir_capacity",
                capacity,
                "must be at least 2 to form a pair",
            ));
        }
        Ok(Self { capacity })
    }

    /// Reservoir capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Estimate the bandwidth of a single stream of vectors.
    pub fn estimate<I>(&self, rows: I, metric: DistanceMetric, rng: &mut TauswortheHybrid) -> f32
    where
        I: IntoIterator<Item = FeatureVector>,
    {
        let mut reservoir = ReservoirSampler::new(self.capacity);
        for row in rows {
            reservoir.sample(rng, row);
        }
        self.median_distance(reservoir.items(), metric)
    }

    /// Estimate bandwidths for several columns of `view` in one shared pass.
    ///
    /// Returns one bandwidth per entry of `columns`, in order.
    pub fn estimate_columns(
        &self,
        view: &dyn DataView,
        columns: &[BandwidthColumn],
        rng: &mut TauswortheHybrid,
    ) -> Result<Vec<f32>> {
        let mut expected = Vec::with_capacity(columns.len());
        for column in columns {
            let len = column.column_type.feature_len().ok_or_else(|| {
                RffError::schema_mismatch(
                    column.name.clone(),
                    "a float scalar or fixed-size float vector",
                    column.column_type,
                )
            })?;
            expected.push(len);
        }

        let active: Vec<usize> = columns.iter().map(|c| c.index).collect();
        let mut cursor = view.cursor(&active)?;
        let mut reservoirs: Vec<ReservoirSampler<FeatureVector>> = columns
            .iter()
            .map(|_| ReservoirSampler::new(self.capacity))
            .collect();
        let mut scratch = FeatureVector::default();
        let mut rows = 0u64;

        while cursor.move_next()? {
            rows += 1;
            for ((column, reservoir), &len) in columns.iter().zip(&mut reservoirs).zip(&expected) {
                read_features(cursor.as_mut(), column.index, column.column_type, &mut scratch)?;
                if scratch.len() != len {
                    return Err(RffError::schema_mismatch(
                        column.name.clone(),
                        format!("vector of length {}", len),
                        format!("length {} at row {}", scratch.len(), rows - 1),
                    ));
                }
                reservoir.try_sample_with(rng, || Ok::<_, RffError>(scratch.clone()))?;
            }
        }
        debug!("bandwidth pass scanned {} rows for {} columns", rows, columns.len());

        Ok(columns
            .iter()
            .zip(&reservoirs)
            .map(|(column, reservoir)| {
                let bandwidth = self.median_distance(reservoir.items(), column.metric);
                debug!("column '{}': estimated bandwidth {}", column.name, bandwidth);
                bandwidth
            })
            .collect())
    }

    /// Median pairwise distance among `samples`, with the documented fallbacks.
    pub fn median_distance(&self, samples: &[FeatureVector], metric: DistanceMetric) -> f32 {
        let n = samples.len();
        if n < 2 {
            info!(
                "bandwidth estimate needs at least 2 rows, got {}; using {}",
                n, FALLBACK_BANDWIDTH
            );
            return FALLBACK_BANDWIDTH;
        }

        let mut distances = if n < self.capacity && n * (n - 1) / 2 <= self.capacity {
            let mut all = Vec::with_capacity(n * (n - 1) / 2);
            for i in 0..n {
                for j in (i + 1)..n {
                    all.push(metric.distance(&samples[i], &samples[j]));
                }
            }
            all
        } else {
            samples
                .chunks_exact(2)
                .map(|pair| metric.distance(&pair[0], &pair[1]))
                .collect()
        };

        match median_in_place(&mut distances) {
            Some(median) if median > 0.0 && median.is_finite() => median,
            Some(median) => {
                info!(
                    "median pairwise distance is {}; using bandwidth {}",
                    median, FALLBACK_BANDWIDTH
                );
                FALLBACK_BANDWIDTH
            }
            None => {
                info!(
                    "no finite pairwise distances; using bandwidth {}",
                    FALLBACK_BANDWIDTH
                );
                FALLBACK_BANDWIDTH
            }
        }
    }
}
