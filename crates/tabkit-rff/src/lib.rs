//! # tabkit-rff
//!
//! Random Fourier feature (RFF) transforms for tabular pipelines.
//!
//! A random Fourier feature map `z(x)` turns a float vector into a fixed-size
//! vector whose inner products approximate a shift-invariant kernel:
//! `z(x)·z(y) ≈ k(x, y)`. Linear models trained on `z(x)` then behave like
//! kernel machines without ever forming a kernel matrix.
//!
//! ## Features
//!
//! - **Gaussian and Laplacian kernels**, with the bandwidth estimated from the
//!   training data as the median pairwise distance of a reservoir sample
//! - **Single-pass fitting** of any number of columns over one data scan
//! - **Deterministic**: a seeded fit is bit-reproducible, and a saved model
//!   reloads to an identical projection
//! - **Dense and sparse inputs**; sparse rows only touch their stored entries
//! - **Lazy application** through [`TransformedView`], or direct, batched, and
//!   (with the `parallel` feature) multi-threaded projection
//! - **Versioned binary model format** and TOML configuration
//!
//! ## Quick start
//!
//! ```rust
//! use tabkit_rff::{
//!     ColumnSpec, FeatureVector, InMemoryDataView, KernelSpec, RffConfig, RffEstimator,
//!     RffTransform,
//! };
//!
//! let rows: Vec<FeatureVector> = (0..100)
//!     .map(|i| FeatureVector::dense(vec![(i as f32).sin(), (i as f32).cos()]))
//!     .collect();
//! let data = InMemoryDataView::from_vectors("x", 2, rows).unwrap();
//!
//! let config = RffConfig::new(vec![ColumnSpec::new("x", "x_rff")
//!     .with_new_dim(64)
//!     .with_kernel(KernelSpec::laplacian(1.0))])
//! .with_seed(7);
//! let transform = RffEstimator::new(config).unwrap().fit(&data).unwrap();
//!
//! let x = FeatureVector::dense(vec![0.1, 0.2]);
//! assert_eq!(transform.transform("x_rff", &x).unwrap().len(), 64);
//!
//! let mut bytes = Vec::new();
//! transform.save(&mut bytes).unwrap();
//! let reloaded = RffTransform::load(&mut bytes.as_slice()).unwrap();
//! assert_eq!(reloaded, transform);
//! ```
//!
//! ## Logging
//!
//! The crate logs through the [`log`] facade and never installs a logger.
//! Bandwidth fallbacks and model I/O are reported at `info`, per-column
//! details at `debug`.

pub mod aligned;
pub mod bandwidth;
pub mod config;
pub mod data;
pub mod env;
pub mod error;
pub mod kernel;
pub mod mapper;
pub mod model;
pub mod reservoir;
pub mod rng;
pub mod stats;
pub mod transform;
pub mod transform_info;

pub use bandwidth::{BandwidthEstimator, DEFAULT_RESERVOIR_CAPACITY, FALLBACK_BANDWIDTH};
pub use config::{ColumnSpec, RffConfig, DEFAULT_NEW_DIM};
pub use data::{
    ColumnInfo, ColumnType, ColumnValue, DataView, FeatureVector, InMemoryDataView, RowCursor,
    Schema,
};
pub use env::HostEnv;
pub use error::{Result, RffError};
pub use kernel::{DistanceMetric, FourierSampler, KernelSpec};
pub use mapper::{project, RowMapper};
pub use rng::{RngState, TauswortheHybrid};
pub use transform::{FittedColumn, RffEstimator, RffTransform, TransformedView};
pub use transform_info::TransformInfo;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_api_fit_and_project() {
        let data = InMemoryDataView::from_scalars("age", vec![20.0, 35.0, 50.0, 65.0]);
        let config = RffConfig::new(vec![ColumnSpec::new("age", "age_rff").with_new_dim(16)])
            .with_seed(1);
        let transform = RffEstimator::new(config).unwrap().fit(&data).unwrap();

        let z = transform
            .transform("age_rff", &FeatureVector::scalar(40.0))
            .unwrap();
        assert_eq!(z.len(), 16);
        assert!(z.iter().all(|v| v.abs() <= (2.0f32 / 16.0).sqrt() + 1e-6));
    }

    #[test]
    fn test_kernel_names() {
        assert_eq!(KernelSpec::gaussian(1.0).name(), "Gaussian");
        assert_eq!(KernelSpec::laplacian(1.0).name(), "Laplacian");
    }
}
