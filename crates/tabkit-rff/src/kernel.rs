//! Shift-invariant kernels and their Fourier-domain samplers.
//!
//! By Bochner's theorem a shift-invariant kernel `k(x - y)` is the Fourier
//! transform of a non-negative measure. Drawing frequencies from that measure
//! and projecting inputs onto them gives random features whose inner products
//! approximate the kernel (Rahimi & Recht, 2007).
//!
//! | Kernel | `k(x, y)` | Spectral measure | Bandwidth metric |
//! |---|---|---|---|
//! | Gaussian | `exp(-γ‖x-y‖²)` | `N(0, 2γ)` | squared L2 |
//! | Laplacian | `exp(-a‖x-y‖₁)` | `Cauchy(0, a)` | L1 |
//!
//! The configured parameter is divided by the bandwidth estimated from the
//! training data; the resulting coefficient is what a [`FourierSampler`]
//! holds and persists.

use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::{Deserialize, Serialize};

use crate::error::{Result, RffError};
use crate::model::{self, VersionInfo};
use crate::rng::TauswortheHybrid;
use crate::stats::{standard_cauchy, standard_normal};

/// Kernel choice as it appears in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum KernelSpec {
    /// Gaussian kernel `exp(-gamma * ||x - y||²)`.
    Gaussian {
        #[serde(default = "default_kernel_param")]
        gamma: f32,
    },
    /// Laplacian kernel `exp(-a * ||x - y||₁)`.
    Laplacian {
        #[serde(default = "default_kernel_param")]
        a: f32,
    },
}

fn default_kernel_param() -> f32 {
    1.0
}

impl Default for KernelSpec {
    fn default() -> Self {
        Self::Gaussian { gamma: 1.0 }
    }
}

/// Distance used to estimate a kernel's bandwidth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistanceMetric {
    /// Sum of squared coordinate differences.
    L2Squared,
    /// Sum of absolute coordinate differences.
    L1,
}

impl KernelSpec {
    /// Gaussian kernel with the given `gamma`.
    pub fn gaussian(gamma: f32) -> Self {
        Self::Gaussian { gamma }
    }

    /// Laplacian kernel with the given `a`.
    pub fn laplacian(a: f32) -> Self {
        Self::Laplacian { a }
    }

    /// Human-readable kernel name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Gaussian { .. } => "Gaussian",
            Self::Laplacian { .. } => "Laplacian",
        }
    }

    /// The raw kernel parameter (`gamma` or `a`).
    pub fn parameter(&self) -> f32 {
        match *self {
            Self::Gaussian { gamma } => gamma,
            Self::Laplacian { a } => a,
        }
    }

    /// Metric matching the kernel's definition.
    pub fn metric(&self) -> DistanceMetric {
        match self {
            Self::Gaussian { .. } => DistanceMetric::L2Squared,
            Self::Laplacian { .. } => DistanceMetric::L1,
        }
    }

    /// Check that the kernel parameter is finite and positive.
    pub fn validate(&self) -> Result<()> {
        let (name, value) = match *self {
            Self::Gaussian { gamma } => ("gamma", gamma),
            Self::Laplacian { a } => ("a", a),
        };
        if !value.is_finite() || value <= 0.0 {
            return Err(RffError::invalid_argument(
                name,
                value,
                "kernel parameter must be finite and positive",
            ));
        }
        Ok(())
    }

    /// Build the Fourier sampler for a training set with the given bandwidth.
    ///
    /// # Panics
    /// Panics if `avg_distance` is not a positive finite number; the bandwidth
    /// estimator never produces one.
    pub fn sampler(&self, avg_distance: f32) -> Result<FourierSampler> {
        assert!(
            avg_distance.is_finite() && avg_distance > 0.0,
            "bandwidth must be positive and finite, got {}",
            avg_distance
        );
        self.validate()?;

        let coefficient = self.parameter() / avg_distance;
        if !coefficient.is_finite() || coefficient <= 0.0 {
            return Err(RffError::invalid_argument(
                "avg_distance",
                avg_distance,
                format!(
                    "{} parameter {} over this bandwidth is not representable",
                    self.name(),
                    self.parameter()
                ),
            ));
        }

        Ok(match self {
            Self::Gaussian { .. } => FourierSampler::Gaussian { gamma: coefficient },
            Self::Laplacian { .. } => FourierSampler::Laplacian { a: coefficient },
        })
    }
}

/// Draws frequencies from a kernel's spectral measure.
///
/// Holds the composed coefficient (kernel parameter over bandwidth), which is
/// exactly what gets persisted, so a reloaded sampler draws identical values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FourierSampler {
    /// Draws from `N(0, 2 * gamma)`.
    Gaussian { gamma: f32 },
    /// Draws from `Cauchy(0, a)`.
    Laplacian { a: f32 },
}

impl FourierSampler {
    /// Sub-model header for the Gaussian sampler.
    pub const GAUSSIAN_VERSION: VersionInfo =
        VersionInfo::new(b"RND GAUS", 0x0001_0001, 0x0001_0001, 0x0001_0001);

    /// Sub-model header for the Laplacian sampler.
    pub const LAPLACIAN_VERSION: VersionInfo =
        VersionInfo::new(b"RND LPLC", 0x0001_0001, 0x0001_0001, 0x0001_0001);

    /// The composed coefficient.
    pub fn coefficient(&self) -> f32 {
        match *self {
            Self::Gaussian { gamma } => gamma,
            Self::Laplacian { a } => a,
        }
    }

    /// Kernel name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Gaussian { .. } => "Gaussian",
            Self::Laplacian { .. } => "Laplacian",
        }
    }

    fn version(&self) -> &'static VersionInfo {
        match self {
            Self::Gaussian { .. } => &Self::GAUSSIAN_VERSION,
            Self::Laplacian { .. } => &Self::LAPLACIAN_VERSION,
        }
    }

    /// Draw one frequency.
    pub fn next(&self, rng: &mut TauswortheHybrid) -> f32 {
        match *self {
            Self::Gaussian { gamma } => {
                (standard_normal(rng) * (2.0 * f64::from(gamma)).sqrt()) as f32
            }
            Self::Laplacian { a } => (f64::from(a) * standard_cauchy(rng)) as f32,
        }
    }

    /// Write the sampler as a nested sub-model.
    pub fn save<W: Write>(&self, writer: &mut W) -> Result<()> {
        self.version().write_header(writer)?;
        writer.write_f32::<LittleEndian>(self.coefficient())?;
        Ok(())
    }

    /// Read a sampler written by [`FourierSampler::save`].
    pub fn load<R: Read>(reader: &mut R) -> Result<Self> {
        let signature = model::read_signature(reader)?;
        let version = if signature == Self::GAUSSIAN_VERSION.signature {
            &Self::GAUSSIAN_VERSION
        } else if signature == Self::LAPLACIAN_VERSION.signature {
            &Self::LAPLACIAN_VERSION
        } else {
            return Err(RffError::decode(format!(
                "unknown kernel sampler signature '{}'",
                String::from_utf8_lossy(&signature)
            )));
        };
        version.read_versions(reader)?;

        let coefficient = reader.read_f32::<LittleEndian>()?;
        if !coefficient.is_finite() || coefficient <= 0.0 {
            return Err(RffError::decode(format!(
                "'{}' coefficient must be positive and finite, found {}",
                version.name(),
                coefficient
            )));
        }

        Ok(if version.signature == Self::GAUSSIAN_VERSION.signature {
            Self::Gaussian { gamma: coefficient }
        } else {
            Self::Laplacian { a: coefficient }
        })
    }
}
