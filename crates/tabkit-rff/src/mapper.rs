//! Row projection.
//!
//! For a source vector `x` and frequencies `W`:
//!
//! - with phases `b`: `z_i(x) = cos(W_i·x + b_i) · sqrt(2 / new_dim)`
//! - with `use_sin`: `z_{2i}(x) = cos(W_i·x) · sqrt(1 / new_dim)` and
//!   `z_{2i+1}(x) = sin(W_i·x) · sqrt(1 / new_dim)`
//!
//! so that `z(x)·z(y)` approximates the kernel `k(x, y)`.
//!
//! A [`RowMapper`] owns the aligned scratch of one caller. A
//! [`TransformInfo`] is immutable and can be shared across threads, each
//! holding its own mapper.

use crate::aligned::AlignedBuffer;
use crate::data::FeatureVector;
use crate::error::{Result, RffError};
use crate::transform_info::TransformInfo;

/// Projector for one column, with caller-owned scratch.
#[derive(Debug, Clone)]
pub struct RowMapper<'a> {
    info: &'a TransformInfo,
    column: &'a str,
    features: AlignedBuffer,
    product: AlignedBuffer,
}

impl<'a> RowMapper<'a> {
    /// Mapper with scratch sized for `info`.
    pub fn new(info: &'a TransformInfo) -> Self {
        Self {
            info,
            column: "<source>",
            features: AlignedBuffer::zeroed(info.src_dim()),
            product: AlignedBuffer::zeroed(info.new_dim()),
        }
    }

    /// Name the source column in error messages.
    pub fn named(mut self, column: &'a str) -> Self {
        self.column = column;
        self
    }

    /// The transform this mapper applies.
    pub fn info(&self) -> &'a TransformInfo {
        self.info
    }

    /// Project `source` into `dst`, replacing its contents.
    ///
    /// Sparse sources only touch the matrix columns of their stored entries.
    pub fn map(&mut self, source: &FeatureVector, dst: &mut Vec<f32>) -> Result<()> {
        let info = self.info;
        if source.len() != info.src_dim() {
            return Err(RffError::schema_mismatch(
                self.column,
                format!("vector of length {}", info.src_dim()),
                format!("length {}", source.len()),
            ));
        }

        match source {
            FeatureVector::Dense(values) => {
                self.features.as_mut_slice()[..values.len()].copy_from_slice(values);
                info.matrix().mul_dense(&self.features, &mut self.product);
            }
            FeatureVector::Sparse {
                indices, values, ..
            } => {
                source.validate().map_err(|err| {
                    RffError::schema_mismatch(self.column, "well-formed sparse vector", err)
                })?;
                info.matrix().mul_sparse(indices, values, &mut self.product);
            }
        }

        let new_dim = info.new_dim();
        let dots = &self.product.as_slice()[..new_dim];
        dst.clear();
        dst.reserve(info.output_len());
        match info.phases() {
            Some(phases) => {
                let scale = (2.0 / new_dim as f32).sqrt();
                dst.extend(
                    dots.iter()
                        .zip(phases)
                        .map(|(&dot, &phase)| (dot + phase).cos() * scale),
                );
            }
            None => {
                let scale = (1.0 / new_dim as f32).sqrt();
                for &dot in dots {
                    let (sin, cos) = dot.sin_cos();
                    dst.push(cos * scale);
                    dst.push(sin * scale);
                }
            }
        }
        Ok(())
    }

    /// Project `source` into a new vector.
    pub fn map_to_vec(&mut self, source: &FeatureVector) -> Result<Vec<f32>> {
        let mut dst = Vec::with_capacity(self.info.output_len());
        self.map(source, &mut dst)?;
        Ok(dst)
    }
}

/// Project one vector with throwaway scratch.
pub fn project(source: &FeatureVector, info: &TransformInfo) -> Result<Vec<f32>> {
    RowMapper::new(info).map_to_vec(source)
}
