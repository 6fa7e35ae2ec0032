//! Learned per-column artifact: projection matrix, rotation phases, and the
//! generator state and sampler they were drawn from.
//!
//! A [`TransformInfo`] never stores its matrix. It stores the generator state
//! captured before any draw plus the kernel sampler, and regenerates the
//! matrix from a fresh generator built from that state. Building and loading
//! take the same path, so a reloaded transform projects bit-identically.
//!
//! Persisted layout, little-endian:
//!
//! | Field | Type |
//! |---|---|
//! | `src_dim` | `i32` |
//! | `new_dim` | `i32` |
//! | `use_sin` | `u8` |
//! | state word count (4) | `i32` |
//! | state words | `4 × u32` |
//! | kernel sampler | nested sub-model |

use std::f32::consts::PI;
use std::io::{Read, Write};

use log::debug;

use crate::aligned::{AlignedBuffer, AlignedMatrix, LANES};
use crate::config::ColumnSpec;
use crate::env::HostEnv;
use crate::error::{Result, RffError};
use crate::kernel::FourierSampler;
use crate::model;
use crate::rng::{RngState, TauswortheHybrid};

/// Largest padded matrix, in floats (1 GiB of storage).
const MAX_PADDED_CELLS: usize = 1 << 28;

/// Everything needed to project one column.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformInfo {
    src_dim: usize,
    new_dim: usize,
    use_sin: bool,
    matrix: AlignedMatrix,
    phases: Option<AlignedBuffer>,
    state: RngState,
    sampler: FourierSampler,
}

impl TransformInfo {
    /// Build the transform for one column.
    ///
    /// The generator comes from `column.seed` when set, otherwise it is
    /// derived from `host`. `avg_distance` is the estimated bandwidth.
    pub fn build(
        host: &mut HostEnv,
        column: &ColumnSpec,
        src_dim: usize,
        avg_distance: f32,
    ) -> Result<Self> {
        if column.new_dim == 0 {
            return Err(RffError::invalid_argument(
                "new_dim",
                column.new_dim,
                "must be positive",
            ));
        }
        if src_dim == 0 {
            return Err(RffError::invalid_argument(
                "src_dim",
                src_dim,
                "source column must have at least one feature",
            ));
        }
        check_cells(src_dim, column.new_dim).map_err(|reason| {
            RffError::invalid_argument("new_dim", column.new_dim, reason)
        })?;

        let rng = match column.seed {
            Some(seed) => TauswortheHybrid::from_seed(seed),
            None => host.derive_rng(),
        };
        let state = rng.state();
        let sampler = column.kernel.sampler(avg_distance)?;

        debug!(
            "column '{}': building {} transform {} -> {} (use_sin={}, coefficient={})",
            column.output,
            sampler.name(),
            src_dim,
            column.new_dim,
            column.use_sin,
            sampler.coefficient()
        );
        Ok(Self::generate(
            src_dim,
            column.new_dim,
            column.use_sin,
            state,
            sampler,
        ))
    }

    /// Draw the matrix, then the phases, from a fresh generator at `state`.
    fn generate(
        src_dim: usize,
        new_dim: usize,
        use_sin: bool,
        state: RngState,
        sampler: FourierSampler,
    ) -> Self {
        let mut rng = TauswortheHybrid::from_state(state);

        let mut matrix = AlignedMatrix::zeroed(new_dim, src_dim);
        for i in 0..new_dim {
            for cell in matrix.row_mut(i) {
                *cell = sampler.next(&mut rng);
            }
        }

        let phases = if use_sin {
            None
        } else {
            let mut phases = AlignedBuffer::zeroed(new_dim);
            for phase in &mut phases.as_mut_slice()[..new_dim] {
                *phase = (0.5 - rng.next_f32()) * PI;
            }
            Some(phases)
        };

        Self {
            src_dim,
            new_dim,
            use_sin,
            matrix,
            phases,
            state,
            sampler,
        }
    }

    /// Source vector length.
    pub fn src_dim(&self) -> usize {
        self.src_dim
    }

    /// Number of random frequencies.
    pub fn new_dim(&self) -> usize {
        self.new_dim
    }

    /// Whether the output pairs cosines with sines instead of using phases.
    pub fn use_sin(&self) -> bool {
        self.use_sin
    }

    /// Length of a projected vector: `new_dim`, or `2 * new_dim` with `use_sin`.
    pub fn output_len(&self) -> usize {
        if self.use_sin {
            2 * self.new_dim
        } else {
            self.new_dim
        }
    }

    /// The `new_dim × src_dim` projection matrix.
    pub fn matrix(&self) -> &AlignedMatrix {
        &self.matrix
    }

    /// Rotation phases, absent when `use_sin` is set.
    pub fn phases(&self) -> Option<&[f32]> {
        self.phases.as_ref().map(AlignedBuffer::logical)
    }

    /// Generator state the matrix was drawn from.
    pub fn state(&self) -> RngState {
        self.state
    }

    /// Kernel sampler the matrix was drawn with.
    pub fn sampler(&self) -> FourierSampler {
        self.sampler
    }

    /// Write the per-column block.
    pub fn save<W: Write>(&self, writer: &mut W) -> Result<()> {
        model::write_dim(writer, "src_dim", self.src_dim)?;
        model::write_dim(writer, "new_dim", self.new_dim)?;
        model::write_bool(writer, self.use_sin)?;
        self.state.save(writer)?;
        self.sampler.save(writer)
    }

    /// Read a block written by [`TransformInfo::save`] and regenerate the matrix.
    pub fn load<R: Read>(reader: &mut R) -> Result<Self> {
        let src_dim = model::read_dim(reader, "src_dim")?;
        let new_dim = model::read_dim(reader, "new_dim")?;
        check_cells(src_dim, new_dim).map_err(RffError::decode)?;
        let use_sin = model::read_bool(reader)?;
        let state = RngState::load(reader)?;
        let sampler = FourierSampler::load(reader)?;

        debug!(
            "loaded {} transform {} -> {} (use_sin={})",
            sampler.name(),
            src_dim,
            new_dim,
            use_sin
        );
        Ok(Self::generate(src_dim, new_dim, use_sin, state, sampler))
    }
}

fn check_cells(src_dim: usize, new_dim: usize) -> std::result::Result<(), String> {
    let padded = src_dim
        .checked_next_multiple_of(LANES)
        .zip(new_dim.checked_next_multiple_of(LANES))
        .and_then(|(cols, rows)| cols.checked_mul(rows));
    match padded {
        Some(cells) if cells <= MAX_PADDED_CELLS => Ok(()),
        _ => Err(format!(
            "a {} x {} projection matrix is too large",
            new_dim, src_dim
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::KernelSpec;
    use std::io::Cursor;

    fn spec(new_dim: usize, use_sin: bool, seed: Option<u32>) -> ColumnSpec {
        let mut column = ColumnSpec::new("x", "rff")
            .with_new_dim(new_dim)
            .with_use_sin(use_sin)
            .with_kernel(KernelSpec::gaussian(1.0));
        column.seed = seed;
        column
    }

    #[test]
    fn test_build_with_seed_is_deterministic() {
        let column = spec(16, false, Some(42));
        let a = TransformInfo::build(&mut HostEnv::with_seed(1), &column, 5, 2.0).unwrap();
        let b = TransformInfo::build(&mut HostEnv::with_seed(2), &column, 5, 2.0).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.state(), TauswortheHybrid::from_seed(42).state());
    }

    #[test]
    fn test_build_without_seed_uses_host() {
        let column = spec(4, true, None);
        let a = TransformInfo::build(&mut HostEnv::with_seed(7), &column, 3, 1.0).unwrap();
        let b = TransformInfo::build(&mut HostEnv::with_seed(7), &column, 3, 1.0).unwrap();
        assert_eq!(a, b);

        let mut host = HostEnv::with_seed(7);
        let first = TransformInfo::build(&mut host, &column, 3, 1.0).unwrap();
        let second = TransformInfo::build(&mut host, &column, 3, 1.0).unwrap();
        assert_ne!(first.state(), second.state());
    }

    #[test]
    fn test_matrix_matches_sampler_draw_order() {
        let column = spec(3, false, Some(5));
        let info = TransformInfo::build(&mut HostEnv::with_seed(0), &column, 2, 4.0).unwrap();
        let sampler = info.sampler();
        assert_eq!(sampler, FourierSampler::Gaussian { gamma: 0.25 });

        let mut rng = TauswortheHybrid::from_seed(5);
        for i in 0..3 {
            for j in 0..2 {
                assert_eq!(info.matrix().get(i, j).to_bits(), sampler.next(&mut rng).to_bits());
            }
        }
        for &phase in info.phases().unwrap() {
            let expected = (0.5 - rng.next_f32()) * PI;
            assert_eq!(phase.to_bits(), expected.to_bits());
        }
    }

    #[test]
    fn test_padding_is_zero() {
        let column = spec(3, false, Some(5));
        let info = TransformInfo::build(&mut HostEnv::with_seed(0), &column, 2, 1.0).unwrap();
        for i in 0..3 {
            assert!(info.matrix().row(i)[2..].iter().all(|&v| v == 0.0));
        }
    }

    #[test]
    fn test_phase_range_and_output_len() {
        let info =
            TransformInfo::build(&mut HostEnv::with_seed(0), &spec(200, false, Some(3)), 4, 1.0)
                .unwrap();
        let phases = info.phases().unwrap();
        assert_eq!(phases.len(), 200);
        assert!(phases.iter().all(|&p| p > -PI / 2.0 && p <= PI / 2.0));
        assert_eq!(info.output_len(), 200);

        let info =
            TransformInfo::build(&mut HostEnv::with_seed(0), &spec(10, true, Some(3)), 4, 1.0)
                .unwrap();
        assert!(info.phases().is_none());
        assert_eq!(info.output_len(), 20);
    }

    #[test]
    fn test_build_rejects_zero_dims() {
        let mut host = HostEnv::with_seed(0);
        let err = TransformInfo::build(&mut host, &spec(0, false, None), 4, 1.0).unwrap_err();
        assert!(matches!(err, RffError::InvalidArgument { .. }));
        assert!(TransformInfo::build(&mut host, &spec(4, false, None), 0, 1.0).is_err());
    }

    #[test]
    fn test_save_load_regenerates_identically() {
        for (use_sin, kernel) in [
            (false, KernelSpec::gaussian(0.5)),
            (true, KernelSpec::laplacian(2.0)),
        ] {
            let column = spec(12, use_sin, None).with_kernel(kernel);
            let info =
                TransformInfo::build(&mut HostEnv::with_seed(11), &column, 6, 3.0).unwrap();

            let mut bytes = Vec::new();
            info.save(&mut bytes).unwrap();
            // dims + flag + state block + sampler sub-model
            assert_eq!(bytes.len(), 4 + 4 + 1 + 4 + 16 + 8 + 12 + 4);

            let loaded = TransformInfo::load(&mut Cursor::new(bytes)).unwrap();
            assert_eq!(loaded, info);
        }
    }

    #[test]
    fn test_load_rejects_truncated() {
        let info =
            TransformInfo::build(&mut HostEnv::with_seed(0), &spec(4, false, Some(1)), 2, 1.0)
                .unwrap();
        let mut bytes = Vec::new();
        info.save(&mut bytes).unwrap();
        bytes.truncate(bytes.len() - 2);
        assert!(matches!(
            TransformInfo::load(&mut Cursor::new(bytes)),
            Err(RffError::Decode(_))
        ));
    }

    #[test]
    fn test_load_rejects_bad_state_count() {
        let info =
            TransformInfo::build(&mut HostEnv::with_seed(0), &spec(4, false, Some(1)), 2, 1.0)
                .unwrap();
        let mut bytes = Vec::new();
        info.save(&mut bytes).unwrap();
        bytes[9..13].copy_from_slice(&3i32.to_le_bytes());
        assert!(TransformInfo::load(&mut Cursor::new(bytes)).is_err());
    }

    #[test]
    fn test_build_rejects_oversized_matrix() {
        let mut host = HostEnv::with_seed(0);
        let column = spec(1 << 20, false, Some(1));
        let err = TransformInfo::build(&mut host, &column, 1 << 10, 1.0).unwrap_err();
        assert!(matches!(err, RffError::InvalidArgument { .. }));

        let column = spec(usize::MAX, false, Some(1));
        let err = TransformInfo::build(&mut host, &column, 1, 1.0).unwrap_err();
        assert!(matches!(err, RffError::InvalidArgument { .. }));
    }

    #[test]
    fn test_load_rejects_oversized_dims_before_allocating() {
        let info =
            TransformInfo::build(&mut HostEnv::with_seed(0), &spec(4, false, Some(1)), 1, 1.0)
                .unwrap();
        let mut bytes = Vec::new();
        info.save(&mut bytes).unwrap();
        // new_dim = i32::MAX over a single source feature
        bytes[4..8].copy_from_slice(&i32::MAX.to_le_bytes());
        match TransformInfo::load(&mut Cursor::new(bytes)) {
            Err(RffError::Decode(msg)) => assert!(msg.contains("too large")),
            other => panic!("expected decode error, got {:?}", other),
        }
    }
}
