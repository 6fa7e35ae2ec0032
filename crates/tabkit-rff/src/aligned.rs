//! Row-padded, 32-byte aligned `f32` storage and the matrix-vector products
//! used by the projector.
//!
//! Logical dimensions are rounded up to a multiple of [`LANES`]; padding cells
//! are always zero, so they never change a product. Storage is a vector of
//! 32-byte aligned blocks of eight floats, which keeps every row of an
//! [`AlignedMatrix`] on a block boundary.

/// Floats per aligned block.
pub const LANES: usize = 8;

/// Round `n` up to a multiple of [`LANES`].
pub fn round_up(n: usize) -> usize {
    n.div_ceil(LANES) * LANES
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[repr(C, align(32))]
struct Block([f32; LANES]);

/// Zero-padded aligned float buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedBuffer {
    blocks: Vec<Block>,
    len: usize,
}

impl AlignedBuffer {
    /// Zero-filled buffer with `len` logical slots.
    pub fn zeroed(len: usize) -> Self {
        Self {
            blocks: vec![Block::default(); round_up(len) / LANES],
            len,
        }
    }

    /// Logical length.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the logical length is 0.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Length including padding.
    pub fn padded_len(&self) -> usize {
        self.blocks.len() * LANES
    }

    /// All slots, padding included.
    pub fn as_slice(&self) -> &[f32] {
        // SAFETY: `Block` is `repr(C)` over `[f32; LANES]`, so a slice of blocks
        // is a contiguous run of `blocks.len() * LANES` initialized floats.
        unsafe { std::slice::from_raw_parts(self.blocks.as_ptr().cast::<f32>(), self.padded_len()) }
    }

    /// All slots, padding included, mutably.
    ///
    /// Callers must leave the padding slots at zero.
    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        let padded = self.padded_len();
        // SAFETY: as in `as_slice`; the exclusive borrow of `self` covers the blocks.
        unsafe { std::slice::from_raw_parts_mut(self.blocks.as_mut_ptr().cast::<f32>(), padded) }
    }

    /// The logical slots.
    pub fn logical(&self) -> &[f32] {
        &self.as_slice()[..self.len]
    }

    /// Zero every slot.
    pub fn clear(&mut self) {
        self.blocks.fill(Block::default());
    }

    /// Whether the storage starts on a 32-byte boundary.
    pub fn is_aligned(&self) -> bool {
        (self.blocks.as_ptr() as usize) % std::mem::align_of::<Block>() == 0
    }
}

/// Dense row-major matrix whose rows and columns are padded to [`LANES`].
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedMatrix {
    rows: usize,
    cols: usize,
    stride: usize,
    data: AlignedBuffer,
}

impl AlignedMatrix {
    /// Zero-filled `rows × cols` matrix.
    pub fn zeroed(rows: usize, cols: usize) -> Self {
        let stride = round_up(cols);
        Self {
            rows,
            cols,
            stride,
            data: AlignedBuffer::zeroed(round_up(rows) * stride),
        }
    }

    /// Logical row count.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Logical column count.
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Padded row length.
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Cell `(row, col)`.
    pub fn get(&self, row: usize, col: usize) -> f32 {
        assert!(row < self.rows && col < self.cols, "matrix index out of range");
        self.data.as_slice()[row * self.stride + col]
    }

    /// Padded row `row`.
    pub fn row(&self, row: usize) -> &[f32] {
        let start = row * self.stride;
        &self.data.as_slice()[start..start + self.stride]
    }

    /// Logical cells of row `row`, mutably; padding is not exposed.
    pub fn row_mut(&mut self, row: usize) -> &mut [f32] {
        assert!(row < self.rows, "matrix row out of range");
        let start = row * self.stride;
        let cols = self.cols;
        &mut self.data.as_mut_slice()[start..start + cols]
    }

    /// `out[i] = row_i · x` for every logical row.
    ///
    /// `x` must be a buffer of this matrix's column count; `out` of its row count.
    pub fn mul_dense(&self, x: &AlignedBuffer, out: &mut AlignedBuffer) {
        assert_eq!(x.padded_len(), self.stride, "source buffer has the wrong padded length");
        assert!(out.padded_len() >= self.rows, "product buffer is too short");

        let xs = x.as_slice();
        let dst = out.as_mut_slice();
        for (i, slot) in dst.iter_mut().take(self.rows).enumerate() {
            *slot = dot_padded(self.row(i), xs);
        }
    }

    /// `out[i] = Σ_k row_i[indices[k]] · values[k]`, touching only the listed columns.
    pub fn mul_sparse(&self, indices: &[usize], values: &[f32], out: &mut AlignedBuffer) {
        assert_eq!(indices.len(), values.len(), "sparse index/value length mismatch");
        assert!(out.padded_len() >= self.rows, "product buffer is too short");
        if let Some(&last) = indices.last() {
            assert!(last < self.cols, "sparse index out of range");
        }

        let dst = out.as_mut_slice();
        for (i, slot) in dst.iter_mut().take(self.rows).enumerate() {
            let row = self.row(i);
            *slot = indices
                .iter()
                .zip(values)
                .map(|(&j, &v)| row[j] * v)
                .sum();
        }
    }
}

/// Dot product over equal-length padded slices, eight lanes at a time.
#[inline]
fn dot_padded(a: &[f32], b: &[f32]) -> f32 {
    let mut acc = [0.0f32; LANES];
    for (ca, cb) in a.chunks_exact(LANES).zip(b.chunks_exact(LANES)) {
        for ((lane, &x), &y) in acc.iter_mut().zip(ca).zip(cb) {
            *lane += x * y;
        }
    }
    acc.iter().sum()
}
