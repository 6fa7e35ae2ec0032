//! Column-oriented dataset collaborator.
//!
//! The transform only needs a narrow view of the surrounding pipeline's data:
//! - a [`Schema`] mapping column names to indices and [`ColumnType`]s,
//! - a [`RowCursor`] that walks rows once and hands out `f32` scalars or
//!   dense/sparse [`FeatureVector`]s for the columns it was opened with.
//!
//! [`InMemoryDataView`] is a small row store implementing [`DataView`], used by
//! tests, benchmarks, and callers that already hold their rows in memory.
//!
//! ```rust
//! use tabkit_rff::data::{ColumnType, ColumnValue, DataView, FeatureVector, InMemoryDataView, Schema};
//!
//! let schema = Schema::new().with_column("x", ColumnType::Vector(2));
//! let mut view = InMemoryDataView::new(schema);
//! view.push_row(vec![ColumnValue::Vector(FeatureVector::dense(vec![1.0, 0.0]))]).unwrap();
//!
//! let mut cursor = view.cursor(&[0]).unwrap();
//! let mut buf = FeatureVector::default();
//! while cursor.move_next().unwrap() {
//!     cursor.get_vector(0, &mut buf).unwrap();
//!     assert_eq!(buf.len(), 2);
//! }
//! ```

use std::fmt;

use crate::error::{Result, RffError};

/// Type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    /// A single `f32` per row.
    Scalar,
    /// An `f32` vector per row; a size of 0 means the length is not fixed.
    Vector(usize),
    /// Non-numeric data.
    Text,
}

impl ColumnType {
    /// Length of the feature vector a row of this column yields, when fixed.
    ///
    /// Scalars count as length-1 vectors.
    pub fn feature_len(&self) -> Option<usize> {
        match *self {
            ColumnType::Scalar => Some(1),
            ColumnType::Vector(0) | ColumnType::Text => None,
            ColumnType::Vector(n) => Some(n),
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnType::Scalar => write!(f, "R4"),
            ColumnType::Vector(0) => write!(f, "Vector<R4>"),
            ColumnType::Vector(n) => write!(f, "Vector<R4, {}>", n),
            ColumnType::Text => write!(f, "Text"),
        }
    }
}

/// Name and type of one column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    /// Column name.
    pub name: String,
    /// Column type.
    pub column_type: ColumnType,
}

/// Ordered set of columns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema {
    columns: Vec<ColumnInfo>,
}

impl Schema {
    /// Empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a column (builder style).
    pub fn with_column(mut self, name: impl Into<String>, column_type: ColumnType) -> Self {
        self.push(name, column_type);
        self
    }

    /// Append a column.
    pub fn push(&mut self, name: impl Into<String>, column_type: ColumnType) {
        self.columns.push(ColumnInfo {
            name: name.into(),
            column_type,
        });
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Whether the schema has no columns.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Column at `index`.
    pub fn column(&self, index: usize) -> Option<&ColumnInfo> {
        self.columns.get(index)
    }

    /// Index of the column named `name`. Later columns hide earlier ones.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().rposition(|c| c.name == name)
    }

    /// Iterate over the columns.
    pub fn iter(&self) -> impl Iterator<Item = &ColumnInfo> {
        self.columns.iter()
    }
}

/// Dense or sparse `f32` vector.
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureVector {
    /// Every slot stored.
    Dense(Vec<f32>),
    /// Only explicit entries stored; other slots are zero.
    Sparse {
        /// Logical length.
        len: usize,
        /// Strictly increasing slot indices.
        indices: Vec<usize>,
        /// Values matching `indices`.
        values: Vec<f32>,
    },
}

impl Default for FeatureVector {
    fn default() -> Self {
        FeatureVector::Dense(Vec::new())
    }
}

impl FeatureVector {
    /// Dense vector.
    pub fn dense(values: Vec<f32>) -> Self {
        FeatureVector::Dense(values)
    }

    /// Length-1 vector wrapping a scalar.
    pub fn scalar(value: f32) -> Self {
        FeatureVector::Dense(vec![value])
    }

    /// Sparse vector, validating that indices are strictly increasing and in range.
    pub fn sparse(len: usize, indices: Vec<usize>, values: Vec<f32>) -> Result<Self> {
        check_sparse(len, &indices, &values)?;
        Ok(FeatureVector::Sparse {
            len,
            indices,
            values,
        })
    }

    /// Check the layout invariants a directly built vector may break.
    ///
    /// Dense vectors are always well formed.
    pub fn validate(&self) -> Result<()> {
        match self {
            FeatureVector::Dense(_) => Ok(()),
            FeatureVector::Sparse {
                len,
                indices,
                values,
            } => check_sparse(*len, indices, values),
        }
    }

    /// Logical length.
    pub fn len(&self) -> usize {
        match self {
            FeatureVector::Dense(values) => values.len(),
            FeatureVector::Sparse { len, .. } => *len,
        }
    }

    /// Whether the logical length is 0.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether every slot is stored.
    pub fn is_dense(&self) -> bool {
        matches!(self, FeatureVector::Dense(_))
    }

    /// Number of stored entries.
    pub fn stored_len(&self) -> usize {
        match self {
            FeatureVector::Dense(values) => values.len(),
            FeatureVector::Sparse { values, .. } => values.len(),
        }
    }

    /// Value at slot `index` (0 for implicit sparse slots).
    pub fn get(&self, index: usize) -> f32 {
        match self {
            FeatureVector::Dense(values) => values[index],
            FeatureVector::Sparse { indices, values, .. } => indices
                .binary_search(&index)
                .map(|pos| values[pos])
                .unwrap_or(0.0),
        }
    }

    /// Stored `(index, value)` pairs in increasing index order.
    pub fn entries(&self) -> Entries<'_> {
        match self {
            FeatureVector::Dense(values) => Entries::Dense(values.iter().enumerate()),
            FeatureVector::Sparse {
                indices, values, ..
            } => Entries::Sparse(indices.iter().zip(values.iter())),
        }
    }

    /// Materialize all slots.
    pub fn to_dense(&self) -> Vec<f32> {
        match self {
            FeatureVector::Dense(values) => values.clone(),
            FeatureVector::Sparse {
                len,
                indices,
                values,
            } => {
                let mut dense = vec![0.0; *len];
                for (&i, &v) in indices.iter().zip(values) {
                    dense[i] = v;
                }
                dense
            }
        }
    }
}

/// Iterator over the stored entries of a [`FeatureVector`].
pub enum Entries<'a> {
    /// Entries of a dense vector.
    Dense(std::iter::Enumerate<std::slice::Iter<'a, f32>>),
    /// Entries of a sparse vector.
    Sparse(std::iter::Zip<std::slice::Iter<'a, usize>, std::slice::Iter<'a, f32>>),
}

impl Iterator for Entries<'_> {
    type Item = (usize, f32);

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            Entries::Dense(it) => it.next().map(|(i, &v)| (i, v)),
            Entries::Sparse(it) => it.next().map(|(&i, &v)| (i, v)),
        }
    }
}

/// One cell of an in-memory row.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValue {
    /// Scalar cell.
    Scalar(f32),
    /// Vector cell.
    Vector(FeatureVector),
    /// Text cell.
    Text(String),
}

/// A dataset the transform can scan.
pub trait DataView {
    /// Columns of the view.
    fn schema(&self) -> &Schema;

    /// Open a cursor exposing only the `active` columns.
    fn cursor(&self, active: &[usize]) -> Result<Box<dyn RowCursor + '_>>;

    /// Number of rows, if cheaply known.
    fn row_count(&self) -> Option<u64> {
        None
    }
}

/// Forward-only cursor over the rows of a [`DataView`].
pub trait RowCursor {
    /// Advance to the next row; `false` once the rows are exhausted.
    fn move_next(&mut self) -> Result<bool>;

    /// Whether `column` was requested when the cursor was opened.
    fn is_active(&self, column: usize) -> bool;

    /// Read a scalar column of the current row.
    fn get_scalar(&mut self, column: usize) -> Result<f32>;

    /// Read a vector column of the current row into `dst`.
    fn get_vector(&mut self, column: usize, dst: &mut FeatureVector) -> Result<()>;
}

/// Read `column` of the current row as a feature vector, wrapping scalars
/// as length-1 vectors.
pub fn read_features(
    cursor: &mut dyn RowCursor,
    column: usize,
    column_type: ColumnType,
    dst: &mut FeatureVector,
) -> Result<()> {
    match column_type {
        ColumnType::Scalar => {
            let value = cursor.get_scalar(column)?;
            match dst {
                FeatureVector::Dense(values) => {
                    values.clear();
                    values.push(value);
                }
                FeatureVector::Sparse { .. } => *dst = FeatureVector::scalar(value),
            }
            Ok(())
        }
        ColumnType::Vector(_) => cursor.get_vector(column, dst),
        ColumnType::Text => Err(RffError::schema_mismatch(
            format!("#{}", column),
            "a float scalar or vector",
            column_type,
        )),
    }
}

/// Row store implementing [`DataView`].
#[derive(Debug, Clone, Default)]
pub struct InMemoryDataView {
    schema: Schema,
    rows: Vec<Vec<ColumnValue>>,
}

impl InMemoryDataView {
    /// Empty view with the given schema.
    pub fn new(schema: Schema) -> Self {
        Self {
            schema,
            rows: Vec::new(),
        }
    }

    /// Single vector column holding `rows`.
    pub fn from_vectors(name: impl Into<String>, dim: usize, rows: Vec<FeatureVector>) -> Result<Self> {
        let mut view = Self::new(Schema::new().with_column(name, ColumnType::Vector(dim)));
        for row in rows {
            view.push_row(vec![ColumnValue::Vector(row)])?;
        }
        Ok(view)
    }

    /// Single scalar column holding `rows`.
    pub fn from_scalars(name: impl Into<String>, rows: Vec<f32>) -> Self {
        let schema = Schema::new().with_column(name, ColumnType::Scalar);
        Self {
            schema,
            rows: rows.into_iter().map(|v| vec![ColumnValue::Scalar(v)]).collect(),
        }
    }

    /// Append a row, checking it against the schema.
    pub fn push_row(&mut self, row: Vec<ColumnValue>) -> Result<()> {
        if row.len() != self.schema.len() {
            return Err(RffError::schema_mismatch(
                "<row>",
                format!("{} cells", self.schema.len()),
                format!("{} cells", row.len()),
            ));
        }
        for (info, value) in self.schema.iter().zip(&row) {
            let ok = match (info.column_type, value) {
                (ColumnType::Scalar, ColumnValue::Scalar(_)) => true,
                (ColumnType::Vector(0), ColumnValue::Vector(_)) => true,
                (ColumnType::Vector(n), ColumnValue::Vector(v)) => v.len() == n,
                (ColumnType::Text, ColumnValue::Text(_)) => true,
                _ => false,
            };
            if !ok {
                return Err(RffError::schema_mismatch(
                    info.name.clone(),
                    info.column_type,
                    describe(value),
                ));
            }
        }
        self.rows.push(row);
        Ok(())
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the view holds no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

fn describe(value: &ColumnValue) -> String {
    match value {
        ColumnValue::Scalar(_) => "R4".to_string(),
        ColumnValue::Vector(v) => format!("Vector<R4, {}>", v.len()),
        ColumnValue::Text(_) => "Text".to_string(),
    }
}

impl DataView for InMemoryDataView {
    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn cursor(&self, active: &[usize]) -> Result<Box<dyn RowCursor + '_>> {
        let mut flags = vec![false; self.schema.len()];
        for &column in active {
            let flag = flags.get_mut(column).ok_or_else(|| {
                RffError::invalid_argument("active", column, "column index out of range")
            })?;
            *flag = true;
        }
        Ok(Box::new(InMemoryCursor {
            view: self,
            active: flags,
            position: None,
        }))
    }

    fn row_count(&self) -> Option<u64> {
        Some(self.rows.len() as u64)
    }
}

struct InMemoryCursor<'a> {
    view: &'a InMemoryDataView,
    active: Vec<bool>,
    position: Option<usize>,
}

impl InMemoryCursor<'_> {
    fn cell(&self, column: usize) -> Result<&ColumnValue> {
        if !self.is_active(column) {
            return Err(RffError::invalid_argument(
                "column",
                column,
                "column is not active on this cursor",
            ));
        }
        let row = self
            .position
            .and_then(|p| self.view.rows.get(p))
            .ok_or_else(|| {
                RffError::invalid_argument("cursor", column, "cursor is not positioned on a row")
            })?;
        Ok(&row[column])
    }

    fn column_name(&self, column: usize) -> String {
        self.view
            .schema
            .column(column)
            .map(|c| c.name.clone())
            .unwrap_or_else(|| format!("#{}", column))
    }
}

impl RowCursor for InMemoryCursor<'_> {
    fn move_next(&mut self) -> Result<bool> {
        let next = self.position.map_or(0, |p| p + 1);
        self.position = Some(next.min(self.view.rows.len()));
        Ok(next < self.view.rows.len())
    }

    fn is_active(&self, column: usize) -> bool {
        self.active.get(column).copied().unwrap_or(false)
    }

    fn get_scalar(&mut self, column: usize) -> Result<f32> {
        match self.cell(column)? {
            ColumnValue::Scalar(v) => Ok(*v),
            other => Err(RffError::schema_mismatch(
                self.column_name(column),
                "R4",
                describe(other),
            )),
        }
    }

    fn get_vector(&mut self, column: usize, dst: &mut FeatureVector) -> Result<()> {
        match self.cell(column)? {
            ColumnValue::Vector(v) => {
                dst.clone_from(v);
                Ok(())
            }
            other => Err(RffError::schema_mismatch(
                self.column_name(column),
                "Vector<R4>",
                describe(other),
            )),
        }
    }
}

fn check_sparse(len: usize, indices: &[usize], values: &[f32]) -> Result<()> {
    if indices.len() != values.len() {
        return Err(RffError::invalid_argument(
            "indices",
            indices.len(),
            format!("expected {} indices to match values", values.len()),
        ));
    }
    if let Some(w) = indices.windows(2).find(|w| w[0] >= w[1]) {
        return Err(RffError::invalid_argument(
            "indices",
            format!("{:?}", w),
            "indices must be strictly increasing",
        ));
    }
    if let Some(&last) = indices.last() {
        if last >= len {
            return Err(RffError::invalid_argument(
                "indices",
                last,
                format!("index out of range for length {}", len),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_column_view() -> InMemoryDataView {
        let schema = Schema::new()
            .with_column("x", ColumnType::Vector(3))
            .with_column("y", ColumnType::Scalar);
        let mut view = InMemoryDataView::new(schema);
        view.push_row(vec![
            ColumnValue::Vector(FeatureVector::dense(vec![1.0, 2.0, 3.0])),
            ColumnValue::Scalar(0.5),
        ])
        .unwrap();
        view.push_row(vec![
            ColumnValue::Vector(FeatureVector::sparse(3, vec![1], vec![4.0]).unwrap()),
            ColumnValue::Scalar(1.5),
        ])
        .unwrap();
        view
    }

    #[test]
    fn test_schema_lookup() {
        let schema = Schema::new()
            .with_column("a", ColumnType::Scalar)
            .with_column("b", ColumnType::Vector(4))
            .with_column("a", ColumnType::Text);
        assert_eq!(schema.len(), 3);
        assert_eq!(schema.index_of("b"), Some(1));
        assert_eq!(schema.index_of("a"), Some(2));
        assert_eq!(schema.index_of("missing"), None);
    }

    #[test]
    fn test_feature_len() {
        assert_eq!(ColumnType::Scalar.feature_len(), Some(1));
        assert_eq!(ColumnType::Vector(7).feature_len(), Some(7));
        assert_eq!(ColumnType::Vector(0).feature_len(), None);
        assert_eq!(ColumnType::Text.feature_len(), None);
    }

    #[test]
    fn test_sparse_validation() {
        assert!(FeatureVector::sparse(4, vec![0, 2], vec![1.0, 2.0]).is_ok());
        assert!(FeatureVector::sparse(4, vec![2, 2], vec![1.0, 2.0]).is_err());
        assert!(FeatureVector::sparse(4, vec![3, 1], vec![1.0, 2.0]).is_err());
        assert!(FeatureVector::sparse(4, vec![4], vec![1.0]).is_err());
        assert!(FeatureVector::sparse(4, vec![1], vec![1.0, 2.0]).is_err());
    }

    #[test]
    fn test_validate_direct_sparse() {
        assert!(FeatureVector::dense(vec![1.0]).validate().is_ok());
        let unsorted = FeatureVector::Sparse {
            len: 2,
            indices: vec![1, 0],
            values: vec![1.0, 2.0],
        };
        assert!(matches!(
            unsorted.validate(),
            Err(RffError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_sparse_accessors() {
        let v = FeatureVector::sparse(5, vec![1, 3], vec![2.0, -1.0]).unwrap();
        assert_eq!(v.len(), 5);
        assert_eq!(v.stored_len(), 2);
        assert!(!v.is_dense());
        assert_eq!(v.get(3), -1.0);
        assert_eq!(v.get(0), 0.0);
        assert_eq!(v.to_dense(), vec![0.0, 2.0, 0.0, -1.0, 0.0]);
        assert_eq!(v.entries().collect::<Vec<_>>(), vec![(1, 2.0), (3, -1.0)]);
    }

    #[test]
    fn test_cursor_walks_rows() {
        let view = two_column_view();
        let mut cursor = view.cursor(&[0, 1]).unwrap();
        let mut buf = FeatureVector::default();
        let mut scalars = Vec::new();

        while cursor.move_next().unwrap() {
            cursor.get_vector(0, &mut buf).unwrap();
            assert_eq!(buf.len(), 3);
            scalars.push(cursor.get_scalar(1).unwrap());
        }
        assert_eq!(scalars, vec![0.5, 1.5]);
        assert!(!cursor.move_next().unwrap());
    }

    #[test]
    fn test_cursor_rejects_inactive_and_mistyped() {
        let view = two_column_view();
        let mut cursor = view.cursor(&[0]).unwrap();
        assert!(cursor.move_next().unwrap());
        assert!(cursor.get_scalar(1).is_err());
        assert!(matches!(
            cursor.get_scalar(0),
            Err(RffError::SchemaMismatch { .. })
        ));
        assert!(view.cursor(&[9]).is_err());
    }

    #[test]
    fn test_cursor_before_first_row() {
        let view = two_column_view();
        let mut cursor = view.cursor(&[1]).unwrap();
        assert!(cursor.get_scalar(1).is_err());
    }

    #[test]
    fn test_read_features_wraps_scalar() {
        let view = two_column_view();
        let mut cursor = view.cursor(&[1]).unwrap();
        assert!(cursor.move_next().unwrap());
        let mut buf = FeatureVector::sparse(2, vec![0], vec![1.0]).unwrap();
        read_features(cursor.as_mut(), 1, ColumnType::Scalar, &mut buf).unwrap();
        assert_eq!(buf, FeatureVector::scalar(0.5));
    }

    #[test]
    fn test_push_row_checks_schema() {
        let mut view = two_column_view();
        let wrong_len = vec![
            ColumnValue::Vector(FeatureVector::dense(vec![1.0])),
            ColumnValue::Scalar(0.0),
        ];
        assert!(view.push_row(wrong_len).is_err());
        assert!(view.push_row(vec![ColumnValue::Scalar(0.0)]).is_err());
        assert_eq!(view.len(), 2);
    }
}
