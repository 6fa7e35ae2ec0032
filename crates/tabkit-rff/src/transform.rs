//! Fitting and applying random Fourier feature transforms.
//!
//! [`RffEstimator`] is the unfit transform: a validated configuration.
//! [`RffEstimator::fit`] scans the training data once, estimating every
//! column's bandwidth in the same pass, then builds one [`TransformInfo`] per
//! column and returns an immutable [`RffTransform`]. Fitting again produces a
//! new transform; a fitted one is never mutated.
//!
//! ```rust
//! use tabkit_rff::{ColumnSpec, FeatureVector, InMemoryDataView, RffConfig, RffEstimator};
//!
//! let rows = vec![
//!     FeatureVector::dense(vec![1.0, 0.0]),
//!     FeatureVector::dense(vec![0.0, 1.0]),
//!     FeatureVector::dense(vec![1.0, 1.0]),
//! ];
//! let data = InMemoryDataView::from_vectors("x", 2, rows).unwrap();
//!
//! let config = RffConfig::new(vec![ColumnSpec::new("x", "x_rff")
//!     .with_new_dim(4)
//!     .with_use_sin(true)
//!     .with_seed(42)]);
//! let transform = RffEstimator::new(config).unwrap().fit(&data).unwrap();
//!
//! let z = transform
//!     .transform("x_rff", &FeatureVector::dense(vec![1.0, 0.0]))
//!     .unwrap();
//! assert_eq!(z.len(), 8);
//! ```

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use log::{debug, info};

#[cfg(feature = "parallel")]
use scirs2_core::parallel_ops::*;

use crate::bandwidth::{BandwidthColumn, BandwidthEstimator};
use crate::config::RffConfig;
use crate::data::{read_features, ColumnType, DataView, FeatureVector, RowCursor, Schema};
use crate::env::HostEnv;
use crate::error::{Result, RffError};
use crate::mapper::RowMapper;
use crate::model::{self, VersionInfo};
use crate::transform_info::TransformInfo;

/// Header of a persisted transform.
pub const MODEL_VERSION: VersionInfo =
    VersionInfo::new(b"RFF FUNC", 0x0001_0001, 0x0001_0001, 0x0001_0001);

/// Unfit transform.
#[derive(Debug, Clone)]
pub struct RffEstimator {
    config: RffConfig,
}

impl RffEstimator {
    /// Validate `config` and wrap it.
    pub fn new(config: RffConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// The configuration.
    pub fn config(&self) -> &RffConfig {
        &self.config
    }

    /// Fit on `data` with a host seeded from the configuration.
    pub fn fit(&self, data: &dyn DataView) -> Result<RffTransform> {
        let mut host = HostEnv::new(self.config.seed);
        self.fit_with_host(&mut host, data)
    }

    /// Fit on `data`, drawing unseeded randomness from `host`.
    ///
    /// The host generator is consumed in a fixed order: one child for the
    /// bandwidth pass, then one child per column without an explicit seed.
    pub fn fit_with_host(&self, host: &mut HostEnv, data: &dyn DataView) -> Result<RffTransform> {
        let schema = data.schema();
        let mut bandwidth_columns = Vec::with_capacity(self.config.columns.len());
        for spec in &self.config.columns {
            let index = schema.index_of(&spec.input).ok_or_else(|| {
                RffError::invalid_argument(
                    "input",
                    &spec.input,
                    "column not found in the training data",
                )
            })?;
            let column_type = schema
                .column(index)
                .map(|c| c.column_type)
                .unwrap_or(ColumnType::Text);
            if column_type.feature_len().is_none() {
                return Err(RffError::invalid_argument(
                    "input",
                    &spec.input,
                    format!(
                        "expected a float scalar or fixed-size float vector, found {}",
                        column_type
                    ),
                ));
            }
            bandwidth_columns.push(BandwidthColumn {
                name: spec.input.clone(),
                index,
                column_type,
                metric: spec.kernel.metric(),
            });
        }

        let estimator = BandwidthEstimator::new(self.config.reservoir_capacity)?;
        let mut rng = host.derive_rng();
        let bandwidths = estimator.estimate_columns(data, &bandwidth_columns, &mut rng)?;

        let mut columns = Vec::with_capacity(self.config.columns.len());
        for ((spec, source), bandwidth) in self
            .config
            .columns
            .iter()
            .zip(&bandwidth_columns)
            .zip(bandwidths)
        {
            let src_dim = source.column_type.feature_len().unwrap_or(1);
            let info = TransformInfo::build(host, spec, src_dim, bandwidth)?;
            columns.push(FittedColumn {
                input: spec.input.clone(),
                output: spec.output.clone(),
                info,
            });
        }

        info!(
            "fitted random Fourier features for {} column(s)",
            columns.len()
        );
        Ok(RffTransform { columns })
    }
}

/// One fitted column.
#[derive(Debug, Clone, PartialEq)]
pub struct FittedColumn {
    /// Source column name.
    pub input: String,
    /// Output column name.
    pub output: String,
    /// Learned projection.
    pub info: TransformInfo,
}

/// Fitted, immutable transform.
#[derive(Debug, Clone, PartialEq)]
pub struct RffTransform {
    columns: Vec<FittedColumn>,
}

impl RffTransform {
    /// Fitted columns, in configuration order.
    pub fn columns(&self) -> &[FittedColumn] {
        &self.columns
    }

    /// Fitted column writing `output`.
    pub fn column(&self, output: &str) -> Option<&FittedColumn> {
        self.columns.iter().find(|c| c.output == output)
    }

    fn require(&self, output: &str) -> Result<&FittedColumn> {
        self.column(output).ok_or_else(|| {
            RffError::invalid_argument("column", output, "no fitted column with this output name")
        })
    }

    /// Schema produced by applying this transform to data with schema `input`.
    ///
    /// Every source column must still be a float column of the fitted length.
    pub fn output_schema(&self, input: &Schema) -> Result<Schema> {
        let mut schema = input.clone();
        for column in &self.columns {
            resolve_source(input, column)?;
            schema.push(
                column.output.clone(),
                ColumnType::Vector(column.info.output_len()),
            );
        }
        Ok(schema)
    }

    /// Project a single vector of the column writing `output`.
    pub fn transform(&self, output: &str, source: &FeatureVector) -> Result<Vec<f32>> {
        let column = self.require(output)?;
        RowMapper::new(&column.info)
            .named(&column.input)
            .map_to_vec(source)
    }

    /// Project many vectors, reusing one scratch.
    pub fn transform_batch(&self, output: &str, rows: &[FeatureVector]) -> Result<Vec<Vec<f32>>> {
        let column = self.require(output)?;
        let mut mapper = RowMapper::new(&column.info).named(&column.input);
        rows.iter().map(|row| mapper.map_to_vec(row)).collect()
    }

    /// Project many vectors across the thread pool, one scratch per worker.
    ///
    /// Without the `parallel` feature this is [`RffTransform::transform_batch`].
    pub fn transform_batch_parallel(
        &self,
        output: &str,
        rows: &[FeatureVector],
    ) -> Result<Vec<Vec<f32>>> {
        #[cfg(feature = "parallel")]
        {
            let column = self.require(output)?;
            rows.par_iter()
                .map_init(
                    || RowMapper::new(&column.info).named(&column.input),
                    |mapper, row| mapper.map_to_vec(row),
                )
                .collect()
        }

        #[cfg(not(feature = "parallel"))]
        {
            self.transform_batch(output, rows)
        }
    }

    /// Approximate kernel value `z(x)·z(y)` for the column writing `output`.
    pub fn approximate_kernel(
        &self,
        output: &str,
        x: &FeatureVector,
        y: &FeatureVector,
    ) -> Result<f32> {
        let column = self.require(output)?;
        let mut mapper = RowMapper::new(&column.info).named(&column.input);
        let zx = mapper.map_to_vec(x)?;
        let zy = mapper.map_to_vec(y)?;
        Ok(zx.iter().zip(&zy).map(|(a, b)| a * b).sum())
    }

    /// Lazily transformed view of `data`.
    ///
    /// The view exposes every column of `data` followed by one vector column
    /// per fitted output. Rows are projected only when an output is read.
    pub fn apply<'a>(&'a self, data: &'a dyn DataView) -> Result<TransformedView<'a>> {
        let input = data.schema();
        let schema = self.output_schema(input)?;
        let sources = self
            .columns
            .iter()
            .map(|column| resolve_source(input, column))
            .collect::<Result<Vec<_>>>()?;
        Ok(TransformedView {
            transform: self,
            source: data,
            schema,
            input_len: input.len(),
            sources,
        })
    }

    /// Write the transform.
    pub fn save<W: Write>(&self, writer: &mut W) -> Result<()> {
        MODEL_VERSION.write_header(writer)?;
        model::write_float_size(writer)?;
        model::write_dim(writer, "column count", self.columns.len())?;
        for column in &self.columns {
            model::write_string(writer, &column.input)?;
            model::write_string(writer, &column.output)?;
            column.info.save(writer)?;
        }
        Ok(())
    }

    /// Read a transform written by [`RffTransform::save`].
    pub fn load<R: Read>(reader: &mut R) -> Result<Self> {
        MODEL_VERSION.read_header(reader)?;
        model::read_float_size(reader)?;
        let count = model::read_dim(reader, "column count")?;

        let mut columns = Vec::new();
        let mut outputs = HashSet::new();
        for _ in 0..count {
            let input = model::read_string(reader)?;
            let output = model::read_string(reader)?;
            if !outputs.insert(output.clone()) {
                return Err(RffError::decode(format!(
                    "duplicate output column '{}'",
                    output
                )));
            }
            let info = TransformInfo::load(reader)?;
            columns.push(FittedColumn {
                input,
                output,
                info,
            });
        }
        Ok(Self { columns })
    }

    /// Write the transform to a file.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.save(&mut writer)?;
        writer.flush()?;
        info!("saved random Fourier feature transform to {}", path.display());
        Ok(())
    }

    /// Read a transform from a file.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let mut reader = BufReader::new(File::open(path)?);
        let transform = Self::load(&mut reader)?;
        info!(
            "loaded random Fourier feature transform with {} column(s) from {}",
            transform.columns.len(),
            path.display()
        );
        Ok(transform)
    }
}

/// Index and type of `column`'s source in `input`, checked against the fit.
fn resolve_source(input: &Schema, column: &FittedColumn) -> Result<(usize, ColumnType)> {
    let index = input.index_of(&column.input).ok_or_else(|| {
        RffError::schema_mismatch(column.input.clone(), "a column of this name", "no such column")
    })?;
    let column_type = input
        .column(index)
        .map(|c| c.column_type)
        .unwrap_or(ColumnType::Text);
    if column_type.feature_len() != Some(column.info.src_dim()) {
        return Err(RffError::schema_mismatch(
            column.input.clone(),
            format!("vector of length {}", column.info.src_dim()),
            column_type,
        ));
    }
    Ok((index, column_type))
}

/// Data view with projected columns appended.
pub struct TransformedView<'a> {
    transform: &'a RffTransform,
    source: &'a dyn DataView,
    schema: Schema,
    input_len: usize,
    sources: Vec<(usize, ColumnType)>,
}

impl TransformedView<'_> {
    /// Schema index of the first projected column.
    pub fn first_output_index(&self) -> usize {
        self.input_len
    }
}

impl DataView for TransformedView<'_> {
    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn cursor(&self, active: &[usize]) -> Result<Box<dyn RowCursor + '_>> {
        let mut requested = vec![false; self.schema.len()];
        let mut source_active = Vec::new();
        for &column in active {
            let flag = requested.get_mut(column).ok_or_else(|| {
                RffError::invalid_argument("active", column, "column index out of range")
            })?;
            *flag = true;
            if column < self.input_len {
                source_active.push(column);
            } else {
                source_active.push(self.sources[column - self.input_len].0);
            }
        }
        source_active.sort_unstable();
        source_active.dedup();

        let outputs = self
            .transform
            .columns
            .iter()
            .zip(&self.sources)
            .map(|(column, &(source, source_type))| OutputSlot {
                mapper: RowMapper::new(&column.info).named(&column.input),
                source,
                source_type,
                features: FeatureVector::default(),
            })
            .collect();

        debug!(
            "opening transformed cursor over {} active column(s)",
            active.len()
        );
        Ok(Box::new(TransformedCursor {
            inner: self.source.cursor(&source_active)?,
            input_len: self.input_len,
            requested,
            outputs,
        }))
    }

    fn row_count(&self) -> Option<u64> {
        self.source.row_count()
    }
}

struct OutputSlot<'a> {
    mapper: RowMapper<'a>,
    source: usize,
    source_type: ColumnType,
    features: FeatureVector,
}

struct TransformedCursor<'a> {
    inner: Box<dyn RowCursor + 'a>,
    input_len: usize,
    requested: Vec<bool>,
    outputs: Vec<OutputSlot<'a>>,
}

impl TransformedCursor<'_> {
    fn check_active(&self, column: usize) -> Result<()> {
        if self.is_active(column) {
            Ok(())
        } else {
            Err(RffError::invalid_argument(
                "column",
                column,
                "column is not active on this cursor",
            ))
        }
    }
}

impl RowCursor for TransformedCursor<'_> {
    fn move_next(&mut self) -> Result<bool> {
        self.inner.move_next()
    }

    fn is_active(&self, column: usize) -> bool {
        self.requested.get(column).copied().unwrap_or(false)
    }

    fn get_scalar(&mut self, column: usize) -> Result<f32> {
        self.check_active(column)?;
        if column < self.input_len {
            return self.inner.get_scalar(column);
        }
        let slot = &self.outputs[column - self.input_len];
        Err(RffError::schema_mismatch(
            format!("#{}", column),
            "R4",
            ColumnType::Vector(slot.mapper.info().output_len()),
        ))
    }

    fn get_vector(&mut self, column: usize, dst: &mut FeatureVector) -> Result<()> {
        self.check_active(column)?;
        if column < self.input_len {
            return self.inner.get_vector(column, dst);
        }

        let slot = &mut self.outputs[column - self.input_len];
        read_features(
            self.inner.as_mut(),
            slot.source,
            slot.source_type,
            &mut slot.features,
        )?;
        match dst {
            FeatureVector::Dense(values) => slot.mapper.map(&slot.features, values),
            FeatureVector::Sparse { .. } => {
                let values = slot.mapper.map_to_vec(&slot.features)?;
                *dst = FeatureVector::Dense(values);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ColumnSpec;
    use crate::data::{ColumnValue, InMemoryDataView};
    use crate::kernel::KernelSpec;
    use std::io::Cursor;

    fn training_data() -> InMemoryDataView {
        let schema = Schema::new()
            .with_column("x", ColumnType::Vector(2))
            .with_column("age", ColumnType::Scalar)
            .with_column("name", ColumnType::Text);
        let mut view = InMemoryDataView::new(schema);
        for (x, age, name) in [
            ([1.0, 0.0], 30.0, "a"),
            ([0.0, 1.0], 45.0, "b"),
            ([1.0, 1.0], 21.0, "c"),
        ] {
            view.push_row(vec![
                ColumnValue::Vector(FeatureVector::dense(x.to_vec())),
                ColumnValue::Scalar(age),
                ColumnValue::Text(name.to_string()),
            ])
            .unwrap();
        }
        view
    }

    fn config() -> RffConfig {
        RffConfig::new(vec![
            ColumnSpec::new("x", "x_rff")
                .with_new_dim(4)
                .with_use_sin(true)
                .with_seed(42),
            ColumnSpec::new("age", "age_rff")
                .with_new_dim(6)
                .with_kernel(KernelSpec::laplacian(1.0)),
        ])
        .with_seed(3)
    }

    #[test]
    fn test_fit_builds_every_column() {
        let transform = RffEstimator::new(config())
            .unwrap()
            .fit(&training_data())
            .unwrap();
        assert_eq!(transform.columns().len(), 2);

        let x = transform.column("x_rff").unwrap();
        assert_eq!(x.info.src_dim(), 2);
        assert_eq!(x.info.output_len(), 8);
        // all-pairs squared L2 over the three rows: 2, 1, 1 -> median 1
        assert_eq!(x.info.sampler().coefficient(), 1.0);

        let age = transform.column("age_rff").unwrap();
        assert_eq!(age.info.src_dim(), 1);
        assert_eq!(age.info.output_len(), 6);
        // L1 distances 15, 9, 24 -> median 15
        assert_eq!(age.info.sampler().coefficient(), 1.0 / 15.0);
    }

    #[test]
    fn test_fit_is_deterministic_with_seed() {
        let estimator = RffEstimator::new(config()).unwrap();
        let a = estimator.fit(&training_data()).unwrap();
        let b = estimator.fit(&training_data()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_fit_rejects_missing_and_text_columns() {
        let missing = RffConfig::new(vec![ColumnSpec::new("nope", "out")]);
        let err = RffEstimator::new(missing)
            .unwrap()
            .fit(&training_data())
            .unwrap_err();
        assert!(matches!(err, RffError::InvalidArgument { .. }));

        let text = RffConfig::new(vec![ColumnSpec::new("name", "out")]);
        assert!(RffEstimator::new(text)
            .unwrap()
            .fit(&training_data())
            .is_err());
    }

    #[test]
    fn test_estimator_rejects_invalid_config() {
        let config = RffConfig::new(vec![ColumnSpec::new("x", "y").with_new_dim(0)]);
        assert!(RffEstimator::new(config).is_err());
    }

    #[test]
    fn test_output_schema() {
        let data = training_data();
        let transform = RffEstimator::new(config()).unwrap().fit(&data).unwrap();
        let schema = transform.output_schema(data.schema()).unwrap();
        assert_eq!(schema.len(), 5);
        assert_eq!(schema.column(3).unwrap().name, "x_rff");
        assert_eq!(schema.column(3).unwrap().column_type, ColumnType::Vector(8));
        assert_eq!(schema.column(4).unwrap().column_type, ColumnType::Vector(6));

        let wrong = Schema::new()
            .with_column("x", ColumnType::Vector(3))
            .with_column("age", ColumnType::Scalar);
        assert!(matches!(
            transform.output_schema(&wrong),
            Err(RffError::SchemaMismatch { .. })
        ));
    }

    #[test]
    fn test_lazy_view_matches_direct_projection() {
        let data = training_data();
        let transform = RffEstimator::new(config()).unwrap().fit(&data).unwrap();
        let view = transform.apply(&data).unwrap();
        let out = view.first_output_index();
        assert_eq!(out, 3);

        let mut cursor = view.cursor(&[out, out + 1, 2]).unwrap();
        let mut z = FeatureVector::default();
        let mut rows = 0;
        while cursor.move_next().unwrap() {
            cursor.get_vector(out, &mut z).unwrap();
            assert_eq!(z.len(), 8);
            cursor.get_vector(out + 1, &mut z).unwrap();
            assert_eq!(z.len(), 6);
            rows += 1;
        }
        assert_eq!(rows, 3);

        let mut cursor = view.cursor(&[out]).unwrap();
        assert!(cursor.move_next().unwrap());
        cursor.get_vector(out, &mut z).unwrap();
        let direct = transform
            .transform("x_rff", &FeatureVector::dense(vec![1.0, 0.0]))
            .unwrap();
        assert_eq!(z, FeatureVector::Dense(direct));
        assert!(cursor.get_vector(out + 1, &mut z).is_err());
        assert!(cursor.get_scalar(out).is_err());
    }

    #[test]
    fn test_batch_and_parallel_agree() {
        let transform = RffEstimator::new(config())
            .unwrap()
            .fit(&training_data())
            .unwrap();
        let rows: Vec<FeatureVector> = (0..50)
            .map(|i| FeatureVector::dense(vec![i as f32 * 0.1, 1.0 - i as f32 * 0.05]))
            .collect();
        let sequential = transform.transform_batch("x_rff", &rows).unwrap();
        let parallel = transform.transform_batch_parallel("x_rff", &rows).unwrap();
        assert_eq!(sequential, parallel);
        assert!(transform.transform_batch("missing", &rows).is_err());
    }

    #[test]
    fn test_approximate_kernel_self_similarity() {
        let transform = RffEstimator::new(config())
            .unwrap()
            .fit(&training_data())
            .unwrap();
        let x = FeatureVector::dense(vec![0.3, 0.6]);
        let k = transform.approximate_kernel("x_rff", &x, &x).unwrap();
        assert!((k - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_save_load_roundtrip() {
        let transform = RffEstimator::new(config())
            .unwrap()
            .fit(&training_data())
            .unwrap();
        let mut bytes = Vec::new();
        transform.save(&mut bytes).unwrap();
        assert_eq!(&bytes[..8], b"RFF FUNC");

        let loaded = RffTransform::load(&mut Cursor::new(bytes)).unwrap();
        assert_eq!(loaded, transform);
    }

    #[test]
    fn test_load_rejects_wrong_float_size() {
        let transform = RffEstimator::new(config())
            .unwrap()
            .fit(&training_data())
            .unwrap();
        let mut bytes = Vec::new();
        transform.save(&mut bytes).unwrap();
        bytes[20..24].copy_from_slice(&8i32.to_le_bytes());
        assert!(matches!(
            RffTransform::load(&mut Cursor::new(bytes)),
            Err(RffError::Decode(_))
        ));
    }
}
