//! Transform configuration.
//!
//! Configurations are plain serde structs, so they can be built in code or
//! read from TOML:
//!
//! ```toml
//! reservoir_capacity = 5000
//! seed = 7
//!
//! [[columns]]
//! input = "features"
//! output = "features_rff"
//! new_dim = 256
//! use_sin = true
//!
//! [columns.kernel]
//! type = "laplacian"
//! a = 0.5
//! ```
//!
//! `output` defaults to `input` (the projected column then hides the source
//! column in the output schema).

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::bandwidth::DEFAULT_RESERVOIR_CAPACITY;
use crate::error::{Result, RffError};
use crate::kernel::KernelSpec;

/// Environment variable naming a configuration file for [`RffConfig::load_default`].
pub const CONFIG_ENV_VAR: &str = "TABKIT_RFF_CONFIG";

/// Default number of random frequencies per column.
pub const DEFAULT_NEW_DIM: usize = 1000;

/// Settings for one projected column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "ColumnSpecDef")]
pub struct ColumnSpec {
    /// Source column name.
    pub input: String,
    /// Output column name.
    pub output: String,
    /// Number of random frequencies.
    pub new_dim: usize,
    /// Emit `[cos, sin]` pairs instead of phase-shifted cosines.
    pub use_sin: bool,
    /// Explicit generator seed; derived from the host when absent.
    pub seed: Option<u32>,
    /// Kernel to approximate.
    pub kernel: KernelSpec,
}

#[derive(Deserialize)]
struct ColumnSpecDef {
    input: String,
    #[serde(default)]
    output: Option<String>,
    #[serde(default = "default_new_dim")]
    new_dim: usize,
    #[serde(default)]
    use_sin: bool,
    #[serde(default)]
    seed: Option<u32>,
    #[serde(default)]
    kernel: KernelSpec,
}

fn default_new_dim() -> usize {
    DEFAULT_NEW_DIM
}

impl From<ColumnSpecDef> for ColumnSpec {
    fn from(def: ColumnSpecDef) -> Self {
        let output = def.output.unwrap_or_else(|| def.input.clone());
        Self {
            input: def.input,
            output,
            new_dim: def.new_dim,
            use_sin: def.use_sin,
            seed: def.seed,
            kernel: def.kernel,
        }
    }
}

impl ColumnSpec {
    /// Column reading `input` and writing `output`, with default settings.
    pub fn new(input: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            new_dim: DEFAULT_NEW_DIM,
            use_sin: false,
            seed: None,
            kernel: KernelSpec::default(),
        }
    }

    /// Set the number of random frequencies.
    pub fn with_new_dim(mut self, new_dim: usize) -> Self {
        self.new_dim = new_dim;
        self
    }

    /// Choose `[cos, sin]` output.
    pub fn with_use_sin(mut self, use_sin: bool) -> Self {
        self.use_sin = use_sin;
        self
    }

    /// Fix the generator seed.
    pub fn with_seed(mut self, seed: u32) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Set the kernel.
    pub fn with_kernel(mut self, kernel: KernelSpec) -> Self {
        self.kernel = kernel;
        self
    }

    /// Check the settings that do not depend on the data.
    pub fn validate(&self) -> Result<()> {
        if self.input.is_empty() {
            return Err(RffError::invalid_argument(
                "input",
                "",
                "column name must not be empty",
            ));
        }
        if self.output.is_empty() {
            return Err(RffError::invalid_argument(
                "output",
                "",
                "column name must not be empty",
            ));
        }
        if self.new_dim == 0 {
            return Err(RffError::invalid_argument(
                "new_dim",
                self.new_dim,
                format!("column '{}': must be positive", self.output),
            ));
        }
        if i32::try_from(self.new_dim).is_err() {
            return Err(RffError::invalid_argument(
                "new_dim",
                self.new_dim,
                format!("column '{}': does not fit in an int32", self.output),
            ));
        }
        self.kernel.validate()
    }
}

/// Settings for a whole transform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RffConfig {
    /// Columns to project.
    pub columns: Vec<ColumnSpec>,
    /// Rows kept per column for bandwidth estimation.
    #[serde(default = "default_reservoir_capacity")]
    pub reservoir_capacity: usize,
    /// Seed of the host generator; process entropy when absent.
    #[serde(default)]
    pub seed: Option<u32>,
}

fn default_reservoir_capacity() -> usize {
    DEFAULT_RESERVOIR_CAPACITY
}

impl RffConfig {
    /// Configuration for `columns` with default settings.
    pub fn new(columns: Vec<ColumnSpec>) -> Self {
        Self {
            columns,
            reservoir_capacity: DEFAULT_RESERVOIR_CAPACITY,
            seed: None,
        }
    }

    /// Set the reservoir capacity.
    pub fn with_reservoir_capacity(mut self, capacity: usize) -> Self {
        self.reservoir_capacity = capacity;
        self
    }

    /// Seed the host generator.
    pub fn with_seed(mut self, seed: u32) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Check everything that can be checked without a schema.
    pub fn validate(&self) -> Result<()> {
        if self.columns.is_empty() {
            return Err(RffError::invalid_argument(
                "columns",
                0,
                "at least one column is required",
            ));
        }
        if self.reservoir_capacity < 2 {
            return Err(RffError::invalid_argument(
                "reservoir_capacity",
                self.reservoir_capacity,
                "must be at least 2",
            ));
        }

        let mut outputs = HashSet::new();
        for column in &self.columns {
            column.validate()?;
            if !outputs.insert(column.output.as_str()) {
                return Err(RffError::invalid_argument(
                    "output",
                    &column.output,
                    "output column names must be unique",
                ));
            }
        }
        Ok(())
    }

    /// Parse a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Render as TOML.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| RffError::Config(e.to_string()))
    }

    /// Load a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content).map_err(|e| match e {
            RffError::Config(msg) => {
                RffError::Config(format!("{}: {}", path.display(), msg))
            }
            other => other,
        })
    }

    /// Write as a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_toml_string()?)?;
        Ok(())
    }

    /// Load the file named by `TABKIT_RFF_CONFIG`, if the variable is set.
    pub fn load_default() -> Result<Option<Self>> {
        match std::env::var(CONFIG_ENV_VAR) {
            Ok(path) => Self::load(Path::new(&path)).map(Some),
            Err(_) => Ok(None),
        }
    }
}
