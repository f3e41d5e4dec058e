//! Declaration files.
//!
//! Flags and program metadata can be declared in YAML or JSON and turned
//! into a [`Program`].
//!
//! # Example YAML
//!
//! ```yaml
//! program:
//!   name: grab
//!   description: Collects files
//! flags:
//!   - keys: ["-h", "--help"]
//!     name: help
//!     toggle: true
//!   - keys: ["-f", "--file"]
//!     name: file
//!     group: Input
//!     exactly: 2
//!   - keys: ["-i"]
//!     at_least: 1
//!     at_most: 3
//! ```

use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{Arity, FlagSpec, Meta, Program};

/// Errors while loading or converting declaration files.
#[derive(Debug, Error)]
pub enum DeclError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// `toggle` combined with counts, or `exactly` combined with bounds.
    #[error("flag `{flag}` declares conflicting arity: {reason}")]
    ConflictingArity { flag: String, reason: &'static str },
}

pub type Result<T> = std::result::Result<T, DeclError>;

/// One flag declaration as written in a file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlagDecl {
    pub keys: Vec<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub group: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub toggle: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exactly: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub at_least: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub at_most: Option<usize>,
}

impl FlagDecl {
    /// Resolves the declared counts into an [`Arity`].
    ///
    /// # Errors
    ///
    /// [`DeclError::ConflictingArity`] when the count fields contradict each
    /// other.
    pub fn arity(&self) -> Result<Arity> {
        let has_bounds = self.at_least.is_some() || self.at_most.is_some();
        let conflict = |reason| DeclError::ConflictingArity {
            flag: self.display_name(),
            reason,
        };

        if self.toggle {
            if self.exactly.is_some() || has_bounds {
                return Err(conflict("a toggle cannot capture values"));
            }
            return Ok(Arity::Toggle);
        }
        if let Some(n) = self.exactly {
            if has_bounds {
                return Err(conflict("`exactly` cannot be combined with `at_least`/`at_most`"));
            }
            return Ok(Arity::Exact(n));
        }
        let min = self.at_least.unwrap_or(0);
        if let Some(max) = self.at_most {
            if max < min {
                return Err(conflict("`at_most` is smaller than `at_least`"));
            }
        }
        Ok(Arity::Range {
            min,
            max: self.at_most,
        })
    }

    pub fn to_spec(&self) -> Result<FlagSpec> {
        Ok(FlagSpec::new(self.keys.iter().cloned())
            .with_name(self.name.clone())
            .with_arity(self.arity()?)
            .with_description(self.description.clone())
            .with_group(self.group.clone()))
    }

    fn display_name(&self) -> String {
        if !self.name.is_empty() {
            return self.name.clone();
        }
        self.keys.first().cloned().unwrap_or_default()
    }
}

/// A complete declaration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlagFile {
    pub program: Meta,
    pub flags: Vec<FlagDecl>,
}

impl FlagFile {
    /// Loads a declaration file; `.json` files are read as JSON, everything
    /// else as YAML.
    ///
    /// # Errors
    ///
    /// [`DeclError::Io`] if the file cannot be read, or a parse error.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let reader = BufReader::new(std::fs::File::open(path)?);
        let file = if is_json(path) {
            serde_json::from_reader(reader)?
        } else {
            serde_yaml::from_reader(reader)?
        };
        Ok(file)
    }

    /// Saves the declarations, choosing the format like [`load`](Self::load).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let writer = BufWriter::new(std::fs::File::create(path)?);
        if is_json(path) {
            serde_json::to_writer_pretty(writer, self)?;
        } else {
            serde_yaml::to_writer(writer, self)?;
        }
        Ok(())
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(raw)?)
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Converts every declaration, failing on the first conflicting arity.
    pub fn specs(&self) -> Result<Vec<FlagSpec>> {
        self.flags.iter().map(FlagDecl::to_spec).collect()
    }

    pub fn into_program(self) -> Result<Program> {
        let specs = self.specs()?;
        Ok(Program::new(self.program).with_flags(specs))
    }
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}
