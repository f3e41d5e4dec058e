//! Flag registry construction.
//!
//! [`Registry::build`] compiles a list of [`FlagSpec`]s into token and name
//! lookup tables, rejecting conflicting declarations before any parsing
//! happens. The first conflict aborts construction.

use std::collections::HashMap;

use thiserror::Error;
use tracing::trace;

use crate::FlagSpec;

/// Registration-time conflicts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// Declaration at `index` has neither a name nor any identifier.
    #[error("flag #{index} must have a name or at least one identifier")]
    MissingIdentifier { index: usize },
    /// Two declarations resolve to the same canonical name.
    #[error("names must be unique: `{name}` is used by both {first} and {second}")]
    DuplicateName {
        name: String,
        first: String,
        second: String,
    },
    /// Two declarations claim the same token spelling.
    #[error("identifiers must be unique: `{identifier}` is claimed by both `{first}` and `{second}`")]
    DuplicateIdentifier {
        identifier: String,
        first: String,
        second: String,
    },
}

/// Immutable lookup structure over a set of flag declarations.
///
/// Declaration order is preserved for presentation.
///
/// # Examples
///
/// ```
/// use flagcap_core::{FlagSpec, Registry};
///
/// let registry = Registry::build(vec![
///     FlagSpec::new(["-f", "--file"]).with_name("file"),
///     FlagSpec::toggle(["-r"]),
/// ])
/// .unwrap();
///
/// assert_eq!(registry.lookup("--file").unwrap().resolved_name(), "file");
/// assert!(registry.lookup("file").is_none());
/// assert_eq!(registry.len(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct Registry {
    specs: Vec<FlagSpec>,
    by_token: HashMap<String, usize>,
    by_name: HashMap<String, usize>,
}

impl Registry {
    /// Builds a registry, resolving empty names to the first identifier.
    ///
    /// A declaration with a name but no identifiers is triggered by its name.
    ///
    /// # Errors
    ///
    /// Returns the first [`RegistryError`] encountered, in declaration order.
    pub fn build(specs: impl IntoIterator<Item = FlagSpec>) -> Result<Self, RegistryError> {
        let mut registry = Self {
            specs: Vec::new(),
            by_token: HashMap::new(),
            by_name: HashMap::new(),
        };

        for (index, mut spec) in specs.into_iter().enumerate() {
            let name = spec.resolved_name().to_string();
            if name.is_empty() {
                return Err(RegistryError::MissingIdentifier { index });
            }
            spec.name = name.clone();

            if let Some(&prev) = registry.by_name.get(&name) {
                return Err(RegistryError::DuplicateName {
                    name,
                    first: registry.specs[prev].to_string(),
                    second: spec.to_string(),
                });
            }

            let tokens: Vec<String> = if spec.identifiers.is_empty() {
                vec![name.clone()]
            } else {
                spec.identifiers.clone()
            };
            for token in tokens {
                if let Some(&prev) = registry.by_token.get(&token) {
                    let first = if prev == index {
                        name.clone()
                    } else {
                        registry.specs[prev].name.clone()
                    };
                    return Err(RegistryError::DuplicateIdentifier {
                        identifier: token,
                        first,
                        second: name,
                    });
                }
                trace!(flag = %name, token = %token, "registered identifier");
                registry.by_token.insert(token, index);
            }

            registry.by_name.insert(name, index);
            registry.specs.push(spec);
        }

        Ok(registry)
    }

    /// Returns the flag triggered by `token`, if any.
    pub fn lookup(&self, token: &str) -> Option<&FlagSpec> {
        self.index_of(token).map(|idx| &self.specs[idx])
    }

    /// Returns the flag registered under canonical `name`.
    pub fn by_name(&self, name: &str) -> Option<&FlagSpec> {
        self.by_name.get(name).map(|&idx| &self.specs[idx])
    }

    pub(crate) fn index_of(&self, token: &str) -> Option<usize> {
        self.by_token.get(token).copied()
    }

    /// Declarations in their original order, with names resolved.
    pub fn specs(&self) -> &[FlagSpec] {
        &self.specs
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}
