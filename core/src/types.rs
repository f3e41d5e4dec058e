//! Flag declaration types.
//!
//! A [`FlagSpec`] describes one recognised flag: the token spellings that
//! trigger it, the canonical name results are stored under, its [`Arity`],
//! and an optional on-close [`Handler`].

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Error type returned by on-close handlers.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Callback invoked with a flag's captured values when its capture window
/// closes.
///
/// Handlers run synchronously, in the order windows close. They are shared
/// (`Arc`) so a [`Registry`](crate::Registry) can be cloned and reused across
/// parses.
pub type Handler = Arc<dyn Fn(&[String]) -> Result<(), HandlerError> + Send + Sync>;

/// Count constraint on a flag's capture window.
///
/// # Examples
///
/// ```
/// use flagcap_core::Arity;
///
/// assert!(Arity::Exact(2).accepts(2));
/// assert!(!Arity::Exact(2).accepts(3));
/// assert!(Arity::between(1, 3).accepts(3));
/// assert!(Arity::Toggle.accepts(0));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Arity {
    /// Presence only; never captures values.
    Toggle,
    /// Exactly `n` values.
    Exact(usize),
    /// At least `min` and, when set, at most `max` values.
    Range { min: usize, max: Option<usize> },
}

impl Default for Arity {
    /// An unconstrained range: captures until interrupted.
    fn default() -> Self {
        Self::any()
    }
}

impl Arity {
    /// Unbounded range with no minimum.
    pub const fn any() -> Self {
        Self::Range { min: 0, max: None }
    }

    pub const fn at_least(min: usize) -> Self {
        Self::Range { min, max: None }
    }

    pub const fn at_most(max: usize) -> Self {
        Self::Range {
            min: 0,
            max: Some(max),
        }
    }

    pub const fn between(min: usize, max: usize) -> Self {
        Self::Range {
            min,
            max: Some(max),
        }
    }

    /// Whether a final value count satisfies this arity.
    pub fn accepts(&self, count: usize) -> bool {
        match *self {
            Self::Toggle => count == 0,
            Self::Exact(n) => count == n,
            Self::Range { min, max } => count >= min && max.is_none_or(|max| count <= max),
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::Toggle => f.write_str("toggle"),
            Self::Exact(n) => write!(f, "exactly {n}"),
            Self::Range { min, max: None } => write!(f, "at least {min}"),
            Self::Range { min, max: Some(max) } => write!(f, "{min}..={max}"),
        }
    }
}

/// A registered flag declaration.
///
/// Use [`FlagSpec::new`] or [`FlagSpec::toggle`] and chain the builder
/// methods.
///
/// # Examples
///
/// ```
/// use flagcap_core::{Arity, FlagSpec};
///
/// let file = FlagSpec::new(["-f", "--file"])
///     .with_arity(Arity::Exact(2))
///     .with_description("Input files");
/// assert_eq!(file.resolved_name(), "-f");
/// assert!(file.matches("--file"));
///
/// let recurse = FlagSpec::toggle(["-r"]).with_name("recurse");
/// assert_eq!(recurse.resolved_name(), "recurse");
/// ```
#[derive(Clone, Default)]
pub struct FlagSpec {
    /// Token spellings that trigger this flag (e.g. `-f`, `--file`).
    pub identifiers: Vec<String>,
    /// Canonical name; empty means "use the first identifier".
    pub name: String,
    pub arity: Arity,
    pub description: String,
    /// Presentation group label. Ignored by parsing.
    pub group: String,
    pub on_close: Option<Handler>,
}

impl FlagSpec {
    /// Creates an unconstrained flag triggered by `identifiers`.
    pub fn new<I, S>(identifiers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            identifiers: identifiers.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Creates a [`Arity::Toggle`] flag triggered by `identifiers`.
    pub fn toggle<I, S>(identifiers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(identifiers).with_arity(Arity::Toggle)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_arity(mut self, arity: Arity) -> Self {
        self.arity = arity;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = group.into();
        self
    }

    /// Attaches a handler run with the window's values whenever this flag's
    /// capture window closes.
    pub fn on_close<F>(mut self, handler: F) -> Self
    where
        F: Fn(&[String]) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.on_close = Some(Arc::new(handler));
        self
    }

    /// The canonical name: `name` if set, else the first identifier.
    ///
    /// Returns an empty string when both are empty.
    pub fn resolved_name(&self) -> &str {
        if !self.name.is_empty() {
            return &self.name;
        }
        self.identifiers.first().map(String::as_str).unwrap_or("")
    }

    /// Returns `true` if `token` is one of this flag's identifiers.
    pub fn matches(&self, token: &str) -> bool {
        self.identifiers.iter().any(|id| id == token)
    }
}

impl fmt::Debug for FlagSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlagSpec")
            .field("identifiers", &self.identifiers)
            .field("name", &self.name)
            .field("arity", &self.arity)
            .field("description", &self.description)
            .field("group", &self.group)
            .field("on_close", &self.on_close.as_ref().map(|_| "<handler>"))
            .finish()
    }
}

impl fmt::Display for FlagSpec {
    /// `name [id, id]`, used in conflict messages.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "`{}` [{}]",
            self.resolved_name(),
            self.identifiers.join(", ")
        )
    }
}
