//! Program facade: metadata, grouped flags and help rendering.
//!
//! [`Program`] owns a flag list and builds a fresh [`Registry`] for every
//! evaluation. Help is returned as text, never printed.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{Error, FlagSpec, HandlerError, ParseResult, Registry, RegistryError};

/// Name of the flag that requests help output.
pub const HELP_FLAG: &str = "help";

/// Display-only program metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Meta {
    pub name: String,
    pub description: String,
    pub author: String,
    pub source: String,
    pub copyright: String,
    pub version: String,
}

/// Stamps `label` as the presentation group of every flag.
///
/// # Examples
///
/// ```
/// use flagcap_core::{FlagSpec, group};
///
/// let flags = group("Search", [FlagSpec::new(["-q"]), FlagSpec::toggle(["-i"])]);
/// assert!(flags.iter().all(|f| f.group == "Search"));
/// ```
pub fn group(label: &str, flags: impl IntoIterator<Item = FlagSpec>) -> Vec<FlagSpec> {
    flags
        .into_iter()
        .map(|flag| flag.with_group(label))
        .collect()
}

/// The standard `help` toggle (`help`, `-h`, `--help`).
pub fn default_help() -> FlagSpec {
    FlagSpec::toggle(["help", "-h", "--help"])
        .with_name(HELP_FLAG)
        .with_description("Prints this help message.")
}

/// [`default_help`] with an extra handler run when the flag closes.
pub fn default_help_with<F>(handler: F) -> FlagSpec
where
    F: Fn(&[String]) -> Result<(), HandlerError> + Send + Sync + 'static,
{
    default_help().on_close(handler)
}

/// Result of [`Program::eval`].
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub result: ParseResult,
    /// Rendered help, set when the help flag was present.
    pub help: Option<String>,
}

impl Evaluation {
    pub fn printed_help(&self) -> bool {
        self.help.is_some()
    }

    pub fn rest(&self) -> &[String] {
        &self.result.rest
    }
}

/// A program's metadata and flag declarations.
///
/// # Examples
///
/// ```
/// use flagcap_core::{Arity, FlagSpec, Meta, Program, default_help};
///
/// let program = Program::new(Meta {
///     name: "find".into(),
///     ..Meta::default()
/// })
/// .flag(default_help())
/// .flag(FlagSpec::new(["-n"]).with_name("name").with_arity(Arity::Exact(1)));
///
/// let eval = program.eval(&["-n", "*.rs", "src"]).unwrap();
/// assert_eq!(eval.result.values("name"), ["*.rs"]);
/// assert_eq!(eval.rest(), ["src"]);
/// assert!(!eval.printed_help());
///
/// let eval = program.eval(&["--help"]).unwrap();
/// assert!(eval.help.unwrap().starts_with("Usage: find"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct Program {
    pub meta: Meta,
    pub flags: Vec<FlagSpec>,
}

impl Program {
    pub fn new(meta: Meta) -> Self {
        Self {
            meta,
            flags: Vec::new(),
        }
    }

    /// Appends flags, keeping declaration order.
    pub fn with_flags(mut self, flags: impl IntoIterator<Item = FlagSpec>) -> Self {
        self.flags.extend(flags);
        self
    }

    pub fn flag(mut self, flag: FlagSpec) -> Self {
        self.flags.push(flag);
        self
    }

    pub fn registry(&self) -> Result<Registry, RegistryError> {
        Registry::build(self.flags.iter().cloned())
    }

    /// Parses `args` (without the program name) against all flags.
    ///
    /// # Errors
    ///
    /// Registration conflicts and handler failures.
    pub fn eval<S: AsRef<str>>(&self, args: &[S]) -> Result<Evaluation, Error> {
        let registry = self.registry()?;
        let result = registry.parse(args)?;
        let help = if result.is_present(HELP_FLAG) {
            debug!(program = %self.meta.name, "help requested");
            Some(render_help(&self.meta, registry.specs()))
        } else {
            None
        };
        Ok(Evaluation { result, help })
    }

    /// Parses `args` against only the flags named in `names` and returns the
    /// tokens no selected flag consumed.
    ///
    /// Unknown names are ignored.
    pub fn eval_only<S: AsRef<str>>(
        &self,
        args: &[S],
        names: &[&str],
    ) -> Result<Vec<String>, Error> {
        let selected = names.iter().flat_map(|name| {
            self.flags
                .iter()
                .filter(move |flag| flag.resolved_name() == *name)
                .cloned()
        });
        let registry = Registry::build(selected)?;
        Ok(registry.parse(args)?.rest)
    }

    /// Renders help text for all declared flags.
    pub fn help(&self) -> String {
        render_help(&self.meta, &self.flags)
    }
}

/// Renders usage, description and the option table.
///
/// Consecutive flags sharing a group label form one section.
pub fn render_help(meta: &Meta, flags: &[FlagSpec]) -> String {
    let mut out = String::new();
    let name = if meta.name.trim().is_empty() {
        "program"
    } else {
        meta.name.trim()
    };
    out.push_str(&format!("Usage: {name} [options]\n"));
    if !meta.description.trim().is_empty() {
        out.push_str(&format!("  {}\n", meta.description.trim()));
    }
    if !meta.version.trim().is_empty() {
        out.push_str(&format!("  version {}\n", meta.version.trim()));
    }

    if flags.is_empty() {
        return out;
    }
    out.push_str("\nOptions:\n");

    let mut sections: Vec<(&str, Vec<&FlagSpec>)> = Vec::new();
    for flag in flags {
        match sections.last_mut() {
            Some((label, members)) if *label == flag.group => members.push(flag),
            _ => sections.push((flag.group.as_str(), vec![flag])),
        }
    }

    for (idx, (label, members)) in sections.iter().enumerate() {
        if idx > 0 {
            out.push('\n');
        }
        if !label.is_empty() {
            out.push_str(&format!("=== {label} ===\n"));
        }
        let rows: Vec<(String, &str, &str)> = members
            .iter()
            .map(|flag| {
                let keys = if flag.identifiers.is_empty() {
                    flag.resolved_name().to_string()
                } else {
                    flag.identifiers.join(", ")
                };
                (keys, flag.resolved_name(), flag.description.trim())
            })
            .collect();
        let keys_width = rows.iter().map(|(k, _, _)| k.len()).max().unwrap_or(0);
        let name_width = rows.iter().map(|(_, n, _)| n.len()).max().unwrap_or(0);
        for (keys, name, description) in rows {
            let line = format!("  {keys:keys_width$}  {name:name_width$}  {description}");
            out.push_str(line.trim_end());
            out.push('\n');
        }
    }

    out
}
