//! Command-line argument tokenizer.
//!
//! This crate partitions an argument vector against a set of declared flags:
//!
//! - [`FlagSpec`] — a flag's identifiers, canonical name, [`Arity`] and
//!   optional on-close [`Handler`].
//! - [`Registry`] — the compiled, conflict-free lookup over a set of flags.
//!   Building it rejects duplicate names and identifiers
//!   ([`RegistryError`]).
//! - [`Registry::parse`] — the capture state machine. It yields a
//!   [`ParseResult`] holding per-flag captured values and presence counts,
//!   plus the unmatched `rest` tokens.
//! - [`Program`] — metadata, grouped flags and help rendering on top of the
//!   above.
//! - [`FlagFile`] — YAML/JSON declaration files.
//!
//! Nothing here prints or exits; diagnostics are emitted as `tracing`
//! events.
//!
//! # Example
//!
//! ```
//! use flagcap_core::*;
//!
//! let specs = vec![
//!     FlagSpec::toggle(["-r"]).with_name("recurse"),
//!     FlagSpec::new(["-f", "--file"]).with_name("file"),
//! ];
//! let result = parse(&["-f", "x", "-r", "y"], specs).unwrap();
//!
//! assert_eq!(result.values("file"), ["x"]);
//! assert!(result.is_present("recurse"));
//! assert_eq!(result.rest, ["y"]);
//! ```

mod capture;
mod decl;
mod program;
mod registry;
mod types;

use thiserror::Error;

pub use capture::{FlagState, ParseError, ParseResult};
pub use decl::{DeclError, FlagDecl, FlagFile};
pub use program::{
    Evaluation, HELP_FLAG, Meta, Program, default_help, default_help_with, group, render_help,
};
pub use registry::{Registry, RegistryError};
pub use types::{Arity, FlagSpec, Handler, HandlerError};

/// Any failure of a one-shot build-and-parse.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Builds a registry from `specs` and parses `tokens` against it.
///
/// # Errors
///
/// [`Error::Registry`] for conflicting declarations (parsing never starts),
/// [`Error::Parse`] if an on-close handler fails.
pub fn parse<S: AsRef<str>>(
    tokens: &[S],
    specs: impl IntoIterator<Item = FlagSpec>,
) -> Result<ParseResult, Error> {
    let registry = Registry::build(specs)?;
    Ok(registry.parse(tokens)?)
}
