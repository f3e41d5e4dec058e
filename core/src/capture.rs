//! The capture state machine.
//!
//! Tokens are consumed in a single pass with no lookahead. Each token either
//! activates a flag (opening its capture window), extends the active window,
//! or falls through to `rest`. Whether a token may interrupt the active
//! window, and whether the window must close, depends on the active flag's
//! [`Arity`] and how many values it has captured so far:
//!
//! | arity              | may interrupt         | must close                           |
//! |--------------------|-----------------------|--------------------------------------|
//! | none active        | always                | never                                |
//! | `Toggle`           | always                | always                               |
//! | `Exact(n)`         | `count == n`          | `count == n`                         |
//! | `Range{min, max}`  | `count >= min`        | `count > max`, unless `min > 0` is met |
//!
//! Windows are closed in order, and each close runs the flag's on-close
//! handler synchronously before the next token is examined. Whatever window
//! is still open at end of input is flushed.

use indexmap::IndexMap;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::{Arity, HandlerError, Registry};

/// Failure while running the capture machine.
#[derive(Debug, Error)]
pub enum ParseError {
    /// An on-close handler returned an error. Parsing stops at that close.
    #[error("handler for flag `{flag}` failed: {source}")]
    Handler {
        flag: String,
        #[source]
        source: HandlerError,
    },
}

/// Captured state of one flag after parsing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FlagState {
    /// Values captured by this flag's windows that were not handed to an
    /// on-close handler.
    pub values: Vec<String>,
    /// Number of activations.
    pub present: usize,
    pub arity: Arity,
}

impl FlagState {
    pub fn is_present(&self) -> bool {
        self.present > 0
    }

    /// Whether the final value count satisfies the declared arity.
    pub fn is_satisfied(&self) -> bool {
        self.arity.accepts(self.values.len())
    }
}

/// Output of one parse.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParseResult {
    /// Per-flag state keyed by canonical name, in declaration order.
    pub flags: IndexMap<String, FlagState>,
    /// Tokens attributable to no flag, in input order.
    pub rest: Vec<String>,
}

impl ParseResult {
    /// Returns a copy of the state for `name`, or an empty state if no such
    /// flag was registered.
    pub fn get(&self, name: &str) -> FlagState {
        self.flags.get(name).cloned().unwrap_or_default()
    }

    pub fn values(&self, name: &str) -> &[String] {
        self.flags
            .get(name)
            .map(|state| state.values.as_slice())
            .unwrap_or(&[])
    }

    pub fn is_present(&self, name: &str) -> bool {
        self.flags.get(name).is_some_and(FlagState::is_present)
    }

    /// Flags that were present and whose values satisfy their arity.
    ///
    /// Unsatisfied flags stay available through [`flags`](Self::flags).
    pub fn satisfied(&self) -> impl Iterator<Item = (&str, &FlagState)> {
        self.flags
            .iter()
            .filter(|(_, state)| state.is_present() && state.is_satisfied())
            .map(|(name, state)| (name.as_str(), state))
    }

    /// Owned form of [`satisfied`](Self::satisfied).
    pub fn yielded(&self) -> IndexMap<String, FlagState> {
        self.satisfied()
            .map(|(name, state)| (name.to_string(), state.clone()))
            .collect()
    }
}

#[derive(Debug, Clone, Copy)]
struct Window {
    index: usize,
    count: usize,
}

/// Mutable state of a single parse.
struct Capture<'r> {
    registry: &'r Registry,
    states: Vec<FlagState>,
    rest: Vec<String>,
    active: Option<Window>,
}

impl<'r> Capture<'r> {
    fn new(registry: &'r Registry) -> Self {
        let states = registry
            .specs()
            .iter()
            .map(|spec| FlagState {
                arity: spec.arity,
                ..FlagState::default()
            })
            .collect();
        Self {
            registry,
            states,
            rest: Vec::new(),
            active: None,
        }
    }

    fn arity(&self, window: Window) -> Arity {
        self.registry.specs()[window.index].arity
    }

    fn may_interrupt(&self) -> bool {
        let Some(window) = self.active else {
            return true;
        };
        match self.arity(window) {
            Arity::Toggle => true,
            Arity::Exact(n) => window.count == n,
            Arity::Range { min, .. } => window.count >= min,
        }
    }

    fn must_close(&self) -> bool {
        let Some(window) = self.active else {
            return false;
        };
        match self.arity(window) {
            Arity::Toggle => true,
            Arity::Exact(n) => window.count == n,
            Arity::Range { min, max } => {
                if min > 0 && window.count >= min {
                    return false;
                }
                max.is_some_and(|max| window.count > max)
            }
        }
    }

    fn close(&mut self) -> Result<(), ParseError> {
        let Some(window) = self.active.take() else {
            return Ok(());
        };
        let spec = &self.registry.specs()[window.index];
        let state = &mut self.states[window.index];
        debug!(flag = %spec.name, captured = ?state.values, "closing capture window");

        if let Some(handler) = &spec.on_close {
            let values = std::mem::take(&mut state.values);
            debug!(flag = %spec.name, "calling handler");
            handler(values.as_slice()).map_err(|source| ParseError::Handler {
                flag: spec.name.clone(),
                source,
            })?;
        }
        Ok(())
    }

    fn activate(&mut self, index: usize, token: &str) {
        let spec = &self.registry.specs()[index];
        debug!(flag = %spec.name, token, arity = %spec.arity, "begin flag capture");
        self.states[index].present += 1;
        self.active = Some(Window { index, count: 0 });
    }

    fn step(&mut self, token: &str) -> Result<(), ParseError> {
        if self.may_interrupt() {
            if self.must_close() {
                self.close()?;
            }
            if let Some(index) = self.registry.index_of(token) {
                self.close()?;
                self.activate(index, token);
                return Ok(());
            }
        }

        if let Some(window) = self.active.as_mut() {
            window.count += 1;
            self.states[window.index].values.push(token.to_string());
            return Ok(());
        }

        debug!(token, "no flag active, adding to rest");
        self.rest.push(token.to_string());
        Ok(())
    }

    fn finish(mut self) -> Result<ParseResult, ParseError> {
        self.close()?;
        let flags = self
            .registry
            .specs()
            .iter()
            .map(|spec| spec.name.clone())
            .zip(self.states)
            .collect();
        Ok(ParseResult {
            flags,
            rest: self.rest,
        })
    }
}

impl Registry {
    /// Runs the capture machine over `tokens`.
    ///
    /// `tokens` is the argument vector without the program name; each token
    /// is matched verbatim. The registry is only read, so it can be reused.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::Handler`] if an on-close handler fails. Unmatched
    /// tokens and arity violations are not errors.
    ///
    /// # Examples
    ///
    /// ```
    /// use flagcap_core::{Arity, FlagSpec, Registry};
    ///
    /// let registry = Registry::build(vec![
    ///     FlagSpec::new(["-f"]).with_arity(Arity::Exact(2)),
    /// ])
    /// .unwrap();
    /// let result = registry.parse(&["-f", "a", "b", "c"]).unwrap();
    ///
    /// assert_eq!(result.values("-f"), ["a", "b"]);
    /// assert_eq!(result.rest, ["c"]);
    /// ```
    pub fn parse<S: AsRef<str>>(&self, tokens: &[S]) -> Result<ParseResult, ParseError> {
        let mut capture = Capture::new(self);
        for token in tokens {
            capture.step(token.as_ref())?;
        }
        capture.finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::FlagSpec;

    fn registry(specs: Vec<FlagSpec>) -> Registry {
        Registry::build(specs).unwrap()
    }

    fn help() -> FlagSpec {
        FlagSpec::toggle(["help", "-h", "--help"]).with_name("help")
    }

    fn include() -> FlagSpec {
        FlagSpec::new(["-i", "--include"]).with_name("include")
    }

    fn file() -> FlagSpec {
        FlagSpec::new(["f", "-f"]).with_name("file")
    }

    fn recurse() -> FlagSpec {
        FlagSpec::toggle(["r", "-r"]).with_name("recurse")
    }

    /// Records handler invocations as `name=v1,v2`.
    fn recorder(
        log: &Arc<Mutex<Vec<String>>>,
        name: &str,
    ) -> impl Fn(&[String]) -> Result<(), HandlerError> + use<> {
        let log = Arc::clone(log);
        let name = name.to_string();
        move |values: &[String]| {
            log.lock().unwrap().push(format!("{name}={}", values.join(",")));
            Ok(())
        }
    }

    #[test]
    fn test_toggle_counts_every_spelling() {
        let r = registry(vec![help(), include(), file()]);
        let result = r.parse(&["--help", "help", "-h"]).unwrap();
        let state = result.get("help");
        assert_eq!(state.present, 3);
        assert!(state.values.is_empty());
        assert!(result.rest.is_empty());
    }

    #[test]
    fn test_unconstrained_flag_captures_until_next_flag() {
        let r = registry(vec![include(), file()]);
        let result = r.parse(&["--include", "foo", "bar", "-f", "baz"]).unwrap();
        assert_eq!(result.values("include"), ["foo", "bar"]);
        assert_eq!(result.get("include").present, 1);
        assert_eq!(result.values("file"), ["baz"]);
    }

    #[test]
    fn test_leading_positional_and_toggle_before_capture() {
        let r = registry(vec![recurse(), file()]);
        let result = r
            .parse(&["./path/to/something/", "r", "-f", "search", "term"])
            .unwrap();
        assert_eq!(result.rest, ["./path/to/something/"]);
        assert!(result.is_present("recurse"));
        assert_eq!(result.values("file"), ["search", "term"]);
        assert_eq!(result.get("file").present, 1);
    }

    #[test]
    fn test_exact_arity_stops_capturing() {
        let r = registry(vec![FlagSpec::new(["-f"]).with_arity(Arity::Exact(2))]);
        let result = r.parse(&["-f", "a", "b", "c"]).unwrap();
        let state = result.get("-f");
        assert_eq!(state.values, ["a", "b"]);
        assert_eq!(state.present, 1);
        assert_eq!(result.rest, ["c"]);
    }

    #[test]
    fn test_exact_arity_captures_flag_spellings_until_fulfilled() {
        let r = registry(vec![
            FlagSpec::new(["-f"]).with_arity(Arity::Exact(2)),
            FlagSpec::toggle(["-r"]),
        ]);
        let result = r.parse(&["-f", "-r", "x", "-r"]).unwrap();
        assert_eq!(result.values("-f"), ["-r", "x"]);
        assert_eq!(result.get("-r").present, 1);
    }

    #[test]
    fn test_toggle_interrupts_and_routes_next_token_to_rest() {
        let r = registry(vec![
            FlagSpec::toggle(["-r"]),
            FlagSpec::new(["-f"]).with_arity(Arity::any()),
        ]);
        let result = r.parse(&["-f", "x", "-r", "y"]).unwrap();
        assert_eq!(result.values("-f"), ["x"]);
        assert!(result.is_present("-r"));
        assert!(result.values("-r").is_empty());
        assert_eq!(result.rest, ["y"]);
    }

    #[test]
    fn test_toggle_never_captures() {
        let r = registry(vec![recurse(), file()]);
        let inputs: [&[&str]; 4] = [
            &["r", "a", "b"],
            &["-f", "x", "r", "y", "r"],
            &["r", "r", "-r", "z"],
            &["a", "r"],
        ];
        for input in inputs {
            let result = r.parse(input).unwrap();
            assert!(result.values("recurse").is_empty(), "{input:?}");
        }
    }

    #[test]
    fn test_unmatched_input_is_all_rest() {
        let r = registry(vec![help(), include(), file()]);
        let input = ["alpha", "--beta", "-x", "gamma"];
        let result = r.parse(&input).unwrap();
        assert_eq!(result.rest, input);
        assert!(result.flags.values().all(|state| state.present == 0));
    }

    #[test]
    fn test_rest_preserves_order_around_windows() {
        let r = registry(vec![
            FlagSpec::new(["-o"]).with_arity(Arity::Exact(1)),
            FlagSpec::toggle(["-v"]),
        ]);
        let result = r.parse(&["a", "-o", "out", "b", "-v", "c", "d"]).unwrap();
        assert_eq!(result.rest, ["a", "b", "c", "d"]);
        assert_eq!(result.values("-o"), ["out"]);
    }

    #[test]
    fn test_parse_is_deterministic() {
        let r = registry(vec![help(), include(), file(), recurse()]);
        let input = ["x", "-i", "a", "r", "b", "-f", "c", "--help"];
        let first = r.parse(&input).unwrap();
        for _ in 0..5 {
            assert_eq!(r.parse(&input).unwrap(), first);
        }
    }

    #[test]
    fn test_repeated_activation_accumulates_without_handler() {
        let r = registry(vec![include(), recurse()]);
        let result = r.parse(&["-i", "a", "r", "-i", "b", "c"]).unwrap();
        let state = result.get("include");
        assert_eq!(state.present, 2);
        assert_eq!(state.values, ["a", "b", "c"]);
    }

    #[test]
    fn test_handlers_run_once_per_window_in_close_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let r = registry(vec![
            include().on_close(recorder(&log, "include")),
            file()
                .with_arity(Arity::Exact(1))
                .on_close(recorder(&log, "file")),
            recurse().on_close(recorder(&log, "recurse")),
        ]);

        let result = r
            .parse(&["-i", "a", "b", "-f", "x", "y", "r", "-i", "c"])
            .unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            ["include=a,b", "file=x", "recurse=", "include=c"]
        );
        assert_eq!(result.rest, ["y"]);
        assert!(result.values("include").is_empty());
        assert_eq!(result.get("include").present, 2);
    }

    #[test]
    fn test_end_of_input_flushes_active_window() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let r = registry(vec![
            FlagSpec::new(["-f"])
                .with_arity(Arity::Exact(3))
                .on_close(recorder(&log, "f")),
        ]);
        r.parse(&["-f", "a"]).unwrap();
        assert_eq!(*log.lock().unwrap(), ["f=a"]);

        log.lock().unwrap().clear();
        r.parse::<&str>(&[]).unwrap();
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn test_handler_failure_propagates_and_stops() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let r = registry(vec![
            FlagSpec::new(["-a"]).on_close(|_: &[String]| Err("boom".into())),
            FlagSpec::new(["-b"]).on_close(recorder(&log, "b")),
        ]);

        let err = r.parse(&["-a", "x", "-b", "y"]).unwrap_err();
        let ParseError::Handler { flag, source } = &err;
        assert_eq!(flag, "-a");
        assert_eq!(source.to_string(), "boom");
        assert!(err.to_string().contains("`-a`"));
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn test_range_window_boundaries() {
        // (arity, input, captured, rest)
        let cases: Vec<(Arity, Vec<&str>, Vec<&str>, Vec<&str>)> = vec![
            // min not met: flag spellings are captured as values
            (Arity::at_least(2), vec!["-f", "a", "-g", "b", "-g"], vec!["a", "-g", "b"], vec![]),
            // max is enforced once the count exceeds it
            (Arity::at_most(2), vec!["-f", "a", "b", "c", "d"], vec!["a", "b", "c"], vec!["d"]),
            (Arity::at_most(0), vec!["-f", "a", "b"], vec!["a"], vec!["b"]),
            // a satisfied minimum suppresses the max close
            (Arity::between(1, 2), vec!["-f", "a", "b", "c", "d"], vec!["a", "b", "c", "d"], vec![]),
            (Arity::between(1, 2), vec!["-f", "a", "b", "c", "-g", "d"], vec!["a", "b", "c"], vec![]),
            (Arity::any(), vec!["-f", "-g", "x"], vec![], vec![]),
        ];

        for (arity, input, captured, rest) in cases {
            let r = registry(vec![
                FlagSpec::new(["-f"]).with_arity(arity),
                FlagSpec::new(["-g"]).with_arity(Arity::Exact(1)),
            ]);
            let result = r.parse(&input).unwrap();
            assert_eq!(result.values("-f"), captured, "{arity} on {input:?}");
            assert_eq!(result.rest, rest, "{arity} on {input:?}");
        }
    }

    #[test]
    fn test_exact_zero_behaves_like_toggle() {
        let r = registry(vec![FlagSpec::new(["-z"]).with_arity(Arity::Exact(0))]);
        let result = r.parse(&["-z", "a", "-z"]).unwrap();
        assert_eq!(result.get("-z").present, 2);
        assert!(result.values("-z").is_empty());
        assert_eq!(result.rest, ["a"]);
    }

    #[test]
    fn test_satisfied_view_filters_by_presence_and_arity() {
        let r = registry(vec![
            FlagSpec::new(["-e"]).with_arity(Arity::Exact(2)),
            FlagSpec::new(["-m"]).with_arity(Arity::between(1, 2)),
            FlagSpec::toggle(["-t"]),
            FlagSpec::new(["-n"]),
        ]);
        let result = r.parse(&["-t", "-m", "a", "b", "c", "-e", "x"]).unwrap();

        let names: Vec<&str> = result.satisfied().map(|(name, _)| name).collect();
        assert_eq!(names, ["-t"]);
        assert_eq!(result.values("-e"), ["x"]);
        assert_eq!(result.values("-m"), ["a", "b", "c"]);
        assert!(result.flags.contains_key("-n"));
        assert_eq!(result.yielded().len(), 1);
    }

    #[test]
    fn test_get_unknown_flag_is_empty() {
        let r = registry(vec![help()]);
        let result = r.parse(&["x"]).unwrap();
        assert_eq!(result.get("nope"), FlagState::default());
        assert!(!result.is_present("nope"));
    }

    #[test]
    fn test_registry_shared_across_threads() {
        let r = Arc::new(registry(vec![include(), recurse()]));
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let r = Arc::clone(&r);
                std::thread::spawn(move || {
                    let token = i.to_string();
                    r.parse(&["-i", token.as_str(), "r"]).unwrap()
                })
            })
            .collect();
        for (i, handle) in handles.into_iter().enumerate() {
            let result = handle.join().unwrap();
            assert_eq!(result.values("include"), [i.to_string()]);
        }
    }
}
