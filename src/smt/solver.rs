//! Solver collaborator and model representation.
//!
//! The pipeline hands a complete SMT-LIB2 document to a [`Solver`] and gets back a
//! [`SolverOutcome`]. A satisfiable outcome carries a [`Model`]: the solver's
//! `(define-fun name (params) sort value)` entries, kept as parsed S-expressions so the
//! decoder can walk their structure.
//!
//! [`ProcessSolver`] drives any SMT-LIB2 solver binary over stdin/stdout. Tests and
//! embedders implement [`Solver`] directly to answer in-process.

use std::{
    io::{Read, Write},
    process::{Child, Command, Stdio},
    thread,
    time::{Duration, Instant},
};

use tracing::{debug, trace};

use crate::{
    config::SolverConfig,
    smt::{parse, SExpr},
    Error, Result,
};

/// One `define-fun` entry of a model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelEntry {
    /// Defined symbol
    pub name: String,
    /// Parameters as `(name, sort)`; empty for constants
    pub params: Vec<(String, SExpr)>,
    /// Range sort
    pub sort: SExpr,
    /// Value expression
    pub value: SExpr,
}

impl ModelEntry {
    /// Returns `true` for zero-arity entries (interpreted constants).
    #[must_use]
    pub fn is_constant(&self) -> bool {
        self.params.is_empty()
    }
}

/// A satisfying assignment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Model {
    entries: Vec<ModelEntry>,
}

impl Model {
    /// Creates a model from entries.
    #[must_use]
    pub fn new(entries: Vec<ModelEntry>) -> Self {
        Model { entries }
    }

    /// Parses model text.
    ///
    /// Accepts `(model (define-fun ...) ...)`, the bare `((define-fun ...) ...)` list, and
    /// a plain sequence of `define-fun` commands. Entries other than `define-fun` are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Malformed`] if the text does not parse or a `define-fun` is
    /// malformed.
    pub fn parse(text: &str) -> Result<Model> {
        let mut entries = Vec::new();
        for expr in parse(text)? {
            collect_entries(&expr, &mut entries)?;
        }
        Ok(Model { entries })
    }

    /// Returns the entries in solver order.
    #[must_use]
    pub fn entries(&self) -> &[ModelEntry] {
        &self.entries
    }

    /// Looks up an entry by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ModelEntry> {
        self.entries.iter().find(|entry| entry.name == name)
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the model has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn collect_entries(expr: &SExpr, entries: &mut Vec<ModelEntry>) -> Result<()> {
    let Some(items) = expr.as_list() else {
        return Ok(());
    };
    match items.first().and_then(SExpr::as_symbol) {
        Some("define-fun") => entries.push(define_fun(items)?),
        Some("model") => {
            for item in &items[1..] {
                collect_entries(item, entries)?;
            }
        }
        Some(_) => {}
        None => {
            for item in items {
                collect_entries(item, entries)?;
            }
        }
    }
    Ok(())
}

fn define_fun(items: &[SExpr]) -> Result<ModelEntry> {
    if items.len() != 5 {
        return Err(malformed_error!(
            "define-fun with {} items",
            items.len()
        ));
    }
    let Some(name) = items[1].as_symbol() else {
        return Err(malformed_error!("define-fun without a name: {}", items[1]));
    };
    let Some(raw_params) = items[2].as_list() else {
        return Err(malformed_error!("define-fun {} without a parameter list", name));
    };
    let mut params = Vec::with_capacity(raw_params.len());
    for param in raw_params {
        match param.as_list() {
            Some([SExpr::Symbol(param_name), sort]) => {
                params.push((param_name.clone(), sort.clone()));
            }
            _ => return Err(malformed_error!("malformed parameter {} of {}", param, name)),
        }
    }
    Ok(ModelEntry {
        name: name.to_string(),
        params,
        sort: items[3].clone(),
        value: items[4].clone(),
    })
}

/// The verdict of one solver call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SolverOutcome {
    /// Satisfiable, with a model
    Sat(Model),
    /// Unsatisfiable; the path is infeasible
    Unsat,
    /// The solver gave up, with its reason if any
    Unknown(String),
}

impl SolverOutcome {
    /// Parses a complete solver response: the verdict line followed by the model.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Solver`] if the solver reported an error, and
    /// [`Error::Malformed`] if the response does not start with a verdict.
    pub fn parse(response: &str) -> Result<SolverOutcome> {
        let trimmed = response.trim_start();
        let (verdict, rest) = trimmed
            .split_once(char::is_whitespace)
            .unwrap_or((trimmed, ""));
        match verdict {
            "sat" => Ok(SolverOutcome::Sat(Model::parse(rest)?)),
            "unsat" => Ok(SolverOutcome::Unsat),
            "unknown" => Ok(SolverOutcome::Unknown(rest.trim().to_string())),
            _ if trimmed.starts_with("(error") => Err(Error::Solver(trimmed.trim().to_string())),
            _ => Err(malformed_error!(
                "Solver response does not start with a verdict: {}",
                trimmed.lines().next().unwrap_or_default()
            )),
        }
    }
}

/// An SMT-LIB2 solver.
///
/// One call per path document. Implementations are shared by the parallel path tasks and
/// must not keep per-call state outside the call.
pub trait Solver: Send + Sync {
    /// Decides `document` and returns the verdict with a model when satisfiable.
    ///
    /// # Errors
    ///
    /// Returns an error if the solver cannot be run or its answer cannot be understood.
    fn check(&self, document: &str) -> Result<SolverOutcome>;
}

/// A [`Solver`] running an external binary per call.
///
/// The document is written to the child's stdin; stdout is read until the child exits.
/// When [`SolverConfig::timeout`] is set the child is killed once it runs out of time and
/// the call reports [`SolverOutcome::Unknown`].
#[derive(Debug, Clone)]
pub struct ProcessSolver {
    config: SolverConfig,
}

impl ProcessSolver {
    /// Creates a solver for the configured binary.
    #[must_use]
    pub fn new(config: SolverConfig) -> Self {
        ProcessSolver { config }
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &SolverConfig {
        &self.config
    }
}

/// Owns a spawned solver process; dropping it kills the process if it is still running
/// and reaps it.
struct ChildGuard(Child);

impl ChildGuard {
    fn child(&mut self) -> &mut Child {
        &mut self.0
    }
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        if matches!(self.0.try_wait(), Ok(None)) {
            let _ = self.0.kill();
        }
        let _ = self.0.wait();
    }
}

impl Solver for ProcessSolver {
    fn check(&self, document: &str) -> Result<SolverOutcome> {
        let started = Instant::now();
        let mut guard = ChildGuard(
            Command::new(&self.config.program)
                .args(&self.config.args)
                .stdin(Stdio::piped())
                .stdout(Stdio::piped())
                .stderr(Stdio::null())
                .spawn()?,
        );

        // stdin is closed at the end of this block so the solver sees end of input
        if let Some(mut stdin) = guard.child().stdin.take() {
            stdin.write_all(document.as_bytes())?;
        }

        let Some(mut stdout) = guard.child().stdout.take() else {
            return Err(Error::Solver(format!(
                "{} did not expose stdout",
                self.config.program
            )));
        };
        let reader = thread::spawn(move || {
            let mut response = String::new();
            stdout.read_to_string(&mut response).map(|_| response)
        });

        let status = match self.config.timeout {
            None => guard.child().wait()?,
            Some(limit) => loop {
                if let Some(status) = guard.child().try_wait()? {
                    break status;
                }
                if started.elapsed() >= limit {
                    drop(guard);
                    debug!(
                        program = %self.config.program,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "solver timed out"
                    );
                    return Ok(SolverOutcome::Unknown("timeout".to_string()));
                }
                thread::sleep(Duration::from_millis(5));
            },
        };

        let response = reader
            .join()
            .map_err(|_| Error::Solver("solver output reader panicked".to_string()))??;

        trace!(
            program = %self.config.program,
            exit = ?status.code(),
            bytes = response.len(),
            "solver finished"
        );

        if response.trim().is_empty() && !status.success() {
            return Err(Error::Solver(format!(
                "{} exited with {status}",
                self.config.program
            )));
        }
        SolverOutcome::parse(&response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const Z3_MODEL: &str = r"sat
(
  (define-fun x.0 () Int
    (- 3))
  (define-fun flag.0 () Bool
    true)
  (define-fun |f| ((x!0 Int)) Int
    (ite (= x!0 1) 2 0))
)";

    #[test]
    fn test_parse_sat_response() {
        let SolverOutcome::Sat(model) = SolverOutcome::parse(Z3_MODEL).unwrap() else {
            panic!("expected sat");
        };
        assert_eq!(model.len(), 3);
        let x = model.get("x.0").unwrap();
        assert!(x.is_constant());
        assert_eq!(x.value.as_int(), Some(-3));
        assert_eq!(model.get("flag.0").unwrap().value, SExpr::bool(true));
        assert!(!model.get("f").unwrap().is_constant());
    }

    #[test]
    fn test_parse_model_keyword_form() {
        let model = Model::parse("(model (define-fun a () Int 4))").unwrap();
        assert_eq!(model.get("a").unwrap().value, SExpr::int(4));
    }

    #[test]
    fn test_parse_unsat_and_unknown() {
        assert_eq!(SolverOutcome::parse("unsat\n").unwrap(), SolverOutcome::Unsat);
        assert_eq!(
            SolverOutcome::parse("unknown\n").unwrap(),
            SolverOutcome::Unknown(String::new())
        );
    }

    #[test]
    fn test_parse_error_response() {
        assert!(matches!(
            SolverOutcome::parse("(error \"line 3: unknown constant\")"),
            Err(Error::Solver(_))
        ));
        assert!(matches!(
            SolverOutcome::parse("garbage"),
            Err(Error::Malformed { .. })
        ));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_dropped_guard_reaps_running_child() {
        let child = Command::new("sleep")
            .arg("30")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .spawn()
            .unwrap();
        let pid = child.id();
        drop(ChildGuard(child));
        assert!(!std::path::Path::new(&format!("/proc/{pid}")).exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_solver_exiting_without_reading_is_an_error() {
        let solver = ProcessSolver::new(SolverConfig {
            program: "sh".to_string(),
            args: vec!["-c".to_string(), "exit 3".to_string()],
            timeout: None,
        });
        let document = "(check-sat)\n".repeat(200_000);
        assert!(solver.check(&document).is_err());
    }

    #[test]
    fn test_malformed_define_fun() {
        assert!(Model::parse("((define-fun a Int))").is_err());
    }
}
