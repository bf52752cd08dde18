//! Configuration for the generation pipeline.
//!
//! This module provides the configuration types controlling inlining bounds, parallel
//! fan-out, the collection types encoded as arrays, and the external solver.

use std::time::Duration;

/// Configuration for the generation pipeline.
///
/// Controls interprocedural inlining, the per-path fan-out and the built-in resolvers.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Maximum inlining depth below the analyzed method (default: 8).
    pub max_call_depth: usize,

    /// Inline a callee that is already on the call stack (default: `false`).
    ///
    /// When disabled, any method already being inlined is never inlined again, which
    /// bounds direct and indirect recursion alike. When enabled, recursion is bounded by
    /// [`max_call_depth`](Self::max_call_depth) only.
    pub allow_recursive_inlining: bool,

    /// Solve paths in parallel (default: `true`).
    pub parallel: bool,

    /// Log every infeasible path at `debug` level (default: `true`).
    pub log_infeasible_paths: bool,

    /// Generic collection types encoded as arrays of their first type argument.
    pub collection_types: Vec<String>,

    /// External solver used by [`ProcessSolver`](crate::smt::ProcessSolver).
    pub solver: SolverConfig,
}

/// Configuration of an external SMT-LIB2 solver process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolverConfig {
    /// Solver binary (default: `z3`).
    pub program: String,

    /// Arguments making the solver read SMT-LIB2 from stdin (default: `-in -smt2`).
    pub args: Vec<String>,

    /// Wall-clock limit per path; `None` waits indefinitely.
    pub timeout: Option<Duration>,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            program: "z3".to_string(),
            args: vec!["-in".to_string(), "-smt2".to_string()],
            timeout: None,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_call_depth: 8,
            allow_recursive_inlining: false,
            parallel: true,
            log_infeasible_paths: true,
            collection_types: vec!["System.Collections.Generic.List`1".to_string()],
            solver: SolverConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Creates a new configuration with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a configuration for quick runs.
    ///
    /// Only the analyzed method and its direct callees are inlined, and each solver call
    /// is limited to ten seconds.
    #[must_use]
    pub fn fast() -> Self {
        Self {
            max_call_depth: 1,
            solver: SolverConfig {
                timeout: Some(Duration::from_secs(10)),
                ..SolverConfig::default()
            },
            ..Self::default()
        }
    }

    /// Creates a configuration for exhaustive runs.
    ///
    /// Deeper inlining, bounded self-recursion, and `IList`/`ICollection` treated as arrays.
    #[must_use]
    pub fn thorough() -> Self {
        Self {
            max_call_depth: 16,
            allow_recursive_inlining: true,
            collection_types: vec![
                "System.Collections.Generic.List`1".to_string(),
                "System.Collections.Generic.IList`1".to_string(),
                "System.Collections.Generic.ICollection`1".to_string(),
                "System.Collections.Generic.IReadOnlyList`1".to_string(),
            ],
            ..Self::default()
        }
    }

    /// Sets the solver configuration.
    #[must_use]
    pub fn with_solver(mut self, solver: SolverConfig) -> Self {
        self.solver = solver;
        self
    }

    /// Sets whether paths are solved in parallel.
    #[must_use]
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Sets the maximum inlining depth.
    #[must_use]
    pub fn with_max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = depth;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.max_call_depth, 8);
        assert!(!config.allow_recursive_inlining);
        assert!(config.parallel);
        assert_eq!(config.solver.program, "z3");
        assert_eq!(config.solver.args, vec!["-in", "-smt2"]);
    }

    #[test]
    fn test_presets() {
        assert_eq!(EngineConfig::fast().max_call_depth, 1);
        assert!(EngineConfig::fast().solver.timeout.is_some());
        let thorough = EngineConfig::thorough();
        assert!(thorough.allow_recursive_inlining);
        assert!(thorough.collection_types.len() > 1);
    }

    #[test]
    fn test_builders() {
        let config = EngineConfig::new().with_parallel(false).with_max_call_depth(2);
        assert!(!config.parallel);
        assert_eq!(config.max_call_depth, 2);
    }
}
