//! The pipeline: lowering, resolution, rendering, path enumeration, solving and decoding.
//!
//! A [`RunContext`] holds everything one run shares: configuration, the model provider,
//! the sentence repository, the resolver chains and the cache of compiled forms. It is
//! created once and passed by reference through every stage, including the recursive
//! compilation of inlined callees.
//!
//! [`Generator`] drives a run against a [`Solver`]: one solver call per interesting path,
//! fanned out with rayon, results merged into an ordered [`InterestingInputs`].
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use dotprobe::{EngineConfig, Generator};
//! use dotprobe::model::{InMemoryProvider, MethodBuilder, MethodRef, RuntimeType, Terminator, TypeName};
//!
//! let method = MethodRef::new_static(TypeName::new("Sample.Math"), "Id", vec![RuntimeType::INT32], Some(RuntimeType::INT32));
//! let mut builder = MethodBuilder::new(method.clone(), &["x"]);
//! let entry = builder.block();
//! let x = builder.argument(0)?;
//! builder.terminate(entry, Terminator::Return(Some(x)))?;
//!
//! let provider = InMemoryProvider::new();
//! provider.add_body(builder.build()?);
//!
//! let generator = Generator::with_provider(Arc::new(provider), EngineConfig::default());
//! let inputs = generator.interesting_inputs(&method)?;
//! println!("{} inputs", inputs.len());
//! # Ok::<(), dotprobe::Error>(())
//! ```

use std::sync::Arc;

use dashmap::DashMap;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::{
    config::EngineConfig,
    decode::{decode_path, InterestingInputs, SkipReason},
    encoding::SentenceRepository,
    form::{self, SmtForm},
    formula::{self, InlineSummary, RenderedForm},
    model::{MethodRef, ModelProvider, TypeName},
    paths::{self, PathDocument},
    resolve::{
        default_method_resolvers, default_type_resolvers, resolve_form, CallStack,
        FirstAvailable, ResolveWay, Resolver,
    },
    smt::{ProcessSolver, Solver, SolverOutcome},
    Error, Result,
};

/// A method taken through lowering, resolution, rendering and path enumeration.
#[derive(Debug)]
pub struct CompiledForm {
    /// The symbolic form
    pub form: Arc<SmtForm>,
    /// SMT-LIB fragments of every instruction
    pub rendered: RenderedForm,
    /// Interesting paths after the coverage filter
    pub paths: Vec<PathDocument>,
    /// The form summarized for inlining into callers
    pub summary: Arc<InlineSummary>,
}

/// Shared state of one run.
pub struct RunContext {
    config: EngineConfig,
    provider: Arc<dyn ModelProvider>,
    sentences: Arc<SentenceRepository>,
    forms: DashMap<(String, Vec<String>), Arc<CompiledForm>>,
    type_resolvers: Vec<Box<dyn Resolver<TypeName>>>,
    method_resolvers: Vec<Box<dyn Resolver<MethodRef>>>,
    resolve_way: Box<dyn ResolveWay>,
}

impl RunContext {
    /// Creates a run with the default resolver chains and [`FirstAvailable`] confirmation.
    #[must_use]
    pub fn new(provider: Arc<dyn ModelProvider>, config: EngineConfig) -> Self {
        RunContext {
            config,
            sentences: Arc::new(SentenceRepository::new(provider.clone())),
            provider,
            forms: DashMap::new(),
            type_resolvers: default_type_resolvers(),
            method_resolvers: default_method_resolvers(),
            resolve_way: Box::new(FirstAvailable),
        }
    }

    /// Replaces the type resolver chain.
    #[must_use]
    pub fn with_type_resolvers(mut self, resolvers: Vec<Box<dyn Resolver<TypeName>>>) -> Self {
        self.type_resolvers = resolvers;
        self
    }

    /// Replaces the method resolver chain.
    #[must_use]
    pub fn with_method_resolvers(mut self, resolvers: Vec<Box<dyn Resolver<MethodRef>>>) -> Self {
        self.method_resolvers = resolvers;
        self
    }

    /// Replaces the confirmation strategy.
    #[must_use]
    pub fn with_resolve_way(mut self, way: impl ResolveWay + 'static) -> Self {
        self.resolve_way = Box::new(way);
        self
    }

    /// The run configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The model provider.
    #[must_use]
    pub fn provider(&self) -> &Arc<dyn ModelProvider> {
        &self.provider
    }

    /// The sentence repository shared by every form of the run.
    #[must_use]
    pub fn sentences(&self) -> &SentenceRepository {
        &self.sentences
    }

    pub(crate) fn type_resolvers(&self) -> &[Box<dyn Resolver<TypeName>>] {
        &self.type_resolvers
    }

    pub(crate) fn method_resolvers(&self) -> &[Box<dyn Resolver<MethodRef>>] {
        &self.method_resolvers
    }

    pub(crate) fn resolve_way(&self) -> &dyn ResolveWay {
        self.resolve_way.as_ref()
    }

    /// Compiles the method under test.
    ///
    /// # Errors
    ///
    /// See [`RunContext::compile_in`].
    pub fn compile(&self, method: &MethodRef) -> Result<Arc<CompiledForm>> {
        self.compile_in(method, &CallStack::new())
    }

    /// Compiles `method` under `stack`; the stack length is the inlining depth.
    ///
    /// Results are cached per signature and call stack; inlining decisions depend on which
    /// methods the stack holds.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RecursionLimit`] if the stack is deeper than
    /// [`EngineConfig::max_call_depth`], [`Error::UnsupportedConstruct`] if the method has
    /// no body or uses an operation without an encoding, and [`Error::UnresolvedReference`]
    /// if resolution was cancelled.
    pub fn compile_in(&self, method: &MethodRef, stack: &CallStack) -> Result<Arc<CompiledForm>> {
        let depth = stack.len();
        if depth > self.config.max_call_depth {
            return Err(Error::RecursionLimit(self.config.max_call_depth));
        }
        let frames = stack.signatures();
        let key = (method.signature(), frames.clone());
        if let Some(compiled) = self.forms.get(&key) {
            return Ok(compiled.value().clone());
        }

        let Some(body) = self.provider.method_body(method) else {
            return Err(unsupported!("No body available for {}", method));
        };
        let form = form::lower(body, self.provider.as_ref(), depth, frames)?;
        debug!(
            method = %method,
            depth,
            blocks = form.blocks().len(),
            instructions = form.instructions().len(),
            "method lowered"
        );

        resolve_form(self, &form, stack)?;
        let rendered = formula::render(&form, &self.sentences)?;
        let paths = paths::interesting_paths(&form, &rendered)?;
        let summary = Arc::new(InlineSummary::build(&form, &rendered)?);
        info!(method = %method, depth, paths = paths.len(), "method compiled");

        let compiled = Arc::new(CompiledForm {
            form: Arc::new(form),
            rendered,
            paths,
            summary,
        });
        Ok(self.forms.entry(key).or_insert(compiled).value().clone())
    }
}

/// Generates interesting inputs by solving every interesting path of a method.
pub struct Generator {
    run: Arc<RunContext>,
    solver: Arc<dyn Solver>,
}

impl Generator {
    /// Creates a generator over an existing run.
    #[must_use]
    pub fn new(run: Arc<RunContext>, solver: Arc<dyn Solver>) -> Self {
        Generator { run, solver }
    }

    /// Creates a run with default resolvers and an external solver process as configured.
    #[must_use]
    pub fn with_provider(provider: Arc<dyn ModelProvider>, config: EngineConfig) -> Self {
        let solver = Arc::new(ProcessSolver::new(config.solver.clone()));
        Generator {
            run: Arc::new(RunContext::new(provider, config)),
            solver,
        }
    }

    /// The run.
    #[must_use]
    pub fn run(&self) -> &Arc<RunContext> {
        &self.run
    }

    /// The path documents of `method`, without solving them.
    ///
    /// # Errors
    ///
    /// See [`RunContext::compile_in`].
    pub fn documents(&self, method: &MethodRef) -> Result<Vec<PathDocument>> {
        Ok(self.run.compile(method)?.paths.clone())
    }

    /// Solves every interesting path of `method` and decodes the parameter values.
    ///
    /// Infeasible paths and paths the solver gives up on produce no inputs and are listed
    /// in [`InterestingInputs::skipped`].
    ///
    /// # Errors
    ///
    /// Returns the first compilation error, solver failure or decoding error; no partial
    /// results are returned.
    pub fn interesting_inputs(&self, method: &MethodRef) -> Result<InterestingInputs> {
        let compiled = self.run.compile(method)?;
        let inputs = InterestingInputs::new();
        let solve = |document: &PathDocument| self.solve(&compiled, document, &inputs);
        if self.run.config().parallel {
            compiled.paths.par_iter().try_for_each(solve)?;
        } else {
            compiled.paths.iter().try_for_each(solve)?;
        }
        info!(
            method = %method,
            paths = compiled.paths.len(),
            inputs = inputs.len(),
            skipped = inputs.skipped().len(),
            "interesting inputs generated"
        );
        Ok(inputs)
    }

    fn solve(
        &self,
        compiled: &CompiledForm,
        document: &PathDocument,
        inputs: &InterestingInputs,
    ) -> Result<()> {
        let text = document.text();
        let group = document.group();
        match self.solver.check(&text)? {
            SolverOutcome::Sat(model) => {
                debug!(path = %group, bytes = text.len(), entries = model.len(), "sat");
                let decoded = decode_path(
                    self.run.sentences(),
                    compiled.form.body(),
                    document,
                    &model,
                )?;
                for input in decoded {
                    inputs.insert(input);
                }
            }
            SolverOutcome::Unsat => {
                if self.run.config().log_infeasible_paths {
                    debug!(path = %group, "infeasible path");
                }
                inputs.skip(group, SkipReason::Infeasible);
            }
            SolverOutcome::Unknown(reason) => {
                warn!(path = %group, %reason, "solver returned unknown");
                inputs.skip(group, SkipReason::Unknown(reason));
            }
        }
        Ok(())
    }
}
