use crate::compile::driver::{Shader, ShaderCompiler};
use crate::compile::opts::CompilerOpts;
use crate::foundation::error::{SvmError, SvmResult};
use crate::program::compiled::CompiledShader;
use crate::program::global::GlobalProgram;
use crate::program::usage::OpcodeUsage;
use rayon::prelude::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

pub(crate) mod merge;

/// Cancellation request for a running batch, observed between shaders.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Compiles a batch of shaders and merges them into one [`GlobalProgram`].
///
/// Shaders compile independently (on a rayon pool when `parallel` is set); the merge that
/// rebases jump tables runs serially after every worker has returned.
#[derive(Debug)]
pub struct ShaderManager {
    opts: CompilerOpts,
    pool: Option<rayon::ThreadPool>,
    cancel: CancelFlag,
}

impl ShaderManager {
    pub fn new(opts: CompilerOpts) -> SvmResult<Self> {
        opts.validate()?;
        let pool = if opts.parallel {
            Some(build_thread_pool(opts.threads)?)
        } else {
            None
        };
        Ok(Self {
            opts,
            pool,
            cancel: CancelFlag::new(),
        })
    }

    pub fn opts(&self) -> &CompilerOpts {
        &self.opts
    }

    /// Handle that cancels the next (or current) [`Self::compile_all`].
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    #[tracing::instrument(skip_all, fields(shaders = shaders.len(), parallel = self.pool.is_some()))]
    pub fn compile_all(&self, shaders: &[Shader]) -> SvmResult<GlobalProgram> {
        let started = Instant::now();
        let usage = OpcodeUsage::new();
        let compiler = ShaderCompiler::new(&self.opts, &usage);
        let cancel = &self.cancel;

        let compile_one = |shader: &Shader| -> Option<CompiledShader> {
            if cancel.is_cancelled() {
                return None;
            }
            Some(compiler.compile(shader))
        };

        let compiled: Vec<Option<CompiledShader>> = match &self.pool {
            Some(pool) => pool.install(|| shaders.par_iter().map(|s| compile_one(s)).collect()),
            None => shaders.iter().map(|s| compile_one(s)).collect(),
        };

        if cancel.is_cancelled() || compiled.iter().any(Option::is_none) {
            tracing::info!("shader compilation cancelled");
            return Err(SvmError::Cancelled);
        }
        let compiled: Vec<CompiledShader> = compiled.into_iter().flatten().collect();

        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        let program = merge::assemble(compiled, usage.bits(), elapsed_ms);
        tracing::info!(
            shaders = program.shaders.len(),
            instrs = program.len(),
            degraded = program.report.degraded,
            elapsed_ms,
            "shader batch compiled"
        );
        Ok(program)
    }
}

fn build_thread_pool(threads: Option<usize>) -> SvmResult<rayon::ThreadPool> {
    if let Some(n) = threads
        && n == 0
    {
        return Err(SvmError::config("'threads' must be >= 1 when set"));
    }

    let mut builder = rayon::ThreadPoolBuilder::new();
    if let Some(n) = threads {
        builder = builder.num_threads(n);
    }
    builder
        .build()
        .map_err(|e| SvmError::internal(format!("failed to build rayon thread pool: {e}")))
}
