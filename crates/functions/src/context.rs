use crate::cache::{ResourceCache, UidCounter};
use crate::environment::{EnvironmentSnapshot, SpecialVariableProcessor};
use crate::error::{Error, ErrorCode, Result};
use crate::registry::FunctionRegistry;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Resolves file names used in expressions to readable files.
pub trait FileResolver: Send + Sync {
    fn resolve_file(&self, name: &str) -> Result<PathBuf>;
}

/// Verbose logging and error reporting of the surrounding pipeline.
pub trait Diagnostics: Send + Sync {
    fn is_verbose(&self) -> bool;
    fn log_verbose(&self, message: &str);
    fn report_error(&self, error: &Error);
}

/// Looks files up in an ordered list of source roots.
///
/// Absolute names are accepted as they are. Hits are canonicalized so the
/// same file always yields the same path, whatever root or spelling found it.
#[derive(Debug, Clone, Default)]
pub struct SourceRoots {
    roots: Vec<PathBuf>,
}

impl SourceRoots {
    pub fn new<I, P>(roots: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            roots: roots.into_iter().map(Into::into).collect(),
        }
    }

    fn canonical(path: &Path) -> Option<PathBuf> {
        if path.is_file() {
            std::fs::canonicalize(path).ok()
        } else {
            None
        }
    }
}

impl FileResolver for SourceRoots {
    fn resolve_file(&self, name: &str) -> Result<PathBuf> {
        let candidate = Path::new(name);
        let found = if candidate.is_absolute() {
            Self::canonical(candidate)
        } else {
            self.roots
                .iter()
                .find_map(|root| Self::canonical(&root.join(candidate)))
        };
        found.ok_or_else(|| {
            Error::from_code(
                ErrorCode::FileNotFound,
                format!("can't find file '{name}' in source folders"),
            )
        })
    }
}

/// [`Diagnostics`] backed by `tracing` events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingDiagnostics {
    pub verbose: bool,
}

impl Diagnostics for TracingDiagnostics {
    fn is_verbose(&self) -> bool {
        self.verbose
    }

    fn log_verbose(&self, message: &str) {
        if self.verbose {
            tracing::info!("{message}");
        }
    }

    fn report_error(&self, error: &Error) {
        tracing::error!(code = %error.code, message = %error.message, "builtin call failed");
    }
}

/// Capabilities borrowed for the duration of one builtin call.
pub struct CallCtx<'a> {
    pub files: &'a dyn FileResolver,
    pub diagnostics: &'a dyn Diagnostics,
    pub cache: &'a mut ResourceCache,
    pub uids: &'a UidCounter,
}

impl CallCtx<'_> {
    pub fn next_uid(&self) -> u64 {
        let uid = self.uids.next();
        tracing::trace!(uid, "container uid allocated");
        uid
    }
}

/// Serializable subset of the context settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    pub source_roots: Vec<PathBuf>,
    pub verbose: bool,
}

/// Run-level context: owns the resource cache, the uid counter and the
/// environment snapshot of exactly one preprocessing run.
pub struct PreprocessorContext {
    functions: Arc<FunctionRegistry>,
    files: Box<dyn FileResolver>,
    diagnostics: Box<dyn Diagnostics>,
    cache: ResourceCache,
    uids: UidCounter,
    environment: EnvironmentSnapshot,
}

impl PreprocessorContext {
    pub fn builder() -> PreprocessorContextBuilder {
        PreprocessorContextBuilder::new()
    }

    /// Evaluate the builtin `name` with already evaluated arguments.
    pub fn call(&mut self, name: &str, args: &[Value]) -> Result<Value> {
        let functions = Arc::clone(&self.functions);
        let mut ctx = self.call_ctx();
        functions.dispatch(name, &mut ctx, args)
    }

    pub fn call_ctx(&mut self) -> CallCtx<'_> {
        CallCtx {
            files: self.files.as_ref(),
            diagnostics: self.diagnostics.as_ref(),
            cache: &mut self.cache,
            uids: &self.uids,
        }
    }

    pub fn cache(&self) -> &ResourceCache {
        &self.cache
    }

    pub fn environment(&self) -> &EnvironmentSnapshot {
        &self.environment
    }

    pub fn is_verbose(&self) -> bool {
        self.diagnostics.is_verbose()
    }

    pub fn read_variable(&self, name: &str) -> Result<Value> {
        self.environment.get_variable(name)
    }

    pub fn write_variable(&mut self, name: &str, value: Value) -> Result<()> {
        self.environment.set_variable(name, value)
    }
}

pub struct PreprocessorContextBuilder {
    source_roots: Vec<PathBuf>,
    verbose: bool,
    functions: Option<Arc<FunctionRegistry>>,
    files: Option<Box<dyn FileResolver>>,
    diagnostics: Option<Box<dyn Diagnostics>>,
    environment: Option<EnvironmentSnapshot>,
}

impl Default for PreprocessorContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PreprocessorContextBuilder {
    pub fn new() -> Self {
        Self {
            source_roots: Vec::new(),
            verbose: false,
            functions: None,
            files: None,
            diagnostics: None,
            environment: None,
        }
    }

    pub fn with_config(mut self, config: ContextConfig) -> Self {
        self.source_roots.extend(config.source_roots);
        self.verbose = config.verbose;
        self
    }

    pub fn with_source_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.source_roots.push(root.into());
        self
    }

    pub fn with_source_roots<I, P>(mut self, roots: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.source_roots.extend(roots.into_iter().map(Into::into));
        self
    }

    /// Only affects the default [`TracingDiagnostics`].
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_functions(mut self, reg: Arc<FunctionRegistry>) -> Self {
        self.functions = Some(reg);
        self
    }

    /// Replaces the [`SourceRoots`] lookup; configured roots are then ignored.
    pub fn with_file_resolver(mut self, resolver: impl FileResolver + 'static) -> Self {
        self.files = Some(Box::new(resolver));
        self
    }

    pub fn with_diagnostics(mut self, diagnostics: impl Diagnostics + 'static) -> Self {
        self.diagnostics = Some(Box::new(diagnostics));
        self
    }

    pub fn with_environment(mut self, environment: EnvironmentSnapshot) -> Self {
        self.environment = Some(environment);
        self
    }

    /// Captures the process environment unless one was supplied.
    pub fn build(self) -> PreprocessorContext {
        let files = self
            .files
            .unwrap_or_else(|| Box::new(SourceRoots::new(self.source_roots)));
        let verbose = self.verbose;
        PreprocessorContext {
            functions: self
                .functions
                .unwrap_or_else(|| Arc::new(FunctionRegistry::with_builtins())),
            files,
            diagnostics: self
                .diagnostics
                .unwrap_or_else(|| Box::new(TracingDiagnostics { verbose })),
            cache: ResourceCache::new(),
            uids: UidCounter::new(),
            environment: self.environment.unwrap_or_else(EnvironmentSnapshot::capture),
        }
    }
}
