use crate::context::CallCtx;
use crate::error::{Error, ErrorCode, Result};
use crate::function::{FunctionDescriptor, FunctionImpl, format_tuple};
use crate::value::{Value, ValueKind};
use crate::xml::{DocumentLoader, QuickXmlLoader};
use std::collections::HashMap;
use std::sync::Arc;

/// Name → descriptor table consulted by the expression dispatcher.
///
/// The registry holds no state besides its table; every side effect of a call
/// comes from the executed builtin.
#[derive(Default)]
pub struct FunctionRegistry {
    fns: HashMap<String, FunctionDescriptor>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every builtin of this crate, parsing XML with [`QuickXmlLoader`].
    pub fn with_builtins() -> Self {
        let mut reg = Self::new();
        // An empty registry has no name to collide with.
        if let Err(err) = register_builtins(&mut reg, Arc::new(QuickXmlLoader)) {
            tracing::error!(%err, "builtin registration failed");
        }
        reg
    }

    pub fn register(&mut self, descriptor: FunctionDescriptor) -> Result<()> {
        use std::collections::hash_map::Entry;
        descriptor.validate()?;
        match self.fns.entry(descriptor.name.clone()) {
            Entry::Occupied(e) => Err(Error::from_code(
                ErrorCode::DuplicateFunction,
                format!("function '{}' is already registered", e.key()),
            )),
            Entry::Vacant(e) => {
                tracing::trace!(name = %descriptor.name, arity = descriptor.arity, "function registered");
                e.insert(descriptor);
                Ok(())
            }
        }
    }

    pub fn descriptor(&self, name: &str) -> Option<&FunctionDescriptor> {
        self.fns.get(name)
    }

    /// Registered names in lexical order.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.fns.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.fns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fns.is_empty()
    }

    /// Resolve the execution entry bound to exactly `arg_kinds`; no coercion is applied.
    pub fn resolve(&self, name: &str, arg_kinds: &[ValueKind]) -> Result<&FunctionImpl> {
        let Some(descriptor) = self.fns.get(name) else {
            return Err(Error::from_code(
                ErrorCode::UnknownFunction,
                format!("unknown function '{name}'"),
            ));
        };
        if arg_kinds.len() != descriptor.arity {
            return Err(Error::from_code(
                ErrorCode::ArityMismatch,
                format!(
                    "function '{name}' expects {} argument(s) but got {}",
                    descriptor.arity,
                    arg_kinds.len()
                ),
            ));
        }
        descriptor
            .find_signature(arg_kinds)
            .map(|sig| &sig.func)
            .ok_or_else(|| {
                Error::from_code(
                    ErrorCode::ArgumentTypeMismatch,
                    format!(
                        "function '{name}' does not accept {}; allowed: {}",
                        format_tuple(arg_kinds),
                        descriptor.describe_tuples()
                    ),
                )
            })
    }

    /// Resolve by the kinds of `args` and invoke the matching entry.
    ///
    /// Failures are passed to the context's diagnostics once and returned unchanged.
    pub fn dispatch(&self, name: &str, ctx: &mut CallCtx<'_>, args: &[Value]) -> Result<Value> {
        let kinds: Vec<ValueKind> = args.iter().map(Value::kind).collect();
        let outcome = self
            .resolve(name, &kinds)
            .and_then(|func| func(ctx, args));
        if let Err(err) = &outcome {
            ctx.diagnostics.report_error(err);
        }
        outcome
    }
}

/// Install the XML and binary-file builtins into `reg`.
///
/// Every builtin whose name is still free is installed. If any name was
/// already taken, the first failure is returned with the names of all skipped
/// builtins in its message; the caller decides whether that is fatal.
pub fn register_builtins(reg: &mut FunctionRegistry, loader: Arc<dyn DocumentLoader>) -> Result<()> {
    let descriptors = crate::xml::descriptors(loader)
        .into_iter()
        .chain(std::iter::once(crate::binfile::descriptor()));
    let mut failures: Vec<(String, Error)> = Vec::new();
    for descriptor in descriptors {
        let name = descriptor.name.clone();
        if let Err(err) = reg.register(descriptor) {
            failures.push((name, err));
        }
    }
    let Some((_, first)) = failures.first() else {
        return Ok(());
    };
    let names: Vec<&str> = failures.iter().map(|(n, _)| n.as_str()).collect();
    Err(Error::from_code(
        first.code,
        format!("builtins not registered: {}", names.join(", ")),
    )
    .with_source(Some(Arc::new(first.clone()) as Arc<dyn std::error::Error + Send + Sync>)))
}
