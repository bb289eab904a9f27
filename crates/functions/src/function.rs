use crate::context::CallCtx;
use crate::error::{Error, ErrorCode, Result};
use crate::value::{Value, ValueKind};
use core::fmt;
use std::sync::Arc;

pub type Arity = usize;

/// Execution entry bound to one accepted argument-type tuple.
pub type FunctionImpl =
    Arc<dyn Fn(&mut CallCtx<'_>, &[Value]) -> Result<Value> + Send + Sync>;

/// One accepted argument-type tuple together with its execution entry.
#[derive(Clone)]
pub struct Signature {
    pub param_kinds: Vec<ValueKind>,
    pub func: FunctionImpl,
}

impl Signature {
    pub fn matches(&self, arg_kinds: &[ValueKind]) -> bool {
        self.param_kinds.as_slice() == arg_kinds
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_tuple(&self.param_kinds))
    }
}

/// Static metadata for one builtin plus its typed execution entries.
#[derive(Clone)]
pub struct FunctionDescriptor {
    pub name: String,
    pub arity: Arity,
    pub signatures: Vec<Signature>,
    pub result_type: ValueKind,
    pub reference: String,
}

impl FunctionDescriptor {
    pub fn new(
        name: impl Into<String>,
        arity: Arity,
        result_type: ValueKind,
        reference: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            arity,
            signatures: Vec::new(),
            result_type,
            reference: reference.into(),
        }
    }

    /// Add an accepted argument-type tuple with the closure executed for it.
    pub fn overload<F>(mut self, param_kinds: &[ValueKind], f: F) -> Self
    where
        F: 'static + Send + Sync + Fn(&mut CallCtx<'_>, &[Value]) -> Result<Value>,
    {
        self.signatures.push(Signature {
            param_kinds: param_kinds.to_vec(),
            func: Arc::new(f),
        });
        self
    }

    /// The argument-type matrix in declaration order.
    pub fn allowed_argument_types(&self) -> impl Iterator<Item = &[ValueKind]> {
        self.signatures.iter().map(|s| s.param_kinds.as_slice())
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.signatures.is_empty() {
            return Err(Error::from_code(
                ErrorCode::InvalidDescriptor,
                format!("function '{}' declares no argument types", self.name),
            ));
        }
        for (idx, sig) in self.signatures.iter().enumerate() {
            if sig.param_kinds.len() != self.arity {
                return Err(Error::from_code(
                    ErrorCode::InvalidDescriptor,
                    format!(
                        "function '{}' has arity {} but argument tuple {} has {} entries",
                        self.name,
                        self.arity,
                        format_tuple(&sig.param_kinds),
                        sig.param_kinds.len()
                    ),
                ));
            }
            if self.signatures[..idx]
                .iter()
                .any(|earlier| earlier.param_kinds == sig.param_kinds)
            {
                return Err(Error::from_code(
                    ErrorCode::InvalidDescriptor,
                    format!(
                        "function '{}' declares argument tuple {} twice",
                        self.name,
                        format_tuple(&sig.param_kinds)
                    ),
                ));
            }
        }
        Ok(())
    }

    pub(crate) fn find_signature(&self, arg_kinds: &[ValueKind]) -> Option<&Signature> {
        self.signatures.iter().find(|s| s.matches(arg_kinds))
    }

    /// Human readable list of accepted tuples, e.g. `(STRING, STRING) | (STRING, INT)`.
    pub fn describe_tuples(&self) -> String {
        self.signatures
            .iter()
            .map(|s| format_tuple(&s.param_kinds))
            .collect::<Vec<_>>()
            .join(" | ")
    }
}

impl fmt::Debug for FunctionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionDescriptor")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .field("signatures", &self.signatures)
            .field("result_type", &self.result_type)
            .finish_non_exhaustive()
    }
}

pub(crate) fn format_tuple(kinds: &[ValueKind]) -> String {
    let parts: Vec<&str> = kinds.iter().map(ValueKind::as_str).collect();
    format!("({})", parts.join(", "))
}
