//! Read-only, namespaced view of the process environment.
//!
//! The snapshot is taken once when a context is built. Keys are lower-cased,
//! spaces become underscores, and every key carries the `env.` prefix. Values
//! are always strings. Writes are rejected so that a run cannot depend on the
//! order in which expressions are evaluated.
use crate::error::{Error, ErrorCode, Result};
use crate::value::Value;
use std::collections::HashMap;

pub const ENV_PREFIX: &str = "env.";

/// Variables whose values are supplied by the host instead of the script.
pub trait SpecialVariableProcessor {
    fn variable_names(&self) -> Vec<String>;
    fn get_variable(&self, name: &str) -> Result<Value>;
    fn set_variable(&mut self, name: &str, value: Value) -> Result<()>;
}

#[derive(Debug, Clone, Default)]
pub struct EnvironmentSnapshot {
    vars: HashMap<String, Value>,
}

impl EnvironmentSnapshot {
    /// Copy the current process environment. Non UTF-8 entries are converted lossily.
    pub fn capture() -> Self {
        let snapshot = Self::from_vars(std::env::vars_os().map(|(k, v)| {
            (
                k.to_string_lossy().into_owned(),
                v.to_string_lossy().into_owned(),
            )
        }));
        tracing::debug!(count = snapshot.len(), "environment snapshot captured");
        snapshot
    }

    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let vars = vars
            .into_iter()
            .map(|(k, v)| (namespaced_key(k.as_ref()), Value::String(v.into())))
            .collect();
        Self { vars }
    }

    pub fn read(&self, key: &str) -> Result<&Value> {
        self.vars.get(key).ok_or_else(|| {
            Error::from_code(
                ErrorCode::UndefinedVariable,
                format!("reading undefined environment record '{key}'"),
            )
        })
    }

    pub fn write(&self, key: &str, _value: Value) -> Result<()> {
        Err(Error::from_code(
            ErrorCode::ReadOnlyVariable,
            format!(
                "illegal change of environment record '{key}', environment records are read-only"
            ),
        ))
    }

    /// Namespaced keys in lexical order.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.vars.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

impl SpecialVariableProcessor for EnvironmentSnapshot {
    fn variable_names(&self) -> Vec<String> {
        self.names().into_iter().map(str::to_string).collect()
    }

    fn get_variable(&self, name: &str) -> Result<Value> {
        self.read(name).cloned()
    }

    fn set_variable(&mut self, name: &str, value: Value) -> Result<()> {
        self.write(name, value)
    }
}

/// `"env." + lower(key)` with spaces replaced by underscores.
pub fn namespaced_key(key: &str) -> String {
    format!("{ENV_PREFIX}{}", key.to_lowercase().replace(' ', "_"))
}
