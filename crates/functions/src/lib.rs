pub mod binfile;
pub mod cache;
pub mod context;
pub mod environment;
pub mod error;
pub mod function;
pub mod registry;
pub mod value;
pub mod xml;

pub use cache::{Container, Resource, ResourceCache, ResourceKind, UidCounter};
pub use context::{
    CallCtx, ContextConfig, Diagnostics, FileResolver, PreprocessorContext,
    PreprocessorContextBuilder, SourceRoots, TracingDiagnostics,
};
pub use environment::{EnvironmentSnapshot, SpecialVariableProcessor};
pub use error::{Error, ErrorCode, Result};
pub use function::{Arity, FunctionDescriptor, FunctionImpl, Signature};
pub use registry::{FunctionRegistry, register_builtins};
pub use value::{Value, ValueKind};
pub use xml::{DocumentLoader, QuickXmlLoader, XmlDocument, XmlNode};

