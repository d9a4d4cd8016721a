#![forbid(unsafe_code)]

mod analyzer;
mod builtins;
mod config;
mod defn;
mod diagnostics;
mod error;
mod expr;
mod graph;
mod infer;
mod logging;
mod module;
mod relation;
mod scope;
mod session;
mod template;
mod transform;
mod types;

pub use analyzer::{AnalysisTask, Analyzer, CallCandidate, ParameterAssignments};
pub use builtins::Builtins;
pub use config::{ConfigError, SemaConfig};
pub use defn::{
    Defn, DefnId, DefnKind, DefnTable, FunctionDefn, ParameterDefn, Pass, StorageClass, Traits,
    TypeDefn, TypeOperator, VariableDefn, Visibility,
};
pub use diagnostics::{DiagnosticLog, DiagnosticRecord, DiagnosticSink, Severity};
pub use error::{SemaResult, SemanticError};
pub use expr::Expr;
pub use graph::SemaGraph;
pub use infer::{Constraint, ConstraintKind, Provision, ProvisionId, Provisions, TypeAssignment};
pub use logging::{LogLevel, TraceOptions, LOG_LEVEL_ENV, TRACE_ENV};
pub use module::{ModuleLoader, ModuleMap};
pub use relation::{Specificity, TypeRelation};
pub use scope::{ScopeId, ScopeKind, ScopeStack, ScopeTable};
pub use session::Session;
pub use template::{Expect, InstanceId, LessSpecialized, Template, TemplateId, TemplateInstance};
pub use transform::{BindingEnv, TypeTransform};
pub use types::{
    AmbiguousChoice, AmbiguousKind, CompositeClass, ConstValue, FunctionType, ParamType,
    Primitive, QualifiedType, Qualifiers, TypeId, TypeKind, TypeStore, TypeVariable,
};
