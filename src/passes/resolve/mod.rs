//! Name resolution and parse disambiguation
//!
//! The parser delivers trees in which every site still carries all of its
//! grammatically valid readings; Oberon cannot be parsed context-free without
//! that. This pass walks those trees bottom-up, classifies every identifier
//! against the lexical scopes in force, uses the classification to pick the
//! single semantically valid reading of each site, and reports where no
//! unique pick exists.
//!
//! ## Module Organization
//!
//! - `scope`: chained lexical scopes and the bindings they hold
//! - `resolver`: the traversal, disambiguation, and module orchestration
//! - `predefined`: the standard environments of Oberon and Oberon-2

pub mod predefined;
mod resolver;
pub mod scope;

// Re-exports
pub use predefined::{Language, Oberon, Oberon2, predefined, predefined2};
pub use resolver::{
    ModuleTable, ResolutionState, ResolvedModule, Resolver, resolve_module, resolve_modules,
};
pub use scope::{DeclKind, DeclarationRhs, Scope};
