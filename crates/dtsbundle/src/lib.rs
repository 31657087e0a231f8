//! dtsbundle — bundle per-module TypeScript declaration files into a
//! single aggregate `.d.ts`.
//!
//! Each in-scope module's declaration text is rewritten so its relative
//! cross-module references point at flattened `<name>/<path>` module
//! identifiers, wrapped in a `declare module '...' { }` block, and
//! concatenated into one output file. Pre-built global declaration files
//! pass through verbatim.

pub mod bundler;
pub mod config;
pub mod diagnostics;
pub mod host;
pub mod module_id;
pub mod parser;
pub mod rewriter;
pub mod syntax;

pub use bundler::{bundle, bundle_with_host, bundle_with_progress};
pub use config::{BundleConfig, ModuleKind, ScriptTarget};
pub use diagnostics::{BundleError, Diagnostic};
pub use host::{CompileOptions, CompilerHost, DeclarationHost, Program};
