//! A compiler for GSS, an extended dialect of CSS.
//!
//! GSS adds variables (`@def`), arithmetic and color functions,
//! parameterized mixins (`@defmixin`/`@mixin`), compile-time conditionals
//! (`@if`/`@elseif`/`@else`), component scoping, `@for` loops, namespacing
//! (`@provide`/`@require`), bidirectional flipping, class renaming,
//! minification, and linting on top of CSS.
//!
//! ```
//! use gss::compiler::Compiler;
//! use gss::job::JobDescription;
//! use gss::location::SourceFile;
//!
//! let job = JobDescription {
//!   inputs: vec![SourceFile::new(
//!     "example.gss",
//!     "@def BG rgb(235, 239, 249); body { background: BG; }",
//!   )],
//!   ..JobDescription::default()
//! };
//! let result = Compiler::new(job).compile().unwrap();
//! assert_eq!(result.css, "body{background:#ebeff9}");
//! ```

pub mod compiler;
pub mod controller;
pub mod diagnostics;
pub mod error;
pub mod functions;
pub mod job;
pub mod location;
mod output;
pub mod parser;
pub mod passes;
mod printer;
pub mod properties;
pub mod renaming;
pub mod tree;
pub mod vendor_prefix;
pub mod visitor;

pub use compiler::{compile, CompileFailure, CompileResult, Compiler};
pub use job::JobDescription;
