//! Compile declarative configuration option specifications into generated
//! validator sources.
//!
//! A specification is a tree of XML elements: `<option>` nodes describe
//! configuration keys, their types, defaults, bounds and permitted values.
//! Specifications can be split across files with `<include>` and can reuse
//! fragments with `<copy>`. optgen resolves both, validates every option and
//! writes one generated file: a C++ header for a `config::validator`
//! runtime, or a self-contained Rust module.
//!
//! ```ignore
//! let result = Compiler::builder()
//!     .source("specs/server.xml")
//!     .destination("gen/")
//!     .handle(&CompileAction::Compile)?;
//! println!("{result}");
//! ```
//!
//! # Pipeline
//!
//! ```text
//! source file
//!    │  include resolver    load every reachable file once, prove the
//!    │                      include graph acyclic, splice includes
//!    ▼
//! single tree
//!    │  copy expander       replace each <copy> by clones of its targets
//!    ▼
//! expanded tree
//!    │  schema validator    typed OptionSpec per <option>
//!    ▼
//! OptionSpec forest
//!    │  identifier collector  sorted name and value constants
//!    ▼
//! CompiledSpec
//!    │  emitter             render, write temp file, rename into place
//!    ▼
//! generated source
//! ```
//!
//! Every stage runs to completion before the next begins, and every failure
//! is fatal: the first error aborts the run with an [`OptgenError`] naming
//! the file or node at fault. Each variant has its own process exit code
//! ([`OptgenError::exit_code`]).
//!
//! # The tree
//!
//! Documents are parsed into an arena of nodes addressed by [`NodeId`].
//! Splicing an include, cloning a copy target, or removing a directive only
//! rewrites parent and child index lists, and a node's index doubles as the
//! surrogate id printed in cycle diagnostics. Copy expansion tracks a
//! per-node state (unexpanded, expanding, expanded), so meeting a directive
//! that is still expanding is a copy cycle.
//!
//! # Paths
//!
//! `<include xpath="...">` and `<copy path="...">` take a small XPath subset:
//! child, descendant and sibling axes, `.` and `..`, `*`, `node()`,
//! `comment()`, positional predicates and attribute tests. Include filters
//! are evaluated against the included document's root and may match nothing;
//! copy paths are evaluated relative to the `<copy>` element and must match
//! at least one node.
//!
//! # Settings
//!
//! ```text
//! Compiled defaults     #[config(default = ...)]
//!        ↑ overridden by
//! optgen.toml           platform config dir, then working directory
//!        ↑ overridden by
//! Environment vars      OPTGEN__KEY
//!        ↑ overridden by
//! Command line          flags actually passed
//! ```
//!
//! [`Settings`] is a confique struct; `optgen settings` prints a commented
//! template of it. Unknown keys in settings files are errors.
//!
//! # Output
//!
//! The output is a pure function of the compiled tree plus the header's
//! author and timestamp. It is written to a temporary file in the
//! destination directory and renamed into place, so a failed run never
//! leaves a partial file. An existing destination is replaced only when
//! `overwrite` is set.
//!
//! # Core library without a CLI framework
//!
//! Everything above works through [`CompilerBuilder`] and
//! [`CompileAction`]. The clap adapter (the `cli` module, behind the `clap`
//! feature, on by default) only turns arguments into those values. To use
//! optgen as a library only:
//!
//! ```toml
//! optgen = { version = "...", default-features = false }
//! ```
//!
//! # Diagnostics
//!
//! The pipeline logs through `tracing`: stage summaries at `debug`, each
//! directive and a tree outline with node ids at `trace`. With the
//! `rich-errors` feature, [`OptgenError`] also implements
//! `miette::Diagnostic`.

pub mod error;
pub mod option;
pub mod tree;
pub mod types;

mod builder;
#[cfg(feature = "clap")]
pub mod cli;
mod copy;
mod file;
mod ident;
mod identity;
mod include;
mod ops;
mod persist;
mod query;
pub mod render;
mod resolve;
mod settings;
mod validate;

#[cfg(test)]
mod fixtures;

pub use builder::{Compiler, CompilerBuilder};
pub use copy::expand_copies;
pub use error::OptgenError;
pub use file::SearchDirs;
pub use ident::{Identifier, IdentifierTable, constant_name};
pub use identity::{IdentitySource, SystemIdentity, resolve_identity};
pub use include::{Document, IncludeGraph, resolve_includes};
pub use ops::{CompileResult, Summary};
pub use option::{Bound, OptionSpec, Permitted, ValueType};
pub use persist::{resolve_output, write_atomic};
pub use query::Query;
pub use resolve::{CompiledSpec, RootAttributes, compile_spec};
pub use settings::{ENV_PREFIX, Settings, SettingsInput};
pub use tree::{Arena, NodeId};
pub use types::{CompileAction, OutputPath, Provenance, Target};
pub use validate::validate_tree;
