//! The compilation pipeline, up to (not including) rendering.
//!
//! 1. Load the source and every included file, prove the include graph
//!    acyclic and substitute includes.
//! 2. Expand copy directives.
//! 3. Validate options into [`OptionSpec`]s.
//! 4. Collect identifier tables.
//!
//! Every stage works on one arena owned by the call; nothing survives it
//! except the returned [`CompiledSpec`].

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use crate::copy::expand_copies;
use crate::error::OptgenError;
use crate::file::SearchDirs;
use crate::ident::IdentifierTable;
use crate::include::resolve_includes;
use crate::option::{OptionSpec, all_options};
use crate::tree::{Arena, NodeId};
use crate::validate::validate_tree;

/// Attributes of the root element that only the renderer consumes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RootAttributes {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root: Option<String>,
}

impl RootAttributes {
    fn read(arena: &Arena, root: NodeId) -> Self {
        let node = arena.node(root);
        let get = |key: &str| node.attr(key).map(str::to_string);
        Self {
            namespace: get("namespace"),
            name: get("name"),
            alias: get("alias"),
            root: get("root"),
        }
    }
}

/// A fully resolved and validated specification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompiledSpec {
    pub source: PathBuf,
    /// Every file that took part, source first.
    pub files: Vec<PathBuf>,
    #[serde(rename = "config")]
    pub root: RootAttributes,
    pub options: Vec<OptionSpec>,
    pub identifiers: IdentifierTable,
    /// Number of copy directives expanded.
    pub copies: usize,
}

impl CompiledSpec {
    /// Number of options at every nesting level.
    pub fn option_count(&self) -> usize {
        all_options(&self.options).count()
    }
}

/// Run the pipeline on `source`. `search_dirs` are searched after the
/// directory of `source`.
pub fn compile_spec(source: &Path, search_dirs: &[PathBuf]) -> Result<CompiledSpec, OptgenError> {
    let mut arena = Arena::new();
    let search = SearchDirs::for_source(source, search_dirs);

    let (root, graph) = resolve_includes(&mut arena, &search, source)?;
    let copies = expand_copies(&mut arena, root)?;
    let options = validate_tree(&arena, root)?;
    if options.is_empty() {
        return Err(OptgenError::NoOptionsFound);
    }
    let identifiers = IdentifierTable::collect(&arena, root)?;

    debug!(
        "Compiled {}: {} option name(s), {} value(s), {} arena node(s)",
        source.display(),
        identifiers.names.len(),
        identifiers.values.len(),
        arena.len()
    );

    Ok(CompiledSpec {
        source: source.to_path_buf(),
        files: graph.documents().iter().map(|d| d.path.clone()).collect(),
        root: RootAttributes::read(&arena, root),
        options,
        identifiers,
        copies,
    })
}
