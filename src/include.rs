//! Cross-file inclusion.
//!
//! Resolution runs in three phases:
//!
//! 1. **Load.** Starting from the source file, every `<include file="..."/>`
//!    of every loaded document is located through [`SearchDirs`] and parsed
//!    once, keyed by canonical path. Each include contributes one edge
//!    `including file -> included file` to an [`IncludeGraph`].
//! 2. **Check.** A depth-first walk with temporary/permanent marks proves the
//!    graph acyclic before any tree is touched.
//! 3. **Substitute.** Each include node in the source tree is replaced by
//!    clones of the nodes it selects from its target document. Included
//!    documents are never modified; every splice is a fresh clone.
//!
//! A selected node that carries attributes and is not a `config` element is
//! spliced as itself. Anything else is a grouping container and contributes
//! its children instead, so a fragment file can hold either one tagged node
//! or a loose list of siblings.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, trace};

use crate::error::OptgenError;
use crate::file::{SearchDirs, read_document};
use crate::query::Query;
use crate::tree::{Arena, NodeId, Tag};

/// One loaded specification file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub path: PathBuf,
    pub root: NodeId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Temporary,
    Permanent,
}

/// Every file reachable from the source, with include edges between them.
/// Index 0 is always the source document.
#[derive(Debug)]
pub struct IncludeGraph {
    documents: Vec<Document>,
    edges: Vec<Vec<usize>>,
    by_path: HashMap<PathBuf, usize>,
    by_name: HashMap<String, usize>,
}

impl IncludeGraph {
    /// Load `source` and everything it transitively includes.
    pub fn load(arena: &mut Arena, search: &SearchDirs, source: &Path) -> Result<Self, OptgenError> {
        let mut graph = IncludeGraph {
            documents: Vec::new(),
            edges: Vec::new(),
            by_path: HashMap::new(),
            by_name: HashMap::new(),
        };

        let name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| source.display().to_string());
        let root = graph.intern(arena, search, &name, None)?;

        let mut pending = vec![root];
        while let Some(doc) = pending.pop() {
            let including = graph.documents[doc].path.clone();
            for inc in includes_in(arena, graph.documents[doc].root) {
                let file = file_attr(arena, inc)?.to_string();
                let known = graph.documents.len();
                let target = graph.intern(arena, search, &file, Some(&including))?;
                if target == known {
                    pending.push(target);
                }
                if !graph.edges[doc].contains(&target) {
                    graph.edges[doc].push(target);
                }
            }
        }

        debug!(
            "Loaded {} specification file(s): {}",
            graph.documents.len(),
            graph
                .documents
                .iter()
                .map(|d| d.path.display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        );
        Ok(graph)
    }

    /// Index of the document `name` refers to, loading it on first use.
    fn intern(
        &mut self,
        arena: &mut Arena,
        search: &SearchDirs,
        name: &str,
        included_from: Option<&Path>,
    ) -> Result<usize, OptgenError> {
        if let Some(&idx) = self.by_name.get(name) {
            return Ok(idx);
        }
        let located = search.locate(name, included_from)?;
        let path = std::fs::canonicalize(&located).map_err(|source| OptgenError::Io {
            path: located.clone(),
            source,
        })?;

        let idx = match self.by_path.get(&path) {
            Some(&idx) => idx,
            None => {
                let root = read_document(arena, &path)?;
                trace!("Parsed {} as node {root}", path.display());
                self.documents.push(Document {
                    path: path.clone(),
                    root,
                });
                self.edges.push(Vec::new());
                let idx = self.documents.len() - 1;
                self.by_path.insert(path, idx);
                idx
            }
        };
        self.by_name.insert(name.to_string(), idx);
        Ok(idx)
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn source(&self) -> &Document {
        &self.documents[0]
    }

    /// Fail with [`OptgenError::IncludeCycle`] if any file reachable from the
    /// source includes itself, directly or through other files.
    pub fn check_acyclic(&self) -> Result<(), OptgenError> {
        let mut marks: Vec<Option<Mark>> = vec![None; self.documents.len()];
        let mut chain = Vec::new();
        self.visit(0, &mut marks, &mut chain)
    }

    fn visit(
        &self,
        doc: usize,
        marks: &mut [Option<Mark>],
        chain: &mut Vec<usize>,
    ) -> Result<(), OptgenError> {
        marks[doc] = Some(Mark::Temporary);
        chain.push(doc);
        for &next in &self.edges[doc] {
            match marks[next] {
                Some(Mark::Permanent) => {}
                Some(Mark::Temporary) => {
                    return Err(OptgenError::IncludeCycle {
                        file: self.documents[doc].path.clone(),
                        repeated: self.documents[next].path.clone(),
                        chain: chain
                            .iter()
                            .map(|&d| self.documents[d].path.clone())
                            .collect(),
                    });
                }
                None => self.visit(next, marks, chain)?,
            }
        }
        chain.pop();
        marks[doc] = Some(Mark::Permanent);
        Ok(())
    }

    /// Replace every include in the source tree. Call only after
    /// [`check_acyclic`](Self::check_acyclic) succeeded.
    pub fn substitute(&self, arena: &mut Arena) -> Result<NodeId, OptgenError> {
        let root = self.source().root;
        let count = self.expand_within(arena, root)?;
        debug!("Substituted {count} include directive(s)");
        Ok(root)
    }

    fn expand_within(&self, arena: &mut Arena, root: NodeId) -> Result<usize, OptgenError> {
        let mut count = 0;
        for inc in includes_in(arena, root) {
            // Includes nested inside an already replaced include are gone.
            if arena.tree_root(inc) != root {
                continue;
            }
            let replacement = self.replacement(arena, inc, &mut count)?;
            arena.insert_after(inc, &replacement);
            arena.unlink(inc);
        }
        Ok(count)
    }

    /// Detached, fully expanded nodes that take the place of `inc`.
    fn replacement(
        &self,
        arena: &mut Arena,
        inc: NodeId,
        count: &mut usize,
    ) -> Result<Vec<NodeId>, OptgenError> {
        *count += 1;
        let file = file_attr(arena, inc)?;
        let target = *self
            .by_name
            .get(file)
            .ok_or_else(|| OptgenError::FileNotFound {
                name: file.to_string(),
                included_from: None,
                searched: Vec::new(),
            })?;
        let doc = &self.documents[target];

        let selected = match arena.node(inc).attr("xpath") {
            Some(xpath) => {
                let query = Query::parse(xpath).map_err(|reason| OptgenError::InvalidQuery {
                    query: xpath.to_string(),
                    path: arena.path_of(inc),
                    reason,
                })?;
                query
                    .select(arena, doc.root)
                    .into_iter()
                    .filter(|&n| !arena.node(n).tag.is_comment())
                    .collect()
            }
            None => vec![doc.root],
        };
        trace!(
            "Include {} selects {} node(s) from {}",
            arena.path_of(inc),
            selected.len(),
            doc.path.display()
        );

        let mut out = Vec::new();
        for node in selected {
            let clone = arena.deep_clone(node);
            if arena.node(clone).tag == Tag::Include {
                out.extend(self.replacement(arena, clone, count)?);
                continue;
            }
            *count += self.expand_within(arena, clone)?;
            out.extend(ungroup(arena, clone));
        }
        Ok(out)
    }
}

/// Load, check and substitute in one go. Returns the merged tree root and
/// the graph (for the list of files involved).
pub fn resolve_includes(
    arena: &mut Arena,
    search: &SearchDirs,
    source: &Path,
) -> Result<(NodeId, IncludeGraph), OptgenError> {
    let graph = IncludeGraph::load(arena, search, source)?;
    graph.check_acyclic()?;
    let root = graph.substitute(arena)?;
    Ok((root, graph))
}

fn includes_in(arena: &Arena, root: NodeId) -> Vec<NodeId> {
    arena
        .descendants(root)
        .into_iter()
        .filter(|&n| arena.node(n).tag == Tag::Include)
        .collect()
}

fn file_attr(arena: &Arena, inc: NodeId) -> Result<&str, OptgenError> {
    arena
        .node(inc)
        .attr("file")
        .ok_or_else(|| OptgenError::MissingAttribute {
            tag: "include".into(),
            attribute: "file".into(),
            path: arena.path_of(inc),
        })
}

fn ungroup(arena: &mut Arena, node: NodeId) -> Vec<NodeId> {
    let n = arena.node(node);
    if n.has_attrs() && n.tag != Tag::Config {
        vec![node]
    } else {
        arena.take_children(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::test::{COMMON_XML, SERVER_XML, write_spec};
    use tempfile::TempDir;

    fn resolve(dir: &TempDir, source: &str) -> Result<(Arena, NodeId, IncludeGraph), OptgenError> {
        let mut arena = Arena::new();
        let path = dir.path().join(source);
        let search = SearchDirs::for_source(&path, &[]);
        let (root, graph) = resolve_includes(&mut arena, &search, &path)?;
        Ok((arena, root, graph))
    }

    fn child_names(arena: &Arena, id: NodeId) -> Vec<String> {
        arena
            .node(id)
            .children()
            .iter()
            .filter(|&&c| !arena.node(c).tag.is_comment())
            .map(|&c| {
                let node = arena.node(c);
                format!("{}:{}", node.tag.name(), node.attr("name").unwrap_or(""))
            })
            .collect()
    }

    #[test]
    fn flat_tree_is_unchanged() {
        let dir = TempDir::new().unwrap();
        let xml = r#"<config name="x"><option name="a"><value val="1"/></option></config>"#;
        write_spec(dir.path(), "app.xml", xml);

        let (arena, root, graph) = resolve(&dir, "app.xml").unwrap();
        let (expected, expected_root) = crate::fixtures::test::parse(xml);
        assert_eq!(arena.outline(root), expected.outline(expected_root));
        assert_eq!(graph.documents().len(), 1);
    }

    #[test]
    fn grouping_root_contributes_children() {
        let dir = TempDir::new().unwrap();
        write_spec(dir.path(), "server.xml", SERVER_XML);
        write_spec(dir.path(), "common.xml", COMMON_XML);

        let (arena, root, graph) = resolve(&dir, "server.xml").unwrap();
        assert_eq!(child_names(&arena, root), vec!["option:host"]);
        assert_eq!(graph.documents().len(), 2);
        assert!(arena.subtree(root).iter().all(|&n| arena.node(n).tag != Tag::Include));
    }

    #[test]
    fn included_nodes_keep_position() {
        let dir = TempDir::new().unwrap();
        write_spec(
            dir.path(),
            "app.xml",
            r#"<config>
                 <option name="first"/>
                 <include file="mid.xml"/>
                 <option name="last"/>
               </config>"#,
        );
        write_spec(
            dir.path(),
            "mid.xml",
            r#"<config><option name="m1"/><option name="m2"/></config>"#,
        );
        let (arena, root, _) = resolve(&dir, "app.xml").unwrap();
        assert_eq!(
            child_names(&arena, root),
            vec!["option:first", "option:m1", "option:m2", "option:last"]
        );
    }

    #[test]
    fn attributed_root_is_spliced_as_itself() {
        let dir = TempDir::new().unwrap();
        write_spec(dir.path(), "app.xml", r#"<config><include file="opt.xml"/></config>"#);
        write_spec(
            dir.path(),
            "opt.xml",
            r#"<option name="solo" type="int"><value val="1"/></option>"#,
        );
        let (arena, root, _) = resolve(&dir, "app.xml").unwrap();
        assert_eq!(child_names(&arena, root), vec!["option:solo"]);
    }

    #[test]
    fn xpath_filter_narrows_selection() {
        let dir = TempDir::new().unwrap();
        write_spec(
            dir.path(),
            "app.xml",
            r#"<config><include file="lib.xml" xpath="/config/option[@name='b']"/></config>"#,
        );
        write_spec(
            dir.path(),
            "lib.xml",
            r#"<config><option name="a"/><option name="b"/><option name="c"/></config>"#,
        );
        let (arena, root, _) = resolve(&dir, "app.xml").unwrap();
        assert_eq!(child_names(&arena, root), vec!["option:b"]);
    }

    #[test]
    fn xpath_filter_is_relative_to_target_root() {
        let dir = TempDir::new().unwrap();
        write_spec(
            dir.path(),
            "app.xml",
            r#"<config><include file="lib.xml" xpath="group"/></config>"#,
        );
        write_spec(
            dir.path(),
            "lib.xml",
            r#"<config><group><option name="x"/><option name="y"/></group><option name="z"/></config>"#,
        );
        let (arena, root, _) = resolve(&dir, "app.xml").unwrap();
        // <group> has no attributes, so it is ungrouped into its children.
        assert_eq!(child_names(&arena, root), vec!["option:x", "option:y"]);
    }

    #[test]
    fn empty_filter_substitutes_nothing() {
        let dir = TempDir::new().unwrap();
        write_spec(
            dir.path(),
            "app.xml",
            r#"<config><option name="keep"/><include file="lib.xml" xpath="missing"/></config>"#,
        );
        write_spec(dir.path(), "lib.xml", r#"<config><option name="a"/></config>"#);
        let (arena, root, _) = resolve(&dir, "app.xml").unwrap();
        assert_eq!(child_names(&arena, root), vec!["option:keep"]);
    }

    #[test]
    fn nested_includes_resolve_transitively() {
        let dir = TempDir::new().unwrap();
        write_spec(dir.path(), "a.xml", r#"<config><include file="b.xml"/></config>"#);
        write_spec(
            dir.path(),
            "b.xml",
            r#"<config><option name="b"><include file="c.xml"/></option></config>"#,
        );
        write_spec(dir.path(), "c.xml", r#"<config><option name="c"/></config>"#);

        let (arena, root, graph) = resolve(&dir, "a.xml").unwrap();
        assert_eq!(graph.documents().len(), 3);
        let b = arena.node(root).children()[0];
        assert_eq!(child_names(&arena, b), vec!["option:c"]);
    }

    #[test]
    fn shared_file_is_loaded_once() {
        let dir = TempDir::new().unwrap();
        write_spec(
            dir.path(),
            "a.xml",
            r#"<config><include file="b.xml"/><include file="c.xml"/></config>"#,
        );
        write_spec(dir.path(), "b.xml", r#"<config><include file="d.xml"/></config>"#);
        write_spec(dir.path(), "c.xml", r#"<config><include file="./d.xml"/></config>"#);
        write_spec(dir.path(), "d.xml", r#"<config><option name="d"/></config>"#);

        let (arena, root, graph) = resolve(&dir, "a.xml").unwrap();
        assert_eq!(graph.documents().len(), 4);
        assert_eq!(child_names(&arena, root), vec!["option:d", "option:d"]);
        let ids: Vec<NodeId> = arena.node(root).children().to_vec();
        assert_ne!(ids[0], ids[1]);
    }

    #[test]
    fn include_cycles_are_rejected_for_any_length() {
        for n in 1..=4 {
            let dir = TempDir::new().unwrap();
            for i in 0..n {
                let next = (i + 1) % n;
                write_spec(
                    dir.path(),
                    &format!("f{i}.xml"),
                    &format!(r#"<config><option name="o{i}"/><include file="f{next}.xml"/></config>"#),
                );
            }
            let err = resolve(&dir, "f0.xml").unwrap_err();
            match err {
                OptgenError::IncludeCycle { repeated, chain, .. } => {
                    assert!(repeated.ends_with("f0.xml"), "n={n}");
                    assert_eq!(chain.len(), n);
                }
                other => panic!("n={n}: expected IncludeCycle, got {other:?}"),
            }
        }
    }

    #[test]
    fn cycle_below_root_names_the_originating_file() {
        let dir = TempDir::new().unwrap();
        write_spec(dir.path(), "a.xml", r#"<config><include file="b.xml"/></config>"#);
        write_spec(dir.path(), "b.xml", r#"<config><include file="c.xml"/></config>"#);
        write_spec(dir.path(), "c.xml", r#"<config><include file="b.xml"/></config>"#);

        let err = resolve(&dir, "a.xml").unwrap_err();
        match err {
            OptgenError::IncludeCycle { file, repeated, .. } => {
                assert!(file.ends_with("c.xml"));
                assert!(repeated.ends_with("b.xml"));
            }
            other => panic!("expected IncludeCycle, got {other:?}"),
        }
    }

    #[test]
    fn missing_include_is_file_not_found() {
        let dir = TempDir::new().unwrap();
        write_spec(dir.path(), "a.xml", r#"<config><include file="nope.xml"/></config>"#);
        let err = resolve(&dir, "a.xml").unwrap_err();
        match err {
            OptgenError::FileNotFound {
                name,
                included_from,
                ..
            } => {
                assert_eq!(name, "nope.xml");
                assert!(included_from.unwrap().ends_with("a.xml"));
            }
            other => panic!("expected FileNotFound, got {other:?}"),
        }
    }

    #[test]
    fn include_without_file_is_missing_attribute() {
        let dir = TempDir::new().unwrap();
        write_spec(dir.path(), "a.xml", r#"<config><include xpath="x"/></config>"#);
        let err = resolve(&dir, "a.xml").unwrap_err();
        assert!(matches!(err, OptgenError::MissingAttribute { ref attribute, .. } if attribute == "file"));
    }

    #[test]
    fn bad_filter_is_invalid_query() {
        let dir = TempDir::new().unwrap();
        write_spec(
            dir.path(),
            "a.xml",
            r#"<config><include file="b.xml" xpath="option["/></config>"#,
        );
        write_spec(dir.path(), "b.xml", r#"<config/>"#);
        let err = resolve(&dir, "a.xml").unwrap_err();
        assert!(matches!(err, OptgenError::InvalidQuery { .. }));
    }

    #[test]
    fn selected_include_is_followed() {
        let dir = TempDir::new().unwrap();
        write_spec(
            dir.path(),
            "a.xml",
            r#"<config><include file="b.xml" xpath="include"/></config>"#,
        );
        write_spec(
            dir.path(),
            "b.xml",
            r#"<config><option name="skipped"/><include file="c.xml"/></config>"#,
        );
        write_spec(dir.path(), "c.xml", r#"<config><option name="c"/></config>"#);
        let (arena, root, _) = resolve(&dir, "a.xml").unwrap();
        assert_eq!(child_names(&arena, root), vec!["option:c"]);
    }

    #[test]
    fn search_dirs_supply_fragments() {
        let src = TempDir::new().unwrap();
        let lib = TempDir::new().unwrap();
        write_spec(src.path(), "server.xml", SERVER_XML);
        write_spec(lib.path(), "common.xml", COMMON_XML);

        let mut arena = Arena::new();
        let path = src.path().join("server.xml");
        let search = SearchDirs::for_source(&path, &[lib.path().to_path_buf()]);
        let (root, graph) = resolve_includes(&mut arena, &search, &path).unwrap();
        assert_eq!(child_names(&arena, root), vec!["option:host"]);
        assert!(graph.documents()[1].path.starts_with(std::fs::canonicalize(lib.path()).unwrap()));
    }
}
