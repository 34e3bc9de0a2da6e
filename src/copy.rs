//! `<copy path="..."/>` expansion.
//!
//! Directives are processed in document order. Each directive's path query is
//! evaluated relative to the directive itself, every matched node is expanded
//! first (so templates that contain copies are materialized bottom-up), and
//! clones of the matches are inserted right after the directive, which is
//! then unlinked.
//!
//! Cycle detection colours the directive nodes:
//!
//! - [`Expansion::Expanding`] while the directive is on the current chain.
//!   Meeting such a directive again means a target transitively contains the
//!   directive that asked for it, which is a [`OptgenError::CopyCycle`].
//! - [`Expansion::Expanded`] once consumed. A later encounter (through
//!   another template that reached it first) is skipped.

use tracing::{debug, trace};

use crate::error::OptgenError;
use crate::query::Query;
use crate::tree::{Arena, Expansion, NodeId, Tag};

/// Expand every copy directive below `root`. Returns the number of
/// directives consumed.
pub fn expand_copies(arena: &mut Arena, root: NodeId) -> Result<usize, OptgenError> {
    let mut chain = Vec::new();
    let count = expand_within(arena, root, &mut chain)?;
    debug!("Expanded {count} copy directive(s)");
    trace!("Tree after expansion:\n{}", arena.outline(root));
    Ok(count)
}

fn expand_within(
    arena: &mut Arena,
    scope: NodeId,
    chain: &mut Vec<NodeId>,
) -> Result<usize, OptgenError> {
    let copies: Vec<NodeId> = arena
        .subtree(scope)
        .into_iter()
        .filter(|&n| arena.node(n).tag == Tag::Copy)
        .collect();

    let mut count = 0;
    for copy in copies {
        count += expand_one(arena, copy, chain)?;
    }
    Ok(count)
}

fn expand_one(
    arena: &mut Arena,
    copy: NodeId,
    chain: &mut Vec<NodeId>,
) -> Result<usize, OptgenError> {
    match arena.node(copy).expansion() {
        Expansion::Expanded => return Ok(0),
        Expansion::Expanding => {
            return Err(OptgenError::CopyCycle {
                path: arena.path_of(copy),
                chain: chain.clone(),
            });
        }
        Expansion::Unexpanded => {}
    }

    let source = arena
        .node(copy)
        .attr("path")
        .ok_or_else(|| OptgenError::MissingAttribute {
            tag: "copy".into(),
            attribute: "path".into(),
            path: arena.path_of(copy),
        })?
        .to_string();
    let query = Query::parse(&source).map_err(|reason| OptgenError::InvalidQuery {
        query: source.clone(),
        path: arena.path_of(copy),
        reason,
    })?;

    let targets = query.select(arena, copy);
    if targets.is_empty() {
        return Err(OptgenError::EmptyPathResolution {
            path: arena.path_of(copy),
            query: source,
        });
    }
    trace!(
        "Copy {} [path={source}] matches {:?} (chain: {:?})",
        arena.path_of(copy),
        targets,
        chain
    );

    arena.set_expansion(copy, Expansion::Expanding);
    chain.push(copy);

    let mut count = 1;
    for &target in &targets {
        count += expand_within(arena, target, chain)?;
    }

    // A target that was itself a directive has been consumed above.
    let mut clones = Vec::with_capacity(targets.len());
    for target in targets {
        if arena.node(target).tag != Tag::Copy {
            clones.push(arena.deep_clone(target));
        }
    }
    trace!("Inserting {:?} after {}", clones, copy);
    arena.insert_after(copy, &clones);
    arena.unlink(copy);

    chain.pop();
    arena.set_expansion(copy, Expansion::Expanded);
    Ok(count)
}
