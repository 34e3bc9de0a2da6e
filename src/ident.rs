//! Identifier tables for generated constants.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::OptgenError;
use crate::tree::{Arena, NodeId, Tag};

/// Constant name for a token: ASCII upper case, anything outside
/// `[A-Z0-9_]` replaced by `_`, and a `_` prefix when the result would start
/// with a digit. A token with no usable characters at all maps to `__`,
/// since a lone `_` is not an identifier.
pub fn constant_name(token: &str) -> String {
    let mut out: String = token
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();
    if out.is_empty() || out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    if out == "_" {
        out.push('_');
    }
    out
}

/// A source token and the constant generated for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identifier {
    pub token: String,
    pub constant: String,
}

/// Sorted, deduplicated option-name and value tokens of a validated tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IdentifierTable {
    pub names: Vec<Identifier>,
    pub values: Vec<Identifier>,
}

impl IdentifierTable {
    /// Collect every option `name` and every `name`/`value` `val` found
    /// anywhere below `root`, including options parked outside the
    /// validated tree (copy templates, for instance).
    ///
    /// Fails with [`OptgenError::NoOptionsFound`] when there are no option
    /// names, and with [`OptgenError::IdentifierCollision`] when two
    /// different tokens of one table map to the same constant.
    pub fn collect(arena: &Arena, root: NodeId) -> Result<Self, OptgenError> {
        let mut names = Vec::new();
        let mut values = Vec::new();
        for id in arena.descendants(root) {
            let node = arena.node(id);
            let (bucket, attribute) = match node.tag {
                Tag::Option => (&mut names, "name"),
                Tag::Name | Tag::Value => (&mut values, "val"),
                _ => continue,
            };
            if let Some(token) = node.attr(attribute).filter(|t| !t.is_empty()) {
                bucket.push(token);
            }
        }
        if names.is_empty() {
            return Err(OptgenError::NoOptionsFound);
        }
        Ok(Self {
            names: table(names)?,
            values: table(values)?,
        })
    }

    /// Length of the longest token in either table.
    pub fn max_token_width(&self) -> usize {
        self.names
            .iter()
            .chain(&self.values)
            .map(|i| i.token.chars().count())
            .max()
            .unwrap_or(0)
    }

    /// Constant generated for an option-name token.
    pub fn name_constant(&self, token: &str) -> Option<&str> {
        lookup(&self.names, token)
    }

    /// Constant generated for a value token.
    pub fn value_constant(&self, token: &str) -> Option<&str> {
        lookup(&self.values, token)
    }
}

fn lookup<'a>(table: &'a [Identifier], token: &str) -> Option<&'a str> {
    table
        .binary_search_by(|i| i.token.as_str().cmp(token))
        .ok()
        .map(|idx| table[idx].constant.as_str())
}

fn table(mut tokens: Vec<&str>) -> Result<Vec<Identifier>, OptgenError> {
    tokens.sort_unstable();
    tokens.dedup();

    let mut seen: BTreeMap<String, &str> = BTreeMap::new();
    let mut out = Vec::with_capacity(tokens.len());
    for token in tokens {
        let constant = constant_name(token);
        if let Some(first) = seen.insert(constant.clone(), token) {
            return Err(OptgenError::IdentifierCollision {
                constant,
                first: first.to_string(),
                second: token.to_string(),
            });
        }
        out.push(Identifier {
            token: token.to_string(),
            constant,
        });
    }
    Ok(out)
}
