//! Rendering of a compiled specification into generated source.
//!
//! Output is a pure function of the [`Unit`]: the same compiled tree,
//! file name and provenance always produce the same bytes. Renderers write
//! into any [`io::Write`] so the persistence layer can stream straight into
//! its temporary file.

mod cpp;
mod rust;

use std::io::{self, Write};
use std::path::Path;

use crate::error::OptgenError;
use crate::resolve::CompiledSpec;
use crate::types::{Provenance, Target};

/// Width of the dash rule framing the header comment.
const RULE_WIDTH: usize = 78;

/// Everything a renderer needs for one output file.
#[derive(Debug, Clone)]
pub struct Unit<'a> {
    pub spec: &'a CompiledSpec,
    /// Value of the root `namespace` attribute.
    pub namespace: &'a str,
    /// Value of the root `name` attribute.
    pub name: &'a str,
    /// Base name of the generated file.
    pub file_name: String,
    pub provenance: &'a Provenance,
}

impl<'a> Unit<'a> {
    /// Bind a compiled spec to its output. The root element must carry
    /// `namespace` and `name`.
    pub fn new(
        spec: &'a CompiledSpec,
        destination: &Path,
        provenance: &'a Provenance,
    ) -> Result<Self, OptgenError> {
        let required = |value: &'a Option<String>, attribute: &str| {
            value
                .as_deref()
                .filter(|v| !v.is_empty())
                .ok_or_else(|| OptgenError::MissingAttribute {
                    tag: "config".into(),
                    attribute: attribute.into(),
                    path: "/config".into(),
                })
        };
        Ok(Self {
            spec,
            namespace: required(&spec.root.namespace, "namespace")?,
            name: required(&spec.root.name, "name")?,
            file_name: file_name(destination),
            provenance,
        })
    }
}

/// Render `unit` for `target`.
pub fn render(target: Target, unit: &Unit<'_>, out: &mut impl Write) -> io::Result<()> {
    match target {
        Target::Cpp => cpp::render(unit, out),
        Target::Rust => rust::render(unit, out),
    }
}

/// Render into a string. Used by `check` previews and tests.
pub fn render_to_string(target: Target, unit: &Unit<'_>) -> String {
    let mut buf = Vec::new();
    // Writing into a Vec cannot fail.
    let _ = render(target, unit, &mut buf);
    String::from_utf8_lossy(&buf).into_owned()
}

/// The comment block opening every generated file.
fn header(unit: &Unit<'_>, out: &mut impl Write) -> io::Result<()> {
    let rule = "-".repeat(RULE_WIDTH);
    writeln!(out, "//{rule}")?;
    writeln!(out, "// {}", unit.file_name)?;
    writeln!(
        out,
        "// This file is auto-generated by optgen from {}",
        file_name(&unit.spec.source)
    )?;
    writeln!(out, "//\n// *** DON'T MODIFY BY HAND!!! ***\n//")?;
    writeln!(out, "// Generated by: {}", unit.provenance.signature())?;
    writeln!(out, "// Created.....: {}", unit.provenance.created)?;
    writeln!(out, "//{rule}\n")
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Spaces needed after `token` to line it up with the widest one.
fn pad(width: usize, token: &str) -> String {
    " ".repeat(width.saturating_sub(token.chars().count()))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::fixtures::test::write_spec;
    use crate::resolve::compile_spec;
    use tempfile::TempDir;

    pub(crate) fn provenance() -> Provenance {
        Provenance {
            author: "Jo".into(),
            email: Some("jo@example.com".into()),
            created: "2024-01-02 03:04:05".into(),
        }
    }

    /// Compile `files` (first one is the source) in a scratch directory.
    pub(crate) fn compiled(files: &[(&str, &str)]) -> CompiledSpec {
        let dir = TempDir::new().unwrap();
        let mut paths = files.iter().map(|(name, xml)| write_spec(dir.path(), name, xml));
        let source = paths.next().unwrap();
        paths.for_each(drop);
        compile_spec(&source, &[]).unwrap()
    }

    #[test]
    fn unit_requires_namespace_and_name() {
        let spec = compiled(&[("a.xml", r#"<config name="c"><option name="x"/></config>"#)]);
        let prov = provenance();
        match Unit::new(&spec, Path::new("out/a.hpp"), &prov) {
            Err(OptgenError::MissingAttribute { attribute, .. }) => assert_eq!(attribute, "namespace"),
            other => panic!("expected MissingAttribute, got {other:?}"),
        }

        let spec = compiled(&[("a.xml", r#"<config namespace="n" name=""><option name="x"/></config>"#)]);
        match Unit::new(&spec, Path::new("out/a.hpp"), &prov) {
            Err(OptgenError::MissingAttribute { attribute, .. }) => assert_eq!(attribute, "name"),
            other => panic!("expected MissingAttribute, got {other:?}"),
        }
    }

    #[test]
    fn unit_takes_base_name_of_destination() {
        let spec = compiled(&[("a.xml", r#"<config namespace="n" name="c"><option name="x"/></config>"#)]);
        let prov = provenance();
        let unit = Unit::new(&spec, Path::new("deep/dir/c.hpp"), &prov).unwrap();
        assert_eq!(unit.file_name, "c.hpp");
        assert_eq!((unit.namespace, unit.name), ("n", "c"));
    }

    #[test]
    fn header_carries_provenance() {
        let spec = compiled(&[("a.xml", r#"<config namespace="n" name="c"><option name="x"/></config>"#)]);
        let prov = provenance();
        let unit = Unit::new(&spec, Path::new("c.hpp"), &prov).unwrap();
        let mut buf = Vec::new();
        header(&unit, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0].len(), 2 + RULE_WIDTH);
        assert_eq!(lines[1], "// c.hpp");
        assert_eq!(lines[2], "// This file is auto-generated by optgen from a.xml");
        assert_eq!(lines[4], "// *** DON'T MODIFY BY HAND!!! ***");
        assert_eq!(lines[6], "// Generated by: Jo <jo@example.com>");
        assert_eq!(lines[7], "// Created.....: 2024-01-02 03:04:05");
    }

    #[test]
    fn rendering_is_deterministic() {
        let spec = compiled(&[("app.xml", crate::fixtures::test::APP_XML)]);
        let prov = provenance();
        let unit = Unit::new(&spec, Path::new("app.hpp"), &prov).unwrap();
        for target in [Target::Cpp, Target::Rust] {
            assert_eq!(render_to_string(target, &unit), render_to_string(target, &unit));
        }
    }

    #[test]
    fn padding_aligns_tokens() {
        assert_eq!(pad(6, "host"), "  ");
        assert_eq!(pad(2, "host"), "");
    }
}
