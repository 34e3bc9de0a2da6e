//! Self-contained Rust module: name and value constants plus a static
//! option table.

use std::io::{self, Write};

use super::{Unit, header};
use crate::ident::constant_name;
use crate::option::{Bound, OptionSpec, Permitted, ValueType};

/// Item definitions emitted verbatim into every module.
const PRELUDE: &str = r#"/// Type of an option or of its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionType {
    String,
    Int,
    Bool,
    Float,
    Anonymous,
    Branch,
}

/// Lower or upper limit of a value. `Length` limits apply to strings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Bound {
    Int(i64),
    Float(f64),
    Length(u64),
}

/// A permitted name or value token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Permitted {
    pub val: &'static str,
    pub desc: Option<&'static str>,
}

/// One configuration option.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OptionDef {
    pub name: &'static str,
    pub kind: OptionType,
    pub value_type: OptionType,
    pub desc: &'static str,
    pub unique: bool,
    pub required: bool,
    pub validate: bool,
    pub default: Option<&'static str>,
    pub min: Option<Bound>,
    pub max: Option<Bound>,
    pub names: &'static [Permitted],
    pub values: &'static [Permitted],
    pub children: &'static [OptionDef],
}
"#;

pub(super) fn render(unit: &Unit<'_>, out: &mut impl Write) -> io::Result<()> {
    let ids = &unit.spec.identifiers;
    let root = &unit.spec.root;

    header(unit, out)?;
    writeln!(out, "#![allow(dead_code)]\n")?;
    writeln!(out, "pub const NAMESPACE: &str = {:?};", unit.namespace)?;
    writeln!(out, "pub const NAME: &str = {:?};", unit.name)?;
    match root.alias.as_deref() {
        Some(alias) => writeln!(out, "pub const ALIAS: Option<&str> = Some({alias:?});")?,
        None => writeln!(out, "pub const ALIAS: Option<&str> = None;")?,
    }
    writeln!(out, "pub const ROOT: &str = {:?};\n", root.root.as_deref().unwrap_or(""))?;

    writeln!(out, "/// Option names.")?;
    writeln!(out, "pub mod names {{")?;
    for id in &ids.names {
        writeln!(out, "    pub const {}: &str = {:?};", id.constant, id.token)?;
    }
    writeln!(out, "}}\n")?;
    writeln!(out, "/// Permitted name and value tokens.")?;
    writeln!(out, "pub mod values {{")?;
    for id in &ids.values {
        writeln!(out, "    pub const {}: &str = {:?};", id.constant, id.token)?;
    }
    writeln!(out, "}}\n")?;

    out.write_all(PRELUDE.as_bytes())?;
    writeln!(out)?;
    writeln!(out, "pub static OPTIONS: &[OptionDef] = &[")?;
    options(out, &unit.spec.options, 1)?;
    writeln!(out, "];")
}

fn options(out: &mut impl Write, options: &[OptionSpec], depth: usize) -> io::Result<()> {
    let ws = "    ".repeat(depth);
    for opt in options {
        writeln!(out, "{ws}OptionDef {{")?;
        writeln!(out, "{ws}    name: names::{},", opt.constant)?;
        writeln!(out, "{ws}    kind: {},", type_name(opt.kind))?;
        writeln!(out, "{ws}    value_type: {},", type_name(opt.value_type))?;
        writeln!(out, "{ws}    desc: {:?},", opt.desc)?;
        writeln!(out, "{ws}    unique: {},", opt.unique)?;
        writeln!(out, "{ws}    required: {},", opt.required)?;
        writeln!(out, "{ws}    validate: {},", opt.validate)?;
        writeln!(out, "{ws}    default: {},", optional(opt.default.as_deref()))?;
        writeln!(out, "{ws}    min: {},", bound(opt.min))?;
        writeln!(out, "{ws}    max: {},", bound(opt.max))?;
        writeln!(out, "{ws}    names: {},", permitted(&opt.names))?;
        writeln!(out, "{ws}    values: {},", permitted(&opt.values))?;
        if opt.children.is_empty() {
            writeln!(out, "{ws}    children: &[],")?;
        } else {
            writeln!(out, "{ws}    children: &[")?;
            self::options(out, &opt.children, depth + 2)?;
            writeln!(out, "{ws}    ],")?;
        }
        writeln!(out, "{ws}}},")?;
    }
    Ok(())
}

fn type_name(t: ValueType) -> &'static str {
    match t {
        ValueType::String => "OptionType::String",
        ValueType::Int => "OptionType::Int",
        ValueType::Bool => "OptionType::Bool",
        ValueType::Float => "OptionType::Float",
        ValueType::Anonymous => "OptionType::Anonymous",
        ValueType::Branch => "OptionType::Branch",
    }
}

fn optional(s: Option<&str>) -> String {
    match s {
        Some(s) => format!("Some({s:?})"),
        None => "None".into(),
    }
}

fn bound(b: Option<Bound>) -> String {
    match b {
        Some(Bound::Int(v)) => format!("Some(Bound::Int({v}))"),
        Some(Bound::Float(v)) => format!("Some(Bound::Float({v:?}))"),
        Some(Bound::Length(v)) => format!("Some(Bound::Length({v}))"),
        None => "None".into(),
    }
}

fn permitted(set: &[Permitted]) -> String {
    if set.is_empty() {
        return "&[]".into();
    }
    let items: Vec<String> = set
        .iter()
        .map(|p| {
            format!(
                "Permitted {{ val: values::{}, desc: {} }}",
                constant_name(&p.val),
                optional(p.desc.as_deref())
            )
        })
        .collect();
    format!("&[{}]", items.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::test::{APP_XML, COMMON_XML, SERVER_XML};
    use crate::render::tests::{compiled, provenance};
    use crate::render::{Unit, render_to_string};
    use crate::types::Target;
    use pretty_assertions::assert_eq;
    use std::path::Path;

    fn body(text: &str) -> &str {
        let start = text.find("#![allow").unwrap();
        &text[start..]
    }

    #[test]
    fn server_module_matches_exactly() {
        let spec = compiled(&[("server.xml", SERVER_XML), ("common.xml", COMMON_XML)]);
        let prov = provenance();
        let unit = Unit::new(&spec, Path::new("server_config.rs"), &prov).unwrap();
        let text = render_to_string(Target::Rust, &unit);

        let expected = format!(
            r#"#![allow(dead_code)]

pub const NAMESPACE: &str = "acme";
pub const NAME: &str = "server_config";
pub const ALIAS: Option<&str> = None;
pub const ROOT: &str = "server";

/// Option names.
pub mod names {{
    pub const HOST: &str = "host";
}}

/// Permitted name and value tokens.
pub mod values {{
}}

{PRELUDE}
pub static OPTIONS: &[OptionDef] = &[
    OptionDef {{
        name: names::HOST,
        kind: OptionType::String,
        value_type: OptionType::String,
        desc: "Host to bind",
        unique: true,
        required: false,
        validate: true,
        default: Some("localhost"),
        min: None,
        max: None,
        names: &[],
        values: &[],
        children: &[],
    }},
];
"#
        );
        assert_eq!(body(&text), expected);
    }

    #[test]
    fn app_module_nests_children_and_permitted_sets() {
        let spec = compiled(&[("app.xml", APP_XML)]);
        let prov = provenance();
        let unit = Unit::new(&spec, Path::new("app.rs"), &prov).unwrap();
        let text = render_to_string(Target::Rust, &unit);

        assert!(text.contains("pub const NAMESPACE: &str = \"acme::app\";"));
        assert!(text.contains("pub const ALIAS: Option<&str> = Some(\"app\");"));
        assert!(text.contains("    pub const CONSOLE: &str = \"console\";"));
        assert!(text.contains(
            "        values: &[Permitted { val: values::FAST, desc: Some(\"Optimize for speed\") }, \
             Permitted { val: values::SAFE, desc: Some(\"Optimize for safety\") }],"
        ));
        assert!(text.contains("        min: Some(Bound::Length(1)),"));
        assert!(text.contains("        max: Some(Bound::Int(64)),"));
        assert!(text.contains("        kind: OptionType::Branch,"));
        assert!(text.contains("        children: &[\n            OptionDef {\n                name: names::PATH,"));
    }

    #[test]
    fn string_literals_use_rust_escapes() {
        let spec = compiled(&[(
            "a.xml",
            r#"<config namespace="n" name="c"><option name="q" desc="say &quot;hi&quot;\now"/></config>"#,
        )]);
        let prov = provenance();
        let unit = Unit::new(&spec, Path::new("c.rs"), &prov).unwrap();
        let text = render_to_string(Target::Rust, &unit);
        assert!(text.contains(r#"desc: "say \"hi\"\\now","#));
    }

    #[test]
    fn float_bounds_keep_a_decimal_point() {
        assert_eq!(bound(Some(Bound::Float(1.0))), "Some(Bound::Float(1.0))");
        assert_eq!(bound(None), "None");
    }
}
