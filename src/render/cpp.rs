//! C++ header for the `utxx` `config::validator` runtime.

use std::io::{self, Write};

use super::{Unit, header, pad};
use crate::ident::constant_name;
use crate::option::{Bound, OptionSpec, ValueType};

pub(super) fn render(unit: &Unit<'_>, out: &mut impl Write) -> io::Result<()> {
    let guard = format!("_OPTGEN_AUTOGEN_{}_", constant_name(&unit.file_name));
    let ids = &unit.spec.identifiers;
    let width = ids.max_token_width();
    let name = unit.name;

    header(unit, out)?;
    writeln!(out, "#ifndef {guard}")?;
    writeln!(out, "#define {guard}\n")?;
    writeln!(out, "#include <utxx/config_validator.hpp>\n")?;
    writeln!(out, "namespace {} {{", unit.namespace)?;
    writeln!(out, "    using namespace utxx;")?;
    writeln!(out, "    typedef")?;
    writeln!(out, "        boost::property_tree::translator_between<variant, std::string>")?;
    writeln!(out, "        translator;\n")?;
    writeln!(out, "    namespace {{")?;
    writeln!(out, "        typedef config::option_map    ovec;")?;
    writeln!(out, "        typedef config::string_set    sset;")?;
    writeln!(out, "        typedef config::variant_set   vset;")?;
    writeln!(out, "    }}\n")?;

    writeln!(out, "    class {name} : public config::validator {{")?;
    writeln!(out, "        translator tr;")?;
    writeln!(out, "        variant v()              const {{ return variant();        }}")?;
    writeln!(out, "        variant v(const char* s) const {{ return *tr.put_value(s); }}")?;
    writeln!(out, "    public:")?;
    if let Some(alias) = unit.spec.root.alias.as_deref() {
        writeln!(
            out,
            "        static constexpr const char* alias(){} {{ return {}; }}\n",
            pad(width, "alias"),
            literal(alias)
        )?;
    }
    writeln!(out, "        //---------- Configuration Options ------------")?;
    for id in &ids.names {
        writeln!(
            out,
            "        static constexpr const char* {}(){} {{ return {}; }}",
            id.constant,
            pad(width, &id.token),
            literal(&id.token)
        )?;
    }
    writeln!(out, "        //---------- Configuration Values -------------")?;
    for id in &ids.values {
        writeln!(
            out,
            "        static constexpr const char* VAL_{}(){} {{ return {}; }}",
            id.constant,
            pad(width, &id.token),
            literal(&id.token)
        )?;
    }
    writeln!(out)?;

    writeln!(out, "        static const {name}* instance(const tree_path& a_root = tree_path()) {{")?;
    writeln!(out, "            static {name} s_instance;")?;
    writeln!(out, "            if (!a_root.empty())")?;
    writeln!(out, "               s_instance.m_root = a_root;")?;
    writeln!(out, "            return &s_instance;")?;
    writeln!(out, "        }}\n")?;
    writeln!(out, "        friend class config::validator;\n")?;
    writeln!(out, "        virtual ~{name}() {{}}\n")?;
    writeln!(out, "        {name}() {{")?;
    writeln!(
        out,
        "            m_root = {};",
        literal(unit.spec.root.root.as_deref().unwrap_or(""))
    )?;

    options(out, &unit.spec.options, 0, "m_options")?;

    writeln!(out, "        }}")?;
    writeln!(out, "    }};\n")?;
    writeln!(out, "}} // namespace {}\n", unit.namespace)?;
    writeln!(out, "#endif // {guard}")
}

/// One brace block per option. Children register into the enclosing
/// block's `l_children<level>`.
fn options(out: &mut impl Write, options: &[OptionSpec], level: usize, target: &str) -> io::Result<()> {
    let ws = "  ".repeat(level + 6);
    let ws1 = format!("{ws}  ");
    let ws2 = format!("{ws1}  ");

    for opt in options {
        writeln!(out, "{ws}{{")?;
        writeln!(out, "{ws1}ovec l_children{level}; sset l_names; vset l_values;")?;
        self::options(out, &opt.children, level + 1, &format!("l_children{level}"))?;

        for name in &opt.names {
            writeln!(
                out,
                "{ws1}l_names.insert(VAL_{}());{}",
                constant_name(&name.val),
                trailing(name.desc.as_deref())
            )?;
        }
        for value in &opt.values {
            writeln!(
                out,
                "{ws1}l_values.insert(variant({}));{}",
                value_literal(&value.val, opt.value_type),
                trailing(value.desc.as_deref())
            )?;
        }

        writeln!(out, "{ws1}add_option({target},")?;
        writeln!(
            out,
            "{ws2}config::option({}(), {}, {},",
            opt.constant,
            type_name(opt.kind),
            type_name(opt.value_type)
        )?;
        writeln!(
            out,
            "{ws2}  {}, {} /*unique*/, {} /*required*/, {} /*validate*/,",
            literal(&opt.desc),
            opt.unique,
            opt.required,
            opt.validate
        )?;
        writeln!(
            out,
            "{ws2}  {} /*default*/, {} /*min*/, {} /*max*/,",
            default_literal(opt.default.as_deref()),
            bound_literal(opt.min),
            bound_literal(opt.max)
        )?;
        writeln!(out, "{ws2}  l_names, l_values, l_children{level}));")?;
        writeln!(out, "{ws}}}")?;
    }
    Ok(())
}

fn type_name(t: ValueType) -> String {
    format!("config::{}", t.as_str().to_ascii_uppercase())
}

fn default_literal(default: Option<&str>) -> String {
    match default {
        None => "v()".into(),
        Some("") => "variant(\"\")".into(),
        Some(v) => format!("v({})", literal(v)),
    }
}

fn bound_literal(bound: Option<Bound>) -> String {
    match bound {
        None => "v()".into(),
        Some(b) => format!("v(\"{b}\")"),
    }
}

/// Permitted values are quoted for string options and emitted verbatim for
/// every other value type.
/// Numbers and booleans are emitted bare (the validator has checked them);
/// everything else is a string literal.
fn value_literal(val: &str, value_type: ValueType) -> String {
    match value_type {
        ValueType::Int | ValueType::Float | ValueType::Bool => val.trim().to_string(),
        _ => literal(val),
    }
}

fn trailing(desc: Option<&str>) -> String {
    match desc {
        Some(d) if !d.is_empty() => format!(" // {}", d.replace('\n', " ")),
        _ => String::new(),
    }
}

/// A C++ string literal.
fn literal(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_ascii_control() => out.push_str(&format!("\\{:03o}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
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

    #[test]
    fn server_header_matches_exactly() {
        let spec = compiled(&[("server.xml", SERVER_XML), ("common.xml", COMMON_XML)]);
        let prov = provenance();
        let unit = Unit::new(&spec, Path::new("out/server_config.hpp"), &prov).unwrap();
        let text = render_to_string(Target::Cpp, &unit);

        let rule = format!("//{}", "-".repeat(78));
        let expected = format!(
            r#"{rule}
// server_config.hpp
// This file is auto-generated by optgen from server.xml
//
// *** DON'T MODIFY BY HAND!!! ***
//
// Generated by: Jo <jo@example.com>
// Created.....: 2024-01-02 03:04:05
{rule}

#ifndef _OPTGEN_AUTOGEN_SERVER_CONFIG_HPP_
#define _OPTGEN_AUTOGEN_SERVER_CONFIG_HPP_

#include <utxx/config_validator.hpp>

namespace acme {{
    using namespace utxx;
    typedef
        boost::property_tree::translator_between<variant, std::string>
        translator;

    namespace {{
        typedef config::option_map    ovec;
        typedef config::string_set    sset;
        typedef config::variant_set   vset;
    }}

    class server_config : public config::validator {{
        translator tr;
        variant v()              const {{ return variant();        }}
        variant v(const char* s) const {{ return *tr.put_value(s); }}
    public:
        //---------- Configuration Options ------------
        static constexpr const char* HOST() {{ return "host"; }}
        //---------- Configuration Values -------------

        static const server_config* instance(const tree_path& a_root = tree_path()) {{
            static server_config s_instance;
            if (!a_root.empty())
               s_instance.m_root = a_root;
            return &s_instance;
        }}

        friend class config::validator;

        virtual ~server_config() {{}}

        server_config() {{
            m_root = "server";
            {{
              ovec l_children0; sset l_names; vset l_values;
              add_option(m_options,
                config::option(HOST(), config::STRING, config::STRING,
                  "Host to bind", true /*unique*/, false /*required*/, true /*validate*/,
                  v("localhost") /*default*/, v() /*min*/, v() /*max*/,
                  l_names, l_values, l_children0));
            }}
        }}
    }};

}} // namespace acme

#endif // _OPTGEN_AUTOGEN_SERVER_CONFIG_HPP_
"#
        );
        assert_eq!(text, expected);
    }

    #[test]
    fn app_options_nest_and_enumerate() {
        let spec = compiled(&[("app.xml", APP_XML)]);
        let prov = provenance();
        let unit = Unit::new(&spec, Path::new("app.hpp"), &prov).unwrap();
        let text = render_to_string(Target::Cpp, &unit);

        // widest token is "address"/"console" (7)
        assert!(text.contains("        static constexpr const char* alias()   { return \"app\"; }\n\n"));
        assert!(text.contains("        static constexpr const char* PATH()    { return \"path\"; }"));
        assert!(text.contains("        static constexpr const char* VAL_CONSOLE() { return \"console\"; }"));
        assert!(text.contains("            m_root = \"app\";"));

        assert!(text.contains("              l_values.insert(variant(\"fast\")); // Optimize for speed\n"));
        assert!(text.contains("              l_names.insert(VAL_CONSOLE());\n"));
        assert!(text.contains("                  v(\"4\") /*default*/, v(\"1\") /*min*/, v(\"64\") /*max*/,"));
        assert!(text.contains("                  v() /*default*/, v(\"1\") /*min*/, v(\"64\") /*max*/,"));

        // nested option registers into the parent's child map
        assert!(text.contains(
            "                add_option(l_children0,\n                  config::option(PATH(), config::STRING, config::STRING,"
        ));
        assert!(text.contains("config::option(SINK(), config::BRANCH, config::STRING,"));
        assert!(text.contains("\"Output sink\", false /*unique*/, true /*required*/, true /*validate*/,"));
        assert!(text.ends_with("} // namespace acme::app\n\n#endif // _OPTGEN_AUTOGEN_APP_HPP_\n"));
    }

    #[test]
    fn non_string_values_are_verbatim() {
        let spec = compiled(&[(
            "a.xml",
            r#"<config namespace="n" name="c">
                 <option name="level" type="int"><value val="1"/><value val="2" desc="two"/></option>
                 <option name="opt" default=""/>
               </config>"#,
        )]);
        let prov = provenance();
        let unit = Unit::new(&spec, Path::new("c.hpp"), &prov).unwrap();
        let text = render_to_string(Target::Cpp, &unit);
        assert!(text.contains("l_values.insert(variant(1));\n"));
        assert!(text.contains("l_values.insert(variant(2)); // two\n"));
        assert!(text.contains("variant(\"\") /*default*/"));
    }

    #[test]
    fn untyped_values_are_quoted() {
        let spec = compiled(&[(
            "a.xml",
            r#"<config namespace="n" name="c">
                 <option name="any" type="anonymous"><value val="x); evil();"/></option>
               </config>"#,
        )]);
        let prov = provenance();
        let unit = Unit::new(&spec, Path::new("c.hpp"), &prov).unwrap();
        let text = render_to_string(Target::Cpp, &unit);
        assert!(text.contains("l_values.insert(variant(\"x); evil();\"));\n"));
        assert_eq!(value_literal(" 3 ", ValueType::Int), "3");
        assert_eq!(value_literal("true", ValueType::Bool), "true");
        assert_eq!(value_literal("v", ValueType::Branch), "\"v\"");
    }

    #[test]
    fn literals_are_escaped() {
        assert_eq!(literal(r#"say "hi"\now"#), r#""say \"hi\"\\now""#);
        assert_eq!(literal("a\nb\tc"), r#""a\nb\tc""#);
        assert_eq!(literal("\u{1}"), r#""\001""#);
        assert_eq!(literal("caf\u{e9}"), "\"caf\u{e9}\"");
    }

    #[test]
    fn types_map_to_runtime_enum() {
        assert_eq!(type_name(ValueType::Anonymous), "config::ANONYMOUS");
        assert_eq!(type_name(ValueType::Float), "config::FLOAT");
    }
}
