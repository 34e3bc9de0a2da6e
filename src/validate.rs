//! Schema validation of `<option>` nodes.
//!
//! Each option node is read into a typed [`OptionAttributes`] record by
//! exhaustive matching on attribute names, then checked and turned into an
//! [`OptionSpec`]. Nested options are validated before their parent because
//! the parent's type inference depends on whether it has any.
//!
//! Validation is fail-fast: the first violation aborts with an error naming
//! the node path.

use tracing::trace;

use crate::error::OptgenError;
use crate::ident::constant_name;
use crate::option::{Bound, OptionSpec, Permitted, ValueType};
use crate::tree::{Arena, NodeId, SpecNode, Tag};

/// Attributes of one `<option>`, legacy spellings already folded.
#[derive(Debug, Default, PartialEq)]
struct OptionAttributes<'a> {
    name: Option<&'a str>,
    desc: Option<&'a str>,
    val: Option<&'a str>,
    kind: Option<&'a str>,
    val_type: Option<&'a str>,
    default: Option<&'a str>,
    required: Option<&'a str>,
    unique: Option<&'a str>,
    validate: Option<&'a str>,
    min: Option<&'a str>,
    max: Option<&'a str>,
    min_length: Option<&'a str>,
    max_length: Option<&'a str>,
}

impl<'a> OptionAttributes<'a> {
    fn read(node: &'a SpecNode, path: &str) -> Result<Self, OptgenError> {
        let mut attrs = Self::default();
        let (mut legacy_val_type, mut legacy_min_length, mut legacy_max_length) = (None, None, None);

        for (key, value) in &node.attrs {
            let value = Some(value.as_str());
            match key.as_str() {
                "name" => attrs.name = value,
                "desc" => attrs.desc = value,
                "val" => attrs.val = value,
                "type" => attrs.kind = value,
                "val-type" => attrs.val_type = value,
                "default" => attrs.default = value,
                "required" => attrs.required = value,
                "unique" => attrs.unique = value,
                "validate" => attrs.validate = value,
                "min" => attrs.min = value,
                "max" => attrs.max = value,
                "min-length" => attrs.min_length = value,
                "max-length" => attrs.max_length = value,
                "val_type" => legacy_val_type = value,
                "min_length" => legacy_min_length = value,
                "max_length" => legacy_max_length = value,
                other => {
                    return Err(OptgenError::InvalidAttribute {
                        owner: node.attr("name").unwrap_or("option").to_string(),
                        attribute: other.to_string(),
                        path: path.to_string(),
                    });
                }
            }
        }

        attrs.val_type = attrs.val_type.or(legacy_val_type);
        attrs.min_length = attrs.min_length.or(legacy_min_length);
        attrs.max_length = attrs.max_length.or(legacy_max_length);

        // Empty type and bound attributes count as absent.
        for field in [
            &mut attrs.kind,
            &mut attrs.val_type,
            &mut attrs.min,
            &mut attrs.max,
            &mut attrs.min_length,
            &mut attrs.max_length,
        ] {
            if field.is_some_and(str::is_empty) {
                *field = None;
            }
        }
        Ok(attrs)
    }
}

/// Validate every option directly below `root`, recursively.
pub fn validate_tree(arena: &Arena, root: NodeId) -> Result<Vec<OptionSpec>, OptgenError> {
    arena
        .children_tagged(root, &Tag::Option)
        .into_iter()
        .map(|id| validate_option(arena, id))
        .collect()
}

fn validate_option(arena: &Arena, id: NodeId) -> Result<OptionSpec, OptgenError> {
    let children = validate_tree(arena, id)?;

    let node = arena.node(id);
    let path = arena.path_of(id);
    let attrs = OptionAttributes::read(node, &path)?;

    let name = attrs.name.filter(|n| !n.is_empty()).ok_or_else(|| OptgenError::MissingAttribute {
        tag: "option".into(),
        attribute: "name".into(),
        path: path.clone(),
    })?;

    let flag = |attribute: &str, value: Option<&str>| match value {
        None | Some("true") => Ok(true),
        Some("false") => Ok(false),
        Some(other) => Err(OptgenError::InvalidBooleanValue {
            option: name.to_string(),
            attribute: attribute.to_string(),
            value: other.to_string(),
            path: path.clone(),
        }),
    };
    let mut required = flag("required", attrs.required)?;
    let unique = flag("unique", attrs.unique)?;
    let validate = flag("validate", attrs.validate)?;

    let type_of = |value: &str| {
        ValueType::from_name(value).ok_or_else(|| OptgenError::InvalidOptionType {
            option: name.to_string(),
            value: value.to_string(),
            path: path.clone(),
        })
    };
    let declared = attrs.kind.map(type_of).transpose()?;
    let value_type = match attrs.val_type.map(type_of).transpose()? {
        Some(t) => t,
        None => declared.unwrap_or(ValueType::String),
    };
    let kind = match declared {
        Some(t) => t,
        None if !children.is_empty() => ValueType::Branch,
        None => value_type,
    };

    let check = BoundCheck {
        option: name,
        value_type,
        path: &path,
    };
    let min = check.resolve(("min", attrs.min), ("min-length", attrs.min_length))?;
    let max = check.resolve(("max", attrs.max), ("max-length", attrs.max_length))?;

    if let Some(default) = attrs.default {
        required = false;
        if !default.is_empty() && !literal_fits(default, value_type) {
            return Err(OptgenError::InvalidDefault {
                option: name.to_string(),
                value: default.to_string(),
                value_type: value_type.to_string(),
                path,
            });
        }
    }

    let names = permitted(arena, id, &Tag::Name)?;
    let values = permitted(arena, id, &Tag::Value)?;
    if let Some(bad) = values.iter().find(|v| !literal_fits(&v.val, value_type)) {
        return Err(OptgenError::InvalidPermittedValue {
            option: name.to_string(),
            value: bad.val.clone(),
            value_type: value_type.to_string(),
            path,
        });
    }

    trace!("Option {path}: kind={kind} value_type={value_type} default={:?} required={required}", attrs.default);

    Ok(OptionSpec {
        name: name.to_string(),
        constant: constant_name(name),
        desc: attrs.desc.unwrap_or_default().to_string(),
        kind,
        value_type,
        required,
        unique,
        validate,
        default: attrs.default.map(str::to_string),
        value: attrs.val.map(str::to_string),
        min,
        max,
        names,
        values,
        children,
        path,
    })
}

struct BoundCheck<'a> {
    option: &'a str,
    value_type: ValueType,
    path: &'a str,
}

impl BoundCheck<'_> {
    /// Resolve one bound slot from its numeric and its length attribute.
    ///
    /// Numeric bounds are legal only on int and float, length bounds only on
    /// string, so at most one of the pair can survive. Each attribute is
    /// checked on its own; a slot holding both always fails on the one that
    /// does not fit the value type.
    fn resolve(
        &self,
        numeric: (&str, Option<&str>),
        length: (&str, Option<&str>),
    ) -> Result<Option<Bound>, OptgenError> {
        let (num_attr, num_raw) = numeric;
        let (len_attr, len_raw) = length;

        if len_raw.is_some() && self.value_type != ValueType::String {
            return Err(self.error(len_attr, "is only allowed on string options"));
        }
        if num_raw.is_some() && !self.value_type.is_numeric() {
            return Err(self.error(num_attr, "is only allowed on int and float options"));
        }

        if let Some(raw) = num_raw {
            let bound = match self.value_type {
                ValueType::Int => raw.trim().parse().map(Bound::Int).ok(),
                _ => raw
                    .trim()
                    .parse::<f64>()
                    .ok()
                    .filter(|v| v.is_finite())
                    .map(Bound::Float),
            };
            return bound
                .map(Some)
                .ok_or_else(|| self.error(num_attr, &format!("value '{raw}' is not a valid number")));
        }
        if let Some(raw) = len_raw {
            return raw
                .trim()
                .parse()
                .map(|n| Some(Bound::Length(n)))
                .map_err(|_| self.error(len_attr, &format!("value '{raw}' is not a valid length")));
        }
        Ok(None)
    }

    fn error(&self, attribute: &str, reason: &str) -> OptgenError {
        OptgenError::InvalidBoundsForType {
            option: self.option.to_string(),
            attribute: attribute.to_string(),
            value_type: self.value_type.to_string(),
            reason: reason.to_string(),
            path: self.path.to_string(),
        }
    }
}

/// Whether `value` reads as a literal of `value_type`. Types without a
/// literal syntax of their own accept anything.
fn literal_fits(value: &str, value_type: ValueType) -> bool {
    match value_type {
        ValueType::Int => value.trim().parse::<i64>().is_ok(),
        ValueType::Float => value.trim().parse::<f64>().is_ok_and(f64::is_finite),
        ValueType::Bool => matches!(value, "true" | "false"),
        _ => true,
    }
}

/// Collect the `<name>` or `<value>` children of an option.
fn permitted(arena: &Arena, option: NodeId, tag: &Tag) -> Result<Vec<Permitted>, OptgenError> {
    let mut out: Vec<Permitted> = Vec::new();
    for id in arena.children_tagged(option, tag) {
        let node = arena.node(id);
        let mut val = None;
        let mut desc = None;
        for (key, value) in &node.attrs {
            match key.as_str() {
                "val" => val = Some(value.as_str()),
                "desc" => desc = Some(value.as_str()),
                other => {
                    return Err(OptgenError::InvalidAttribute {
                        owner: tag.name().to_string(),
                        attribute: other.to_string(),
                        path: arena.path_of(id),
                    });
                }
            }
        }
        let val = val.filter(|v| !v.is_empty()).ok_or_else(|| OptgenError::MissingAttribute {
            tag: tag.name().to_string(),
            attribute: "val".into(),
            path: arena.path_of(id),
        })?;
        if out.iter().all(|p| p.val != val) {
            out.push(Permitted {
                val: val.to_string(),
                desc: desc.map(str::to_string),
            });
        }
    }
    Ok(out)
}
