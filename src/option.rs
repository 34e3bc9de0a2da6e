//! Validated option model.
//!
//! An [`OptionSpec`] is what the schema validator makes of one `<option>`
//! node. Everything downstream (identifier collection, rendering, the JSON
//! dump of `optgen check --json`) works on this tree and never looks at raw
//! attributes again.

use std::fmt;

use serde::Serialize;

/// Type of an option or of its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    String,
    Int,
    Bool,
    Float,
    Anonymous,
    Branch,
}

impl ValueType {
    pub const ALL: [ValueType; 6] = [
        ValueType::String,
        ValueType::Int,
        ValueType::Bool,
        ValueType::Float,
        ValueType::Anonymous,
        ValueType::Branch,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == name)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ValueType::String => "string",
            ValueType::Int => "int",
            ValueType::Bool => "bool",
            ValueType::Float => "float",
            ValueType::Anonymous => "anonymous",
            ValueType::Branch => "branch",
        }
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, ValueType::Int | ValueType::Float)
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A `min`/`max` limit. Length bounds of string options share the same
/// slots as numeric bounds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Bound {
    Int(i64),
    Float(f64),
    Length(u64),
}

impl fmt::Display for Bound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bound::Int(v) => write!(f, "{v}"),
            Bound::Float(v) => write!(f, "{v}"),
            Bound::Length(v) => write!(f, "{v}"),
        }
    }
}

/// One entry of a permitted-name or permitted-value set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Permitted {
    pub val: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub desc: Option<String>,
}

/// A validated `<option>`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptionSpec {
    /// Name token as written in the source.
    pub name: String,
    /// Generated constant for `name`.
    pub constant: String,
    pub desc: String,
    /// Option type: explicit `type`, else `branch` when sub-options exist,
    /// else the value type.
    pub kind: ValueType,
    pub value_type: ValueType,
    pub required: bool,
    pub unique: bool,
    pub validate: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<Bound>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<Bound>,
    pub names: Vec<Permitted>,
    pub values: Vec<Permitted>,
    pub children: Vec<OptionSpec>,
    /// Diagnostic location, e.g. `/config/option[server]/option[port]`.
    #[serde(skip)]
    pub path: String,
}

impl OptionSpec {
    /// This option followed by all nested options, depth first.
    pub fn iter(&self) -> impl Iterator<Item = &OptionSpec> {
        let mut stack = vec![self];
        std::iter::from_fn(move || {
            let next = stack.pop()?;
            stack.extend(next.children.iter().rev());
            Some(next)
        })
    }
}

/// Every option of a forest, depth first in declaration order.
pub fn all_options(options: &[OptionSpec]) -> impl Iterator<Item = &OptionSpec> {
    options.iter().flat_map(OptionSpec::iter)
}
