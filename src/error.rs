use std::path::PathBuf;

use thiserror::Error;

use crate::tree::NodeId;

/// Every way a compilation can fail. All of them are fatal: the compiler
/// stops at the first one and reports the offending node or file.
#[derive(Debug, Error)]
#[cfg_attr(feature = "rich-errors", derive(miette::Diagnostic))]
pub enum OptgenError {
    #[error("File '{name}' not found{}; searched: [{}]", referenced_from(.included_from), join_paths(.searched))]
    #[cfg_attr(
        feature = "rich-errors",
        diagnostic(
            code(optgen::file_not_found),
            help("add the directory holding the file with -d/--dirs or `search_dirs`")
        )
    )]
    FileNotFound {
        name: String,
        included_from: Option<PathBuf>,
        searched: Vec<PathBuf>,
    },

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: roxmltree::Error,
    },

    #[error("File '{file}' found include loop '{repeated}' (chain: {})", join_paths(.chain))]
    #[cfg_attr(feature = "rich-errors", diagnostic(code(optgen::include_cycle)))]
    IncludeCycle {
        file: PathBuf,
        repeated: PathBuf,
        chain: Vec<PathBuf>,
    },

    #[error("Copy loop detected at {path}: {}", join_ids(.chain))]
    #[cfg_attr(feature = "rich-errors", diagnostic(code(optgen::copy_cycle)))]
    CopyCycle { path: String, chain: Vec<NodeId> },

    #[error("Node '{path}' has path {query} that resolves to no nodes")]
    #[cfg_attr(
        feature = "rich-errors",
        diagnostic(
            code(optgen::empty_path),
            help("copy paths are evaluated relative to the <copy> element itself")
        )
    )]
    EmptyPathResolution { path: String, query: String },

    #[error("Invalid path query '{query}' at {path}: {reason}")]
    InvalidQuery {
        query: String,
        path: String,
        reason: String,
    },

    #[error("'{owner}' has invalid attribute: '{attribute}'\n  path: {path}")]
    #[cfg_attr(feature = "rich-errors", diagnostic(code(optgen::invalid_attribute)))]
    InvalidAttribute {
        owner: String,
        attribute: String,
        path: String,
    },

    #[error("<{tag}> is missing required attribute '{attribute}'\n  path: {path}")]
    MissingAttribute {
        tag: String,
        attribute: String,
        path: String,
    },

    #[error(
        "Option '{option}' error: non-boolean value given to '{attribute}' (must be 'true' or 'false'): '{value}'\n  path: {path}"
    )]
    InvalidBooleanValue {
        option: String,
        attribute: String,
        value: String,
        path: String,
    },

    #[error("Option '{option}' has invalid type '{value}'\n  path: {path}")]
    #[cfg_attr(
        feature = "rich-errors",
        diagnostic(help("valid types: string, int, bool, float, anonymous, branch"))
    )]
    InvalidOptionType {
        option: String,
        value: String,
        path: String,
    },

    #[error("Option '{option}' error: '{attribute}' {reason} (value type {value_type})\n  path: {path}")]
    #[cfg_attr(feature = "rich-errors", diagnostic(code(optgen::invalid_bounds)))]
    InvalidBoundsForType {
        option: String,
        attribute: String,
        value_type: String,
        reason: String,
        path: String,
    },

    #[error("Option '{option}' has default '{value}' that is not a valid {value_type}\n  path: {path}")]
    InvalidDefault {
        option: String,
        value: String,
        value_type: String,
        path: String,
    },

    #[error("Option '{option}' permits value '{value}' that is not a valid {value_type}\n  path: {path}")]
    #[cfg_attr(feature = "rich-errors", diagnostic(code(optgen::invalid_permitted_value)))]
    InvalidPermittedValue {
        option: String,
        value: String,
        value_type: String,
        path: String,
    },

    #[error("Identifiers '{first}' and '{second}' both map to constant {constant}")]
    IdentifierCollision {
        constant: String,
        first: String,
        second: String,
    },

    #[error("No config option names are found in the specification")]
    NoOptionsFound,

    #[error("File '{}' exists and overwriting was not requested", .0.display())]
    #[cfg_attr(
        feature = "rich-errors",
        diagnostic(code(optgen::destination_exists), help("pass --overwrite"))
    )]
    DestinationExists(PathBuf),

    #[error("Output directory {} doesn't exist", .0.display())]
    OutputDirMissing(PathBuf),

    #[error("Unknown setting '{key}' in {path} (line {line})")]
    UnknownSetting {
        key: String,
        path: PathBuf,
        line: usize,
    },

    #[error("Unknown settings in settings file")]
    UnknownSettings(Vec<OptgenError>),

    #[error("Failed to parse {path}: {source}")]
    SettingsParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid value for setting '{key}': {reason}")]
    InvalidSetting { key: String, reason: String },

    #[error("Settings error: {0}")]
    Settings(#[from] confique::Error),

    #[error("Failed to serialize the validated tree: {0}")]
    Dump(#[from] serde_json::Error),

    #[error("Source specification is required (call .source() on the builder)")]
    SourceRequired,

    #[error("Destination is required (call .destination() on the builder)")]
    DestinationRequired,
}

impl OptgenError {
    /// Process exit status reported by the binary. Each outcome has its own
    /// code so scripts can tell them apart.
    pub fn exit_code(&self) -> u8 {
        match self {
            OptgenError::CopyCycle { .. } => 1,
            OptgenError::EmptyPathResolution { .. } => 2,
            OptgenError::IncludeCycle { .. } => 3,
            OptgenError::DestinationExists(_) => 4,
            OptgenError::NoOptionsFound => 5,
            OptgenError::InvalidOptionType { .. } => 6,
            OptgenError::InvalidAttribute { .. } => 7,
            OptgenError::InvalidBooleanValue { .. } => 8,
            OptgenError::InvalidBoundsForType { .. } => 9,
            OptgenError::FileNotFound { .. } => 10,
            OptgenError::Parse { .. } => 11,
            OptgenError::Io { .. } => 12,
            OptgenError::InvalidQuery { .. } => 13,
            OptgenError::MissingAttribute { .. } => 14,
            OptgenError::InvalidDefault { .. } => 15,
            OptgenError::IdentifierCollision { .. } => 16,
            OptgenError::OutputDirMissing(_) => 17,
            OptgenError::UnknownSetting { .. }
            | OptgenError::UnknownSettings(_)
            | OptgenError::SettingsParse { .. }
            | OptgenError::InvalidSetting { .. }
            | OptgenError::Settings(_) => 18,
            OptgenError::Dump(_) => 19,
            OptgenError::InvalidPermittedValue { .. } => 20,
            OptgenError::SourceRequired | OptgenError::DestinationRequired => 64,
        }
    }
}

fn referenced_from(from: &Option<PathBuf>) -> String {
    match from {
        Some(path) => format!(" (included from {})", path.display()),
        None => String::new(),
    }
}

fn join_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn join_ids(ids: &[NodeId]) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(",")
}
