//! Layered settings for the compiler.
//!
//! ```text
//! Compiled defaults     #[config(default = ...)]
//!        ↑ overridden by
//! optgen.toml           platform config dir, then working directory
//!        ↑ overridden by
//! Environment vars      OPTGEN__KEY
//!        ↑ overridden by
//! Overrides             command-line flags
//! ```
//!
//! Every layer is sparse: it only names the keys it changes. Layers are
//! deep-merged as `toml` tables and the result is handed to confique, which
//! fills defaults. Settings files are strict: a key `Settings` does not know
//! is an error carrying the file and line.
//!
//! The resolution step ([`resolve`]) performs no I/O so it can be tested with
//! synthetic inputs; [`Settings::load`] gathers the real inputs.

use std::path::{Path, PathBuf};

use confique::Config;
use serde::{Deserialize, Deserializer};
use toml::{Table, Value};

use crate::error::OptgenError;
use crate::file;
use crate::types::Target;

/// Prefix of environment variables read as settings.
pub const ENV_PREFIX: &str = "OPTGEN";

/// Compiler settings.
#[derive(Config, Debug, Clone, PartialEq)]
pub struct Settings {
    /// Directories searched for included specification files, after the
    /// directory of the source file. A list, or a colon-delimited string.
    #[config(default = [], deserialize_with = search_dirs)]
    pub search_dirs: Vec<PathBuf>,

    /// Replace an existing destination file.
    #[config(default = false)]
    pub overwrite: bool,

    /// Author recorded in generated headers. Falls back to git's user.name,
    /// then the login name.
    pub author: Option<String>,

    /// Author e-mail recorded in generated headers. Falls back to git's
    /// user.email.
    pub email: Option<String>,

    /// Output dialect, "cpp" or "rust". Inferred from the destination file
    /// extension when unset.
    pub target: Option<Target>,

    /// Log detail when RUST_LOG is unset: 0 warnings, 1 debug, 2 or more trace.
    #[config(default = 0)]
    pub verbosity: u8,
}

fn search_dirs<'de, D>(deserializer: D) -> Result<Vec<PathBuf>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Dirs {
        List(Vec<PathBuf>),
        Joined(String),
    }

    Ok(match Dirs::deserialize(deserializer)? {
        Dirs::List(dirs) => dirs,
        Dirs::Joined(joined) => split_dirs(&joined),
    })
}

/// Split a colon-delimited directory list, dropping empty entries.
pub fn split_dirs(joined: &str) -> Vec<PathBuf> {
    joined
        .split(':')
        .filter(|d| !d.is_empty())
        .map(PathBuf::from)
        .collect()
}

/// All pre-loaded data needed to resolve settings. No I/O happens here.
#[derive(Debug, Default)]
pub struct SettingsInput {
    /// File contents in precedence order: first = lowest priority.
    pub files: Vec<(PathBuf, String)>,
    /// Raw environment variable pairs.
    pub env_vars: Vec<(String, String)>,
    /// Command-line overrides as `(key, value)` pairs, highest priority.
    pub overrides: Vec<(String, Value)>,
}

impl Settings {
    /// Load settings from the settings files, the process environment and
    /// `overrides`.
    pub fn load(overrides: Vec<(String, Value)>) -> Result<Self, OptgenError> {
        let files = file::settings_files(&file::settings_dirs())?;
        resolve(SettingsInput {
            files,
            env_vars: std::env::vars().collect(),
            overrides,
        })
    }

    /// Commented TOML template generated from the field docs.
    pub fn template() -> String {
        confique::toml::template::<Settings>(confique::toml::FormatOptions::default())
    }
}

/// Merge all layers and produce typed settings.
pub fn resolve(input: SettingsInput) -> Result<Settings, OptgenError> {
    let mut merged = Table::new();
    for (path, content) in &input.files {
        reject_unknown_keys(content, path)?;
        let table: Table = toml::from_str(content).map_err(|e| OptgenError::SettingsParse {
            path: path.clone(),
            source: e,
        })?;
        merged = deep_merge(merged, table);
    }

    merged = deep_merge(merged, env_to_table(ENV_PREFIX, input.env_vars));

    let mut overrides = Table::new();
    for (key, value) in input.overrides {
        overrides.insert(key, value);
    }
    merged = deep_merge(merged, overrides);

    let layer: <Settings as Config>::Layer =
        Value::Table(merged)
            .try_into()
            .map_err(|e: toml::de::Error| OptgenError::InvalidSetting {
                key: "<merged>".into(),
                reason: e.to_string(),
            })?;

    Settings::builder()
        .preloaded(layer)
        .load()
        .map_err(OptgenError::from)
}

/// Deep-merge `overlay` on top of `base`. Tables recurse; any other value in
/// `overlay` replaces the one in `base`.
fn deep_merge(mut base: Table, overlay: Table) -> Table {
    for (key, overlay_val) in overlay {
        match (base.remove(&key), overlay_val) {
            (Some(Value::Table(base_tbl)), Value::Table(overlay_tbl)) => {
                base.insert(key, Value::Table(deep_merge(base_tbl, overlay_tbl)));
            }
            (_, overlay_val) => {
                base.insert(key, overlay_val);
            }
        }
    }
    base
}

/// Table of `{PREFIX}__KEY` variables, keys lowercased.
fn env_to_table(prefix: &str, vars: impl IntoIterator<Item = (String, String)>) -> Table {
    let needle = format!("{prefix}__");
    let mut table = Table::new();
    for (key, value) in vars {
        let Some(rest) = key.strip_prefix(&needle) else {
            continue;
        };
        if rest.is_empty() {
            continue;
        }
        table.insert(rest.to_lowercase(), parse_env_value(&value));
    }
    table
}

/// bool, then integer, then string.
fn parse_env_value(s: &str) -> Value {
    if s.eq_ignore_ascii_case("true") {
        return Value::Boolean(true);
    }
    if s.eq_ignore_ascii_case("false") {
        return Value::Boolean(false);
    }
    if let Ok(i) = s.parse::<i64>() {
        return Value::Integer(i);
    }
    Value::String(s.to_string())
}

/// Fail on keys of a settings file that `Settings` does not define.
fn reject_unknown_keys(content: &str, path: &Path) -> Result<(), OptgenError> {
    let mut unknown: Vec<String> = Vec::new();
    let deserializer = toml::Deserializer::new(content);
    let _layer: <Settings as Config>::Layer =
        serde_ignored::deserialize(deserializer, |ignored| unknown.push(ignored.to_string()))
            .map_err(|e| OptgenError::SettingsParse {
                path: path.to_path_buf(),
                source: e,
            })?;

    if unknown.is_empty() {
        return Ok(());
    }
    let errors = unknown
        .into_iter()
        .map(|key| OptgenError::UnknownSetting {
            line: find_key_line(content, &key),
            key,
            path: path.to_path_buf(),
        })
        .collect();
    Err(OptgenError::UnknownSettings(errors))
}

/// 1-indexed line of a key assignment, 0 if it cannot be found. Handles
/// `[section]` headers for dotted keys; quoted keys and inline tables are
/// not recognised.
fn find_key_line(content: &str, dotted_key: &str) -> usize {
    let segments: Vec<&str> = dotted_key.split('.').collect();
    let Some((leaf, section)) = segments.split_last() else {
        return 0;
    };

    let mut current: Vec<String> = Vec::new();
    for (i, line) in content.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.starts_with('[') && !trimmed.starts_with("[[") {
            let header = trimmed.trim_start_matches('[').trim_end_matches(']').trim();
            current = header.split('.').map(|s| s.trim().to_string()).collect();
            continue;
        }
        let in_section =
            section.len() == current.len() && section.iter().zip(&current).all(|(a, b)| *a == b);
        if in_section
            && let Some(rest) = trimmed.strip_prefix(leaf)
            && rest.trim_start().starts_with('=')
        {
            return i + 1;
        }
    }
    0
}
