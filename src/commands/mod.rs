//! Command implementations
//!
//! Each module corresponds to a subcommand of the `style_imitator` CLI.

pub mod extract;
pub mod profile;
pub mod reply;

use std::fs;
use std::path::Path;

use serde::Serialize;

use crate::error::{Error, Result};

pub use reply::ReplyArgs;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
    Yaml,
}

impl OutputFormat {
    pub fn parse(raw: &str) -> Result<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "table" | "pretty" => Ok(Self::Table),
            "json" => Ok(Self::Json),
            "yaml" | "yml" => Ok(Self::Yaml),
            other => Err(Error::InvalidArgument(format!(
                "Unsupported format '{}'. Use table|json|yaml",
                other
            ))),
        }
    }

    /// Serialize for machine formats; `None` for the table format.
    pub fn render<T: Serialize>(self, value: &T) -> Result<Option<String>> {
        match self {
            Self::Table => Ok(None),
            Self::Json => Ok(Some(serde_json::to_string_pretty(value)?)),
            Self::Yaml => serde_yaml::to_string(value)
                .map(Some)
                .map_err(|e| Error::SerializationError(e.to_string())),
        }
    }
}

/// Read an export from disk, refusing anything that is not an `.html` file.
pub(crate) fn read_export(path: &Path) -> Result<Vec<u8>> {
    let is_html = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("html"));
    if !is_html {
        return Err(Error::InvalidArgument(format!(
            "{} is not an .html export",
            path.display()
        )));
    }
    Ok(fs::read(path)?)
}
