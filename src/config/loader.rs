//! Descriptor loading from disk.

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::config::defaults::{Defaults, Fallbacks};
use crate::config::error::ConfigError;
use crate::config::servers::Servers;
use crate::config::validation::RealFs;

#[derive(Debug, Deserialize)]
struct ServersFile {
    #[serde(default)]
    servers: Servers,
}

/// Parse descriptors from a TOML (`[[servers]]` tables) or JSON (array, or
/// object with a `servers` array) file, chosen by extension.
pub fn load_servers(path: &Path) -> Result<Servers, ConfigError> {
    let content = fs::read_to_string(path)?;

    match path.extension().and_then(|ext| ext.to_str()) {
        Some("toml") => Ok(toml::from_str::<ServersFile>(&content)?.servers),
        Some("json") => parse_json(&content),
        _ => Err(ConfigError::UnsupportedFormat(path.to_path_buf())),
    }
}

fn parse_json(content: &str) -> Result<Servers, ConfigError> {
    let document: serde_json::Value = serde_json::from_str(content)?;
    if document.is_array() {
        Ok(serde_json::from_value(document)?)
    } else {
        Ok(serde_json::from_value::<ServersFile>(document)?.servers)
    }
}

/// Load, expand `${VAR}` references in file paths, defaultize and validate.
pub fn load(path: &Path, fallbacks: &Fallbacks, defaults: &Defaults) -> Result<Servers, ConfigError> {
    let mut servers = load_servers(path)?;

    servers.interpolate(expand_env);
    servers.defaultize(fallbacks, defaults);
    servers.validate(&RealFs)?;

    tracing::debug!(path = %path.display(), count = servers.len(), "Servers loaded");
    Ok(servers)
}

/// Replaces `${NAME}` with the value of the environment variable `NAME`.
/// Unset variables expand to the empty string; unterminated references are
/// kept verbatim.
pub fn expand_env(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) => {
                out.push_str(&std::env::var(&after[..end]).unwrap_or_default());
                rest = &after[end + 1..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }

    out.push_str(rest);
    out
}
