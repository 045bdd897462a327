//! Loading of the JSON and YAML documents a run is described by, and
//! writing of the JSON artifacts it produces.

use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use serde::{de::DeserializeOwned, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigBackend {
    Json,
    Yaml,
}

impl ConfigBackend {
    /// Decode `s`; JSON errors carry the path of the offending value
    /// inside the document.
    pub fn decode_str<T: DeserializeOwned>(self, s: &str) -> Result<T> {
        match self {
            ConfigBackend::Json => {
                let deserializer = &mut serde_json::Deserializer::from_str(s);
                Ok(serde_path_to_error::deserialize(deserializer)?)
            }
            ConfigBackend::Yaml => Ok(serde_yml::from_str(s)?),
        }
    }

    pub fn load_config_file<T: DeserializeOwned>(self, path: &Path) -> Result<T> {
        let s = std::fs::read_to_string(path)
            .with_context(|| anyhow!("loading config file from {path:?}"))?;
        match self {
            ConfigBackend::Json => self
                .decode_str(&s)
                .with_context(|| anyhow!("decoding JSON from config file {path:?}")),
            ConfigBackend::Yaml => self
                .decode_str(&s)
                .with_context(|| anyhow!("decoding YAML from config file {path:?}")),
        }
    }
}

pub const FILE_EXTENSIONS: &[(&str, ConfigBackend)] = &[
    ("json", ConfigBackend::Json),
    ("yml", ConfigBackend::Yaml),
    ("yaml", ConfigBackend::Yaml),
];

pub fn backend_from_path(path: &Path) -> Result<ConfigBackend> {
    if let Some(ext) = path.extension() {
        if let Some(ext) = ext.to_str() {
            if let Some((_, backend)) = FILE_EXTENSIONS.iter().find(|(e, _b)| *e == ext) {
                Ok(*backend)
            } else {
                bail!("given file path does have an unknown extension {ext:?}: {path:?}")
            }
        } else {
            bail!("given file path does have an extension that is not unicode: {path:?}")
        }
    } else {
        bail!(
            "given file path does not have an extension \
             for determining the file type: {path:?}"
        )
    }
}

/// Load a JSON or YAML file, chosen by its extension.
pub fn load_config_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    backend_from_path(path)?.load_config_file(path)
}

/// Returns None if the file does not exist.
pub fn try_load_config_file<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if path.exists() {
        load_config_file(path).map(Some)
    } else {
        Ok(None)
    }
}

/// Pretty-printed JSON, creating the parent directory if needed.
pub fn save_json_file<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).with_context(|| anyhow!("creating directory {dir:?}"))?;
    }
    let s = serde_json::to_string_pretty(value).with_context(|| anyhow!("encoding JSON"))?;
    std::fs::write(path, s).with_context(|| anyhow!("writing file {path:?}"))
}
