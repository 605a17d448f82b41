use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use toml_edit::{DocumentMut, Item};

use crate::store::{StoreConfig, DEFAULT_GCS_ENDPOINT};

pub const DEFAULT_MANIFEST: &str = "data-manifest.tsv";
pub const DEFAULT_REMOTE_PREFIX: &str = "gs://balrog/reference-data/";
pub const DEFAULT_LOCAL_PREFIX: &str = "/srv/reference_data/";

pub(crate) const MANIFEST_ENV: &str = "REFDATA_MANIFEST";
pub(crate) const REMOTE_PREFIX_ENV: &str = "REFDATA_REMOTE_PREFIX";
pub(crate) const LOCAL_PREFIX_ENV: &str = "REFDATA_LOCAL_PREFIX";
pub(crate) const CONFIG_ENV: &str = "REFDATA_CONFIG";
pub(crate) const GCS_ENDPOINT_ENV: &str = "REFDATA_GCS_ENDPOINT";
const GCS_TOKEN_ENVS: [&str; 2] = ["REFDATA_GCS_TOKEN", "GOOGLE_OAUTH_ACCESS_TOKEN"];

/// Options shared by every command, as given on the command line.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlobalOptions {
    pub quiet: bool,
    pub verbose: u8,
    pub trace: bool,
    pub json: bool,
    pub config: Option<String>,
    pub manifest: Option<String>,
    pub remote_prefix: Option<String>,
    pub local_prefix: Option<String>,
}

#[derive(Debug, Clone)]
pub(crate) struct EnvSnapshot {
    vars: HashMap<String, String>,
}

impl EnvSnapshot {
    pub(crate) fn capture() -> Self {
        Self {
            vars: env::vars().collect(),
        }
    }

    /// Non-empty value of `key`.
    pub(crate) fn var(&self, key: &str) -> Option<&str> {
        self.vars
            .get(key)
            .map(String::as_str)
            .filter(|value| !value.trim().is_empty())
    }

    #[cfg(test)]
    pub(crate) fn testing(pairs: &[(&str, &str)]) -> Self {
        let vars = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Self { vars }
    }
}

/// Values read from the optional TOML config file.
#[derive(Debug, Default, PartialEq, Eq)]
struct FileSettings {
    manifest: Option<String>,
    remote_prefix: Option<String>,
    local_prefix: Option<String>,
    gcs_endpoint: Option<String>,
}

/// Resolved settings; each comes from the command line, the environment,
/// the config file, or the built-in default, in that order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    manifest: PathBuf,
    remote_prefix: String,
    local_prefix: PathBuf,
    store: StoreConfig,
    config_file: Option<PathBuf>,
}

impl Config {
    /// Builds the configuration from the process environment.
    pub fn from_env(global: &GlobalOptions) -> Result<Self> {
        Self::from_snapshot(&EnvSnapshot::capture(), global)
    }

    pub(crate) fn from_snapshot(snapshot: &EnvSnapshot, global: &GlobalOptions) -> Result<Self> {
        let config_file = global
            .config
            .as_deref()
            .or_else(|| snapshot.var(CONFIG_ENV))
            .map(PathBuf::from);
        let file = match &config_file {
            Some(path) => read_config_file(path)?,
            None => FileSettings::default(),
        };

        let pick = |cli: Option<&str>, env_key: &str, from_file: Option<&str>, default: &str| {
            cli.filter(|value| !value.trim().is_empty())
                .or_else(|| snapshot.var(env_key))
                .or(from_file)
                .unwrap_or(default)
                .to_string()
        };

        let manifest = pick(
            global.manifest.as_deref(),
            MANIFEST_ENV,
            file.manifest.as_deref(),
            DEFAULT_MANIFEST,
        );
        let remote_prefix = pick(
            global.remote_prefix.as_deref(),
            REMOTE_PREFIX_ENV,
            file.remote_prefix.as_deref(),
            DEFAULT_REMOTE_PREFIX,
        );
        let local_prefix = pick(
            global.local_prefix.as_deref(),
            LOCAL_PREFIX_ENV,
            file.local_prefix.as_deref(),
            DEFAULT_LOCAL_PREFIX,
        );
        let gcs_endpoint = pick(
            None,
            GCS_ENDPOINT_ENV,
            file.gcs_endpoint.as_deref(),
            DEFAULT_GCS_ENDPOINT,
        );
        let gcs_token = GCS_TOKEN_ENVS
            .iter()
            .find_map(|key| snapshot.var(key))
            .map(|token| token.trim().to_string());

        Ok(Self {
            manifest: PathBuf::from(manifest),
            remote_prefix,
            local_prefix: PathBuf::from(local_prefix),
            store: StoreConfig {
                gcs_endpoint,
                gcs_token,
            },
            config_file,
        })
    }

    pub fn manifest(&self) -> &Path {
        &self.manifest
    }

    pub fn remote_prefix(&self) -> &str {
        &self.remote_prefix
    }

    pub fn local_prefix(&self) -> &Path {
        &self.local_prefix
    }

    pub fn store(&self) -> &StoreConfig {
        &self.store
    }

    pub fn config_file(&self) -> Option<&Path> {
        self.config_file.as_deref()
    }
}

fn read_config_file(path: &Path) -> Result<FileSettings> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let doc: DocumentMut = contents
        .parse()
        .with_context(|| format!("failed to parse config file {}", path.display()))?;
    let gcs = doc.get("gcs");
    Ok(FileSettings {
        manifest: string_value(doc.get("manifest"), "manifest", path)?,
        remote_prefix: string_value(doc.get("remote_prefix"), "remote_prefix", path)?,
        local_prefix: string_value(doc.get("local_prefix"), "local_prefix", path)?,
        gcs_endpoint: string_value(
            gcs.and_then(|table| table.get("endpoint")),
            "gcs.endpoint",
            path,
        )?,
    })
}

fn string_value(item: Option<&Item>, key: &str, path: &Path) -> Result<Option<String>> {
    match item {
        None => Ok(None),
        Some(item) => match item.as_str() {
            Some(value) => Ok(Some(value.to_string())),
            None => bail!("{key} in {} must be a string", path.display()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn defaults_apply_without_overrides() -> Result<()> {
        let config = Config::from_snapshot(&EnvSnapshot::testing(&[]), &GlobalOptions::default())?;
        assert_eq!(config.manifest(), Path::new(DEFAULT_MANIFEST));
        assert_eq!(config.remote_prefix(), DEFAULT_REMOTE_PREFIX);
        assert_eq!(config.local_prefix(), Path::new(DEFAULT_LOCAL_PREFIX));
        assert_eq!(config.store(), &StoreConfig::default());
        assert!(config.config_file().is_none());
        Ok(())
    }

    #[test]
    fn cli_beats_env_beats_file() -> Result<()> {
        let tmp = tempdir()?;
        let file = tmp.path().join("refdata.toml");
        fs::write(
            &file,
            "manifest = \"file.tsv\"\nremote_prefix = \"gs://file/\"\nlocal_prefix = \"/file\"\n\n[gcs]\nendpoint = \"http://localhost:4443\"\n",
        )?;
        let file_str = file.display().to_string();
        let snapshot = EnvSnapshot::testing(&[
            (CONFIG_ENV, file_str.as_str()),
            (REMOTE_PREFIX_ENV, "gs://env/"),
            (LOCAL_PREFIX_ENV, "/env"),
            ("GOOGLE_OAUTH_ACCESS_TOKEN", "fallback"),
            ("REFDATA_GCS_TOKEN", "primary"),
        ]);
        let global = GlobalOptions {
            local_prefix: Some("/cli".into()),
            ..GlobalOptions::default()
        };
        let config = Config::from_snapshot(&snapshot, &global)?;
        assert_eq!(config.manifest(), Path::new("file.tsv"));
        assert_eq!(config.remote_prefix(), "gs://env/");
        assert_eq!(config.local_prefix(), Path::new("/cli"));
        assert_eq!(config.store().gcs_endpoint, "http://localhost:4443");
        assert_eq!(config.store().gcs_token.as_deref(), Some("primary"));
        assert_eq!(config.config_file(), Some(file.as_path()));
        Ok(())
    }

    #[test]
    fn non_string_config_values_are_rejected() -> Result<()> {
        let tmp = tempdir()?;
        let file = tmp.path().join("refdata.toml");
        fs::write(&file, "manifest = 3\n")?;
        let global = GlobalOptions {
            config: Some(file.display().to_string()),
            ..GlobalOptions::default()
        };
        let err = Config::from_snapshot(&EnvSnapshot::testing(&[]), &global).unwrap_err();
        assert!(err.to_string().contains("must be a string"), "{err}");
        Ok(())
    }

    #[test]
    fn missing_explicit_config_file_is_an_error() {
        let global = GlobalOptions {
            config: Some("/no/such/refdata.toml".into()),
            ..GlobalOptions::default()
        };
        assert!(Config::from_snapshot(&EnvSnapshot::testing(&[]), &global).is_err());
    }
}
