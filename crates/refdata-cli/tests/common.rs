#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::assert::Assert;
use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use serde_json::Value;
use tempfile::TempDir;

const CONFIG_VARS: &[&str] = &[
    "REFDATA_MANIFEST",
    "REFDATA_REMOTE_PREFIX",
    "REFDATA_LOCAL_PREFIX",
    "REFDATA_CONFIG",
    "REFDATA_GCS_ENDPOINT",
    "REFDATA_GCS_TOKEN",
    "GOOGLE_OAUTH_ACCESS_TOKEN",
];

/// A manifest, a directory-backed remote and a local prefix under one
/// temporary directory.
pub struct Sandbox {
    pub temp: TempDir,
    pub manifest: PathBuf,
    pub remote: PathBuf,
    pub local: PathBuf,
}

impl Sandbox {
    pub fn new() -> Self {
        let temp = tempfile::Builder::new()
            .prefix("refdata-cli")
            .tempdir()
            .expect("tempdir");
        let remote = temp.path().join("remote");
        let local = temp.path().join("local");
        fs::create_dir_all(&remote).expect("remote dir");
        fs::create_dir_all(&local).expect("local dir");
        Self {
            manifest: temp.path().join("data-manifest.tsv"),
            remote,
            local,
            temp,
        }
    }

    /// Like [`Sandbox::new`], with the manifest already initialised.
    pub fn initialised() -> Self {
        let sandbox = Self::new();
        sandbox.refdata(&["init"]).assert().success();
        sandbox
    }

    /// `refdata` pointed at this sandbox, with no ambient configuration.
    pub fn refdata(&self, args: &[&str]) -> Command {
        let mut cmd = bare_refdata();
        cmd.current_dir(self.temp.path())
            .arg("--manifest")
            .arg(&self.manifest)
            .arg("--remote-prefix")
            .arg(&self.remote)
            .arg("--local-prefix")
            .arg(&self.local)
            .args(args);
        cmd
    }

    pub fn json(&self, args: &[&str]) -> Command {
        let mut cmd = self.refdata(args);
        cmd.arg("--json");
        cmd
    }

    /// Writes a file outside both prefixes to add from.
    pub fn source(&self, name: &str, contents: &[u8]) -> PathBuf {
        let path = self.temp.path().join("sources").join(name);
        fs::create_dir_all(path.parent().expect("parent")).expect("sources dir");
        fs::write(&path, contents).expect("write source");
        path
    }

    pub fn add(&self, name: &str, contents: &[u8]) -> Assert {
        let source = self.source(&format!("{name}.fa"), contents);
        self.json(&["add", name, path_str(&source)]).assert()
    }

    pub fn manifest_text(&self) -> String {
        fs::read_to_string(&self.manifest).expect("read manifest")
    }
}

pub fn bare_refdata() -> Command {
    let mut cmd = cargo_bin_cmd!("refdata");
    for var in CONFIG_VARS {
        cmd.env_remove(var);
    }
    cmd.env("NO_COLOR", "1");
    cmd
}

pub fn path_str(path: &Path) -> &str {
    path.to_str().expect("utf-8 path")
}

pub fn parse_json(assert: &Assert) -> Value {
    serde_json::from_slice(&assert.get_output().stdout).expect("valid json")
}
