use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result, anyhow, bail};
use chrono::{DateTime, TimeZone, Utc};
use vergen_gitcl::{Emitter, GitclBuilder};

const LIBRARY: &str = "dlis";

fn main() -> Result<()> {
    let root = PathBuf::from(env::var("CARGO_MANIFEST_DIR")?);
    let library_manifest = root.join(LIBRARY).join("Cargo.toml");

    emit_git_describe()?;

    let built = build_time(env::var("SOURCE_DATE_EPOCH").ok().as_deref())?;
    println!(
        "cargo:rustc-env=BUILD_TIMESTAMP={}",
        built.format("%Y-%m-%d %H:%M:%S UTC")
    );

    let version = library_version(&root.join("Cargo.toml"))
        .or_else(|e| {
            println!("cargo:warning=cargo metadata unavailable ({e}), reading {LIBRARY} manifest");
            manifest_version(&fs::read_to_string(&library_manifest)?)
        })
        .unwrap_or_else(|_| "unknown".to_string());
    println!("cargo:rustc-env=DLIS_VERSION={version}");

    println!("cargo:rerun-if-changed={}", library_manifest.display());
    println!("cargo:rerun-if-env-changed=SOURCE_DATE_EPOCH");
    Ok(())
}

/// `VERGEN_GIT_DESCRIBE`, or the idempotent placeholder outside a git checkout.
fn emit_git_describe() -> Result<()> {
    let gitcl = GitclBuilder::default()
        .describe(true, true, Some("[0-9]*"))
        .build()?;

    let emitted = Emitter::default()
        .idempotent()
        .fail_on_error()
        .add_instructions(&gitcl)
        .and_then(|emitter| emitter.emit());

    if let Err(e) = emitted {
        println!("cargo:warning=git describe unavailable: {e}");
        Emitter::default().idempotent().emit()?;
    }
    Ok(())
}

/// Reproducible builds pin the timestamp through `SOURCE_DATE_EPOCH`.
fn build_time(source_date_epoch: Option<&str>) -> Result<DateTime<Utc>> {
    let Some(epoch) = source_date_epoch else {
        return Ok(Utc::now());
    };
    let seconds = epoch
        .trim()
        .parse::<i64>()
        .with_context(|| format!("SOURCE_DATE_EPOCH is not an integer: {epoch}"))?;
    Utc.timestamp_opt(seconds, 0)
        .single()
        .ok_or_else(|| anyhow!("SOURCE_DATE_EPOCH out of range: {epoch}"))
}

/// Version of the library package as cargo resolves it in this workspace.
fn library_version(workspace_manifest: &Path) -> Result<String> {
    let cargo = env::var_os("CARGO").unwrap_or_else(|| "cargo".into());
    let output = Command::new(cargo)
        .args(["metadata", "--no-deps", "--format-version", "1", "--manifest-path"])
        .arg(workspace_manifest)
        .output()?;
    if !output.status.success() {
        bail!("{}", String::from_utf8_lossy(&output.stderr).trim());
    }

    let metadata: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    metadata["packages"]
        .as_array()
        .into_iter()
        .flatten()
        .find(|package| package["name"] == LIBRARY)
        .and_then(|package| package["version"].as_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow!("no {LIBRARY} package in workspace metadata"))
}

/// `version` key of the `[package]` table of a manifest.
fn manifest_version(manifest: &str) -> Result<String> {
    let mut in_package = false;
    for line in manifest.lines().map(str::trim) {
        if line.starts_with('[') {
            in_package = line == "[package]";
            continue;
        }
        if !in_package {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            if key.trim() == "version" {
                return Ok(value.trim().trim_matches(['"', '\'']).to_string());
            }
        }
    }
    bail!("no [package] version")
}
