//! Reproducibility bundles: input copy, result, metadata and a sha256 manifest.

use anyhow::Result;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Serialize)]
pub struct BundleMeta {
    pub tool: String,
    pub tool_version: String,
    pub created_unix_ms: u128,
    pub command: String,
    pub args: serde_json::Value,
    pub input: BundleInputMeta,
}

#[derive(Debug, Clone, Serialize)]
pub struct BundleInputMeta {
    pub original_path: String,
    pub bundled_as: String,
    pub sha256: String,
    pub bytes: u64,
}

#[derive(Debug, Clone, Serialize)]
struct Manifest {
    bundle_version: u32,
    files: Vec<ManifestFile>,
}

#[derive(Debug, Clone, Serialize)]
struct ManifestFile {
    path: String,
    bytes: u64,
    sha256: String,
}

fn sha256_hex(bytes: &[u8]) -> String {
    Sha256::digest(bytes).iter().map(|b| format!("{b:02x}")).collect()
}

fn manifest_entry(bundle_dir: &Path, rel: &str) -> Result<ManifestFile> {
    let bytes = std::fs::read(bundle_dir.join(rel))?;
    Ok(ManifestFile {
        path: rel.to_string(),
        bytes: bytes.len() as u64,
        sha256: sha256_hex(&bytes),
    })
}

fn ensure_empty_dir(dir: &Path) -> Result<()> {
    if dir.exists() {
        if !dir.is_dir() {
            anyhow::bail!("bundle path exists but is not a directory: {}", dir.display());
        }
        if dir.read_dir()?.next().is_some() {
            anyhow::bail!("bundle directory must be empty: {}", dir.display());
        }
    } else {
        std::fs::create_dir_all(dir)?;
    }
    Ok(())
}

/// Write `meta.json`, `inputs/<input file>`, `outputs/result.json` and
/// `manifest.json` into an empty (or new) directory.
pub fn write_bundle(
    bundle_dir: &Path,
    command: &str,
    args: serde_json::Value,
    input_path: &Path,
    output_value: &serde_json::Value,
) -> Result<()> {
    ensure_empty_dir(bundle_dir)?;
    std::fs::create_dir_all(bundle_dir.join("inputs"))?;
    std::fs::create_dir_all(bundle_dir.join("outputs"))?;

    let input_bytes = std::fs::read(input_path)?;
    let file_name = input_path
        .file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .unwrap_or_else(|| "input".to_string());
    let input_rel = format!("inputs/{file_name}");
    std::fs::write(bundle_dir.join(&input_rel), &input_bytes)?;

    let meta = BundleMeta {
        tool: "fdratio".to_string(),
        tool_version: fdr_core::VERSION.to_string(),
        created_unix_ms: SystemTime::now().duration_since(UNIX_EPOCH)?.as_millis(),
        command: command.to_string(),
        args,
        input: BundleInputMeta {
            original_path: input_path.display().to_string(),
            bundled_as: input_rel.clone(),
            sha256: sha256_hex(&input_bytes),
            bytes: input_bytes.len() as u64,
        },
    };
    std::fs::write(bundle_dir.join("meta.json"), serde_json::to_string_pretty(&meta)?)?;
    std::fs::write(
        bundle_dir.join("outputs/result.json"),
        serde_json::to_string_pretty(output_value)?,
    )?;

    let files = ["meta.json", input_rel.as_str(), "outputs/result.json"]
        .into_iter()
        .map(|rel| manifest_entry(bundle_dir, rel))
        .collect::<Result<Vec<_>>>()?;
    let manifest = Manifest { bundle_version: 1, files };
    std::fs::write(bundle_dir.join("manifest.json"), serde_json::to_string_pretty(&manifest)?)?;

    tracing::info!(dir = %bundle_dir.display(), "bundle written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_of_empty_input() {
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
