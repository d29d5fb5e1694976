//! Build-time search index artifact.
//!
//! The artifact is a JSON object mapping each content page's relative path
//! to its lowercased full text — a precomputed, at-rest version of the same
//! index the runtime indexer builds over the network. Consumers may seed
//! the store from it when available and skip the initial fetch storm.

use crate::{Error, Result};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Builds the index map by walking `docs_dir` recursively.
///
/// Every `.md` file is included except the manifest itself (matched by file
/// name at any depth). Keys are `/`-separated paths relative to `docs_dir`;
/// the map is ordered so the serialized artifact is deterministic.
pub fn build_index_artifact(docs_dir: &Path, manifest_file: &str) -> Result<BTreeMap<String, String>> {
    let mut index = BTreeMap::new();
    collect(docs_dir, docs_dir, manifest_file, &mut index)?;
    Ok(index)
}

fn collect(
    root: &Path,
    dir: &Path,
    manifest_file: &str,
    index: &mut BTreeMap<String, String>,
) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();

        if path.is_dir() {
            collect(root, &path, manifest_file, index)?;
            continue;
        }

        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !name.ends_with(".md") || name == manifest_file {
            continue;
        }

        let content = fs::read_to_string(&path)?;
        let relative = path
            .strip_prefix(root)
            .map_err(|e| Error::Index(format!("Path outside docs root: {e}")))?
            .to_string_lossy()
            .replace('\\', "/");

        debug!("Indexed {relative} ({} bytes)", content.len());
        index.insert(relative, content.to_lowercase());
    }
    Ok(())
}

/// Walks `docs_dir` and writes the artifact to `output`. Returns the number
/// of indexed pages.
pub fn write_index_artifact(docs_dir: &Path, manifest_file: &str, output: &Path) -> Result<usize> {
    let index = build_index_artifact(docs_dir, manifest_file)?;
    let json = serde_json::to_string(&index)?;
    fs::write(output, json)?;
    Ok(index.len())
}

/// Loads a previously written artifact.
pub fn load_index_artifact(path: &Path) -> Result<BTreeMap<String, String>> {
    let content = fs::read_to_string(path)
        .map_err(|e| Error::Index(format!("Cannot read index artifact: {e}")))?;
    serde_json::from_str(&content)
        .map_err(|e| Error::Index(format!("Cannot parse index artifact: {e}")))
}
