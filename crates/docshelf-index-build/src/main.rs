//! Builds the precomputed search index artifact for a content directory.
//!
//! Walks the docs tree, collects every markdown page except the sidebar
//! manifest, and writes `search-index.json` mapping each page's relative
//! path to its lowercased full text. The runtime indexer produces the same
//! map over the network; shipping this artifact lets consumers seed the
//! index without the initial fetch storm.
//!
//! Usage: `docshelf-index-build [docs-dir]` (default `public/docs`).

use anyhow::{Context, Result};
use docshelf_core::artifact;
use docshelf_core::Config;
use std::path::PathBuf;

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let config = Config::load().context("Failed to load configuration")?;

    let docs_dir = std::env::args()
        .nth(1)
        .map_or_else(|| config.source.local_root.clone(), PathBuf::from);
    if !docs_dir.is_dir() {
        anyhow::bail!("Docs directory not found: {}", docs_dir.display());
    }

    let output = docs_dir.join(&config.index.artifact_file);
    let count = artifact::write_index_artifact(&docs_dir, &config.source.manifest_file, &output)
        .with_context(|| format!("Failed to build index under {}", docs_dir.display()))?;

    println!(
        "Indexed {count} documents from {} into {}",
        docs_dir.display(),
        output.display()
    );

    Ok(())
}
