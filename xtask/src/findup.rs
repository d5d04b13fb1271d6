use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};

fn find_upwards(start: &Path, filename: &str) -> Option<PathBuf> {
    let mut dir = if start.is_dir() {
        start.to_path_buf()
    } else {
        start.parent().unwrap_or(start).to_path_buf()
    };

    loop {
        let candidate = dir.join(filename);
        if candidate.exists() {
            return Some(candidate);
        }

        if !dir.pop() {
            break;
        }
    }

    None
}

/// Directory holding the workspace's `sweep.yaml`, searched from the current
/// directory and then from this crate's manifest directory.
pub fn workspace_root() -> Result<PathBuf> {
    let start = std::env::current_dir()?;
    let marker = find_upwards(&start, "sweep.yaml")
        .or_else(|| find_upwards(Path::new(env!("CARGO_MANIFEST_DIR")), "sweep.yaml"))
        .ok_or_else(|| anyhow!("sweep.yaml not found (run from within the repo or pass --config)"))?;

    Ok(marker.parent().unwrap_or(marker.as_path()).to_path_buf())
}
