//! Scene discovery across the dataset root.

use std::path::Path;

use anyhow::Result;
use walkdir::WalkDir;

/// Directory under the dataset root that holds one subdirectory per scene.
pub const POINTCLOUD_DIR: &str = "pointclouds";

/// Ordered list of playable scene names.
#[derive(Debug, Clone, Default)]
pub struct SceneCatalog {
    scenes: Vec<String>,
}

impl SceneCatalog {
    /// Collect every scene directory under `<root>/pointclouds/` that
    /// carries a `metadata.txt` descriptor, sorted by name.
    pub fn discover(root: &Path) -> Result<Self> {
        let base = root.join(POINTCLOUD_DIR);
        let mut scenes = Vec::new();
        if base.is_dir() {
            for entry in WalkDir::new(&base).min_depth(1).max_depth(1) {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(err) => {
                        log::warn!("failed to traverse {}: {err}", base.display());
                        continue;
                    }
                };
                if !entry.file_type().is_dir() {
                    continue;
                }
                if !entry.path().join("metadata.txt").is_file() {
                    continue;
                }
                if let Some(name) = entry.file_name().to_str() {
                    scenes.push(name.to_string());
                }
            }
        }
        scenes.sort();
        Ok(Self { scenes })
    }

    /// Build a catalog from an explicit, already-ordered scene list.
    pub fn from_names(scenes: Vec<String>) -> Self {
        Self { scenes }
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    pub fn name(&self, index: usize) -> &str {
        &self.scenes[index]
    }

    pub fn names(&self) -> &[String] {
        &self.scenes
    }

    /// Index of the scene after `index`, wrapping circularly.
    pub fn next_index(&self, index: usize) -> usize {
        (index + 1) % self.scenes.len()
    }

    /// Index of the scene before `index`, wrapping circularly.
    pub fn previous_index(&self, index: usize) -> usize {
        (index + self.scenes.len() - 1) % self.scenes.len()
    }
}
