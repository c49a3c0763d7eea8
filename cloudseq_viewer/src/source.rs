//! Dataset access: scene descriptors, frame payloads, and encoding probes.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::{fmt, fs};

use cloudseq_formats::SceneMetadata;
use thiserror::Error;

use crate::catalog::POINTCLOUD_DIR;

/// Scene descriptor failures; fatal to entering the scene.
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("scene '{0}' has no metadata descriptor")]
    Missing(String),
    #[error("failed to read metadata for scene '{scene}'")]
    Unreadable {
        scene: String,
        #[source]
        source: io::Error,
    },
    #[error("malformed metadata for scene '{scene}': {reason}")]
    Malformed { scene: String, reason: String },
}

/// Per-frame failures; non-fatal, the frame degrades to an empty display.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("missing frame resource {0}")]
    MissingResource(PathBuf),
    #[error("failed to read frame resource {path}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("malformed payload for frame {frame} of scene '{scene}': {reason}")]
    MalformedPayload {
        scene: String,
        frame: u32,
        reason: String,
    },
}

/// Payload encoding used by a scene's frame files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// Legacy `.bin` payloads: LE u16 position triples + u8 color triples.
    Raw,
    /// Current `.png` payloads: 16-bit position raster + RGBA color raster.
    Packed,
}

impl Encoding {
    fn extension(self) -> &'static str {
        match self {
            Encoding::Raw => "bin",
            Encoding::Packed => "png",
        }
    }

    pub fn position_file(self, frame: u32) -> String {
        format!("pointcloud_{frame:05}.{}", self.extension())
    }

    pub fn color_file(self, frame: u32) -> String {
        format!("rgb_{frame:05}.{}", self.extension())
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Encoding::Raw => write!(f, "raw"),
            Encoding::Packed => write!(f, "packed"),
        }
    }
}

/// Read access to a `pointclouds/` dataset on disk.
#[derive(Debug, Clone)]
pub struct SceneSource {
    root: PathBuf,
}

impl SceneSource {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn scene_dir(&self, scene: &str) -> PathBuf {
        self.root.join(POINTCLOUD_DIR).join(scene)
    }

    /// Read and parse a scene descriptor. Callers memoize via [`MetadataStore`].
    pub fn read_metadata(&self, scene: &str) -> Result<SceneMetadata, MetadataError> {
        let path = self.scene_dir(scene).join("metadata.txt");
        let text = fs::read_to_string(&path).map_err(|err| {
            if err.kind() == io::ErrorKind::NotFound {
                MetadataError::Missing(scene.to_string())
            } else {
                MetadataError::Unreadable {
                    scene: scene.to_string(),
                    source: err,
                }
            }
        })?;
        SceneMetadata::parse(&text).map_err(|err| MetadataError::Malformed {
            scene: scene.to_string(),
            reason: format!("{err:#}"),
        })
    }

    /// Read one frame's position and color payloads.
    pub fn read_frame_payloads(
        &self,
        scene: &str,
        frame: u32,
        encoding: Encoding,
    ) -> Result<(Vec<u8>, Vec<u8>), FrameError> {
        let dir = self.scene_dir(scene);
        let positions = read_payload(&dir.join(encoding.position_file(frame)))?;
        let colors = read_payload(&dir.join(encoding.color_file(frame)))?;
        Ok((positions, colors))
    }

    /// Pick a scene's encoding by probing frame 0. Packed wins when both
    /// variants are present; a scene with neither defaults to packed so the
    /// per-frame degraded path reports the missing resources.
    pub fn probe_encoding(&self, scene: &str) -> Encoding {
        let dir = self.scene_dir(scene);
        if dir.join(Encoding::Packed.position_file(0)).is_file() {
            Encoding::Packed
        } else if dir.join(Encoding::Raw.position_file(0)).is_file() {
            Encoding::Raw
        } else {
            Encoding::Packed
        }
    }
}

fn read_payload(path: &Path) -> Result<Vec<u8>, FrameError> {
    fs::read(path).map_err(|err| {
        if err.kind() == io::ErrorKind::NotFound {
            FrameError::MissingResource(path.to_path_buf())
        } else {
            FrameError::Unreadable {
                path: path.to_path_buf(),
                source: err,
            }
        }
    })
}

/// Memoizing metadata resolver: one read per scene per session.
#[derive(Debug)]
pub struct MetadataStore {
    source: SceneSource,
    resolved: HashMap<String, Arc<SceneMetadata>>,
}

impl MetadataStore {
    pub fn new(source: SceneSource) -> Self {
        Self {
            source,
            resolved: HashMap::new(),
        }
    }

    /// Resolve a scene descriptor, reusing the memoized value when present.
    pub fn resolve(&mut self, scene: &str) -> Result<Arc<SceneMetadata>, MetadataError> {
        if let Some(metadata) = self.resolved.get(scene) {
            return Ok(metadata.clone());
        }
        let metadata = Arc::new(self.source.read_metadata(scene)?);
        self.resolved
            .insert(scene.to_string(), metadata.clone());
        Ok(metadata)
    }

    /// Already-resolved descriptor, if any; never touches the disk.
    pub fn cached(&self, scene: &str) -> Option<Arc<SceneMetadata>> {
        self.resolved.get(scene).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_scene(root: &Path, scene: &str, descriptor: &str) {
        let dir = root.join(POINTCLOUD_DIR).join(scene);
        fs::create_dir_all(&dir).expect("scene dir");
        fs::write(dir.join("metadata.txt"), descriptor).expect("descriptor");
    }

    #[test]
    fn resolve_memoizes_per_scene() {
        let root = tempfile::tempdir().expect("temp dir");
        write_scene(root.path(), "lab", "4\n0 0 0\n1 1 1\n");

        let mut store = MetadataStore::new(SceneSource::new(root.path().to_path_buf()));
        let first = store.resolve("lab").expect("first resolve");
        assert_eq!(first.frame_count, 4);

        // Corrupt the descriptor on disk; the memoized value must survive.
        write_scene(root.path(), "lab", "garbage");
        let second = store.resolve("lab").expect("memoized resolve");
        assert!(Arc::ptr_eq(&first, &second));
        assert!(store.cached("lab").is_some());
    }

    #[test]
    fn missing_descriptor_is_typed() {
        let root = tempfile::tempdir().expect("temp dir");
        let mut store = MetadataStore::new(SceneSource::new(root.path().to_path_buf()));
        let err = store.resolve("ghost").expect_err("must fail");
        assert!(matches!(err, MetadataError::Missing(name) if name == "ghost"));
    }

    #[test]
    fn malformed_descriptor_is_typed() {
        let root = tempfile::tempdir().expect("temp dir");
        write_scene(root.path(), "bad", "not-a-count\n0 0 0\n1 1 1\n");
        let mut store = MetadataStore::new(SceneSource::new(root.path().to_path_buf()));
        let err = store.resolve("bad").expect_err("must fail");
        assert!(matches!(err, MetadataError::Malformed { .. }));
    }

    #[test]
    fn frame_payload_paths_are_zero_padded() {
        assert_eq!(Encoding::Raw.position_file(7), "pointcloud_00007.bin");
        assert_eq!(Encoding::Packed.color_file(123), "rgb_00123.png");
    }

    #[test]
    fn missing_frame_resource_is_typed() {
        let root = tempfile::tempdir().expect("temp dir");
        write_scene(root.path(), "lab", "4\n0 0 0\n1 1 1\n");
        let source = SceneSource::new(root.path().to_path_buf());
        let err = source
            .read_frame_payloads("lab", 0, Encoding::Raw)
            .expect_err("must fail");
        assert!(matches!(err, FrameError::MissingResource(_)));
    }

    #[test]
    fn probe_prefers_packed_over_raw() {
        let root = tempfile::tempdir().expect("temp dir");
        write_scene(root.path(), "lab", "1\n0 0 0\n1 1 1\n");
        let dir = root.path().join(POINTCLOUD_DIR).join("lab");
        fs::write(dir.join("pointcloud_00000.bin"), b"").expect("raw file");

        let source = SceneSource::new(root.path().to_path_buf());
        assert_eq!(source.probe_encoding("lab"), Encoding::Raw);

        fs::write(dir.join("pointcloud_00000.png"), b"").expect("packed file");
        assert_eq!(source.probe_encoding("lab"), Encoding::Packed);
    }
}
