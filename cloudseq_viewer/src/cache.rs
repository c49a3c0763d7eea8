//! Write-once cache of decoded frames, keyed by `(scene, frame)`.
//!
//! One slot vector per scene, sized to the descriptor's frame count when the
//! scene is first entered. Slots are grow-only for the session and never
//! overwritten: when racing decodes complete for the same frame, the first
//! writer wins and later completions are discarded.

use std::collections::HashMap;
use std::sync::Arc;

use cloudseq_formats::{FrameImage, FrameRecord};

#[derive(Debug, Default)]
pub struct FrameCache {
    records: HashMap<String, Vec<Option<Arc<FrameRecord>>>>,
    images: HashMap<String, Vec<Option<Arc<FrameImage>>>>,
}

impl FrameCache {
    /// Lazily allocate a scene's slot vectors. Idempotent; the length is
    /// fixed by the first call.
    pub fn ensure_capacity(&mut self, scene: &str, frame_count: u32) {
        self.records
            .entry(scene.to_string())
            .or_insert_with(|| vec![None; frame_count as usize]);
        self.images
            .entry(scene.to_string())
            .or_insert_with(|| vec![None; frame_count as usize]);
    }

    pub fn has_scene(&self, scene: &str) -> bool {
        self.records.contains_key(scene)
    }

    pub fn record(&self, scene: &str, frame: u32) -> Option<Arc<FrameRecord>> {
        self.records
            .get(scene)
            .and_then(|slots| slots.get(frame as usize))
            .and_then(|slot| slot.clone())
    }

    pub fn image(&self, scene: &str, frame: u32) -> Option<Arc<FrameImage>> {
        self.images
            .get(scene)
            .and_then(|slots| slots.get(frame as usize))
            .and_then(|slot| slot.clone())
    }

    pub fn contains(&self, scene: &str, frame: u32) -> bool {
        self.record(scene, frame).is_some()
    }

    /// Write-once insert. Returns false (and leaves the slot untouched) when
    /// the slot is already filled, the scene is unallocated, or the frame is
    /// out of range.
    pub fn insert_record(&mut self, scene: &str, frame: u32, record: Arc<FrameRecord>) -> bool {
        insert_once(&mut self.records, scene, frame, record)
    }

    /// Write-once insert for the displayable raster, same rules as
    /// [`insert_record`](Self::insert_record).
    pub fn insert_image(&mut self, scene: &str, frame: u32, image: Arc<FrameImage>) -> bool {
        insert_once(&mut self.images, scene, frame, image)
    }
}

fn insert_once<T>(
    store: &mut HashMap<String, Vec<Option<Arc<T>>>>,
    scene: &str,
    frame: u32,
    value: Arc<T>,
) -> bool {
    let Some(slots) = store.get_mut(scene) else {
        return false;
    };
    let Some(slot) = slots.get_mut(frame as usize) else {
        return false;
    };
    if slot.is_some() {
        return false;
    }
    *slot = Some(value);
    true
}
