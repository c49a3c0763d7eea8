//! Playback and scene orchestration.
//!
//! The player owns every piece of shared mutable state (the frame cache,
//! the request counter, the playback flags) and applies decode completions
//! on its own thread, so the generation guard is the only serialization the
//! pipeline needs. Navigation mints a token, serves cache hits immediately,
//! and otherwise hands the frame to the decode worker; completions are
//! validated against the guard before they may touch the renderable frame.

use std::sync::Arc;
use std::time::{Duration, Instant};

use cloudseq_formats::{FrameImage, FrameRecord};
use glam::Vec3;

use crate::cache::FrameCache;
use crate::catalog::SceneCatalog;
use crate::decode::{DecodeEvent, DecodePurpose, DecodeRequest, DecodeWorker};
use crate::prefetch::PrefetchScheduler;
use crate::request::RequestGuard;
use crate::sink::{RenderSink, UiSink};
use crate::source::{Encoding, MetadataStore, SceneSource};

/// How long to sleep between wakeups when nothing is scheduled.
const IDLE_POLL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerState {
    Idle,
    LoadingScene,
    LoadingFrame,
    Ready,
}

#[derive(Debug, Clone)]
pub struct PlayerOptions {
    /// Hold time per frame during playback.
    pub frame_delay: Duration,
    /// Lookahead size for the prefetch scheduler.
    pub prefetch_window: u32,
    /// Forced payload encoding; probed per scene when `None`.
    pub encoding: Option<Encoding>,
}

impl Default for PlayerOptions {
    fn default() -> Self {
        Self {
            frame_delay: Duration::from_millis(40),
            prefetch_window: 10,
            encoding: None,
        }
    }
}

pub struct Player<R: RenderSink, U: UiSink> {
    catalog: SceneCatalog,
    source: SceneSource,
    metadata: MetadataStore,
    worker: DecodeWorker,
    cache: FrameCache,
    guard: RequestGuard,
    prefetch: PrefetchScheduler,
    render: R,
    ui: U,
    options: PlayerOptions,
    state: PlayerState,
    scene_index: usize,
    frame_index: u32,
    playing: bool,
    resume_after_load: bool,
    scene_encoding: Encoding,
    mean_target: Option<Vec3>,
    pending_first_frame: bool,
    frames_presented: u64,
    next_advance_at: Option<Instant>,
}

impl<R: RenderSink, U: UiSink> Player<R, U> {
    pub fn new(
        catalog: SceneCatalog,
        source: SceneSource,
        options: PlayerOptions,
        render: R,
        ui: U,
    ) -> Self {
        let worker = DecodeWorker::spawn(source.clone());
        Self {
            catalog,
            metadata: MetadataStore::new(source.clone()),
            source,
            worker,
            cache: FrameCache::default(),
            guard: RequestGuard::default(),
            prefetch: PrefetchScheduler::default(),
            render,
            ui,
            options,
            state: PlayerState::Idle,
            scene_index: 0,
            frame_index: 0,
            playing: false,
            resume_after_load: false,
            scene_encoding: Encoding::Packed,
            mean_target: None,
            pending_first_frame: false,
            frames_presented: 0,
            next_advance_at: None,
        }
    }

    pub fn state(&self) -> PlayerState {
        self.state
    }

    pub fn current_scene(&self) -> &str {
        self.catalog.name(self.scene_index)
    }

    pub fn current_frame(&self) -> u32 {
        self.frame_index
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Frames actually handed to the render sink so far.
    pub fn frames_presented(&self) -> u64 {
        self.frames_presented
    }

    /// Enter the first scene; playback starts once its first frame is ready.
    pub fn start(&mut self, autoplay: bool) {
        self.resume_after_load = autoplay;
        self.enter_scene(0);
    }

    /// Switch scenes, preserving the playing state across the load.
    pub fn switch_scene(&mut self, index: usize) {
        self.resume_after_load = self.playing;
        self.enter_scene(index);
    }

    pub fn next_scene(&mut self) {
        self.switch_scene(self.catalog.next_index(self.scene_index));
    }

    pub fn previous_scene(&mut self) {
        self.switch_scene(self.catalog.previous_index(self.scene_index));
    }

    /// User-driven navigation to a frame of the current scene; pauses
    /// playback the way a timeline drag does.
    pub fn scrub(&mut self, frame: u32) {
        self.set_playing(false);
        self.show_frame(frame);
    }

    pub fn toggle_playing(&mut self) {
        self.set_playing(!self.playing);
    }

    pub fn set_playing(&mut self, playing: bool) {
        if self.playing == playing {
            return;
        }
        self.playing = playing;
        self.ui.set_playing(playing);
        if playing {
            self.next_advance_at = Some(Instant::now());
            self.schedule_prefetch();
        } else {
            self.next_advance_at = None;
        }
    }

    fn enter_scene(&mut self, index: usize) {
        self.guard.begin();
        self.set_playing(false);
        self.state = PlayerState::LoadingScene;
        self.scene_index = index;
        self.frame_index = 0;
        self.mean_target = None;
        self.pending_first_frame = true;
        self.ui.set_loading(true);
        self.ui.set_controls_enabled(false);

        let scene = self.catalog.name(index).to_string();
        let metadata = match self.metadata.resolve(&scene) {
            Ok(metadata) => metadata,
            Err(err) => {
                // Fatal for this scene: overlay stays engaged, controls stay
                // disabled, and the player waits for explicit navigation.
                log::error!("failed to enter scene '{scene}': {err}");
                return;
            }
        };
        self.scene_encoding = match self.options.encoding {
            Some(encoding) => encoding,
            None => self.source.probe_encoding(&scene),
        };
        log::info!(
            "entering scene '{scene}' ({} frames, {} encoding)",
            metadata.frame_count,
            self.scene_encoding
        );
        self.cache.ensure_capacity(&scene, metadata.frame_count);
        self.ui.set_frame_bounds(metadata.frame_count - 1);
        self.show_frame(0);
    }

    fn show_frame(&mut self, frame: u32) {
        let token = self.guard.begin();
        let scene = self.catalog.name(self.scene_index).to_string();
        let metadata = match self.metadata.resolve(&scene) {
            Ok(metadata) => metadata,
            Err(err) => {
                log::error!("cannot show frame {frame} of scene '{scene}': {err}");
                return;
            }
        };
        self.cache.ensure_capacity(&scene, metadata.frame_count);

        self.frame_index = frame.min(metadata.frame_count - 1);
        self.ui.set_frame(self.frame_index);

        if let Some(record) = self.cache.record(&scene, self.frame_index) {
            let image = self.cache.image(&scene, self.frame_index);
            self.present(record, image);
        } else {
            self.state = PlayerState::LoadingFrame;
            self.prefetch.mark_in_flight(&scene, self.frame_index);
            self.worker.submit(DecodeRequest {
                scene,
                frame: self.frame_index,
                encoding: self.scene_encoding,
                metadata,
                token,
                purpose: DecodePurpose::Navigate,
            });
        }
    }

    /// Apply one decode completion. The cache write is keyed and write-once,
    /// so it is safe even for a superseded request; everything else is gated
    /// on the token still being current.
    pub(crate) fn handle_event(&mut self, event: DecodeEvent) {
        self.prefetch.complete(&event.scene, event.frame);

        let mut cached_record = None;
        let mut cached_image = None;
        if let Some(payload) = event.payload {
            if self.cache.has_scene(&event.scene) {
                self.cache
                    .insert_record(&event.scene, event.frame, Arc::new(payload.record));
                if let Some(image) = payload.image {
                    self.cache
                        .insert_image(&event.scene, event.frame, Arc::new(image));
                }
                // Read back the canonical slots so racing completions for the
                // same frame present identical data.
                cached_record = self.cache.record(&event.scene, event.frame);
                cached_image = self.cache.image(&event.scene, event.frame);
            }
        }

        if !self.guard.is_current(event.token) {
            return;
        }
        if event.purpose == DecodePurpose::Prefetch {
            return;
        }
        if self.state != PlayerState::LoadingFrame {
            return;
        }
        if event.scene != self.catalog.name(self.scene_index) || event.frame != self.frame_index {
            return;
        }

        match cached_record {
            Some(record) => self.present(record, cached_image),
            None => {
                // Degraded frame: nothing to show, keep the timeline moving.
                self.render.clear_point_cloud();
                self.state = PlayerState::Ready;
                self.finish_presentation();
            }
        }
    }

    fn present(&mut self, record: Arc<FrameRecord>, image: Option<Arc<FrameImage>>) {
        if self.mean_target.is_none() {
            self.mean_target = centroid(&record.positions);
        }
        if let Some(target) = self.mean_target {
            self.render.set_camera_target(target);
        }
        self.render
            .set_point_cloud(&record.positions, record.colors.as_deref());
        if let Some(image) = image.as_deref() {
            self.render.render_image(image);
        }
        self.frames_presented += 1;
        self.state = PlayerState::Ready;
        self.finish_presentation();
    }

    fn finish_presentation(&mut self) {
        if self.pending_first_frame {
            self.pending_first_frame = false;
            self.ui.set_loading(false);
            self.ui.set_controls_enabled(true);
            if self.resume_after_load {
                self.resume_after_load = false;
                self.set_playing(true);
            }
        }
        if self.playing {
            self.next_advance_at = Some(Instant::now() + self.options.frame_delay);
            self.schedule_prefetch();
        }
    }

    fn advance(&mut self) {
        let scene = self.catalog.name(self.scene_index);
        let Some(metadata) = self.metadata.cached(scene) else {
            return;
        };
        if self.frame_index < metadata.frame_count - 1 {
            let next = self.frame_index + 1;
            self.show_frame(next);
        } else {
            // Last frame: wrap to the next scene and keep playing.
            self.next_scene();
        }
    }

    fn schedule_prefetch(&mut self) {
        if !self.playing || self.options.prefetch_window == 0 {
            return;
        }
        let scene = self.catalog.name(self.scene_index).to_string();
        let Some(metadata) = self.metadata.cached(&scene) else {
            return;
        };
        let token = self.guard.current();
        let cache = &self.cache;
        let planned = self.prefetch.plan(
            &scene,
            self.frame_index,
            self.options.prefetch_window,
            metadata.frame_count,
            |frame| cache.contains(&scene, frame),
        );
        for frame in planned {
            self.worker.submit(DecodeRequest {
                scene: scene.clone(),
                frame,
                encoding: self.scene_encoding,
                metadata: metadata.clone(),
                token,
                purpose: DecodePurpose::Prefetch,
            });
        }
    }

    /// Drain decode completions and drive the playback clock once.
    pub fn pump(&mut self) {
        while let Some(event) = self.worker.try_recv() {
            self.handle_event(event);
        }
        if self.playing && self.state == PlayerState::Ready {
            if let Some(at) = self.next_advance_at {
                if Instant::now() >= at {
                    self.next_advance_at = None;
                    self.advance();
                }
            }
        }
    }

    /// Run the playback loop, blocking between completions and frame
    /// deadlines. Returns once `max_frames` frames have been presented;
    /// plays forever when no limit is given.
    pub fn run(&mut self, max_frames: Option<u64>) {
        loop {
            self.pump();
            if let Some(limit) = max_frames {
                if self.frames_presented >= limit {
                    return;
                }
            }
            let wait = match self.next_advance_at {
                Some(at) => at.saturating_duration_since(Instant::now()),
                None => IDLE_POLL,
            };
            if let Some(event) = self.worker.recv_timeout(wait.max(Duration::from_millis(1))) {
                self.handle_event(event);
            }
        }
    }
}

fn centroid(positions: &[f32]) -> Option<Vec3> {
    if positions.is_empty() {
        return None;
    }
    let mut sum = Vec3::ZERO;
    for triple in positions.chunks_exact(3) {
        sum += Vec3::new(triple[0], triple[1], triple[2]);
    }
    Some(sum / (positions.len() / 3) as f32)
}
