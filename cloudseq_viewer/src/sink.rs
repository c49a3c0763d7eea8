//! Collaborator interfaces the player drives.
//!
//! Rendering and widget toolkits live outside the core: the player hands a
//! finalized buffer pair or bitmap across these seams and never inspects how
//! they are displayed. The shipped implementations narrate through the log
//! for headless runs.

use cloudseq_formats::FrameImage;
use glam::Vec3;

/// Point-cloud renderer collaborator.
pub trait RenderSink {
    /// Display a finalized frame. `colors` matches `positions` in length
    /// when present.
    fn set_point_cloud(&mut self, positions: &[f32], colors: Option<&[f32]>);
    /// Remove the current point cloud (degraded frame).
    fn clear_point_cloud(&mut self);
    fn set_camera_target(&mut self, target: Vec3);
    /// Display the side-by-side raster for the current frame.
    fn render_image(&mut self, image: &FrameImage);
}

/// Timeline/controls collaborator; all signals are one-way outputs.
pub trait UiSink {
    fn set_frame_bounds(&mut self, max_frame: u32);
    fn set_frame(&mut self, frame: u32);
    fn set_controls_enabled(&mut self, enabled: bool);
    fn set_playing(&mut self, playing: bool);
    fn set_loading(&mut self, loading: bool);
}

/// Headless renderer that reports what it would draw.
#[derive(Debug, Default)]
pub struct LogRenderSink {
    pub frames_drawn: u64,
}

impl RenderSink for LogRenderSink {
    fn set_point_cloud(&mut self, positions: &[f32], colors: Option<&[f32]>) {
        self.frames_drawn += 1;
        log::info!(
            "point cloud: {} points ({})",
            positions.len() / 3,
            if colors.is_some() {
                "colored"
            } else {
                "uncolored"
            }
        );
    }

    fn clear_point_cloud(&mut self) {
        log::info!("point cloud cleared");
    }

    fn set_camera_target(&mut self, target: Vec3) {
        log::info!(
            "camera target ({:.3}, {:.3}, {:.3})",
            target.x,
            target.y,
            target.z
        );
    }

    fn render_image(&mut self, image: &FrameImage) {
        log::debug!("raster frame {}x{}", image.width, image.height);
    }
}

/// Headless timeline that reports control-state changes.
#[derive(Debug, Default)]
pub struct LogUiSink;

impl UiSink for LogUiSink {
    fn set_frame_bounds(&mut self, max_frame: u32) {
        log::debug!("timeline bounds 0..={max_frame}");
    }

    fn set_frame(&mut self, frame: u32) {
        log::debug!("time: {frame}");
    }

    fn set_controls_enabled(&mut self, enabled: bool) {
        log::debug!("controls {}", if enabled { "enabled" } else { "disabled" });
    }

    fn set_playing(&mut self, playing: bool) {
        log::debug!("{}", if playing { "playing" } else { "paused" });
    }

    fn set_loading(&mut self, loading: bool) {
        log::debug!("loading overlay {}", if loading { "on" } else { "off" });
    }
}
