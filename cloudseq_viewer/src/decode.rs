//! Background fetch+decode worker.
//!
//! One named worker thread services decode requests in order and reports
//! completions back over a channel. The worker owns nothing shared: the
//! controller applies every completion on its own thread, so guard checks
//! and cache writes stay serialized. A failed frame is reported as an empty
//! completion rather than an error; playback degrades instead of aborting.

use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::thread;
use std::time::Duration;

use cloudseq_formats::{
    FrameImage, FrameRecord, SceneMetadata, decode_packed_frame, decode_raw_frame,
};

use crate::request::RequestToken;
use crate::source::{Encoding, FrameError, SceneSource};

/// Why a decode was issued. Prefetch completions only warm the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodePurpose {
    Navigate,
    Prefetch,
}

#[derive(Debug)]
pub struct DecodeRequest {
    pub scene: String,
    pub frame: u32,
    pub encoding: Encoding,
    pub metadata: Arc<SceneMetadata>,
    pub token: RequestToken,
    pub purpose: DecodePurpose,
}

#[derive(Debug)]
pub struct DecodeEvent {
    pub scene: String,
    pub frame: u32,
    pub token: RequestToken,
    pub purpose: DecodePurpose,
    /// `None` encodes the degraded "no points this frame" failure case.
    pub payload: Option<DecodedPayload>,
}

#[derive(Debug)]
pub struct DecodedPayload {
    pub record: FrameRecord,
    pub image: Option<FrameImage>,
}

/// Handle to the decode thread. Dropping it closes the request channel and
/// lets the worker exit.
pub struct DecodeWorker {
    requests: Sender<DecodeRequest>,
    events: Receiver<DecodeEvent>,
}

impl DecodeWorker {
    pub fn spawn(source: SceneSource) -> Self {
        let (request_tx, request_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();
        thread::Builder::new()
            .name("cloudseq_decode".to_string())
            .spawn(move || decode_loop(source, request_rx, event_tx))
            .expect("spawn decode worker thread");
        Self {
            requests: request_tx,
            events: event_rx,
        }
    }

    pub fn submit(&self, request: DecodeRequest) {
        if self.requests.send(request).is_err() {
            log::error!("decode worker is gone; dropping request");
        }
    }

    pub fn try_recv(&self) -> Option<DecodeEvent> {
        match self.events.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<DecodeEvent> {
        match self.events.recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }
}

fn decode_loop(source: SceneSource, requests: Receiver<DecodeRequest>, events: Sender<DecodeEvent>) {
    while let Ok(request) = requests.recv() {
        let payload = match decode_one(&source, &request) {
            Ok(payload) => Some(payload),
            Err(err) => {
                log::warn!(
                    "frame {} of scene '{}' failed to decode: {err}",
                    request.frame,
                    request.scene
                );
                None
            }
        };
        let event = DecodeEvent {
            scene: request.scene,
            frame: request.frame,
            token: request.token,
            purpose: request.purpose,
            payload,
        };
        if events.send(event).is_err() {
            break;
        }
    }
}

fn decode_one(source: &SceneSource, request: &DecodeRequest) -> Result<DecodedPayload, FrameError> {
    let (positions, colors) =
        source.read_frame_payloads(&request.scene, request.frame, request.encoding)?;
    let malformed = |err: anyhow::Error| FrameError::MalformedPayload {
        scene: request.scene.clone(),
        frame: request.frame,
        reason: format!("{err:#}"),
    };
    match request.encoding {
        Encoding::Raw => decode_raw_frame(&positions, &colors, &request.metadata)
            .map(|record| DecodedPayload {
                record,
                image: None,
            })
            .map_err(malformed),
        Encoding::Packed => decode_packed_frame(&positions, &colors, &request.metadata)
            .map(|packed| DecodedPayload {
                record: packed.record,
                image: Some(packed.image),
            })
            .map_err(malformed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::POINTCLOUD_DIR;
    use crate::request::RequestGuard;
    use std::fs;
    use std::path::Path;

    fn write_raw_scene(root: &Path, scene: &str, frames: u32) {
        let dir = root.join(POINTCLOUD_DIR).join(scene);
        fs::create_dir_all(&dir).expect("scene dir");
        fs::write(
            dir.join("metadata.txt"),
            format!("{frames}\n0 0 0\n1 1 1\n"),
        )
        .expect("descriptor");
        for frame in 0..frames {
            // One point at the quantized maximum.
            fs::write(
                dir.join(Encoding::Raw.position_file(frame)),
                [0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF],
            )
            .expect("position payload");
            fs::write(dir.join(Encoding::Raw.color_file(frame)), [255, 0, 0]).expect("colors");
        }
    }

    fn request(scene: &str, frame: u32, token: RequestToken) -> DecodeRequest {
        DecodeRequest {
            scene: scene.to_string(),
            frame,
            encoding: Encoding::Raw,
            metadata: Arc::new(SceneMetadata {
                frame_count: 2,
                min_bounds: [0.0, 0.0, 0.0],
                max_bounds: [1.0, 1.0, 1.0],
            }),
            token,
            purpose: DecodePurpose::Navigate,
        }
    }

    #[test]
    fn worker_echoes_token_and_decodes() {
        let root = tempfile::tempdir().expect("temp dir");
        write_raw_scene(root.path(), "lab", 2);

        let worker = DecodeWorker::spawn(SceneSource::new(root.path().to_path_buf()));
        let mut guard = RequestGuard::default();
        let token = guard.begin();
        worker.submit(request("lab", 1, token));

        let event = worker
            .recv_timeout(Duration::from_secs(5))
            .expect("completion arrives");
        assert_eq!(event.scene, "lab");
        assert_eq!(event.frame, 1);
        assert_eq!(event.token, token);
        let payload = event.payload.expect("decode succeeds");
        assert_eq!(payload.record.positions, vec![1.0, 1.0, 1.0]);
        assert!(payload.image.is_none());
    }

    #[test]
    fn missing_frame_degrades_to_empty_completion() {
        let root = tempfile::tempdir().expect("temp dir");
        write_raw_scene(root.path(), "lab", 1);

        let worker = DecodeWorker::spawn(SceneSource::new(root.path().to_path_buf()));
        let mut guard = RequestGuard::default();
        worker.submit(request("lab", 7, guard.begin()));

        let event = worker
            .recv_timeout(Duration::from_secs(5))
            .expect("completion arrives");
        assert!(event.payload.is_none());
    }

    #[test]
    fn completions_preserve_submission_order() {
        let root = tempfile::tempdir().expect("temp dir");
        write_raw_scene(root.path(), "lab", 2);

        let worker = DecodeWorker::spawn(SceneSource::new(root.path().to_path_buf()));
        let mut guard = RequestGuard::default();
        let token = guard.begin();
        worker.submit(request("lab", 0, token));
        worker.submit(request("lab", 1, token));

        let first = worker
            .recv_timeout(Duration::from_secs(5))
            .expect("first completion");
        let second = worker
            .recv_timeout(Duration::from_secs(5))
            .expect("second completion");
        assert_eq!((first.frame, second.frame), (0, 1));
    }
}
