pub mod frame;
pub mod metadata;
pub mod packed;
pub mod raw;

pub use frame::{FrameImage, FrameRecord};
pub use metadata::SceneMetadata;
pub use packed::{PackedFrame, decode_packed_frame};
pub use raw::{decode_raw_frame, denormalize_positions};
