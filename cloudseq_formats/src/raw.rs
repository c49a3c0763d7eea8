//! Raw binary frame payloads.
//!
//! The legacy encoding ships two files per frame: tightly packed
//! little-endian `u16` XYZ triples normalized to `[0, 65535]`, and `u8` RGB
//! triples. Positions are denormalized against the scene bounds from the
//! descriptor.

use anyhow::{Result, ensure};
use byteorder::{ByteOrder, LittleEndian};

use crate::frame::FrameRecord;
use crate::metadata::SceneMetadata;

const POSITION_STRIDE: usize = 6;
const COLOR_STRIDE: usize = 3;

/// Decode one raw frame from its position and color payloads.
pub fn decode_raw_frame(
    position_payload: &[u8],
    color_payload: &[u8],
    metadata: &SceneMetadata,
) -> Result<FrameRecord> {
    ensure!(
        position_payload.len() % POSITION_STRIDE == 0,
        "position payload length {} is not a whole number of u16 triples",
        position_payload.len()
    );
    ensure!(
        color_payload.len() % COLOR_STRIDE == 0,
        "color payload length {} is not a whole number of u8 triples",
        color_payload.len()
    );

    let point_count = position_payload.len() / POSITION_STRIDE;
    ensure!(
        color_payload.len() / COLOR_STRIDE == point_count,
        "color payload carries {} samples for {} points",
        color_payload.len() / COLOR_STRIDE,
        point_count
    );

    let mut raw = vec![0u16; point_count * 3];
    LittleEndian::read_u16_into(position_payload, &mut raw);
    let positions = denormalize_positions(&raw, metadata);

    let colors: Vec<f32> = color_payload.iter().map(|&c| c as f32 / 255.0).collect();

    Ok(FrameRecord {
        positions,
        colors: Some(colors),
    })
}

/// Map quantized position samples back into scene coordinates.
pub fn denormalize_positions(raw: &[u16], metadata: &SceneMetadata) -> Vec<f32> {
    let mut out = Vec::with_capacity(raw.len());
    for triple in raw.chunks_exact(3) {
        for axis in 0..3 {
            out.push(denormalize_sample(triple[axis], axis, metadata));
        }
    }
    out
}

/// Denormalize a single quantized sample along one axis.
pub fn denormalize_sample(raw: u16, axis: usize, metadata: &SceneMetadata) -> f32 {
    metadata.min_bounds[axis] + (raw as f32 / 65535.0) * metadata.extent(axis)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_metadata() -> SceneMetadata {
        SceneMetadata {
            frame_count: 1,
            min_bounds: [-1.0, 0.0, 2.0],
            max_bounds: [1.0, 10.0, 4.0],
        }
    }

    fn encode_positions(samples: &[u16]) -> Vec<u8> {
        let mut bytes = vec![0u8; samples.len() * 2];
        LittleEndian::write_u16_into(samples, &mut bytes);
        bytes
    }

    #[test]
    fn denormalization_hits_bounds_exactly() {
        let metadata = test_metadata();
        for axis in 0..3 {
            assert_eq!(
                denormalize_sample(0, axis, &metadata),
                metadata.min_bounds[axis]
            );
            assert_eq!(
                denormalize_sample(65535, axis, &metadata),
                metadata.max_bounds[axis]
            );
        }
    }

    #[test]
    fn denormalization_stays_in_range() {
        let metadata = test_metadata();
        for raw in [1u16, 255, 32767, 40000, 65534] {
            for axis in 0..3 {
                let value = denormalize_sample(raw, axis, &metadata);
                assert!(value >= metadata.min_bounds[axis], "{value} below min");
                assert!(value <= metadata.max_bounds[axis], "{value} above max");
            }
        }
    }

    #[test]
    fn decodes_matched_payloads() {
        let metadata = test_metadata();
        let positions = encode_positions(&[0, 0, 0, 65535, 65535, 65535]);
        let colors = vec![0u8, 128, 255, 255, 0, 64];

        let record = decode_raw_frame(&positions, &colors, &metadata).expect("frame decodes");
        assert_eq!(record.point_count(), 2);
        assert_eq!(&record.positions[0..3], &[-1.0, 0.0, 2.0]);
        assert_eq!(&record.positions[3..6], &[1.0, 10.0, 4.0]);

        let colors = record.colors.expect("colors present");
        assert_eq!(colors.len(), record.positions.len());
        assert_eq!(colors[2], 1.0);
        assert_eq!(colors[4], 0.0);
    }

    #[test]
    fn rejects_truncated_position_payload() {
        let metadata = test_metadata();
        let err = decode_raw_frame(&[0u8; 5], &[0u8; 3], &metadata).expect_err("must fail");
        assert!(err.to_string().contains("u16 triples"));
    }

    #[test]
    fn rejects_sample_count_mismatch() {
        let metadata = test_metadata();
        let positions = encode_positions(&[0, 0, 0]);
        let err = decode_raw_frame(&positions, &[0u8; 6], &metadata).expect_err("must fail");
        assert!(err.to_string().contains("samples for"));
    }
}
