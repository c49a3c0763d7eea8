//! PNG-packed frame payloads.
//!
//! The current encoding ships two equal-dimension rasters per frame. The
//! position raster stores 16-bit samples (PNG's native big-endian packing,
//! two bytes per channel per pixel) with the producer's channel order
//! reversed relative to the raw encoding: X lives in channel 2, Y in
//! channel 1, Z in channel 0. The color raster is RGBA8 whose alpha channel
//! is a validity mask; masked-out pixels are dropped and the output buffers
//! compacted. The color raster doubles as a displayable bitmap.

use anyhow::{Context, Result, bail, ensure};
use image::{ColorType, DynamicImage, ImageFormat};

use crate::frame::{FrameImage, FrameRecord};
use crate::metadata::SceneMetadata;
use crate::raw::denormalize_sample;

/// Decoded packed frame: the point buffers plus the side-by-side raster.
#[derive(Debug, Clone, PartialEq)]
pub struct PackedFrame {
    pub record: FrameRecord,
    pub image: FrameImage,
}

/// Decode one packed frame from its two PNG payloads.
pub fn decode_packed_frame(
    position_png: &[u8],
    color_png: &[u8],
    metadata: &SceneMetadata,
) -> Result<PackedFrame> {
    let position = image::load_from_memory_with_format(position_png, ImageFormat::Png)
        .context("decoding position raster")?;
    let color = image::load_from_memory_with_format(color_png, ImageFormat::Png)
        .context("decoding color raster")?;
    decode_rasters(&position, &color, metadata)
}

fn decode_rasters(
    position: &DynamicImage,
    color: &DynamicImage,
    metadata: &SceneMetadata,
) -> Result<PackedFrame> {
    if !matches!(position.color(), ColorType::Rgb16 | ColorType::Rgba16) {
        bail!(
            "position raster must carry 16-bit channels (got {:?})",
            position.color()
        );
    }

    let position = position.to_rgb16();
    let color = color.to_rgba8();
    let (width, height) = position.dimensions();
    ensure!(
        color.dimensions() == (width, height),
        "position raster {}x{} does not match color raster {}x{}",
        width,
        height,
        color.dimensions().0,
        color.dimensions().1
    );

    let pixel_count = width as usize * height as usize;
    let position_samples = position.as_raw();
    let color_samples = color.as_raw();

    let mut positions = Vec::with_capacity(pixel_count * 3);
    let mut colors = Vec::with_capacity(pixel_count * 3);
    for pixel in 0..pixel_count {
        if color_samples[pixel * 4 + 3] == 0 {
            continue;
        }
        // Channel order is reversed: X <- ch2, Y <- ch1, Z <- ch0.
        let raw = [
            position_samples[pixel * 3 + 2],
            position_samples[pixel * 3 + 1],
            position_samples[pixel * 3],
        ];
        for axis in 0..3 {
            positions.push(denormalize_sample(raw[axis], axis, metadata));
        }
        for channel in 0..3 {
            colors.push(color_samples[pixel * 4 + channel] as f32 / 255.0);
        }
    }

    Ok(PackedFrame {
        record: FrameRecord {
            positions,
            colors: Some(colors),
        },
        image: FrameImage {
            width,
            height,
            rgba: color.into_raw(),
        },
    })
}
