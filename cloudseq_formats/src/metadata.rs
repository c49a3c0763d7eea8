//! Scene descriptor parsing.
//!
//! Every scene directory carries a three-line `metadata.txt`: the frame
//! count, then the minimum and maximum coordinate bounds used to
//! denormalize quantized position samples.

use anyhow::{Context, Result, ensure};

/// Per-scene descriptor resolved once and reused for every frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneMetadata {
    pub frame_count: u32,
    pub min_bounds: [f32; 3],
    pub max_bounds: [f32; 3],
}

impl SceneMetadata {
    /// Parse the descriptor text.
    pub fn parse(text: &str) -> Result<Self> {
        let mut lines = text.trim().lines();
        let count_line = lines.next().context("metadata descriptor is empty")?;
        let frame_count: u32 = count_line
            .trim()
            .parse()
            .with_context(|| format!("invalid frame count '{}'", count_line.trim()))?;
        ensure!(frame_count > 0, "metadata reports zero frames");

        let min_bounds = parse_bounds_line(lines.next().context("metadata missing min bounds")?)
            .context("parsing min bounds")?;
        let max_bounds = parse_bounds_line(lines.next().context("metadata missing max bounds")?)
            .context("parsing max bounds")?;

        Ok(Self {
            frame_count,
            min_bounds,
            max_bounds,
        })
    }

    /// Coordinate span along one axis.
    pub fn extent(&self, axis: usize) -> f32 {
        self.max_bounds[axis] - self.min_bounds[axis]
    }
}

fn parse_bounds_line(line: &str) -> Result<[f32; 3]> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    ensure!(
        fields.len() == 3,
        "bounds line has {} fields (expected 3)",
        fields.len()
    );
    let mut values = [0.0f32; 3];
    for (slot, field) in values.iter_mut().zip(&fields) {
        *slot = field
            .parse()
            .with_context(|| format!("invalid bounds value '{field}'"))?;
    }
    Ok(values)
}
