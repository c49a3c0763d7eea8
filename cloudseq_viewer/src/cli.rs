use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use serde::Deserialize;

use crate::controller::PlayerOptions;
use crate::source::Encoding;

#[derive(Parser, Debug)]
#[command(about = "Headless point-cloud sequence player", version)]
pub struct Args {
    /// Dataset root containing the pointclouds/ directory
    #[arg(long, default_value = ".")]
    pub root: PathBuf,

    /// Scene to play, in order; repeatable. Discovered from disk when omitted
    #[arg(long = "scene")]
    pub scenes: Vec<String>,

    /// Payload encoding; probed per scene by default
    #[arg(long, value_enum, default_value_t = EncodingArg::Auto)]
    pub encoding: EncodingArg,

    /// Milliseconds to hold each frame during playback
    #[arg(long)]
    pub frame_delay_ms: Option<u64>,

    /// How many upcoming frames to keep warm while playing
    #[arg(long)]
    pub prefetch_window: Option<u32>,

    /// Stop after presenting this many frames; plays forever when omitted
    #[arg(long)]
    pub max_frames: Option<u64>,

    /// Optional JSON playback preset; explicit flags take precedence
    #[arg(long)]
    pub preset: Option<PathBuf>,

    /// Start paused instead of playing immediately
    #[arg(long)]
    pub no_play: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum EncodingArg {
    Auto,
    Raw,
    Packed,
}

impl EncodingArg {
    pub fn forced(self) -> Option<Encoding> {
        match self {
            EncodingArg::Auto => None,
            EncodingArg::Raw => Some(Encoding::Raw),
            EncodingArg::Packed => Some(Encoding::Packed),
        }
    }
}

/// Optional JSON counterpart of the playback flags.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct PlaybackPreset {
    #[serde(default)]
    pub frame_delay_ms: Option<u64>,
    #[serde(default)]
    pub prefetch_window: Option<u32>,
    #[serde(default)]
    pub scenes: Option<Vec<String>>,
}

pub fn load_playback_preset(path: &Path) -> Result<PlaybackPreset> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("reading playback preset {}", path.display()))?;
    let preset: PlaybackPreset = serde_json::from_str(&data)
        .with_context(|| format!("parsing playback preset {}", path.display()))?;
    Ok(preset)
}

/// Merge flags over the preset over the built-in defaults.
pub fn resolve_options(args: &Args, preset: &PlaybackPreset) -> PlayerOptions {
    let defaults = PlayerOptions::default();
    PlayerOptions {
        frame_delay: args
            .frame_delay_ms
            .or(preset.frame_delay_ms)
            .map(Duration::from_millis)
            .unwrap_or(defaults.frame_delay),
        prefetch_window: args
            .prefetch_window
            .or(preset.prefetch_window)
            .unwrap_or(defaults.prefetch_window),
        encoding: args.encoding.forced(),
    }
}

/// Explicit scene list, if any: `--scene` flags win over the preset.
pub fn resolve_scenes(args: &Args, preset: &PlaybackPreset) -> Option<Vec<String>> {
    if !args.scenes.is_empty() {
        return Some(args.scenes.clone());
    }
    preset.scenes.clone().filter(|scenes| !scenes.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> Args {
        let mut full = vec!["cloudseq_viewer"];
        full.extend_from_slice(argv);
        Args::try_parse_from(full).expect("arguments parse")
    }

    #[test]
    fn defaults_apply_without_flags_or_preset() {
        let options = resolve_options(&parse(&[]), &PlaybackPreset::default());
        assert_eq!(options.frame_delay, Duration::from_millis(40));
        assert_eq!(options.prefetch_window, 10);
        assert!(options.encoding.is_none());
    }

    #[test]
    fn preset_overrides_defaults() {
        let preset = PlaybackPreset {
            frame_delay_ms: Some(100),
            prefetch_window: Some(4),
            scenes: Some(vec!["lab".into()]),
        };
        let args = parse(&[]);
        let options = resolve_options(&args, &preset);
        assert_eq!(options.frame_delay, Duration::from_millis(100));
        assert_eq!(options.prefetch_window, 4);
        assert_eq!(resolve_scenes(&args, &preset), Some(vec!["lab".to_string()]));
    }

    #[test]
    fn flags_override_the_preset() {
        let preset = PlaybackPreset {
            frame_delay_ms: Some(100),
            prefetch_window: Some(4),
            scenes: Some(vec!["lab".into()]),
        };
        let args = parse(&[
            "--frame-delay-ms",
            "5",
            "--prefetch-window",
            "2",
            "--scene",
            "desk",
            "--scene",
            "hall",
        ]);
        let options = resolve_options(&args, &preset);
        assert_eq!(options.frame_delay, Duration::from_millis(5));
        assert_eq!(options.prefetch_window, 2);
        assert_eq!(
            resolve_scenes(&args, &preset),
            Some(vec!["desk".to_string(), "hall".to_string()])
        );
    }

    #[test]
    fn encoding_flag_forces_the_probe() {
        assert_eq!(parse(&[]).encoding.forced(), None);
        assert_eq!(
            parse(&["--encoding", "raw"]).encoding.forced(),
            Some(Encoding::Raw)
        );
        assert_eq!(
            parse(&["--encoding", "packed"]).encoding.forced(),
            Some(Encoding::Packed)
        );
    }

    #[test]
    fn preset_loads_from_json() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("preset.json");
        fs::write(&path, r#"{"frame_delay_ms": 25, "scenes": ["a", "b"]}"#).expect("preset file");

        let preset = load_playback_preset(&path).expect("preset loads");
        assert_eq!(preset.frame_delay_ms, Some(25));
        assert_eq!(preset.prefetch_window, None);
        assert_eq!(preset.scenes, Some(vec!["a".to_string(), "b".to_string()]));

        fs::write(&path, "not json").expect("preset file");
        assert!(load_playback_preset(&path).is_err());
    }
}
