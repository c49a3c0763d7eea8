mod cache;
mod catalog;
mod cli;
mod controller;
mod decode;
mod prefetch;
mod request;
mod sink;
mod source;

use anyhow::{Context, Result, bail};
use clap::Parser;

use crate::catalog::{POINTCLOUD_DIR, SceneCatalog};
use crate::cli::{Args, PlaybackPreset, load_playback_preset, resolve_options, resolve_scenes};
use crate::controller::Player;
use crate::sink::{LogRenderSink, LogUiSink};
use crate::source::SceneSource;

fn main() -> Result<()> {
    let args = Args::parse();

    env_logger::init();

    let preset = match args.preset.as_ref() {
        Some(path) => load_playback_preset(path)?,
        None => PlaybackPreset::default(),
    };

    let catalog = match resolve_scenes(&args, &preset) {
        Some(scenes) => SceneCatalog::from_names(scenes),
        None => SceneCatalog::discover(&args.root).context("discovering scenes")?,
    };
    if catalog.is_empty() {
        bail!(
            "no scenes found under {}",
            args.root.join(POINTCLOUD_DIR).display()
        );
    }

    println!(
        "Playing {} scene(s) from {}: {}",
        catalog.len(),
        args.root.display(),
        catalog.names().join(", ")
    );

    let options = resolve_options(&args, &preset);
    let mut player = Player::new(
        catalog,
        SceneSource::new(args.root.clone()),
        options,
        LogRenderSink::default(),
        LogUiSink::default(),
    );
    player.start(!args.no_play);
    player.run(args.max_frames);

    println!("Presented {} frame(s)", player.frames_presented());
    Ok(())
}
