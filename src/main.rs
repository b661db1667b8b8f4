use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use glyphstream::effects::audio::{AudioReactive, AUDIO_EFFECT_ID};
use glyphstream::effects::pointer::{PointerGlow, POINTER_EFFECT_ID};
use glyphstream::effects::ripple::{ClickRipples, RIPPLE_EFFECT_ID};
use glyphstream::player::{AsciiPlayer, ManualScheduler, Scheduler};
use glyphstream::schema::load_config;
use glyphstream::source::{FrameSource, TestPatternSource};
use glyphstream::{GridDimensions, Renderer};

#[derive(Debug, Parser)]
#[command(name = "glyphstream")]
#[command(about = "GPU ASCII-art video renderer")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Validate a config and print the derived grid.
    Check {
        config: PathBuf,
        #[arg(long = "source-width", default_value_t = 640)]
        source_width: u32,
        #[arg(long = "source-height", default_value_t = 480)]
        source_height: u32,
    },
    /// Render the built-in test pattern through the full pipeline and dump
    /// PNG frames.
    Render {
        config: PathBuf,
        #[arg(short = 'o', long = "output")]
        output: PathBuf,
        #[arg(long = "frames", default_value_t = 60)]
        frames: u32,
        #[arg(long = "source-width", default_value_t = 640)]
        source_width: u32,
        #[arg(long = "source-height", default_value_t = 480)]
        source_height: u32,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Check {
            config,
            source_width,
            source_height,
        } => run_check(&config, source_width, source_height),
        Commands::Render {
            config,
            output,
            frames,
            source_width,
            source_height,
        } => run_render(&config, &output, frames, source_width, source_height),
    }
}

fn run_check(config_path: &Path, source_width: u32, source_height: u32) -> Result<()> {
    let config = load_config(config_path)?;
    let grid = GridDimensions::derive(source_width, source_height, config.columns)?;

    println!(
        "OK: {} (charset '{}', {} glyphs, glyph {}px)",
        config_path.display(),
        config.charset,
        config.charset.glyph_count(),
        config.glyph_px
    );
    println!(
        "Grid for {}x{} source: {} cols x {} rows ({} cells)",
        source_width,
        source_height,
        grid.cols,
        grid.rows,
        grid.cell_count()
    );
    Ok(())
}

fn run_render(
    config_path: &Path,
    output_dir: &Path,
    frames: u32,
    source_width: u32,
    source_height: u32,
) -> Result<()> {
    let config = load_config(config_path)?;
    let Some(font_path) = config.font_path.clone() else {
        bail!(
            "config {} has no font_path; rendering needs a font to rasterize the atlas",
            config_path.display()
        );
    };
    let font_bytes = std::fs::read(&font_path)
        .with_context(|| format!("failed to read font {}", font_path.display()))?;
    let font = fontdue::Font::from_bytes(font_bytes, fontdue::FontSettings::default())
        .map_err(|error| anyhow::anyhow!("failed to parse font {}: {error}", font_path.display()))?;

    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create {}", output_dir.display()))?;

    let source = Rc::new(RefCell::new(TestPatternSource::new(
        source_width,
        source_height,
    )?));
    let scheduler = Rc::new(RefCell::new(ManualScheduler::new()));

    let mut player: AsciiPlayer<Renderer> = AsciiPlayer::new(
        source.clone() as Rc<RefCell<dyn FrameSource>>,
        scheduler.clone() as Rc<RefCell<dyn Scheduler>>,
    );
    player.on_stats(|stats| {
        log::info!(
            "stats: {:.1} fps, {:.2} ms/frame",
            stats.fps,
            stats.frame_time_ms
        );
    });
    player.initialize_gpu(&config, &font)?;

    let grid = player
        .snapshot()
        .dimensions
        .context("initialized player has no grid")?;

    // Wire the built-in effects with scripted inputs so the demo output
    // shows all three.
    let pointer = PointerGlow::new();
    let pointer_handle = pointer.handle();
    player.register_effect(POINTER_EFFECT_ID, pointer.callback());

    let ripples = ClickRipples::new();
    let ripple_handle = ripples.handle();
    player.register_effect(RIPPLE_EFFECT_ID, ripples.callback());

    let audio = AudioReactive::new(0.4);
    let audio_handle = audio.handle();
    player.register_effect(AUDIO_EFFECT_ID, audio.callback());

    player.play();

    let mut rendered = 0_u32;
    while rendered < frames {
        if !scheduler.borrow_mut().take_pending() {
            break;
        }

        let phase = rendered as f32 / 30.0;
        pointer_handle.set_cell(
            (0.5 + 0.4 * phase.cos()) * grid.cols as f32,
            (0.5 + 0.4 * phase.sin()) * grid.rows as f32,
        );
        audio_handle.set_level(0.5 + 0.5 * (phase * 2.0).sin());
        if rendered % 30 == 0 {
            ripple_handle.spawn_at_cell(grid.cols as f32 * 0.5, grid.rows as f32 * 0.5);
        }

        player.tick();

        let renderer = player
            .pipeline_mut()
            .context("player lost its renderer mid-run")?;
        let (width, height) = renderer.output_size();
        let rgba = renderer.read_frame_rgba()?;
        let image = image::RgbaImage::from_raw(width, height, rgba)
            .context("readback size mismatch while building PNG")?;
        let frame_path = output_dir.join(format!("frame_{rendered:04}.png"));
        image
            .save(&frame_path)
            .with_context(|| format!("failed to write {}", frame_path.display()))?;

        rendered += 1;
    }

    player.pause();
    println!(
        "Rendered {} frames ({}x{} grid) to {}",
        rendered,
        grid.cols,
        grid.rows,
        output_dir.display()
    );
    Ok(())
}
