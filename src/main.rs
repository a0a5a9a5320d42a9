// src/main.rs

// glyphcast: render text with catalog fonts.
//
// Subcommands:
//   families - list catalog families
//   info     - show one family's styles and sources
//   render   - draw text to a PNG
//   web      - resolve a web-font query and list the faces it provides

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use log::info;

use glyphcast::config::{Config, CONFIG};
use glyphcast::engine::RasterEngine;
use glyphcast::loader::{FontLoader, LoaderOptions};
use glyphcast::source::FontSourceProvider;
use glyphcast::view::{DrawOutcome, TextView};
use glyphcast::{Canvas, FontCatalog, HeadlessEngine, MemorySource, RoutingSource, TtfEngine};

#[derive(Parser)]
#[command(name = "glyphcast", about = "Render text with catalog fonts")]
struct Cli {
    /// JSON config file (defaults to $GLYPHCAST_CONFIG, then built-in defaults)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// List catalog families
    Families,
    /// Show the styles and sources of one family
    Info { family: String },
    /// Draw text into a PNG
    Render {
        #[arg(long)]
        family: Option<String>,
        #[arg(long)]
        style: Option<String>,
        /// Pixel height (before device pixel ratio)
        #[arg(long)]
        size: Option<u32>,
        #[arg(long, default_value = "glyphcast.png")]
        output: PathBuf,
        /// Use synthetic box glyphs instead of fetching real fonts
        #[arg(long)]
        headless: bool,
        text: String,
    },
    /// Resolve a web-font family query and list the faces it provides
    Web { query: String },
}

/// Main entry point for the `glyphcast` tool.
fn main() -> anyhow::Result<()> {
    // Initialize the logger. Default filter is "info" if RUST_LOG is not set.
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_micros()
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config '{}'", path.display()))?,
        None => CONFIG.clone(),
    };
    let catalog = Arc::new(load_catalog(&config)?);

    match cli.command {
        Cmd::Families => {
            for family in catalog.families() {
                println!("{family}");
            }
        }
        Cmd::Info { family } => {
            let Some(font) = catalog.lookup(&family) else {
                bail!("Unknown font family '{family}'");
            };
            println!("{} ({})", font.family, font.category);
            for variant in &font.variants {
                println!("  {variant:<12} {}", font.source_for_style(variant));
            }
        }
        Cmd::Render {
            family,
            style,
            size,
            output,
            headless,
            text,
        } => {
            let mut config = config;
            if let Some(size) = size {
                config.render.pixel_height = size;
            }
            let family = family.unwrap_or_else(|| config.defaults.family.clone());
            if headless {
                let source = headless_source(&catalog, &config, &family, style.as_deref())?;
                let loader = FontLoader::new(Arc::clone(&catalog), source, HeadlessEngine::new());
                render(loader, &config, &family, style.as_deref(), &text, &output)?;
            } else {
                let source = Arc::new(RoutingSource::from_config(&config.source));
                let loader = FontLoader::new(Arc::clone(&catalog), source, TtfEngine::new());
                render(loader, &config, &family, style.as_deref(), &text, &output)?;
            }
        }
        Cmd::Web { query } => {
            let source = Arc::new(RoutingSource::from_config(&config.source));
            let loader = FontLoader::new(catalog, source, TtfEngine::new());
            let families = loader
                .discover_web_font(&query)
                .with_context(|| format!("Failed to resolve web font '{query}'"))?;
            for (family, styles) in families {
                let styles: Vec<_> = styles.into_iter().collect();
                println!("{family}: {}", styles.join(", "));
            }
        }
    }
    Ok(())
}

fn load_catalog(config: &Config) -> anyhow::Result<FontCatalog> {
    match &config.catalog {
        Some(path) => FontCatalog::load(path)
            .with_context(|| format!("Failed to load catalog '{}'", path.display())),
        None => FontCatalog::builtin().context("Built-in catalog is invalid"),
    }
}

/// In-memory source serving synthetic faces for the requested selection and
/// the default family.
fn headless_source(
    catalog: &FontCatalog,
    config: &Config,
    family: &str,
    style: Option<&str>,
) -> anyhow::Result<Arc<dyn FontSourceProvider>> {
    let mut source = MemorySource::new();
    let defaults = &config.defaults;
    for (family, style) in [(family, style), (defaults.family.as_str(), Some(defaults.style.as_str()))] {
        if let Some((style, id)) = catalog.source_for(family, style) {
            let face = HeadlessEngine::font_bytes(&[(family, style.as_str())]);
            source = source.with_font(id, face);
        }
    }
    Ok(Arc::new(source))
}

fn render<E: RasterEngine>(
    loader: FontLoader<E>,
    config: &Config,
    family: &str,
    style: Option<&str>,
    text: &str,
    output: &Path,
) -> anyhow::Result<()> {
    let loader = Arc::new(loader.with_options(LoaderOptions::from_config(&config.render)));
    let canvas = Canvas::new(config.render.surface_width, config.render.surface_height)
        .with_foreground(config.render.foreground);
    let view = TextView::new(loader, config.render.clone(), config.defaults.clone())
        .with_surface(canvas);

    view.set_family(family);
    if let Some(style) = style {
        view.set_style(style);
    }
    view.set_text(text);

    match view.redraw().context("Failed to render text")? {
        DrawOutcome::Drawn { pen, line_height } => {
            info!(
                "Rendered {} / {}: pen ended at ({}, {}), line height {}",
                view.family(),
                view.style(),
                pen.x,
                pen.y,
                line_height
            );
        }
        outcome => bail!("Nothing was drawn ({outcome:?})"),
    }

    let canvas = view.take_surface().context("Surface went missing")?;
    canvas
        .save_png(output)
        .with_context(|| format!("Failed to write '{}'", output.display()))?;
    println!("{}", output.display());
    Ok(())
}
