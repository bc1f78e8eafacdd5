//! Atelier Studio - terminal front end for PixelPainter and WordWeaver.
//!
//! Settings are layered: `config.json` in the data directory, then
//! `ATELIER_*` environment variables, then command-line flags.
//!
//! Data locations:
//! - Linux: ~/.local/share/atelier/
//! - Windows: %APPDATA%\atelier\
//! - MacOS: ~/Library/Application Support/atelier/

use std::path::PathBuf;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use atelier::animation::{Scrub, Status};
use atelier::controls::{DEFAULT_PAINTER_PROMPT, WEAVER_PRESETS};
use atelier::noise::{forward_diffusion, RgbaImage, DEFAULT_STEPS};
use atelier::prng::Prng;
use atelier_client::types::{DEFAULT_EMBED_TOKENS, DEFAULT_INSPECT_TOKENS, DEFAULT_LAYER_INDEX};
use atelier_client::{BackendClient, InspectOptions};

mod config;
mod paths;
mod render;
mod viewer;
mod weaver_session;

use config::StudioConfig;
use paths::AppPaths;
use weaver_session::WeaverSession;

#[derive(Parser)]
#[command(
    name = "atelier-studio",
    about = "Step through text-to-image diffusion and next-token sampling",
    version
)]
struct Cli {
    /// Backend base URL
    #[arg(long, global = true)]
    backend: Option<String>,
    /// Milliseconds between animation steps at speed 0
    #[arg(long, global = true)]
    tick_ms: Option<u64>,
    #[arg(long, global = true)]
    temperature: Option<f32>,
    #[arg(long, global = true)]
    top_k: Option<u32>,
    /// Animation speed, 0.0 to 1.0
    #[arg(long, global = true)]
    speed: Option<f32>,
    #[arg(long, global = true)]
    model: Option<String>,
    /// Seed for the local random streams (decorative panels, fallback tokens)
    #[arg(long, global = true)]
    seed: Option<u64>,
    /// Override the data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Generate an image and animate its diffusion steps
    Paint {
        /// Image prompt
        #[arg(default_value = DEFAULT_PAINTER_PROMPT)]
        prompt: String,
        /// Hold the animation on this step for a few ticks, then resume
        #[arg(long)]
        pause_at: Option<usize>,
    },
    /// Generate text one token at a time and inspect the model
    Weave {
        /// Starting text
        prompt: Option<String>,
        /// Start from a preset instead (index from `presets`)
        #[arg(long, conflicts_with = "prompt")]
        preset: Option<usize>,
        /// Number of tokens to generate
        #[arg(long, default_value = "5")]
        steps: usize,
        /// Attention layer to inspect (-1 is the last one)
        #[arg(long, default_value_t = DEFAULT_LAYER_INDEX, allow_hyphen_values = true)]
        layer: i32,
        /// Tokens per internal forward pass
        #[arg(long, default_value_t = DEFAULT_INSPECT_TOKENS)]
        inspect_tokens: u32,
    },
    /// Simulate forward diffusion (clean image to noise) on a test pattern
    Forward {
        /// Number of frames, 5 to 60
        #[arg(long, default_value_t = DEFAULT_STEPS)]
        steps: usize,
        /// Side of the square test pattern in pixels
        #[arg(long, default_value = "64")]
        size: usize,
    },
    /// Show embeddings of the last tokens of a text
    Embed {
        context: String,
        #[arg(long, default_value_t = DEFAULT_EMBED_TOKENS)]
        num_tokens: u32,
    },
    /// List prompt presets
    Presets,
    /// Show the control parameters and their ranges
    Controls,
    /// Print the effective configuration
    Config {
        /// Write it to the config file
        #[arg(long)]
        save: bool,
    },
    /// Show where data is stored
    Paths,
}

impl Cli {
    fn apply(&self, cfg: &mut StudioConfig) {
        if let Some(url) = &self.backend {
            cfg.backend_url = url.clone();
        }
        if let Some(ms) = self.tick_ms {
            cfg.tick_ms = ms;
        }
        if let Some(t) = self.temperature {
            cfg.controls.set_temperature(t);
        }
        if let Some(k) = self.top_k {
            cfg.controls.set_top_k(k);
        }
        if let Some(s) = self.speed {
            cfg.controls.set_animation_speed(s);
        }
        if let Some(m) = &self.model {
            cfg.controls.set_model_name(m.clone());
        }
    }

    fn rng(&self) -> Prng {
        match self.seed {
            Some(seed) => Prng::new(seed),
            None => Prng::from_entropy(),
        }
    }
}

fn build_client(cfg: &StudioConfig) -> Result<BackendClient, atelier_client::ClientError> {
    BackendClient::builder()
        .base_url(cfg.backend_url.clone())
        .generate_timeout(cfg.generate_timeout())
        .inspect_timeout(cfg.inspect_timeout())
        .build()
}

/// Diagonal colour gradient standing in for a generated image.
fn test_pattern(size: usize) -> Option<RgbaImage> {
    let size = size.max(1);
    let scale = 255.0 / size as f32;
    let mut data = Vec::with_capacity(size.checked_mul(size)?.checked_mul(4)?);
    for y in 0..size {
        for x in 0..size {
            data.extend_from_slice(&[
                (x as f32 * scale) as u8,
                (y as f32 * scale) as u8,
                (((x + y) / 2) as f32 * scale) as u8,
                255,
            ]);
        }
    }
    RgbaImage::from_raw(size, size, data)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let paths = match &cli.data_dir {
        Some(dir) => AppPaths::at(dir)?,
        None => AppPaths::new()?,
    };
    let mut cfg = StudioConfig::load(&paths.config_file())?;
    cfg.apply_env();
    cli.apply(&mut cfg);
    let cfg = cfg.normalized();
    info!(backend = %cfg.backend_url, model = cfg.controls.model_name(), "configuration loaded");

    match &cli.command {
        Commands::Paint { prompt, pause_at } => cmd_paint(&cfg, prompt, *pause_at, cli.rng()).await?,
        Commands::Weave {
            prompt,
            preset,
            steps,
            layer,
            inspect_tokens,
        } => {
            let start = match (prompt, preset) {
                (Some(p), _) => Start::Typed(p.clone()),
                (None, Some(i)) => match WEAVER_PRESETS.get(*i) {
                    Some(p) => Start::Preset(p),
                    None => return Err(format!("no preset #{i}, see `presets`").into()),
                },
                (None, None) => Start::Preset(WEAVER_PRESETS[0]),
            };
            let inspect = InspectOptions {
                num_tokens: *inspect_tokens,
                layer_index: *layer,
            };
            cmd_weave(&cfg, start, *steps, inspect, cli.rng()).await?
        }
        Commands::Embed {
            context,
            num_tokens,
        } => cmd_embed(&cfg, context, *num_tokens, cli.rng()).await?,
        Commands::Forward { steps, size } => {
            let base = test_pattern(*size).ok_or("invalid pattern size")?;
            let frames = forward_diffusion(&base, *steps, &mut cli.rng());
            print!("{}", render::forward(&base, &frames));
        }
        Commands::Presets => print!("{}", render::presets()),
        Commands::Controls => print!("{}", render::controls(&cfg.controls)),
        Commands::Config { save } => {
            println!("{}", serde_json::to_string_pretty(&cfg)?);
            if *save {
                cfg.save(&paths.config_file())?;
                println!("saved to {}", paths.config_file().display());
            }
        }
        Commands::Paths => {
            println!("data dir:    {}", paths.data_dir().display());
            println!("config file: {}", paths.config_file().display());
        }
    }
    Ok(())
}

async fn cmd_paint(
    cfg: &StudioConfig,
    prompt: &str,
    pause_at: Option<usize>,
    rng: Prng,
) -> Result<(), Box<dyn std::error::Error>> {
    let client = build_client(cfg)?;
    let base = client.base_url().to_string();
    let (viewer, task) = viewer::spawn_viewer(client, cfg.step_interval(), rng);
    let mut rx = viewer.subscribe();

    viewer.generate(prompt, cfg.controls.sampling()).await?;

    let mut last = String::new();
    let mut pause_at = pause_at;
    loop {
        rx.changed().await?;
        let snap = rx.borrow_and_update().clone();
        let line = render::painter_status(&snap);
        if line != last {
            println!("{line}");
            last = line;
        }
        if let Some(step) = pause_at {
            let target = step.min(snap.total_steps.saturating_sub(1));
            if snap.status == Status::Animating && snap.current_step >= target {
                pause_at = None;
                viewer.scrub(Scrub::To(step)).await?;
                tokio::time::sleep(cfg.tick() * 3).await;
                println!("paused: {}", render::painter_status(&viewer.snapshot()));
                viewer.resume().await?;
            }
        }
        if matches!(snap.status, Status::Complete | Status::Failed) {
            println!();
            print!("{}", render::painter(&snap, &base));
            break;
        }
    }

    drop(viewer);
    task.await?;
    Ok(())
}

enum Start {
    Typed(String),
    Preset(&'static str),
}

async fn cmd_weave(
    cfg: &StudioConfig,
    start: Start,
    steps: usize,
    inspect: InspectOptions,
    rng: Prng,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = WeaverSession::new(build_client(cfg)?, cfg.controls.clone(), rng)
        .with_inspect_options(inspect);
    match start {
        Start::Typed(text) => session.set_context(text),
        Start::Preset(text) => session.choose_preset(text).await,
    }

    for _ in 0..steps {
        let outcome = session.step().await?;
        info!(?outcome, "step finished");
        println!("{}", session.store().output());
    }

    println!();
    print!("{}", render::weaver(session.store()));
    print!("{}", render::inspection(session.inspection()));
    Ok(())
}

async fn cmd_embed(
    cfg: &StudioConfig,
    context: &str,
    num_tokens: u32,
    rng: Prng,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = WeaverSession::new(build_client(cfg)?, cfg.controls.clone(), rng);
    if let Err(e) = session.embed(context, num_tokens).await {
        warn!(error = %e, "embedding request failed");
        return Err(e.into());
    }
    let records = session.embeddings().records().to_vec();
    print!("{}", render::embeddings(&records));
    print!("{}", render::projection(&records));
    Ok(())
}
