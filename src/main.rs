use clap::{Parser, Subcommand};
use oogiri::caption::{CaptionSource, GeminiCaptionSource};
use oogiri::compose::{Typesetter, load_typesetter, render_artifact};
use oogiri::config::{self, OogiriConfig};
use oogiri::ingest::SourceImage;
use oogiri::output;
use oogiri::session::{Session, SessionState};
use oogiri::shell::Shell;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "oogiri")]
#[command(about = "Caption images with absurd one-liners and export them as memes")]
#[command(long_about = "\
Caption images with absurd one-liners and export them as memes

An image is sent to a Gemini model that answers with a single Oogiri-style
\"boke\" line. The line is burned into the bottom of the image as bold white
text with a black outline, shrunk to fit 90% of the width, and exported as PNG.

The API key is read from $GEMINI_API_KEY (configurable) at request time.

Run 'oogiri gen-config' to generate a documented oogiri.toml.")]
#[command(version)]
struct Cli {
    /// Config file (missing file = stock defaults)
    #[arg(long, default_value = config::DEFAULT_CONFIG_FILE, global = true)]
    config: PathBuf,

    /// More log output on stderr (-v info, -vv debug). RUST_LOG overrides.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate a caption for an image and export the meme
    Caption {
        /// Image files; the first one is used. `-` reads stdin.
        #[arg(required = true)]
        images: Vec<PathBuf>,
        /// Model to use instead of the configured default
        #[arg(long)]
        model: Option<String>,
        /// Output PNG (default: <output.dir>/<prefix>_<unix-millis>.png)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Burn a given caption into an image without calling the model
    Render {
        /// Image file, or `-` for stdin
        image: PathBuf,
        /// Caption text (may be empty)
        #[arg(long, short)]
        text: String,
        /// Output PNG (default: <output.dir>/<prefix>_<unix-millis>.png)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Interactive session: open, generate, regenerate, save
    Session {
        /// Image to start with (first one is used)
        images: Vec<PathBuf>,
    },
    /// List selectable models
    Models,
    /// Print a stock oogiri.toml with all options documented
    GenConfig,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Caption {
            images,
            model,
            output,
        } => {
            let config = config::load_config(&cli.config)?;
            let image = SourceImage::first_of(&images)?.ok_or("no image given")?;
            let decoded = image.decode()?;

            let mut session = Session::new(model.as_deref().unwrap_or(&config.caption.model))?;
            session.capture(image);
            let source = GeminiCaptionSource::from_config(&config.caption);
            session.generate(&source).await?;

            let caption = match session.state() {
                SessionState::Success { caption } => caption.clone(),
                SessionState::Error { message } => {
                    eprintln!("Error: {}", message);
                    std::process::exit(1);
                }
                other => return Err(format!("unexpected session state: {}", other.label()).into()),
            };

            let typesetter = load_typesetter(&config.render.font_paths());
            let path = output.unwrap_or_else(|| default_export_path(&config));
            export(&config, typesetter.as_ref(), &decoded, &caption, &path)?;
        }
        Command::Render {
            image,
            text,
            output,
        } => {
            let config = config::load_config(&cli.config)?;
            let image = SourceImage::first_of(&[image])?.ok_or("no image given")?;
            let decoded = image.decode()?;
            let typesetter = load_typesetter(&config.render.font_paths());
            let path = output.unwrap_or_else(|| default_export_path(&config));
            export(&config, typesetter.as_ref(), &decoded, text.trim(), &path)?;
        }
        Command::Session { images } => {
            let config = config::load_config(&cli.config)?;
            let session = Session::new(&config.caption.model)?;
            let source: Arc<dyn CaptionSource> =
                Arc::new(GeminiCaptionSource::from_config(&config.caption));
            let typesetter = Arc::from(load_typesetter(&config.render.font_paths()));
            let shell = Shell::new(
                session,
                source,
                typesetter,
                config.render.caption_style()?,
                config.output.clone(),
            );
            shell.run(&images).await?;
        }
        Command::Models => {
            let config = config::load_config(&cli.config)?;
            output::print_models(&config.caption.model);
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Log to stderr so stdout carries only user-facing output.
fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

fn default_export_path(config: &OogiriConfig) -> PathBuf {
    config
        .output
        .export_path(chrono::Utc::now().timestamp_millis())
}

/// Render, write the PNG and report it.
fn export(
    config: &OogiriConfig,
    typesetter: &dyn Typesetter,
    image: &image::DynamicImage,
    caption: &str,
    path: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let style = config.render.caption_style()?;
    let artifact = render_artifact(typesetter, image, caption, &style)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    artifact.save(path)?;
    tracing::info!(path = %path.display(), "meme exported");
    output::print_export(path, &artifact, caption);
    Ok(())
}
