use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{filter::LevelFilter, EnvFilter};

use chroma_keyer::{
    calibration::{show_trackbar_window, trackbar_window, PngPreview, TerminalControls},
    composition::SessionOutcome,
    config::Config,
    video::{Dimensions, FfmpegSink},
    CompositorError, KeyingSession,
};

#[derive(Parser)]
#[command(
    name = "chroma-keyer",
    version,
    about = "Replace a green screen in a video with a still image",
    long_about = "Chroma-Keyer shows the first frame of your video keyed against the background image, lets you tune the colour range until the backdrop disappears, then applies that range to every frame."
)]
struct Cli {
    /// Green screen video file
    #[arg(short, long)]
    video: Option<PathBuf>,

    /// Background image file
    #[arg(short, long)]
    background: Option<PathBuf>,

    /// Output video file path
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output width in pixels
    #[arg(long, allow_negative_numbers = true)]
    width: Option<i64>,

    /// Output height in pixels
    #[arg(long, allow_negative_numbers = true)]
    height: Option<i64>,

    /// Output frame rate
    #[arg(long)]
    fps: Option<u32>,

    /// Configuration file (optional)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Where to write the calibration preview image (with --terminal)
    #[arg(long)]
    preview: Option<PathBuf>,

    /// Calibrate with typed commands and a preview PNG instead of the window
    #[arg(long)]
    terminal: bool,

    /// Enable verbose logging
    #[arg(long)]
    verbose: bool,
}

const WELCOME: &str = "\
Welcome to chroma-keyer!
----------------------------------
Keep this window open as it will be your interface for input and output.
";

fn main() {
    let cli = Cli::parse();

    let log_level = if cli.verbose { LevelFilter::DEBUG } else { LevelFilter::INFO };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(log_level.into())
                .from_env_lossy(),
        )
        .with_writer(io::stderr)
        .init();

    if let Err(e) = run(cli) {
        match e.downcast_ref::<CompositorError>() {
            Some(err) => {
                eprintln!("Error: {}", err.user_message());
                if err.is_recoverable() {
                    eprintln!("This may be temporary; running again could succeed.");
                }
            }
            None => eprintln!("Error: {:#}", e),
        }
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    info!("Starting chroma-keyer v{}", env!("CARGO_PKG_VERSION"));

    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut stdout = io::stdout();

    writeln!(stdout, "{}", WELCOME)?;

    let video = match cli.video {
        Some(path) => path,
        None => PathBuf::from(prompt(&mut input, "Enter green screen video file path: ")?),
    };
    let background = match cli.background {
        Some(path) => path,
        None => PathBuf::from(prompt(&mut input, "Enter background image file path: ")?),
    };

    let config = resolve_config(&cli.config, cli.output, cli.width, cli.height, cli.fps, cli.preview, &mut input)?;

    info!("Video: {:?}", video);
    info!("Background: {:?}", background);
    info!("Output: {:?} ({} @ {} fps)", config.output.output_path, config.output.dimensions, config.output.frame_rate);

    let session = KeyingSession::new(config)?;
    let outcome = if cli.terminal {
        calibrate_in_terminal(&session, &video, &background, input, &mut stdout)?
    } else {
        drop(input);
        calibrate_in_window(&session, &video, &background)?
    };

    match outcome.sink.encoded() {
        Ok(encoded) => info!(
            "Wrote {} frames ({} KB) to {:?}",
            encoded.frame_count,
            encoded.file_size / 1024,
            encoded.path
        ),
        Err(e) => info!("Output written, size unknown: {}", e),
    }

    writeln!(stdout, "Processing completed")?;
    Ok(())
}

fn calibrate_in_terminal<R: BufRead>(
    session: &KeyingSession,
    video: &Path,
    background: &Path,
    input: R,
    stdout: &mut io::Stdout,
) -> Result<SessionOutcome<FfmpegSink>> {
    let mut preview = PngPreview::new(session.config().calibration.preview_path.clone());
    writeln!(
        stdout,
        "Open {} in an image viewer to watch the calibration preview.",
        preview.path().display()
    )?;

    let mut controls = TerminalControls::new(input, io::stdout());
    Ok(session.run_files(video, background, &mut controls, &mut preview, stdout)?)
}

/// The window owns the main thread; the session runs on a scoped worker
fn calibrate_in_window(
    session: &KeyingSession,
    video: &Path,
    background: &Path,
) -> Result<SessionOutcome<FfmpegSink>> {
    let (window, mut controls, mut preview) = trackbar_window(session.config().calibration.preview_size);

    std::thread::scope(|scope| {
        let worker = scope.spawn(|| {
            let mut console = io::stdout();
            session.run_files(video, background, &mut controls, &mut preview, &mut console)
        });

        let shown = show_trackbar_window(window);
        let result = worker
            .join()
            .map_err(|_| anyhow!("keying session thread panicked"))?;

        match (shown, result) {
            (Err(window_err), Err(session_err)) => {
                warn!("Session ended after the window failed: {}", session_err);
                Err(window_err.into())
            }
            (_, result) => Ok(result?),
        }
    })
}

/// Build the session config from an optional file, CLI overrides and,
/// for anything still missing, terminal prompts.
fn resolve_config<R: BufRead>(
    config_path: &Option<PathBuf>,
    output: Option<PathBuf>,
    width: Option<i64>,
    height: Option<i64>,
    fps: Option<u32>,
    preview: Option<PathBuf>,
    input: &mut R,
) -> Result<Config> {
    let mut config = match config_path {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            let mut config = Config::from_file(path)?;
            if let Some(output) = output {
                config.output.output_path = output;
            }
            if width.is_some() || height.is_some() {
                let current = config.output.dimensions;
                config.output.dimensions = Dimensions::new(
                    width.unwrap_or_else(|| i64::from(current.width())),
                    height.unwrap_or_else(|| i64::from(current.height())),
                )?;
            }
            config
        }
        None => {
            let output = match output {
                Some(path) => path,
                None => PathBuf::from(prompt(input, "Enter output video file path: ")?),
            };
            let width = match width {
                Some(width) => width,
                None => prompt_integer(input, "Enter desired final video width (integer): ")?,
            };
            let height = match height {
                Some(height) => height,
                None => prompt_integer(input, "Enter desired final video height (integer): ")?,
            };
            Config::new(output, Dimensions::new(width, height)?)
        }
    };

    if let Some(fps) = fps {
        config.output.frame_rate = fps;
    }
    if let Some(preview) = preview {
        config.calibration.preview_path = preview;
    }

    config.validate()?;
    Ok(config)
}

fn prompt<R: BufRead>(input: &mut R, label: &str) -> Result<String> {
    let mut stdout = io::stdout();
    write!(stdout, "{}", label)?;
    stdout.flush()?;

    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        anyhow::bail!("input closed while waiting for: {}", label.trim());
    }
    Ok(line.trim().to_string())
}

fn prompt_integer<R: BufRead>(input: &mut R, label: &str) -> Result<i64> {
    let answer = prompt(input, label)?;
    answer
        .parse()
        .with_context(|| format!("'{}' is not an integer", answer))
}
