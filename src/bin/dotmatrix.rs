use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use dotmatrix::JobConfig;

#[derive(Parser, Debug)]
#[command(name = "dotmatrix", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert a still image into a dot-matrix image.
    Image(ImageArgs),
    /// Convert a video into a dot-matrix MP4 (requires `ffmpeg` and `ffprobe` on PATH).
    Video(VideoArgs),
}

#[derive(Args, Debug)]
struct CommonArgs {
    /// Input file.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Output file. The format follows the extension for images; videos are always MP4.
    #[arg(long)]
    out: PathBuf,

    /// Job config JSON. Flags given on the command line take precedence.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Dot diameter (cell size) in pixels.
    #[arg(long)]
    dot_size: Option<u32>,

    /// Gap between cells in pixels.
    #[arg(long)]
    spacing: Option<u32>,

    /// How each cell's brightness is measured.
    #[arg(long, value_enum)]
    sampling: Option<SamplingChoice>,
}

#[derive(Args, Debug)]
struct ImageArgs {
    #[command(flatten)]
    common: CommonArgs,

    /// Downscale images wider than this before rendering.
    #[arg(long)]
    max_width: Option<u32>,

    /// Downscale images taller than this before rendering.
    #[arg(long)]
    max_height: Option<u32>,
}

#[derive(Args, Debug)]
struct VideoArgs {
    #[command(flatten)]
    common: CommonArgs,

    /// Decode frames so the longer side is at most this many pixels.
    #[arg(long)]
    max_dim: Option<u32>,

    /// Drop frames to approach this output frame rate.
    #[arg(long)]
    fps: Option<f64>,

    /// Render frames on the calling thread instead of the worker pool.
    #[arg(long)]
    sequential: bool,

    /// Worker thread count.
    #[arg(long)]
    threads: Option<usize>,

    /// Maximum frames decoded ahead of rendering.
    #[arg(long)]
    in_flight: Option<usize>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum SamplingChoice {
    TopLeft,
    BlockAverage,
}

impl From<SamplingChoice> for dotmatrix::SampleMode {
    fn from(c: SamplingChoice) -> Self {
        match c {
            SamplingChoice::TopLeft => Self::TopLeft,
            SamplingChoice::BlockAverage => Self::BlockAverage,
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Image(args) => cmd_image(args),
        Command::Video(args) => cmd_video(args),
    }
}

fn load_config(common: &CommonArgs) -> anyhow::Result<JobConfig> {
    let mut cfg = match &common.config {
        Some(path) => JobConfig::from_path(path)?,
        None => JobConfig::default(),
    };
    if let Some(v) = common.dot_size {
        cfg.dot_size = v;
    }
    if let Some(v) = common.spacing {
        cfg.spacing = v;
    }
    if let Some(v) = common.sampling {
        cfg.sampling = v.into();
    }
    Ok(cfg)
}

fn cmd_image(args: ImageArgs) -> anyhow::Result<()> {
    let mut cfg = load_config(&args.common)?;
    if args.max_width.is_some() {
        cfg.max_width = args.max_width;
    }
    if args.max_height.is_some() {
        cfg.max_height = args.max_height;
    }
    cfg.validate()?;

    let input = dotmatrix::load_image(&args.common.in_path)
        .with_context(|| format!("load image '{}'", args.common.in_path.display()))?;
    let input = match cfg.image_bounds() {
        Some((w, h)) => dotmatrix::downscale(input, w, h)?,
        None => input,
    };

    let output = dotmatrix::render(&input, &cfg.params())?;
    dotmatrix::save_image(&output, &args.common.out)?;

    eprintln!("wrote {}", args.common.out.display());
    Ok(())
}

fn cmd_video(args: VideoArgs) -> anyhow::Result<()> {
    let mut cfg = load_config(&args.common)?;
    if args.max_dim.is_some() {
        cfg.max_dim = args.max_dim;
    }
    if args.fps.is_some() {
        cfg.target_fps = args.fps;
    }
    if args.sequential {
        cfg.pipeline.parallel = false;
    }
    if args.threads.is_some() {
        cfg.pipeline.threads = args.threads;
    }
    if let Some(n) = args.in_flight {
        cfg.pipeline.in_flight = n;
    }
    cfg.validate()?;

    let source = dotmatrix::FfmpegSource::open(dotmatrix::FfmpegSourceOpts {
        path: args.common.in_path.clone(),
        max_dim: cfg.max_dim,
    })?;
    let params = source.scaled_params(cfg.params());
    if let Some(factor) = source.downscale_factor() {
        tracing::info!(
            factor,
            dot_size = params.dot_size,
            spacing = params.spacing,
            "scaling dots with the downscaled video"
        );
    }

    let mut source: Box<dyn dotmatrix::FrameSource> = match cfg.target_fps {
        Some(target) => {
            let target = fps_from_f64(target)?;
            let decimated = dotmatrix::Decimate::to_fps(source, target);
            tracing::info!(every = decimated.every(), "decimating frames");
            Box::new(decimated)
        }
        None => Box::new(source),
    };

    let mut sink = dotmatrix::FfmpegSink::new(dotmatrix::FfmpegSinkOpts::new(&args.common.out));
    let stats = dotmatrix::process_with(source.as_mut(), &mut sink, &params, &cfg.pipeline)?;

    eprintln!(
        "wrote {} ({} frames)",
        args.common.out.display(),
        stats.frames_processed
    );
    Ok(())
}

/// Rational approximation of a user-supplied frame rate, in thousandths.
fn fps_from_f64(fps: f64) -> anyhow::Result<dotmatrix::Fps> {
    let num = (fps * 1000.0).round();
    if !(num >= 1.0 && num <= f64::from(u32::MAX)) {
        anyhow::bail!("invalid --fps {fps}");
    }
    Ok(dotmatrix::Fps::new(num as u32, 1000)?)
}
