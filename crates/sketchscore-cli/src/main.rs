//! sketchscore CLI — command-line interface for drawing scoring.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};

use sketchscore::{ScoreConfig, Scorer, ShapeTarget};

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "sketchscore")]
#[command(about = "Score hand-drawn task responses (clock drawings, figure copies, shapes)")]
#[command(version)]
struct Cli {
    /// Path to a JSON config; omitted sections keep their defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a clock drawing against an expected time.
    Clock(CliClockArgs),

    /// Score a patient's copy of a template figure.
    Figure(CliFigureArgs),

    /// Score a drawing against an ideal circle, square, or triangle.
    Shape(CliShapeArgs),
}

#[derive(Debug, Clone, Args)]
struct CliClockArgs {
    /// Path to the input image.
    #[arg(long)]
    image: PathBuf,

    /// Expected hour (1-12; values wrap on the dial).
    #[arg(long)]
    hour: u32,

    /// Expected minute (0-59).
    #[arg(long)]
    minute: u32,

    /// Path to write the analysis result (JSON).
    #[arg(long)]
    out: Option<PathBuf>,

    /// Path to write a PNG debug overlay.
    #[arg(long)]
    overlay: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
struct CliFigureArgs {
    /// Path to the template image.
    #[arg(long)]
    template: PathBuf,

    /// Path to the patient image.
    #[arg(long)]
    patient: PathBuf,

    /// Path to write the score (JSON).
    #[arg(long)]
    out: Option<PathBuf>,

    /// Path to write a PNG overlay of the aligned masks.
    #[arg(long)]
    overlay: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ShapeKindArg {
    Circle,
    Square,
    Triangle,
}

#[derive(Debug, Clone, Args)]
struct CliShapeArgs {
    /// Path to the input image.
    #[arg(long)]
    image: PathBuf,

    /// Target shape kind.
    #[arg(long, value_enum)]
    kind: ShapeKindArg,

    /// Ideal circle center as "x,y" (circle kind; defaults to canvas center).
    #[arg(long)]
    center: Option<String>,

    /// Ideal circle radius in canvas pixels (circle kind).
    #[arg(long)]
    radius: Option<f64>,

    /// Ideal vertices as "x1,y1 x2,y2 ..." (square/triangle kinds).
    #[arg(long)]
    vertices: Option<String>,

    /// Path to write the score (JSON).
    #[arg(long)]
    out: Option<PathBuf>,

    /// Path to write a PNG debug overlay.
    #[arg(long)]
    overlay: Option<PathBuf>,
}

fn main() -> CliResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let scorer = Scorer::with_config(load_config(cli.config.as_deref())?);

    match cli.command {
        Commands::Clock(args) => run_clock(&scorer, &args),
        Commands::Figure(args) => run_figure(&scorer, &args),
        Commands::Shape(args) => run_shape(&scorer, &args),
    }
}

fn load_config(path: Option<&Path>) -> CliResult<ScoreConfig> {
    match path {
        Some(p) => {
            let text = std::fs::read_to_string(p)?;
            Ok(serde_json::from_str(&text)?)
        }
        None => Ok(ScoreConfig::default()),
    }
}

// ── clock ──────────────────────────────────────────────────────────────

fn run_clock(scorer: &Scorer, args: &CliClockArgs) -> CliResult<()> {
    let bytes = std::fs::read(&args.image)?;
    let result = match &args.overlay {
        Some(overlay_path) => {
            let (result, png) = scorer.score_clock_with_overlay(&bytes, args.hour, args.minute)?;
            std::fs::write(overlay_path, png)?;
            result
        }
        None => scorer.score_clock(&bytes, args.hour, args.minute)?,
    };
    emit_json(&result, args.out.as_deref())
}

// ── figure ─────────────────────────────────────────────────────────────

fn run_figure(scorer: &Scorer, args: &CliFigureArgs) -> CliResult<()> {
    let template = std::fs::read(&args.template)?;
    let patient = std::fs::read(&args.patient)?;
    let score = match &args.overlay {
        Some(overlay_path) => {
            let (score, png) = scorer.score_figure_with_overlay(&template, &patient)?;
            std::fs::write(overlay_path, png)?;
            score
        }
        None => scorer.score_figure(&template, &patient)?,
    };
    emit_json(&score, args.out.as_deref())
}

// ── shape ──────────────────────────────────────────────────────────────

fn run_shape(scorer: &Scorer, args: &CliShapeArgs) -> CliResult<()> {
    let bytes = std::fs::read(&args.image)?;
    let target = shape_target(scorer, args)?;
    let score = match &args.overlay {
        Some(overlay_path) => {
            let (score, png) = scorer.score_shape_with_overlay(&bytes, &target)?;
            std::fs::write(overlay_path, png)?;
            score
        }
        None => scorer.score_shape(&bytes, &target)?,
    };
    emit_json(&score, args.out.as_deref())
}

fn shape_target(scorer: &Scorer, args: &CliShapeArgs) -> CliResult<ShapeTarget> {
    match args.kind {
        ShapeKindArg::Circle => {
            let side = f64::from(scorer.config().preprocess.canvas_size);
            let center = match &args.center {
                Some(s) => parse_point(s)?,
                None => [side / 2.0, side / 2.0],
            };
            let radius = args
                .radius
                .ok_or("--radius is required for --kind circle")?;
            Ok(ShapeTarget::Circle { center, radius })
        }
        ShapeKindArg::Square => Ok(ShapeTarget::Square {
            vertices: parse_vertices(args, 4)?,
        }),
        ShapeKindArg::Triangle => Ok(ShapeTarget::Triangle {
            vertices: parse_vertices(args, 3)?,
        }),
    }
}

fn parse_vertices(args: &CliShapeArgs, expected: usize) -> CliResult<Vec<[f64; 2]>> {
    let raw = args
        .vertices
        .as_deref()
        .ok_or("--vertices is required for polygon kinds")?;
    let vertices: Vec<[f64; 2]> = raw
        .split_whitespace()
        .map(parse_point)
        .collect::<CliResult<_>>()?;
    if vertices.len() != expected {
        return Err(format!(
            "expected {} vertices for this kind, got {}",
            expected,
            vertices.len()
        )
        .into());
    }
    Ok(vertices)
}

fn parse_point(s: &str) -> CliResult<[f64; 2]> {
    let (x, y) = s
        .split_once(',')
        .ok_or_else(|| format!("invalid point {s:?}, expected \"x,y\""))?;
    Ok([x.trim().parse::<f64>()?, y.trim().parse::<f64>()?])
}

fn emit_json<T: serde::Serialize>(value: &T, out: Option<&Path>) -> CliResult<()> {
    let json = serde_json::to_string_pretty(value)?;
    match out {
        Some(path) => std::fs::write(path, json)?,
        None => println!("{json}"),
    }
    Ok(())
}
