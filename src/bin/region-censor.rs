use std::path::{Path, PathBuf};
use std::process;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use image::Rgb;
use log::{info, warn};

use region_censor::{
    collect_images, default_output_path, load_image, load_overlay, BatchEvent, CensorEngine,
    CensorOptions, Detector, Effect, EffectConfig, FileOutcome, FileReport, ImageKey,
    LineDirection, SidecarDetector,
};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum EffectKind {
    Blur,
    Lines,
    Mist,
    Light,
    Overlay,
}

#[derive(Parser)]
#[command(
    name = "region-censor",
    about = "Censor detected image regions with blur, line screen, mist, light or overlay effects",
    version,
    after_help = "Detections are read from <image>.json next to each image, or from one \
                  file given with --detections.\n\
                  Example: region-censor photos/ -o censored/ --effect mist --labels face,plate"
)]
#[allow(clippy::struct_excessive_bools)]
struct Cli {
    /// Input image file or directory
    input: PathBuf,

    /// Output file or directory (default: {name}_censored.{ext})
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Effect to paint over each region
    #[arg(short, long, value_enum, default_value = "blur")]
    effect: EffectKind,

    /// Comma-separated labels to censor (default: all)
    #[arg(short, long, value_delimiter = ',')]
    labels: Vec<String>,

    /// Detector confidence threshold (0.0-1.0)
    #[arg(long, default_value = "0.25")]
    conf: f32,

    /// Detector IoU threshold (0.0-1.0)
    #[arg(long, default_value = "0.7")]
    iou: f32,

    /// Region scale about the box center
    #[arg(long, default_value = "1.0")]
    scale: f32,

    /// Effect strength (0.0-1.0); forces uniform opacity for overlays
    #[arg(short, long)]
    alpha: Option<f32>,

    /// Blur kernel size in pixels (made odd)
    #[arg(long, default_value = "31")]
    kernel: u32,

    /// Line thickness in pixels
    #[arg(long, default_value = "5")]
    line_thickness: u32,

    /// Line spacing in pixels
    #[arg(long, default_value = "10")]
    line_spacing: u32,

    /// Line direction: horizontal, vertical or diagonal
    #[arg(long, default_value = "horizontal")]
    direction: LineDirection,

    /// Mist or light color as r,g,b
    #[arg(long, value_parser = parse_color, default_value = "255,255,255")]
    color: Rgb<u8>,

    /// Light intensity (0.0-1.0)
    #[arg(long, default_value = "0.8")]
    intensity: f32,

    /// Light feathering percentage
    #[arg(long, default_value = "30")]
    feather: u32,

    /// Overlay image (required for --effect overlay)
    #[arg(long)]
    overlay: Option<PathBuf>,

    /// JSON file with detections to use for every image
    #[arg(long)]
    detections: Option<PathBuf>,

    /// Print detected labels instead of censoring
    #[arg(long)]
    list_labels: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all non-error output
    #[arg(short, long)]
    quiet: bool,
}

fn parse_color(s: &str) -> Result<Rgb<u8>, String> {
    let parts: Vec<&str> = s.split(',').map(str::trim).collect();
    let &[r, g, b] = parts.as_slice() else {
        return Err(format!("expected r,g,b but got '{s}'"));
    };
    let channel = |v: &str| {
        v.parse::<u8>()
            .map_err(|e| format!("invalid color channel '{v}': {e}"))
    };
    Ok(Rgb([channel(r)?, channel(g)?, channel(b)?]))
}

fn unit_range(name: &str, value: f32) {
    if !(0.0..=1.0).contains(&value) {
        eprintln!("Error: {name} must be between 0.0 and 1.0");
        process::exit(1);
    }
}

fn build_effect(cli: &Cli) -> Effect {
    match cli.effect {
        EffectKind::Blur => Effect::Blur {
            kernel_width: cli.kernel,
            kernel_height: cli.kernel,
        },
        EffectKind::Lines => Effect::LineScreen {
            thickness: cli.line_thickness,
            spacing: cli.line_spacing,
            direction: cli.direction,
        },
        EffectKind::Mist => Effect::Mist { color: cli.color },
        EffectKind::Light => Effect::Light {
            intensity: cli.intensity,
            feather_percent: cli.feather,
            color: cli.color,
        },
        EffectKind::Overlay => {
            let Some(path) = &cli.overlay else {
                eprintln!("Error: --effect overlay requires --overlay <image>");
                process::exit(1);
            };
            match load_overlay(path) {
                Ok(img) => Effect::overlay(img),
                Err(e) => {
                    eprintln!("Error: {e}");
                    process::exit(1);
                }
            }
        }
    }
}

fn build_detector(cli: &Cli) -> Option<Arc<dyn Detector>> {
    match &cli.detections {
        None => Some(Arc::new(SidecarDetector::per_image())),
        Some(path) => match SidecarDetector::from_file(path) {
            Ok(d) => Some(Arc::new(d)),
            Err(e) => {
                warn!("detector unavailable: {e}");
                None
            }
        },
    }
}

fn init_logging(cli: &Cli) {
    let level = if cli.quiet {
        "error"
    } else if cli.verbose {
        "debug"
    } else {
        "warn"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(&cli);

    unit_range("--conf", cli.conf);
    unit_range("--iou", cli.iou);
    unit_range("--intensity", cli.intensity);
    if let Some(alpha) = cli.alpha {
        unit_range("--alpha", alpha);
    }
    if cli.scale <= 0.0 || !cli.scale.is_finite() {
        eprintln!("Error: --scale must be a positive number");
        process::exit(1);
    }

    if !cli.input.exists() {
        eprintln!("Error: Input path does not exist: {}", cli.input.display());
        process::exit(1);
    }

    let engine = CensorEngine::new(build_detector(&cli));

    if cli.list_labels {
        process::exit(list_labels(&engine, &cli));
    }

    let mut effect = EffectConfig::new(build_effect(&cli)).with_scale(cli.scale);
    effect.alpha = cli.alpha;
    let opts = CensorOptions {
        effect,
        labels: Vec::new(),
        confidence: cli.conf,
        iou: cli.iou,
    }
    .with_labels(&cli.labels);

    if !cli.quiet {
        let labels = if opts.labels.is_empty() {
            "all labels".to_string()
        } else {
            opts.labels.join(", ")
        };
        eprintln!(
            "Effect: {} (scale {:.2}), censoring {labels}",
            opts.effect.effect.name(),
            opts.effect.scale
        );
        eprintln!();
    }

    let results = if cli.input.is_dir() {
        let Some(output_dir) = &cli.output else {
            eprintln!("Error: Output directory is required for batch processing");
            eprintln!("Usage: region-censor <input_dir> -o <output_dir>");
            process::exit(1);
        };
        let cancel = AtomicBool::new(false);
        let batch = engine.process_batch(&cli.input, output_dir, &opts, &cancel, |event| {
            match event {
                BatchEvent::File(report) => print_result(&report, &cli),
                BatchEvent::Progress { processed, total } => info!("{processed}/{total}"),
                BatchEvent::Started { total } => info!("found {total} image(s)"),
            }
        });
        match batch {
            Ok(report) => report.files,
            Err(e) => {
                eprintln!("Error: {e}");
                process::exit(1);
            }
        }
    } else {
        let output_path = cli
            .output
            .clone()
            .unwrap_or_else(|| default_output_path(&cli.input));
        let report = engine.process_file(&cli.input, &output_path, &opts);
        print_result(&report, &cli);
        vec![report]
    };

    let mut censored = 0u32;
    let mut untouched = 0u32;
    let mut failed = 0u32;
    for r in &results {
        match r.outcome {
            FileOutcome::Censored { .. } => censored += 1,
            FileOutcome::NoRegions => untouched += 1,
            FileOutcome::Failed => failed += 1,
        }
    }

    if results.len() > 1 && !cli.quiet {
        eprintln!();
        eprint!("[Summary] Censored: {censored}");
        if untouched > 0 {
            eprint!(", No regions: {untouched}");
        }
        if failed > 0 {
            eprint!(", Failed: {failed}");
        }
        eprintln!(" (Total: {})", results.len());
    }

    if failed > 0 {
        process::exit(1);
    }
}

fn list_labels(engine: &CensorEngine, cli: &Cli) -> i32 {
    let files = match collect_images(&cli.input) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Error: {e}");
            return 1;
        }
    };
    let mut code = 0;
    for file in &files {
        let labels = load_image(file).and_then(|img| {
            engine.available_labels(
                &ImageKey::from_path(file),
                &img,
                Some(file),
                cli.conf,
                cli.iou,
            )
        });
        match labels {
            Ok(labels) => println!("{}: {}", display_name(file), labels.join(", ")),
            Err(e) => {
                eprintln!("[FAIL] {}: {e}", display_name(file));
                code = 1;
            }
        }
    }
    code
}

fn display_name(path: &Path) -> String {
    path.file_name().map_or_else(
        || path.display().to_string(),
        |f| f.to_string_lossy().to_string(),
    )
}

fn print_result(result: &FileReport, cli: &Cli) {
    let filename = display_name(&result.path);
    match result.outcome {
        FileOutcome::Failed => eprintln!("[FAIL] {filename}: {}", result.message),
        _ if cli.quiet => {}
        FileOutcome::NoRegions => eprintln!("[SKIP] {filename}: {}", result.message),
        FileOutcome::Censored { regions } => eprintln!("[OK] {filename} ({regions} region(s))"),
    }

    if cli.verbose {
        if let Some(out) = &result.output {
            eprintln!("  -> {}", out.display());
        }
    }
}
