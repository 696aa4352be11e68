// traffic_monitor_main.rs
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use traffic_monitor::config::MonitorConfig;
use traffic_monitor::detection::{DetectionScript, Detector, RandomDetector, ReplayDetector};
use traffic_monitor::error::StartupError;
use traffic_monitor::global_variables::{DEFAULT_SOURCES, EXIT_KEY};
use traffic_monitor::monitoring::{LaneInput, TrafficMonitor};
use traffic_monitor::render::TerminalDisplay;
use traffic_monitor::video::open_sources;

/// Adaptive traffic signal control driven by per-lane camera frames.
#[derive(Parser, Debug)]
#[command(name = "traffic_monitor_main")]
struct Args {
    /// One frame source per lane: a directory of images or a single image.
    #[arg(default_values = DEFAULT_SOURCES)]
    sources: Vec<PathBuf>,

    /// JSON configuration file; missing keys use defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Replay detections from a JSON script instead of the random detector.
    #[arg(long)]
    detections: Option<PathBuf>,

    /// Seed for the random detector.
    #[arg(long)]
    seed: Option<u64>,

    /// Upper bound on objects the random detector reports per frame.
    #[arg(long, default_value_t = 12)]
    max_objects: u32,

    /// Write the combined view to this PNG periodically.
    #[arg(long)]
    preview: Option<PathBuf>,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn build_detectors(args: &Args, lanes: usize) -> Result<Vec<Box<dyn Detector>>, StartupError> {
    if let Some(path) = &args.detections {
        let script = DetectionScript::load(path)?;
        return Ok((0..lanes)
            .map(|lane| Box::new(ReplayDetector::new(script.clone(), lane)) as Box<dyn Detector>)
            .collect());
    }
    let seed = args.seed.unwrap_or_else(rand::random);
    Ok((0..lanes)
        .map(|lane| {
            Box::new(RandomDetector::new(seed.wrapping_add(lane as u64), args.max_objects))
                as Box<dyn Detector>
        })
        .collect())
}

fn run(args: Args) -> Result<(), StartupError> {
    let config = match &args.config {
        Some(path) => MonitorConfig::load(path)?,
        None => MonitorConfig::default(),
    };
    config.validate(args.sources.len())?;

    let sources = open_sources(&args.sources)?;
    let detectors = build_detectors(&args, sources.len())?;

    println!("Starting Traffic Monitoring System...");
    println!("Processing videos:");
    for (lane, path) in args.sources.iter().enumerate() {
        println!("Lane {}: {}", lane + 1, path.display());
    }
    println!("\nControls:");
    println!("- Type '{}' and press Enter to quit the application", EXIT_KEY);
    println!("- Press 'Ctrl+C' in the terminal to stop the system");

    let lanes = sources
        .into_iter()
        .zip(detectors)
        .map(|(source, detector)| LaneInput {
            source: Box::new(source),
            detector,
        })
        .collect();
    let monitor = TrafficMonitor::new(config.clone(), lanes)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let stop = CancellationToken::new();
    let result = runtime.block_on(async {
        let interrupt = stop.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                println!("Stopping traffic monitoring...");
                interrupt.cancel();
            }
        });
        let mut display = TerminalDisplay::open(args.preview.clone(), config.preview_every);
        monitor.run(&mut display, stop).await
    });
    // Lane threads still inside a detection call are abandoned here.
    runtime.shutdown_timeout(config.shutdown_grace);

    let report = result?;
    println!(
        "Traffic monitoring stopped ({:?}, {} views shown)",
        report.reason, report.views_shown
    );
    Ok(())
}
