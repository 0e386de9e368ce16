use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use trackplay::boundary::Boundary;
use trackplay::config::Config;
use trackplay::readout::Readout;
use trackplay::session::{Selection, Session};
use trackplay::source::{parse_trip_metadata, FileSource};
use trackplay::track::PathGeometry;

#[derive(Parser)]
#[command(name = "trackplay")]
#[command(about = "Vehicle GPS track replay")]
struct Cli {
    /// YAML configuration file
    #[arg(long, global = true)]
    config: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct SelectionArgs {
    /// Device IMEI
    #[arg(long)]
    device: Option<String>,
    /// Window start, local civil time (e.g. 2025-03-18T15:37:58)
    #[arg(long)]
    start: Option<String>,
    /// Window end, local civil time
    #[arg(long)]
    end: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Normalize a track file and summarize the result
    Validate {
        track: PathBuf,
        #[command(flatten)]
        selection: SelectionArgs,
    },
    /// Play a track file to the end, printing the readout as it advances
    Replay {
        track: PathBuf,
        #[command(flatten)]
        selection: SelectionArgs,
        /// Tick interval (e.g. 20ms)
        #[arg(long)]
        interval: Option<String>,
    },
    /// Show the selection a trip file pre-fills
    Trip { trip: PathBuf },
    /// List configured devices
    Devices {
        #[arg(long, default_value = "")]
        search: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => match Config::from_file(path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Error loading config: {}", e);
                return ExitCode::FAILURE;
            }
        },
        None => Config::default(),
    };

    match cli.command {
        Commands::Validate { track, selection } => validate(&config, track, selection).await,
        Commands::Replay {
            track,
            selection,
            interval,
        } => replay(&config, track, selection, interval.as_deref()).await,
        Commands::Trip { trip } => trip_info(&config, &trip),
        Commands::Devices { search } => devices(&config, &search),
    }
}

fn open_session(
    config: &Config,
    track: PathBuf,
    args: SelectionArgs,
) -> Result<Session<FileSource>, String> {
    let source = FileSource::new(track, config.source.trip_dir.clone());
    let mut session = Session::new(source, config).map_err(|e| e.to_string())?;

    let defaults = config.selection.clone();
    session.set_selection(Selection {
        device_id: args.device.unwrap_or(defaults.device_id),
        start: args.start.unwrap_or(defaults.start),
        end: args.end.unwrap_or(defaults.end),
    });
    Ok(session)
}

async fn load(config: &Config, track: PathBuf, args: SelectionArgs) -> Option<Session<FileSource>> {
    let mut session = match open_session(config, track, args) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: {}", e);
            return None;
        }
    };

    if let Err(e) = session.load().await {
        let message = session.error().map_or_else(|| e.to_string(), str::to_string);
        eprintln!("Error: {}", message);
        return None;
    }
    Some(session)
}

async fn validate(config: &Config, track: PathBuf, args: SelectionArgs) -> ExitCode {
    let Some(session) = load(config, track, args).await else {
        return ExitCode::FAILURE;
    };

    let snapshot = session.controller().snapshot();
    let Some(samples) = snapshot.samples else {
        return ExitCode::FAILURE;
    };
    let boundary = session.boundary();
    let path = PathGeometry::new(&samples);

    println!(
        "Track is valid ({} samples for {})",
        samples.len(),
        samples.device_id()
    );
    if let (Some(first), Some(last)) = (samples.first(), samples.last()) {
        println!("  first: {}", boundary.display(first.timestamp));
        println!("  last:  {}", boundary.display(last.timestamp));
    }
    if let Some((start, end)) = path.endpoints() {
        println!(
            "  from ({:.5}, {:.5}) to ({:.5}, {:.5})",
            start.latitude, start.longitude, end.latitude, end.longitude
        );
    }
    println!("  length: {:.2} km", path.total_length_m() / 1000.0);
    ExitCode::SUCCESS
}

async fn replay(
    config: &Config,
    track: PathBuf,
    args: SelectionArgs,
    interval: Option<&str>,
) -> ExitCode {
    let Some(mut session) = load(config, track, args).await else {
        return ExitCode::FAILURE;
    };

    if let Some(interval) = interval {
        match humantime::parse_duration(interval.trim()) {
            Ok(d) => session.controller_mut().set_tick_interval(d),
            Err(e) => {
                eprintln!("Invalid interval '{}': {}", interval, e);
                return ExitCode::FAILURE;
            }
        }
    }

    let path = session
        .controller()
        .snapshot()
        .samples
        .map(|samples| PathGeometry::new(&samples));

    let mut updates = session.controller().subscribe();
    session.controller_mut().play();

    let mut last_index = None;
    loop {
        let snapshot = updates.borrow_and_update().clone();
        if snapshot.current_index != last_index {
            if let Some(readout) = Readout::from_snapshot(&snapshot, session.boundary()) {
                println!("{}", readout);
            }
            if let Some(marker) = path.as_ref().and_then(|p| p.position_at(snapshot.fraction())) {
                println!(
                    "  marker ({:.5}, {:.5}) heading {:.0}",
                    marker.point.latitude, marker.point.longitude, marker.heading
                );
            }
            last_index = snapshot.current_index;
        }
        if !snapshot.is_playing {
            break;
        }
        if updates.changed().await.is_err() {
            break;
        }
    }

    session.controller_mut().shutdown();
    println!("Replay completed");
    ExitCode::SUCCESS
}

fn trip_info(config: &Config, path: &Path) -> ExitCode {
    let boundary = match Boundary::from_config(&config.boundary) {
        Ok(b) => b,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let raw: serde_json::Value = match std::fs::read_to_string(path)
        .map_err(|e| e.to_string())
        .and_then(|c| serde_json::from_str(&c).map_err(|e| e.to_string()))
    {
        Ok(v) => v,
        Err(e) => {
            eprintln!("Error reading file: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match parse_trip_metadata(&raw) {
        Ok(meta) => {
            println!("device: {}", meta.device_id);
            println!("start:  {}", boundary.input_value(meta.expected_start));
            println!("end:    {}", boundary.input_value(meta.expected_end));
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Parse error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn devices(config: &Config, search: &str) -> ExitCode {
    let matches = config.search_devices(search);
    if matches.is_empty() {
        println!("No devices found");
    }
    for device in matches {
        if device.label == device.value {
            println!("  {}", device.value);
        } else {
            println!("  {}  {}", device.value, device.label);
        }
    }
    ExitCode::SUCCESS
}
