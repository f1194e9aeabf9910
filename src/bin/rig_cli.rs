use std::collections::VecDeque;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use rig_telemetry::calibration::{CalibrationKind, CalibrationOutcome};
use rig_telemetry::config::AppConfig;
use rig_telemetry::fixtures::FixtureCatalog;
use rig_telemetry::location::Coordinate;
use rig_telemetry::runtime::{
    Clock, Collaborators, ManualClock, NoopKeepAlive, SessionDriver, SystemClock,
};
use rig_telemetry::session::{AuthorizationStatus, Session, SessionAction, SessionEvent};
use rig_telemetry::sim::{SimulatedSensor, SimulationSpec};
use rig_telemetry::transport::{StdoutTransport, Transport};

#[derive(Parser, Debug)]
#[command(
    name = "rig_cli",
    about = "Deterministic telemetry harness for the camera rig watch session"
)]
struct Cli {
    /// Override directory containing fix tracks (defaults to fixtures/)
    #[arg(long)]
    fixtures_dir: Option<PathBuf>,
    /// JSON configuration file; defaults are used when omitted or unreadable
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Replay a recorded track through a session and print every payload
    Replay {
        /// Track name under the fixtures directory, or a path to a .jsonl file
        #[arg(long)]
        input: String,
        /// Start a calibration run of this kind at the first fix
        #[arg(long)]
        calibrate: Option<CalibrationKind>,
        /// Delay between a fix's timestamp and its arrival at the session
        #[arg(long, default_value_t = 0)]
        latency_ms: u64,
    },
    /// Run the async driver against the simulated sensor
    Simulate(SimulateArgs),
    /// Print the effective configuration as JSON
    Config,
    /// List available tracks on disk
    DumpFixtures,
}

#[derive(Args, Debug)]
struct SimulateArgs {
    #[arg(long)]
    calibrate: Option<CalibrationKind>,
    #[arg(long, default_value_t = 5_000)]
    duration_ms: u64,
    #[arg(long, default_value_t = 5.0)]
    rate_hz: f64,
    #[arg(long, default_value_t = 0)]
    seed: u64,
    #[arg(long, default_value_t = 47.3769, allow_hyphen_values = true)]
    lat: f64,
    #[arg(long, default_value_t = 8.5417, allow_hyphen_values = true)]
    lon: f64,
}

fn main() -> ExitCode {
    rig_telemetry::init_logging();

    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    let catalog = cli
        .fixtures_dir
        .map(FixtureCatalog::new)
        .unwrap_or_default();
    let config = cli
        .config
        .map(AppConfig::load_from_file)
        .unwrap_or_default();

    match cli.command {
        Commands::Replay {
            input,
            calibrate,
            latency_ms,
        } => run_replay(&catalog, config, &input, calibrate, latency_ms),
        Commands::Simulate(args) => run_simulate(config, args),
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(ExitCode::from(0))
        }
        Commands::DumpFixtures => run_dump(&catalog),
    }
}

fn run_replay(
    catalog: &FixtureCatalog,
    config: AppConfig,
    input: &str,
    calibrate: Option<CalibrationKind>,
    latency_ms: u64,
) -> Result<ExitCode> {
    let samples = catalog
        .load(input)
        .with_context(|| format!("loading track {}", input))?;
    let Some(first) = samples.first() else {
        bail!("Track '{}' contains no fixes", input);
    };

    let latency = chrono::Duration::milliseconds(latency_ms as i64);
    let clock = ManualClock::new(first.timestamp + latency);
    let mut replay = Replay::new(config, StdoutTransport);

    replay.apply(
        SessionEvent::AuthorizationChanged(AuthorizationStatus::Authorized),
        clock.now(),
    );
    replay.apply(SessionEvent::StartAcquisition, clock.now());
    if let Some(kind) = calibrate {
        replay.apply(SessionEvent::StartCalibration(kind), clock.now());
    }

    for sample in &samples {
        clock.set(sample.timestamp + latency);
        // an overdue run finishes before the next fix can join it
        replay.apply(SessionEvent::Tick, clock.now());
        replay.apply(SessionEvent::Sample(*sample), clock.now());
    }

    if let Some(deadline) = replay.deadline {
        if deadline > clock.now() {
            clock.set(deadline);
        }
        replay.apply(SessionEvent::Tick, clock.now());
    }
    replay.apply(SessionEvent::StopAcquisition, clock.now());

    let snapshot = replay.session.snapshot(clock.now());
    println!(
        "{}",
        serde_json::to_string(&serde_json::json!({ "summary": snapshot }))?
    );

    match (calibrate, &replay.outcome) {
        (Some(_), Some(outcome)) if outcome.is_completed() => Ok(ExitCode::from(0)),
        (Some(kind), outcome) => {
            eprintln!(
                "{} calibration did not complete: {}",
                kind.display_name(),
                replay
                    .session
                    .status_message()
                    .unwrap_or("no outcome recorded")
            );
            log::debug!("[Replay] Final outcome: {:?}", outcome);
            Ok(ExitCode::from(2))
        }
        (None, _) => Ok(ExitCode::from(0)),
    }
}

/// Synchronous host for a session during replay
///
/// Every send goes straight to the transport; the result is fed back before
/// the next fix.
struct Replay<T: Transport> {
    session: Session,
    transport: T,
    deadline: Option<DateTime<Utc>>,
    outcome: Option<CalibrationOutcome>,
}

impl<T: Transport> Replay<T> {
    fn new(config: AppConfig, transport: T) -> Self {
        Self {
            session: Session::new(config),
            transport,
            deadline: None,
            outcome: None,
        }
    }

    fn apply(&mut self, event: SessionEvent, now: DateTime<Utc>) {
        let mut pending = VecDeque::from([event]);
        while let Some(event) = pending.pop_front() {
            for action in self.session.handle(event, now) {
                match action {
                    SessionAction::Send(message) => {
                        let kind = message.kind();
                        match self.transport.send(&message) {
                            Ok(()) => pending.push_back(SessionEvent::DeliverySucceeded { kind }),
                            Err(error) => {
                                pending.push_back(SessionEvent::DeliveryFailed { kind, error })
                            }
                        }
                    }
                    SessionAction::ArmDeadline { at, .. } => self.deadline = Some(at),
                    SessionAction::DisarmDeadline { .. } => self.deadline = None,
                    SessionAction::CalibrationFinished(outcome) => self.outcome = Some(outcome),
                    other => log::debug!("[Replay] No host effect for {:?}", other),
                }
            }
        }
    }
}

fn run_simulate(config: AppConfig, args: SimulateArgs) -> Result<ExitCode> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("building tokio runtime")?;
    runtime.block_on(simulate(config, args))
}

async fn simulate(config: AppConfig, args: SimulateArgs) -> Result<ExitCode> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock::default());
    let spec = SimulationSpec {
        rate_hz: args.rate_hz,
        seed: args.seed,
        ..SimulationSpec::around(Coordinate::new(args.lat, args.lon))
    };
    if !spec.center.is_valid() {
        bail!("Invalid centre coordinate {}, {}", args.lat, args.lon);
    }

    let mut driver = SessionDriver::new(
        config,
        Collaborators {
            transport: Arc::new(StdoutTransport),
            sensor: Arc::new(SimulatedSensor::new(spec, Arc::clone(&clock))),
            keepalive: Arc::new(NoopKeepAlive),
            clock,
        },
    );
    rig_telemetry::http::spawn_if_enabled(driver.broadcasts(), driver.telemetry());

    let sink = driver.event_sink();
    let task = tokio::spawn(async move {
        driver.run().await;
        driver
    });

    sink.push(SessionEvent::StartAcquisition);
    if let Some(kind) = args.calibrate {
        sink.push(SessionEvent::StartCalibration(kind));
    }

    tokio::select! {
        _ = tokio::time::sleep(StdDuration::from_millis(args.duration_ms)) => {}
        _ = tokio::signal::ctrl_c() => log::info!("[Simulate] Interrupted"),
    }

    sink.shutdown();
    let driver = task.await.context("driver task failed")?;

    println!(
        "{}",
        serde_json::to_string(&serde_json::json!({
            "summary": driver.snapshot(),
            "telemetry": driver.telemetry().snapshot(),
        }))?
    );
    Ok(ExitCode::from(0))
}

fn run_dump(catalog: &FixtureCatalog) -> Result<ExitCode> {
    let tracks = catalog.discover()?;
    if tracks.is_empty() {
        println!("No tracks found under {}", catalog.root().display());
        return Ok(ExitCode::from(0));
    }

    for track in tracks {
        println!("{} -> {}", track.name, track.path.display());
    }
    Ok(ExitCode::from(0))
}
