//! Radar Dashboard - headless dashboard runner
//!
//! Follows a live telemetry stream or replays a recording through the
//! dashboard pipeline and prints what the dashboard would show.

use dashboard_core::app::cli::{Cli, Commands, ConfigAction};
use dashboard_core::app::config::Config;
use dashboard_core::pipeline::{
    DashboardPipeline, DashboardSnapshot, DashboardSummary, IngestStats, PublishCause,
};
use dashboard_core::session::DashboardSession;
use dashboard_core::transport::{ConnectionState, Transport};
use dashboard_core::usecase::UseCaseConfig;
use std::io::BufRead;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// How often the watch loop checks the stop flag while idle
const POLL_INTERVAL: Duration = Duration::from_millis(200);

fn main() -> anyhow::Result<()> {
    // Parse CLI arguments first so we can use --verbose to set log level
    let cli = Cli::parse_args();

    // Initialize tracing (--verbose enables debug-level output)
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);

    // Load config
    let config = if let Some(path) = &cli.config {
        Config::load(path)?
    } else {
        Config::load_default()?
    };

    // Execute command
    match cli.command {
        Commands::Watch {
            endpoint,
            use_case,
            duration,
            no_handshake,
            json,
        } => {
            run_watch(endpoint, use_case, duration, no_handshake, json, &config)?;
        }
        Commands::Replay {
            input,
            use_case,
            json,
        } => {
            run_replay(&input, use_case, json, &config)?;
        }
        Commands::UseCases { detailed } => {
            run_use_cases(detailed, &config)?;
        }
        Commands::Init { force } => {
            run_init(force, &config, &config_path)?;
        }
        Commands::Config { action } => {
            run_config(action, &config, &config_path)?;
        }
    }

    Ok(())
}

fn select_use_case(config: &Config, requested: Option<String>) -> anyhow::Result<Arc<UseCaseConfig>> {
    let registry = config.registry()?;
    let id = requested.unwrap_or_else(|| config.session.use_case.clone());
    Ok(registry.require(&id)?)
}

fn run_watch(
    endpoint: Option<String>,
    use_case: Option<String>,
    duration: u64,
    no_handshake: bool,
    json: bool,
    config: &Config,
) -> anyhow::Result<()> {
    let use_case = select_use_case(config, use_case)?;
    let endpoint = endpoint.unwrap_or_else(|| config.transport.endpoint.clone());
    let send_handshake = config.transport.send_handshake && !no_handshake;

    info!(endpoint = %endpoint, use_case = %use_case.id, "Watching live stream");
    if duration > 0 {
        info!("Stopping after {} seconds", duration);
    }
    info!("Press Ctrl+C to stop");

    // Set up Ctrl+C handler
    let stop_flag = Arc::new(AtomicBool::new(false));
    let stop_flag_handler = stop_flag.clone();
    ctrlc::set_handler(move || {
        stop_flag_handler.store(true, Ordering::SeqCst);
    })?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    let (summary, stats, failure) = runtime.block_on(async {
        let transport =
            Transport::websocket()?.with_queue_capacity(config.transport.queue_capacity)?;
        let mut pipeline = DashboardPipeline::new(use_case, config.pipeline_settings())?;
        pipeline.subscribe(Box::new(move |snapshot| print_snapshot(snapshot, json)));

        let mut session =
            DashboardSession::new(transport, pipeline)?.with_handshake(send_handshake);
        session.start(&endpoint);

        let deadline = (duration > 0).then(|| Instant::now() + Duration::from_secs(duration));
        loop {
            if stop_flag.load(Ordering::SeqCst) {
                info!("Stop requested");
                break;
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                info!("Duration elapsed");
                break;
            }
            match tokio::time::timeout(POLL_INTERVAL, session.pump()).await {
                Ok(true) | Err(_) => {}
                Ok(false) => break,
            }
        }

        let failure = match session.state() {
            ConnectionState::Errored => session.transport().last_error().cloned(),
            _ => None,
        };
        session.close();
        let stats = session.pipeline().stats();
        Ok::<_, anyhow::Error>((session.summary(), stats, failure))
    })?;

    print_summary(&summary, &stats, json);

    if let Some(error) = failure {
        anyhow::bail!("Connection to {} failed: {}", endpoint, error);
    }
    Ok(())
}

fn run_replay(
    input: &Path,
    use_case: Option<String>,
    json: bool,
    config: &Config,
) -> anyhow::Result<()> {
    if !input.exists() {
        anyhow::bail!("Recording file not found: {:?}", input);
    }
    let use_case = select_use_case(config, use_case)?;
    info!("Replaying {:?} as '{}'", input, use_case.id);

    let mut pipeline = DashboardPipeline::new(use_case, config.pipeline_settings())?;
    pipeline.subscribe(Box::new(move |snapshot| print_snapshot(snapshot, json)));

    let reader = std::io::BufReader::new(std::fs::File::open(input)?);
    let mut sequence = 0u64;
    for line in reader.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        pipeline.ingest_text(sequence, line);
        sequence += 1;
    }

    info!("Replayed {} frames", sequence);
    print_summary(&pipeline.summary(), &pipeline.stats(), json);
    Ok(())
}

fn run_use_cases(detailed: bool, config: &Config) -> anyhow::Result<()> {
    let registry = config.registry()?;

    println!("Use cases:\n");
    for use_case in registry.iter() {
        let marker = if use_case.id == config.session.use_case {
            "*"
        } else {
            " "
        };
        println!("{} {:<16} {}", marker, use_case.id, use_case.name);

        if detailed {
            if !use_case.description.is_empty() {
                println!("    {}", use_case.description);
            }
            let labels: Vec<String> = (0..use_case.num_classes)
                .map(|i| use_case.class_label(i))
                .collect();
            println!("    Classes: {}", labels.join(", "));
            println!("    Metric: {:?}", use_case.metric);
            println!("    Visualizations: {:?}", use_case.visualizations);
            println!("    Required fields: {}", use_case.required_paths().join(", "));
            println!();
        }
    }

    Ok(())
}

fn run_init(force: bool, config: &Config, config_path: &Path) -> anyhow::Result<()> {
    if config_path.exists() && !force {
        anyhow::bail!(
            "Config already exists at {:?}. Use --force to overwrite.",
            config_path
        );
    }

    config.save(config_path)?;
    println!("Created config at {:?}", config_path);
    println!("\nConfig content:\n{}", config.to_toml()?);

    Ok(())
}

fn run_config(action: ConfigAction, config: &Config, config_path: &Path) -> anyhow::Result<()> {
    match action {
        ConfigAction::Show => {
            let toml_str = config.to_toml()?;
            println!("Configuration ({:?}):\n", config_path);
            println!("{}", toml_str);
        }
        ConfigAction::Get { key } => {
            let value = config.get_value(&key)?;
            println!("{} = {}", key, value);
        }
        ConfigAction::Set { key, value } => {
            if !config_path.exists() {
                anyhow::bail!("No config file found. Run 'radar-dash init' first.");
            }

            // Load, modify, and save
            let mut updated = Config::load(config_path)?;
            updated.set_value(&key, &value)?;
            updated.save(config_path)?;
            println!("Set {} = {}", key, value);
        }
        ConfigAction::Reset { force } => {
            if config_path.exists() && !force {
                println!("Config exists at {:?}", config_path);
                println!("Use --force to reset to defaults");
                return Ok(());
            }

            Config::default().save(config_path)?;
            println!("Configuration reset to defaults at {:?}", config_path);
        }
    }

    Ok(())
}

fn print_snapshot(snapshot: &DashboardSnapshot<'_>, json: bool) {
    if json {
        match serde_json::to_string(&snapshot.summary()) {
            Ok(line) => println!("{}", line),
            Err(e) => warn!("Failed to serialize snapshot: {}", e),
        }
        return;
    }

    match snapshot.cause {
        PublishCause::Frame { sequence } => {
            let stats = snapshot.stats;
            let raw = snapshot
                .latest_frame
                .map(|f| format_vector(f.class_probabilities()))
                .unwrap_or_default();
            let smoothed = snapshot
                .smoothed
                .map(|s| format_vector(s))
                .unwrap_or_default();
            println!(
                "#{:<5} seq={:<5} raw={} smoothed={} avg={} max={} events={}",
                snapshot.revision,
                sequence,
                raw,
                smoothed,
                format_option(stats.running_average()),
                format_option(stats.running_max()),
                stats.event_count(),
            );
        }
        PublishCause::Connection => {
            println!("#{:<5} connection {}", snapshot.revision, snapshot.connection);
        }
        PublishCause::SessionReset => {
            println!(
                "#{:<5} session {} started ({})",
                snapshot.revision, snapshot.session_id, snapshot.use_case.id
            );
        }
    }
}

fn print_summary(summary: &DashboardSummary, stats: &IngestStats, json: bool) {
    if json {
        let document = serde_json::json!({ "summary": summary, "ingest": stats });
        println!("{}", document);
        return;
    }

    println!("\nSession Summary");
    println!("  Session: {}", summary.session_id);
    println!("  Use case: {}", summary.use_case);
    println!("  Connection: {}", summary.connection);
    println!("  Frames accepted: {}", stats.accepted);
    println!("  Frames dropped: {}", stats.malformed);
    if stats.config_mismatches > 0 {
        println!("  Class count mismatches: {}", stats.config_mismatches);
    }
    if stats.sequence_gaps > 0 {
        println!("  Sequence gaps: {}", stats.sequence_gaps);
    }
    println!("  Average: {}", format_option(summary.running_average));
    println!("  Maximum: {}", format_option(summary.running_max));
    if let Some(class) = &summary.predicted_class {
        println!(
            "  Latest prediction: {} ({})",
            class,
            format_option(summary.confidence)
        );
    }
    println!("  Events: {}", summary.event_count);
    if let Some(event) = &summary.last_event {
        println!("  Last event: seq {} at {}", event.sequence, event.timestamp);
    }
}

fn format_vector(values: &[f64]) -> String {
    let parts: Vec<String> = values.iter().map(|v| format!("{:.3}", v)).collect();
    format!("[{}]", parts.join(", "))
}

fn format_option(value: Option<f64>) -> String {
    value
        .map(|v| format!("{:.3}", v))
        .unwrap_or_else(|| "-".to_string())
}
