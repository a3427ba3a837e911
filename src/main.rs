//! Search Analytics CLI
//!
//! Encode search states and replay recorded search sessions through the
//! connector.

use anyhow::Context;
use clap::{Parser, Subcommand};
use crossbeam_channel::Sender;
use search_analytics_connector::{
    comparison_key,
    config::Config,
    encode_state,
    stats::{create_shared_stats_with_persistence, ReportStats},
    AnalyticsConnector, ChannelInteractionSource, InteractionEvent, JsonLinesSink, PushFunction,
    SearchSnapshot, StateSnapshot, VERSION,
};
use serde::Deserialize;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[cfg(feature = "http-sink")]
use search_analytics_connector::{HttpSink, HttpSinkConfig};

#[derive(Parser)]
#[command(name = "search-analytics")]
#[command(version = VERSION)]
#[command(about = "Debounced analytics reporting for search refinement state", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the refinement encoding of a search state
    Encode {
        /// JSON file with a search state or a `{ "state": ... }` render payload (stdin if omitted)
        file: Option<PathBuf>,
    },

    /// Replay a recorded session script through the connector
    Replay {
        /// JSON-lines script of render / interaction / teardown events
        file: PathBuf,

        /// Quiet period in milliseconds (overrides config)
        #[arg(long)]
        delay: Option<u64>,

        /// Flush immediately on interaction and teardown events
        #[arg(long)]
        trigger_on_ui_interaction: bool,

        /// Write reports to this file instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// POST reports to this endpoint (requires http-sink feature)
        #[arg(long)]
        endpoint: Option<String>,
    },

    /// Show or update configuration
    Config {
        /// Quiet period in milliseconds
        #[arg(long)]
        delay: Option<u64>,

        /// Flush on interaction and teardown by default
        #[arg(long)]
        trigger_on_ui_interaction: Option<bool>,

        /// Analytics endpoint for the HTTP sink
        #[arg(long)]
        endpoint: Option<String>,
    },

    /// Show persisted report statistics
    Stats {
        /// Reset the counters
        #[arg(long)]
        reset: bool,
    },
}

/// One step of a replay script.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ReplayEvent {
    Render {
        #[serde(default)]
        wait_ms: u64,
        #[serde(default)]
        state: StateSnapshot,
        #[serde(default)]
        results: serde_json::Value,
    },
    Interaction {
        #[serde(default)]
        wait_ms: u64,
    },
    Teardown {
        #[serde(default)]
        wait_ms: u64,
    },
}

impl ReplayEvent {
    fn wait(&self) -> Duration {
        let ms = match self {
            ReplayEvent::Render { wait_ms, .. }
            | ReplayEvent::Interaction { wait_ms }
            | ReplayEvent::Teardown { wait_ms } => *wait_ms,
        };
        Duration::from_millis(ms)
    }
}

fn main() {
    init_logging();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Encode { file } => cmd_encode(file.as_deref()),
        Commands::Replay {
            file,
            delay,
            trigger_on_ui_interaction,
            output,
            endpoint,
        } => cmd_replay(&file, delay, trigger_on_ui_interaction, output, endpoint),
        Commands::Config {
            delay,
            trigger_on_ui_interaction,
            endpoint,
        } => cmd_config(delay, trigger_on_ui_interaction, endpoint),
        Commands::Stats { reset } => cmd_stats(reset),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn cmd_encode(file: Option<&Path>) -> anyhow::Result<()> {
    let content = match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Could not read {}", path.display()))?,
        None => {
            let mut buffer = String::new();
            std::io::stdin().read_to_string(&mut buffer)?;
            buffer
        }
    };

    let state = parse_state(&content)?;
    let encoded = encode_state(&state);

    println!("Encoded refinements: {encoded}");
    println!("Comparison key:      {}", comparison_key(&state.query, &encoded));
    Ok(())
}

/// Accept either a bare state or a render payload with a `state` field.
fn parse_state(content: &str) -> anyhow::Result<StateSnapshot> {
    let value: serde_json::Value = serde_json::from_str(content).context("Invalid JSON")?;
    if value.get("state").is_some_and(serde_json::Value::is_object) {
        let snapshot: SearchSnapshot =
            serde_json::from_value(value).context("Invalid render payload")?;
        Ok(snapshot.state)
    } else {
        serde_json::from_value(value).context("Invalid search state")
    }
}

fn cmd_replay(
    file: &Path,
    delay: Option<u64>,
    trigger_on_ui_interaction: bool,
    output: Option<PathBuf>,
    endpoint: Option<String>,
) -> anyhow::Result<()> {
    let mut config = Config::load().unwrap_or_default();
    if let Some(ms) = delay {
        config.delay = Duration::from_millis(ms);
    }
    if trigger_on_ui_interaction {
        config.trigger_on_ui_interaction = true;
    }
    if endpoint.is_some() {
        config.endpoint = endpoint;
    }
    if let Err(e) = config.ensure_directories() {
        tracing::warn!("Could not create directories: {e}");
    }

    let script = read_script(file)?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to create runtime")?;

    let stats = create_shared_stats_with_persistence(config.stats_path());
    let push = build_push_function(&config, output, runtime.handle())?;
    let connector = AnalyticsConnector::builder()
        .boxed_push_function(push)
        .config(&config)
        .runtime(runtime.handle().clone())
        .stats(Arc::clone(&stats))
        .build()?;

    let source = ChannelInteractionSource::new();
    connector.init(&source);
    let events = source.sender();
    let dispatcher = source.start()?;

    // Ctrl+C behaves like the page going away: flush, then stop.
    let running = Arc::new(AtomicBool::new(true));
    ctrlc_handler(Arc::clone(&running), events.clone())?;

    tracing::info!(
        events = script.len(),
        delay_ms = config.delay.as_millis() as u64,
        trigger_on_ui_interaction = config.trigger_on_ui_interaction,
        "Replaying session"
    );

    runtime.block_on(async {
        for event in script {
            if !wait_while_running(event.wait(), &running).await {
                break;
            }
            match event {
                ReplayEvent::Render { state, results, .. } => connector.render(state, results),
                ReplayEvent::Interaction { .. } => {
                    let _ = events.send(InteractionEvent::Interaction);
                }
                ReplayEvent::Teardown { .. } => {
                    let _ = events.send(InteractionEvent::Teardown);
                }
            }
        }

        // Let the last debounced report fire.
        if connector.has_pending_report() {
            wait_while_running(connector.delay() + Duration::from_millis(1), &running).await;
        }
    });

    // End of session.
    let _ = events.send(InteractionEvent::Teardown);
    if dispatcher.join().is_err() {
        tracing::warn!("Interaction dispatcher panicked");
    }

    // Give spawned deliveries a moment to complete.
    if config.endpoint.is_some() {
        runtime.block_on(tokio::time::sleep(Duration::from_secs(1)));
    }

    if let Err(e) = stats.save() {
        tracing::warn!("Could not save report stats: {e}");
    }

    eprintln!();
    eprintln!("{}", stats.summary());
    Ok(())
}

/// Sleep for `duration` unless interrupted. Returns false if interrupted.
async fn wait_while_running(duration: Duration, running: &AtomicBool) -> bool {
    let step = Duration::from_millis(100);
    let mut remaining = duration;
    while !remaining.is_zero() {
        if !running.load(Ordering::SeqCst) {
            return false;
        }
        let chunk = remaining.min(step);
        tokio::time::sleep(chunk).await;
        remaining -= chunk;
    }
    running.load(Ordering::SeqCst)
}

fn read_script(path: &Path) -> anyhow::Result<Vec<ReplayEvent>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Could not open {}", path.display()))?;
    parse_script(BufReader::new(file))
}

/// Parse a JSON-lines script; blank lines and `#` comments are skipped.
fn parse_script(reader: impl BufRead) -> anyhow::Result<Vec<ReplayEvent>> {
    let mut events = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let event: ReplayEvent = serde_json::from_str(trimmed)
            .with_context(|| format!("Invalid event on line {}", index + 1))?;
        events.push(event);
    }
    Ok(events)
}

#[cfg_attr(not(feature = "http-sink"), allow(unused_variables))]
fn build_push_function(
    config: &Config,
    output: Option<PathBuf>,
    runtime: &tokio::runtime::Handle,
) -> anyhow::Result<PushFunction> {
    #[cfg(feature = "http-sink")]
    if let Some(ref endpoint) = config.endpoint {
        let mut http = HttpSinkConfig::new(endpoint.clone());
        if let Some(ref token) = config.token {
            http = http.with_token(token.clone());
        }
        tracing::info!(%endpoint, "Posting reports to analytics endpoint");
        return Ok(HttpSink::new(http, runtime.clone())?.into_push_function());
    }

    #[cfg(not(feature = "http-sink"))]
    if config.endpoint.is_some() {
        anyhow::bail!("An endpoint is configured but the http-sink feature is not enabled at compile time");
    }

    let writer: Box<dyn Write + Send> = match output {
        Some(path) => Box::new(BufWriter::new(
            std::fs::File::create(&path)
                .with_context(|| format!("Could not create {}", path.display()))?,
        )),
        None => Box::new(std::io::stdout()),
    };
    Ok(JsonLinesSink::new(writer).into_push_function())
}

fn cmd_config(
    delay: Option<u64>,
    trigger_on_ui_interaction: Option<bool>,
    endpoint: Option<String>,
) -> anyhow::Result<()> {
    let mut config = Config::load().unwrap_or_default();
    let changed = delay.is_some() || trigger_on_ui_interaction.is_some() || endpoint.is_some();

    if let Some(ms) = delay {
        config.delay = Duration::from_millis(ms);
    }
    if let Some(enabled) = trigger_on_ui_interaction {
        config.trigger_on_ui_interaction = enabled;
    }
    if let Some(endpoint) = endpoint {
        config.endpoint = (!endpoint.is_empty()).then_some(endpoint);
    }
    if changed {
        config.save()?;
        println!("Configuration saved.");
        println!();
    }

    println!("Search Analytics Configuration");
    println!("==============================");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!("Data path: {:?}", config.data_path);
    println!("Delay: {}ms", config.delay.as_millis());
    println!(
        "Trigger on UI interaction: {}",
        if config.trigger_on_ui_interaction {
            "enabled"
        } else {
            "disabled"
        }
    );
    println!(
        "Endpoint: {}",
        config.endpoint.as_deref().unwrap_or("(none, reports go to stdout)")
    );
    Ok(())
}

fn cmd_stats(reset: bool) -> anyhow::Result<()> {
    let config = Config::load().unwrap_or_default();
    let path = config.stats_path();
    if !path.exists() {
        println!("No statistics recorded yet.");
        return Ok(());
    }

    let stats = ReportStats::with_persistence(path);
    if reset {
        stats.reset();
        stats.save()?;
        println!("Statistics reset.");
        return Ok(());
    }

    println!("{}", stats.summary());
    Ok(())
}

fn ctrlc_handler(
    running: Arc<AtomicBool>,
    events: Sender<InteractionEvent>,
) -> anyhow::Result<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
        let _ = events.send(InteractionEvent::Teardown);
    })
    .context("Error setting Ctrl+C handler")
}
