use std::{
    collections::BTreeMap,
    env,
    io::{self, Write},
    path::{Path, PathBuf},
    time::Duration,
};

use clap::Parser;
use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use serde::Deserialize;
use tokio::time::{self, MissedTickBehavior};
use tracing::{info, warn, Level};

use crate::colors::canonical_severity;
use crate::vigil_console::{Console, ConsoleConfig, ConsoleEvent};
use crate::vigil_core::Severity;
use crate::vigil_source::FileUpload;
use crate::vigil_telemetry::{RandomSource, SimRng};
use crate::vigil_tui::{ActionOutcome, Tui};

const CONFIG_FILE: &str = "vigil.json";
const DEFAULT_OPERATOR: &str = "Operator";
const DEFAULT_NARRATIVE_MS: u64 = 3_000;
const DEFAULT_DENSITY_MS: u64 = 5_000;
const DEFAULT_HEALTH_MS: u64 = 15_000;
const DEFAULT_TICK_MS: u64 = 50;
const DEFAULT_TUI_ENABLED: bool = true;

pub type DynError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Parser, Debug)]
#[command(name = "vigil", version, about = "Vigil operator console")]
struct Cli {
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    operator: Option<String>,
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long)]
    narrative_ms: Option<u64>,
    #[arg(long)]
    density_ms: Option<u64>,
    #[arg(long)]
    health_ms: Option<u64>,
    #[arg(long)]
    tick_ms: Option<u64>,
    #[arg(long)]
    min_severity: Option<String>,
    #[arg(long, action = clap::ArgAction::SetTrue)]
    tui: bool,
    #[arg(long, action = clap::ArgAction::SetTrue)]
    no_tui: bool,
    /// Remote video URL selected at startup.
    #[arg(long)]
    source_url: Option<String>,
    /// Video file uploaded at startup.
    #[arg(long)]
    source_file: Option<PathBuf>,
    /// Start analysis right after selecting the startup source.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    start: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Config {
    operator: String,
    seed: Option<u64>,
    narrative_ms: u64,
    density_ms: u64,
    health_ms: u64,
    tick_ms: u64,
    tui_enabled: bool,
    min_severity: Severity,
}

#[derive(Debug, Default, Clone)]
struct PartialConfig {
    operator: Option<String>,
    seed: Option<u64>,
    narrative_ms: Option<u64>,
    density_ms: Option<u64>,
    health_ms: Option<u64>,
    tick_ms: Option<u64>,
    tui_enabled: Option<bool>,
    min_severity: Option<Severity>,
}

impl PartialConfig {
    fn merge(&mut self, other: PartialConfig) {
        if other.operator.is_some() {
            self.operator = other.operator;
        }
        if other.seed.is_some() {
            self.seed = other.seed;
        }
        if other.narrative_ms.is_some() {
            self.narrative_ms = other.narrative_ms;
        }
        if other.density_ms.is_some() {
            self.density_ms = other.density_ms;
        }
        if other.health_ms.is_some() {
            self.health_ms = other.health_ms;
        }
        if other.tick_ms.is_some() {
            self.tick_ms = other.tick_ms;
        }
        if other.tui_enabled.is_some() {
            self.tui_enabled = other.tui_enabled;
        }
        if other.min_severity.is_some() {
            self.min_severity = other.min_severity;
        }
    }
}

impl Config {
    fn from_partial(partial: PartialConfig) -> Result<Self, ConfigError> {
        let config = Self {
            operator: partial
                .operator
                .filter(|name| !name.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_OPERATOR.to_string()),
            seed: partial.seed,
            narrative_ms: partial.narrative_ms.unwrap_or(DEFAULT_NARRATIVE_MS),
            density_ms: partial.density_ms.unwrap_or(DEFAULT_DENSITY_MS),
            health_ms: partial.health_ms.unwrap_or(DEFAULT_HEALTH_MS),
            tick_ms: partial.tick_ms.unwrap_or(DEFAULT_TICK_MS),
            tui_enabled: partial.tui_enabled.unwrap_or(DEFAULT_TUI_ENABLED),
            min_severity: partial.min_severity.unwrap_or(Severity::Info),
        };
        for (name, value) in [
            ("narrative_interval_ms", config.narrative_ms),
            ("density_interval_ms", config.density_ms),
            ("health_interval_ms", config.health_ms),
            ("tick_ms", config.tick_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::InvalidValue { name: name.to_string(), value: "0".to_string() });
            }
        }
        Ok(config)
    }

    fn console_config(&self) -> ConsoleConfig {
        ConsoleConfig {
            operator: self.operator.clone(),
            narrative_interval: Duration::from_millis(self.narrative_ms),
            density_interval: Duration::from_millis(self.density_ms),
            health_interval: Duration::from_millis(self.health_ms),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct FileConfig {
    operator: Option<String>,
    seed: Option<u64>,
    #[serde(alias = "narrativeIntervalMs")]
    narrative_interval_ms: Option<u64>,
    #[serde(alias = "densityIntervalMs")]
    density_interval_ms: Option<u64>,
    #[serde(alias = "healthIntervalMs")]
    health_interval_ms: Option<u64>,
    #[serde(alias = "tickMs")]
    tick_ms: Option<u64>,
    tui: Option<bool>,
    #[serde(alias = "noTui", alias = "no-tui")]
    no_tui: Option<bool>,
    #[serde(alias = "minSeverity")]
    min_severity: Option<String>,
}

impl FileConfig {
    fn into_partial(self) -> Result<PartialConfig, ConfigError> {
        let tui_enabled = match (self.tui, self.no_tui) {
            (_, Some(no_tui)) => Some(!no_tui),
            (Some(tui), None) => Some(tui),
            (None, None) => None,
        };
        let min_severity = self
            .min_severity
            .map(|value| parse_severity("min_severity", &value))
            .transpose()?;

        Ok(PartialConfig {
            operator: self.operator,
            seed: self.seed,
            narrative_ms: self.narrative_interval_ms,
            density_ms: self.density_interval_ms,
            health_ms: self.health_interval_ms,
            tick_ms: self.tick_ms,
            tui_enabled,
            min_severity,
        })
    }
}

#[derive(Debug, thiserror::Error)]
enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("failed to parse config file {path}: {source}")]
    ParseFile { path: PathBuf, source: serde_json::Error },
    #[error("config file not found: {path}")]
    MissingConfig { path: PathBuf },
    #[error("invalid value for {name}: {value}")]
    InvalidEnv { name: String, value: String },
    #[error("invalid config value for {name}: {value}")]
    InvalidValue { name: String, value: String },
}

fn cli_overrides(cli: &Cli) -> Result<PartialConfig, ConfigError> {
    let tui_enabled = if cli.no_tui {
        Some(false)
    } else if cli.tui {
        Some(true)
    } else {
        None
    };
    let min_severity = cli
        .min_severity
        .as_deref()
        .map(|value| parse_severity("--min-severity", value))
        .transpose()?;
    Ok(PartialConfig {
        operator: cli.operator.clone(),
        seed: cli.seed,
        narrative_ms: cli.narrative_ms,
        density_ms: cli.density_ms,
        health_ms: cli.health_ms,
        tick_ms: cli.tick_ms,
        tui_enabled,
        min_severity,
    })
}

fn env_overrides(env: &BTreeMap<String, String>) -> Result<PartialConfig, ConfigError> {
    let mut partial = PartialConfig::default();
    if let Some(operator) = env.get("VIGIL_OPERATOR") {
        partial.operator = Some(operator.clone());
    }
    if let Some(value) = env.get("VIGIL_SEED") {
        partial.seed = Some(parse_u64("VIGIL_SEED", value)?);
    }
    if let Some(value) = env.get("VIGIL_NARRATIVE_MS") {
        partial.narrative_ms = Some(parse_u64("VIGIL_NARRATIVE_MS", value)?);
    }
    if let Some(value) = env.get("VIGIL_DENSITY_MS") {
        partial.density_ms = Some(parse_u64("VIGIL_DENSITY_MS", value)?);
    }
    if let Some(value) = env.get("VIGIL_HEALTH_MS") {
        partial.health_ms = Some(parse_u64("VIGIL_HEALTH_MS", value)?);
    }
    if let Some(value) = env.get("VIGIL_TICK_MS") {
        partial.tick_ms = Some(parse_u64("VIGIL_TICK_MS", value)?);
    }
    if let Some(value) = env.get("VIGIL_MIN_SEVERITY") {
        partial.min_severity = Some(
            canonical_severity(value).ok_or_else(|| ConfigError::InvalidEnv {
                name: "VIGIL_MIN_SEVERITY".to_string(),
                value: value.clone(),
            })?,
        );
    }
    if let Some(no_tui) = env.get("VIGIL_NO_TUI") {
        let disabled = parse_bool("VIGIL_NO_TUI", no_tui)?;
        partial.tui_enabled = Some(!disabled);
    }
    if partial.tui_enabled.is_none() {
        if let Some(tui) = env.get("VIGIL_TUI") {
            partial.tui_enabled = Some(parse_bool("VIGIL_TUI", tui)?);
        }
    }
    Ok(partial)
}

fn parse_u64(name: &str, value: &str) -> Result<u64, ConfigError> {
    value
        .trim()
        .parse::<u64>()
        .map_err(|_| ConfigError::InvalidEnv { name: name.to_string(), value: value.to_string() })
}

fn parse_bool(name: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidEnv { name: name.to_string(), value: value.to_string() }),
    }
}

fn parse_severity(name: &str, value: &str) -> Result<Severity, ConfigError> {
    canonical_severity(value)
        .ok_or_else(|| ConfigError::InvalidValue { name: name.to_string(), value: value.to_string() })
}

fn load_config_file(path: &Path) -> Result<PartialConfig, ConfigError> {
    let contents = std::fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;
    let parsed: FileConfig = serde_json::from_str(&contents)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })?;
    parsed.into_partial()
}

fn find_config_path(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();
    loop {
        let candidate = current.join(CONFIG_FILE);
        if candidate.is_file() {
            return Some(candidate);
        }
        if !current.pop() {
            break;
        }
    }
    None
}

fn resolve_config(
    cli: &Cli,
    cwd: &Path,
    env: &BTreeMap<String, String>,
) -> Result<(Config, Option<PathBuf>), ConfigError> {
    let mut partial = PartialConfig::default();

    let config_path = if let Some(path) = &cli.config {
        if !path.is_file() {
            return Err(ConfigError::MissingConfig { path: path.clone() });
        }
        Some(path.clone())
    } else {
        find_config_path(cwd)
    };

    if let Some(path) = config_path.as_ref() {
        partial.merge(load_config_file(path)?);
    }
    partial.merge(env_overrides(env)?);
    partial.merge(cli_overrides(cli)?);

    Ok((Config::from_partial(partial)?, config_path))
}

/// Apply the startup source flags. Failures are already on the console log.
fn apply_startup_source<R: RandomSource>(console: &mut Console<R>, cli: &Cli) {
    if let Some(url) = &cli.source_url {
        if let Err(error) = console.select_remote_source(url) {
            warn!(%error, "startup url rejected");
        }
    }
    if let Some(path) = &cli.source_file {
        match FileUpload::from_path(path) {
            Ok(upload) => {
                if let Err(error) = console.select_file_source(upload) {
                    warn!(%error, "startup file rejected");
                }
            }
            Err(error) => {
                warn!(path = %path.display(), %error, "startup file unreadable");
                console.push_event(
                    format!("Could not read file {}: {error}", path.display()),
                    Severity::Error,
                );
            }
        }
    }
    if cli.start {
        if let Err(error) = console.start_analysis() {
            warn!(%error, "startup analysis rejected");
        }
    }
}

/// Write appended entries at or above `min` as JSON lines. Returns the number written.
fn write_entries<W: Write>(
    events: Vec<ConsoleEvent>,
    min: Severity,
    out: &mut W,
) -> io::Result<usize> {
    let mut written = 0;
    for event in events {
        let ConsoleEvent::EntryAppended { entry } = event else {
            continue;
        };
        if entry.severity() < min {
            continue;
        }
        serde_json::to_writer(&mut *out, &entry)?;
        out.write_all(b"\n")?;
        written += 1;
    }
    out.flush()?;
    Ok(written)
}

async fn run_headless(mut console: Console, config: &Config) -> Result<Console, DynError> {
    let started = time::Instant::now();
    let mut ticker = time::interval(Duration::from_millis(config.tick_ms));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    write_entries(console.drain_events(), config.min_severity, &mut io::stdout().lock())?;

    loop {
        tokio::select! {
            res = &mut shutdown => {
                res?;
                info!("interrupt received");
                break;
            }
            _ = ticker.tick() => {
                console.advance_to(started.elapsed());
                write_entries(console.drain_events(), config.min_severity, &mut io::stdout().lock())?;
            }
        }
    }

    Ok(console)
}

fn run_tui_loop(console: &mut Console, tick_ms: u64) -> Result<(), DynError> {
    let _guard = TerminalGuard::enter()?;
    let backend = CrosstermBackend::new(io::stdout());
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;
    terminal.hide_cursor()?;

    let mut tui = Tui::new();
    let started = std::time::Instant::now();

    loop {
        console.advance_to(started.elapsed());
        console.drain_events();
        tui.draw(&mut terminal, console)?;

        if event::poll(Duration::from_millis(tick_ms))? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => {
                    let action = tui.handle_key(key, console.analysis_state());
                    match tui.apply(action, console) {
                        Ok(ActionOutcome::Quit) => break,
                        Ok(ActionOutcome::Continue | ActionOutcome::Rejected(_)) => {}
                        Err(error) => warn!(%error, "tui action failed"),
                    }
                }
                Event::Resize(_, _) => {}
                _ => {}
            }
        }
    }

    terminal.show_cursor()?;
    Ok(())
}

/// Where diagnostics go for a run mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogTarget {
    Stderr,
    /// The TUI owns the terminal, stderr included.
    Discard,
}

impl LogTarget {
    fn for_mode(tui_enabled: bool) -> Self {
        if tui_enabled {
            Self::Discard
        } else {
            Self::Stderr
        }
    }
}

fn init_tracing(target: LogTarget) {
    let builder = tracing_subscriber::fmt().with_max_level(Level::INFO);
    let _ = match target {
        LogTarget::Stderr => builder.with_writer(io::stderr).try_init(),
        LogTarget::Discard => builder.with_writer(io::sink).try_init(),
    };
}

struct TerminalGuard;

impl TerminalGuard {
    fn enter() -> Result<Self, DynError> {
        enable_raw_mode()?;
        execute!(io::stdout(), EnterAlternateScreen)?;
        Ok(Self)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
    }
}

pub async fn run() -> Result<(), DynError> {
    let cli = Cli::parse();
    let cwd = env::current_dir()?;
    let env_map: BTreeMap<String, String> = env::vars().collect();
    let (config, config_path) = resolve_config(&cli, &cwd, &env_map)?;

    init_tracing(LogTarget::for_mode(config.tui_enabled));

    if let Some(path) = &config_path {
        info!(path = %path.display(), "loaded config file");
    } else {
        info!(file = CONFIG_FILE, "no config file found, using defaults and env/cli overrides");
    }
    info!(
        operator = %config.operator,
        seed = ?config.seed,
        narrative_ms = config.narrative_ms,
        density_ms = config.density_ms,
        health_ms = config.health_ms,
        tick_ms = config.tick_ms,
        tui_enabled = config.tui_enabled,
        min_severity = %config.min_severity,
        "resolved config"
    );

    let rng = match config.seed {
        Some(seed) => SimRng::new(seed),
        None => SimRng::from_entropy(),
    };
    let mut console = Console::new(config.console_config(), rng, chrono::Utc::now());
    apply_startup_source(&mut console, &cli);

    let console = if config.tui_enabled {
        let tick_ms = config.tick_ms;
        tokio::task::spawn_blocking(move || {
            run_tui_loop(&mut console, tick_ms).map(|()| console)
        })
        .await??
    } else {
        run_headless(console, &config).await?
    };

    let report = console.teardown();
    info!(
        cancelled_timers = report.cancelled_timers,
        released_handles = report.released_handles,
        "session ended"
    );
    Ok(())
}
