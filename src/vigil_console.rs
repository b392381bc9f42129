//! The console instance.
//!
//! [`Console`] owns every component on a single logical timeline: the log buffer, the
//! follow tracker, the alert controller, the source selector, the generators' timers and
//! the randomness they draw from. All mutation goes through `&mut self`, so the
//! presentation layer only ever observes settled state.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::vigil_alert::{AlertController, AlertState};
use crate::vigil_clock::{Fired, Scheduler, TimerId};
use crate::vigil_core::{DensitySnapshot, LogEntry, Severity, ValidationError};
use crate::vigil_follow::{AppendEffect, FollowState, FollowTracker, ScrollMetrics};
use crate::vigil_log::LogBuffer;
use crate::vigil_source::{
    format_size, AnalysisState, FileUpload, MediaSource, SourceSelector, SourceView, StartOutcome,
};
use crate::vigil_telemetry::{next_density, next_health, next_narrative, RandomSource, SimRng, ZONES};

pub const CRITICAL_ALERT_MESSAGE: &str =
    "🚨 CRITICAL ALERT: Security breach detected! Immediate action required!";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleConfig {
    pub operator: String,
    pub narrative_interval: Duration,
    pub density_interval: Duration,
    pub health_interval: Duration,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            operator: "Operator".to_string(),
            narrative_interval: Duration::from_secs(3),
            density_interval: Duration::from_secs(5),
            health_interval: Duration::from_secs(15),
        }
    }
}

/// Payload carried by every console timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleTimer {
    Narrative,
    Density,
    Health,
    AlertExpiry,
}

/// Presentation notifications, drained with [`Console::drain_events`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleEvent {
    EntryAppended { entry: LogEntry },
    ScrollToBottom,
    NewMessages { unseen: usize },
    AlertRaised { activated_at: DateTime<Utc> },
    AlertCleared,
    DensityUpdated { snapshot: DensitySnapshot },
    AnalysisStarted { source: String },
    AnalysisStopped,
    SourceChanged { source: SourceView },
}

/// Read-only view of everything the presentation consumes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsoleSnapshot {
    pub entries: Vec<LogEntry>,
    pub is_at_bottom: bool,
    pub unseen: usize,
    pub alert: AlertState,
    pub analysis: AnalysisState,
    pub source: SourceView,
    pub density: Option<DensitySnapshot>,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TeardownReport {
    pub cancelled_timers: usize,
    pub released_handles: usize,
}

#[derive(Debug, Clone, Copy)]
struct GeneratorTimers {
    narrative: TimerId,
    density: TimerId,
}

pub struct Console<R: RandomSource = SimRng> {
    config: ConsoleConfig,
    rng: R,
    started_at: DateTime<Utc>,
    log: LogBuffer,
    follow: FollowTracker,
    alert: AlertController,
    selector: SourceSelector,
    scheduler: Scheduler<ConsoleTimer>,
    generators: Option<GeneratorTimers>,
    density: Option<DensitySnapshot>,
    events: Vec<ConsoleEvent>,
}

impl Console<SimRng> {
    pub fn seeded(config: ConsoleConfig, seed: u64, started_at: DateTime<Utc>) -> Self {
        Self::new(config, SimRng::new(seed), started_at)
    }
}

impl<R: RandomSource> Console<R> {
    /// Build a console and arm the always-on system health timer.
    pub fn new(config: ConsoleConfig, rng: R, started_at: DateTime<Utc>) -> Self {
        let mut scheduler = Scheduler::new();
        scheduler.schedule_every(config.health_interval, ConsoleTimer::Health);
        info!(operator = %config.operator, "console started");

        Self {
            config,
            rng,
            started_at,
            log: LogBuffer::new(),
            follow: FollowTracker::new(),
            alert: AlertController::new(),
            selector: SourceSelector::new(),
            scheduler,
            generators: None,
            density: None,
            events: Vec::new(),
        }
    }

    pub fn config(&self) -> &ConsoleConfig {
        &self.config
    }

    // ---- inbound ----

    pub fn push_event(&mut self, message: impl Into<String>, severity: Severity) -> LogEntry {
        self.append(message.into(), severity)
    }

    /// Replace the density display. Snapshots never enter the log.
    pub fn push_density(&mut self, snapshot: DensitySnapshot) {
        debug!(total = snapshot.total_count, "density updated");
        self.density = Some(snapshot.clone());
        self.events.push(ConsoleEvent::DensityUpdated { snapshot });
    }

    // ---- user actions ----

    pub fn send_alert(&mut self) -> LogEntry {
        let message = format!("ALERT: Manual alert triggered by {}", self.config.operator);
        self.append(message, Severity::Error)
    }

    /// Raise (or extend) the critical alert. The viewport is pinned to the tail first,
    /// so the alert entry is always scrolled into view.
    pub fn send_critical_alert(&mut self) -> LogEntry {
        self.follow.force_follow();
        let entry = self.append(CRITICAL_ALERT_MESSAGE.to_string(), Severity::Error);
        let activated_at = self.timestamp();
        self.alert.trigger(activated_at, &mut self.scheduler, ConsoleTimer::AlertExpiry);
        self.events.push(ConsoleEvent::AlertRaised { activated_at });
        entry
    }

    pub fn send_chat_message(&mut self, text: &str) -> Result<LogEntry, ValidationError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(self.reject("send_chat_message", ValidationError::EmptyMessage));
        }
        let message = format!("{}: {}", self.config.operator, text);
        Ok(self.append(message, Severity::Info))
    }

    pub fn select_remote_source(&mut self, url: &str) -> Result<(), ValidationError> {
        self.selector
            .select_remote(url)
            .map_err(|error| self.reject("select_remote_source", error))?;
        self.source_changed();
        Ok(())
    }

    pub fn select_file_source(&mut self, upload: FileUpload) -> Result<(), ValidationError> {
        let file_name = upload.file_name.clone();
        let size_bytes = upload.size_bytes;
        self.selector
            .select_file(upload)
            .map_err(|error| self.reject("select_file_source", error))?;
        self.append(
            format!("Video file loaded: {file_name} ({})", format_size(size_bytes)),
            Severity::Info,
        );
        self.source_changed();
        Ok(())
    }

    /// Returns `Ok(false)` when analysis was already running.
    pub fn start_analysis(&mut self) -> Result<bool, ValidationError> {
        let outcome = self.selector.start().map_err(|error| self.reject("start_analysis", error))?;
        let StartOutcome::Started { label } = outcome else {
            return Ok(false);
        };

        info!(source = %label, "analysis started");
        self.append(format!("Analysis started on {label}"), Severity::Info);
        let zones = ZONES.iter().map(|(zone, _)| *zone).collect::<Vec<_>>().join(", ");
        self.append(format!("Zone monitoring initialized: {zones}"), Severity::Info);

        self.generators = Some(GeneratorTimers {
            narrative: self
                .scheduler
                .schedule_every(self.config.narrative_interval, ConsoleTimer::Narrative),
            density: self.scheduler.schedule_every(self.config.density_interval, ConsoleTimer::Density),
        });
        self.events.push(ConsoleEvent::AnalysisStarted { source: label });
        Ok(true)
    }

    /// Returns false when analysis was not running.
    pub fn stop_analysis(&mut self) -> bool {
        if !self.selector.stop() {
            return false;
        }
        self.cancel_generators();
        self.density = None;
        info!("analysis stopped");
        self.append("Analysis stopped".to_string(), Severity::Info);
        self.events.push(ConsoleEvent::AnalysisStopped);
        true
    }

    /// Returns whether a source was held.
    pub fn clear_source(&mut self) -> Result<bool, ValidationError> {
        let held = self.selector.clear().map_err(|error| self.reject("clear_source", error))?;
        if held {
            self.source_changed();
        }
        Ok(held)
    }

    pub fn scroll_sampled(
        &mut self,
        scroll_top: f64,
        scroll_height: f64,
        client_height: f64,
    ) -> FollowState {
        self.follow.sample(ScrollMetrics::new(scroll_top, scroll_height, client_height))
    }

    pub fn jump_to_latest(&mut self) {
        self.follow.jump_to_latest();
        self.events.push(ConsoleEvent::ScrollToBottom);
    }

    // ---- time ----

    /// Move simulated time forward, firing every timer due on the way.
    pub fn advance(&mut self, by: Duration) -> usize {
        self.advance_to(self.scheduler.now() + by)
    }

    /// Fire due timers in deadline order (ties in registration order). Returns the
    /// number fired.
    pub fn advance_to(&mut self, at: Duration) -> usize {
        let mut fired = 0;
        while let Some(timer) = self.scheduler.pop_due(at) {
            self.fire(timer);
            fired += 1;
        }
        self.scheduler.settle(at);
        fired
    }

    // ---- outbound ----

    pub fn entries(&self) -> impl DoubleEndedIterator<Item = &LogEntry> + ExactSizeIterator {
        self.log.iter()
    }

    pub fn log(&self) -> &LogBuffer {
        &self.log
    }

    pub fn is_at_bottom(&self) -> bool {
        self.follow.is_at_bottom()
    }

    pub fn follow_state(&self) -> FollowState {
        self.follow.state()
    }

    pub fn unseen(&self) -> usize {
        self.follow.unseen()
    }

    pub fn alert_state(&self) -> AlertState {
        self.alert.state()
    }

    pub fn analysis_state(&self) -> AnalysisState {
        self.selector.analysis()
    }

    pub fn source(&self) -> &MediaSource {
        self.selector.source()
    }

    pub fn density(&self) -> Option<&DensitySnapshot> {
        self.density.as_ref()
    }

    /// Simulated time since the console started.
    pub fn now(&self) -> Duration {
        self.scheduler.now()
    }

    pub fn pending_timers(&self) -> usize {
        self.scheduler.pending()
    }

    pub fn next_deadline(&self) -> Option<Duration> {
        self.scheduler.next_deadline()
    }

    pub fn live_handles(&self) -> usize {
        self.selector.handles().live()
    }

    pub fn snapshot(&self) -> ConsoleSnapshot {
        ConsoleSnapshot {
            entries: self.log.to_vec(),
            is_at_bottom: self.follow.is_at_bottom(),
            unseen: self.follow.unseen(),
            alert: self.alert.state(),
            analysis: self.selector.analysis(),
            source: self.selector.source().view(),
            density: self.density.clone(),
            elapsed_ms: self.scheduler.now().as_millis() as u64,
        }
    }

    pub fn drain_events(&mut self) -> Vec<ConsoleEvent> {
        std::mem::take(&mut self.events)
    }

    /// End the session: cancel every timer and release the held file handle.
    pub fn teardown(mut self) -> TeardownReport {
        let alert_timer = usize::from(self.alert.cancel(&mut self.scheduler));
        self.generators = None;
        let cancelled_timers = alert_timer + self.scheduler.cancel_all();
        let released_handles = usize::from(self.selector.release());
        info!(cancelled_timers, released_handles, "console torn down");
        TeardownReport { cancelled_timers, released_handles }
    }

    // ---- internals ----

    fn timestamp(&self) -> DateTime<Utc> {
        let elapsed = chrono::Duration::from_std(self.scheduler.now())
            .unwrap_or_else(|_| chrono::Duration::zero());
        self.started_at + elapsed
    }

    fn append(&mut self, message: String, severity: Severity) -> LogEntry {
        let entry = self.log.append(message, severity, self.timestamp());
        debug!(id = %entry.id(), %severity, "log entry appended");
        self.events.push(ConsoleEvent::EntryAppended { entry: entry.clone() });
        let effect = match self.follow.on_append() {
            AppendEffect::ScrollToBottom => ConsoleEvent::ScrollToBottom,
            AppendEffect::NewMessages { unseen } => ConsoleEvent::NewMessages { unseen },
        };
        self.events.push(effect);
        entry
    }

    fn reject(&mut self, action: &'static str, error: ValidationError) -> ValidationError {
        warn!(action, %error, "operator action rejected");
        self.append(error.to_string(), Severity::Error);
        error
    }

    fn source_changed(&mut self) {
        let source = self.selector.source().view();
        self.events.push(ConsoleEvent::SourceChanged { source });
    }

    fn cancel_generators(&mut self) {
        if let Some(timers) = self.generators.take() {
            self.scheduler.cancel(timers.narrative);
            self.scheduler.cancel(timers.density);
        }
    }

    fn fire(&mut self, timer: Fired<ConsoleTimer>) {
        debug!(timer = ?timer.payload, at_ms = timer.at.as_millis() as u64, "timer fired");
        match timer.payload {
            ConsoleTimer::Narrative => {
                let event = next_narrative(&mut self.rng);
                self.append(event.message.to_string(), event.severity);
            }
            ConsoleTimer::Density => {
                let snapshot = next_density(&mut self.rng);
                self.push_density(snapshot);
            }
            ConsoleTimer::Health => {
                let reading = next_health(&mut self.rng);
                self.append(reading.message(), reading.severity());
            }
            ConsoleTimer::AlertExpiry => {
                if self.alert.on_expired(timer.id) {
                    self.events.push(ConsoleEvent::AlertCleared);
                }
            }
        }
    }
}
