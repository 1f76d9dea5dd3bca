//! ---
//! ems_section: "03-persistence-logging"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Structured logging adapters for replay and simulation diagnostics."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
#![warn(missing_docs)]
//! Row- and point-level diagnostics.
//!
//! Every recoverable data-plane error (dropped row, demoted formula,
//! unresolved dependency) is logged exactly once through these macros so the
//! event carries the source line, asset, point and run state.

use tracing::Level;
use tracing_subscriber::{fmt as subscriber_fmt, prelude::*, EnvFilter, Registry};

pub mod macros;

/// Initialize a baseline tracing subscriber suitable for tests and tools.
pub fn init() {
    let _ = Registry::default()
        .with(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with(subscriber_fmt::layer())
        .try_init();
}

/// Structured logging context propagated by the convenience macros.
#[derive(Debug, Default, Clone)]
pub struct LogContext<'a> {
    /// Name of the input file the event relates to.
    pub source: Option<&'a str>,
    /// One-based line number within the source.
    pub line: Option<u64>,
    /// Asset identifier or path.
    pub asset: Option<&'a str>,
    /// Measurement point identifier or name.
    pub point: Option<&'a str>,
    /// Run state at the time of the event.
    pub state: Option<&'a str>,
}

impl<'a> LogContext<'a> {
    /// Create an empty logging context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach the input file name.
    pub fn with_source(mut self, source: &'a str) -> Self {
        self.source = Some(source);
        self
    }

    /// Attach a line number.
    pub fn with_line(mut self, line: u64) -> Self {
        self.line = Some(line);
        self
    }

    /// Attach an asset identifier.
    pub fn with_asset(mut self, asset: &'a str) -> Self {
        self.asset = Some(asset);
        self
    }

    /// Attach a measurement point identifier.
    pub fn with_point(mut self, point: &'a str) -> Self {
        self.point = Some(point);
        self
    }

    /// Attach a run state descriptor.
    pub fn with_state(mut self, state: &'a str) -> Self {
        self.state = Some(state);
        self
    }
}

/// High-level outcome used when emitting lifecycle log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemEventOutcome {
    /// The operation completed successfully.
    Success,
    /// The operation failed or was aborted.
    Fault,
}

impl SystemEventOutcome {
    fn as_str(&self) -> &'static str {
        match self {
            SystemEventOutcome::Success => "success",
            SystemEventOutcome::Fault => "fault",
        }
    }
}

/// Emit a standardized system event with a success/fault outcome.
pub fn log_system_event(
    context: Option<&LogContext>,
    event: &str,
    message: &str,
    outcome: SystemEventOutcome,
) {
    let fallback = LogContext::default();
    let ctx = context.unwrap_or(&fallback);
    match outcome {
        SystemEventOutcome::Success => tracing::info!(
            event,
            outcome = outcome.as_str(),
            source = ctx.source.unwrap_or(""),
            line = ctx.line.unwrap_or_default(),
            asset = ctx.asset.unwrap_or(""),
            point = ctx.point.unwrap_or(""),
            state = ctx.state.unwrap_or(""),
            message = %message
        ),
        SystemEventOutcome::Fault => tracing::error!(
            event,
            outcome = outcome.as_str(),
            source = ctx.source.unwrap_or(""),
            line = ctx.line.unwrap_or_default(),
            asset = ctx.asset.unwrap_or(""),
            point = ctx.point.unwrap_or(""),
            state = ctx.state.unwrap_or(""),
            message = %message
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn macros_emit_without_panic() {
        init();
        let ctx = LogContext::new()
            .with_source("assets.csv")
            .with_line(4)
            .with_asset("A1");
        player_info!(context = ctx.clone(), "row accepted");
        player_debug!("debug message");
        player_warn!(context = ctx.clone(), "column count {}", 7);
        player_error!(context = ctx, "error code: {}", 42);
    }

    #[test]
    fn system_event_helper_emits() {
        init();
        let ctx = LogContext::new().with_state("PlayForward");
        log_system_event(
            Some(&ctx),
            "run_state.transition",
            "Initialized -> PlayForward",
            SystemEventOutcome::Success,
        );
        log_system_event(
            None,
            "replay.open",
            "replay source failed to open",
            SystemEventOutcome::Fault,
        );
    }
}
