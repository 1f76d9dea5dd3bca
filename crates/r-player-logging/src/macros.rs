//! ---
//! ems_section: "03-persistence-logging"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Structured logging adapters for replay and simulation diagnostics."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
/// Emit an informational log enriched with row and point context.
#[macro_export]
macro_rules! player_info {
    (context = $ctx:expr, $($arg:tt)+) => {{
        let ctx = &$ctx;
        tracing::event!(
            tracing::Level::INFO,
            source = ctx.source.unwrap_or(""),
            line = ctx.line.unwrap_or_default(),
            asset = ctx.asset.unwrap_or(""),
            point = ctx.point.unwrap_or(""),
            state = ctx.state.unwrap_or(""),
            message = %format_args!($($arg)+)
        );
    }};
    ($($arg:tt)+) => {{
        tracing::event!(
            tracing::Level::INFO,
            message = %format_args!($($arg)+)
        );
    }};
}

/// Emit a debug log enriched with row and point context.
#[macro_export]
macro_rules! player_debug {
    (context = $ctx:expr, $($arg:tt)+) => {{
        let ctx = &$ctx;
        tracing::event!(
            tracing::Level::DEBUG,
            source = ctx.source.unwrap_or(""),
            line = ctx.line.unwrap_or_default(),
            asset = ctx.asset.unwrap_or(""),
            point = ctx.point.unwrap_or(""),
            state = ctx.state.unwrap_or(""),
            message = %format_args!($($arg)+)
        );
    }};
    ($($arg:tt)+) => {{
        tracing::event!(
            tracing::Level::DEBUG,
            message = %format_args!($($arg)+)
        );
    }};
}

/// Emit a warning log enriched with row and point context.
#[macro_export]
macro_rules! player_warn {
    (context = $ctx:expr, $($arg:tt)+) => {{
        let ctx = &$ctx;
        tracing::event!(
            tracing::Level::WARN,
            source = ctx.source.unwrap_or(""),
            line = ctx.line.unwrap_or_default(),
            asset = ctx.asset.unwrap_or(""),
            point = ctx.point.unwrap_or(""),
            state = ctx.state.unwrap_or(""),
            message = %format_args!($($arg)+)
        );
    }};
    ($($arg:tt)+) => {{
        tracing::event!(
            tracing::Level::WARN,
            message = %format_args!($($arg)+)
        );
    }};
}

/// Emit an error log enriched with row and point context.
#[macro_export]
macro_rules! player_error {
    (context = $ctx:expr, $($arg:tt)+) => {{
        let ctx = &$ctx;
        tracing::event!(
            tracing::Level::ERROR,
            source = ctx.source.unwrap_or(""),
            line = ctx.line.unwrap_or_default(),
            asset = ctx.asset.unwrap_or(""),
            point = ctx.point.unwrap_or(""),
            state = ctx.state.unwrap_or(""),
            message = %format_args!($($arg)+)
        );
    }};
    ($($arg:tt)+) => {{
        tracing::event!(
            tracing::Level::ERROR,
            message = %format_args!($($arg)+)
        );
    }};
}
