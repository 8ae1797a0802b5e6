//! Logging facilities.

use atty::Stream;
use colored::{Color, ColoredString, Colorize};

/// Applies the color to the string if stderr (log) goes to console.
pub fn get_colored(s: &str, color: Color) -> ColoredString {
    if atty::is(Stream::Stderr) {
        s.color(color)
    } else {
        s.normal()
    }
}

/// Logs a message at the info level, prefixed with the simulated time.
#[macro_export]
macro_rules! log_info {
    ($sim:expr, $msg:expr) => (
        log::info!(
            target: "simulation",
            "[{:.3} {}  simulation] {}",
            $sim.time(), $crate::log::get_colored("INFO", $crate::colored::Color::Green), $msg
        )
    );
    ($sim:expr, $format:expr, $($arg:tt)+) => (
        log::info!(
            target: "simulation",
            concat!("[{:.3} {}  simulation] ", $format),
            $sim.time(), $crate::log::get_colored("INFO", $crate::colored::Color::Green), $($arg)+
        )
    );
}

/// Logs a message at the warn level.
///
/// See [`log_info!`](crate::log_info!).
#[macro_export]
macro_rules! log_warn {
    ($sim:expr, $msg:expr) => (
        log::warn!(
            target: "simulation",
            "[{:.3} {}  simulation] {}",
            $sim.time(), $crate::log::get_colored("WARN", $crate::colored::Color::Yellow), $msg
        )
    );
    ($sim:expr, $format:expr, $($arg:tt)+) => (
        log::warn!(
            target: "simulation",
            concat!("[{:.3} {}  simulation] ", $format),
            $sim.time(), $crate::log::get_colored("WARN", $crate::colored::Color::Yellow), $($arg)+
        )
    );
}

/// Logs a message at the debug level.
///
/// See [`log_info!`](crate::log_info!).
#[macro_export]
macro_rules! log_debug {
    ($sim:expr, $msg:expr) => (
        log::debug!(
            target: "simulation",
            "[{:.3} {} simulation] {}",
            $sim.time(), $crate::log::get_colored("DEBUG", $crate::colored::Color::Blue), $msg
        )
    );
    ($sim:expr, $format:expr, $($arg:tt)+) => (
        log::debug!(
            target: "simulation",
            concat!("[{:.3} {} simulation] ", $format),
            $sim.time(), $crate::log::get_colored("DEBUG", $crate::colored::Color::Blue), $($arg)+
        )
    );
}

/// Logs a message at the trace level.
///
/// See [`log_info!`](crate::log_info!).
#[macro_export]
macro_rules! log_trace {
    ($sim:expr, $msg:expr) => (
        log::trace!(
            target: "simulation",
            "[{:.3} {} simulation] {}",
            $sim.time(), $crate::log::get_colored("TRACE", $crate::colored::Color::Cyan), $msg
        )
    );
    ($sim:expr, $format:expr, $($arg:tt)+) => (
        log::trace!(
            target: "simulation",
            concat!("[{:.3} {} simulation] ", $format),
            $sim.time(), $crate::log::get_colored("TRACE", $crate::colored::Color::Cyan), $($arg)+
        )
    );
}
