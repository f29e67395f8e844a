//! Logging utilities with colored output.
//!
//! Provides the `log!` macro for formatted terminal output with a colored
//! `[module]` prefix.
//!
//! # Example
//!
//! ```ignore
//! log!("build"; "rendering {} documents", count);
//! log!("error"; "{:#}", err);
//! ```

use colored::Colorize;
use std::io::{Write, stderr};

/// Log a message with a colored module prefix.
///
/// # Usage
/// ```ignore
/// log!("module"; "message with {} formatting", args);
/// ```
#[macro_export]
macro_rules! log {
    ($module:expr; $($arg:tt)*) => {{
        $crate::logger::log($module, &format!($($arg)*))
    }};
}

/// Write a single log line to stderr.
///
/// The prefix color depends on the module name so errors and warnings
/// stand out from routine build chatter.
pub fn log(module: &str, message: &str) {
    let prefix = format!("[{module}]");
    let prefix = match module {
        "error" => prefix.red().bold(),
        "warn" => prefix.yellow().bold(),
        "watch" | "reload" => prefix.cyan(),
        "serve" => prefix.magenta(),
        _ => prefix.green(),
    };

    let mut out = stderr().lock();
    writeln!(out, "{prefix} {message}").ok();
}
