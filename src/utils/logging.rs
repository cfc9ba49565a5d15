//! Structured logging with redaction
//!
//! Log lines go to stderr as
//! `[timestamp] LEVEL [module] message | key=value ...`. Field values are
//! redacted by key name:
//!
//! - secrets (local signing keys, api tokens) are never printed
//! - addresses and account ids keep a recognizable prefix and suffix
//! - digests, signatures and tx hashes are shortened

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

static DEBUG_ENABLED: AtomicBool = AtomicBool::new(false);
static QUIET: AtomicU8 = AtomicU8::new(0);

pub fn enable_debug() {
    DEBUG_ENABLED.store(true, Ordering::SeqCst);
}

pub fn disable_debug() {
    DEBUG_ENABLED.store(false, Ordering::SeqCst);
}

pub fn is_debug_enabled() -> bool {
    DEBUG_ENABLED.load(Ordering::SeqCst)
}

/// Suppress everything below `Warn` (used by the CLI's `--quiet`)
pub fn set_quiet(quiet: bool) {
    QUIET.store(quiet as u8, Ordering::SeqCst);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        };
        f.write_str(label)
    }
}

impl LogLevel {
    fn enabled(self) -> bool {
        match self {
            LogLevel::Debug => is_debug_enabled(),
            LogLevel::Info => QUIET.load(Ordering::SeqCst) == 0,
            LogLevel::Warn | LogLevel::Error => true,
        }
    }
}

/// A single structured log line
#[derive(Debug)]
pub struct LogEntry {
    pub level: LogLevel,
    pub module: &'static str,
    pub message: String,
    pub fields: Vec<(&'static str, String)>,
}

impl LogEntry {
    pub fn new(level: LogLevel, module: &'static str, message: impl Into<String>) -> Self {
        Self {
            level,
            module,
            message: message.into(),
            fields: Vec::new(),
        }
    }

    /// Add a field, redacted according to its key
    pub fn field(mut self, key: &'static str, value: impl fmt::Display) -> Self {
        let redacted = redact_by_key(key, &value.to_string());
        self.fields.push((key, redacted));
        self
    }

    /// Render without the timestamp
    pub fn render(&self) -> String {
        let fields = self
            .fields
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(" ");

        if fields.is_empty() {
            format!("{} [{}] {}", self.level, self.module, self.message)
        } else {
            format!("{} [{}] {} | {}", self.level, self.module, self.message, fields)
        }
    }

    pub fn log(self) {
        if !self.level.enabled() {
            return;
        }
        let timestamp = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ");
        eprintln!("[{}] {}", timestamp, self.render());
    }
}

enum Redaction {
    Full,
    Partial,
    Short,
    None,
}

fn classify(key: &str) -> Redaction {
    let key = key.to_ascii_lowercase();

    const SECRET: &[&str] = &["secret", "private", "api_key", "password", "key_hex"];
    const PARTIAL: &[&str] = &["address", "sender", "recipient", "principal", "account", "signer"];
    const SHORT: &[&str] = &["hash", "digest", "signature", "txid"];

    if SECRET.iter().any(|s| key.contains(s)) || key == "token" || key.ends_with("_token") {
        Redaction::Full
    } else if PARTIAL.iter().any(|s| key.contains(s)) || key == "to" || key == "from" {
        Redaction::Partial
    } else if SHORT.iter().any(|s| key.contains(s)) {
        Redaction::Short
    } else {
        Redaction::None
    }
}

fn redact_by_key(key: &str, value: &str) -> String {
    match classify(key) {
        Redaction::Full => redact_value(value),
        Redaction::Partial => redact_address(value),
        Redaction::Short => redact_hash(value),
        Redaction::None => value.to_string(),
    }
}

fn redact_value(value: &str) -> String {
    if value.is_empty() {
        "[EMPTY]".to_string()
    } else {
        format!("[REDACTED:{}chars]", value.len())
    }
}

/// First 8 (with `0x`) or 6 characters, then the last 4
fn redact_address(address: &str) -> String {
    let trimmed = address.trim();
    let prefix_len = if trimmed.starts_with("0x") { 8 } else { 6 };
    let suffix_len = 4;

    if trimmed.len() <= prefix_len + suffix_len + 3 || !trimmed.is_ascii() {
        return trimmed.to_string();
    }

    format!(
        "{}...{}",
        &trimmed[..prefix_len],
        &trimmed[trimmed.len() - suffix_len..]
    )
}

/// First 10 hex digits, then the last 6
fn redact_hash(hash: &str) -> String {
    let trimmed = hash.trim();
    let prefix_len = if trimmed.starts_with("0x") { 12 } else { 10 };
    let suffix_len = 6;

    if trimmed.len() <= prefix_len + suffix_len + 3 || !trimmed.is_ascii() {
        return trimmed.to_string();
    }

    format!(
        "{}...{}",
        &trimmed[..prefix_len],
        &trimmed[trimmed.len() - suffix_len..]
    )
}

#[doc(hidden)]
#[macro_export]
macro_rules! __log_at {
    ($level:ident, $module:expr, $msg:expr $(, $key:ident = $value:expr)* $(,)?) => {
        $crate::utils::logging::LogEntry::new(
            $crate::utils::logging::LogLevel::$level,
            $module,
            $msg
        )
        $(.field(stringify!($key), &$value))*
        .log()
    };
}

#[macro_export]
macro_rules! log_debug {
    ($($args:tt)*) => { $crate::__log_at!(Debug, $($args)*) };
}

#[macro_export]
macro_rules! log_info {
    ($($args:tt)*) => { $crate::__log_at!(Info, $($args)*) };
}

#[macro_export]
macro_rules! log_warn {
    ($($args:tt)*) => { $crate::__log_at!(Warn, $($args)*) };
}

#[macro_export]
macro_rules! log_error {
    ($($args:tt)*) => { $crate::__log_at!(Error, $($args)*) };
}
