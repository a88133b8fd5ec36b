//! Logging setup with secret redaction.
//!
//! Every formatted log line passes through [`RedactionPatterns`] before it
//! reaches the output, so bot tokens that end up in request URLs or error
//! messages are masked.

use regex::Regex;
use std::io::{self, Write};
use std::sync::Arc;
use tracing_subscriber::{prelude::*, EnvFilter};

/// Filter used when `RUST_LOG` is not set
pub const DEFAULT_LOG_FILTER: &str =
    "discord_telegram_relay=info,serenity=warn,teloxide=warn,reqwest=warn";
/// Filter used when `RUST_LOG` is not set and `DEBUG_MODE` is on
pub const DEBUG_LOG_FILTER: &str =
    "discord_telegram_relay=debug,serenity=info,teloxide=info,reqwest=info";

/// Regex patterns for redacting bot tokens
pub struct RedactionPatterns {
    telegram_url: Regex,
    telegram_bare: Regex,
    telegram_prefixed: Regex,
    discord: Regex,
}

impl RedactionPatterns {
    /// Compile all patterns
    ///
    /// # Errors
    ///
    /// Returns an error if any regex pattern is invalid
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            telegram_url: Regex::new(r"(https?://[^/]+/bot)([0-9]+:[A-Za-z0-9_-]+)(/['\s]*)")?,
            telegram_bare: Regex::new(r"([0-9]{8,10}:[A-Za-z0-9_-]{35})")?,
            telegram_prefixed: Regex::new(r"(bot[0-9]{8,10}:)[A-Za-z0-9_-]+")?,
            discord: Regex::new(r"[MNO][A-Za-z0-9_-]{23,27}\.[A-Za-z0-9_-]{6}\.[A-Za-z0-9_-]{27,38}")?,
        })
    }

    /// Mask every token found in `input`
    #[must_use]
    pub fn redact(&self, input: &str) -> String {
        let output = self
            .telegram_url
            .replace_all(input, "$1[TELEGRAM_TOKEN]$3");
        let output = self
            .telegram_bare
            .replace_all(&output, "[TELEGRAM_TOKEN]");
        let output = self
            .telegram_prefixed
            .replace_all(&output, "$1[TELEGRAM_TOKEN]");
        self.discord
            .replace_all(&output, "[DISCORD_TOKEN]")
            .into_owned()
    }
}

/// Writer that redacts each buffer before forwarding it
pub struct RedactingWriter<W: Write> {
    inner: W,
    patterns: Arc<RedactionPatterns>,
}

impl<W: Write> RedactingWriter<W> {
    /// Wrap `inner`
    pub const fn new(inner: W, patterns: Arc<RedactionPatterns>) -> Self {
        Self { inner, patterns }
    }
}

impl<W: Write> Write for RedactingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let s = String::from_utf8_lossy(buf);
        let redacted = self.patterns.redact(&s);
        self.inner.write_all(redacted.as_bytes())?;
        // Report the original length; the redacted one may differ.
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// `MakeWriter` producing [`RedactingWriter`]s
pub struct RedactingMakeWriter<F> {
    make_inner: F,
    patterns: Arc<RedactionPatterns>,
}

impl<F> RedactingMakeWriter<F> {
    /// Wrap a writer factory such as `io::stderr`
    pub const fn new(make_inner: F, patterns: Arc<RedactionPatterns>) -> Self {
        Self {
            make_inner,
            patterns,
        }
    }
}

impl<'a, F, W> tracing_subscriber::fmt::MakeWriter<'a> for RedactingMakeWriter<F>
where
    F: Fn() -> W + 'static,
    W: Write,
{
    type Writer = RedactingWriter<W>;

    fn make_writer(&'a self) -> Self::Writer {
        RedactingWriter::new((self.make_inner)(), self.patterns.clone())
    }
}

fn debug_mode() -> bool {
    std::env::var("DEBUG_MODE")
        .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

/// Install the global subscriber writing redacted lines to stderr.
///
/// `RUST_LOG` wins over the built-in filters.
pub fn init_logging(patterns: Arc<RedactionPatterns>) {
    let make_writer = RedactingMakeWriter::new(io::stderr, patterns);
    let default_filter = if debug_mode() {
        DEBUG_LOG_FILTER
    } else {
        DEFAULT_LOG_FILTER
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(make_writer))
        .init();
}
