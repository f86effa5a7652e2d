//! Structured logging setup.
//!
//! JSON lines in production, human-readable text otherwise. `RUST_LOG`
//! overrides the configured level when set.
//!
//! ```json
//! {"timestamp":"2026-01-15T10:30:00.000Z","level":"INFO","target":"obatch::http","fields":{"message":"request completed","status":202}}
//! ```

use obatch_server::config::LoggingSettings;
use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    prelude::*,
    EnvFilter,
};

#[derive(Debug, Clone, PartialEq)]
pub struct LoggingConfig {
    pub json_format: bool,
    /// Level used when `RUST_LOG` is not set.
    pub default_level: Level,
    /// Emit span enter/exit events.
    pub include_spans: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            json_format: false,
            default_level: Level::INFO,
            include_spans: false,
        }
    }
}

impl LoggingConfig {
    pub fn json() -> Self {
        Self {
            json_format: true,
            ..Default::default()
        }
    }

    pub fn text() -> Self {
        Self::default()
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.default_level = level;
        self
    }

    pub fn with_spans(mut self) -> Self {
        self.include_spans = true;
        self
    }
}

impl From<&LoggingSettings> for LoggingConfig {
    /// Unknown level names fall back to `info`.
    fn from(settings: &LoggingSettings) -> Self {
        let level = settings.level.parse::<Level>().unwrap_or(Level::INFO);
        let config = if settings.json {
            Self::json()
        } else {
            Self::text()
        };
        config.with_level(level)
    }
}

/// Installs the global subscriber.
///
/// Later calls are no-ops: the first installed subscriber wins.
pub fn init_logging(config: LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.default_level.to_string()));

    let span_events = if config.include_spans {
        FmtSpan::ENTER | FmtSpan::EXIT
    } else {
        FmtSpan::NONE
    };

    if config.json_format {
        let subscriber = tracing_subscriber::registry().with(filter).with(
            fmt::layer()
                .json()
                .with_span_events(span_events)
                .with_current_span(true)
                .with_target(true)
                .with_file(false)
                .with_line_number(false),
        );
        let _ = tracing::subscriber::set_global_default(subscriber);
    } else {
        let subscriber = tracing_subscriber::registry().with(filter).with(
            fmt::layer()
                .with_span_events(span_events)
                .with_target(true),
        );
        let _ = tracing::subscriber::set_global_default(subscriber);
    }
}

/// JSON subscriber writing to `writer`, at `trace` level.
///
/// Used to capture log output in tests.
pub fn create_json_layer<W>(writer: W) -> impl tracing::Subscriber + Send + Sync
where
    W: for<'writer> tracing_subscriber::fmt::MakeWriter<'writer> + Send + Sync + 'static,
{
    tracing_subscriber::registry()
        .with(EnvFilter::new("trace"))
        .with(
            fmt::layer()
                .json()
                .with_writer(writer)
                .with_target(true)
                .with_current_span(true),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct CaptureWriter {
        buffer: Arc<Mutex<Vec<u8>>>,
    }

    impl CaptureWriter {
        fn output(&self) -> String {
            String::from_utf8_lossy(&self.buffer.lock().unwrap()).to_string()
        }
    }

    impl std::io::Write for CaptureWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.buffer.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for CaptureWriter {
        type Writer = CaptureWriter;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[test]
    fn test_from_settings() {
        let settings = LoggingSettings {
            level: "debug".to_string(),
            json: true,
        };
        let config = LoggingConfig::from(&settings);
        assert!(config.json_format);
        assert_eq!(config.default_level, Level::DEBUG);
        assert!(!config.include_spans);
    }

    #[test]
    fn test_from_settings_unknown_level() {
        let settings = LoggingSettings {
            level: "chatty".to_string(),
            json: false,
        };
        assert_eq!(LoggingConfig::from(&settings), LoggingConfig::text());
    }

    #[test]
    fn test_with_spans() {
        assert!(LoggingConfig::json().with_spans().include_spans);
    }

    /// Test: Batch log events are JSON formatted with their fields
    #[test]
    fn test_json_events_carry_fields() {
        let writer = CaptureWriter::default();
        let subscriber = create_json_layer(writer.clone());

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(target: "obatch::http", status = 202u16, "request completed");
        });

        let output = writer.output();
        let line = output.lines().find(|l| !l.is_empty()).unwrap();
        let json: serde_json::Value = serde_json::from_str(line).unwrap();

        assert_eq!(json["level"], "INFO");
        assert_eq!(json["target"], "obatch::http");
        assert_eq!(json["fields"]["status"], 202);
        assert_eq!(json["fields"]["message"], "request completed");
    }
}
