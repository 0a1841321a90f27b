use anyhow::Context as _;
use chrono::Utc;
use serde_json::{Map, Value};
use tracing::{Event, Level, Subscriber};
use tracing_error::ErrorLayer;
use tracing_subscriber::fmt::FmtContext;
use tracing_subscriber::fmt::{format::Writer, FormatEvent, FormatFields};
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{fmt, EnvFilter, Registry};

// JSON formatter, one object per line
pub struct JsonEventFormatter;

#[derive(Default)]
struct JsonFieldVisitor {
    message: Option<String>,
    fields: Map<String, Value>,
}

impl tracing::field::Visit for JsonFieldVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        let v = format!("{:?}", value).trim_matches('"').to_string();
        if field.name() == "message" {
            self.message = Some(v);
        } else {
            self.fields.insert(field.name().to_string(), Value::String(v));
        }
    }

    fn record_u64(&mut self, field: &tracing::field::Field, value: u64) {
        self.fields.insert(field.name().to_string(), Value::from(value));
    }

    fn record_i64(&mut self, field: &tracing::field::Field, value: i64) {
        self.fields.insert(field.name().to_string(), Value::from(value));
    }

    fn record_bool(&mut self, field: &tracing::field::Field, value: bool) {
        self.fields.insert(field.name().to_string(), Value::from(value));
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        } else {
            self.fields.insert(field.name().to_string(), Value::String(value.to_string()));
        }
    }
}

impl<S, N> FormatEvent<S, N> for JsonEventFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(&self, ctx: &FmtContext<'_, S, N>, mut writer: Writer<'_>, event: &Event<'_>) -> std::fmt::Result {
        let meta = event.metadata();
        let mut visitor = JsonFieldVisitor::default();
        event.record(&mut visitor);

        let mut root = Map::new();
        root.insert(
            "timestamp".to_string(),
            Value::String(Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)),
        );
        root.insert("level".to_string(), Value::String(meta.level().to_string()));
        root.insert("target".to_string(), Value::String(meta.target().to_string()));
        if let Some(message) = visitor.message.take() {
            root.insert("message".to_string(), Value::String(message));
        }

        let mut fields = visitor.fields;
        if let Some(span) = ctx.lookup_current() {
            fields.insert("span_name".to_string(), Value::String(span.metadata().name().to_string()));
        }
        if !fields.is_empty() {
            root.insert("fields".to_string(), Value::Object(fields));
        }

        let line = serde_json::to_string(&Value::Object(root)).map_err(|_| std::fmt::Error)?;
        writeln!(writer, "{}", line)
    }
}

/// Initialize the tracing subscriber with
/// - the default human readable formatter (when LOG_FORMAT != "json")
/// - JsonEventFormatter for json logging (when LOG_FORMAT = "json")
///
/// This will also install color_eyre to handle the panic in the application
pub fn init_logging() -> anyhow::Result<()> {
    color_eyre::install().map_err(|e| anyhow::anyhow!("Unable to install color_eyre: {e}"))?;

    // Read from `RUST_LOG` environment variable, with fallback to default
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::builder()
            .with_default_directive(Level::INFO.into())
            .parse("oracle_node=info")
            .context("Invalid filter directive")?,
    };

    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());
    if log_format == "json" {
        let fmt_layer = fmt::layer().with_target(true).event_format(JsonEventFormatter);
        let subscriber = Registry::default().with(env_filter).with(fmt_layer).with(ErrorLayer::default());
        tracing::subscriber::set_global_default(subscriber).context("Failed to set global default subscriber")?;
    } else {
        let fmt_layer = fmt::layer().with_target(true).with_file(true).with_line_number(true);
        let subscriber = Registry::default().with(env_filter).with(fmt_layer).with(ErrorLayer::default());
        tracing::subscriber::set_global_default(subscriber).context("Failed to set global default subscriber")?;
    }
    Ok(())
}

/// Renders ordered key/value pairs as `k=v` separated by spaces.
pub fn format_pairs(pairs: &[(&'static str, String)]) -> String {
    pairs.iter().map(|(key, value)| format!("{key}={value}")).collect::<Vec<_>>().join(" ")
}
