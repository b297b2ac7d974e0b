use std::collections::BTreeMap;
use std::fmt;
use tracing::{Level, Span};

/// Context information attached to a span
#[derive(Debug, Clone)]
pub struct LogContext {
    /// Component that is generating the log
    pub component: String,
    /// Operation being performed
    pub operation: Option<String>,
    /// Additional contextual fields, rendered in key order
    pub fields: BTreeMap<String, String>,
}

impl LogContext {
    /// Create a new log context with just the component name
    pub fn new<S: Into<String>>(component: S) -> Self {
        LogContext {
            component: component.into(),
            operation: None,
            fields: BTreeMap::new(),
        }
    }

    /// Create a new log context with component and operation
    pub fn with_operation<S: Into<String>, T: Into<String>>(component: S, operation: T) -> Self {
        LogContext {
            component: component.into(),
            operation: Some(operation.into()),
            fields: BTreeMap::new(),
        }
    }

    /// Add a field to the context
    pub fn with_field<S: Into<String>, T: Into<String>>(mut self, key: S, value: T) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Create a span carrying this context.
    ///
    /// `tracing` needs the level at compile time, hence the match.
    pub fn span(&self, level: Level) -> Span {
        let operation = self.operation.as_deref().unwrap_or("-");
        let fields = self.render_fields();
        match level {
            Level::TRACE => tracing::trace_span!("skyrelay", component = %self.component, operation, fields = %fields),
            Level::DEBUG => tracing::debug_span!("skyrelay", component = %self.component, operation, fields = %fields),
            Level::INFO => tracing::info_span!("skyrelay", component = %self.component, operation, fields = %fields),
            Level::WARN => tracing::warn_span!("skyrelay", component = %self.component, operation, fields = %fields),
            Level::ERROR => tracing::error_span!("skyrelay", component = %self.component, operation, fields = %fields),
        }
    }

    fn render_fields(&self) -> String {
        self.fields
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl fmt::Display for LogContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.component)?;

        if let Some(op) = &self.operation {
            write!(f, "[{}]", op)?;
        }

        for (key, value) in &self.fields {
            write!(f, "[{}={}]", key, value)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_orders_fields() {
        let ctx = LogContext::with_operation("router", "route")
            .with_field("to", "42")
            .with_field("event", "incomingCall");
        assert_eq!(ctx.to_string(), "[router][route][event=incomingCall][to=42]");
    }

    #[test]
    fn test_span_without_subscriber_is_usable() {
        let ctx = LogContext::new("directory");
        let span = ctx.span(Level::DEBUG);
        let _guard = span.enter();
    }
}
