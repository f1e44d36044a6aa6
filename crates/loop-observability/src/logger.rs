//! Logger handles
//!
//! A [`Logger`] is a cheap, immutable handle: an emitter plus a set of bound
//! fields. [`Logger::child`] returns a new handle with extra bindings and
//! never touches the parent.
//!
//! Every level has two methods: `info(msg)` for a bare message and
//! `info_with(fields, msg)` for structured fields plus a message.

use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::emitter::LogEmitter;
use crate::error::{ObservabilityError, Result};
use crate::fields::Fields;
use crate::level::LogLevel;

static GLOBAL_LOGGER: OnceCell<Logger> = OnceCell::new();

/// Leveled logging handle with immutable bound fields
#[derive(Clone)]
pub struct Logger {
    emitter: Arc<LogEmitter>,
    bindings: Arc<Fields>,
}

impl Logger {
    /// Root logger with no bindings
    pub fn new(emitter: Arc<LogEmitter>) -> Self {
        Self {
            emitter,
            bindings: Arc::new(Fields::new()),
        }
    }

    /// Derive a handle whose bindings are this handle's overlaid with `bindings`
    pub fn child(&self, bindings: Fields) -> Logger {
        Logger {
            emitter: Arc::clone(&self.emitter),
            bindings: Arc::new(self.bindings.merged(&bindings)),
        }
    }

    /// Handle for background activity execution
    pub fn for_activity(&self, activity: &str, correlation_id: Option<&str>) -> Logger {
        let mut bindings = Fields::new().with("activity", activity);
        if let Some(correlation_id) = correlation_id {
            bindings.insert("correlation_id", correlation_id);
        }
        self.child(bindings)
    }

    /// Handle for long-running workflow execution
    pub fn for_workflow(&self, workflow_id: &str, correlation_id: Option<&str>) -> Logger {
        let mut bindings = Fields::new().with("workflow_id", workflow_id);
        if let Some(correlation_id) = correlation_id {
            bindings.insert("correlation_id", correlation_id);
        }
        self.child(bindings)
    }

    /// Handle for inbound HTTP request handling
    pub fn for_request(&self, request_id: &str, method: &str, path: &str) -> Logger {
        self.child(
            Fields::new()
                .with("request_id", request_id)
                .with("method", method)
                .with("path", path),
        )
    }

    pub fn bindings(&self) -> &Fields {
        &self.bindings
    }

    pub fn emitter(&self) -> &Arc<LogEmitter> {
        &self.emitter
    }

    /// Whether a call at `level` would be emitted
    pub fn enabled(&self, level: LogLevel) -> bool {
        self.emitter.enabled(level)
    }

    pub fn log(&self, level: LogLevel, message: &str) {
        self.emitter.emit(level, &self.bindings, None, message);
    }

    pub fn log_with(&self, level: LogLevel, fields: Fields, message: &str) {
        self.emitter.emit(level, &self.bindings, Some(&fields), message);
    }

    /// Like [`Logger::log_with`], building the fields only when `level` is enabled
    pub fn log_lazy<F>(&self, level: LogLevel, fields: F, message: &str)
    where
        F: FnOnce() -> Fields,
    {
        if self.enabled(level) {
            self.log_with(level, fields(), message);
        }
    }

    pub fn trace(&self, message: &str) {
        self.log(LogLevel::Trace, message);
    }

    pub fn trace_with(&self, fields: Fields, message: &str) {
        self.log_with(LogLevel::Trace, fields, message);
    }

    pub fn debug(&self, message: &str) {
        self.log(LogLevel::Debug, message);
    }

    pub fn debug_with(&self, fields: Fields, message: &str) {
        self.log_with(LogLevel::Debug, fields, message);
    }

    pub fn info(&self, message: &str) {
        self.log(LogLevel::Info, message);
    }

    pub fn info_with(&self, fields: Fields, message: &str) {
        self.log_with(LogLevel::Info, fields, message);
    }

    pub fn warn(&self, message: &str) {
        self.log(LogLevel::Warn, message);
    }

    pub fn warn_with(&self, fields: Fields, message: &str) {
        self.log_with(LogLevel::Warn, fields, message);
    }

    pub fn error(&self, message: &str) {
        self.log(LogLevel::Error, message);
    }

    pub fn error_with(&self, fields: Fields, message: &str) {
        self.log_with(LogLevel::Error, fields, message);
    }

    pub fn fatal(&self, message: &str) {
        self.log(LogLevel::Fatal, message);
    }

    pub fn fatal_with(&self, fields: Fields, message: &str) {
        self.log_with(LogLevel::Fatal, fields, message);
    }
}

impl std::fmt::Debug for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logger")
            .field("service", &self.emitter.service())
            .field("bindings", &self.bindings)
            .finish()
    }
}

/// Install the process-wide root logger; only the first call succeeds
pub fn install_global(logger: Logger) -> Result<()> {
    GLOBAL_LOGGER
        .set(logger)
        .map_err(|_| ObservabilityError::AlreadyInitialized)
}

/// Process-wide root logger, if one was installed
pub fn global() -> Option<&'static Logger> {
    GLOBAL_LOGGER.get()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::MemoryWriter;
    use crate::span::NoSpanAccessor;
    use serde_json::Value;

    fn logger(min_level: LogLevel) -> (Logger, MemoryWriter) {
        let writer = MemoryWriter::new();
        let emitter = LogEmitter::builder("loop", "production")
            .min_level(min_level)
            .console(Arc::new(writer.clone()))
            .span_accessor(Arc::new(NoSpanAccessor))
            .build();
        (Logger::new(Arc::new(emitter)), writer)
    }

    fn parse(line: &str) -> Value {
        serde_json::from_str(line).unwrap()
    }

    #[test]
    fn test_message_only_call() {
        let (logger, writer) = logger(LogLevel::Info);
        logger.info("plain message");

        let line = parse(&writer.lines()[0]);
        assert_eq!(line["msg"], "plain message");
        assert_eq!(line["level"], "info");

        let object = line.as_object().unwrap();
        let mut keys: Vec<&str> = object.keys().map(String::as_str).collect();
        keys.sort();
        assert_eq!(keys, vec!["env", "level", "msg", "service", "time"]);
    }

    #[test]
    fn test_child_does_not_mutate_parent() {
        let (root, writer) = logger(LogLevel::Info);
        let child = root.child(Fields::new().with("a", 1)).child(Fields::new().with("b", 2));

        child.info("from child");
        root.info("from root");

        let lines = writer.lines();
        let from_child = parse(&lines[0]);
        assert_eq!(from_child["a"], 1);
        assert_eq!(from_child["b"], 2);

        let from_root = parse(&lines[1]);
        assert!(from_root.get("a").is_none());
        assert!(from_root.get("b").is_none());
        assert!(root.bindings().is_empty());
    }

    #[test]
    fn test_child_binding_overrides_parent_binding() {
        let (root, _) = logger(LogLevel::Info);
        let parent = root.child(Fields::new().with("component", "parent"));
        let child = parent.child(Fields::new().with("component", "child"));

        assert_eq!(parent.bindings().get_str("component"), Some("parent"));
        assert_eq!(child.bindings().get_str("component"), Some("child"));
    }

    #[test]
    fn test_call_site_fields_win_over_bindings() {
        let (root, writer) = logger(LogLevel::Info);
        let child = root.child(Fields::new().with("order_id", "bound").with("kept", true));

        child.warn_with(Fields::new().with("order_id", "call-site"), "collision");

        let line = parse(&writer.lines()[0]);
        assert_eq!(line["order_id"], "call-site");
        assert_eq!(line["kept"], true);
        assert_eq!(line["level"], "warn");
    }

    #[test]
    fn test_below_threshold_produces_nothing() {
        let (logger, writer) = logger(LogLevel::Warn);
        logger.debug("quiet");
        logger.info_with(Fields::new().with("k", "v"), "quiet");

        assert!(writer.lines().is_empty());
    }

    #[test]
    fn test_log_lazy_skips_field_construction_when_disabled() {
        let (logger, writer) = logger(LogLevel::Error);
        let mut built = false;

        logger.log_lazy(
            LogLevel::Debug,
            || {
                built = true;
                Fields::new()
            },
            "skipped",
        );

        assert!(!built);
        assert!(writer.lines().is_empty());

        logger.log_lazy(LogLevel::Error, || Fields::new().with("k", 1), "built");
        assert_eq!(parse(&writer.lines()[0])["k"], 1);
    }

    #[test]
    fn test_every_level_method() {
        let (logger, writer) = logger(LogLevel::Trace);
        logger.trace("t");
        logger.debug("d");
        logger.info("i");
        logger.warn("w");
        logger.error("e");
        logger.fatal("f");
        logger.fatal_with(Fields::new().with("x", 1), "f2");

        let levels: Vec<String> = writer
            .lines()
            .iter()
            .map(|l| parse(l)["level"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(
            levels,
            vec!["trace", "debug", "info", "warn", "error", "fatal", "fatal"]
        );
    }

    #[test]
    fn test_convenience_constructors() {
        let (root, _) = logger(LogLevel::Info);

        let activity = root.for_activity("charge_card", Some("corr-1"));
        assert_eq!(activity.bindings().get_str("activity"), Some("charge_card"));
        assert_eq!(activity.bindings().get_str("correlation_id"), Some("corr-1"));

        let workflow = root.for_workflow("wf-42", None);
        assert_eq!(workflow.bindings().get_str("workflow_id"), Some("wf-42"));
        assert!(!workflow.bindings().contains_key("correlation_id"));

        let request = root.for_request("req-7", "POST", "/orders");
        assert_eq!(request.bindings().get_str("request_id"), Some("req-7"));
        assert_eq!(request.bindings().get_str("method"), Some("POST"));
        assert_eq!(request.bindings().get_str("path"), Some("/orders"));
    }

    #[test]
    fn test_bound_correlation_id_overrides_ambient() {
        let (root, writer) = logger(LogLevel::Info);
        let record = crate::correlation::CorrelationRecord::new("ambient").unwrap();

        crate::correlation::sync_scope(record, || {
            root.for_activity("sync", Some("bound")).info("activity ran");
            root.info("plain");
        });

        let lines = writer.lines();
        assert_eq!(parse(&lines[0])["correlation_id"], "bound");
        assert_eq!(parse(&lines[1])["correlation_id"], "ambient");
    }
}
