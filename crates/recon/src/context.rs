use std::cell::RefCell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;

/// A data-quality finding that did not fail anything but must not be lost.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Warning {
    pub component: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule: Option<String>,
    pub message: String,
}

/// Per-run logging context handed to every component of one validation pass.
///
/// Log lines are prefixed with the run label, and every warning is both
/// logged and retained so it ends up in the report. A context belongs to
/// exactly one pass and is not shared between threads.
#[derive(Debug)]
pub struct RunContext {
    label: String,
    current_rule: RefCell<Option<String>>,
    warnings: RefCell<Vec<Warning>>,
}

impl RunContext {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            current_rule: RefCell::new(None),
            warnings: RefCell::new(Vec::new()),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub(crate) fn enter_rule(&self, name: &str) {
        *self.current_rule.borrow_mut() = Some(name.to_string());
        log::info!("[{}] rule {name}: start", self.label);
    }

    pub(crate) fn leave_rule(&self) {
        *self.current_rule.borrow_mut() = None;
    }

    pub fn info(&self, message: impl AsRef<str>) {
        log::info!("[{}] {}", self.label, message.as_ref());
    }

    pub fn debug(&self, message: impl AsRef<str>) {
        log::debug!("[{}] {}", self.label, message.as_ref());
    }

    pub fn error(&self, message: impl AsRef<str>) {
        log::error!("[{}] {}", self.label, message.as_ref());
    }

    /// Log and record a warning, attributed to the rule currently running.
    pub fn warn(&self, component: &'static str, message: impl Into<String>) {
        let message = message.into();
        let rule = self.current_rule.borrow().clone();
        match &rule {
            Some(r) => log::warn!("[{}] {component} ({r}): {message}", self.label),
            None => log::warn!("[{}] {component}: {message}", self.label),
        }
        self.warnings.borrow_mut().push(Warning { component, rule, message });
    }

    pub fn warning_count(&self) -> usize {
        self.warnings.borrow().len()
    }

    /// Drain collected warnings (used when the report is assembled).
    pub fn take_warnings(&self) -> Vec<Warning> {
        std::mem::take(&mut *self.warnings.borrow_mut())
    }
}

/// Coarse-grained cancellation, checked by the engine between rules.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
