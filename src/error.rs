//! Structural, runtime, and configuration errors, plus the lifecycle event model.

use crate::utils::LogErr;
use smol_str::SmolStr;
use std::any::Any;
use std::sync::Arc;
use thiserror::Error;

/// Structural errors returned synchronously from pipeline mutation APIs.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("an output with id {0:?} is already registered")]
    DuplicateOutput(SmolStr),
    #[error("no output with id {0:?} is registered")]
    OutputNotFound(SmolStr),
    #[error("priority {0} is outside the valid range 0..=100")]
    InvalidPriority(i32),
    #[error("{0} must not be empty")]
    InvalidNullArgument(&'static str),
    #[error("the pipeline is closed")]
    PipelineClosed,
    #[error("a processor with id {0:?} is already attached to a pipeline")]
    AlreadyAttached(SmolStr),
}
impl LogErr for PipelineError {
    fn log_err(&self) {
        tracing::warn!(error = %self, "pipeline error");
    }
}

/// Severity of a reported condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Info,
    Warning,
    Error,
    Fatal,
}

/// How a processor's runtime failure should be handled.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorPolicy {
    /// Surface to the pipeline's listeners at [`Severity::Error`] and stop forwarding
    /// for this dispatch.
    #[default]
    Propagate,
    /// Log at [`Severity::Warning`] and stop forwarding for this dispatch.
    Suppress,
    /// Re-run the processor once; on a second failure, behave like [`Self::Propagate`].
    Retry,
    /// Surface at [`Severity::Fatal`] and request pipeline shutdown.
    Terminate,
}

/// A processor's runtime failure, attributed and ready for listener dispatch.
#[derive(Debug, Clone)]
pub struct ProcessingError {
    pub cause: SmolStr,
    pub processor: SmolStr,
    pub data: Option<Arc<dyn Any + Send + Sync>>,
    pub severity: Severity,
    pub extras: Vec<(SmolStr, SmolStr)>,
}

impl ProcessingError {
    pub fn from_panic(processor: impl Into<SmolStr>, severity: Severity, payload: Box<dyn Any + Send>) -> Self {
        let cause = payload
            .downcast_ref::<&str>()
            .map(|s| SmolStr::new(*s))
            .or_else(|| payload.downcast_ref::<String>().map(SmolStr::new))
            .unwrap_or_else(|| SmolStr::new("processor panicked"));
        Self {
            cause,
            processor: processor.into(),
            data: None,
            severity,
            extras: Vec::new(),
        }
    }

    pub fn with_data(mut self, data: Arc<dyn Any + Send + Sync>) -> Self {
        self.data = Some(data);
        self
    }
}

/// A pipeline lifecycle event, fired to listeners under the write lock once a
/// mutation has completed.
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    ProcessorAdded { id: SmolStr },
    ProcessorRemoved { id: SmolStr },
    ProcessorEnabled { id: SmolStr, enabled: bool },
    AttributeChanged { name: SmolStr, old: Option<crate::pipeline::AttributeValue>, new: Option<crate::pipeline::AttributeValue> },
    PipelineError { error: Arc<ProcessingError>, severity: Severity },
}

/// Receives pipeline lifecycle events. A panicking listener is caught and reported
/// at [`Severity::Warning`] without re-entering listener dispatch.
pub trait Listener: Send + Sync {
    fn on_event(&self, event: &PipelineEvent);
}

impl<F: Fn(&PipelineEvent) + Send + Sync> Listener for F {
    fn on_event(&self, event: &PipelineEvent) {
        self(event)
    }
}

/// Invoke every listener, catching and logging panics without recursing back
/// into [`Listener::on_event`].
pub(crate) fn fire_event(listeners: &[Arc<dyn Listener>], event: &PipelineEvent) {
    for listener in listeners {
        let listener = listener.clone();
        let event = event.clone();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            listener.on_event(&event);
        }));
        if let Err(payload) = result {
            let err = ProcessingError::from_panic("<listener>", Severity::Warning, payload);
            tracing::warn!(cause = %err.cause, "pipeline listener panicked");
        }
    }
}
