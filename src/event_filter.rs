use std::borrow::Cow;
use std::collections::HashSet;
use std::sync::Mutex;
use tracing::field::{Field, Visit};
use tracing::{Subscriber, span};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

/// Span target used by a processor's dispatch span; events nested under it are
/// candidates for deduplication by [`ProcessorEventFilter`].
pub const PROCESSOR_RUN_TARGET: &str = "flowpipe::processor::dispatch";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct EventPos {
    index: u64,
    line: u64,
    file: Cow<'static, str>,
}

/// A [`Layer`] that filters duplicate events coming from the same processor at
/// the same source location — useful when a processor runs on every packet and
/// would otherwise flood the log with the same warning on every call.
#[derive(Debug, Default)]
pub struct ProcessorEventFilter {
    seen: Mutex<HashSet<EventPos>>,
    enabled: bool,
}
impl ProcessorEventFilter {
    pub fn new(enabled: bool) -> Self {
        Self { seen: Mutex::new(HashSet::new()), enabled }
    }
    pub fn clear_seen(&self) {
        self.seen.lock().unwrap().clear();
    }
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }
}
impl<S: Subscriber + for<'a> LookupSpan<'a>> Layer<S> for ProcessorEventFilter {
    fn on_new_span(&self, attrs: &span::Attributes<'_>, id: &span::Id, ctx: Context<'_, S>) {
        if !self.enabled || attrs.metadata().target() != PROCESSOR_RUN_TARGET {
            return;
        }
        let mut visitor = SpanVisitor(None);
        attrs.record(&mut visitor);
        if let Some(index) = visitor.0 {
            let span = ctx.span(id).expect("missing span");
            span.extensions_mut().insert(IndexStorage(index));
        }
    }
    fn event_enabled(&self, event: &tracing::Event<'_>, ctx: Context<'_, S>) -> bool {
        if !self.enabled {
            return true;
        }
        let mut visitor = EventVisitor { noisy: false, file: None, line: None };
        event.record(&mut visitor);
        if visitor.noisy {
            return true;
        }
        let Some(index) = ctx
            .event_scope(event)
            .and_then(|mut scope| scope.find_map(|s| s.extensions().get::<IndexStorage>().map(|s| s.0)))
        else {
            return true;
        };
        let meta = event.metadata();
        let file = visitor
            .file
            .map_or(Cow::Borrowed(meta.file().unwrap_or("<unknown>")), Cow::Owned);
        let line = visitor.line.or(meta.line().map(From::from)).unwrap_or(0);
        self.seen.lock().unwrap().insert(EventPos { index, line, file })
    }
}

struct IndexStorage(u64);

struct SpanVisitor(Option<u64>);
impl Visit for SpanVisitor {
    fn record_debug(&mut self, _field: &Field, _value: &dyn std::fmt::Debug) {}
    fn record_u64(&mut self, field: &Field, value: u64) {
        if field.name() == "processor.index" {
            self.0 = Some(value);
        }
    }
}
struct EventVisitor {
    noisy: bool,
    file: Option<String>,
    line: Option<u64>,
}
impl Visit for EventVisitor {
    fn record_debug(&mut self, _field: &Field, _value: &dyn std::fmt::Debug) {}
    fn record_bool(&mut self, field: &Field, value: bool) {
        if field.name() == "allow_noisy" {
            self.noisy = value;
        }
    }
    fn record_str(&mut self, field: &Field, value: &str) {
        if !self.noisy && field.name() == "source.file" {
            self.file = Some(value.to_string());
        }
    }
    fn record_u64(&mut self, field: &Field, value: u64) {
        if field.name() == "source.line" {
            self.line = Some(value);
        }
    }
}
