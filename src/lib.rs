//! A dynamically reconfigurable packet/frame processing pipeline: a single
//! head, a single tail, and a doubly-linked, priority-ordered chain of
//! processors between them, all sharing one reentrant-on-write lock that
//! separates data-path traversal from structural mutation.

pub mod capability;
pub mod config;
pub mod discovery;
pub mod error;
pub mod event_filter;
pub mod head;
pub mod input;
pub mod lock;
pub mod output;
pub mod pipeline;
pub mod processor;
pub mod properties;
pub mod proxy;
pub mod tail;
pub mod utils;

mod node;
mod shared;

pub mod prelude {
    pub use crate::capability::{Capability, empty, optimize_array, wrap_array};
    pub use crate::error::{ErrorPolicy, Listener, PipelineError, PipelineEvent, ProcessingError, Severity};
    pub use crate::input::{InputMapper, InputTransformer};
    pub use crate::output::{OutputMapper, OutputTransformer, Stack, Switch};
    pub use crate::pipeline::{AttributeValue, Pipeline};
    pub use crate::processor::{PeekGuard, ProcessorLogic, ProcessorNode};
    pub use crate::properties::Property;
    pub use crate::utils::LogErr;
}
