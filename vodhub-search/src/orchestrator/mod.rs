//! Server-side fan-out: concurrent provider dispatch and ordered event emission.

pub mod dispatcher;
pub mod emitter;

pub use dispatcher::{DispatchReport, Dispatcher, ProviderOutcome, SourceFailure};
pub use emitter::{run_search, EmitterState, StreamEmitter};
