pub mod controller;
pub mod coordinator;
pub mod janitor;
pub mod pipeline;
pub mod preparer;
pub mod registry;
pub mod splitter;

pub use controller::{AppController, HealthReport};
pub use coordinator::TranscriptionCoordinator;
pub use janitor::{ArtifactJanitor, ArtifactKind, ReleaseReport};
pub use pipeline::{AudioSource, TranscriptionPipeline, TranscriptionRequest};
pub use preparer::AudioPreparer;
pub use registry::{BackendDescriptor, BackendRegistry, BackendSummary};
pub use splitter::SizeBudgetSplitter;
