pub mod orchestrator;
pub mod queue;

pub use orchestrator::{
    BatchOrchestrator, BatchSummary, MemoryOpener, SourceOpener, VideoAnalysis,
};
pub use queue::{BatchQueue, ProcessingStatus, QueueItem, VideoAsset};
