pub mod mapper;
pub use mapper::{MapOutcome, MapperRules, SkipReason, map_media};

pub mod upsert;
pub use upsert::{PersistenceError, TitleSink, UpsertEngine};

pub mod progress;
pub use progress::{Checkpoint, ProgressError, ProgressTracker};

pub mod orchestrator;
pub use orchestrator::{
    ImportCounters, ImportError, ImportRunner, RunMode, RunPhase, RunPlan, RunSummary,
    RunnerOptions, StopReason,
};
