pub mod orchestrator;

pub use orchestrator::{
    CycleError, CycleReport, DecisionLoop, LoopSettings, OrchestratorError, RunSummary,
    ShutdownHandle,
};
