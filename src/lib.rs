pub mod config;
pub mod error;
pub mod executor;
pub mod load;
pub mod orchestrator;
pub mod poller;
pub mod probe;
pub mod report;
pub mod result;
pub mod timer;

pub use config::{BenchConfig, Target};
pub use error::{BenchError, BenchResult};
pub use executor::{Backend, Executor};
pub use load::{run_load, LoadOutcome};
pub use orchestrator::{run_all, run_target, Orchestrator, Phase};
pub use poller::{poll_until, PollOutcome, PollPolicy};
pub use probe::{check_all, read_after_write, run_probe, ProbeReport, VisibilityOutcome};
pub use report::{BenchmarkReport, BenchmarkRun, TargetOutcome};
pub use result::{ErrorDescriptor, OperationResult, Record};
pub use timer::{PhaseTimer, PhaseTiming};
