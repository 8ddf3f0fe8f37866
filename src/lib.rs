//! Command-line application framework.
//!
//! Layers (leaves first):
//!   schema / bind   declared command surface, argv binding
//!   workflow        named async steps over a shared context
//!   pool            bounded concurrent jobs, sequential iteration, retry
//!   registry        command storage and token resolution
//!   app             dispatcher tying the above to config, output and prompts
//!
//! Disk-backed commands are JSON / YAML manifests (see `manifest`).

pub mod app;
pub mod bind;
pub mod cmd;
pub mod command;
pub mod config;
pub mod error;
pub mod manifest;
pub mod pool;
pub mod registry;
pub mod schema;
pub mod utils;
pub mod workflow;

pub use app::App;
pub use bind::{Binding, ResolvedInvocation, bind};
pub use command::{Command, CommandContext, CommandHandler, FnHandler, Outcome};
pub use config::{AppConfig, CommandGroup};
pub use error::{CliError, JobError};
pub use pool::{Job, PoolRun, TaskPool, for_each_in_order, job, parallel, retry};
pub use registry::{CommandSource, Registry};
pub use schema::{ArgumentSpec, CommandSpec, Mode, OptionSpec};
pub use workflow::{Next, StepRecord, Workflow, WorkflowContext, WorkflowError};
