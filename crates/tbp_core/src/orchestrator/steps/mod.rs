//! Pipeline step implementations.
//!
//! Each step handles one stage of a transcription run, in order.

mod environment;
mod fetch;
mod monitor;
mod prepare;
mod publish;
mod resolve;
mod submit;
mod workspace;

pub use environment::LoadEnvironmentStep;
pub use fetch::FetchInputsStep;
pub use monitor::MonitorJobStep;
pub use prepare::PrepareModelsStep;
pub use publish::PublishStep;
pub use resolve::ResolveWorkItemsStep;
pub use submit::SubmitJobStep;
pub use workspace::PrepareWorkspaceStep;
