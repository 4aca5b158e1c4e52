// AI writing endpoints: draft, revision chat, titles, workflow, provider health.
// All model calls go through providers::ProviderGateway.

pub mod handlers;
pub mod prompts;
pub mod service;

pub use service::WorkflowOutput;
