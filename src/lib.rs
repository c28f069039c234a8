pub mod agent_engine;
pub mod config;
pub mod errors;
pub mod executor;
pub mod llm;
pub mod perception;
pub mod voice;

#[cfg(test)]
mod test_support;

pub use crate::agent_engine::engine::{Collaborators, Pipeline};
pub use crate::agent_engine::state::{AnnouncementStatus, PipelineEvent, PipelineState};
pub use crate::errors::{PilotError, PilotResult};

/// Installs the global tracing subscriber. `RUST_LOG` overrides the `info` default.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}
