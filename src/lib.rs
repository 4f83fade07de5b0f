pub mod cluster;
pub mod combinations;
pub mod config;
pub mod error;
pub mod events;
pub mod export;
pub mod impact;
pub mod naming;
pub mod priors;
pub mod profile;
pub mod rankings;
pub mod report;
pub mod scoring;
pub mod suggestions;
pub mod team;
pub mod templates;

pub use config::AnalysisConfig;
pub use error::{RoleError, RoleResult};
pub use events::{EventTable, MatchResults};
pub use profile::{Metric, Profile};
pub use templates::RoleTemplates;

/// Installs the fmt subscriber; `RUST_LOG` overrides the `info` default.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
