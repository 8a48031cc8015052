pub mod config;
pub mod models;
pub mod store;
pub mod coordination;
pub mod security;
pub mod conversion;
pub mod pipeline;

use tracing_subscriber::EnvFilter;

pub use pipeline::{GeneratedDocument, PdfOrchestrator, PipelineError};

/// Install the global subscriber. `RUST_LOG` overrides the default filter.
/// Later calls are no-ops.
pub fn init_tracing() {
    let installed = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .try_init()
        .is_ok();

    if installed {
        tracing::info!("{} v{} logging initialized", config::APP_NAME, config::APP_VERSION);
    }
}
