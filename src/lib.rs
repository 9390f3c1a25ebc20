//! LIBRIS Application Library
//!
//! This library provides the catalog modules and the application runner.

pub mod modules;
pub mod utils;

use libris_kernel::{InitCtx, ModuleRegistry};
use libris_kernel::settings::Settings;

/// Run the application: register modules, drive their lifecycle, and serve HTTP.
pub async fn run(settings: Settings) -> anyhow::Result<()> {
    tracing::info!(env = ?settings.environment, "libris-app bootstrap starting");

    let mut registry = ModuleRegistry::new();
    modules::register_all(&mut registry);

    let ctx = InitCtx {
        settings: &settings,
    };
    registry.init_modules(&ctx).await?;
    registry.start_modules(&ctx).await?;

    tracing::info!("libris-app bootstrap complete");

    let served = libris_http::start_server(&registry, &settings).await;

    registry.stop_modules().await?;
    served
}
