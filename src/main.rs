use homerelay::{
    arguments,
    config,
    logger::{self, LogTag},
    modules::{HostContext, LoggingInstaller, ModuleManager, ModuleSource},
    relay, upstream,
};
use std::sync::Arc;
use tokio::sync::Notify;

/// Module load order is curated by hand: dependencies come first. The
/// loader verifies this rather than sorting.
fn module_sources() -> Vec<ModuleSource> {
    vec![upstream::source(), relay::source()]
}

#[tokio::main]
async fn main() {
    logger::init();

    if arguments::is_help_requested() {
        arguments::print_help();
        return;
    }

    logger::info(LogTag::System, "homerelay starting up...");

    let config_path = arguments::get_config_path_override()
        .unwrap_or_else(|| config::CONFIG_FILE_PATH.to_string());
    if let Err(e) = config::load_config_from_path(&config_path) {
        logger::error(LogTag::System, &e);
        std::process::exit(1);
    }

    let host = Arc::new(HostContext::new(Box::new(LoggingInstaller)));
    let duplicate_policy = config::with_config(|c| c.modules.duplicate_policy);
    let manager = ModuleManager::new(host, duplicate_policy);

    manager.load_all(&module_sources());
    if manager.host().loaded_ids().is_empty() {
        logger::error(LogTag::System, "No modules loaded, exiting");
        std::process::exit(1);
    }
    manager.start_all().await;

    // Run until interrupted
    let shutdown = Arc::new(Notify::new());
    {
        let shutdown = shutdown.clone();
        if let Err(e) = ctrlc::set_handler(move || shutdown.notify_one()) {
            logger::error(
                LogTag::System,
                &format!("Failed to install signal handler: {}", e),
            );
        }
    }
    shutdown.notified().await;

    logger::info(LogTag::System, "Shutting down...");
    relay::server::shutdown();
}
