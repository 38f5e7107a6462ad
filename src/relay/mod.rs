//! Downstream display relay module
//!
//! Registered under the id `display`, depending on the `hub` module for
//! all upstream traffic. Owns the WebSocket server the displays connect to
//! and the hub-side correlation state.

mod calendar;
mod connection;
mod history;
mod hub;
mod protocol;
pub mod server;

pub use hub::{ClientState, DisplayHub};
pub use protocol::{ClientRequest, ServerFrame};

use crate::arguments;
use crate::config::{self, DisplayConfig};
use crate::logger::{self, LogTag};
use crate::modules::{Module, ModuleSource};
use crate::upstream::{self, HubModule};
use async_trait::async_trait;
use std::any::Any;
use std::sync::Arc;

pub const MODULE_ID: &str = "display";

const META: &str = r#"// { "id": "display", "libDeps": ["axum"], "modDeps": ["hub"] }"#;

pub struct DisplayModule {
    hub: Arc<DisplayHub>,
    config: DisplayConfig,
}

impl DisplayModule {
    pub fn hub(&self) -> Arc<DisplayHub> {
        self.hub.clone()
    }
}

pub fn source() -> ModuleSource {
    ModuleSource::new(META, |host| {
        let hub_module = host
            .get_as::<HubModule>(upstream::MODULE_ID)
            .ok_or_else(|| "hub module is not available".to_string())?;

        let mut display_config = config::with_config(|c| c.display.clone());
        if let Some(port) = arguments::get_port_override() {
            display_config.port = port;
        }

        Ok(Arc::new(DisplayModule {
            hub: DisplayHub::new(hub_module.connector()),
            config: display_config,
        }) as Arc<dyn Module>)
    })
}

#[async_trait]
impl Module for DisplayModule {
    async fn start(&self) -> Result<(), String> {
        // Route upstream traffic into the hub before accepting clients
        self.hub.spawn_upstream_task();

        let listener = server::bind(&self.config).await?;
        logger::info(
            LogTag::Relay,
            &format!("Starting WebSocket server on port {}", self.config.port),
        );

        let hub = self.hub.clone();
        let access_token = self.config.access_token.clone();
        tokio::spawn(async move {
            if let Err(e) = server::serve(listener, hub, access_token).await {
                logger::error(LogTag::Relay, &e);
            }
        });

        Ok(())
    }

    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}
