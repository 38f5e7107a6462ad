//! Upstream hub connection module
//!
//! Exposes the `UpstreamConnector` to sibling modules through the module
//! registry under the id `hub`. All upstream traffic, persistent or
//! one-shot, goes through the connector; nothing else touches the socket.

mod connector;
mod http;
mod message;

pub use connector::UpstreamConnector;
pub use message::{InboundFrame, ServiceTarget, UpstreamEvent, UpstreamRequest};

use crate::config;
use crate::modules::{Module, ModuleSource};
use async_trait::async_trait;
use std::any::Any;
use std::sync::Arc;

/// Errors from one-shot hub requests
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Request returned abnormal status code: {0}")]
    Status(u16),
}

pub const MODULE_ID: &str = "hub";

const META: &str = r#"// { "id": "hub", "libDeps": ["tokio-tungstenite", "reqwest"] }"#;

/// Module wrapper owning the single connector instance
pub struct HubModule {
    connector: Arc<UpstreamConnector>,
}

impl HubModule {
    pub fn connector(&self) -> Arc<UpstreamConnector> {
        self.connector.clone()
    }
}

pub fn source() -> ModuleSource {
    ModuleSource::new(META, |_host| {
        let hub_config = config::with_config(|c| c.hub.clone());
        let connector = Arc::new(UpstreamConnector::new(hub_config)?);
        Ok(Arc::new(HubModule { connector }) as Arc<dyn Module>)
    })
}

#[async_trait]
impl Module for HubModule {
    async fn start(&self) -> Result<(), String> {
        self.connector.connect();
        Ok(())
    }

    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}
