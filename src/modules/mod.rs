//! Module lifecycle contract, host context and registry
//!
//! Integration units are compiled in rather than discovered on disk, but
//! they keep the declaration/lifecycle shape of the original system: each
//! unit ships a one-line descriptor (id, library deps, sibling deps), is
//! constructed against the shared host context, registers under its id and
//! gets a `start()` call once every unit is loaded.

mod descriptor;
mod registry;

pub use descriptor::ModuleDescriptor;
pub use registry::ModuleManager;

use crate::logger::{self, LogTag};
use async_trait::async_trait;
use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Lifecycle contract every module implements
#[async_trait]
pub trait Module: Send + Sync {
    /// Invoked once, after every module has been constructed and registered
    async fn start(&self) -> Result<(), String>;

    /// Concrete-type access for cross-module wiring through the registry
    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

/// Installs external libraries a module declares in `libDeps`
///
/// Actual installation happens outside this service; the default
/// implementation only records what was requested.
pub trait DependencyInstaller: Send + Sync {
    fn ensure_installed(&self, libs: &[String]) -> Result<(), String>;
}

/// Default installer: dependencies are compiled into the binary, so a
/// declaration is satisfied by construction. Logged for traceability.
pub struct LoggingInstaller;

impl DependencyInstaller for LoggingInstaller {
    fn ensure_installed(&self, libs: &[String]) -> Result<(), String> {
        logger::debug(
            LogTag::Modules,
            &format!("Library dependencies satisfied at build time: {}", libs.join(", ")),
        );
        Ok(())
    }
}

/// A loadable unit: its declaration line plus a constructor
pub struct ModuleSource {
    pub meta: &'static str,
    build: Box<dyn Fn(&HostContext) -> Result<Arc<dyn Module>, String> + Send + Sync>,
}

impl ModuleSource {
    pub fn new(
        meta: &'static str,
        build: impl Fn(&HostContext) -> Result<Arc<dyn Module>, String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            meta,
            build: Box::new(build),
        }
    }

    pub(crate) fn build(&self, host: &HostContext) -> Result<Arc<dyn Module>, String> {
        (self.build)(host)
    }
}

#[derive(Default)]
struct ModuleTable {
    entries: HashMap<String, Arc<dyn Module>>,
    order: Vec<String>,
}

/// Shared host context every module is constructed with
///
/// Provides the sibling-module registry and the library installer. Module
/// configuration lives in the global config under a section named after the
/// module id (see `config::schemas`).
pub struct HostContext {
    table: RwLock<ModuleTable>,
    installer: Box<dyn DependencyInstaller>,
}

impl HostContext {
    pub fn new(installer: Box<dyn DependencyInstaller>) -> Self {
        Self {
            table: RwLock::new(ModuleTable::default()),
            installer,
        }
    }

    /// Look up a loaded module by id
    pub fn get(&self, id: &str) -> Option<Arc<dyn Module>> {
        let table = self.table.read().ok()?;
        table.entries.get(id).cloned()
    }

    /// Look up a loaded module by id and downcast to its concrete type
    pub fn get_as<T: Send + Sync + 'static>(&self, id: &str) -> Option<Arc<T>> {
        self.get(id)?.as_any().downcast::<T>().ok()
    }

    /// Whether a module id is already registered
    pub fn contains(&self, id: &str) -> bool {
        self.table
            .read()
            .map(|t| t.entries.contains_key(id))
            .unwrap_or(false)
    }

    /// Ids of loaded modules in registration order
    pub fn loaded_ids(&self) -> Vec<String> {
        self.table.read().map(|t| t.order.clone()).unwrap_or_default()
    }

    pub(crate) fn installer(&self) -> &dyn DependencyInstaller {
        self.installer.as_ref()
    }

    /// Register a module. Returns true when an existing entry was replaced.
    pub(crate) fn register(&self, id: &str, instance: Arc<dyn Module>) -> bool {
        let mut table = match self.table.write() {
            Ok(t) => t,
            Err(poisoned) => poisoned.into_inner(),
        };
        let replaced = table.entries.insert(id.to_string(), instance).is_some();
        if !replaced {
            table.order.push(id.to_string());
        }
        replaced
    }
}
