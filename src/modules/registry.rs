/// Module loading and startup
///
/// Loading is strictly sequential in the order the sources are supplied;
/// the loader checks that every declared sibling dependency is already
/// registered but does not sort (load order is curated by hand in
/// `module_sources`). Every failure is isolated to its module: the load
/// continues and the process never aborts over one bad unit.
use super::{HostContext, Module, ModuleDescriptor, ModuleSource};
use crate::arguments::is_debug_modules_enabled;
use crate::config::DuplicatePolicy;
use crate::logger::{self, LogTag};
use std::sync::Arc;

pub struct ModuleManager {
    host: Arc<HostContext>,
    duplicate_policy: DuplicatePolicy,
}

impl ModuleManager {
    pub fn new(host: Arc<HostContext>, duplicate_policy: DuplicatePolicy) -> Self {
        Self {
            host,
            duplicate_policy,
        }
    }

    pub fn host(&self) -> &Arc<HostContext> {
        &self.host
    }

    /// Load every module source: parse descriptor, verify dependencies,
    /// satisfy library deps, construct, register. Errors skip the module.
    pub fn load_all(&self, sources: &[ModuleSource]) {
        for source in sources {
            if let Err(e) = self.load_one(source) {
                logger::error(LogTag::Modules, &format!("Error loading module: {}", e));
            }
        }
    }

    fn load_one(&self, source: &ModuleSource) -> Result<(), String> {
        let descriptor = ModuleDescriptor::parse(source.meta)?;
        logger::info(
            LogTag::Modules,
            &format!("Loading module {}", descriptor.id),
        );
        if is_debug_modules_enabled() {
            logger::debug(
                LogTag::Modules,
                &format!(
                    "{}: libDeps={:?} modDeps={:?}",
                    descriptor.id, descriptor.lib_deps, descriptor.mod_deps
                ),
            );
        }

        for dependency in &descriptor.mod_deps {
            if !self.host.contains(dependency) {
                return Err(format!(
                    "{}: depends on module {} which is not loaded",
                    descriptor.id, dependency
                ));
            }
        }

        if !descriptor.lib_deps.is_empty() {
            self.host
                .installer()
                .ensure_installed(&descriptor.lib_deps)
                .map_err(|e| format!("{}: {}", descriptor.id, e))?;
        }

        if self.host.contains(&descriptor.id) {
            match self.duplicate_policy {
                DuplicatePolicy::Error => {
                    return Err(format!(
                        "{}: module id already registered",
                        descriptor.id
                    ));
                }
                DuplicatePolicy::Overwrite => {
                    logger::warning(
                        LogTag::Modules,
                        &format!(
                            "Module id {} already registered, replacing earlier instance",
                            descriptor.id
                        ),
                    );
                }
            }
        }

        let instance = source
            .build(&self.host)
            .map_err(|e| format!("{}: {}", descriptor.id, e))?;
        self.host.register(&descriptor.id, instance);
        Ok(())
    }

    /// Start every loaded module in registration order. A start error is
    /// reported and does not prevent the remaining modules from starting.
    pub async fn start_all(&self) {
        for id in self.host.loaded_ids() {
            let Some(instance) = self.host.get(&id) else {
                continue;
            };
            if let Err(e) = instance.start().await {
                logger::error(
                    LogTag::Modules,
                    &format!("Error starting module {}: {}", id, e),
                );
            }
        }
    }
}
