// SPDX-License-Identifier: MIT

//! The top-level `Receptor` orchestrator (spec §4.8/§4.9), grounded in the
//! Go original's `Receptor`/`NewReceptor`/`Init`/`Start`/`Stop` in
//! `receptor.go`.
//!
//! Unlike the original, there are no package-level `Watchers`/`Reactors`
//! registries: every plugin type is resolved through one `Lookup` this
//! `Receptor` owns, matching the spec's replace-the-globals design note.
//! That also collapses the original's separate "unknown type" case — there
//! is no registry to miss against, only a plugin executable `Lookup`
//! either finds or doesn't, surfaced as `SetupError::ExecutableNotFound`.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::select_all;
use receptor_core::{RawConfig, SetupError};
use receptor_pipeline::{RunningService, Service};
use receptor_plugin::Lookup;
use thiserror::Error;

use crate::config::Config;

/// Failures setting up services, fatal to startup (spec §7). Each variant
/// names the service/actor that failed so the operator can find it in the
/// config without guessing.
#[derive(Debug, Error)]
pub enum InitError {
    #[error("service {service:?}: watcher {instance:?} (type {actor_type:?}): {source}")]
    Watcher { service: String, instance: String, actor_type: String, #[source] source: SetupError },
    #[error("service {service:?}: reactor {instance:?} (type {actor_type:?}): {source}")]
    Reactor { service: String, instance: String, actor_type: String, #[source] source: SetupError },
    #[error("global config for watcher type {actor_type:?}: {source}")]
    GlobalWatcher { actor_type: String, #[source] source: SetupError },
    #[error("global config for reactor type {actor_type:?}: {source}")]
    GlobalReactor { actor_type: String, #[source] source: SetupError },
}

/// Built but not yet started: every watcher/reactor type referenced by the
/// config has been set up, and every actor instance has been accepted, but
/// no endpoint is running yet.
pub struct Receptor {
    lookup: Arc<Lookup>,
    services: Vec<Service>,
    running: Vec<RunningService>,
}

impl Receptor {
    /// Resolves every plugin type the config references, calls `Setup`
    /// once per type (never once per instance — the original's mistake of
    /// re-running global setup per service is not repeated here), then
    /// `Accept`s every actor instance and wires the resulting endpoints
    /// into one `Service` per configured service.
    pub async fn init(config: &Config, plugin_dir: impl Into<PathBuf>) -> Result<Self, InitError> {
        let lookup = Arc::new(Lookup::new(plugin_dir));

        let mut watcher_types = BTreeSet::new();
        let mut reactor_types = BTreeSet::new();
        for service in config.services.values() {
            watcher_types.extend(service.watchers.values().map(|a| a.actor_type.clone()));
            reactor_types.extend(service.reactors.values().map(|a| a.actor_type.clone()));
        }

        for actor_type in &watcher_types {
            let watcher = lookup.watcher(actor_type).await.map_err(|source| InitError::GlobalWatcher {
                actor_type: actor_type.clone(),
                source,
            })?;
            let global_cfg = config.watchers.get(actor_type).cloned().unwrap_or_default();
            watcher
                .setup(RawConfig(global_cfg))
                .await
                .map_err(|source| InitError::GlobalWatcher { actor_type: actor_type.clone(), source })?;
        }
        for actor_type in &reactor_types {
            let reactor = lookup.reactor(actor_type).await.map_err(|source| InitError::GlobalReactor {
                actor_type: actor_type.clone(),
                source,
            })?;
            let global_cfg = config.reactors.get(actor_type).cloned().unwrap_or_default();
            reactor
                .setup(RawConfig(global_cfg))
                .await
                .map_err(|source| InitError::GlobalReactor { actor_type: actor_type.clone(), source })?;
        }

        let mut services = Vec::with_capacity(config.services.len());
        for (service_name, service_cfg) in &config.services {
            let mut svc = Service::new(service_name.clone());

            for (instance, actor) in &service_cfg.watchers {
                let watcher = lookup.watcher(&actor.actor_type).await.map_err(|source| InitError::Watcher {
                    service: service_name.clone(),
                    instance: instance.clone(),
                    actor_type: actor.actor_type.clone(),
                    source,
                })?;
                let endpoint =
                    watcher.accept(RawConfig(actor.cfg.clone())).await.map_err(|source| InitError::Watcher {
                        service: service_name.clone(),
                        instance: instance.clone(),
                        actor_type: actor.actor_type.clone(),
                        source,
                    })?;
                svc.add_watcher(instance.clone(), endpoint);
            }

            for (instance, actor) in &service_cfg.reactors {
                let reactor = lookup.reactor(&actor.actor_type).await.map_err(|source| InitError::Reactor {
                    service: service_name.clone(),
                    instance: instance.clone(),
                    actor_type: actor.actor_type.clone(),
                    source,
                })?;
                let endpoint =
                    reactor.accept(RawConfig(actor.cfg.clone())).await.map_err(|source| InitError::Reactor {
                        service: service_name.clone(),
                        instance: instance.clone(),
                        actor_type: actor.actor_type.clone(),
                        source,
                    })?;
                svc.add_reactor(instance.clone(), endpoint);
            }

            services.push(svc);
        }

        Ok(Self { lookup, services, running: Vec::new() })
    }

    /// Starts every service. Non-blocking, mirroring the original's
    /// `Start` — each `Service::start` spawns its own topology and returns
    /// immediately.
    pub fn start(&mut self) {
        self.running = std::mem::take(&mut self.services).into_iter().map(Service::start).collect();
    }

    /// Resolves the first time any running service fails on its own (spec
    /// §4.8) — a watcher or reactor ending for a reason other than `stop`
    /// having been called. Never resolves if no service has been started.
    pub async fn failed(&self) {
        if self.running.is_empty() {
            std::future::pending::<()>().await;
            return;
        }
        let waiters = self.running.iter().map(|svc| {
            Box::pin(svc.failed()) as std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send + '_>>
        });
        select_all(waiters).await;
    }

    /// Stops every service in parallel, then tears down every plugin
    /// process `Lookup` started. Returns the names of services that had at
    /// least one endpoint miss its stop deadline.
    pub async fn stop(&self, service_timeout: Duration, plugin_timeout: Duration) -> Vec<String> {
        let results =
            futures_util::future::join_all(self.running.iter().map(|svc| async move {
                (svc.name().to_string(), svc.stop(service_timeout).await)
            }))
            .await;
        self.lookup.cleanup(plugin_timeout).await;
        results.into_iter().filter_map(|(name, result)| result.err().map(|_| name)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use crate::config::{ActorConfig, ServiceConfig};

    #[tokio::test]
    async fn init_rejects_an_unknown_plugin_type() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut services = BTreeMap::new();
        let mut watchers = BTreeMap::new();
        watchers.insert(
            "w1".to_string(),
            ActorConfig { actor_type: "nonexistent".to_string(), cfg: serde_json::Value::Null },
        );
        services.insert("svc".to_string(), ServiceConfig { watchers, reactors: BTreeMap::new() });
        let config = Config { services, watchers: BTreeMap::new(), reactors: BTreeMap::new() };

        let err = Receptor::init(&config, dir.path().to_path_buf()).await.unwrap_err();
        assert!(matches!(err, InitError::GlobalWatcher { .. }));
    }

    #[tokio::test]
    async fn failed_never_resolves_with_no_running_services() {
        let config = Config::default();
        let mut receptor = Receptor::init(&config, PathBuf::from(".")).await.expect("init with no services");
        receptor.start();

        let raced = tokio::time::timeout(Duration::from_millis(50), receptor.failed()).await;
        assert!(raced.is_err(), "failed() resolved with nothing running");
    }
}
