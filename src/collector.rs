//! Gateway collection orchestration.
//!
//! One background loader task per descriptor kind retries at a fixed interval
//! until its tree loads, then swaps the snapshot into a shared slot. The
//! loader is the slot's only writer; scrapes read-lock a slot just long
//! enough to clone the current `Arc` out, so a cycle always works against a
//! point-in-time snapshot even if the loader swaps mid-cycle.
//!
//! Within one cycle, action results are cached per (serviceType, actionName)
//! so metrics sharing an invocation cause exactly one SOAP call. The cache
//! dies with the cycle; nothing is reused across scrapes.

use crate::config::GatewayConfig;
use crate::metrics::{ExporterMetrics, GatewayMetric};
use crate::upnp::{self, ActionResult, Root, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

const LOAD_RETRY_INTERVAL: Duration = Duration::from_secs(60);

pub struct GatewayCollector {
    config: GatewayConfig,
    metrics: Vec<GatewayMetric>,
    counters: ExporterMetrics,
    igd_root: RwLock<Option<Arc<Root>>>,
    tr064_root: RwLock<Option<Arc<Root>>>,
    /// Serializes scrape cycles so reset and repopulation of the metric
    /// vectors stay atomic per cycle. The loaders never take this.
    scrape: Mutex<()>,
}

impl GatewayCollector {
    pub fn new(
        config: GatewayConfig,
        metrics: Vec<GatewayMetric>,
        counters: ExporterMetrics,
    ) -> Self {
        Self {
            config,
            metrics,
            counters,
            igd_root: RwLock::new(None),
            tr064_root: RwLock::new(None),
            scrape: Mutex::new(()),
        }
    }

    /// Spawn the background loader for each descriptor kind. The TR-064 tree
    /// needs credentials; without a username it is skipped entirely.
    pub fn spawn_loaders(self: &Arc<Self>) {
        let collector = self.clone();
        tokio::spawn(async move {
            collector
                .load_with_retry(upnp::IGD_DESCRIPTOR, &collector.igd_root)
                .await;
        });

        if self.config.username.is_empty() {
            info!("no username configured: not loading TR-064 services");
        } else {
            let collector = self.clone();
            tokio::spawn(async move {
                collector
                    .load_with_retry(upnp::TR064_DESCRIPTOR, &collector.tr064_root)
                    .await;
            });
        }
    }

    /// Retry forever at a fixed interval until the descriptor loads, then
    /// swap the snapshot in. The write lock is held only for the swap.
    async fn load_with_retry(&self, descriptor: &str, slot: &RwLock<Option<Arc<Root>>>) {
        loop {
            match Root::load(&self.config, descriptor).await {
                Ok(root) => {
                    info!("{} services loaded from {}", root.services.len(), descriptor);
                    *slot.write().await = Some(Arc::new(root));
                    return;
                }
                Err(e) => {
                    self.counters.collect_errors.inc();
                    warn!(
                        "cannot load {}: {}; retrying in {}s",
                        descriptor,
                        e,
                        LOAD_RETRY_INTERVAL.as_secs()
                    );
                    tokio::time::sleep(LOAD_RETRY_INTERVAL).await;
                }
            }
        }
    }

    /// True once at least one descriptor tree has loaded.
    pub async fn ready(&self) -> bool {
        self.igd_root.read().await.is_some() || self.tr064_root.read().await.is_some()
    }

    /// Copy the current snapshots out of their slots. TR-064 first so its
    /// services shadow same-typed IGD ones, preserving the merge order of a
    /// combined tree where the later load wins.
    async fn snapshots(&self) -> Vec<Arc<Root>> {
        let mut roots = Vec::with_capacity(2);
        if let Some(root) = self.tr064_root.read().await.as_ref() {
            roots.push(root.clone());
        }
        if let Some(root) = self.igd_root.read().await.as_ref() {
            roots.push(root.clone());
        }
        roots
    }

    /// Run one collection cycle: walk the declared metrics in order, invoke
    /// each referenced action at most once, and update the metric vectors.
    /// Lookup misses and call failures are counted and skipped; nothing
    /// aborts the rest of the cycle. Before the first successful load this
    /// completes without error and emits nothing.
    pub async fn collect(&self) {
        let _cycle = self.scrape.lock().await;

        for metric in &self.metrics {
            metric.reset();
        }

        let roots = self.snapshots().await;
        if roots.is_empty() {
            return;
        }

        let mut cache: HashMap<(String, String), Arc<ActionResult>> = HashMap::new();

        for metric in &self.metrics {
            let key = (metric.decl.service.clone(), metric.decl.action.clone());
            let result = match cache.get(&key) {
                Some(result) => result.clone(),
                None => {
                    let Some((root, service)) = roots
                        .iter()
                        .find_map(|r| r.services.get(&metric.decl.service).map(|s| (r, s.clone())))
                    else {
                        self.counters
                            .service_not_found
                            .with_label_values(&[&metric.decl.service])
                            .inc();
                        continue;
                    };

                    let Some(action) = service.actions.get(&metric.decl.action).cloned() else {
                        self.counters
                            .action_not_found
                            .with_label_values(&[&metric.decl.action])
                            .inc();
                        continue;
                    };

                    self.counters.num_calls.inc();
                    match root.call(&service, &action).await {
                        Ok(result) => {
                            let result = Arc::new(result);
                            cache.insert(key, result.clone());
                            result
                        }
                        Err(e) => {
                            warn!("cannot collect {}: {}", metric.decl.name, e);
                            self.counters.collect_errors.inc();
                            continue;
                        }
                    }
                }
            };

            let Some(value) = result.get(&metric.decl.result) else {
                self.counters
                    .result_not_found
                    .with_label_values(&[&metric.decl.result])
                    .inc();
                continue;
            };

            self.emit(metric, value);
        }
    }

    fn emit(&self, metric: &GatewayMetric, value: &Value) {
        if metric.decl.label_name.is_some() {
            let label = value.to_string();
            metric.set(&[self.config.host.as_str(), label.as_str()], 1.0);
            return;
        }

        match to_float(value, metric.decl.ok_value.as_deref()) {
            Some(v) if v < 0.0 && metric.is_counter() => {
                warn!(
                    "cannot apply negative value {} to counter {}",
                    v, metric.decl.name
                );
                self.counters.collect_errors.inc();
            }
            Some(v) => metric.set(&[self.config.host.as_str()], v),
            None => {
                warn!(
                    "cannot convert {} result {:?} to a number",
                    metric.decl.name, value
                );
                self.counters.collect_errors.inc();
            }
        }
    }
}

/// Numeric view of a decoded value. Strings compare against the metric's
/// configured ok value; a string without a configured ok value has no numeric
/// form, and neither does a timestamp.
pub fn to_float(value: &Value, ok_value: Option<&str>) -> Option<f64> {
    match value {
        Value::Unsigned(v) => Some(*v as f64),
        Value::Signed(v) => Some(*v as f64),
        Value::Bool(true) => Some(1.0),
        Value::Bool(false) => Some(0.0),
        Value::Text(s) => ok_value.map(|ok| if s == ok { 1.0 } else { 0.0 }),
        Value::DateTime(_) => None,
    }
}
