use alloy::primitives::Address;
use bigdecimal::BigDecimal;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use super::{Bot, EventSource, MetricSink, StartupHook, TransferHandler};
use crate::error::{Result, TokenError};
use crate::monitoring::TransferFilter;

type MetricFeed = mpsc::UnboundedSender<(String, BigDecimal)>;

struct Subscription {
    name: String,
    filter: TransferFilter,
    handler: Arc<dyn TransferHandler>,
}

/// Bot host that drives registered hooks and handlers from an [`EventSource`]
pub struct Runtime {
    signer: Option<Address>,
    source: Arc<dyn EventSource>,
    startup: Vec<(String, Arc<dyn StartupHook>)>,
    subscriptions: Vec<Subscription>,
    sinks: Vec<Arc<dyn MetricSink>>,
}

impl Runtime {
    pub fn new(source: Arc<dyn EventSource>) -> Self {
        Self {
            signer: None,
            source,
            startup: Vec::new(),
            subscriptions: Vec::new(),
            sinks: Vec::new(),
        }
    }

    pub fn with_signer(mut self, signer: Option<Address>) -> Self {
        self.signer = signer;
        self
    }

    pub fn add_sink(&mut self, sink: Arc<dyn MetricSink>) {
        self.sinks.push(sink);
    }

    pub fn startup_hooks(&self) -> impl Iterator<Item = &str> {
        self.startup.iter().map(|(name, _)| name.as_str())
    }

    pub fn subscriptions(&self) -> impl Iterator<Item = (&str, &TransferFilter)> {
        self.subscriptions
            .iter()
            .map(|sub| (sub.name.as_str(), &sub.filter))
    }

    /// Run every startup hook, then process events until a subscription
    /// closes or a sink trips the circuit breaker.
    ///
    /// Each sink is fed from its own task, so a slow sink never holds back
    /// ledger updates.
    pub async fn run(self) -> Result<()> {
        for (name, hook) in &self.startup {
            info!(hook = %name, "running startup hook");
            hook.run().await?;
        }

        let mut tasks = JoinSet::new();

        let mut feeds = Vec::with_capacity(self.sinks.len());
        for sink in self.sinks {
            let (tx, mut rx) = mpsc::unbounded_channel::<(String, BigDecimal)>();
            feeds.push(tx);

            tasks.spawn(async move {
                while let Some((name, value)) = rx.recv().await {
                    match sink.record(&name, &value).await {
                        Ok(()) => {}
                        Err(e @ TokenError::CircuitBreaker(_)) => return Err(e),
                        Err(e) => warn!(metric = %name, error = %e, "metric sink failed"),
                    }
                }
                Ok(())
            });
        }
        let feeds: Arc<[MetricFeed]> = feeds.into();

        for sub in self.subscriptions {
            let mut events = self.source.subscribe(sub.filter).await?;
            let feeds = feeds.clone();

            tasks.spawn(async move {
                while let Some(event) = events.recv().await {
                    let metrics = match sub.handler.handle(event).await {
                        Ok(metrics) => metrics,
                        Err(e) => {
                            error!(handler = %sub.name, error = %e, "transfer handler failed");
                            continue;
                        }
                    };

                    for (name, value) in metrics {
                        for feed in feeds.iter() {
                            if feed.send((name.clone(), value.clone())).is_err() {
                                debug!(metric = %name, "metric sink already stopped");
                            }
                        }
                    }
                }

                // the ledger behind a closed subscription would silently go stale
                Err(TokenError::Runtime(format!("subscription {} closed", sub.name)))
            });
        }
        drop(feeds);

        info!(tasks = tasks.len(), "runtime started");

        while let Some(joined) = tasks.join_next().await {
            let outcome = joined
                .map_err(|e| TokenError::Runtime(format!("runtime task failed: {e}")))
                .and_then(|result| result);
            if let Err(e) = outcome {
                error!(error = %e, "stopping runtime");
                tasks.abort_all();
                return Err(e);
            }
        }

        info!("nothing left to run");
        Ok(())
    }
}

impl Bot for Runtime {
    fn signer(&self) -> Option<Address> {
        self.signer
    }

    fn on_startup(&mut self, name: String, hook: Arc<dyn StartupHook>) {
        debug!(hook = %name, "registered startup hook");
        self.startup.push((name, hook));
    }

    fn on_transfer(&mut self, name: String, filter: TransferFilter, handler: Arc<dyn TransferHandler>) {
        debug!(handler = %name, token = %filter.token, "registered transfer handler");
        self.subscriptions.push(Subscription {
            name,
            filter,
            handler,
        });
    }
}
