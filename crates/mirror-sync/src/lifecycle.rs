//! # System Lifecycle
//!
//! [`MirrorSystem`] wires the runtime together:
//!
//! 1. Spawns the provider, consumer and mapping [`StoreActor`]s.
//! 2. Builds the reconciler selected by [`Mode`] and a [`WorkQueue`] around it.
//! 3. Spawns forwarders that turn store change events into queued keys.
//!
//! Queue keys are always provider-side keys. Consumer events are translated back through
//! [`NamespaceMapper::reverse`]; a mapping that becomes ready re-queues every provider object in
//! its namespace.
//!
//! ## Shutdown
//!
//! [`MirrorSystem::shutdown`] cancels the shared token, which stops the queue and the
//! forwarders. Dropping the last clients then closes the store channels and every actor task
//! ends on its own.

use crate::adopt::AdoptionReconciler;
use crate::config::{MirrorConfig, Mode};
use crate::mapping::{NamespaceMapper, NamespaceMapping};
use crate::queue::{PassReport, QueueClosed, Reconcile, RetryPolicy, WorkQueue};
use crate::resource::{ObjectKey, Resource};
use crate::sync::SyncReconciler;
use mirror_store::{EventKind, StoreActor, StoreClient, StoreEvent};
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub struct MirrorSystem {
    pub provider: StoreClient<Resource>,
    pub consumer: StoreClient<Resource>,
    pub mappings: StoreClient<NamespaceMapping>,
    queue: WorkQueue,
    cancel: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

impl MirrorSystem {
    pub fn start(config: &MirrorConfig) -> Self {
        let (provider_actor, provider) = StoreActor::<Resource>::new(config.store_buffer);
        let (consumer_actor, consumer) = StoreActor::<Resource>::new(config.store_buffer);
        let (mapping_actor, mappings) = StoreActor::<NamespaceMapping>::new(config.store_buffer);

        // Subscribe before anything can be written.
        let provider_events = provider.subscribe();
        let consumer_events = consumer.subscribe();
        let mapping_events = mappings.subscribe();

        let mut handles = vec![
            tokio::spawn(provider_actor.run()),
            tokio::spawn(consumer_actor.run()),
            tokio::spawn(mapping_actor.run()),
        ];

        let mapper = NamespaceMapper::new(mappings.clone());
        let reconciler: Arc<dyn Reconcile> = match config.mode {
            Mode::Sync => Arc::new(SyncReconciler::new(
                provider.clone(),
                consumer.clone(),
                mapper.clone(),
            )),
            Mode::Adopt => Arc::new(AdoptionReconciler::new(
                provider.clone(),
                consumer.clone(),
                mapper.clone(),
            )),
        };

        let cancel = CancellationToken::new();
        let (queue, queue_handle) = WorkQueue::start(
            reconciler,
            config.workers,
            RetryPolicy::from(&config.retry),
            cancel.clone(),
        );
        handles.push(queue_handle);

        let forwarder = Forwarder {
            queue: queue.clone(),
            provider: provider.clone(),
            mapper,
            cancel: cancel.clone(),
        };
        handles.push(tokio::spawn(forwarder.clone().provider_events(provider_events)));
        handles.push(tokio::spawn(forwarder.clone().consumer_events(consumer_events)));
        handles.push(tokio::spawn(forwarder.mapping_events(mapping_events)));

        info!(mode = ?config.mode, workers = config.workers, "Mirror system started");
        Self {
            provider,
            consumer,
            mappings,
            queue,
            cancel,
            handles,
        }
    }

    /// Queues a pass for the resource under its provider-side `key`.
    pub fn enqueue(&self, key: ObjectKey) -> Result<(), QueueClosed> {
        self.queue.enqueue(key)
    }

    /// Reports for passes finished after this call.
    pub fn reports(&self) -> broadcast::Receiver<PassReport> {
        self.queue.subscribe()
    }

    pub async fn shutdown(self) -> Result<(), String> {
        info!("Shutting down mirror system");
        self.cancel.cancel();

        drop(self.provider);
        drop(self.consumer);
        drop(self.mappings);
        drop(self.queue);

        for handle in self.handles {
            handle.await.map_err(|e| e.to_string())?;
        }
        info!("Mirror system stopped");
        Ok(())
    }
}

/// Turns store change events into queued provider-side keys.
#[derive(Clone)]
struct Forwarder {
    queue: WorkQueue,
    provider: StoreClient<Resource>,
    mapper: NamespaceMapper<StoreClient<NamespaceMapping>>,
    cancel: CancellationToken,
}

impl Forwarder {
    async fn provider_events(self, mut events: broadcast::Receiver<StoreEvent<ObjectKey>>) {
        while let Some(event) = self.next(&mut events, "provider").await {
            match event {
                Some(event) => self.enqueue(event.key),
                None => self.requeue_namespace(None).await,
            }
        }
    }

    async fn consumer_events(self, mut events: broadcast::Receiver<StoreEvent<ObjectKey>>) {
        while let Some(event) = self.next(&mut events, "consumer").await {
            let Some(event) = event else {
                self.requeue_namespace(None).await;
                continue;
            };
            match self.mapper.reverse(&event.key.namespace).await {
                Ok(Some(namespace)) => self.enqueue(event.key.in_namespace(namespace)),
                Ok(None) => {
                    debug!(key = %event.key, "No mapping points at consumer namespace");
                }
                Err(e) => warn!(key = %event.key, error = %e, "Reverse mapping failed"),
            }
        }
    }

    async fn mapping_events(self, mut events: broadcast::Receiver<StoreEvent<String>>) {
        while let Some(event) = self.next(&mut events, "mapping").await {
            match event {
                Some(StoreEvent {
                    kind: EventKind::Deleted,
                    ..
                }) => {}
                Some(event) => self.requeue_namespace(Some(event.key.as_str())).await,
                None => self.requeue_namespace(None).await,
            }
        }
    }

    /// Next event, `Some(None)` after lost events, `None` once stopped.
    async fn next<K: Clone>(
        &self,
        events: &mut broadcast::Receiver<StoreEvent<K>>,
        source: &'static str,
    ) -> Option<Option<StoreEvent<K>>> {
        tokio::select! {
            _ = self.cancel.cancelled() => None,
            received = events.recv() => match received {
                Ok(event) => Some(Some(event)),
                Err(RecvError::Lagged(missed)) => {
                    warn!(source, missed, "Event stream lagged; resyncing");
                    Some(None)
                }
                Err(RecvError::Closed) => None,
            },
        }
    }

    fn enqueue(&self, key: ObjectKey) {
        if self.queue.enqueue(key).is_err() {
            debug!("Queue stopped; dropping key");
        }
    }

    /// Queues every provider object, or only those in `namespace`.
    async fn requeue_namespace(&self, namespace: Option<&str>) {
        match self.provider.list().await {
            Ok(resources) => resources
                .iter()
                .map(Resource::key)
                .filter(|key| namespace.map_or(true, |ns| key.namespace == ns))
                .for_each(|key| self.enqueue(key)),
            Err(e) => warn!(error = %e, "Listing provider objects failed"),
        }
    }
}
