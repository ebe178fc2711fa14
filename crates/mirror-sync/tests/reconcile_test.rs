//! Reconciler passes against real in-memory stores.

use async_trait::async_trait;
use chrono::Utc;
use mirror_store::mock::MockStore;
use mirror_store::{StoreActor, StoreClient, StoreError};
use mirror_sync::resource::{BOUND_ANNOTATION, OWNER_ANNOTATION};
use mirror_sync::{
    AdoptionReconciler, Mutation, NamespaceMapper, NamespaceMapping, ObjectKey, ObjectStore,
    Outcome, ReconcileError, Resource, Side, SkipReason, SyncReconciler,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

struct Stores {
    provider: StoreClient<Resource>,
    consumer: StoreClient<Resource>,
    mappings: StoreClient<NamespaceMapping>,
}

impl Stores {
    fn start(provider_seed: Vec<Resource>, consumer_seed: Vec<Resource>) -> Self {
        let (mut provider_actor, provider) = StoreActor::<Resource>::new(16);
        for res in provider_seed {
            provider_actor = provider_actor.with_record(res);
        }
        let (mut consumer_actor, consumer) = StoreActor::<Resource>::new(16);
        for res in consumer_seed {
            consumer_actor = consumer_actor.with_record(res);
        }
        let (mapping_actor, mappings) = StoreActor::<NamespaceMapping>::new(16);
        let mapping_actor = mapping_actor.with_record(NamespaceMapping::new("tenant", "host"));

        tokio::spawn(provider_actor.run());
        tokio::spawn(consumer_actor.run());
        tokio::spawn(mapping_actor.run());
        Self {
            provider,
            consumer,
            mappings,
        }
    }

    fn sync(&self) -> SyncReconciler<StoreClient<Resource>, StoreClient<Resource>, StoreClient<NamespaceMapping>> {
        SyncReconciler::new(
            self.provider.clone(),
            self.consumer.clone(),
            NamespaceMapper::new(self.mappings.clone()),
        )
    }

    fn adopt(
        &self,
    ) -> AdoptionReconciler<StoreClient<Resource>, StoreClient<Resource>, StoreClient<NamespaceMapping>>
    {
        AdoptionReconciler::new(
            self.provider.clone(),
            self.consumer.clone(),
            NamespaceMapper::new(self.mappings.clone()),
        )
    }
}

fn backup(namespace: &str, payload: serde_json::Value) -> Resource {
    Resource::new("Backup", namespace, "b1", payload)
}

fn provider_key() -> ObjectKey {
    ObjectKey::new("tenant", "b1")
}

fn consumer_key() -> ObjectKey {
    ObjectKey::new("host", "b1")
}

#[tokio::test]
async fn untagged_provider_copy_is_tagged_and_mirrored() {
    let stores = Stores::start(vec![backup("tenant", json!({"size": 1}))], vec![]);
    let cancel = CancellationToken::new();

    let outcome = stores.sync().reconcile(&provider_key(), &cancel).await.unwrap();
    assert_eq!(
        outcome,
        Outcome::Synced {
            owner: Some(Side::Provider),
            mutations: vec![Mutation::Tagged(Side::Provider), Mutation::Created(Side::Consumer)],
        }
    );

    let provider = stores.provider.get(provider_key()).await.unwrap();
    let consumer = stores.consumer.get(consumer_key()).await.unwrap();
    assert_eq!(provider.annotation(OWNER_ANNOTATION), Some("Provider"));
    assert_eq!(consumer.annotation(OWNER_ANNOTATION), Some("Provider"));
    assert_eq!(consumer.payload, json!({"size": 1}));
    assert_ne!(consumer.metadata.uid, provider.metadata.uid);
}

#[tokio::test]
async fn untagged_consumer_copy_is_mirrored_to_provider() {
    let stores = Stores::start(vec![], vec![backup("host", json!({"size": 2}))]);

    let outcome = stores
        .sync()
        .reconcile(&provider_key(), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(
        outcome.mutations(),
        &[Mutation::Tagged(Side::Consumer), Mutation::Created(Side::Provider)]
    );

    let provider = stores.provider.get(provider_key()).await.unwrap();
    assert_eq!(provider.annotation(OWNER_ANNOTATION), Some("Consumer"));
    assert_eq!(provider.metadata.namespace, "tenant");
    assert_eq!(provider.payload, json!({"size": 2}));
}

#[tokio::test]
async fn provider_copy_owned_by_missing_consumer_is_deleted() {
    let stores = Stores::start(
        vec![backup("tenant", json!({})).with_owner(Side::Consumer)],
        vec![],
    );

    let outcome = stores
        .sync()
        .reconcile(&provider_key(), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(outcome.mutations(), &[Mutation::Deleted(Side::Provider)]);
    assert!(stores.provider.get(provider_key()).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn consumer_copy_owned_by_missing_provider_is_deleted() {
    let stores = Stores::start(
        vec![],
        vec![backup("host", json!({})).with_owner(Side::Provider)],
    );

    let outcome = stores
        .sync()
        .reconcile(&provider_key(), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(outcome.mutations(), &[Mutation::Deleted(Side::Consumer)]);
    assert!(stores.consumer.get(consumer_key()).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn deleting_an_already_absent_mirror_succeeds() {
    let mut provider = MockStore::<Resource>::new();
    let mut consumer = MockStore::<Resource>::new();
    let mut mappings = MockStore::<NamespaceMapping>::new();
    mappings
        .expect_get("tenant".to_string())
        .return_ok(NamespaceMapping::new("tenant", "host"));
    provider.expect_get(provider_key()).return_not_found();
    consumer
        .expect_get(consumer_key())
        .return_ok(backup("host", json!({})).with_owner(Side::Provider));
    // Someone else removed it between the fetch and the delete.
    consumer.expect_delete(consumer_key()).return_not_found();

    let reconciler = SyncReconciler::new(
        provider.client(),
        consumer.client(),
        NamespaceMapper::new(mappings.client()),
    );
    let outcome = reconciler
        .reconcile(&provider_key(), &CancellationToken::new())
        .await
        .unwrap();

    assert!(outcome.is_noop());
    provider.verify();
    consumer.verify();
    mappings.verify();
}

#[tokio::test]
async fn consumer_owned_change_flows_to_provider() {
    let stores = Stores::start(
        vec![backup("tenant", json!({"size": 1})).with_owner(Side::Consumer)],
        vec![backup("host", json!({"size": 9}))],
    );
    let reconciler = stores.sync();
    let cancel = CancellationToken::new();

    let outcome = reconciler.reconcile(&provider_key(), &cancel).await.unwrap();
    assert_eq!(
        outcome.mutations(),
        &[Mutation::Tagged(Side::Consumer), Mutation::Updated(Side::Provider)]
    );
    let provider = stores.provider.get(provider_key()).await.unwrap();
    assert_eq!(provider.payload, json!({"size": 9}));
    assert_eq!(provider.owner(), Some(Side::Consumer));

    // Payloads now agree: no update issued.
    let again = reconciler.reconcile(&provider_key(), &cancel).await.unwrap();
    assert!(again.is_noop());
}

#[tokio::test]
async fn second_pass_writes_nothing() {
    let stores = Stores::start(vec![backup("tenant", json!({"size": 1}))], vec![]);
    let reconciler = stores.sync();
    let cancel = CancellationToken::new();

    reconciler.reconcile(&provider_key(), &cancel).await.unwrap();
    let provider_before = stores.provider.get(provider_key()).await.unwrap();
    let consumer_before = stores.consumer.get(consumer_key()).await.unwrap();

    let outcome = reconciler.reconcile(&provider_key(), &cancel).await.unwrap();
    assert_eq!(
        outcome,
        Outcome::Synced {
            owner: Some(Side::Provider),
            mutations: vec![],
        }
    );
    assert_eq!(stores.provider.get(provider_key()).await.unwrap(), provider_before);
    assert_eq!(stores.consumer.get(consumer_key()).await.unwrap(), consumer_before);
}

#[tokio::test]
async fn owner_tag_survives_repeated_passes() {
    let stores = Stores::start(vec![backup("tenant", json!({"size": 1}))], vec![]);
    let reconciler = stores.sync();
    let cancel = CancellationToken::new();
    reconciler.reconcile(&provider_key(), &cancel).await.unwrap();

    for size in 2..5 {
        let mut mirror = stores.consumer.get(consumer_key()).await.unwrap();
        mirror.payload = json!({"size": size});
        stores.consumer.update(mirror).await.unwrap();
        let mut source = stores.provider.get(provider_key()).await.unwrap();
        source.payload = json!({"size": size * 10});
        stores.provider.update(source).await.unwrap();

        reconciler.reconcile(&provider_key(), &cancel).await.unwrap();

        let provider = stores.provider.get(provider_key()).await.unwrap();
        let consumer = stores.consumer.get(consumer_key()).await.unwrap();
        assert_eq!(provider.owner(), Some(Side::Provider));
        assert_eq!(consumer.owner(), Some(Side::Provider));
        assert_eq!(consumer.payload, json!({"size": size * 10}));
    }
}

#[tokio::test]
async fn mirror_tagged_for_the_other_side_is_left_alone() {
    let stores = Stores::start(
        vec![backup("tenant", json!({"size": 1})).with_owner(Side::Provider)],
        vec![backup("host", json!({"size": 2})).with_owner(Side::Consumer)],
    );

    let outcome = stores
        .sync()
        .reconcile(&provider_key(), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(outcome, Outcome::Skipped(SkipReason::ConflictingTags));

    let provider = stores.provider.get(provider_key()).await.unwrap();
    let consumer = stores.consumer.get(consumer_key()).await.unwrap();
    assert_eq!(provider.owner(), Some(Side::Provider));
    assert_eq!(consumer.owner(), Some(Side::Consumer));
    assert_eq!(consumer.payload, json!({"size": 2}));
}

#[tokio::test]
async fn provider_tag_decides_when_tags_differ() {
    let stores = Stores::start(
        vec![backup("tenant", json!({"size": 1})).with_owner(Side::Consumer)],
        vec![backup("host", json!({"size": 2})).with_owner(Side::Provider)],
    );
    let reconciler = stores.sync();
    let cancel = CancellationToken::new();

    let outcome = reconciler.reconcile(&provider_key(), &cancel).await.unwrap();
    assert_eq!(
        outcome,
        Outcome::Synced {
            owner: Some(Side::Consumer),
            mutations: vec![Mutation::Updated(Side::Provider)],
        }
    );

    let provider = stores.provider.get(provider_key()).await.unwrap();
    let consumer = stores.consumer.get(consumer_key()).await.unwrap();
    assert_eq!(provider.payload, json!({"size": 2}));
    assert_eq!(provider.owner(), Some(Side::Consumer));
    // The owning copy keeps whatever tag it already had.
    assert_eq!(consumer.owner(), Some(Side::Provider));

    assert!(reconciler.reconcile(&provider_key(), &cancel).await.unwrap().is_noop());
}

#[tokio::test]
async fn untagged_copies_on_both_sides_are_skipped() {
    let stores = Stores::start(
        vec![backup("tenant", json!({}))],
        vec![backup("host", json!({}))],
    );
    let outcome = stores
        .sync()
        .reconcile(&provider_key(), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(outcome, Outcome::Skipped(SkipReason::Indeterminate));
}

#[tokio::test]
async fn terminating_owner_copy_removes_mirror() {
    let stores = Stores::start(vec![backup("tenant", json!({"size": 1}))], vec![]);
    let reconciler = stores.sync();
    let cancel = CancellationToken::new();
    reconciler.reconcile(&provider_key(), &cancel).await.unwrap();

    let mut source = stores.provider.get(provider_key()).await.unwrap();
    source.metadata.deletion_timestamp = Some(Utc::now());
    stores.provider.update(source).await.unwrap();

    let outcome = reconciler.reconcile(&provider_key(), &cancel).await.unwrap();
    assert_eq!(outcome.mutations(), &[Mutation::Deleted(Side::Consumer)]);
    assert!(stores.consumer.get(consumer_key()).await.unwrap_err().is_not_found());

    // Nothing is recreated while the owner copy lingers.
    let outcome = reconciler.reconcile(&provider_key(), &cancel).await.unwrap();
    assert!(outcome.is_noop());
    assert!(stores.consumer.get(consumer_key()).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn terminating_consumer_owned_copy_removes_provider_mirror() {
    let mut owned = backup("host", json!({"size": 1})).with_owner(Side::Consumer);
    owned.metadata.deletion_timestamp = Some(Utc::now());
    let stores = Stores::start(
        vec![backup("tenant", json!({"size": 1})).with_owner(Side::Consumer)],
        vec![owned],
    );

    let outcome = stores
        .sync()
        .reconcile(&provider_key(), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(
        outcome,
        Outcome::Synced {
            owner: Some(Side::Consumer),
            mutations: vec![Mutation::Deleted(Side::Provider)],
        }
    );
    assert!(stores.provider.get(provider_key()).await.unwrap_err().is_not_found());
    assert!(stores.consumer.get(consumer_key()).await.unwrap().is_terminating());
}

#[tokio::test]
async fn sync_keeps_bound_tag_on_mirror() {
    let stores = Stores::start(
        vec![backup("tenant", json!({"size": 2})).with_owner(Side::Provider)],
        vec![backup("host", json!({"size": 1}))
            .with_owner(Side::Provider)
            .with_bound()],
    );
    let reconciler = stores.sync();
    let cancel = CancellationToken::new();

    let outcome = reconciler.reconcile(&provider_key(), &cancel).await.unwrap();
    assert_eq!(outcome.mutations(), &[Mutation::Updated(Side::Consumer)]);

    let mirror = stores.consumer.get(consumer_key()).await.unwrap();
    assert_eq!(mirror.payload, json!({"size": 2}));
    assert_eq!(mirror.annotation(BOUND_ANNOTATION), Some("true"));

    // The source is not bound, yet the bound mirror does not count as drift.
    assert!(reconciler.reconcile(&provider_key(), &cancel).await.unwrap().is_noop());
}

#[tokio::test]
async fn missing_mapping_leaves_stores_untouched() {
    let stores = Stores::start(vec![Resource::new("Backup", "other", "b1", json!({}))], vec![]);

    let err = stores
        .sync()
        .reconcile(&ObjectKey::new("other", "b1"), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(err.is_retryable());
    let provider = stores.provider.get(ObjectKey::new("other", "b1")).await.unwrap();
    assert_eq!(provider.owner(), None);
}

#[tokio::test]
async fn adopted_mirror_is_not_recreated_after_removal() {
    let stores = Stores::start(vec![Resource::new("Restore", "tenant", "b1", json!({"from": "x"}))], vec![]);
    let reconciler = stores.adopt();
    let cancel = CancellationToken::new();

    let outcome = reconciler.reconcile_key(&provider_key(), &cancel).await.unwrap();
    assert_eq!(outcome.mutations(), &[Mutation::Created(Side::Consumer)]);
    let mirror = stores.consumer.get(consumer_key()).await.unwrap();
    assert_eq!(mirror.annotation(BOUND_ANNOTATION), Some("true"));
    assert_eq!(mirror.annotation(OWNER_ANNOTATION), None);

    // The next delivery binds the source.
    let outcome = reconciler.reconcile_key(&provider_key(), &cancel).await.unwrap();
    assert_eq!(outcome.mutations(), &[Mutation::Tagged(Side::Provider)]);
    assert!(stores.provider.get(provider_key()).await.unwrap().is_bound());

    stores.consumer.delete(consumer_key()).await.unwrap();
    let outcome = reconciler.reconcile_key(&provider_key(), &cancel).await.unwrap();
    assert_eq!(outcome, Outcome::Skipped(SkipReason::AlreadyBound));
    assert!(stores.consumer.get(consumer_key()).await.unwrap_err().is_not_found());
    assert!(stores.provider.get(provider_key()).await.unwrap().is_bound());
}

#[tokio::test]
async fn cancelled_pass_makes_no_calls() {
    let provider = MockStore::<Resource>::new();
    let consumer = MockStore::<Resource>::new();
    let mappings = MockStore::<NamespaceMapping>::new();
    let reconciler = AdoptionReconciler::new(
        provider.client(),
        consumer.client(),
        NamespaceMapper::new(mappings.client()),
    );
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = reconciler
        .reconcile_key(&provider_key(), &cancel)
        .await
        .unwrap_err();
    assert!(!err.is_retryable());
    provider.verify();
    consumer.verify();
    mappings.verify();
}

/// Consumer side that fires the pass's cancellation token while answering `get`.
struct CancelOnGet {
    inner: StoreClient<Resource>,
    cancel: CancellationToken,
    writes: Arc<AtomicUsize>,
}

#[async_trait]
impl ObjectStore for CancelOnGet {
    async fn get(&self, key: &ObjectKey) -> Result<Resource, StoreError> {
        self.cancel.cancel();
        self.inner.get(key.clone()).await
    }

    async fn create(&self, resource: Resource) -> Result<Resource, StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.create(resource).await
    }

    async fn update(&self, resource: Resource) -> Result<Resource, StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.update(resource).await
    }

    async fn delete(&self, key: &ObjectKey) -> Result<(), StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.delete(key.clone()).await
    }
}

#[tokio::test]
async fn cancellation_during_fetch_stops_before_next_write() {
    let stores = Stores::start(vec![backup("tenant", json!({"size": 1}))], vec![]);
    let cancel = CancellationToken::new();
    let writes = Arc::new(AtomicUsize::new(0));
    let consumer = CancelOnGet {
        inner: stores.consumer.clone(),
        cancel: cancel.clone(),
        writes: writes.clone(),
    };
    let reconciler = SyncReconciler::new(
        stores.provider.clone(),
        consumer,
        NamespaceMapper::new(stores.mappings.clone()),
    );

    let err = reconciler.reconcile(&provider_key(), &cancel).await.unwrap_err();
    assert!(matches!(err, ReconcileError::Cancelled));

    // Neither the owner tag nor the mirror was written.
    assert_eq!(writes.load(Ordering::SeqCst), 0);
    assert_eq!(stores.provider.get(provider_key()).await.unwrap().owner(), None);
    assert!(stores.consumer.get(consumer_key()).await.unwrap_err().is_not_found());
}
