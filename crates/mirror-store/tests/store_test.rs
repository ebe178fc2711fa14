use mirror_store::{EventKind, StoreActor, StoreEntity, StoreError};

// --- Test Entity ---

#[derive(Clone, Debug, PartialEq)]
struct Record {
    name: String,
    uid: Option<String>,
    value: u32,
    version: Option<String>,
}

impl StoreEntity for Record {
    type Key = String;

    fn key(&self) -> String {
        self.name.clone()
    }

    fn resource_version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    fn set_resource_version(&mut self, version: String) {
        self.version = Some(version);
    }

    fn on_create(&mut self, seq: u64) {
        self.uid = Some(format!("uid-{seq}"));
    }

    fn on_update(&mut self, previous: &Self) {
        self.uid = previous.uid.clone();
    }
}

fn record(name: &str, value: u32) -> Record {
    Record {
        name: name.to_string(),
        uid: None,
        value,
        version: None,
    }
}

// --- Tests ---

#[tokio::test]
async fn test_store_full_lifecycle() {
    let (actor, client) = StoreActor::<Record>::new(10);
    let handle = tokio::spawn(actor.run());

    // 1. Create stamps identity and version
    let created = client.create(record("a", 1)).await.unwrap();
    assert_eq!(created.uid.as_deref(), Some("uid-1"));
    assert_eq!(created.version.as_deref(), Some("1"));

    // 2. Get
    let fetched = client.get("a".to_string()).await.unwrap();
    assert_eq!(fetched, created);

    // 3. Update with the current version bumps it and keeps identity
    let mut next = fetched.clone();
    next.value = 2;
    next.uid = None;
    let updated = client.update(next).await.unwrap();
    assert_eq!(updated.value, 2);
    assert_eq!(updated.uid.as_deref(), Some("uid-1"));
    assert_eq!(updated.version.as_deref(), Some("2"));

    // 4. List
    let all = client.list().await.unwrap();
    assert_eq!(all.len(), 1);

    // 5. Delete
    client.delete("a".to_string()).await.unwrap();
    let gone = client.get("a".to_string()).await;
    assert!(gone.unwrap_err().is_not_found());

    drop(client);
    handle.await.unwrap();
}

#[tokio::test]
async fn test_store_rejects_invalid_writes() {
    let (actor, client) = StoreActor::<Record>::new(10);
    tokio::spawn(actor.run());

    client.create(record("a", 1)).await.unwrap();

    let duplicate = client.create(record("a", 1)).await;
    assert!(matches!(duplicate, Err(StoreError::AlreadyExists(_))));

    let missing = client.update(record("b", 1)).await;
    assert!(missing.unwrap_err().is_not_found());

    let mut stale = record("a", 5);
    stale.version = Some("99".to_string());
    let conflict = client.update(stale).await;
    assert!(matches!(conflict, Err(StoreError::Conflict { .. })));

    let absent = client.delete("b".to_string()).await;
    assert!(absent.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_update_without_version_is_unconditional() {
    let (actor, client) = StoreActor::<Record>::new(10);
    tokio::spawn(actor.run());

    client.create(record("a", 1)).await.unwrap();
    let updated = client.update(record("a", 1)).await.unwrap();
    // Identical content still produces a new version.
    assert_eq!(updated.version.as_deref(), Some("2"));
}

#[tokio::test]
async fn test_mutations_publish_events() {
    let (actor, client) = StoreActor::<Record>::new(10);
    let mut events = client.subscribe();
    tokio::spawn(actor.run());

    let created = client.create(record("a", 1)).await.unwrap();
    client.update(created).await.unwrap();
    client.delete("a".to_string()).await.unwrap();

    let kinds: Vec<EventKind> = vec![
        events.recv().await.unwrap().kind,
        events.recv().await.unwrap().kind,
        events.recv().await.unwrap().kind,
    ];
    assert_eq!(
        kinds,
        vec![EventKind::Created, EventKind::Updated, EventKind::Deleted]
    );
}

#[tokio::test]
async fn test_seeded_records_are_visible() {
    let (actor, client) = StoreActor::<Record>::new(10);
    let actor = actor.with_record(record("seed", 7));
    tokio::spawn(actor.run());

    let seeded = client.get("seed".to_string()).await.unwrap();
    assert_eq!(seeded.value, 7);
    assert!(seeded.uid.is_some());
    assert!(seeded.version.is_some());
}
