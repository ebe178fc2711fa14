//! Demo: mirrors one provider object into its mapped consumer namespace.
//!
//! ```bash
//! RUST_LOG=info cargo run -p mirror-sync -- mirror.toml
//! ```

use mirror_store::tracing::setup_tracing;
use mirror_sync::resource::OWNER_ANNOTATION;
use mirror_sync::{MirrorConfig, MirrorSystem, NamespaceMapping, ObjectKey, Resource};
use serde_json::json;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, Instrument};

const MIRROR_WAIT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<(), String> {
    setup_tracing();

    let config = match std::env::args().nth(1).map(PathBuf::from) {
        Some(path) => MirrorConfig::load(&path).map_err(|e| e.to_string())?,
        None => MirrorConfig::default(),
    };
    info!(?config, "Starting mirror");

    let system = MirrorSystem::start(&config);

    let span = tracing::info_span!("seed");
    async {
        system
            .mappings
            .create(NamespaceMapping::new("tenant-a", "host-a"))
            .await
            .map_err(|e| e.to_string())?;
        let resource = Resource::new(
            "Backup",
            "tenant-a",
            "nightly",
            json!({"schedule": "0 2 * * *", "retention": "7d"}),
        );
        system
            .provider
            .create(resource)
            .await
            .map_err(|e| e.to_string())?;
        info!("Seeded mapping and provider object");
        Ok::<_, String>(())
    }
    .instrument(span)
    .await?;

    let mirror_key = ObjectKey::new("host-a", "nightly");
    let mirror = tokio::time::timeout(MIRROR_WAIT, async {
        loop {
            if let Ok(mirror) = system.consumer.get(mirror_key.clone()).await {
                return mirror;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .map_err(|_| format!("mirror {mirror_key} did not appear"))?;

    info!(
        key = %mirror.key(),
        owner = mirror.annotation(OWNER_ANNOTATION).unwrap_or("-"),
        payload = %mirror.payload,
        "Mirror created"
    );

    system.shutdown().await?;
    info!("Demo completed");
    Ok(())
}
