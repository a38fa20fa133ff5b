use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::engine::Engine;

const CHECK_INTERVAL: Duration = Duration::from_secs(30);

pub fn spawn(engine: Arc<Engine>, threshold: u64) -> JoinHandle<()> {
    tokio::spawn(run_compactor(engine, threshold, CHECK_INTERVAL))
}

/// Periodically rewrite the tenant's WAL once `threshold` events have been
/// appended since the last compaction, or as soon as a failed commit has
/// blocked further appends.
pub async fn run_compactor(engine: Arc<Engine>, threshold: u64, every: Duration) {
    let mut interval = tokio::time::interval(every);
    loop {
        interval.tick().await;
        if let Err(e) = compact_if_due(&engine, threshold).await {
            warn!(tenant = %engine.slug(), "WAL compaction failed: {e}");
        }
    }
}

/// Compact now if enough appends have accumulated or the WAL is poisoned.
/// Returns whether it ran.
pub async fn compact_if_due(
    engine: &Engine,
    threshold: u64,
) -> Result<bool, crate::engine::EngineError> {
    let appends = engine.wal_appends_since_compact().await;
    if appends < threshold && !engine.wal_poisoned().await {
        return Ok(false);
    }
    engine.compact_wal().await?;
    metrics::counter!(crate::observability::WAL_COMPACTIONS_TOTAL).increment(1);
    info!(tenant = %engine.slug(), appends, "compacted WAL");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{NewRoom, Onboarding, RoomPatch};
    use crate::notify::NotifyHub;
    use std::path::PathBuf;

    fn test_wal_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("innkeep_test_compactor");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        let _ = std::fs::remove_file(&path);
        path
    }

    async fn churned_engine(path: PathBuf) -> Engine {
        let engine = Engine::new("compact-me", path, Arc::new(NotifyHub::new())).unwrap();
        engine
            .onboard(Onboarding {
                slug: "compact-me".into(),
                default_locale: "de".into(),
                contact_email: None,
                auto_confirm: true,
            })
            .await
            .unwrap();
        let room = engine
            .create_room(NewRoom {
                name: "Suite".into(),
                description: "Corner".into(),
                max_guests: Some(4),
                is_active: true,
            })
            .await
            .unwrap();
        for i in 0..20 {
            engine
                .update_room(
                    room.id,
                    RoomPatch {
                        description: Some(format!("Corner, revision {i}")),
                        ..RoomPatch::default()
                    },
                )
                .await
                .unwrap();
        }
        engine
    }

    #[tokio::test]
    async fn compacts_only_past_threshold() {
        let path = test_wal_path("threshold.wal");
        let engine = churned_engine(path.clone()).await;
        assert_eq!(engine.wal_appends_since_compact().await, 22);
        assert!(!engine.wal_poisoned().await);

        assert!(!compact_if_due(&engine, 100).await.unwrap());
        let before = std::fs::metadata(&path).unwrap().len();

        assert!(compact_if_due(&engine, 10).await.unwrap());
        let after = std::fs::metadata(&path).unwrap().len();
        assert!(after < before, "compacted WAL should be smaller: {after} < {before}");
        assert_eq!(engine.wal_appends_since_compact().await, 0);
    }

    #[tokio::test]
    async fn compacted_wal_replays_to_same_state() {
        let path = test_wal_path("replay_after_compact.wal");
        let engine = churned_engine(path.clone()).await;
        engine.compact_wal().await.unwrap();
        let rooms = engine.list_rooms(false).await.unwrap();
        let profile = engine.profile().await.unwrap();
        drop(engine);

        let reopened = Engine::new("compact-me", path, Arc::new(NotifyHub::new())).unwrap();
        assert_eq!(reopened.list_rooms(false).await.unwrap(), rooms);
        assert_eq!(reopened.profile().await.unwrap(), profile);
        assert_eq!(rooms[0].description, "Corner, revision 19");
    }
}
