use std::path::PathBuf;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::info;

use crate::compactor;
use crate::engine::{slugify, Engine, EngineError, Onboarding};
use crate::limits::*;
use crate::model::TenantProfile;
use crate::notify::{self, Notifier, NotifyHub};

/// Per-tenant engines keyed by slug. Each tenant gets its own Engine, WAL
/// file, compactor, and notification dispatcher.
pub struct TenantManager {
    engines: DashMap<String, Arc<Engine>>,
    data_dir: PathBuf,
    compact_threshold: u64,
    notifier: Arc<dyn Notifier>,
}

impl TenantManager {
    pub fn new(data_dir: PathBuf, compact_threshold: u64, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            engines: DashMap::new(),
            data_dir,
            compact_threshold,
            notifier,
        }
    }

    /// Create a tenant. Taken slugs fail with `AlreadyExists`.
    pub async fn onboard(&self, onboarding: Onboarding) -> Result<TenantProfile, EngineError> {
        let onboarding = onboarding.validated()?;
        let engine = self.open(&onboarding.slug, true)?;
        engine.onboard(onboarding).await
    }

    /// The engine for an onboarded tenant, opening its WAL on first use.
    pub async fn get(&self, slug: &str) -> Result<Arc<Engine>, EngineError> {
        let not_found = || EngineError::TenantNotFound(slug.to_string());
        let safe = slugify(slug);
        if safe != slug || safe.len() > MAX_TENANT_SLUG_LEN {
            return Err(not_found());
        }
        let engine = self.open(&safe, false)?;
        engine.profile().await.map_err(|_| not_found())?;
        Ok(engine)
    }

    pub fn loaded(&self) -> usize {
        self.engines.len()
    }

    /// Look up or open the engine for `slug`. Without `create`, a slug with no
    /// WAL file on disk is `TenantNotFound`.
    fn open(&self, slug: &str, create: bool) -> Result<Arc<Engine>, EngineError> {
        if let Some(engine) = self.engines.get(slug) {
            return Ok(engine.value().clone());
        }
        let wal_path = self.data_dir.join(format!("{slug}.wal"));
        if !create && !wal_path.exists() {
            return Err(EngineError::TenantNotFound(slug.to_string()));
        }
        if self.engines.len() >= MAX_TENANTS {
            return Err(EngineError::LimitExceeded("too many tenants"));
        }

        // The entry guard serializes concurrent first opens of the same slug.
        let engine = match self.engines.entry(slug.to_string()) {
            Entry::Occupied(entry) => return Ok(entry.get().clone()),
            Entry::Vacant(entry) => {
                let engine = Arc::new(Engine::new(slug, wal_path, Arc::new(NotifyHub::new()))?);
                entry.insert(engine.clone());
                engine
            }
        };

        compactor::spawn(engine.clone(), self.compact_threshold);
        notify::spawn_dispatcher(engine.clone(), self.notifier.clone());

        metrics::gauge!(crate::observability::TENANTS_ACTIVE).set(self.engines.len() as f64);
        info!(tenant = %slug, wal = %engine.wal_path().display(), "tenant engine opened");
        Ok(engine)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    use crate::engine::NewRoom;
    use crate::notify::LogNotifier;

    fn test_data_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("innkeep_test_tenant").join(name);
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn manager(dir: PathBuf) -> TenantManager {
        TenantManager::new(dir, 1000, Arc::new(LogNotifier))
    }

    fn onboarding(slug: &str) -> Onboarding {
        Onboarding {
            slug: slug.into(),
            default_locale: "en".into(),
            contact_email: None,
            auto_confirm: false,
        }
    }

    fn room(name: &str) -> NewRoom {
        NewRoom {
            name: name.into(),
            description: "Twin beds".into(),
            max_guests: None,
            is_active: true,
        }
    }

    #[tokio::test]
    async fn tenant_isolation() {
        let tm = manager(test_data_dir("isolation"));
        tm.onboard(onboarding("alpha")).await.unwrap();
        tm.onboard(onboarding("bravo")).await.unwrap();

        let alpha = tm.get("alpha").await.unwrap();
        alpha.create_room(room("Attic")).await.unwrap();

        let bravo = tm.get("bravo").await.unwrap();
        assert!(bravo.list_rooms(false).await.unwrap().is_empty());
        assert_eq!(alpha.list_rooms(false).await.unwrap().len(), 1);
        assert_ne!(
            alpha.profile().await.unwrap().property_id,
            bravo.profile().await.unwrap().property_id
        );
    }

    #[tokio::test]
    async fn unknown_tenant_creates_nothing() {
        let dir = test_data_dir("unknown");
        let tm = manager(dir.clone());

        assert!(matches!(tm.get("ghost").await, Err(EngineError::TenantNotFound(_))));
        assert_eq!(fs::read_dir(&dir).unwrap().count(), 0);
        assert_eq!(tm.loaded(), 0);
    }

    #[tokio::test]
    async fn onboarding_creates_wal_and_slugifies() {
        let dir = test_data_dir("slugify");
        let tm = manager(dir.clone());

        let profile = tm.onboard(onboarding("  Casa Azul ")).await.unwrap();
        assert_eq!(profile.slug, "casa-azul");
        assert!(dir.join("casa-azul.wal").exists());
        assert!(tm.get("casa-azul").await.is_ok());
        assert!(tm.get("Casa Azul").await.is_err());
    }

    #[tokio::test]
    async fn slug_taken() {
        let tm = manager(test_data_dir("taken"));
        tm.onboard(onboarding("harbor")).await.unwrap();
        assert!(matches!(
            tm.onboard(onboarding("Harbor")).await,
            Err(EngineError::AlreadyExists(_))
        ));
    }

    #[tokio::test]
    async fn path_traversal_is_neutralized() {
        let dir = test_data_dir("sanitize");
        let tm = manager(dir.clone());

        tm.onboard(onboarding("../evil")).await.unwrap();
        assert!(dir.join("evil.wal").exists());
        assert!(tm.get("../evil").await.is_err());
        assert!(matches!(
            tm.onboard(onboarding("../..")).await,
            Err(EngineError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn same_engine_returned() {
        let tm = manager(test_data_dir("same_engine"));
        tm.onboard(onboarding("lodge")).await.unwrap();
        let a = tm.get("lodge").await.unwrap();
        let b = tm.get("lodge").await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[tokio::test]
    async fn tenant_reopens_from_disk() {
        let dir = test_data_dir("reopen");
        {
            let tm = manager(dir.clone());
            tm.onboard(onboarding("chalet")).await.unwrap();
            tm.get("chalet").await.unwrap().create_room(room("Loft")).await.unwrap();
        }

        let tm = manager(dir);
        let engine = tm.get("chalet").await.unwrap();
        let rooms = engine.list_rooms(false).await.unwrap();
        assert_eq!(rooms.len(), 1);
        assert_eq!(rooms[0].name, "Loft");
    }
}
