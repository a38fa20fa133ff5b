mod availability;
mod conflict;
mod error;
mod input;
mod lifecycle;
mod mutations;
mod queries;
mod store;

pub use availability::{blocked_days, fully_booked_days, is_free, BlockedDays};
pub use error::{EngineError, Entity, Holder};
pub use input::{slugify, BookingRequest, NewRoom, Onboarding, RoomPatch};
pub use lifecycle::Transition;
pub use store::Ledger;

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::{RwLock, RwLockReadGuard};
use tracing::info;

use crate::model::*;
use crate::notify::{NotifyHub, StatusChange};
use crate::wal::{Wal, WalHandle};

/// One tenant's ledger plus the WAL writer that makes it durable.
///
/// The `RwLock` is the transaction boundary: every mutation holds the write
/// guard across re-read, check, WAL append, and apply, so mutations within a
/// tenant are serialized. Queries take the read guard.
pub struct Engine {
    slug: String,
    wal_path: PathBuf,
    ledger: RwLock<Ledger>,
    wal: WalHandle,
    pub notify: Arc<NotifyHub>,
}

impl Engine {
    /// Replay `wal_path` (creating it if absent) and start its writer task.
    pub fn new(
        slug: impl Into<String>,
        wal_path: PathBuf,
        notify: Arc<NotifyHub>,
    ) -> io::Result<Self> {
        let slug = slug.into();
        let replay = Wal::replay(&wal_path)?;
        let wal = Wal::open(&wal_path, replay.valid_len)?;

        let mut ledger = Ledger::new(slug.clone());
        for event in &replay.events {
            ledger.apply(event);
        }
        if !replay.events.is_empty() {
            info!(tenant = %slug, events = replay.events.len(), "replayed WAL");
        }

        Ok(Self {
            slug,
            wal_path,
            ledger: RwLock::new(ledger),
            wal: WalHandle::spawn(wal),
            notify,
        })
    }

    pub fn slug(&self) -> &str {
        &self.slug
    }

    pub fn wal_path(&self) -> &Path {
        &self.wal_path
    }

    /// Shared view of the ledger for read paths.
    pub async fn read(&self) -> RwLockReadGuard<'_, Ledger> {
        self.ledger.read().await
    }

    /// WAL append, then apply. A failed append leaves `ledger` untouched.
    pub(super) async fn persist_and_apply(
        &self,
        ledger: &mut Ledger,
        event: Event,
    ) -> Result<(), EngineError> {
        self.wal.append(event.clone()).await?;
        ledger.apply(&event);
        Ok(())
    }

    /// Broadcast a committed reservation transition. Never fails the caller.
    pub(super) fn announce(&self, change: StatusChange) {
        self.notify.send(change);
    }
}
