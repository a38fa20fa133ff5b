use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use ulid::Ulid;

use crate::engine::Engine;
use crate::model::*;

const CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Requested,
    Confirmed,
    Cancelled,
}

/// A committed reservation transition, as seen right after the commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    pub kind: ChangeKind,
    pub reservation: Reservation,
}

impl StatusChange {
    /// The change that would have left `reservation` in its current status.
    pub fn latest(reservation: Reservation) -> Self {
        let kind = match reservation.status {
            ReservationStatus::Pending => ChangeKind::Requested,
            ReservationStatus::Confirmed => ChangeKind::Confirmed,
            ReservationStatus::Cancelled => ChangeKind::Cancelled,
        };
        Self { kind, reservation }
    }

    /// `(guest, host)` templates for this change. An auto-confirmed request
    /// goes out as a confirmation.
    pub fn templates(&self) -> (NoticeTemplate, NoticeTemplate) {
        match (self.kind, self.reservation.status) {
            (ChangeKind::Requested, ReservationStatus::Pending) => (
                NoticeTemplate::BookingRequestGuest,
                NoticeTemplate::BookingRequestHost,
            ),
            (ChangeKind::Cancelled, _) | (_, ReservationStatus::Cancelled) => (
                NoticeTemplate::BookingCancelledGuest,
                NoticeTemplate::BookingCancelledHost,
            ),
            _ => (
                NoticeTemplate::BookingConfirmedGuest,
                NoticeTemplate::BookingConfirmedHost,
            ),
        }
    }
}

/// Broadcast hub for one tenant's reservation transitions.
pub struct NotifyHub {
    sender: broadcast::Sender<StatusChange>,
}

impl Default for NotifyHub {
    fn default() -> Self {
        Self::new()
    }
}

impl NotifyHub {
    pub fn new() -> Self {
        Self::with_capacity(CHANNEL_CAPACITY)
    }

    /// A hub whose subscribers lag once more than `capacity` changes are unread.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            sender: broadcast::channel(capacity).0,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StatusChange> {
        self.sender.subscribe()
    }

    /// No-op if nobody is listening.
    pub fn send(&self, change: StatusChange) {
        let _ = self.sender.send(change);
    }
}

/// One message to one recipient.
#[derive(Debug, Clone)]
pub struct Notice {
    pub template: NoticeTemplate,
    pub recipient: String,
    pub locale: String,
    pub reservation: Reservation,
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// The channel is switched off for this notice; recorded as skipped.
    #[error("delivery disabled")]
    Disabled,
    #[error("delivery failed: {0}")]
    Delivery(String),
}

/// Outbound delivery channel (email, SMS, webhook). Rendering is the
/// implementation's concern.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notice: &Notice) -> Result<(), NotifyError>;
}

/// Writes each notice to the log instead of delivering it.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, notice: &Notice) -> Result<(), NotifyError> {
        info!(
            template = ?notice.template,
            recipient = %notice.recipient,
            locale = %notice.locale,
            reservation = %notice.reservation.id,
            "notification"
        );
        Ok(())
    }
}

/// Subscribe to `engine`'s hub and deliver every transition through `notifier`.
///
/// The subscription is taken before the task starts, so transitions committed
/// after this call returns are never missed.
pub fn spawn_dispatcher(engine: Arc<Engine>, notifier: Arc<dyn Notifier>) -> JoinHandle<()> {
    let since = now_ms();
    let rx = engine.notify.subscribe();
    tokio::spawn(run_dispatcher(engine, notifier, rx, since))
}

/// Deliver changes from `rx` until the hub closes.
///
/// `since` is the commit time from which every transition must be covered.
/// When the receiver lags, the dropped changes are rebuilt from the ledger:
/// each reservation updated since the last delivered change is notified for
/// its current status. An intermediate status skipped entirely during the lag
/// gets no notice of its own.
async fn run_dispatcher(
    engine: Arc<Engine>,
    notifier: Arc<dyn Notifier>,
    mut rx: broadcast::Receiver<StatusChange>,
    mut since: Ms,
) {
    loop {
        match rx.recv().await {
            Ok(change) => {
                since = since.max(change.reservation.updated_at);
                deliver(&engine, notifier.as_ref(), &change).await;
            }
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                metrics::counter!(crate::observability::NOTIFICATIONS_LAGGED_TOTAL).increment(missed);
                warn!(tenant = %engine.slug(), missed, "notification dispatcher lagged, catching up from ledger");
                catch_up(&engine, notifier.as_ref(), since).await;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

async fn catch_up(engine: &Engine, notifier: &dyn Notifier, since: Ms) {
    let reservations = match engine.list_reservations(None).await {
        Ok(reservations) => reservations,
        Err(e) => {
            warn!(tenant = %engine.slug(), "cannot catch up on notifications: {e}");
            return;
        }
    };
    for reservation in reservations.into_iter().filter(|r| r.updated_at >= since) {
        deliver(engine, notifier, &StatusChange::latest(reservation)).await;
    }
}

/// Send the guest and host notices for `change` and log each attempt.
///
/// A notice already delivered for the same reservation, template, and
/// recipient is not sent again. Failures are recorded, never raised.
pub(crate) async fn deliver(engine: &Engine, notifier: &dyn Notifier, change: &StatusChange) {
    let profile = match engine.profile().await {
        Ok(profile) => profile,
        Err(e) => {
            warn!(tenant = %engine.slug(), "cannot notify: {e}");
            return;
        }
    };
    let (guest_template, host_template) = change.templates();

    let mut notices = vec![(guest_template, change.reservation.guest.email.clone())];
    match &profile.contact_email {
        Some(host) => notices.push((host_template, host.clone())),
        None => debug!(tenant = %engine.slug(), "no host contact email, host notice not sent"),
    }

    let locale = profile.default_locale.as_str();
    join_all(
        notices
            .into_iter()
            .map(|(template, recipient)| deliver_one(engine, notifier, change, template, recipient, locale)),
    )
    .await;
}

async fn deliver_one(
    engine: &Engine,
    notifier: &dyn Notifier,
    change: &StatusChange,
    template: NoticeTemplate,
    recipient: String,
    locale: &str,
) {
    let reservation_id = change.reservation.id;
    if engine.notification_sent(reservation_id, template, &recipient).await {
        debug!(reservation = %reservation_id, ?template, "already delivered, skipping");
        return;
    }

    let notice = Notice {
        template,
        recipient,
        locale: locale.to_string(),
        reservation: change.reservation.clone(),
    };
    let (status, error) = match notifier.send(&notice).await {
        Ok(()) => (DeliveryStatus::Sent, None),
        Err(NotifyError::Disabled) => (DeliveryStatus::Skipped, None),
        Err(e) => {
            warn!(reservation = %reservation_id, ?template, "notification failed: {e}");
            (DeliveryStatus::Failed, Some(e.to_string()))
        }
    };
    metrics::counter!(crate::observability::NOTIFICATIONS_TOTAL, "status" => status.as_str())
        .increment(1);

    let record = NotificationRecord {
        id: Ulid::new(),
        reservation_id,
        template,
        recipient: notice.recipient,
        status,
        error,
        created_at: now_ms(),
    };
    if let Err(e) = engine.record_notification(record).await {
        warn!(reservation = %reservation_id, "failed to record notification: {e}");
    }
}
