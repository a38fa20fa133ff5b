use ulid::Ulid;

use crate::model::ReservationStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Tenant,
    Room,
    Reservation,
    Block,
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Entity::Tenant => "tenant",
            Entity::Room => "room",
            Entity::Reservation => "reservation",
            Entity::Block => "block",
        })
    }
}

/// What a rejected hold collided with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Holder {
    Block(Ulid),
    Reservation(Ulid),
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("invalid input: {0}")]
    Validation(&'static str),
    #[error("{0} not found: {1}")]
    NotFound(Entity, Ulid),
    #[error("tenant not found: {0}")]
    TenantNotFound(String),
    #[error("dates unavailable: conflicts with {0:?}")]
    Conflict(Holder),
    #[error("reservation {id} is {from}, cannot become {to}")]
    InvalidTransition {
        id: Ulid,
        from: ReservationStatus,
        to: ReservationStatus,
    },
    #[error("already exists: {0}")]
    AlreadyExists(String),
    #[error("cannot delete room {0}: it is the last room")]
    LastRoom(Ulid),
    #[error("limit exceeded: {0}")]
    LimitExceeded(&'static str),
    #[error("WAL error: {0}")]
    WalError(String),
}

impl From<std::io::Error> for EngineError {
    fn from(e: std::io::Error) -> Self {
        EngineError::WalError(e.to_string())
    }
}
