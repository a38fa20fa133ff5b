//! Caller-supplied inputs and the shape checks that run before any ledger access.

use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::conflict::validate_stay;
use super::EngineError;

#[derive(Debug, Clone)]
pub struct BookingRequest {
    pub room_id: Ulid,
    pub stay: DateSpan,
    pub guest: GuestInfo,
}

impl BookingRequest {
    /// Trim guest fields, drop empty optionals, and reject malformed input.
    pub fn validated(mut self) -> Result<Self, EngineError> {
        validate_stay(&self.stay)?;

        let guest = &mut self.guest;
        guest.name = guest.name.trim().to_string();
        guest.email = guest.email.trim().to_string();
        guest.phone = non_empty(guest.phone.take());
        guest.message = non_empty(guest.message.take());

        if guest.name.is_empty() {
            return Err(EngineError::Validation("guest name is required"));
        }
        if guest.name.len() > MAX_GUEST_NAME_LEN {
            return Err(EngineError::Validation("guest name too long"));
        }
        if !looks_like_email(&guest.email) {
            return Err(EngineError::Validation("guest email is invalid"));
        }
        if guest.phone.as_ref().is_some_and(|p| p.len() > MAX_GUEST_PHONE_LEN) {
            return Err(EngineError::Validation("guest phone too long"));
        }
        if guest.count == Some(0) {
            return Err(EngineError::Validation("guest count must be positive"));
        }
        if guest.message.as_ref().is_some_and(|m| m.len() > MAX_MESSAGE_LEN) {
            return Err(EngineError::Validation("message too long"));
        }
        Ok(self)
    }
}

#[derive(Debug, Clone)]
pub struct NewRoom {
    pub name: String,
    pub description: String,
    pub max_guests: Option<u32>,
    pub is_active: bool,
}

impl NewRoom {
    pub fn validated(mut self) -> Result<Self, EngineError> {
        self.name = validate_room_name(&self.name)?;
        self.description = validate_description(&self.description)?;
        validate_max_guests(self.max_guests)?;
        Ok(self)
    }
}

/// Partial room update; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default)]
pub struct RoomPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    /// `Some(None)` clears the limit.
    pub max_guests: Option<Option<u32>>,
    pub is_active: Option<bool>,
}

impl RoomPatch {
    pub fn apply_to(&self, room: &Room) -> Result<Room, EngineError> {
        let mut updated = room.clone();
        if let Some(name) = &self.name {
            updated.name = validate_room_name(name)?;
        }
        if let Some(description) = &self.description {
            updated.description = validate_description(description)?;
        }
        if let Some(max_guests) = self.max_guests {
            validate_max_guests(max_guests)?;
            updated.max_guests = max_guests;
        }
        if let Some(is_active) = self.is_active {
            updated.is_active = is_active;
        }
        Ok(updated)
    }
}

#[derive(Debug, Clone)]
pub struct Onboarding {
    pub slug: String,
    pub default_locale: String,
    pub contact_email: Option<String>,
    pub auto_confirm: bool,
}

impl Onboarding {
    pub fn validated(mut self) -> Result<Self, EngineError> {
        self.slug = slugify(&self.slug);
        if self.slug.len() < MIN_TENANT_SLUG_LEN {
            return Err(EngineError::Validation("slug must be at least 3 characters"));
        }
        if self.slug.len() > MAX_TENANT_SLUG_LEN {
            return Err(EngineError::LimitExceeded("slug too long"));
        }
        self.default_locale = self.default_locale.trim().to_string();
        if self.default_locale.len() < 2 || self.default_locale.len() > MAX_LOCALE_LEN {
            return Err(EngineError::Validation("default locale is invalid"));
        }
        self.contact_email = non_empty(self.contact_email.take());
        if self.contact_email.as_deref().is_some_and(|e| !looks_like_email(e)) {
            return Err(EngineError::Validation("contact email is invalid"));
        }
        Ok(self)
    }
}

pub(crate) fn validate_block_reason(reason: Option<String>) -> Result<Option<String>, EngineError> {
    let reason = non_empty(reason);
    if reason.as_ref().is_some_and(|r| r.len() > MAX_BLOCK_REASON_LEN) {
        return Err(EngineError::Validation("block reason too long"));
    }
    Ok(reason)
}

/// Lowercase ASCII alphanumerics separated by single dashes.
pub fn slugify(raw: &str) -> String {
    let mut slug = String::with_capacity(raw.len());
    for c in raw.trim().chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('-') && !slug.is_empty() {
            slug.push('-');
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn looks_like_email(email: &str) -> bool {
    if email.len() > MAX_EMAIL_LEN || email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}

fn validate_room_name(name: &str) -> Result<String, EngineError> {
    let name = name.trim();
    if name.len() < MIN_ROOM_NAME_LEN {
        return Err(EngineError::Validation("room name must be at least 2 characters"));
    }
    if name.len() > MAX_ROOM_NAME_LEN {
        return Err(EngineError::LimitExceeded("room name too long"));
    }
    Ok(name.to_string())
}

fn validate_description(description: &str) -> Result<String, EngineError> {
    let description = description.trim();
    if description.is_empty() {
        return Err(EngineError::Validation("room description is required"));
    }
    if description.len() > MAX_DESCRIPTION_LEN {
        return Err(EngineError::LimitExceeded("room description too long"));
    }
    Ok(description.to_string())
}

fn validate_max_guests(max_guests: Option<u32>) -> Result<(), EngineError> {
    if max_guests == Some(0) {
        return Err(EngineError::Validation("max guests must be positive"));
    }
    Ok(())
}
