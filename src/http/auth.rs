//! Tenant resolution and admin role checks.
//!
//! Identity is established upstream; this layer trusts the `x-tenant` and
//! `x-admin-role` headers the identity proxy forwards.

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::header;

use crate::engine::Engine;

use super::error::ApiError;
use super::AppState;

const TENANT_HEADER: &str = "x-tenant";
const ROLE_HEADER: &str = "x-admin-role";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Role {
    Staff,
    Admin,
    Owner,
}

impl Role {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "STAFF" => Some(Role::Staff),
            "ADMIN" => Some(Role::Admin),
            "OWNER" => Some(Role::Owner),
            _ => None,
        }
    }
}

/// Tenant slug encoded in `host`: the first label left of `root_domain`.
/// The admin subdomain and the bare root domain carry no tenant.
pub fn tenant_slug_from_host(host: &str, root_domain: &str, admin_subdomain: &str) -> Option<String> {
    let host = host.trim().to_ascii_lowercase();
    let host = host.split(':').next().unwrap_or_default();
    if host.is_empty() || root_domain.is_empty() || host == root_domain {
        return None;
    }
    if host
        .strip_prefix(admin_subdomain)
        .is_some_and(|rest| rest.starts_with('.'))
    {
        return None;
    }
    let prefix = host.strip_suffix(root_domain)?.strip_suffix('.')?;
    prefix
        .split('.')
        .next()
        .filter(|slug| !slug.is_empty())
        .map(str::to_string)
}

fn header_str<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// The storefront's tenant, from `x-tenant` or else the `Host` subdomain.
pub struct PublicTenant(pub Arc<Engine>);

impl FromRequestParts<AppState> for PublicTenant {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let slug = match header_str(parts, TENANT_HEADER) {
            Some(slug) => slug.to_ascii_lowercase(),
            None => header_str(parts, header::HOST.as_str())
                .and_then(|host| {
                    tenant_slug_from_host(
                        host,
                        &state.config.root_domain,
                        &state.config.admin_subdomain,
                    )
                })
                .ok_or(ApiError::TenantUnresolved)?,
        };
        let engine = state.tenants.get(&slug).await?;
        Ok(Self(engine))
    }
}

/// An admin principal acting on one tenant, at least STAFF.
pub struct AdminContext {
    pub engine: Arc<Engine>,
    pub role: Role,
}

impl AdminContext {
    pub fn require(&self, min: Role) -> Result<(), ApiError> {
        if self.role < min {
            metrics::counter!(crate::observability::AUTH_FAILURES_TOTAL, "reason" => "role")
                .increment(1);
            return Err(ApiError::Forbidden);
        }
        Ok(())
    }
}

impl FromRequestParts<AppState> for AdminContext {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let (Some(slug), Some(role)) = (
            header_str(parts, TENANT_HEADER),
            header_str(parts, ROLE_HEADER).and_then(Role::parse),
        ) else {
            metrics::counter!(crate::observability::AUTH_FAILURES_TOTAL, "reason" => "missing")
                .increment(1);
            return Err(ApiError::Unauthorized);
        };
        let engine = state.tenants.get(&slug.to_ascii_lowercase()).await?;
        Ok(Self { engine, role })
    }
}
