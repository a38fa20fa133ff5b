/// Availability windows are expanded day by day, so they stay bounded.
pub const MAX_QUERY_WINDOW_DAYS: i64 = 93;
pub const MAX_STAY_NIGHTS: i64 = 365;

pub const MAX_TENANTS: usize = 10_000;
pub const MIN_TENANT_SLUG_LEN: usize = 3;
pub const MAX_TENANT_SLUG_LEN: usize = 63;
pub const MAX_LOCALE_LEN: usize = 16;

pub const MAX_ROOMS_PER_TENANT: usize = 500;
pub const MAX_BLOCKS_PER_TENANT: usize = 20_000;
pub const MAX_RESERVATIONS_PER_TENANT: usize = 200_000;

pub const MIN_ROOM_NAME_LEN: usize = 2;
pub const MAX_ROOM_NAME_LEN: usize = 200;
pub const MAX_DESCRIPTION_LEN: usize = 5_000;

pub const MAX_GUEST_NAME_LEN: usize = 200;
pub const MAX_EMAIL_LEN: usize = 254;
pub const MAX_GUEST_PHONE_LEN: usize = 50;
pub const MAX_MESSAGE_LEN: usize = 2_000;
pub const MAX_BLOCK_REASON_LEN: usize = 200;

/// Page size for the notification log.
pub const NOTIFICATION_LOG_PAGE: usize = 50;
