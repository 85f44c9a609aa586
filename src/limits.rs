//! Hard input limits. Anything past these is rejected with a
//! `LimitExceeded` error before it reaches state or the WAL.

use crate::model::Ms;

pub const MAX_NAME_LEN: usize = 100;
pub const MAX_DESCRIPTION_LEN: usize = 2000;
pub const MAX_EMAIL_LEN: usize = 254;
pub const MAX_USERNAME_LEN: usize = 150;
pub const MAX_ROOM_NUMBER_LEN: usize = 10;
pub const MAX_LOCATION_LEN: usize = 255;
pub const MAX_GROUP_NAME_LEN: usize = 150;
pub const MAX_GROUPS_PER_EMPLOYEE: usize = 32;
pub const MAX_AMENITIES_PER_CATEGORY: usize = 64;

pub const MIN_PASSWORD_LEN: usize = 8;
pub const MAX_PASSWORD_LEN: usize = 128;

/// 1970-01-01T00:00:00Z.
pub const MIN_VALID_TIMESTAMP_MS: Ms = 0;
/// 2100-01-01T00:00:00Z.
pub const MAX_VALID_TIMESTAMP_MS: Ms = 4_102_444_800_000;
/// Two years. No stay is longer.
pub const MAX_SPAN_DURATION_MS: Ms = 2 * 366 * 24 * 3_600_000;
/// One leap year. Availability windows wider than this are rejected.
pub const MAX_QUERY_WINDOW_MS: Ms = 366 * 24 * 3_600_000;
