pub mod config;
pub mod domain;
pub mod error;
pub mod ingest;

use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

/// Current time as an RFC3339 UTC string; falls back to unix seconds if formatting fails.
pub fn now_rfc3339_utc() -> String {
    let now = OffsetDateTime::now_utc();
    now.format(&Rfc3339)
        .unwrap_or_else(|_| now.unix_timestamp().to_string())
}
