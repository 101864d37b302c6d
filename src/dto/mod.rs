use std::time::SystemTime;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

pub mod auth;
pub mod competition;
pub mod health;
pub mod matches;
pub mod payment;
pub mod practice;
pub mod question;
pub mod sse;
pub mod team;
pub mod validation;
pub mod ws;

fn format_system_time(time: SystemTime) -> String {
    OffsetDateTime::from(time)
        .format(&Rfc3339)
        .unwrap_or_else(|_| "invalid-timestamp".into())
}

/// Parse an RFC 3339 timestamp sent by a client.
pub fn parse_timestamp(value: &str) -> Option<SystemTime> {
    OffsetDateTime::parse(value, &Rfc3339)
        .ok()
        .map(SystemTime::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamps_survive_formatting() {
        let parsed = parse_timestamp("2026-03-01T18:30:00Z").unwrap();
        assert_eq!(format_system_time(parsed), "2026-03-01T18:30:00Z");
        assert!(parse_timestamp("tomorrow").is_none());
    }
}
