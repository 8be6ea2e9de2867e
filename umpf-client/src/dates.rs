//! Parses the three date/time spellings the CLI accepts: `YYYY-MM-DD`,
//! `YYYY-MM-DDTHH:MM:SS[±ZZZZ]`, or a decimal Unix epoch.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};

use crate::error::ClientError;

pub fn parse_stamp(s: &str) -> Result<DateTime<Utc>, ClientError> {
    if let Ok(epoch) = s.parse::<i64>() {
        return Utc
            .timestamp_opt(epoch, 0)
            .single()
            .ok_or_else(|| ClientError::BadDate(s.to_owned()));
    }
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%z") {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0).unwrap()));
    }
    Err(ClientError::BadDate(s.to_owned()))
}

pub fn parse_clear_date(s: &str) -> Result<NaiveDate, ClientError> {
    if let Ok(epoch) = s.parse::<i64>() {
        return Utc
            .timestamp_opt(epoch, 0)
            .single()
            .map(|dt| dt.date_naive())
            .ok_or_else(|| ClientError::BadDate(s.to_owned()));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| ClientError::BadDate(s.to_owned()))
}
