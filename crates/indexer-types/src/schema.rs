//! Destination schema field names and the Solr timestamp format.
//!
//! Every document written during a crawl carries [`CRAWL_ID`] and
//! [`CRAWL_DATE`]; orphan deletion later matches on [`CRAWL_ID`], so the
//! same spelling must be used everywhere.

use chrono::{DateTime, TimeZone, Utc};

pub const ID: &str = "id";
pub const DOC_ID: &str = "doc_id";
pub const PARENT_ID: &str = "parent_id";
pub const PARENT_FIELD_NAME: &str = "parent_field_name";
pub const CHUNK: &str = "chunk";
pub const CHUNK_NUMBER: &str = "chunk_number";
pub const CRAWL_ID: &str = "crawl_id";
pub const CRAWL_DATE: &str = "crawl_date";
pub const CREATION_DATE: &str = "creation_date";

/// UTC ISO-8601 with milliseconds, the format Solr date fields expect.
pub const SOLR_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// Format a timestamp as a Solr date string.
pub fn format_solr_date(ts: DateTime<Utc>) -> String {
    ts.format(SOLR_DATE_FORMAT).to_string()
}

/// Convert integer epoch milliseconds into a Solr date string.
///
/// Returns `None` when the value is outside the representable range.
pub fn solr_date_from_epoch_millis(millis: i64) -> Option<String> {
    Utc.timestamp_millis_opt(millis).single().map(format_solr_date)
}
