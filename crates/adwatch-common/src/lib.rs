//! Shared data model for the adwatch alerting pipeline.
//!
//! [`types`] holds the query and field-mapping types handed to the report
//! collaborators, [`report`] the in-memory report table that rules mutate and
//! actions read, and [`config`] the serde shapes of the alert-definition file.

pub mod config;
pub mod error;
pub mod report;
pub mod types;

pub use report::{ReportData, ReportRow, ReportRowMut};
pub use types::{AccountId, FieldDefinition, FieldMapping, ReportQuery};

/// Column appended by the message renderer; actions read alert text from it.
pub const ALERT_MESSAGE_FIELD: &str = "AlertMessage";
