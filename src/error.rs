use std::path::PathBuf;

use thiserror::Error;

use crate::model::SheetRejection;

/// Convenient alias for fallible results returned throughout the crate.
pub type Result<T> = std::result::Result<T, DigestError>;

/// Error type covering the different failure cases that can occur while the
/// tool ingests a workbook, resolves recipients, or dispatches digests.
#[derive(Debug, Error)]
pub enum DigestError {
    /// Wrapper for IO failures such as reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Raised when JSON parsing or serialization fails.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Errors bubbled up from the Excel reader implementation.
    #[error("Excel read error: {0}")]
    ExcelRead(#[from] calamine::XlsxError),

    /// Errors bubbled up from the Excel writer implementation.
    #[error("Excel write error: {0}")]
    ExcelWrite(#[from] rust_xlsxwriter::XlsxError),

    /// Raised when the user provides a path that does not exist.
    #[error("input file not found: {0}")]
    MissingInput(PathBuf),

    /// Raised when no sheet survives pivot rejection and the mandatory
    /// column checks. Carries one entry per rejected sheet so the operator
    /// can see exactly why each candidate was unusable.
    #[error("no usable data sheet found: {}", render_rejections(.0))]
    SheetNotFound(Vec<SheetRejection>),

    /// Raised when the status filter leaves zero rows. Reports the status
    /// values that were actually present to guide configuration fixes.
    #[error("no rows match target statuses {targets:?}; statuses present in sheet: {observed:?}")]
    NoRowsMatchFilter {
        targets: Vec<String>,
        observed: Vec<String>,
    },

    /// Raised when every filtered row lacks a usable requester value.
    #[error("no row carries a usable '{key_field}' value; nothing to group")]
    NoValidGroupKeys { key_field: String },

    /// Raised in live mode when not a single requester resolved to an
    /// address, so there is nothing to send.
    #[error("no recipient could be resolved to an address; nothing to send")]
    NoResolvedRecipients,

    /// Raised when demo mode is requested without any test address.
    #[error("demo mode requires at least one --test-recipient address")]
    MissingTestRecipients,

    /// Raised when a send mode needs SMTP but the environment does not
    /// configure it.
    #[error("SMTP transport not configured; set ERF_SMTP_HOST and related variables")]
    SmtpNotConfigured,

    /// Raised when the SMTP transport cannot be constructed.
    #[error("SMTP error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    /// Raised when a mailbox address fails to parse.
    #[error("invalid mail address: {0}")]
    InvalidAddress(#[from] lettre::address::AddressError),

    /// Raised when the tracing subscriber fails to initialise.
    #[error("failed to initialise logging: {0}")]
    Logging(String),
}

fn render_rejections(rejections: &[SheetRejection]) -> String {
    if rejections.is_empty() {
        return "workbook has no sheets".to_string();
    }
    rejections
        .iter()
        .map(SheetRejection::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
