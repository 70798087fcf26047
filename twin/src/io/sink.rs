//! Lead sink abstraction.
//!
//! A sink receives complete lead rows in [`LEAD_COLUMNS`](crate::core::lead::LEAD_COLUMNS)
//! order. Appends are at-most-once: callers never retry a failed append,
//! because a failure after the write was committed (e.g. a timeout on the
//! response) would otherwise produce a duplicate row.

use crate::io::error::CollaboratorError;

/// Six cells: timestamp, name, company, role, contact, notes.
pub type LeadRow = [String; 6];

pub trait LeadSink {
    /// Append exactly one row.
    fn append_row(&self, row: &LeadRow) -> Result<(), CollaboratorError>;

    /// Short human-readable destination, for logs and `twin check`.
    fn describe(&self) -> String;
}

impl<T: LeadSink + ?Sized> LeadSink for Box<T> {
    fn append_row(&self, row: &LeadRow) -> Result<(), CollaboratorError> {
        (**self).append_row(row)
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}
