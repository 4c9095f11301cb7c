//! Decoding of SMALLINT status columns into core status enums.

use longform_core::job::JobStatus;
use longform_core::outline::OutlineStatus;
use longform_core::status::StatusId;

/// Error for a status id with no matching enum variant.
fn unknown_status(table: &str, id: StatusId) -> sqlx::Error {
    sqlx::Error::Decode(format!("unknown {table} id {id}").into())
}

pub fn decode_job_status(id: StatusId) -> Result<JobStatus, sqlx::Error> {
    JobStatus::from_id(id).ok_or_else(|| unknown_status("job_statuses", id))
}

pub fn decode_outline_status(id: StatusId) -> Result<OutlineStatus, sqlx::Error> {
    OutlineStatus::from_id(id).ok_or_else(|| unknown_status("outline_statuses", id))
}
