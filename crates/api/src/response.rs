//! Response envelope for the generation API.
//!
//! Every successful handler returns its payload under a `data` key, so
//! clients can distinguish results from the `{ "error": ..., "code": ... }`
//! shape produced by [`crate::error::AppError`] without inspecting the
//! status line.

use serde::Serialize;

/// Wraps a handler payload as `{ "data": T }`.
///
/// Handlers with compound results (cancel outcome, clear counts) put a
/// dedicated payload struct inside rather than adding sibling keys.
#[derive(Debug, Serialize)]
pub struct DataResponse<T: Serialize> {
    pub data: T,
}
