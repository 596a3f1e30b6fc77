//! Response status capture.
//!
//! Records the status code of the response written back to the caller. Only
//! the first recorded status counts, matching "first header wins" semantics.

use axum::http::{Response, StatusCode};
use std::sync::OnceLock;

/// Holds the first status code written for one request.
#[derive(Debug, Default)]
pub struct StatusCapture {
    status: OnceLock<StatusCode>,
}

impl StatusCapture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `status`. Returns false if a status was already recorded.
    pub fn record(&self, status: StatusCode) -> bool {
        self.status.set(status).is_ok()
    }

    /// The recorded status, or `200 OK` if nothing was written explicitly.
    pub fn status(&self) -> StatusCode {
        self.status.get().copied().unwrap_or(StatusCode::OK)
    }

    /// Pass a response through, recording its status on the way.
    pub fn observe<B>(&self, response: Response<B>) -> Response<B> {
        self.record(response.status());
        response
    }
}
