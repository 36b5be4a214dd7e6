//! Emitted replies and the terminal signal handlers propagate.

use http::{HeaderValue, StatusCode, header};

use crate::envelope::{APPLICATION_JSON_UTF8, Envelope};
use crate::error::ReplyError;

/// A finalized reply: transport status, envelope and its serialized body.
#[derive(Debug, Clone, PartialEq)]
#[must_use]
pub struct Reply {
    status: StatusCode,
    envelope: Envelope,
    body: String,
}

impl Reply {
    pub(crate) fn new(status: StatusCode, envelope: Envelope, body: String) -> Self {
        Self {
            status,
            envelope,
            body,
        }
    }

    /// Transport status code. Independent of the envelope's `code` field.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    #[must_use]
    pub fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    #[must_use]
    pub fn body(&self) -> &str {
        &self.body
    }

    #[must_use]
    pub fn into_body(self) -> String {
        self.body
    }
}

impl From<Reply> for http::Response<String> {
    fn from(reply: Reply) -> Self {
        let mut resp = http::Response::new(reply.body);
        *resp.status_mut() = reply.status;
        resp.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static(APPLICATION_JSON_UTF8),
        );
        resp
    }
}

/// Axum integration: a reply is directly usable as a handler response
#[cfg(feature = "axum")]
impl axum::response::IntoResponse for Reply {
    fn into_response(self) -> axum::response::Response {
        let status = self.status;
        let mut resp = self.body.into_response();
        *resp.status_mut() = status;
        resp.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static(APPLICATION_JSON_UTF8),
        );
        resp
    }
}

/// Signal that request handling must stop.
///
/// Returned as the `Err` side of a handler result so `?` unwinds the handler
/// once a reply has been emitted.
#[derive(Debug, thiserror::Error)]
pub enum Halt {
    /// The reply was finalized; nothing after this point may run.
    #[error("reply emitted with status {}", .0.status())]
    Replied(Box<Reply>),

    /// Finalizing failed.
    #[error(transparent)]
    Failed(#[from] ReplyError),
}

impl Halt {
    /// The emitted reply, or the error that prevented emitting it.
    ///
    /// # Errors
    /// Returns the [`ReplyError`] carried by [`Halt::Failed`].
    pub fn into_reply(self) -> Result<Reply, ReplyError> {
        match self {
            Self::Replied(reply) => Ok(*reply),
            Self::Failed(err) => Err(err),
        }
    }
}

impl From<Reply> for Halt {
    fn from(reply: Reply) -> Self {
        Self::Replied(Box::new(reply))
    }
}
