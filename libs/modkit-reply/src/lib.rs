//! JSON reply envelopes for request/response endpoints.
//!
//! A handler accumulates data, recoverable errors and a critical flag on a
//! [`ResponseBuilder`], which finalizes once into a single envelope:
//!
//! ```json
//! {"status": true, "code": 200, "data": {...}, "errors": [{"code": "", "title": "..."}], "html": null}
//! ```
//!
//! Escalating an error with [`ErrorEntryMut::critical`] flips `status` to
//! `false` and, unless `pushAfterCritical` is disabled, finalizes on the spot.
//! The emitted [`Reply`] travels back to the caller inside [`Halt`] so the
//! handler stops at the next `?`.
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod builder;
pub mod config;
pub mod data;
pub mod entry;
pub mod envelope;
pub mod error;
pub mod output;
pub mod reply;

// Re-export commonly used types
pub use builder::ResponseBuilder;
pub use config::{ENV_PREFIX, ReplyConfig, ReplyOption, UnknownOption};
pub use data::{DataKey, ResponseData};
pub use entry::{ErrorEntry, ErrorEntryMut};
pub use envelope::{APPLICATION_JSON_UTF8, ENVELOPE_CODE, Envelope, ErrorCode, ErrorRecord};
pub use error::ReplyError;
pub use output::{BufferStack, OutputCapture};
pub use reply::{Halt, Reply};
