//! Error entries collected by a [`ResponseBuilder`].

use std::fmt;
use std::ops::Deref;

use http::StatusCode;

use crate::builder::{BuilderId, ResponseBuilder};
use crate::config::ReplyOption;
use crate::envelope::{ErrorCode, ErrorRecord};
use crate::reply::Halt;

/// A recoverable error, or a critical one once escalated.
///
/// An entry belongs to the builder it was created against and can only be
/// appended to that builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorEntry {
    owner: BuilderId,
    title: String,
    code: ErrorCode,
    status_code: StatusCode,
    critical: bool,
}

impl ErrorEntry {
    /// Detached entry owned by `owner`; append it with [`ResponseBuilder::add_entry`].
    #[must_use]
    pub fn new(owner: &ResponseBuilder) -> Self {
        Self {
            owner: owner.id(),
            title: String::new(),
            code: ErrorCode::default(),
            status_code: StatusCode::OK,
            critical: false,
        }
    }

    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    #[must_use]
    pub fn with_code(mut self, code: impl Into<ErrorCode>) -> Self {
        self.code = code.into();
        self
    }

    /// Transport status to reply with if this entry escalates.
    #[must_use]
    pub fn with_status_code(mut self, status_code: StatusCode) -> Self {
        self.status_code = status_code;
        self
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn code(&self) -> &ErrorCode {
        &self.code
    }

    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        self.status_code
    }

    /// Whether this entry has escalated.
    #[must_use]
    pub fn is_critical(&self) -> bool {
        self.critical
    }

    /// The `{code, title}` projection written to the envelope.
    #[must_use]
    pub fn record(&self) -> ErrorRecord {
        ErrorRecord {
            code: self.code.clone(),
            title: self.title.clone(),
        }
    }

    pub(crate) fn owner(&self) -> BuilderId {
        self.owner
    }

    pub(crate) fn mark_critical(&mut self) {
        self.critical = true;
    }
}

impl fmt::Display for ErrorEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.title)
    }
}

/// Chaining handle to an entry stored in its owning builder.
///
/// Read access goes through `Deref<Target = ErrorEntry>`; [`ErrorEntryMut::done`]
/// hands the builder back for further chaining.
pub struct ErrorEntryMut<'a> {
    builder: &'a mut ResponseBuilder,
    index: usize,
}

impl<'a> ErrorEntryMut<'a> {
    pub(crate) fn new(builder: &'a mut ResponseBuilder, index: usize) -> Self {
        Self { builder, index }
    }

    /// Position of the entry in the builder's error list.
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    #[must_use]
    pub fn with_title(self, title: impl Into<String>) -> Self {
        self.builder.entry_at_mut(self.index).title = title.into();
        self
    }

    #[must_use]
    pub fn with_code(self, code: impl Into<ErrorCode>) -> Self {
        self.builder.entry_at_mut(self.index).code = code.into();
        self
    }

    #[must_use]
    pub fn with_status_code(self, status_code: StatusCode) -> Self {
        self.builder.entry_at_mut(self.index).status_code = status_code;
        self
    }

    /// Escalate this entry to a critical error.
    ///
    /// `false` changes nothing. `true` marks the entry and its builder as
    /// critical; with `pushAfterCritical` enabled the builder is finalized
    /// with this entry's status code and the reply comes back as
    /// [`Halt::Replied`], which the handler must propagate.
    ///
    /// # Errors
    /// [`Halt::Replied`] when the reply was emitted, [`Halt::Failed`] when
    /// finalizing failed (for instance because the builder was already
    /// finalized).
    pub fn critical(self, flag: bool) -> Result<Self, Halt> {
        if !flag {
            return Ok(self);
        }

        let entry = self.builder.entry_at_mut(self.index);
        entry.mark_critical();
        let status_code = entry.status_code;
        self.builder.set_critical();

        let push = self.builder.config().enabled(ReplyOption::PushAfterCritical);
        tracing::debug!(
            title = %self.title(),
            status_code = %status_code,
            push,
            "error escalated to critical"
        );

        if push {
            let reply = self.builder.finalize(status_code)?;
            return Err(Halt::from(reply));
        }
        Ok(self)
    }

    /// Return the owning builder.
    pub fn done(self) -> &'a mut ResponseBuilder {
        self.builder
    }
}

impl Deref for ErrorEntryMut<'_> {
    type Target = ErrorEntry;

    fn deref(&self) -> &Self::Target {
        &self.builder.errors()[self.index]
    }
}

impl fmt::Debug for ErrorEntryMut<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorEntryMut")
            .field("index", &self.index)
            .field("entry", &**self)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for ErrorEntryMut<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&**self, f)
    }
}
