//! Request-scoped reply builder.
//!
//! A [`ResponseBuilder`] collects data and errors while a handler runs and
//! finalizes exactly once into a [`Reply`]:
//!
//! ```
//! use http::StatusCode;
//! use modkit_reply::{Halt, ResponseBuilder};
//!
//! fn handler(resp: &mut ResponseBuilder) -> Result<(), Halt> {
//!     resp.add_keyed_data("x", 1);
//!     resp.add_error("bad input");
//!     resp.add_error("fatal")
//!         .with_status_code(StatusCode::BAD_REQUEST)
//!         .critical(true)?;
//!     unreachable!("escalation finalized the reply");
//! }
//!
//! let reply = ResponseBuilder::new().respond(handler).unwrap();
//! assert_eq!(reply.status(), StatusCode::BAD_REQUEST);
//! assert!(!reply.envelope().status);
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use http::StatusCode;
use serde_json::Value;

use crate::config::{ReplyConfig, ReplyOption};
use crate::data::{DataKey, ResponseData};
use crate::entry::{ErrorEntry, ErrorEntryMut};
use crate::envelope::{ENVELOPE_CODE, Envelope};
use crate::error::ReplyError;
use crate::output::{BufferStack, OutputCapture};
use crate::reply::{Halt, Reply};

static NEXT_BUILDER_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique builder identity; ties entries to their owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct BuilderId(u64);

impl BuilderId {
    fn next() -> Self {
        Self(NEXT_BUILDER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Collects reply data, errors and the critical flag for one request.
///
/// After [`finalize`](Self::finalize) the builder is sealed: another finalize
/// returns [`ReplyError::AlreadyFinalized`], and mutators only touch
/// in-memory state that can no longer reach the wire.
pub struct ResponseBuilder {
    id: BuilderId,
    status: bool,
    data: ResponseData,
    error_stack: Vec<ErrorEntry>,
    had_critical_error: bool,
    config: ReplyConfig,
    output: Box<dyn OutputCapture>,
    finalized: bool,
}

impl Default for ResponseBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ResponseBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseBuilder")
            .field("status", &self.status)
            .field("data", &self.data)
            .field("error_stack", &self.error_stack)
            .field("had_critical_error", &self.had_critical_error)
            .field("config", &self.config)
            .field("output_depth", &self.output.depth())
            .field("finalized", &self.finalized)
            .finish_non_exhaustive()
    }
}

impl ResponseBuilder {
    /// Builder with default options and one open capture scope.
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: BuilderId::next(),
            status: true,
            data: ResponseData::new(),
            error_stack: Vec::new(),
            had_critical_error: false,
            config: ReplyConfig::default(),
            output: Box::new(BufferStack::started()),
            finalized: false,
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: ReplyConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the output capture collaborator.
    #[must_use]
    pub fn with_output(mut self, output: Box<dyn OutputCapture>) -> Self {
        self.output = output;
        self
    }

    pub(crate) fn id(&self) -> BuilderId {
        self.id
    }

    fn warn_if_sealed(&self, op: &'static str) {
        if self.finalized {
            tracing::warn!(op, "reply builder mutated after finalize; change is not emitted");
        }
    }

    // --- options ---

    /// Merge a partial option map; unknown keys are stored as given.
    pub fn configure<I, K>(&mut self, options: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, bool)>,
        K: AsRef<str>,
    {
        self.warn_if_sealed("configure");
        self.config.merge(options);
        self
    }

    #[must_use]
    pub fn option(&self, key: &str) -> Option<bool> {
        self.config.get(key)
    }

    pub fn set_option(&mut self, key: &str, value: bool) -> &mut Self {
        self.warn_if_sealed("set_option");
        self.config.set(key, value);
        self
    }

    #[must_use]
    pub fn config(&self) -> &ReplyConfig {
        &self.config
    }

    // --- errors ---

    /// Append a new error titled `title` and return a handle to it.
    pub fn add_error(&mut self, title: impl Into<String>) -> ErrorEntryMut<'_> {
        self.warn_if_sealed("add_error");
        let entry = ErrorEntry::new(self).with_title(title);
        self.error_stack.push(entry);
        let index = self.error_stack.len() - 1;
        ErrorEntryMut::new(self, index)
    }

    /// Append an entry built with [`ErrorEntry::new`].
    ///
    /// # Errors
    /// Returns [`ReplyError::ForeignEntry`] if the entry was created against
    /// another builder.
    pub fn add_entry(&mut self, entry: ErrorEntry) -> Result<ErrorEntryMut<'_>, ReplyError> {
        if entry.owner() != self.id {
            return Err(ReplyError::ForeignEntry);
        }
        self.warn_if_sealed("add_entry");
        self.error_stack.push(entry);
        let index = self.error_stack.len() - 1;
        Ok(ErrorEntryMut::new(self, index))
    }

    /// Handle to a previously added entry.
    pub fn error_mut(&mut self, index: usize) -> Option<ErrorEntryMut<'_>> {
        if index < self.error_stack.len() {
            Some(ErrorEntryMut::new(self, index))
        } else {
            None
        }
    }

    #[must_use]
    pub fn errors(&self) -> &[ErrorEntry] {
        &self.error_stack
    }

    pub(crate) fn entry_at_mut(&mut self, index: usize) -> &mut ErrorEntry {
        self.warn_if_sealed("error entry update");
        &mut self.error_stack[index]
    }

    /// Mark the reply as carrying a critical error. Idempotent.
    pub fn set_critical(&mut self) -> &mut Self {
        self.warn_if_sealed("set_critical");
        self.had_critical_error = true;
        self
    }

    #[must_use]
    pub fn had_critical_error(&self) -> bool {
        self.had_critical_error
    }

    // --- data ---

    /// Append `value` under the next positional index.
    pub fn add_data(&mut self, value: impl Into<Value>) -> &mut Self {
        self.warn_if_sealed("add_data");
        self.data.push(value);
        self
    }

    /// Set `data[key] = value`, overwriting any previous value.
    pub fn add_keyed_data(&mut self, key: impl Into<DataKey>, value: impl Into<Value>) -> &mut Self {
        self.warn_if_sealed("add_keyed_data");
        self.data.insert(key, value);
        self
    }

    /// Replace the data wholesale.
    pub fn set_data(&mut self, data: impl Into<ResponseData>) -> &mut Self {
        self.warn_if_sealed("set_data");
        self.data = data.into();
        self
    }

    #[must_use]
    pub fn data(&self) -> &ResponseData {
        &self.data
    }

    // --- status ---

    /// Store an interim status. Finalize always recomputes it from the
    /// critical flag, so this never reaches the envelope.
    pub fn set_status(&mut self, status: bool) -> &mut Self {
        self.warn_if_sealed("set_status");
        self.status = status;
        self
    }

    #[must_use]
    pub fn status(&self) -> bool {
        self.status
    }

    // --- output ---

    /// Sink for stray handler output, e.g. `write!(resp.output(), "...")`.
    pub fn output(&mut self) -> &mut dyn OutputCapture {
        self.output.as_mut()
    }

    // --- finalize ---

    #[must_use]
    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Compute the final status, build and serialize the envelope, and seal
    /// the builder.
    ///
    /// `http_status` is the transport status; the envelope's `code` field is
    /// always 200.
    ///
    /// # Errors
    /// Returns [`ReplyError::AlreadyFinalized`] on every call after the first,
    /// or [`ReplyError::Serialize`] if the envelope cannot be encoded.
    pub fn finalize(&mut self, http_status: StatusCode) -> Result<Reply, ReplyError> {
        if self.finalized {
            tracing::warn!(status = %http_status, "reply already finalized");
            return Err(ReplyError::AlreadyFinalized);
        }
        self.finalized = true;

        self.status = !self.had_critical_error;
        if self.had_critical_error && self.config.enabled(ReplyOption::ClearDataIfError) {
            self.data.clear();
        }

        let errors = self.error_stack.iter().map(ErrorEntry::record).collect();

        let html = if self.config.enabled(ReplyOption::GetHtmlOutput) {
            self.output.capture_and_end_innermost()
        } else {
            None
        };
        self.output.end_all_scopes();

        let envelope = Envelope {
            status: self.status,
            code: ENVELOPE_CODE,
            data: serde_json::to_value(&self.data)?,
            errors,
            html,
        };
        let body = serde_json::to_string(&envelope)?;

        tracing::debug!(
            status = %http_status,
            ok = envelope.status,
            errors = envelope.errors.len(),
            html = envelope.html.is_some(),
            "reply finalized"
        );
        Ok(Reply::new(http_status, envelope, body))
    }

    /// Finalize and wrap the outcome as the terminal signal, so a handler can
    /// stop with `return Err(resp.finish(StatusCode::CREATED))`.
    pub fn finish(&mut self, http_status: StatusCode) -> Halt {
        match self.finalize(http_status) {
            Ok(reply) => Halt::from(reply),
            Err(err) => Halt::Failed(err),
        }
    }

    /// Run `handler` against this builder and produce the one reply.
    ///
    /// A handler that returns `Ok(())` is finalized with `200 OK`; a
    /// [`Halt::Replied`] yields the reply that was already emitted.
    ///
    /// # Errors
    /// Returns the [`ReplyError`] carried by [`Halt::Failed`], or the error
    /// from the closing finalize.
    pub fn respond<F>(mut self, handler: F) -> Result<Reply, ReplyError>
    where
        F: FnOnce(&mut Self) -> Result<(), Halt>,
    {
        match handler(&mut self) {
            Ok(()) => self.finalize(StatusCode::OK),
            Err(halt) => halt.into_reply(),
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fmt::Write;
    use tracing_test::traced_test;

    #[test]
    fn fresh_builder_state() {
        let builder = ResponseBuilder::new();
        assert!(builder.status());
        assert!(!builder.had_critical_error());
        assert!(builder.errors().is_empty());
        assert!(builder.data().is_empty());
        assert!(!builder.is_finalized());
        assert_eq!(builder.option("pushAfterCritical"), Some(true));
    }

    #[test]
    fn configure_accepts_unknown_keys() {
        let mut builder = ResponseBuilder::new();
        builder.configure([("getHtmlOutput", false), ("customFlag", true)]);

        assert_eq!(builder.option("getHtmlOutput"), Some(false));
        assert_eq!(builder.option("customFlag"), Some(true));
        assert_eq!(builder.option("absent"), None);
    }

    #[test]
    fn set_status_is_overridden_at_finalize() {
        let mut builder = ResponseBuilder::new();
        builder.set_status(false);
        assert!(!builder.status());

        let reply = builder.finalize(StatusCode::OK).unwrap();
        assert!(reply.envelope().status);
        assert!(builder.status());
    }

    #[test]
    fn set_critical_is_idempotent() {
        let mut builder = ResponseBuilder::new();
        builder.set_critical().set_critical();
        assert!(builder.had_critical_error());

        let reply = builder.finalize(StatusCode::OK).unwrap();
        assert!(!reply.envelope().status);
    }

    #[test]
    fn foreign_entries_are_rejected() {
        let other = ResponseBuilder::new();
        let mut builder = ResponseBuilder::new();

        let foreign = ErrorEntry::new(&other).with_title("stray");
        assert!(matches!(
            builder.add_entry(foreign),
            Err(ReplyError::ForeignEntry)
        ));
        assert!(builder.errors().is_empty());

        let own = ErrorEntry::new(&builder).with_title("mine").with_code(7);
        let handle = builder.add_entry(own).unwrap();
        assert_eq!(handle.index(), 0);
        assert_eq!(builder.errors()[0].title(), "mine");
    }

    #[test]
    fn error_mut_is_bounds_checked() {
        let mut builder = ResponseBuilder::new();
        builder.add_error("first");
        assert!(builder.error_mut(0).is_some());
        assert!(builder.error_mut(1).is_none());
    }

    #[test]
    fn done_returns_the_builder_for_chaining() {
        let mut builder = ResponseBuilder::new();
        builder
            .add_error("warned")
            .with_code(12)
            .done()
            .add_data("after")
            .add_keyed_data("k", true);

        let reply = builder.finalize(StatusCode::OK).unwrap();
        assert_eq!(reply.envelope().data, json!({"0": "after", "k": true}));
        assert_eq!(reply.envelope().errors[0].title, "warned");
    }

    #[test]
    fn html_is_the_innermost_scope_and_all_scopes_close() {
        let mut builder = ResponseBuilder::new();
        write!(builder.output(), "outer").unwrap();
        builder.output().start_scope();
        write!(builder.output(), "<b>inner</b>").unwrap();

        let reply = builder.finalize(StatusCode::OK).unwrap();
        assert_eq!(reply.envelope().html.as_deref(), Some("<b>inner</b>"));
        assert_eq!(builder.output().depth(), 0);
    }

    #[test]
    fn html_is_null_without_open_scope() {
        let mut builder = ResponseBuilder::new().with_output(Box::new(BufferStack::new()));
        write!(builder.output(), "dropped").unwrap();

        let reply = builder.finalize(StatusCode::OK).unwrap();
        assert_eq!(reply.envelope().html, None);
    }

    #[test]
    fn html_disabled_still_tears_down_scopes() {
        let mut builder = ResponseBuilder::new();
        builder.set_option("getHtmlOutput", false);
        builder.output().start_scope();
        write!(builder.output(), "noise").unwrap();

        let reply = builder.finalize(StatusCode::OK).unwrap();
        assert_eq!(reply.envelope().html, None);
        assert!(reply.body().ends_with(r#""html":null}"#));
        assert_eq!(builder.output().depth(), 0);
    }

    #[test]
    fn clear_data_disabled_keeps_data_on_critical() {
        let mut builder = ResponseBuilder::new();
        builder.configure([("pushAfterCritical", false), ("clearDataIfError", false)]);
        builder.add_keyed_data("partial", 1);
        let _ = builder.add_error("fatal").critical(true).unwrap();

        let reply = builder.finalize(StatusCode::INTERNAL_SERVER_ERROR).unwrap();
        assert!(!reply.envelope().status);
        assert_eq!(reply.envelope().data, json!({"partial": 1}));
    }

    #[test]
    fn second_finalize_is_rejected() {
        let mut builder = ResponseBuilder::new();
        builder.add_data(1);
        let first = builder.finalize(StatusCode::OK).unwrap();

        builder.add_data(2);
        assert!(matches!(
            builder.finalize(StatusCode::OK),
            Err(ReplyError::AlreadyFinalized)
        ));
        assert_eq!(first.envelope().data, json!([1]));
    }

    #[test]
    #[traced_test]
    fn mutation_after_finalize_is_logged() {
        let mut builder = ResponseBuilder::new();
        let _reply = builder.finalize(StatusCode::OK).unwrap();
        builder.add_data("late");

        assert!(logs_contain("mutated after finalize"));
    }

    #[test]
    #[traced_test]
    fn add_data_never_overwrites_the_max_index() {
        let mut builder = ResponseBuilder::new();
        builder
            .add_keyed_data("18446744073709551615", "max")
            .add_data("a")
            .add_data("b");

        let reply = builder.finalize(StatusCode::OK).unwrap();
        assert_eq!(
            reply.envelope().data,
            json!({"18446744073709551615": "max"})
        );
        assert!(logs_contain("already occupied"));
    }

    #[test]
    fn finish_wraps_the_reply_as_halt() {
        let mut builder = ResponseBuilder::new();
        let reply = builder.finish(StatusCode::CREATED).into_reply().unwrap();
        assert_eq!(reply.status(), StatusCode::CREATED);

        assert!(matches!(
            builder.finish(StatusCode::OK),
            Halt::Failed(ReplyError::AlreadyFinalized)
        ));
    }

    #[test]
    fn respond_finalizes_ok_handlers_with_200() {
        let reply = ResponseBuilder::new()
            .respond(|resp| {
                resp.add_data("done");
                Ok(())
            })
            .unwrap();
        assert_eq!(reply.status(), StatusCode::OK);
        assert_eq!(reply.envelope().data, json!(["done"]));
    }

    #[test]
    fn respond_surfaces_failed_halts() {
        let err = ResponseBuilder::new()
            .respond(|resp| {
                let _first = resp.finalize(StatusCode::OK)?;
                Err(resp.finish(StatusCode::OK))
            })
            .unwrap_err();
        assert!(matches!(err, ReplyError::AlreadyFinalized));
    }
}
