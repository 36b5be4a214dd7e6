//! Capture of stray handler output.
//!
//! Handlers sometimes print diagnostics while building a reply. Anything
//! written through [`crate::ResponseBuilder::output`] lands in a stack of
//! capture scopes; at finalize the innermost scope becomes the envelope's
//! `html` field and every remaining scope is discarded.

use std::fmt;

/// A stack of output capture scopes.
pub trait OutputCapture: fmt::Write + Send {
    /// Open a new innermost scope.
    fn start_scope(&mut self);

    /// Return the innermost scope's text and close it.
    ///
    /// `None` when no scope is open.
    fn capture_and_end_innermost(&mut self) -> Option<String>;

    /// Close every open scope, discarding their text.
    fn end_all_scopes(&mut self);

    /// Number of open scopes.
    fn depth(&self) -> usize;
}

/// In-memory [`OutputCapture`].
///
/// Text written while no scope is open is dropped.
#[derive(Debug, Default, Clone)]
pub struct BufferStack {
    scopes: Vec<String>,
}

impl BufferStack {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A stack with one scope already open.
    #[must_use]
    pub fn started() -> Self {
        Self {
            scopes: vec![String::new()],
        }
    }
}

impl fmt::Write for BufferStack {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        match self.scopes.last_mut() {
            Some(scope) => scope.push_str(s),
            None => tracing::trace!(len = s.len(), "output written with no capture scope open"),
        }
        Ok(())
    }
}

impl OutputCapture for BufferStack {
    fn start_scope(&mut self) {
        self.scopes.push(String::new());
    }

    fn capture_and_end_innermost(&mut self) -> Option<String> {
        self.scopes.pop()
    }

    fn end_all_scopes(&mut self) {
        self.scopes.clear();
    }

    fn depth(&self) -> usize {
        self.scopes.len()
    }
}
