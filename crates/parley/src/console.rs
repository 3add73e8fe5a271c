//! The console collaborator: where engines report to a human.

/// Output sink for an operator or user console.
///
/// Engines call [`display`](Self::display) for every user-visible message,
/// including errors. Implementations decide how to decorate and where to
/// write; the call is fire-and-forget.
pub trait Console: Send + Sync + 'static {
    /// Shows one message.
    fn display(&self, message: &str);
}

/// What the console loop should do after handling a line of input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Keep reading input.
    Continue,
    /// Stop reading and exit the process.
    Quit,
}
