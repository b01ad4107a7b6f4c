use std::fmt;

/// A status after which no further provisioning change is expected.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Terminal {
    Success,
    Failure,
}

/// How a tracked resource settled.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Outcome {
    Success,
    Failure,

    /// The resource no longer exists. Deletion is a valid terminal state, not
    /// an error.
    Deleted,
}

/// Maps a resource family's status values onto terminal states.
///
/// Implementations own the concrete vocabulary; callers of this trait never
/// inspect raw status values themselves. Any `Fn(&S) -> Option<Terminal>`
/// closure is a classifier.
pub trait Classify<S: ?Sized>: Send + Sync + 'static {
    /// Returns the terminal state `status` represents, if any.
    fn classify(&self, status: &S) -> Option<Terminal>;

    /// An absent status means the resource has not been observed yet, which is
    /// never terminal.
    fn is_terminal(&self, status: Option<&S>) -> bool {
        status.and_then(|s| self.classify(s)).is_some()
    }
}

/// Fixed sets of status values considered terminal-success and
/// terminal-failure.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TerminalStates<S> {
    success: Vec<S>,
    failure: Vec<S>,
}

// === impl Terminal ===

impl Terminal {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
        }
    }
}

impl fmt::Display for Terminal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// === impl Outcome ===

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Deleted => "deleted",
        }
    }
}

impl From<Terminal> for Outcome {
    fn from(terminal: Terminal) -> Self {
        match terminal {
            Terminal::Success => Self::Success,
            Terminal::Failure => Self::Failure,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// === impl Classify ===

impl<S, F> Classify<S> for F
where
    S: ?Sized,
    F: Fn(&S) -> Option<Terminal> + Send + Sync + 'static,
{
    fn classify(&self, status: &S) -> Option<Terminal> {
        (self)(status)
    }
}

// === impl TerminalStates ===

impl<S> TerminalStates<S> {
    pub fn new(
        success: impl IntoIterator<Item = S>,
        failure: impl IntoIterator<Item = S>,
    ) -> Self {
        Self {
            success: success.into_iter().collect(),
            failure: failure.into_iter().collect(),
        }
    }

    pub fn with_success(mut self, status: S) -> Self {
        self.success.push(status);
        self
    }

    pub fn with_failure(mut self, status: S) -> Self {
        self.failure.push(status);
        self
    }
}

impl<S> Classify<S> for TerminalStates<S>
where
    S: PartialEq + Send + Sync + 'static,
{
    fn classify(&self, status: &S) -> Option<Terminal> {
        if self.success.contains(status) {
            return Some(Terminal::Success);
        }
        if self.failure.contains(status) {
            return Some(Terminal::Failure);
        }
        None
    }
}
