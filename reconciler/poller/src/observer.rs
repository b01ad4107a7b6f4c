use console_reconciler_core::Outcome;
use tokio::sync::mpsc;

/// Receives a polling session's notifications.
pub trait Observer<R>: Send + 'static {
    /// Called on every successful tick that observes a non-terminal resource.
    fn update(&mut self, resource: R);

    /// Called when the session settles. Consuming the observer makes this
    /// notification exactly-once.
    fn settled(self, outcome: Outcome);

    /// Called when a tick's fetch fails. The session keeps polling regardless;
    /// observers that do not care about transient errors need not implement
    /// this.
    fn fetch_failed(&mut self, error: &anyhow::Error) {
        let _ = error;
    }
}

/// An [`Observer`] built from closures.
pub struct Callbacks<U, T> {
    on_update: U,
    on_terminal: T,
    on_error: Option<Box<dyn FnMut(&anyhow::Error) + Send>>,
}

/// Session notifications, as delivered over a channel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event<R> {
    Updated(R),
    Settled(Outcome),
}

// === impl Callbacks ===

impl<U, T> Callbacks<U, T> {
    pub fn new(on_update: U, on_terminal: T) -> Self {
        Self {
            on_update,
            on_terminal,
            on_error: None,
        }
    }

    /// Opts into fetch error notifications.
    pub fn on_error(mut self, f: impl FnMut(&anyhow::Error) + Send + 'static) -> Self {
        self.on_error = Some(Box::new(f));
        self
    }
}

impl<R, U, T> Observer<R> for Callbacks<U, T>
where
    U: FnMut(R) + Send + 'static,
    T: FnOnce(Outcome) + Send + 'static,
{
    fn update(&mut self, resource: R) {
        (self.on_update)(resource)
    }

    fn settled(self, outcome: Outcome) {
        (self.on_terminal)(outcome)
    }

    fn fetch_failed(&mut self, error: &anyhow::Error) {
        if let Some(on_error) = self.on_error.as_mut() {
            on_error(error)
        }
    }
}

// === impl Event ===

impl<R: Send + 'static> Observer<R> for mpsc::UnboundedSender<Event<R>> {
    fn update(&mut self, resource: R) {
        // The receiver may have gone away with the view that owned it.
        let _ = self.send(Event::Updated(resource));
    }

    fn settled(self, outcome: Outcome) {
        let _ = self.send(Event::Settled(outcome));
    }
}
