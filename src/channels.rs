use crate::prelude::*;

#[derive(Debug, Clone)]
pub struct Channels {
    pub shutdown: broadcast::Sender<()>,
}

impl Default for Channels {
    fn default() -> Self {
        Self::new()
    }
}

impl Channels {
    pub fn new() -> Self {
        Self {
            shutdown: Self::channel(),
        }
    }

    fn channel<T: Clone>() -> broadcast::Sender<T> {
        broadcast::channel(16).0
    }

    /// Cooperative cancellation entry point: interrupts the current wait of
    /// every loop subscribed to the shutdown channel. An exchange already in
    /// flight is left to complete or time out on its own.
    pub fn request_shutdown(&self) {
        let _ = self.shutdown.send(());
    }
}
