use std::sync::Arc;

use tokio::sync::{broadcast, oneshot};

/// A cancellation context shared by every task a service spawns.
///
/// Cloning is cheap. The paired [`Handler`] is held by `main`; cancelling it
/// wakes every `done()` future and then waits until the last context clone
/// (and therefore the last task holding one) has been dropped.
#[derive(Clone)]
pub struct Context(Arc<RawContext>);

struct RawContext {
    _sender: oneshot::Sender<()>,
    cancel_receiver: broadcast::Receiver<()>,
}

pub struct Handler {
    recv: oneshot::Receiver<()>,
    cancel_sender: broadcast::Sender<()>,
}

impl Context {
    pub fn new() -> (Self, Handler) {
        let (sender, recv) = oneshot::channel();
        let (cancel_sender, cancel_receiver) = broadcast::channel(1);

        (
            Self(Arc::new(RawContext {
                _sender: sender,
                cancel_receiver,
            })),
            Handler {
                recv,
                cancel_sender,
            },
        )
    }

    /// Resolves when the context is cancelled.
    pub async fn done(&self) {
        let mut recv = self.0.cancel_receiver.resubscribe();
        let _ = recv.recv().await;
    }
}

impl Handler {
    /// Cancel the context and wait for every clone of it to be dropped.
    pub async fn cancel(self) {
        drop(self.cancel_sender);

        let _ = self.recv.await;
    }

    /// Wait for every context clone to be dropped without cancelling.
    pub async fn done(&mut self) {
        let _ = (&mut self.recv).await;
    }
}
