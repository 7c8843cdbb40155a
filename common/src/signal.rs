use std::io;

use tokio::signal::unix::{signal, Signal, SignalKind};

/// Resolves whenever the process receives one of its installed unix
/// signals. `recv` can be awaited repeatedly; services wait once to start
/// a graceful shutdown and a second time to force it.
pub struct Shutdown {
    signals: Vec<Signal>,
}

impl Shutdown {
    /// Installs handlers for sigint and sigterm.
    pub fn new() -> io::Result<Self> {
        Self::of(&[SignalKind::interrupt(), SignalKind::terminate()])
    }

    pub fn of(kinds: &[SignalKind]) -> io::Result<Self> {
        if kinds.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "no signals to listen for",
            ));
        }

        let signals = kinds
            .iter()
            .map(|kind| signal(*kind))
            .collect::<io::Result<Vec<_>>>()?;

        Ok(Self { signals })
    }

    /// Waits for the next delivery of any installed signal.
    pub async fn recv(&mut self) {
        let pending = self
            .signals
            .iter_mut()
            .map(|signal| Box::pin(signal.recv()));
        futures::future::select_all(pending).await;
    }
}
