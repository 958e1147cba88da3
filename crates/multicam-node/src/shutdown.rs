use tokio::sync::watch;

/// Process-wide shutdown signal, set at most once.
///
/// Clones share the same underlying channel; hand a [`ShutdownListener`] to
/// each worker instead of reaching for global state.
#[derive(Clone)]
pub struct Shutdown {
    tx: watch::Sender<bool>,
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    /// Request shutdown. Returns `true` only for the call that set the signal.
    pub fn trigger(&self) -> bool {
        self.tx.send_if_modified(|triggered| {
            if *triggered {
                false
            } else {
                *triggered = true;
                true
            }
        })
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn listener(&self) -> ShutdownListener {
        ShutdownListener {
            rx: self.tx.subscribe(),
        }
    }
}

/// Read side of [`Shutdown`].
#[derive(Clone)]
pub struct ShutdownListener {
    rx: watch::Receiver<bool>,
}

impl ShutdownListener {
    /// Non-blocking check, safe to call from blocking worker threads.
    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once shutdown has been requested.
    pub async fn wait(&mut self) {
        // Err means every sender is gone, nobody can trigger anymore
        let _ = self.rx.wait_for(|triggered| *triggered).await;
    }
}

/// Trigger `shutdown` on Ctrl-C.
pub fn install_signal_handler(shutdown: &Shutdown) -> anyhow::Result<()> {
    let shutdown = shutdown.clone();
    ctrlc::set_handler(move || {
        if shutdown.trigger() {
            log::info!("Shutdown signal received, stopping capture workers...");
        } else {
            log::debug!("Shutdown already in progress");
        }
    })?;
    Ok(())
}
