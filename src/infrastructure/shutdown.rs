use tokio::sync::watch;

/// Process-wide stop signal shared by the poll loop and the webhook server.
#[derive(Clone)]
pub struct Shutdown {
    sender: watch::Sender<bool>,
}

#[derive(Clone)]
pub struct ShutdownListener {
    receiver: watch::Receiver<bool>,
}

impl Shutdown {
    pub fn new() -> (Self, ShutdownListener) {
        let (sender, receiver) = watch::channel(false);
        (Self { sender }, ShutdownListener { receiver })
    }

    pub fn subscribe(&self) -> ShutdownListener {
        ShutdownListener {
            receiver: self.sender.subscribe(),
        }
    }

    pub fn trigger(&self) {
        self.sender.send_replace(true);
    }
}

impl ShutdownListener {
    /// Resolves once shutdown was triggered, immediately if it already was.
    pub async fn notified(&mut self) {
        // a closed channel means every sender is gone; nothing can trigger anymore
        let _ = self.receiver.wait_for(|stopped| *stopped).await;
    }

    /// Owned variant for APIs that take a `'static` future, like graceful shutdown.
    pub async fn wait(mut self) {
        self.notified().await;
    }
}

pub fn install_signal_handlers(shutdown: Shutdown) {
    let ctrlc = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!(target: "app", "Ctrl-C received, shutting down");
            ctrlc.trigger();
        }
    });

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let term = shutdown;
        tokio::spawn(async move {
            if let Ok(mut sig) = signal(SignalKind::terminate()) {
                sig.recv().await;
                tracing::info!(target: "app", "SIGTERM received, shutting down");
                term.trigger();
            }
        });
    }
}
