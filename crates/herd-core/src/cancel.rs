//! Cancellation token threaded through every public entry point.
//!
//! Built on a `watch` channel: the source flips the flag once, every token
//! clone observes it at its next suspension point.

use crate::{Error, Result};
use std::future::Future;
use tokio::sync::watch;

/// Owning side of a cancellation signal.
#[derive(Debug)]
pub struct CancelSource {
    tx: watch::Sender<bool>,
    rx: watch::Receiver<bool>,
}

impl CancelSource {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self { tx, rx }
    }

    pub fn token(&self) -> CancelToken {
        CancelToken {
            rx: self.rx.clone(),
        }
    }

    /// Signal cancellation. Idempotent.
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }
}

impl Default for CancelSource {
    fn default() -> Self {
        Self::new()
    }
}

/// Observing side of a cancellation signal. Cheap to clone.
#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    /// A token that never fires.
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self { rx }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// `Err(Error::Cancelled)` if the token has fired.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Resolves once the token fires. Pending forever if the source is
    /// dropped without cancelling.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }

    /// Run `fut` unless the token fires first.
    pub async fn run<F, T>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        self.check()?;
        tokio::select! {
            biased;
            _ = self.cancelled() => Err(Error::Cancelled),
            out = fut => out,
        }
    }

    /// Sleep for `duration` unless the token fires first.
    pub async fn sleep(&self, duration: std::time::Duration) -> Result<()> {
        self.run(async {
            tokio::time::sleep(duration).await;
            Ok(())
        })
        .await
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::never()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_never_token() {
        let token = CancelToken::never();
        assert!(!token.is_cancelled());
        assert!(token.check().is_ok());
        let out = token.run(async { Ok(5) }).await.unwrap();
        assert_eq!(out, 5);
    }

    #[tokio::test]
    async fn test_cancel_interrupts_sleep() {
        let source = CancelSource::new();
        let token = source.token();

        let handle = tokio::spawn(async move { token.sleep(Duration::from_secs(30)).await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        source.cancel();

        let result = tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("sleep should abort promptly")
            .unwrap();
        assert!(matches!(result, Err(Error::Cancelled)));
    }

    #[tokio::test]
    async fn test_already_cancelled() {
        let source = CancelSource::new();
        source.cancel();
        let token = source.token();
        assert!(token.is_cancelled());
        assert!(matches!(token.check(), Err(Error::Cancelled)));
        let result = token.run(async { Ok(1) }).await;
        assert!(matches!(result, Err(Error::Cancelled)));
    }

    #[tokio::test]
    async fn test_dropped_source_never_fires() {
        let token = CancelSource::new().token();
        let result = tokio::time::timeout(Duration::from_millis(50), token.cancelled()).await;
        assert!(result.is_err());
    }
}
