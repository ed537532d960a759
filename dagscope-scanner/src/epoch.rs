//! Session epoch tokens.
//!
//! A reset bumps the shared epoch; work started under an older epoch sees
//! its guard go stale and drops its results.

use std::sync::Arc;
use tokio::sync::watch;

#[derive(Debug, Clone)]
pub struct SessionEpoch {
    current: Arc<watch::Sender<u64>>,
}

impl Default for SessionEpoch {
    fn default() -> Self {
        let (sender, _) = watch::channel(0);
        Self {
            current: Arc::new(sender),
        }
    }
}

impl SessionEpoch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> u64 {
        *self.current.borrow()
    }

    /// Supersedes every outstanding guard and returns the new epoch.
    /// Guards waiting in [`EpochGuard::superseded`] wake immediately.
    pub fn advance(&self) -> u64 {
        let mut next = 0;
        self.current.send_modify(|epoch| {
            *epoch += 1;
            next = *epoch;
        });
        next
    }

    /// Guard bound to the epoch in force right now.
    pub fn guard(&self) -> EpochGuard {
        let current = self.current.subscribe();
        let epoch = *current.borrow();
        EpochGuard { epoch, current }
    }
}

#[derive(Debug, Clone)]
pub struct EpochGuard {
    epoch: u64,
    current: watch::Receiver<u64>,
}

impl EpochGuard {
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn is_current(&self) -> bool {
        *self.current.borrow() == self.epoch
    }

    /// Resolves once the epoch moves past this guard. Never resolves if the
    /// epoch itself has been dropped.
    pub async fn superseded(&self) {
        let mut current = self.current.clone();
        let epoch = self.epoch;
        if current.wait_for(|&now| now != epoch).await.is_err() {
            std::future::pending::<()>().await;
        }
    }

    /// Runs `work` unless the guard goes stale first, in which case `work` is
    /// dropped and `None` returned.
    pub async fn or_superseded<F: Future>(&self, work: F) -> Option<F::Output> {
        tokio::select! {
            biased;
            _ = self.superseded() => None,
            output = work => Some(output),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_goes_stale_after_advance() {
        let epoch = SessionEpoch::new();
        let old = epoch.guard();
        assert!(old.is_current());

        assert_eq!(epoch.advance(), 1);
        assert!(!old.is_current());

        let fresh = epoch.guard();
        assert_eq!(fresh.epoch(), 1);
        assert!(fresh.is_current());
    }

    #[test]
    fn test_clones_share_the_counter() {
        let epoch = SessionEpoch::new();
        let guard = epoch.guard();
        epoch.clone().advance();
        assert!(!guard.is_current());
    }

    #[tokio::test]
    async fn test_advance_interrupts_pending_work() {
        let epoch = SessionEpoch::new();
        let guard = epoch.guard();

        let resetter = epoch.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            resetter.advance();
        });

        let outcome = tokio::time::timeout(
            std::time::Duration::from_secs(5),
            guard.or_superseded(std::future::pending::<()>()),
        )
        .await
        .expect("advance should wake the guard");
        assert_eq!(outcome, None);
    }

    #[tokio::test]
    async fn test_current_guard_lets_work_finish() {
        let epoch = SessionEpoch::new();
        let guard = epoch.guard();
        assert_eq!(guard.or_superseded(async { 7 }).await, Some(7));
    }
}
