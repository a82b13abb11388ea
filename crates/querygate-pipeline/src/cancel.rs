//! Cooperative cancellation for pipeline runs
//!
//! A [`CancelHandle`] owns the sending side of a `watch` channel; each
//! [`CancelToken`] observes it. The controller checks the token before every
//! external call, so a call already dispatched always runs to completion.

use tokio::sync::watch;

/// Requests cancellation of the runs holding its tokens
#[derive(Debug)]
pub struct CancelHandle {
    sender: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self { sender }
    }

    /// A token observing this handle
    pub fn token(&self) -> CancelToken {
        CancelToken {
            receiver: self.sender.subscribe(),
        }
    }

    /// Cancel every run holding a token from this handle
    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.sender.borrow()
    }
}

impl Default for CancelHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Observes a [`CancelHandle`]
#[derive(Debug, Clone)]
pub struct CancelToken {
    receiver: watch::Receiver<bool>,
}

impl CancelToken {
    /// A token that is never cancelled
    pub fn never() -> Self {
        let (_, receiver) = watch::channel(false);
        Self { receiver }
    }

    /// Whether cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        *self.receiver.borrow()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_sees_cancel() {
        let handle = CancelHandle::new();
        let token = handle.token();
        let copy = token.clone();

        assert!(!token.is_cancelled());
        handle.cancel();
        assert!(token.is_cancelled());
        assert!(copy.is_cancelled());
        assert!(handle.is_cancelled());
    }

    #[test]
    fn late_token_sees_earlier_cancel() {
        let handle = CancelHandle::new();
        handle.cancel();
        assert!(handle.token().is_cancelled());
    }

    #[test]
    fn never_token_outlives_its_sender() {
        assert!(!CancelToken::never().is_cancelled());
    }
}
