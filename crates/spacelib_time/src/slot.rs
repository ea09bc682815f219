//! Single-slot coalescing channels.
//!
//! A slot holds at most one pending value. Writers never wait: they either
//! overwrite whatever is pending ([`SlotSender::replace`]) or get the value
//! handed back when the slot is occupied ([`SlotSender::offer`]). Either side
//! may close the slot. A value that was pending when the sending side closed
//! stays readable, after which the receiver observes end-of-stream.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Notify;

struct State<T> {
    value: Option<T>,
    closed: bool,
}

struct Shared<T> {
    state: Mutex<State<T>>,
    value_ready: Notify,
    closed: Notify,
    senders: AtomicUsize,
}

impl<T> Shared<T> {
    fn lock(&self) -> MutexGuard<'_, State<T>> {
        // Only this module touches the state and it never panics while holding the guard.
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Closes the slot, returning `true` only for the call that closed it.
    fn close(&self) -> bool {
        {
            let mut state = self.lock();
            if state.closed {
                return false;
            }
            state.closed = true;
        }
        self.value_ready.notify_one();
        self.closed.notify_waiters();
        true
    }
}

/// Error returned by [`SlotSender::offer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum OfferError<T> {
    /// A value is already pending; the offered value is handed back.
    #[error("slot already holds an unread value")]
    Full(T),
    /// The receiving side is gone.
    #[error("slot is closed")]
    Closed(T),
}

/// Error returned by [`SlotSender::replace`] when the slot is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("slot is closed")]
pub struct SlotClosed<T>(pub T);

/// Error returned by [`SlotReceiver::try_recv`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TryRecvError {
    #[error("no value pending")]
    Empty,
    #[error("slot is closed")]
    Closed,
}

/// Creates a new empty slot.
pub fn slot<T>() -> (SlotSender<T>, SlotReceiver<T>) {
    let shared = Arc::new(Shared {
        state: Mutex::new(State {
            value: None,
            closed: false,
        }),
        value_ready: Notify::new(),
        closed: Notify::new(),
        senders: AtomicUsize::new(1),
    });
    (
        SlotSender {
            shared: shared.clone(),
        },
        SlotReceiver { shared },
    )
}

/// Writing half of a slot. Cloneable; the slot closes when the last sender drops.
pub struct SlotSender<T> {
    shared: Arc<Shared<T>>,
}

impl<T> SlotSender<T> {
    /// Places `value` only if nothing is pending.
    pub fn offer(&self, value: T) -> Result<(), OfferError<T>> {
        {
            let mut state = self.shared.lock();
            if state.closed {
                return Err(OfferError::Closed(value));
            }
            if state.value.is_some() {
                return Err(OfferError::Full(value));
            }
            state.value = Some(value);
        }
        self.shared.value_ready.notify_one();
        Ok(())
    }

    /// Places `value`, overwriting and returning any unread value.
    pub fn replace(&self, value: T) -> Result<Option<T>, SlotClosed<T>> {
        let displaced = {
            let mut state = self.shared.lock();
            if state.closed {
                return Err(SlotClosed(value));
            }
            state.value.replace(value)
        };
        self.shared.value_ready.notify_one();
        Ok(displaced)
    }

    /// Returns `true` when no value is waiting to be read.
    pub fn is_empty(&self) -> bool {
        self.shared.lock().value.is_none()
    }

    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }

    /// Closes the slot for both sides. Returns `false` if it was already closed.
    pub fn close(&self) -> bool {
        self.shared.close()
    }

    /// Resolves once the slot is closed by either side.
    pub async fn closed(&self) {
        loop {
            let notified = self.shared.closed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            let closed = self.shared.is_closed();
            if closed {
                return;
            }
            notified.await;
        }
    }
}

impl<T> Clone for SlotSender<T> {
    fn clone(&self) -> Self {
        self.shared.senders.fetch_add(1, Ordering::AcqRel);
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T> Drop for SlotSender<T> {
    fn drop(&mut self) {
        if self.shared.senders.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.shared.close();
        }
    }
}

impl<T> fmt::Debug for SlotSender<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlotSender")
            .field("closed", &self.is_closed())
            .field("empty", &self.is_empty())
            .finish()
    }
}

/// Reading half of a slot. Dropping it closes the slot.
pub struct SlotReceiver<T> {
    shared: Arc<Shared<T>>,
}

impl<T> SlotReceiver<T> {
    /// Waits for the pending value. Returns `None` once the slot is closed and drained.
    pub async fn recv(&mut self) -> Option<T> {
        loop {
            let notified = self.shared.value_ready.notified();
            {
                let mut state = self.shared.lock();
                if let Some(value) = state.value.take() {
                    return Some(value);
                }
                if state.closed {
                    return None;
                }
            }
            notified.await;
        }
    }

    pub fn try_recv(&mut self) -> Result<T, TryRecvError> {
        let mut state = self.shared.lock();
        match state.value.take() {
            Some(value) => Ok(value),
            None if state.closed => Err(TryRecvError::Closed),
            None => Err(TryRecvError::Empty),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }

    /// Closes the slot. Writers see the closure on their next attempt.
    pub fn close(&mut self) -> bool {
        self.shared.close()
    }

    /// A handle that can close this slot without being able to read or write it.
    pub fn closer(&self) -> SlotCloser<T> {
        SlotCloser {
            shared: self.shared.clone(),
        }
    }
}

impl<T> Drop for SlotReceiver<T> {
    fn drop(&mut self) {
        self.shared.close();
    }
}

impl<T> fmt::Debug for SlotReceiver<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlotReceiver")
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Close-only handle to a slot.
pub struct SlotCloser<T> {
    shared: Arc<Shared<T>>,
}

impl<T> SlotCloser<T> {
    pub fn close(&self) -> bool {
        self.shared.close()
    }

    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }
}
