//! Out-of-band interrupt signal shared between a signal handler and a turn.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Notify;

/// A latching interrupt flag that async code can wait on.
///
/// [`trigger`](Interrupt::trigger) is safe to call from a `ctrlc` handler
/// thread.  Once triggered, the flag stays set until
/// [`clear`](Interrupt::clear) is called, so an interrupt that arrives just
/// before a turn starts waiting is not lost.
///
/// The interrupt also tracks whether a turn is in flight, which lets a
/// signal handler tell "cancel this response" apart from "quit".
#[derive(Debug, Clone, Default)]
pub struct Interrupt {
    flag: Arc<AtomicBool>,
    notify: Arc<Notify>,
    in_turn: Arc<AtomicBool>,
}

/// Marks a turn as in flight until dropped.
#[derive(Debug)]
pub struct TurnGuard<'a> {
    interrupt: &'a Interrupt,
}

impl Drop for TurnGuard<'_> {
    fn drop(&mut self) {
        self.interrupt.in_turn.store(false, Ordering::SeqCst);
    }
}

impl Interrupt {
    /// Creates a new, untriggered interrupt.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the flag and wakes every waiter.
    pub fn trigger(&self) {
        self.flag.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    /// Delivers a signal from outside the program.
    ///
    /// While a turn is in flight this triggers the interrupt and returns
    /// true.  Otherwise nothing is set and false is returned; the caller
    /// should treat the signal as a request to exit.
    pub fn signal(&self) -> bool {
        if self.in_turn() {
            self.trigger();
            true
        } else {
            false
        }
    }

    /// Marks a turn as in flight for as long as the returned guard lives.
    pub fn begin_turn(&self) -> TurnGuard<'_> {
        self.in_turn.store(true, Ordering::SeqCst);
        TurnGuard { interrupt: self }
    }

    /// Returns true while a [`TurnGuard`] is alive.
    pub fn in_turn(&self) -> bool {
        self.in_turn.load(Ordering::SeqCst)
    }

    /// Returns true if the interrupt has been triggered since the last clear.
    pub fn is_triggered(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Clears the flag.
    pub fn clear(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }

    /// Completes once the interrupt is triggered.
    ///
    /// Returns immediately if it already is.
    ///
    /// ```
    /// # tokio_test::block_on(async {
    /// let interrupt = basechat::Interrupt::new();
    /// let handler = interrupt.clone();
    /// std::thread::spawn(move || handler.trigger());
    /// interrupt.triggered().await;
    /// assert!(interrupt.is_triggered());
    /// # });
    /// ```
    pub async fn triggered(&self) {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // Register before checking the flag so a concurrent trigger
            // cannot slip between the check and the wait.
            notified.as_mut().enable();
            if self.is_triggered() {
                return;
            }
            notified.await;
        }
    }
}
