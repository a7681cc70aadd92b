//! A shared on/off admission gate used to throttle consumers from the producer side. The gate
//! holds a single boolean ("back-pressure") behind a mutex/condvar pair. Engaging back-pressure
//! is a plain flag flip. Removing it flips the flag back and broadcasts, releasing every caller
//! parked in `execute()`/`try_execute()` at that instant. A caller hitting an engaged gate parks
//! either indefinitely or up to a blocking limit tracked against an absolute deadline (e.g no
//! drift upon repeated wakeups).
//!
//! Please note the gate is open by default and that the closure always runs outside of the
//! critical section. A blocking limit only bounds the wait for admission: once the closure is
//! admitted it runs to completion no matter what.
use slog::{Discard, Logger};
use std::error;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

#[derive(Debug, PartialEq)]
pub enum Errors {
    ExecutionExpired,
}

impl fmt::Display for Errors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Errors::ExecutionExpired => {
                write!(f, "blocking limit expired while back-pressure was engaged")
            }
        }
    }
}

impl error::Error for Errors {}

/// Gate wrapping a mutex/condvar pair guarding the back-pressure flag plus an atomic counter
/// tracking how many callers are currently parked. The two flip methods are idempotent and may
/// be invoked at any time from any thread.
pub struct GatedExecutor {
    synchro: (Mutex<bool>, Condvar),
    parked: AtomicUsize,
    log: Logger,
}

impl Default for GatedExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl GatedExecutor {
    #[inline]
    pub fn new() -> Self {
        GatedExecutor::with_logger(Logger::root(Discard, o!()))
    }

    #[inline]
    pub fn with_logger(log: Logger) -> Self {
        GatedExecutor {
            synchro: (Mutex::new(false), Condvar::new()),
            parked: AtomicUsize::new(0),
            log,
        }
    }

    #[inline]
    pub fn is_engaged(&self) -> bool {
        *self.synchro.0.lock().unwrap()
    }

    #[inline]
    pub fn pending(&self) -> usize {
        self.parked.load(Ordering::Relaxed)
    }

    pub fn engage_back_pressure(&self) -> () {

        //
        // - flip the flag on under the mutex
        // - nobody to wake up on this edge (parked callers stay parked)
        //
        let mut engaged = self.synchro.0.lock().unwrap();
        if !*engaged {
            debug!(&self.log, "back-pressure engaged");
        }
        *engaged = true;
    }

    pub fn remove_back_pressure(&self) -> () {

        //
        // - flip the flag off under the mutex
        // - broadcast to every parked caller (never notify_one(): any number of
        //   callers may be parked at once)
        // - each one will re-acquire the mutex in turn and re-check the flag
        //
        let mut engaged = self.synchro.0.lock().unwrap();
        if *engaged {
            debug!(
                &self.log,
                "back-pressure removed ({} parked)",
                self.parked.load(Ordering::Relaxed)
            );
        }
        *engaged = false;
        self.synchro.1.notify_all();
    }

    /// Runs the closure as soon as back-pressure allows it, waiting up to the optional blocking
    /// limit. Returns true if and only if the closure ran (its value is discarded). A limit of
    /// `None` parks the caller for as long as back-pressure stays engaged.
    pub fn execute<T, F>(&self, limit: Option<Duration>, f: F) -> bool
    where
        F: FnOnce() -> T,
    {
        if self.admit(limit) {
            let _ = f();
            true
        } else {
            false
        }
    }

    /// Same admission logic as `execute()` except the closure's value is passed back. A bounded
    /// wait elapsing while back-pressure is still engaged fails with `Errors::ExecutionExpired`
    /// (in which case the closure is guaranteed not to have run).
    pub fn try_execute<T, F>(&self, limit: Option<Duration>, f: F) -> Result<T, Errors>
    where
        F: FnOnce() -> T,
    {
        if self.admit(limit) {
            Ok(f())
        } else {
            Err(Errors::ExecutionExpired)
        }
    }

    fn admit(&self, limit: Option<Duration>) -> bool {

        //
        // - fast path: the gate is open, admit right away
        // - the flag is only sampled at this point, e.g a subsequent engage does
        //   not retract an admission
        //
        let mut engaged = self.synchro.0.lock().unwrap();
        if !*engaged {
            return true;
        }

        self.parked.fetch_add(1, Ordering::Relaxed);
        let admitted = match limit {
            None => {

                //
                // - unbounded wait: freeze on the condvar as long as the flag is set
                //   (the loop also absorbs spurious wakeups)
                //
                while *engaged {
                    engaged = self.synchro.1.wait(engaged).unwrap();
                }
                true
            }
            Some(limit) => {

                //
                // - bounded wait: park against an absolute deadline and recompute
                //   the remainder upon each wakeup
                // - a wakeup racing with a fresh engage lands back in the loop and
                //   keeps waiting on whatever time is left
                //
                let deadline = Instant::now() + limit;
                let mut admitted = true;
                while *engaged {
                    let now = Instant::now();
                    if now >= deadline {
                        admitted = false;
                        break;
                    }
                    let (lock, _) = self.synchro
                        .1
                        .wait_timeout(engaged, deadline - now)
                        .unwrap();
                    engaged = lock;
                }
                admitted
            }
        };
        self.parked.fetch_sub(1, Ordering::Relaxed);

        //
        // - the mutex guard drops here, e.g the closure always runs outside of
        //   the critical section
        //
        admitted
    }
}
