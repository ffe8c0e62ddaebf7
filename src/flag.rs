//! The pipe-backed [`SignalFlag`] and the errors that can come out of creating one.
//!
//! [`SignalFlag`]: struct.SignalFlag.html

use std::fmt;
use std::io;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, OwnedFd, RawFd};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::{sys, util};

/// A set/clear flag that threads can wait on, backed by a pipe and `poll(2)`.
///
/// The flag is "set" whenever the pipe has unread data in it and "clear" when it's empty. Setting
/// it writes one byte (if one isn't already there), clearing it drains the pipe, and waiting on it
/// asks the kernel to wake the thread when the read end becomes readable. Because the timeout is
/// handed to `poll`, which measures it with the kernel's own timer, a timed wait is not thrown off
/// when somebody changes the system clock or NTP slews it.
///
/// Like a `SignalEvent` with `SignalKind::Manual`, a `SignalFlag` stays set until it is explicitly
/// cleared, so every waiter is released at once and `wait` never consumes the signal.
///
/// Mutations (`signal` and `clear`) are serialized with an internal lock. Queries (`is_signaled`
/// and `wait`) only poll the pipe and never take the lock.
///
/// Both ends of the pipe are closed when the `SignalFlag` is dropped.
///
/// # Example
///
/// ```
/// use pipeflag::SignalFlag;
/// use std::sync::Arc;
/// use std::thread;
/// use std::time::Duration;
///
/// let ready = Arc::new(SignalFlag::new().unwrap());
///
/// let worker = {
///     let ready = ready.clone();
///     thread::spawn(move || {
///         thread::sleep(Duration::from_millis(50));
///         println!("worker finished!");
///         ready.signal();
///     })
/// };
///
/// // the clock could be moved backwards in the meantime and this would still time out on schedule
/// assert!(ready.wait(Some(Duration::from_secs(5))));
/// worker.join().unwrap();
///
/// // waiting doesn't reset the flag
/// assert!(ready.is_signaled());
/// ready.clear();
/// assert!(!ready.is_signaled());
/// ```
pub struct SignalFlag {
    read: OwnedFd,
    // the lock guards the whole check-then-write in `signal` and the drain in `clear`, not just
    // the descriptor
    write: Mutex<OwnedFd>,
}

/// The errors that can be returned when creating a [`SignalFlag`].
///
/// Every variant means the OS couldn't hand out or configure the pipe, usually because the process
/// ran out of file descriptors. Whatever part of the pipe had been opened is closed again before
/// the error is returned.
///
/// [`SignalFlag`]: struct.SignalFlag.html
#[derive(Debug, Error)]
pub enum FlagError {
    /// The pipe itself couldn't be created.
    #[error("failed to create pipe")]
    CreatePipe(#[source] io::Error),
    /// The read end couldn't be switched to non-blocking mode.
    #[error("failed to make pipe non-blocking")]
    NonBlocking(#[source] io::Error),
    /// One of the ends couldn't be marked close-on-exec. Only possible on targets without `pipe2`,
    /// where this takes a separate call after the pipe is opened.
    #[error("failed to set close-on-exec on pipe")]
    CloseOnExec(#[source] io::Error),
}

impl FlagError {
    /// Returns the OS error code behind this error, if there was one.
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            FlagError::CreatePipe(err) | FlagError::NonBlocking(err) | FlagError::CloseOnExec(err) => {
                err.raw_os_error()
            }
        }
    }
}

impl SignalFlag {
    /// Creates a new `SignalFlag` that starts out clear.
    ///
    /// # Errors
    ///
    /// Returns a `FlagError` if the pipe couldn't be created or configured. See [`FlagError`] for
    /// details.
    ///
    /// [`FlagError`]: enum.FlagError.html
    pub fn new() -> Result<SignalFlag, FlagError> {
        let (read, write) = sys::pipe().map_err(|err| FlagError::CreatePipe(err.into()))?;

        // from here on, any early return drops (and closes) both ends
        sys::set_nonblocking(read.as_fd()).map_err(|err| FlagError::NonBlocking(err.into()))?;

        #[cfg(not(any(
            target_os = "linux",
            target_os = "android",
            target_os = "freebsd",
            target_os = "netbsd",
            target_os = "openbsd",
            target_os = "dragonfly",
            target_os = "illumos",
            target_os = "solaris"
        )))]
        {
            sys::set_cloexec(read.as_fd()).map_err(|err| FlagError::CloseOnExec(err.into()))?;
            sys::set_cloexec(write.as_fd()).map_err(|err| FlagError::CloseOnExec(err.into()))?;
        }

        debug!(
            "pipeflag.created read_fd={} write_fd={}",
            read.as_raw_fd(),
            write.as_raw_fd()
        );

        Ok(SignalFlag {
            read,
            write: Mutex::new(write),
        })
    }

    /// Creates a new `SignalFlag` with the given starting state.
    ///
    /// If `init_state` is `true`, the flag starts out set, so that threads that wait on it will
    /// immediately unblock until `clear` is called.
    ///
    /// # Errors
    ///
    /// Same as [`new`].
    ///
    /// [`new`]: #method.new
    pub fn with_state(init_state: bool) -> Result<SignalFlag, FlagError> {
        let flag = SignalFlag::new()?;
        if init_state {
            flag.signal();
        }
        Ok(flag)
    }

    /// Sets the flag, waking every thread currently waiting on it.
    ///
    /// If the flag is already set, this does nothing, so calling it repeatedly without clearing
    /// never piles up data in the pipe. This never blocks.
    pub fn signal(&self) {
        let write = util::guts(self.write.lock());

        // re-check under the lock so two racing signals can't both write
        if self.is_signaled() {
            return;
        }

        if let Err(err) = sys::write_marker(write.as_fd()) {
            // with at most one byte ever in the pipe, the only way here is a broken descriptor
            warn!("pipeflag.signal_failed error={}", err);
        }
    }

    /// Clears the flag, so that threads that wait on it will block again.
    ///
    /// Clearing an already-clear flag does nothing. This never blocks, and never fails: if the pipe
    /// can't be drained, the flag may read as still set until the next `clear`.
    #[doc(alias = "reset")]
    pub fn clear(&self) {
        let _write = util::guts(self.write.lock());
        sys::drain(self.read.as_fd());
    }

    /// Returns whether the flag is currently set.
    ///
    /// This is the same as `wait(Some(Duration::ZERO))`: it polls the pipe without blocking and
    /// without changing its state.
    #[doc(alias = "is_set")]
    #[doc(alias = "isSet")]
    pub fn is_signaled(&self) -> bool {
        self.wait(Some(Duration::ZERO))
    }

    /// Blocks this thread until the flag is set, or until the timeout elapses.
    ///
    /// * `None` waits for as long as it takes.
    /// * `Some(Duration::ZERO)` just checks the flag and returns immediately.
    /// * Anything else waits for at least the given time (give or take a millisecond, since the
    ///   timeout is rounded up to whole milliseconds) before giving up.
    ///
    /// Returns `true` if the flag was set within the timeout, and `false` if it wasn't. The flag
    /// isn't changed by waiting on it, so once it's set every call to `wait` returns `true` until
    /// someone calls `clear`.
    ///
    /// If `poll` is interrupted by a signal handler, the wait resumes with whatever time is left.
    /// Any other error from `poll` is logged and reported as a timeout.
    pub fn wait(&self, timeout: Option<Duration>) -> bool {
        let begin = Instant::now();

        loop {
            let remaining = timeout.map(|t| t.saturating_sub(begin.elapsed()));

            match sys::poll_readable(self.read.as_fd(), remaining) {
                Ok(true) => return true,
                // a clamped poll ran out but there's still time on the clock
                Ok(false) if remaining.map_or(true, |r| r > util::MAX_POLL) => {}
                Ok(false) => return false,
                Err(err) if err == rustix::io::Errno::INTR => {
                    trace!("pipeflag.wait_interrupted");
                }
                Err(err) => {
                    warn!("pipeflag.wait_failed error={}", err);
                    return false;
                }
            }
        }
    }

    /// Blocks this thread until the flag is set, or until the given number of seconds elapses.
    ///
    /// This is `wait` for callers that carry their timeouts around as floating-point seconds.
    /// Negative values (and NaN) are treated as zero, so they check the flag without blocking.
    /// `f64::INFINITY` waits for as long as it takes.
    ///
    /// ```
    /// # let flag = pipeflag::SignalFlag::new().unwrap();
    /// // a deadline that already passed is just a poll
    /// assert!(!flag.wait_secs(-1.0));
    /// flag.signal();
    /// assert!(flag.wait_secs(f64::INFINITY));
    /// ```
    pub fn wait_secs(&self, secs: f64) -> bool {
        self.wait(util::secs_to_timeout(secs))
    }
}

/// Borrows the read end of the pipe, which is readable exactly when the flag is set.
///
/// This lets a `SignalFlag` sit in somebody else's `poll`/`epoll` set alongside other descriptors.
/// Only ever poll it: reading from it clears the flag behind the lock's back, and closing it breaks
/// the flag.
impl AsFd for SignalFlag {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.read.as_fd()
    }
}

impl AsRawFd for SignalFlag {
    fn as_raw_fd(&self) -> RawFd {
        self.read.as_raw_fd()
    }
}

impl fmt::Debug for SignalFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalFlag")
            .field("read_fd", &self.read.as_raw_fd())
            .field("signaled", &self.is_signaled())
            .finish()
    }
}
