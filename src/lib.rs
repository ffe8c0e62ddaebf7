//! A set/clear signal flag for threads, built on a pipe and `poll(2)` instead of a condition
//! variable.
//!
//! This library contains one primitive, [`SignalFlag`]: a flag that one thread can set and clear
//! while other threads wait for it to become set, optionally with a timeout. The state of the flag
//! is whether its pipe has unread data in it, and waiting is done by polling the read end of the
//! pipe. That has two consequences that a `Mutex`/`Condvar` pair doesn't give you:
//!
//! * Timeouts are measured by the kernel's own timer, so a timed wait isn't cut short or stretched
//!   out when the system clock is changed by hand or adjusted by NTP.
//! * The flag is a file descriptor. It can be dropped into an existing `poll`/`epoll` set through
//!   its `AsFd` implementation, and waited on alongside sockets and other pipes.
//!
//! Only Unix-like systems are supported.
//!
//! # Example
//!
//! ```
//! use pipeflag::SignalFlag;
//! use std::time::Duration;
//!
//! let flag = SignalFlag::new().unwrap();
//! assert!(!flag.wait(Some(Duration::from_millis(10))));
//!
//! flag.signal();
//! flag.signal(); // already set, so this is a no-op
//! assert!(flag.wait(None));
//!
//! flag.clear();
//! assert!(!flag.is_signaled());
//! ```
//!
//! [`SignalFlag`]: struct.SignalFlag.html

#![cfg(unix)]
#![deny(warnings, missing_docs)]

mod flag;
mod sys;
mod util;

pub use flag::{FlagError, SignalFlag};
