//! Thin wrappers around the handful of OS calls a `SignalFlag` needs.
//!
//! Everything here works on borrowed descriptors; ownership of the pipe lives in `SignalFlag`.

use std::os::fd::{BorrowedFd, OwnedFd};
use std::time::Duration;

use rustix::event::{poll, PollFd, PollFlags};
use rustix::fs::{fcntl_getfl, fcntl_setfl, OFlags};
use rustix::io::{self, Errno};
use tracing::{debug, trace};

use crate::util;

/// Size of each read when draining the pipe.
const DRAIN_CHUNK: usize = 1024;

/// The byte written to mark the flag as set. Its value is never inspected.
const MARKER: &[u8] = b"\n";

/// Opens a new pipe, returning `(read, write)`. Both ends are created close-on-exec in the same
/// call, so a concurrent `fork`/`exec` can't inherit them.
#[cfg(any(
    target_os = "linux",
    target_os = "android",
    target_os = "freebsd",
    target_os = "netbsd",
    target_os = "openbsd",
    target_os = "dragonfly",
    target_os = "illumos",
    target_os = "solaris"
))]
pub fn pipe() -> io::Result<(OwnedFd, OwnedFd)> {
    rustix::pipe::pipe_with(rustix::pipe::PipeFlags::CLOEXEC)
}

/// Opens a new pipe, returning `(read, write)`.
///
/// There's no `pipe2` here, so the caller has to mark both ends close-on-exec with
/// `set_cloexec` afterwards.
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
pub fn pipe() -> io::Result<(OwnedFd, OwnedFd)> {
    rustix::pipe::pipe()
}

/// Puts the given descriptor into non-blocking mode, keeping its other status flags.
pub fn set_nonblocking(fd: BorrowedFd<'_>) -> io::Result<()> {
    let flags = fcntl_getfl(fd)?;
    if !flags.contains(OFlags::NONBLOCK) {
        fcntl_setfl(fd, flags | OFlags::NONBLOCK)?;
    }
    Ok(())
}

/// Marks the given descriptor close-on-exec.
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
pub fn set_cloexec(fd: BorrowedFd<'_>) -> io::Result<()> {
    use rustix::io::{fcntl_getfd, fcntl_setfd, FdFlags};

    let flags = fcntl_getfd(fd)?;
    if !flags.contains(FdFlags::CLOEXEC) {
        fcntl_setfd(fd, flags | FdFlags::CLOEXEC)?;
    }
    Ok(())
}

/// Polls the given descriptor for readability with a single `poll` call.
///
/// Returns `Ok(true)` if it became ready before the timeout. Timeouts longer than
/// `util::MAX_POLL` are cut short, so `Ok(false)` only means this one call expired.
pub fn poll_readable(fd: BorrowedFd<'_>, timeout: Option<Duration>) -> io::Result<bool> {
    let mut fds = [PollFd::new(&fd, PollFlags::IN)];
    let ready = poll(&mut fds, util::poll_millis(timeout))?;

    // a hangup or error on the read end also counts, the same way select(2) reports it
    Ok(ready > 0 && !fds[0].revents().is_empty())
}

/// Writes a single marker byte, retrying if interrupted.
pub fn write_marker(fd: BorrowedFd<'_>) -> io::Result<()> {
    loop {
        match io::write(fd, MARKER) {
            Ok(_) => return Ok(()),
            Err(err) if err == Errno::INTR => trace!("pipeflag.write_interrupted"),
            Err(err) => return Err(err),
        }
    }
}

/// Reads everything currently buffered on the (non-blocking) read end.
///
/// Never fails: running out of data is the normal way out, and any other error just ends the
/// drain early. The worst case is a flag that still reads as set, which the next clear fixes.
pub fn drain(fd: BorrowedFd<'_>) {
    let mut buf = [0u8; DRAIN_CHUNK];
    loop {
        match io::read(fd, &mut buf) {
            // EOF; can't happen while we hold the write end, but there's nothing left either way
            Ok(0) => return,
            Ok(_) => {}
            Err(err) if err == Errno::INTR => trace!("pipeflag.drain_interrupted"),
            Err(err) if err == Errno::AGAIN || err == Errno::WOULDBLOCK => return,
            Err(err) => {
                debug!("pipeflag.drain_suppressed error={}", err);
                return;
            }
        }
    }
}
