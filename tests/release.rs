//! Kept in its own test binary so no other test can reuse the descriptor numbers in between.

#![cfg(target_os = "linux")]

mod common;

use std::os::fd::{AsFd, AsRawFd};
use std::path::PathBuf;

use pipeflag::SignalFlag;

fn fd_path(fd: i32) -> PathBuf {
    PathBuf::from(format!("/proc/self/fd/{}", fd))
}

#[test]
fn drop_closes_both_ends() {
    common::init_logging();

    let before = std::fs::read_dir("/proc/self/fd").unwrap().count();

    let flag = SignalFlag::new().unwrap();
    let read_fd = flag.as_raw_fd();
    assert!(fd_path(read_fd).exists());
    assert_eq!(std::fs::read_dir("/proc/self/fd").unwrap().count(), before + 2);

    // the close-on-exec bit made it onto the read end
    let flags = rustix::io::fcntl_getfd(flag.as_fd()).unwrap();
    assert!(flags.contains(rustix::io::FdFlags::CLOEXEC));

    flag.signal();
    drop(flag);

    assert!(!fd_path(read_fd).exists());
    assert_eq!(std::fs::read_dir("/proc/self/fd").unwrap().count(), before);
}
