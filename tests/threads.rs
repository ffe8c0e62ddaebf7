mod common;

use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

use pipeflag::SignalFlag;

fn shared_flag() -> Arc<SignalFlag> {
    common::init_logging();
    Arc::new(SignalFlag::new().unwrap())
}

#[test]
fn timed_wait_expires() {
    let flag = shared_flag();
    let timeout = Duration::from_millis(200);

    let begin = Instant::now();
    assert!(!flag.wait(Some(timeout)));
    let elapsed = begin.elapsed();

    assert!(elapsed >= timeout, "returned early after {:?}", elapsed);
    // generous slack for loaded CI machines
    assert!(elapsed < timeout + Duration::from_millis(500), "took {:?}", elapsed);
}

#[test]
fn sub_millisecond_wait_still_waits() {
    let flag = shared_flag();
    let timeout = Duration::from_micros(300);

    let begin = Instant::now();
    assert!(!flag.wait(Some(timeout)));
    assert!(begin.elapsed() >= timeout);
}

#[test]
fn signal_wakes_timed_waiter() {
    let flag = shared_flag();

    let signaler = {
        let flag = flag.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_secs(1));
            flag.signal();
        })
    };

    let begin = Instant::now();
    assert!(flag.wait(Some(Duration::from_secs(5))));
    let elapsed = begin.elapsed();
    signaler.join().unwrap();

    assert!(elapsed >= Duration::from_millis(900), "woke early after {:?}", elapsed);
    assert!(elapsed < Duration::from_secs(4), "woke late after {:?}", elapsed);
}

#[test]
fn signal_wakes_every_waiter() {
    let flag = shared_flag();
    let waiters = 4;
    let start = Arc::new(Barrier::new(waiters + 1));

    let handles = (0..waiters)
        .map(|_| {
            let flag = flag.clone();
            let start = start.clone();
            thread::spawn(move || {
                start.wait();
                flag.wait(None)
            })
        })
        .collect::<Vec<_>>();

    start.wait();
    thread::sleep(Duration::from_millis(50));
    flag.signal();

    for handle in handles {
        assert!(handle.join().unwrap());
    }
    // nobody consumed it
    assert!(flag.is_signaled());
}

#[test]
fn concurrent_signal_and_clear() {
    let flag = shared_flag();
    let threads = 8;
    let start = Arc::new(Barrier::new(threads));

    let handles = (0..threads)
        .map(|i| {
            let flag = flag.clone();
            let start = start.clone();
            thread::spawn(move || {
                start.wait();
                for _ in 0..500 {
                    if i % 2 == 0 {
                        flag.signal();
                    } else {
                        flag.clear();
                    }
                }
            })
        })
        .collect::<Vec<_>>();

    for handle in handles {
        handle.join().unwrap();
    }

    // whatever state the storm left behind, one call of each still settles it
    flag.signal();
    assert!(flag.is_signaled());
    flag.clear();
    assert!(!flag.is_signaled());
}

#[test]
fn clear_after_wait_blocks_again() {
    let flag = shared_flag();
    flag.signal();
    assert!(flag.wait(Some(Duration::from_millis(10))));

    flag.clear();
    assert!(!flag.wait(Some(Duration::from_millis(20))));
}
