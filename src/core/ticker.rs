// Cancellable fixed-rate ticker on a plain OS thread.
//
// Independent of any async runtime, so the daemon and the plain binaries share
// the same cadence.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::warn;

struct Shared {
    cancelled: AtomicBool,
    // Held by the worker while it runs a job, so `stop` from another thread
    // cannot return until the in-flight job is done.
    gate: Mutex<()>,
    wake: Condvar,
}

pub struct Ticker {
    shared: Arc<Shared>,
    handle: Option<JoinHandle<()>>,
    worker: ThreadId,
}

impl Ticker {
    /// Run `job` now and then every `period` until stopped.
    ///
    /// If a job overruns, the next one starts right away instead of bursting
    /// to catch up.
    pub fn start<F>(name: &str, period: Duration, mut job: F) -> io::Result<Self>
    where
        F: FnMut() + Send + 'static,
    {
        let shared = Arc::new(Shared {
            cancelled: AtomicBool::new(false),
            gate: Mutex::new(()),
            wake: Condvar::new(),
        });
        let worker_shared = Arc::clone(&shared);

        let handle = thread::Builder::new().name(name.to_string()).spawn(move || {
            let shared = worker_shared;
            let mut next = Instant::now();
            let mut gate = shared.gate.lock();
            loop {
                while !shared.cancelled.load(Ordering::Acquire) {
                    if shared.wake.wait_until(&mut gate, next).timed_out() {
                        break;
                    }
                }
                if shared.cancelled.load(Ordering::Acquire) {
                    break;
                }

                job();

                let Some(after) = next.checked_add(period) else {
                    // No representable next deadline: idle until cancelled.
                    while !shared.cancelled.load(Ordering::Acquire) {
                        shared.wake.wait(&mut gate);
                    }
                    break;
                };
                next = after.max(Instant::now());
            }
        })?;

        let worker = handle.thread().id();
        Ok(Self {
            shared,
            handle: Some(handle),
            worker,
        })
    }

    /// Cancel the cadence.
    ///
    /// From any other thread this waits for an in-flight job and the worker
    /// to exit; once it returns no further job will run. Called from inside a
    /// job it only marks the ticker cancelled, and the loop ends after that job.
    pub fn stop(mut self) {
        self.halt();
    }

    fn halt(&mut self) {
        self.shared.cancelled.store(true, Ordering::Release);

        if thread::current().id() == self.worker {
            // Can't join ourselves; the worker sees the flag after this job.
            self.handle.take();
            return;
        }

        {
            let _gate = self.shared.gate.lock();
            self.shared.wake.notify_all();
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("ticker thread panicked");
            }
        }
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.halt();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn first_job_runs_immediately_and_stop_is_final() {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let ticker = Ticker::start("test-ticker", Duration::from_millis(5), move || {
            c.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

        thread::sleep(Duration::from_millis(60));
        ticker.stop();
        let after_stop = count.load(Ordering::SeqCst);
        assert!(after_stop >= 1);

        thread::sleep(Duration::from_millis(40));
        assert_eq!(count.load(Ordering::SeqCst), after_stop);
    }

    #[test]
    fn stop_waits_for_in_flight_job() {
        let done = Arc::new(AtomicBool::new(false));
        let started = Arc::new(AtomicBool::new(false));
        let (d, s) = (Arc::clone(&done), Arc::clone(&started));
        let ticker = Ticker::start("slow-ticker", Duration::from_secs(60), move || {
            s.store(true, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(50));
            d.store(true, Ordering::SeqCst);
        })
        .unwrap();

        while !started.load(Ordering::SeqCst) {
            thread::yield_now();
        }
        ticker.stop();
        assert!(done.load(Ordering::SeqCst));
    }

    #[test]
    fn huge_period_runs_once_then_idles() {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let ticker = Ticker::start("idle-ticker", Duration::MAX, move || {
            c.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

        thread::sleep(Duration::from_millis(50));
        ticker.stop();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dropping_the_ticker_stops_it() {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        {
            let _ticker = Ticker::start("drop-ticker", Duration::from_millis(5), move || {
                c.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
            thread::sleep(Duration::from_millis(20));
        }
        let after_drop = count.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(30));
        assert_eq!(count.load(Ordering::SeqCst), after_drop);
    }
}
