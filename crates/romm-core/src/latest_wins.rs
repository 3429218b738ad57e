//! Generic latest-wins single-worker primitive.
//!
//! One instantiation per logical job kind — platform fetch, rom page
//! fetch, remote search, diagnostics probe, update check/download, cover
//! loader — none of them a subclass of the others. A single worker thread
//! plus a condvar, generalized to arbitrary `Job`/`Out` types instead of
//! one hardcoded job shape.

use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

struct Shared<Job> {
    pending: Mutex<Option<Job>>,
    condvar: Condvar,
    stop: Mutex<bool>,
}

pub struct LatestWinsWorker<Job, Out> {
    shared: Arc<Shared<Job>>,
    result: Arc<Mutex<Option<Out>>>,
    handle: Option<std::thread::JoinHandle<()>>,
}

impl<Job, Out> LatestWinsWorker<Job, Out>
where
    Job: Send + 'static,
    Out: Send + 'static,
{
    /// `coalesce_window`: after observing a pending job, wait this long
    /// before picking it up, so a burst of `submit` calls collapses to the
    /// most recent one.
    pub fn start(coalesce_window: Duration, work: impl Fn(Job) -> Out + Send + 'static) -> Self {
        let shared = Arc::new(Shared { pending: Mutex::new(None), condvar: Condvar::new(), stop: Mutex::new(false) });
        let result = Arc::new(Mutex::new(None));

        let worker_shared = Arc::clone(&shared);
        let worker_result = Arc::clone(&result);
        let handle = std::thread::spawn(move || loop {
            let job = {
                let mut pending = worker_shared.pending.lock().expect("pending lock poisoned");
                loop {
                    if *worker_shared.stop.lock().expect("stop lock poisoned") {
                        return;
                    }
                    if pending.is_some() {
                        break;
                    }
                    let (guard, timeout) = worker_shared
                        .condvar
                        .wait_timeout(pending, Duration::from_millis(200))
                        .expect("condvar wait poisoned");
                    pending = guard;
                    let _ = timeout;
                }
                if !coalesce_window.is_zero() {
                    drop(pending);
                    std::thread::sleep(coalesce_window);
                    pending = worker_shared.pending.lock().expect("pending lock poisoned");
                }
                pending.take()
            };
            if let Some(job) = job {
                let out = work(job);
                *worker_result.lock().expect("result lock poisoned") = Some(out);
            }
        });

        LatestWinsWorker { shared, result, handle: Some(handle) }
    }

    /// Replace any pending job in the single-slot queue. Never queues more
    /// than one pending job — the previous pending submission, if any, is
    /// silently discarded (cancelled).
    pub fn submit(&self, job: Job) {
        *self.shared.pending.lock().expect("pending lock poisoned") = Some(job);
        self.shared.condvar.notify_one();
    }

    pub fn pending_job(&self) -> bool {
        self.shared.pending.lock().expect("pending lock poisoned").is_some()
    }

    /// Returns and consumes the most recently produced result.
    pub fn poll_result(&self) -> Option<Out> {
        self.result.lock().expect("result lock poisoned").take()
    }

    pub fn stop(&mut self) {
        *self.shared.stop.lock().expect("stop lock poisoned") = true;
        *self.shared.pending.lock().expect("pending lock poisoned") = None;
        self.shared.condvar.notify_one();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl<Job, Out> Drop for LatestWinsWorker<Job, Out> {
    fn drop(&mut self) {
        *self.shared.stop.lock().expect("stop lock poisoned") = true;
        self.shared.condvar.notify_one();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Monotonically increasing generation stamp, used by callers so a main
/// loop can discard a result whose generation is no longer the latest.
#[derive(Debug, Default)]
pub struct GenerationCounter(std::sync::atomic::AtomicU64);

impl GenerationCounter {
    pub fn next(&self) -> u64 {
        self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst) + 1
    }

    pub fn current(&self) -> u64 {
        self.0.load(std::sync::atomic::Ordering::SeqCst)
    }
}
