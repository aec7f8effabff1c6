//! Service base and scheduler (`spec.md` 4.I).
//!
//! A [`Service`] is anything with `wait_time`/`running_period`/`run`, the
//! same three-method contract `backupservice.cc` implements for its one
//! concrete service. The [`Scheduler`] generalizes that to many services
//! across many sites: a tick loop computes `wait_time()` for everything
//! registered, pushes ready services onto a shared bounded FIFO, and a fixed
//! pool of worker threads drains it — plain `std::thread`, matching the
//! teacher's own worker-per-connection style (`bins/obsidian`) rather than
//! an async runtime or a thread-pool crate the teacher never pulls in.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("scheduler queue is full, dropping run request for '{0}'")]
    QueueFull(String),
}

/// Anything the scheduler can run on a cadence (`spec.md` 4.I).
pub trait Service: Send + Sync {
    fn name(&self) -> &str;

    /// Seconds until this service should run next. `<= 0` means "ready now".
    fn wait_time(&self) -> i64;

    /// The cadence this service runs at, in seconds.
    fn running_period(&self) -> i64;

    fn run(&self);
}

struct SharedQueue {
    items: Mutex<VecDeque<usize>>,
    condvar: Condvar,
    capacity: usize,
}

impl SharedQueue {
    fn push(&self, index: usize, name: &str) -> Result<(), ServiceError> {
        let mut items = self.items.lock().unwrap();
        if items.len() >= self.capacity {
            return Err(ServiceError::QueueFull(name.to_string()));
        }
        items.push_back(index);
        self.condvar.notify_one();
        Ok(())
    }

    fn pop_blocking(&self, stopping: &AtomicBool) -> Option<usize> {
        let mut items = self.items.lock().unwrap();
        loop {
            if let Some(index) = items.pop_front() {
                return Some(index);
            }
            if stopping.load(Ordering::Acquire) {
                return None;
            }
            let (guard, timeout) = self.condvar.wait_timeout(items, Duration::from_millis(200)).unwrap();
            items = guard;
            if timeout.timed_out() && stopping.load(Ordering::Acquire) {
                return None;
            }
        }
    }
}

/// Runs a fixed pool of worker threads draining a shared FIFO, fed by a
/// ~1s tick loop that asks every registered service whether it's ready.
pub struct Scheduler {
    services: Arc<Vec<Arc<dyn Service>>>,
    queued: Arc<Vec<AtomicBool>>,
    queue: Arc<SharedQueue>,
    stopping: Arc<AtomicBool>,
    tick_period: Duration,
    tick_handle: Option<JoinHandle<()>>,
    workers: Vec<JoinHandle<()>>,
}

impl Scheduler {
    pub fn new(services: Vec<Arc<dyn Service>>, queue_capacity: usize) -> Self {
        let queued = (0..services.len()).map(|_| AtomicBool::new(false)).collect();
        Scheduler {
            services: Arc::new(services),
            queued: Arc::new(queued),
            queue: Arc::new(SharedQueue {
                items: Mutex::new(VecDeque::new()),
                condvar: Condvar::new(),
                capacity: queue_capacity,
            }),
            stopping: Arc::new(AtomicBool::new(false)),
            tick_period: Duration::from_secs(1),
            tick_handle: None,
            workers: Vec::new(),
        }
    }

    /// Spawns the tick thread and the worker pool. Panics if called twice.
    pub fn start(&mut self, worker_count: usize) {
        assert!(self.tick_handle.is_none(), "scheduler already started");

        let services = Arc::clone(&self.services);
        let queued = Arc::clone(&self.queued);
        let queue = Arc::clone(&self.queue);
        let stopping = Arc::clone(&self.stopping);
        let tick_period = self.tick_period;

        self.tick_handle = Some(std::thread::spawn(move || {
            while !stopping.load(Ordering::Acquire) {
                for (index, service) in services.iter().enumerate() {
                    if service.wait_time() > 0 {
                        continue;
                    }
                    if queued[index].swap(true, Ordering::AcqRel) {
                        continue; // already queued; never enqueue twice.
                    }
                    if let Err(e) = queue.push(index, service.name()) {
                        tracing::warn!(service = service.name(), error = %e, "dropping scheduler tick");
                        queued[index].store(false, Ordering::Release);
                    }
                }
                std::thread::sleep(tick_period);
            }
        }));

        for _ in 0..worker_count {
            let services = Arc::clone(&self.services);
            let queued = Arc::clone(&self.queued);
            let queue = Arc::clone(&self.queue);
            let stopping = Arc::clone(&self.stopping);
            self.workers.push(std::thread::spawn(move || {
                while let Some(index) = queue.pop_blocking(&stopping) {
                    let service = &services[index];
                    tracing::debug!(service = service.name(), "running scheduled service");
                    service.run();
                    queued[index].store(false, Ordering::Release);
                }
            }));
        }
    }

    /// Cooperative shutdown: stop accepting new work, wake every worker, and
    /// join everything (`spec.md` 4.I `stop_service`).
    pub fn stop_service(&mut self) {
        self.stopping.store(true, Ordering::Release);
        self.queue.condvar.notify_all();
        if let Some(handle) = self.tick_handle.take() {
            let _ = handle.join();
        }
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct CountingService {
        name: String,
        ready: AtomicBool,
        runs: Arc<AtomicUsize>,
    }

    impl Service for CountingService {
        fn name(&self) -> &str {
            &self.name
        }
        fn wait_time(&self) -> i64 {
            if self.ready.load(Ordering::Acquire) {
                -1
            } else {
                1000
            }
        }
        fn running_period(&self) -> i64 {
            60
        }
        fn run(&self) {
            self.runs.fetch_add(1, Ordering::SeqCst);
            self.ready.store(false, Ordering::Release);
        }
    }

    #[test]
    fn ready_service_runs_exactly_once_per_readiness() {
        let runs = Arc::new(AtomicUsize::new(0));
        let service: Arc<dyn Service> = Arc::new(CountingService {
            name: "test".into(),
            ready: AtomicBool::new(true),
            runs: Arc::clone(&runs),
        });

        let mut scheduler = Scheduler::new(vec![service], 10);
        scheduler.start(2);
        std::thread::sleep(Duration::from_millis(600));
        scheduler.stop_service();

        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn queue_full_drops_rather_than_blocks() {
        let queue = SharedQueue {
            items: Mutex::new(VecDeque::new()),
            condvar: Condvar::new(),
            capacity: 1,
        };
        assert!(queue.push(0, "a").is_ok());
        assert!(matches!(queue.push(1, "b"), Err(ServiceError::QueueFull(_))));
    }

    #[test]
    fn stop_service_joins_cleanly_with_no_ready_work() {
        let service: Arc<dyn Service> = Arc::new(CountingService {
            name: "idle".into(),
            ready: AtomicBool::new(false),
            runs: Arc::new(AtomicUsize::new(0)),
        });
        let mut scheduler = Scheduler::new(vec![service], 10);
        scheduler.start(1);
        std::thread::sleep(Duration::from_millis(50));
        scheduler.stop_service();
    }
}
