//! `UrlPipe` — composes the ring buffer, mutex set, and file lock into a
//! one-way blocking transport (`spec.md` 4.D).

use crate::mutex::{Mutex, MutexError, MutexSet, WaitResult};
use crate::ring::RingView;
use sitemapgen_events::UrlRecord;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum PipeError {
    #[error("pipe resource unavailable: {0}")]
    Mutex(#[from] MutexError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("ring buffer layout invalid: {0}")]
    BadLayout(&'static str),
}

#[derive(Clone, Debug)]
pub struct PipeConfig {
    pub app_name: String,
    pub run_dir: PathBuf,
    /// Distinguishes multiple pipes under one app (`spec.md` 6: shared memory
    /// is named `GOOGLE_SITEMAP_GENERATOR_SHM_<pipe-purpose>`).
    pub pipe_name: String,
    pub capacity: usize,
    pub send_wait_ms: i64,
    pub retrieve_period: Duration,
}

impl PipeConfig {
    fn shm_segment_name(&self) -> String {
        format!("GOOGLE_SITEMAP_GENERATOR_SHM_{}", self.pipe_name)
    }
}

const RW_MUTEX_NAME: &str = "RW";
const NOTIFY_MUTEX_NAME: &str = "NOTIFY";

/// The daemon side: unique, blocks on `receive()`.
pub struct PipeReceiver {
    config: PipeConfig,
    mutex_set: MutexSet,
    rw: Mutex,
    notify: Mutex,
    _shm: sitemapgen_shm::ShmSegmentMut,
    ring: RingView<UrlRecord>,
    scratch: Vec<UrlRecord>,
}

impl PipeReceiver {
    pub fn init(config: PipeConfig) -> Result<Self, PipeError> {
        let mut mutex_set = MutexSet::new(config.app_name.clone(), config.run_dir.clone(), true);
        mutex_set.register(RW_MUTEX_NAME);
        mutex_set.register(NOTIFY_MUTEX_NAME);
        mutex_set.load()?;

        let rw = mutex_set.get(RW_MUTEX_NAME, true, false)?;
        let notify = mutex_set.get(NOTIFY_MUTEX_NAME, false, true)?;

        let path = sitemapgen_shm::segment_path(&config.run_dir, &config.shm_segment_name());
        let bytes = RingView::<UrlRecord>::bytes_needed(config.capacity);
        let mut shm = sitemapgen_shm::ShmSegmentMut::create(&path, bytes)?;
        let ring = unsafe { RingView::<UrlRecord>::init(shm.as_mut_ptr(), config.capacity) };

        debug!(capacity = config.capacity, "pipe receiver initialized");
        Ok(PipeReceiver { config, mutex_set, rw, notify, _shm: shm, ring, scratch: Vec::new() })
    }

    /// Blocks until at least one record is available, then returns a slice
    /// owned by this pipe (valid until the next call to `receive`).
    ///
    /// Copies records out while holding the RW mutex and releases it before
    /// returning, so sender throughput is never gated on the caller's
    /// per-record processing (`spec.md` 4.D).
    pub fn receive(&mut self) -> Result<&[UrlRecord], PipeError> {
        match self.notify.wait(-1) {
            WaitResult::Ok => {}
            WaitResult::Invalid => return Err(PipeError::Mutex(MutexError::Invalid)),
            WaitResult::Timeout => unreachable!("infinite wait cannot time out"),
        }
        match self.rw.wait(-1) {
            WaitResult::Ok => {}
            WaitResult::Invalid => return Err(PipeError::Mutex(MutexError::Invalid)),
            WaitResult::Timeout => unreachable!("infinite wait cannot time out"),
        }

        let avail = self.ring.count();
        self.ring.copy_available(&mut self.scratch, avail);
        self.ring.consume(avail);
        self.rw.post();

        Ok(&self.scratch)
    }

    /// Destroys the mutex set and the shared memory segment.
    pub fn teardown(mut self) {
        let path = sitemapgen_shm::segment_path(&self.config.run_dir, &self.config.shm_segment_name());
        self.mutex_set.destroy();
        let _ = sitemapgen_shm::destroy_segment(&path);
    }
}

/// The webserver-plugin side: may be multi-process, each with its own
/// `PipeSender`.
pub struct PipeSender {
    config: PipeConfig,
    attached: Option<AttachedSender>,
    last_attach_attempt: Option<Instant>,
}

struct AttachedSender {
    _mutex_set: MutexSet,
    rw: Mutex,
    notify: Mutex,
    _shm: sitemapgen_shm::ShmSegmentAttach,
    ring: RingView<UrlRecord>,
}

impl PipeSender {
    pub fn new(config: PipeConfig) -> Self {
        PipeSender { config, attached: None, last_attach_attempt: None }
    }

    fn try_attach(&mut self) {
        let now = Instant::now();
        if let Some(last) = self.last_attach_attempt {
            if now.duration_since(last) < self.config.retrieve_period {
                return;
            }
        }
        self.last_attach_attempt = Some(now);

        let result = (|| -> Result<AttachedSender, PipeError> {
            let mut mutex_set = MutexSet::new(self.config.app_name.clone(), self.config.run_dir.clone(), false);
            mutex_set.register(RW_MUTEX_NAME);
            mutex_set.register(NOTIFY_MUTEX_NAME);
            mutex_set.load()?;
            let rw = mutex_set.get(RW_MUTEX_NAME, false, false)?;
            let notify = mutex_set.get(NOTIFY_MUTEX_NAME, false, true)?;

            let path = sitemapgen_shm::segment_path(&self.config.run_dir, &self.config.shm_segment_name());
            let mut shm = sitemapgen_shm::ShmSegmentAttach::attach(&path)?;
            let ring = unsafe { RingView::<UrlRecord>::attach(shm.as_mut_ptr()).map_err(PipeError::BadLayout)? };

            Ok(AttachedSender { _mutex_set: mutex_set, rw, notify, _shm: shm, ring })
        })();

        match result {
            Ok(attached) => self.attached = Some(attached),
            Err(e) => {
                warn!(error = %e, "pipe sender failed to attach to receiver resources");
                self.attached = None;
            }
        }
    }

    /// Sends up to `records.len()` records. Returns the number actually
    /// written: `0` on timeout or when the receiver's resources are
    /// unavailable (the caller must retry; records are not queued
    /// internally — see `DESIGN.md`'s open-question resolution).
    pub fn send(&mut self, records: &[UrlRecord]) -> Result<usize, PipeError> {
        if self.attached.is_none() {
            self.try_attach();
        }
        let Some(attached) = self.attached.as_mut() else {
            return Ok(0);
        };

        match attached.rw.wait(self.config.send_wait_ms) {
            WaitResult::Ok => {}
            WaitResult::Timeout => return Ok(0),
            WaitResult::Invalid => {
                self.attached = None;
                return Ok(0);
            }
        }

        let written = attached.ring.write(records, records.len());
        attached.rw.post();
        attached.notify.post();
        Ok(written)
    }

    /// Senders never own the shared resources; detaching is just dropping
    /// the handles.
    pub fn detach(&mut self) {
        self.attached = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::SystemTime;

    fn test_config(tag: &str) -> PipeConfig {
        let ts = SystemTime::now().duration_since(std::time::UNIX_EPOCH).unwrap().as_nanos();
        PipeConfig {
            app_name: format!("sitemapgen_test_{tag}_{ts}"),
            run_dir: std::env::temp_dir().join(format!("sitemapgen_pipe_test_{tag}_{ts}")),
            pipe_name: "urls".to_string(),
            capacity: 16,
            send_wait_ms: 200,
            retrieve_period: Duration::from_secs(60),
        }
    }

    #[test]
    fn single_write_single_read() {
        let cfg = test_config("single");
        let mut receiver = PipeReceiver::init(cfg.clone()).unwrap();
        let mut sender = PipeSender::new(cfg);

        let record = UrlRecord::new("/a", "http://h", "site", 200, 1, 2, 3, 4);
        let written = sender.send(&[record]).unwrap();
        assert_eq!(written, 1);

        let received = receiver.receive().unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].url(), "/a");

        receiver.teardown();
    }

    #[test]
    fn send_before_receiver_exists_returns_zero() {
        let cfg = test_config("no-receiver");
        let mut sender = PipeSender::new(cfg);
        let record = UrlRecord::new("/a", "h", "s", 200, 0, 0, 0, 0);
        let written = sender.send(&[record]).unwrap();
        assert_eq!(written, 0);
    }

    #[test]
    fn multi_sender_interleaving_preserves_each_senders_order() {
        let cfg = test_config("multi");
        let mut receiver = PipeReceiver::init(cfg.clone()).unwrap();
        let mut s1 = PipeSender::new(cfg.clone());
        let mut s2 = PipeSender::new(cfg);

        let r = |n: i64| UrlRecord::new(&format!("/s1/{n}"), "h", "s", 200, n, 0, 0, 0);
        let r2 = |n: i64| UrlRecord::new(&format!("/s2/{n}"), "h", "s", 200, n, 0, 0, 0);

        s1.send(&[r(1), r(2)]).unwrap();
        s2.send(&[r2(1)]).unwrap();
        s1.send(&[r(3)]).unwrap();

        let received = receiver.receive().unwrap();
        let s1_urls: Vec<_> = received.iter().map(|r| r.url()).filter(|u| u.starts_with("/s1")).collect();
        assert_eq!(s1_urls, vec!["/s1/1", "/s1/2", "/s1/3"]);
        assert!(received.iter().any(|r| r.url() == "/s2/1"));

        receiver.teardown();
    }
}
