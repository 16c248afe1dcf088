//! Fixed-size worker pool for listener callbacks

use crossbeam_channel::{unbounded, Sender};
use std::io;
use std::thread::{self, JoinHandle};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// A fixed number of threads draining a shared job queue
pub(crate) struct WorkerPool {
    sender: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub(crate) fn new(size: usize, name: &str) -> io::Result<Self> {
        let (sender, receiver) = unbounded::<Job>();
        let mut workers = Vec::with_capacity(size);

        for _ in 0..size.max(1) {
            let receiver = receiver.clone();
            let worker = thread::Builder::new()
                .name(name.to_string())
                .spawn(move || {
                    // Ends once every sender is gone and the queue is drained
                    for job in receiver.iter() {
                        job();
                    }
                })?;
            workers.push(worker);
        }

        Ok(Self {
            sender: Some(sender),
            workers,
        })
    }

    /// Queue `job` without waiting for it to run
    pub(crate) fn execute<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let Some(sender) = &self.sender else {
            return;
        };
        if sender.send(Box::new(job)).is_err() {
            log::warn!("event pool is shut down, dropping job");
        }
    }

    pub(crate) fn size(&self) -> usize {
        self.workers.len()
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.sender.take();

        let current = thread::current().id();
        for worker in self.workers.drain(..) {
            // The pool can be dropped by one of its own jobs
            if worker.thread().id() != current {
                let _ = worker.join();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;
    use std::collections::HashSet;
    use std::time::Duration;

    #[test]
    fn runs_jobs_on_named_workers() {
        let pool = WorkerPool::new(2, "test pool").unwrap();
        let (tx, rx) = bounded(1);

        pool.execute(move || {
            let _ = tx.send(thread::current().name().map(str::to_string));
        });

        let name = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(name.as_deref(), Some("test pool"));
    }

    #[test]
    fn size_is_fixed() {
        let pool = WorkerPool::new(3, "test pool").unwrap();
        assert_eq!(pool.size(), 3);

        let pool = WorkerPool::new(0, "test pool").unwrap();
        assert_eq!(pool.size(), 1);
    }

    #[test]
    fn slow_job_does_not_block_others() {
        let pool = WorkerPool::new(2, "test pool").unwrap();
        let (release_tx, release_rx) = bounded::<()>(0);
        let (done_tx, done_rx) = bounded(1);

        pool.execute(move || {
            let _ = release_rx.recv_timeout(Duration::from_secs(5));
        });
        pool.execute(move || {
            let _ = done_tx.send(());
        });

        assert!(done_rx.recv_timeout(Duration::from_secs(5)).is_ok());
        let _ = release_tx.send(());
    }

    #[test]
    fn drop_drains_queued_jobs() {
        let (tx, rx) = unbounded();
        {
            let pool = WorkerPool::new(2, "test pool").unwrap();
            for i in 0..20 {
                let tx = tx.clone();
                pool.execute(move || {
                    let _ = tx.send(i);
                });
            }
        }

        let seen: HashSet<i32> = rx.try_iter().collect();
        assert_eq!(seen.len(), 20);
    }
}
