use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};

type Job = Box<dyn FnOnce() + Send + 'static>;

struct Shared<T> {
    slot: Mutex<Option<T>>,
    ready: Condvar,
}

/// Write end of a one-shot result slot. Fulfilled exactly once by the
/// worker that ran the job.
pub(crate) struct Promise<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Promise<T> {
    fn fulfill(self, value: T) {
        let mut slot = self.shared.slot.lock().unwrap();
        *slot = Some(value);
        self.shared.ready.notify_all();
    }
}

/// Read end of a one-shot result slot. `wait` blocks the calling thread
/// until the producing job fulfills the promise; the handle is `Send`, so
/// any thread may be the one that blocks.
///
/// There is no timeout: a job that never finishes blocks its waiter
/// indefinitely.
pub struct JobHandle<T> {
    shared: Arc<Shared<T>>,
}

impl<T> JobHandle<T> {
    pub fn wait(self) -> T {
        let mut slot = self.shared.slot.lock().unwrap();
        loop {
            if let Some(value) = slot.take() {
                return value;
            }
            slot = self.shared.ready.wait(slot).unwrap();
        }
    }
}

fn promise_pair<T>() -> (Promise<T>, JobHandle<T>) {
    let shared = Arc::new(Shared {
        slot: Mutex::new(None),
        ready: Condvar::new(),
    });

    (
        Promise {
            shared: shared.clone(),
        },
        JobHandle { shared },
    )
}

/// Fixed-size pool of compression workers. Workers pull jobs from a shared
/// channel until the pool shuts down; shutdown drains the queue, it never
/// cancels queued or running jobs.
///
/// A width of 0 means no workers at all: jobs run inline on the submitting
/// thread, which makes test runs deterministic.
pub struct JobPool {
    sender: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
}

impl JobPool {
    pub fn new(worker_count: usize) -> JobPool {
        if worker_count == 0 {
            return JobPool {
                sender: None,
                workers: Vec::new(),
            };
        }

        let (sender, receiver) = channel::<Job>();
        let receiver = Arc::new(Mutex::new(receiver));

        let mut workers = Vec::with_capacity(worker_count);
        for _ in 0..worker_count {
            let receiver = receiver.clone();
            workers.push(thread::spawn(move || worker_loop(&receiver)));
        }

        JobPool {
            sender: Some(sender),
            workers,
        }
    }

    /// Default pool width, one worker per available core.
    pub fn default_worker_count() -> usize {
        thread::available_parallelism().map_or(1, |n| n.get())
    }

    pub fn submit<T, F>(&self, job: F) -> JobHandle<T>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let (promise, handle) = promise_pair();
        let task: Job = Box::new(move || promise.fulfill(job()));

        match &self.sender {
            Some(sender) => {
                if let Err(rejected) = sender.send(task) {
                    // Workers are already gone; run inline so the handle
                    // still resolves.
                    (rejected.0)();
                }
            }
            None => task(),
        }

        handle
    }

    /// Stop accepting jobs and join the workers. Queued jobs finish first.
    pub fn shutdown(&mut self) {
        self.sender.take();

        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

impl Drop for JobPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(receiver: &Mutex<Receiver<Job>>) {
    loop {
        let job = {
            let guard = receiver.lock().unwrap();
            guard.recv()
        };

        match job {
            Ok(job) => job(),
            Err(_) => break,
        }
    }
}
