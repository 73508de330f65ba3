use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// FIFO job queue on dedicated threads.
///
/// Jobs run asynchronously in submission order; with more than one worker the
/// submission order still holds but completion order does not. Dropping the
/// queue closes it, drains outstanding jobs, and joins the workers.
pub struct TaskQueue {
    tx: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
}

impl TaskQueue {
    pub fn new(workers: usize) -> Self {
        let (tx, rx) = mpsc::channel::<Job>();
        let rx = Arc::new(Mutex::new(rx));
        let workers = (0..workers.max(1))
            .map(|_| {
                let rx = Arc::clone(&rx);
                std::thread::spawn(move || worker_loop(&rx))
            })
            .collect();
        TaskQueue {
            tx: Some(tx),
            workers,
        }
    }

    /// Queue a unit of work. Silently dropped if the queue is already closed.
    pub fn submit(&self, job: impl FnOnce() + Send + 'static) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(Box::new(job));
        }
    }
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new(1)
    }
}

impl Drop for TaskQueue {
    fn drop(&mut self) {
        self.tx.take();
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}

fn worker_loop(rx: &Mutex<Receiver<Job>>) {
    loop {
        let job = {
            let receiver = rx.lock().unwrap_or_else(PoisonError::into_inner);
            receiver.recv()
        };
        match job {
            Ok(job) => job(),
            Err(_) => break,
        }
    }
}
