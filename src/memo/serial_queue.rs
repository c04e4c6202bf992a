//! FIFO execution of operations on state owned by a single worker thread.

use std::io;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};
use thiserror::Error;
use tracing::trace;

#[derive(Debug, Clone, Error)]
pub enum QueueError {
    #[error("Queue worker has stopped")]
    Closed,
}

pub type QueueResult<T> = Result<T, QueueError>;

type Job<S> = Box<dyn FnOnce(&mut S) + Send + 'static>;

/// Result of a job that has been queued but may not have run yet
#[must_use = "a queued job's result is lost unless waited on"]
pub struct Pending<T> {
    receiver: Receiver<T>,
}

impl<T> Pending<T> {
    /// Block until the job has run and return its output
    pub fn wait(self) -> QueueResult<T> {
        self.receiver.recv().map_err(|_| QueueError::Closed)
    }
}

/// Runs submitted jobs one at a time, in submission order, against state
/// owned by a dedicated worker thread.
///
/// A job that returns an error only affects its own caller; later jobs still
/// run. Dropping the queue lets the worker drain what is already queued and
/// then joins it.
pub struct SerialQueue<S> {
    sender: Option<Sender<Job<S>>>,
    worker: Option<JoinHandle<()>>,
}

impl<S: Send + 'static> SerialQueue<S> {
    /// Move `state` onto a new worker thread named `name`
    pub fn spawn(name: impl Into<String>, state: S) -> io::Result<Self> {
        let name = name.into();
        let (sender, receiver) = mpsc::channel::<Job<S>>();

        let worker = thread::Builder::new().name(name.clone()).spawn(move || {
            let mut state = state;
            trace!(queue = %name, "worker started");
            for job in receiver {
                job(&mut state);
            }
            trace!(queue = %name, "worker stopped");
        })?;

        Ok(Self {
            sender: Some(sender),
            worker: Some(worker),
        })
    }

    /// Queue `job` behind everything submitted before it
    pub fn submit<T, F>(&self, job: F) -> Pending<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut S) -> T + Send + 'static,
    {
        let (result_sender, receiver) = mpsc::channel();
        let task: Job<S> = Box::new(move |state: &mut S| {
            // The caller may have dropped its Pending; nothing to report then
            let _ = result_sender.send(job(state));
        });

        if let Some(sender) = &self.sender {
            // On failure the task (and its result sender) is dropped, so wait() reports Closed
            let _ = sender.send(task);
        }

        Pending { receiver }
    }

    /// Queue `job` and block until it has run
    pub fn run<T, F>(&self, job: F) -> QueueResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut S) -> T + Send + 'static,
    {
        self.submit(job).wait()
    }
}

impl<S> Drop for SerialQueue<S> {
    fn drop(&mut self) {
        // Closing the channel ends the worker loop once queued jobs are done
        self.sender.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}
