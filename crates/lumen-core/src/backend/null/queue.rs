use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::JoinHandle;

use crate::backend::FenceTimeline;
use crate::error::{Error, Result};
use crate::raster::{self, Canvas, RasterOp};

/// Work executed by the queue thread in submission order.
pub(super) enum Work {
    Frame {
        target: Arc<Mutex<Canvas>>,
        width: u32,
        height: u32,
        ops: Vec<RasterOp>,
    },
    Signal {
        timeline: Arc<FenceTimeline>,
        value: u64,
    },
}

#[derive(Default)]
struct Progress {
    retired: Mutex<u64>,
    cond: Condvar,
}

impl Progress {
    fn retire(&self, seq: u64) {
        let mut retired = self.retired.lock().unwrap_or_else(PoisonError::into_inner);
        *retired = seq;
        self.cond.notify_all();
    }
}

/// Simulated GPU queue: one worker thread draining a FIFO.
pub(super) struct Queue {
    sender: Mutex<Option<Sender<(u64, Work)>>>,
    worker: Option<JoinHandle<()>>,
    progress: Arc<Progress>,
    next: Mutex<u64>,
}

impl Queue {
    pub(super) fn spawn() -> Result<Self> {
        let (tx, rx) = mpsc::channel::<(u64, Work)>();
        let progress = Arc::new(Progress::default());
        let worker_progress = Arc::clone(&progress);

        let worker = std::thread::Builder::new()
            .name("lumen-null-queue".into())
            .spawn(move || {
                for (seq, work) in rx {
                    execute(work);
                    worker_progress.retire(seq);
                }
                log::trace!("null queue drained");
            })
            .map_err(|e| Error::internal(format!("failed to spawn null queue thread: {e}")))?;

        Ok(Self {
            sender: Mutex::new(Some(tx)),
            worker: Some(worker),
            progress,
            next: Mutex::new(0),
        })
    }

    /// Enqueues `work` and returns its sequence number.
    pub(super) fn push(&self, work: Work) -> Result<u64> {
        let sender = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        let tx = sender
            .as_ref()
            .ok_or_else(|| Error::DeviceLost("null queue is shut down".into()))?;

        let mut next = self.next.lock().unwrap_or_else(PoisonError::into_inner);
        *next += 1;
        let seq = *next;
        tx.send((seq, work))
            .map_err(|_| Error::DeviceLost("null queue thread exited".into()))?;
        Ok(seq)
    }

    /// Blocks until work `seq` (and everything before it) has executed.
    pub(super) fn wait_retired(&self, seq: u64) -> Result<()> {
        let mut retired = self.progress.retired.lock().unwrap_or_else(PoisonError::into_inner);
        while *retired < seq {
            if self.worker.as_ref().is_none_or(|w| w.is_finished()) {
                return Err(Error::DeviceLost("null queue thread exited".into()));
            }
            retired = self
                .progress
                .cond
                .wait_timeout(retired, std::time::Duration::from_millis(50))
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        Ok(())
    }
}

impl Drop for Queue {
    fn drop(&mut self) {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::error!("null queue thread panicked");
            }
        }
    }
}

fn execute(work: Work) {
    match work {
        Work::Frame {
            target,
            width,
            height,
            ops,
        } => {
            let mut canvas = target.lock().unwrap_or_else(PoisonError::into_inner);
            canvas.reset(width, height);
            raster::render(&mut canvas, &ops);
            log::trace!("null queue rendered {} ops at {width}x{height}", ops.len());
        }
        Work::Signal { timeline, value } => timeline.complete(value),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn signals_complete_in_submission_order() {
        let queue = Queue::spawn().unwrap();
        let target = Arc::new(Mutex::new(Canvas::new(1, 1)));
        let timeline = Arc::new(FenceTimeline::default());

        queue
            .push(Work::Frame {
                target: Arc::clone(&target),
                width: 16,
                height: 8,
                ops: Vec::new(),
            })
            .unwrap();
        let seq = queue
            .push(Work::Signal {
                timeline: Arc::clone(&timeline),
                value: 1,
            })
            .unwrap();

        assert!(timeline.wait(1, Some(Duration::from_secs(5))));
        queue.wait_retired(seq).unwrap();
        assert_eq!(target.lock().unwrap().width(), 16);
    }
}
