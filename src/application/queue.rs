//! In-process job queue with two priority levels.

use crate::domain::jobs::Priority;
use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use thiserror::Error;
use tokio::sync::Notify;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("{0} queue is closed")]
pub struct QueueClosed(pub &'static str);

#[derive(Debug)]
struct Levels<J> {
    high: VecDeque<J>,
    low: VecDeque<J>,
    closed: bool,
}

/// High-priority jobs always drain before low-priority ones; each level is FIFO.
#[derive(Debug)]
pub struct JobQueue<J> {
    name: &'static str,
    levels: Mutex<Levels<J>>,
    available: Notify,
}

impl<J> JobQueue<J> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            levels: Mutex::new(Levels {
                high: VecDeque::new(),
                low: VecDeque::new(),
                closed: false,
            }),
            available: Notify::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn push(&self, priority: Priority, job: J) -> Result<(), QueueClosed> {
        {
            let mut levels = self.levels.lock().unwrap_or_else(PoisonError::into_inner);
            if levels.closed {
                return Err(QueueClosed(self.name));
            }
            match priority {
                Priority::High => levels.high.push_back(job),
                Priority::Low => levels.low.push_back(job),
            }
        }
        self.available.notify_one();
        Ok(())
    }

    pub fn try_pop(&self) -> Option<J> {
        let mut levels = self.levels.lock().unwrap_or_else(PoisonError::into_inner);
        levels.high.pop_front().or_else(|| levels.low.pop_front())
    }

    /// Wait for the next job. `None` once the queue is closed.
    pub async fn pop(&self) -> Option<J> {
        loop {
            let notified = self.available.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut levels = self.levels.lock().unwrap_or_else(PoisonError::into_inner);
                if levels.closed {
                    return None;
                }
                if let Some(job) = levels.high.pop_front().or_else(|| levels.low.pop_front()) {
                    return Some(job);
                }
            }

            notified.await;
        }
    }

    /// Refuse further pushes, wake every waiter and hand back what was still queued.
    pub fn close(&self) -> Vec<J> {
        let pending = {
            let mut levels = self.levels.lock().unwrap_or_else(PoisonError::into_inner);
            levels.closed = true;
            let mut pending: Vec<J> = levels.high.drain(..).collect();
            pending.extend(levels.low.drain(..));
            pending
        };
        self.available.notify_waiters();
        pending
    }

    pub fn len(&self) -> usize {
        let levels = self.levels.lock().unwrap_or_else(PoisonError::into_inner);
        levels.high.len() + levels.low.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
