//! Progress relay
//!
//! Single consumer of the worker channel. The host UI owns one relay per
//! batch and calls [`ProgressRelay::drain`] on its own timer tick; draining
//! never blocks, so a tick with no traffic is free. Messages fold into a
//! per-job display view keyed by job id.

use std::collections::HashMap;

use tokio::sync::mpsc::UnboundedReceiver;
use tracing::debug;

use crate::core::models::{LifecycleEvent, MessageBody, ProgressMessage};

/// Display state of one job as the UI should show it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobStatus {
    Ready,
    GettingStreams,
    Downloading,
    Processing,
    Finished,
    Canceled,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobView {
    pub status: JobStatus,
    pub progress: u8,
}

impl Default for JobView {
    fn default() -> Self {
        Self {
            status: JobStatus::Ready,
            progress: 0,
        }
    }
}

pub struct ProgressRelay {
    receiver: UnboundedReceiver<ProgressMessage>,
    jobs_expected: usize,
    threads_finished: usize,
    views: HashMap<String, JobView>,
}

impl ProgressRelay {
    pub fn new(receiver: UnboundedReceiver<ProgressMessage>, jobs_expected: usize) -> Self {
        Self {
            receiver,
            jobs_expected,
            threads_finished: 0,
            views: HashMap::new(),
        }
    }

    /// Folds every queued message into the views. Non-blocking; returns the
    /// number of messages consumed.
    pub fn drain(&mut self) -> usize {
        let mut consumed = 0;
        while let Ok(msg) = self.receiver.try_recv() {
            self.apply(msg);
            consumed += 1;
        }
        consumed
    }

    fn apply(&mut self, msg: ProgressMessage) {
        debug!("Relay message for {}: {:?}", msg.job_id, msg.body);

        // Views are created lazily so that a message arriving ahead of its
        // job's `thread started` still registers the job.
        let view = self.views.entry(msg.job_id).or_default();
        match msg.body {
            MessageBody::Progress(percent) => view.progress = percent,
            MessageBody::Event(event) => match event {
                LifecycleEvent::ThreadStarted => view.status = JobStatus::Ready,
                LifecycleEvent::FindingStreams => view.status = JobStatus::GettingStreams,
                LifecycleEvent::StartedDownload => view.status = JobStatus::Downloading,
                LifecycleEvent::StartedProcessing => view.status = JobStatus::Processing,
                LifecycleEvent::CompletedProcessing => {
                    view.status = JobStatus::Finished;
                    view.progress = 100;
                }
                LifecycleEvent::Canceled => view.status = JobStatus::Canceled,
                LifecycleEvent::Error => view.status = JobStatus::Failed,
                // Sub-stage markers carry no display change of their own.
                LifecycleEvent::StartedStream
                | LifecycleEvent::CompletedStream
                | LifecycleEvent::CompletedDownload => {}
                LifecycleEvent::ThreadFinished => self.threads_finished += 1,
            },
        }
    }

    pub fn view(&self, job_id: &str) -> Option<JobView> {
        self.views.get(job_id).copied()
    }

    pub fn views(&self) -> impl Iterator<Item = (&str, &JobView)> {
        self.views.iter().map(|(id, view)| (id.as_str(), view))
    }

    pub fn threads_finished(&self) -> usize {
        self.threads_finished
    }

    /// True once every expected job has emitted `thread finished`.
    pub fn is_batch_complete(&self) -> bool {
        self.threads_finished >= self.jobs_expected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[test]
    fn test_empty_drain_is_a_noop() {
        let (tx, rx) = mpsc::unbounded_channel::<ProgressMessage>();
        let mut relay = ProgressRelay::new(rx, 1);

        assert_eq!(relay.drain(), 0);
        assert_eq!(relay.drain(), 0);
        assert!(!relay.is_batch_complete());
        drop(tx);
    }

    #[test]
    fn test_event_mapping_through_a_full_job() {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut relay = ProgressRelay::new(rx, 1);

        let sequence = [
            (LifecycleEvent::ThreadStarted, JobStatus::Ready),
            (LifecycleEvent::FindingStreams, JobStatus::GettingStreams),
            (LifecycleEvent::StartedDownload, JobStatus::Downloading),
            // Sub-stage markers leave the display state alone.
            (LifecycleEvent::StartedStream, JobStatus::Downloading),
            (LifecycleEvent::CompletedStream, JobStatus::Downloading),
            (LifecycleEvent::CompletedDownload, JobStatus::Downloading),
            (LifecycleEvent::StartedProcessing, JobStatus::Processing),
            (LifecycleEvent::CompletedProcessing, JobStatus::Finished),
        ];
        for (event, expected) in sequence {
            tx.send(ProgressMessage::event("job-1", event)).unwrap();
            relay.drain();
            assert_eq!(relay.view("job-1").unwrap().status, expected);
        }

        // Terminal completion pins progress at 100.
        assert_eq!(relay.view("job-1").unwrap().progress, 100);
        assert!(!relay.is_batch_complete());

        tx.send(ProgressMessage::event("job-1", LifecycleEvent::ThreadFinished))
            .unwrap();
        relay.drain();
        assert!(relay.is_batch_complete());
    }

    #[test]
    fn test_progress_overwrites_and_registers_late() {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut relay = ProgressRelay::new(rx, 1);

        // Progress ahead of any lifecycle event still creates the view.
        tx.send(ProgressMessage::progress("job-9", 30)).unwrap();
        relay.drain();
        let view = relay.view("job-9").unwrap();
        assert_eq!(view.status, JobStatus::Ready);
        assert_eq!(view.progress, 30);

        tx.send(ProgressMessage::progress("job-9", 65)).unwrap();
        relay.drain();
        assert_eq!(relay.view("job-9").unwrap().progress, 65);
    }

    #[test]
    fn test_canceled_and_failed_states() {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut relay = ProgressRelay::new(rx, 2);

        tx.send(ProgressMessage::event("a", LifecycleEvent::Canceled))
            .unwrap();
        tx.send(ProgressMessage::event("b", LifecycleEvent::Error))
            .unwrap();
        relay.drain();

        assert_eq!(relay.view("a").unwrap().status, JobStatus::Canceled);
        assert_eq!(relay.view("b").unwrap().status, JobStatus::Failed);
        assert_eq!(relay.views().count(), 2);
    }
}
