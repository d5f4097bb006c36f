//! Terminal progress reporter and its signal protocol.
//!
//! The reporter runs as its own task and shares nothing with the
//! orchestrator except a bounded signal channel. It polls the channel once
//! per animation tick, so it keeps animating at a fixed rate whether or not
//! messages arrive. It never writes while paused, which keeps diagnostic
//! prints from the orchestrator from interleaving with the animation.

use std::io::{self, Write};
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TryRecvError};
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout, MissedTickBehavior};

/// Capacity of the signal channel; senders wait when it is full
pub const SIGNAL_CAPACITY: usize = 16;

const SPINNER: [char; 4] = ['|', '/', '-', '\\'];
const DOTS: [&str; 6] = [
    "       ",
    ".      ",
    "..     ",
    "...    ",
    "....   ",
    "...... ",
];
/// Trailing padding erases whatever the last animation frame left behind
const DONE_LINE: &str = "\r[+]: Done🎉                                                 \n";

/// Message from the orchestrator to the reporter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineSignal {
    InProgress,
    /// Stop writing to the terminal until the next `InProgress`
    Paused,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReporterState {
    InProgress,
    Paused,
    Terminated,
}

impl ReporterState {
    fn on_signal(self, signal: PipelineSignal) -> Self {
        match (self, signal) {
            (ReporterState::Terminated, _) => ReporterState::Terminated,
            (_, PipelineSignal::InProgress) => ReporterState::InProgress,
            (_, PipelineSignal::Paused) => ReporterState::Paused,
            (_, PipelineSignal::Finished) => ReporterState::Terminated,
        }
    }
}

/// Animated "in progress" line driven by `PipelineSignal`s
pub struct ProgressReporter<W> {
    out: W,
    tick: Duration,
    state: ReporterState,
    frame: usize,
}

impl<W: Write> ProgressReporter<W> {
    pub fn new(out: W, tick: Duration) -> Self {
        Self {
            out,
            tick,
            state: ReporterState::InProgress,
            frame: 0,
        }
    }

    /// Animate until `Finished` arrives or every sender is gone.
    pub async fn run(mut self, mut signals: mpsc::Receiver<PipelineSignal>) -> io::Result<()> {
        let mut ticker = interval(self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            match signals.try_recv() {
                Ok(signal) => self.state = self.state.on_signal(signal),
                Err(TryRecvError::Empty) => {}
                Err(TryRecvError::Disconnected) => self.state = ReporterState::Terminated,
            }

            match self.state {
                ReporterState::InProgress => self.draw_frame()?,
                ReporterState::Paused => {}
                ReporterState::Terminated => break,
            }
        }

        self.out.write_all(DONE_LINE.as_bytes())?;
        self.out.flush()
    }

    fn draw_frame(&mut self) -> io::Result<()> {
        let spinner = SPINNER[self.frame % SPINNER.len()];
        let dots = DOTS[self.frame % DOTS.len()];
        write!(
            self.out,
            "\r[{}]: Image analyzer is now in progress{}",
            spinner, dots
        )?;
        self.out.flush()?;
        self.frame = self.frame.wrapping_add(1);
        Ok(())
    }
}

/// How a reporter ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReporterExit {
    /// Observed `Finished` and wrote the done line
    Completed,
    /// Ended with a write error or panicked
    Failed,
    /// Did not exit within the grace period and was aborted
    Cancelled,
}

/// Orchestrator-side handle to a running reporter.
///
/// Dropping the handle aborts the reporter, so the error path never leaves
/// one animating.
pub struct ProgressHandle {
    signals: mpsc::Sender<PipelineSignal>,
    task: Option<JoinHandle<io::Result<()>>>,
}

impl ProgressHandle {
    /// Start a reporter writing to `out`. Must be called within a tokio runtime.
    pub fn spawn<W>(out: W, tick: Duration) -> Self
    where
        W: Write + Send + 'static,
    {
        let (signals, receiver) = mpsc::channel(SIGNAL_CAPACITY);
        let task = tokio::spawn(ProgressReporter::new(out, tick).run(receiver));
        Self {
            signals,
            task: Some(task),
        }
    }

    pub fn is_alive(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Send a signal, waiting for room if the channel is full.
    pub async fn signal(&self, signal: PipelineSignal) {
        if self.signals.send(signal).await.is_err() {
            tracing::debug!("progress reporter already exited; dropped {:?}", signal);
        }
    }

    /// Ask the reporter to finish and wait up to `grace` for it to exit,
    /// aborting it if it does not.
    pub async fn finish(mut self, grace: Duration) -> ReporterExit {
        let Some(mut task) = self.task.take() else {
            return ReporterExit::Completed;
        };

        let signals = &self.signals;
        let outcome = timeout(grace, async {
            let _ = signals.send(PipelineSignal::Finished).await;
            (&mut task).await
        })
        .await;

        match outcome {
            Ok(Ok(Ok(()))) => ReporterExit::Completed,
            Ok(Ok(Err(e))) => {
                tracing::warn!("progress reporter stopped with an error: {}", e);
                ReporterExit::Failed
            }
            Ok(Err(e)) => {
                tracing::warn!("progress reporter task failed: {}", e);
                ReporterExit::Failed
            }
            Err(_) => {
                task.abort();
                tracing::warn!(
                    "progress reporter did not exit within {:?}; cancelled",
                    grace
                );
                ReporterExit::Cancelled
            }
        }
    }

    /// Abort the reporter immediately.
    pub fn terminate(mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for ProgressHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
