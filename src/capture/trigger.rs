//! Selection triggers for capture sessions.
//!
//! A trigger is polled once per frame and decides whether that frame is kept.
//! Showing the frame to an operator, if anything does, is the trigger's job.

use std::collections::VecDeque;
use std::io::BufRead;
use std::sync::mpsc::{self, Receiver, TryRecvError};

use crate::frame::Frame;

/// Decision for the frame currently on screen.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TriggerAction {
    Idle,
    Select,
    Cancel,
}

/// How far a session has got.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CaptureProgress {
    pub captured: usize,
    pub requested: usize,
}

pub trait CaptureTrigger {
    fn poll(&mut self, frame: &Frame, progress: CaptureProgress) -> TriggerAction;
}

/// Replays a fixed list of decisions, then stays idle.
#[derive(Clone, Debug, Default)]
pub struct ScriptedTrigger {
    actions: VecDeque<TriggerAction>,
}

impl ScriptedTrigger {
    pub fn new(actions: impl IntoIterator<Item = TriggerAction>) -> Self {
        Self {
            actions: actions.into_iter().collect(),
        }
    }

    /// Select every frame.
    pub fn select_all(count: usize) -> Self {
        Self::new(std::iter::repeat_n(TriggerAction::Select, count))
    }
}

impl CaptureTrigger for ScriptedTrigger {
    fn poll(&mut self, _frame: &Frame, _progress: CaptureProgress) -> TriggerAction {
        self.actions.pop_front().unwrap_or(TriggerAction::Idle)
    }
}

/// Selects every `every`-th frame. For unattended rigs.
#[derive(Clone, Debug)]
pub struct IntervalTrigger {
    every: u64,
    seen: u64,
}

impl IntervalTrigger {
    pub fn new(every: u64) -> Self {
        Self {
            every: every.max(1),
            seen: 0,
        }
    }
}

impl CaptureTrigger for IntervalTrigger {
    fn poll(&mut self, _frame: &Frame, _progress: CaptureProgress) -> TriggerAction {
        self.seen += 1;
        if self.seen.is_multiple_of(self.every) {
            TriggerAction::Select
        } else {
            TriggerAction::Idle
        }
    }
}

/// Operator control from a terminal: Enter selects, `q` cancels.
///
/// A reader thread turns stdin lines into actions; the session drains them
/// without blocking, one per frame.
pub struct StdinTrigger {
    rx: Receiver<TriggerAction>,
    closed: bool,
}

impl StdinTrigger {
    pub fn spawn() -> Self {
        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else {
                    break;
                };
                let action = parse_command(&line);
                if tx.send(action).is_err() || action == TriggerAction::Cancel {
                    break;
                }
            }
        });
        Self { rx, closed: false }
    }
}

fn parse_command(line: &str) -> TriggerAction {
    match line.trim() {
        "q" | "Q" | "quit" => TriggerAction::Cancel,
        _ => TriggerAction::Select,
    }
}

impl CaptureTrigger for StdinTrigger {
    fn poll(&mut self, frame: &Frame, progress: CaptureProgress) -> TriggerAction {
        if self.closed {
            return TriggerAction::Idle;
        }
        match self.rx.try_recv() {
            Ok(action) => {
                log::debug!(
                    "operator {:?} at frame {} ({}/{})",
                    action,
                    frame.sequence,
                    progress.captured,
                    progress.requested
                );
                action
            }
            Err(TryRecvError::Empty) => TriggerAction::Idle,
            Err(TryRecvError::Disconnected) => {
                log::warn!("stdin closed; no further frames will be selected");
                self.closed = true;
                TriggerAction::Idle
            }
        }
    }
}
