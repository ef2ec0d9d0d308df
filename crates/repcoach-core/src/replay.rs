//! Offline replay of recorded landmark streams.
//!
//! A recording is JSON lines. Each line is either a frame
//! (`{"t": 40, "landmarks": [...]}`) or a selection control record
//! (`{"select": "lunge"}`). Frames are evaluated against their own
//! timestamps, so feedback expiry in a replay matches the recording.

use std::io::BufRead;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::Config;
use crate::error::{RepCoachError, Result};
use crate::landmark::LandmarkFrame;
use crate::profile::ExerciseId;
use crate::session::{FrameResult, SessionController, SessionState};

/// Time step assumed for frames without a timestamp (about 30 fps).
pub const DEFAULT_FRAME_INTERVAL_MS: u64 = 33;

/// One line of a recording.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ReplayRecord {
    /// Switch to another exercise.
    Select {
        /// Exercise name.
        select: String,
    },
    /// A landmark frame.
    Frame(LandmarkFrame),
}

impl ReplayRecord {
    /// Parses one line. Blank lines yield `None`.
    ///
    /// # Errors
    ///
    /// Returns `RepCoachError::InvalidFrame` naming `line_number` if the line
    /// is not a valid record.
    pub fn parse(line: &str, line_number: usize) -> Result<Option<Self>> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        serde_json::from_str(line)
            .map(Some)
            .map_err(|e| RepCoachError::invalid_frame(format!("line {line_number}: {e}")))
    }
}

/// Totals for one exercise selection within a replay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentSummary {
    /// Exercise of this segment.
    pub exercise: ExerciseId,
    /// Repetitions counted.
    pub reps: u32,
    /// Whether calibration passed.
    pub calibrated: bool,
    /// Frames evaluated.
    pub frames_processed: u64,
    /// Frames that lacked the required landmarks.
    pub frames_without_signal: u64,
}

impl From<&SessionState> for SegmentSummary {
    fn from(state: &SessionState) -> Self {
        Self {
            exercise: state.exercise,
            reps: state.rep_count,
            calibrated: state.calibrated,
            frames_processed: state.frames_processed,
            frames_without_signal: state.frames_without_signal,
        }
    }
}

/// Outcome of a whole replay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplaySummary {
    /// One entry per selection, in order. The last entry is the final session.
    pub segments: Vec<SegmentSummary>,
}

impl ReplaySummary {
    /// The session active at the end of the replay.
    #[must_use]
    pub fn last(&self) -> Option<&SegmentSummary> {
        self.segments.last()
    }

    /// Total frames evaluated across all segments.
    #[must_use]
    pub fn frames_processed(&self) -> u64 {
        self.segments.iter().map(|s| s.frames_processed).sum()
    }
}

/// Drives a [`SessionController`] through a recording.
#[derive(Debug)]
pub struct Replayer {
    controller: SessionController,
    segments: Vec<SegmentSummary>,
    clock_ms: u64,
}

impl Replayer {
    /// Creates a replayer starting with `exercise`.
    ///
    /// # Errors
    ///
    /// Returns an error if `config` fails validation.
    pub fn new(config: &Config, exercise: ExerciseId) -> Result<Self> {
        let mut controller = SessionController::new(config)?;
        controller.select_exercise(exercise);
        Ok(Self {
            controller,
            segments: Vec::new(),
            clock_ms: 0,
        })
    }

    /// Applies one record. Frames return their result.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown exercise names or rejected frames.
    pub fn apply(&mut self, record: &ReplayRecord) -> Result<Option<FrameResult>> {
        match record {
            ReplayRecord::Select { select } => {
                let exercise = select.parse::<ExerciseId>()?;
                self.close_segment();
                self.controller.select_exercise(exercise);
                Ok(None)
            }
            ReplayRecord::Frame(frame) => {
                self.clock_ms = frame
                    .timestamp_ms
                    .unwrap_or(self.clock_ms + DEFAULT_FRAME_INTERVAL_MS);
                let result = self.controller.on_frame(frame, self.clock_ms)?;
                debug!(
                    t = self.clock_ms,
                    state = %result.state,
                    reps = result.rep_count,
                    "Replayed frame"
                );
                Ok(Some(result))
            }
        }
    }

    /// Reads every record from `reader`, calling `on_result` per frame.
    ///
    /// # Errors
    ///
    /// Stops at the first unreadable line, invalid record or rejected frame.
    pub fn run<R, F>(mut self, reader: R, mut on_result: F) -> Result<ReplaySummary>
    where
        R: BufRead,
        F: FnMut(&FrameResult),
    {
        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            if let Some(record) = ReplayRecord::parse(&line, index + 1)? {
                if let Some(result) = self.apply(&record)? {
                    on_result(&result);
                }
            }
        }
        Ok(self.finish())
    }

    /// Ends the replay and returns the per-segment totals.
    #[must_use]
    pub fn finish(mut self) -> ReplaySummary {
        self.close_segment();
        if let Some(last) = self.segments.last() {
            info!(
                exercise = %last.exercise,
                reps = last.reps,
                segments = self.segments.len(),
                "Replay finished"
            );
        }
        ReplaySummary {
            segments: self.segments,
        }
    }

    fn close_segment(&mut self) {
        if let Some(state) = self.controller.state() {
            self.segments.push(SegmentSummary::from(state));
        }
    }
}
