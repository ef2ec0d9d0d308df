//! Live session runtime.
//!
//! [`SessionHandle`] serializes access to a [`SessionController`] behind an
//! async mutex, schedules feedback expiry on the tokio clock and publishes
//! every change on an [`EventBroadcaster`].
//!
//! Expiry tasks are replaced while the session lock is held, so a message
//! replacement or an exercise switch and the cancellation of the previous
//! timer happen as one step.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

use crate::config::Config;
use crate::error::Result;
use crate::feedback::ExpiryTicket;
use crate::landmark::LandmarkFrame;
use crate::profile::ExerciseId;
use crate::session::{FrameResult, SessionController, SessionSnapshot};
use crate::websocket::{EventBroadcaster, SessionEvent};

#[derive(Debug)]
struct Inner {
    controller: SessionController,
    expiry_task: Option<JoinHandle<()>>,
}

impl Inner {
    fn cancel_expiry(&mut self) {
        if let Some(task) = self.expiry_task.take() {
            task.abort();
        }
    }
}

/// Shared handle to one live session.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    inner: Arc<Mutex<Inner>>,
    broadcaster: EventBroadcaster,
    origin: Instant,
}

impl SessionHandle {
    /// Creates a handle with no exercise selected.
    ///
    /// # Errors
    ///
    /// Returns an error if `config` fails validation.
    pub fn new(config: &Config) -> Result<Self> {
        Self::with_broadcaster(config, EventBroadcaster::default())
    }

    /// Creates a handle publishing on `broadcaster`.
    ///
    /// # Errors
    ///
    /// Returns an error if `config` fails validation.
    pub fn with_broadcaster(config: &Config, broadcaster: EventBroadcaster) -> Result<Self> {
        Ok(Self {
            inner: Arc::new(Mutex::new(Inner {
                controller: SessionController::new(config)?,
                expiry_task: None,
            })),
            broadcaster,
            origin: Instant::now(),
        })
    }

    /// The broadcaster session events are published on.
    #[must_use]
    pub const fn broadcaster(&self) -> &EventBroadcaster {
        &self.broadcaster
    }

    /// Milliseconds since the handle was created.
    #[must_use]
    pub fn now_ms(&self) -> u64 {
        u64::try_from(self.origin.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    /// Selects `exercise`, cancelling any pending feedback expiry.
    pub async fn select_exercise(&self, exercise: ExerciseId) -> u64 {
        let mut inner = self.inner.lock().await;
        inner.cancel_expiry();
        let epoch = inner.controller.select_exercise(exercise);
        self.broadcaster
            .send(SessionEvent::exercise_selected(exercise, epoch));
        epoch
    }

    /// Selects an exercise by name.
    ///
    /// # Errors
    ///
    /// Returns `RepCoachError::UnknownExercise` if `name` matches no profile.
    pub async fn select_exercise_by_name(&self, name: &str) -> Result<(ExerciseId, u64)> {
        match name.parse::<ExerciseId>() {
            Ok(exercise) => Ok((exercise, self.select_exercise(exercise).await)),
            Err(e) => {
                self.broadcaster.send(SessionEvent::error(e.to_string()));
                Err(e)
            }
        }
    }

    /// Evaluates `frame` at the current session time.
    ///
    /// # Errors
    ///
    /// Propagates frame rejections from [`SessionController::on_frame`].
    pub async fn submit_frame(&self, frame: &LandmarkFrame) -> Result<FrameResult> {
        let mut inner = self.inner.lock().await;
        let result = match inner.controller.on_frame(frame, self.now_ms()) {
            Ok(result) => result,
            Err(e) => {
                self.broadcaster.send(SessionEvent::error(e.to_string()));
                return Err(e);
            }
        };

        if let Some(ticket) = result.issued {
            self.schedule_expiry(&mut inner, ticket);
        }

        self.broadcaster
            .send(SessionEvent::frame_result(result.clone()));
        if result.counted {
            self.broadcaster
                .send(SessionEvent::rep_counted(result.exercise, result.rep_count));
        }
        Ok(result)
    }

    /// Point-in-time view of the session.
    pub async fn snapshot(&self) -> SessionSnapshot {
        self.inner.lock().await.controller.snapshot()
    }

    /// Replaces the pending expiry task with one for `ticket`.
    fn schedule_expiry(&self, inner: &mut Inner, ticket: ExpiryTicket) {
        inner.cancel_expiry();
        let deadline = self.origin + Duration::from_millis(ticket.expires_at_ms);
        let handle = self.clone();
        inner.expiry_task = Some(tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            let mut inner = handle.inner.lock().await;
            if inner.controller.expire_feedback(ticket.id) {
                debug!(ticket = ticket.id, "Feedback expired");
                handle
                    .broadcaster
                    .send(SessionEvent::feedback_cleared(ticket.id));
            }
        }));
    }
}
