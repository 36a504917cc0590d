//! Timer entity and its pure state transitions

use std::{fmt, str::FromStr, time::Duration};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Operation, Result, TimerError};

/// Stable identifier of a timer, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimerId(Uuid);

impl TimerId {
    /// Allocate a fresh random id
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TimerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for TimerId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Lifecycle status of a timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerStatus {
    Created,
    Running,
    Paused,
    Finished,
    Cancelled,
}

impl TimerStatus {
    /// Finished and cancelled timers accept no further transitions
    pub fn is_terminal(self) -> bool {
        matches!(self, TimerStatus::Finished | TimerStatus::Cancelled)
    }

    /// Running or paused
    pub fn is_active(self) -> bool {
        matches!(self, TimerStatus::Running | TimerStatus::Paused)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TimerStatus::Created => "created",
            TimerStatus::Running => "running",
            TimerStatus::Paused => "paused",
            TimerStatus::Finished => "finished",
            TimerStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for TimerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimerStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "created" => Ok(TimerStatus::Created),
            "running" => Ok(TimerStatus::Running),
            "paused" => Ok(TimerStatus::Paused),
            "finished" => Ok(TimerStatus::Finished),
            "cancelled" => Ok(TimerStatus::Cancelled),
            other => Err(format!("unknown timer status: {}", other)),
        }
    }
}

/// A countdown timer.
///
/// While running, `remaining` is a cache: the authoritative value is derived
/// from `remaining_at_start` and the wall-clock time elapsed since
/// `started_at`. Every transition into `Running` re-anchors both fields, so
/// pause/resume cycles never accumulate error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timer {
    pub id: TimerId,
    /// Display label, only used for notification text
    pub name: String,
    pub original_duration: Duration,
    pub remaining: Duration,
    /// Remaining time captured at the most recent start
    pub remaining_at_start: Duration,
    pub status: TimerStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub paused_at: Option<DateTime<Utc>>,
    /// When the timer became finished or cancelled
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linked_recipe_id: Option<String>,
}

/// Outcome of [`Timer::recompute_remaining`].
#[derive(Debug, Clone, PartialEq)]
pub struct Recomputed {
    pub timer: Timer,
    /// True when this recompute moved the timer from running to finished
    pub finished: bool,
}

/// Wall-clock time between two instants; a clock that moved backwards yields zero.
fn elapsed_between(since: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (now - since).to_std().unwrap_or(Duration::ZERO)
}

fn apply_delta(value: Duration, delta_secs: i64) -> Duration {
    let magnitude = Duration::from_secs(delta_secs.unsigned_abs());
    if delta_secs >= 0 {
        value.saturating_add(magnitude)
    } else {
        value.saturating_sub(magnitude)
    }
}

impl Timer {
    /// Create a timer in the `Created` state
    pub fn new(
        name: impl Into<String>,
        duration: Duration,
        linked_recipe_id: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        if duration.is_zero() {
            return Err(TimerError::InvalidArgument(
                "timer duration must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            id: TimerId::new(),
            name: name.into(),
            original_duration: duration,
            remaining: duration,
            remaining_at_start: duration,
            status: TimerStatus::Created,
            created_at: now,
            started_at: None,
            paused_at: None,
            ended_at: None,
            linked_recipe_id,
        })
    }

    fn reject(&self, operation: Operation) -> TimerError {
        TimerError::invalid_transition(self.id, operation, self.status)
    }

    /// Remaining time derived from the start anchor, without changing state
    fn remaining_at(&self, now: DateTime<Utc>) -> Duration {
        match self.started_at {
            Some(started_at) => self
                .remaining_at_start
                .saturating_sub(elapsed_between(started_at, now)),
            None => self.remaining,
        }
    }

    fn finish(mut self, now: DateTime<Utc>) -> Self {
        self.remaining = Duration::ZERO;
        self.status = TimerStatus::Finished;
        self.ended_at = Some(now);
        self
    }

    /// Begin or resume counting down
    pub fn start(mut self, now: DateTime<Utc>) -> Result<Self> {
        match self.status {
            TimerStatus::Created | TimerStatus::Paused => {
                self.started_at = Some(now);
                self.remaining_at_start = self.remaining;
                self.paused_at = None;
                self.status = TimerStatus::Running;
                Ok(self)
            }
            _ => Err(self.reject(Operation::Start)),
        }
    }

    /// Fold elapsed running time into `remaining` and pause.
    ///
    /// If the fold exhausts the timer it finishes instead; callers must
    /// check the returned status.
    pub fn pause(mut self, now: DateTime<Utc>) -> Result<Self> {
        if self.status != TimerStatus::Running {
            return Err(self.reject(Operation::Pause));
        }

        let remaining = self.remaining_at(now);
        if remaining.is_zero() {
            return Ok(self.finish(now));
        }

        self.remaining = remaining;
        self.paused_at = Some(now);
        self.status = TimerStatus::Paused;
        Ok(self)
    }

    pub fn cancel(mut self, now: DateTime<Utc>) -> Result<Self> {
        if self.status.is_terminal() {
            return Err(self.reject(Operation::Cancel));
        }

        if self.status == TimerStatus::Running {
            self.remaining = self.remaining_at(now);
        }
        self.status = TimerStatus::Cancelled;
        self.ended_at = Some(now);
        Ok(self)
    }

    /// Restore the full duration. Refused while running so in-flight
    /// elapsed time is never dropped silently.
    pub fn reset(mut self) -> Result<Self> {
        if self.status == TimerStatus::Running {
            return Err(self.reject(Operation::Reset));
        }

        self.remaining = self.original_duration;
        self.remaining_at_start = self.original_duration;
        self.status = TimerStatus::Created;
        self.started_at = None;
        self.paused_at = None;
        self.ended_at = None;
        Ok(self)
    }

    /// Derive `remaining` from the wall clock. A running timer that reaches
    /// zero transitions to `Finished`.
    pub fn recompute_remaining(mut self, now: DateTime<Utc>) -> Recomputed {
        if self.status != TimerStatus::Running {
            return Recomputed {
                timer: self,
                finished: false,
            };
        }

        let remaining = self.remaining_at(now);
        if remaining.is_zero() {
            return Recomputed {
                timer: self.finish(now),
                finished: true,
            };
        }

        self.remaining = remaining;
        Recomputed {
            timer: self,
            finished: false,
        }
    }

    /// Lengthen or shorten the timer by `delta_secs`, never leaving less
    /// than `floor` on the clock.
    pub fn adjust_duration(self, delta_secs: i64, now: DateTime<Utc>, floor: Duration) -> Result<Self> {
        if self.status.is_terminal() {
            return Err(self.reject(Operation::Adjust));
        }

        let Recomputed { mut timer, finished } = self.recompute_remaining(now);
        if finished {
            // Expired before the adjustment landed; the scheduler owns the completion.
            return Err(TimerError::invalid_transition(
                timer.id,
                Operation::Adjust,
                TimerStatus::Finished,
            ));
        }

        let remaining = apply_delta(timer.remaining, delta_secs).max(floor);
        let original = apply_delta(timer.original_duration, delta_secs)
            .max(floor)
            .max(remaining);

        timer.remaining = remaining;
        timer.remaining_at_start = remaining;
        timer.original_duration = original;
        if timer.status == TimerStatus::Running {
            timer.started_at = Some(now);
        }
        Ok(timer)
    }

    /// Whether this terminal timer ended before `cutoff`
    pub fn ended_before(&self, cutoff: DateTime<Utc>) -> bool {
        if !self.status.is_terminal() {
            return false;
        }
        self.ended_at.unwrap_or(self.created_at) < cutoff
    }
}
