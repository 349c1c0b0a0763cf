//! Appointment state machine.
//!
//! ```text
//! SCHEDULED --confirm--> CONFIRMED
//! SCHEDULED | CONFIRMED --complete--> COMPLETED
//! SCHEDULED | CONFIRMED --cancel--> CANCELLED
//! SCHEDULED | CONFIRMED --mark_no_show--> NO_SHOW   (only once the visit has ended)
//! SCHEDULED | CONFIRMED --reschedule--> same state
//! ```
//!
//! COMPLETED, CANCELLED and NO_SHOW are terminal.

use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::SchedulingError;
use crate::models::{Appointment, AppointmentStatus};
use crate::window::TimeWindow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleEvent {
    /// Initial booking. Never valid as a transition of an existing appointment.
    Schedule,
    Confirm,
    Complete,
    Cancel,
    MarkNoShow,
    Reschedule,
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleEvent::Schedule => "schedule",
            LifecycleEvent::Confirm => "confirm",
            LifecycleEvent::Complete => "complete",
            LifecycleEvent::Cancel => "cancel",
            LifecycleEvent::MarkNoShow => "mark as no-show",
            LifecycleEvent::Reschedule => "reschedule",
        };
        f.write_str(name)
    }
}

/// An event together with the data it carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Confirm,
    Complete,
    Cancel { note: Option<String> },
    MarkNoShow,
    /// The new window must already have passed policy and conflict checks.
    Reschedule { window: TimeWindow },
}

impl Transition {
    /// The transition that drives an appointment directly into `target`.
    ///
    /// `Scheduled` is only ever an initial state, so nothing leads to it.
    pub fn toward(target: AppointmentStatus, note: Option<String>) -> Option<Transition> {
        match target {
            AppointmentStatus::Scheduled => None,
            AppointmentStatus::Confirmed => Some(Transition::Confirm),
            AppointmentStatus::Completed => Some(Transition::Complete),
            AppointmentStatus::Cancelled => Some(Transition::Cancel { note }),
            AppointmentStatus::NoShow => Some(Transition::MarkNoShow),
        }
    }

    pub fn event(&self) -> LifecycleEvent {
        match self {
            Transition::Confirm => LifecycleEvent::Confirm,
            Transition::Complete => LifecycleEvent::Complete,
            Transition::Cancel { .. } => LifecycleEvent::Cancel,
            Transition::MarkNoShow => LifecycleEvent::MarkNoShow,
            Transition::Reschedule { .. } => LifecycleEvent::Reschedule,
        }
    }
}

/// State after `event` fires in `from`, or `None` if the event is not allowed.
pub fn next_status(from: AppointmentStatus, event: LifecycleEvent) -> Option<AppointmentStatus> {
    use AppointmentStatus::*;
    use LifecycleEvent::*;

    match (from, event) {
        (Scheduled, Confirm) => Some(Confirmed),
        (Scheduled | Confirmed, Complete) => Some(Completed),
        (Scheduled | Confirmed, Cancel) => Some(Cancelled),
        (Scheduled | Confirmed, MarkNoShow) => Some(NoShow),
        (Scheduled | Confirmed, Reschedule) => Some(from),
        _ => None,
    }
}

/// Events accepted in `from`.
pub fn valid_events(from: AppointmentStatus) -> Vec<LifecycleEvent> {
    [
        LifecycleEvent::Confirm,
        LifecycleEvent::Complete,
        LifecycleEvent::Cancel,
        LifecycleEvent::MarkNoShow,
        LifecycleEvent::Reschedule,
    ]
    .into_iter()
    .filter(|event| next_status(from, *event).is_some())
    .collect()
}

/// Apply `transition` to `appointment`, stamping `updated_at` with `now`.
///
/// On error the appointment is left untouched.
pub fn apply(
    appointment: &mut Appointment,
    transition: Transition,
    now: NaiveDateTime,
) -> Result<(), SchedulingError> {
    let from = appointment.status;
    let event = transition.event();

    let to = match next_status(from, event) {
        Some(to) => to,
        None => {
            warn!(
                appointment = %appointment.id,
                from = %from,
                event = %event,
                "Rejected lifecycle transition"
            );
            return Err(SchedulingError::InvalidTransition { from, event });
        }
    };

    match transition {
        Transition::MarkNoShow => {
            let ends_at = appointment.end();
            if now < ends_at {
                return Err(SchedulingError::AppointmentNotEnded { ends_at });
            }
        }
        Transition::Cancel { note } => {
            if let Some(note) = note.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()) {
                appointment.cancellation_note = Some(note);
            }
        }
        Transition::Reschedule { window } => {
            appointment.start = window.start;
            appointment.duration_minutes = window.duration_minutes();
        }
        Transition::Confirm | Transition::Complete => {}
    }

    appointment.status = to;
    appointment.updated_at = now;

    info!(
        appointment = %appointment.id,
        from = %from,
        to = %to,
        event = %event,
        "Appointment transitioned"
    );
    Ok(())
}
