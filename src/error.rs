//! Error kinds returned by the scheduling core.

use chrono::NaiveDateTime;
use thiserror::Error;
use uuid::Uuid;

use crate::lifecycle::LifecycleEvent;
use crate::models::{AppointmentId, AppointmentStatus, Participant};
use crate::policy::PolicyViolation;
use crate::store::StoreError;

/// Kind of entity a lookup failed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Appointment,
    Doctor,
    Patient,
    ClinicalRecord,
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Entity::Appointment => "Appointment",
            Entity::Doctor => "Doctor",
            Entity::Patient => "Patient",
            Entity::ClinicalRecord => "Clinical record",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum SchedulingError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: Entity, id: Uuid },

    #[error(transparent)]
    Policy(#[from] PolicyViolation),

    #[error("The {participant} already has appointment {conflicting} in that time range")]
    SchedulingConflict {
        participant: Participant,
        conflicting: AppointmentId,
    },

    #[error("Appointment cannot be modified in state {0}")]
    ImmutableState(AppointmentStatus),

    #[error("Appointment is already {0}")]
    AlreadyTerminal(AppointmentStatus),

    #[error("Cannot {event} an appointment in state {from}")]
    InvalidTransition {
        from: AppointmentStatus,
        event: LifecycleEvent,
    },

    #[error("Appointment has not ended yet (ends at {ends_at})")]
    AppointmentNotEnded { ends_at: NaiveDateTime },

    #[error("User {actor} is not allowed to act on appointment {appointment}")]
    Unauthorized {
        actor: Uuid,
        appointment: AppointmentId,
    },

    #[error("No changes were requested")]
    NoOp,

    #[error("Clinical records can only be attached to completed appointments (state {0})")]
    RecordRequiresCompleted(AppointmentStatus),

    #[error("Appointment {0} already has a clinical record")]
    RecordExists(AppointmentId),

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl SchedulingError {
    pub(crate) fn not_found(entity: Entity, id: impl Into<Uuid>) -> Self {
        SchedulingError::NotFound {
            entity,
            id: id.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SchedulingError>;
