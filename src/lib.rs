//! Appointment scheduling and conflict resolution for a medical clinic.
//!
//! The [`SchedulingService`] books appointments against a doctor's and a
//! patient's calendar, enforces the clinic's booking policy and drives each
//! appointment through its lifecycle. Storage and time are injected through
//! the traits in [`store`] and [`clock`].

pub mod calendar;
pub mod clock;
pub mod config;
pub mod conflict;
pub mod error;
pub mod lifecycle;
pub mod memory;
pub mod models;
pub mod policy;
pub mod records;
pub mod scheduler;
pub mod store;
pub mod window;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::ClinicConfig;
pub use error::{Entity, Result, SchedulingError};
pub use lifecycle::{LifecycleEvent, Transition};
pub use models::{
    Appointment, AppointmentId, AppointmentStats, AppointmentStatus, AppointmentView, DoctorId,
    Participant, PatientId,
};
pub use policy::{PolicyConfig, PolicyViolation, SchedulingPolicy};
pub use records::{ClinicalRecord, ClinicalRecordService, RecordContent};
pub use scheduler::{AppointmentUpdate, BookingRequest, SchedulingService};
pub use window::TimeWindow;
