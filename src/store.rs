//! Storage collaborators consumed by the scheduling core.
//!
//! The core never queries a database directly; it reads and writes
//! fully-materialized values through these traits.

use chrono::NaiveDateTime;
use thiserror::Error;

use crate::models::{Appointment, AppointmentId, DoctorId, PatientId};
use crate::records::ClinicalRecord;

/// Failures raised by a storage backend, passed through uninterpreted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Storage lock poisoned")]
    Poisoned,

    #[error("Write rejected: {0}")]
    Rejected(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Appointment persistence.
///
/// "In range" queries return active appointments whose `[start, end)`
/// overlaps the half-open range `[from, to)`.
///
/// `save` is an unconditional upsert. No double booking holds only while
/// every write to a store goes through one `SchedulingService`, whose write
/// lock serializes check-then-save. A store shared by several services or
/// processes must provide that serialization itself (a transaction or an
/// exclusion constraint keyed on doctor and interval).
pub trait AppointmentStore: Send + Sync {
    fn find_by_id(&self, id: AppointmentId) -> StoreResult<Option<Appointment>>;

    /// Insert or replace by id.
    fn save(&self, appointment: &Appointment) -> StoreResult<()>;

    fn find_active_by_doctor_in_range(
        &self,
        doctor: DoctorId,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> StoreResult<Vec<Appointment>>;

    fn find_active_by_patient_in_range(
        &self,
        patient: PatientId,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> StoreResult<Vec<Appointment>>;

    fn find_by_patient(&self, patient: PatientId) -> StoreResult<Vec<Appointment>>;

    fn find_by_doctor(&self, doctor: DoctorId) -> StoreResult<Vec<Appointment>>;

    /// Appointments of any status starting within `[from, to)`.
    fn find_by_date_range(
        &self,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> StoreResult<Vec<Appointment>>;
}

pub trait DoctorLookup: Send + Sync {
    fn exists(&self, doctor: DoctorId) -> StoreResult<bool>;
}

pub trait PatientLookup: Send + Sync {
    fn exists(&self, patient: PatientId) -> StoreResult<bool>;
}

/// Clinical records, keyed by the appointment they document.
///
/// Like [`AppointmentStore`], `save` is an upsert; one record per
/// appointment relies on a single `ClinicalRecordService` writing to it.
pub trait ClinicalRecordStore: Send + Sync {
    fn find_by_appointment(&self, appointment: AppointmentId)
        -> StoreResult<Option<ClinicalRecord>>;

    fn save(&self, record: &ClinicalRecord) -> StoreResult<()>;

    fn find_by_patient(&self, patient: PatientId) -> StoreResult<Vec<ClinicalRecord>>;

    fn find_by_doctor(&self, doctor: DoctorId) -> StoreResult<Vec<ClinicalRecord>>;
}
