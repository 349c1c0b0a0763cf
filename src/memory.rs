//! In-memory storage backends, used by the console front-end and tests.

use std::collections::{HashMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::NaiveDateTime;

use crate::models::{Appointment, AppointmentId, DoctorId, PatientId};
use crate::records::ClinicalRecord;
use crate::store::{
    AppointmentStore, ClinicalRecordStore, DoctorLookup, PatientLookup, StoreError, StoreResult,
};
use crate::window::overlaps;

fn read<T>(lock: &RwLock<T>) -> StoreResult<RwLockReadGuard<'_, T>> {
    lock.read().map_err(|_| StoreError::Poisoned)
}

fn write<T>(lock: &RwLock<T>) -> StoreResult<RwLockWriteGuard<'_, T>> {
    lock.write().map_err(|_| StoreError::Poisoned)
}

#[derive(Debug, Default)]
pub struct InMemoryAppointmentStore {
    appointments: RwLock<HashMap<AppointmentId, Appointment>>,
}

impl InMemoryAppointmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        read(&self.appointments).map(|map| map.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn collect_sorted(
        &self,
        keep: impl Fn(&Appointment) -> bool,
    ) -> StoreResult<Vec<Appointment>> {
        let map = read(&self.appointments)?;
        let mut found: Vec<Appointment> = map.values().filter(|a| keep(a)).cloned().collect();
        found.sort_by_key(|a| a.start());
        Ok(found)
    }
}

impl AppointmentStore for InMemoryAppointmentStore {
    fn find_by_id(&self, id: AppointmentId) -> StoreResult<Option<Appointment>> {
        Ok(read(&self.appointments)?.get(&id).cloned())
    }

    fn save(&self, appointment: &Appointment) -> StoreResult<()> {
        write(&self.appointments)?.insert(appointment.id(), appointment.clone());
        Ok(())
    }

    fn find_active_by_doctor_in_range(
        &self,
        doctor: DoctorId,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> StoreResult<Vec<Appointment>> {
        self.collect_sorted(|a| {
            a.doctor() == doctor && a.is_active() && overlaps(a.start(), a.end(), from, to)
        })
    }

    fn find_active_by_patient_in_range(
        &self,
        patient: PatientId,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> StoreResult<Vec<Appointment>> {
        self.collect_sorted(|a| {
            a.patient() == patient && a.is_active() && overlaps(a.start(), a.end(), from, to)
        })
    }

    fn find_by_patient(&self, patient: PatientId) -> StoreResult<Vec<Appointment>> {
        self.collect_sorted(|a| a.patient() == patient)
    }

    fn find_by_doctor(&self, doctor: DoctorId) -> StoreResult<Vec<Appointment>> {
        self.collect_sorted(|a| a.doctor() == doctor)
    }

    fn find_by_date_range(
        &self,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> StoreResult<Vec<Appointment>> {
        self.collect_sorted(|a| a.start() >= from && a.start() < to)
    }
}

/// Registered doctors and patients.
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    doctors: RwLock<HashSet<DoctorId>>,
    patients: RwLock<HashSet<PatientId>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_doctor(&self, doctor: DoctorId) -> StoreResult<()> {
        write(&self.doctors)?.insert(doctor);
        Ok(())
    }

    pub fn add_patient(&self, patient: PatientId) -> StoreResult<()> {
        write(&self.patients)?.insert(patient);
        Ok(())
    }
}

impl DoctorLookup for InMemoryDirectory {
    fn exists(&self, doctor: DoctorId) -> StoreResult<bool> {
        Ok(read(&self.doctors)?.contains(&doctor))
    }
}

impl PatientLookup for InMemoryDirectory {
    fn exists(&self, patient: PatientId) -> StoreResult<bool> {
        Ok(read(&self.patients)?.contains(&patient))
    }
}

#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    records: RwLock<HashMap<AppointmentId, ClinicalRecord>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn collect(&self, keep: impl Fn(&ClinicalRecord) -> bool) -> StoreResult<Vec<ClinicalRecord>> {
        let map = read(&self.records)?;
        Ok(map.values().filter(|r| keep(r)).cloned().collect())
    }
}

impl ClinicalRecordStore for InMemoryRecordStore {
    fn find_by_appointment(
        &self,
        appointment: AppointmentId,
    ) -> StoreResult<Option<ClinicalRecord>> {
        Ok(read(&self.records)?.get(&appointment).cloned())
    }

    fn save(&self, record: &ClinicalRecord) -> StoreResult<()> {
        write(&self.records)?.insert(record.appointment, record.clone());
        Ok(())
    }

    fn find_by_patient(&self, patient: PatientId) -> StoreResult<Vec<ClinicalRecord>> {
        self.collect(|r| r.patient == patient)
    }

    fn find_by_doctor(&self, doctor: DoctorId) -> StoreResult<Vec<ClinicalRecord>> {
        self.collect(|r| r.doctor == doctor)
    }
}
