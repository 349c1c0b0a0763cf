/// Command-line front desk for the clinic scheduler.
///
/// Runs against in-memory stores: register doctors and patients, book and
/// move appointments, and walk them through their lifecycle.
use std::cell::Cell;
use std::io::{self, Write};
use std::sync::Arc;

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use clinicsched::calendar::{Shift, WeeklyCalendar};
use clinicsched::config::{ClinicConfig, APP_NAME, APP_VERSION};
use clinicsched::memory::{InMemoryAppointmentStore, InMemoryDirectory, InMemoryRecordStore};
use clinicsched::{
    AppointmentId, AppointmentUpdate, AppointmentView, BookingRequest, ClinicalRecordService,
    DoctorId, PatientId, RecordContent, SchedulingPolicy, SchedulingService, SystemClock,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

struct ClinicCLI {
    config: ClinicConfig,
    scheduler: SchedulingService,
    records: ClinicalRecordService,
    directory: Arc<InMemoryDirectory>,
    doctors: Vec<(String, DoctorId)>,
    patients: Vec<(String, PatientId)>,
    stdin_closed: Cell<bool>,
    running: bool,
}

impl ClinicCLI {
    fn new(config: ClinicConfig) -> Self {
        let appointments = Arc::new(InMemoryAppointmentStore::new());
        let directory = Arc::new(InMemoryDirectory::new());
        let clock = Arc::new(SystemClock);

        let scheduler = SchedulingService::new(
            appointments.clone(),
            directory.clone(),
            directory.clone(),
            clock.clone(),
            SchedulingPolicy::new(config.policy.clone()),
        );
        let records = ClinicalRecordService::new(
            appointments,
            Arc::new(InMemoryRecordStore::new()),
            directory.clone(),
            directory.clone(),
            clock,
        );

        ClinicCLI {
            config,
            scheduler,
            records,
            directory,
            doctors: Vec::new(),
            patients: Vec::new(),
            stdin_closed: Cell::new(false),
            running: true,
        }
    }

    fn print_header(&self) {
        println!("\n{}", "=".repeat(60));
        println!("       CLINIC SCHEDULER {}", APP_VERSION);
        println!("{}", "=".repeat(60));
    }

    fn print_menu(&self) {
        println!("\n--- Main Menu ---");
        println!(" 1. Register doctor");
        println!(" 2. Register patient");
        println!(" 3. Book appointment");
        println!(" 4. View upcoming appointments");
        println!(" 5. Reschedule appointment");
        println!(" 6. Confirm / complete / no-show");
        println!(" 7. Cancel appointment");
        println!(" 8. View free slots");
        println!(" 9. Doctor statistics");
        println!("10. Add clinical record");
        println!("11. Run demo");
        println!("12. Exit");
        println!("{}", "-".repeat(20));
    }

    fn get_input(&self, prompt: &str, default: Option<&str>) -> String {
        if let Some(def) = default {
            print!("{} [{}]: ", prompt, def);
        } else {
            print!("{}: ", prompt);
        }
        let _ = io::stdout().flush();

        let mut input = String::new();
        if io::stdin().read_line(&mut input).unwrap_or(0) == 0 {
            self.stdin_closed.set(true);
            return default.unwrap_or("").to_string();
        }
        let input = input.trim();

        if input.is_empty() {
            default.unwrap_or("").to_string()
        } else {
            input.to_string()
        }
    }

    fn get_int_input(&self, prompt: &str, default: Option<i64>) -> i64 {
        loop {
            let default_str = default.map(|d| d.to_string());
            let input = self.get_input(prompt, default_str.as_deref());

            if let Ok(value) = input.parse::<i64>() {
                return value;
            }
            println!("Please enter a valid number");
        }
    }

    fn get_datetime_input(&self, prompt: &str) -> Option<NaiveDateTime> {
        let tomorrow = (self.scheduler.now() + Duration::days(1)).date();
        let default = tomorrow.and_hms_opt(10, 0, 0).map(|d| d.format("%Y-%m-%d %H:%M").to_string());
        let input = self.get_input(prompt, default.as_deref());
        match NaiveDateTime::parse_from_str(&input, "%Y-%m-%d %H:%M") {
            Ok(value) => Some(value),
            Err(_) => {
                println!("Expected YYYY-MM-DD HH:MM");
                None
            }
        }
    }

    fn choose<T: Copy>(&self, label: &str, entries: &[(String, T)]) -> Option<T> {
        if entries.is_empty() {
            println!("\nNo {}s registered yet", label);
            return None;
        }
        for (i, (name, _)) in entries.iter().enumerate() {
            println!("  {}. {}", i + 1, name);
        }
        let choice = self.get_int_input(&format!("Select {}", label), Some(1));
        match usize::try_from(choice).ok().and_then(|c| c.checked_sub(1)) {
            Some(index) if index < entries.len() => Some(entries[index].1),
            _ => {
                println!("Invalid choice");
                None
            }
        }
    }

    fn name_of_patient(&self, id: PatientId) -> &str {
        self.patients
            .iter()
            .find(|(_, p)| *p == id)
            .map(|(name, _)| name.as_str())
            .unwrap_or("?")
    }

    fn print_views(&self, views: &[AppointmentView]) {
        let mut current_date = None;
        for view in views {
            let date = view.start.date();
            if Some(date) != current_date {
                current_date = Some(date);
                println!("\n{}:", date.format("%A, %Y-%m-%d"));
            }
            println!(
                "  {} - {}  {:10} {} ({})",
                view.start.format("%H:%M"),
                view.end.format("%H:%M"),
                view.status_label,
                self.name_of_patient(view.patient),
                view.reason
            );
            println!("    ID: {}", view.id);
        }
    }

    fn register_doctor(&mut self) -> Option<DoctorId> {
        let name = self.get_input("Doctor name", Some("Dr. Smith"));
        let id = DoctorId::new();
        match self.directory.add_doctor(id) {
            Ok(()) => {
                println!("\nRegistered {} ({})", name, id);
                self.doctors.push((name, id));
                Some(id)
            }
            Err(e) => {
                println!("Error registering doctor: {}", e);
                None
            }
        }
    }

    fn register_patient(&mut self) -> Option<PatientId> {
        let name = self.get_input("Patient name", None);
        let id = PatientId::new();
        match self.directory.add_patient(id) {
            Ok(()) => {
                println!("\nRegistered {} ({})", name, id);
                self.patients.push((name, id));
                Some(id)
            }
            Err(e) => {
                println!("Error registering patient: {}", e);
                None
            }
        }
    }

    fn book(&self) {
        println!("\n--- Book Appointment ---");
        let Some(doctor) = self.choose("doctor", &self.doctors) else {
            return;
        };
        let Some(patient) = self.choose("patient", &self.patients) else {
            return;
        };
        let Some(start) = self.get_datetime_input("Start") else {
            return;
        };
        let default = i64::from(self.config.policy.default_duration_minutes);
        let minutes = self.get_int_input("Duration (minutes)", Some(default));
        let reason = self.get_input("Reason", Some("Consultation"));

        let request = BookingRequest {
            patient,
            doctor,
            start,
            duration_minutes: u32::try_from(minutes).ok(),
            reason,
        };
        match self.scheduler.book(request) {
            Ok(appointment) => println!("\nBooked: {}", appointment),
            Err(e) => println!("\nCould not book: {}", e),
        }
    }

    fn view_upcoming(&self) {
        let Some(doctor) = self.choose("doctor", &self.doctors) else {
            return;
        };
        match self.scheduler.upcoming_for_doctor(doctor) {
            Ok(views) if views.is_empty() => println!("\nNo upcoming appointments"),
            Ok(views) => {
                println!("\n--- Upcoming Appointments ({}) ---", views.len());
                self.print_views(&views);
            }
            Err(e) => println!("Error: {}", e),
        }
    }

    fn pick_appointment(&self, doctor: DoctorId) -> Option<AppointmentId> {
        let views = match self.scheduler.all_for_doctor(doctor) {
            Ok(views) => views,
            Err(e) => {
                println!("Error: {}", e);
                return None;
            }
        };
        let entries: Vec<(String, AppointmentId)> = views
            .iter()
            .map(|v| {
                (
                    format!(
                        "{} {} [{}]",
                        v.start.format("%Y-%m-%d %H:%M"),
                        self.name_of_patient(v.patient),
                        v.status_label
                    ),
                    v.id,
                )
            })
            .collect();
        self.choose("appointment", &entries)
    }

    fn reschedule(&self) {
        println!("\n--- Reschedule Appointment ---");
        let Some(doctor) = self.choose("doctor", &self.doctors) else {
            return;
        };
        let Some(id) = self.pick_appointment(doctor) else {
            return;
        };
        let Some(start) = self.get_datetime_input("New start") else {
            return;
        };
        let update = AppointmentUpdate {
            start: Some(start),
            ..AppointmentUpdate::default()
        };
        match self.scheduler.reschedule(id, update) {
            Ok(appointment) => println!("\nMoved: {}", appointment),
            Err(e) => println!("\nCould not reschedule: {}", e),
        }
    }

    fn transition(&self) {
        let Some(doctor) = self.choose("doctor", &self.doctors) else {
            return;
        };
        let Some(id) = self.pick_appointment(doctor) else {
            return;
        };
        println!("  1. Confirm\n  2. Complete\n  3. Mark no-show");
        let result = match self.get_int_input("Action", Some(1)) {
            1 => self.scheduler.confirm(id, doctor),
            2 => self.scheduler.complete(id, doctor),
            3 => self.scheduler.mark_no_show(id, doctor),
            _ => {
                println!("Invalid choice");
                return;
            }
        };
        match result {
            Ok(appointment) => println!("\nNow {}", appointment.status().label()),
            Err(e) => println!("\nRejected: {}", e),
        }
    }

    fn cancel(&self) {
        println!("\n--- Cancel Appointment ---");
        let Some(doctor) = self.choose("doctor", &self.doctors) else {
            return;
        };
        let Some(id) = self.pick_appointment(doctor) else {
            return;
        };
        let note = self.get_input("Note (optional)", Some(""));
        let note = (!note.is_empty()).then_some(note);
        match self.scheduler.cancel(id, doctor.as_uuid(), note) {
            Ok(_) => println!("\nAppointment cancelled, the time is free again"),
            Err(e) => println!("\nCould not cancel: {}", e),
        }
    }

    fn view_slots(&self) {
        let Some(doctor) = self.choose("doctor", &self.doctors) else {
            return;
        };
        let tomorrow = (self.scheduler.now() + Duration::days(1)).date();
        let default = tomorrow.to_string();
        let input = self.get_input("Date (YYYY-MM-DD)", Some(default.as_str()));
        let Ok(date) = NaiveDate::parse_from_str(&input, "%Y-%m-%d") else {
            println!("Invalid date");
            return;
        };
        match self.scheduler.available_slots(doctor, date, None) {
            Ok(slots) if slots.is_empty() => println!("\nNo free slots"),
            Ok(slots) => {
                println!("\n--- Free Slots on {} ({}) ---", date, slots.len());
                for slot in slots {
                    println!("  {} - {}", slot.start.format("%H:%M"), slot.end.format("%H:%M"));
                }
            }
            Err(e) => println!("Error: {}", e),
        }
    }

    fn stats(&self) {
        let Some(doctor) = self.choose("doctor", &self.doctors) else {
            return;
        };
        match self.scheduler.stats_for_doctor(doctor) {
            Ok(stats) => {
                println!("\n--- Statistics ---");
                println!("  Scheduled: {}", stats.scheduled);
                println!("  Confirmed: {}", stats.confirmed);
                println!("  Completed: {}", stats.completed);
                println!("  Cancelled: {}", stats.cancelled);
                println!("  No show:   {}", stats.no_show);
                println!("  Total:     {}", stats.total());
            }
            Err(e) => println!("Error: {}", e),
        }
    }

    fn add_record(&self) {
        let Some(doctor) = self.choose("doctor", &self.doctors) else {
            return;
        };
        let Some(id) = self.pick_appointment(doctor) else {
            return;
        };
        let content = RecordContent {
            diagnosis: Some(self.get_input("Diagnosis", Some(""))),
            prescription: Some(self.get_input("Prescription", Some(""))),
            notes: Some(self.get_input("Notes", Some(""))),
        };
        match self.records.attach(id, doctor, content) {
            Ok(_) => println!("\nRecord saved"),
            Err(e) => println!("\nCould not save record: {}", e),
        }
    }

    fn run_demo(&mut self) {
        println!("\n--- Running Demo ---");

        let doctor = DoctorId::new();
        let alice = PatientId::new();
        let bob = PatientId::new();
        let registered = self
            .directory
            .add_doctor(doctor)
            .and_then(|_| self.directory.add_patient(alice))
            .and_then(|_| self.directory.add_patient(bob));
        if let Err(e) = registered {
            println!("Error: {}", e);
            return;
        }
        self.doctors.push(("Dr. Demo".to_string(), doctor));
        self.patients.push(("Alice Brown".to_string(), alice));
        self.patients.push(("Bob Wilson".to_string(), bob));

        let mut week = WeeklyCalendar::empty(doctor, self.scheduler.now().date());
        for day in [Weekday::Mon, Weekday::Wed, Weekday::Fri] {
            week.set_day(day, &[Shift::Morning, Shift::Afternoon]);
        }
        println!(
            "Dr. Demo works {} days a week ({} shift blocks)",
            week.working_days(),
            self.config.shifts.blocks_for_week(&week).len()
        );

        let tomorrow = (self.scheduler.now() + Duration::days(1)).date();
        let at = |h: u32, m: u32| tomorrow.and_time(NaiveTime::from_hms_opt(h, m, 0).unwrap_or(NaiveTime::MIN));

        let attempts = [
            ("Alice Brown", alice, at(10, 0), "Annual checkup"),
            ("Bob Wilson", bob, at(10, 15), "Follow-up on test results"),
            ("Bob Wilson", bob, at(10, 30), "Follow-up on test results"),
        ];

        let mut first = None;
        for (name, patient, start, reason) in attempts {
            let request = BookingRequest {
                patient,
                doctor,
                start,
                duration_minutes: Some(30),
                reason: reason.to_string(),
            };
            match self.scheduler.book(request) {
                Ok(appointment) => {
                    println!("  {:12} {} -> booked", name, start.format("%H:%M"));
                    if first.is_none() {
                        first = Some(appointment.id());
                    }
                }
                Err(e) => println!("  {:12} {} -> {}", name, start.format("%H:%M"), e),
            }
        }

        if let Some(id) = first {
            if let Err(e) = self.scheduler.confirm(id, doctor) {
                println!("Error: {}", e);
            }
            if let Err(e) = self.scheduler.cancel(id, alice.as_uuid(), None) {
                println!("Error: {}", e);
            }
            if let Err(e) = self.scheduler.cancel(id, alice.as_uuid(), None) {
                println!("  Cancelling twice: {}", e);
            }
        }

        println!("\nNote: Bob's 10:15 request overlapped Alice's visit and was refused;");
        println!("10:30 starts exactly when her visit ends, so it was accepted.");
    }

    fn run(&mut self) {
        self.print_header();

        while self.running {
            self.print_menu();

            let choice = self.get_int_input("Enter choice", Some(11));
            if self.stdin_closed.get() {
                self.running = false;
                break;
            }

            match choice {
                1 => {
                    self.register_doctor();
                }
                2 => {
                    self.register_patient();
                }
                3 => self.book(),
                4 => self.view_upcoming(),
                5 => self.reschedule(),
                6 => self.transition(),
                7 => self.cancel(),
                8 => self.view_slots(),
                9 => self.stats(),
                10 => self.add_record(),
                11 => self.run_demo(),
                12 => {
                    self.running = false;
                    println!("\nGoodbye!");
                }
                _ => println!("Invalid choice"),
            }
        }
    }
}

fn main() {
    let config = match ClinicConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}: {}", APP_NAME, e);
            std::process::exit(1);
        }
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_filter.as_str()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!(version = APP_VERSION, "Starting {}", APP_NAME);
    let mut cli = ClinicCLI::new(config);
    cli.run();
    info!("Shutting down");
}
