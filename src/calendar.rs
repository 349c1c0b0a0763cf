//! Weekly working calendar for doctors.
//!
//! Doctors work in named shifts (morning, afternoon, night). A weekly plan
//! lists the shifts per weekday; it expands into concrete dated blocks and
//! folds back from them. Free appointment slots within a day are generated
//! by stepping through the working window and skipping booked intervals.

use chrono::{Datelike, Duration, NaiveDate, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

use crate::models::DoctorId;
use crate::window::TimeWindow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Shift {
    Morning,
    Afternoon,
    Night,
}

impl Shift {
    pub const ALL: [Shift; 3] = [Shift::Morning, Shift::Afternoon, Shift::Night];

    pub fn from_string(value: &str) -> Result<Self, String> {
        match value.to_lowercase().trim() {
            "morning" => Ok(Shift::Morning),
            "afternoon" => Ok(Shift::Afternoon),
            "night" => Ok(Shift::Night),
            _ => Err(format!(
                "Invalid shift: '{}'. Must be one of: morning, afternoon, night",
                value
            )),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Shift::Morning => "MORNING",
            Shift::Afternoon => "AFTERNOON",
            Shift::Night => "NIGHT",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShiftHours {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl ShiftHours {
    fn at(start_hour: u32, end_hour: u32) -> Self {
        ShiftHours {
            start: NaiveTime::from_hms_opt(start_hour, 0, 0).unwrap_or(NaiveTime::MIN),
            end: NaiveTime::from_hms_opt(end_hour, 0, 0).unwrap_or(NaiveTime::MIN),
        }
    }
}

/// Hours of each shift. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShiftCatalog {
    pub morning: ShiftHours,
    pub afternoon: ShiftHours,
    pub night: ShiftHours,
}

impl Default for ShiftCatalog {
    fn default() -> Self {
        ShiftCatalog {
            morning: ShiftHours::at(8, 12),
            afternoon: ShiftHours::at(14, 18),
            night: ShiftHours::at(19, 23),
        }
    }
}

/// A concrete working block on a given date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleBlock {
    pub doctor: DoctorId,
    pub date: NaiveDate,
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub available: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayPlan {
    pub weekday: Weekday,
    pub active: bool,
    pub shifts: Vec<Shift>,
}

/// Shifts per weekday for one doctor, for the week starting on `week_start` (a Monday).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklyCalendar {
    pub doctor: DoctorId,
    pub week_start: NaiveDate,
    pub days: Vec<DayPlan>,
}

/// Monday of the week containing `date`, or the first representable date.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date.checked_sub_signed(Duration::days(i64::from(
        date.weekday().num_days_from_monday(),
    )))
    .unwrap_or(NaiveDate::MIN)
}

impl WeeklyCalendar {
    /// A plan with every day off, for the week containing `date`.
    pub fn empty(doctor: DoctorId, date: NaiveDate) -> Self {
        let monday = week_start(date);
        let days = std::iter::successors(Some(Weekday::Mon), |day| Some(day.succ()))
            .take(7)
            .map(|weekday| DayPlan {
                weekday,
                active: false,
                shifts: Vec::new(),
            })
            .collect();
        WeeklyCalendar {
            doctor,
            week_start: monday,
            days,
        }
    }

    /// Replace the shifts of one weekday; an empty list marks the day off.
    pub fn set_day(&mut self, weekday: Weekday, shifts: &[Shift]) {
        let mut shifts = shifts.to_vec();
        shifts.sort();
        shifts.dedup();
        if let Some(day) = self.days.iter_mut().find(|d| d.weekday == weekday) {
            day.active = !shifts.is_empty();
            day.shifts = shifts;
        }
    }

    pub fn day(&self, weekday: Weekday) -> Option<&DayPlan> {
        self.days.iter().find(|d| d.weekday == weekday)
    }

    pub fn working_days(&self) -> usize {
        self.days.iter().filter(|d| d.active).count()
    }
}

impl ShiftCatalog {
    pub fn hours(&self, shift: Shift) -> ShiftHours {
        match shift {
            Shift::Morning => self.morning,
            Shift::Afternoon => self.afternoon,
            Shift::Night => self.night,
        }
    }

    /// The shift whose hours match exactly, if any.
    pub fn identify(&self, start: NaiveTime, end: NaiveTime) -> Option<Shift> {
        Shift::ALL.into_iter().find(|shift| {
            let hours = self.hours(*shift);
            hours.start == start && hours.end == end
        })
    }

    pub fn check(&self) -> Result<(), String> {
        for shift in Shift::ALL {
            let hours = self.hours(shift);
            if hours.start >= hours.end {
                return Err(format!("Shift {} must start before it ends", shift.name()));
            }
        }
        Ok(())
    }

    /// Expand a weekly plan into dated blocks.
    pub fn blocks_for_week(&self, calendar: &WeeklyCalendar) -> Vec<ScheduleBlock> {
        let mut blocks = Vec::new();
        for day in calendar.days.iter().filter(|d| d.active) {
            let offset = i64::from(day.weekday.num_days_from_monday());
            let Some(date) = calendar.week_start.checked_add_signed(Duration::days(offset)) else {
                continue;
            };
            for shift in &day.shifts {
                let hours = self.hours(*shift);
                blocks.push(ScheduleBlock {
                    doctor: calendar.doctor,
                    date,
                    start: hours.start,
                    end: hours.end,
                    available: true,
                });
            }
        }
        blocks
    }

    /// Fold dated blocks back into a weekly plan.
    ///
    /// Blocks outside the week, belonging to another doctor, or matching no
    /// shift are ignored.
    pub fn calendar_from_blocks(
        &self,
        doctor: DoctorId,
        date: NaiveDate,
        blocks: &[ScheduleBlock],
    ) -> WeeklyCalendar {
        let mut calendar = WeeklyCalendar::empty(doctor, date);
        let last_day = calendar
            .week_start
            .checked_add_signed(Duration::days(6))
            .unwrap_or(NaiveDate::MAX);

        for block in blocks {
            if block.doctor != doctor || block.date < calendar.week_start || block.date > last_day {
                continue;
            }
            let Some(shift) = self.identify(block.start, block.end) else {
                continue;
            };
            if let Some(day) = calendar
                .days
                .iter_mut()
                .find(|d| d.weekday == block.date.weekday())
            {
                if !day.shifts.contains(&shift) {
                    day.shifts.push(shift);
                    day.shifts.sort();
                }
                day.active = true;
            }
        }
        calendar
    }
}

/// Free slots of `duration_minutes` on `date`, starting no earlier than
/// `first_start` and no later than `last_start`, stepping by the duration,
/// that do not overlap any `booked` window.
pub fn open_slots(
    date: NaiveDate,
    first_start: NaiveTime,
    last_start: NaiveTime,
    duration_minutes: u32,
    booked: &[TimeWindow],
) -> Vec<TimeWindow> {
    let mut slots = Vec::new();
    if duration_minutes == 0 {
        return slots;
    }

    let last = date.and_time(last_start);
    let mut current = date.and_time(first_start);

    while current <= last {
        let slot = TimeWindow::of(current, duration_minutes);
        if !booked.iter().any(|b| b.overlaps_with(&slot)) {
            slots.push(slot);
        }
        if slot.end <= current {
            break;
        }
        current = slot.end;
    }

    slots
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2030, 9, day).unwrap()
    }

    fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn week_starts_on_monday() {
        // 2030-09-04 is a Wednesday
        assert_eq!(week_start(date(4)), date(2));
        assert_eq!(week_start(date(2)), date(2));
        assert_eq!(week_start(date(8)), date(2));
    }

    #[test]
    fn weekly_plan_round_trips_through_blocks() {
        let catalog = ShiftCatalog::default();
        let doctor = DoctorId::new();
        let mut calendar = WeeklyCalendar::empty(doctor, date(4));
        calendar.set_day(Weekday::Mon, &[Shift::Afternoon, Shift::Morning]);
        calendar.set_day(Weekday::Fri, &[Shift::Night]);

        let blocks = catalog.blocks_for_week(&calendar);
        assert_eq!(blocks.len(), 3);
        assert!(blocks
            .iter()
            .any(|b| b.date == date(6) && b.start == time(19, 0) && b.end == time(23, 0)));

        let folded = catalog.calendar_from_blocks(doctor, date(2), &blocks);
        assert_eq!(folded, calendar);
        assert_eq!(folded.working_days(), 2);
    }

    #[test]
    fn unknown_and_foreign_blocks_are_ignored() {
        let catalog = ShiftCatalog::default();
        let doctor = DoctorId::new();
        let blocks = vec![
            ScheduleBlock {
                doctor,
                date: date(3),
                start: time(9, 0),
                end: time(10, 0),
                available: true,
            },
            ScheduleBlock {
                doctor: DoctorId::new(),
                date: date(3),
                start: time(8, 0),
                end: time(12, 0),
                available: true,
            },
            ScheduleBlock {
                doctor,
                date: date(10),
                start: time(8, 0),
                end: time(12, 0),
                available: true,
            },
        ];
        let calendar = catalog.calendar_from_blocks(doctor, date(3), &blocks);
        assert_eq!(calendar.working_days(), 0);
    }

    #[test]
    fn clearing_a_day_marks_it_off() {
        let mut calendar = WeeklyCalendar::empty(DoctorId::new(), date(2));
        calendar.set_day(Weekday::Tue, &[Shift::Morning]);
        calendar.set_day(Weekday::Tue, &[]);
        let tuesday = calendar.day(Weekday::Tue).unwrap();
        assert!(!tuesday.active);
        assert!(tuesday.shifts.is_empty());
    }

    #[test]
    fn open_slots_skip_booked_windows() {
        let booked = vec![TimeWindow::of(date(2).and_time(time(9, 0)), 30)];
        let slots = open_slots(date(2), time(8, 0), time(10, 0), 30, &booked);
        let starts: Vec<_> = slots.iter().map(|s| s.start.time()).collect();
        assert_eq!(
            starts,
            vec![time(8, 0), time(8, 30), time(9, 30), time(10, 0)]
        );
    }

    #[test]
    fn calendar_edges_do_not_overflow() {
        let doctor = DoctorId::new();
        let first = WeeklyCalendar::empty(doctor, NaiveDate::MIN);
        assert_eq!(first.days.len(), 7);
        assert_eq!(first.days[0].weekday, Weekday::Mon);

        let mut last = WeeklyCalendar::empty(doctor, NaiveDate::MAX);
        last.set_day(NaiveDate::MAX.weekday(), &[Shift::Morning]);
        let blocks = ShiftCatalog::default().blocks_for_week(&last);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].date, NaiveDate::MAX);

        let slots = open_slots(NaiveDate::MAX, time(20, 0), time(23, 59), 180, &[]);
        assert_eq!(slots.len(), 2);
        assert_eq!(slots[1].end, NaiveDateTime::MAX);
    }

    #[test]
    fn shift_names_parse() {
        assert_eq!(Shift::from_string("Night"), Ok(Shift::Night));
        assert!(Shift::from_string("evening").is_err());
        assert!(ShiftCatalog::default().check().is_ok());
    }
}
