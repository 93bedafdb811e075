/*!
Schedule slots, homework assignments, and events, along with the form data
used to create and update them.

Times of day are `time::Time`, calendar days are `time::Date`, and due dates
are absolute `time::OffsetDateTime`s kept in UTC.
*/
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize, Serializer};
use time::{
    Date, OffsetDateTime, PrimitiveDateTime, Time, UtcOffset,
    format_description::{FormatItem, well_known::Rfc3339},
    macros::format_description,
};

use crate::error::SkedError;

static GROUP_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]{4}$").unwrap());

const HM_FMT: &[FormatItem] = format_description!("[hour]:[minute]");
const HMS_FMT: &[FormatItem] = format_description!("[hour]:[minute]:[second]");
const DATE_FMT: &[FormatItem] = format_description!("[year]-[month]-[day]");
const DATETIME_FMTS: &[&[FormatItem]] = &[
    format_description!("[year]-[month]-[day]T[hour]:[minute]"),
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
    format_description!("[year]-[month]-[day] [hour]:[minute]"),
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"),
];

const GROUP_MSG: &str = "Group must be four digits (for example, 3011).";

/// Ensure `group` is a four-digit group code.
pub fn check_group(group: &str) -> Result<(), SkedError> {
    if GROUP_RE.is_match(group) {
        Ok(())
    } else {
        Err(SkedError::Validation(GROUP_MSG.to_owned()))
    }
}

/**
Day of the week a schedule slot recurs on.

These are stored as text (`"mon"`, `"tue"`, ...), which doesn't sort in
calendar order; use `Day::number()` (Monday is 1) for that.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Day {
    Mon,
    Tue,
    Wed,
    Thu,
    Fri,
    Sat,
    Sun,
}

impl Day {
    pub const ALL: [Day; 7] = [
        Day::Mon, Day::Tue, Day::Wed, Day::Thu, Day::Fri, Day::Sat, Day::Sun,
    ];

    pub fn token(&self) -> &'static str {
        match self {
            Day::Mon => "mon",
            Day::Tue => "tue",
            Day::Wed => "wed",
            Day::Thu => "thu",
            Day::Fri => "fri",
            Day::Sat => "sat",
            Day::Sun => "sun",
        }
    }

    pub fn number(&self) -> u8 {
        match self {
            Day::Mon => 1,
            Day::Tue => 2,
            Day::Wed => 3,
            Day::Thu => 4,
            Day::Fri => 5,
            Day::Sat => 6,
            Day::Sun => 7,
        }
    }
}

impl std::fmt::Display for Day {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.token())
    }
}

impl std::str::FromStr for Day {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        match lower.as_str() {
            "mon" | "monday"    => Ok(Day::Mon),
            "tue" | "tuesday"   => Ok(Day::Tue),
            "wed" | "wednesday" => Ok(Day::Wed),
            "thu" | "thursday"  => Ok(Day::Thu),
            "fri" | "friday"    => Ok(Day::Fri),
            "sat" | "saturday"  => Ok(Day::Sat),
            "sun" | "sunday"    => Ok(Day::Sun),
            _ => Err(format!("{:?} is not a day of the week.", s)),
        }
    }
}

impl Serialize for Day {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.token())
    }
}

/// Serialize times of day as `HH:MM`.
mod hhmm {
    use serde::Serializer;
    use time::Time;

    use super::HM_FMT;

    pub fn serialize<S: Serializer>(t: &Time, serializer: S) -> Result<S::Ok, S::Error> {
        let s = t.format(&HM_FMT).map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(&s)
    }

    pub mod option {
        use super::*;

        pub fn serialize<S: Serializer>(
            t: &Option<Time>,
            serializer: S
        ) -> Result<S::Ok, S::Error> {
            match t {
                Some(t) => super::serialize(t, serializer),
                None => serializer.serialize_none(),
            }
        }
    }
}

pub fn parse_time(s: &str) -> Result<Time, SkedError> {
    let s = s.trim();
    Time::parse(s, &HM_FMT)
        .or_else(|_| Time::parse(s, &HMS_FMT))
        .map_err(|_| SkedError::Validation(format!(
            "Unable to read {:?} as a time of day (HH:MM).", s
        )))
}

/**
Read a timestamp from form input and return it in UTC.

RFC 3339 strings carry their own offset; anything without one (including a
bare date, taken as midnight) is read in `local`.
*/
pub fn parse_timestamp(s: &str, local: UtcOffset) -> Result<OffsetDateTime, SkedError> {
    let s = s.trim();

    if let Ok(t) = OffsetDateTime::parse(s, &Rfc3339) {
        return Ok(t.to_offset(UtcOffset::UTC));
    }
    for fmt in DATETIME_FMTS.iter() {
        if let Ok(pdt) = PrimitiveDateTime::parse(s, fmt) {
            return Ok(pdt.assume_offset(local).to_offset(UtcOffset::UTC));
        }
    }
    if let Ok(d) = Date::parse(s, &DATE_FMT) {
        return Ok(d.midnight().assume_offset(local).to_offset(UtcOffset::UTC));
    }

    Err(SkedError::Validation(format!("Unable to read {:?} as a date.", s)))
}

/// Read a calendar date from form input. Full timestamps are accepted and
/// reduced to their date in `local`.
pub fn parse_date(s: &str, local: UtcOffset) -> Result<Date, SkedError> {
    let s = s.trim();
    if let Ok(d) = Date::parse(s, &DATE_FMT) {
        return Ok(d);
    }
    parse_timestamp(s, local).map(|t| t.to_offset(local).date())
}

fn parse_id(s: &str, what: &str) -> Result<i64, SkedError> {
    match s.trim().parse::<i64>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(SkedError::Validation(format!("{:?} is not a valid {}.", s, what))),
    }
}

fn check_span(start: Time, end: Time) -> Result<(), SkedError> {
    if end > start {
        Ok(())
    } else {
        Err(SkedError::Validation("End time must come after start time.".to_owned()))
    }
}

/// Trimmed value of a field that must be present and non-blank.
fn supplied(field: &Option<String>) -> Option<String> {
    match field.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(s) => Some(s.to_owned()),
    }
}

/**
Value of an optional field on update:

  * `None` if the field was absent (keep the existing value)
  * `Some(None)` if it was present but blank (clear it)
  * `Some(Some(x))` otherwise
*/
fn clearable(field: &Option<String>) -> Option<Option<String>> {
    field.as_deref().map(|s| match s.trim() {
        "" => None,
        s => Some(s.to_owned()),
    })
}

fn missing() -> SkedError {
    SkedError::Validation("Please fill in all required fields.".to_owned())
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Slot {
    pub id: i64,
    pub day_of_week: Day,
    #[serde(with = "hhmm")]
    pub start_time: Time,
    #[serde(with = "hhmm")]
    pub end_time: Time,
    pub subject: String,
    pub group_name: String,
    pub room: Option<String>,
    pub teacher_name: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct NewSlot {
    pub day_of_week: Day,
    pub start_time: Time,
    pub end_time: Time,
    pub subject: String,
    pub group_name: String,
    pub room: Option<String>,
    pub teacher_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotForm {
    pub day_of_week: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub subject: Option<String>,
    pub group_name: Option<String>,
    pub room: Option<String>,
    pub teacher_name: Option<String>,
}

/// Changes to a schedule slot; `None` means "leave as is".
#[derive(Debug, Default)]
pub struct SlotPatch {
    pub day_of_week: Option<Day>,
    pub start_time: Option<Time>,
    pub end_time: Option<Time>,
    pub subject: Option<String>,
    pub group_name: Option<String>,
    pub room: Option<Option<String>>,
    pub teacher_name: Option<Option<String>>,
}

impl SlotForm {
    pub fn to_new(&self) -> Result<NewSlot, SkedError> {
        let day = supplied(&self.day_of_week).ok_or_else(missing)?;
        let start = supplied(&self.start_time).ok_or_else(missing)?;
        let end = supplied(&self.end_time).ok_or_else(missing)?;
        let subject = supplied(&self.subject).ok_or_else(missing)?;
        let group_name = supplied(&self.group_name).ok_or_else(missing)?;
        check_group(&group_name)?;

        let day_of_week: Day = day.parse().map_err(SkedError::Validation)?;
        let start_time = parse_time(&start)?;
        let end_time = parse_time(&end)?;
        check_span(start_time, end_time)?;

        Ok(NewSlot {
            day_of_week, start_time, end_time, subject, group_name,
            room: supplied(&self.room),
            teacher_name: supplied(&self.teacher_name),
        })
    }

    pub fn to_patch(&self) -> Result<SlotPatch, SkedError> {
        let day_of_week = match supplied(&self.day_of_week) {
            Some(s) => Some(s.parse::<Day>().map_err(SkedError::Validation)?),
            None => None,
        };
        let start_time = supplied(&self.start_time)
            .map(|s| parse_time(&s)).transpose()?;
        let end_time = supplied(&self.end_time)
            .map(|s| parse_time(&s)).transpose()?;
        let group_name = supplied(&self.group_name);
        if let Some(g) = &group_name {
            check_group(g)?;
        }

        Ok(SlotPatch {
            day_of_week, start_time, end_time, group_name,
            subject: supplied(&self.subject),
            room: clearable(&self.room),
            teacher_name: clearable(&self.teacher_name),
        })
    }
}

impl SlotPatch {
    pub fn apply(self, old: &Slot) -> Result<NewSlot, SkedError> {
        let s = NewSlot {
            day_of_week: self.day_of_week.unwrap_or(old.day_of_week),
            start_time: self.start_time.unwrap_or(old.start_time),
            end_time: self.end_time.unwrap_or(old.end_time),
            subject: self.subject.unwrap_or_else(|| old.subject.clone()),
            group_name: self.group_name.unwrap_or_else(|| old.group_name.clone()),
            room: self.room.unwrap_or_else(|| old.room.clone()),
            teacher_name: self.teacher_name.unwrap_or_else(|| old.teacher_name.clone()),
        };
        check_span(s.start_time, s.end_time)?;
        Ok(s)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub id: i64,
    pub schedule_id: i64,
    pub homework: String,
    #[serde(with = "time::serde::rfc3339")]
    pub due_date: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub extended_due_date: Option<OffsetDateTime>,
    pub extended_penalty: Option<i32>,
    #[serde(rename = "createdByUserId")]
    pub created_by: i64,
    pub subject_text: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// An assignment joined with its schedule slot and its author.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentRow {
    #[serde(flatten)]
    pub assignment: Assignment,
    /// The assignment's own subject text if it has one, otherwise the slot's.
    pub display_subject: String,
    pub day_of_week: Day,
    #[serde(with = "hhmm")]
    pub start_time: Time,
    #[serde(with = "hhmm")]
    pub end_time: Time,
    pub group_name: String,
    pub room: Option<String>,
    pub teacher_name: Option<String>,
    pub teacher_email: Option<String>,
    pub teacher_full_name: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct NewAssignment {
    pub schedule_id: i64,
    /// The group the teacher says the slot is for; checked against the slot
    /// at insertion.
    pub group_name: String,
    pub subject_text: String,
    pub homework: String,
    pub due_date: OffsetDateTime,
    pub created_by: i64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentForm {
    pub schedule_id: Option<String>,
    pub group_name: Option<String>,
    pub subject_text: Option<String>,
    pub homework: Option<String>,
    pub due_date: Option<String>,
    pub extended_due_date: Option<String>,
    pub extended_penalty: Option<String>,
}

#[derive(Debug, Default)]
pub struct AssignmentPatch {
    pub homework: Option<String>,
    pub due_date: Option<OffsetDateTime>,
    pub extended_due_date: Option<Option<OffsetDateTime>>,
    pub extended_penalty: Option<Option<i32>>,
    pub subject_text: Option<String>,
}

/// The columns of an assignment its author may change.
#[derive(Clone, Debug, PartialEq)]
pub struct AssignmentEdit {
    pub homework: String,
    pub due_date: OffsetDateTime,
    pub extended_due_date: Option<OffsetDateTime>,
    pub extended_penalty: Option<i32>,
    pub subject_text: Option<String>,
}

impl AssignmentForm {
    pub fn to_new(&self, created_by: i64, local: UtcOffset) -> Result<NewAssignment, SkedError> {
        let schedule_id = supplied(&self.schedule_id).ok_or_else(missing)?;
        let group_name = supplied(&self.group_name).ok_or_else(missing)?;
        let subject_text = supplied(&self.subject_text).ok_or_else(missing)?;
        let homework = supplied(&self.homework).ok_or_else(missing)?;
        let due_date = supplied(&self.due_date).ok_or_else(missing)?;
        check_group(&group_name)?;

        Ok(NewAssignment {
            schedule_id: parse_id(&schedule_id, "schedule id")?,
            group_name,
            subject_text,
            homework,
            due_date: parse_timestamp(&due_date, local)?,
            created_by,
        })
    }

    pub fn to_patch(&self, local: UtcOffset) -> Result<AssignmentPatch, SkedError> {
        let due_date = supplied(&self.due_date)
            .map(|s| parse_timestamp(&s, local)).transpose()?;
        let extended_due_date = match clearable(&self.extended_due_date) {
            Some(Some(s)) => Some(Some(parse_timestamp(&s, local)?)),
            Some(None) => Some(None),
            None => None,
        };
        let extended_penalty = match clearable(&self.extended_penalty) {
            Some(Some(s)) => match s.parse::<i32>() {
                Ok(n) if n >= 0 => Some(Some(n)),
                _ => {
                    return Err(SkedError::Validation(format!(
                        "{:?} is not a valid penalty.", &s
                    )));
                },
            },
            Some(None) => Some(None),
            None => None,
        };

        Ok(AssignmentPatch {
            homework: supplied(&self.homework),
            due_date,
            extended_due_date,
            extended_penalty,
            subject_text: supplied(&self.subject_text),
        })
    }
}

impl AssignmentPatch {
    pub fn apply(self, old: &Assignment) -> AssignmentEdit {
        AssignmentEdit {
            homework: self.homework.unwrap_or_else(|| old.homework.clone()),
            due_date: self.due_date.unwrap_or(old.due_date),
            extended_due_date: self.extended_due_date.unwrap_or(old.extended_due_date),
            extended_penalty: self.extended_penalty.unwrap_or(old.extended_penalty),
            subject_text: match self.subject_text {
                Some(s) => Some(s),
                None => old.subject_text.clone(),
            },
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub date: Date,
    #[serde(with = "hhmm")]
    pub start_time: Time,
    #[serde(with = "hhmm")]
    pub end_time: Time,
    pub schedule_id: Option<i64>,
    /// `None` means the event concerns every group.
    pub group_name: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// An event along with whatever it can see of its (optional) schedule slot.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRow {
    #[serde(flatten)]
    pub event: Event,
    pub slot_day: Option<Day>,
    #[serde(with = "hhmm::option")]
    pub slot_start_time: Option<Time>,
    #[serde(with = "hhmm::option")]
    pub slot_end_time: Option<Time>,
    pub slot_subject: Option<String>,
    pub slot_group_name: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct NewEvent {
    pub title: String,
    pub description: Option<String>,
    pub date: Date,
    pub start_time: Time,
    pub end_time: Time,
    pub schedule_id: Option<i64>,
    pub group_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventForm {
    pub title: Option<String>,
    pub description: Option<String>,
    pub date: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub schedule_id: Option<String>,
    pub group_name: Option<String>,
}

#[derive(Debug, Default)]
pub struct EventPatch {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub date: Option<Date>,
    pub start_time: Option<Time>,
    pub end_time: Option<Time>,
    pub schedule_id: Option<Option<i64>>,
    pub group_name: Option<Option<String>>,
}

fn clearable_group(field: &Option<String>) -> Result<Option<Option<String>>, SkedError> {
    let g = clearable(field);
    if let Some(Some(g)) = &g {
        check_group(g)?;
    }
    Ok(g)
}

fn clearable_id(field: &Option<String>) -> Result<Option<Option<i64>>, SkedError> {
    match clearable(field) {
        Some(Some(s)) => Ok(Some(Some(parse_id(&s, "schedule id")?))),
        Some(None) => Ok(Some(None)),
        None => Ok(None),
    }
}

impl EventForm {
    pub fn to_new(&self, local: UtcOffset) -> Result<NewEvent, SkedError> {
        let title = supplied(&self.title).ok_or_else(missing)?;
        let date = supplied(&self.date).ok_or_else(missing)?;
        let start = supplied(&self.start_time).ok_or_else(missing)?;
        let end = supplied(&self.end_time).ok_or_else(missing)?;

        let start_time = parse_time(&start)?;
        let end_time = parse_time(&end)?;
        check_span(start_time, end_time)?;

        Ok(NewEvent {
            title,
            description: supplied(&self.description),
            date: parse_date(&date, local)?,
            start_time,
            end_time,
            schedule_id: clearable_id(&self.schedule_id)?.flatten(),
            group_name: clearable_group(&self.group_name)?.flatten(),
        })
    }

    pub fn to_patch(&self, local: UtcOffset) -> Result<EventPatch, SkedError> {
        Ok(EventPatch {
            title: supplied(&self.title),
            description: clearable(&self.description),
            date: supplied(&self.date).map(|s| parse_date(&s, local)).transpose()?,
            start_time: supplied(&self.start_time).map(|s| parse_time(&s)).transpose()?,
            end_time: supplied(&self.end_time).map(|s| parse_time(&s)).transpose()?,
            schedule_id: clearable_id(&self.schedule_id)?,
            group_name: clearable_group(&self.group_name)?,
        })
    }
}

impl EventPatch {
    pub fn apply(self, old: &Event) -> Result<NewEvent, SkedError> {
        let e = NewEvent {
            title: self.title.unwrap_or_else(|| old.title.clone()),
            description: self.description.unwrap_or_else(|| old.description.clone()),
            date: self.date.unwrap_or(old.date),
            start_time: self.start_time.unwrap_or(old.start_time),
            end_time: self.end_time.unwrap_or(old.end_time),
            schedule_id: self.schedule_id.unwrap_or(old.schedule_id),
            group_name: self.group_name.unwrap_or_else(|| old.group_name.clone()),
        };
        check_span(e.start_time, e.end_time)?;
        Ok(e)
    }
}
