/*!
Monday-to-Sunday windows that scope what the dashboard shows.
*/
use serde::Deserialize;
use time::{
    Date, Duration, OffsetDateTime, Time, UtcOffset,
    format_description::FormatItem,
    macros::format_description,
};

const LABEL_FMT: &[FormatItem] = format_description!("[day].[month]");

/// Query string of `GET /dashboard`.
#[derive(Debug, Default, Deserialize)]
pub struct WeekQuery {
    pub offset: Option<String>,
    pub amount: Option<String>,
    pub dir: Option<String>,
}

/// Where the dashboard is looking: `offset` weeks from the current one,
/// and how many weeks the prev/next links jump.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WeekNav {
    pub offset: i64,
    pub amount: i64,
}

impl WeekQuery {
    /**
    Work out the week offset being asked for.

    Unparseable values fall back to their defaults (offset 0, amount 1),
    amount is never less than 1, and `dir=prev`/`dir=next` moves the offset
    by `amount` before anything else happens.
    */
    pub fn resolve(&self) -> WeekNav {
        fn number(s: &Option<String>) -> Option<i64> {
            s.as_deref().and_then(|s| s.trim().parse::<i64>().ok())
        }

        let amount = number(&self.amount).unwrap_or(1).max(1);
        let mut offset = number(&self.offset).unwrap_or(0);
        match self.dir.as_deref() {
            Some("prev") => { offset = offset.saturating_sub(amount); },
            Some("next") => { offset = offset.saturating_add(amount); },
            _ => {},
        }

        WeekNav { offset, amount }
    }
}

/// The Monday on or before `d`.
pub fn monday_of(d: Date) -> Date {
    let back = d.weekday().number_days_from_monday() as i64;
    d - Duration::days(back)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Week {
    /// Always a Monday.
    pub start: Date,
    /// Always the Sunday six days after `start`.
    pub end: Date,
}

impl Week {
    /// The week `offset` weeks away from the one containing `today`, or
    /// `None` if that falls off the end of the calendar.
    pub fn containing(today: Date, offset: i64) -> Option<Week> {
        let shift = Duration::checked_mul(Duration::WEEK, i32::try_from(offset).ok()?)?;
        let start = monday_of(today).checked_add(shift)?;
        let end = start.checked_add(Duration::days(6))?;
        Some(Week { start, end })
    }

    /// First instant of the week in `local` time.
    pub fn start_instant(&self, local: UtcOffset) -> OffsetDateTime {
        self.start.midnight().assume_offset(local)
    }

    /// Last instant of the week (end of Sunday) in `local` time.
    pub fn end_instant(&self, local: UtcOffset) -> OffsetDateTime {
        self.end.with_time(Time::MAX).assume_offset(local)
    }

    /// Something like `19.10 – 25.10`.
    pub fn label(&self) -> String {
        let start = self.start.format(&LABEL_FMT).unwrap_or_default();
        let end = self.end.format(&LABEL_FMT).unwrap_or_default();
        format!("{} – {}", &start, &end)
    }
}
