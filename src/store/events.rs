/*!
`Store` methods for events.
*/
use time::Date;
use tokio_postgres::{Row, error::SqlState};

use super::{DbError, Store};
use crate::error::SkedError;
use crate::sched::{Day, Event, EventPatch, EventRow, NewEvent};

const JOINED_SELECT: &str = "SELECT
        e.id, e.title, e.description, e.date, e.start_time, e.end_time,
        e.schedule_id, e.group_name, e.created_at,
        s.day_of_week AS slot_day, s.start_time AS slot_start_time,
        s.end_time AS slot_end_time, s.subject AS slot_subject,
        s.group_name AS slot_group_name
    FROM events e
    LEFT JOIN schedules s ON s.id = e.schedule_id";

const JOINED_ORDER: &str = "ORDER BY e.date, e.start_time, e.id";

fn event_from_row(row: &Row) -> Result<Event, DbError> {
    Ok(Event {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        date: row.try_get("date")?,
        start_time: row.try_get("start_time")?,
        end_time: row.try_get("end_time")?,
        schedule_id: row.try_get("schedule_id")?,
        group_name: row.try_get("group_name")?,
        created_at: row.try_get("created_at")?,
    })
}

fn event_row_from_row(row: &Row) -> Result<EventRow, DbError> {
    let slot_day: Option<&str> = row.try_get("slot_day")?;
    let slot_day: Option<Day> = match slot_day {
        Some(s) => Some(s.parse()?),
        None => None,
    };

    Ok(EventRow {
        event: event_from_row(row)?,
        slot_day,
        slot_start_time: row.try_get("slot_start_time")?,
        slot_end_time: row.try_get("slot_end_time")?,
        slot_subject: row.try_get("slot_subject")?,
        slot_group_name: row.try_get("slot_group_name")?,
    })
}

fn rows_to_events(rows: &[Row]) -> Result<Vec<EventRow>, DbError> {
    let mut v: Vec<EventRow> = Vec::with_capacity(rows.len());
    for row in rows.iter() {
        v.push(event_row_from_row(row)?);
    }
    Ok(v)
}

/// A slot id that doesn't exist shows up as a foreign key violation.
fn map_insert_error(e: tokio_postgres::Error) -> SkedError {
    if e.code() == Some(&SqlState::FOREIGN_KEY_VIOLATION) {
        SkedError::Validation("There is no such class in the schedule.".to_owned())
    } else {
        DbError::from(e).into()
    }
}

impl Store {
    pub async fn get_event(&self, id: i64) -> Result<Option<Event>, DbError> {
        log::trace!("Store::get_event( {} ) called.", &id);

        let client = self.connect().await?;
        match client.query_opt(
            "SELECT * FROM events WHERE id = $1",
            &[&id]
        ).await? {
            None => Ok(None),
            Some(row) => Ok(Some(event_from_row(&row)?)),
        }
    }

    /// Every event, in date and start time order.
    pub async fn get_all_events(&self) -> Result<Vec<EventRow>, DbError> {
        log::trace!("Store::get_all_events() called.");

        let client = self.connect().await?;
        let q = format!("{} {}", JOINED_SELECT, JOINED_ORDER);
        let rows = client.query(q.as_str(), &[]).await?;
        rows_to_events(&rows)
    }

    /// Every event dated between `from` and `to`, inclusive.
    pub async fn get_events_between(
        &self,
        from: Date,
        to: Date,
    ) -> Result<Vec<EventRow>, DbError> {
        log::trace!("Store::get_events_between( {}, {} ) called.", &from, &to);

        let client = self.connect().await?;
        let q = format!(
            "{} WHERE e.date >= $1 AND e.date <= $2 {}",
            JOINED_SELECT, JOINED_ORDER
        );
        let rows = client.query(q.as_str(), &[&from, &to]).await?;
        rows_to_events(&rows)
    }

    /**
    Events dated between `from` and `to` (inclusive) that concern `group`:
    those attached to one of the group's `slot_ids`, those for every group,
    and those for `group` itself.

    `slot_ids` may be empty.
    */
    pub async fn get_events_for_group_between(
        &self,
        slot_ids: &[i64],
        group: &str,
        from: Date,
        to: Date,
    ) -> Result<Vec<EventRow>, DbError> {
        log::trace!(
            "Store::get_events_for_group_between( [ {} slots ], {:?}, {}, {} ) called.",
            slot_ids.len(), group, &from, &to
        );

        let client = self.connect().await?;
        let q = format!(
            "{} WHERE (
                e.schedule_id = ANY($1)
                OR e.group_name IS NULL
                OR e.group_name = $2
            )
            AND e.date >= $3 AND e.date <= $4 {}",
            JOINED_SELECT, JOINED_ORDER
        );
        let rows = client.query(q.as_str(), &[&slot_ids, &group, &from, &to]).await?;
        rows_to_events(&rows)
    }

    /// Returns the new event's id.
    pub async fn insert_event(&self, ne: &NewEvent) -> Result<i64, SkedError> {
        log::trace!("Store::insert_event( {:?} ) called.", ne);

        let client = self.connect().await?;
        let row = client.query_one(
            "INSERT INTO events (
                title, description, date, start_time, end_time,
                schedule_id, group_name
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id",
            &[
                &ne.title, &ne.description, &ne.date, &ne.start_time,
                &ne.end_time, &ne.schedule_id, &ne.group_name,
            ]
        ).await.map_err(map_insert_error)?;

        let id: i64 = row.try_get("id").map_err(DbError::from)?;
        log::trace!("Inserted event {}.", &id);
        Ok(id)
    }

    /// Apply `patch` to event `id`. `SkedError::NotFound` if there's no
    /// such event.
    pub async fn update_event(&self, id: i64, patch: EventPatch) -> Result<(), SkedError> {
        log::trace!("Store::update_event( {}, {:?} ) called.", &id, &patch);

        let mut client = self.connect().await?;
        let t = client.transaction().await.map_err(DbError::from)?;

        let old = match t.query_opt(
            "SELECT * FROM events WHERE id = $1 FOR UPDATE",
            &[&id]
        ).await.map_err(DbError::from)? {
            Some(row) => event_from_row(&row)?,
            None => { return Err(SkedError::NotFound); },
        };

        let ne = patch.apply(&old)?;
        t.execute(
            "UPDATE events SET
                title = $1, description = $2, date = $3, start_time = $4,
                end_time = $5, schedule_id = $6, group_name = $7
            WHERE id = $8",
            &[
                &ne.title, &ne.description, &ne.date, &ne.start_time,
                &ne.end_time, &ne.schedule_id, &ne.group_name, &id,
            ]
        ).await.map_err(map_insert_error)?;

        t.commit().await.map_err(DbError::from)?;
        Ok(())
    }

    /// Returns the number of events deleted; deleting a nonexistent event
    /// isn't an error.
    pub async fn delete_event(&self, id: i64) -> Result<u64, DbError> {
        log::trace!("Store::delete_event( {} ) called.", &id);

        let client = self.connect().await?;
        let n = client.execute(
            "DELETE FROM events WHERE id = $1",
            &[&id]
        ).await?;
        Ok(n)
    }
}
