/*!
`Store` methods for schedule slots.

Deleting a slot takes its assignments with it and detaches its events; the
foreign keys in the schema do the work.
*/
use tokio_postgres::Row;

use super::{DbError, SLOT_ORDER, Store};
use crate::error::SkedError;
use crate::sched::{Day, NewSlot, Slot, SlotPatch};

pub(crate) fn slot_from_row(row: &Row) -> Result<Slot, DbError> {
    let day_str: &str = row.try_get("day_of_week")?;
    let day: Day = day_str.parse()?;

    Ok(Slot {
        id: row.try_get("id")?,
        day_of_week: day,
        start_time: row.try_get("start_time")?,
        end_time: row.try_get("end_time")?,
        subject: row.try_get("subject")?,
        group_name: row.try_get("group_name")?,
        room: row.try_get("room")?,
        teacher_name: row.try_get("teacher_name")?,
    })
}

impl Store {
    /// All slots (or all of one group's slots), Monday first, then by
    /// start time.
    pub async fn get_slots(
        &self,
        group_name: Option<&str>,
    ) -> Result<Vec<Slot>, DbError> {
        log::trace!("Store::get_slots( {:?} ) called.", &group_name);

        let client = self.connect().await?;
        let rows = match group_name {
            Some(g) => {
                let q = format!(
                    "SELECT s.* FROM schedules s WHERE s.group_name = $1 ORDER BY {}",
                    SLOT_ORDER.as_str()
                );
                client.query(q.as_str(), &[&g]).await?
            },
            None => {
                let q = format!("SELECT s.* FROM schedules s ORDER BY {}", SLOT_ORDER.as_str());
                client.query(q.as_str(), &[]).await?
            },
        };

        let mut slots: Vec<Slot> = Vec::with_capacity(rows.len());
        for row in rows.iter() {
            slots.push(slot_from_row(row)?);
        }
        Ok(slots)
    }

    pub async fn get_slot(&self, id: i64) -> Result<Option<Slot>, DbError> {
        log::trace!("Store::get_slot( {} ) called.", &id);

        let client = self.connect().await?;
        match client.query_opt(
            "SELECT * FROM schedules WHERE id = $1",
            &[&id]
        ).await? {
            None => Ok(None),
            Some(row) => Ok(Some(slot_from_row(&row)?)),
        }
    }

    /// Returns the new slot's id.
    pub async fn insert_slot(&self, ns: &NewSlot) -> Result<i64, DbError> {
        log::trace!("Store::insert_slot( {:?} ) called.", ns);

        let client = self.connect().await?;
        let row = client.query_one(
            "INSERT INTO schedules (
                day_of_week, start_time, end_time, subject, group_name,
                room, teacher_name
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id",
            &[
                &ns.day_of_week.token(), &ns.start_time, &ns.end_time,
                &ns.subject, &ns.group_name, &ns.room, &ns.teacher_name,
            ]
        ).await?;

        let id: i64 = row.try_get("id")?;
        log::trace!("Inserted schedule slot {}.", &id);
        Ok(id)
    }

    /// Apply `patch` to slot `id`. `SkedError::NotFound` if there's no
    /// such slot.
    pub async fn update_slot(
        &self,
        id: i64,
        patch: SlotPatch,
    ) -> Result<(), SkedError> {
        log::trace!("Store::update_slot( {}, {:?} ) called.", &id, &patch);

        let mut client = self.connect().await?;
        let t = client.transaction().await.map_err(DbError::from)?;

        let old = match t.query_opt(
            "SELECT * FROM schedules WHERE id = $1 FOR UPDATE",
            &[&id]
        ).await.map_err(DbError::from)? {
            Some(row) => slot_from_row(&row)?,
            None => { return Err(SkedError::NotFound); },
        };

        let ns = patch.apply(&old)?;
        t.execute(
            "UPDATE schedules SET
                day_of_week = $1, start_time = $2, end_time = $3,
                subject = $4, group_name = $5, room = $6, teacher_name = $7
            WHERE id = $8",
            &[
                &ns.day_of_week.token(), &ns.start_time, &ns.end_time,
                &ns.subject, &ns.group_name, &ns.room, &ns.teacher_name,
                &id,
            ]
        ).await.map_err(DbError::from)?;

        t.commit().await.map_err(DbError::from)?;
        Ok(())
    }

    /// Returns the number of slots deleted; deleting a nonexistent slot
    /// isn't an error.
    pub async fn delete_slot(&self, id: i64) -> Result<u64, DbError> {
        log::trace!("Store::delete_slot( {} ) called.", &id);

        let client = self.connect().await?;
        let n = client.execute(
            "DELETE FROM schedules WHERE id = $1",
            &[&id]
        ).await?;

        if n == 0 {
            log::info!("No schedule slot {} to delete.", &id);
        }
        Ok(n)
    }
}
