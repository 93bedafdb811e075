/*!
`Store` methods for homework assignments.

An assignment belongs to the teacher who created it; only they may change
or delete it. Those checks happen here, inside the same transaction as the
change, so nothing slips in between the check and the write.
*/
use time::OffsetDateTime;
use tokio_postgres::Row;

use super::{DbError, Store};
use crate::error::SkedError;
use crate::sched::{Assignment, AssignmentPatch, AssignmentRow, Day, NewAssignment};

/// Assignments joined with their slot and author; append a `WHERE` and an
/// `ORDER BY`.
const JOINED_SELECT: &str = "SELECT
        a.id, a.schedule_id, a.homework, a.due_date, a.extended_due_date,
        a.extended_penalty, a.created_by, a.subject_text, a.created_at,
        COALESCE(a.subject_text, s.subject) AS display_subject,
        s.day_of_week, s.start_time, s.end_time, s.group_name,
        s.room, s.teacher_name,
        u.email AS teacher_email, u.full_name AS teacher_full_name
    FROM assignments a
    JOIN schedules s ON s.id = a.schedule_id
    LEFT JOIN users u ON u.id = a.created_by";

const JOINED_ORDER: &str = "ORDER BY a.due_date, a.id";

fn assignment_from_row(row: &Row) -> Result<Assignment, DbError> {
    Ok(Assignment {
        id: row.try_get("id")?,
        schedule_id: row.try_get("schedule_id")?,
        homework: row.try_get("homework")?,
        due_date: row.try_get("due_date")?,
        extended_due_date: row.try_get("extended_due_date")?,
        extended_penalty: row.try_get("extended_penalty")?,
        created_by: row.try_get("created_by")?,
        subject_text: row.try_get("subject_text")?,
        created_at: row.try_get("created_at")?,
    })
}

fn assignment_row_from_row(row: &Row) -> Result<AssignmentRow, DbError> {
    let day_str: &str = row.try_get("day_of_week")?;
    let day: Day = day_str.parse()?;

    Ok(AssignmentRow {
        assignment: assignment_from_row(row)?,
        display_subject: row.try_get("display_subject")?,
        day_of_week: day,
        start_time: row.try_get("start_time")?,
        end_time: row.try_get("end_time")?,
        group_name: row.try_get("group_name")?,
        room: row.try_get("room")?,
        teacher_name: row.try_get("teacher_name")?,
        teacher_email: row.try_get("teacher_email")?,
        teacher_full_name: row.try_get("teacher_full_name")?,
    })
}

fn rows_to_assignments(rows: &[Row]) -> Result<Vec<AssignmentRow>, DbError> {
    let mut v: Vec<AssignmentRow> = Vec::with_capacity(rows.len());
    for row in rows.iter() {
        v.push(assignment_row_from_row(row)?);
    }
    Ok(v)
}

impl Store {
    pub async fn get_assignment(&self, id: i64) -> Result<Option<Assignment>, DbError> {
        log::trace!("Store::get_assignment( {} ) called.", &id);

        let client = self.connect().await?;
        match client.query_opt(
            "SELECT * FROM assignments WHERE id = $1",
            &[&id]
        ).await? {
            None => Ok(None),
            Some(row) => Ok(Some(assignment_from_row(&row)?)),
        }
    }

    /// Every assignment, soonest due first.
    pub async fn get_all_assignments(&self) -> Result<Vec<AssignmentRow>, DbError> {
        log::trace!("Store::get_all_assignments() called.");

        let client = self.connect().await?;
        let q = format!("{} {}", JOINED_SELECT, JOINED_ORDER);
        let rows = client.query(q.as_str(), &[]).await?;
        rows_to_assignments(&rows)
    }

    /// Every assignment created by user `author`, soonest due first.
    pub async fn get_assignments_by_author(
        &self,
        author: i64,
    ) -> Result<Vec<AssignmentRow>, DbError> {
        log::trace!("Store::get_assignments_by_author( {} ) called.", &author);

        let client = self.connect().await?;
        let q = format!("{} WHERE a.created_by = $1 {}", JOINED_SELECT, JOINED_ORDER);
        let rows = client.query(q.as_str(), &[&author]).await?;
        rows_to_assignments(&rows)
    }

    /// Assignments by `author` due between `from` and `to`, inclusive.
    pub async fn get_assignments_by_author_due(
        &self,
        author: i64,
        from: OffsetDateTime,
        to: OffsetDateTime,
    ) -> Result<Vec<AssignmentRow>, DbError> {
        log::trace!(
            "Store::get_assignments_by_author_due( {}, {}, {} ) called.",
            &author, &from, &to
        );

        let client = self.connect().await?;
        let q = format!(
            "{} WHERE a.created_by = $1 AND a.due_date >= $2 AND a.due_date <= $3 {}",
            JOINED_SELECT, JOINED_ORDER
        );
        let rows = client.query(q.as_str(), &[&author, &from, &to]).await?;
        rows_to_assignments(&rows)
    }

    /// Assignments attached to any of `slot_ids` and due between `from` and
    /// `to`, inclusive.
    pub async fn get_assignments_for_slots_due(
        &self,
        slot_ids: &[i64],
        from: OffsetDateTime,
        to: OffsetDateTime,
    ) -> Result<Vec<AssignmentRow>, DbError> {
        log::trace!(
            "Store::get_assignments_for_slots_due( [ {} slots ], {}, {} ) called.",
            slot_ids.len(), &from, &to
        );

        if slot_ids.is_empty() {
            return Ok(Vec::new());
        }

        let client = self.connect().await?;
        let q = format!(
            "{} WHERE a.schedule_id = ANY($1) AND a.due_date >= $2 AND a.due_date <= $3 {}",
            JOINED_SELECT, JOINED_ORDER
        );
        let rows = client.query(q.as_str(), &[&slot_ids, &from, &to]).await?;
        rows_to_assignments(&rows)
    }

    /**
    Insert a new assignment and return its id.

    The slot named by `na.schedule_id` must exist and belong to
    `na.group_name`; otherwise this fails with `SkedError::Mismatch` and
    inserts nothing.
    */
    pub async fn insert_assignment(&self, na: &NewAssignment) -> Result<i64, SkedError> {
        log::trace!("Store::insert_assignment( {:?} ) called.", na);

        let mut client = self.connect().await?;
        let t = client.transaction().await.map_err(DbError::from)?;

        let slot_group: Option<String> = match t.query_opt(
            "SELECT group_name FROM schedules WHERE id = $1 FOR SHARE",
            &[&na.schedule_id]
        ).await.map_err(DbError::from)? {
            Some(row) => Some(row.try_get("group_name").map_err(DbError::from)?),
            None => None,
        };

        if slot_group.as_deref() != Some(na.group_name.as_str()) {
            log::info!(
                "Assignment for group {:?} refused: slot {} has group {:?}.",
                &na.group_name, &na.schedule_id, &slot_group
            );
            return Err(SkedError::Mismatch(
                "The chosen class doesn't belong to that group.".to_owned()
            ));
        }

        let row = t.query_one(
            "INSERT INTO assignments (
                schedule_id, homework, due_date, created_by, subject_text
            )
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id",
            &[
                &na.schedule_id, &na.homework, &na.due_date,
                &na.created_by, &na.subject_text,
            ]
        ).await.map_err(DbError::from)?;
        let id: i64 = row.try_get("id").map_err(DbError::from)?;

        t.commit().await.map_err(DbError::from)?;
        log::trace!("Inserted assignment {}.", &id);
        Ok(id)
    }

    /// Fetch assignment `id` for modification by user `actor`, locking the
    /// row for the rest of transaction `t`.
    async fn lock_own_assignment(
        t: &tokio_postgres::Transaction<'_>,
        id: i64,
        actor: i64,
    ) -> Result<Assignment, SkedError> {
        let old = match t.query_opt(
            "SELECT * FROM assignments WHERE id = $1 FOR UPDATE",
            &[&id]
        ).await.map_err(DbError::from)? {
            Some(row) => assignment_from_row(&row)?,
            None => { return Err(SkedError::NotFound); },
        };

        if old.created_by != actor {
            log::info!(
                "User {} tried to modify assignment {} belonging to user {}.",
                &actor, &id, &old.created_by
            );
            return Err(SkedError::Forbidden(
                "You can only change your own assignments.".to_owned()
            ));
        }

        Ok(old)
    }

    /// Apply `patch` to assignment `id` on behalf of user `actor`, who must
    /// be its author.
    pub async fn update_assignment(
        &self,
        id: i64,
        actor: i64,
        patch: AssignmentPatch,
    ) -> Result<(), SkedError> {
        log::trace!(
            "Store::update_assignment( {}, {}, {:?} ) called.",
            &id, &actor, &patch
        );

        let mut client = self.connect().await?;
        let t = client.transaction().await.map_err(DbError::from)?;

        let old = Store::lock_own_assignment(&t, id, actor).await?;
        let e = patch.apply(&old);

        t.execute(
            "UPDATE assignments SET
                homework = $1, due_date = $2, extended_due_date = $3,
                extended_penalty = $4, subject_text = $5
            WHERE id = $6",
            &[
                &e.homework, &e.due_date, &e.extended_due_date,
                &e.extended_penalty, &e.subject_text, &id,
            ]
        ).await.map_err(DbError::from)?;

        t.commit().await.map_err(DbError::from)?;
        Ok(())
    }

    /// Delete assignment `id` on behalf of user `actor`, who must be its
    /// author.
    pub async fn delete_assignment(&self, id: i64, actor: i64) -> Result<(), SkedError> {
        log::trace!("Store::delete_assignment( {}, {} ) called.", &id, &actor);

        let mut client = self.connect().await?;
        let t = client.transaction().await.map_err(DbError::from)?;

        Store::lock_own_assignment(&t, id, actor).await?;
        t.execute(
            "DELETE FROM assignments WHERE id = $1",
            &[&id]
        ).await.map_err(DbError::from)?;

        t.commit().await.map_err(DbError::from)?;
        Ok(())
    }
}
