/*!
Demo timetable for a fresh installation.
*/
use futures::stream::{FuturesUnordered, StreamExt};
use time::{Time, macros::time};
use tokio_postgres::types::ToSql;

use super::{DbError, Store};
use crate::sched::Day;

const GROUPS: &[&str] = &["1011", "3011", "3051", "4051"];

/// Subjects and who teaches them.
const SUBJECTS: &[(&str, &str)] = &[
    ("Philosophy", "Sporysh M. U."),
    ("Mathematics", "Ivanova A. S."),
    ("Physics", "Petrov N. V."),
    ("Programming", "Sidorov D. K."),
];

const ROOMS: &[&str] = &["1-111", "2-203", "3-305", "4-407"];

const DAYS: &[Day] = &[Day::Mon, Day::Tue, Day::Wed, Day::Thu, Day::Fri];

const PERIODS: &[(Time, Time)] = &[
    (time!(9:00), time!(10:30)),
    (time!(10:40), time!(12:10)),
    (time!(12:40), time!(14:10)),
    (time!(14:20), time!(15:50)),
    (time!(16:00), time!(17:30)),
    (time!(17:40), time!(19:10)),
];

struct SeedRow {
    day: &'static str,
    start: Time,
    end: Time,
    subject: &'static str,
    group: &'static str,
    room: &'static str,
    teacher: &'static str,
}

fn demo_rows() -> Vec<SeedRow> {
    let mut rows: Vec<SeedRow> = Vec::with_capacity(
        DAYS.len() * GROUPS.len() * SUBJECTS.len()
    );
    for day in DAYS.iter() {
        for (gi, &group) in GROUPS.iter().enumerate() {
            for (si, &(subject, teacher)) in SUBJECTS.iter().enumerate() {
                let (start, end) = PERIODS[(gi + si) % PERIODS.len()];
                rows.push(SeedRow {
                    day: day.token(),
                    start, end, subject, group, teacher,
                    room: ROOMS[(gi + si) % ROOMS.len()],
                });
            }
        }
    }
    rows
}

impl Store {
    /**
    Fill the `schedules` table with the demo timetable, but only if it's
    empty. Returns the number of slots inserted.

    The table is locked for the duration, so two servers starting against
    the same empty database won't both seed it.
    */
    pub async fn seed_schedule_if_empty(&self) -> Result<usize, DbError> {
        log::trace!("Store::seed_schedule_if_empty() called.");

        let mut client = self.connect().await?;
        let t = client.transaction().await?;

        t.execute("LOCK TABLE schedules IN EXCLUSIVE MODE", &[]).await
            .map_err(|e| DbError::from(e).annotate("Unable to lock schedules"))?;

        let row = t.query_one("SELECT COUNT(*) FROM schedules", &[]).await?;
        let count: i64 = row.try_get(0)?;
        if count > 0 {
            log::trace!("    ...{} slots already present; not seeding.", &count);
            return Ok(0);
        }

        let insert_statement = t.prepare(
            "INSERT INTO schedules (
                day_of_week, start_time, end_time, subject, group_name,
                room, teacher_name
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)"
        ).await?;

        let rows = demo_rows();
        let mut n_inserted: usize = 0;
        {
            let params: Vec<[&(dyn ToSql + Sync); 7]> = rows.iter()
                .map(|r| {
                    let p: [&(dyn ToSql + Sync); 7] = [
                        &r.day, &r.start, &r.end, &r.subject, &r.group,
                        &r.room, &r.teacher,
                    ];
                    p
                }).collect();

            let mut inserts = FuturesUnordered::new();
            for p in params.iter() {
                inserts.push(t.execute(&insert_statement, &p[..]));
            }

            while let Some(res) = inserts.next().await {
                match res {
                    Ok(_) => { n_inserted += 1; },
                    Err(e) => {
                        return Err(DbError::from(e).annotate("Error seeding schedule"));
                    },
                }
            }
        }

        t.commit().await
            .map_err(|e| DbError::from(e).annotate("Error committing seed"))?;
        log::info!("Seeded the schedule with {} demo slots.", &n_inserted);
        Ok(n_inserted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use serial_test::serial;

    use crate::store::tests::{add_slot, fresh_store};

    #[test]
    fn demo_timetable_shape() {
        let rows = demo_rows();
        assert_eq!(rows.len(), 80);
        // Group 3011 (index 1), Physics (index 2) lands in period 3, room 4.
        let r = rows.iter()
            .find(|r| r.group == "3011" && r.subject == "Physics")
            .unwrap();
        assert_eq!(r.start, time!(14:20));
        assert_eq!(r.room, "4-407");
        assert_eq!(r.teacher, "Petrov N. V.");
        assert!(rows.iter().all(|r| r.day != "sat" && r.day != "sun"));
    }

    #[tokio::test]
    #[serial]
    async fn seeding_is_idempotent() {
        let db = fresh_store().await;

        assert_eq!(db.seed_schedule_if_empty().await.unwrap(), 80);
        assert_eq!(db.seed_schedule_if_empty().await.unwrap(), 0);
        assert_eq!(db.get_slots(None).await.unwrap().len(), 80);

        let mine = db.get_slots(Some("4051")).await.unwrap();
        assert_eq!(mine.len(), 20);
        assert_eq!(mine[0].day_of_week, Day::Mon);
        db.nuke_database().await.unwrap();
    }

    #[tokio::test]
    #[serial]
    async fn never_seeds_over_existing_slots() {
        let db = fresh_store().await;

        add_slot(&db, Day::Sat, "3011").await;
        assert_eq!(db.seed_schedule_if_empty().await.unwrap(), 0);
        assert_eq!(db.get_slots(None).await.unwrap().len(), 1);
        db.nuke_database().await.unwrap();
    }
}
