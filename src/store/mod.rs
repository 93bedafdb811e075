/*!
Database interaction module.

The Postgres database to which this connects holds four tables:

```sql
CREATE TABLE users (
    id            BIGSERIAL PRIMARY KEY,
    role          TEXT NOT NULL,    /* one of { 'student', 'teacher', 'admin' } */
    full_name     TEXT NOT NULL,
    email         TEXT NOT NULL UNIQUE,
    login         TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    group_name    TEXT,             /* students only */
    subject       TEXT,             /* teachers only */
    phone         TEXT
);

CREATE TABLE schedules (
    id           BIGSERIAL PRIMARY KEY,
    day_of_week  TEXT NOT NULL,     /* 'mon' .. 'sun' */
    start_time   TIME NOT NULL,
    end_time     TIME NOT NULL,
    subject      TEXT NOT NULL,
    group_name   TEXT NOT NULL,
    room         TEXT,
    teacher_name TEXT
);

CREATE TABLE assignments (
    id                BIGSERIAL PRIMARY KEY,
    schedule_id       BIGINT NOT NULL REFERENCES schedules(id) ON DELETE CASCADE,
    homework          TEXT NOT NULL,
    due_date          TIMESTAMPTZ NOT NULL,
    extended_due_date TIMESTAMPTZ,
    extended_penalty  INTEGER,
    created_by        BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    subject_text      TEXT,
    created_at        TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE TABLE events (
    id          BIGSERIAL PRIMARY KEY,
    title       TEXT NOT NULL,
    description TEXT,
    date        DATE NOT NULL,
    start_time  TIME NOT NULL,
    end_time    TIME NOT NULL,
    schedule_id BIGINT REFERENCES schedules(id) ON DELETE SET NULL,
    group_name  TEXT,               /* NULL means every group */
    created_at  TIMESTAMPTZ NOT NULL DEFAULT now()
);
```
*/
use std::fmt::Write;

use once_cell::sync::Lazy;
use tokio_postgres::{Client, NoTls};

use crate::sched::Day;

pub mod assignments;
pub mod events;
pub mod schedules;
pub mod seed;
pub mod users;

static SCHEMA: &[(&str, &str, &str)] = &[
    (
        "SELECT FROM information_schema.tables WHERE table_name = 'users'",
        "CREATE TABLE users (
            id            BIGSERIAL PRIMARY KEY,
            role          TEXT NOT NULL
                CHECK (role IN ('student', 'teacher', 'admin')),
            full_name     TEXT NOT NULL,
            email         TEXT NOT NULL UNIQUE,
            login         TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            group_name    TEXT,
            subject       TEXT,
            phone         TEXT
        )",
        "DROP TABLE IF EXISTS users",
    ),

    (
        "SELECT FROM information_schema.tables WHERE table_name = 'schedules'",
        "CREATE TABLE schedules (
            id           BIGSERIAL PRIMARY KEY,
            day_of_week  TEXT NOT NULL
                CHECK (day_of_week IN ('mon', 'tue', 'wed', 'thu', 'fri', 'sat', 'sun')),
            start_time   TIME NOT NULL,
            end_time     TIME NOT NULL,
            subject      TEXT NOT NULL,
            group_name   TEXT NOT NULL,
            room         TEXT,
            teacher_name TEXT
        )",
        "DROP TABLE IF EXISTS schedules",
    ),

    (
        "SELECT FROM information_schema.tables WHERE table_name = 'assignments'",
        "CREATE TABLE assignments (
            id                BIGSERIAL PRIMARY KEY,
            schedule_id       BIGINT NOT NULL
                REFERENCES schedules(id) ON DELETE CASCADE,
            homework          TEXT NOT NULL,
            due_date          TIMESTAMPTZ NOT NULL,
            extended_due_date TIMESTAMPTZ,
            extended_penalty  INTEGER,
            created_by        BIGINT NOT NULL
                REFERENCES users(id) ON DELETE CASCADE,
            subject_text      TEXT,
            created_at        TIMESTAMPTZ NOT NULL DEFAULT now()
        )",
        "DROP TABLE IF EXISTS assignments",
    ),

    (
        "SELECT FROM information_schema.tables WHERE table_name = 'events'",
        "CREATE TABLE events (
            id          BIGSERIAL PRIMARY KEY,
            title       TEXT NOT NULL,
            description TEXT,
            date        DATE NOT NULL,
            start_time  TIME NOT NULL,
            end_time    TIME NOT NULL,
            schedule_id BIGINT REFERENCES schedules(id) ON DELETE SET NULL,
            group_name  TEXT,
            created_at  TIMESTAMPTZ NOT NULL DEFAULT now()
        )",
        "DROP TABLE IF EXISTS events",
    ),
];

/**
`ORDER BY` clause putting schedule rows in calendar order. Days are stored
as text, which doesn't sort the way the week goes.
*/
pub(crate) static SLOT_ORDER: Lazy<String> = Lazy::new(|| {
    let mut clause = String::from("CASE s.day_of_week");
    for day in Day::ALL {
        let _ = write!(clause, " WHEN '{}' THEN {}", day.token(), day.number());
    }
    clause.push_str(" END, s.start_time, s.id");
    clause
});

#[derive(Debug, PartialEq)]
pub struct DbError(String);

impl DbError {
    /// Prepend some contextual `annotation` for the error.
    fn annotate(self, annotation: &str) -> Self {
        let s = format!("{}: {}", annotation, &self.0);
        Self(s)
    }

    pub fn display(&self) -> &str { &self.0 }
}

impl From<tokio_postgres::error::Error> for DbError {
    fn from(e: tokio_postgres::error::Error) -> DbError {
        let mut s = format!("Data DB: {}", &e);
        if let Some(dbe) = e.as_db_error() {
            // Writing to a String can't fail.
            let _ = write!(&mut s, "; {}", dbe);
        }
        DbError(s)
    }
}

impl From<String> for DbError {
    fn from(s: String) -> DbError { DbError(s) }
}

pub struct Store {
    connection_string: String,
}

impl Store {
    pub fn new(connection_string: String) -> Self {
        log::trace!("Store::new( [ connection string ] ) called.");

        Self { connection_string }
    }

    async fn connect(&self) -> Result<Client, DbError> {
        log::trace!("Store::connect() called.");

        match tokio_postgres::connect(&self.connection_string, NoTls).await {
            Ok((client, connection)) => {
                log::trace!("    ...connection successful.");
                tokio::spawn(async move {
                    if let Err(e) = connection.await {
                        log::error!("Data DB connection error: {}", &e);
                    } else {
                        log::trace!("tokio connection runtime drops.");
                    }
                });
                Ok(client)
            },
            Err(e) => {
                let dberr = DbError::from(e);
                log::trace!("    ...connection failed: {:?}", &dberr);
                Err(dberr.annotate("Unable to connect"))
            }
        }
    }

    pub async fn ensure_db_schema(&self) -> Result<(), DbError> {
        log::trace!("Store::ensure_db_schema() called.");

        let mut client = self.connect().await?;
        let t = client.transaction().await
            .map_err(|e| DbError::from(e)
                .annotate("Data DB unable to begin transaction"))?;

        for (test_stmt, create_stmt, _) in SCHEMA.iter() {
            if t.query_opt(*test_stmt, &[]).await?.is_none() {
                log::info!(
                    "{:?} returned no results; attempting to insert table.",
                    test_stmt
                );
                t.execute(*create_stmt, &[]).await?;
            }
        }

        t.commit().await
            .map_err(|e| DbError::from(e)
                .annotate("Error committing transaction"))
    }

    /**
    Drop all database tables to fully reset database state.

    This is only meant for cleanup after testing. It is advisable to look at
    the ERROR level log output when testing to ensure this method did its job.
    */
    #[cfg(test)]
    pub async fn nuke_database(&self) -> Result<(), DbError> {
        log::trace!("Store::nuke_database() called.");

        let client = self.connect().await?;

        for (_, _, drop_stmt) in SCHEMA.iter().rev() {
            if let Err(e) = client.execute(*drop_stmt, &[]).await {
                let err = DbError::from(e);
                log::error!("Error dropping: {:?}: {}", &drop_stmt, &err.display());
            }
        }

        log::trace!("    ....nuking complete.");
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    /*!
    These tests assume you have a Postgres instance running on your local
    machine with resources named according to what you see in the
    `static TEST_CONNECTION &str`:

    ```text
    user: homeroom_test
    password: homeroom_test

    with write access to:

    database: homeroom_test
    ```

    Set `HOMEROOM_TEST_DB` to use a different connection string. The
    database tests fail if there's no database to reach.
    */
    use super::*;
    use crate::tests::ensure_logging;

    use serial_test::serial;
    use time::{OffsetDateTime, macros::time};

    use crate::{
        sched::{Day, NewSlot},
        user::{NewUser, Role, User},
    };

    pub static TEST_CONNECTION: &str = "host=localhost user=homeroom_test password='homeroom_test' dbname=homeroom_test";

    pub fn test_connection() -> String {
        std::env::var("HOMEROOM_TEST_DB")
            .unwrap_or_else(|_| TEST_CONNECTION.to_owned())
    }

    /// A store with freshly-created, empty tables.
    pub async fn fresh_store() -> Store {
        ensure_logging();

        let db = Store::new(test_connection());
        if let Err(e) = db.connect().await {
            panic!("Unable to reach the test database: {}", e.display());
        }
        db.nuke_database().await.unwrap();
        db.ensure_db_schema().await.unwrap();
        db
    }

    /// Insert a user directly, skipping the (slow) password hashing.
    pub async fn add_user(
        db: &Store,
        role: Role,
        login: &str,
        group_name: Option<&str>,
    ) -> User {
        let nu = NewUser {
            role,
            full_name: format!("{} {}", login, login),
            email: format!("{}@school.test", login),
            login: login.to_owned(),
            password_hash: "not-a-hash".to_owned(),
            group_name: group_name.map(str::to_owned),
            subject: match role {
                Role::Teacher => Some("Physics".to_owned()),
                _ => None,
            },
            phone: None,
        };
        db.insert_user(&nu).await.unwrap()
    }

    pub async fn add_slot(db: &Store, day: Day, group: &str) -> i64 {
        let ns = NewSlot {
            day_of_week: day,
            start_time: time!(9:00),
            end_time: time!(10:30),
            subject: "Physics".to_owned(),
            group_name: group.to_owned(),
            room: None,
            teacher_name: None,
        };
        db.insert_slot(&ns).await.unwrap()
    }

    pub fn now() -> OffsetDateTime { OffsetDateTime::now_utc() }

    /**
    This function is for getting the database back in a blank slate state if
    a test panics partway through and leaves it munged.

    ```bash
    cargo test reset_store -- --ignored
    ```
    */
    #[tokio::test]
    #[ignore]
    #[serial]
    async fn reset_store() {
        ensure_logging();
        let db = Store::new(test_connection());
        db.nuke_database().await.unwrap();
    }

    #[test]
    fn slot_order_follows_the_week() {
        let clause = SLOT_ORDER.as_str();
        assert!(clause.starts_with("CASE s.day_of_week WHEN 'mon' THEN 1 WHEN 'tue' THEN 2"));
        assert!(clause.contains("WHEN 'sun' THEN 7 END, s.start_time"));
    }

    #[tokio::test]
    #[serial]
    async fn create_store() {
        let db = fresh_store().await;

        // Running it again on existing tables is fine.
        db.ensure_db_schema().await.unwrap();
        db.nuke_database().await.unwrap();
    }
}
