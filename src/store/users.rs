/*!
`Store` methods for the `users` table.
*/
use tokio_postgres::{Row, Transaction, error::SqlState};

use super::{DbError, Store};
use crate::error::SkedError;
use crate::user::{NewUser, Role, User};

const DUPLICATE_MSG: &str = "That login or email is already registered.";

fn user_from_row(row: &Row) -> Result<User, DbError> {
    let role_str: &str = row.try_get("role")?;
    let u = User {
        id: row.try_get("id")?,
        role: role_str.parse()?,
        full_name: row.try_get("full_name")?,
        email: row.try_get("email")?,
        login: row.try_get("login")?,
        password_hash: row.try_get("password_hash")?,
        group_name: row.try_get("group_name")?,
        subject: row.try_get("subject")?,
        phone: row.try_get("phone")?,
    };
    Ok(u)
}

/// Return the role of whoever already has `login` or `email`, if anyone.
///
/// Used before inserting, mainly to give a good error message; the unique
/// constraints are what actually guarantee no duplicates.
async fn check_existing_user_role(
    t: &Transaction<'_>,
    login: &str,
    email: &str,
) -> Result<Option<Role>, DbError> {
    log::trace!(
        "check_existing_user_role( T, {:?}, {:?} ) called.",
        login, email
    );

    match t.query_opt(
        "SELECT role FROM users WHERE login = $1 OR email = $2 LIMIT 1",
        &[&login, &email]
    ).await.map_err(|e| DbError::from(e)
        .annotate("Error querying for preexisting login"))?
    {
        None => Ok(None),
        Some(row) => {
            let role_str: &str = row.try_get("role")?;
            let role: Role = role_str.parse()?;
            Ok(Some(role))
        },
    }
}

impl Store {
    pub async fn get_user_by_login(
        &self,
        login: &str,
    ) -> Result<Option<User>, DbError> {
        log::trace!("Store::get_user_by_login( {:?} ) called.", login);

        let client = self.connect().await?;
        match client.query_opt(
            "SELECT * FROM users WHERE login = $1",
            &[&login]
        ).await? {
            None => Ok(None),
            Some(row) => Ok(Some(user_from_row(&row)?)),
        }
    }

    /**
    Insert a new user and return the stored row.

    Fails with `SkedError::Duplicate` (and inserts nothing) if the login or
    email is already in use.
    */
    pub async fn insert_user(&self, nu: &NewUser) -> Result<User, SkedError> {
        log::trace!(
            "Store::insert_user( {} {:?}, {:?} ) called.",
            &nu.role, &nu.login, &nu.email
        );

        let mut client = self.connect().await?;
        let t = client.transaction().await.map_err(DbError::from)?;

        if let Some(role) = check_existing_user_role(&t, &nu.login, &nu.email).await? {
            log::info!(
                "Refusing to register {:?} <{}>: already in use by a {}.",
                &nu.login, &nu.email, &role
            );
            return Err(SkedError::Duplicate(DUPLICATE_MSG.to_owned()));
        }

        let res = t.query_one(
            "INSERT INTO users (
                role, full_name, email, login, password_hash,
                group_name, subject, phone
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *",
            &[
                &nu.role.to_string(), &nu.full_name, &nu.email, &nu.login,
                &nu.password_hash, &nu.group_name, &nu.subject, &nu.phone,
            ]
        ).await;

        let row = match res {
            Ok(row) => row,
            Err(e) if e.code() == Some(&SqlState::UNIQUE_VIOLATION) => {
                return Err(SkedError::Duplicate(DUPLICATE_MSG.to_owned()));
            },
            Err(e) => { return Err(DbError::from(e).into()); },
        };
        let u = user_from_row(&row)?;

        t.commit().await.map_err(DbError::from)?;
        log::trace!("Inserted {} {:?} (id {}).", &u.role, &u.login, &u.id);
        Ok(u)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use serial_test::serial;

    use crate::auth;
    use crate::store::tests::{add_user, fresh_store};
    use crate::user::RegistrationForm;

    #[tokio::test]
    #[serial]
    async fn insert_and_fetch() {
        let db = fresh_store().await;

        let s = add_user(&db, Role::Student, "anna", Some("3011")).await;
        let t = add_user(&db, Role::Teacher, "petrov", None).await;
        assert_ne!(s.id, t.id);

        let got = db.get_user_by_login("anna").await.unwrap().unwrap();
        assert_eq!(got.role, Role::Student);
        assert_eq!(got.group_name.as_deref(), Some("3011"));
        assert_eq!(got.subject, None);

        let got = db.get_user_by_login(&t.login).await.unwrap().unwrap();
        assert_eq!(got.id, t.id);
        assert_eq!(got.subject.as_deref(), Some("Physics"));

        assert!(db.get_user_by_login("nobody").await.unwrap().is_none());
        db.nuke_database().await.unwrap();
    }

    #[tokio::test]
    #[serial]
    async fn duplicates_refused() {
        let db = fresh_store().await;

        add_user(&db, Role::Student, "anna", Some("3011")).await;

        let mut nu = NewUser {
            role: Role::Admin,
            full_name: "Other Anna".to_owned(),
            email: "other@school.test".to_owned(),
            login: "anna".to_owned(),
            password_hash: "x".to_owned(),
            group_name: None,
            subject: None,
            phone: None,
        };
        assert!(matches!(db.insert_user(&nu).await, Err(SkedError::Duplicate(_))));

        nu.login = "anna2".to_owned();
        nu.email = "anna@school.test".to_owned();
        assert!(matches!(db.insert_user(&nu).await, Err(SkedError::Duplicate(_))));

        assert!(db.get_user_by_login("anna2").await.unwrap().is_none());
        db.nuke_database().await.unwrap();
    }

    #[tokio::test]
    #[serial]
    async fn register_then_login() {
        let db = fresh_store().await;

        let form = RegistrationForm {
            full_name: Some("Nikolai Petrov".to_owned()),
            subject: Some("Physics".to_owned()),
            email: Some("petrov@school.test".to_owned()),
            login: Some("petrov".to_owned()),
            password: Some("s3cret".to_owned()),
            ..Default::default()
        };
        let reg = form.validate(Role::Teacher).unwrap();
        let who = auth::register(&db, reg).await.unwrap();
        assert_eq!(who.role, Role::Teacher);

        let again = auth::login(&db, "petrov", "s3cret").await.unwrap();
        assert_eq!(again, who);

        assert!(matches!(
            auth::login(&db, "petrov", "wrong").await,
            Err(SkedError::Authentication)
        ));
        assert!(matches!(
            auth::login(&db, "nobody", "s3cret").await,
            Err(SkedError::Authentication)
        ));

        let reg = form.validate(Role::Teacher).unwrap();
        assert!(matches!(
            auth::register(&db, reg).await,
            Err(SkedError::Duplicate(_))
        ));
        db.nuke_database().await.unwrap();
    }
}
