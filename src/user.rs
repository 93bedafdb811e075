/*!
Users, their roles, and the identity carried by a logged-in session.
*/
use serde::{Deserialize, Serialize};

use crate::error::SkedError;
use crate::sched::check_group;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Teacher,
    Admin,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let token = match self {
            Role::Student => "student",
            Role::Teacher => "teacher",
            Role::Admin   => "admin",
        };

        write!(f, "{}", token)
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "student" => Ok(Role::Student),
            "teacher" => Ok(Role::Teacher),
            "admin"   => Ok(Role::Admin),
            _ => Err(format!("{:?} is not a valid Role.", s)),
        }
    }
}

/// A row of the `users` table.
#[derive(Clone, Debug)]
pub struct User {
    pub id: i64,
    pub role: Role,
    pub full_name: String,
    pub email: String,
    pub login: String,
    pub password_hash: String,
    /// Only students belong to a group.
    pub group_name: Option<String>,
    /// Only teachers teach a subject.
    pub subject: Option<String>,
    pub phone: Option<String>,
}

impl User {
    pub fn identity(&self) -> Identity {
        Identity {
            id: self.id,
            role: self.role,
            full_name: self.full_name.clone(),
            group_name: self.group_name.clone(),
            subject: self.subject.clone(),
        }
    }
}

/**
Who is making a request. This is what a session holds, and what gets
handed to every handler and to the dashboard aggregator.
*/
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub id: i64,
    pub role: Role,
    pub full_name: String,
    pub group_name: Option<String>,
    pub subject: Option<String>,
}

/// A user about to be inserted. The password has already been hashed.
#[derive(Clone, Debug)]
pub struct NewUser {
    pub role: Role,
    pub full_name: String,
    pub email: String,
    pub login: String,
    pub password_hash: String,
    pub group_name: Option<String>,
    pub subject: Option<String>,
    pub phone: Option<String>,
}

/**
Form data from any of the three registration pages.

Every field is optional here so that a missing field turns into a
`SkedError::Validation` instead of an extractor rejection.
*/
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationForm {
    pub full_name: Option<String>,
    pub group_name: Option<String>,
    pub subject: Option<String>,
    pub email: Option<String>,
    pub login: Option<String>,
    pub password: Option<String>,
    pub phone: Option<String>,
}

/// Registration data that has passed validation but whose password is
/// still in the clear.
#[derive(Debug)]
pub struct Registration {
    pub role: Role,
    pub full_name: String,
    pub email: String,
    pub login: String,
    pub password: String,
    pub group_name: Option<String>,
    pub subject: Option<String>,
    pub phone: Option<String>,
}

impl Registration {
    pub fn into_new_user(self, password_hash: String) -> NewUser {
        NewUser {
            role: self.role,
            full_name: self.full_name,
            email: self.email,
            login: self.login,
            password_hash,
            group_name: self.group_name,
            subject: self.subject,
            phone: self.phone,
        }
    }
}

fn required(field: &Option<String>) -> Option<String> {
    match field.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(s) => Some(s.to_owned()),
    }
}

impl RegistrationForm {
    /// Check that every field `role` requires is present and non-blank.
    pub fn validate(&self, role: Role) -> Result<Registration, SkedError> {
        let missing = || SkedError::Validation(
            "Please fill in all required fields.".to_owned()
        );

        let full_name = required(&self.full_name).ok_or_else(missing)?;
        let email = required(&self.email).ok_or_else(missing)?;
        let login = required(&self.login).ok_or_else(missing)?;
        // Passwords are not trimmed; only a wholly blank one is refused.
        let password = match &self.password {
            Some(p) if !p.trim().is_empty() => p.clone(),
            _ => { return Err(missing()); },
        };

        let (group_name, subject, phone) = match role {
            Role::Student => {
                let group = required(&self.group_name).ok_or_else(missing)?;
                check_group(&group)?;
                (Some(group), None, None)
            },
            Role::Teacher => {
                let subject = required(&self.subject).ok_or_else(missing)?;
                (None, Some(subject), required(&self.phone))
            },
            Role::Admin => (None, None, None),
        };

        Ok(Registration {
            role, full_name, email, login, password,
            group_name, subject, phone,
        })
    }
}
