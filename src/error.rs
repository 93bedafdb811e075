/*!
The ways a request can fail.

Every one of these is handled at the request boundary (see the
`IntoResponse` impl in `inter`); none of them should take the process down.
*/
use crate::store::DbError;

#[derive(Debug)]
pub enum SkedError {
    /// Missing or malformed required field.
    Validation(String),
    /// Unknown login or wrong password.
    Authentication,
    /// Login or email already taken.
    Duplicate(String),
    /// No session attached to the request.
    Unauthenticated,
    /// Wrong role, or not the owner of the resource.
    Forbidden(String),
    NotFound,
    /// Assignment's schedule slot belongs to a different group.
    Mismatch(String),
    Db(DbError),
    /// Something else went wrong on our end.
    Internal(String),
}

impl std::fmt::Display for SkedError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            SkedError::Validation(msg) => write!(f, "{}", msg),
            SkedError::Authentication => write!(f, "Invalid login or password."),
            SkedError::Duplicate(msg) => write!(f, "{}", msg),
            SkedError::Unauthenticated => write!(f, "You must log in first."),
            SkedError::Forbidden(msg) => write!(f, "{}", msg),
            SkedError::NotFound => write!(f, "Not found."),
            SkedError::Mismatch(msg) => write!(f, "{}", msg),
            SkedError::Db(e) => write!(f, "{}", e.display()),
            SkedError::Internal(msg) => write!(f, "{}", msg),
        }
    }
}

impl From<DbError> for SkedError {
    fn from(e: DbError) -> SkedError { SkedError::Db(e) }
}
