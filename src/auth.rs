/*!
Passwords and sessions.

Password hashes are Argon2id PHC strings. Hashing is deliberately slow, so
it happens on tokio's blocking thread pool.

Sessions live only in memory; restarting the server logs everybody out.
*/
use std::collections::HashMap;
use std::time::{Duration, Instant};

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
};
use once_cell::sync::Lazy;
use rand::{Rng, distributions::Alphanumeric};

use crate::{
    error::SkedError,
    store::Store,
    user::{Identity, Registration},
};

const SESSION_KEY_LENGTH: usize = 32;

/// Checked against when a login doesn't exist, so that an unknown login
/// costs the same as a wrong password.
static DUMMY_HASH: Lazy<String> = Lazy::new(|| {
    hash_blocking("correct horse battery staple").unwrap_or_default()
});

fn hash_blocking(password: &str) -> Result<String, String> {
    let salt_bytes: [u8; 16] = rand::thread_rng().gen();
    let salt = SaltString::encode_b64(&salt_bytes)
        .map_err(|e| format!("Error encoding password salt: {}", &e))?;
    let hash = Argon2::default().hash_password(password.as_bytes(), &salt)
        .map_err(|e| format!("Error hashing password: {}", &e))?;
    Ok(hash.to_string())
}

fn verify_blocking(password: &str, hash: &str) -> bool {
    let parsed = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(e) => {
            log::error!("Stored password hash is unreadable: {}", &e);
            return false;
        },
    };

    Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok()
}

pub async fn hash_password(password: String) -> Result<String, SkedError> {
    tokio::task::spawn_blocking(move || hash_blocking(&password)).await
        .map_err(|e| SkedError::Internal(format!("Password hashing task failed: {}", &e)))?
        .map_err(SkedError::Internal)
}

/// With no `hash` to check against, the dummy hash is checked instead
/// and the answer is always `false`.
pub async fn verify_password(
    password: String,
    hash: Option<String>,
) -> Result<bool, SkedError> {
    tokio::task::spawn_blocking(move || match hash {
        Some(hash) => verify_blocking(&password, &hash),
        None => {
            verify_blocking(&password, &DUMMY_HASH);
            false
        },
    }).await
        .map_err(|e| SkedError::Internal(format!("Password checking task failed: {}", &e)))
}

/// Compute the dummy hash now, off the async workers, instead of on the
/// first login for a nonexistent user.
pub async fn prepare() -> Result<(), SkedError> {
    tokio::task::spawn_blocking(|| Lazy::force(&DUMMY_HASH).len()).await
        .map_err(|e| SkedError::Internal(format!("Password hashing task failed: {}", &e)))?;
    Ok(())
}

/**
Look up `login` and check `password` against it.

Both "no such login" and "wrong password" come back as
`SkedError::Authentication`.
*/
pub async fn login(
    store: &Store,
    login: &str,
    password: &str,
) -> Result<Identity, SkedError> {
    log::trace!("auth::login( {:?}, [ password ] ) called.", login);

    let user = store.get_user_by_login(login).await?;
    let hash = user.as_ref().map(|u| u.password_hash.clone());
    let ok = verify_password(password.to_owned(), hash).await?;
    match (user, ok) {
        (Some(u), true) => Ok(u.identity()),
        (Some(u), false) => {
            log::info!("Bad password for {:?} ({}).", &u.login, &u.role);
            Err(SkedError::Authentication)
        },
        (None, _) => {
            log::info!("Login attempt for nonexistent login {:?}.", login);
            Err(SkedError::Authentication)
        },
    }
}

/// Hash the password, insert the new user, and return who they now are.
pub async fn register(
    store: &Store,
    mut reg: Registration,
) -> Result<Identity, SkedError> {
    log::trace!(
        "auth::register( {:?} {:?} ) called.",
        &reg.role, &reg.login
    );

    let password = std::mem::take(&mut reg.password);
    let hash = hash_password(password).await?;
    let user = store.insert_user(&reg.into_new_user(hash)).await?;

    log::info!("Registered {} {:?} (id {}).", &user.role, &user.login, user.id);
    Ok(user.identity())
}

struct Session {
    identity: Identity,
    expires: Instant,
}

/// Logged-in sessions, keyed by the random value of the session cookie.
pub struct Sessions {
    map: HashMap<String, Session>,
    lifetime: Duration,
}

impl Sessions {
    pub fn new(lifetime: Duration) -> Self {
        log::trace!("Sessions::new( {:?} ) called.", &lifetime);
        Self { map: HashMap::new(), lifetime }
    }

    pub fn lifetime(&self) -> Duration { self.lifetime }

    pub fn len(&self) -> usize { self.map.len() }

    pub fn is_empty(&self) -> bool { self.map.is_empty() }

    fn generate_key(&self) -> String {
        rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(SESSION_KEY_LENGTH)
            .map(char::from)
            .collect()
    }

    /// Start a new session for `identity` and return its key.
    pub fn issue(&mut self, identity: Identity) -> String {
        self.purge_expired();

        let mut key = self.generate_key();
        while self.map.contains_key(&key) {
            key = self.generate_key();
        }

        log::trace!("Issuing session for user {} ({}).", identity.id, &identity.role);
        let expires = Instant::now() + self.lifetime;
        self.map.insert(key.clone(), Session { identity, expires });
        key
    }

    /// The identity behind `key`, if that session exists and hasn't expired.
    /// An expired session is forgotten.
    pub fn get(&mut self, key: &str) -> Option<Identity> {
        let expired = match self.map.get(key) {
            None => { return None; },
            Some(s) => Instant::now() >= s.expires,
        };

        if expired {
            self.map.remove(key);
            None
        } else {
            self.map.get(key).map(|s| s.identity.clone())
        }
    }

    /// Returns whether there was such a session.
    pub fn destroy(&mut self, key: &str) -> bool {
        self.map.remove(key).is_some()
    }

    /// Drop every expired session; returns how many went.
    pub fn purge_expired(&mut self) -> usize {
        let now = Instant::now();
        let before = self.map.len();
        self.map.retain(|_, s| now < s.expires);
        before - self.map.len()
    }
}
