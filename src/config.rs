/*!
Structs to hold configuration data and global variables.
*/
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use time::{Date, OffsetDateTime, UtcOffset};
use tokio::sync::RwLock;

use crate::{
    auth::Sessions,
    inter,
    store::Store,
};

/// A year, leap day included.
const MAX_SESSION_HOURS: u64 = 24 * 366;

#[derive(Deserialize)]
struct ConfigFile {
    db_connect_string: Option<String>,
    host: Option<String>,
    port: Option<u16>,
    templates_dir: Option<String>,
    static_dir: Option<String>,
    session_hours: Option<u64>,
    utc_offset_hours: Option<i8>,
    cookie_name: Option<String>,
}

#[derive(Debug)]
pub struct Cfg {
    pub db_connect_string: String,
    pub addr: SocketAddr,
    pub templates_dir: PathBuf,
    pub static_dir: PathBuf,
    pub session_lifetime: Duration,
    pub utc_offset: UtcOffset,
    pub cookie_name: String,
}

impl std::default::Default for Cfg {
    fn default() -> Self {
        Self {
            db_connect_string: "host=localhost user=homeroom password='homeroom' dbname=homeroom".to_owned(),
            addr: SocketAddr::from(([0, 0, 0, 0], 8001)),
            templates_dir: PathBuf::from("templates"),
            static_dir: PathBuf::from("static"),
            session_lifetime: Duration::from_secs(8 * 60 * 60),
            utc_offset: UtcOffset::UTC,
            cookie_name: "homeroom_session".to_owned(),
        }
    }
}

impl Cfg {
    pub fn from_toml(file_contents: &str) -> Result<Self, String> {
        let cf: ConfigFile = toml::from_str(file_contents)
            .map_err(|e| format!("Unable to deserialize config file: {}", &e))?;

        let mut c = Self::default();

        if let Some(s) = cf.db_connect_string {
            c.db_connect_string = s;
        }
        if let Some(s) = cf.host {
            c.addr.set_ip(
                s.parse().map_err(|e| format!(
                    "Error parsing {:?} as IP address: {}",
                    &s, &e
                ))?
            );
        }
        if let Some(n) = cf.port {
            c.addr.set_port(n);
        }
        if let Some(s) = cf.templates_dir {
            c.templates_dir = PathBuf::from(s);
        }
        if let Some(s) = cf.static_dir {
            c.static_dir = PathBuf::from(s);
        }
        if let Some(n) = cf.session_hours {
            if n == 0 || n > MAX_SESSION_HOURS {
                return Err(format!(
                    "session_hours must be between 1 and {}.", MAX_SESSION_HOURS
                ));
            }
            c.session_lifetime = Duration::from_secs(n.saturating_mul(60 * 60));
        }
        if let Some(n) = cf.utc_offset_hours {
            c.utc_offset = UtcOffset::from_hms(n, 0, 0)
                .map_err(|e| format!("Invalid utc_offset_hours {}: {}", &n, &e))?;
        }
        if let Some(s) = cf.cookie_name {
            let s = s.trim();
            if s.is_empty() || !s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                return Err(format!("Invalid cookie_name {:?}.", s));
            }
            c.cookie_name = s.to_owned();
        }

        Ok(c)
    }

    /// Read configuration from `path`. A file that isn't there means
    /// running with the defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let path = path.as_ref();
        if !path.exists() {
            log::warn!(
                "Config file {} not found; using default configuration.",
                path.display()
            );
            return Ok(Self::default());
        }

        let file_contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Unable to read config file: {}", &e))?;
        Self::from_toml(&file_contents)
    }
}

/**
This guy will haul around some global variables and be passed in an
`axum::Extension` to the handlers who need him.
*/
pub struct Glob {
    pub store: Store,
    pub sessions: RwLock<Sessions>,
    pub utc_offset: UtcOffset,
    pub cookie_name: String,
    pub static_dir: PathBuf,
    pub addr: SocketAddr,
}

impl Glob {
    /// Global state for `cfg`, without touching the database.
    pub fn new(cfg: &Cfg) -> Self {
        Self {
            store: Store::new(cfg.db_connect_string.clone()),
            sessions: RwLock::new(Sessions::new(cfg.session_lifetime)),
            utc_offset: cfg.utc_offset,
            cookie_name: cfg.cookie_name.clone(),
            static_dir: cfg.static_dir.clone(),
            addr: cfg.addr,
        }
    }

    /// The current date where the school is.
    pub fn today(&self) -> Date {
        OffsetDateTime::now_utc().to_offset(self.utc_offset).date()
    }
}

/// Loads system configuration, ensures all appropriate database tables
/// exist, and seeds the timetable if it's empty.
pub async fn load_configuration<P: AsRef<Path>>(path: P) -> Result<Glob, String> {
    let cfg = Cfg::from_file(path.as_ref())?;
    log::info!("Configuration read:\n{:#?}", &cfg);

    log::trace!("Checking state of DB...");
    let glob = Glob::new(&cfg);
    if let Err(e) = glob.store.ensure_db_schema().await {
        let estr = format!("Unable to ensure state of DB: {}", e.display());
        return Err(estr);
    }
    log::trace!("...DB okay.");

    match glob.store.seed_schedule_if_empty().await {
        Ok(0) => { log::trace!("Schedule already populated."); },
        Ok(n) => { log::info!("Seeded {} schedule slots.", &n); },
        Err(e) => {
            let estr = format!("Unable to seed schedule: {}", e.display());
            return Err(estr);
        },
    }

    crate::auth::prepare().await.map_err(|e| e.to_string())?;
    inter::init(&cfg.templates_dir)?;

    Ok(glob)
}
