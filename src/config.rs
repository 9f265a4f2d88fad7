use std::env;
use std::fmt::Display;
use std::net::SocketAddr;
use std::str::FromStr;

use anyhow::{anyhow, Context};
use chrono::{Duration, FixedOffset, Offset, Utc};

/// Admin account created at startup when none exists for the email.
#[derive(Debug, Clone)]
pub struct AdminBootstrap {
    pub email: String,
    pub password: String,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub addr: SocketAddr,
    /// `None` runs on the in-memory store.
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub session_ttl: Duration,
    /// Offset used for the "generated at" stamp on reports.
    pub report_offset: FixedOffset,
    pub admin: Option<AdminBootstrap>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            database_url: None,
            max_connections: 5,
            session_ttl: Duration::days(2),
            report_offset: FixedOffset::west_opt(3 * 3600).unwrap_or_else(utc),
            admin: None,
        }
    }
}

fn utc() -> FixedOffset {
    Utc.fix()
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from any key/value source. `load` passes the process
    /// environment.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();

        let addr = parse_or(&lookup, "EXTENTRACK_ADDR", defaults.addr)?;
        let max_connections =
            parse_or(&lookup, "EXTENTRACK_DB_MAX_CONNECTIONS", defaults.max_connections)?;
        let ttl_hours: i64 = parse_or(&lookup, "EXTENTRACK_SESSION_TTL_HOURS", 48)?;
        if ttl_hours <= 0 {
            return Err(anyhow!("EXTENTRACK_SESSION_TTL_HOURS must be positive"));
        }
        let offset_minutes: i32 =
            parse_or(&lookup, "EXTENTRACK_REPORT_UTC_OFFSET_MINUTES", -180)?;
        let report_offset = FixedOffset::east_opt(offset_minutes * 60)
            .ok_or_else(|| anyhow!("EXTENTRACK_REPORT_UTC_OFFSET_MINUTES is out of range"))?;

        let database_url = non_empty(&lookup, "DATABASE_URL");
        if database_url.is_none() {
            log::warn!("DATABASE_URL not set, records will only live in memory");
        }

        let admin = match (
            non_empty(&lookup, "EXTENTRACK_ADMIN_EMAIL"),
            non_empty(&lookup, "EXTENTRACK_ADMIN_PASSWORD"),
        ) {
            (Some(email), Some(password)) => Some(AdminBootstrap {
                email,
                password,
                name: non_empty(&lookup, "EXTENTRACK_ADMIN_NAME")
                    .unwrap_or_else(|| "Administrador".to_string()),
            }),
            (None, None) => None,
            _ => {
                return Err(anyhow!(
                    "EXTENTRACK_ADMIN_EMAIL and EXTENTRACK_ADMIN_PASSWORD must be set together"
                ))
            }
        };

        Ok(Self {
            addr,
            database_url,
            max_connections,
            session_ttl: Duration::hours(ttl_hours),
            report_offset,
            admin,
        })
    }
}

fn non_empty<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> anyhow::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + Display,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match non_empty(lookup, key) {
        Some(raw) => raw
            .parse()
            .with_context(|| format!("invalid {} value `{}`", key, raw)),
        None => {
            log::info!("{} not set, using default: {}", key, default);
            Ok(default)
        }
    }
}
