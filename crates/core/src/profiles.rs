use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum DbType {
    #[default]
    #[serde(rename = "postgresql")]
    PostgreSql,
    #[serde(rename = "mysql")]
    MySql,
}

impl DbType {
    pub const ALL: [DbType; 2] = [DbType::PostgreSql, DbType::MySql];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PostgreSql => "postgresql",
            Self::MySql => "mysql",
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::PostgreSql => "PostgreSQL",
            Self::MySql => "MySQL",
        }
    }

    #[must_use]
    pub fn default_port(self) -> u16 {
        match self {
            Self::PostgreSql => 5432,
            Self::MySql => 3306,
        }
    }

    #[must_use]
    pub fn toggled(self) -> Self {
        match self {
            Self::PostgreSql => Self::MySql,
            Self::MySql => Self::PostgreSql,
        }
    }
}

impl fmt::Display for DbType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported database type `{0}` (expected postgresql or mysql)")]
pub struct UnknownDbType(String);

impl FromStr for DbType {
    type Err = UnknownDbType;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "postgresql" | "postgres" | "pg" => Ok(Self::PostgreSql),
            "mysql" => Ok(Self::MySql),
            _ => Err(UnknownDbType(raw.to_string())),
        }
    }
}

#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConnectionConfig {
    pub db_type: DbType,
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    #[serde(default)]
    pub password: String,
}

impl ConnectionConfig {
    #[must_use]
    pub fn new(
        db_type: DbType,
        host: impl Into<String>,
        database: impl Into<String>,
        user: impl Into<String>,
    ) -> Self {
        Self {
            db_type,
            host: host.into(),
            port: db_type.default_port(),
            database: database.into(),
            user: user.into(),
            password: String::new(),
        }
    }

    /// Names of the required fields that are blank after trimming.
    #[must_use]
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("host", self.host.as_str()),
            ("database", self.database.as_str()),
            ("user", self.user.as_str()),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect()
    }

    /// Trims host, database and user. The password is kept verbatim.
    #[must_use]
    pub fn trimmed(mut self) -> Self {
        self.host = self.host.trim().to_string();
        self.database = self.database.trim().to_string();
        self.user = self.user.trim().to_string();
        self
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("db_type", &self.db_type)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// A named connection compiled into the client for quick connect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionPreset {
    pub key: &'static str,
    pub name: &'static str,
    pub db_type: DbType,
    pub host: &'static str,
    pub port: u16,
    pub database: &'static str,
    pub user: &'static str,
    pub password: &'static str,
}

impl ConnectionPreset {
    #[must_use]
    pub fn to_config(&self) -> ConnectionConfig {
        ConnectionConfig {
            db_type: self.db_type,
            host: self.host.to_string(),
            port: self.port,
            database: self.database.to_string(),
            user: self.user.to_string(),
            password: self.password.to_string(),
        }
    }
}

pub const PRESETS: [ConnectionPreset; 2] = [
    ConnectionPreset {
        key: "local_postgres",
        name: "Local PostgreSQL (shop demo)",
        db_type: DbType::PostgreSql,
        host: "127.0.0.1",
        port: 5432,
        database: "shop",
        user: "postgres",
        password: "postgres",
    },
    ConnectionPreset {
        key: "local_mysql",
        name: "Local MySQL (hr demo)",
        db_type: DbType::MySql,
        host: "127.0.0.1",
        port: 3306,
        database: "hr",
        user: "root",
        password: "root",
    },
];

#[must_use]
pub fn preset(key: &str) -> Option<&'static ConnectionPreset> {
    PRESETS.iter().find(|preset| preset.key == key)
}
