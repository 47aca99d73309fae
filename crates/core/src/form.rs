use crate::profiles::{preset, ConnectionConfig, DbType};
use crate::provider::DEFAULT_MODEL;

/// Raw connection form fields as typed by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionForm {
    pub db_type: DbType,
    pub host: String,
    pub port: String,
    pub database: String,
    pub user: String,
    pub password: String,
}

impl Default for ConnectionForm {
    fn default() -> Self {
        Self {
            db_type: DbType::PostgreSql,
            host: String::new(),
            port: DbType::PostgreSql.default_port().to_string(),
            database: String::new(),
            user: String::new(),
            password: String::new(),
        }
    }
}

impl ConnectionForm {
    /// Switches the database type and resets the port to its default.
    pub fn set_db_type(&mut self, db_type: DbType) {
        self.db_type = db_type;
        self.port = db_type.default_port().to_string();
    }

    /// Fills every field from a named preset. Returns `false` for unknown keys
    /// and leaves the form untouched.
    pub fn apply_preset(&mut self, key: &str) -> bool {
        let Some(preset) = preset(key) else {
            return false;
        };

        self.fill_from(&preset.to_config());
        true
    }

    pub fn fill_from(&mut self, config: &ConnectionConfig) {
        self.db_type = config.db_type;
        self.host.clone_from(&config.host);
        self.port = config.port.to_string();
        self.database.clone_from(&config.database);
        self.user.clone_from(&config.user);
        self.password.clone_from(&config.password);
    }

    /// Builds a config, falling back to the type's default port when the port
    /// field does not parse as a non-zero number.
    #[must_use]
    pub fn to_config(&self) -> ConnectionConfig {
        let port = self
            .port
            .trim()
            .parse::<u16>()
            .ok()
            .filter(|port| *port != 0)
            .unwrap_or_else(|| self.db_type.default_port());

        ConnectionConfig {
            db_type: self.db_type,
            host: self.host.clone(),
            port,
            database: self.database.clone(),
            user: self.user.clone(),
            password: self.password.clone(),
        }
        .trimmed()
    }
}

/// Where generation takes its schema description from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MetadataSource {
    #[default]
    RealDatabase,
    Custom,
}

impl MetadataSource {
    #[must_use]
    pub fn toggled(self) -> Self {
        match self {
            Self::RealDatabase => Self::Custom,
            Self::Custom => Self::RealDatabase,
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::RealDatabase => "connected database",
            Self::Custom => "custom JSON",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestForm {
    pub text: String,
    pub include_etl: bool,
    pub model_name: String,
    pub metadata_source: MetadataSource,
    pub custom_metadata: String,
}

impl Default for RequestForm {
    fn default() -> Self {
        Self {
            text: String::new(),
            include_etl: false,
            model_name: DEFAULT_MODEL.to_string(),
            metadata_source: MetadataSource::RealDatabase,
            custom_metadata: String::new(),
        }
    }
}
