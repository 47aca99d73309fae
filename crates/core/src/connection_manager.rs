use serde_json::Value;
use thiserror::Error;

use crate::backend::ApiError;
use crate::profiles::ConnectionConfig;
use crate::wire::{ConnectAck, ConnectRequest, MetadataResponse};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

/// Schema description returned by the backend for the active connection.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedMetadata {
    pub schema: Value,
    pub table_count: usize,
}

impl From<MetadataResponse> for ExtractedMetadata {
    fn from(response: MetadataResponse) -> Self {
        Self {
            schema: response.metadata,
            table_count: response.table_count,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionStatus {
    pub state: ConnectionState,
    pub database: Option<String>,
    pub last_error: Option<String>,
}

impl ConnectionStatus {
    #[must_use]
    pub fn disconnected() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            database: None,
            last_error: None,
        }
    }

    #[must_use]
    pub fn text(&self) -> String {
        match self.state {
            ConnectionState::Connected => format!(
                "Connected to {}",
                self.database.as_deref().unwrap_or("database")
            ),
            ConnectionState::Connecting => "Connecting...".to_string(),
            ConnectionState::Disconnected => match &self.last_error {
                Some(error) => format!("Connection failed: {error}"),
                None => "Not connected".to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionError {
    #[error("enter the {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),
    #[error("already connected to `{database}`; disconnect first")]
    AlreadyConnected { database: String },
    #[error("connect to a database first")]
    NotConnected,
}

#[derive(Debug, Default)]
pub struct ConnectionManager {
    state: ConnectionState,
    active: Option<ConnectionConfig>,
    pending: Option<ConnectionConfig>,
    metadata: Option<ExtractedMetadata>,
    last_error: Option<String>,
}

impl ConnectionManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        let database = match self.state {
            ConnectionState::Connected => self.active.as_ref(),
            ConnectionState::Connecting => self.pending.as_ref(),
            ConnectionState::Disconnected => None,
        }
        .map(|config| config.database.clone());

        ConnectionStatus {
            state: self.state,
            database,
            last_error: self.last_error.clone(),
        }
    }

    #[must_use]
    pub fn active_config(&self) -> Option<&ConnectionConfig> {
        self.active.as_ref()
    }

    #[must_use]
    pub fn metadata(&self) -> Option<&ExtractedMetadata> {
        self.metadata.as_ref()
    }

    pub fn begin_connect(
        &mut self,
        config: ConnectionConfig,
    ) -> Result<ConnectRequest, ConnectionError> {
        if let Some(active) = &self.active {
            return Err(ConnectionError::AlreadyConnected {
                database: active.database.clone(),
            });
        }

        let config = config.trimmed();
        let missing = config.missing_fields();
        if !missing.is_empty() {
            return Err(ConnectionError::MissingFields(missing));
        }

        let request = ConnectRequest::from(&config);
        self.state = ConnectionState::Connecting;
        self.pending = Some(config);
        self.last_error = None;
        Ok(request)
    }

    pub fn complete_connect(&mut self, outcome: Result<ConnectAck, ApiError>) {
        match outcome {
            Ok(_) => {
                self.active = self.pending.take();
                self.state = if self.active.is_some() {
                    ConnectionState::Connected
                } else {
                    ConnectionState::Disconnected
                };
                self.metadata = None;
                self.last_error = None;
            }
            Err(error) => {
                self.pending = None;
                self.active = None;
                self.state = ConnectionState::Disconnected;
                self.last_error = Some(error.to_string());
            }
        }
    }

    /// Drops local connection state. Returns whether a connection was active.
    pub fn disconnect(&mut self) -> bool {
        let was_connected = self.active.take().is_some();
        self.pending = None;
        self.metadata = None;
        self.last_error = None;
        self.state = ConnectionState::Disconnected;
        was_connected
    }

    pub fn ensure_connected(&self) -> Result<(), ConnectionError> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(ConnectionError::NotConnected)
        }
    }

    pub fn cache_metadata(&mut self, response: MetadataResponse) -> &ExtractedMetadata {
        self.metadata.insert(ExtractedMetadata::from(response))
    }
}
