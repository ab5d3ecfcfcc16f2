//! The connection contract and its MySQL / MariaDB implementation.

use std::future::Future;

use serde::{Deserialize, Serialize};
use sqlx::mysql::{MySqlDatabaseError, MySqlRow};
use sqlx::{ConnectOptions, Connection as _, Executor as _, Row as _};
use tracing::{debug, warn};

use crate::config::SqlConfig;
use crate::error::Result;

/// Client-side error number used when no server error number is available.
pub const CLIENT_ERROR_CODE: u32 = 2000;

/// One result row; `NULL` values are `None`.
pub type Row = Vec<Option<String>>;

/// Error reported for a single statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnError {
    /// Server error number, or [`CLIENT_ERROR_CODE`].
    pub code: u32,
    /// Error message.
    pub msg: String,
}

/// Outcome of executing one statement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnResponse {
    /// Whether the statement succeeded.
    pub status: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ConnError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<Row>>,
}

impl ConnResponse {
    /// A successful response, with rows when the statement returned any.
    #[must_use]
    pub fn ok(rows: Vec<Row>) -> Self {
        Self {
            status: true,
            error: None,
            data: (!rows.is_empty()).then_some(rows),
        }
    }

    /// A failed response.
    #[must_use]
    pub fn failed(code: u32, msg: impl Into<String>) -> Self {
        Self {
            status: false,
            error: Some(ConnError {
                code,
                msg: msg.into(),
            }),
            data: None,
        }
    }

    /// Converts the response into its rows or its error.
    ///
    /// # Errors
    ///
    /// Returns the statement's error when `status` is false.
    pub fn into_result(self) -> std::result::Result<Vec<Row>, ConnError> {
        match (self.status, self.error) {
            (true, _) => Ok(self.data.unwrap_or_default()),
            (false, Some(error)) => Err(error),
            (false, None) => Err(ConnError {
                code: CLIENT_ERROR_CODE,
                msg: "statement failed without an error".to_string(),
            }),
        }
    }
}

/// Something that executes SQL statements one at a time.
///
/// Failures are reported in the returned [`ConnResponse`], never by
/// panicking or aborting.
pub trait Connection {
    /// Executes one statement and returns its rows or its error.
    fn execute(&mut self, statement: &str) -> impl Future<Output = ConnResponse>;

    /// Closes the connection. Statements executed afterwards fail.
    fn close(&mut self) -> impl Future<Output = ()>;
}

/// A single MySQL / MariaDB connection.
pub struct MySqlConnection {
    inner: Option<sqlx::MySqlConnection>,
}

impl MySqlConnection {
    /// Opens a connection with the given settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the server cannot be reached or rejects the
    /// credentials.
    pub async fn connect(config: &SqlConfig) -> Result<Self> {
        debug!(url = %config.url(), "Connecting");
        let inner = config.connect_options().connect().await?;
        Ok(Self { inner: Some(inner) })
    }

    /// Whether [`Connection::close`] has been called.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.inner.is_none()
    }
}

impl Connection for MySqlConnection {
    async fn execute(&mut self, statement: &str) -> ConnResponse {
        let Some(conn) = self.inner.as_mut() else {
            return ConnResponse::failed(CLIENT_ERROR_CODE, "Connection is closed");
        };
        // Without bind arguments the statement goes over the text protocol.
        match conn.fetch_all(statement).await {
            Ok(rows) => ConnResponse::ok(rows.iter().map(row_values).collect()),
            Err(err) => ConnResponse::failed(error_number(&err), err.to_string()),
        }
    }

    async fn close(&mut self) {
        if let Some(conn) = self.inner.take() {
            if let Err(e) = conn.close().await {
                warn!(error = %e, "Failed to close connection cleanly");
            }
        }
    }
}

fn row_values(row: &MySqlRow) -> Row {
    (0..row.len())
        .map(|i| row.try_get_unchecked::<Option<String>, _>(i).ok().flatten())
        .collect()
}

fn error_number(err: &sqlx::Error) -> u32 {
    err.as_database_error()
        .and_then(|e| e.try_downcast_ref::<MySqlDatabaseError>())
        .map_or(CLIENT_ERROR_CODE, |e| u32::from(e.number()))
}
