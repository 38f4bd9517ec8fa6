use magtile_line::Response;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Reply data for a successful connect.
pub const CONNECTED: &str = "Connected to device";
/// Reply data for a successful disconnect.
pub const DISCONNECTED: &str = "Disconnected from device";
/// Reply data when the device answers `error`.
pub const COMMAND_ERROR: &str = "Command error";
/// Prefix of the reply data for an unrecognized device line.
pub const UNKNOWN_RESPONSE: &str = "Unknown response";

/// Outcome of an operation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Error,
}

/// Host-facing result of a session operation.
///
/// On success `data` carries the device payload (or a fixed confirmation for
/// connect and disconnect); on error it carries a diagnostic.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Reply {
    pub status: Status,
    pub data: String,
}

impl Reply {
    /// Create a success reply.
    pub fn success(data: impl Into<String>) -> Self {
        Self {
            status: Status::Success,
            data: data.into(),
        }
    }

    /// Create an error reply.
    pub fn error(data: impl Into<String>) -> Self {
        Self {
            status: Status::Error,
            data: data.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }
}

impl From<Response> for Reply {
    fn from(response: Response) -> Self {
        match response {
            Response::Success(payload) => Reply::success(payload),
            Response::CommandError => Reply::error(COMMAND_ERROR),
            Response::ProtocolError(raw) => Reply::error(format!("{UNKNOWN_RESPONSE}: {raw}")),
        }
    }
}

impl From<Result<Response>> for Reply {
    fn from(result: Result<Response>) -> Self {
        match result {
            Ok(response) => response.into(),
            Err(err) => Reply::error(err.to_string()),
        }
    }
}
