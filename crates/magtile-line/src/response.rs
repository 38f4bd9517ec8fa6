/// Prefix of a successful reply; the payload follows it.
pub const SUCCESS_PREFIX: &str = "ok : ";

/// Exact reply sent when the device rejects a command.
pub const ERROR_REPLY: &str = "error";

/// A classified reply line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// `ok : <payload>`. The payload is trimmed and may be empty.
    Success(String),
    /// `error`.
    CommandError,
    /// Anything else, carried verbatim.
    ProtocolError(String),
}

impl Response {
    /// Classify one received line.
    ///
    /// Only a line that starts with the full `"ok : "` prefix is a success. A
    /// bare `"ok :"` carries no payload separator and is a protocol error.
    pub fn classify(line: &str) -> Self {
        if let Some(payload) = line.strip_prefix(SUCCESS_PREFIX) {
            return Response::Success(payload.trim().to_string());
        }
        if line == ERROR_REPLY {
            return Response::CommandError;
        }
        Response::ProtocolError(line.to_string())
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Response::Success(_))
    }

    /// Success payload, if any.
    pub fn payload(&self) -> Option<&str> {
        match self {
            Response::Success(payload) => Some(payload),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_with_payload() {
        assert_eq!(
            Response::classify("ok : 128"),
            Response::Success("128".to_string())
        );
    }

    #[test]
    fn success_payload_keeps_inner_spaces() {
        assert_eq!(
            Response::classify("ok : 8 9 10"),
            Response::Success("8 9 10".to_string())
        );
    }

    #[test]
    fn success_payload_is_trimmed() {
        assert_eq!(
            Response::classify("ok :   42  "),
            Response::Success("42".to_string())
        );
    }

    #[test]
    fn bare_ok_is_protocol_error() {
        assert_eq!(
            Response::classify("ok :"),
            Response::ProtocolError("ok :".to_string())
        );
    }

    #[test]
    fn error_reply() {
        assert_eq!(Response::classify("error"), Response::CommandError);
    }

    #[test]
    fn error_must_match_exactly() {
        assert_eq!(
            Response::classify("error: bad address"),
            Response::ProtocolError("error: bad address".to_string())
        );
    }

    #[test]
    fn unknown_reply() {
        assert_eq!(
            Response::classify("wat"),
            Response::ProtocolError("wat".to_string())
        );
    }

    #[test]
    fn prefix_is_case_sensitive() {
        assert!(!Response::classify("OK : 1").is_success());
        assert!(!Response::classify("ok: 1").is_success());
    }

    #[test]
    fn payload_accessor() {
        assert_eq!(Response::classify("ok : 5").payload(), Some("5"));
        assert_eq!(Response::CommandError.payload(), None);
    }
}
