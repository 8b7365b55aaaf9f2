use crate::config::ConfigError;
use std::io;
use thiserror::Error;

/// Errors that end a client run
#[derive(Debug, Error)]
pub enum ClientError {
    /// I/O related errors (network, replay file, terminal output)
    #[error("I/O error: {0}")]
    Io(io::Error),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Server closed or dropped the connection
    #[error("disconnected from server")]
    Disconnected,
}

impl From<io::Error> for ClientError {
    fn from(err: io::Error) -> Self {
        use io::ErrorKind;

        match err.kind() {
            ErrorKind::UnexpectedEof | ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted => {
                ClientError::Disconnected
            }
            _ => ClientError::Io(err),
        }
    }
}

pub type ClientResult<T> = Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_loss_maps_to_disconnected() {
        let err = ClientError::from(io::Error::from(io::ErrorKind::ConnectionReset));
        assert!(matches!(err, ClientError::Disconnected));

        let err = ClientError::from(io::Error::from(io::ErrorKind::PermissionDenied));
        assert!(matches!(err, ClientError::Io(_)));
    }

    #[test]
    fn test_config_error_message() {
        let err = ClientError::from(ConfigError::UnknownKey("colour".to_string()));
        assert_eq!(err.to_string(), "configuration error: unknown config key: colour");
    }
}
