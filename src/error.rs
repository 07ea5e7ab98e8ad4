use crate::response::GatewayRejection;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("Connection failed: {0}")]
    Connection(String),
    #[error("Request timed out")]
    Timeout,
    #[error("Stream error: {0}")]
    Stream(#[from] h2::Error),
    #[error("Token signing failed: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
    #[error("Payload serialization failed: {0}")]
    Payload(#[from] serde_json::Error),
    #[error("Gateway rejected notification: {0}")]
    Gateway(GatewayRejection),
    #[error("Client is shut down")]
    Shutdown,
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Returns the gateway rejection carried by this error, if any.
    pub const fn rejection(&self) -> Option<&GatewayRejection> {
        match self {
            Self::Gateway(rejection) => Some(rejection),
            _ => None,
        }
    }
}
