use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum Error {
    #[error("Invalid hex string: {0}")]
    InvalidHex(#[from] hex::FromHexError),
    #[error("Failed to decode Bitcoin transaction: {0}")]
    TxDecodeFailed(String),
    #[error("Failed to parse public key: {0}")]
    FailedToParsePublicKey(String),
    #[error("Unknown Bitcoin network: {0}")]
    UnknownNetwork(String),
}
