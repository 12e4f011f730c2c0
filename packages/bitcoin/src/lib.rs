pub use bitcoin::{
    consensus::encode::Error as EncodeError,
    consensus::{deserialize, serialize},
    Transaction, Txid, XOnlyPublicKey,
};

pub mod chain_params;
pub mod error;

pub type Result<T> = std::result::Result<T, error::Error>;

/// new_btc_tx_from_hex decodes a consensus-encoded Bitcoin transaction from its
/// hex representation
pub fn new_btc_tx_from_hex(tx_hex: &str) -> Result<Transaction> {
    let tx_bytes = hex::decode(tx_hex)?;
    deserialize(&tx_bytes).map_err(|e| error::Error::TxDecodeFailed(e.to_string()))
}

/// new_bip340_pk_from_hex parses a 32-byte x-only public key, encoded as in
/// BIP-340, from its hex representation
pub fn new_bip340_pk_from_hex(pk_hex: &str) -> Result<XOnlyPublicKey> {
    let pk_bytes = hex::decode(pk_hex)?;
    XOnlyPublicKey::from_slice(&pk_bytes)
        .map_err(|e| error::Error::FailedToParsePublicKey(e.to_string()))
}

/// bip340_pk_hex encodes an x-only public key in BIP-340 hex format
pub fn bip340_pk_hex(pk: &XOnlyPublicKey) -> String {
    hex::encode(pk.serialize())
}
