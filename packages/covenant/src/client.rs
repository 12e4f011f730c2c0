use async_trait::async_trait;
use thiserror::Error;

use crate::params::StakingParams;
use crate::types::{CovenantSigs, Delegation, TxResponse};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    #[error("rpc request failed: {0}")]
    Rpc(String),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("transaction rejected with code {code}: {log}")]
    TxRejected { code: u32, log: String },
}

/// ClientController is the covenant emulator's view of the Babylon chain
#[async_trait]
pub trait ClientController: Send + Sync {
    /// query_staking_params returns the BTC staking parameters in force
    async fn query_staking_params(&self) -> Result<StakingParams, ClientError>;

    /// query_pending_delegations returns at most `limit` delegations that still
    /// wait for covenant signatures
    async fn query_pending_delegations(&self, limit: u64) -> Result<Vec<Delegation>, ClientError>;

    /// submit_covenant_sigs submits the covenant signatures of one delegation
    async fn submit_covenant_sigs(&self, sigs: CovenantSigs) -> Result<TxResponse, ClientError>;
}
