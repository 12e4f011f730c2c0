use bitcoin::{Txid, XOnlyPublicKey};
use k256::schnorr::Signature as SchnorrSignature;

/// Delegation is a BTC delegation waiting for covenant signatures, as reported
/// by the Babylon chain
#[derive(Debug, Clone, PartialEq)]
pub struct Delegation {
    pub staker_pk: XOnlyPublicKey,
    pub fp_pks: Vec<XOnlyPublicKey>,
    pub start_height: u32,
    pub end_height: u32,
    pub total_sat: u64,
    pub staking_tx_hex: String,
    pub slashing_tx_hex: String,
    pub staking_output_idx: u32,
    /// Adaptor signatures already collected from covenant members
    pub covenant_sigs: Vec<CovenantAdaptorSignatures>,
    pub undelegation: Option<Undelegation>,
}

impl Delegation {
    pub fn has_covenant_quorum(&self, quorum: u32) -> bool {
        self.covenant_sigs.len() >= quorum as usize
    }

    /// staking_time is the number of blocks the stake is locked for
    pub fn staking_time(&self) -> u32 {
        self.end_height.saturating_sub(self.start_height)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Undelegation {
    pub unbonding_tx_hex: String,
    /// slashing tx spending the unbonding output
    pub slashing_tx_hex: String,
    pub unbonding_time: u32,
    pub covenant_unbonding_sigs: Vec<SignatureInfo>,
    pub covenant_slashing_sigs: Vec<CovenantAdaptorSignatures>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CovenantAdaptorSignatures {
    pub cov_pk: XOnlyPublicKey,
    pub adaptor_sigs: Vec<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SignatureInfo {
    pub pk: XOnlyPublicKey,
    pub sig: SchnorrSignature,
}

/// CovenantSigs is what a covenant member submits for one delegation.
/// Adaptor signatures are serialized and ordered like the delegation's
/// finality providers.
#[derive(Debug, Clone, PartialEq)]
pub struct CovenantSigs {
    pub covenant_pk: XOnlyPublicKey,
    pub staking_tx_hash: Txid,
    pub slashing_sigs: Vec<Vec<u8>>,
    pub unbonding_sig: SchnorrSignature,
    pub unbonding_slashing_sigs: Vec<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxResponse {
    pub tx_hash: String,
}

/// SignatureOutcome is the successful result of signing one delegation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureOutcome {
    /// The delegation already has a covenant quorum, nothing was signed
    Skipped,
    Submitted(TxResponse),
}

/// TickSummary counts what happened to the delegations of one batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickSummary {
    pub submitted: usize,
    pub skipped: usize,
    pub failed: usize,
}
