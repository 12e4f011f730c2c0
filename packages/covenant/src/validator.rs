//! Checks a pending delegation before anything is signed for it.
//!
//! All transactions of the delegation are decoded and checked against the
//! staking parameters: the slashing tx against the staking tx, and the
//! unbonding slashing tx against the unbonding tx. On top of that the staking
//! and unbonding outputs must be exactly the outputs rebuilt from the
//! delegation's keys, so the signatures commit to the scripts the stake is
//! really locked in.

use babylon_bitcoin::new_btc_tx_from_hex;
use babylon_btcstaking::error::Error as BtcStakingError;
use babylon_btcstaking::staking_info::{
    build_staking_info, build_unbonding_info, StakingInfo, UnbondingInfo,
};
use babylon_btcstaking::tx_verify::check_transactions;
use bitcoin::{Amount, Network, Transaction, XOnlyPublicKey};

use crate::error::{CovenantError, Result};
use crate::params::StakingParams;
use crate::types::Delegation;

/// ValidatedDelegation is a delegation whose transactions passed validation,
/// together with the decoded transactions and rebuilt spend descriptors
#[derive(Debug, Clone)]
pub struct ValidatedDelegation {
    pub staker_pk: XOnlyPublicKey,
    pub fp_pks: Vec<XOnlyPublicKey>,
    pub staking_output_idx: u32,
    pub staking_tx: Transaction,
    pub slashing_tx: Transaction,
    pub unbonding_tx: Transaction,
    pub unbonding_slashing_tx: Transaction,
    pub staking_info: StakingInfo,
    pub unbonding_info: UnbondingInfo,
}

#[derive(Debug)]
pub enum Verdict {
    /// The delegation already has enough covenant signatures
    QuorumReached,
    Ready(Box<ValidatedDelegation>),
}

fn time_lock(what: &'static str, value: u32) -> Result<u16> {
    u16::try_from(value).map_err(|_| CovenantError::TimeLockOutOfRange { what, value })
}

/// validate_delegation decides whether the covenant should sign `del`
pub fn validate_delegation(del: &Delegation, params: &StakingParams, network: Network) -> Result<Verdict> {
    let undel = del
        .undelegation
        .as_ref()
        .ok_or_else(|| CovenantError::InvalidDelegation("empty undelegation".to_string()))?;

    if del.has_covenant_quorum(params.covenant_quorum) {
        return Ok(Verdict::QuorumReached);
    }

    // staking tx and slashing tx
    let staking_tx = new_btc_tx_from_hex(&del.staking_tx_hex)
        .map_err(|e| CovenantError::InvalidDelegationTxs(e.into()))?;
    let slashing_tx = new_btc_tx_from_hex(&del.slashing_tx_hex)
        .map_err(|e| CovenantError::InvalidDelegationTxs(e.into()))?;
    check_transactions(
        &slashing_tx,
        &staking_tx,
        del.staking_output_idx,
        params.min_slashing_tx_fee_sat,
        params.slashing_rate,
        &params.slashing_address,
        network,
    )
    .map_err(CovenantError::InvalidDelegationTxs)?;

    let staking_info = build_staking_info(
        &del.staker_pk,
        &del.fp_pks,
        &params.covenant_pks,
        params.covenant_quorum,
        time_lock("staking time", del.staking_time())?,
        Amount::from_sat(del.total_sat),
    )
    .map_err(CovenantError::InvalidDelegationTxs)?;
    // check_transactions already made sure the index is in range
    if staking_tx.output.get(del.staking_output_idx as usize) != Some(staking_info.staking_output()) {
        return Err(CovenantError::StakingOutputMismatch(del.staking_output_idx));
    }

    // unbonding tx and unbonding slashing tx
    let unbonding_tx = new_btc_tx_from_hex(&undel.unbonding_tx_hex)
        .map_err(|e| CovenantError::InvalidUndelegationTxs(e.into()))?;
    let unbonding_slashing_tx = new_btc_tx_from_hex(&undel.slashing_tx_hex)
        .map_err(|e| CovenantError::InvalidUndelegationTxs(e.into()))?;
    let unbonding_output = match unbonding_tx.output.as_slice() {
        [output] => output,
        outputs => {
            return Err(CovenantError::InvalidUndelegationTxs(
                BtcStakingError::TxOutputCountMismatch(1, outputs.len()),
            ))
        }
    };

    let unbonding_info = build_unbonding_info(
        &del.staker_pk,
        &del.fp_pks,
        &params.covenant_pks,
        params.covenant_quorum,
        time_lock("unbonding time", undel.unbonding_time)?,
        unbonding_output.value,
    )
    .map_err(CovenantError::InvalidUndelegationTxs)?;
    if unbonding_output != unbonding_info.unbonding_output() {
        return Err(CovenantError::UnbondingOutputMismatch);
    }

    check_transactions(
        &unbonding_slashing_tx,
        &unbonding_tx,
        0,
        params.min_slashing_tx_fee_sat,
        params.slashing_rate,
        &params.slashing_address,
        network,
    )
    .map_err(CovenantError::InvalidUndelegationTxs)?;

    Ok(Verdict::Ready(Box::new(ValidatedDelegation {
        staker_pk: del.staker_pk,
        fp_pks: del.fp_pks.clone(),
        staking_output_idx: del.staking_output_idx,
        staking_tx,
        slashing_tx,
        unbonding_tx,
        unbonding_slashing_tx,
        staking_info,
        unbonding_info,
    })))
}
