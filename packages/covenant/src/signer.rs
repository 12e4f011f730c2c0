use babylon_btcstaking::adaptor_sig::{AdaptorSignature, EncryptionKey};
use babylon_btcstaking::staking_info::SpendInfo;
use babylon_btcstaking::tx_sign::{
    enc_sign_tx_with_one_script_spend_input_strict, sign_tx_with_one_script_spend_input_strict,
};
use bitcoin::{Transaction, XOnlyPublicKey};
use k256::schnorr::Signature as SchnorrSignature;

use crate::error::{CovenantError, Result};
use crate::validator::ValidatedDelegation;

/// SigningResult holds the covenant signatures of one delegation. Both adaptor
/// signature lists are in the order of the delegation's finality providers.
#[derive(Debug, Clone)]
pub struct SigningResult {
    pub slashing_sigs: Vec<AdaptorSignature>,
    pub unbonding_sig: SchnorrSignature,
    pub unbonding_slashing_sigs: Vec<AdaptorSignature>,
}

fn enc_sign_for_each_fp(
    what: &'static str,
    tx: &Transaction,
    funding_tx: &Transaction,
    funding_output_idx: u32,
    path: &SpendInfo,
    fp_pks: &[XOnlyPublicKey],
    sk: &k256::SecretKey,
) -> Result<Vec<AdaptorSignature>> {
    fp_pks
        .iter()
        .map(|fp_pk| {
            let enc_key = EncryptionKey::from_btc_pk(fp_pk)?;
            enc_sign_tx_with_one_script_spend_input_strict(
                tx,
                funding_tx,
                funding_output_idx,
                path.pk_script_path(),
                sk,
                &enc_key,
            )
        })
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|source| CovenantError::Signing { what, source })
}

/// sign_delegation produces all covenant signatures for a validated
/// delegation. Any failure aborts the whole result.
pub fn sign_delegation(del: &ValidatedDelegation, sk: &k256::SecretKey) -> Result<SigningResult> {
    let slashing_path = del
        .staking_info
        .slashing_path_spend_info()
        .map_err(|source| CovenantError::Signing {
            what: "slashing tx",
            source,
        })?;
    let slashing_sigs = enc_sign_for_each_fp(
        "slashing tx",
        &del.slashing_tx,
        &del.staking_tx,
        del.staking_output_idx,
        &slashing_path,
        &del.fp_pks,
        sk,
    )?;

    let unbonding_path = del
        .staking_info
        .unbonding_path_spend_info()
        .map_err(|source| CovenantError::Signing {
            what: "unbonding tx",
            source,
        })?;
    let unbonding_sig = sign_tx_with_one_script_spend_input_strict(
        &del.unbonding_tx,
        &del.staking_tx,
        del.staking_output_idx,
        unbonding_path.pk_script_path(),
        sk,
    )
    .map_err(|source| CovenantError::Signing {
        what: "unbonding tx",
        source,
    })?;

    let unbonding_slashing_path = del
        .unbonding_info
        .slashing_path_spend_info()
        .map_err(|source| CovenantError::Signing {
            what: "unbonding slashing tx",
            source,
        })?;
    let unbonding_slashing_sigs = enc_sign_for_each_fp(
        "unbonding slashing tx",
        &del.unbonding_slashing_tx,
        &del.unbonding_tx,
        0,
        &unbonding_slashing_path,
        &del.fp_pks,
        sk,
    )?;

    Ok(SigningResult {
        slashing_sigs,
        unbonding_sig,
        unbonding_slashing_sigs,
    })
}
