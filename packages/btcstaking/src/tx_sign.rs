//! Signing of transactions that spend one script path of a Babylon output.
//!
//! The "strict" variants require the transaction to have exactly one input
//! which spends `funding_tx:funding_output_idx`.

use bitcoin::{OutPoint, Script, Transaction, TxOut};
use k256::schnorr::{Signature as SchnorrSignature, SigningKey};

use crate::adaptor_sig::{enc_sign, AdaptorSignature, EncryptionKey};
use crate::error::Error;
use crate::sig_verify::calc_sighash;
use crate::Result;

/// BIP-340 auxiliary randomness used for covenant signatures
const ZERO_AUX_RAND: [u8; 32] = [0u8; 32];

fn funding_output_for<'a>(
    tx_to_sign: &Transaction,
    funding_tx: &'a Transaction,
    funding_output_idx: u32,
) -> Result<&'a TxOut> {
    if tx_to_sign.input.len() != 1 {
        return Err(Error::TxInputCountMismatch(1, tx_to_sign.input.len()));
    }

    let funding_output = funding_tx
        .output
        .get(funding_output_idx as usize)
        .ok_or(Error::InvalidFundingOutputIndex(
            funding_output_idx,
            funding_tx.output.len(),
        ))?;

    let expected = OutPoint::new(funding_tx.compute_txid(), funding_output_idx);
    if tx_to_sign.input[0].previous_output != expected {
        return Err(Error::FundingOutputNotSpent(expected.to_string()));
    }

    Ok(funding_output)
}

/// sign_tx_with_one_script_spend_input_strict creates a BIP-340 signature of
/// `tx_to_sign` spending the funding output through `path_script`
pub fn sign_tx_with_one_script_spend_input_strict(
    tx_to_sign: &Transaction,
    funding_tx: &Transaction,
    funding_output_idx: u32,
    path_script: &Script,
    sk: &k256::SecretKey,
) -> Result<SchnorrSignature> {
    let funding_output = funding_output_for(tx_to_sign, funding_tx, funding_output_idx)?;
    let sighash = calc_sighash(tx_to_sign, funding_output, path_script)?;

    let signing_key = SigningKey::from_bytes(&sk.to_bytes())
        .map_err(|e| Error::SchnorrSignFailed(e.to_string()))?;
    signing_key
        .sign_raw(&sighash, &ZERO_AUX_RAND)
        .map_err(|e| Error::SchnorrSignFailed(e.to_string()))
}

/// enc_sign_tx_with_one_script_spend_input_strict creates an adaptor signature
/// of `tx_to_sign` spending the funding output through `path_script`,
/// encrypted under `enc_key`
pub fn enc_sign_tx_with_one_script_spend_input_strict(
    tx_to_sign: &Transaction,
    funding_tx: &Transaction,
    funding_output_idx: u32,
    path_script: &Script,
    sk: &k256::SecretKey,
    enc_key: &EncryptionKey,
) -> Result<AdaptorSignature> {
    let funding_output = funding_output_for(tx_to_sign, funding_tx, funding_output_idx)?;
    let sighash = calc_sighash(tx_to_sign, funding_output, path_script)?;

    enc_sign(sk, enc_key, sighash)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sig_verify::{
        enc_verify_transaction_sig_with_output, verify_transaction_sig_with_output,
    };
    use bitcoin::absolute::LockTime;
    use bitcoin::transaction::Version;
    use bitcoin::{Amount, ScriptBuf, Sequence, TxIn, Witness, XOnlyPublicKey};
    use k256::elliptic_curve::point::AffineCoordinates;

    fn secret_key(byte: u8) -> k256::SecretKey {
        k256::SecretKey::from_slice(&[byte; 32]).unwrap()
    }

    fn x_only(sk: &k256::SecretKey) -> XOnlyPublicKey {
        XOnlyPublicKey::from_slice(&sk.public_key().as_affine().x()).unwrap()
    }

    fn funding_tx() -> Transaction {
        Transaction {
            version: Version::TWO,
            lock_time: LockTime::ZERO,
            input: vec![],
            output: vec![
                TxOut {
                    value: Amount::from_sat(10_000),
                    script_pubkey: ScriptBuf::from_bytes(vec![0x6a, 1]),
                },
                TxOut {
                    value: Amount::from_sat(50_000),
                    script_pubkey: ScriptBuf::from_bytes(vec![0x6a, 2]),
                },
            ],
        }
    }

    fn spending_tx(previous_output: OutPoint) -> Transaction {
        Transaction {
            version: Version::TWO,
            lock_time: LockTime::ZERO,
            input: vec![TxIn {
                previous_output,
                script_sig: ScriptBuf::new(),
                sequence: Sequence::MAX,
                witness: Witness::new(),
            }],
            output: vec![TxOut {
                value: Amount::from_sat(49_000),
                script_pubkey: ScriptBuf::from_bytes(vec![0x6a, 3]),
            }],
        }
    }

    #[test]
    fn test_sign_produces_verifiable_signature() {
        let funding = funding_tx();
        let tx = spending_tx(OutPoint::new(funding.compute_txid(), 1));
        let path = ScriptBuf::from_bytes(vec![0x6a, 9]);
        let sk = secret_key(11);

        let sig = sign_tx_with_one_script_spend_input_strict(&tx, &funding, 1, &path, &sk).unwrap();
        verify_transaction_sig_with_output(&tx, &funding.output[1], &path, &x_only(&sk), &sig)
            .unwrap();
        // the signature commits to the spent output
        assert!(verify_transaction_sig_with_output(
            &tx,
            &funding.output[0],
            &path,
            &x_only(&sk),
            &sig
        )
        .is_err());
    }

    #[test]
    fn test_enc_sign_produces_verifiable_adaptor_signature() {
        let funding = funding_tx();
        let tx = spending_tx(OutPoint::new(funding.compute_txid(), 0));
        let path = ScriptBuf::from_bytes(vec![0x6a, 9]);
        let sk = secret_key(11);
        let fp_pk = x_only(&secret_key(12));
        let enc_key = EncryptionKey::from_btc_pk(&fp_pk).unwrap();

        let asig =
            enc_sign_tx_with_one_script_spend_input_strict(&tx, &funding, 0, &path, &sk, &enc_key)
                .unwrap();
        enc_verify_transaction_sig_with_output(
            &tx,
            &funding.output[0],
            &path,
            &x_only(&sk),
            &fp_pk,
            &asig,
        )
        .unwrap();
    }

    #[test]
    fn test_strict_signing_rejects_wrong_outpoint() {
        let funding = funding_tx();
        let tx = spending_tx(OutPoint::new(funding.compute_txid(), 0));
        let path = ScriptBuf::from_bytes(vec![0x6a, 9]);

        let err = sign_tx_with_one_script_spend_input_strict(&tx, &funding, 1, &path, &secret_key(1))
            .unwrap_err();
        assert!(matches!(err, Error::FundingOutputNotSpent(_)));

        let err = sign_tx_with_one_script_spend_input_strict(&tx, &funding, 5, &path, &secret_key(1))
            .unwrap_err();
        assert_eq!(err, Error::InvalidFundingOutputIndex(5, 2));
    }

    #[test]
    fn test_strict_signing_rejects_multiple_inputs() {
        let funding = funding_tx();
        let mut tx = spending_tx(OutPoint::new(funding.compute_txid(), 0));
        tx.input.push(tx.input[0].clone());
        let path = ScriptBuf::from_bytes(vec![0x6a, 9]);

        let err = sign_tx_with_one_script_spend_input_strict(&tx, &funding, 0, &path, &secret_key(1))
            .unwrap_err();
        assert_eq!(err, Error::TxInputCountMismatch(1, 2));
    }
}
