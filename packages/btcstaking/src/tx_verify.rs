use bitcoin::address::NetworkUnchecked;
use bitcoin::{address::Address, network::Network, OutPoint, Transaction};
use rust_decimal::{prelude::*, Decimal};

use crate::error::Error;
use crate::Result;

/// DUST_THRESHOLD_SAT is the value at or below which an output is considered dust
const DUST_THRESHOLD_SAT: u64 = 546;

/// Validates a slashing transaction with strict criteria
fn validate_slashing_tx(
    slashing_tx: &Transaction,
    slashing_address: &Address,
    slashing_rate: Decimal,
    slashing_tx_min_fee: u64,
    staking_output_value: u64,
) -> Result<()> {
    if slashing_tx.input.len() != 1 {
        return Err(Error::TxInputCountMismatch(1, slashing_tx.input.len()));
    }

    if slashing_tx.input[0].sequence.is_rbf() {
        return Err(Error::TxIsReplaceable {});
    }

    if slashing_tx.lock_time.to_consensus_u32() > 0 {
        return Err(Error::TxHasLocktime {});
    }

    if slashing_tx.output.len() != 2 {
        return Err(Error::TxOutputCountMismatch(2, slashing_tx.output.len()));
    }

    let expected_slashing_amount = (Decimal::from(staking_output_value) * slashing_rate)
        .round()
        .to_u64()
        .ok_or(Error::InvalidSlashingRate {})?;
    if slashing_tx.output[0].value.to_sat() < expected_slashing_amount {
        return Err(Error::InsufficientSlashingAmount(expected_slashing_amount));
    }

    // Verify that the first output pays to the provided slashing address.
    let slashing_pk_script = slashing_address.script_pubkey();
    if slashing_tx.output[0].script_pubkey != slashing_pk_script {
        return Err(Error::InvalidSlashingAddress {});
    }

    // Check for dust outputs
    if slashing_tx
        .output
        .iter()
        .any(|out| out.value.to_sat() <= DUST_THRESHOLD_SAT)
    {
        return Err(Error::TxContainsDustOutputs {});
    }

    // Check fees, an output sum beyond u64 overspends any funding output
    let total_output_value = slashing_tx
        .output
        .iter()
        .try_fold(0u64, |total, out| total.checked_add(out.value.to_sat()))
        .ok_or(Error::SlashingTxOverspend {})?;
    let calculated_fee = staking_output_value
        .checked_sub(total_output_value)
        .filter(|fee| *fee > 0)
        .ok_or(Error::SlashingTxOverspend {})?;
    if calculated_fee < slashing_tx_min_fee {
        return Err(Error::InsufficientSlashingFee(slashing_tx_min_fee));
    }

    Ok(())
}

/// Checks if the given rate is between the valid range i.e., (0,1) with a precision of at most 2 decimal places.
fn is_rate_valid(rate: Decimal) -> bool {
    // Check if the slashing rate is between 0 and 1
    if rate <= Decimal::ZERO || rate >= Decimal::ONE {
        return false;
    }

    // Multiply by 100 to move the decimal places and check if precision is at most 2 decimal places
    let multiplied_rate = rate * Decimal::ONE_HUNDRED;

    // Check if the truncated rate is equal to the original rate
    multiplied_rate == multiplied_rate.trunc()
}

/// Validates all relevant data of slashing and funding transactions.
///
/// The funding transaction is either a staking transaction or an unbonding
/// transaction; the slashing transaction must spend its output at
/// `funding_output_idx`.
pub fn check_transactions(
    slashing_tx: &Transaction,
    funding_transaction: &Transaction,
    funding_output_idx: u32,
    slashing_tx_min_fee: u64,
    slashing_rate: Decimal,
    slashing_address: &Address<NetworkUnchecked>,
    network: Network,
) -> Result<()> {
    // Check if slashing tx min fee is valid
    if slashing_tx_min_fee == 0 {
        return Err(Error::InvalidSlashingMinFee {});
    }

    // Check if slashing rate is in the valid range (0,1)
    if !is_rate_valid(slashing_rate) {
        return Err(Error::InvalidSlashingRate {});
    }

    let slashing_address = slashing_address
        .clone()
        .require_network(network)
        .map_err(|_| Error::SlashingAddressNetworkMismatch(network.to_string()))?;

    let staking_output = funding_transaction
        .output
        .get(funding_output_idx as usize)
        .ok_or(Error::InvalidFundingOutputIndex(
            funding_output_idx,
            funding_transaction.output.len(),
        ))?;

    // Check if slashing transaction is valid
    validate_slashing_tx(
        slashing_tx,
        &slashing_address,
        slashing_rate,
        slashing_tx_min_fee,
        staking_output.value.to_sat(),
    )?;

    // Check that slashing transaction input is pointing to the funding output
    let funding_outpoint = OutPoint::new(funding_transaction.compute_txid(), funding_output_idx);
    if slashing_tx.input[0].previous_output != funding_outpoint {
        return Err(Error::StakingOutputNotSpentBySlashingTx {});
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::absolute::LockTime;
    use bitcoin::key::Secp256k1;
    use bitcoin::transaction::Version;
    use bitcoin::{Amount, ScriptBuf, Sequence, TxIn, TxOut, Witness};

    use crate::scripts_utils::unspendable_key_path_internal_pub_key;

    const STAKING_VALUE: u64 = 100_000;

    fn slashing_address(network: Network) -> Address {
        let secp = Secp256k1::verification_only();
        let key = unspendable_key_path_internal_pub_key().unwrap();
        Address::p2tr(&secp, key, None, network)
    }

    fn funding_tx() -> Transaction {
        Transaction {
            version: Version::TWO,
            lock_time: LockTime::ZERO,
            input: vec![],
            output: vec![
                TxOut {
                    value: Amount::from_sat(1_000),
                    script_pubkey: ScriptBuf::new(),
                },
                TxOut {
                    value: Amount::from_sat(STAKING_VALUE),
                    script_pubkey: ScriptBuf::new(),
                },
            ],
        }
    }

    /// slashing_tx spends output 1 of the funding tx, slashing 10% and paying
    /// `fee` to miners
    fn slashing_tx(funding: &Transaction, fee: u64) -> Transaction {
        let slashed = STAKING_VALUE / 10;
        Transaction {
            version: Version::TWO,
            lock_time: LockTime::ZERO,
            input: vec![TxIn {
                previous_output: OutPoint::new(funding.compute_txid(), 1),
                script_sig: ScriptBuf::new(),
                sequence: Sequence::MAX,
                witness: Witness::new(),
            }],
            output: vec![
                TxOut {
                    value: Amount::from_sat(slashed),
                    script_pubkey: slashing_address(Network::Regtest).script_pubkey(),
                },
                TxOut {
                    value: Amount::from_sat(STAKING_VALUE - slashed - fee),
                    script_pubkey: ScriptBuf::new(),
                },
            ],
        }
    }

    fn check(slashing: &Transaction, funding: &Transaction, min_fee: u64, rate: Decimal) -> Result<()> {
        check_transactions(
            slashing,
            funding,
            1,
            min_fee,
            rate,
            slashing_address(Network::Regtest).as_unchecked(),
            Network::Regtest,
        )
    }

    #[test]
    fn test_check_transactions() {
        let funding = funding_tx();
        let slashing = slashing_tx(&funding, 1_000);
        check(&slashing, &funding, 1_000, Decimal::new(1, 1)).unwrap();
    }

    #[test]
    fn test_check_transactions_rejects_low_fee() {
        let funding = funding_tx();
        let slashing = slashing_tx(&funding, 500);
        assert_eq!(
            check(&slashing, &funding, 1_000, Decimal::new(1, 1)),
            Err(Error::InsufficientSlashingFee(1_000))
        );
    }

    #[test]
    fn test_check_transactions_rejects_insufficient_slashing_amount() {
        let funding = funding_tx();
        let slashing = slashing_tx(&funding, 1_000);
        // 20% of the staking value should be slashed, only 10% is
        assert_eq!(
            check(&slashing, &funding, 1_000, Decimal::new(2, 1)),
            Err(Error::InsufficientSlashingAmount(20_000))
        );
    }

    #[test]
    fn test_check_transactions_rejects_invalid_params() {
        let funding = funding_tx();
        let slashing = slashing_tx(&funding, 1_000);
        assert_eq!(
            check(&slashing, &funding, 0, Decimal::new(1, 1)),
            Err(Error::InvalidSlashingMinFee {})
        );
        for rate in [Decimal::ZERO, Decimal::ONE, Decimal::new(105, 3)] {
            assert_eq!(
                check(&slashing, &funding, 1_000, rate),
                Err(Error::InvalidSlashingRate {})
            );
        }
    }

    #[test]
    fn test_check_transactions_rejects_wrong_network_address() {
        let funding = funding_tx();
        let slashing = slashing_tx(&funding, 1_000);
        let err = check_transactions(
            &slashing,
            &funding,
            1,
            1_000,
            Decimal::new(1, 1),
            slashing_address(Network::Regtest).as_unchecked(),
            Network::Bitcoin,
        )
        .unwrap_err();
        assert!(matches!(err, Error::SlashingAddressNetworkMismatch(_)));
    }

    #[test]
    fn test_check_transactions_rejects_wrong_outpoint() {
        let funding = funding_tx();
        let slashing = slashing_tx(&funding, 1_000);
        let err = check_transactions(
            &slashing,
            &funding,
            0,
            1,
            Decimal::new(1, 1),
            slashing_address(Network::Regtest).as_unchecked(),
            Network::Regtest,
        )
        .unwrap_err();
        // output 0 is worth less than the slashing tx pays out
        assert_eq!(err, Error::SlashingTxOverspend {});

        let mut other_funding = funding_tx();
        other_funding.lock_time = LockTime::from_consensus(1);
        assert_eq!(
            check(&slashing, &other_funding, 1_000, Decimal::new(1, 1)),
            Err(Error::StakingOutputNotSpentBySlashingTx {})
        );
    }

    #[test]
    fn test_check_transactions_rejects_output_sum_overflow() {
        let funding = funding_tx();
        let mut slashing = slashing_tx(&funding, 1_000);
        let out0 = slashing.output[0].value.to_sat();
        // the outputs wrap around to a sum just below the staking value
        slashing.output[1].value = Amount::from_sat(u64::MAX - out0 + 5_000);
        assert_eq!(
            check(&slashing, &funding, 1_000, Decimal::new(1, 1)),
            Err(Error::SlashingTxOverspend {})
        );

        slashing.output[0].value = Amount::MAX;
        slashing.output[1].value = Amount::MAX;
        assert_eq!(
            check(&slashing, &funding, 1_000, Decimal::new(1, 1)),
            Err(Error::SlashingTxOverspend {})
        );
    }

    #[test]
    fn test_check_transactions_rejects_zero_fee() {
        let funding = funding_tx();
        let slashing = slashing_tx(&funding, 0);
        assert_eq!(
            check(&slashing, &funding, 1_000, Decimal::new(1, 1)),
            Err(Error::SlashingTxOverspend {})
        );
    }

    #[test]
    fn test_check_transactions_rejects_malformed_slashing_tx() {
        let funding = funding_tx();

        let mut replaceable = slashing_tx(&funding, 1_000);
        replaceable.input[0].sequence = Sequence::ENABLE_RBF_NO_LOCKTIME;
        assert_eq!(
            check(&replaceable, &funding, 1_000, Decimal::new(1, 1)),
            Err(Error::TxIsReplaceable {})
        );

        let mut locked = slashing_tx(&funding, 1_000);
        locked.lock_time = LockTime::from_consensus(10);
        assert_eq!(
            check(&locked, &funding, 1_000, Decimal::new(1, 1)),
            Err(Error::TxHasLocktime {})
        );

        let mut wrong_address = slashing_tx(&funding, 1_000);
        wrong_address.output[0].script_pubkey = ScriptBuf::new();
        assert_eq!(
            check(&wrong_address, &funding, 1_000, Decimal::new(1, 1)),
            Err(Error::InvalidSlashingAddress {})
        );

        let mut dust = slashing_tx(&funding, 1_000);
        dust.output[1].value = Amount::from_sat(500);
        assert_eq!(
            check(&dust, &funding, 1_000, Decimal::new(1, 1)),
            Err(Error::TxContainsDustOutputs {})
        );
    }
}
