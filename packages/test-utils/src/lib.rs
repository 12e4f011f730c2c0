//! Deterministic key material and BTC delegation fixtures for tests.
//!
//! Every fixture is derived from small integer seeds, so tests can rebuild the
//! exact same keys and transactions without any testdata files.

use babylon_btcstaking::staking_info::{build_staking_info, build_unbonding_info};
use bitcoin::absolute::LockTime;
use bitcoin::address::NetworkUnchecked;
use bitcoin::hashes::Hash;
use bitcoin::key::Secp256k1;
use bitcoin::transaction::Version;
use bitcoin::{
    Address, Amount, Network, OutPoint, ScriptBuf, Sequence, Transaction, TxIn, TxOut, Txid,
    Witness, XOnlyPublicKey,
};
use k256::elliptic_curve::point::AffineCoordinates;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

/// KeyPair is a BTC key pair whose secret key is `[seed; 32]`
#[derive(Clone, Debug)]
pub struct KeyPair {
    pub secret: k256::SecretKey,
    pub public: XOnlyPublicKey,
}

impl KeyPair {
    pub fn from_seed(seed: u8) -> Self {
        assert_ne!(seed, 0, "seed 0 is not a valid secret key");
        let secret = k256::SecretKey::from_slice(&[seed; 32]).unwrap();
        let public = x_only_public_key(&secret);
        KeyPair { secret, public }
    }

    pub fn public_hex(&self) -> String {
        babylon_bitcoin::bip340_pk_hex(&self.public)
    }
}

/// x_only_public_key returns the BIP-340 public key of a secret key
pub fn x_only_public_key(sk: &k256::SecretKey) -> XOnlyPublicKey {
    XOnlyPublicKey::from_slice(&sk.public_key().as_affine().x()).unwrap()
}

pub fn tx_hex(tx: &Transaction) -> String {
    hex::encode(babylon_bitcoin::serialize(tx))
}

/// ParamsFixture mirrors the staking parameters of the chain: covenant
/// committee, quorum and slashing rules
#[derive(Clone, Debug)]
pub struct ParamsFixture {
    pub covenant_keys: Vec<KeyPair>,
    pub covenant_quorum: u32,
    pub slashing_rate: Decimal,
    pub min_slashing_tx_fee_sat: u64,
    pub slashing_address: Address,
    pub network: Network,
}

impl Default for ParamsFixture {
    fn default() -> Self {
        Self::new(&[101, 102, 103], 2)
    }
}

impl ParamsFixture {
    pub fn new(covenant_seeds: &[u8], covenant_quorum: u32) -> Self {
        let network = Network::Signet;
        let secp = Secp256k1::verification_only();
        let slashing_address = Address::p2tr(&secp, KeyPair::from_seed(200).public, None, network);

        ParamsFixture {
            covenant_keys: covenant_seeds.iter().map(|s| KeyPair::from_seed(*s)).collect(),
            covenant_quorum,
            slashing_rate: Decimal::new(1, 1),
            min_slashing_tx_fee_sat: 1_000,
            slashing_address,
            network,
        }
    }

    pub fn covenant_pks(&self) -> Vec<XOnlyPublicKey> {
        self.covenant_keys.iter().map(|k| k.public).collect()
    }

    pub fn slashing_address_unchecked(&self) -> Address<NetworkUnchecked> {
        self.slashing_address.as_unchecked().clone()
    }

    fn slashing_amount(&self, value: u64) -> u64 {
        (Decimal::from(value) * self.slashing_rate)
            .round()
            .to_u64()
            .unwrap()
    }
}

/// DelegationFixture is a protocol-valid set of delegation transactions,
/// unless one of the builder knobs broke it on purpose
#[derive(Clone, Debug)]
pub struct DelegationFixture {
    pub staker: KeyPair,
    pub finality_providers: Vec<KeyPair>,
    pub start_height: u32,
    pub end_height: u32,
    pub staking_amount: u64,
    pub staking_output_idx: u32,
    pub unbonding_time: u16,
    pub staking_tx: Transaction,
    pub slashing_tx: Transaction,
    pub unbonding_tx: Transaction,
    pub unbonding_slashing_tx: Transaction,
}

impl DelegationFixture {
    pub fn fp_pks(&self) -> Vec<XOnlyPublicKey> {
        self.finality_providers.iter().map(|k| k.public).collect()
    }

    pub fn staking_time(&self) -> u16 {
        (self.end_height - self.start_height) as u16
    }

    pub fn staking_tx_hex(&self) -> String {
        tx_hex(&self.staking_tx)
    }

    pub fn slashing_tx_hex(&self) -> String {
        tx_hex(&self.slashing_tx)
    }

    pub fn unbonding_tx_hex(&self) -> String {
        tx_hex(&self.unbonding_tx)
    }

    pub fn unbonding_slashing_tx_hex(&self) -> String {
        tx_hex(&self.unbonding_slashing_tx)
    }
}

/// DelegationBuilder builds a [`DelegationFixture`] against a [`ParamsFixture`]
pub struct DelegationBuilder<'a> {
    params: &'a ParamsFixture,
    staker_seed: u8,
    fp_seeds: Vec<u8>,
    start_height: u32,
    staking_time: u16,
    unbonding_time: u16,
    staking_amount: u64,
    slashing_fee: u64,
    unbonding_fee: u64,
    unbonding_spends_wrong_output: bool,
}

impl<'a> DelegationBuilder<'a> {
    pub fn new(params: &'a ParamsFixture) -> Self {
        DelegationBuilder {
            params,
            staker_seed: 1,
            fp_seeds: vec![11],
            start_height: 100,
            staking_time: 1_000,
            unbonding_time: 101,
            staking_amount: 1_000_000,
            slashing_fee: 2_000,
            unbonding_fee: 1_000,
            unbonding_spends_wrong_output: false,
        }
    }

    pub fn staker(mut self, seed: u8) -> Self {
        self.staker_seed = seed;
        self
    }

    pub fn finality_providers(mut self, seeds: &[u8]) -> Self {
        self.fp_seeds = seeds.to_vec();
        self
    }

    pub fn staking_time(mut self, blocks: u16) -> Self {
        self.staking_time = blocks;
        self
    }

    pub fn unbonding_time(mut self, blocks: u16) -> Self {
        self.unbonding_time = blocks;
        self
    }

    pub fn staking_amount(mut self, sat: u64) -> Self {
        self.staking_amount = sat;
        self
    }

    /// slashing_fee sets the fee paid by both slashing transactions
    pub fn slashing_fee(mut self, sat: u64) -> Self {
        self.slashing_fee = sat;
        self
    }

    /// unbonding_spends_wrong_output makes the unbonding tx spend an output of
    /// the staking tx other than the staking output
    pub fn unbonding_spends_wrong_output(mut self) -> Self {
        self.unbonding_spends_wrong_output = true;
        self
    }

    pub fn build(self) -> DelegationFixture {
        let params = self.params;
        let staker = KeyPair::from_seed(self.staker_seed);
        let finality_providers: Vec<KeyPair> =
            self.fp_seeds.iter().map(|s| KeyPair::from_seed(*s)).collect();
        let fp_pks: Vec<XOnlyPublicKey> = finality_providers.iter().map(|k| k.public).collect();
        let covenant_pks = params.covenant_pks();
        let secp = Secp256k1::verification_only();
        let change_script = ScriptBuf::new_p2tr(&secp, staker.public, None);

        let staking_info = build_staking_info(
            &staker.public,
            &fp_pks,
            &covenant_pks,
            params.covenant_quorum,
            self.staking_time,
            Amount::from_sat(self.staking_amount),
        )
        .unwrap();

        // the staking output sits at index 0, followed by a change output
        let staking_output_idx = 0;
        let staking_tx = Transaction {
            version: Version::TWO,
            lock_time: LockTime::ZERO,
            input: vec![spend(OutPoint::new(
                Txid::from_byte_array([self.staker_seed; 32]),
                self.start_height,
            ))],
            output: vec![
                staking_info.staking_output().clone(),
                TxOut {
                    value: Amount::from_sat(50_000),
                    script_pubkey: change_script.clone(),
                },
            ],
        };
        let staking_outpoint = OutPoint::new(staking_tx.compute_txid(), staking_output_idx);

        let slashing_tx = slashing_tx_for(
            params,
            staking_outpoint,
            self.staking_amount,
            self.slashing_fee,
            &change_script,
        );

        let unbonding_amount = self.staking_amount - self.unbonding_fee;
        let unbonding_info = build_unbonding_info(
            &staker.public,
            &fp_pks,
            &covenant_pks,
            params.covenant_quorum,
            self.unbonding_time,
            Amount::from_sat(unbonding_amount),
        )
        .unwrap();
        let unbonding_input = if self.unbonding_spends_wrong_output {
            OutPoint::new(staking_outpoint.txid, staking_output_idx + 1)
        } else {
            staking_outpoint
        };
        let unbonding_tx = Transaction {
            version: Version::TWO,
            lock_time: LockTime::ZERO,
            input: vec![spend(unbonding_input)],
            output: vec![unbonding_info.unbonding_output().clone()],
        };

        let unbonding_slashing_tx = slashing_tx_for(
            params,
            OutPoint::new(unbonding_tx.compute_txid(), 0),
            unbonding_amount,
            self.slashing_fee,
            &change_script,
        );

        DelegationFixture {
            staker,
            finality_providers,
            start_height: self.start_height,
            end_height: self.start_height + self.staking_time as u32,
            staking_amount: self.staking_amount,
            staking_output_idx,
            unbonding_time: self.unbonding_time,
            staking_tx,
            slashing_tx,
            unbonding_tx,
            unbonding_slashing_tx,
        }
    }
}

fn spend(previous_output: OutPoint) -> TxIn {
    TxIn {
        previous_output,
        script_sig: ScriptBuf::new(),
        sequence: Sequence::MAX,
        witness: Witness::new(),
    }
}

fn slashing_tx_for(
    params: &ParamsFixture,
    funding_outpoint: OutPoint,
    funding_value: u64,
    fee: u64,
    change_script: &ScriptBuf,
) -> Transaction {
    let slashed = params.slashing_amount(funding_value);
    Transaction {
        version: Version::TWO,
        lock_time: LockTime::ZERO,
        input: vec![spend(funding_outpoint)],
        output: vec![
            TxOut {
                value: Amount::from_sat(slashed),
                script_pubkey: params.slashing_address.script_pubkey(),
            },
            TxOut {
                value: Amount::from_sat(funding_value - slashed - fee),
                script_pubkey: change_script.clone(),
            },
        ],
    }
}
