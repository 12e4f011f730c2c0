#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use covenant_emulator::client::{ClientController, ClientError};
use covenant_emulator::config::Config;
use covenant_emulator::keyring::{Keyring, KeyringError};
use covenant_emulator::params::StakingParams;
use covenant_emulator::types::{
    CovenantAdaptorSignatures, CovenantSigs, Delegation, TxResponse, Undelegation,
};
use covenant_emulator::CovenantEmulator;
use parking_lot::Mutex;
use test_utils::{DelegationFixture, KeyPair, ParamsFixture};
use tokio::sync::{Notify, Semaphore};

pub fn staking_params(p: &ParamsFixture) -> StakingParams {
    StakingParams {
        covenant_quorum: p.covenant_quorum,
        covenant_pks: p.covenant_pks(),
        slashing_rate: p.slashing_rate,
        min_slashing_tx_fee_sat: p.min_slashing_tx_fee_sat,
        slashing_address: p.slashing_address_unchecked(),
    }
}

pub fn delegation(fx: &DelegationFixture) -> Delegation {
    Delegation {
        staker_pk: fx.staker.public,
        fp_pks: fx.fp_pks(),
        start_height: fx.start_height,
        end_height: fx.end_height,
        total_sat: fx.staking_amount,
        staking_tx_hex: fx.staking_tx_hex(),
        slashing_tx_hex: fx.slashing_tx_hex(),
        staking_output_idx: fx.staking_output_idx,
        covenant_sigs: vec![],
        undelegation: Some(Undelegation {
            unbonding_tx_hex: fx.unbonding_tx_hex(),
            slashing_tx_hex: fx.unbonding_slashing_tx_hex(),
            unbonding_time: fx.unbonding_time as u32,
            covenant_unbonding_sigs: vec![],
            covenant_slashing_sigs: vec![],
        }),
    }
}

/// with_covenant_sigs marks the delegation as signed by the given covenant members
pub fn with_covenant_sigs(mut del: Delegation, signers: &[&KeyPair]) -> Delegation {
    del.covenant_sigs = signers
        .iter()
        .map(|k| CovenantAdaptorSignatures {
            cov_pk: k.public,
            adaptor_sigs: vec![],
        })
        .collect();
    del
}

/// MockClient is an in-memory Babylon chain
pub struct MockClient {
    params: Mutex<StakingParams>,
    /// number of upcoming params queries that fail
    params_failures: AtomicUsize,
    pub params_queries: AtomicUsize,
    pending: Mutex<Vec<Delegation>>,
    pub pending_queries: AtomicUsize,
    pub submissions: Mutex<Vec<CovenantSigs>>,
    submission_errors: Mutex<VecDeque<ClientError>>,
    /// when set, every submission takes a permit before it completes
    gate: Option<Arc<Semaphore>>,
    pub submission_started: Notify,
}

impl MockClient {
    pub fn new(params: StakingParams) -> Self {
        MockClient {
            params: Mutex::new(params),
            params_failures: AtomicUsize::new(0),
            params_queries: AtomicUsize::new(0),
            pending: Mutex::new(vec![]),
            pending_queries: AtomicUsize::new(0),
            submissions: Mutex::new(vec![]),
            submission_errors: Mutex::new(VecDeque::new()),
            gate: None,
            submission_started: Notify::new(),
        }
    }

    pub fn with_gate(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn set_params(&self, params: StakingParams) {
        *self.params.lock() = params;
    }

    pub fn fail_params_queries(&self, n: usize) {
        self.params_failures.store(n, Ordering::SeqCst);
    }

    pub fn set_pending(&self, dels: Vec<Delegation>) {
        *self.pending.lock() = dels;
    }

    pub fn fail_next_submission(&self, err: ClientError) {
        self.submission_errors.lock().push_back(err);
    }

    pub fn submissions(&self) -> Vec<CovenantSigs> {
        self.submissions.lock().clone()
    }
}

#[async_trait]
impl ClientController for MockClient {
    async fn query_staking_params(&self) -> Result<StakingParams, ClientError> {
        let n = self.params_queries.fetch_add(1, Ordering::SeqCst) + 1;
        let failing = self
            .params_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if failing {
            return Err(ClientError::Rpc(format!("params query {n} failed")));
        }
        Ok(self.params.lock().clone())
    }

    async fn query_pending_delegations(&self, limit: u64) -> Result<Vec<Delegation>, ClientError> {
        self.pending_queries.fetch_add(1, Ordering::SeqCst);
        let pending = self.pending.lock();
        Ok(pending.iter().take(limit as usize).cloned().collect())
    }

    async fn submit_covenant_sigs(&self, sigs: CovenantSigs) -> Result<TxResponse, ClientError> {
        if let Some(gate) = &self.gate {
            self.submission_started.notify_one();
            gate.acquire().await.expect("gate closed").forget();
        }
        if let Some(err) = self.submission_errors.lock().pop_front() {
            return Err(err);
        }

        let tx_hash = format!("{}-{}", sigs.staking_tx_hash, sigs.covenant_pk);
        // the chain drops a delegation from the pending list once signed
        self.pending
            .lock()
            .retain(|del| del.staking_tx_hash_hex() != sigs.staking_tx_hash.to_string());
        self.submissions.lock().push(sigs);
        Ok(TxResponse { tx_hash })
    }
}

trait StakingTxHash {
    fn staking_tx_hash_hex(&self) -> String;
}

impl StakingTxHash for Delegation {
    fn staking_tx_hash_hex(&self) -> String {
        babylon_bitcoin::new_btc_tx_from_hex(&self.staking_tx_hex)
            .map(|tx| tx.compute_txid().to_string())
            .unwrap_or_default()
    }
}

/// MockKeyring hands out a fixed key and counts unlocks
pub struct MockKeyring {
    sk: k256::SecretKey,
    pub unlocks: AtomicUsize,
}

impl MockKeyring {
    pub fn new(key: &KeyPair) -> Self {
        MockKeyring {
            sk: key.secret.clone(),
            unlocks: AtomicUsize::new(0),
        }
    }

    pub fn unlocks(&self) -> usize {
        self.unlocks.load(Ordering::SeqCst)
    }
}

impl Keyring for MockKeyring {
    fn unlock(&self, _passphrase: &str) -> Result<k256::SecretKey, KeyringError> {
        self.unlocks.fetch_add(1, Ordering::SeqCst);
        Ok(self.sk.clone())
    }
}

pub struct TestHarness {
    pub params: ParamsFixture,
    pub client: Arc<MockClient>,
    pub keyring: Arc<MockKeyring>,
    pub emulator: Arc<CovenantEmulator>,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_client(|client| client)
    }

    /// with_client lets a test tweak the mock client before the emulator is built
    pub fn with_client(f: impl FnOnce(MockClient) -> MockClient) -> Self {
        let params = ParamsFixture::default();
        let client = Arc::new(f(MockClient::new(staking_params(&params))));
        let keyring = Arc::new(MockKeyring::new(&params.covenant_keys[0]));
        let emulator = CovenantEmulator::new(
            Config::default(),
            client.clone(),
            keyring.clone(),
            "passphrase",
        )
        .expect("emulator");

        TestHarness {
            params,
            client,
            keyring,
            emulator: Arc::new(emulator),
        }
    }

    pub fn covenant(&self) -> &KeyPair {
        &self.params.covenant_keys[0]
    }
}
