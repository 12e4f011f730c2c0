use std::sync::Arc;

use babylon_bitcoin::bip340_pk_hex;
use babylon_btcstaking::adaptor_sig::AdaptorSignature;
use bitcoin::XOnlyPublicKey;
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::client::ClientController;
use crate::config::Config;
use crate::error::{CovenantError, Result};
use crate::keyring::{public_key_of, Keyring};
use crate::params::{ParamsCache, StakingParams};
use crate::retry::RetryPolicy;
use crate::signer::sign_delegation;
use crate::types::{CovenantSigs, Delegation, SignatureOutcome, TickSummary};
use crate::validator::{validate_delegation, Verdict};

enum Lifecycle {
    NotStarted,
    Running {
        shutdown: oneshot::Sender<()>,
        worker: JoinHandle<()>,
    },
    Stopped,
}

/// CovenantEmulator signs pending BTC delegations on behalf of one covenant
/// committee member
pub struct CovenantEmulator {
    config: Config,
    pk: XOnlyPublicKey,
    params: ParamsCache,
    retry: RetryPolicy,
    client: Arc<dyn ClientController>,
    keyring: Arc<dyn Keyring>,
    passphrase: String,
    lifecycle: Mutex<Lifecycle>,
}

impl CovenantEmulator {
    /// new unlocks the covenant key once to learn its public key. The secret
    /// key itself is not kept.
    pub fn new(
        config: Config,
        client: Arc<dyn ClientController>,
        keyring: Arc<dyn Keyring>,
        passphrase: impl Into<String>,
    ) -> Result<Self> {
        config.validate()?;
        let passphrase = passphrase.into();
        let pk = public_key_of(&keyring.unlock(&passphrase)?)?;

        Ok(CovenantEmulator {
            config,
            pk,
            params: ParamsCache::new(),
            retry: RetryPolicy::default(),
            client,
            keyring,
            passphrase,
            lifecycle: Mutex::new(Lifecycle::NotStarted),
        })
    }

    pub fn public_key(&self) -> XOnlyPublicKey {
        self.pk
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// params returns the staking params of the last successful refresh
    pub fn params(&self) -> Option<Arc<StakingParams>> {
        self.params.snapshot()
    }

    /// update_params refreshes the staking params from the chain. If every
    /// attempt fails the previous params stay in place.
    pub async fn update_params(&self) -> Result<()> {
        let max_attempts = self.retry.attempts;
        let params = self
            .retry
            .retry(
                || self.client.query_staking_params(),
                |attempt, err| {
                    debug!(%attempt, %max_attempts, error = %err, "failed to query the consumer chain for the staking params");
                },
            )
            .await
            .map_err(|e| CovenantError::ParamsQuery(e.into_last()))?;

        self.params.replace(params);
        Ok(())
    }

    /// add_covenant_signature validates `del`, signs it and submits the
    /// signatures. A delegation that already has a covenant quorum is skipped.
    pub async fn add_covenant_signature(&self, del: &Delegation) -> Result<SignatureOutcome> {
        let params = self.params.snapshot().ok_or(CovenantError::ParamsNotLoaded)?;

        let validated = match validate_delegation(del, &params, self.config.bitcoin_network())? {
            Verdict::QuorumReached => {
                debug!(del_btc_pk = %bip340_pk_hex(&del.staker_pk), "delegation already has a covenant quorum");
                return Ok(SignatureOutcome::Skipped);
            }
            Verdict::Ready(validated) => validated,
        };

        let signing_result = {
            let sk = self.keyring.unlock(&self.passphrase)?;
            sign_delegation(&validated, &sk)?
        };

        let staking_tx_hash = validated.staking_tx.compute_txid();
        let sigs = CovenantSigs {
            covenant_pk: self.pk,
            staking_tx_hash,
            slashing_sigs: signing_result
                .slashing_sigs
                .iter()
                .map(AdaptorSignature::to_bytes)
                .collect(),
            unbonding_sig: signing_result.unbonding_sig,
            unbonding_slashing_sigs: signing_result
                .unbonding_slashing_sigs
                .iter()
                .map(AdaptorSignature::to_bytes)
                .collect(),
        };

        let res = self
            .client
            .submit_covenant_sigs(sigs)
            .await
            .map_err(CovenantError::Submission)?;

        info!(
            del_btc_pk = %bip340_pk_hex(&del.staker_pk),
            %staking_tx_hash,
            tx_hash = %res.tx_hash,
            "submitted covenant signatures"
        );
        Ok(SignatureOutcome::Submitted(res))
    }

    /// process_pending_delegations runs one round of the submission loop:
    /// refresh the params, fetch a batch of pending delegations and sign them
    /// one by one. A failing delegation does not stop the batch.
    pub async fn process_pending_delegations(&self) -> Result<TickSummary> {
        self.update_params().await?;

        let dels = self
            .client
            .query_pending_delegations(self.config.delegation_limit)
            .await
            .map_err(CovenantError::DelegationsQuery)?;

        let mut summary = TickSummary::default();
        if dels.is_empty() {
            debug!("no pending delegations are found");
            return Ok(summary);
        }

        for del in &dels {
            match self.add_covenant_signature(del).await {
                Ok(SignatureOutcome::Submitted(_)) => summary.submitted += 1,
                Ok(SignatureOutcome::Skipped) => summary.skipped += 1,
                Err(err) => {
                    error!(
                        del_btc_pk = %bip340_pk_hex(&del.staker_pk),
                        error = %err,
                        kind = ?err.kind(),
                        "failed to submit covenant signatures to the BTC delegation"
                    );
                    summary.failed += 1;
                }
            }
        }

        debug!(
            submitted = summary.submitted,
            skipped = summary.skipped,
            failed = summary.failed,
            "processed pending delegations"
        );
        Ok(summary)
    }

    async fn submission_loop(self: Arc<Self>, mut shutdown: oneshot::Receiver<()>) {
        let interval = self.config.query_interval;
        let mut ticker = interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                _ = &mut shutdown => {
                    info!("exiting covenant signature submission loop");
                    return;
                }
                _ = ticker.tick() => {
                    // a batch always runs to completion before shutdown is
                    // looked at again
                    if let Err(err) = self.process_pending_delegations().await {
                        debug!(error = %err, "skipping covenant signature submission round");
                    }
                }
            }
        }
    }

    /// start spawns the submission loop on the current tokio runtime. Calling
    /// it again, or after [`CovenantEmulator::stop`], does nothing.
    ///
    /// # Panics
    ///
    /// Panics when called outside of a tokio runtime.
    pub fn start(self: &Arc<Self>) {
        let mut lifecycle = self.lifecycle.lock();
        if !matches!(*lifecycle, Lifecycle::NotStarted) {
            return;
        }

        info!(pk = %bip340_pk_hex(&self.pk), "starting covenant emulator");
        let (shutdown, shutdown_rx) = oneshot::channel();
        let worker = tokio::spawn(Arc::clone(self).submission_loop(shutdown_rx));
        *lifecycle = Lifecycle::Running { shutdown, worker };
    }

    /// stop signals the submission loop and waits until it exits. Only the
    /// first call waits; stopping an emulator that never started marks it
    /// stopped so that a later start is ignored.
    pub async fn stop(&self) {
        let previous = std::mem::replace(&mut *self.lifecycle.lock(), Lifecycle::Stopped);

        let Lifecycle::Running { shutdown, worker } = previous else {
            return;
        };

        info!("stopping covenant emulator");
        // the worker may already be gone, in which case there is nobody to tell
        let _ = shutdown.send(());
        if let Err(err) = worker.await {
            error!(error = %err, "covenant signature submission loop terminated abnormally");
        }
        info!("covenant emulator stopped");
    }
}
