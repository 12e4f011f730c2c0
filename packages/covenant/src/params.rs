use std::sync::Arc;

use bitcoin::address::NetworkUnchecked;
use bitcoin::{Address, XOnlyPublicKey};
use parking_lot::RwLock;
use rust_decimal::Decimal;

/// StakingParams are the BTC staking parameters currently in force on the
/// Babylon chain
#[derive(Debug, Clone, PartialEq)]
pub struct StakingParams {
    /// Number of covenant signatures a delegation needs
    pub covenant_quorum: u32,
    pub covenant_pks: Vec<XOnlyPublicKey>,
    pub slashing_rate: Decimal,
    pub min_slashing_tx_fee_sat: u64,
    pub slashing_address: Address<NetworkUnchecked>,
}

/// ParamsCache holds the latest [`StakingParams`]. Updates replace the whole
/// snapshot, so a reader always sees one consistent set of parameters.
#[derive(Debug, Default)]
pub struct ParamsCache {
    current: RwLock<Option<Arc<StakingParams>>>,
}

impl ParamsCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Option<Arc<StakingParams>> {
        self.current.read().clone()
    }

    pub fn replace(&self, params: StakingParams) {
        *self.current.write() = Some(Arc::new(params));
    }
}
