//! Spend descriptors of the Babylon staking and unbonding outputs.
//!
//! Both outputs are taproot outputs whose key path is disabled by using the
//! BIP-341 NUMS point as internal key. The spend descriptors expose the
//! tapscript leaf of each path, which is what a covenant member commits to
//! when signing a transaction spending that output.

use bitcoin::key::Secp256k1;
use bitcoin::taproot::{ControlBlock, LeafVersion, TaprootBuilder, TaprootSpendInfo};
use bitcoin::{Amount, Script, ScriptBuf, TxOut, XOnlyPublicKey};

use crate::error::Error;
use crate::scripts_utils::{unspendable_key_path_internal_pub_key, BabylonScriptPaths};
use crate::Result;

/// SpendInfo is the information needed to spend an output through one of its
/// script paths
#[derive(Debug, Clone)]
pub struct SpendInfo {
    revealed_leaf: ScriptBuf,
    control_block: ControlBlock,
}

impl SpendInfo {
    /// pk_script_path is the tapscript leaf revealed when spending through this path
    pub fn pk_script_path(&self) -> &Script {
        self.revealed_leaf.as_script()
    }

    pub fn control_block(&self) -> &ControlBlock {
        &self.control_block
    }
}

#[derive(Debug, Clone)]
struct TaprootScriptHolder {
    spend_info: TaprootSpendInfo,
}

impl TaprootScriptHolder {
    /// new assembles the given leaves, as `(depth, script)` pairs in DFS order,
    /// under the unspendable internal key
    fn new(leaves: &[(u8, &ScriptBuf)]) -> Result<Self> {
        let internal_key = unspendable_key_path_internal_pub_key()?;

        let mut builder = TaprootBuilder::new();
        for (depth, script) in leaves {
            builder = builder
                .add_leaf(*depth, (*script).clone())
                .map_err(|_| Error::AddLeafFailed {})?;
        }
        let secp = Secp256k1::verification_only();
        let spend_info = builder
            .finalize(&secp, internal_key)
            .map_err(|_| Error::FinalizeTaprootFailed {})?;

        Ok(TaprootScriptHolder { spend_info })
    }

    fn spend_info_for(&self, script: &ScriptBuf) -> Result<SpendInfo> {
        let control_block = self
            .spend_info
            .control_block(&(script.clone(), LeafVersion::TapScript))
            .ok_or(Error::ScriptPathNotFound {})?;

        Ok(SpendInfo {
            revealed_leaf: script.clone(),
            control_block,
        })
    }

    fn taproot_pk_script(&self) -> ScriptBuf {
        ScriptBuf::new_p2tr_tweaked(self.spend_info.output_key())
    }
}

/// StakingInfo is the spend descriptor of a staking output
#[derive(Debug, Clone)]
pub struct StakingInfo {
    staking_output: TxOut,
    script_paths: BabylonScriptPaths,
    holder: TaprootScriptHolder,
}

impl StakingInfo {
    pub fn staking_output(&self) -> &TxOut {
        &self.staking_output
    }

    pub fn script_paths(&self) -> &BabylonScriptPaths {
        &self.script_paths
    }

    pub fn time_lock_path_spend_info(&self) -> Result<SpendInfo> {
        self.holder
            .spend_info_for(&self.script_paths.time_lock_path_script)
    }

    pub fn unbonding_path_spend_info(&self) -> Result<SpendInfo> {
        self.holder
            .spend_info_for(&self.script_paths.unbonding_path_script)
    }

    pub fn slashing_path_spend_info(&self) -> Result<SpendInfo> {
        self.holder
            .spend_info_for(&self.script_paths.slashing_path_script)
    }
}

/// build_staking_info reconstructs the staking output of a delegation
///
/// The tree has the time-lock and unbonding leaves at depth 2 and the slashing
/// leaf at depth 1.
pub fn build_staking_info(
    staker_key: &XOnlyPublicKey,
    fp_keys: &[XOnlyPublicKey],
    covenant_keys: &[XOnlyPublicKey],
    covenant_quorum: u32,
    staking_time: u16,
    staking_amount: Amount,
) -> Result<StakingInfo> {
    let script_paths = BabylonScriptPaths::new(
        staker_key,
        fp_keys,
        covenant_keys,
        covenant_quorum as usize,
        staking_time,
    )?;

    let holder = TaprootScriptHolder::new(&[
        (2, &script_paths.time_lock_path_script),
        (2, &script_paths.unbonding_path_script),
        (1, &script_paths.slashing_path_script),
    ])?;

    let staking_output = TxOut {
        value: staking_amount,
        script_pubkey: holder.taproot_pk_script(),
    };

    Ok(StakingInfo {
        staking_output,
        script_paths,
        holder,
    })
}

/// UnbondingInfo is the spend descriptor of an unbonding output. Unlike the
/// staking output it has no unbonding path.
#[derive(Debug, Clone)]
pub struct UnbondingInfo {
    unbonding_output: TxOut,
    script_paths: BabylonScriptPaths,
    holder: TaprootScriptHolder,
}

impl UnbondingInfo {
    pub fn unbonding_output(&self) -> &TxOut {
        &self.unbonding_output
    }

    pub fn time_lock_path_spend_info(&self) -> Result<SpendInfo> {
        self.holder
            .spend_info_for(&self.script_paths.time_lock_path_script)
    }

    pub fn slashing_path_spend_info(&self) -> Result<SpendInfo> {
        self.holder
            .spend_info_for(&self.script_paths.slashing_path_script)
    }
}

/// build_unbonding_info reconstructs the unbonding output of a delegation
pub fn build_unbonding_info(
    staker_key: &XOnlyPublicKey,
    fp_keys: &[XOnlyPublicKey],
    covenant_keys: &[XOnlyPublicKey],
    covenant_quorum: u32,
    unbonding_time: u16,
    unbonding_amount: Amount,
) -> Result<UnbondingInfo> {
    let script_paths = BabylonScriptPaths::new(
        staker_key,
        fp_keys,
        covenant_keys,
        covenant_quorum as usize,
        unbonding_time,
    )?;

    let holder = TaprootScriptHolder::new(&[
        (1, &script_paths.time_lock_path_script),
        (1, &script_paths.slashing_path_script),
    ])?;

    let unbonding_output = TxOut {
        value: unbonding_amount,
        script_pubkey: holder.taproot_pk_script(),
    };

    Ok(UnbondingInfo {
        unbonding_output,
        script_paths,
        holder,
    })
}
