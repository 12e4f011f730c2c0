//! Covenant co-signer for Babylon BTC staking.
//!
//! The [`emulator::CovenantEmulator`] polls the Babylon chain for pending BTC
//! delegations, validates their staking, slashing and unbonding transactions
//! against the current staking parameters, and submits the covenant member's
//! signatures: adaptor signatures over both slashing transactions and a plain
//! Schnorr signature over the unbonding transaction.

pub mod client;
pub mod config;
pub mod emulator;
pub mod error;
pub mod keyring;
pub mod logging;
pub mod params;
pub mod retry;
pub mod signer;
pub mod types;
pub mod validator;

pub use emulator::CovenantEmulator;
pub use error::{CovenantError, ErrorKind, Result};
