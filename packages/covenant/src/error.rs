use babylon_btcstaking::error::Error as BtcStakingError;
use thiserror::Error;

use crate::client::ClientError;
use crate::keyring::KeyringError;

/// ErrorKind is the stable classification of a [`CovenantError`], used to
/// decide whether a failure is retried, skipped or surfaced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The caller handed in an incomplete delegation
    Caller,
    /// The delegation transactions violate the staking rules
    Validation,
    /// A remote query failed; the next tick retries it
    Transient,
    /// Producing one of the covenant signatures failed
    Signing,
    /// The chain rejected the covenant signatures
    Submission,
    /// The covenant key could not be loaded
    Key,
    /// The configuration is invalid
    Config,
}

#[derive(Error, Debug)]
pub enum CovenantError {
    #[error("invalid delegation: {0}")]
    InvalidDelegation(String),
    #[error("invalid delegation transactions: {0}")]
    InvalidDelegationTxs(#[source] BtcStakingError),
    #[error("invalid undelegation transactions: {0}")]
    InvalidUndelegationTxs(#[source] BtcStakingError),
    #[error("staking output {0} does not lock funds into the expected staking script")]
    StakingOutputMismatch(u32),
    #[error("unbonding output does not lock funds into the expected unbonding script")]
    UnbondingOutputMismatch,
    #[error("{what} of {value} blocks does not fit in a relative time lock")]
    TimeLockOutOfRange { what: &'static str, value: u32 },
    #[error("staking parameters are not loaded yet")]
    ParamsNotLoaded,
    #[error("failed to query the staking params: {0}")]
    ParamsQuery(#[source] ClientError),
    #[error("failed to query pending delegations: {0}")]
    DelegationsQuery(#[source] ClientError),
    #[error("failed to sign the {what}: {source}")]
    Signing {
        what: &'static str,
        #[source]
        source: BtcStakingError,
    },
    #[error("failed to submit covenant signatures: {0}")]
    Submission(#[source] ClientError),
    #[error("keyring error: {0}")]
    Keyring(#[from] KeyringError),
    #[error("invalid config: {0}")]
    Config(String),
    #[error("failed to read config: {0}")]
    ConfigIo(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),
}

impl CovenantError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CovenantError::InvalidDelegation(_) => ErrorKind::Caller,
            CovenantError::InvalidDelegationTxs(_)
            | CovenantError::InvalidUndelegationTxs(_)
            | CovenantError::StakingOutputMismatch(_)
            | CovenantError::UnbondingOutputMismatch
            | CovenantError::TimeLockOutOfRange { .. } => ErrorKind::Validation,
            CovenantError::ParamsNotLoaded
            | CovenantError::ParamsQuery(_)
            | CovenantError::DelegationsQuery(_) => ErrorKind::Transient,
            CovenantError::Signing { .. } => ErrorKind::Signing,
            CovenantError::Submission(_) => ErrorKind::Submission,
            CovenantError::Keyring(_) => ErrorKind::Key,
            CovenantError::Config(_) | CovenantError::ConfigIo(_) | CovenantError::ConfigParse(_) => {
                ErrorKind::Config
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, CovenantError>;
