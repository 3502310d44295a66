// src/errors.rs
//
// Every failure in the engine is a synchronous, reason-stringed abort of the
// enclosing top-level call. The variants are grouped the same way callers are
// expected to react to them.

use alloy_primitives::{Address, U256};
use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, FundError>;

/// Main engine error type.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FundError {
    // === Authorization ===
    /// Caller is not the principal allowed to make this call.
    #[error("Only the {role} can call this")]
    Unauthorized { role: &'static str },

    /// A vault mutation was attempted by someone other than its accessor.
    #[error("Only the designated accessor can make this call")]
    NotAccessor,

    /// An extension asked the comptroller for a vault action outside its allow-table.
    #[error("Not an allowed vault action for {extension}")]
    VaultActionNotAllowed { extension: &'static str },

    // === State machine ===
    /// The comptroller has already been initialized.
    #[error("init: Already initialized")]
    AlreadyInitialized,

    /// The comptroller has already been activated.
    #[error("activate: Already activated")]
    AlreadyActivated,

    /// The comptroller is not in a state that allows this call.
    #[error("{operation}: Fund is {status}")]
    InvalidStatus {
        operation: &'static str,
        status: &'static str,
    },

    /// The comptroller has been destructed; its storage no longer exists.
    #[error("Fund has been destructed")]
    Destructed,

    /// No fund, vault or comptroller is known at this address.
    #[error("Unknown {kind}: {address}")]
    Unknown { kind: &'static str, address: Address },

    /// Extension storage for this fund has already been bound.
    #[error("{extension}: Already activated for fund")]
    ExtensionAlreadyActive { extension: &'static str },

    /// Extension storage for this fund has already been configured.
    #[error("{extension}: Fund config already set")]
    ExtensionAlreadyConfigured { extension: &'static str },

    /// Redemption attempted inside the shares action timelock.
    #[error("Shares action timelocked")]
    SharesActionTimelocked,

    // === Input validation ===
    /// Caller-supplied input is malformed.
    #[error("{0}")]
    InvalidInput(String),

    /// The same asset appears twice in a set that must be unique.
    #[error("Duplicate {0} asset")]
    DuplicateAsset(&'static str),

    /// An asset is not supported by the price feed.
    #[error("Unsupported asset: {0}")]
    UnsupportedAsset(Address),

    /// Adding this asset would exceed the tracked assets limit.
    #[error("Limit exceeded: tracked assets limit is {limit}")]
    TrackedAssetsLimitExceeded { limit: usize },

    // === Economic / policy ===
    /// Fewer shares were received than the caller's minimum.
    #[error("buyShares: Shares received < minSharesQuantity")]
    InsufficientSharesReceived { received: U256, minimum: U256 },

    /// Fewer incoming assets were received than the adapter declared as the minimum.
    #[error("Received incoming asset less than expected")]
    InsufficientIncomingAsset {
        asset: Address,
        received: U256,
        minimum: U256,
    },

    /// A policy rejected the operation.
    #[error("Rule evaluated to false: {identifier}")]
    PolicyViolation { identifier: String },

    /// A holder or account does not have enough of something.
    #[error("Insufficient {what}: have {available}, need {required}")]
    InsufficientBalance {
        what: &'static str,
        available: U256,
        required: U256,
    },

    // === Asset safety ===
    /// The incoming asset cannot be safely custodied by the vault.
    #[error("Non-receivable asset detected: {0}")]
    NonReceivableAsset(Address),

    /// The token refuses transfers.
    #[error("Token is not transferable: {0}")]
    NotTransferable(Address),

    /// The price feed could not produce a valid value for the asset.
    #[error("Invalid asset value for {0}")]
    InvalidAssetValue(Address),

    // === Arithmetic ===
    /// Fixed-point arithmetic overflowed or divided by zero.
    #[error("Math overflow in {0}")]
    MathOverflow(&'static str),

    // === Adapters ===
    /// The adapter failed while executing an action.
    #[error("Adapter error: {0}")]
    Adapter(String),
}

impl FundError {
    /// Shorthand for an input validation failure.
    pub fn invalid(msg: impl Into<String>) -> Self {
        FundError::InvalidInput(msg.into())
    }

    /// Returns true for errors the caller can fix by adjusting parameters and resubmitting.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            FundError::InvalidInput(_)
                | FundError::DuplicateAsset(_)
                | FundError::InsufficientSharesReceived { .. }
                | FundError::InsufficientIncomingAsset { .. }
                | FundError::PolicyViolation { .. }
                | FundError::SharesActionTimelocked
                | FundError::InsufficientBalance { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_strings() {
        assert_eq!(
            FundError::Unauthorized { role: "FundDeployer" }.to_string(),
            "Only the FundDeployer can call this"
        );
        assert_eq!(
            FundError::DuplicateAsset("spend").to_string(),
            "Duplicate spend asset"
        );
        assert_eq!(
            FundError::PolicyViolation {
                identifier: "MAX_CONCENTRATION".to_string()
            }
            .to_string(),
            "Rule evaluated to false: MAX_CONCENTRATION"
        );
    }

    #[test]
    fn test_recoverable_classification() {
        assert!(FundError::invalid("bad").is_recoverable());
        assert!(!FundError::AlreadyInitialized.is_recoverable());
        assert!(!FundError::NotAccessor.is_recoverable());
    }
}
