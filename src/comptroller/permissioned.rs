// src/comptroller/permissioned.rs
//
// Extensions never hold the vault directly. The comptroller lends them this
// handle, which only forwards the actions that extension is allowed to take.

use crate::errors::{FundError, Result};
use crate::events::EventLog;
use crate::models::{Address, Extension, U256};
use crate::simulation::TokenLedger;
use crate::vault::Vault;

/// Vault mutations an extension may request through the comptroller.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VaultAction {
    MintShares,
    BurnShares,
    TransferShares,
    ApproveAssetSpender,
    WithdrawAssetTo,
    AddTrackedAsset,
    RemoveTrackedAsset,
}

/// The allow-table: which extension may take which vault action.
pub fn is_allowed_vault_action(extension: Extension, action: VaultAction) -> bool {
    match extension {
        Extension::FeeManager => matches!(
            action,
            VaultAction::MintShares | VaultAction::BurnShares | VaultAction::TransferShares
        ),
        Extension::IntegrationManager => matches!(
            action,
            VaultAction::ApproveAssetSpender
                | VaultAction::WithdrawAssetTo
                | VaultAction::AddTrackedAsset
                | VaultAction::RemoveTrackedAsset
        ),
        Extension::PolicyManager => false,
    }
}

/// A vault borrowed by one extension on behalf of the vault's comptroller.
pub struct PermissionedVault<'a> {
    comptroller: Address,
    extension: Extension,
    vault: &'a mut Vault,
}

impl<'a> PermissionedVault<'a> {
    pub fn new(comptroller: Address, extension: Extension, vault: &'a mut Vault) -> Self {
        Self {
            comptroller,
            extension,
            vault,
        }
    }

    pub fn comptroller(&self) -> Address {
        self.comptroller
    }

    pub fn extension(&self) -> Extension {
        self.extension
    }

    /// Read-only view of the vault.
    pub fn vault(&self) -> &Vault {
        &*self.vault
    }

    fn permit(&self, action: VaultAction) -> Result<()> {
        if !is_allowed_vault_action(self.extension, action) {
            return Err(FundError::VaultActionNotAllowed {
                extension: self.extension.as_str(),
            });
        }
        Ok(())
    }

    pub fn mint_shares(&mut self, to: Address, amount: U256) -> Result<()> {
        self.permit(VaultAction::MintShares)?;
        self.vault.mint_shares(self.comptroller, to, amount)
    }

    pub fn burn_shares(&mut self, from: Address, amount: U256) -> Result<()> {
        self.permit(VaultAction::BurnShares)?;
        self.vault.burn_shares(self.comptroller, from, amount)
    }

    pub fn transfer_shares(&mut self, from: Address, to: Address, amount: U256) -> Result<()> {
        self.permit(VaultAction::TransferShares)?;
        self.vault.transfer_shares(self.comptroller, from, to, amount)
    }

    pub fn approve_asset_spender(
        &mut self,
        ledger: &mut TokenLedger,
        asset: Address,
        spender: Address,
        amount: U256,
    ) -> Result<()> {
        self.permit(VaultAction::ApproveAssetSpender)?;
        self.vault
            .approve_asset_spender(self.comptroller, ledger, asset, spender, amount)
    }

    pub fn withdraw_asset_to(
        &mut self,
        ledger: &mut TokenLedger,
        asset: Address,
        to: Address,
        amount: U256,
    ) -> Result<()> {
        self.permit(VaultAction::WithdrawAssetTo)?;
        self.vault
            .withdraw_asset_to(self.comptroller, ledger, asset, to, amount)
    }

    pub fn add_tracked_asset(&mut self, asset: Address, events: &mut EventLog) -> Result<()> {
        self.permit(VaultAction::AddTrackedAsset)?;
        self.vault.add_tracked_asset(self.comptroller, asset, events)
    }

    pub fn remove_tracked_asset(&mut self, asset: Address, events: &mut EventLog) -> Result<()> {
        self.permit(VaultAction::RemoveTrackedAsset)?;
        self.vault.remove_tracked_asset(self.comptroller, asset, events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COMPTROLLER: Address = Address::repeat_byte(0xc0);

    fn vault() -> Vault {
        Vault::new(
            Address::repeat_byte(0x7a),
            Address::repeat_byte(0x0e),
            "Handle Fund",
            COMPTROLLER,
            Address::repeat_byte(0xde),
        )
    }

    #[test]
    fn test_integration_manager_cannot_mint() {
        let mut v = vault();
        let mut handle = PermissionedVault::new(COMPTROLLER, Extension::IntegrationManager, &mut v);
        assert_eq!(
            handle.mint_shares(Address::repeat_byte(0x01), U256::from(1u8)).unwrap_err(),
            FundError::VaultActionNotAllowed {
                extension: "IntegrationManager"
            }
        );
        assert_eq!(
            FundError::VaultActionNotAllowed {
                extension: "IntegrationManager"
            }
            .to_string(),
            "Not an allowed vault action for IntegrationManager"
        );
    }

    #[test]
    fn test_fee_manager_cannot_move_assets() {
        let mut v = vault();
        let mut ledger = TokenLedger::new();
        let mut handle = PermissionedVault::new(COMPTROLLER, Extension::FeeManager, &mut v);
        assert!(handle
            .withdraw_asset_to(&mut ledger, Address::repeat_byte(0x01), COMPTROLLER, U256::from(1u8))
            .is_err());
        assert!(handle
            .add_tracked_asset(Address::repeat_byte(0x01), &mut EventLog::new())
            .is_err());
    }

    #[test]
    fn test_fee_manager_can_mint_as_comptroller() {
        let mut v = vault();
        {
            let mut handle = PermissionedVault::new(COMPTROLLER, Extension::FeeManager, &mut v);
            handle.mint_shares(Address::repeat_byte(0x01), U256::from(3u8)).unwrap();
        }
        assert_eq!(v.total_supply(), U256::from(3u8));
    }
}
