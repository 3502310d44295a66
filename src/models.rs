// src/models.rs

use crate::errors::{FundError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

pub use alloy_primitives::{keccak256, Address, Bytes, Selector, U256};

/// Derives the 4-byte discriminator of a canonical function signature.
///
/// # Examples
/// ```
/// use fund_engine::models::selector;
///
/// let s = selector("transfer(address,uint256)");
/// assert_eq!(s.as_slice(), &[0xa9, 0x05, 0x9c, 0xbb]);
/// ```
pub fn selector(signature: &str) -> Selector {
    Selector::from_slice(&keccak256(signature.as_bytes())[..4])
}

// =============================================================================
// Fund Lifecycle
// =============================================================================

/// Lifecycle state of a comptroller.
///
/// Transitions are one-directional:
/// `Uninitialized -> Initialized -> Active -> Shutdown -> Destructed`.
/// Migration may destruct an `Active` comptroller directly.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FundStatus {
    Uninitialized,
    Initialized,
    Active,
    Shutdown,
    Destructed,
}

impl FundStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FundStatus::Uninitialized => "uninitialized",
            FundStatus::Initialized => "initialized",
            FundStatus::Active => "active",
            FundStatus::Shutdown => "shutdown",
            FundStatus::Destructed => "destructed",
        }
    }
}

impl fmt::Display for FundStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The pair of addresses that identifies a deployed fund.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FundHandle {
    pub comptroller: Address,
    pub vault: Address,
}

/// Everything needed to deploy a new fund.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NewFundParams {
    pub owner: Address,
    pub name: String,
    pub denomination_asset: Address,
    #[serde(default)]
    pub shares_action_timelock: u64,
    #[serde(default)]
    pub fees: Vec<FeeSettings>,
    #[serde(default)]
    pub policies: Vec<PolicySettings>,
}

impl NewFundParams {
    /// A fund with no fees and no policies.
    pub fn new(owner: Address, name: impl Into<String>, denomination_asset: Address) -> Self {
        Self {
            owner,
            name: name.into(),
            denomination_asset,
            shares_action_timelock: 0,
            fees: Vec::new(),
            policies: Vec::new(),
        }
    }

    pub fn with_fee(mut self, fee: FeeSettings) -> Self {
        self.fees.push(fee);
        self
    }

    pub fn with_policy(mut self, policy: PolicySettings) -> Self {
        self.policies.push(policy);
        self
    }

    pub fn with_timelock(mut self, seconds: u64) -> Self {
        self.shares_action_timelock = seconds;
        self
    }
}

// =============================================================================
// Extensions
// =============================================================================

/// The three extensions a comptroller dispatches to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Extension {
    FeeManager,
    PolicyManager,
    IntegrationManager,
}

impl Extension {
    pub fn as_str(&self) -> &'static str {
        match self {
            Extension::FeeManager => "FeeManager",
            Extension::PolicyManager => "PolicyManager",
            Extension::IntegrationManager => "IntegrationManager",
        }
    }
}

impl fmt::Display for Extension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Fees
// =============================================================================

/// Points in the fund lifecycle at which fees may settle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeeHook {
    PreBuyShares,
    PostBuyShares,
    Continuous,
    PreRedeemShares,
}

/// How the fee manager applies a fee's settlement.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlementType {
    None,
    /// Transfer shares from the payer to the fund owner.
    Direct,
    /// Mint new shares to the fund owner.
    Mint,
    /// Burn shares from the payer.
    Burn,
    /// Grow the uncrystallized shares-outstanding counter.
    MintSharesOutstanding,
    /// Shrink the uncrystallized shares-outstanding counter.
    BurnSharesOutstanding,
}

/// The result of a fee's `settle` call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Settlement {
    pub settlement_type: SettlementType,
    pub payer: Option<Address>,
    pub shares_due: U256,
}

impl Settlement {
    pub fn none() -> Self {
        Self {
            settlement_type: SettlementType::None,
            payer: None,
            shares_due: U256::ZERO,
        }
    }

    pub fn new(settlement_type: SettlementType, payer: Option<Address>, shares_due: U256) -> Self {
        if shares_due.is_zero() {
            return Self::none();
        }
        Self {
            settlement_type,
            payer,
            shares_due,
        }
    }
}

/// Hook-specific data passed to fees when they settle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SettlementData {
    Continuous,
    PreBuyShares {
        buyer: Address,
        investment_amount: U256,
        min_shares_quantity: U256,
    },
    PostBuyShares {
        buyer: Address,
        investment_amount: U256,
        shares_bought: U256,
    },
    PreRedeemShares {
        redeemer: Address,
        shares_quantity: U256,
    },
}

impl SettlementData {
    pub fn hook(&self) -> FeeHook {
        match self {
            SettlementData::Continuous => FeeHook::Continuous,
            SettlementData::PreBuyShares { .. } => FeeHook::PreBuyShares,
            SettlementData::PostBuyShares { .. } => FeeHook::PostBuyShares,
            SettlementData::PreRedeemShares { .. } => FeeHook::PreRedeemShares,
        }
    }
}

/// The closed set of fee implementations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeeKind {
    Management,
    Performance,
    EntranceRate,
}

impl FeeKind {
    pub fn identifier(&self) -> &'static str {
        match self {
            FeeKind::Management => "MANAGEMENT",
            FeeKind::Performance => "PERFORMANCE",
            FeeKind::EntranceRate => "ENTRANCE_RATE",
        }
    }
}

impl fmt::Display for FeeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.identifier())
    }
}

/// What the entrance fee does with the shares it takes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntranceSettlement {
    /// Pay the shares to the fund owner.
    #[default]
    Direct,
    /// Burn the shares, accruing their value to the remaining holders.
    Burn,
}

/// Per-fund fee configuration. Rates are 1e18-scaled (1e18 == 100%).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeeSettings {
    /// Annualized, continuously accruing fee on total shares supply.
    Management { rate: u64 },
    /// High-water-mark fee on share price gains, crystallized once per `period` seconds.
    Performance { rate: u64, period: u64 },
    /// One-shot fee on shares bought.
    EntranceRate {
        rate: u64,
        #[serde(default)]
        settlement: EntranceSettlement,
    },
}

impl FeeSettings {
    pub fn kind(&self) -> FeeKind {
        match self {
            FeeSettings::Management { .. } => FeeKind::Management,
            FeeSettings::Performance { .. } => FeeKind::Performance,
            FeeSettings::EntranceRate { .. } => FeeKind::EntranceRate,
        }
    }
}

// =============================================================================
// Policies
// =============================================================================

/// Operations that policies can guard.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyHook {
    BuyShares,
    CallOnIntegration,
}

/// Whether a policy runs before or after the guarded operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionTime {
    Pre,
    Post,
}

/// The closed set of policy implementations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    AdapterBlacklist,
    AdapterWhitelist,
    AssetBlacklist,
    AssetWhitelist,
    InvestorBlacklist,
    InvestorWhitelist,
    UserBlacklist,
    UserWhitelist,
    MaxConcentration,
    BuySharesPriceFeedTolerance,
}

impl PolicyKind {
    pub fn identifier(&self) -> &'static str {
        match self {
            PolicyKind::AdapterBlacklist => "ADAPTER_BLACKLIST",
            PolicyKind::AdapterWhitelist => "ADAPTER_WHITELIST",
            PolicyKind::AssetBlacklist => "ASSET_BLACKLIST",
            PolicyKind::AssetWhitelist => "ASSET_WHITELIST",
            PolicyKind::InvestorBlacklist => "INVESTOR_BLACKLIST",
            PolicyKind::InvestorWhitelist => "INVESTOR_WHITELIST",
            PolicyKind::UserBlacklist => "USER_BLACKLIST",
            PolicyKind::UserWhitelist => "USER_WHITELIST",
            PolicyKind::MaxConcentration => "MAX_CONCENTRATION",
            PolicyKind::BuySharesPriceFeedTolerance => "BUY_SHARES_PRICE_FEED_TOLERANCE",
        }
    }
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.identifier())
    }
}

/// Per-fund policy configuration. Limits and tolerances are 1e18-scaled.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PolicySettings {
    AdapterBlacklist { addresses: Vec<Address> },
    AdapterWhitelist { addresses: Vec<Address> },
    AssetBlacklist { addresses: Vec<Address> },
    AssetWhitelist { addresses: Vec<Address> },
    InvestorBlacklist { addresses: Vec<Address> },
    InvestorWhitelist { addresses: Vec<Address> },
    UserBlacklist { addresses: Vec<Address> },
    UserWhitelist { addresses: Vec<Address> },
    MaxConcentration { limit: u64 },
    BuySharesPriceFeedTolerance { tolerance: u64 },
}

impl PolicySettings {
    pub fn kind(&self) -> PolicyKind {
        match self {
            PolicySettings::AdapterBlacklist { .. } => PolicyKind::AdapterBlacklist,
            PolicySettings::AdapterWhitelist { .. } => PolicyKind::AdapterWhitelist,
            PolicySettings::AssetBlacklist { .. } => PolicyKind::AssetBlacklist,
            PolicySettings::AssetWhitelist { .. } => PolicyKind::AssetWhitelist,
            PolicySettings::InvestorBlacklist { .. } => PolicyKind::InvestorBlacklist,
            PolicySettings::InvestorWhitelist { .. } => PolicyKind::InvestorWhitelist,
            PolicySettings::UserBlacklist { .. } => PolicyKind::UserBlacklist,
            PolicySettings::UserWhitelist { .. } => PolicyKind::UserWhitelist,
            PolicySettings::MaxConcentration { .. } => PolicyKind::MaxConcentration,
            PolicySettings::BuySharesPriceFeedTolerance { .. } => {
                PolicyKind::BuySharesPriceFeedTolerance
            }
        }
    }
}

/// Hook-specific data passed to policies.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PolicyHookArgs {
    PreBuyShares {
        buyer: Address,
        investment_amount: U256,
        min_shares_quantity: U256,
        gav: U256,
    },
    PostBuyShares {
        buyer: Address,
        investment_amount: U256,
        shares_issued: U256,
        gav: U256,
    },
    PreCallOnIntegration {
        caller: Address,
        adapter: Address,
        selector: Selector,
        incoming_assets: Vec<Address>,
        min_incoming_asset_amounts: Vec<U256>,
        spend_assets: Vec<Address>,
        spend_asset_amounts: Vec<U256>,
    },
    PostCallOnIntegration {
        caller: Address,
        adapter: Address,
        selector: Selector,
        incoming_assets: Vec<Address>,
        incoming_asset_amounts: Vec<U256>,
        outgoing_assets: Vec<Address>,
        outgoing_asset_amounts: Vec<U256>,
    },
}

impl PolicyHookArgs {
    pub fn hook(&self) -> (PolicyHook, ExecutionTime) {
        match self {
            PolicyHookArgs::PreBuyShares { .. } => (PolicyHook::BuyShares, ExecutionTime::Pre),
            PolicyHookArgs::PostBuyShares { .. } => (PolicyHook::BuyShares, ExecutionTime::Post),
            PolicyHookArgs::PreCallOnIntegration { .. } => {
                (PolicyHook::CallOnIntegration, ExecutionTime::Pre)
            }
            PolicyHookArgs::PostCallOnIntegration { .. } => {
                (PolicyHook::CallOnIntegration, ExecutionTime::Post)
            }
        }
    }
}

// =============================================================================
// Integrations
// =============================================================================

/// How the vault grants an adapter custody of spend assets.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpendAssetsHandleType {
    #[default]
    None,
    /// The vault approves the adapter to pull the amounts.
    Approve,
    /// The vault transfers the amounts to the adapter up front.
    Transfer,
}

/// An adapter's declaration of what an action will spend and receive.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParsedAssets {
    pub spend_assets_handle_type: SpendAssetsHandleType,
    pub spend_assets: Vec<Address>,
    pub spend_asset_amounts: Vec<U256>,
    pub incoming_assets: Vec<Address>,
    pub min_incoming_asset_amounts: Vec<U256>,
}

/// Arguments of `callOnIntegration`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrationCall {
    pub adapter: Address,
    pub selector: Selector,
    pub encoded_call_args: Bytes,
}

impl IntegrationCall {
    /// Builds a call whose adapter-specific arguments are JSON-encoded.
    pub fn new<T: Serialize>(adapter: Address, selector: Selector, args: &T) -> Result<Self> {
        let encoded = serde_json::to_vec(args)
            .map_err(|e| FundError::invalid(format!("Failed to encode call args: {}", e)))?;
        Ok(Self {
            adapter,
            selector,
            encoded_call_args: Bytes::from(encoded),
        })
    }
}

// =============================================================================
// Extension Calls
// =============================================================================

/// Actions exposed by the fee manager through `callOnExtension`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeeManagerAction {
    InvokeContinuousHook,
    PayoutSharesOutstanding { fees: Vec<FeeKind> },
}

/// Actions exposed by the policy manager through `callOnExtension`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PolicyManagerAction {
    UpdatePolicySettings {
        policy: PolicyKind,
        #[serde(default)]
        add: Vec<Address>,
        #[serde(default)]
        remove: Vec<Address>,
    },
}

/// Actions exposed by the integration manager through `callOnExtension`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntegrationManagerAction {
    CallOnIntegration(IntegrationCall),
    AddAuthUsers(Vec<Address>),
    RemoveAuthUsers(Vec<Address>),
    AddZeroBalanceTrackedAssets(Vec<Address>),
    RemoveZeroBalanceTrackedAssets(Vec<Address>),
}

/// A typed `callOnExtension` request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExtensionCall {
    Fees(FeeManagerAction),
    Policies(PolicyManagerAction),
    Integrations(IntegrationManagerAction),
}

const SIG_INVOKE_CONTINUOUS_HOOK: &str = "invokeContinuousHook()";
const SIG_PAYOUT_SHARES_OUTSTANDING: &str = "payoutSharesOutstandingForFees(address[])";
const SIG_UPDATE_POLICY_SETTINGS: &str = "updatePolicySettingsForFund(address,bytes)";
const SIG_CALL_ON_INTEGRATION: &str = "callOnIntegration(address,bytes4,bytes)";
const SIG_ADD_AUTH_USERS: &str = "addAuthUsersForFund(address[])";
const SIG_REMOVE_AUTH_USERS: &str = "removeAuthUsersForFund(address[])";
const SIG_ADD_TRACKED_ASSETS: &str = "addZeroBalanceTrackedAssets(address[])";
const SIG_REMOVE_TRACKED_ASSETS: &str = "removeZeroBalanceTrackedAssets(address[])";

impl ExtensionCall {
    /// The extension this call is routed to.
    pub fn extension(&self) -> Extension {
        match self {
            ExtensionCall::Fees(_) => Extension::FeeManager,
            ExtensionCall::Policies(_) => Extension::PolicyManager,
            ExtensionCall::Integrations(_) => Extension::IntegrationManager,
        }
    }

    /// The canonical signature of the action.
    pub fn signature(&self) -> &'static str {
        match self {
            ExtensionCall::Fees(FeeManagerAction::InvokeContinuousHook) => {
                SIG_INVOKE_CONTINUOUS_HOOK
            }
            ExtensionCall::Fees(FeeManagerAction::PayoutSharesOutstanding { .. }) => {
                SIG_PAYOUT_SHARES_OUTSTANDING
            }
            ExtensionCall::Policies(PolicyManagerAction::UpdatePolicySettings { .. }) => {
                SIG_UPDATE_POLICY_SETTINGS
            }
            ExtensionCall::Integrations(action) => match action {
                IntegrationManagerAction::CallOnIntegration(_) => SIG_CALL_ON_INTEGRATION,
                IntegrationManagerAction::AddAuthUsers(_) => SIG_ADD_AUTH_USERS,
                IntegrationManagerAction::RemoveAuthUsers(_) => SIG_REMOVE_AUTH_USERS,
                IntegrationManagerAction::AddZeroBalanceTrackedAssets(_) => SIG_ADD_TRACKED_ASSETS,
                IntegrationManagerAction::RemoveZeroBalanceTrackedAssets(_) => {
                    SIG_REMOVE_TRACKED_ASSETS
                }
            },
        }
    }

    /// The 4-byte discriminator of the action.
    pub fn selector(&self) -> Selector {
        selector(self.signature())
    }

    /// Encodes into the `(extension, selector, call_args)` triple.
    pub fn encode(&self) -> Result<(Extension, Selector, Vec<u8>)> {
        let args = match self {
            ExtensionCall::Fees(FeeManagerAction::InvokeContinuousHook) => Ok(Vec::new()),
            ExtensionCall::Fees(FeeManagerAction::PayoutSharesOutstanding { fees }) => {
                serde_json::to_vec(fees)
            }
            ExtensionCall::Policies(PolicyManagerAction::UpdatePolicySettings {
                policy,
                add,
                remove,
            }) => serde_json::to_vec(&(policy, add, remove)),
            ExtensionCall::Integrations(action) => match action {
                IntegrationManagerAction::CallOnIntegration(call) => serde_json::to_vec(call),
                IntegrationManagerAction::AddAuthUsers(list)
                | IntegrationManagerAction::RemoveAuthUsers(list)
                | IntegrationManagerAction::AddZeroBalanceTrackedAssets(list)
                | IntegrationManagerAction::RemoveZeroBalanceTrackedAssets(list) => {
                    serde_json::to_vec(list)
                }
            },
        }
        .map_err(|e| FundError::invalid(format!("Failed to encode call args: {}", e)))?;
        Ok((self.extension(), self.selector(), args))
    }

    /// Decodes an opaque `(extension, selector, call_args)` triple.
    pub fn decode(extension: Extension, sel: Selector, call_args: &[u8]) -> Result<Self> {
        let signatures: &[&str] = match extension {
            Extension::FeeManager => &[SIG_INVOKE_CONTINUOUS_HOOK, SIG_PAYOUT_SHARES_OUTSTANDING],
            Extension::PolicyManager => &[SIG_UPDATE_POLICY_SETTINGS],
            Extension::IntegrationManager => &[
                SIG_CALL_ON_INTEGRATION,
                SIG_ADD_AUTH_USERS,
                SIG_REMOVE_AUTH_USERS,
                SIG_ADD_TRACKED_ASSETS,
                SIG_REMOVE_TRACKED_ASSETS,
            ],
        };
        let signature = signatures
            .iter()
            .find(|sig| selector(sig) == sel)
            .ok_or_else(|| {
                FundError::invalid(format!("callOnExtension: Invalid selector for {}", extension))
            })?;

        let call = match *signature {
            SIG_INVOKE_CONTINUOUS_HOOK => ExtensionCall::Fees(FeeManagerAction::InvokeContinuousHook),
            SIG_PAYOUT_SHARES_OUTSTANDING => {
                ExtensionCall::Fees(FeeManagerAction::PayoutSharesOutstanding {
                    fees: decode_args(call_args)?,
                })
            }
            SIG_UPDATE_POLICY_SETTINGS => {
                let (policy, add, remove) = decode_args(call_args)?;
                ExtensionCall::Policies(PolicyManagerAction::UpdatePolicySettings {
                    policy,
                    add,
                    remove,
                })
            }
            SIG_CALL_ON_INTEGRATION => ExtensionCall::Integrations(
                IntegrationManagerAction::CallOnIntegration(decode_args(call_args)?),
            ),
            SIG_ADD_AUTH_USERS => ExtensionCall::Integrations(IntegrationManagerAction::AddAuthUsers(
                decode_args(call_args)?,
            )),
            SIG_REMOVE_AUTH_USERS => ExtensionCall::Integrations(
                IntegrationManagerAction::RemoveAuthUsers(decode_args(call_args)?),
            ),
            SIG_ADD_TRACKED_ASSETS => ExtensionCall::Integrations(
                IntegrationManagerAction::AddZeroBalanceTrackedAssets(decode_args(call_args)?),
            ),
            _ => ExtensionCall::Integrations(
                IntegrationManagerAction::RemoveZeroBalanceTrackedAssets(decode_args(call_args)?),
            ),
        };
        Ok(call)
    }
}

fn decode_args<T: serde::de::DeserializeOwned>(call_args: &[u8]) -> Result<T> {
    serde_json::from_slice(call_args)
        .map_err(|e| FundError::invalid(format!("callOnExtension: Bad call args: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_call_encode_decode() {
        let user = Address::repeat_byte(0x11);
        let call = ExtensionCall::Integrations(IntegrationManagerAction::AddAuthUsers(vec![user]));
        let (extension, sel, args) = call.encode().unwrap();
        assert_eq!(extension, Extension::IntegrationManager);
        assert_eq!(ExtensionCall::decode(extension, sel, &args).unwrap(), call);
    }

    #[test]
    fn test_decode_rejects_selector_of_other_extension() {
        let call = ExtensionCall::Fees(FeeManagerAction::InvokeContinuousHook);
        let (_, sel, args) = call.encode().unwrap();
        assert!(ExtensionCall::decode(Extension::PolicyManager, sel, &args).is_err());
    }

    #[test]
    fn test_settlement_with_zero_shares_is_none() {
        let s = Settlement::new(SettlementType::Mint, None, U256::ZERO);
        assert_eq!(s.settlement_type, SettlementType::None);
    }

    #[test]
    fn test_fee_settings_from_toml() {
        #[derive(Deserialize)]
        struct Wrapper {
            fees: Vec<FeeSettings>,
        }
        let w: Wrapper = toml::from_str(
            r#"
            [[fees]]
            type = "performance"
            rate = 100000000000000000
            period = 2592000

            [[fees]]
            type = "entrance_rate"
            rate = 50000000000000000
            "#,
        )
        .unwrap();
        assert_eq!(
            w.fees[0],
            FeeSettings::Performance {
                rate: 100_000_000_000_000_000,
                period: 2_592_000
            }
        );
        assert_eq!(
            w.fees[1],
            FeeSettings::EntranceRate {
                rate: 50_000_000_000_000_000,
                settlement: EntranceSettlement::Direct
            }
        );
    }
}
