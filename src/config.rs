// src/config.rs
//
// Configuration file parsing for fund scenarios.
// A TOML file describes the protocol, its tokens and adapters, one fund and a
// script of actions to run against it.

use crate::math;
use crate::models::{Address, FeeKind, FeeSettings, PolicyKind, PolicySettings, SpendAssetsHandleType, U256};
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::Path;

// =============================================================================
// Configuration Types
// =============================================================================

/// Root configuration structure.
#[derive(Debug, Deserialize)]
pub struct Config {
    /// Protocol-wide settings
    pub protocol: ProtocolConfig,
    /// Tokens known to the ledger and the price feed
    #[serde(default)]
    pub tokens: Vec<TokenConfig>,
    /// Initial token balances
    #[serde(default)]
    pub balances: Vec<BalanceConfig>,
    /// The fund to deploy
    pub fund: FundConfig,
    #[serde(default)]
    pub fees: Vec<FeeSettings>,
    #[serde(default)]
    pub policies: Vec<PolicySettings>,
    #[serde(default)]
    pub adapters: Vec<AdapterConfig>,
    /// Steps to run, in order
    #[serde(default)]
    pub actions: Vec<ActionConfig>,
}

#[derive(Debug, Deserialize)]
pub struct ProtocolConfig {
    /// Owner of the fund deployer
    pub owner: Address,
    /// Overrides the default tracked assets limit
    pub tracked_assets_limit: Option<usize>,
    /// Log level
    pub log_level: Option<String>,
    /// Unix timestamp the clock starts at
    #[serde(default)]
    pub start_time: u64,
}

/// A token. Prices are decimal strings: the value of one whole unit in a
/// common reference unit.
#[derive(Debug, Deserialize)]
pub struct TokenConfig {
    pub address: Address,
    pub symbol: String,
    #[serde(default = "default_decimals")]
    pub decimals: u8,
    pub price: String,
    /// Reference-market price, defaults to `price`
    pub live_price: Option<String>,
}

fn default_decimals() -> u8 {
    18
}

#[derive(Debug, Deserialize)]
pub struct BalanceConfig {
    /// Token symbol or address
    pub token: String,
    pub holder: Address,
    /// Whole units, as a decimal string
    pub amount: String,
}

#[derive(Debug, Deserialize)]
pub struct FundConfig {
    pub name: String,
    pub owner: Address,
    /// Token symbol or address
    pub denomination_asset: String,
    #[serde(default)]
    pub shares_action_timelock: u64,
}

/// Configuration for an adapter.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AdapterConfig {
    FixedRateSwap(FixedRateSwapConfig),
}

#[derive(Debug, Deserialize)]
pub struct FixedRateSwapConfig {
    pub address: Address,
    #[serde(default = "default_handle_type")]
    pub handle_type: SpendAssetsHandleType,
    #[serde(default)]
    pub rates: Vec<RateConfig>,
}

fn default_handle_type() -> SpendAssetsHandleType {
    SpendAssetsHandleType::Transfer
}

/// Whole units of `buy` paid per whole unit of `sell`.
#[derive(Debug, Deserialize)]
pub struct RateConfig {
    pub sell: String,
    pub buy: String,
    pub rate: String,
}

/// One scripted step. Amounts are whole units as decimal strings; share
/// quantities use 18 decimals.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ActionConfig {
    Warp {
        seconds: u64,
    },
    SetPrice {
        token: String,
        price: String,
        live_price: Option<String>,
    },
    Mint {
        token: String,
        to: Address,
        amount: String,
    },
    BuyShares {
        investor: Address,
        amount: String,
        min_shares: Option<String>,
    },
    RedeemShares {
        investor: Address,
        /// All shares when omitted
        quantity: Option<String>,
    },
    RedeemSharesEmergency {
        investor: Address,
    },
    Trade {
        /// Defaults to the fund owner
        caller: Option<Address>,
        adapter: Address,
        sell: String,
        sell_amount: String,
        buy: String,
        /// Defaults to one raw unit
        min_buy_amount: Option<String>,
    },
    InvokeContinuousHook {
        caller: Option<Address>,
    },
    PayoutSharesOutstanding {
        caller: Option<Address>,
        fees: Vec<FeeKind>,
    },
    AddAuthUsers {
        users: Vec<Address>,
    },
    UpdatePolicy {
        policy: PolicyKind,
        #[serde(default)]
        add: Vec<Address>,
        #[serde(default)]
        remove: Vec<Address>,
    },
    Shutdown,
}

// =============================================================================
// Configuration Loading
// =============================================================================

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let contents = fs::read_to_string(&path)
            .map_err(|e| format!("Failed to read config file: {}", e))?;
        Self::from_str(&contents)
    }

    /// Parse configuration from a TOML string.
    pub fn from_str(s: &str) -> Result<Self, String> {
        let config: Config =
            toml::from_str(s).map_err(|e| format!("Failed to parse config: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    /// Cross-section checks serde cannot express.
    pub fn validate(&self) -> Result<(), String> {
        let mut symbols = HashSet::new();
        let mut addresses = HashSet::new();
        for token in &self.tokens {
            if !symbols.insert(token.symbol.as_str()) {
                return Err(format!("Duplicate token symbol: {}", token.symbol));
            }
            if !addresses.insert(token.address) {
                return Err(format!("Duplicate token address: {}", token.address));
            }
            parse_units(&token.price, 18)?;
            if let Some(live) = &token.live_price {
                parse_units(live, 18)?;
            }
        }
        self.token(&self.fund.denomination_asset)?;
        for balance in &self.balances {
            self.token(&balance.token)?;
        }
        for adapter in &self.adapters {
            match adapter {
                AdapterConfig::FixedRateSwap(cfg) => {
                    for rate in &cfg.rates {
                        self.token(&rate.sell)?;
                        self.token(&rate.buy)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Resolves a token by symbol or by address.
    pub fn token(&self, reference: &str) -> Result<&TokenConfig, String> {
        let by_address: Option<Address> = reference.parse().ok();
        self.tokens
            .iter()
            .find(|t| t.symbol == reference || Some(t.address) == by_address)
            .ok_or_else(|| format!("Unknown token: {}", reference))
    }

    /// Raw units of `amount` whole units of a configured token.
    pub fn token_amount(&self, reference: &str, amount: &str) -> Result<U256, String> {
        let token = self.token(reference)?;
        parse_units(amount, token.decimals)
    }
}

/// Parses a decimal string into raw units with `decimals` decimals.
///
/// # Examples
/// ```
/// use fund_engine::config::parse_units;
/// use fund_engine::models::U256;
///
/// assert_eq!(parse_units("1.5", 6).unwrap(), U256::from(1_500_000u64));
/// ```
pub fn parse_units(amount: &str, decimals: u8) -> Result<U256, String> {
    let amount = amount.trim();
    let (whole, fraction) = match amount.split_once('.') {
        Some((w, f)) => (w, f),
        None => (amount, ""),
    };
    if whole.is_empty() && fraction.is_empty() {
        return Err(format!("Invalid amount: '{}'", amount));
    }
    if fraction.len() > decimals as usize {
        return Err(format!(
            "Amount '{}' has more than {} decimals",
            amount, decimals
        ));
    }
    let digits = |s: &str| -> Result<U256, String> {
        if s.is_empty() {
            return Ok(U256::ZERO);
        }
        if !s.chars().all(|c| c.is_ascii_digit()) {
            return Err(format!("Invalid amount: '{}'", amount));
        }
        U256::from_str_radix(s, 10).map_err(|e| format!("Invalid amount '{}': {}", amount, e))
    };
    let padded = format!("{:0<width$}", fraction, width = decimals as usize);
    let whole_units = digits(whole)?
        .checked_mul(math::unit(decimals))
        .ok_or_else(|| format!("Amount '{}' overflows", amount))?;
    whole_units
        .checked_add(digits(&padded)?)
        .ok_or_else(|| format!("Amount '{}' overflows", amount))
}

// =============================================================================
// Default Configuration
// =============================================================================

/// Returns a default configuration string for documentation.
pub fn default_config_template() -> &'static str {
    r#"# Fund Scenario Configuration
#
# Deploys a protocol and one fund, then runs the actions in order.
# Amounts are whole token units written as decimal strings.
# Fee rates and policy limits are 1e18-scaled integers (1e18 == 100%).

[protocol]
owner = "0x00000000000000000000000000000000000000a0"
tracked_assets_limit = 20
start_time = 1700000000

[[tokens]]
address = "0x00000000000000000000000000000000000000e1"
symbol = "WETH"
decimals = 18
price = "2000"

[[tokens]]
address = "0x00000000000000000000000000000000000000e2"
symbol = "USDC"
decimals = 6
price = "1"

[[balances]]
token = "WETH"
holder = "0x00000000000000000000000000000000000000b1"
amount = "10"

[[balances]]
token = "USDC"
holder = "0x00000000000000000000000000000000000000ad"
amount = "1000000"

[fund]
name = "Example Fund"
owner = "0x00000000000000000000000000000000000000f0"
denomination_asset = "WETH"
shares_action_timelock = 0

# 2% management fee
[[fees]]
type = "management"
rate = 20000000000000000

# 10% performance fee, crystallized every 30 days
[[fees]]
type = "performance"
rate = 100000000000000000
period = 2592000

[[policies]]
type = "max_concentration"
limit = 500000000000000000

[[adapters]]
type = "fixed_rate_swap"
address = "0x00000000000000000000000000000000000000ad"
handle_type = "transfer"
rates = [{ sell = "WETH", buy = "USDC", rate = "2000" }]

[[actions]]
action = "buy_shares"
investor = "0x00000000000000000000000000000000000000b1"
amount = "5"

[[actions]]
action = "trade"
adapter = "0x00000000000000000000000000000000000000ad"
sell = "WETH"
sell_amount = "1"
buy = "USDC"
min_buy_amount = "1990"

[[actions]]
action = "warp"
seconds = 2592000

[[actions]]
action = "set_price"
token = "WETH"
price = "2400"

[[actions]]
action = "invoke_continuous_hook"

[[actions]]
action = "redeem_shares"
investor = "0x00000000000000000000000000000000000000b1"
"#
}

// =============================================================================
// Tests
// =============================================================================
