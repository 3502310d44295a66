// src/fees/entrance.rs

use super::FeeContext;
use crate::errors::{FundError, Result};
use crate::events::{Event, EventLog};
use crate::math::{self, ONE};
use crate::models::{
    EntranceSettlement, FeeHook, FeeKind, Settlement, SettlementData, SettlementType, U256,
};
use crate::traits::Fee;

/// One-shot fee on every purchase, taken from the shares the buyer just received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntranceRateFee {
    rate: U256,
    settlement: EntranceSettlement,
}

impl EntranceRateFee {
    pub fn new(rate: u64, settlement: EntranceSettlement) -> Result<Self> {
        let rate = math::rate(rate);
        if rate.is_zero() {
            return Err(FundError::invalid("addFundSettings: Fee rate must be >0"));
        }
        if rate >= ONE {
            return Err(FundError::invalid("addFundSettings: Fee rate max exceeded"));
        }
        Ok(Self { rate, settlement })
    }

    pub fn rate(&self) -> U256 {
        self.rate
    }

    pub fn settlement(&self) -> EntranceSettlement {
        self.settlement
    }
}

impl Fee for EntranceRateFee {
    fn kind(&self) -> FeeKind {
        FeeKind::EntranceRate
    }

    fn settles_on_hook(&self, hook: FeeHook) -> bool {
        hook == FeeHook::PostBuyShares
    }

    fn settle(
        &mut self,
        ctx: &FeeContext,
        data: &SettlementData,
        events: &mut EventLog,
    ) -> Result<Settlement> {
        let (buyer, shares_bought) = match data {
            SettlementData::PostBuyShares {
                buyer,
                shares_bought,
                ..
            } => (*buyer, *shares_bought),
            _ => return Ok(Settlement::none()),
        };

        let shares_due = math::mul_div(self.rate, shares_bought, ONE, "entrance fee")?;
        if shares_due.is_zero() {
            return Ok(Settlement::none());
        }
        events.emit(Event::Settled {
            comptroller: ctx.comptroller,
            fee: FeeKind::EntranceRate,
            shares_quantity: shares_due,
            prev_settled: None,
        });

        let settlement_type = match self.settlement {
            EntranceSettlement::Direct => SettlementType::Direct,
            EntranceSettlement::Burn => SettlementType::Burn,
        };
        Ok(Settlement::new(settlement_type, Some(buyer), shares_due))
    }
}
