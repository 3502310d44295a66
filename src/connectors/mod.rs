// src/connectors/mod.rs
//
// Reference adapters. Real protocol integrations live outside the engine; these
// exist to drive the integration manager in scenarios and tests.

pub mod swap;

pub use swap::{take_order_selector, FixedRateSwapAdapter, TakeOrderArgs, TAKE_ORDER_SIGNATURE};
