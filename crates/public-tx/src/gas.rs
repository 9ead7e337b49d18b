//! Two-dimensional gas accounting and fee computation.

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};

/// An amount of gas in both dimensions: data availability and L2 execution.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    derive_more::Add,
    derive_more::AddAssign,
    derive_more::Sub,
    derive_more::SubAssign,
)]
#[serde(rename_all = "camelCase")]
pub struct Gas {
    /// Data availability gas.
    pub da_gas: u64,
    /// L2 execution gas.
    pub l2_gas: u64,
}

impl Gas {
    /// Creates a new gas amount.
    pub const fn new(da_gas: u64, l2_gas: u64) -> Self {
        Self { da_gas, l2_gas }
    }

    /// No gas.
    pub const fn empty() -> Self {
        Self::new(0, 0)
    }

    /// Returns true if both dimensions are zero.
    pub const fn is_empty(&self) -> bool {
        self.da_gas == 0 && self.l2_gas == 0
    }

    /// Subtracts component-wise, stopping at zero.
    pub const fn saturating_sub(self, other: Self) -> Self {
        Self {
            da_gas: self.da_gas.saturating_sub(other.da_gas),
            l2_gas: self.l2_gas.saturating_sub(other.l2_gas),
        }
    }

    /// Returns true if either dimension of `self` exceeds the one of `limit`.
    pub const fn exceeds(&self, limit: &Self) -> bool {
        self.da_gas > limit.da_gas || self.l2_gas > limit.l2_gas
    }

    /// Computes the fee of this gas at the given per-unit prices.
    pub fn compute_fee(&self, fees: &GasFees) -> U256 {
        U256::from(self.da_gas) * U256::from(fees.fee_per_da_gas) +
            U256::from(self.l2_gas) * U256::from(fees.fee_per_l2_gas)
    }
}

/// Per-unit gas prices.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GasFees {
    /// Price of one unit of data availability gas.
    pub fee_per_da_gas: u128,
    /// Price of one unit of L2 gas.
    pub fee_per_l2_gas: u128,
}

impl GasFees {
    /// Creates new gas fees.
    pub const fn new(fee_per_da_gas: u128, fee_per_l2_gas: u128) -> Self {
        Self { fee_per_da_gas, fee_per_l2_gas }
    }
}

/// Gas limits and fee caps chosen by the sender of a transaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GasSettings {
    /// Gas limit for the whole transaction, private and teardown included.
    pub gas_limits: Gas,
    /// Gas limit for the teardown phase alone.
    pub teardown_gas_limits: Gas,
    /// Maximum total price the sender pays per unit of gas.
    pub max_fees_per_gas: GasFees,
    /// Maximum priority price the sender tips per unit of gas.
    pub max_priority_fees_per_gas: GasFees,
}

impl GasSettings {
    /// Creates new gas settings.
    pub const fn new(
        gas_limits: Gas,
        teardown_gas_limits: Gas,
        max_fees_per_gas: GasFees,
        max_priority_fees_per_gas: GasFees,
    ) -> Self {
        Self { gas_limits, teardown_gas_limits, max_fees_per_gas, max_priority_fees_per_gas }
    }
}

/// Clamps the gas settings to what the public VM can process.
///
/// The L2 gas available to the public portion (`gas_limits - gas_used_by_private`) and the
/// teardown L2 gas limit are both capped at `max_processable_l2_gas`. Data availability gas is
/// never clamped.
pub fn clamp_gas_settings_for_avm(
    gas_settings: &GasSettings,
    gas_used_by_private: Gas,
    max_processable_l2_gas: u64,
) -> GasSettings {
    let gas_limits = Gas::new(
        gas_settings.gas_limits.da_gas,
        gas_settings
            .gas_limits
            .l2_gas
            .min(gas_used_by_private.l2_gas.saturating_add(max_processable_l2_gas)),
    );
    let teardown_gas_limits = Gas::new(
        gas_settings.teardown_gas_limits.da_gas,
        gas_settings.teardown_gas_limits.l2_gas.min(max_processable_l2_gas),
    );
    GasSettings { gas_limits, teardown_gas_limits, ..*gas_settings }
}

/// Computes the prices actually paid: the base fee plus as much of the priority fee as fits under
/// the sender's maximum fee.
pub fn compute_effective_gas_fees(base_fees: &GasFees, gas_settings: &GasSettings) -> GasFees {
    let GasSettings { max_fees_per_gas, max_priority_fees_per_gas, .. } = gas_settings;
    let priority_da = max_priority_fees_per_gas
        .fee_per_da_gas
        .min(max_fees_per_gas.fee_per_da_gas.saturating_sub(base_fees.fee_per_da_gas));
    let priority_l2 = max_priority_fees_per_gas
        .fee_per_l2_gas
        .min(max_fees_per_gas.fee_per_l2_gas.saturating_sub(base_fees.fee_per_l2_gas));
    GasFees::new(
        base_fees.fee_per_da_gas.saturating_add(priority_da),
        base_fees.fee_per_l2_gas.saturating_add(priority_l2),
    )
}

/// Computes the fee for `gas_used` at the effective gas fees.
pub fn compute_transaction_fee(
    base_fees: &GasFees,
    gas_settings: &GasSettings,
    gas_used: Gas,
) -> U256 {
    gas_used.compute_fee(&compute_effective_gas_fees(base_fees, gas_settings))
}
