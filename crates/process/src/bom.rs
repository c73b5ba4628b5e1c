//! Bill-of-materials items and the BOM quantity resolver.
//!
//! A BOM item says "`quantity` `uom` of material per `base_qty` `base_uom` of
//! output, scaled by `multiplier`, with `scrap_pct` of the input lost". For a
//! target output `Q` the required input is
//!
//! ```text
//! required = Q * (quantity / base_qty) * multiplier / (1 - scrap_pct)
//! ```
//!
//! evaluated as one division, `(Q * quantity * multiplier) / (base_qty * (1 - scrap_pct))`,
//! so exact ratios (e.g. `quantity == base_qty`) stay exact.

use core::str::FromStr;
use std::collections::BTreeSet;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use mfgplan_core::{BomItemId, DomainError, DomainResult, Entity, MaterialId};

/// Decimal places kept for quantities, base quantities and multipliers.
pub const QTY_SCALE: u32 = 6;

/// Decimal places kept for scrap fractions.
pub const SCRAP_SCALE: u32 = 4;

/// Exclusive magnitude bound for stored quantities, base quantities and
/// multipliers (`NUMERIC(12, 6)` holds at most 999999.999999).
pub const QTY_LIMIT: Decimal = Decimal::from_parts(1_000_000, 0, 0, false, 0);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BomError {
    /// The item (or the requested output) cannot produce a meaningful quantity.
    /// Not retryable: the data must be fixed.
    #[error("invalid bom configuration: {0}")]
    InvalidBomConfiguration(String),

    /// The result does not fit the decimal range.
    #[error("bom quantity overflow: {0}")]
    Overflow(String),
}

impl BomError {
    fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidBomConfiguration(msg.into())
    }

    /// Prefix the message with the offending item.
    pub fn for_item(self, id: BomItemId) -> Self {
        match self {
            Self::InvalidBomConfiguration(msg) => {
                Self::InvalidBomConfiguration(format!("bom item {id}: {msg}"))
            }
            Self::Overflow(msg) => Self::Overflow(format!("bom item {id}: {msg}")),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// BOM item
// ─────────────────────────────────────────────────────────────────────────────

/// Substitute material for a BOM item. Lower `priority` is preferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlternateMaterial {
    pub material_id: MaterialId,
    #[serde(default = "default_priority")]
    pub priority: i32,
}

fn default_priority() -> i32 {
    99
}

/// A single material requirement of a routing operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BomItem {
    pub id: BomItemId,
    pub material_id: MaterialId,
    /// Numerator: input material amount.
    pub quantity: Decimal,
    /// Numerator unit. Opaque label; no unit conversion is performed.
    pub uom: String,
    /// Denominator: output amount the `quantity` corresponds to.
    #[serde(default = "one")]
    pub base_qty: Decimal,
    #[serde(default = "default_base_uom")]
    pub base_uom: String,
    #[serde(default = "one")]
    pub multiplier: Decimal,
    /// Expected loss as a fraction in `[0, 1)`.
    #[serde(default)]
    pub scrap_pct: Decimal,
    #[serde(default)]
    pub alternates: Vec<AlternateMaterial>,
    pub notes: Option<String>,
}

fn one() -> Decimal {
    Decimal::ONE
}

fn default_base_uom() -> String {
    "pcs".to_string()
}

impl BomItem {
    pub fn new(
        id: BomItemId,
        material_id: MaterialId,
        quantity: Decimal,
        uom: impl Into<String>,
    ) -> Self {
        Self {
            id,
            material_id,
            quantity,
            uom: uom.into(),
            base_qty: Decimal::ONE,
            base_uom: default_base_uom(),
            multiplier: Decimal::ONE,
            scrap_pct: Decimal::ZERO,
            alternates: Vec::new(),
            notes: None,
        }
    }

    pub fn per(mut self, base_qty: Decimal, base_uom: impl Into<String>) -> Self {
        self.base_qty = base_qty;
        self.base_uom = base_uom.into();
        self
    }

    pub fn scaled(mut self, multiplier: Decimal) -> Self {
        self.multiplier = multiplier;
        self
    }

    pub fn with_scrap(mut self, scrap_pct: Decimal) -> Self {
        self.scrap_pct = scrap_pct;
        self
    }

    /// Round to stored precision (6 dp for quantities, 4 dp for scrap), the
    /// way a `NUMERIC(p, s)` column would.
    pub fn normalized(mut self) -> Self {
        let store = |d: Decimal, dp: u32| {
            d.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero)
                .normalize()
        };
        self.quantity = store(self.quantity, QTY_SCALE);
        self.base_qty = store(self.base_qty, QTY_SCALE);
        self.multiplier = store(self.multiplier, QTY_SCALE);
        self.scrap_pct = store(self.scrap_pct, SCRAP_SCALE);
        self
    }

    /// Alternates, most preferred first (ties keep declaration order).
    pub fn ranked_alternates(&self) -> Vec<AlternateMaterial> {
        let mut alternates = self.alternates.clone();
        alternates.sort_by_key(|a| a.priority);
        alternates
    }

    /// Write-time validation. Stricter than what the resolver re-checks.
    pub fn validate(&self) -> DomainResult<()> {
        if self.uom.trim().is_empty() || self.base_uom.trim().is_empty() {
            return Err(DomainError::validation("uom and base_uom cannot be empty"));
        }
        if self.quantity < Decimal::ZERO {
            return Err(DomainError::validation("quantity cannot be negative"));
        }
        if self.multiplier <= Decimal::ZERO {
            return Err(DomainError::validation("multiplier must be positive"));
        }
        for (field, value) in [
            ("quantity", self.quantity),
            ("base_qty", self.base_qty),
            ("multiplier", self.multiplier),
        ] {
            if value.abs() >= QTY_LIMIT {
                return Err(DomainError::validation(format!(
                    "{field} must be below {QTY_LIMIT} (got {value})"
                )));
            }
        }
        if self.alternates.iter().any(|a| a.material_id == self.material_id) {
            return Err(DomainError::validation(
                "an alternate cannot be the primary material",
            ));
        }
        let mut seen = BTreeSet::new();
        if let Some(dup) = self.alternates.iter().find(|a| !seen.insert(a.material_id)) {
            return Err(DomainError::conflict(format!(
                "alternate material {} is listed more than once",
                dup.material_id
            )));
        }
        check_item(self).map_err(|e| DomainError::validation(e.to_string()))
    }
}

impl Entity for BomItem {
    type Id = BomItemId;

    fn id(&self) -> Self::Id {
        self.id
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Rounding
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundingMode {
    /// Nearest, ties away from zero.
    HalfUp,
    /// Nearest, ties to even.
    HalfEven,
    /// Away from zero (never under-issue material).
    Up,
    /// Toward zero.
    Down,
}

impl RoundingMode {
    fn strategy(self) -> RoundingStrategy {
        match self {
            RoundingMode::HalfUp => RoundingStrategy::MidpointAwayFromZero,
            RoundingMode::HalfEven => RoundingStrategy::MidpointNearestEven,
            RoundingMode::Up => RoundingStrategy::AwayFromZero,
            RoundingMode::Down => RoundingStrategy::ToZero,
        }
    }
}

impl FromStr for RoundingMode {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "half_up" => Ok(Self::HalfUp),
            "half_even" => Ok(Self::HalfEven),
            "up" | "ceil" => Ok(Self::Up),
            "down" | "floor" => Ok(Self::Down),
            other => Err(DomainError::validation(format!(
                "unknown rounding mode '{other}' (expected half_up, half_even, up, down)"
            ))),
        }
    }
}

/// How the caller wants the resolved quantity rounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RoundingPolicy {
    /// Return the exact decimal.
    #[default]
    Exact,
    /// Round to `dp` decimal places.
    Scale { dp: u32, mode: RoundingMode },
}

impl RoundingPolicy {
    pub fn apply(self, value: Decimal) -> Decimal {
        match self {
            RoundingPolicy::Exact => value,
            RoundingPolicy::Scale { dp, mode } => value.round_dp_with_strategy(dp, mode.strategy()),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Resolver
// ─────────────────────────────────────────────────────────────────────────────

fn check_item(item: &BomItem) -> Result<(), BomError> {
    if item.base_qty <= Decimal::ZERO {
        return Err(BomError::invalid(format!(
            "base_qty must be positive (got {})",
            item.base_qty
        )));
    }
    if item.scrap_pct < Decimal::ZERO {
        return Err(BomError::invalid(format!(
            "scrap_pct cannot be negative (got {})",
            item.scrap_pct
        )));
    }
    if item.scrap_pct >= Decimal::ONE {
        return Err(BomError::invalid(format!(
            "scrap_pct must be below 1 (got {})",
            item.scrap_pct
        )));
    }
    Ok(())
}

/// Material needed (in `item.uom`) to produce `output_qty` (in `item.base_uom`).
///
/// Pure function of the item's numeric fields and `output_qty`; results can be
/// memoized per `(item.id, output_qty)`.
pub fn resolve_bom_requirement(item: &BomItem, output_qty: Decimal) -> Result<Decimal, BomError> {
    check_item(item)?;
    if output_qty < Decimal::ZERO {
        return Err(BomError::invalid(format!(
            "output quantity cannot be negative (got {output_qty})"
        )));
    }

    let overflow = || BomError::Overflow(format!("output quantity {output_qty}"));

    let numerator = output_qty
        .checked_mul(item.quantity)
        .and_then(|v| v.checked_mul(item.multiplier))
        .ok_or_else(overflow)?;
    let yield_factor = Decimal::ONE - item.scrap_pct;
    let denominator = item.base_qty.checked_mul(yield_factor).ok_or_else(overflow)?;

    numerator.checked_div(denominator).ok_or_else(overflow)
}

/// `resolve_bom_requirement` followed by the caller's rounding policy.
pub fn resolve_bom_requirement_rounded(
    item: &BomItem,
    output_qty: Decimal,
    policy: RoundingPolicy,
) -> Result<Decimal, BomError> {
    resolve_bom_requirement(item, output_qty).map(|qty| policy.apply(qty))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn item(quantity: Decimal, base_qty: Decimal, multiplier: Decimal, scrap: Decimal) -> BomItem {
        BomItem::new(BomItemId::new(1), MaterialId::new(1), quantity, "m2")
            .per(base_qty, "pcs")
            .scaled(multiplier)
            .with_scrap(scrap)
    }

    #[test]
    fn scrap_inflates_requirement() {
        let it = item(dec!(0.8), dec!(1), dec!(1), dec!(0.08));
        let exact = resolve_bom_requirement(&it, dec!(1000)).unwrap();

        assert!(exact.to_string().starts_with("869.565217391304347826"));
        let rounded = resolve_bom_requirement_rounded(
            &it,
            dec!(1000),
            RoundingPolicy::Scale { dp: 3, mode: RoundingMode::HalfUp },
        )
        .unwrap();
        assert_eq!(rounded, dec!(869.565));
    }

    #[test]
    fn unit_rate_returns_output_exactly() {
        let it = item(dec!(2.5), dec!(2.5), dec!(1), dec!(0));
        assert_eq!(resolve_bom_requirement(&it, dec!(1234.567)).unwrap(), dec!(1234.567));
    }

    #[test]
    fn base_qty_and_multiplier_scale_the_rate() {
        // 3 m per 12 pcs, doubled: 0.5 m/pc
        let it = item(dec!(3), dec!(12), dec!(2), dec!(0));
        assert_eq!(resolve_bom_requirement(&it, dec!(40)).unwrap(), dec!(20));
    }

    #[test]
    fn zero_output_needs_nothing() {
        let it = item(dec!(0.8), dec!(1), dec!(1), dec!(0.5));
        assert_eq!(resolve_bom_requirement(&it, Decimal::ZERO).unwrap(), Decimal::ZERO);
    }

    #[test]
    fn invalid_configurations_are_rejected() {
        let cases = [
            item(dec!(1), dec!(0), dec!(1), dec!(0)),
            item(dec!(1), dec!(-1), dec!(1), dec!(0)),
            item(dec!(1), dec!(1), dec!(1), dec!(1)),
            item(dec!(1), dec!(1), dec!(1), dec!(1.5)),
            item(dec!(1), dec!(1), dec!(1), dec!(-0.1)),
        ];
        for it in cases {
            let err = resolve_bom_requirement(&it, dec!(10)).unwrap_err();
            assert!(matches!(err, BomError::InvalidBomConfiguration(_)), "{it:?}");
        }

        let ok = item(dec!(1), dec!(1), dec!(1), dec!(0));
        assert!(matches!(
            resolve_bom_requirement(&ok, dec!(-1)),
            Err(BomError::InvalidBomConfiguration(_))
        ));
    }

    #[test]
    fn overflow_is_reported_not_panicked() {
        let it = item(Decimal::MAX, dec!(1), Decimal::MAX, dec!(0));
        assert!(matches!(
            resolve_bom_requirement(&it, Decimal::MAX),
            Err(BomError::Overflow(_))
        ));
    }

    #[test]
    fn rounding_modes() {
        let v = dec!(2.345);
        let at = |mode| RoundingPolicy::Scale { dp: 2, mode }.apply(v);
        assert_eq!(at(RoundingMode::HalfUp), dec!(2.35));
        assert_eq!(at(RoundingMode::HalfEven), dec!(2.34));
        assert_eq!(at(RoundingMode::Up), dec!(2.35));
        assert_eq!(at(RoundingMode::Down), dec!(2.34));
        assert_eq!(RoundingPolicy::Exact.apply(v), v);
        assert_eq!("CEIL".parse::<RoundingMode>().unwrap(), RoundingMode::Up);
        assert!("sideways".parse::<RoundingMode>().is_err());
    }

    #[test]
    fn normalized_matches_stored_precision() {
        let it = item(dec!(0.1234565), dec!(1.0000004), dec!(1), dec!(0.08125)).normalized();
        assert_eq!(it.quantity, dec!(0.123457));
        assert_eq!(it.base_qty, dec!(1));
        assert_eq!(it.scrap_pct, dec!(0.0813));
    }

    #[test]
    fn write_validation_is_stricter() {
        assert!(item(dec!(1), dec!(1), dec!(1), dec!(0)).validate().is_ok());
        assert!(item(dec!(-1), dec!(1), dec!(1), dec!(0)).validate().is_err());
        assert!(item(dec!(1), dec!(1), dec!(0), dec!(0)).validate().is_err());
        assert!(item(dec!(1), dec!(1), dec!(1), dec!(1)).validate().is_err());

        let mut self_alt = item(dec!(1), dec!(1), dec!(1), dec!(0));
        self_alt.alternates.push(AlternateMaterial { material_id: MaterialId::new(1), priority: 1 });
        assert!(self_alt.validate().is_err());
    }

    #[test]
    fn write_validation_bounds_stored_magnitudes() {
        assert!(item(dec!(999999.999999), dec!(1), dec!(1), dec!(0)).validate().is_ok());
        assert!(item(dec!(1000000), dec!(1), dec!(1), dec!(0)).validate().is_err());
        assert!(item(dec!(1), dec!(50000000), dec!(1), dec!(0)).validate().is_err());
        assert!(item(dec!(1), dec!(1), dec!(1000000), dec!(0)).validate().is_err());
    }

    #[test]
    fn duplicate_alternates_conflict() {
        let mut it = item(dec!(1), dec!(1), dec!(1), dec!(0));
        it.alternates.push(AlternateMaterial { material_id: MaterialId::new(2), priority: 1 });
        it.alternates.push(AlternateMaterial { material_id: MaterialId::new(2), priority: 2 });
        assert!(matches!(it.validate(), Err(DomainError::Conflict(_))));
    }

    #[test]
    fn serde_defaults_follow_stored_defaults() {
        let it: BomItem = serde_json::from_value(serde_json::json!({
            "id": 5,
            "material_id": 9,
            "quantity": "0.25",
            "uom": "kg",
            "notes": null
        }))
        .unwrap();
        assert_eq!(it.base_qty, Decimal::ONE);
        assert_eq!(it.base_uom, "pcs");
        assert_eq!(it.multiplier, Decimal::ONE);
        assert_eq!(it.scrap_pct, Decimal::ZERO);
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        fn arb_item() -> impl Strategy<Value = BomItem> {
            (1i64..=10_000_000, 1i64..=10_000_000, 1i64..=5_000_000, 0i64..=9_999).prop_map(
                |(q, b, m, s)| {
                    item(
                        Decimal::new(q, QTY_SCALE),
                        Decimal::new(b, QTY_SCALE),
                        Decimal::new(m, QTY_SCALE),
                        Decimal::new(s, SCRAP_SCALE),
                    )
                },
            )
        }

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 512,
                ..ProptestConfig::default()
            })]

            /// Property: doubling the output doubles the requirement.
            #[test]
            fn requirement_is_linear_in_output(it in arb_item(), q in 0i64..=1_000_000_000) {
                let q = Decimal::new(q, 3);
                let single = resolve_bom_requirement(&it, q).unwrap();
                let double = resolve_bom_requirement(&it, q * Decimal::TWO).unwrap();

                let tolerance = Decimal::new(1, 18) * (Decimal::ONE + double.abs());
                prop_assert!((double - single * Decimal::TWO).abs() <= tolerance);
            }

            /// Property: a unit-rate, scrap-free item is the identity.
            #[test]
            fn unit_rate_is_identity(qty in 1i64..=10_000_000, q in 0i64..=1_000_000_000) {
                let rate = Decimal::new(qty, QTY_SCALE);
                let it = item(rate, rate, Decimal::ONE, Decimal::ZERO);
                let q = Decimal::new(q, 3);
                prop_assert_eq!(resolve_bom_requirement(&it, q).unwrap(), q);
            }

            /// Property: scrap never reduces the requirement.
            #[test]
            fn scrap_never_reduces(it in arb_item(), q in 0i64..=1_000_000) {
                let q = Decimal::new(q, 0);
                let without = item(it.quantity, it.base_qty, it.multiplier, Decimal::ZERO);
                prop_assert!(
                    resolve_bom_requirement(&it, q).unwrap()
                        >= resolve_bom_requirement(&without, q).unwrap()
                );
            }
        }
    }
}
