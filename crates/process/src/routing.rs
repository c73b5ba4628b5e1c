//! Routings (ordered operations) and routing-wide material requirements.

use std::collections::HashSet;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use mfgplan_core::{
    BomItemId, DomainError, DomainResult, Entity, MaterialId, PlantId, RoutingId,
    RoutingOperationId,
};

use crate::bom::{
    AlternateMaterial, BomError, BomItem, RoundingPolicy, resolve_bom_requirement_rounded,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoutingStatus {
    Planning,
    #[default]
    Active,
    Inactive,
}

/// One step of a routing, with the materials it consumes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingOperation {
    pub id: RoutingOperationId,
    pub step_num: i32,
    pub name: String,
    /// Part number of the semi-finished output of this step, if tracked.
    pub semi_part_num: Option<String>,
    #[serde(default)]
    pub bom_items: Vec<BomItem>,
}

impl Entity for RoutingOperation {
    type Id = RoutingOperationId;

    fn id(&self) -> Self::Id {
        self.id
    }
}

/// Manufacturing process of a product at a plant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Routing {
    pub id: RoutingId,
    pub product_part_num: String,
    pub plant_id: PlantId,
    pub version: String,
    #[serde(default)]
    pub status: RoutingStatus,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    pub operations: Vec<RoutingOperation>,
}

impl Routing {
    /// Operations in ascending `step_num`.
    pub fn steps(&self) -> Vec<&RoutingOperation> {
        let mut steps: Vec<&RoutingOperation> = self.operations.iter().collect();
        steps.sort_by_key(|op| op.step_num);
        steps
    }

    /// Every BOM item of every operation, in step order.
    pub fn bom_items(&self) -> impl Iterator<Item = (&RoutingOperation, &BomItem)> {
        self.steps()
            .into_iter()
            .flat_map(|op| op.bom_items.iter().map(move |item| (op, item)))
    }

    pub fn validate(&self) -> DomainResult<()> {
        if self.product_part_num.trim().is_empty() {
            return Err(DomainError::validation("product_part_num cannot be empty"));
        }
        if self.version.trim().is_empty() {
            return Err(DomainError::validation("version cannot be empty"));
        }

        let mut steps = HashSet::new();
        let mut op_ids = HashSet::new();
        let mut item_ids = HashSet::new();
        for op in &self.operations {
            if !steps.insert(op.step_num) {
                return Err(DomainError::validation(format!(
                    "duplicate step_num {}",
                    op.step_num
                )));
            }
            if !op_ids.insert(op.id) {
                return Err(DomainError::validation(format!("duplicate operation id {}", op.id)));
            }
            if op.name.trim().is_empty() {
                return Err(DomainError::validation(format!(
                    "operation {} has no name",
                    op.step_num
                )));
            }
            for item in &op.bom_items {
                if !item_ids.insert(item.id) {
                    return Err(DomainError::validation(format!(
                        "duplicate bom item id {}",
                        item.id
                    )));
                }
                item.validate()?;
            }
        }
        Ok(())
    }
}

impl Entity for Routing {
    type Id = RoutingId;

    fn id(&self) -> Self::Id {
        self.id
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Requirements
// ─────────────────────────────────────────────────────────────────────────────

/// Resolved consumption of one BOM item for an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MaterialRequirement {
    pub routing_op_id: RoutingOperationId,
    pub step_num: i32,
    pub bom_item_id: BomItemId,
    pub material_id: MaterialId,
    pub uom: String,
    pub required_qty: Decimal,
    /// Substitutes, most preferred first.
    pub alternates: Vec<AlternateMaterial>,
}

/// Requirement totals for one material in one unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MaterialTotal {
    pub material_id: MaterialId,
    pub uom: String,
    pub required_qty: Decimal,
    /// Number of BOM items contributing to the total.
    pub sources: usize,
}

/// Resolve every BOM item of `routing` for an order of `order_qty`.
///
/// Each operation is sized directly from the order quantity; scrap of an
/// upstream step does not inflate the output a downstream step must make.
pub fn resolve_routing_requirements(
    routing: &Routing,
    order_qty: Decimal,
    policy: RoundingPolicy,
) -> Result<Vec<MaterialRequirement>, BomError> {
    routing
        .bom_items()
        .map(|(op, item)| {
            let required_qty = resolve_bom_requirement_rounded(item, order_qty, policy)
                .map_err(|e| e.for_item(item.id))?;
            Ok(MaterialRequirement {
                routing_op_id: op.id,
                step_num: op.step_num,
                bom_item_id: item.id,
                material_id: item.material_id,
                uom: item.uom.clone(),
                required_qty,
                alternates: item.ranked_alternates(),
            })
        })
        .collect()
}

/// Total requirements per `(material, uom)`, in first-appearance order.
///
/// Units are opaque labels, so the same material in two units yields two rows.
pub fn summarize_by_material(
    requirements: &[MaterialRequirement],
) -> Result<Vec<MaterialTotal>, BomError> {
    let mut totals: Vec<MaterialTotal> = Vec::new();
    for req in requirements {
        match totals
            .iter_mut()
            .find(|t| t.material_id == req.material_id && t.uom == req.uom)
        {
            Some(total) => {
                total.required_qty = total
                    .required_qty
                    .checked_add(req.required_qty)
                    .ok_or_else(|| {
                        BomError::Overflow(format!("total for material {}", req.material_id))
                    })?;
                total.sources += 1;
            }
            None => totals.push(MaterialTotal {
                material_id: req.material_id,
                uom: req.uom.clone(),
                required_qty: req.required_qty,
                sources: 1,
            }),
        }
    }
    Ok(totals)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bom::RoundingMode;
    use rust_decimal_macros::dec;

    fn op(id: i64, step: i32, items: Vec<BomItem>) -> RoutingOperation {
        RoutingOperation {
            id: RoutingOperationId::new(id),
            step_num: step,
            name: format!("op-{step}"),
            semi_part_num: None,
            bom_items: items,
        }
    }

    fn bom(id: i64, material: i64, qty: Decimal, uom: &str) -> BomItem {
        BomItem::new(BomItemId::new(id), MaterialId::new(material), qty, uom)
    }

    fn routing(operations: Vec<RoutingOperation>) -> Routing {
        Routing {
            id: RoutingId::new(1),
            product_part_num: "PCB-100".into(),
            plant_id: PlantId::new(1),
            version: "A".into(),
            status: RoutingStatus::Active,
            is_default: true,
            operations,
        }
    }

    #[test]
    fn each_step_is_sized_from_the_order_quantity() {
        // Step 20 is declared first; output follows step order.
        let r = routing(vec![
            op(2, 20, vec![bom(3, 11, dec!(2), "pcs").with_scrap(dec!(0.5))]),
            op(1, 10, vec![
                bom(1, 10, dec!(0.8), "m2").with_scrap(dec!(0.08)),
                bom(2, 12, dec!(1), "g").per(dec!(4), "pcs"),
            ]),
        ]);

        let reqs = resolve_routing_requirements(
            &r,
            dec!(1000),
            RoundingPolicy::Scale { dp: 3, mode: RoundingMode::HalfUp },
        )
        .unwrap();

        let got: Vec<(i32, i64, Decimal)> = reqs
            .iter()
            .map(|q| (q.step_num, q.bom_item_id.get(), q.required_qty))
            .collect();
        assert_eq!(
            got,
            vec![
                (10, 1, dec!(869.565)),
                (10, 2, dec!(250)),
                // Not inflated by step 10's scrap.
                (20, 3, dec!(4000)),
            ]
        );
    }

    #[test]
    fn alternates_are_ranked() {
        let mut item = bom(1, 10, dec!(1), "pcs");
        item.alternates = vec![
            AlternateMaterial { material_id: MaterialId::new(30), priority: 5 },
            AlternateMaterial { material_id: MaterialId::new(31), priority: 1 },
        ];
        let reqs =
            resolve_routing_requirements(&routing(vec![op(1, 10, vec![item])]), dec!(1), RoundingPolicy::Exact)
                .unwrap();
        let ranked: Vec<i64> = reqs[0].alternates.iter().map(|a| a.material_id.get()).collect();
        assert_eq!(ranked, vec![31, 30]);
    }

    #[test]
    fn one_bad_item_fails_the_whole_routing() {
        let r = routing(vec![op(1, 10, vec![
            bom(1, 10, dec!(1), "pcs"),
            bom(7, 11, dec!(1), "pcs").per(Decimal::ZERO, "pcs"),
        ])]);

        let err = resolve_routing_requirements(&r, dec!(5), RoundingPolicy::Exact).unwrap_err();
        match err {
            BomError::InvalidBomConfiguration(msg) => assert!(msg.contains("bom item 7")),
            other => panic!("expected InvalidBomConfiguration, got {other:?}"),
        }
    }

    #[test]
    fn summary_groups_by_material_and_unit() {
        let r = routing(vec![
            op(1, 10, vec![bom(1, 10, dec!(1), "pcs"), bom(2, 11, dec!(2), "kg")]),
            op(2, 20, vec![bom(3, 10, dec!(3), "pcs"), bom(4, 10, dec!(1), "box")]),
        ]);
        let reqs = resolve_routing_requirements(&r, dec!(10), RoundingPolicy::Exact).unwrap();
        let totals = summarize_by_material(&reqs).unwrap();

        let got: Vec<(i64, &str, Decimal, usize)> = totals
            .iter()
            .map(|t| (t.material_id.get(), t.uom.as_str(), t.required_qty, t.sources))
            .collect();
        assert_eq!(
            got,
            vec![
                (10, "pcs", dec!(40), 2),
                (11, "kg", dec!(20), 1),
                (10, "box", dec!(10), 1),
            ]
        );
    }

    #[test]
    fn validation_catches_duplicate_steps_and_bad_items() {
        let dup = routing(vec![op(1, 10, vec![]), op(2, 10, vec![])]);
        assert!(dup.validate().is_err());

        let bad_item = routing(vec![op(1, 10, vec![bom(1, 1, dec!(1), "pcs").with_scrap(dec!(1))])]);
        assert!(bad_item.validate().is_err());

        assert!(routing(vec![op(1, 10, vec![bom(1, 1, dec!(1), "pcs")])]).validate().is_ok());
    }
}
