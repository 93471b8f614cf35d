//! 价格与成本计算
//!
//! - 配方单位成本：Σ(用量 × 原料单价) ÷ 产出数量 + 每件附加成本
//! - 生产需求：按批次数放大每个配方的原料用量并按原料汇总
//! - 销售总额：Σ(数量 × 单价)
//!
//! 金额统一四舍五入到分。

use crate::errors::DaoError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum PricingError {
    #[error("产出数量必须大于 0")]
    NonPositiveYield,

    #[error("批次数必须大于 0")]
    NonPositiveBatches,

    #[error("用量不能为负数")]
    NegativeQuantity,
}

impl From<PricingError> for DaoError {
    fn from(err: PricingError) -> Self {
        DaoError::invalid(err.to_string())
    }
}

/// 配方中的一行原料
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostLine {
    pub quantity: f64,
    pub unit_cost: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UnitCost {
    /// 一批的原料成本
    pub batch_cost: f64,
    /// 每件的原料成本
    pub ingredients_per_unit: f64,
    /// 每件的附加成本（包装等）
    pub extras_per_unit: f64,
    /// 每件总成本
    pub unit_cost: f64,
}

pub fn round_money(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

/// 计算配方单位成本
pub fn recipe_unit_cost(
    lines: &[CostLine],
    extras: &[f64],
    yield_units: f64,
) -> Result<UnitCost, PricingError> {
    if yield_units <= 0.0 {
        return Err(PricingError::NonPositiveYield);
    }
    if lines.iter().any(|l| l.quantity < 0.0) {
        return Err(PricingError::NegativeQuantity);
    }

    let batch_cost: f64 = lines.iter().map(|l| l.quantity * l.unit_cost).sum();
    let ingredients_per_unit = batch_cost / yield_units;
    let extras_per_unit: f64 = extras.iter().sum();

    Ok(UnitCost {
        batch_cost: round_money(batch_cost),
        ingredients_per_unit: round_money(ingredients_per_unit),
        extras_per_unit: round_money(extras_per_unit),
        unit_cost: round_money(ingredients_per_unit + extras_per_unit),
    })
}

/// 一次生产中某个配方的用量
#[derive(Debug, Clone, PartialEq)]
pub struct ProductionRun<'a> {
    pub batches: f64,
    /// (原料 ID, 每批用量)
    pub items: &'a [(i64, f64)],
}

/// 汇总生产所需原料：原料 ID -> 总用量
pub fn production_requirements(runs: &[ProductionRun<'_>]) -> Result<BTreeMap<i64, f64>, PricingError> {
    let mut totals = BTreeMap::new();
    for run in runs {
        if run.batches <= 0.0 {
            return Err(PricingError::NonPositiveBatches);
        }
        for (ingredient_id, quantity) in run.items {
            if *quantity < 0.0 {
                return Err(PricingError::NegativeQuantity);
            }
            *totals.entry(*ingredient_id).or_insert(0.0) += quantity * run.batches;
        }
    }
    Ok(totals)
}

/// 销售总额：(数量, 单价)
pub fn sale_total(lines: &[(i64, f64)]) -> f64 {
    round_money(
        lines
            .iter()
            .map(|(quantity, price)| *quantity as f64 * price)
            .sum(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn unit_cost_divides_batch_by_yield_and_adds_extras() {
        let lines = [
            CostLine {
                quantity: 500.0,
                unit_cost: 0.01,
            },
            CostLine {
                quantity: 2.0,
                unit_cost: 1.5,
            },
        ];
        let cost = recipe_unit_cost(&lines, &[0.3, 0.2], 4.0).unwrap();
        assert_eq!(cost.batch_cost, 8.0);
        assert_eq!(cost.ingredients_per_unit, 2.0);
        assert_eq!(cost.extras_per_unit, 0.5);
        assert_eq!(cost.unit_cost, 2.5);
    }

    #[test]
    fn zero_yield_is_rejected() {
        assert_eq!(
            recipe_unit_cost(&[], &[], 0.0).unwrap_err(),
            PricingError::NonPositiveYield
        );
    }

    #[test]
    fn requirements_are_scaled_and_merged() {
        let flan = [(1, 200.0), (2, 3.0)];
        let cake = [(1, 100.0), (3, 1.0)];
        let totals = production_requirements(&[
            ProductionRun {
                batches: 2.0,
                items: &flan,
            },
            ProductionRun {
                batches: 1.5,
                items: &cake,
            },
        ])
        .unwrap();
        assert_eq!(totals[&1], 550.0);
        assert_eq!(totals[&2], 6.0);
        assert_eq!(totals[&3], 1.5);
    }

    #[test]
    fn sale_total_rounds_to_cents() {
        assert_eq!(sale_total(&[(3, 3.333), (1, 0.005)]), 10.0);
        assert_eq!(sale_total(&[]), 0.0);
    }

    proptest! {
        #[test]
        fn unit_cost_scales_inversely_with_yield(
            quantity in 0.0f64..1000.0,
            price in 0.0f64..10.0,
            yield_units in 1u32..50,
        ) {
            let lines = [CostLine { quantity, unit_cost: price }];
            let single = recipe_unit_cost(&lines, &[], 1.0).unwrap();
            let many = recipe_unit_cost(&lines, &[], yield_units as f64).unwrap();
            prop_assert!(many.unit_cost <= single.unit_cost + 0.005);
        }

        #[test]
        fn requirements_are_linear_in_batches(
            quantity in 0.0f64..500.0,
            batches in 1u32..20,
        ) {
            let items = [(1i64, quantity)];
            let totals = production_requirements(&[ProductionRun {
                batches: batches as f64,
                items: &items,
            }])
            .unwrap();
            prop_assert!((totals[&1] - quantity * batches as f64).abs() < 1e-9);
        }
    }
}
