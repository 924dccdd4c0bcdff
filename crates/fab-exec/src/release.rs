//! 工單發放計算
//!
//! 發放時讀取一次產品結構並快照到工單上：
//! 工序由途程範本展開，用料需求由 BOM 依工單量與損耗率放大，
//! 無條件進位到各物料的最小庫存單位。

use fab_core::{EngineError, Operation, ProductStructure, Result, UnitOfMeasure};
use rust_decimal::Decimal;
use std::collections::HashMap;

/// 發放計算結果
#[derive(Debug, Clone)]
pub struct ReleasePlan {
    /// 展開後的工序（依序號排序）
    pub operations: Vec<Operation>,

    /// 用料需求：(物料ID, 需求量)，依 BOM 行序
    pub requirements: Vec<(String, Decimal)>,
}

impl ReleasePlan {
    /// 用料掛載的工序序號（首道工序領料）
    pub fn issue_sequence(&self) -> Option<u32> {
        self.operations.first().map(|op| op.sequence)
    }
}

/// 發放計算器
pub struct ReleasePlanner;

impl ReleasePlanner {
    /// 依產品結構展開工序與用料需求
    ///
    /// `required = quantity_per * order_qty * (1 + scrap_factor)`，
    /// 進位到物料最小庫存單位。所有用料掛在首道工序。
    pub fn build(
        structure: &ProductStructure,
        order_qty: Decimal,
        component_uoms: &HashMap<String, UnitOfMeasure>,
    ) -> Result<ReleasePlan> {
        if order_qty <= Decimal::ZERO {
            return Err(EngineError::InvalidQuantity(format!(
                "工單數量必須為正值，收到 {order_qty}"
            )));
        }
        if structure.routing.is_empty() {
            return Err(EngineError::EmptyRouting(structure.item_id.clone()));
        }

        let operations: Vec<Operation> = structure
            .routing
            .iter()
            .map(|template| Operation::from_template(template, order_qty))
            .collect();

        let mut requirements = Vec::new();
        for line in &structure.bom {
            if line.quantity_per <= Decimal::ZERO {
                return Err(EngineError::InvalidQuantity(format!(
                    "BOM 行 {} 的單位用量必須為正值",
                    line.component_id
                )));
            }
            if line.scrap_factor < Decimal::ZERO {
                return Err(EngineError::InvalidQuantity(format!(
                    "BOM 行 {} 的損耗率不可為負值",
                    line.component_id
                )));
            }
            let uom = component_uoms
                .get(&line.component_id)
                .copied()
                .ok_or_else(|| EngineError::ItemNotFound(line.component_id.clone()))?;
            let required = line.required_for(order_qty, uom);
            if required <= Decimal::ZERO {
                return Err(EngineError::InvalidQuantity(format!(
                    "BOM 行 {} 展開後的需求量必須為正值，得到 {required}",
                    line.component_id
                )));
            }
            requirements.push((line.component_id.clone(), required));
        }

        Ok(ReleasePlan {
            operations,
            requirements,
        })
    }
}
