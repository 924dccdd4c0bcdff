//! 帳務快照
//!
//! 讀取端投影（缺料分析、出貨就緒）一律以快照為輸入：
//! 投影本身不取鎖、不阻塞寫入端，代價是對進行中的寫入
//! 最終一致（可接受，投影每次呼叫都重算）。

use chrono::{DateTime, Utc};
use fab_core::{Allocation, Item, Lot};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// 帳務快照（取得當下的一致性複本）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    /// 快照時間
    pub taken_at: DateTime<Utc>,

    /// 品項帳
    pub items: HashMap<String, Item>,

    /// 批次子帳
    pub lots: Vec<Lot>,

    /// 全部分配記錄
    pub allocations: Vec<Allocation>,
}

impl LedgerSnapshot {
    /// 依ID查找品項
    pub fn item(&self, item_id: &str) -> Option<&Item> {
        self.items.get(item_id)
    }

    /// 品項可用庫存（不存在視為零）
    pub fn available(&self, item_id: &str) -> Decimal {
        self.items
            .get(item_id)
            .map(|item| item.available())
            .unwrap_or(Decimal::ZERO)
    }

    /// 品項在途數量（不存在視為零）
    pub fn incoming(&self, item_id: &str) -> Decimal {
        self.items
            .get(item_id)
            .map(|item| item.incoming)
            .unwrap_or(Decimal::ZERO)
    }

    /// 某物料的未結案分配
    pub fn open_allocations_for_item(&self, item_id: &str) -> Vec<&Allocation> {
        self.allocations
            .iter()
            .filter(|a| a.item_id == item_id && a.is_open())
            .collect()
    }

    /// 某物料的未結案需求合計
    pub fn open_demand_for_item(&self, item_id: &str) -> Decimal {
        self.open_allocations_for_item(item_id)
            .iter()
            .map(|a| a.quantity)
            .sum()
    }

    /// 某工單的分配記錄
    pub fn allocations_for_order(&self, order_id: Uuid) -> Vec<&Allocation> {
        self.allocations
            .iter()
            .filter(|a| a.demand.production_order_id() == Some(order_id))
            .collect()
    }

    /// 某工單是否仍有待分配需求（缺料事實）
    pub fn order_has_pending_requirement(&self, order_id: Uuid) -> bool {
        self.allocations_for_order(order_id)
            .iter()
            .any(|a| a.is_pending())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fab_core::{DemandRef, UnitOfMeasure};

    #[test]
    fn test_snapshot_lookups() {
        let order_id = Uuid::new_v4();
        let mut items = HashMap::new();
        let mut steel = Item::new(
            "STEEL-001".to_string(),
            "鋼材".to_string(),
            UnitOfMeasure::Kilogram,
        )
        .with_on_hand(Decimal::from(100))
        .with_incoming(Decimal::from(30));
        steel.allocated = Decimal::from(60);
        items.insert(steel.id.clone(), steel);

        let mut allocation = Allocation::new(
            "STEEL-001".to_string(),
            Decimal::from(60),
            DemandRef::OperationRequirement {
                order_id,
                operation_seq: 10,
            },
        );
        allocation.status = fab_core::AllocationStatus::Allocated;

        let snapshot = LedgerSnapshot {
            taken_at: Utc::now(),
            items,
            lots: Vec::new(),
            allocations: vec![allocation],
        };

        assert_eq!(snapshot.available("STEEL-001"), Decimal::from(40));
        assert_eq!(snapshot.incoming("STEEL-001"), Decimal::from(30));
        assert_eq!(snapshot.open_demand_for_item("STEEL-001"), Decimal::from(60));
        assert_eq!(snapshot.allocations_for_order(order_id).len(), 1);
        assert!(!snapshot.order_has_pending_requirement(order_id));

        // 不存在的物料視為零
        assert_eq!(snapshot.available("MISSING"), Decimal::ZERO);
    }
}
