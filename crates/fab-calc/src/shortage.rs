//! 需求追溯與缺料分析
//!
//! 供需比較口徑：某物料的累計需求 = 全部未結案分配
//! （含已鎖定與待分配），供給 = 現有庫存 + 在途。
//! 缺口 = max(0, 需求 - 供給)，等價於「待分配 - max(可用, 0) - 在途」。

use fab_core::{Allocation, AllocationStatus, DemandRef};
use fab_ledger::LedgerSnapshot;
use rayon::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 單一物料的缺料報告
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShortageReport {
    /// 物料ID
    pub item_id: String,

    /// 缺口數量（零表示無缺料）
    pub short_qty: Decimal,

    /// 未結案需求合計
    pub open_demand: Decimal,

    /// 可用庫存（缺料時可為負值，原樣呈現）
    pub available: Decimal,

    /// 在途數量
    pub incoming: Decimal,

    /// 被缺口擋住的需求來源（依登記順序）
    pub blocking_demand_refs: Vec<DemandRef>,
}

impl ShortageReport {
    /// 是否存在缺口
    pub fn is_short(&self) -> bool {
        self.short_qty > Decimal::ZERO
    }
}

/// 單一物料的需求彙總（物料視角的完整追溯）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemandSummary {
    /// 物料ID
    pub item_id: String,

    /// 現有庫存
    pub on_hand: Decimal,

    /// 已分配數量
    pub allocated: Decimal,

    /// 可用庫存
    pub available: Decimal,

    /// 在途數量
    pub incoming: Decimal,

    /// 是否低於再訂購點
    pub below_reorder_point: bool,

    /// 未結案分配（依登記順序，誰佔著這些料一目了然）
    pub open_allocations: Vec<Allocation>,

    /// 缺料報告
    pub shortage: ShortageReport,
}

/// 計算單一物料的缺料報告
///
/// 找不到的物料視為零庫存零需求（缺口為零）。
pub fn shortage_for(snapshot: &LedgerSnapshot, item_id: &str) -> ShortageReport {
    let open: Vec<&Allocation> = snapshot.open_allocations_for_item(item_id);
    let open_demand: Decimal = open.iter().map(|a| a.quantity).sum();
    let available = snapshot.available(item_id);
    let incoming = snapshot.incoming(item_id);

    let on_hand = snapshot
        .item(item_id)
        .map(|item| item.on_hand)
        .unwrap_or(Decimal::ZERO);
    let short_qty = (open_demand - (on_hand + incoming)).max(Decimal::ZERO);

    // 已鎖定的分配不被缺口擋住，待分配的才是
    let blocking_demand_refs = if short_qty > Decimal::ZERO {
        open.iter()
            .filter(|a| a.status == AllocationStatus::Pending)
            .map(|a| a.demand)
            .collect()
    } else {
        Vec::new()
    };

    ShortageReport {
        item_id: item_id.to_string(),
        short_qty,
        open_demand,
        available,
        incoming,
        blocking_demand_refs,
    }
}

/// 物料需求彙總
pub fn demand_summary(snapshot: &LedgerSnapshot, item_id: &str) -> DemandSummary {
    let item = snapshot.item(item_id);
    DemandSummary {
        item_id: item_id.to_string(),
        on_hand: item.map(|i| i.on_hand).unwrap_or(Decimal::ZERO),
        allocated: item.map(|i| i.allocated).unwrap_or(Decimal::ZERO),
        available: snapshot.available(item_id),
        incoming: snapshot.incoming(item_id),
        below_reorder_point: item.map(|i| i.is_below_reorder_point()).unwrap_or(false),
        open_allocations: snapshot
            .open_allocations_for_item(item_id)
            .into_iter()
            .cloned()
            .collect(),
        shortage: shortage_for(snapshot, item_id),
    }
}

/// 全品項缺料總覽（只列有缺口的物料，依物料ID排序）
pub fn shortage_overview(snapshot: &LedgerSnapshot) -> Vec<ShortageReport> {
    let mut reports: Vec<ShortageReport> = snapshot
        .items
        .par_iter()
        .map(|(item_id, _)| shortage_for(snapshot, item_id))
        .filter(ShortageReport::is_short)
        .collect();
    reports.sort_by(|a, b| a.item_id.cmp(&b.item_id));
    reports
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use fab_core::{Item, UnitOfMeasure};
    use std::collections::HashMap;
    use uuid::Uuid;

    fn snapshot_with(items: Vec<Item>, allocations: Vec<Allocation>) -> LedgerSnapshot {
        LedgerSnapshot {
            taken_at: Utc::now(),
            items: items.into_iter().map(|i| (i.id.clone(), i)).collect(),
            lots: Vec::new(),
            allocations,
        }
    }

    fn pending(item_id: &str, qty: Decimal, order_id: Uuid) -> Allocation {
        Allocation::new(
            item_id.to_string(),
            qty,
            DemandRef::OperationRequirement {
                order_id,
                operation_seq: 10,
            },
        )
    }

    #[test]
    fn test_no_shortage_when_supply_covers_demand() {
        let mut steel = Item::new(
            "STEEL-001".to_string(),
            "鋼材".to_string(),
            UnitOfMeasure::Kilogram,
        )
        .with_on_hand(Decimal::from(100));
        steel.allocated = Decimal::new(105, 1);

        let mut allocation = pending("STEEL-001", Decimal::new(105, 1), Uuid::new_v4());
        allocation.status = AllocationStatus::Allocated;

        let snapshot = snapshot_with(vec![steel], vec![allocation]);
        let report = shortage_for(&snapshot, "STEEL-001");

        assert!(!report.is_short());
        assert!(report.blocking_demand_refs.is_empty());
    }

    #[test]
    fn test_shortage_nets_incoming_supply() {
        // 需求 10.5，現有 4，在途 3：缺口 3.5
        let order_id = Uuid::new_v4();
        let steel = Item::new(
            "STEEL-001".to_string(),
            "鋼材".to_string(),
            UnitOfMeasure::Kilogram,
        )
        .with_on_hand(Decimal::from(4))
        .with_incoming(Decimal::from(3));

        let snapshot = snapshot_with(
            vec![steel],
            vec![pending("STEEL-001", Decimal::new(105, 1), order_id)],
        );
        let report = shortage_for(&snapshot, "STEEL-001");

        assert_eq!(report.short_qty, Decimal::new(35, 1));
        assert_eq!(report.open_demand, Decimal::new(105, 1));
        assert_eq!(
            report.blocking_demand_refs,
            vec![DemandRef::OperationRequirement {
                order_id,
                operation_seq: 10
            }]
        );
    }

    #[test]
    fn test_negative_available_is_surfaced() {
        // 分配後盤虧：on_hand 8 < allocated 10.5，可用為 -2.5
        let mut steel = Item::new(
            "STEEL-001".to_string(),
            "鋼材".to_string(),
            UnitOfMeasure::Kilogram,
        )
        .with_on_hand(Decimal::from(8));
        steel.allocated = Decimal::new(105, 1);

        let mut allocation = pending("STEEL-001", Decimal::new(105, 1), Uuid::new_v4());
        allocation.status = AllocationStatus::Allocated;

        let snapshot = snapshot_with(vec![steel], vec![allocation]);
        let report = shortage_for(&snapshot, "STEEL-001");

        assert_eq!(report.available, Decimal::new(-25, 1));
        assert_eq!(report.short_qty, Decimal::new(25, 1));
    }

    #[test]
    fn test_overview_sorted_and_filtered() {
        let short_a = Item::new("A-001".to_string(), "甲".to_string(), UnitOfMeasure::Each);
        let short_b = Item::new("B-001".to_string(), "乙".to_string(), UnitOfMeasure::Each);
        let healthy = Item::new("C-001".to_string(), "丙".to_string(), UnitOfMeasure::Each)
            .with_on_hand(Decimal::from(100));

        let snapshot = snapshot_with(
            vec![short_b, healthy, short_a],
            vec![
                pending("B-001", Decimal::from(5), Uuid::new_v4()),
                pending("A-001", Decimal::from(3), Uuid::new_v4()),
            ],
        );

        let overview = shortage_overview(&snapshot);
        assert_eq!(overview.len(), 2);
        assert_eq!(overview[0].item_id, "A-001");
        assert_eq!(overview[1].item_id, "B-001");
    }

    #[test]
    fn test_demand_summary_traces_allocations() {
        let mut steel = Item::new(
            "STEEL-001".to_string(),
            "鋼材".to_string(),
            UnitOfMeasure::Kilogram,
        )
        .with_on_hand(Decimal::from(20))
        .with_reorder_point(Decimal::from(50));
        steel.allocated = Decimal::from(8);

        let mut locked = pending("STEEL-001", Decimal::from(8), Uuid::new_v4());
        locked.status = AllocationStatus::Allocated;
        let waiting = pending("STEEL-001", Decimal::from(30), Uuid::new_v4());

        let snapshot = snapshot_with(vec![steel], vec![locked, waiting]);
        let summary = demand_summary(&snapshot, "STEEL-001");

        assert_eq!(summary.available, Decimal::from(12));
        assert_eq!(summary.open_allocations.len(), 2);
        assert!(summary.below_reorder_point);
        // 需求 38，供給 20：缺 18
        assert_eq!(summary.shortage.short_qty, Decimal::from(18));
    }
}
