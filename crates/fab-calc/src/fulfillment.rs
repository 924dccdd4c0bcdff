//! 出貨就緒滾算
//!
//! 銷售訂單的聚合狀態永遠從明細即時推導，不落地保存。
//! 已出貨/已取消是出貨協作者寫死的終態，不再重算。

use fab_core::{FulfillmentState, ProductionOrder, SalesOrder};
use fab_ledger::LedgerSnapshot;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// 單一明細的就緒判定
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineStatus {
    /// 明細行號
    pub line_no: u32,

    /// 物料ID
    pub item_id: String,

    /// 未出貨餘量
    pub quantity_remaining: Decimal,

    /// 是否就緒
    pub is_ready: bool,
}

/// 銷售訂單出貨就緒報告
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FulfillmentReport {
    /// 銷售訂單ID
    pub sales_order_id: Uuid,

    /// 聚合狀態
    pub state: FulfillmentState,

    /// 就緒明細百分比（整數，四捨五入）
    pub percent: u32,

    /// 逐明細判定
    pub lines: Vec<LineStatus>,
}

/// 滾算銷售訂單的出貨就緒狀態
///
/// 明細就緒 = 綁定的工單已完工，或現貨可用量足以覆蓋
/// 未出貨餘量且該物料沒有待分配需求在排隊。
/// 百分比取整為四捨五入（2/3 就緒報 67 不報 66）。
pub fn fulfillment_status(
    snapshot: &LedgerSnapshot,
    sales_order: &SalesOrder,
    production_orders: &HashMap<Uuid, ProductionOrder>,
) -> FulfillmentReport {
    if sales_order.shipped || sales_order.cancelled {
        let state = if sales_order.shipped {
            FulfillmentState::Shipped
        } else {
            FulfillmentState::Cancelled
        };
        let lines = sales_order
            .lines
            .iter()
            .map(|line| LineStatus {
                line_no: line.line_no,
                item_id: line.item_id.clone(),
                quantity_remaining: line.quantity_remaining(),
                is_ready: sales_order.shipped,
            })
            .collect();
        return FulfillmentReport {
            sales_order_id: sales_order.id,
            state,
            percent: if sales_order.shipped { 100 } else { 0 },
            lines,
        };
    }

    let lines: Vec<LineStatus> = sales_order
        .lines
        .iter()
        .map(|line| {
            let order_complete = line
                .production_order
                .and_then(|id| production_orders.get(&id))
                .map(|order| !order.cancelled && order.all_operations_done())
                .unwrap_or(false);

            let remaining = line.quantity_remaining();
            // 有待分配需求在排隊表示這批現貨已有人等著，不可再承諾
            let stock_covers = snapshot.available(&line.item_id) >= remaining
                && !snapshot
                    .allocations
                    .iter()
                    .any(|a| a.item_id == line.item_id && a.is_pending());

            LineStatus {
                line_no: line.line_no,
                item_id: line.item_id.clone(),
                quantity_remaining: remaining,
                is_ready: order_complete || stock_covers,
            }
        })
        .collect();

    let ready = lines.iter().filter(|l| l.is_ready).count();
    let state = if lines.is_empty() || ready == 0 {
        FulfillmentState::Blocked
    } else if ready == lines.len() {
        FulfillmentState::ReadyToShip
    } else {
        FulfillmentState::PartiallyReady
    };

    FulfillmentReport {
        sales_order_id: sales_order.id,
        state,
        percent: ready_percent(ready, lines.len()),
        lines,
    }
}

/// 就緒百分比，四捨五入到整數
fn ready_percent(ready: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    let percent = Decimal::from(100 * ready as u64) / Decimal::from(total as u64);
    percent
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_u32()
        .unwrap_or(0)
}
