//! 銷售訂單模型

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// 出貨就緒狀態（聚合分類，一律即時重算，不保存）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FulfillmentState {
    /// 全部明細就緒
    ReadyToShip,
    /// 部分明細就緒
    PartiallyReady,
    /// 無明細就緒且尚未出貨
    Blocked,
    /// 已出貨（終態，由出貨協作者設定）
    Shipped,
    /// 已取消（終態）
    Cancelled,
}

impl fmt::Display for FulfillmentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FulfillmentState::ReadyToShip => "ready_to_ship",
            FulfillmentState::PartiallyReady => "partially_ready",
            FulfillmentState::Blocked => "blocked",
            FulfillmentState::Shipped => "shipped",
            FulfillmentState::Cancelled => "cancelled",
        };
        write!(f, "{label}")
    }
}

/// 銷售訂單明細
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SalesOrderLine {
    /// 明細行號
    pub line_no: u32,

    /// 物料ID
    pub item_id: String,

    /// 訂購數量
    pub quantity: Decimal,

    /// 已出貨數量
    pub quantity_shipped: Decimal,

    /// 綁定的工單（按單生產時；現貨直出為 None）
    pub production_order: Option<Uuid>,
}

impl SalesOrderLine {
    /// 創建新的明細
    pub fn new(line_no: u32, item_id: String, quantity: Decimal) -> Self {
        Self {
            line_no,
            item_id,
            quantity,
            quantity_shipped: Decimal::ZERO,
            production_order: None,
        }
    }

    /// 建構器模式：綁定工單
    pub fn with_production_order(mut self, order_id: Uuid) -> Self {
        self.production_order = Some(order_id);
        self
    }

    /// 未出貨餘量
    pub fn quantity_remaining(&self) -> Decimal {
        self.quantity - self.quantity_shipped
    }
}

/// 銷售訂單
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SalesOrder {
    /// 訂單ID
    pub id: Uuid,

    /// 客戶ID
    pub customer_id: String,

    /// 訂單明細
    pub lines: Vec<SalesOrderLine>,

    /// 是否已出貨（由出貨協作者設定）
    pub shipped: bool,

    /// 是否已取消
    pub cancelled: bool,
}

impl SalesOrder {
    /// 創建新的銷售訂單
    pub fn new(customer_id: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            customer_id,
            lines: Vec::new(),
            shipped: false,
            cancelled: false,
        }
    }

    /// 建構器模式：添加明細
    pub fn with_line(mut self, line: SalesOrderLine) -> Self {
        self.lines.push(line);
        self
    }

    /// 依行號查找明細
    pub fn line(&self, line_no: u32) -> Option<&SalesOrderLine> {
        self.lines.iter().find(|l| l.line_no == line_no)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_quantity_remaining() {
        let mut line = SalesOrderLine::new(1, "GEARBOX-001".to_string(), Decimal::from(8));
        assert_eq!(line.quantity_remaining(), Decimal::from(8));

        line.quantity_shipped = Decimal::from(3);
        assert_eq!(line.quantity_remaining(), Decimal::from(5));
    }

    #[test]
    fn test_sales_order_builder() {
        let po_id = Uuid::new_v4();
        let order = SalesOrder::new("CUST-001".to_string())
            .with_line(
                SalesOrderLine::new(1, "GEARBOX-001".to_string(), Decimal::from(8))
                    .with_production_order(po_id),
            )
            .with_line(SalesOrderLine::new(2, "BOLT-001".to_string(), Decimal::from(200)));

        assert_eq!(order.lines.len(), 2);
        assert_eq!(order.line(1).unwrap().production_order, Some(po_id));
        assert_eq!(order.line(2).unwrap().production_order, None);
    }
}
