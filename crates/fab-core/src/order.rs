//! 工單模型

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::bom::BomLine;
use crate::operation::{Operation, OperationStatus};

/// 工單狀態（由工序狀態與物料可得性滾算推導，不獨立保存）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductionOrderStatus {
    /// 草稿
    Draft,
    /// 已發放
    Released,
    /// 生產中
    InProgress,
    /// 已完工
    Complete,
    /// 缺料
    Short,
    /// 暫停
    OnHold,
    /// 已取消
    Cancelled,
}

impl fmt::Display for ProductionOrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ProductionOrderStatus::Draft => "draft",
            ProductionOrderStatus::Released => "released",
            ProductionOrderStatus::InProgress => "in_progress",
            ProductionOrderStatus::Complete => "complete",
            ProductionOrderStatus::Short => "short",
            ProductionOrderStatus::OnHold => "on_hold",
            ProductionOrderStatus::Cancelled => "cancelled",
        };
        write!(f, "{label}")
    }
}

/// 銷售訂單明細參照
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesLineRef {
    /// 銷售訂單ID
    pub sales_order_id: Uuid,

    /// 明細行號
    pub line_no: u32,
}

/// 工單
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductionOrder {
    /// 工單ID
    pub id: Uuid,

    /// 成品物料ID
    pub item_id: String,

    /// 工單數量
    pub quantity: Decimal,

    /// 工序（依序號排序）
    pub operations: Vec<Operation>,

    /// 回溯的銷售訂單明細（按單生產時）
    pub sales_order_line: Option<SalesLineRef>,

    /// 發放時快照的 BOM 明細
    pub bom_snapshot: Vec<BomLine>,

    /// 是否已發放
    pub released: bool,

    /// 是否暫停
    pub on_hold: bool,

    /// 是否取消
    pub cancelled: bool,
}

impl ProductionOrder {
    /// 創建新的工單（草稿）
    pub fn new(item_id: String, quantity: Decimal) -> Self {
        Self {
            id: Uuid::new_v4(),
            item_id,
            quantity,
            operations: Vec::new(),
            sales_order_line: None,
            bom_snapshot: Vec::new(),
            released: false,
            on_hold: false,
            cancelled: false,
        }
    }

    /// 建構器模式：綁定銷售訂單明細
    pub fn with_sales_line(mut self, sales_order_id: Uuid, line_no: u32) -> Self {
        self.sales_order_line = Some(SalesLineRef {
            sales_order_id,
            line_no,
        });
        self
    }

    /// 依序號查找工序
    pub fn operation(&self, sequence: u32) -> Option<&Operation> {
        self.operations.iter().find(|op| op.sequence == sequence)
    }

    /// 依序號查找工序（可變）
    pub fn operation_mut(&mut self, sequence: u32) -> Option<&mut Operation> {
        self.operations
            .iter_mut()
            .find(|op| op.sequence == sequence)
    }

    /// 指定工序之前是否全部結束（完工或跳過）
    pub fn predecessors_done(&self, sequence: u32) -> bool {
        self.operations
            .iter()
            .filter(|op| op.sequence < sequence)
            .all(|op| op.is_terminal())
    }

    /// 下一個尚未結束的工序序號
    pub fn next_open_sequence(&self) -> Option<u32> {
        self.operations
            .iter()
            .find(|op| !op.is_terminal())
            .map(|op| op.sequence)
    }

    /// 是否全部工序都已結束
    pub fn all_operations_done(&self) -> bool {
        !self.operations.is_empty() && self.operations.iter().all(|op| op.is_terminal())
    }

    /// 推導工單狀態
    ///
    /// 滾算規則：取消/暫停為明確事實旗標，其餘由工序狀態
    /// 與呼叫端提供的缺料事實推導，不保存為獨立欄位。
    pub fn derived_status(&self, has_shortage: bool) -> ProductionOrderStatus {
        if self.cancelled {
            return ProductionOrderStatus::Cancelled;
        }
        if self.on_hold {
            return ProductionOrderStatus::OnHold;
        }
        if !self.released {
            return ProductionOrderStatus::Draft;
        }
        if self.all_operations_done() {
            return ProductionOrderStatus::Complete;
        }

        let any_progress = self.operations.iter().any(|op| {
            op.status == OperationStatus::Running
                || op.status == OperationStatus::Complete
                || op.quantity_completed > Decimal::ZERO
        });
        if any_progress {
            return ProductionOrderStatus::InProgress;
        }
        if has_shortage {
            return ProductionOrderStatus::Short;
        }
        ProductionOrderStatus::Released
    }
}
