//! 庫存分配模型

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// 需求來源
///
/// 每筆分配恰好綁定一個需求來源：工單工序的用料需求，
/// 或（間接經由工單）銷售訂單明細。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DemandRef {
    /// 工單工序用料需求
    OperationRequirement {
        /// 工單ID
        order_id: Uuid,
        /// 工序序號
        operation_seq: u32,
    },
    /// 銷售訂單明細（現貨直出）
    SalesOrderLine {
        /// 銷售訂單ID
        order_id: Uuid,
        /// 明細行號
        line_no: u32,
    },
}

impl DemandRef {
    /// 若來源為工單工序，返回工單ID
    pub fn production_order_id(&self) -> Option<Uuid> {
        match self {
            DemandRef::OperationRequirement { order_id, .. } => Some(*order_id),
            DemandRef::SalesOrderLine { .. } => None,
        }
    }
}

impl fmt::Display for DemandRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DemandRef::OperationRequirement {
                order_id,
                operation_seq,
            } => write!(f, "工單 {order_id} 工序 {operation_seq}"),
            DemandRef::SalesOrderLine { order_id, line_no } => {
                write!(f, "銷售訂單 {order_id} 明細 {line_no}")
            }
        }
    }
}

/// 分配狀態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AllocationStatus {
    /// 待分配（需求已登記，庫存尚未鎖定）
    Pending,
    /// 已分配（庫存已鎖定）
    Allocated,
    /// 已消耗（工序完工領用，終態）
    Consumed,
}

impl fmt::Display for AllocationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AllocationStatus::Pending => "pending",
            AllocationStatus::Allocated => "allocated",
            AllocationStatus::Consumed => "consumed",
        };
        write!(f, "{label}")
    }
}

/// 分配記錄
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Allocation {
    /// 分配ID
    pub id: Uuid,

    /// 物料ID
    pub item_id: String,

    /// 分配數量
    pub quantity: Decimal,

    /// 需求來源
    pub demand: DemandRef,

    /// 分配狀態
    pub status: AllocationStatus,
}

impl Allocation {
    /// 創建新的分配記錄（初始為待分配）
    pub fn new(item_id: String, quantity: Decimal, demand: DemandRef) -> Self {
        Self {
            id: Uuid::new_v4(),
            item_id,
            quantity,
            demand,
            status: AllocationStatus::Pending,
        }
    }

    /// 檢查是否未結案（pending 或 allocated）
    pub fn is_open(&self) -> bool {
        self.status != AllocationStatus::Consumed
    }

    /// 檢查是否已鎖定庫存
    pub fn is_allocated(&self) -> bool {
        self.status == AllocationStatus::Allocated
    }

    /// 檢查是否仍待分配
    pub fn is_pending(&self) -> bool {
        self.status == AllocationStatus::Pending
    }
}
