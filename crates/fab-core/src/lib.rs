//! # Fab Core
//!
//! 核心資料模型與類型定義

pub mod allocation;
pub mod bom;
pub mod item;
pub mod lot;
pub mod operation;
pub mod order;
pub mod sales;
pub mod transaction;

// Re-export 主要類型
pub use allocation::{Allocation, AllocationStatus, DemandRef};
pub use bom::{BomLine, OperationTemplate, ProductStructure};
pub use item::{Item, UnitOfMeasure};
pub use lot::{Lot, LotStatus};
pub use operation::{Operation, OperationStatus};
pub use order::{ProductionOrder, ProductionOrderStatus, SalesLineRef};
pub use sales::{FulfillmentState, SalesOrder, SalesOrderLine};
pub use transaction::{GlEvent, LedgerTarget, LedgerTransaction};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 單項缺料明細
///
/// `Blocked` 錯誤與缺料報告共用的結構化明細，
/// 永遠帶出具體的物料與數量，不用籠統的錯誤字串。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialIssue {
    /// 物料ID
    pub item_id: String,

    /// 需求數量
    pub required: Decimal,

    /// 已分配數量
    pub allocated: Decimal,

    /// 缺口數量
    pub short_by: Decimal,
}

impl MaterialIssue {
    /// 創建新的缺料明細
    pub fn new(item_id: String, required: Decimal, allocated: Decimal) -> Self {
        let short_by = required - allocated;
        Self {
            item_id,
            required,
            allocated,
            short_by,
        }
    }
}

/// 引擎錯誤類型
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("庫存不足：物料 {item_id} 需求 {requested}，缺口 {short_by}")]
    Shortage {
        item_id: String,
        requested: Decimal,
        short_by: Decimal,
    },

    #[error("工單 {order_id} 前置條件未滿足，共 {} 項缺料", issues.len())]
    Blocked {
        order_id: Uuid,
        issues: Vec<MaterialIssue>,
    },

    #[error("非法狀態轉換：{entity} 目前為 {from}，不允許 {action}")]
    InvalidTransition {
        entity: String,
        from: String,
        action: String,
    },

    #[error("{target} 的異動缺少原因，拒絕執行")]
    ReasonRequired { target: String },

    #[error("找不到物料: {0}")]
    ItemNotFound(String),

    #[error("找不到批次/料卷: {0}")]
    LotNotFound(String),

    #[error("找不到分配記錄: {0}")]
    AllocationNotFound(Uuid),

    #[error("找不到工單: {0}")]
    OrderNotFound(Uuid),

    #[error("工單 {order_id} 沒有序號 {sequence} 的工序")]
    OperationNotFound { order_id: Uuid, sequence: u32 },

    #[error("找不到產品結構: {0}")]
    StructureNotFound(String),

    #[error("產品結構 {0} 沒有途程，無法發放")]
    EmptyRouting(String),

    #[error("分配記錄 {allocation_id} 已結案（{status}），不可再變動")]
    AllocationClosed { allocation_id: Uuid, status: String },

    #[error("回報數量超過計劃：計劃 {planned}，回報 {reported}")]
    QuantityExceedsPlan { planned: Decimal, reported: Decimal },

    #[error("無效的數量: {0}")]
    InvalidQuantity(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
