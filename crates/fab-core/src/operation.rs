//! 工序模型

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::bom::OperationTemplate;

/// 工序狀態
///
/// 合法轉換：
/// ```text
/// pending --schedule--> queued --start--> running --complete--> complete
/// pending/queued ------skip-----------------------------------> skipped
/// running -------------skip（必須附原因）----------------------> skipped
/// ```
/// `complete` 與 `skipped` 為終態，不可再轉出。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationStatus {
    /// 待排程
    Pending,
    /// 已排入佇列
    Queued,
    /// 執行中
    Running,
    /// 已完工
    Complete,
    /// 已跳過
    Skipped,
}

impl OperationStatus {
    /// 檢查是否為終態
    pub fn is_terminal(&self) -> bool {
        matches!(self, OperationStatus::Complete | OperationStatus::Skipped)
    }

    /// 檢查可否排程
    pub fn can_schedule(&self) -> bool {
        *self == OperationStatus::Pending
    }

    /// 檢查可否開工
    pub fn can_start(&self) -> bool {
        *self == OperationStatus::Queued
    }

    /// 檢查可否完工
    pub fn can_complete(&self) -> bool {
        *self == OperationStatus::Running
    }

    /// 檢查可否跳過
    pub fn can_skip(&self) -> bool {
        matches!(
            self,
            OperationStatus::Pending | OperationStatus::Queued | OperationStatus::Running
        )
    }
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            OperationStatus::Pending => "pending",
            OperationStatus::Queued => "queued",
            OperationStatus::Running => "running",
            OperationStatus::Complete => "complete",
            OperationStatus::Skipped => "skipped",
        };
        write!(f, "{label}")
    }
}

/// 工序
///
/// 由工單獨占持有，不在工單之間共享。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Operation {
    /// 工序序號
    pub sequence: u32,

    /// 工作中心
    pub work_center: String,

    /// 工序狀態
    pub status: OperationStatus,

    /// 計劃換線工時（分鐘）
    pub planned_setup_minutes: Decimal,

    /// 計劃運轉工時（分鐘）
    pub planned_run_minutes: Decimal,

    /// 實際換線工時（分鐘）
    pub actual_setup_minutes: Option<Decimal>,

    /// 實際運轉工時（分鐘）
    pub actual_run_minutes: Option<Decimal>,

    /// 計劃數量
    pub planned_quantity: Decimal,

    /// 完工數量
    pub quantity_completed: Decimal,

    /// 報廢數量
    pub quantity_scrapped: Decimal,

    /// 報廢原因（報廢數量 > 0 時必填）
    pub scrap_reason: Option<String>,

    /// 用料需求（分配記錄ID）
    pub requirements: Vec<Uuid>,

    /// 實際執行的資源/機台
    pub resource_id: Option<String>,

    /// 備註（跳過原因等，逐字記錄）
    pub notes: Vec<String>,
}

impl Operation {
    /// 從工序範本創建工序
    pub fn from_template(template: &OperationTemplate, planned_quantity: Decimal) -> Self {
        Self {
            sequence: template.sequence,
            work_center: template.work_center.clone(),
            status: OperationStatus::Pending,
            planned_setup_minutes: template.setup_minutes,
            planned_run_minutes: template.run_minutes * planned_quantity,
            actual_setup_minutes: None,
            actual_run_minutes: None,
            planned_quantity,
            quantity_completed: Decimal::ZERO,
            quantity_scrapped: Decimal::ZERO,
            scrap_reason: None,
            requirements: Vec::new(),
            resource_id: None,
            notes: Vec::new(),
        }
    }

    /// 檢查是否為終態
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// 添加備註
    pub fn add_note(&mut self, note: String) {
        self.notes.push(note);
    }
}
