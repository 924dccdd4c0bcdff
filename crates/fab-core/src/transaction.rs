//! 帳務交易與總帳過帳事件

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// 異動對象（品項帳或批次子帳）
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LedgerTarget {
    /// 品項
    Item(String),
    /// 批次／料卷
    Lot(String),
}

impl fmt::Display for LedgerTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedgerTarget::Item(id) => write!(f, "物料 {id}"),
            LedgerTarget::Lot(id) => write!(f, "批次 {id}"),
        }
    }
}

/// 帳務交易記錄
///
/// 每一次實體庫存變動恰好對應一筆交易。
/// `reason` 為必填欄位，是會計對帳唯一的稽核軌跡。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerTransaction {
    /// 交易ID
    pub id: Uuid,

    /// 異動對象
    pub target: LedgerTarget,

    /// 帶正負號的異動量
    pub delta: Decimal,

    /// 操作人
    pub actor: String,

    /// 交易時間
    pub timestamp: DateTime<Utc>,

    /// 異動原因（必填）
    pub reason: String,
}

impl LedgerTransaction {
    /// 創建新的交易記錄
    pub fn new(target: LedgerTarget, delta: Decimal, actor: String, reason: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            target,
            delta,
            actor,
            timestamp: Utc::now(),
            reason,
        }
    }
}

/// 總帳過帳事件
///
/// 交給外部過帳協作者的事件；借貸平衡由協作者保證，
/// 引擎只負責帶出數量、單位成本與參照。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlEvent {
    /// 來源交易ID（過帳冪等鍵）
    pub transaction_id: Uuid,

    /// 物料ID
    pub item_id: String,

    /// 數量異動
    pub quantity_delta: Decimal,

    /// 單位成本（標準成本）
    pub unit_cost: Decimal,

    /// 參照類型（如 adjustment / consumption / receipt）
    pub reference_type: String,

    /// 參照單據ID
    pub reference_id: String,

    /// 異動原因
    pub reason: String,
}

impl GlEvent {
    /// 創建新的過帳事件
    pub fn new(
        transaction_id: Uuid,
        item_id: String,
        quantity_delta: Decimal,
        unit_cost: Decimal,
        reference_type: String,
        reference_id: String,
        reason: String,
    ) -> Self {
        Self {
            transaction_id,
            item_id,
            quantity_delta,
            unit_cost,
            reference_type,
            reference_id,
            reason,
        }
    }

    /// 事件金額（數量 × 單位成本）
    pub fn value(&self) -> Decimal {
        self.quantity_delta * self.unit_cost
    }
}
