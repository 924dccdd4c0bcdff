//! 批次／料卷子帳模型

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 批次狀態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LotStatus {
    /// 使用中
    Active,
    /// 已用罄
    Empty,
}

/// 批次／料卷
///
/// 品項現有庫存的可追溯子單位（散裝材料以重量計）。
/// 重量異動一律透過帳務交易進行，不在此直接修改。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lot {
    /// 批次ID
    pub id: String,

    /// 所屬物料ID
    pub item_id: String,

    /// 目前重量
    pub current_weight: Decimal,

    /// 供應商批號
    pub supplier_lot_no: Option<String>,

    /// 有效期限
    pub expiry: Option<NaiveDate>,

    /// 批次狀態
    pub status: LotStatus,
}

impl Lot {
    /// 創建新的批次
    pub fn new(id: String, item_id: String, current_weight: Decimal) -> Self {
        Self {
            id,
            item_id,
            current_weight,
            supplier_lot_no: None,
            expiry: None,
            status: LotStatus::Active,
        }
    }

    /// 建構器模式：設置供應商批號
    pub fn with_supplier_lot_no(mut self, supplier_lot_no: String) -> Self {
        self.supplier_lot_no = Some(supplier_lot_no);
        self
    }

    /// 建構器模式：設置有效期限
    pub fn with_expiry(mut self, expiry: NaiveDate) -> Self {
        self.expiry = Some(expiry);
        self
    }

    /// 檢查批次是否已用罄
    pub fn is_empty(&self) -> bool {
        self.status == LotStatus::Empty
    }

    /// 檢查批次於指定日期是否過期
    pub fn is_expired(&self, as_of: NaiveDate) -> bool {
        match self.expiry {
            Some(expiry) => as_of > expiry,
            None => false,
        }
    }
}
