//! BOM／途程快照模型
//!
//! 主檔資料在工單發放時讀取一次並快照到工單上，
//! 發放後修改主檔不得回溯影響已發放的工單。

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::item::UnitOfMeasure;

/// BOM 明細行
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BomLine {
    /// 子件物料ID
    pub component_id: String,

    /// 單位用量
    pub quantity_per: Decimal,

    /// 損耗率（預期報廢的加成比例）
    pub scrap_factor: Decimal,
}

impl BomLine {
    /// 創建新的 BOM 明細
    pub fn new(component_id: String, quantity_per: Decimal, scrap_factor: Decimal) -> Self {
        Self {
            component_id,
            quantity_per,
            scrap_factor,
        }
    }

    /// 計算工單需求量
    ///
    /// `required = quantity_per * order_qty * (1 + scrap_factor)`，
    /// 無條件進位到該物料的最小庫存單位。
    pub fn required_for(&self, order_qty: Decimal, uom: UnitOfMeasure) -> Decimal {
        let raw = self.quantity_per * order_qty * (Decimal::ONE + self.scrap_factor);
        uom.round_up(raw)
    }
}

/// 工序範本
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationTemplate {
    /// 工序序號
    pub sequence: u32,

    /// 工作中心
    pub work_center: String,

    /// 標準換線工時（分鐘）
    pub setup_minutes: Decimal,

    /// 標準運轉工時（分鐘／單位）
    pub run_minutes: Decimal,
}

impl OperationTemplate {
    /// 創建新的工序範本
    pub fn new(
        sequence: u32,
        work_center: String,
        setup_minutes: Decimal,
        run_minutes: Decimal,
    ) -> Self {
        Self {
            sequence,
            work_center,
            setup_minutes,
            run_minutes,
        }
    }
}

/// 產品結構（BOM + 途程）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductStructure {
    /// 成品物料ID
    pub item_id: String,

    /// BOM 明細
    pub bom: Vec<BomLine>,

    /// 途程（依工序序號排序）
    pub routing: Vec<OperationTemplate>,
}

impl ProductStructure {
    /// 創建新的產品結構
    pub fn new(item_id: String) -> Self {
        Self {
            item_id,
            bom: Vec::new(),
            routing: Vec::new(),
        }
    }

    /// 建構器模式：添加 BOM 明細
    pub fn with_bom_line(mut self, line: BomLine) -> Self {
        self.bom.push(line);
        self
    }

    /// 建構器模式：添加工序範本
    pub fn with_operation(mut self, template: OperationTemplate) -> Self {
        self.routing.push(template);
        self.routing.sort_by_key(|t| t.sequence);
        self
    }
}
