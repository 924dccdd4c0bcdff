//! 缺料解決方案排序
//!
//! 對缺料工單提出具體行動清單。排序規則固定：
//! 1. 不新增採購負擔的行動優先（催交既有採購單 > 開新採購單）
//! 2. 同類行動中，最早可得（承諾交期最早）優先
//! 3. 再同，淨新增訂購量最小優先
//! 同一輸入永遠產生同一排序，方便測試也方便現場信任。

use chrono::NaiveDate;
use fab_core::{MaterialIssue, ProductionOrder};
use fab_ledger::LedgerSnapshot;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 未結案採購單明細（採購協作者提供的視圖）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenPoLine {
    /// 採購單編號
    pub po_ref: String,

    /// 物料ID
    pub item_id: String,

    /// 未交數量
    pub open_qty: Decimal,

    /// 承諾交期
    pub promised_date: NaiveDate,
}

/// 採購側唯讀視圖
///
/// 解決方案排序只需要「這個物料有哪些未結案採購單」，
/// 採購模組的其餘細節一概不耦合。
pub trait PurchasingView {
    /// 某物料的未結案採購單明細
    fn open_po_lines(&self, item_id: &str) -> Vec<OpenPoLine>;
}

/// 建議行動
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResolutionAction {
    /// 催交既有採購單
    ExpeditePurchaseOrder {
        /// 採購單編號
        po_ref: String,
        /// 物料ID
        item_id: String,
        /// 該單未交數量
        open_qty: Decimal,
        /// 承諾交期
        promised_date: NaiveDate,
    },
    /// 開新採購單
    CreatePurchaseOrder {
        /// 物料ID
        item_id: String,
        /// 淨新增訂購量（扣除在途後的缺口）
        quantity: Decimal,
    },
}

/// 工單缺料判定結果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockingReport {
    /// 是否可以投產（無缺料）
    pub can_produce: bool,

    /// 缺料明細（依物料ID排序）
    pub material_issues: Vec<MaterialIssue>,

    /// 建議行動（依排序規則）
    pub resolution_actions: Vec<ResolutionAction>,
}

/// 判定工單可否投產，並對每項缺料提出排序後的行動
///
/// 快照上的純函數：同一快照與採購視圖重複呼叫，輸出逐位元一致。
pub fn blocking_issues(
    snapshot: &LedgerSnapshot,
    order: &ProductionOrder,
    purchasing: &dyn PurchasingView,
) -> BlockingReport {
    // 按物料彙總工單的未結案分配（BTreeMap 保證輸出順序穩定）
    let mut required: BTreeMap<String, Decimal> = BTreeMap::new();
    let mut locked: BTreeMap<String, Decimal> = BTreeMap::new();
    for allocation in snapshot.allocations_for_order(order.id) {
        if !allocation.is_open() {
            continue;
        }
        *required.entry(allocation.item_id.clone()).or_default() += allocation.quantity;
        if allocation.is_allocated() {
            *locked.entry(allocation.item_id.clone()).or_default() += allocation.quantity;
        }
    }

    let mut material_issues = Vec::new();
    let mut resolution_actions = Vec::new();

    for (item_id, required_qty) in &required {
        let allocated_qty = locked.get(item_id).copied().unwrap_or(Decimal::ZERO);
        let pending_qty = required_qty - allocated_qty;
        let coverable = snapshot.available(item_id).max(Decimal::ZERO);
        let shortfall = (pending_qty - coverable).max(Decimal::ZERO);
        if shortfall <= Decimal::ZERO {
            continue;
        }

        material_issues.push(MaterialIssue {
            item_id: item_id.clone(),
            required: *required_qty,
            allocated: allocated_qty,
            short_by: shortfall,
        });
        resolution_actions.extend(actions_for(purchasing, item_id, shortfall));
    }

    BlockingReport {
        can_produce: material_issues.is_empty(),
        material_issues,
        resolution_actions,
    }
}

/// 單一物料缺口的行動清單
///
/// 既有採購單即使只覆蓋部分缺口也先列催交；
/// 在途合計仍補不滿時，才在最後補一筆最小量的新採購單。
fn actions_for(
    purchasing: &dyn PurchasingView,
    item_id: &str,
    shortfall: Decimal,
) -> Vec<ResolutionAction> {
    let mut po_lines = purchasing.open_po_lines(item_id);
    po_lines.sort_by(|a, b| {
        a.promised_date
            .cmp(&b.promised_date)
            .then(b.open_qty.cmp(&a.open_qty))
            .then(a.po_ref.cmp(&b.po_ref))
    });

    let covered: Decimal = po_lines.iter().map(|line| line.open_qty).sum();
    let mut actions: Vec<ResolutionAction> = po_lines
        .into_iter()
        .map(|line| ResolutionAction::ExpeditePurchaseOrder {
            po_ref: line.po_ref,
            item_id: line.item_id,
            open_qty: line.open_qty,
            promised_date: line.promised_date,
        })
        .collect();

    let net_new = shortfall - covered;
    if net_new > Decimal::ZERO {
        actions.push(ResolutionAction::CreatePurchaseOrder {
            item_id: item_id.to_string(),
            quantity: net_new,
        });
    }
    actions
}
