//! 工單執行引擎
//!
//! 每張工單一把互斥鎖：同一工序不可能被並發開工兩次，
//! 不同工單（或不共用資源的工序）互不阻塞。
//! 庫存異動一律委派帳務引擎，鎖序固定為「工單鎖 → 物料鎖」。

use fab_core::{
    DemandRef, EngineError, MaterialIssue, ProductStructure, ProductionOrder,
    ProductionOrderStatus, Result,
};
use fab_ledger::{ConsumeRequest, InventoryLedger};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use uuid::Uuid;

use crate::machine;
use crate::release::ReleasePlanner;

/// 工單執行引擎
pub struct ExecutionEngine {
    ledger: Arc<InventoryLedger>,

    /// 產品結構主檔（唯讀來源，發放時快照）
    masters: RwLock<HashMap<String, ProductStructure>>,

    /// 工單競技場：每張工單一把互斥鎖
    orders: RwLock<HashMap<Uuid, Arc<Mutex<ProductionOrder>>>>,
}

impl ExecutionEngine {
    /// 創建新的執行引擎
    pub fn new(ledger: Arc<InventoryLedger>) -> Self {
        Self {
            ledger,
            masters: RwLock::new(HashMap::new()),
            orders: RwLock::new(HashMap::new()),
        }
    }

    /// 同步產品結構主檔
    ///
    /// 只影響之後發放的工單；已發放工單持有自己的快照。
    pub fn register_structure(&self, structure: ProductStructure) {
        let mut masters = self.masters.write().unwrap_or_else(|e| e.into_inner());
        masters.insert(structure.item_id.clone(), structure);
    }

    /// 建立工單（草稿）
    pub fn create_order(&self, item_id: &str, quantity: Decimal) -> Result<Uuid> {
        if quantity <= Decimal::ZERO {
            return Err(EngineError::InvalidQuantity(format!(
                "工單數量必須為正值，收到 {quantity}"
            )));
        }
        // 成品必須已登記於庫存帳
        let _ = self.ledger.item(item_id)?;

        let order = ProductionOrder::new(item_id.to_string(), quantity);
        let id = order.id;
        let mut orders = self.orders.write().unwrap_or_else(|e| e.into_inner());
        orders.insert(id, Arc::new(Mutex::new(order)));
        Ok(id)
    }

    /// 建立綁定銷售訂單明細的工單（按單生產）
    pub fn create_order_for_sales_line(
        &self,
        item_id: &str,
        quantity: Decimal,
        sales_order_id: Uuid,
        line_no: u32,
    ) -> Result<Uuid> {
        let id = self.create_order(item_id, quantity)?;
        let handle = self.order_handle(id)?;
        let mut order = handle.lock().unwrap_or_else(|e| e.into_inner());
        *order = order.clone().with_sales_line(sales_order_id, line_no);
        Ok(id)
    }

    /// 發放工單
    ///
    /// 快照 BOM／途程、展開工序、產生用料需求；
    /// 可立即滿足的需求直接保留庫存，不足的登記為待分配。
    pub fn release(&self, order_id: Uuid) -> Result<ProductionOrder> {
        let handle = self.order_handle(order_id)?;
        let mut order = handle.lock().unwrap_or_else(|e| e.into_inner());

        if order.cancelled || order.released {
            return Err(EngineError::InvalidTransition {
                entity: format!("工單 {order_id}"),
                from: order.derived_status(false).to_string(),
                action: "release".to_string(),
            });
        }

        let structure = {
            let masters = self.masters.read().unwrap_or_else(|e| e.into_inner());
            masters
                .get(&order.item_id)
                .cloned()
                .ok_or_else(|| EngineError::StructureNotFound(order.item_id.clone()))?
        };

        let mut component_uoms = HashMap::new();
        for line in &structure.bom {
            let item = self.ledger.item(&line.component_id)?;
            component_uoms.insert(line.component_id.clone(), item.uom);
        }

        let plan = ReleasePlanner::build(&structure, order.quantity, &component_uoms)?;
        let issue_seq = plan.issue_sequence().unwrap_or(0);

        // 保留全部用料成功後才碰工單；中途任何失敗把已保留的
        // 分配原路退回，發放要麼全有要麼全無
        let demand = DemandRef::OperationRequirement {
            order_id,
            operation_seq: issue_seq,
        };
        let mut requirement_ids = Vec::new();
        let mut short_items = 0usize;
        for (component_id, qty) in &plan.requirements {
            let reserved = match self.ledger.reserve(component_id, *qty, demand) {
                Ok(allocation) => Ok(allocation),
                Err(EngineError::Shortage { .. }) => {
                    short_items += 1;
                    self.ledger.record_requirement(component_id, *qty, demand)
                }
                Err(other) => Err(other),
            };
            match reserved {
                Ok(allocation) => requirement_ids.push(allocation.id),
                Err(err) => {
                    self.unwind_reservations(&requirement_ids);
                    return Err(err);
                }
            }
        }

        order.operations = plan.operations;
        order.bom_snapshot = structure.bom.clone();
        if let Some(op) = order.operation_mut(issue_seq) {
            op.requirements = requirement_ids;
        }
        order.released = true;

        tracing::info!(
            "發放工單 {}：{} × {}，用料 {} 項（其中 {} 項缺料待補）",
            order_id,
            order.item_id,
            order.quantity,
            plan.requirements.len(),
            short_items
        );
        Ok(order.clone())
    }

    /// 排程工序（pending → queued）
    pub fn schedule(&self, order_id: Uuid, sequence: u32) -> Result<()> {
        let handle = self.order_handle(order_id)?;
        let mut order = handle.lock().unwrap_or_else(|e| e.into_inner());
        self.guard_active(&order, order_id, "schedule")?;

        if !order.predecessors_done(sequence) {
            return Err(EngineError::InvalidTransition {
                entity: format!("工序 {sequence}"),
                from: "pending".to_string(),
                action: "schedule（前道工序未結束）".to_string(),
            });
        }

        let op = order
            .operation_mut(sequence)
            .ok_or(EngineError::OperationNotFound { order_id, sequence })?;
        machine::guard_schedule(op)?;
        op.status = fab_core::OperationStatus::Queued;
        Ok(())
    }

    /// 開工（queued → running）
    ///
    /// 任何用料需求未完全分配即拒絕，回報具體缺料清單
    /// 而不是籠統的失敗。
    pub fn start(&self, order_id: Uuid, sequence: u32, resource_id: &str) -> Result<()> {
        let handle = self.order_handle(order_id)?;
        let mut order = handle.lock().unwrap_or_else(|e| e.into_inner());
        self.guard_active(&order, order_id, "start")?;

        let requirement_ids = {
            let op = order
                .operation(sequence)
                .ok_or(EngineError::OperationNotFound { order_id, sequence })?;
            machine::guard_start(op)?;
            op.requirements.clone()
        };

        let mut issues = Vec::new();
        for allocation_id in &requirement_ids {
            // 供應可能已到但尚未補分配，先補一次再判定
            if self.ledger.try_allocate(*allocation_id)? {
                continue;
            }
            let allocation = self.ledger.allocation(*allocation_id)?;
            let available = self
                .ledger
                .item(&allocation.item_id)?
                .available()
                .max(Decimal::ZERO);
            issues.push(MaterialIssue {
                item_id: allocation.item_id.clone(),
                required: allocation.quantity,
                allocated: Decimal::ZERO,
                short_by: (allocation.quantity - available).max(Decimal::ZERO),
            });
        }
        if !issues.is_empty() {
            return Err(EngineError::Blocked { order_id, issues });
        }

        let op = order
            .operation_mut(sequence)
            .ok_or(EngineError::OperationNotFound { order_id, sequence })?;
        op.status = fab_core::OperationStatus::Running;
        op.resource_id = Some(resource_id.to_string());

        tracing::info!("開工：工單 {} 工序 {}（資源 {}）", order_id, sequence, resource_id);
        Ok(())
    }

    /// 完工（running → complete）
    ///
    /// 用料消耗與 `qty_good + qty_bad` 成正比（報廢一樣耗用投入）。
    /// 先全面驗證再一次套用：分配消耗、庫存扣帳、終態轉換
    /// 全部成功或全部不做。末道工序完工即整張工單完工，
    /// 否則下一道工序自動排入佇列。
    pub fn complete(
        &self,
        order_id: Uuid,
        sequence: u32,
        qty_good: Decimal,
        qty_bad: Decimal,
        scrap_reason: Option<&str>,
        actor: &str,
    ) -> Result<ProductionOrder> {
        let handle = self.order_handle(order_id)?;
        let mut order = handle.lock().unwrap_or_else(|e| e.into_inner());
        self.guard_active(&order, order_id, "complete")?;

        let (planned_quantity, requirement_ids) = {
            let op = order
                .operation(sequence)
                .ok_or(EngineError::OperationNotFound { order_id, sequence })?;
            machine::guard_complete(op)?;
            (op.planned_quantity, op.requirements.clone())
        };

        if qty_good < Decimal::ZERO || qty_bad < Decimal::ZERO {
            return Err(EngineError::InvalidQuantity(
                "完工與報廢數量不可為負值".to_string(),
            ));
        }
        let total = qty_good + qty_bad;
        if total > planned_quantity {
            return Err(EngineError::QuantityExceedsPlan {
                planned: planned_quantity,
                reported: total,
            });
        }
        // 零完工只允許無投入的工序
        if total == Decimal::ZERO && !requirement_ids.is_empty() {
            return Err(EngineError::InvalidQuantity(
                "有用料的工序不可零完工".to_string(),
            ));
        }
        if qty_bad > Decimal::ZERO
            && scrap_reason.map(str::trim).unwrap_or("").is_empty()
        {
            return Err(EngineError::ReasonRequired {
                target: format!("工序 {sequence} 報廢"),
            });
        }

        // 用料與回報數量成正比；末道全數完工時恰好耗掉整筆分配
        let mut consumptions = Vec::new();
        for allocation_id in &requirement_ids {
            let allocation = self.ledger.allocation(*allocation_id)?;
            let used = allocation.quantity * total / planned_quantity;
            let good_share = if total == Decimal::ZERO {
                Decimal::ZERO
            } else {
                used * qty_good / total
            };
            consumptions.push(ConsumeRequest {
                allocation_id: *allocation_id,
                qty_good: good_share,
                qty_scrap: used - good_share,
            });
        }

        // 整批領料在帳務引擎的單一臨界區內驗證並套用：
        // 任何一筆不過，整批拒絕，工序維持 running
        self.ledger.consume_batch(&consumptions, actor)?;

        let op = order
            .operation_mut(sequence)
            .ok_or(EngineError::OperationNotFound { order_id, sequence })?;
        op.quantity_completed = qty_good;
        op.quantity_scrapped = qty_bad;
        if let Some(reason) = scrap_reason {
            if !reason.trim().is_empty() {
                op.scrap_reason = Some(reason.to_string());
            }
        }
        op.status = fab_core::OperationStatus::Complete;

        self.queue_next(&mut order);

        tracing::info!(
            "完工：工單 {} 工序 {}（良品 {}，報廢 {}）",
            order_id,
            sequence,
            qty_good,
            qty_bad
        );
        Ok(order.clone())
    }

    /// 回報實際工時
    pub fn record_actual_times(
        &self,
        order_id: Uuid,
        sequence: u32,
        setup_minutes: Decimal,
        run_minutes: Decimal,
    ) -> Result<()> {
        let handle = self.order_handle(order_id)?;
        let mut order = handle.lock().unwrap_or_else(|e| e.into_inner());
        let op = order
            .operation_mut(sequence)
            .ok_or(EngineError::OperationNotFound { order_id, sequence })?;
        op.actual_setup_minutes = Some(setup_minutes);
        op.actual_run_minutes = Some(run_minutes);
        Ok(())
    }

    /// 跳過工序
    ///
    /// 未消耗的分配全數反轉退回可用庫存，原因逐字記入工序備註。
    pub fn skip(&self, order_id: Uuid, sequence: u32, reason: &str) -> Result<()> {
        let handle = self.order_handle(order_id)?;
        let mut order = handle.lock().unwrap_or_else(|e| e.into_inner());
        self.guard_active(&order, order_id, "skip")?;

        let requirement_ids = {
            let op = order
                .operation(sequence)
                .ok_or(EngineError::OperationNotFound { order_id, sequence })?;
            machine::guard_skip(op, reason)?;
            op.requirements.clone()
        };

        let mut touched_items = Vec::new();
        for allocation_id in requirement_ids {
            let allocation = self.ledger.allocation(allocation_id)?;
            self.ledger.release_allocation(allocation_id)?;
            touched_items.push(allocation.item_id);
        }
        // 退回的庫存可能解開其他工單的待分配需求
        for item_id in touched_items {
            self.ledger.promote_pending(&item_id)?;
        }

        let op = order
            .operation_mut(sequence)
            .ok_or(EngineError::OperationNotFound { order_id, sequence })?;
        if !reason.is_empty() {
            op.add_note(reason.to_string());
        }
        op.status = fab_core::OperationStatus::Skipped;

        self.queue_next(&mut order);

        tracing::info!("跳過：工單 {} 工序 {}（{}）", order_id, sequence, reason);
        Ok(())
    }

    /// 暫停工單
    pub fn hold(&self, order_id: Uuid) -> Result<()> {
        let handle = self.order_handle(order_id)?;
        let mut order = handle.lock().unwrap_or_else(|e| e.into_inner());
        if order.cancelled {
            return Err(EngineError::InvalidTransition {
                entity: format!("工單 {order_id}"),
                from: "cancelled".to_string(),
                action: "hold".to_string(),
            });
        }
        order.on_hold = true;
        Ok(())
    }

    /// 恢復工單
    pub fn resume(&self, order_id: Uuid) -> Result<()> {
        let handle = self.order_handle(order_id)?;
        let mut order = handle.lock().unwrap_or_else(|e| e.into_inner());
        if order.cancelled {
            return Err(EngineError::InvalidTransition {
                entity: format!("工單 {order_id}"),
                from: "cancelled".to_string(),
                action: "resume".to_string(),
            });
        }
        order.on_hold = false;
        Ok(())
    }

    /// 取消工單
    ///
    /// 未結案的分配全數反轉；執行中的工單不可直接取消。
    pub fn cancel(&self, order_id: Uuid, reason: &str) -> Result<()> {
        let handle = self.order_handle(order_id)?;
        let mut order = handle.lock().unwrap_or_else(|e| e.into_inner());

        let any_running = order
            .operations
            .iter()
            .any(|op| op.status == fab_core::OperationStatus::Running);
        if order.cancelled || any_running {
            return Err(EngineError::InvalidTransition {
                entity: format!("工單 {order_id}"),
                from: order.derived_status(false).to_string(),
                action: "cancel".to_string(),
            });
        }

        let mut touched_items = Vec::new();
        for allocation in self.ledger.allocations_for_order(order_id) {
            if allocation.is_open() {
                self.ledger.release_allocation(allocation.id)?;
                touched_items.push(allocation.item_id);
            }
        }
        for item_id in touched_items {
            self.ledger.promote_pending(&item_id)?;
        }

        order.cancelled = true;
        tracing::info!("取消工單 {}（{}）", order_id, reason);
        Ok(())
    }

    /// 工單複本
    pub fn order(&self, order_id: Uuid) -> Result<ProductionOrder> {
        let handle = self.order_handle(order_id)?;
        let order = handle.lock().unwrap_or_else(|e| e.into_inner());
        Ok(order.clone())
    }

    /// 全部工單複本（讀取端投影的輸入）
    pub fn orders_view(&self) -> HashMap<Uuid, ProductionOrder> {
        let handles: Vec<Arc<Mutex<ProductionOrder>>> = {
            let orders = self.orders.read().unwrap_or_else(|e| e.into_inner());
            orders.values().cloned().collect()
        };
        handles
            .into_iter()
            .map(|handle| {
                let order = handle.lock().unwrap_or_else(|e| e.into_inner());
                (order.id, order.clone())
            })
            .collect()
    }

    /// 推導工單狀態（缺料事實取自帳務引擎）
    pub fn status(&self, order_id: Uuid) -> Result<ProductionOrderStatus> {
        let order = self.order(order_id)?;
        let has_shortage = self
            .ledger
            .allocations_for_order(order_id)
            .iter()
            .any(|a| a.is_pending());
        Ok(order.derived_status(has_shortage))
    }

    /// 帳務引擎
    pub fn ledger(&self) -> &Arc<InventoryLedger> {
        &self.ledger
    }

    /// 發放中途失敗時退回已保留的分配
    fn unwind_reservations(&self, allocation_ids: &[Uuid]) {
        for id in allocation_ids {
            if let Err(err) = self.ledger.release_allocation(*id) {
                tracing::warn!("退回發放分配 {} 失敗：{}", id, err);
            }
        }
    }

    fn order_handle(&self, order_id: Uuid) -> Result<Arc<Mutex<ProductionOrder>>> {
        let orders = self.orders.read().unwrap_or_else(|e| e.into_inner());
        orders
            .get(&order_id)
            .cloned()
            .ok_or(EngineError::OrderNotFound(order_id))
    }

    fn guard_active(
        &self,
        order: &ProductionOrder,
        order_id: Uuid,
        action: &str,
    ) -> Result<()> {
        if order.cancelled || order.on_hold || !order.released {
            return Err(EngineError::InvalidTransition {
                entity: format!("工單 {order_id}"),
                from: order.derived_status(false).to_string(),
                action: action.to_string(),
            });
        }
        Ok(())
    }

    /// 前道結束後，下一道待排程工序自動排入佇列
    fn queue_next(&self, order: &mut ProductionOrder) {
        if let Some(next_seq) = order.next_open_sequence() {
            if order.predecessors_done(next_seq) {
                if let Some(next) = order.operation_mut(next_seq) {
                    if next.status.can_schedule() {
                        next.status = fab_core::OperationStatus::Queued;
                    }
                }
            }
        }
    }
}
