//! 庫存帳引擎
//!
//! 同一物料的 reserve / consume / adjust 以該物料的互斥鎖序列化，
//! 不同物料完全並行，整個引擎沒有全域鎖。
//! 鎖序固定為「物料鎖 → 分配存放區鎖」，避免交叉等待。

use fab_core::{
    Allocation, AllocationStatus, DemandRef, EngineError, GlEvent, Item, LedgerTarget,
    LedgerTransaction, Lot, LotStatus, Result,
};
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use uuid::Uuid;

use crate::outbox::GlOutbox;
use crate::snapshot::LedgerSnapshot;
use crate::store::AllocationStore;

/// 單一物料的帳戶（品項帳 + 批次子帳）
#[derive(Debug)]
struct ItemAccount {
    item: Item,
    lots: Vec<Lot>,
}

/// 批次領料的單筆請求
#[derive(Debug, Clone, Copy)]
pub struct ConsumeRequest {
    /// 分配ID
    pub allocation_id: Uuid,

    /// 良品領用量
    pub qty_good: Decimal,

    /// 報廢領用量
    pub qty_scrap: Decimal,
}

/// 庫存帳引擎
pub struct InventoryLedger {
    /// 物料帳戶競技場：每個物料一把互斥鎖
    accounts: RwLock<HashMap<String, Arc<Mutex<ItemAccount>>>>,

    /// 批次ID → 物料ID 索引
    lot_index: RwLock<HashMap<String, String>>,

    /// 分配記錄存放區
    store: RwLock<AllocationStore>,

    /// 帳務交易流水（僅追加）
    transactions: Mutex<Vec<LedgerTransaction>>,

    /// 總帳過帳 outbox
    outbox: GlOutbox,
}

impl Default for InventoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl InventoryLedger {
    /// 創建空的庫存帳
    pub fn new() -> Self {
        Self {
            accounts: RwLock::new(HashMap::new()),
            lot_index: RwLock::new(HashMap::new()),
            store: RwLock::new(AllocationStore::new()),
            transactions: Mutex::new(Vec::new()),
            outbox: GlOutbox::new(),
        }
    }

    /// 登記品項
    pub fn register_item(&self, item: Item) {
        let mut accounts = self.accounts.write().unwrap_or_else(|e| e.into_inner());
        accounts.insert(
            item.id.clone(),
            Arc::new(Mutex::new(ItemAccount {
                item,
                lots: Vec::new(),
            })),
        );
    }

    /// 登記批次／料卷（登記本身不改變現有庫存）
    pub fn register_lot(&self, lot: Lot) -> Result<()> {
        let handle = self.account(&lot.item_id)?;
        {
            let mut index = self.lot_index.write().unwrap_or_else(|e| e.into_inner());
            index.insert(lot.id.clone(), lot.item_id.clone());
        }
        let mut account = handle.lock().unwrap_or_else(|e| e.into_inner());
        account.lots.push(lot);
        Ok(())
    }

    /// 品項即時複本
    pub fn item(&self, item_id: &str) -> Result<Item> {
        let handle = self.account(item_id)?;
        let account = handle.lock().unwrap_or_else(|e| e.into_inner());
        Ok(account.item.clone())
    }

    /// 批次即時複本
    pub fn lot(&self, lot_id: &str) -> Result<Lot> {
        let item_id = self.lot_owner(lot_id)?;
        let handle = self.account(&item_id)?;
        let account = handle.lock().unwrap_or_else(|e| e.into_inner());
        account
            .lots
            .iter()
            .find(|l| l.id == lot_id)
            .cloned()
            .ok_or_else(|| EngineError::LotNotFound(lot_id.to_string()))
    }

    /// 保留庫存
    ///
    /// 全有全無：可用量不足即整筆失敗並回報缺口，
    /// 想要部分滿足的呼叫端必須自行改以部分數量請求。
    pub fn reserve(&self, item_id: &str, qty: Decimal, demand: DemandRef) -> Result<Allocation> {
        if qty <= Decimal::ZERO {
            return Err(EngineError::InvalidQuantity(format!(
                "保留數量必須為正值，收到 {qty}"
            )));
        }

        let handle = self.account(item_id)?;
        let mut account = handle.lock().unwrap_or_else(|e| e.into_inner());

        let available = account.item.available();
        if qty > available {
            return Err(EngineError::Shortage {
                item_id: item_id.to_string(),
                requested: qty,
                short_by: qty - available,
            });
        }

        account.item.allocated += qty;

        let mut allocation = Allocation::new(item_id.to_string(), qty, demand);
        allocation.status = AllocationStatus::Allocated;

        let mut store = self.store.write().unwrap_or_else(|e| e.into_inner());
        store.insert(allocation.clone());
        drop(store);

        tracing::debug!("保留庫存：物料 {} 數量 {}（{}）", item_id, qty, demand);
        Ok(allocation)
    }

    /// 登記待分配需求（發放時缺料的用料需求）
    ///
    /// 不鎖定任何數量；待供應到位後由 [`InventoryLedger::try_allocate`] 補分配。
    pub fn record_requirement(
        &self,
        item_id: &str,
        qty: Decimal,
        demand: DemandRef,
    ) -> Result<Allocation> {
        if qty <= Decimal::ZERO {
            return Err(EngineError::InvalidQuantity(format!(
                "需求數量必須為正值，收到 {qty}"
            )));
        }
        // 確認物料存在
        let _ = self.account(item_id)?;

        let allocation = Allocation::new(item_id.to_string(), qty, demand);
        let mut store = self.store.write().unwrap_or_else(|e| e.into_inner());
        store.insert(allocation.clone());
        drop(store);

        tracing::debug!("登記待分配需求：物料 {} 數量 {}（{}）", item_id, qty, demand);
        Ok(allocation)
    }

    /// 嘗試把待分配需求補分配為已分配
    ///
    /// 可用量不足時返回 `Ok(false)`，不視為錯誤。
    pub fn try_allocate(&self, allocation_id: Uuid) -> Result<bool> {
        let allocation = self.allocation(allocation_id)?;
        match allocation.status {
            AllocationStatus::Allocated => return Ok(true),
            AllocationStatus::Consumed => {
                return Err(EngineError::AllocationClosed {
                    allocation_id,
                    status: allocation.status.to_string(),
                })
            }
            AllocationStatus::Pending => {}
        }

        let handle = self.account(&allocation.item_id)?;
        let mut account = handle.lock().unwrap_or_else(|e| e.into_inner());

        if allocation.quantity > account.item.available() {
            return Ok(false);
        }

        let mut store = self.store.write().unwrap_or_else(|e| e.into_inner());
        match store.get_mut(allocation_id) {
            Some(record) if record.is_pending() => {
                account.item.allocated += record.quantity;
                record.status = AllocationStatus::Allocated;
                tracing::debug!(
                    "補分配成功：物料 {} 數量 {}（{}）",
                    record.item_id,
                    record.quantity,
                    record.demand
                );
                Ok(true)
            }
            // 記錄在取鎖空檔被他人處理掉了
            _ => Ok(false),
        }
    }

    /// 反轉未消耗的分配，數量退回可用庫存
    ///
    /// 返回實際退回可用庫存的數量（pending 本來就沒鎖定，退回為零）。
    pub fn release_allocation(&self, allocation_id: Uuid) -> Result<Decimal> {
        let allocation = self.allocation(allocation_id)?;
        if allocation.status == AllocationStatus::Consumed {
            return Err(EngineError::AllocationClosed {
                allocation_id,
                status: allocation.status.to_string(),
            });
        }

        let handle = self.account(&allocation.item_id)?;
        let mut account = handle.lock().unwrap_or_else(|e| e.into_inner());

        let mut store = self.store.write().unwrap_or_else(|e| e.into_inner());
        let Some(removed) = store.remove(allocation_id) else {
            return Ok(Decimal::ZERO);
        };
        drop(store);

        let freed = if removed.status == AllocationStatus::Allocated {
            account.item.allocated -= removed.quantity;
            removed.quantity
        } else {
            Decimal::ZERO
        };

        tracing::debug!(
            "反轉分配：物料 {} 退回 {}（{}）",
            removed.item_id,
            freed,
            removed.demand
        );
        Ok(freed)
    }

    /// 消耗分配（工序完工領料）
    ///
    /// 扣減現有庫存 `qty_good + qty_scrap`（報廢一樣耗用投入），
    /// 分配的未用餘額退回可用庫存，記錄恰好一筆交易與一筆過帳事件。
    pub fn consume(
        &self,
        allocation_id: Uuid,
        qty_good: Decimal,
        qty_scrap: Decimal,
        actor: &str,
    ) -> Result<LedgerTransaction> {
        let mut txns = self.consume_batch(
            &[ConsumeRequest {
                allocation_id,
                qty_good,
                qty_scrap,
            }],
            actor,
        )?;
        txns.pop()
            .ok_or(EngineError::AllocationNotFound(allocation_id))
    }

    /// 批次消耗多筆分配（工序完工一次領齊全部用料）
    ///
    /// 單一臨界區內先全面驗證再一次套用：任何一筆不過
    /// （已結案、領用量超過分配量），整批拒絕，帳上不留半筆。
    /// 物料鎖依ID排序取得，與其他批次呼叫不會交叉等待。
    pub fn consume_batch(
        &self,
        requests: &[ConsumeRequest],
        actor: &str,
    ) -> Result<Vec<LedgerTransaction>> {
        if requests.is_empty() {
            return Ok(Vec::new());
        }

        let mut seen = HashSet::new();
        for req in requests {
            if req.qty_good < Decimal::ZERO || req.qty_scrap < Decimal::ZERO {
                return Err(EngineError::InvalidQuantity(
                    "領用量不可為負值".to_string(),
                ));
            }
            if req.qty_good + req.qty_scrap <= Decimal::ZERO {
                return Err(EngineError::InvalidQuantity(
                    "領用量必須為正值".to_string(),
                ));
            }
            if !seen.insert(req.allocation_id) {
                return Err(EngineError::InvalidQuantity(format!(
                    "分配 {} 在同一批領料中出現多次",
                    req.allocation_id
                )));
            }
        }

        // 鎖外先查分配歸屬，決定要鎖哪些物料帳
        let mut item_ids = Vec::new();
        for req in requests {
            let allocation = self.allocation(req.allocation_id)?;
            item_ids.push(allocation.item_id);
        }
        let mut distinct = item_ids.clone();
        distinct.sort();
        distinct.dedup();

        let handles: Vec<(String, Arc<Mutex<ItemAccount>>)> = {
            let mut pairs = Vec::with_capacity(distinct.len());
            for item_id in &distinct {
                pairs.push((item_id.clone(), self.account(item_id)?));
            }
            pairs
        };
        let mut guards: Vec<MutexGuard<'_, ItemAccount>> = handles
            .iter()
            .map(|(_, handle)| handle.lock().unwrap_or_else(|e| e.into_inner()))
            .collect();
        let index: HashMap<&str, usize> = handles
            .iter()
            .enumerate()
            .map(|(i, (item_id, _))| (item_id.as_str(), i))
            .collect();

        let mut store = self.store.write().unwrap_or_else(|e| e.into_inner());

        // 第一遍：持鎖重驗每一筆，任何失敗整批放棄
        for req in requests {
            let record = store
                .get(req.allocation_id)
                .ok_or(EngineError::AllocationNotFound(req.allocation_id))?;
            match record.status {
                AllocationStatus::Pending => {
                    return Err(EngineError::InvalidTransition {
                        entity: format!("分配 {}", req.allocation_id),
                        from: record.status.to_string(),
                        action: "consume".to_string(),
                    })
                }
                AllocationStatus::Consumed => {
                    return Err(EngineError::AllocationClosed {
                        allocation_id: req.allocation_id,
                        status: record.status.to_string(),
                    })
                }
                AllocationStatus::Allocated => {}
            }
            let used = req.qty_good + req.qty_scrap;
            if used > record.quantity {
                return Err(EngineError::QuantityExceedsPlan {
                    planned: record.quantity,
                    reported: used,
                });
            }
            if !index.contains_key(record.item_id.as_str()) {
                return Err(EngineError::ItemNotFound(record.item_id.clone()));
            }
        }

        // 第二遍：全數套用
        let mut applied = Vec::with_capacity(requests.len());
        for req in requests {
            let record = store
                .get_mut(req.allocation_id)
                .ok_or(EngineError::AllocationNotFound(req.allocation_id))?;
            let used = req.qty_good + req.qty_scrap;
            let idx = index
                .get(record.item_id.as_str())
                .copied()
                .ok_or_else(|| EngineError::ItemNotFound(record.item_id.clone()))?;

            guards[idx].item.on_hand -= used;
            guards[idx].item.allocated -= record.quantity;
            record.status = AllocationStatus::Consumed;
            applied.push((idx, used, req.qty_good, req.qty_scrap, record.demand.to_string()));
        }
        drop(store);

        let mut txns = Vec::with_capacity(applied.len());
        for (idx, used, qty_good, qty_scrap, demand_ref) in applied {
            let account = &guards[idx];
            let txn = self.record(
                account,
                LedgerTarget::Item(account.item.id.clone()),
                -used,
                actor,
                format!("工序完工領料：良品 {qty_good}，報廢 {qty_scrap}"),
                "consumption",
                demand_ref,
            );
            tracing::info!(
                "消耗分配：物料 {} 領用 {}（良品 {}，報廢 {}）",
                account.item.id,
                used,
                qty_good,
                qty_scrap
            );
            txns.push(txn);
        }
        Ok(txns)
    }

    /// 帳務調整
    ///
    /// `reason` 為硬性前置條件：空原因直接拒絕，不產生任何交易
    /// 也不留下任何庫存異動。品項調整可以把可用庫存推成負值，
    /// 該缺口必須原樣呈現。
    pub fn adjust(
        &self,
        target: LedgerTarget,
        delta: Decimal,
        actor: &str,
        reason: &str,
    ) -> Result<LedgerTransaction> {
        if reason.trim().is_empty() {
            return Err(EngineError::ReasonRequired {
                target: target.to_string(),
            });
        }
        if delta == Decimal::ZERO {
            return Err(EngineError::InvalidQuantity("調整量不可為零".to_string()));
        }

        match &target {
            LedgerTarget::Item(item_id) => {
                let handle = self.account(item_id)?;
                let mut account = handle.lock().unwrap_or_else(|e| e.into_inner());
                account.item.on_hand += delta;

                let txn = self.record(
                    &account,
                    target.clone(),
                    delta,
                    actor,
                    reason.to_string(),
                    "adjustment",
                    item_id.clone(),
                );
                tracing::info!("庫存調整：物料 {} 異動 {}（{}）", item_id, delta, reason);
                Ok(txn)
            }
            LedgerTarget::Lot(lot_id) => {
                let item_id = self.lot_owner(lot_id)?;
                let handle = self.account(&item_id)?;
                let mut account = handle.lock().unwrap_or_else(|e| e.into_inner());

                Self::apply_lot_delta(&mut account, lot_id, delta)?;

                let txn = self.record(
                    &account,
                    target.clone(),
                    delta,
                    actor,
                    reason.to_string(),
                    "adjustment",
                    lot_id.clone(),
                );
                tracing::info!("批次調整：批次 {} 異動 {}（{}）", lot_id, delta, reason);
                Ok(txn)
            }
        }
    }

    /// 料卷秤重回報（PATCH /spools 入口）
    ///
    /// 重量沒有變化時不產生交易；有變化時 `reason` 必填。
    pub fn set_lot_weight(
        &self,
        lot_id: &str,
        new_weight: Decimal,
        actor: &str,
        reason: &str,
    ) -> Result<Option<LedgerTransaction>> {
        if new_weight < Decimal::ZERO {
            return Err(EngineError::InvalidQuantity(format!(
                "批次 {lot_id} 重量不可為負"
            )));
        }

        let item_id = self.lot_owner(lot_id)?;
        let handle = self.account(&item_id)?;
        let mut account = handle.lock().unwrap_or_else(|e| e.into_inner());

        let current = account
            .lots
            .iter()
            .find(|l| l.id == lot_id)
            .map(|l| l.current_weight)
            .ok_or_else(|| EngineError::LotNotFound(lot_id.to_string()))?;

        let delta = new_weight - current;
        if delta == Decimal::ZERO {
            return Ok(None);
        }
        if reason.trim().is_empty() {
            return Err(EngineError::ReasonRequired {
                target: format!("批次 {lot_id}"),
            });
        }

        Self::apply_lot_delta(&mut account, lot_id, delta)?;

        let txn = self.record(
            &account,
            LedgerTarget::Lot(lot_id.to_string()),
            delta,
            actor,
            reason.to_string(),
            "adjustment",
            lot_id.to_string(),
        );
        tracing::info!(
            "料卷秤重：批次 {} 由 {} 改為 {}（{}）",
            lot_id,
            current,
            new_weight,
            reason
        );
        Ok(Some(txn))
    }

    /// 採購收貨
    ///
    /// 現有庫存增加、在途數量扣減，之後依登記順序補分配
    /// 該物料的待分配需求（先到先得，遇到不足即停）。
    pub fn receive(
        &self,
        item_id: &str,
        qty: Decimal,
        reference: &str,
        actor: &str,
    ) -> Result<LedgerTransaction> {
        if qty <= Decimal::ZERO {
            return Err(EngineError::InvalidQuantity(format!(
                "收貨數量必須為正值，收到 {qty}"
            )));
        }

        let handle = self.account(item_id)?;
        let txn = {
            let mut account = handle.lock().unwrap_or_else(|e| e.into_inner());
            account.item.on_hand += qty;
            account.item.incoming = (account.item.incoming - qty).max(Decimal::ZERO);

            self.record(
                &account,
                LedgerTarget::Item(item_id.to_string()),
                qty,
                actor,
                format!("採購收貨 {reference}"),
                "receipt",
                reference.to_string(),
            )
        };

        let promoted = self.promote_pending(item_id)?;
        tracing::info!(
            "採購收貨：物料 {} 數量 {}（{}），補分配 {} 筆",
            item_id,
            qty,
            reference,
            promoted
        );
        Ok(txn)
    }

    /// 依登記順序補分配待分配需求，遇到不足即停
    pub fn promote_pending(&self, item_id: &str) -> Result<u32> {
        let pending_ids: Vec<Uuid> = {
            let store = self.store.read().unwrap_or_else(|e| e.into_inner());
            store.pending_for_item(item_id).iter().map(|a| a.id).collect()
        };

        let mut promoted = 0;
        for id in pending_ids {
            if self.try_allocate(id)? {
                promoted += 1;
            } else {
                break;
            }
        }
        Ok(promoted)
    }

    /// 設定在途數量（採購單同步用）
    pub fn set_incoming(&self, item_id: &str, qty: Decimal) -> Result<()> {
        let handle = self.account(item_id)?;
        let mut account = handle.lock().unwrap_or_else(|e| e.into_inner());
        account.item.incoming = qty;
        Ok(())
    }

    /// 變更分配數量（僅限 pending / allocated）
    pub fn reallocate(&self, allocation_id: Uuid, new_qty: Decimal) -> Result<()> {
        if new_qty <= Decimal::ZERO {
            return Err(EngineError::InvalidQuantity(format!(
                "分配數量必須為正值，收到 {new_qty}"
            )));
        }

        let allocation = self.allocation(allocation_id)?;
        match allocation.status {
            AllocationStatus::Consumed => Err(EngineError::AllocationClosed {
                allocation_id,
                status: allocation.status.to_string(),
            }),
            AllocationStatus::Pending => {
                let mut store = self.store.write().unwrap_or_else(|e| e.into_inner());
                match store.get_mut(allocation_id) {
                    Some(record) if record.is_pending() => {
                        record.quantity = new_qty;
                        Ok(())
                    }
                    Some(record) => Err(EngineError::AllocationClosed {
                        allocation_id,
                        status: record.status.to_string(),
                    }),
                    None => Err(EngineError::AllocationNotFound(allocation_id)),
                }
            }
            AllocationStatus::Allocated => {
                let handle = self.account(&allocation.item_id)?;
                let mut account = handle.lock().unwrap_or_else(|e| e.into_inner());

                let mut store = self.store.write().unwrap_or_else(|e| e.into_inner());
                let record = store
                    .get_mut(allocation_id)
                    .ok_or(EngineError::AllocationNotFound(allocation_id))?;
                if !record.is_allocated() {
                    return Err(EngineError::AllocationClosed {
                        allocation_id,
                        status: record.status.to_string(),
                    });
                }

                let delta = new_qty - record.quantity;
                if delta > account.item.available() {
                    return Err(EngineError::Shortage {
                        item_id: record.item_id.clone(),
                        requested: delta,
                        short_by: delta - account.item.available(),
                    });
                }
                account.item.allocated += delta;
                record.quantity = new_qty;
                Ok(())
            }
        }
    }

    /// 分配記錄複本
    pub fn allocation(&self, allocation_id: Uuid) -> Result<Allocation> {
        let store = self.store.read().unwrap_or_else(|e| e.into_inner());
        store
            .get(allocation_id)
            .cloned()
            .ok_or(EngineError::AllocationNotFound(allocation_id))
    }

    /// 某工單的分配記錄複本
    pub fn allocations_for_order(&self, order_id: Uuid) -> Vec<Allocation> {
        let store = self.store.read().unwrap_or_else(|e| e.into_inner());
        store
            .for_production_order(order_id)
            .into_iter()
            .cloned()
            .collect()
    }

    /// 取得一致性快照（讀取端投影的輸入）
    pub fn snapshot(&self) -> LedgerSnapshot {
        let handles: Vec<Arc<Mutex<ItemAccount>>> = {
            let accounts = self.accounts.read().unwrap_or_else(|e| e.into_inner());
            accounts.values().cloned().collect()
        };

        let mut items = HashMap::new();
        let mut lots = Vec::new();
        for handle in handles {
            let account = handle.lock().unwrap_or_else(|e| e.into_inner());
            items.insert(account.item.id.clone(), account.item.clone());
            lots.extend(account.lots.iter().cloned());
        }

        let allocations = {
            let store = self.store.read().unwrap_or_else(|e| e.into_inner());
            store.all().cloned().collect()
        };

        LedgerSnapshot {
            taken_at: chrono::Utc::now(),
            items,
            lots,
            allocations,
        }
    }

    /// 交易流水複本
    pub fn transactions(&self) -> Vec<LedgerTransaction> {
        self.transactions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// 過帳 outbox
    pub fn outbox(&self) -> &GlOutbox {
        &self.outbox
    }

    fn account(&self, item_id: &str) -> Result<Arc<Mutex<ItemAccount>>> {
        let accounts = self.accounts.read().unwrap_or_else(|e| e.into_inner());
        accounts
            .get(item_id)
            .cloned()
            .ok_or_else(|| EngineError::ItemNotFound(item_id.to_string()))
    }

    fn lot_owner(&self, lot_id: &str) -> Result<String> {
        let index = self.lot_index.read().unwrap_or_else(|e| e.into_inner());
        index
            .get(lot_id)
            .cloned()
            .ok_or_else(|| EngineError::LotNotFound(lot_id.to_string()))
    }

    fn apply_lot_delta(
        account: &mut MutexGuard<'_, ItemAccount>,
        lot_id: &str,
        delta: Decimal,
    ) -> Result<()> {
        let lot = account
            .lots
            .iter_mut()
            .find(|l| l.id == lot_id)
            .ok_or_else(|| EngineError::LotNotFound(lot_id.to_string()))?;

        let new_weight = lot.current_weight + delta;
        if new_weight < Decimal::ZERO {
            return Err(EngineError::InvalidQuantity(format!(
                "批次 {lot_id} 重量不可為負（目前 {}，異動 {delta}）",
                lot.current_weight
            )));
        }

        lot.current_weight = new_weight;
        lot.status = if new_weight == Decimal::ZERO {
            LotStatus::Empty
        } else {
            LotStatus::Active
        };
        // 批次是品項庫存的子單位，重量異動同步反映到品項帳
        account.item.on_hand += delta;
        Ok(())
    }

    /// 記一筆交易並排入過帳事件（恰好各一筆）
    fn record(
        &self,
        account: &ItemAccount,
        target: LedgerTarget,
        delta: Decimal,
        actor: &str,
        reason: String,
        reference_type: &str,
        reference_id: String,
    ) -> LedgerTransaction {
        let txn = LedgerTransaction::new(target, delta, actor.to_string(), reason);
        let event = GlEvent::new(
            txn.id,
            account.item.id.clone(),
            delta,
            account.item.standard_cost,
            reference_type.to_string(),
            reference_id,
            txn.reason.clone(),
        );

        {
            let mut transactions = self.transactions.lock().unwrap_or_else(|e| e.into_inner());
            transactions.push(txn.clone());
        }
        self.outbox.push(event);
        txn
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fab_core::UnitOfMeasure;
    use proptest::prelude::*;

    fn demand(seq: u32) -> DemandRef {
        DemandRef::OperationRequirement {
            order_id: Uuid::new_v4(),
            operation_seq: seq,
        }
    }

    fn ledger_with_item(on_hand: i64) -> InventoryLedger {
        let ledger = InventoryLedger::new();
        ledger.register_item(
            Item::new(
                "STEEL-001".to_string(),
                "鋼材".to_string(),
                UnitOfMeasure::Kilogram,
            )
            .with_on_hand(Decimal::from(on_hand))
            .with_standard_cost(Decimal::from(3)),
        );
        ledger
    }

    #[test]
    fn test_reserve_success_and_shortage() {
        let ledger = ledger_with_item(10);

        let allocation = ledger
            .reserve("STEEL-001", Decimal::from(6), demand(10))
            .unwrap();
        assert_eq!(allocation.status, AllocationStatus::Allocated);
        assert_eq!(ledger.item("STEEL-001").unwrap().available(), Decimal::from(4));

        // 全有全無：不足時整筆失敗，不做部分保留
        let err = ledger
            .reserve("STEEL-001", Decimal::from(6), demand(20))
            .unwrap_err();
        match err {
            EngineError::Shortage {
                item_id, short_by, ..
            } => {
                assert_eq!(item_id, "STEEL-001");
                assert_eq!(short_by, Decimal::from(2));
            }
            other => panic!("預期 Shortage，得到 {other:?}"),
        }
        assert_eq!(ledger.item("STEEL-001").unwrap().allocated, Decimal::from(6));
    }

    #[test]
    fn test_release_returns_quantity_to_available() {
        let ledger = ledger_with_item(10);
        let allocation = ledger
            .reserve("STEEL-001", Decimal::from(6), demand(10))
            .unwrap();

        let before = ledger.item("STEEL-001").unwrap().available();
        let freed = ledger.release_allocation(allocation.id).unwrap();

        assert_eq!(freed, Decimal::from(6));
        let after = ledger.item("STEEL-001").unwrap().available();
        assert_eq!(after, before + Decimal::from(6));
        // 反轉即刪除記錄
        assert!(ledger.allocation(allocation.id).is_err());
    }

    #[test]
    fn test_consume_frees_remainder_and_logs_once() {
        let ledger = ledger_with_item(20);
        let allocation = ledger
            .reserve("STEEL-001", Decimal::new(105, 1), demand(10)) // 10.5
            .unwrap();

        // 部分完工：領用 4.2 + 2.1 = 6.3，小於分配的 10.5
        let txn = ledger
            .consume(allocation.id, Decimal::new(42, 1), Decimal::new(21, 1), "chen.l")
            .unwrap();
        assert_eq!(txn.delta, Decimal::new(-63, 1)); // -6.3

        let item = ledger.item("STEEL-001").unwrap();
        assert_eq!(item.on_hand, Decimal::new(137, 1)); // 20 - 6.3
        // 整筆分配結案，未用餘額退回可用庫存
        assert_eq!(item.allocated, Decimal::ZERO);
        assert_eq!(
            ledger.allocation(allocation.id).unwrap().status,
            AllocationStatus::Consumed
        );

        // 恰好一筆交易、一筆過帳事件
        assert_eq!(ledger.transactions().len(), 1);
        assert_eq!(ledger.outbox().pending_count(), 1);
    }

    #[test]
    fn test_consume_batch_is_all_or_nothing() {
        let ledger = ledger_with_item(20);
        ledger.register_item(
            Item::new(
                "BOLT-001".to_string(),
                "螺栓".to_string(),
                UnitOfMeasure::Each,
            )
            .with_on_hand(Decimal::from(100)),
        );
        let steel = ledger
            .reserve("STEEL-001", Decimal::new(105, 1), demand(10))
            .unwrap();
        let bolts = ledger
            .reserve("BOLT-001", Decimal::from(60), demand(10))
            .unwrap();

        // 領料前需求被改小：第二筆的領用量超過改小後的分配量
        ledger.reallocate(bolts.id, Decimal::from(30)).unwrap();
        let err = ledger
            .consume_batch(
                &[
                    ConsumeRequest {
                        allocation_id: steel.id,
                        qty_good: Decimal::new(105, 1),
                        qty_scrap: Decimal::ZERO,
                    },
                    ConsumeRequest {
                        allocation_id: bolts.id,
                        qty_good: Decimal::from(60),
                        qty_scrap: Decimal::ZERO,
                    },
                ],
                "chen.l",
            )
            .unwrap_err();
        assert!(matches!(err, EngineError::QuantityExceedsPlan { .. }));

        // 整批拒絕：第一筆不可先被消耗，帳上不留半筆
        assert_eq!(
            ledger.allocation(steel.id).unwrap().status,
            AllocationStatus::Allocated
        );
        assert_eq!(ledger.item("STEEL-001").unwrap().on_hand, Decimal::from(20));
        assert!(ledger.transactions().is_empty());
        assert!(!ledger.outbox().has_backlog());

        // 按改小後的量整批領料成功，兩筆交易一次落帳
        let txns = ledger
            .consume_batch(
                &[
                    ConsumeRequest {
                        allocation_id: steel.id,
                        qty_good: Decimal::new(105, 1),
                        qty_scrap: Decimal::ZERO,
                    },
                    ConsumeRequest {
                        allocation_id: bolts.id,
                        qty_good: Decimal::from(30),
                        qty_scrap: Decimal::ZERO,
                    },
                ],
                "chen.l",
            )
            .unwrap();
        assert_eq!(txns.len(), 2);
        assert_eq!(ledger.item("STEEL-001").unwrap().allocated, Decimal::ZERO);
        assert_eq!(ledger.item("BOLT-001").unwrap().on_hand, Decimal::from(70));
        assert_eq!(ledger.item("BOLT-001").unwrap().allocated, Decimal::ZERO);
    }

    #[test]
    fn test_consume_batch_rejects_duplicate_allocation() {
        let ledger = ledger_with_item(20);
        let allocation = ledger
            .reserve("STEEL-001", Decimal::from(10), demand(10))
            .unwrap();

        let request = ConsumeRequest {
            allocation_id: allocation.id,
            qty_good: Decimal::from(4),
            qty_scrap: Decimal::ZERO,
        };
        let err = ledger
            .consume_batch(&[request, request], "chen.l")
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidQuantity(_)));
        assert_eq!(
            ledger.allocation(allocation.id).unwrap().status,
            AllocationStatus::Allocated
        );
    }

    #[test]
    fn test_consume_rejects_over_plan_and_pending() {
        let ledger = ledger_with_item(20);
        let allocation = ledger
            .reserve("STEEL-001", Decimal::from(5), demand(10))
            .unwrap();

        let err = ledger
            .consume(allocation.id, Decimal::from(6), Decimal::ZERO, "chen.l")
            .unwrap_err();
        assert!(matches!(err, EngineError::QuantityExceedsPlan { .. }));

        let pending = ledger
            .record_requirement("STEEL-001", Decimal::from(30), demand(20))
            .unwrap();
        let err = ledger
            .consume(pending.id, Decimal::from(1), Decimal::ZERO, "chen.l")
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidTransition { .. }));
    }

    #[test]
    fn test_adjust_requires_reason() {
        let ledger = ledger_with_item(10);

        let err = ledger
            .adjust(
                LedgerTarget::Item("STEEL-001".to_string()),
                Decimal::from(-2),
                "wang.m",
                "   ",
            )
            .unwrap_err();
        assert!(matches!(err, EngineError::ReasonRequired { .. }));

        // 拒絕發生在任何異動之前：零交易、零庫存變化、零過帳事件
        assert!(ledger.transactions().is_empty());
        assert_eq!(ledger.item("STEEL-001").unwrap().on_hand, Decimal::from(10));
        assert_eq!(ledger.outbox().pending_count(), 0);
    }

    #[test]
    fn test_adjust_surfaces_negative_available() {
        let ledger = ledger_with_item(10);
        ledger
            .reserve("STEEL-001", Decimal::from(8), demand(10))
            .unwrap();

        // 盤虧把現有庫存壓到已分配之下
        ledger
            .adjust(
                LedgerTarget::Item("STEEL-001".to_string()),
                Decimal::from(-6),
                "wang.m",
                "盤點差異調整",
            )
            .unwrap();

        let item = ledger.item("STEEL-001").unwrap();
        // 缺口原樣呈現為負的可用庫存，不壓到零
        assert_eq!(item.available(), Decimal::from(-4));
    }

    #[test]
    fn test_lot_adjust_moves_item_on_hand() {
        let ledger = ledger_with_item(50);
        ledger
            .register_lot(Lot::new(
                "SPOOL-1".to_string(),
                "STEEL-001".to_string(),
                Decimal::from(20),
            ))
            .unwrap();

        ledger
            .adjust(
                LedgerTarget::Lot("SPOOL-1".to_string()),
                Decimal::from(-20),
                "wang.m",
                "料卷用罄",
            )
            .unwrap();

        let lot = ledger.lot("SPOOL-1").unwrap();
        assert_eq!(lot.current_weight, Decimal::ZERO);
        assert_eq!(lot.status, LotStatus::Empty);
        assert_eq!(ledger.item("STEEL-001").unwrap().on_hand, Decimal::from(30));
    }

    #[test]
    fn test_set_lot_weight_noop_and_reason() {
        let ledger = ledger_with_item(50);
        ledger
            .register_lot(Lot::new(
                "SPOOL-1".to_string(),
                "STEEL-001".to_string(),
                Decimal::from(20),
            ))
            .unwrap();

        // 重量沒變：不需要原因，也不產生交易
        let result = ledger
            .set_lot_weight("SPOOL-1", Decimal::from(20), "wang.m", "")
            .unwrap();
        assert!(result.is_none());
        assert!(ledger.transactions().is_empty());

        // 重量有變但缺原因：拒絕
        let err = ledger
            .set_lot_weight("SPOOL-1", Decimal::from(15), "wang.m", "")
            .unwrap_err();
        assert!(matches!(err, EngineError::ReasonRequired { .. }));

        // 合法秤重
        let txn = ledger
            .set_lot_weight("SPOOL-1", Decimal::from(15), "wang.m", "實秤回報")
            .unwrap()
            .unwrap();
        assert_eq!(txn.delta, Decimal::from(-5));
        assert_eq!(ledger.item("STEEL-001").unwrap().on_hand, Decimal::from(45));
    }

    #[test]
    fn test_receive_promotes_pending_fifo() {
        let ledger = ledger_with_item(0);
        ledger.set_incoming("STEEL-001", Decimal::from(100)).unwrap();

        let first = ledger
            .record_requirement("STEEL-001", Decimal::from(40), demand(10))
            .unwrap();
        let second = ledger
            .record_requirement("STEEL-001", Decimal::from(30), demand(20))
            .unwrap();

        // 收貨 60：先到先得，第一筆補分配成功，第二筆不足即停
        ledger.receive("STEEL-001", Decimal::from(60), "PO-1001", "liu.h").unwrap();

        assert_eq!(
            ledger.allocation(first.id).unwrap().status,
            AllocationStatus::Allocated
        );
        assert_eq!(
            ledger.allocation(second.id).unwrap().status,
            AllocationStatus::Pending
        );

        let item = ledger.item("STEEL-001").unwrap();
        assert_eq!(item.on_hand, Decimal::from(60));
        assert_eq!(item.incoming, Decimal::from(40));

        // 再收 40：第二筆也補上
        ledger.receive("STEEL-001", Decimal::from(40), "PO-1002", "liu.h").unwrap();
        assert_eq!(
            ledger.allocation(second.id).unwrap().status,
            AllocationStatus::Allocated
        );
        assert_eq!(ledger.item("STEEL-001").unwrap().incoming, Decimal::ZERO);
    }

    #[test]
    fn test_reallocate_guards() {
        let ledger = ledger_with_item(10);
        let allocation = ledger
            .reserve("STEEL-001", Decimal::from(4), demand(10))
            .unwrap();

        // 放大到超過可用量：缺口回報
        let err = ledger.reallocate(allocation.id, Decimal::from(12)).unwrap_err();
        assert!(matches!(err, EngineError::Shortage { .. }));

        ledger.reallocate(allocation.id, Decimal::from(8)).unwrap();
        assert_eq!(ledger.item("STEEL-001").unwrap().allocated, Decimal::from(8));

        ledger
            .consume(allocation.id, Decimal::from(8), Decimal::ZERO, "chen.l")
            .unwrap();
        let err = ledger.reallocate(allocation.id, Decimal::from(2)).unwrap_err();
        assert!(matches!(err, EngineError::AllocationClosed { .. }));
    }

    proptest! {
        /// 任意操作序列後：已分配合計 = 未結案分配的數量總和，
        /// 且可用庫存恆等於 現有 - 已分配。
        #[test]
        fn prop_allocated_matches_open_allocations(ops in proptest::collection::vec(0u8..4, 1..40)) {
            let ledger = ledger_with_item(1000);
            let mut live: Vec<Uuid> = Vec::new();
            let mut seq = 0u32;

            for op in ops {
                seq += 1;
                match op {
                    0 => {
                        if let Ok(a) = ledger.reserve("STEEL-001", Decimal::from(7), demand(seq)) {
                            live.push(a.id);
                        }
                    }
                    1 => {
                        if let Some(id) = live.pop() {
                            let _ = ledger.release_allocation(id);
                        }
                    }
                    2 => {
                        if let Some(id) = live.pop() {
                            let _ = ledger.consume(id, Decimal::from(5), Decimal::ONE, "prop");
                        }
                    }
                    _ => {
                        let _ = ledger.adjust(
                            LedgerTarget::Item("STEEL-001".to_string()),
                            Decimal::from(3),
                            "prop",
                            "性質測試補帳",
                        );
                    }
                }

                let snapshot = ledger.snapshot();
                let item = snapshot.item("STEEL-001").unwrap();
                let open_total: Decimal = snapshot
                    .open_allocations_for_item("STEEL-001")
                    .iter()
                    .filter(|a| a.is_allocated())
                    .map(|a| a.quantity)
                    .sum();

                prop_assert_eq!(item.allocated, open_total);
                prop_assert_eq!(item.available(), item.on_hand - item.allocated);
            }
        }
    }
}
