//! 分配記錄存放

use fab_core::{Allocation, DemandRef};
use std::collections::HashMap;
use uuid::Uuid;

/// 分配記錄存放區
///
/// 以分配ID為主鍵，另維護物料別索引（保留登記順序，
/// 供收貨後依先到先得補分配）。本身不帶鎖，由帳務引擎統一保護。
#[derive(Debug, Default)]
pub struct AllocationStore {
    records: HashMap<Uuid, Allocation>,
    by_item: HashMap<String, Vec<Uuid>>,
}

impl AllocationStore {
    /// 創建空的存放區
    pub fn new() -> Self {
        Self::default()
    }

    /// 登記分配記錄
    pub fn insert(&mut self, allocation: Allocation) {
        self.by_item
            .entry(allocation.item_id.clone())
            .or_default()
            .push(allocation.id);
        self.records.insert(allocation.id, allocation);
    }

    /// 依ID查找
    pub fn get(&self, id: Uuid) -> Option<&Allocation> {
        self.records.get(&id)
    }

    /// 依ID查找（可變）
    pub fn get_mut(&mut self, id: Uuid) -> Option<&mut Allocation> {
        self.records.get_mut(&id)
    }

    /// 移除分配記錄（跳過／取消時反轉刪除）
    pub fn remove(&mut self, id: Uuid) -> Option<Allocation> {
        let removed = self.records.remove(&id);
        if let Some(allocation) = &removed {
            if let Some(ids) = self.by_item.get_mut(&allocation.item_id) {
                ids.retain(|x| *x != id);
            }
        }
        removed
    }

    /// 某物料的全部分配（依登記順序）
    pub fn for_item(&self, item_id: &str) -> Vec<&Allocation> {
        self.by_item
            .get(item_id)
            .map(|ids| ids.iter().filter_map(|id| self.records.get(id)).collect())
            .unwrap_or_default()
    }

    /// 某物料的未結案分配（pending + allocated）
    pub fn open_for_item(&self, item_id: &str) -> Vec<&Allocation> {
        self.for_item(item_id)
            .into_iter()
            .filter(|a| a.is_open())
            .collect()
    }

    /// 某物料的待分配記錄（依登記順序）
    pub fn pending_for_item(&self, item_id: &str) -> Vec<&Allocation> {
        self.for_item(item_id)
            .into_iter()
            .filter(|a| a.is_pending())
            .collect()
    }

    /// 某工單的全部分配
    pub fn for_production_order(&self, order_id: Uuid) -> Vec<&Allocation> {
        let mut hits: Vec<&Allocation> = self
            .records
            .values()
            .filter(|a| a.demand.production_order_id() == Some(order_id))
            .collect();
        hits.sort_by_key(|a| match a.demand {
            DemandRef::OperationRequirement { operation_seq, .. } => operation_seq,
            DemandRef::SalesOrderLine { line_no, .. } => line_no,
        });
        hits
    }

    /// 全部分配記錄
    pub fn all(&self) -> impl Iterator<Item = &Allocation> {
        self.records.values()
    }

    /// 記錄筆數
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// 是否為空
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
