//! 總帳過帳 outbox
//!
//! 庫存異動與總帳過帳解耦：異動當下只把事件排入佇列，
//! 過帳由外部協作者非同步消化。投遞語意為 at-least-once，
//! 以來源交易ID去重達到冪等；投遞失敗保留在佇列重試，
//! 絕不因過帳延遲而回滾庫存。

use fab_core::GlEvent;
use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;
use uuid::Uuid;

/// 總帳過帳協作者介面
///
/// 協作者保證產生借貸平衡的傳票，引擎不自行驗證平衡。
pub trait GlSink {
    /// 過帳單一事件
    fn post(&self, event: &GlEvent) -> std::result::Result<(), String>;
}

/// 單次沖帳結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushReport {
    /// 成功過帳筆數
    pub posted: usize,
    /// 因已過帳而略過的筆數（冪等去重）
    pub skipped: usize,
    /// 失敗且留在佇列的筆數
    pub failed: usize,
}

/// 過帳事件 outbox
#[derive(Debug, Default)]
pub struct GlOutbox {
    pending: Mutex<VecDeque<GlEvent>>,
    posted: Mutex<HashSet<Uuid>>,
}

impl GlOutbox {
    /// 創建空的 outbox
    pub fn new() -> Self {
        Self::default()
    }

    /// 排入待過帳事件
    pub fn push(&self, event: GlEvent) {
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        pending.push_back(event);
    }

    /// 待過帳筆數
    pub fn pending_count(&self) -> usize {
        self.pending.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// 是否有積壓
    pub fn has_backlog(&self) -> bool {
        self.pending_count() > 0
    }

    /// 待過帳事件快照（重試排程用）
    pub fn pending_events(&self) -> Vec<GlEvent> {
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .cloned()
            .collect()
    }

    /// 沖帳：把佇列中的事件交給協作者
    ///
    /// 失敗的事件留在佇列並記入報告；已過帳的交易ID直接略過。
    pub fn flush(&self, sink: &dyn GlSink) -> FlushReport {
        let drained: Vec<GlEvent> = {
            let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
            pending.drain(..).collect()
        };

        let mut report = FlushReport {
            posted: 0,
            skipped: 0,
            failed: 0,
        };

        for event in drained {
            let already_posted = {
                let posted = self.posted.lock().unwrap_or_else(|e| e.into_inner());
                posted.contains(&event.transaction_id)
            };
            if already_posted {
                report.skipped += 1;
                continue;
            }

            match sink.post(&event) {
                Ok(()) => {
                    let mut posted = self.posted.lock().unwrap_or_else(|e| e.into_inner());
                    posted.insert(event.transaction_id);
                    report.posted += 1;
                }
                Err(message) => {
                    tracing::warn!(
                        "過帳失敗，事件留在佇列重試：交易 {}，原因 {}",
                        event.transaction_id,
                        message
                    );
                    let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
                    pending.push_back(event);
                    report.failed += 1;
                }
            }
        }

        report
    }
}
