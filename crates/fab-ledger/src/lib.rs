//! # Fab Ledger
//!
//! 庫存帳與分配記錄的權威來源。
//! 單一物料的寫入以物料為粒度互斥，不同物料完全並行；
//! 讀取端一律取快照重算，不與寫入端搶鎖。

pub mod ledger;
pub mod outbox;
pub mod snapshot;
pub mod store;

// Re-export 主要類型
pub use ledger::{ConsumeRequest, InventoryLedger};
pub use outbox::{FlushReport, GlOutbox, GlSink};
pub use snapshot::LedgerSnapshot;
pub use store::AllocationStore;
