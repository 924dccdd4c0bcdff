//! # Fab - 生產出貨與庫存分配引擎
//!
//! 工單執行、庫存帳務、需求追溯與出貨就緒滾算的核心引擎。
//!
//! ## 架構
//!
//! - [`fab_core`] - 核心資料模型（品項、分配、工單、銷售訂單）
//! - [`fab_ledger`] - 庫存帳務引擎與分配存放區（寫入側真相來源）
//! - [`fab_exec`] - 工單工序狀態機（發放、開工、完工、跳過）
//! - [`fab_calc`] - 讀取端投影（缺料分析、出貨就緒，每次重算不落地）
//!
//! ## 快速開始
//!
//! ```no_run
//! use fab::{ExecutionEngine, InventoryLedger, Item, UnitOfMeasure};
//! use rust_decimal::Decimal;
//! use std::sync::Arc;
//!
//! let ledger = Arc::new(InventoryLedger::new());
//! ledger.register_item(
//!     Item::new("STEEL-001".to_string(), "鋼材".to_string(), UnitOfMeasure::Kilogram)
//!         .with_on_hand(Decimal::from(100)),
//! );
//! let engine = ExecutionEngine::new(Arc::clone(&ledger));
//! ```

pub use fab_calc::{
    blocking_issues, demand_summary, fulfillment_status, shortage_for, shortage_overview,
    BlockingReport, DemandSummary, FulfillmentReport, LineStatus, OpenPoLine, PurchasingView,
    ResolutionAction, ShortageReport,
};
pub use fab_core::{
    Allocation, AllocationStatus, BomLine, DemandRef, EngineError, FulfillmentState, GlEvent,
    Item, LedgerTarget, LedgerTransaction, Lot, LotStatus, MaterialIssue, Operation,
    OperationStatus, OperationTemplate, ProductStructure, ProductionOrder, ProductionOrderStatus,
    Result, SalesOrder, SalesOrderLine, UnitOfMeasure,
};
pub use fab_exec::{ExecutionEngine, ReleasePlan, ReleasePlanner};
pub use fab_ledger::{
    AllocationStore, ConsumeRequest, FlushReport, GlOutbox, GlSink, InventoryLedger,
    LedgerSnapshot,
};
