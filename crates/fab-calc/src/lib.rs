//! # Fab Calc
//!
//! 讀取端投影：缺料分析、需求追溯、出貨就緒滾算。
//! 全部為快照上的純函數，每次呼叫重算，
//! 無中間狀態可漂移，同一快照重複呼叫輸出必然一致。

pub mod fulfillment;
pub mod resolution;
pub mod shortage;

// Re-export 主要類型
pub use fulfillment::{fulfillment_status, FulfillmentReport, LineStatus};
pub use resolution::{blocking_issues, BlockingReport, OpenPoLine, PurchasingView, ResolutionAction};
pub use shortage::{demand_summary, shortage_for, shortage_overview, DemandSummary, ShortageReport};
