//! # Fab Exec
//!
//! 工單工序狀態機：發放、排程、開工、完工、跳過。
//! 寫入一律經過帳務引擎，工序轉換以工單為粒度序列化。

pub mod engine;
pub mod machine;
pub mod release;

// Re-export 主要類型
pub use engine::ExecutionEngine;
pub use release::{ReleasePlan, ReleasePlanner};
