//! 工序轉換守門
//!
//! 合法轉換表定義在 [`fab_core::OperationStatus`] 的述詞上。
//! 守門只做純檢查，不做任何副作用；看到終態轉出一律視為
//! 程式或競態缺陷，回報 `InvalidTransition`。

use fab_core::{EngineError, Operation, Result};

/// 檢查可否排程（pending → queued）
pub fn guard_schedule(operation: &Operation) -> Result<()> {
    if operation.status.can_schedule() {
        Ok(())
    } else {
        Err(invalid(operation, "schedule"))
    }
}

/// 檢查可否開工（queued → running）
pub fn guard_start(operation: &Operation) -> Result<()> {
    if operation.status.can_start() {
        Ok(())
    } else {
        Err(invalid(operation, "start"))
    }
}

/// 檢查可否完工（running → complete）
pub fn guard_complete(operation: &Operation) -> Result<()> {
    if operation.status.can_complete() {
        Ok(())
    } else {
        Err(invalid(operation, "complete"))
    }
}

/// 檢查可否跳過；執行中的工序必須附非空原因
pub fn guard_skip(operation: &Operation, reason: &str) -> Result<()> {
    if !operation.status.can_skip() {
        return Err(invalid(operation, "skip"));
    }
    if operation.status.can_complete() && reason.trim().is_empty() {
        return Err(EngineError::ReasonRequired {
            target: format!("工序 {} 跳過", operation.sequence),
        });
    }
    Ok(())
}

fn invalid(operation: &Operation, action: &str) -> EngineError {
    EngineError::InvalidTransition {
        entity: format!("工序 {}", operation.sequence),
        from: operation.status.to_string(),
        action: action.to_string(),
    }
}
