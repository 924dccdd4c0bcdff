//! 現場執行示例：發放 → 缺料 → 收料 → 開工 → 完工

use fab::{
    BomLine, EngineError, ExecutionEngine, InventoryLedger, Item, OperationTemplate,
    ProductStructure, UnitOfMeasure,
};
use rust_decimal::Decimal;
use std::sync::Arc;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    println!("=== 現場執行示例 ===\n");

    // 建立庫存帳：鋼材零庫存，螺栓充足
    let ledger = Arc::new(InventoryLedger::new());
    ledger.register_item(Item::new(
        "GEARBOX-001".to_string(),
        "齒輪箱".to_string(),
        UnitOfMeasure::Each,
    ));
    ledger.register_item(
        Item::new(
            "STEEL-001".to_string(),
            "鋼材".to_string(),
            UnitOfMeasure::Kilogram,
        )
        .with_standard_cost(Decimal::from(12)),
    );
    ledger.register_item(
        Item::new(
            "BOLT-001".to_string(),
            "螺栓".to_string(),
            UnitOfMeasure::Each,
        )
        .with_on_hand(Decimal::from(500)),
    );

    // 產品結構：1 台齒輪箱 = 1 公斤鋼材（5% 損耗）+ 6 顆螺栓，兩道工序
    let engine = ExecutionEngine::new(Arc::clone(&ledger));
    engine.register_structure(
        ProductStructure::new("GEARBOX-001".to_string())
            .with_bom_line(BomLine::new(
                "STEEL-001".to_string(),
                Decimal::ONE,
                Decimal::new(5, 2),
            ))
            .with_bom_line(BomLine::new(
                "BOLT-001".to_string(),
                Decimal::from(6),
                Decimal::ZERO,
            ))
            .with_operation(OperationTemplate::new(
                10,
                "CNC-01".to_string(),
                Decimal::from(30),
                Decimal::from(6),
            ))
            .with_operation(OperationTemplate::new(
                20,
                "ASSY-01".to_string(),
                Decimal::from(15),
                Decimal::from(4),
            )),
    );

    // 發放 10 台的工單
    let order_id = engine.create_order("GEARBOX-001", Decimal::from(10))?;
    engine.release(order_id)?;
    println!("工單 {order_id} 已發放，狀態: {}", engine.status(order_id)?);

    // 開工被缺料擋下
    engine.schedule(order_id, 10)?;
    match engine.start(order_id, 10, "CNC-01-A") {
        Err(EngineError::Blocked { issues, .. }) => {
            println!("\n開工被擋，缺料清單:");
            for issue in &issues {
                println!(
                    "  - 物料: {}, 需求: {}, 缺口: {}",
                    issue.item_id, issue.required, issue.short_by
                );
            }
        }
        other => anyhow::bail!("預期缺料擋下，得到 {other:?}"),
    }

    // 收料後自動補分配
    ledger.receive("STEEL-001", Decimal::from(50), "PO-9001", "warehouse")?;
    println!("\n收料 50 公斤鋼材，重新開工");
    engine.start(order_id, 10, "CNC-01-A")?;

    // 完工回報 8 良 2 廢
    engine.complete(
        order_id,
        10,
        Decimal::from(8),
        Decimal::from(2),
        Some("夾持不良刮傷"),
        "chen.l",
    )?;
    engine.start(order_id, 20, "ASSY-01-A")?;
    engine.complete(order_id, 20, Decimal::from(10), Decimal::ZERO, None, "chen.l")?;

    println!("\n工單狀態: {}", engine.status(order_id)?);
    println!("鋼材現有庫存: {}", ledger.item("STEEL-001")?.on_hand);

    println!("\n流水帳:");
    for txn in ledger.transactions() {
        println!("  {} {:+} ({})", txn.target, txn.delta, txn.reason);
    }
    println!("\n待過帳事件: {} 筆", ledger.outbox().pending_count());

    Ok(())
}
