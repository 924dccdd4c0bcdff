//! 缺料看板示例：讀取端投影與解決方案排序

use fab::{
    blocking_issues, fulfillment_status, shortage_overview, BomLine, ExecutionEngine,
    InventoryLedger, Item, OpenPoLine, OperationTemplate, ProductStructure, PurchasingView,
    SalesOrder, SalesOrderLine, UnitOfMeasure,
};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;

/// 示例用的靜態採購視圖
struct BoardPurchasing {
    lines: Vec<OpenPoLine>,
}

impl PurchasingView for BoardPurchasing {
    fn open_po_lines(&self, item_id: &str) -> Vec<OpenPoLine> {
        self.lines
            .iter()
            .filter(|l| l.item_id == item_id)
            .cloned()
            .collect()
    }
}

fn main() -> anyhow::Result<()> {
    println!("=== 缺料看板示例 ===\n");

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
        .with_reorder_point(Decimal::from(20)),
    );

    let engine = ExecutionEngine::new(Arc::clone(&ledger));
    engine.register_structure(
        ProductStructure::new("GEARBOX-001".to_string())
            .with_bom_line(BomLine::new(
                "STEEL-001".to_string(),
                Decimal::ONE,
                Decimal::new(5, 2),
            ))
            .with_operation(OperationTemplate::new(
                10,
                "CNC-01".to_string(),
                Decimal::from(30),
                Decimal::from(6),
            )),
    );

    // 按單生產：銷售訂單一條明細綁一張工單
    let mut sales_order = SalesOrder::new("CUST-001".to_string());
    let order_id = engine.create_order_for_sales_line(
        "GEARBOX-001",
        Decimal::from(10),
        sales_order.id,
        1,
    )?;
    sales_order = sales_order.with_line(
        SalesOrderLine::new(1, "GEARBOX-001".to_string(), Decimal::from(10))
            .with_production_order(order_id),
    );
    engine.release(order_id)?;

    // 在途採購單只蓋六成缺口
    ledger.set_incoming("STEEL-001", Decimal::new(63, 1))?;
    let purchasing = BoardPurchasing {
        lines: vec![OpenPoLine {
            po_ref: "PO-9001".to_string(),
            item_id: "STEEL-001".to_string(),
            open_qty: Decimal::new(63, 1),
            promised_date: "2026-09-10".parse()?,
        }],
    };

    let snapshot = ledger.snapshot();

    println!("缺料總覽:");
    for report in shortage_overview(&snapshot) {
        println!(
            "  - 物料: {}, 需求: {}, 可用: {}, 在途: {}, 缺口: {}",
            report.item_id, report.open_demand, report.available, report.incoming, report.short_qty
        );
    }

    let order = engine.order(order_id)?;
    let blocking = blocking_issues(&snapshot, &order, &purchasing);
    println!("\n工單 {order_id} 可投產: {}", blocking.can_produce);
    println!("建議行動（依排序）:");
    println!("{}", serde_json::to_string_pretty(&blocking.resolution_actions)?);

    let mut orders = HashMap::new();
    orders.insert(order.id, order);
    let fulfillment = fulfillment_status(&snapshot, &sales_order, &orders);
    println!(
        "\n銷售訂單 {} 出貨就緒: {}（{}%）",
        sales_order.id, fulfillment.state, fulfillment.percent
    );

    Ok(())
}
