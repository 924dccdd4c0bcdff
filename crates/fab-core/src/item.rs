//! 庫存品項模型

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// 計量單位
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnitOfMeasure {
    /// 個
    Each,
    /// 公斤
    Kilogram,
    /// 公尺
    Meter,
    /// 公升
    Liter,
}

impl UnitOfMeasure {
    /// 最小庫存單位的小數位數
    pub fn decimal_places(&self) -> u32 {
        match self {
            UnitOfMeasure::Each => 0,
            UnitOfMeasure::Kilogram | UnitOfMeasure::Meter | UnitOfMeasure::Liter => 3,
        }
    }

    /// 無條件進位到最小庫存單位
    pub fn round_up(&self, qty: Decimal) -> Decimal {
        qty.round_dp_with_strategy(self.decimal_places(), RoundingStrategy::ToPositiveInfinity)
    }
}

/// 庫存品項
///
/// `available` 一律由 `on_hand - allocated` 推導，不落地保存。
/// 缺料期間允許為負值，必須原樣呈現而不是壓到零。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// 物料ID
    pub id: String,

    /// 品名
    pub name: String,

    /// 計量單位
    pub uom: UnitOfMeasure,

    /// 現有庫存
    pub on_hand: Decimal,

    /// 已分配數量（鎖定）
    pub allocated: Decimal,

    /// 在途數量（未結案採購單的合計）
    pub incoming: Decimal,

    /// 再訂購點
    pub reorder_point: Option<Decimal>,

    /// 標準成本（過帳用單位成本）
    pub standard_cost: Decimal,
}

impl Item {
    /// 創建新的品項
    pub fn new(id: String, name: String, uom: UnitOfMeasure) -> Self {
        Self {
            id,
            name,
            uom,
            on_hand: Decimal::ZERO,
            allocated: Decimal::ZERO,
            incoming: Decimal::ZERO,
            reorder_point: None,
            standard_cost: Decimal::ZERO,
        }
    }

    /// 建構器模式：設置現有庫存
    pub fn with_on_hand(mut self, on_hand: Decimal) -> Self {
        self.on_hand = on_hand;
        self
    }

    /// 建構器模式：設置在途數量
    pub fn with_incoming(mut self, incoming: Decimal) -> Self {
        self.incoming = incoming;
        self
    }

    /// 建構器模式：設置再訂購點
    pub fn with_reorder_point(mut self, reorder_point: Decimal) -> Self {
        self.reorder_point = Some(reorder_point);
        self
    }

    /// 建構器模式：設置標準成本
    pub fn with_standard_cost(mut self, standard_cost: Decimal) -> Self {
        self.standard_cost = standard_cost;
        self
    }

    /// 可用庫存（現有 - 已分配），即時推導
    pub fn available(&self) -> Decimal {
        self.on_hand - self.allocated
    }

    /// 檢查可用庫存是否低於再訂購點
    pub fn is_below_reorder_point(&self) -> bool {
        match self.reorder_point {
            Some(rop) => self.available() < rop,
            None => false,
        }
    }

    /// 獲取需要補充的數量
    pub fn replenishment_needed(&self) -> Decimal {
        match self.reorder_point {
            Some(rop) if self.available() < rop => rop - self.available(),
            _ => Decimal::ZERO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_create_item() {
        let item = Item::new(
            "GEAR-001".to_string(),
            "齒輪".to_string(),
            UnitOfMeasure::Each,
        )
        .with_on_hand(Decimal::from(100))
        .with_reorder_point(Decimal::from(20));

        assert_eq!(item.on_hand, Decimal::from(100));
        assert_eq!(item.allocated, Decimal::ZERO);
        assert_eq!(item.available(), Decimal::from(100));
        assert!(!item.is_below_reorder_point());
    }

    #[test]
    fn test_available_is_derived() {
        let mut item = Item::new(
            "STEEL-001".to_string(),
            "鋼材".to_string(),
            UnitOfMeasure::Kilogram,
        )
        .with_on_hand(Decimal::from(50));

        item.allocated = Decimal::from(30);
        assert_eq!(item.available(), Decimal::from(20));

        // 缺料時可用庫存為負值，不可壓到零
        item.on_hand = Decimal::from(10);
        assert_eq!(item.available(), Decimal::from(-20));
    }

    #[test]
    fn test_replenishment_needed() {
        let item = Item::new(
            "BOLT-001".to_string(),
            "螺栓".to_string(),
            UnitOfMeasure::Each,
        )
        .with_on_hand(Decimal::from(5))
        .with_reorder_point(Decimal::from(20));

        assert!(item.is_below_reorder_point());
        assert_eq!(item.replenishment_needed(), Decimal::from(15));
    }

    #[rstest]
    #[case(UnitOfMeasure::Each, "10.1", "11")]
    #[case(UnitOfMeasure::Each, "10.0", "10")]
    #[case(UnitOfMeasure::Kilogram, "10.5", "10.5")]
    #[case(UnitOfMeasure::Kilogram, "10.50001", "10.501")]
    #[case(UnitOfMeasure::Meter, "0.0001", "0.001")]
    fn test_round_up_to_stockable_unit(
        #[case] uom: UnitOfMeasure,
        #[case] input: &str,
        #[case] expected: &str,
    ) {
        let qty: Decimal = input.parse().unwrap();
        let expected: Decimal = expected.parse().unwrap();
        assert_eq!(uom.round_up(qty), expected);
    }
}
