//! FILENAME: core/pivot-engine/tests/common/mod.rs
//! Fixtures shared by the pivot-engine integration tests.

#![allow(dead_code)]

use pivot_engine::{
    AggregateFunction, FieldType, MemoryExecutor, MemoryTable, PivotDefinition, ScalarValue,
    SortDirection,
};

// ============================================================================
// SALES DATA
// ============================================================================

/// Twelve sales records over three regions, two products and two quarters.
pub struct SalesFixture;

impl SalesFixture {
    pub const TABLE: &'static str = "sales";

    pub fn headers() -> Vec<&'static str> {
        vec!["region", "product", "quarter", "sales", "quantity"]
    }

    pub fn data() -> Vec<(&'static str, &'static str, &'static str, f64, f64)> {
        vec![
            ("North", "Widget", "Q1", 10000.0, 100.0),
            ("North", "Widget", "Q2", 12000.0, 120.0),
            ("North", "Gadget", "Q1", 8000.0, 80.0),
            ("North", "Gadget", "Q2", 9000.0, 90.0),
            ("South", "Widget", "Q1", 15000.0, 150.0),
            ("South", "Widget", "Q2", 14000.0, 140.0),
            ("South", "Gadget", "Q1", 11000.0, 110.0),
            ("South", "Gadget", "Q2", 13000.0, 130.0),
            ("East", "Widget", "Q1", 9000.0, 90.0),
            ("East", "Widget", "Q2", 11000.0, 110.0),
            ("East", "Gadget", "Q1", 7000.0, 70.0),
            ("East", "Gadget", "Q2", 8500.0, 85.0),
        ]
    }

    pub fn table() -> MemoryTable {
        let mut table = MemoryTable::new(Self::headers());
        for (region, product, quarter, sales, quantity) in Self::data() {
            table
                .push_record(vec![
                    region.into(),
                    product.into(),
                    quarter.into(),
                    sales.into(),
                    quantity.into(),
                ])
                .unwrap();
        }
        table
    }

    pub fn executor() -> MemoryExecutor {
        MemoryExecutor::new().with_table(Self::TABLE, Self::table())
    }

    /// Catalogue only: no rows, columns or aggregates yet.
    pub fn definition() -> PivotDefinition {
        let mut def = PivotDefinition::new(Self::TABLE);
        def.add_source_field("region", "Region", FieldType::Text);
        def.add_source_field("product", "Product", FieldType::Text);
        def.add_source_field("quarter", "Quarter", FieldType::Text);
        def.add_source_field("sales", "Sales", FieldType::Number);
        def.add_source_field("quantity", "Quantity", FieldType::Int);
        def
    }

    /// SUM(sales) with two decimals.
    pub fn with_sales_sum(mut def: PivotDefinition, order: SortDirection) -> PivotDefinition {
        def.add_aggregate("sales", "sales", "Sales", AggregateFunction::Sum, 2, order)
            .unwrap();
        def
    }
}

// ============================================================================
// ZONE / PERIOD DATA
// ============================================================================

/// Three sale records: North sells in two periods, South in one.
pub struct ZoneFixture;

impl ZoneFixture {
    pub fn executor() -> MemoryExecutor {
        let mut table = MemoryTable::new(["zone", "period", "sale"]);
        for (zone, period, sale) in [
            ("North", "2017-01", 100.0),
            ("North", "2017-02", 50.0),
            ("South", "2017-01", 30.0),
        ] {
            table
                .push_record(vec![zone.into(), period.into(), sale.into()])
                .unwrap();
        }
        MemoryExecutor::new().with_table("sales", table)
    }

    pub fn definition() -> PivotDefinition {
        let mut def = PivotDefinition::new("sales");
        def.add_source_field("zone", "Zone", FieldType::Text);
        def.add_source_field("period", "Period", FieldType::Text);
        def.add_source_field("sale", "Sale", FieldType::Number);
        def.add_row("zone").unwrap();
        def.add_column("period").unwrap();
        def.add_aggregate("sale", "sale", "Sale", AggregateFunction::Sum, 2, SortDirection::None)
            .unwrap();
        def
    }
}

// ============================================================================
// ASSERTION HELPERS
// ============================================================================

pub fn text(value: &str) -> ScalarValue {
    ScalarValue::Text(value.to_string())
}

/// Assert the formatted value under `key` at `path` of a tree.
pub fn assert_tree_value(tree: &pivot_engine::ResultTree, path: &[&str], key: &str, expected: &str) {
    let values = tree
        .root()
        .search_value(path)
        .unwrap_or_else(|| panic!("no values at {:?}", path));
    assert_eq!(values.get(key), Some(&text(expected)), "value of {} at {:?}", key, path);
}
