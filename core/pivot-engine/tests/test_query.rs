//! FILENAME: core/pivot-engine/tests/test_query.rs
//! Integration tests for the pivot query pipeline.

mod common;

use common::{assert_tree_value, text, SalesFixture, ZoneFixture};
use pivot_engine::{
    AggregateFunction, DistinctRequest, ExecutionError, FilterOperator, FlatRequest, FlatRow,
    IntegrityError, PivotError, PivotQuery, QueryExecutor, ScalarValue, ShapeError, SortDirection,
};

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

fn captions(tree: &pivot_engine::ResultTree, path: &[&str]) -> Vec<String> {
    tree.root()
        .search(path)
        .unwrap()
        .children()
        .map(|c| c.caption().to_string())
        .collect()
}

/// Returns the same rows for every request.
struct FixedExecutor(Vec<FlatRow>);

impl QueryExecutor for FixedExecutor {
    fn execute_flat_query(&self, _request: &FlatRequest) -> Result<Vec<FlatRow>, ExecutionError> {
        Ok(self.0.clone())
    }

    fn distinct_values(&self, _request: &DistinctRequest) -> Result<Vec<ScalarValue>, ExecutionError> {
        Err(ExecutionError::new("not a table"))
    }
}

// ============================================================================
// END-TO-END
// ============================================================================

#[test]
fn test_zone_period_totals_and_details() {
    let def = ZoneFixture::definition();
    let executor = ZoneFixture::executor();
    let result = PivotQuery::new(&executor, &def).query().unwrap();

    let totals = result.totals();
    assert_eq!(totals.root().value("sale"), Some(&text("180.00")));
    assert_tree_value(totals, &["North"], "sale", "150.00");
    assert_tree_value(totals, &["South"], "sale", "30.00");

    let details = result.details().unwrap();
    let north = totals.root().child("North").unwrap();
    let mut path: Vec<String> = vec!["2017-01".to_string()];
    path.extend(north.path().into_iter());
    assert_eq!(details.root().search_value(&path).unwrap().get("sale"), Some(&text("100.00")));

    assert_tree_value(details, &["2017-02", "North"], "sale", "50.00");
    assert_tree_value(details, &["2017-01"], "sale", "130.00");
    assert!(details.root().search_value(&["2017-02", "South"]).is_none());
}

#[test]
fn test_rows_two_levels() {
    let mut def = SalesFixture::with_sales_sum(SalesFixture::definition(), SortDirection::None);
    def.add_row("region").unwrap();
    def.add_row("product").unwrap();
    let result = PivotQuery::new(SalesFixture::executor(), &def).query().unwrap();
    let totals = result.totals();

    assert_eq!(captions(totals, &[]), vec!["North", "South", "East"]);
    assert_eq!(captions(totals, &["South"]), vec!["Widget", "Gadget"]);
    assert_tree_value(totals, &["North"], "sales", "39000.00");
    assert_tree_value(totals, &["South", "Gadget"], "sales", "24000.00");
    assert_tree_value(totals, &[], "sales", "127500.00");
    assert_eq!(totals.root().depth(None), 2);
    assert_eq!(totals.root().horizontal_depth(None), 6);
    assert!(!result.has_details());
}

#[test]
fn test_grand_total_only() {
    let def = SalesFixture::with_sales_sum(SalesFixture::definition(), SortDirection::None);
    let result = PivotQuery::new(SalesFixture::executor(), &def).query().unwrap();

    assert!(!result.totals().root().has_children());
    assert_tree_value(result.totals(), &[], "sales", "127500.00");
}

#[test]
fn test_count_average_min_max() {
    let mut def = SalesFixture::definition();
    def.add_row("region").unwrap();
    for (key, function, decimals) in [
        ("n", AggregateFunction::Count, 0),
        ("avg", AggregateFunction::Average, 1),
        ("low", AggregateFunction::Min, 0),
        ("high", AggregateFunction::Max, 0),
    ] {
        def.add_aggregate("quantity", key, key, function, decimals, SortDirection::None)
            .unwrap();
    }
    let result = PivotQuery::new(SalesFixture::executor(), &def).query().unwrap();
    let totals = result.totals();

    assert_tree_value(totals, &["East"], "n", "4");
    assert_tree_value(totals, &["East"], "avg", "88.8");
    assert_tree_value(totals, &["East"], "low", "70");
    assert_tree_value(totals, &["East"], "high", "110");
    assert_tree_value(totals, &[], "n", "12");
}

#[test]
fn test_generated_aggregate_key() {
    let mut def = SalesFixture::definition();
    let key = def
        .add_aggregate("sales", "", "Sales", AggregateFunction::Sum, 0, SortDirection::None)
        .unwrap();
    let result = PivotQuery::new(SalesFixture::executor(), &def).query().unwrap();

    assert_tree_value(result.totals(), &[], &key, "127500");
}

// ============================================================================
// ORDERING
// ============================================================================

#[test]
fn test_descending_order() {
    let mut def = SalesFixture::with_sales_sum(SalesFixture::definition(), SortDirection::Descending);
    def.add_row("region").unwrap();
    def.add_row("product").unwrap();
    let result = PivotQuery::new(SalesFixture::executor(), &def).query().unwrap();
    let totals = result.totals();

    assert_eq!(captions(totals, &[]), vec!["South", "North", "East"]);
    assert_eq!(captions(totals, &["North"]), vec!["Widget", "Gadget"]);
    assert_eq!(captions(totals, &["East"]), vec!["Widget", "Gadget"]);
}

#[test]
fn test_ascending_order() {
    let mut def = SalesFixture::with_sales_sum(SalesFixture::definition(), SortDirection::Ascending);
    def.add_row("region").unwrap();
    let result = PivotQuery::new(SalesFixture::executor(), &def).query().unwrap();

    assert_eq!(captions(result.totals(), &[]), vec!["East", "North", "South"]);
}

#[test]
fn test_details_tree_keeps_first_seen_order() {
    let mut def = SalesFixture::with_sales_sum(SalesFixture::definition(), SortDirection::Descending);
    def.add_row("region").unwrap();
    def.add_column("quarter").unwrap();
    let result = PivotQuery::new(SalesFixture::executor(), &def).query().unwrap();
    let details = result.details().unwrap();

    assert_eq!(captions(details, &["Q1"]), vec!["North", "South", "East"]);
}

// ============================================================================
// FILTERS
// ============================================================================

#[test]
fn test_in_filter() {
    let mut def = SalesFixture::with_sales_sum(SalesFixture::definition(), SortDirection::None);
    def.add_row("region").unwrap();
    def.add_filter("region", FilterOperator::In, vec!["North", "East"]).unwrap();
    let result = PivotQuery::new(SalesFixture::executor(), &def).query().unwrap();

    assert_eq!(captions(result.totals(), &[]), vec!["North", "East"]);
    assert_tree_value(result.totals(), &[], "sales", "74500.00");
}

#[test]
fn test_contains_and_comparison_filters() {
    let mut def = SalesFixture::with_sales_sum(SalesFixture::definition(), SortDirection::None);
    def.add_filter("product", FilterOperator::Contains, "dg").unwrap();
    def.add_filter("quantity", FilterOperator::Greater, 80i64).unwrap();
    let result = PivotQuery::new(SalesFixture::executor(), &def).query().unwrap();

    // Gadget rows above 80 units: 90 + 110 + 130 + 85
    assert_tree_value(result.totals(), &[], "sales", "41500.00");
}

#[test]
fn test_filter_argument_arity_rejected() {
    let mut def = SalesFixture::definition();
    assert!(def.add_filter("region", FilterOperator::In, "North").is_err());
    assert!(def.add_filter("region", FilterOperator::Equal, vec!["North"]).is_err());
    assert!(def.add_filter("customer", FilterOperator::Equal, "Acme").is_err());
    assert!(def.filters().is_empty());
}

// ============================================================================
// DISTINCT VALUES
// ============================================================================

#[test]
fn test_query_distinct() {
    let def = SalesFixture::definition();
    let executor = SalesFixture::executor();
    let query = PivotQuery::new(&executor, &def);

    assert_eq!(
        query.query_distinct("region").unwrap(),
        vec![text("East"), text("North"), text("South")]
    );
    assert!(matches!(query.query_distinct("customer"), Err(PivotError::Definition(_))));
}

// ============================================================================
// ERRORS
// ============================================================================

#[test]
fn test_nothing_to_query() {
    let def = SalesFixture::definition();
    let err = PivotQuery::new(SalesFixture::executor(), &def).query().unwrap_err();
    assert!(matches!(err, PivotError::Shape(ShapeError::NothingToQuery)));
    assert_eq!(err.to_string(), "Nothing to query");
}

#[test]
fn test_derived_table_not_supported_in_memory() {
    let mut def = SalesFixture::with_sales_sum(SalesFixture::definition(), SortDirection::None);
    def.set_source("SELECT * FROM sales;");
    let err = PivotQuery::new(SalesFixture::executor(), &def).query().unwrap_err();
    assert!(matches!(err, PivotError::Execution(_)));
}

#[test]
fn test_duplicate_rows_are_integrity_error() {
    let mut def = ZoneFixture::definition();
    def.clear_columns();
    let executor = FixedExecutor(vec![
        FlatRow::new().with_group("zone", "North").with_value("sale", 100.0),
        FlatRow::new().with_group("zone", "North").with_value("sale", 50.0),
    ]);
    let err = PivotQuery::new(executor, &def).query().unwrap_err();

    match err {
        PivotError::Integrity(IntegrityError::DuplicateValues { path }) => {
            assert_eq!(path, vec!["North".to_string()]);
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[test]
fn test_collaborator_error_keeps_message() {
    let def = ZoneFixture::definition();
    let err = PivotQuery::new(FixedExecutor(Vec::new()), &def)
        .query_distinct("zone")
        .unwrap_err();
    assert_eq!(err.to_string(), "Query error: not a table");
}
