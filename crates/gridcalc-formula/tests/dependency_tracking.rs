//! Feeding resolved addresses into the dependency graph

use gridcalc_core::CellError;
use gridcalc_formula::{
    flag_self_references, CellKey, CompileResult, DependencyGraph, EvaluationScope, FormulaError,
    FormulaParser, MemoryDataProvider, ParsingConfiguration,
};
use pretty_assertions::assert_eq;

/// Test that the address cache lists every resolved address
#[test]
fn test_address_cache_after_parse() {
    let mut provider = MemoryDataProvider::new();
    provider.set_value("Sheet1", "A1", 1.0).unwrap();
    provider.set_value("Data", "B2", 2.0).unwrap();

    let parser = FormulaParser::new(&provider);
    let scope = EvaluationScope::new("Sheet1", 0, 2);
    let result = parser.parse("=A1+Data!B2+SUM(A1:A10)", &scope).unwrap();
    assert_eq!(result.result_numeric(), 4.0);

    let cache = parser.address_cache();
    let ids: Vec<u32> = cache.ids().collect();
    assert_eq!(ids, vec![1, 2, 3]);
    assert_eq!(cache.get(1), Some("Sheet1!A1"));
    assert_eq!(cache.get(2), Some("Data!B2"));
    assert_eq!(cache.get(3), Some("Sheet1!A1:A10"));
}

/// Test recalculation order built from parsed formulas
#[test]
fn test_recalc_order_from_parses() {
    let mut provider = MemoryDataProvider::new();
    provider.set_value("Sheet1", "A1", 1.0).unwrap();
    let parser = FormulaParser::new(&provider);
    let mut graph = DependencyGraph::new();

    // B1 = A1*2, C1 = SUM(A1:B1)
    let b1 = EvaluationScope::new("Sheet1", 0, 1);
    parser.parse("=A1*2", &b1).unwrap();
    graph.record_references(&CellKey::from_scope(&b1), &parser.address_cache());

    let c1 = EvaluationScope::new("Sheet1", 0, 2);
    parser.parse("=SUM(A1:B1)", &c1).unwrap();
    graph.record_references(&CellKey::from_scope(&c1), &parser.address_cache());

    let a1 = CellKey::new("Sheet1", 0, 0);
    assert_eq!(
        graph.get_recalc_order(&[a1.clone()]),
        vec![a1, CellKey::from_scope(&b1), CellKey::from_scope(&c1)]
    );
    assert!(!graph.has_circular_reference(&CellKey::from_scope(&c1)));
}

/// Test a formula that reads its own cell
#[test]
fn test_self_reference() {
    let provider = MemoryDataProvider::new();
    let a3 = EvaluationScope::new("Sheet1", 2, 0);

    let parser = FormulaParser::new(&provider);
    let mut graph = parser.build_graph("=SUM(A1:A5)+1").unwrap();
    assert_eq!(flag_self_references(&mut graph, &a3), 1);
    let err = parser.compile_graph(&mut graph, &a3).unwrap_err();
    assert!(matches!(err, FormulaError::CircularReference(_)));

    let lenient = FormulaParser::new(&provider)
        .with_configuration(ParsingConfiguration::default().with_circular_references(true));
    let mut graph = lenient.build_graph("=A3+1").unwrap();
    assert_eq!(flag_self_references(&mut graph, &a3), 1);
    assert_eq!(
        lenient.compile_graph(&mut graph, &a3).unwrap().result_numeric(),
        1.0
    );

    // Other sheets are not the evaluated cell
    let mut graph = parser.build_graph("=Other!A3+1").unwrap();
    assert_eq!(flag_self_references(&mut graph, &a3), 0);
    assert_eq!(
        parser.compile_graph(&mut graph, &a3).unwrap().result_numeric(),
        1.0
    );
}

/// Test that an error inside a function does not hide a circular reference
#[test]
fn test_circular_reference_escapes_functions() {
    let provider = MemoryDataProvider::new();
    let a1 = EvaluationScope::new("Sheet1", 0, 0);
    let parser = FormulaParser::new(&provider);

    let mut graph = parser.build_graph("=IFERROR(A1,0)").unwrap();
    flag_self_references(&mut graph, &a1);
    assert!(parser.compile_graph(&mut graph, &a1).is_err());

    let mut graph = parser.build_graph("=IFERROR(1/0,0)").unwrap();
    assert_eq!(flag_self_references(&mut graph, &a1), 0);
    assert_eq!(
        parser.compile_graph(&mut graph, &a1).unwrap(),
        CompileResult::integer(0.0)
    );

    let mut graph = parser.build_graph("=1/0").unwrap();
    assert_eq!(
        parser.compile_graph(&mut graph, &a1).unwrap(),
        CompileResult::error(CellError::Div0)
    );
}
