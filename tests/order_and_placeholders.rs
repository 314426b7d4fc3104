use kernelforge::CompileError;
use kernelforge::ir::{Axis, Graph, Order, Placeholder, PlaceholderTable};

#[test]
fn permuted_orders_share_axes_but_differ() {
    let nchw = Order::nchw();
    let nhwc = Order::nhwc();
    assert!(nchw.check_same_axes(&nhwc));
    assert_ne!(nchw, nhwc);
    assert!(!nchw.check_same_axes(&Order::ntc()));
    assert_eq!(nhwc.to_string(), "NHWC");
}

#[test]
fn missing_axis_reports_order() {
    let err = Order::nc().axis_index(Axis::H).expect_err("NC has no H");
    assert!(matches!(err, CompileError::AxisNotFound { axis: Axis::H, .. }));
    assert!(err.to_string().contains("NC"));
}

#[test]
fn duplicate_axes_are_rejected() {
    let err = Order::new(vec![Axis::N, Axis::C, Axis::N]).expect_err("duplicate N");
    assert!(matches!(err, CompileError::ShapeMismatch { .. }));
}

#[test]
fn change_order_keeps_axis_extent_pairs() {
    let mut graph = Graph::new();
    let x = graph
        .add_input(
            "x",
            vec![2usize.into(), 3usize.into(), 5usize.into(), 7usize.into()],
            Order::nchw(),
        )
        .expect("input");
    graph.change_order(x, Order::hwnc()).expect("same axis set");

    let x = graph.variable(x).expect("x");
    assert_eq!(x.order(), &Order::hwnc());
    let pairs = Axis::ALL
        .iter()
        .filter(|axis| x.order().contains(**axis))
        .map(|axis| (*axis, x.extent(*axis).expect("extent").clone()))
        .collect::<Vec<_>>();
    assert_eq!(
        pairs,
        vec![
            (Axis::N, Placeholder::Value(2)),
            (Axis::C, Placeholder::Value(3)),
            (Axis::H, Placeholder::Value(5)),
            (Axis::W, Placeholder::Value(7)),
        ]
    );
    assert_eq!(x.stride(Axis::H).expect("H"), Placeholder::Value(42));
}

#[test]
fn placeholder_binding_is_idempotent_and_single_assignment() {
    let mut table = PlaceholderTable::new();
    let batch = table.create("batch");
    let expr = Placeholder::symbol(batch) * 3i64 + 1i64;
    assert!(!table.check_resolved(&expr));

    assert!(table.bind(batch, 4).expect("bind"));
    assert!(!table.bind(batch, 4).expect("rebind same value"));
    assert_eq!(table.evaluate(&expr).expect("evaluate"), Some(13));

    let err = table.bind(batch, 5).expect_err("conflict");
    assert!(err.to_string().contains("'batch'"));
    assert_eq!(table.bound_value(batch).expect("known"), Some(4));
}

#[test]
fn negative_bindings_are_rejected() {
    let mut table = PlaceholderTable::new();
    let n = table.create("N");
    let err = table.bind(n, -1).expect_err("negative extent");
    assert!(matches!(err, CompileError::UnsupportedConfiguration { .. }));
    assert_eq!(table.bound_value(n).expect("known"), None);
}
