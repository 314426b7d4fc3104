use proptest::prelude::*;
use proptest::test_runner::Config as ProptestConfig;

use kernelforge::CompileError;
use kernelforge::codegen::{BufferInjector, KernelNameInjector, Template};
use kernelforge::ir::{
    Axis, AxiswiseScale, CodegenConfig, Deconvolution2D, Graph, Order, PlaceholderTable,
    VariableRole, allocate, build_schedule, plan_liveness,
};

fn axis_permutations() -> impl Strategy<Value = (Vec<Axis>, Vec<Axis>)> {
    (1usize..=Axis::ALL.len()).prop_flat_map(|rank| {
        let axes = Axis::ALL[..rank].to_vec();
        (Just(axes.clone()).prop_shuffle(), Just(axes).prop_shuffle())
    })
}

proptest! {
    #![proptest_config(ProptestConfig {
        failure_persistence: None,
        .. ProptestConfig::default()
    })]

    #[test]
    fn permutations_share_axes((lhs, rhs) in axis_permutations()) {
        let a = Order::new(lhs.clone()).expect("distinct axes");
        let b = Order::new(rhs.clone()).expect("distinct axes");
        prop_assert!(a.check_same_axes(&b));
        prop_assert!(b.check_same_axes(&a));
        prop_assert_eq!(a == b, lhs == rhs);
    }

    #[test]
    fn deconvolution_extent_follows_formula(
        input in 1usize..16,
        ksize in 1usize..6,
        stride in 1usize..4,
        padding in 0usize..4,
    ) {
        let mut graph = Graph::new();
        let x = graph
            .add_input("x", vec![1usize.into(), 1usize.into(), input.into(), input.into()], Order::nchw())
            .expect("input");
        let w = graph
            .add_weight("w", vec![1usize.into(), 1usize.into(), ksize.into(), ksize.into()], Order::nchw())
            .expect("weight");
        let op = graph.add_operator(None, Deconvolution2D::new(ksize, stride, padding).expect("params"));

        let expected = (input as i64 - 1) * stride as i64 - 2 * padding as i64 + ksize as i64;
        match graph.apply(op, &[x, w]) {
            Ok(outputs) => {
                prop_assert!(expected > 0);
                let y = graph.variable(outputs[0]).expect("y");
                prop_assert_eq!(y.extent(Axis::H).expect("H").as_value(), Some(expected));
                prop_assert_eq!(y.extent(Axis::W).expect("W").as_value(), Some(expected));
            }
            Err(err) => {
                prop_assert!(expected <= 0, "unexpected failure: {}", err);
                prop_assert!(matches!(err, CompileError::ShapeMismatch { .. }), "expected ShapeMismatch, got: {}", err);
            }
        }
    }

    #[test]
    fn binding_is_idempotent(value in 0i64..10_000, other in 0i64..10_000) {
        let mut table = PlaceholderTable::new();
        let id = table.create("N");
        prop_assert!(table.bind(id, value).expect("first bind"));
        prop_assert!(!table.bind(id, value).expect("same value"));
        if other != value {
            prop_assert!(table.bind(id, other).is_err());
        }
        prop_assert_eq!(table.bound_value(id).expect("known"), Some(value));
    }

    #[test]
    fn token_free_text_is_untouched(text in "[a-zA-Z0-9 ;(){}*+=\n]{0,96}") {
        let table = PlaceholderTable::new();
        let mut injector = BufferInjector::new(&table);
        let template = Template::parse(&text);
        prop_assert_eq!(template.render(), text.clone());
        let injected = injector.inject(&template).expect("no roles");
        prop_assert_eq!(injected.render(), text);
    }

    #[test]
    fn entry_names_are_unique(names in proptest::collection::vec("[a-z_ .-]{0,6}", 1..24)) {
        let mut graph = Graph::new();
        let ops = names
            .iter()
            .map(|name| graph.add_operator(Some(name.as_str()), AxiswiseScale::new(Axis::C)))
            .collect::<Vec<_>>();
        let mut entry_names = ops
            .iter()
            .map(|op| KernelNameInjector::new(graph.operator(*op).expect("op")).name().to_string())
            .collect::<Vec<_>>();
        prop_assert!(entry_names.iter().all(|name| name.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '_')));
        entry_names.sort();
        entry_names.dedup();
        prop_assert_eq!(entry_names.len(), ops.len());
    }

    #[test]
    fn live_intermediates_never_share_bytes(
        widths in proptest::collection::vec(1usize..9, 1..4),
        depth in 1usize..6,
    ) {
        let mut graph = Graph::new();
        for (branch, width) in widths.iter().enumerate() {
            let x = graph
                .add_input(format!("x{branch}"), vec![2usize.into(), (*width).into()], Order::nc())
                .expect("input");
            let s = graph
                .add_weight(format!("s{branch}"), vec![(*width).into()], Order::c())
                .expect("weight");
            let mut current = x;
            for _ in 0..depth {
                let op = graph.add_operator(None, AxiswiseScale::new(Axis::C));
                current = graph.apply(op, &[current, s]).expect("apply")[0];
            }
            graph.mark_output(current).expect("output");
        }

        let schedule = build_schedule(&graph).expect("schedule");
        let liveness = plan_liveness(&graph, &schedule).expect("liveness");
        let layout = allocate(&graph, &schedule, &liveness, &CodegenConfig::default()).expect("allocate");

        let dynamic = graph
            .variables()
            .iter()
            .filter(|variable| variable.role != VariableRole::Weight)
            .collect::<Vec<_>>();
        for (i, a) in dynamic.iter().enumerate() {
            for b in &dynamic[i + 1..] {
                let la = liveness.interval(a.id).expect("interval");
                let lb = liveness.interval(b.id).expect("interval");
                if !la.overlaps(lb) {
                    continue;
                }
                let (start_a, end_a) = layout.get(a.id).expect("a").byte_range().expect("resolved");
                let (start_b, end_b) = layout.get(b.id).expect("b").byte_range().expect("resolved");
                prop_assert!(end_a <= start_b || end_b <= start_a, "{} and {} overlap", a.name, b.name);
            }
        }
    }
}
