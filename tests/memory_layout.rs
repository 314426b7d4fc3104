use kernelforge::ir::{
    Axis, AxiswiseScale, BufferSpace, CodegenConfig, Graph, MemoryLayout, Order, Placeholder,
    VariableId, allocate, build_schedule, plan_liveness, verify_layout,
};

fn layout_with(graph: &Graph, config: &CodegenConfig) -> MemoryLayout {
    let schedule = build_schedule(graph).expect("schedule");
    let liveness = plan_liveness(graph, &schedule).expect("liveness");
    allocate(graph, &schedule, &liveness, config).expect("allocate")
}

fn scale_chain(length: usize, channels: usize) -> (Graph, Vec<VariableId>) {
    let mut graph = Graph::new();
    let x = graph
        .add_input("x", vec![2usize.into(), channels.into()], Order::nc())
        .expect("input");
    let s = graph
        .add_weight("s", vec![channels.into()], Order::c())
        .expect("weight");
    let mut current = x;
    let mut produced = Vec::new();
    for _ in 0..length {
        let op = graph.add_operator(None, AxiswiseScale::new(Axis::C));
        current = graph.apply(op, &[current, s]).expect("apply")[0];
        produced.push(current);
    }
    graph.mark_output(current).expect("output");
    (graph, produced)
}

#[test]
fn long_chain_reuses_two_arena_slots() {
    let (graph, produced) = scale_chain(10, 4);
    let layout = layout_with(&graph, &CodegenConfig::default());
    verify_layout(&graph, &layout).expect("verify");

    // x and y hold 32 bytes each; intermediates ping-pong between two slots.
    assert_eq!(
        layout.total_size(BufferSpace::Dynamic),
        &Placeholder::Value(128)
    );
    let offsets = produced[..produced.len() - 1]
        .iter()
        .map(|id| layout.get(*id).expect("allocated").offset.as_value())
        .collect::<std::collections::BTreeSet<_>>();
    assert_eq!(offsets.len(), 2);
}

#[test]
fn fan_out_keeps_siblings_apart() {
    let mut graph = Graph::new();
    let x = graph
        .add_input("x", vec![2usize.into(), 4usize.into()], Order::nc())
        .expect("input");
    let s = graph
        .add_weight("s", vec![4usize.into()], Order::c())
        .expect("weight");
    let mut outputs = Vec::new();
    for branch in ["left", "right"] {
        let first = graph.add_operator(Some(branch), AxiswiseScale::new(Axis::C));
        let t = graph.apply(first, &[x, s]).expect("apply")[0];
        let second = graph.add_operator(None, AxiswiseScale::new(Axis::C));
        let y = graph.apply(second, &[t, s]).expect("apply")[0];
        graph.mark_output(y).expect("output");
        outputs.push(y);
    }

    let layout = layout_with(&graph, &CodegenConfig::default());
    verify_layout(&graph, &layout).expect("verify");
    let left = layout.get(outputs[0]).expect("left").byte_range().expect("resolved");
    let right = layout.get(outputs[1]).expect("right").byte_range().expect("resolved");
    assert!(left.1 <= right.0 || right.1 <= left.0);
}

#[test]
fn offsets_follow_configured_alignment() {
    let (graph, _) = scale_chain(3, 3);
    let config = CodegenConfig::default().with_alignment(64);
    let layout = layout_with(&graph, &config);
    assert_eq!(layout.alignment_bytes(), 64);
    for allocation in layout.allocations() {
        let (start, end) = allocation.byte_range().expect("resolved");
        assert_eq!(start % 64, 0, "{} starts at {start}", allocation.name);
        assert_eq!((end - start) % 64, 0);
    }
}

#[test]
fn static_buffer_holds_every_weight_back_to_back() {
    let mut graph = Graph::new();
    let x = graph
        .add_input("x", vec![1usize.into(), 3usize.into()], Order::nc())
        .expect("input");
    let s3 = graph
        .add_weight("s3", vec![3usize.into()], Order::c())
        .expect("weight");
    let op = graph.add_operator(None, AxiswiseScale::new(Axis::C));
    let y = graph.apply(op, &[x, s3]).expect("apply")[0];
    graph.mark_output(y).expect("output");
    let s5 = graph
        .add_weight("s5", vec![5usize.into()], Order::c())
        .expect("weight");

    let layout = layout_with(&graph, &CodegenConfig::default());
    assert_eq!(layout.get(s3).expect("s3").byte_range(), Some((0, 16)));
    assert_eq!(layout.get(s5).expect("s5").byte_range(), Some((16, 48)));
    assert_eq!(layout.total_size(BufferSpace::Static), &Placeholder::Value(48));
}

#[test]
fn symbolic_total_resolves_after_binding() {
    let mut graph = Graph::new();
    let n = graph.symbol("N");
    let x = graph
        .add_input("x", vec![Placeholder::symbol(n), 4usize.into()], Order::nc())
        .expect("input");
    let s = graph
        .add_weight("s", vec![4usize.into()], Order::c())
        .expect("weight");
    let op = graph.add_operator(None, AxiswiseScale::new(Axis::C));
    let y = graph.apply(op, &[x, s]).expect("apply")[0];
    graph.mark_output(y).expect("output");

    let layout = layout_with(&graph, &CodegenConfig::default());
    let total = layout.total_size(BufferSpace::Dynamic).clone();
    assert!(total.as_value().is_none());
    assert_eq!(layout.unresolved().count(), 2);

    graph.bind(n, 3).expect("bind");
    assert_eq!(
        graph.placeholders().evaluate(&total).expect("evaluate"),
        Some(96)
    );
    let rebuilt = layout_with(&graph, &CodegenConfig::default());
    assert_eq!(rebuilt.unresolved().count(), 0);
    assert_eq!(
        rebuilt.total_size(BufferSpace::Dynamic),
        &Placeholder::Value(96)
    );
}
