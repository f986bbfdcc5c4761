use devcast::{DevcastError, Source, Topology, plan};

#[tokio::test]
async fn test_flat_graph_shape() {
    for n in 1..=32u32 {
        let g = plan(n, &Topology::Flat).unwrap();
        g.validate().unwrap();
        assert_eq!(g.edges().len() as u32, n);
        assert_eq!(g.host_fed().len() as u32, n);
        assert_eq!(g.depth(), 1, "flat broadcast is a single wave");
    }
}

#[tokio::test]
async fn test_grouped_graph_invariants() {
    for n in 1..=48u32 {
        let g = plan(n, &Topology::grouped()).unwrap();
        g.validate().unwrap_or_else(|e| panic!("n={n}: {e}"));

        // Exactly one incoming edge per device.
        assert_eq!(g.edges().len() as u32, n, "n={n}");

        // Host egress is bounded by the two seeded leaders.
        assert!(g.host_fed().len() <= 2, "n={n}");

        // Non-leaders always pull from their own group leader.
        for d in 0..n {
            if d % 4 != 0 {
                assert_eq!(
                    g.source_of(d),
                    Some(Source::Device((d / 4) * 4)),
                    "n={n} device={d}"
                );
            }
        }
    }
}

#[tokio::test]
async fn test_grouped_depth_scales_logarithmically() {
    // Depth = host hop + leader-tree hops + member hop; the leader tree
    // is a heap over ceil(n/4) groups.
    for (n, max_depth) in [(4u32, 2u32), (8, 2), (16, 4), (32, 5), (64, 6), (128, 7)] {
        let g = plan(n, &Topology::grouped()).unwrap();
        assert!(
            g.depth() <= max_depth,
            "n={n}: depth {} exceeds {max_depth}",
            g.depth()
        );
    }
}

#[tokio::test]
async fn test_grouped_reference_layout_eight_devices() {
    let g = plan(8, &Topology::grouped()).unwrap();
    let mut host_fed = g.host_fed();
    host_fed.sort_unstable();
    assert_eq!(host_fed, vec![0, 4]);
    assert_eq!(g.children_of(0), vec![1, 2, 3]);
    assert_eq!(g.children_of(4), vec![5, 6, 7]);
}

#[tokio::test]
async fn test_unsupported_topologies_rejected() {
    assert!(matches!(
        plan(0, &Topology::grouped()),
        Err(DevcastError::UnsupportedTopology { .. })
    ));
    assert!(matches!(
        plan(8, &Topology::GroupedTree { group_size: 0 }),
        Err(DevcastError::UnsupportedTopology { .. })
    ));
}
