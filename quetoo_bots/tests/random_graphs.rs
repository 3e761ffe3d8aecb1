// Randomized navigation graphs built from the bot PRNG. A plain adjacency
// list keyed by original node number serves as the reference: deleting
// nodes must match it after renumbering, and the `.nav` codec must
// reproduce any graph bit for bit.

use quetoo_bots::BotRng;
use quetoo_nav::graph::remap_after_removal;
use quetoo_nav::navfile;
use quetoo_nav::{NavGraph, NodeId, Vec3};

/// Reference links per original node: (original target, cost).
type Model = Vec<Vec<(u32, f32)>>;

fn random_graph(rng: &mut BotRng) -> (NavGraph, Model) {
    let mut graph = NavGraph::new();
    let count = rng.range_u32(2, 40);
    for _ in 0..count {
        let position = Vec3::new(
            rng.range_f32(-4096.0, 4096.0),
            rng.range_f32(-4096.0, 4096.0),
            rng.range_f32(-512.0, 512.0),
        );
        graph.create_node(position);
    }

    let mut model: Model = vec![Vec::new(); count as usize];
    for _ in 0..rng.range_u32(0, count * 4) {
        let a = rng.range_u32(0, count);
        let b = rng.range_u32(0, count);
        let cost = rng.range_f32(1.0, 512.0);
        let created = graph.create_link(NodeId(a), NodeId(b), cost).unwrap();
        let expected = a != b && !model[a as usize].iter().any(|&(t, _)| t == b);
        assert_eq!(created, expected);
        if created {
            model[a as usize].push((b, cost));
        }
    }
    (graph, model)
}

fn assert_matches_model(graph: &NavGraph, model: &Model, alive: &[u32]) {
    assert_eq!(graph.node_count(), alive.len());
    for (node, &original) in graph.nodes().iter().zip(alive) {
        let expected: Vec<(NodeId, u32)> = model[original as usize]
            .iter()
            .filter_map(|&(target, cost)| {
                let index = alive.iter().position(|&a| a == target)?;
                Some((NodeId(index as u32), cost.to_bits()))
            })
            .collect();
        let actual: Vec<(NodeId, u32)> =
            node.links.iter().map(|l| (l.target, l.cost.to_bits())).collect();
        assert_eq!(actual, expected, "links of original node {original}");
    }
}

fn assert_same_graph(a: &NavGraph, b: &NavGraph) {
    assert_eq!(a.node_count(), b.node_count());
    for (x, y) in a.nodes().iter().zip(b.nodes()) {
        assert_eq!(x.position.bits(), y.position.bits());
        let xs: Vec<(NodeId, u32)> = x.links.iter().map(|l| (l.target, l.cost.to_bits())).collect();
        let ys: Vec<(NodeId, u32)> = y.links.iter().map(|l| (l.target, l.cost.to_bits())).collect();
        assert_eq!(xs, ys);
    }
}

#[test]
fn deletions_renumber_like_the_reference() {
    for seed in 0..32 {
        let mut rng = BotRng::new(seed);
        let (mut graph, model) = random_graph(&mut rng);
        let mut alive: Vec<u32> = (0..graph.node_count() as u32).collect();
        let mut cached = Some(NodeId(rng.range_u32(0, alive.len() as u32)));
        let cached_original = cached.map(|id| alive[id.index()]);

        while !alive.is_empty() {
            let victim = rng.range_u32(0, alive.len() as u32);
            let generation = graph.generation();
            graph.destroy_node(NodeId(victim)).unwrap();
            alive.remove(victim as usize);
            cached = cached.and_then(|id| remap_after_removal(id, NodeId(victim)));

            assert!(graph.generation() > generation);
            assert_matches_model(&graph, &model, &alive);
            let still_there = cached_original.filter(|o| alive.contains(o));
            assert_eq!(cached.map(|id| alive[id.index()]), still_there, "seed {seed}");
        }
        assert!(graph.is_empty());
    }
}

#[test]
fn nav_files_reproduce_random_graphs() {
    for seed in 100..132 {
        let mut rng = BotRng::new(seed);
        let (mut graph, _) = random_graph(&mut rng);
        // Knock out a few nodes so renumbered targets are written too.
        for _ in 0..rng.range_u32(0, 4) {
            if graph.node_count() > 1 {
                let victim = rng.range_u32(0, graph.node_count() as u32);
                graph.destroy_node(NodeId(victim)).unwrap();
            }
        }

        let bytes = navfile::encode(&graph).unwrap();
        let restored = navfile::read_graph(&mut bytes.as_slice()).unwrap();
        assert_same_graph(&graph, &restored);
        assert_eq!(restored.link_count(), graph.link_count());
        assert_eq!(navfile::encode(&restored).unwrap(), bytes, "seed {seed}");
    }
}
