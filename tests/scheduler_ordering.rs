//! Dependency ordering of the write queue
//!
//! Whatever order files are touched in, every dependency must be queued
//! before its dependents and each path must appear once.

use nitro_modkit::{DependencySource, Folder, GameFile, NitroError, Result, UpdateQueue};
use proptest::prelude::*;
use std::collections::HashMap;

/// Graph held in a map, keyed by path
struct Graph(HashMap<String, Vec<String>>);

impl DependencySource for Graph {
    fn dependencies_of(&self, path: &str) -> Result<Vec<String>> {
        self.0
            .get(path)
            .cloned()
            .ok_or_else(|| NitroError::NotFound(path.to_string()))
    }
}

fn node(i: usize) -> String {
    format!("/n{}", i)
}

/// `/root/a` depends on `b`, which depends on `c`
fn chain() -> Folder {
    let mut root = Folder::new("root");
    let mut a = GameFile::new("a", vec![1]);
    a.add_dependency("/root/b");
    let mut b = GameFile::new("b", vec![2]);
    b.add_dependency("/root/c");
    root.add_file(a);
    root.add_file(b);
    root.add_file(GameFile::new("c", vec![3]));
    root
}

fn permutations(items: &[&'static str]) -> Vec<Vec<&'static str>> {
    if items.len() <= 1 {
        return vec![items.to_vec()];
    }
    let mut out = Vec::new();
    for i in 0..items.len() {
        let mut rest = items.to_vec();
        let head = rest.remove(i);
        for mut tail in permutations(&rest) {
            tail.insert(0, head);
            out.push(tail);
        }
    }
    out
}

#[test]
fn test_chain_in_every_touch_order() {
    let root = chain();
    for order in permutations(&["/root/a", "/root/b", "/root/c"]) {
        let mut queue = UpdateQueue::new();
        for path in &order {
            queue.enqueue(&root, path).unwrap();
        }
        assert_eq!(
            queue.paths(),
            &["/root/c", "/root/b", "/root/a"],
            "touch order {:?}",
            order
        );
    }
}

#[test]
fn test_custom_source() {
    let mut map = HashMap::new();
    map.insert("/x".to_string(), vec!["/y".to_string()]);
    map.insert("/y".to_string(), vec![]);
    map.insert("/z".to_string(), vec!["/x".to_string(), "/y".to_string()]);
    let graph = Graph(map);

    let mut queue = UpdateQueue::new();
    queue.enqueue(&graph, "/z").unwrap();
    assert_eq!(queue.paths(), &["/y", "/x", "/z"]);
}

#[test]
fn test_long_cycle_is_reported() {
    let mut map = HashMap::new();
    for i in 0..5 {
        map.insert(node(i), vec![node((i + 1) % 5)]);
    }
    let graph = Graph(map);

    let mut queue = UpdateQueue::new();
    let err = queue.enqueue(&graph, &node(0)).unwrap_err();
    assert!(matches!(err, NitroError::DependencyCycle(_)));
    assert!(err.is_fatal());
    assert!(queue.is_empty());
}

#[test]
fn test_queue_iterates_in_order() {
    let root = chain();
    let mut queue = UpdateQueue::new();
    queue.enqueue(&root, "/root/a").unwrap();

    let walked: Vec<&String> = (&queue).into_iter().collect();
    assert_eq!(walked.len(), 3);
    assert_eq!(queue.position("/root/a"), Some(2));
    assert_eq!(queue.take().len(), 3);
    assert!(queue.is_empty());
}

proptest! {
    #[test]
    fn prop_dependencies_precede_dependents(
        edges in prop::collection::vec(prop::collection::vec(any::<prop::sample::Index>(), 0..4), 1..24),
        touches in prop::collection::vec(any::<prop::sample::Index>(), 1..24),
    ) {
        // Node i only depends on lower-numbered nodes, so the graph is acyclic
        let count = edges.len();
        let mut map = HashMap::new();
        for (i, deps) in edges.iter().enumerate() {
            let deps: Vec<String> = if i == 0 {
                Vec::new()
            } else {
                deps.iter().map(|d| node(d.index(i))).collect()
            };
            map.insert(node(i), deps);
        }
        let graph = Graph(map);

        let mut queue = UpdateQueue::new();
        for touch in &touches {
            queue.enqueue(&graph, &node(touch.index(count))).unwrap();
        }

        let paths = queue.paths();
        let mut seen = std::collections::HashSet::new();
        for path in paths {
            prop_assert!(seen.insert(path.clone()), "{} queued twice", path);
        }
        for touch in &touches {
            prop_assert!(queue.contains(&node(touch.index(count))));
        }
        for (i, path) in paths.iter().enumerate() {
            for dep in graph.dependencies_of(path).unwrap() {
                let at = queue.position(&dep);
                prop_assert!(at.is_some(), "{} missing", dep);
                prop_assert!(at.unwrap() < i, "{} queued after {}", dep, path);
            }
        }
    }
}
