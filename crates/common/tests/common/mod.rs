//! Shared test utilities for collection tree integration tests
#![allow(dead_code)]

use std::collections::HashSet;

use common::collection::{NameOrder, Node, NodeId, SiblingOrder};
use common::config::TreeConfig;
use common::store::MemoryTreeBackend;
use common::tree::Tree;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

pub type TestTree = Tree<MemoryTreeBackend>;

/// Root → Pies → { Savoury, Sweet }
pub struct Pies {
    pub tree: TestTree,
    pub root: Node,
    pub pies: Node,
    pub savoury: Node,
    pub sweet: Node,
}

/// Route engine logs to the test output, filtered by `RUST_LOG`.
/// Safe to call from every test.
pub fn init_tracing() {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy();
    let layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_test_writer()
        .with_filter(env_filter);
    let _ = tracing_subscriber::registry().with(layer).try_init();
}

/// Set up an empty tree over the in-memory backend
pub fn setup_tree() -> TestTree {
    Tree::new(MemoryTreeBackend::new(), TreeConfig::default()).unwrap()
}

/// Set up an empty tree with a tweaked configuration
pub fn setup_tree_with(tweak: impl FnOnce(&mut TreeConfig)) -> TestTree {
    let mut config = TreeConfig::default();
    tweak(&mut config);
    Tree::new(MemoryTreeBackend::new(), config).unwrap()
}

/// Set up an empty tree with a custom path alphabet and step length
pub fn setup_small_tree(alphabet: &str, steplen: usize) -> TestTree {
    setup_tree_with(|config| {
        config.alphabet = alphabet.to_string();
        config.steplen = steplen;
    })
}

/// Set up a tree holding just the reserved Root
pub async fn setup_root() -> (TestTree, Node) {
    let tree = setup_tree();
    let root = tree.create_root("Root").await.unwrap();
    (tree, root)
}

pub async fn setup_pies() -> Pies {
    let (tree, root) = setup_root().await;
    let pies = tree.add_child(root.id(), "Pies").await.unwrap();
    let savoury = tree.add_child(pies.id(), "Savoury").await.unwrap();
    let sweet = tree.add_child(pies.id(), "Sweet").await.unwrap();

    // numchild moved on since these were created
    let root = reload(&tree, root.id()).await;
    let pies = reload(&tree, pies.id()).await;
    Pies {
        tree,
        root,
        pies,
        savoury,
        sweet,
    }
}

/// Re-read a node by id
pub async fn reload(tree: &TestTree, id: NodeId) -> Node {
    tree.query().node(id).await.unwrap()
}

pub fn names(nodes: &[Node]) -> Vec<&str> {
    nodes.iter().map(Node::name).collect()
}

pub fn paths(nodes: &[Node]) -> Vec<String> {
    nodes.iter().map(|node| node.path().to_string()).collect()
}

/// Check the structural invariants over the whole tree:
/// - depth matches path length and every parent exists
/// - numchild matches the actual number of children
/// - children of a node are in name order (top-level nodes keep
///   creation order)
/// - paths are unique
pub async fn assert_invariants(tree: &TestTree) {
    let codec = tree.codec();
    let nodes = tree.query().all().await.unwrap();

    let paths: HashSet<_> = nodes.iter().map(|node| node.path().clone()).collect();
    assert_eq!(paths.len(), nodes.len(), "duplicate paths");

    for node in &nodes {
        assert_eq!(
            node.depth() as usize,
            node.path().len() / codec.steplen(),
            "depth of {}",
            node.name()
        );
        if let Some(parent) = codec.parent(node.path()) {
            assert!(paths.contains(&parent), "orphaned node {}", node.name());
        }

        let children: Vec<&Node> = nodes
            .iter()
            .filter(|other| codec.parent(other.path()).as_ref() == Some(node.path()))
            .collect();
        assert_eq!(
            node.numchild() as usize,
            children.len(),
            "numchild of {}",
            node.name()
        );
        for pair in children.windows(2) {
            assert!(
                !NameOrder.compare(pair[0].name(), pair[1].name()).is_gt(),
                "{} sorts after {}",
                pair[0].name(),
                pair[1].name()
            );
        }
    }
}
