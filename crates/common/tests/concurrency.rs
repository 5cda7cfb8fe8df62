//! Integration tests for concurrent structural mutations

mod common;

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use tokio::sync::Notify;

use ::common::collection::NodeId;
use ::common::config::TreeConfig;
use ::common::store::{
    ChangeSet, MemorySnapshot, MemoryTreeBackend, MemoryTreeError, StoreError, TreeBackend,
};
use ::common::tree::{Position, Tree, TreeError};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_adds_under_one_parent() {
    common::init_tracing();
    let pies = common::setup_pies().await;
    let names: Vec<String> = (0..24).rev().map(|i| format!("Filling {i:02}")).collect();

    let handles = names.iter().cloned().map(|name| {
        let tree = pies.tree.clone();
        let parent = pies.sweet.id();
        tokio::spawn(async move { tree.add_child(parent, &name).await })
    });
    for result in join_all(handles).await {
        result.unwrap().unwrap();
    }

    let children = pies.tree.query().children_of(pies.sweet.id()).await.unwrap();
    let mut expected = names.clone();
    expected.sort();
    assert_eq!(common::names(&children), expected);
    common::assert_invariants(&pies.tree).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_adds_under_disjoint_parents() {
    let pies = common::setup_pies().await;
    let parents = [pies.savoury.id(), pies.sweet.id()];

    let handles = (0..16).map(|i| {
        let tree = pies.tree.clone();
        let parent = parents[i % 2];
        tokio::spawn(async move { tree.add_child(parent, &format!("Layer {:02}", 16 - i)).await })
    });
    for result in join_all(handles).await {
        result.unwrap().unwrap();
    }

    for parent in parents {
        let node = common::reload(&pies.tree, parent).await;
        assert_eq!(node.numchild(), 8);
    }
    common::assert_invariants(&pies.tree).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_moves_and_adds() {
    common::init_tracing();
    let (tree, root) = common::setup_root().await;
    let left = tree.add_child(root.id(), "Left").await.unwrap();
    let right = tree.add_child(root.id(), "Right").await.unwrap();
    let mut movers = Vec::new();
    for i in 0..8 {
        movers.push(tree.add_child(left.id(), &format!("Item {i}")).await.unwrap());
    }

    let moves = movers.iter().map(|node| {
        let tree = tree.clone();
        let (id, target) = (node.id(), right.id());
        tokio::spawn(async move { tree.move_node(id, target, Position::Sorted).await.map(|_| ()) })
    });
    let adds = (0..8).map(|i| {
        let tree = tree.clone();
        let parent = left.id();
        tokio::spawn(async move { tree.add_child(parent, &format!("Fresh {i}")).await.map(|_| ()) })
    });
    for result in join_all(moves.chain(adds)).await {
        result.unwrap().unwrap();
    }

    let left = common::reload(&tree, left.id()).await;
    let right = common::reload(&tree, right.id()).await;
    assert_eq!(left.numchild(), 8);
    assert_eq!(right.numchild(), 8);
    common::assert_invariants(&tree).await;
}

/// Memory backend that reports a conflict on the first `failures` commits
#[derive(Debug, Clone)]
struct FlakyBackend {
    inner: MemoryTreeBackend,
    failures: Arc<AtomicU32>,
}

#[async_trait]
impl TreeBackend for FlakyBackend {
    type Error = MemoryTreeError;
    type Snapshot = MemorySnapshot;

    async fn snapshot(&self) -> Result<Self::Snapshot, StoreError<Self::Error>> {
        self.inner.snapshot().await
    }

    async fn commit(&self, changes: ChangeSet) -> Result<(), StoreError<Self::Error>> {
        let failed = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if failed {
            return Err(StoreError::Conflict("concurrent writer".to_string()));
        }
        self.inner.commit(changes).await
    }
}

fn flaky_tree(failures: u32) -> Tree<FlakyBackend> {
    let backend = FlakyBackend {
        inner: MemoryTreeBackend::new(),
        failures: Arc::new(AtomicU32::new(failures)),
    };
    Tree::new(backend, TreeConfig::default()).unwrap()
}

#[tokio::test]
async fn test_conflicts_are_retried() {
    common::init_tracing();
    let tree = flaky_tree(0);
    let root = tree.create_root("Root").await.unwrap();

    tree.backend().failures.store(3, Ordering::SeqCst);
    let pies = tree.add_child(root.id(), "Pies").await.unwrap();
    assert_eq!(pies.path().as_str(), "00010001");
}

#[tokio::test]
async fn test_conflicts_surface_after_retries() {
    let tree = flaky_tree(4);

    let result = tree.create_root("Root").await;
    assert!(matches!(
        result,
        Err(TreeError::Store(StoreError::Conflict(_)))
    ));
    assert!(tree.query().all().await.unwrap().is_empty());

    // the next attempt goes through
    tree.create_root("Root").await.unwrap();
}

/// Memory backend that can park the next commit until told to go on
#[derive(Debug, Clone)]
struct GatedBackend {
    inner: MemoryTreeBackend,
    hold: Arc<AtomicBool>,
    held: Arc<Notify>,
    release: Arc<Notify>,
}

impl GatedBackend {
    fn new() -> Self {
        Self {
            inner: MemoryTreeBackend::new(),
            hold: Arc::new(AtomicBool::new(false)),
            held: Arc::new(Notify::new()),
            release: Arc::new(Notify::new()),
        }
    }
}

#[async_trait]
impl TreeBackend for GatedBackend {
    type Error = MemoryTreeError;
    type Snapshot = MemorySnapshot;

    async fn snapshot(&self) -> Result<Self::Snapshot, StoreError<Self::Error>> {
        self.inner.snapshot().await
    }

    async fn commit(&self, changes: ChangeSet) -> Result<(), StoreError<Self::Error>> {
        if self.hold.swap(false, Ordering::SeqCst) {
            self.held.notify_one();
            self.release.notified().await;
        }
        self.inner.commit(changes).await
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_sibling_renamed_by_another_handle_forces_replan() {
    common::init_tracing();
    let backend = GatedBackend::new();
    // separate handles share the store but not their locks, like two processes
    let gated = Tree::new(backend.clone(), TreeConfig::default()).unwrap();
    let other: common::TestTree = Tree::new(backend.inner.clone(), TreeConfig::default()).unwrap();

    let root = other.create_root("Root").await.unwrap();
    other.add_child(root.id(), "Apple").await.unwrap();
    let cherry = other.add_child(root.id(), "Cherry").await.unwrap();

    backend.hold.store(true, Ordering::SeqCst);
    let adding = tokio::spawn({
        let gated = gated.clone();
        async move { gated.add_child(NodeId::ROOT, "Banana").await }
    });
    backend.held.notified().await;

    // same path, new name: only the sibling names show the plan is stale
    let apricot = other.rename(cherry.id(), "Apricot").await.unwrap();
    assert_eq!(apricot.path(), cherry.path());
    backend.release.notify_one();

    let banana = adding.await.unwrap().unwrap();
    assert_eq!(banana.path().as_str(), "00010003");
    let children = other.query().children_of(root.id()).await.unwrap();
    assert_eq!(common::names(&children), vec!["Apple", "Apricot", "Banana"]);
    common::assert_invariants(&other).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_sibling_added_by_another_handle_during_rename() {
    let backend = GatedBackend::new();
    let gated = Tree::new(backend.clone(), TreeConfig::default()).unwrap();
    let other: common::TestTree = Tree::new(backend.inner.clone(), TreeConfig::default()).unwrap();

    let root = other.create_root("Root").await.unwrap();
    let apple = other.add_child(root.id(), "Apple").await.unwrap();
    other.add_child(root.id(), "Damson").await.unwrap();

    backend.hold.store(true, Ordering::SeqCst);
    let renaming = tokio::spawn({
        let gated = gated.clone();
        let id = apple.id();
        async move { gated.rename(id, "Elder").await }
    });
    backend.held.notified().await;

    other.add_child(root.id(), "Fig").await.unwrap();
    backend.release.notify_one();

    renaming.await.unwrap().unwrap();
    let children = other.query().children_of(root.id()).await.unwrap();
    assert_eq!(common::names(&children), vec!["Damson", "Elder", "Fig"]);
    common::assert_invariants(&other).await;
}
