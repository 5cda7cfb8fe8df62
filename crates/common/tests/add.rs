//! Integration tests for creating roots and adding children

mod common;

use ::common::collection::NodeId;
use ::common::path::PathError;
use ::common::tree::TreeError;

#[tokio::test]
async fn test_first_root_is_reserved() {
    let tree = common::setup_tree();

    let root = tree.create_root("Root").await.unwrap();
    assert_eq!(root.id(), NodeId::ROOT);
    assert!(root.is_root());
    assert_eq!(root.path().as_str(), "0001");
    assert_eq!(root.depth(), 1);
    assert_eq!(root.numchild(), 0);
}

#[tokio::test]
async fn test_ensure_root_is_idempotent() {
    let tree = common::setup_tree();

    let first = tree.ensure_root("Root").await.unwrap();
    let second = tree.ensure_root("Ignored").await.unwrap();
    assert_eq!(first, second);
    assert_eq!(second.name(), "Root");
    assert_eq!(tree.query().all().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_later_top_level_nodes_append() {
    let pies = common::setup_pies().await;
    let tree = &pies.tree;
    let before = tree.query().all().await.unwrap();

    let archive = tree.create_root("Archive").await.unwrap();
    assert_ne!(archive.id(), NodeId::ROOT);
    assert_eq!(archive.path().as_str(), "0002");

    // Root and its subtree are never rewritten
    let after: Vec<_> = tree
        .query()
        .all()
        .await
        .unwrap()
        .into_iter()
        .filter(|node| node.id() != archive.id())
        .collect();
    assert_eq!(after, before);

    let zoo = tree.create_root("Zoo").await.unwrap();
    assert_eq!(zoo.path().as_str(), "0003");
    let abbey = tree.create_root("Abbey").await.unwrap();
    assert_eq!(abbey.path().as_str(), "0004");
    assert!(matches!(
        tree.create_root("ZOO").await,
        Err(TreeError::DuplicateSibling { .. })
    ));
    common::assert_invariants(tree).await;
}

#[tokio::test]
async fn test_add_child_appends_in_order() {
    let pies = common::setup_pies().await;

    assert_eq!(pies.pies.path().as_str(), "00010001");
    assert_eq!(pies.pies.depth(), 2);
    assert_eq!(pies.pies.numchild(), 2);
    assert_eq!(pies.savoury.path().as_str(), "000100010001");
    assert_eq!(pies.sweet.path().as_str(), "000100010002");
    assert_eq!(pies.sweet.depth(), 3);
    assert_eq!(pies.root.numchild(), 1);
    common::assert_invariants(&pies.tree).await;
}

#[tokio::test]
async fn test_add_child_shifts_following_subtrees() {
    let (tree, root) = common::setup_root().await;
    let pies = tree.add_child(root.id(), "Pies").await.unwrap();
    let savoury = tree.add_child(pies.id(), "Savoury").await.unwrap();
    let pork = tree.add_child(savoury.id(), "Pork").await.unwrap();
    let steak = tree.add_child(savoury.id(), "Steak").await.unwrap();
    assert_eq!(savoury.path().as_str(), "000100010001");
    assert_eq!(pork.path().as_str(), "0001000100010001");

    let apple = tree.add_child(pies.id(), "Apple").await.unwrap();
    assert_eq!(tree.codec().rank(apple.path()).unwrap(), 1);

    let savoury = common::reload(&tree, savoury.id()).await;
    assert_eq!(tree.codec().rank(savoury.path()).unwrap(), 2);
    assert_eq!(savoury.path().as_str(), "000100010002");

    // descendants carry the new prefix, keep their own segments and names
    let below = tree.query().descendants_of(savoury.id(), false).await.unwrap();
    assert_eq!(common::names(&below), vec!["Pork", "Steak"]);
    assert_eq!(
        common::paths(&below),
        vec!["0001000100020001", "0001000100020002"]
    );
    assert_eq!(below[0].id(), pork.id());
    assert_eq!(below[1].id(), steak.id());
    common::assert_invariants(&tree).await;
}

#[tokio::test]
async fn test_add_child_in_the_middle() {
    let (tree, root) = common::setup_root().await;
    for name in ["Cakes", "Tarts", "Pies", "Biscuits", "Scones"] {
        tree.add_child(root.id(), name).await.unwrap();
    }

    let children = tree.query().children_of(root.id()).await.unwrap();
    assert_eq!(
        common::names(&children),
        vec!["Biscuits", "Cakes", "Pies", "Scones", "Tarts"]
    );
    let root = common::reload(&tree, root.id()).await;
    assert_eq!(root.numchild(), 5);
    common::assert_invariants(&tree).await;
}

#[tokio::test]
async fn test_add_duplicate_sibling() {
    let pies = common::setup_pies().await;

    let result = pies.tree.add_child(pies.pies.id(), "sweet").await;
    assert!(matches!(
        result,
        Err(TreeError::DuplicateSibling { ref name }) if name == "Sweet"
    ));

    // same name elsewhere in the tree is fine
    pies.tree.add_child(pies.sweet.id(), "Sweet").await.unwrap();
    common::assert_invariants(&pies.tree).await;
}

#[tokio::test]
async fn test_add_with_duplicates_allowed() {
    let tree = common::setup_tree_with(|config| config.unique_sibling_names = false);
    let root = tree.create_root("Root").await.unwrap();

    let first = tree.add_child(root.id(), "Pies").await.unwrap();
    let second = tree.add_child(root.id(), "Pies").await.unwrap();
    assert!(first.path() < second.path());
    common::assert_invariants(&tree).await;
}

#[tokio::test]
async fn test_add_invalid_names() {
    let (tree, root) = common::setup_root().await;

    assert!(matches!(
        tree.add_child(root.id(), "   ").await,
        Err(TreeError::InvalidName(_))
    ));
    let long = "x".repeat(256);
    assert!(matches!(
        tree.add_child(root.id(), &long).await,
        Err(TreeError::InvalidName(_))
    ));
    assert!(matches!(
        tree.create_root("").await,
        Err(TreeError::InvalidName(_))
    ));
}

#[tokio::test]
async fn test_add_to_missing_parent() {
    let (tree, _) = common::setup_root().await;

    let missing = NodeId::generate();
    assert!(matches!(
        tree.add_child(missing, "Pies").await,
        Err(TreeError::NotFound(id)) if id == missing
    ));
}

#[tokio::test]
async fn test_add_past_capacity_leaves_tree_untouched() {
    // two ternary digits: ranks 1..=8
    let tree = common::setup_small_tree("012", 2);
    let root = tree.create_root("Root").await.unwrap();
    for i in 1..=8 {
        tree.add_child(root.id(), &format!("b{i}")).await.unwrap();
    }
    let before = tree.query().all().await.unwrap();

    let result = tree.add_child(root.id(), "c").await;
    assert!(matches!(
        result,
        Err(TreeError::Path(PathError::CapacityExceeded { rank: 9, capacity: 8 }))
    ));

    // inserting in front would push the last sibling past capacity
    let result = tree.add_child(root.id(), "a").await;
    assert!(matches!(
        result,
        Err(TreeError::Path(PathError::CapacityExceeded { .. }))
    ));

    assert_eq!(tree.query().all().await.unwrap(), before);
    common::assert_invariants(&tree).await;
}
