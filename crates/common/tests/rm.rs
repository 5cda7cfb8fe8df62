//! Integration tests for deleting collections

mod common;

use ::common::collection::NodeId;
use ::common::tree::TreeError;

#[tokio::test]
async fn test_rm_leaf() {
    let pies = common::setup_pies().await;
    let tree = &pies.tree;

    let removed = tree.delete(pies.savoury.id()).await.unwrap();
    assert_eq!(removed, 1);

    let parent = common::reload(tree, pies.pies.id()).await;
    assert_eq!(parent.numchild(), 1);

    // no renumbering: Sweet keeps its rank and the gap stays
    let sweet = common::reload(tree, pies.sweet.id()).await;
    assert_eq!(sweet.path().as_str(), "000100010002");
    common::assert_invariants(tree).await;
}

#[tokio::test]
async fn test_rm_subtree() {
    let pies = common::setup_pies().await;
    let tree = &pies.tree;
    tree.add_child(pies.sweet.id(), "Cherry").await.unwrap();

    let removed = tree.delete(pies.pies.id()).await.unwrap();
    assert_eq!(removed, 4);

    let all = tree.query().all().await.unwrap();
    assert_eq!(common::names(&all), vec!["Root"]);
    assert_eq!(all[0].numchild(), 0);
    assert!(matches!(
        tree.query().node(pies.sweet.id()).await,
        Err(TreeError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_rm_twice_is_not_found() {
    let pies = common::setup_pies().await;
    let tree = &pies.tree;

    tree.delete(pies.sweet.id()).await.unwrap();
    let result = tree.delete(pies.sweet.id()).await;
    assert!(matches!(result, Err(TreeError::NotFound(id)) if id == pies.sweet.id()));
}

#[tokio::test]
async fn test_rm_root_is_protected() {
    let pies = common::setup_pies().await;
    let tree = &pies.tree;
    let before = tree.query().all().await.unwrap();

    let result = tree.delete(NodeId::ROOT).await;
    assert!(matches!(result, Err(TreeError::ProtectedNode(_))));
    assert_eq!(tree.query().all().await.unwrap(), before);
}

#[tokio::test]
async fn test_rm_leaves_rank_gap() {
    let pies = common::setup_pies().await;
    let tree = &pies.tree;

    tree.delete(pies.sweet.id()).await.unwrap();
    let tarts = tree.add_child(pies.pies.id(), "Tarts").await.unwrap();
    assert_eq!(tarts.path().as_str(), "000100010002");

    tree.delete(pies.savoury.id()).await.unwrap();
    let apple = tree.add_child(pies.pies.id(), "Apple").await.unwrap();
    // inserting in front takes the first remaining sibling's rank
    assert_eq!(apple.path().as_str(), "000100010002");
    let tarts = common::reload(tree, tarts.id()).await;
    assert_eq!(tarts.path().as_str(), "000100010003");
    common::assert_invariants(tree).await;
}

#[tokio::test]
async fn test_rm_top_level_node() {
    let pies = common::setup_pies().await;
    let tree = &pies.tree;
    let archive = tree.create_root("Archive").await.unwrap();

    assert_eq!(archive.path().as_str(), "0002");

    assert_eq!(tree.delete(archive.id()).await.unwrap(), 1);
    let root = common::reload(tree, NodeId::ROOT).await;
    assert_eq!(root.path().as_str(), "0001");
    // appends after the last remaining top-level rank
    let zoo = tree.create_root("Zoo").await.unwrap();
    assert_eq!(zoo.path().as_str(), "0002");
    common::assert_invariants(tree).await;
}
