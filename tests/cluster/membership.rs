//! Membership Tests
//!
//! Beans created on one member and used on another.

use crate::common::*;
use std::sync::Arc;

fn pair() -> (Arc<InMemoryGrid>, CartManager, Arc<InMemoryGrid>, CartManager) {
    let grid = cluster(2, 2);
    let first = manager(&grid);
    let peer_grid = Arc::new(grid.join("node-1"));
    let second = manager(&peer_grid);
    (grid, first, peer_grid, second)
}

#[test]
fn passivated_bean_moves_between_members() {
    let (grid, first, _peer_grid, second) = pair();
    let bean = new_cart(&first, "ann");
    let id = bean.id().clone();
    bean.acquire().unwrap();
    bean.with_instance(|cart| cart.items.push("apple".into()));
    bean.release().unwrap();
    bean.close().unwrap();

    // The second member picks it up, changes it and passivates it again.
    let moved = second.find_bean(&id).unwrap().unwrap();
    moved.acquire().unwrap();
    moved.with_instance(|cart| cart.items.push("pear".into()));
    moved.release().unwrap();
    moved.close().unwrap();

    let back = first.find_bean(&id).unwrap().unwrap();
    assert_eq!(
        back.instance().items,
        vec!["apple".to_string(), "pear".to_string()]
    );
    assert_eq!(grid.len("beans"), 1);
}

#[test]
fn identifiers_do_not_collide_across_members() {
    let (_grid, first, _peer_grid, second) = pair();
    let a = new_cart(&first, "ann");
    let b = new_cart(&second, "bob");
    assert_ne!(a.id(), b.id());
    assert!(a.id().starts_with("node-0-"));
    assert!(b.id().starts_with("node-1-"));
}

#[test]
fn duplicate_detected_across_members() {
    let (_grid, first, _peer_grid, second) = pair();
    let bean = new_cart(&first, "ann");

    let result = second.create_bean(bean.id().clone(), bean.id().clone(), Cart::new("bob"));
    assert!(matches!(result, Err(Error::DuplicateIdentifier(_))));
    assert!(second.is_empty());
}

#[test]
fn removal_visible_to_peer() {
    let (grid, first, _peer_grid, second) = pair();
    let bean = new_cart(&first, "ann");
    let id = bean.id().clone();
    bean.close().unwrap();

    assert!(second.contains_bean(&id).unwrap());
    assert!(second.remove_bean(&id).unwrap());
    assert_eq!(grid.len("beans"), 0);
    assert!(!first.contains_bean(&id).unwrap());
    assert!(first.find_bean(&id).unwrap().is_none());
}

#[test]
fn unreachable_member_fails_transiently() {
    let (_grid, first, peer_grid, second) = pair();
    let bean = new_cart(&first, "ann");
    let id = bean.id().clone();

    peer_grid.set_reachable(false);
    let err = second.find_bean(&id).unwrap_err();
    assert!(second.is_remotable(&err));

    // Only that member's client is cut off.
    assert!(first.contains_bean(&id).unwrap());
    peer_grid.set_reachable(true);
    assert!(second.contains_bean(&id).unwrap());
}

#[test]
fn local_ownership_follows_topology() {
    let (grid, first, _peer_grid, second) = pair();
    // Both members own every key when num_owners covers the view.
    let bean = new_cart(&first, "ann");
    assert!(first.is_local(bean.id()));
    assert!(second.is_local(bean.id()));

    grid.set_topology(Topology::new(2, members(4), 1));
    let owner = grid.topology().primary_owner(bean.id().as_bytes()).unwrap();
    assert_eq!(first.is_local(bean.id()), owner == MemberId::from("node-0"));
    assert_eq!(second.is_local(bean.id()), owner == MemberId::from("node-1"));
}
