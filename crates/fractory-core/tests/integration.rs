//! Integration tests for the Fractory simulation.
//!
//! End-to-end behaviour across the whole tick pipeline: splitters,
//! combiners, tunnels, recursive import/export, removal, the clock and the
//! sink.

use fractory_core::component::ComponentKind;
use fractory_core::event::{Event, EventKind};
use fractory_core::geometry::{Direction, GridPosition};
use fractory_core::grid::Wall;
use fractory_core::id::ComponentId;
use fractory_core::test_utils::*;
use fractory_core::world::World;

fn collected_sequence(world: &World, collectors: &[ComponentId]) -> Vec<usize> {
    world
        .events()
        .events(EventKind::ItemCollected)
        .filter_map(|event| match event {
            Event::ItemCollected { collector, .. } => collectors.iter().position(|c| c == collector),
            _ => None,
        })
        .collect()
}

// ===========================================================================
// Balancer
// ===========================================================================

#[test]
fn balancer_alternates_between_ports() {
    let (mut world, items) = test_world();
    place(&mut world, ComponentKind::Emitter { item: items.ore }, 4, 3, Direction::Up);
    place(&mut world, ComponentKind::Balancer, 4, 4, Direction::Up);
    let left = place(&mut world, ComponentKind::Collector, 4, 5, Direction::Up);
    let right = place(&mut world, ComponentKind::Collector, 5, 5, Direction::Up);

    run_ticks(&mut world, 8);
    assert_eq!(collected_sequence(&world, &[left, right]), vec![0, 1, 0, 1]);
}

#[test]
fn balancer_fallback_does_not_advance_alternation() {
    let (mut world, items) = test_world();
    let balancer = place(&mut world, ComponentKind::Balancer, 4, 4, Direction::Up);
    // Only the right port has a taker.
    let right = place(&mut world, ComponentKind::Collector, 5, 5, Direction::Up);

    world.insert_item(balancer, items.ore);
    world.step();
    world.insert_item(balancer, items.ore);
    world.step();
    assert_eq!(world.deliveries().count(items.ore), 2);

    // Left was preferred both times and stays preferred.
    let left = place(&mut world, ComponentKind::Collector, 4, 5, Direction::Up);
    world.insert_item(balancer, items.ore);
    world.step();
    assert_eq!(collected_sequence(&world, &[left, right]), vec![1, 1, 0]);
}

#[test]
fn balancer_rejects_side_entry() {
    let (mut world, items) = test_world();
    let balancer = place(&mut world, ComponentKind::Balancer, 4, 4, Direction::Up);
    assert!(!world.try_accept(balancer, items.ore, Direction::Right, GridPosition::new(3, 4)));
    assert!(world.try_accept(balancer, items.ore, Direction::Up, GridPosition::new(5, 3)));
}

// ===========================================================================
// Combiner
// ===========================================================================

fn combine(first: fractory_core::id::ItemId, second: fractory_core::id::ItemId) -> World {
    let (mut world, _) = test_world();
    place(&mut world, ComponentKind::Emitter { item: first }, 5, 4, Direction::Up);
    place(&mut world, ComponentKind::Emitter { item: second }, 6, 4, Direction::Up);
    place(&mut world, ComponentKind::Combiner, 5, 5, Direction::Up);
    place(&mut world, ComponentKind::Collector, 5, 6, Direction::Up);
    run_ticks(&mut world, 12);
    world
}

#[test]
fn combiner_is_commutative() {
    let (_, items) = test_registry();
    let forward = combine(items.fire, items.water);
    let reverse = combine(items.water, items.fire);
    assert!(forward.deliveries().count(items.steam) > 0);
    assert_eq!(
        forward.deliveries().count(items.steam),
        reverse.deliveries().count(items.steam)
    );
    assert_eq!(forward.deliveries().count(items.fire), 0);
    assert_eq!(forward.deliveries().count(items.water), 0);
}

/// Load both slots directly, in the given order, and run one tick.
fn combine_in_place(a_first: bool) -> (World, ComponentId, TestItems) {
    let (mut world, items) = test_world();
    let combiner = place(&mut world, ComponentKind::Combiner, 5, 5, Direction::Up);
    let slot_a = (items.fire, GridPosition::new(5, 4));
    let slot_b = (items.water, GridPosition::new(6, 4));
    let feeds = if a_first { [slot_a, slot_b] } else { [slot_b, slot_a] };
    for (item, source) in feeds {
        assert!(world.try_accept(combiner, item, Direction::Up, source));
    }
    world.step();
    (world, combiner, items)
}

#[test]
fn combiner_produces_steam_and_clears_inputs() {
    for a_first in [true, false] {
        let (world, combiner, items) = combine_in_place(a_first);
        assert_eq!(held(&world, combiner), Some(items.steam));
        assert_eq!(combiner_slots(&world, combiner), (None, None));
        assert_eq!(world.events().buffered_count(EventKind::ItemsCombined), 1);
    }
}

#[test]
fn combiner_is_deterministic() {
    let (_, items) = test_registry();
    let a = combine(items.fire, items.water);
    let b = combine(items.fire, items.water);
    assert_eq!(a.state_hash(), b.state_hash());
    assert_eq!(a.events().total_emitted(EventKind::ItemsCombined), b.events().total_emitted(EventKind::ItemsCombined));
}

#[test]
fn flipped_combiner_swaps_slots() {
    let (mut world, items) = test_world();
    let combiner = place_flipped(&mut world, ComponentKind::Combiner, 5, 5, Direction::Up);
    // Flipped: the second cell sits to the left of the anchor.
    assert!(world.try_accept(combiner, items.fire, Direction::Up, GridPosition::new(4, 4)));
    assert_eq!(combiner_slots(&world, combiner), (None, Some(items.fire)));
}

// ===========================================================================
// Tunnels
// ===========================================================================

#[test]
fn tunnel_bypasses_blocker() {
    let (mut world, items) = test_world();
    let entrance = place(&mut world, ComponentKind::TunnelEntrance, 0, 0, Direction::Right);
    let blocker = place(&mut world, ComponentKind::Mover, 2, 0, Direction::Down);
    let exit = place(&mut world, ComponentKind::TunnelExit, 5, 0, Direction::Right);
    place(&mut world, ComponentKind::Collector, 6, 0, Direction::Up);

    // The blocker refuses anything travelling Right.
    assert!(!world.try_accept(blocker, items.fire, Direction::Right, GridPosition::new(1, 0)));

    world.insert_item(entrance, items.fire);
    world.step();
    assert_eq!(held(&world, exit), Some(items.fire));
    assert_eq!(held(&world, entrance), None);
    world.step();
    assert_eq!(world.deliveries().count(items.fire), 1);
}

#[test]
fn tunnel_waits_for_full_exit() {
    let (mut world, items) = test_world();
    let entrance = place(&mut world, ComponentKind::TunnelEntrance, 0, 0, Direction::Right);
    let exit = place(&mut world, ComponentKind::TunnelExit, 3, 0, Direction::Right);
    world.insert_item(exit, items.water);
    world.insert_item(entrance, items.fire);
    world.step();
    // Exit had nowhere to go, so the entrance keeps its item.
    assert_eq!(held(&world, exit), Some(items.water));
    assert_eq!(held(&world, entrance), Some(items.fire));
}

// ===========================================================================
// Recursive modules
// ===========================================================================

#[test]
fn module_exports_to_parent_within_two_ticks() {
    let (mut world, items) = test_world();
    let module = place(&mut world, ComponentKind::RecursiveModule, 3, 3, Direction::Up);
    let child = world.child_grid(module).unwrap();
    let mover = place_in(&mut world, child, ComponentKind::Mover, 3, 6, Direction::Up);
    place(&mut world, ComponentKind::Collector, 3, 4, Direction::Up);
    world.insert_item(mover, items.fire);

    run_ticks(&mut world, 2);
    assert_eq!(world.deliveries().count(items.fire), 1);
    let crossed: Vec<_> = world.events().events(EventKind::BoundaryCrossed).collect();
    assert_eq!(crossed.len(), 1);
    assert!(matches!(
        crossed[0],
        Event::BoundaryCrossed { wall: Wall::Top, .. }
    ));
}

#[test]
fn nested_export_climbs_two_levels() {
    let (mut world, items) = test_world();
    let outer = place(&mut world, ComponentKind::RecursiveModule, 3, 3, Direction::Up);
    let outer_grid = world.child_grid(outer).unwrap();
    let inner = place_in(&mut world, outer_grid, ComponentKind::RecursiveModule, 3, 6, Direction::Up);
    let inner_grid = world.child_grid(inner).unwrap();
    let mover = place_in(&mut world, inner_grid, ComponentKind::Mover, 3, 6, Direction::Up);
    place(&mut world, ComponentKind::Collector, 3, 4, Direction::Up);
    world.insert_item(mover, items.water);

    run_ticks(&mut world, 2);
    assert_eq!(world.deliveries().count(items.water), 0);
    let outer_top = world.module_port(outer, Wall::Top).unwrap();
    assert_eq!(held(&world, outer_top), Some(items.water));
    world.step();
    assert_eq!(world.deliveries().count(items.water), 1);
}

#[test]
fn module_passes_items_straight_through() {
    let (mut world, items) = test_world();
    place(&mut world, ComponentKind::Emitter { item: items.earth }, 3, 2, Direction::Up);
    let module = place(&mut world, ComponentKind::RecursiveModule, 3, 3, Direction::Up);
    let child = world.child_grid(module).unwrap();
    for y in 0..7 {
        place_in(&mut world, child, ComponentKind::Mover, 3, y, Direction::Up);
    }
    place(&mut world, ComponentKind::Collector, 3, 4, Direction::Up);

    run_ticks(&mut world, 30);
    assert!(world.deliveries().count(items.earth) >= 5);
    let inbound = world
        .events()
        .events(EventKind::BoundaryCrossed)
        .filter(|e| matches!(e, Event::BoundaryCrossed { wall: Wall::Bottom, .. }))
        .count();
    assert!(inbound >= 5);
}

#[test]
fn rotated_module_is_transparent_to_pass_through() {
    let (mut world, items) = test_world();
    place(&mut world, ComponentKind::Emitter { item: items.earth }, 3, 2, Direction::Up);
    let module = place(&mut world, ComponentKind::RecursiveModule, 3, 3, Direction::Down);
    let child = world.child_grid(module).unwrap();
    // In the module's frame items arrive travelling Down through the top wall.
    for y in 0..7 {
        place_in(&mut world, child, ComponentKind::Mover, 3, y, Direction::Down);
    }
    place(&mut world, ComponentKind::Collector, 3, 4, Direction::Up);

    run_ticks(&mut world, 30);
    assert!(world.deliveries().count(items.earth) >= 5);
}

#[test]
fn port_source_drives_module_output() {
    let (mut world, items) = test_world();
    let module = place(&mut world, ComponentKind::RecursiveModule, 8, 8, Direction::Right);
    let child = world.child_grid(module).unwrap();
    // Bottom port feeds Up into a column that exits through the top.
    for y in 0..7 {
        place_in(&mut world, child, ComponentKind::Mover, 3, y, Direction::Up);
    }
    // Module faces Right, so its top wall opens to the right in the root.
    place(&mut world, ComponentKind::Collector, 9, 8, Direction::Up);
    world.set_port_source(module, Wall::Bottom, Some(items.fire)).unwrap();

    run_ticks(&mut world, 20);
    assert!(world.deliveries().count(items.fire) > 0);
}

#[test]
fn removing_module_mid_flow_drops_its_items() {
    let (mut world, items) = test_world();
    place(&mut world, ComponentKind::Emitter { item: items.earth }, 3, 2, Direction::Up);
    let module = place(&mut world, ComponentKind::RecursiveModule, 3, 3, Direction::Up);
    let child = world.child_grid(module).unwrap();
    for y in 0..7 {
        place_in(&mut world, child, ComponentKind::Mover, 3, y, Direction::Up);
    }
    run_ticks(&mut world, 5);
    world.remove(module).unwrap();
    assert!(world.grid(child).is_none());
    assert_eq!(world.grid_count(), 1);
    // The emitter keeps running against an empty cell.
    run_ticks(&mut world, 3);
    assert_eq!(world.component_count(), 1);
}

// ===========================================================================
// Tick guard
// ===========================================================================

fn permutations(items: &[usize]) -> Vec<Vec<usize>> {
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
fn items_move_one_hop_per_tick_in_any_order() {
    let (_, items) = test_registry();
    let line = [
        ComponentKind::Emitter { item: items.ore },
        ComponentKind::Mover,
        ComponentKind::Mover,
        ComponentKind::Mover,
        ComponentKind::Collector,
    ];
    for order in permutations(&[0, 1, 2, 3, 4]) {
        let (mut world, _) = test_world();
        for &x in &order {
            place(&mut world, line[x], x as i32, 0, Direction::Right);
        }
        run_ticks(&mut world, 3);
        assert_eq!(world.deliveries().total(), 0, "order {order:?}");
        world.step();
        assert_eq!(world.deliveries().total(), 1, "order {order:?}");
    }
}

// ===========================================================================
// Clock, sink, events
// ===========================================================================

#[test]
fn pause_freezes_everything() {
    let (mut world, items) = test_world();
    place(&mut world, ComponentKind::Emitter { item: items.fire }, 0, 0, Direction::Right);
    place(&mut world, ComponentKind::Collector, 1, 0, Direction::Up);
    world.start();
    world.advance(fixed(1.0));
    let hash = world.state_hash();
    let delivered = world.deliveries().total();

    world.pause();
    world.advance(fixed(10.0));
    assert_eq!(world.step(), None);
    assert_eq!(world.state_hash(), hash);
    assert_eq!(world.deliveries().total(), delivered);

    world.resume();
    world.advance(fixed(0.5));
    assert_eq!(world.deliveries().total(), delivered + 1);
}

#[test]
fn tick_interval_is_floored() {
    let (mut world, _) = test_world();
    let applied = world.set_tick_interval(fixed(0.0));
    assert_eq!(applied, world.config().min_tick_interval);
    world.start();
    assert_eq!(world.advance(fixed(1.0)), 64);
}

#[test]
fn external_sink_sees_every_collected_item() {
    let (mut world, items) = test_world();
    let sink = RecordingSink::new();
    world.set_sink(Box::new(sink.clone()));
    place(&mut world, ComponentKind::Emitter { item: items.mud }, 0, 0, Direction::Right);
    place(&mut world, ComponentKind::Collector, 1, 0, Direction::Up);
    run_ticks(&mut world, 4);
    assert_eq!(sink.recorded(), vec![items.mud; 4]);
    assert_eq!(world.deliveries().count(items.mud), 4);
}

#[test]
fn listeners_receive_each_event_once() {
    use std::cell::Cell;
    use std::rc::Rc;

    let (mut world, items) = test_world();
    let seen = Rc::new(Cell::new(0));
    let counter = Rc::clone(&seen);
    world
        .events_mut()
        .on(EventKind::ItemTransferred, Box::new(move |_| counter.set(counter.get() + 1)));
    place(&mut world, ComponentKind::Emitter { item: items.fire }, 0, 0, Direction::Right);
    place(&mut world, ComponentKind::Collector, 1, 0, Direction::Up);
    run_ticks(&mut world, 5);
    assert_eq!(seen.get(), 5);
    assert_eq!(world.events().total_emitted(EventKind::ItemTransferred), 5);
}

#[test]
fn suppressed_events_are_not_buffered() {
    let (mut world, items) = test_world();
    world.events_mut().suppress(EventKind::ItemTransferred);
    place(&mut world, ComponentKind::Emitter { item: items.fire }, 0, 0, Direction::Right);
    place(&mut world, ComponentKind::Collector, 1, 0, Direction::Up);
    run_ticks(&mut world, 3);
    assert_eq!(world.events().buffered_count(EventKind::ItemTransferred), 0);
    assert_eq!(world.events().buffered_count(EventKind::ItemCollected), 3);
}
