//! The per-tick transfer protocol.
//!
//! A component holding an item pushes it at a neighbouring cell; the grid
//! resolves the occupant and the occupant's accept rule decides. Accept
//! either fills the target's slot (and stamps its tick guard) or returns
//! false with no side effects. The pusher clears its own slot only after a
//! successful accept.

use crate::component::{Component, Variant};
use crate::event::Event;
use crate::fixed::Ticks;
use crate::geometry::{Direction, GridPosition};
use crate::id::{ComponentId, GridId, ItemId};
use crate::sink::ItemSink;
use crate::world::World;

/// Local footprint cell holding combiner input A.
const SLOT_A_CELL: GridPosition = GridPosition::new(0, 0);
/// Local footprint cell holding combiner input B.
const SLOT_B_CELL: GridPosition = GridPosition::new(1, 0);

impl World {
    // -----------------------------------------------------------------------
    // Accept
    // -----------------------------------------------------------------------

    /// Offer `item`, travelling `travel` (world frame) out of `source_cell`,
    /// to `target`. Returns true if the target took it.
    pub fn try_accept(
        &mut self,
        target: ComponentId,
        item: ItemId,
        travel: Direction,
        source_cell: GridPosition,
    ) -> bool {
        let tick = self.clock.current_tick();
        let Some(component) = self.components.get_mut(target) else {
            return false;
        };

        match component.variant {
            Variant::Collector => {
                component.last_input = Some(travel);
                component.last_serviced = Some(tick);
                self.deliveries.submit(item);
                if let Some(sink) = self.sink.as_mut() {
                    sink.submit(item);
                }
                self.events.emit(Event::ItemCollected {
                    collector: target,
                    item,
                    tick,
                });
                true
            }
            Variant::Combiner {
                ref mut slot_a,
                ref mut slot_b,
            } => {
                if component.orientation.world_to_local_dir(travel) != Direction::Up {
                    return false;
                }
                let entry = source_cell.step(travel);
                let local = component
                    .orientation
                    .world_to_local(entry.relative_to(component.anchor));
                let slot = match local {
                    SLOT_A_CELL => slot_a,
                    SLOT_B_CELL => slot_b,
                    _ => return false,
                };
                if slot.is_some() {
                    return false;
                }
                *slot = Some(item);
                component.last_input = Some(travel);
                component.last_serviced = Some(tick);
                true
            }
            // Exits are fed by their entrance; ports by import/export.
            Variant::TunnelExit => false,
            Variant::Port(_) => self.export(target, item, travel, tick),
            Variant::RecursiveModule { .. } => self.import(target, item, travel, tick),
            _ => {
                if !accepts_from_behind(component, travel) {
                    return false;
                }
                component.receive(item, travel, tick);
                true
            }
        }
    }

    /// The component a push into `cell` of `grid` reaches. Inside the grid
    /// that is the occupant; just outside a child grid it is the port on
    /// that wall.
    pub(crate) fn resolve_target(&self, grid: GridId, cell: GridPosition) -> Option<ComponentId> {
        let grid = self.grids.get(grid)?;
        if grid.in_bounds(cell) {
            return grid.component_at(cell);
        }
        grid.ports()
            .find(|&(wall, _)| grid.port_cell(wall) == cell)
            .map(|(_, port)| port)
    }

    /// Push `item` from `from_cell` one step in `travel`. Does not touch the
    /// pusher's slot.
    pub(crate) fn push(
        &mut self,
        from: ComponentId,
        grid: GridId,
        from_cell: GridPosition,
        travel: Direction,
        item: ItemId,
    ) -> bool {
        let Some(target) = self.resolve_target(grid, from_cell.step(travel)) else {
            return false;
        };
        if target == from || !self.try_accept(target, item, travel, from_cell) {
            return false;
        }
        let tick = self.clock.current_tick();
        log::trace!("tick {tick}: {item:?} {from:?} -> {target:?} travelling {travel:?}");
        self.events.emit(Event::ItemTransferred {
            from,
            to: target,
            item,
            tick,
        });
        true
    }

    // -----------------------------------------------------------------------
    // Tick
    // -----------------------------------------------------------------------

    /// Run one component's behaviour for `tick`. Skipped if it received an
    /// item this tick.
    pub(crate) fn on_tick(&mut self, id: ComponentId, tick: Ticks) {
        let Some(component) = self.components.get_mut(id) else {
            return;
        };
        if component.serviced_on(tick) {
            return;
        }

        match component.variant {
            Variant::Emitter { item } => {
                component.held.get_or_insert(item);
                self.emit_forward(id);
            }
            Variant::Mover | Variant::TunnelExit => self.emit_forward(id),
            Variant::Balancer { .. } => self.tick_balancer(id),
            Variant::Distributor { .. } => self.tick_distributor(id),
            Variant::Combiner { .. } => self.tick_combiner(id, tick),
            Variant::TunnelEntrance => self.tick_tunnel(id, tick),
            Variant::Port(_) => self.tick_port(id),
            Variant::Collector | Variant::RecursiveModule { .. } => {}
        }
    }

    /// Try each output in turn; clear the slot on the first success.
    /// Returns the index of the output that took the item.
    fn emit_via(&mut self, id: ComponentId, order: &[usize]) -> Option<usize> {
        let component = self.components.get(id)?;
        let item = component.held?;
        let grid = component.grid;
        let outputs = component.outputs();
        for &index in order {
            let Some(&(cell, dir)) = outputs.get(index) else {
                continue;
            };
            if self.push(id, grid, cell, dir, item) {
                if let Some(component) = self.components.get_mut(id) {
                    component.held = None;
                }
                return Some(index);
            }
        }
        None
    }

    fn emit_forward(&mut self, id: ComponentId) {
        self.emit_via(id, &[0]);
    }

    fn tick_balancer(&mut self, id: ComponentId) {
        let Some(Component {
            variant: Variant::Balancer { prefer_right },
            ..
        }) = self.components.get(id)
        else {
            return;
        };
        let preferred = usize::from(*prefer_right);
        let used = self.emit_via(id, &[preferred, 1 - preferred]);
        // Only a push through the preferred port advances the alternation.
        if used == Some(preferred) {
            if let Some(Component {
                variant: Variant::Balancer { prefer_right },
                ..
            }) = self.components.get_mut(id)
            {
                *prefer_right = !*prefer_right;
            }
        }
    }

    fn tick_distributor(&mut self, id: ComponentId) {
        let Some(Component {
            variant: Variant::Distributor { prefer_right },
            ..
        }) = self.components.get(id)
        else {
            return;
        };
        let preferred = usize::from(*prefer_right);
        // Output 0 is local Up, output 1 is local Right.
        if let Some(used) = self.emit_via(id, &[preferred, 1 - preferred]) {
            if let Some(Component {
                variant: Variant::Distributor { prefer_right },
                ..
            }) = self.components.get_mut(id)
            {
                *prefer_right = used == 0;
            }
        }
    }

    fn tick_combiner(&mut self, id: ComponentId, tick: Ticks) {
        let Some(component) = self.components.get(id) else {
            return;
        };
        if component.held.is_some() {
            self.emit_forward(id);
            return;
        }
        let Variant::Combiner {
            slot_a: Some(a),
            slot_b: Some(b),
        } = component.variant
        else {
            return;
        };
        let Some(output) = self.registry.lookup(a, b) else {
            return;
        };
        if let Some(component) = self.components.get_mut(id) {
            component.held = Some(output);
            component.variant = Variant::Combiner {
                slot_a: None,
                slot_b: None,
            };
        }
        log::trace!("tick {tick}: {id:?} combined {a:?} + {b:?} -> {output:?}");
        self.events.emit(Event::ItemsCombined {
            combiner: id,
            output,
            tick,
        });
    }

    /// Scan forward for a paired exit. Stops at the grid edge or at another
    /// entrance facing the same way.
    fn tick_tunnel(&mut self, id: ComponentId, tick: Ticks) {
        let Some(entrance) = self.components.get(id) else {
            return;
        };
        let Some(item) = entrance.held else {
            return;
        };
        let Some(grid) = self.grids.get(entrance.grid) else {
            return;
        };
        let facing = entrance.output();

        let mut cell = entrance.anchor.step(facing);
        let exit = loop {
            if !grid.in_bounds(cell) {
                return;
            }
            if let Some(other_id) = grid.component_at(cell) {
                if let Some(other) = self.components.get(other_id) {
                    match other.variant {
                        Variant::TunnelExit if other.output() == facing => break other_id,
                        Variant::TunnelEntrance if other.output() == facing => return,
                        _ => {}
                    }
                }
            }
            cell = cell.step(facing);
        };

        let Some(exit_component) = self.components.get_mut(exit) else {
            return;
        };
        if exit_component.held.is_some() {
            return;
        }
        exit_component.receive(item, facing, tick);
        if let Some(entrance) = self.components.get_mut(id) {
            entrance.held = None;
        }
        log::trace!("tick {tick}: {item:?} tunnelled {id:?} -> {exit:?}");
        self.events.emit(Event::TunnelTraversed {
            entrance: id,
            exit,
            item,
            tick,
        });
    }
}

/// Default accept rule: empty slot, and the item enters from behind.
fn accepts_from_behind(component: &Component, travel: Direction) -> bool {
    component.held.is_none() && component.orientation.world_to_local_dir(travel) == Direction::Up
}

#[cfg(test)]
mod tests {
    use crate::component::ComponentKind;
    use crate::event::EventKind;
    use crate::geometry::{Direction, GridPosition};
    use crate::test_utils::*;

    #[test]
    fn mover_accepts_only_from_behind() {
        let (mut world, items) = test_world();
        let mover = place(&mut world, ComponentKind::Mover, 5, 5, Direction::Up);
        let below = GridPosition::new(5, 4);
        assert!(!world.try_accept(mover, items.fire, Direction::Right, GridPosition::new(4, 5)));
        assert!(!world.try_accept(mover, items.fire, Direction::Down, GridPosition::new(5, 6)));
        assert!(world.try_accept(mover, items.fire, Direction::Up, below));
        assert!(!world.try_accept(mover, items.water, Direction::Up, below), "slot full");
        assert_eq!(held(&world, mover), Some(items.fire));
    }

    #[test]
    fn collector_accepts_any_direction_and_never_holds() {
        let (mut world, items) = test_world();
        let collector = place(&mut world, ComponentKind::Collector, 5, 5, Direction::Up);
        for dir in Direction::all() {
            let source = GridPosition::new(5, 5).step(dir.opposite());
            assert!(world.try_accept(collector, items.fire, dir, source));
        }
        assert_eq!(held(&world, collector), None);
        assert_eq!(world.deliveries().count(items.fire), 4);
        assert_eq!(world.events().buffered_count(EventKind::ItemCollected), 4);
    }

    #[test]
    fn emitter_chain_moves_one_cell_per_tick() {
        let (mut world, items) = test_world();
        let emitter = place(&mut world, ComponentKind::Emitter { item: items.ore }, 0, 0, Direction::Right);
        let a = place(&mut world, ComponentKind::Mover, 1, 0, Direction::Right);
        let b = place(&mut world, ComponentKind::Mover, 2, 0, Direction::Right);
        place(&mut world, ComponentKind::Collector, 3, 0, Direction::Right);

        world.step();
        assert_eq!(held(&world, a), Some(items.ore));
        assert_eq!(held(&world, b), None, "a received this tick, so it must not emit");
        world.step();
        assert_eq!(held(&world, b), Some(items.ore));
        // `a` was still full when the emitter ran, so the emitter kept its item.
        assert_eq!(held(&world, emitter), Some(items.ore));
        world.step();
        assert_eq!(world.deliveries().count(items.ore), 1);
        assert_eq!(held(&world, a), Some(items.ore));
        assert_eq!(held(&world, emitter), None);
    }

    #[test]
    fn push_into_empty_cell_fails() {
        let (mut world, items) = test_world();
        let mover = place(&mut world, ComponentKind::Mover, 0, 0, Direction::Left);
        world.insert_item(mover, items.fire);
        world.step();
        assert_eq!(held(&world, mover), Some(items.fire));
        assert_eq!(world.events().buffered_count(EventKind::ItemTransferred), 0);
    }

    #[test]
    fn combiner_slots_follow_flip() {
        let (mut world, items) = test_world();
        let combiner = place(&mut world, ComponentKind::Combiner, 5, 5, Direction::Up);
        // Unflipped: (5,5) is back-left (A), (6,5) back-right (B).
        assert!(world.try_accept(combiner, items.fire, Direction::Up, GridPosition::new(6, 4)));
        assert!(!world.try_accept(combiner, items.water, Direction::Up, GridPosition::new(6, 4)));
        assert!(!world.try_accept(combiner, items.water, Direction::Left, GridPosition::new(7, 5)));
        assert!(world.try_accept(combiner, items.water, Direction::Up, GridPosition::new(5, 4)));
        assert_eq!(combiner_slots(&world, combiner), (Some(items.water), Some(items.fire)));
    }

    #[test]
    fn combiner_miss_keeps_inputs() {
        let (mut world, items) = test_world();
        let combiner = place(&mut world, ComponentKind::Combiner, 5, 5, Direction::Up);
        world.try_accept(combiner, items.fire, Direction::Up, GridPosition::new(5, 4));
        world.try_accept(combiner, items.ore, Direction::Up, GridPosition::new(6, 4));
        world.step();
        world.step();
        assert_eq!(combiner_slots(&world, combiner), (Some(items.fire), Some(items.ore)));
        assert_eq!(held(&world, combiner), None);
    }

    #[test]
    fn tunnel_exit_rejects_direct_pushes() {
        let (mut world, items) = test_world();
        let exit = place(&mut world, ComponentKind::TunnelExit, 5, 5, Direction::Up);
        assert!(!world.try_accept(exit, items.fire, Direction::Up, GridPosition::new(5, 4)));
    }

    #[test]
    fn tunnel_blocked_by_same_facing_entrance() {
        let (mut world, items) = test_world();
        let first = place(&mut world, ComponentKind::TunnelEntrance, 0, 0, Direction::Right);
        place(&mut world, ComponentKind::TunnelEntrance, 2, 0, Direction::Right);
        let exit = place(&mut world, ComponentKind::TunnelExit, 4, 0, Direction::Right);
        world.insert_item(first, items.fire);
        world.step();
        assert_eq!(held(&world, first), Some(items.fire));
        assert_eq!(held(&world, exit), None);
    }

    #[test]
    fn tunnel_ignores_opposite_facing_exit() {
        let (mut world, items) = test_world();
        let entrance = place(&mut world, ComponentKind::TunnelEntrance, 0, 0, Direction::Right);
        place(&mut world, ComponentKind::TunnelExit, 2, 0, Direction::Left);
        let exit = place(&mut world, ComponentKind::TunnelExit, 4, 0, Direction::Right);
        world.insert_item(entrance, items.fire);
        world.step();
        assert_eq!(held(&world, exit), Some(items.fire));
        assert_eq!(world.events().buffered_count(EventKind::TunnelTraversed), 1);
    }

    #[test]
    fn tunnel_without_exit_holds() {
        let (mut world, items) = test_world();
        let entrance = place(&mut world, ComponentKind::TunnelEntrance, 0, 0, Direction::Down);
        world.insert_item(entrance, items.fire);
        world.step();
        assert_eq!(held(&world, entrance), Some(items.fire));
    }

    #[test]
    fn distributor_alternates_up_and_right() {
        let (mut world, items) = test_world();
        let dist = place(&mut world, ComponentKind::Distributor, 5, 5, Direction::Up);
        let up = place(&mut world, ComponentKind::Collector, 5, 6, Direction::Up);
        let right = place(&mut world, ComponentKind::Collector, 7, 5, Direction::Up);
        let mut order = Vec::new();
        for _ in 0..4 {
            world.insert_item(dist, items.fire);
            world.step();
            order.push(last_collected_by(&world, &[up, right]));
        }
        assert_eq!(order, vec![0, 1, 0, 1]);
    }

    #[test]
    fn distributor_fallback_sets_opposite_preference() {
        let (mut world, items) = test_world();
        let dist = place(&mut world, ComponentKind::Distributor, 5, 5, Direction::Up);
        // Nothing above; only the sideways output can take items.
        let right = place(&mut world, ComponentKind::Collector, 7, 5, Direction::Up);
        world.insert_item(dist, items.fire);
        world.step();
        assert_eq!(world.deliveries().count(items.fire), 1);
        let up = place(&mut world, ComponentKind::Collector, 5, 6, Direction::Up);
        world.insert_item(dist, items.fire);
        world.step();
        // Sideways succeeded last, so Up is preferred now.
        assert_eq!(last_collected_by(&world, &[up, right]), 0);
    }
}
