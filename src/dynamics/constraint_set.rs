use std::collections::HashMap;

use glam::{Quat, Vec3};

use crate::config::ManifoldConfig;
use crate::core::body::{Body, BodyHandle};
use crate::core::shape::InstanceHandle;
use crate::dynamics::constraint::{
    ConstraintHandle, ConstraintKind, ConstraintPair, LocalBody,
};
use crate::dynamics::contact::ContactConstraint;
use crate::dynamics::distance::DistanceConstraint;
use crate::dynamics::island::IslandGraph;
use crate::dynamics::revolute::RevoluteConstraint;
use crate::dynamics::spherical::SphericalConstraint;
use crate::dynamics::weld::WeldConstraint;
use crate::collision::manifold::Manifold;
use crate::utils::allocator::Arena;

/// Options shared by every joint kind.
#[derive(Debug, Clone, Copy)]
pub struct ConstraintOps {
    pub body_a: BodyHandle,
    pub body_b: BodyHandle,
    /// When set, the anchors (and axis frames) are given in world space and
    /// converted at creation time.
    pub world_anchors: bool,
    pub anchor_a: Vec3,
    pub anchor_b: Vec3,
    /// Disabling collision registers a blacklist entry between the bodies.
    pub collision_enabled: bool,
}

impl ConstraintOps {
    pub fn new(body_a: BodyHandle, body_b: BodyHandle) -> Self {
        Self {
            body_a,
            body_b,
            world_anchors: true,
            anchor_a: Vec3::ZERO,
            anchor_b: Vec3::ZERO,
            collision_enabled: true,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DistanceOps {
    pub base: ConstraintOps,
    pub distance: f32,
}

#[derive(Debug, Clone, Copy)]
pub struct SphericalOps {
    pub base: ConstraintOps,
    /// Swing frame on A; the swing axis is the frame's +Z.
    pub swing_frame: Quat,
    pub max_swing_x: f32,
    pub max_swing_y: f32,
    pub min_twist: f32,
    pub max_twist: f32,
    pub max_angular_impulse: f32,
}

impl SphericalOps {
    pub fn new(body_a: BodyHandle, body_b: BodyHandle) -> Self {
        Self {
            base: ConstraintOps::new(body_a, body_b),
            swing_frame: Quat::IDENTITY,
            max_swing_x: -1.0,
            max_swing_y: -1.0,
            min_twist: 1.0,
            max_twist: -1.0,
            max_angular_impulse: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RevoluteOps {
    pub base: ConstraintOps,
    pub free_axis: Vec3,
    pub min_rads: f32,
    pub max_rads: f32,
    pub max_free_impulse: f32,
}

impl RevoluteOps {
    pub fn new(body_a: BodyHandle, body_b: BodyHandle) -> Self {
        Self {
            base: ConstraintOps::new(body_a, body_b),
            free_axis: Vec3::Y,
            min_rads: 1.0,
            max_rads: -1.0,
            max_free_impulse: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct WeldOps {
    pub base: ConstraintOps,
}

/// Blacklist keys are ordered so both orientations of a pair land on the
/// same entry.
fn ordered_pair(a: BodyHandle, b: BodyHandle) -> (BodyHandle, BodyHandle) {
    if a < b {
        (b, a)
    } else {
        (a, b)
    }
}

/// Typed constraint storage plus the bookkeeping that keeps contacts unique
/// per collider pair and joints able to suppress collision.
pub struct ConstraintSet {
    contacts: HashMap<ConstraintHandle, ContactConstraint>,
    distances: HashMap<ConstraintHandle, DistanceConstraint>,
    sphericals: HashMap<ConstraintHandle, SphericalConstraint>,
    revolutes: HashMap<ConstraintHandle, RevoluteConstraint>,
    welds: HashMap<ConstraintHandle, WeldConstraint>,
    kinds: HashMap<ConstraintHandle, ConstraintKind>,
    pair_to_manifold: HashMap<(InstanceHandle, InstanceHandle), ConstraintHandle>,
    /// Reference-counted: several joints may blacklist the same body pair.
    collision_blacklist: HashMap<(BodyHandle, BodyHandle), u32>,
    next_handle: ConstraintHandle,
    manifold_config: ManifoldConfig,
}

impl ConstraintSet {
    pub fn new(manifold_config: ManifoldConfig) -> Self {
        Self {
            contacts: HashMap::new(),
            distances: HashMap::new(),
            sphericals: HashMap::new(),
            revolutes: HashMap::new(),
            welds: HashMap::new(),
            kinds: HashMap::new(),
            pair_to_manifold: HashMap::new(),
            collision_blacklist: HashMap::new(),
            next_handle: 1,
            manifold_config,
        }
    }

    pub fn manifold_config(&self) -> &ManifoldConfig {
        &self.manifold_config
    }

    fn next_handle(&mut self) -> ConstraintHandle {
        let handle = self.next_handle;
        self.next_handle += 1;
        handle
    }

    pub fn kind(&self, handle: ConstraintHandle) -> Option<ConstraintKind> {
        self.kinds.get(&handle).copied()
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    pub fn contact(&self, handle: ConstraintHandle) -> Option<&ContactConstraint> {
        self.contacts.get(&handle)
    }

    pub fn contact_count(&self) -> usize {
        self.contacts.len()
    }

    pub fn manifolds(&self) -> impl Iterator<Item = &Manifold> {
        self.contacts.values().map(|c| &c.manifold)
    }

    pub fn contact_mut(&mut self, handle: ConstraintHandle) -> Option<&mut ContactConstraint> {
        self.contacts.get_mut(&handle)
    }

    pub fn distance(&self, handle: ConstraintHandle) -> Option<&DistanceConstraint> {
        self.distances.get(&handle)
    }

    pub fn distance_mut(&mut self, handle: ConstraintHandle) -> Option<&mut DistanceConstraint> {
        self.distances.get_mut(&handle)
    }

    pub fn spherical(&self, handle: ConstraintHandle) -> Option<&SphericalConstraint> {
        self.sphericals.get(&handle)
    }

    pub fn spherical_mut(&mut self, handle: ConstraintHandle) -> Option<&mut SphericalConstraint> {
        self.sphericals.get_mut(&handle)
    }

    pub fn revolute(&self, handle: ConstraintHandle) -> Option<&RevoluteConstraint> {
        self.revolutes.get(&handle)
    }

    pub fn revolute_mut(&mut self, handle: ConstraintHandle) -> Option<&mut RevoluteConstraint> {
        self.revolutes.get_mut(&handle)
    }

    pub fn weld(&self, handle: ConstraintHandle) -> Option<&WeldConstraint> {
        self.welds.get(&handle)
    }

    pub fn weld_mut(&mut self, handle: ConstraintHandle) -> Option<&mut WeldConstraint> {
        self.welds.get_mut(&handle)
    }

    pub fn endpoints(&self, handle: ConstraintHandle) -> Option<(BodyHandle, BodyHandle)> {
        let pair = self.pair(handle)?;
        Some((pair.body_a, pair.body_b))
    }

    fn pair(&self, handle: ConstraintHandle) -> Option<&ConstraintPair> {
        match self.kinds.get(&handle)? {
            ConstraintKind::Contact => self.contacts.get(&handle).map(|c| &c.pair),
            ConstraintKind::Distance => self.distances.get(&handle).map(|c| &c.pair),
            ConstraintKind::Spherical => self.sphericals.get(&handle).map(|c| &c.pair),
            ConstraintKind::Revolute => self.revolutes.get(&handle).map(|c| &c.pair),
            ConstraintKind::Weld => self.welds.get(&handle).map(|c| &c.pair),
        }
    }

    pub fn is_blacklist_pair(&self, a: BodyHandle, b: BodyHandle) -> bool {
        self.collision_blacklist.contains_key(&ordered_pair(a, b))
    }

    fn add_blacklist_pair(&mut self, a: BodyHandle, b: BodyHandle) {
        *self.collision_blacklist.entry(ordered_pair(a, b)).or_insert(0) += 1;
    }

    fn remove_blacklist_pair(&mut self, a: BodyHandle, b: BodyHandle) {
        let key = ordered_pair(a, b);
        match self.collision_blacklist.get_mut(&key) {
            Some(count) if *count > 1 => *count -= 1,
            Some(_) => {
                self.collision_blacklist.remove(&key);
            }
            None => debug_assert!(false, "blacklist entry missing on removal"),
        }
    }

    /// Existing manifold for the collider pair, or a fresh contact
    /// constraint registered with the island graph. `None` when the pair is
    /// blacklisted.
    #[allow(clippy::too_many_arguments)]
    pub fn get_or_create_manifold(
        &mut self,
        body_a: BodyHandle,
        body_b: BodyHandle,
        a_static: bool,
        b_static: bool,
        instance_a: InstanceHandle,
        instance_b: InstanceHandle,
        friction: f32,
        islands: &mut IslandGraph,
    ) -> Option<&mut Manifold> {
        let key = (instance_a, instance_b);
        if let Some(&existing) = self.pair_to_manifold.get(&key) {
            return self.contacts.get_mut(&existing).map(|c| &mut c.manifold);
        }

        // Far more whitelisted pairs exist than blacklisted ones, so the
        // lookup only runs on first contact
        if self.is_blacklist_pair(body_a, body_b) {
            return None;
        }

        let handle = self.next_handle();
        let constraint = ContactConstraint {
            pair: ConstraintPair::new(handle, body_a, body_b),
            manifold: Manifold::new(body_a, body_b, instance_a, instance_b),
            inactive_time: 0.0,
            friction,
        };
        self.contacts.insert(handle, constraint);
        self.kinds.insert(handle, ConstraintKind::Contact);
        self.pair_to_manifold.insert(key, handle);
        islands.add(handle, body_a, body_b, a_static, b_static);
        self.contacts.get_mut(&handle).map(|c| &mut c.manifold)
    }

    pub fn add_distance(
        &mut self,
        mut ops: DistanceOps,
        bodies: &mut Arena<Body>,
        islands: &mut IslandGraph,
    ) -> Option<ConstraintHandle> {
        self.convert_anchors(&mut ops.base, bodies)?;
        let handle = self.next_handle();
        let mut constraint = DistanceConstraint {
            pair: ConstraintPair::new(handle, ops.base.body_a, ops.base.body_b),
            anchor_a: ops.base.anchor_a,
            anchor_b: ops.base.anchor_b,
            distance: ops.distance,
            warm_start: 0.0,
        };
        constraint.pair.blacklist_collision = !ops.base.collision_enabled;
        self.kinds.insert(handle, ConstraintKind::Distance);
        self.distances.insert(handle, constraint);
        self.register_joint(handle, &ops.base, bodies, islands);
        Some(handle)
    }

    pub fn add_spherical(
        &mut self,
        mut ops: SphericalOps,
        bodies: &mut Arena<Body>,
        islands: &mut IslandGraph,
    ) -> Option<ConstraintHandle> {
        let (rot_a, rot_b) = {
            let a = bodies.get(ops.base.body_a)?;
            let b = bodies.get(ops.base.body_b)?;
            (a.transform.rotation, b.transform.rotation)
        };
        if ops.base.world_anchors {
            ops.swing_frame = rot_a.inverse() * ops.swing_frame;
        }
        self.convert_anchors(&mut ops.base, bodies)?;

        let handle = self.next_handle();
        let mut constraint = SphericalConstraint {
            pair: ConstraintPair::new(handle, ops.base.body_a, ops.base.body_b),
            anchor_a: ops.base.anchor_a,
            anchor_b: ops.base.anchor_b,
            ref_a: Quat::IDENTITY,
            ref_b: Quat::IDENTITY,
            max_swing_x: ops.max_swing_x,
            max_swing_y: ops.max_swing_y,
            min_twist: ops.min_twist,
            max_twist: ops.max_twist,
            max_angular_impulse: ops.max_angular_impulse,
            linear_warm_start: Vec3::ZERO,
            angular_warm_start: [0.0; 3],
        };
        constraint.set_swing_frame(ops.swing_frame, rot_a, rot_b);
        constraint.pair.blacklist_collision = !ops.base.collision_enabled;
        self.kinds.insert(handle, ConstraintKind::Spherical);
        self.sphericals.insert(handle, constraint);
        self.register_joint(handle, &ops.base, bodies, islands);
        Some(handle)
    }

    pub fn add_revolute(
        &mut self,
        mut ops: RevoluteOps,
        bodies: &mut Arena<Body>,
        islands: &mut IslandGraph,
    ) -> Option<ConstraintHandle> {
        let (rot_a, rot_b) = {
            let a = bodies.get(ops.base.body_a)?;
            let b = bodies.get(ops.base.body_b)?;
            (a.transform.rotation, b.transform.rotation)
        };
        if ops.base.world_anchors {
            ops.free_axis = rot_a.inverse() * ops.free_axis;
        }
        self.convert_anchors(&mut ops.base, bodies)?;

        let handle = self.next_handle();
        let mut constraint = RevoluteConstraint {
            pair: ConstraintPair::new(handle, ops.base.body_a, ops.base.body_b),
            anchor_a: ops.base.anchor_a,
            anchor_b: ops.base.anchor_b,
            basis_a: [Vec3::X, Vec3::Z],
            basis_b: [Vec3::X, Vec3::Z],
            min_rads: ops.min_rads,
            max_rads: ops.max_rads,
            max_free_impulse: ops.max_free_impulse,
            last_free_error: 0.0,
            linear_warm_start: Vec3::ZERO,
            angular_warm_start: Vec3::ZERO,
        };
        constraint.set_local_free_axis(ops.free_axis, rot_a, rot_b);
        constraint.pair.blacklist_collision = !ops.base.collision_enabled;
        self.kinds.insert(handle, ConstraintKind::Revolute);
        self.revolutes.insert(handle, constraint);
        self.register_joint(handle, &ops.base, bodies, islands);
        Some(handle)
    }

    pub fn add_weld(
        &mut self,
        ops: WeldOps,
        bodies: &mut Arena<Body>,
        islands: &mut IslandGraph,
    ) -> Option<ConstraintHandle> {
        let (local_a, local_b) = {
            let a = bodies.get(ops.base.body_a)?;
            let b = bodies.get(ops.base.body_b)?;
            (
                LocalBody::from_body(ops.base.body_a, a),
                LocalBody::from_body(ops.base.body_b, b),
            )
        };

        let handle = self.next_handle();
        let mut constraint = WeldConstraint {
            pair: ConstraintPair::new(handle, ops.base.body_a, ops.base.body_b),
            anchor_a: Vec3::ZERO,
            anchor_b: Vec3::ZERO,
            basis_a: [Vec3::X, Vec3::Y],
            basis_b: [Vec3::X, Vec3::Y],
            linear_warm_start: Vec3::ZERO,
            angular_warm_start: Vec3::ZERO,
        };
        constraint.lock_relative_transform(&local_a, &local_b);
        constraint.pair.blacklist_collision = !ops.base.collision_enabled;
        self.kinds.insert(handle, ConstraintKind::Weld);
        self.welds.insert(handle, constraint);
        self.register_joint(handle, &ops.base, bodies, islands);
        Some(handle)
    }

    /// Remove any constraint by handle, unwinding its island edge, body
    /// links, blacklist entry, and (for contacts) manifold mapping.
    pub fn remove_constraint(
        &mut self,
        handle: ConstraintHandle,
        bodies: &mut Arena<Body>,
        islands: &mut IslandGraph,
    ) {
        let Some(kind) = self.kinds.get(&handle).copied() else {
            return;
        };

        if let Some(pair) = self.pair(handle) {
            let (body_a, body_b) = (pair.body_a, pair.body_b);
            // Whatever depended on this constraint should re-settle
            for body in [body_a, body_b] {
                if let Some(body) = bodies.get_mut(body) {
                    body.set_asleep(false);
                }
            }
        }

        match kind {
            ConstraintKind::Contact => self.remove_contact(handle, islands),
            _ => self.remove_joint(handle, kind, bodies, islands),
        }
    }

    fn remove_contact(&mut self, handle: ConstraintHandle, islands: &mut IslandGraph) {
        islands.remove_constraint(handle);
        if let Some(constraint) = self.contacts.remove(&handle) {
            self.pair_to_manifold.remove(&(
                constraint.manifold.instance_a,
                constraint.manifold.instance_b,
            ));
        }
        self.kinds.remove(&handle);
    }

    fn remove_joint(
        &mut self,
        handle: ConstraintHandle,
        kind: ConstraintKind,
        bodies: &mut Arena<Body>,
        islands: &mut IslandGraph,
    ) {
        let pair = match kind {
            ConstraintKind::Distance => self.distances.remove(&handle).map(|c| c.pair),
            ConstraintKind::Spherical => self.sphericals.remove(&handle).map(|c| c.pair),
            ConstraintKind::Revolute => self.revolutes.remove(&handle).map(|c| c.pair),
            ConstraintKind::Weld => self.welds.remove(&handle).map(|c| c.pair),
            ConstraintKind::Contact => None,
        };
        self.kinds.remove(&handle);

        let Some(pair) = pair else {
            return;
        };
        if pair.blacklist_collision {
            self.remove_blacklist_pair(pair.body_a, pair.body_b);
        }
        islands.remove_constraint(handle);
        for body in [pair.body_a, pair.body_b] {
            if let Some(body) = bodies.get_mut(body) {
                body.remove_constraint(handle);
            }
        }
    }

    /// Shared registration tail for the joint kinds.
    fn register_joint(
        &mut self,
        handle: ConstraintHandle,
        ops: &ConstraintOps,
        bodies: &mut Arena<Body>,
        islands: &mut IslandGraph,
    ) {
        let a_static = bodies.get(ops.body_a).map_or(true, Body::is_static);
        let b_static = bodies.get(ops.body_b).map_or(true, Body::is_static);
        islands.add(handle, ops.body_a, ops.body_b, a_static, b_static);
        for body in [ops.body_a, ops.body_b] {
            if let Some(body) = bodies.get_mut(body) {
                body.add_constraint(handle);
            }
        }
        if !ops.collision_enabled {
            self.add_blacklist_pair(ops.body_a, ops.body_b);
        }
    }

    fn convert_anchors(&self, ops: &mut ConstraintOps, bodies: &Arena<Body>) -> Option<()> {
        let a = bodies.get(ops.body_a)?;
        let b = bodies.get(ops.body_b)?;
        if ops.world_anchors {
            ops.anchor_a = a.transform.world_to_model(ops.anchor_a);
            ops.anchor_b = b.transform.world_to_model(ops.anchor_b);
            ops.world_anchors = false;
        }
        Some(())
    }

    /// Refresh every live manifold against the bodies' new poses.
    pub fn update_manifolds(&mut self, bodies: &Arena<Body>) {
        let config = self.manifold_config;
        for constraint in self.contacts.values_mut() {
            let (Some(a), Some(b)) = (
                bodies.get(constraint.manifold.body_a),
                bodies.get(constraint.manifold.body_b),
            ) else {
                continue;
            };
            constraint
                .manifold
                .update(&a.transform.to_world(), &b.transform.to_world(), &config);
        }
    }

    pub fn clear(&mut self) {
        self.contacts.clear();
        self.distances.clear();
        self.sphericals.clear();
        self.revolutes.clear();
        self.welds.clear();
        self.kinds.clear();
        self.pair_to_manifold.clear();
        self.collision_blacklist.clear();
    }
}
