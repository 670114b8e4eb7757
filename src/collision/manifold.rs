use glam::Vec3;

use crate::config::ManifoldConfig;
use crate::core::body::BodyHandle;
use crate::core::shape::InstanceHandle;
use crate::core::types::{basis_from_normal, Transformer};
use crate::utils::math;

pub const MAX_CONTACTS: usize = 4;

/// One side of a contact: the anchor in the collider's model space plus the
/// world-space positions it had when the contact was created and now.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContactObject {
    pub model_point: Vec3,
    pub starting_world: Vec3,
    pub current_world: Vec3,
}

impl ContactObject {
    pub fn new(model_point: Vec3, world: Vec3) -> Self {
        Self {
            model_point,
            starting_world: world,
            current_world: world,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ContactPoint {
    pub obj_a: ContactObject,
    pub obj_b: ContactObject,
    /// Signed along the manifold normal; positive while overlapping.
    pub penetration: f32,
    pub warm_contact: f32,
    pub warm_friction: [f32; 2],
}

impl ContactPoint {
    pub fn new(obj_a: ContactObject, obj_b: ContactObject, penetration: f32) -> Self {
        Self {
            obj_a,
            obj_b,
            penetration,
            warm_contact: 0.0,
            warm_friction: [0.0; 2],
        }
    }

    /// Take over the geometry of an incoming contact. Warm-start impulses
    /// are dropped because the feature this point tracked has moved.
    fn replace(&mut self, incoming: &ContactPoint) {
        self.obj_a = incoming.obj_a;
        self.obj_b = incoming.obj_b;
        self.penetration = incoming.penetration;
        self.warm_contact = 0.0;
        self.warm_friction = [0.0; 2];
    }
}

/// Persistent set of up to four contact points for one ordered collider
/// pair, with the shared normal and friction basis.
#[derive(Debug)]
pub struct Manifold {
    pub body_a: BodyHandle,
    pub body_b: BodyHandle,
    pub instance_a: InstanceHandle,
    pub instance_b: InstanceHandle,
    pub contacts: [ContactPoint; MAX_CONTACTS],
    pub size: usize,
    pub normal: Vec3,
    pub tangent_a: Vec3,
    pub tangent_b: Vec3,
}

impl Manifold {
    pub fn new(
        body_a: BodyHandle,
        body_b: BodyHandle,
        instance_a: InstanceHandle,
        instance_b: InstanceHandle,
    ) -> Self {
        Self {
            body_a,
            body_b,
            instance_a,
            instance_b,
            contacts: [ContactPoint::default(); MAX_CONTACTS],
            size: 0,
            normal: Vec3::Y,
            tangent_a: Vec3::X,
            tangent_b: Vec3::Z,
        }
    }

    pub fn points(&self) -> &[ContactPoint] {
        &self.contacts[..self.size]
    }

    fn replace_normal(&mut self, new_normal: Vec3) {
        self.normal = new_normal;
        // The normal is only replaced when it differs enough, so there is no
        // value in keeping the friction axes similar to the old ones
        let (tangent_a, tangent_b) = basis_from_normal(new_normal);
        self.tangent_a = tangent_a;
        self.tangent_b = tangent_b;
    }

    fn match_normal(
        &mut self,
        new_normal: Vec3,
        transform_a: &Transformer,
        transform_b: &Transformer,
        config: &ManifoldConfig,
    ) {
        let dot = self.normal.dot(new_normal);
        if 1.0 - dot > config.normal_match_tolerance {
            self.replace_normal(new_normal);
            // Penetration values are measured along the normal, so they all
            // need re-evaluating
            self.update(transform_a, transform_b, config);
        }
    }

    pub fn add_contact(
        &mut self,
        contact: ContactPoint,
        normal: Vec3,
        transform_a: &Transformer,
        transform_b: &Transformer,
        config: &ManifoldConfig,
    ) {
        if self.size == 0 {
            self.push_contact(contact);
            self.replace_normal(normal);
            return;
        }

        self.match_normal(normal, transform_a, transform_b, config);

        // A stored contact for the same feature gets replaced in place.
        // Both sides drift together, so testing side A is enough
        for i in 0..self.size {
            if self.contacts[i]
                .obj_a
                .starting_world
                .distance_squared(contact.obj_a.starting_world)
                < config.match_tolerance
            {
                self.contacts[i].replace(&contact);
                return;
            }
        }

        if self.size < MAX_CONTACTS {
            self.push_contact(contact);
        } else {
            self.add_to_full(contact);
        }
    }

    /// Reduce five candidates back to the four that best span the contact
    /// area: farthest pair, then max-area third, then the point farthest
    /// outside that triangle, dropped entirely if it falls inside.
    fn add_to_full(&mut self, contact: ContactPoint) {
        let mut points = [
            self.contacts[0],
            self.contacts[1],
            self.contacts[2],
            self.contacts[3],
            contact,
        ];

        let mut best_pair = (0, 1);
        let mut best_dist = 0.0f32;
        for i in 0..5 {
            for j in i + 1..5 {
                let dist = points[i]
                    .obj_a
                    .starting_world
                    .distance_squared(points[j].obj_a.starting_world);
                if dist > best_dist {
                    best_dist = dist;
                    best_pair = (i, j);
                }
            }
        }
        points.swap(0, best_pair.0);
        points.swap(1, best_pair.1);

        let line_start = points[0].obj_a.starting_world;
        let line = points[1].obj_a.starting_world - line_start;
        let mut best_area = 0.0f32;
        let mut best_third = 2;
        for (i, point) in points.iter().enumerate().skip(2) {
            let area = (point.obj_a.starting_world - line_start)
                .cross(line)
                .length_squared();
            if area > best_area {
                best_area = area;
                best_third = i;
            }
        }
        points.swap(2, best_third);

        let planes = math::outward_tri_planes(
            points[0].obj_a.starting_world,
            points[1].obj_a.starting_world,
            points[2].obj_a.starting_world,
        );
        let outside_dist = |p: Vec3| -> f32 {
            planes
                .iter()
                .map(|(normal, d)| normal.dot(p) + d)
                .fold(f32::MIN, f32::max)
        };
        let dist_a = outside_dist(points[3].obj_a.starting_world);
        let dist_b = outside_dist(points[4].obj_a.starting_world);

        let mut fourth_dist = dist_a;
        if dist_b > dist_a {
            points.swap(3, 4);
            fourth_dist = dist_b;
        }

        let keep = if fourth_dist > 0.0 { 4 } else { 3 };
        self.contacts[..keep].copy_from_slice(&points[..keep]);
        self.size = keep;
    }

    /// Re-project the anchors through the current poses, dropping contacts
    /// that drifted out of tolerance and refreshing the rest.
    pub fn update(
        &mut self,
        transform_a: &Transformer,
        transform_b: &Transformer,
        config: &ManifoldConfig,
    ) {
        let mut i = 0;
        while i < self.size {
            let point = &self.contacts[i];
            let a_world = transform_a.transform_point(point.obj_a.model_point);
            let a_drift = a_world - point.obj_a.starting_world;
            if a_drift.dot(self.normal).abs() > config.normal_tolerance
                || a_drift.dot(self.tangent_a).abs() > config.tangent_tolerance
                || a_drift.dot(self.tangent_b).abs() > config.tangent_tolerance
            {
                self.remove_contact(i);
                continue;
            }

            let b_world = transform_b.transform_point(point.obj_b.model_point);
            let b_drift = b_world - point.obj_b.starting_world;
            if b_drift.dot(self.normal).abs() > config.normal_tolerance
                || b_drift.dot(self.tangent_a).abs() > config.tangent_tolerance
                || b_drift.dot(self.tangent_b).abs() > config.tangent_tolerance
            {
                self.remove_contact(i);
                continue;
            }

            let point = &mut self.contacts[i];
            point.penetration = (b_world - a_world).dot(self.normal);
            point.obj_a.current_world = a_world;
            point.obj_b.current_world = b_world;
            i += 1;
        }
    }

    fn push_contact(&mut self, contact: ContactPoint) {
        debug_assert!(self.size < MAX_CONTACTS);
        self.contacts[self.size] = contact;
        self.size += 1;
    }

    fn remove_contact(&mut self, index: usize) {
        debug_assert!(self.size > 0);
        if self.size > 1 {
            self.contacts[index] = self.contacts[self.size - 1];
        }
        self.size -= 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Transform;
    use approx::assert_relative_eq;

    fn config() -> ManifoldConfig {
        ManifoldConfig::default()
    }

    fn identity() -> Transformer {
        Transform::default().to_world()
    }

    fn contact_at(world_a: Vec3) -> ContactPoint {
        ContactPoint::new(
            ContactObject::new(world_a, world_a),
            ContactObject::new(world_a, world_a),
            0.1,
        )
    }

    fn manifold() -> Manifold {
        Manifold::new(
            BodyHandle::default(),
            BodyHandle::default(),
            1,
            2,
        )
    }

    #[test]
    fn first_contact_sets_orthonormal_basis() {
        let mut m = manifold();
        let normal = Vec3::new(0.0, 1.0, 0.0);
        m.add_contact(contact_at(Vec3::ZERO), normal, &identity(), &identity(), &config());

        assert_eq!(m.size, 1);
        assert_relative_eq!(m.tangent_a.length(), 1.0, epsilon = 1e-5);
        assert_relative_eq!(m.tangent_b.length(), 1.0, epsilon = 1e-5);
        assert!(m.tangent_a.dot(m.tangent_b).abs() < 1e-5);
        assert!(m.tangent_a.dot(normal).abs() < 1e-5);
        assert!(m.tangent_b.dot(normal).abs() < 1e-5);
    }

    #[test]
    fn nearby_contact_replaces_and_resets_warm_start() {
        let mut m = manifold();
        m.add_contact(contact_at(Vec3::ZERO), Vec3::Y, &identity(), &identity(), &config());
        m.contacts[0].warm_contact = 3.0;

        // Within the match tolerance (squared distance)
        m.add_contact(
            contact_at(Vec3::new(0.05, 0.0, 0.0)),
            Vec3::Y,
            &identity(),
            &identity(),
            &config(),
        );
        assert_eq!(m.size, 1);
        assert_eq!(m.contacts[0].warm_contact, 0.0);
        assert_relative_eq!(m.contacts[0].obj_a.starting_world.x, 0.05);
    }

    #[test]
    fn manifold_never_exceeds_four_points() {
        let mut m = manifold();
        let corners = [
            Vec3::new(-1.0, 0.0, -1.0),
            Vec3::new(1.0, 0.0, -1.0),
            Vec3::new(1.0, 0.0, 1.0),
            Vec3::new(-1.0, 0.0, 1.0),
        ];
        for corner in corners {
            m.add_contact(contact_at(corner), Vec3::Y, &identity(), &identity(), &config());
        }
        assert_eq!(m.size, 4);

        // An interior fifth point is redundant and gets dropped entirely
        m.add_contact(contact_at(Vec3::ZERO), Vec3::Y, &identity(), &identity(), &config());
        assert!(m.size <= 4, "size was {}", m.size);
        for point in m.points() {
            assert!(
                corners
                    .iter()
                    .any(|c| c.distance_squared(point.obj_a.starting_world) < 1e-6),
                "interior point survived selection"
            );
        }
    }

    #[test]
    fn selection_keeps_the_spanning_extremes() {
        let mut m = manifold();
        for x in [0.0, 0.2, 0.4, 0.6] {
            m.add_contact(
                contact_at(Vec3::new(x, 0.0, 0.0)),
                Vec3::Y,
                &identity(),
                &identity(),
                &config(),
            );
        }
        m.add_contact(
            contact_at(Vec3::new(5.0, 0.0, 0.0)),
            Vec3::Y,
            &identity(),
            &identity(),
            &config(),
        );
        assert!(m
            .points()
            .iter()
            .any(|p| (p.obj_a.starting_world.x - 5.0).abs() < 1e-5));
    }

    #[test]
    fn drifted_contacts_get_culled_on_update() {
        let mut m = manifold();
        m.add_contact(contact_at(Vec3::ZERO), Vec3::Y, &identity(), &identity(), &config());

        // Slide body A along a tangent beyond the tolerance
        let mut moved = Transform::default();
        moved.position = Vec3::new(0.2, 0.0, 0.0);
        m.update(&moved.to_world(), &identity(), &config());
        assert_eq!(m.size, 0);
    }

    #[test]
    fn update_refreshes_penetration_along_normal() {
        let mut m = manifold();
        m.add_contact(contact_at(Vec3::ZERO), Vec3::Y, &identity(), &identity(), &config());

        // Body B rises a little: anchors separate along +y within tolerance
        let mut moved = Transform::default();
        moved.position = Vec3::new(0.0, 0.02, 0.0);
        m.update(&identity(), &moved.to_world(), &config());
        assert_eq!(m.size, 1);
        assert_relative_eq!(m.contacts[0].penetration, 0.02, epsilon = 1e-5);
    }
}
