use glam::{Mat3, Vec3};
use serde::{Deserialize, Serialize};

use crate::collision::aabb::Aabb;
use crate::collision::broadphase::AabbTree;
use crate::core::types::{MassInfo, Transform, Transformer};
use crate::utils::allocator::{Arena, EntityId};
use crate::utils::math;

pub type ShapeHandle = EntityId;

/// Stable identity of a collidable sub-instance: a collider, a composite
/// submodel, or an environment triangle. Manifolds are keyed by these.
pub type InstanceHandle = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeKind {
    Sphere,
    Cube,
    Capsule,
    Cylinder,
    Cone,
    Mesh,
    Environment,
    Composite,
    Triangle,
}

/// One shape instanced inside a composite, with its placement relative to
/// the composite's frame.
#[derive(Debug, Clone)]
pub struct Submodel {
    pub shape: ShapeHandle,
    pub local: Transform,
    /// Bounds in the composite's model space.
    pub aabb: Aabb,
    pub instance: InstanceHandle,
}

#[derive(Debug)]
enum ShapeData {
    Sphere,
    Cube,
    Capsule,
    Cylinder,
    Cone,
    Mesh {
        vertices: Vec<Vec3>,
        triangles: Vec<Vec3>,
    },
    Environment {
        triangles: Vec<Vec3>,
        tri_instances: Vec<InstanceHandle>,
        tree: AabbTree<u32>,
    },
    Composite {
        submodels: Vec<Submodel>,
    },
    Triangle {
        verts: [Vec3; 3],
    },
}

/// Convex or composite collision geometry. Primitives are canonical with
/// unit extents from -1 to 1; body scale carries the actual size.
#[derive(Debug)]
pub struct Shape {
    data: ShapeData,
    aabb: Aabb,
}

impl Shape {
    fn primitive(data: ShapeData) -> Self {
        let aabb = match data {
            ShapeData::Capsule => Aabb::new(Vec3::new(-1.0, -2.0, -1.0), Vec3::new(1.0, 2.0, 1.0)),
            _ => Aabb::new(-Vec3::ONE, Vec3::ONE),
        };
        Self { data, aabb }
    }

    pub fn triangle(a: Vec3, b: Vec3, c: Vec3) -> Self {
        Self {
            aabb: Aabb::from_points(&[a, b, c]),
            data: ShapeData::Triangle { verts: [a, b, c] },
        }
    }

    pub fn kind(&self) -> ShapeKind {
        match self.data {
            ShapeData::Sphere => ShapeKind::Sphere,
            ShapeData::Cube => ShapeKind::Cube,
            ShapeData::Capsule => ShapeKind::Capsule,
            ShapeData::Cylinder => ShapeKind::Cylinder,
            ShapeData::Cone => ShapeKind::Cone,
            ShapeData::Mesh { .. } => ShapeKind::Mesh,
            ShapeData::Environment { .. } => ShapeKind::Environment,
            ShapeData::Composite { .. } => ShapeKind::Composite,
            ShapeData::Triangle { .. } => ShapeKind::Triangle,
        }
    }

    pub fn aabb(&self) -> &Aabb {
        &self.aabb
    }

    pub fn submodels(&self) -> &[Submodel] {
        match &self.data {
            ShapeData::Composite { submodels } => submodels,
            _ => &[],
        }
    }

    pub fn environment(&self) -> Option<(&[Vec3], &[InstanceHandle], &AabbTree<u32>)> {
        match &self.data {
            ShapeData::Environment {
                triangles,
                tri_instances,
                tree,
            } => Some((triangles, tri_instances, tree)),
            _ => None,
        }
    }

    pub fn triangles(&self) -> &[Vec3] {
        match &self.data {
            ShapeData::Mesh { triangles, .. } => triangles,
            ShapeData::Environment { triangles, .. } => triangles,
            _ => &[],
        }
    }

    /// Farthest point of the shape in `dir`, both in model space.
    pub fn support(&self, dir: Vec3) -> Vec3 {
        match &self.data {
            ShapeData::Sphere => dir.normalize_or_zero(),
            ShapeData::Cube => Vec3::new(
                if dir.x > 0.0 { 1.0 } else { -1.0 },
                if dir.y > 0.0 { 1.0 } else { -1.0 },
                if dir.z > 0.0 { 1.0 } else { -1.0 },
            ),
            ShapeData::Capsule => {
                let cap = if dir.y > 0.0 { Vec3::Y } else { -Vec3::Y };
                cap + dir.normalize_or_zero()
            }
            ShapeData::Cylinder => {
                let axial = if dir.y > 0.0 { Vec3::Y } else { -Vec3::Y };
                let radial = Vec3::new(dir.x, 0.0, dir.z).normalize_or_zero();
                axial + radial
            }
            ShapeData::Cone => {
                // Canonical cone is centered at its center of mass, a quarter
                // of the height up from the base: base y=-0.5, tip y=1.5
                let tip = Vec3::new(0.0, 1.5, 0.0);
                let radial = Vec3::new(dir.x, 0.0, dir.z).normalize_or_zero();
                let base = Vec3::new(radial.x, -0.5, radial.z);
                if dir.dot(tip) > dir.dot(base) {
                    tip
                } else {
                    base
                }
            }
            ShapeData::Mesh { vertices, .. } => {
                let mut best = Vec3::ZERO;
                let mut best_dot = f32::MIN;
                for &v in vertices {
                    let dot = v.dot(dir);
                    if dot > best_dot {
                        best_dot = dot;
                        best = v;
                    }
                }
                best
            }
            ShapeData::Triangle { verts } => {
                let a = verts[0].dot(dir);
                let b = verts[1].dot(dir);
                let c = verts[2].dot(dir);
                if a > b {
                    if a > c {
                        verts[0]
                    } else {
                        verts[2]
                    }
                } else if b > c {
                    verts[1]
                } else {
                    verts[2]
                }
            }
            ShapeData::Environment { .. } | ShapeData::Composite { .. } => {
                debug_assert!(false, "container shapes are traversed, not support-mapped");
                Vec3::ZERO
            }
        }
    }

    /// World-space bounds under `to_world`.
    pub fn world_aabb(&self, to_world: &Transformer) -> Aabb {
        match &self.data {
            ShapeData::Sphere => {
                let radius = Vec3::splat(to_world.scale_rot.x_axis.length());
                Aabb::new(to_world.pos - radius, to_world.pos + radius)
            }
            ShapeData::Composite { submodels } => {
                let mut iter = submodels.iter();
                let first = match iter.next() {
                    Some(sub) => sub.aabb.transform(to_world),
                    None => return Aabb::from_point(to_world.pos),
                };
                iter.fold(first, |acc, sub| {
                    Aabb::combined(&acc, &sub.aabb.transform(to_world))
                })
            }
            ShapeData::Environment { triangles, .. } => {
                // Environments never move, so pay for the tightest fit
                let mut iter = triangles.iter();
                let first = match iter.next() {
                    Some(&p) => Aabb::from_point(to_world.transform_point(p)),
                    None => return Aabb::from_point(to_world.pos),
                };
                iter.fold(first, |mut acc, &p| {
                    acc.add(to_world.transform_point(p));
                    acc
                })
            }
            _ => self.aabb.transform(to_world),
        }
    }

    /// Shift the shape's geometry, used to re-center onto the center of mass.
    fn offset(&mut self, offset: Vec3) {
        match &mut self.data {
            ShapeData::Mesh {
                vertices,
                triangles,
            } => {
                for p in vertices.iter_mut() {
                    *p += offset;
                }
                for p in triangles.iter_mut() {
                    *p += offset;
                }
            }
            ShapeData::Composite { submodels } => {
                for sub in submodels.iter_mut() {
                    sub.local.position += offset;
                    sub.aabb.translate(offset);
                }
            }
            _ => {}
        }
        self.aabb.translate(offset);
    }
}

/// Parameters for registering a non-composite shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ShapeParam {
    Sphere,
    Cube,
    Capsule,
    Cylinder,
    Cone,
    /// Convex hull: support vertices plus a closed triangle soup (three
    /// entries per triangle) for mass integration.
    Mesh {
        vertices: Vec<Vec3>,
        triangles: Vec<Vec3>,
    },
    /// Static triangle soup, three entries per triangle.
    Environment { triangles: Vec<Vec3> },
}

/// Parameters for registering a composite shape built from already
/// registered shapes.
#[derive(Debug, Clone, Default)]
pub struct CompositeParam {
    pub instances: Vec<(ShapeHandle, Transform)>,
}

/// Owns every registered shape and hands out stable handles. Registration
/// re-centers non-environment shapes onto their center of mass.
pub struct ShapeRegistry {
    shapes: Arena<Shape>,
    next_instance: InstanceHandle,
}

impl Default for ShapeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ShapeRegistry {
    pub fn new() -> Self {
        Self {
            shapes: Arena::new(),
            next_instance: 1,
        }
    }

    pub fn next_instance_handle(&mut self) -> InstanceHandle {
        let handle = self.next_instance;
        self.next_instance += 1;
        handle
    }

    pub fn get(&self, handle: ShapeHandle) -> Option<&Shape> {
        self.shapes.get(handle)
    }

    pub fn remove(&mut self, handle: ShapeHandle) {
        self.shapes.remove(handle);
    }

    pub fn add_shape(&mut self, param: ShapeParam) -> ShapeHandle {
        let mut shape = match param {
            ShapeParam::Sphere => Shape::primitive(ShapeData::Sphere),
            ShapeParam::Cube => Shape::primitive(ShapeData::Cube),
            ShapeParam::Capsule => Shape::primitive(ShapeData::Capsule),
            ShapeParam::Cylinder => Shape::primitive(ShapeData::Cylinder),
            ShapeParam::Cone => Shape::primitive(ShapeData::Cone),
            ShapeParam::Mesh {
                vertices,
                triangles,
            } => Shape {
                aabb: Aabb::from_points(&vertices),
                data: ShapeData::Mesh {
                    vertices,
                    triangles,
                },
            },
            ShapeParam::Environment { triangles } => {
                let mut tree = AabbTree::new(0.0);
                let mut tri_instances = Vec::with_capacity(triangles.len() / 3);
                for base in (0..triangles.len().saturating_sub(2)).step_by(3) {
                    let bb = Aabb::from_points(&triangles[base..base + 3]);
                    tree.insert(bb, base as u32);
                    tri_instances.push(self.next_instance_handle());
                }
                Shape {
                    aabb: Aabb::from_points(&triangles),
                    data: ShapeData::Environment {
                        triangles,
                        tri_instances,
                        tree,
                    },
                }
            }
        };

        if shape.kind() != ShapeKind::Environment {
            let info = self.compute_mass_of(&shape, Vec3::ONE);
            shape.offset(-info.center_of_mass);
        }
        self.shapes.insert(shape)
    }

    pub fn add_composite(&mut self, param: CompositeParam) -> ShapeHandle {
        let mut submodels = Vec::with_capacity(param.instances.len());
        let mut aabb: Option<Aabb> = None;
        for (handle, local) in param.instances {
            let sub_aabb = match self.get(handle) {
                Some(shape) => shape.world_aabb(&local.to_world()),
                None => {
                    debug_assert!(false, "composite references unregistered shape");
                    continue;
                }
            };
            aabb = Some(match aabb {
                Some(acc) => Aabb::combined(&acc, &sub_aabb),
                None => sub_aabb,
            });
            submodels.push(Submodel {
                shape: handle,
                local,
                aabb: sub_aabb,
                instance: self.next_instance_handle(),
            });
        }

        let mut shape = Shape {
            aabb: aabb.unwrap_or_default(),
            data: ShapeData::Composite { submodels },
        };
        let info = self.compute_mass_of(&shape, Vec3::ONE);
        shape.offset(-info.center_of_mass);
        self.shapes.insert(shape)
    }

    /// Mass, center of mass, and model-space diagonal inertia at unit
    /// density. Scale is the owning body's scale.
    pub fn compute_mass(&self, handle: ShapeHandle, scale: Vec3) -> MassInfo {
        match self.get(handle) {
            Some(shape) => self.compute_mass_of(shape, scale),
            None => MassInfo::default(),
        }
    }

    fn compute_mass_of(&self, shape: &Shape, scale: Vec3) -> MassInfo {
        match &shape.data {
            ShapeData::Sphere => sphere_mass(scale),
            ShapeData::Cube => cube_mass(scale),
            ShapeData::Capsule => capsule_mass(scale),
            ShapeData::Cylinder => cylinder_mass(scale),
            ShapeData::Cone => cone_mass(scale),
            ShapeData::Mesh { triangles, .. } => mesh_mass(triangles, scale),
            ShapeData::Composite { submodels } => self.composite_mass(submodels, scale),
            // Environments never move, so their mass reads as infinite
            ShapeData::Environment { .. } => MassInfo {
                mass: 0.0,
                center_of_mass: Vec3::ZERO,
                inertia: Vec3::ZERO,
            },
            ShapeData::Triangle { .. } => MassInfo::default(),
        }
    }

    fn composite_mass(&self, submodels: &[Submodel], scale: Vec3) -> MassInfo {
        let mut result = MassInfo::default();
        let mut infos = Vec::with_capacity(submodels.len());

        for sub in submodels {
            let sub_scale = scale * sub.local.scale;
            let mut info = match self.get(sub.shape) {
                Some(shape) => self.compute_mass_of(shape, sub_scale),
                None => MassInfo::default(),
            };
            result.mass += info.mass;
            // Center of mass of the instance relative to the composite frame
            info.center_of_mass = sub.local.position * scale + info.center_of_mass;
            result.center_of_mass += info.mass * info.center_of_mass;
            infos.push(info);
        }
        result.center_of_mass =
            math::safe_divide_vec(result.center_of_mass, result.mass, math::EPSILON);

        let mut inertia = Mat3::ZERO;
        for (sub, info) in submodels.iter().zip(&infos) {
            let mut local = Mat3::from_diagonal(info.inertia);
            local = math::tensor_rotate(local, Mat3::from_quat(sub.local.rotation));
            local = math::tensor_translate(
                local,
                info.center_of_mass - result.center_of_mass,
                info.mass,
            );
            inertia += local;
        }
        result.inertia = math::diagonalize_symmetric(inertia);
        result
    }
}

fn sphere_mass(scale: Vec3) -> MassInfo {
    let radius_sq = scale.x * scale.x;
    let mass = (4.0 * std::f32::consts::PI / 3.0) * radius_sq * scale.x;
    MassInfo {
        mass,
        center_of_mass: Vec3::ZERO,
        inertia: Vec3::splat(0.4 * radius_sq * mass),
    }
}

fn cube_mass(scale: Vec3) -> MassInfo {
    let mass = scale.x * scale.y * scale.z;
    let bb = Aabb::new(-scale, scale);
    MassInfo {
        mass,
        center_of_mass: Vec3::ZERO,
        inertia: mass * bb.inertia(),
    }
}

fn capsule_mass(scale: Vec3) -> MassInfo {
    let radius = scale.x;
    let cylinder_height = scale.y * 2.0;
    let radius2 = radius * radius;
    let cylinder_mass = std::f32::consts::PI * cylinder_height * radius2;
    let hemisphere_mass = (2.0 * std::f32::consts::PI / 3.0) * radius2 * radius;

    let mut inertia = Vec3::ZERO;
    inertia.y = radius2 * cylinder_mass * 0.5;
    inertia.x = inertia.y * 0.5 + cylinder_mass * cylinder_height * cylinder_height / 12.0;
    inertia.z = inertia.x;
    let t0 = hemisphere_mass * radius2 * (2.0 / 5.0);
    let t1 = 2.0 * (t0 + hemisphere_mass * (scale.y * scale.y + 0.375 * cylinder_height * radius));
    inertia.x += t1;
    inertia.z += t1;

    MassInfo {
        mass: 2.0 * hemisphere_mass + cylinder_mass,
        center_of_mass: Vec3::ZERO,
        inertia,
    }
}

fn cylinder_mass(scale: Vec3) -> MassInfo {
    let radius = scale.x;
    let height = scale.y * 2.0;
    let radius2 = radius * radius;
    let mass = std::f32::consts::PI * radius2 * height;
    let side = mass * (3.0 * radius2 + height * height) / 12.0;
    MassInfo {
        mass,
        center_of_mass: Vec3::ZERO,
        inertia: Vec3::new(side, mass * radius2 * 0.5, side),
    }
}

fn cone_mass(scale: Vec3) -> MassInfo {
    let radius = scale.x;
    let height = scale.y * 2.0;
    let radius2 = radius * radius;
    let mass = std::f32::consts::PI * radius2 * height / 3.0;
    // About the center of mass, a quarter height above the base
    let side = mass * (3.0 * radius2 / 20.0 + 3.0 * height * height / 80.0);
    MassInfo {
        mass,
        center_of_mass: Vec3::ZERO,
        inertia: Vec3::new(side, mass * 3.0 * radius2 / 10.0, side),
    }
}

/// Polyhedral mass integration over a closed triangle soup.
/// http://www.geometrictools.com/Documentation/PolyhedralMassProperties.pdf
fn mesh_mass(triangles: &[Vec3], scale: Vec3) -> MassInfo {
    const MULT: [f64; 10] = [
        1.0 / 6.0,
        1.0 / 24.0,
        1.0 / 24.0,
        1.0 / 24.0,
        1.0 / 60.0,
        1.0 / 60.0,
        1.0 / 60.0,
        1.0 / 120.0,
        1.0 / 120.0,
        1.0 / 120.0,
    ];

    fn subexpressions(w0: f64, w1: f64, w2: f64) -> (f64, f64, f64, f64, f64, f64) {
        let temp0 = w0 + w1;
        let f1 = temp0 + w2;
        let temp1 = w0 * w0;
        let temp2 = temp1 + w1 * temp0;
        let f2 = temp2 + w2 * f1;
        let f3 = w0 * temp1 + w1 * temp2 + w2 * f2;
        let g0 = f2 + w0 * (f1 + w0);
        let g1 = f2 + w1 * (f1 + w1);
        let g2 = f2 + w2 * (f1 + w2);
        (f1, f2, f3, g0, g1, g2)
    }

    // Integral order: 1, x, y, z, x^2, y^2, z^2, xy, yz, zx
    let mut intg = [0.0f64; 10];

    let mut i = 0;
    while i + 2 < triangles.len() {
        let a = triangles[i] * scale;
        let b = triangles[i + 1] * scale;
        let c = triangles[i + 2] * scale;
        i += 3;

        let normal = (b - a).cross(c - a);
        let (nx, ny, nz) = (normal.x as f64, normal.y as f64, normal.z as f64);

        let (f1x, f2x, f3x, g0x, g1x, g2x) = subexpressions(a.x as f64, b.x as f64, c.x as f64);
        let (_f1y, f2y, f3y, g0y, g1y, g2y) = subexpressions(a.y as f64, b.y as f64, c.y as f64);
        let (_f1z, f2z, f3z, g0z, g1z, g2z) = subexpressions(a.z as f64, b.z as f64, c.z as f64);

        intg[0] += nx * f1x;
        intg[1] += nx * f2x;
        intg[2] += ny * f2y;
        intg[3] += nz * f2z;
        intg[4] += nx * f3x;
        intg[5] += ny * f3y;
        intg[6] += nz * f3z;
        intg[7] += nx * (a.y as f64 * g0x + b.y as f64 * g1x + c.y as f64 * g2x);
        intg[8] += ny * (a.z as f64 * g0y + b.z as f64 * g1y + c.z as f64 * g2y);
        intg[9] += nz * (a.x as f64 * g0z + b.x as f64 * g1z + c.x as f64 * g2z);
    }

    for (value, mult) in intg.iter_mut().zip(MULT) {
        *value *= mult;
    }
    let mass = intg[0];
    let eps = math::EPSILON as f64;
    let cx = if mass.abs() < eps { 0.0 } else { intg[1] / mass };
    let cy = if mass.abs() < eps { 0.0 } else { intg[2] / mass };
    let cz = if mass.abs() < eps { 0.0 } else { intg[3] / mass };

    let mut inertia = Mat3::ZERO;
    inertia.x_axis.x = (intg[5] + intg[6] - mass * (cy * cy + cz * cz)) as f32;
    inertia.y_axis.y = (intg[4] + intg[6] - mass * (cz * cz + cx * cx)) as f32;
    inertia.z_axis.z = (intg[4] + intg[5] - mass * (cx * cx + cy * cy)) as f32;
    let ixy = -(intg[7] - mass * cx * cy) as f32;
    let iyz = -(intg[8] - mass * cy * cz) as f32;
    let izx = -(intg[9] - mass * cz * cx) as f32;
    inertia.y_axis.x = ixy;
    inertia.x_axis.y = ixy;
    inertia.z_axis.y = iyz;
    inertia.y_axis.z = iyz;
    inertia.x_axis.z = izx;
    inertia.z_axis.x = izx;

    MassInfo {
        mass: mass as f32,
        center_of_mass: Vec3::new(cx as f32, cy as f32, cz as f32),
        inertia: math::diagonalize_symmetric(inertia),
    }
}

/// Triangle soup of a unit cube, used by mesh tests and demos.
pub fn unit_cube_triangles(half_extent: f32) -> Vec<Vec3> {
    let h = half_extent;
    let v = [
        Vec3::new(-h, -h, -h),
        Vec3::new(h, -h, -h),
        Vec3::new(h, h, -h),
        Vec3::new(-h, h, -h),
        Vec3::new(-h, -h, h),
        Vec3::new(h, -h, h),
        Vec3::new(h, h, h),
        Vec3::new(-h, h, h),
    ];
    // Outward winding, two triangles per face
    let quads = [
        [1, 0, 3, 2], // -z
        [4, 5, 6, 7], // +z
        [0, 4, 7, 3], // -x
        [5, 1, 2, 6], // +x
        [0, 1, 5, 4], // -y
        [3, 7, 6, 2], // +y
    ];
    let mut triangles = Vec::with_capacity(36);
    for q in quads {
        triangles.extend([v[q[0]], v[q[1]], v[q[2]]]);
        triangles.extend([v[q[0]], v[q[2]], v[q[3]]]);
    }
    triangles
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn primitive_supports_reach_canonical_extents() {
        let cube = Shape::primitive(ShapeData::Cube);
        assert_eq!(cube.support(Vec3::new(0.3, -0.2, 0.9)), Vec3::new(1.0, -1.0, 1.0));

        let sphere = Shape::primitive(ShapeData::Sphere);
        assert_relative_eq!(sphere.support(Vec3::new(0.0, 3.0, 0.0)).y, 1.0);

        let capsule = Shape::primitive(ShapeData::Capsule);
        assert_relative_eq!(capsule.support(Vec3::Y).y, 2.0);

        let cylinder = Shape::primitive(ShapeData::Cylinder);
        let s = cylinder.support(Vec3::new(1.0, 1.0, 0.0));
        assert_relative_eq!(s.x, 1.0);
        assert_relative_eq!(s.y, 1.0);

        let cone = Shape::primitive(ShapeData::Cone);
        assert_relative_eq!(cone.support(Vec3::Y).y, 1.5);
        let base = cone.support(Vec3::new(1.0, -1.0, 0.0));
        assert_relative_eq!(base.y, -0.5);
        assert_relative_eq!(base.x, 1.0);
    }

    #[test]
    fn mesh_mass_matches_analytic_cube() {
        let info = mesh_mass(&unit_cube_triangles(1.0), Vec3::ONE);
        // Volume of the 2x2x2 cube
        assert_relative_eq!(info.mass, 8.0, epsilon = 1e-3);
        assert!(info.center_of_mass.length() < 1e-4);
        // m/12 * (h^2 + w^2) = 8/12 * 8
        for i in 0..3 {
            assert_relative_eq!(info.inertia[i], 8.0 * 8.0 / 12.0, epsilon = 1e-2);
        }
    }

    #[test]
    fn registration_recenters_mesh_on_center_of_mass() {
        let mut registry = ShapeRegistry::new();
        let offset = Vec3::new(3.0, 0.0, 0.0);
        let triangles: Vec<Vec3> = unit_cube_triangles(1.0).iter().map(|&p| p + offset).collect();
        let vertices: Vec<Vec3> = triangles.clone();
        let handle = registry.add_shape(ShapeParam::Mesh {
            vertices,
            triangles,
        });

        let shape = registry.get(handle).expect("registered");
        let center = shape.aabb().center();
        assert!(center.length() < 1e-3, "center was {center:?}");
    }

    #[test]
    fn environment_tree_finds_triangles_by_volume() {
        let mut registry = ShapeRegistry::new();
        let triangles = vec![
            Vec3::new(-1.0, 0.0, -1.0),
            Vec3::new(1.0, 0.0, -1.0),
            Vec3::new(0.0, 0.0, 1.0),
            Vec3::new(9.0, 0.0, -1.0),
            Vec3::new(11.0, 0.0, -1.0),
            Vec3::new(10.0, 0.0, 1.0),
        ];
        let handle = registry.add_shape(ShapeParam::Environment { triangles });
        let shape = registry.get(handle).expect("registered");
        let (_, instances, tree) = shape.environment().expect("environment data");
        assert_eq!(instances.len(), 2);

        let mut context = crate::collision::broadphase::TreeContext::new();
        tree.query_volume(
            &Aabb::new(Vec3::new(-2.0, -1.0, -2.0), Vec3::new(2.0, 1.0, 2.0)),
            &mut context,
        );
        assert_eq!(context.results, vec![0]);
    }

    #[test]
    fn composite_mass_accumulates_submodels() {
        let mut registry = ShapeRegistry::new();
        let sphere = registry.add_shape(ShapeParam::Sphere);
        let composite = registry.add_composite(CompositeParam {
            instances: vec![
                (sphere, Transform::from_position(Vec3::new(-2.0, 0.0, 0.0))),
                (sphere, Transform::from_position(Vec3::new(2.0, 0.0, 0.0))),
            ],
        });

        let single = registry.compute_mass(sphere, Vec3::ONE);
        let combined = registry.compute_mass(composite, Vec3::ONE);
        assert_relative_eq!(combined.mass, 2.0 * single.mass, epsilon = 1e-4);
        assert!(combined.center_of_mass.length() < 1e-4);
        // Parallel axis pushes the x-separated spheres' y/z moments up
        assert!(combined.inertia.y > 2.0 * single.inertia.y);
    }
}
