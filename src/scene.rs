//! Minimal scene graph: transform nodes carrying triangle meshes, plus the
//! two light sources the demo stage uses. The renderer flattens this to
//! world-space triangles; the asset pipeline's only mutation is appending a
//! loaded subtree to the root.

use glam::{Mat4, Vec3};

use crate::photometry::{FrameLighting, BULB_RADIUS};

/// Converts a 0xRRGGBB color to float RGB.
pub fn rgb(hex: u32) -> [f32; 3] {
    [
        ((hex >> 16) & 0xff) as f32 / 255.0,
        ((hex >> 8) & 0xff) as f32 / 255.0,
        (hex & 0xff) as f32 / 255.0,
    ]
}

// === Meshes ===

/// Non-indexed triangle list. `positions` and `normals` run in lockstep,
/// three entries per triangle.
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub color: [f32; 3],
    /// Surface glows with the bulb's per-frame emissive intensity.
    pub emissive: bool,
}

impl Mesh {
    pub fn triangle_count(&self) -> usize {
        self.positions.len() / 3
    }

    /// Horizontal plane centered at the origin, facing +Y.
    pub fn plane(width: f32, depth: f32, color: [f32; 3]) -> Self {
        let (hw, hd) = (width / 2.0, depth / 2.0);
        let corners = [
            Vec3::new(-hw, 0.0, -hd),
            Vec3::new(-hw, 0.0, hd),
            Vec3::new(hw, 0.0, hd),
            Vec3::new(hw, 0.0, -hd),
        ];
        let positions = vec![
            corners[0], corners[1], corners[2], //
            corners[0], corners[2], corners[3],
        ];
        let normals = vec![Vec3::Y; 6];
        Self {
            positions,
            normals,
            color,
            emissive: false,
        }
    }

    /// UV sphere centered at the origin.
    pub fn uv_sphere(
        radius: f32,
        width_segments: u32,
        height_segments: u32,
        color: [f32; 3],
    ) -> Self {
        let mut positions = Vec::new();
        let mut normals = Vec::new();

        let point = |ring: u32, seg: u32| -> Vec3 {
            let v = ring as f32 / height_segments as f32; // 0 at top pole
            let u = seg as f32 / width_segments as f32;
            let theta = v * std::f32::consts::PI;
            let phi = u * std::f32::consts::TAU;
            Vec3::new(
                theta.sin() * phi.cos(),
                theta.cos(),
                theta.sin() * phi.sin(),
            )
        };

        for ring in 0..height_segments {
            for seg in 0..width_segments {
                let a = point(ring, seg);
                let b = point(ring + 1, seg);
                let c = point(ring + 1, seg + 1);
                let d = point(ring, seg + 1);

                // Skip the degenerate triangle at each pole.
                if ring != 0 {
                    positions.extend([a * radius, b * radius, d * radius]);
                    normals.extend([a, b, d]);
                }
                if ring != height_segments - 1 {
                    positions.extend([b * radius, c * radius, d * radius]);
                    normals.extend([b, c, d]);
                }
            }
        }

        Self {
            positions,
            normals,
            color,
            emissive: false,
        }
    }
}

// === Nodes ===

/// A transform node, optionally carrying a mesh.
#[derive(Debug, Clone, Default)]
pub struct Node {
    pub name: String,
    pub transform: Mat4,
    pub mesh: Option<Mesh>,
    pub children: Vec<Node>,
}

impl Node {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transform: Mat4::IDENTITY,
            mesh: None,
            children: Vec::new(),
        }
    }

    pub fn with_mesh(name: impl Into<String>, mesh: Mesh) -> Self {
        Self {
            mesh: Some(mesh),
            ..Self::new(name)
        }
    }

    pub fn add_child(&mut self, child: Node) {
        self.children.push(child);
    }

    /// Visits every mesh in the subtree with its accumulated world transform.
    pub fn visit_meshes(&self, parent: Mat4, f: &mut impl FnMut(Mat4, &Mesh)) {
        let world = parent * self.transform;
        if let Some(mesh) = &self.mesh {
            f(world, mesh);
        }
        for child in &self.children {
            child.visit_meshes(world, f);
        }
    }
}

// === Lights ===

/// Point light measured in luminous power.
#[derive(Debug, Clone)]
pub struct PointLight {
    pub position: Vec3,
    pub color: [f32; 3],
    /// Luminous power in lumens.
    pub power_lm: f32,
    pub cast_shadow: bool,
}

impl PointLight {
    /// Luminous intensity in candela, assuming uniform emission over the
    /// full sphere (physically-correct lights convention).
    pub fn intensity(&self) -> f32 {
        self.power_lm / (4.0 * std::f32::consts::PI)
    }
}

/// Hemisphere ambient light: sky color above, ground color below, intensity
/// in lux.
#[derive(Debug, Clone)]
pub struct HemisphereLight {
    pub sky_color: [f32; 3],
    pub ground_color: [f32; 3],
    pub intensity: f32,
}

// === Scene ===

/// The live scene: a root node plus the demo's light rig. `revision` bumps
/// on every graph mutation so the renderer knows its vertex buffers are
/// stale.
#[derive(Debug, Clone)]
pub struct Scene {
    pub root: Node,
    pub bulb: PointLight,
    pub hemi: HemisphereLight,
    pub revision: u64,
}

impl Scene {
    /// Builds the demo stage: floor plane, bulb light with its visible
    /// sphere, hemisphere sky light.
    pub fn stage() -> Self {
        let bulb_position = Vec3::new(-2.0, 2.0, 2.0);

        let mut root = Node::new("root");

        let floor = Node::with_mesh("floor", Mesh::plane(20.0, 20.0, rgb(0xffffff)));
        root.add_child(floor);

        let mut bulb_mesh = Mesh::uv_sphere(BULB_RADIUS, 16, 8, rgb(0x000000));
        bulb_mesh.emissive = true;
        let mut bulb_node = Node::with_mesh("bulb", bulb_mesh);
        bulb_node.transform = Mat4::from_translation(bulb_position);
        root.add_child(bulb_node);

        Self {
            root,
            bulb: PointLight {
                position: bulb_position,
                color: rgb(0xffee88),
                power_lm: 0.0,
                cast_shadow: true,
            },
            hemi: HemisphereLight {
                sky_color: rgb(0xddeeff),
                ground_color: rgb(0x0f0e0d),
                intensity: 0.02,
            },
            revision: 0,
        }
    }

    /// Appends a loaded subtree under the root. The asset pipeline's single
    /// scene mutation.
    pub fn attach(&mut self, subtree: Node) {
        self.root.add_child(subtree);
        self.revision += 1;
    }

    /// Visits every mesh in the scene with its world transform.
    pub fn visit_meshes(&self, mut f: impl FnMut(Mat4, &Mesh)) {
        self.root.visit_meshes(Mat4::IDENTITY, &mut f);
    }

    /// Pushes the per-frame photometric quantities into the light rig.
    /// Called once per frame before drawing, so toggles take effect in the
    /// same frame.
    pub fn apply_lighting(&mut self, frame: &FrameLighting) {
        self.bulb.power_lm = frame.bulb_power_lm;
        self.bulb.cast_shadow = frame.shadows_enabled;
        self.hemi.intensity = frame.hemi_intensity_lx;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attach_appends_exactly_one_child() {
        let mut scene = Scene::stage();
        let before = scene.root.children.len();
        let rev = scene.revision;

        scene.attach(Node::new("loaded"));

        assert_eq!(scene.root.children.len(), before + 1);
        assert_eq!(scene.revision, rev + 1);
        assert_eq!(scene.root.children.last().unwrap().name, "loaded");
    }

    #[test]
    fn visit_accumulates_transforms() {
        let mut root = Node::new("root");
        let mut mid = Node::new("mid");
        mid.transform = Mat4::from_translation(Vec3::new(1.0, 0.0, 0.0));
        let mut leaf = Node::with_mesh("leaf", Mesh::plane(2.0, 2.0, [1.0; 3]));
        leaf.transform = Mat4::from_translation(Vec3::new(0.0, 3.0, 0.0));
        mid.add_child(leaf);
        root.add_child(mid);

        let mut worlds = Vec::new();
        root.visit_meshes(Mat4::IDENTITY, &mut |world, _| worlds.push(world));

        assert_eq!(worlds.len(), 1);
        let origin = worlds[0].transform_point3(Vec3::ZERO);
        assert_eq!(origin, Vec3::new(1.0, 3.0, 0.0));
    }

    #[test]
    fn sphere_vertices_sit_on_the_radius() {
        let mesh = Mesh::uv_sphere(BULB_RADIUS, 16, 8, [0.0; 3]);
        assert!(mesh.triangle_count() > 0);
        for p in &mesh.positions {
            assert!((p.length() - BULB_RADIUS).abs() < 1e-6);
        }
        for n in &mesh.normals {
            assert!((n.length() - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn point_light_intensity_is_power_over_solid_angle() {
        let light = PointLight {
            position: Vec3::ZERO,
            color: [1.0; 3],
            power_lm: 400.0,
            cast_shadow: true,
        };
        assert_eq!(light.intensity(), 400.0 / (4.0 * std::f32::consts::PI));
    }

    #[test]
    fn shadow_toggle_lands_in_the_same_frame() {
        use crate::photometry::LightingParams;

        let mut scene = Scene::stage();
        let mut params = LightingParams::default();

        scene.apply_lighting(&FrameLighting::derive(&params));
        assert!(scene.bulb.cast_shadow);

        params.shadows = false;
        scene.apply_lighting(&FrameLighting::derive(&params));
        assert!(!scene.bulb.cast_shadow);
        assert_eq!(scene.hemi.intensity, 0.0001);
        assert_eq!(scene.bulb.power_lm, 400.0);
    }

    #[test]
    fn stage_has_floor_and_bulb() {
        let scene = Scene::stage();
        let names: Vec<_> = scene
            .root
            .children
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(names, ["floor", "bulb"]);
        assert!(scene.root.children[1].mesh.as_ref().unwrap().emissive);
    }
}
