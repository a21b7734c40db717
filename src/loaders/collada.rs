use anyhow::{anyhow, bail, Context, Result};
use glam::{Mat4, Vec3};
use roxmltree::{Document, Node as XmlNode};
use std::collections::HashMap;

use crate::scene::{Mesh, Node};

const DEFAULT_COLOR: [f32; 3] = [0.8, 0.8, 0.8];

/// Result of parsing a COLLADA document: the visual-scene subtree plus
/// counts of the auxiliary libraries, which are reported and then discarded.
#[derive(Debug)]
pub struct ColladaDocument {
    pub scene: Node,
    pub animation_count: usize,
    pub material_count: usize,
}

/// Parses COLLADA text into a scene subtree.
pub fn parse(text: &str) -> Result<ColladaDocument> {
    let doc = Document::parse(text).context("COLLADA document is not well-formed XML")?;
    let root = doc.root_element();
    if root.tag_name().name() != "COLLADA" {
        bail!("not a COLLADA document (root element <{}>)", root.tag_name().name());
    }

    let materials = parse_materials(root);
    let geometries = parse_geometries(root)?;
    let animation_count = library_entries(root, "library_animations", "animation");

    log::info!(
        "COLLADA parsed: {} geometries, {} materials, {} animations",
        geometries.len(),
        materials.len(),
        animation_count
    );

    let visual_scene = select_visual_scene(root)?;
    let mut scene = Node::new(
        visual_scene
            .attribute("name")
            .or_else(|| visual_scene.attribute("id"))
            .unwrap_or("collada_scene"),
    );
    scene.transform = asset_transform(root);

    for child in element_children(visual_scene) {
        if child.tag_name().name() == "node" {
            scene.add_child(parse_node(child, &geometries, &materials)?);
        }
    }

    Ok(ColladaDocument {
        scene,
        animation_count,
        material_count: materials.len(),
    })
}

// === Document structure ===

fn element_children<'a, 'i>(node: XmlNode<'a, 'i>) -> impl Iterator<Item = XmlNode<'a, 'i>> {
    node.children().filter(|c| c.is_element())
}

fn child_element<'a, 'i>(node: XmlNode<'a, 'i>, name: &str) -> Option<XmlNode<'a, 'i>> {
    element_children(node).find(|c| c.tag_name().name() == name)
}

fn library_entries(root: XmlNode, library: &str, entry: &str) -> usize {
    child_element(root, library)
        .map(|lib| {
            element_children(lib)
                .filter(|c| c.tag_name().name() == entry)
                .count()
        })
        .unwrap_or(0)
}

/// Strips the leading `#` from a URL fragment reference.
fn fragment(url: &str) -> &str {
    url.strip_prefix('#').unwrap_or(url)
}

/// The `<scene>` element names the visual scene to instantiate; fall back to
/// the first one in the library.
fn select_visual_scene<'a, 'i>(root: XmlNode<'a, 'i>) -> Result<XmlNode<'a, 'i>> {
    let library = child_element(root, "library_visual_scenes")
        .context("COLLADA document has no <library_visual_scenes>")?;

    let requested = child_element(root, "scene")
        .and_then(|s| child_element(s, "instance_visual_scene"))
        .and_then(|i| i.attribute("url"))
        .map(fragment);

    if let Some(id) = requested {
        element_children(library)
            .find(|vs| vs.attribute("id") == Some(id))
            .with_context(|| format!("visual scene {id:?} not found"))
    } else {
        element_children(library)
            .find(|vs| vs.tag_name().name() == "visual_scene")
            .context("no <visual_scene> in library")
    }
}

/// Root transform from the `<asset>` block: unit scale and Z_UP correction.
fn asset_transform(root: XmlNode) -> Mat4 {
    let mut transform = Mat4::IDENTITY;
    let Some(asset) = child_element(root, "asset") else {
        return transform;
    };

    if let Some(meter) = child_element(asset, "unit")
        .and_then(|u| u.attribute("meter"))
        .and_then(|m| m.parse::<f32>().ok())
    {
        if meter > 0.0 && meter != 1.0 {
            transform *= Mat4::from_scale(Vec3::splat(meter));
        }
    }

    if let Some(up) = child_element(asset, "up_axis").and_then(|u| u.text()) {
        if up.trim() == "Z_UP" {
            transform *= Mat4::from_rotation_x(-std::f32::consts::FRAC_PI_2);
        }
    }

    transform
}

// === Materials ===

/// material id -> diffuse color, resolved through `<instance_effect>`.
fn parse_materials(root: XmlNode) -> HashMap<String, [f32; 3]> {
    let mut effects: HashMap<&str, [f32; 3]> = HashMap::new();
    if let Some(library) = child_element(root, "library_effects") {
        for effect in element_children(library) {
            let Some(id) = effect.attribute("id") else {
                continue;
            };
            let diffuse = effect
                .descendants()
                .find(|d| d.is_element() && d.tag_name().name() == "diffuse")
                .and_then(|d| child_element(d, "color"))
                .and_then(|c| c.text())
                .and_then(|t| parse_floats(t).ok())
                .filter(|v| v.len() >= 3)
                .map(|v| [v[0], v[1], v[2]]);
            effects.insert(id, diffuse.unwrap_or(DEFAULT_COLOR));
        }
    }

    let mut materials = HashMap::new();
    if let Some(library) = child_element(root, "library_materials") {
        for material in element_children(library) {
            let Some(id) = material.attribute("id") else {
                continue;
            };
            let color = child_element(material, "instance_effect")
                .and_then(|i| i.attribute("url"))
                .and_then(|url| effects.get(fragment(url)).copied())
                .unwrap_or(DEFAULT_COLOR);
            materials.insert(id.to_string(), color);
        }
    }
    materials
}

// === Geometry ===

/// One `<triangles>`/`<polylist>` worth of de-indexed triangles, still
/// carrying its material symbol for `<bind_material>` resolution.
#[derive(Debug, Clone)]
struct Primitive {
    positions: Vec<Vec3>,
    normals: Vec<Vec3>,
    material_symbol: Option<String>,
}

fn parse_geometries(root: XmlNode) -> Result<HashMap<String, Vec<Primitive>>> {
    let mut geometries = HashMap::new();
    let Some(library) = child_element(root, "library_geometries") else {
        return Ok(geometries);
    };

    for geometry in element_children(library) {
        let Some(id) = geometry.attribute("id") else {
            continue;
        };
        let Some(mesh) = child_element(geometry, "mesh") else {
            continue;
        };
        let primitives = parse_mesh(mesh).with_context(|| format!("geometry {id:?}"))?;
        geometries.insert(id.to_string(), primitives);
    }
    Ok(geometries)
}

fn parse_mesh(mesh: XmlNode) -> Result<Vec<Primitive>> {
    // <source> float arrays with their accessor strides.
    let mut sources: HashMap<&str, (Vec<f32>, usize)> = HashMap::new();
    for source in element_children(mesh).filter(|c| c.tag_name().name() == "source") {
        let Some(id) = source.attribute("id") else {
            continue;
        };
        let Some(data) = child_element(source, "float_array").and_then(|a| a.text()) else {
            continue;
        };
        let floats = parse_floats(data).with_context(|| format!("source {id:?}"))?;
        let stride = child_element(source, "technique_common")
            .and_then(|t| child_element(t, "accessor"))
            .and_then(|a| a.attribute("stride"))
            .and_then(|s| s.parse().ok())
            .unwrap_or(3);
        sources.insert(id, (floats, stride));
    }

    // <vertices> indirection: vertices id -> POSITION source id.
    let mut vertices: HashMap<&str, &str> = HashMap::new();
    for verts in element_children(mesh).filter(|c| c.tag_name().name() == "vertices") {
        let (Some(id), Some(input)) = (
            verts.attribute("id"),
            element_children(verts).find(|i| i.attribute("semantic") == Some("POSITION")),
        ) else {
            continue;
        };
        if let Some(source) = input.attribute("source") {
            vertices.insert(id, fragment(source));
        }
    }

    let mut primitives = Vec::new();
    for prim in element_children(mesh) {
        match prim.tag_name().name() {
            "triangles" | "polylist" => {
                primitives.push(parse_primitive(prim, &sources, &vertices)?);
            }
            _ => {}
        }
    }
    Ok(primitives)
}

fn parse_primitive(
    prim: XmlNode,
    sources: &HashMap<&str, (Vec<f32>, usize)>,
    vertices: &HashMap<&str, &str>,
) -> Result<Primitive> {
    let inputs: Vec<XmlNode> = element_children(prim)
        .filter(|c| c.tag_name().name() == "input")
        .collect();

    let input_offset = |semantic: &str| -> Option<usize> {
        inputs
            .iter()
            .find(|i| i.attribute("semantic") == Some(semantic))
            .and_then(|i| i.attribute("offset"))
            .and_then(|o| o.parse().ok())
    };
    let input_source = |semantic: &str| -> Option<&str> {
        inputs
            .iter()
            .find(|i| i.attribute("semantic") == Some(semantic))
            .and_then(|i| i.attribute("source"))
            .map(fragment)
    };

    let tuple_size = inputs
        .iter()
        .filter_map(|i| i.attribute("offset"))
        .filter_map(|o| o.parse::<usize>().ok())
        .max()
        .unwrap_or(0)
        + 1;

    let vertex_offset = input_offset("VERTEX").unwrap_or(0);
    let position_source_id = input_source("VERTEX")
        .and_then(|id| vertices.get(id).copied())
        .context("primitive has no VERTEX input")?;
    let (position_data, position_stride) = sources
        .get(position_source_id)
        .with_context(|| format!("position source {position_source_id:?} not found"))?;

    let normal_input = input_source("NORMAL").and_then(|id| sources.get(id));
    let normal_offset = input_offset("NORMAL").unwrap_or(0);

    // All <p> blocks concatenated, read as tuples of size `tuple_size`.
    let mut indices = Vec::new();
    for p in element_children(prim).filter(|c| c.tag_name().name() == "p") {
        if let Some(text) = p.text() {
            indices.extend(parse_indices(text)?);
        }
    }
    if indices.len() % tuple_size != 0 {
        bail!("index stream length {} is not a multiple of {tuple_size}", indices.len());
    }
    let corners: Vec<&[usize]> = indices.chunks(tuple_size).collect();

    let fetch = |data: &[f32], stride: usize, index: usize| -> Result<Vec3> {
        let base = index * stride;
        if base + 3 > data.len() {
            bail!("index {index} out of bounds for source of {} floats", data.len());
        }
        Ok(Vec3::new(data[base], data[base + 1], data[base + 2]))
    };

    // Triangle corner index triples: direct for <triangles>, fan
    // triangulation of <vcount> polygons for <polylist>.
    let mut triangles: Vec<[usize; 3]> = Vec::new();
    if prim.tag_name().name() == "polylist" {
        let vcounts = child_element(prim, "vcount")
            .and_then(|v| v.text())
            .map(parse_indices)
            .transpose()?
            .unwrap_or_default();
        let mut cursor = 0;
        for count in vcounts {
            if cursor + count > corners.len() {
                bail!("polylist vcount overruns the index stream");
            }
            for i in 1..count.saturating_sub(1) {
                triangles.push([cursor, cursor + i, cursor + i + 1]);
            }
            cursor += count;
        }
    } else {
        for tri in corners.chunks(3) {
            if tri.len() == 3 {
                let base = triangles.len() * 3;
                triangles.push([base, base + 1, base + 2]);
            }
        }
    }

    let mut positions = Vec::with_capacity(triangles.len() * 3);
    let mut normals = Vec::with_capacity(triangles.len() * 3);
    for tri in &triangles {
        let mut face = [Vec3::ZERO; 3];
        for (slot, &corner) in tri.iter().enumerate() {
            face[slot] = fetch(position_data, *position_stride, corners[corner][vertex_offset])?;
        }
        positions.extend(face);

        if let Some((normal_data, normal_stride)) = normal_input {
            for &corner in tri {
                normals.push(fetch(normal_data, *normal_stride, corners[corner][normal_offset])?);
            }
        } else {
            let n = (face[1] - face[0]).cross(face[2] - face[0]).normalize_or_zero();
            normals.extend([n, n, n]);
        }
    }

    Ok(Primitive {
        positions,
        normals,
        material_symbol: prim.attribute("material").map(str::to_string),
    })
}

// === Visual scene nodes ===

fn parse_node(
    xml: XmlNode,
    geometries: &HashMap<String, Vec<Primitive>>,
    materials: &HashMap<String, [f32; 3]>,
) -> Result<Node> {
    let name = xml
        .attribute("name")
        .or_else(|| xml.attribute("id"))
        .unwrap_or("node");
    let mut node = Node::new(name);

    for child in element_children(xml) {
        match child.tag_name().name() {
            // Transform elements compose in document order.
            "matrix" => {
                let v = parse_floats(child.text().unwrap_or_default())?;
                if v.len() != 16 {
                    bail!("node {name:?}: <matrix> needs 16 values, got {}", v.len());
                }
                let m: [f32; 16] = v.try_into().unwrap();
                // COLLADA matrices are row-major.
                node.transform *= Mat4::from_cols_array(&m).transpose();
            }
            "translate" => {
                let v = parse_floats(child.text().unwrap_or_default())?;
                if v.len() == 3 {
                    node.transform *= Mat4::from_translation(Vec3::new(v[0], v[1], v[2]));
                }
            }
            "rotate" => {
                let v = parse_floats(child.text().unwrap_or_default())?;
                if v.len() == 4 {
                    let axis = Vec3::new(v[0], v[1], v[2]);
                    if axis.length_squared() > 0.0 {
                        node.transform *=
                            Mat4::from_axis_angle(axis.normalize(), v[3].to_radians());
                    }
                }
            }
            "scale" => {
                let v = parse_floats(child.text().unwrap_or_default())?;
                if v.len() == 3 {
                    node.transform *= Mat4::from_scale(Vec3::new(v[0], v[1], v[2]));
                }
            }
            "instance_geometry" => {
                let url = child.attribute("url").context("instance_geometry without url")?;
                let id = fragment(url);
                let primitives = geometries
                    .get(id)
                    .with_context(|| format!("geometry {id:?} not found"))?;
                let bindings = material_bindings(child);

                for (i, prim) in primitives.iter().enumerate() {
                    let color = prim
                        .material_symbol
                        .as_deref()
                        .and_then(|symbol| bindings.get(symbol))
                        .and_then(|target| materials.get(*target))
                        .copied()
                        .unwrap_or(DEFAULT_COLOR);
                    let mesh = Mesh {
                        positions: prim.positions.clone(),
                        normals: prim.normals.clone(),
                        color,
                        emissive: false,
                    };
                    node.add_child(Node::with_mesh(format!("{id}.{i}"), mesh));
                }
            }
            "node" => {
                node.add_child(parse_node(child, geometries, materials)?);
            }
            _ => {}
        }
    }

    Ok(node)
}

/// `<bind_material>`: material symbol -> material id.
fn material_bindings<'a, 'i>(instance: XmlNode<'a, 'i>) -> HashMap<&'a str, &'a str> {
    let mut bindings = HashMap::new();
    let Some(technique) =
        child_element(instance, "bind_material").and_then(|b| child_element(b, "technique_common"))
    else {
        return bindings;
    };
    for binding in element_children(technique) {
        if binding.tag_name().name() != "instance_material" {
            continue;
        }
        if let (Some(symbol), Some(target)) =
            (binding.attribute("symbol"), binding.attribute("target"))
        {
            bindings.insert(symbol, fragment(target));
        }
    }
    bindings
}

// === Text helpers ===

fn parse_floats(text: &str) -> Result<Vec<f32>> {
    text.split_whitespace()
        .map(|t| t.parse::<f32>().map_err(|e| anyhow!("bad float {t:?}: {e}")))
        .collect()
}

fn parse_indices(text: &str) -> Result<Vec<usize>> {
    text.split_whitespace()
        .map(|t| t.parse::<usize>().map_err(|e| anyhow!("bad index {t:?}: {e}")))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const ONE_TRIANGLE: &str = r##"<?xml version="1.0" encoding="utf-8"?>
<COLLADA xmlns="http://www.collada.org/2005/11/COLLADASchema" version="1.4.1">
  <asset><up_axis>Y_UP</up_axis></asset>
  <library_effects>
    <effect id="red-effect">
      <profile_COMMON><technique sid="common"><lambert>
        <diffuse><color>1 0 0 1</color></diffuse>
      </lambert></technique></profile_COMMON>
    </effect>
  </library_effects>
  <library_materials>
    <material id="red-material"><instance_effect url="#red-effect"/></material>
  </library_materials>
  <library_geometries>
    <geometry id="tri"><mesh>
      <source id="tri-positions">
        <float_array id="tri-positions-array" count="9">0 0 0 1 0 0 0 1 0</float_array>
        <technique_common><accessor source="#tri-positions-array" count="3" stride="3"/></technique_common>
      </source>
      <vertices id="tri-vertices"><input semantic="POSITION" source="#tri-positions"/></vertices>
      <triangles material="mat0" count="1">
        <input semantic="VERTEX" source="#tri-vertices" offset="0"/>
        <p>0 1 2</p>
      </triangles>
    </mesh></geometry>
  </library_geometries>
  <library_visual_scenes>
    <visual_scene id="Scene" name="Scene">
      <node id="Tri" name="Tri">
        <translate>0 2 0</translate>
        <instance_geometry url="#tri">
          <bind_material><technique_common>
            <instance_material symbol="mat0" target="#red-material"/>
          </technique_common></bind_material>
        </instance_geometry>
      </node>
    </visual_scene>
  </library_visual_scenes>
  <scene><instance_visual_scene url="#Scene"/></scene>
</COLLADA>"##;

    #[test]
    fn parses_a_single_triangle() {
        let doc = parse(ONE_TRIANGLE).unwrap();
        assert_eq!(doc.animation_count, 0);
        assert_eq!(doc.material_count, 1);

        let mut meshes = Vec::new();
        doc.scene
            .visit_meshes(Mat4::IDENTITY, &mut |world, mesh| {
                meshes.push((world, mesh.clone()))
            });
        assert_eq!(meshes.len(), 1);

        let (world, mesh) = &meshes[0];
        assert_eq!(mesh.triangle_count(), 1);
        assert_eq!(mesh.color, [1.0, 0.0, 0.0]);
        // Translate applied through the node transform.
        let p0 = world.transform_point3(mesh.positions[0]);
        assert_eq!(p0, Vec3::new(0.0, 2.0, 0.0));
        // Flat normal computed for the missing NORMAL input.
        assert_eq!(mesh.normals[0], Vec3::Z);
    }

    #[test]
    fn polylist_is_fan_triangulated() {
        let text = ONE_TRIANGLE
            .replace(
                r##"<triangles material="mat0" count="1">
        <input semantic="VERTEX" source="#tri-vertices" offset="0"/>
        <p>0 1 2</p>
      </triangles>"##,
                r##"<polylist material="mat0" count="1">
        <input semantic="VERTEX" source="#tri-vertices" offset="0"/>
        <vcount>4</vcount>
        <p>0 1 2 3</p>
      </polylist>"##,
            )
            .replace(
                "<float_array id=\"tri-positions-array\" count=\"9\">0 0 0 1 0 0 0 1 0</float_array>",
                "<float_array id=\"tri-positions-array\" count=\"12\">0 0 0 1 0 0 1 1 0 0 1 0</float_array>",
            );
        let doc = parse(&text).unwrap();

        let mut total = 0;
        doc.scene
            .visit_meshes(Mat4::IDENTITY, &mut |_, mesh| total += mesh.triangle_count());
        // A quad fans into two triangles.
        assert_eq!(total, 2);
    }

    #[test]
    fn missing_geometry_reference_is_an_error() {
        let text = ONE_TRIANGLE.replace("url=\"#tri\"", "url=\"#nope\"");
        let err = parse(&text).unwrap_err();
        assert!(format!("{err:#}").contains("\"nope\""));
    }

    #[test]
    fn rejects_non_collada_xml() {
        assert!(parse("<svg></svg>").is_err());
        assert!(parse("not xml at all").is_err());
    }

    #[test]
    fn z_up_documents_get_rotated() {
        let text = ONE_TRIANGLE.replace("Y_UP", "Z_UP");
        let doc = parse(&text).unwrap();
        let mut first = Vec3::ZERO;
        doc.scene.visit_meshes(Mat4::IDENTITY, &mut |world, mesh| {
            first = world.transform_point3(mesh.positions[1]);
        });
        // (1, 0, 0) translated by (0, 2, 0), then Z-up -> Y-up.
        assert!((first - Vec3::new(1.0, 0.0, -2.0)).length() < 1e-5);
    }
}
