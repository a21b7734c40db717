use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;

use lumen_viewer::assets::{self, LoadEvent, LoadState};
use lumen_viewer::scene::Scene;

const SCENE_DAE: &str = r##"<?xml version="1.0" encoding="utf-8"?>
<COLLADA xmlns="http://www.collada.org/2005/11/COLLADASchema" version="1.4.1">
  <library_geometries>
    <geometry id="tri"><mesh>
      <source id="tri-positions">
        <float_array id="tri-positions-array" count="9">0 0 0 1 0 0 0 1 0</float_array>
        <technique_common><accessor source="#tri-positions-array" count="3" stride="3"/></technique_common>
      </source>
      <vertices id="tri-vertices"><input semantic="POSITION" source="#tri-positions"/></vertices>
      <triangles count="1">
        <input semantic="VERTEX" source="#tri-vertices" offset="0"/>
        <p>0 1 2</p>
      </triangles>
    </mesh></geometry>
  </library_geometries>
  <library_visual_scenes>
    <visual_scene id="Scene" name="Scene">
      <node id="Tri" name="Tri"><instance_geometry url="#tri"/></node>
    </visual_scene>
  </library_visual_scenes>
  <scene><instance_visual_scene url="#Scene"/></scene>
</COLLADA>"##;

fn zip_with(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, content) in entries {
        writer
            .start_file(*name, SimpleFileOptions::default())
            .unwrap();
        writer.write_all(content.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

#[test]
fn valid_archive_attaches_one_child() {
    let archive = zip_with(&[("scene.dae", SCENE_DAE)]);
    let document = assets::load_scene_archive(&archive, "scene.dae").unwrap();

    let mut scene = Scene::stage();
    let before = scene.root.children.len();
    scene.attach(document.scene);

    assert_eq!(scene.root.children.len(), before + 1);

    let mut triangles = 0;
    scene.visit_meshes(|_, mesh| triangles += mesh.triangle_count());
    // Floor (2) + bulb sphere + the loaded triangle.
    assert!(triangles > 3);
}

#[test]
fn missing_entry_is_an_extraction_error() {
    let archive = zip_with(&[("other.dae", SCENE_DAE)]);
    let err = assets::load_scene_archive(&archive, "scene.dae").unwrap_err();
    assert!(format!("{err:#}").contains("scene.dae"));
}

#[test]
fn corrupt_archive_is_rejected() {
    let err = assets::load_scene_archive(b"not a zip at all", "scene.dae").unwrap_err();
    assert!(format!("{err:#}").contains("invalid zip archive"));
}

#[test]
fn malformed_scene_text_is_a_parse_error() {
    let archive = zip_with(&[("scene.dae", "<COLLADA>truncated")]);
    assert!(assets::load_scene_archive(&archive, "scene.dae").is_err());
}

#[test]
fn loader_thread_completes_from_a_local_archive() {
    let archive = zip_with(&[("scene.dae", SCENE_DAE)]);
    let path = std::env::temp_dir().join("lumen_viewer_pipeline_ok.dae.zip");
    std::fs::write(&path, &archive).unwrap();

    let rx = assets::spawn_loader(path.to_string_lossy().into_owned(), "scene.dae".into());

    let mut state = LoadState::Idle;
    let mut scene = Scene::stage();
    let before = scene.root.children.len();
    for event in rx.iter() {
        state.apply(&event);
        if let LoadEvent::Loaded(document) = event {
            scene.attach(document.scene);
        }
    }

    assert_eq!(state, LoadState::Done);
    assert_eq!(scene.root.children.len(), before + 1);

    std::fs::remove_file(&path).ok();
}

#[test]
fn loader_thread_fails_without_touching_the_scene() {
    let archive = zip_with(&[("other.dae", SCENE_DAE)]);
    let path = std::env::temp_dir().join("lumen_viewer_pipeline_bad.dae.zip");
    std::fs::write(&path, &archive).unwrap();

    let rx = assets::spawn_loader(path.to_string_lossy().into_owned(), "scene.dae".into());

    let mut state = LoadState::Idle;
    let mut scene = Scene::stage();
    let before = scene.root.children.len();
    for event in rx.iter() {
        state.apply(&event);
        if let LoadEvent::Loaded(document) = event {
            scene.attach(document.scene);
        }
    }

    assert!(matches!(state, LoadState::Failed(_)));
    assert_eq!(scene.root.children.len(), before);

    std::fs::remove_file(&path).ok();
}
