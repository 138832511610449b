//! OBJ loading against files on disk.

use std::io::Write;
use std::path::Path;

use glam::Vec3;
use tempfile::NamedTempFile;
use vkengine_resources::{Mesh, ResourceError};

fn write_obj(contents: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".obj")
        .tempfile()
        .expect("create temp obj");
    file.write_all(contents.as_bytes()).expect("write temp obj");
    file.flush().expect("flush temp obj");
    file
}

const TWO_TRIANGLES: &str = "\
o pair
v 0.0 0.0 0.0
v 1.0 0.0 0.0
v 0.0 1.0 0.0
v 0.0 0.0 1.0
vn 0.0 0.0 1.0
vn 1.0 0.0 0.0
f 1//1 2//1 3//1
f 1//2 3//2 4//2
";

#[test]
fn test_triangles_expand_to_three_vertices_each() {
    let file = write_obj(TWO_TRIANGLES);
    let mut mesh = Mesh::default();

    let report = mesh.load_from_obj(file.path()).unwrap();

    assert_eq!(report.triangle_count, 2);
    assert_eq!(mesh.vertex_count(), 6);
    assert!(!mesh.is_uploaded());
}

#[test]
fn test_vertices_follow_face_order_and_color_is_normal() {
    let file = write_obj(TWO_TRIANGLES);
    let mut mesh = Mesh::default();
    mesh.load_from_obj(file.path()).unwrap();

    let positions: Vec<Vec3> = mesh.vertices().iter().map(|v| v.position).collect();
    assert_eq!(
        positions,
        vec![
            Vec3::ZERO,
            Vec3::X,
            Vec3::Y,
            Vec3::ZERO,
            Vec3::Y,
            Vec3::Z,
        ]
    );
    assert_eq!(mesh.vertices()[0].normal, Vec3::Z);
    assert_eq!(mesh.vertices()[5].normal, Vec3::X);
    assert!(mesh.vertices().iter().all(|v| v.color == v.normal));
}

#[test]
fn test_quad_is_triangulated() {
    let file = write_obj(
        "\
v -1.0 -1.0 0.0
v 1.0 -1.0 0.0
v 1.0 1.0 0.0
v -1.0 1.0 0.0
vn 0.0 0.0 1.0
f 1//1 2//1 3//1 4//1
",
    );
    let mut mesh = Mesh::default();
    let report = mesh.load_from_obj(file.path()).unwrap();

    assert_eq!(report.triangle_count, 2);
    assert_eq!(mesh.vertex_count(), 6);
}

#[test]
fn test_missing_normals_are_reported() {
    let file = write_obj(
        "\
v 0.0 0.0 0.0
v 1.0 0.0 0.0
v 0.0 1.0 0.0
f 1 2 3
",
    );
    let mut mesh = Mesh::default();
    let report = mesh.load_from_obj(file.path()).unwrap();

    assert_eq!(mesh.vertex_count(), 3);
    assert!(!report.warnings.is_empty());
    assert!(mesh.vertices().iter().all(|v| v.normal == Vec3::ZERO));
}

#[test]
fn test_missing_file_leaves_mesh_untouched() {
    let mut mesh = vkengine_resources::green_triangle();
    let before = mesh.vertices().to_vec();

    let result = mesh.load_from_obj(Path::new("does/not/exist.obj"));

    assert!(matches!(result, Err(ResourceError::FileNotFound(_))));
    assert_eq!(mesh.vertices(), before.as_slice());
}

#[test]
fn test_file_without_faces_is_rejected() {
    let file = write_obj("v 0.0 0.0 0.0\nv 1.0 0.0 0.0\n");
    let mut mesh = vkengine_resources::green_triangle();

    let result = mesh.load_from_obj(file.path());

    assert!(matches!(result, Err(ResourceError::NoMeshes(_))));
    assert_eq!(mesh.vertex_count(), 3);
}

#[test]
fn test_malformed_face_leaves_mesh_untouched() {
    let file = write_obj(
        "\
v 0.0 0.0 0.0
v 1.0 0.0 0.0
v 0.0 1.0 0.0
f 1 2 x
",
    );
    let mut mesh = vkengine_resources::green_triangle();
    let before = mesh.vertices().to_vec();

    let result = mesh.load_from_obj(file.path());

    assert!(matches!(result, Err(ResourceError::ObjLoad { .. })));
    assert_eq!(mesh.vertices(), before.as_slice());
}
