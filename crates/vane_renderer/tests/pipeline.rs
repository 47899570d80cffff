//! End to end: OBJ on disk -> scene -> cached BVH -> rendered image.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use vane_core::{load_obj, Color, Light, Scene, MAX_COORD_AFTER_RESCALE};
use vane_renderer::bvh::{cache_path, load, NodeKind};
use vane_renderer::{
    render, update_bvh, Bvh, Camera, Culling, NoProgress, Ray, RenderConfig, Vec3,
};

/// UV sphere of radius 3 centred at (10, 10, 10), counter-clockwise from outside.
fn write_sphere_obj(path: &Path, rings: u32, segments: u32) {
    let mut obj = String::new();
    let center = Vec3::splat(10.0);

    writeln!(obj, "v {} {} {}", center.x, center.y + 3.0, center.z).unwrap();
    for ring in 1..rings {
        let phi = std::f32::consts::PI * ring as f32 / rings as f32;
        for seg in 0..segments {
            let theta = std::f32::consts::TAU * seg as f32 / segments as f32;
            let p = center + 3.0 * Vec3::new(phi.sin() * theta.cos(), phi.cos(), phi.sin() * theta.sin());
            writeln!(obj, "v {} {} {}", p.x, p.y, p.z).unwrap();
        }
    }
    writeln!(obj, "v {} {} {}", center.x, center.y - 3.0, center.z).unwrap();

    // OBJ indices are 1-based; vertex 1 is the north pole
    let at = |ring: u32, seg: u32| 2 + (ring - 1) * segments + seg % segments;
    let south = 2 + (rings - 1) * segments;

    for seg in 0..segments {
        writeln!(obj, "f 1 {} {}", at(1, seg + 1), at(1, seg)).unwrap();
    }
    for ring in 1..rings - 1 {
        for seg in 0..segments {
            let (a, b) = (at(ring, seg), at(ring, seg + 1));
            let (c, d) = (at(ring + 1, seg), at(ring + 1, seg + 1));
            writeln!(obj, "f {} {} {} {}", a, b, d, c).unwrap();
        }
    }
    for seg in 0..segments {
        writeln!(obj, "f {} {} {}", south, at(rings - 1, seg), at(rings - 1, seg + 1)).unwrap();
    }

    fs::write(path, obj).unwrap();
}

fn load_scene(path: &Path) -> Scene {
    let mut mesh = load_obj(path).unwrap();
    mesh.recenter_and_rescale(MAX_COORD_AFTER_RESCALE);
    Scene::from_mesh(&mesh, Color::splat(0.8))
        .with_source(path)
        .with_light(Light::new(Vec3::splat(4.0 * MAX_COORD_AFTER_RESCALE)))
}

#[test]
fn build_cache_reload_and_trace() {
    let dir = tempfile::tempdir().unwrap();
    let obj = dir.path().join("sphere.obj");
    write_sphere_obj(&obj, 24, 48);

    let scene = load_scene(&obj);
    assert_eq!(scene.triangle_count(), 48 * 2 + 48 * 2 * 22);

    // First run builds and writes the cache
    let built = update_bvh(&scene, false, &mut NoProgress).unwrap();
    built.validate(scene.triangle_count()).unwrap();
    assert!(cache_path(&obj).exists());

    // Second run reads it back unchanged
    let mut progress_calls = 0;
    let cached = update_bvh(&scene, false, &mut |_: f64| progress_calls += 1).unwrap();
    assert_eq!(progress_calls, 0);
    assert_eq!(cached, built);
    assert_eq!(load(&cache_path(&obj)).unwrap(), built);

    // The rescaled sphere is centred at the origin with radius 1.2. Rays are
    // nudged off the z axis so they don't pass exactly through a vertex.
    let (x, y) = (0.013, 0.021);
    let ray = Ray::new(Vec3::new(x, y, 5.0), -Vec3::Z);
    let hit = cached
        .closest_hit(&scene.triangles, &ray, None, Culling::Backfaces)
        .unwrap();
    let distance = hit.distance_sq.sqrt();
    assert!(distance > 5.0 - 1.2 - 1e-3 && distance < 5.0 - 1.2 + 0.05, "distance {}", distance);

    // The far side faces away from the ray origin: culled with culling on
    let inside = Ray::new(Vec3::new(x, y, 0.0), Vec3::Z);
    assert!(cached
        .closest_hit(&scene.triangles, &inside, None, Culling::Backfaces)
        .is_none());
    assert!(cached
        .closest_hit(&scene.triangles, &inside, None, Culling::Disabled)
        .is_some());

    // A light inside the sphere is hidden from a point outside it
    let towards_center = Ray::new(Vec3::new(x, y, 3.0), -Vec3::Z);
    assert!(cached.occluded(
        &scene.triangles,
        &towards_center,
        Vec3::new(x, y, 0.0),
        None,
        Culling::Backfaces
    ));
    assert!(!cached.occluded(
        &scene.triangles,
        &towards_center,
        Vec3::new(x, y, 2.0),
        None,
        Culling::Backfaces
    ));
}

#[test]
fn corrupt_cache_is_rebuilt_and_overwritten() {
    let dir = tempfile::tempdir().unwrap();
    let obj = dir.path().join("sphere.obj");
    write_sphere_obj(&obj, 8, 12);
    let scene = load_scene(&obj);

    let expected = Bvh::build(&scene.triangles, &mut NoProgress).unwrap();

    let cache = cache_path(&obj);
    fs::write(&cache, [1u8, 0, 0, 0, 9, 0]).unwrap();

    let bvh = update_bvh(&scene, false, &mut NoProgress).unwrap();
    assert_eq!(bvh, expected);
    assert_eq!(load(&cache).unwrap(), expected);

    // force_recalc ignores even a valid cache
    let mut reports = Vec::new();
    let forced = update_bvh(&scene, true, &mut |f: f64| reports.push(f)).unwrap();
    assert_eq!(forced, expected);
    assert_eq!(reports.last().copied(), Some(1.0));
}

#[test]
fn compacted_tree_covers_every_triangle_once() {
    let dir = tempfile::tempdir().unwrap();
    let obj = dir.path().join("sphere.obj");
    write_sphere_obj(&obj, 16, 32);
    let scene = load_scene(&obj);

    let bvh = update_bvh(&scene, true, &mut NoProgress).unwrap();

    let mut seen = vec![0u32; scene.triangle_count()];
    for node in bvh.nodes() {
        if let NodeKind::Leaf { start, count } = node.kind() {
            let bounds = node.bounds();
            for &t in &bvh.triangle_indices()[start as usize..(start + count) as usize] {
                seen[t as usize] += 1;
                assert!(bounds.contains(&scene.triangles[t as usize].bounds()));
            }
        }
    }
    assert!(seen.iter().all(|&n| n == 1));
}

#[test]
fn render_sphere() {
    let dir = tempfile::tempdir().unwrap();
    let obj = dir.path().join("sphere.obj");
    write_sphere_obj(&obj, 12, 24);
    let scene = load_scene(&obj);
    let bvh = update_bvh(&scene, false, &mut NoProgress).unwrap();

    let mut camera = Camera::new()
        .with_resolution(40, 30)
        .with_position(Vec3::new(0.0, 0.0, 4.0 * MAX_COORD_AFTER_RESCALE), Vec3::ZERO, Vec3::Y);
    camera.initialize();

    let config = RenderConfig::default().with_bucket_size(16);
    let image = render(&scene, &bvh, &camera, &config);

    // Sphere in the middle, background in the corner
    assert!(image.get(20, 15).length() > 0.0);
    assert_eq!(image.get(0, 0), Color::ZERO);

    let out = dir.path().join("sphere.png");
    image.save(&out).unwrap();
    assert!(fs::metadata(&out).unwrap().len() > 0);
}
