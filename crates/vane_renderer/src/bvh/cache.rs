//! On-disk BVH cache, stored next to the scene file as `<scene>.bvh`.
//!
//! Layout (native endianness, so only valid on the machine that wrote it):
//!
//! | field          | size          |
//! |----------------|---------------|
//! | node count     | 4 bytes       |
//! | index count    | 4 bytes       |
//! | nodes          | count * 32    |
//! | triangle index | count * 4     |

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::mem::size_of;
use std::path::{Path, PathBuf};
use std::time::Instant;

use bytemuck::Zeroable;
use thiserror::Error;
use vane_core::Scene;

use super::{Bvh, BvhError, BuildProgress, CompactNode};

const HEADER_LEN: u64 = 2 * size_of::<u32>() as u64;

/// Errors that can occur while reading or writing a cache file.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Cache file is truncated")]
    Truncated,

    #[error("Cache file has trailing data")]
    TrailingData,

    #[error("Inconsistent cache: {0}")]
    Inconsistent(String),
}

/// Cache file for a scene file: the scene's full filename plus `.bvh`.
pub fn cache_path(scene_path: &Path) -> PathBuf {
    let mut name = OsString::from(scene_path.as_os_str());
    name.push(".bvh");
    PathBuf::from(name)
}

/// Write `bvh` to `path`, replacing any existing file.
pub fn save(path: &Path, bvh: &Bvh) -> Result<(), CacheError> {
    let node_count = u32::try_from(bvh.node_count())
        .map_err(|_| CacheError::Inconsistent(format!("{} nodes", bvh.node_count())))?;
    let index_count = u32::try_from(bvh.triangle_count())
        .map_err(|_| CacheError::Inconsistent(format!("{} indices", bvh.triangle_count())))?;

    let mut writer = BufWriter::new(File::create(path)?);
    writer.write_all(&node_count.to_ne_bytes())?;
    writer.write_all(&index_count.to_ne_bytes())?;
    writer.write_all(bytemuck::cast_slice(bvh.nodes()))?;
    writer.write_all(bytemuck::cast_slice(bvh.triangle_indices()))?;
    writer.flush()?;
    Ok(())
}

/// Read a BVH back from `path`.
///
/// Only the file framing is checked here; use [`Bvh::validate`] before
/// trusting the structure.
pub fn load(path: &Path) -> Result<Bvh, CacheError> {
    let file = File::open(path)?;
    let file_len = file.metadata()?.len();
    let mut reader = BufReader::new(file);

    let node_count = read_u32(&mut reader)? as usize;
    let index_count = read_u32(&mut reader)? as usize;

    let expected = HEADER_LEN
        + node_count as u64 * size_of::<CompactNode>() as u64
        + index_count as u64 * size_of::<u32>() as u64;
    if file_len < expected {
        return Err(CacheError::Truncated);
    }
    if file_len > expected {
        return Err(CacheError::TrailingData);
    }
    if node_count == 0 {
        return Err(CacheError::Inconsistent("no nodes".into()));
    }

    let mut nodes = vec![CompactNode::zeroed(); node_count];
    read_exact(&mut reader, bytemuck::cast_slice_mut(&mut nodes))?;

    let mut triangle_indices = vec![0u32; index_count];
    read_exact(&mut reader, bytemuck::cast_slice_mut(&mut triangle_indices))?;

    Ok(Bvh::from_parts(nodes, triangle_indices))
}

fn read_u32(reader: &mut impl Read) -> Result<u32, CacheError> {
    let mut bytes = [0u8; 4];
    read_exact(reader, &mut bytes)?;
    Ok(u32::from_ne_bytes(bytes))
}

fn read_exact(reader: &mut impl Read, buf: &mut [u8]) -> Result<(), CacheError> {
    reader.read_exact(buf).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => CacheError::Truncated,
        _ => CacheError::Io(e),
    })
}

/// Get a BVH for `scene`, from its cache file when possible.
///
/// The cache is used unless `force_recalc` is set, the scene has no source
/// file, or the cache is missing, corrupt, or doesn't match the scene. A
/// fresh build is written back to the cache; failing to write it only
/// costs a rebuild next time, so it is logged and otherwise ignored.
pub fn update_bvh(
    scene: &Scene,
    force_recalc: bool,
    progress: &mut dyn BuildProgress,
) -> Result<Bvh, BvhError> {
    if scene.triangles.is_empty() {
        return Err(BvhError::EmptyScene);
    }

    let Some(source) = scene.source.as_deref() else {
        return Bvh::build(&scene.triangles, progress);
    };
    let path = cache_path(source);

    if !force_recalc {
        let start = Instant::now();
        match load(&path) {
            Ok(bvh) => match bvh.validate(scene.triangle_count()) {
                Ok(()) => {
                    log::info!(
                        "Loaded BVH cache {} in {:.2?}: {} nodes",
                        path.display(),
                        start.elapsed(),
                        bvh.node_count()
                    );
                    return Ok(bvh);
                }
                Err(e) => log::warn!("Discarding BVH cache {}: {}", path.display(), e),
            },
            Err(CacheError::Io(e)) if e.kind() == io::ErrorKind::NotFound => {
                log::debug!("No BVH cache at {}", path.display());
            }
            Err(e) => log::warn!("Discarding BVH cache {}: {}", path.display(), e),
        }
    }

    let bvh = Bvh::build(&scene.triangles, progress)?;

    match save(&path, &bvh) {
        Ok(()) => log::info!("Wrote BVH cache {}", path.display()),
        Err(e) => {
            log::warn!("Could not write BVH cache {}: {}", path.display(), e);
            if let Err(e) = fs::remove_file(&path) {
                if e.kind() != io::ErrorKind::NotFound {
                    log::debug!("Could not remove partial cache {}: {}", path.display(), e);
                }
            }
        }
    }

    Ok(bvh)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bvh::NoProgress;
    use vane_core::{Color, Mesh};
    use vane_math::Vec3;

    /// A grid of quads on the z=0 plane.
    fn grid_scene(n: u32) -> Scene {
        let mut positions = Vec::new();
        for y in 0..=n {
            for x in 0..=n {
                positions.push(Vec3::new(x as f32, y as f32, 0.0));
            }
        }
        let mut indices = Vec::new();
        for y in 0..n {
            for x in 0..n {
                let a = y * (n + 1) + x;
                let b = a + 1;
                let c = a + n + 1;
                let d = c + 1;
                indices.extend_from_slice(&[a, b, d, a, d, c]);
            }
        }
        Scene::from_mesh(&Mesh::new(positions, indices, None), Color::ONE)
    }

    #[test]
    fn test_cache_path_appends_extension() {
        assert_eq!(
            cache_path(Path::new("/scenes/teapot.obj")),
            PathBuf::from("/scenes/teapot.obj.bvh")
        );
        assert_eq!(cache_path(Path::new("model")), PathBuf::from("model.bvh"));
    }

    #[test]
    fn test_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grid.bvh");

        let scene = grid_scene(12);
        let bvh = Bvh::build(&scene.triangles, &mut NoProgress).unwrap();
        save(&path, &bvh).unwrap();

        let expected_len = 8 + bvh.node_count() * 32 + bvh.triangle_count() * 4;
        assert_eq!(fs::metadata(&path).unwrap().len(), expected_len as u64);

        let loaded = load(&path).unwrap();
        assert_eq!(loaded, bvh);
        loaded.validate(scene.triangle_count()).unwrap();
    }

    #[test]
    fn test_truncated_and_padded_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grid.bvh");

        let scene = grid_scene(4);
        let bvh = Bvh::build(&scene.triangles, &mut NoProgress).unwrap();
        save(&path, &bvh).unwrap();
        let bytes = fs::read(&path).unwrap();

        fs::write(&path, &bytes[..bytes.len() - 3]).unwrap();
        assert!(matches!(load(&path), Err(CacheError::Truncated)));

        fs::write(&path, &bytes[..5]).unwrap();
        assert!(matches!(load(&path), Err(CacheError::Truncated)));

        let mut padded = bytes.clone();
        padded.extend_from_slice(&[0, 0, 0, 0]);
        fs::write(&path, &padded).unwrap();
        assert!(matches!(load(&path), Err(CacheError::TrailingData)));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        match load(&dir.path().join("absent.bvh")) {
            Err(CacheError::Io(e)) => assert_eq!(e.kind(), io::ErrorKind::NotFound),
            other => panic!("expected NotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_update_bvh_writes_then_reuses_cache() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("grid.obj");
        let scene = grid_scene(6).with_source(&source);

        let built = update_bvh(&scene, false, &mut NoProgress).unwrap();
        let cache = cache_path(&source);
        assert!(cache.exists());

        // Second call must come from the cache: no progress is reported
        let mut reports = 0;
        let reused = update_bvh(&scene, false, &mut |_: f64| reports += 1).unwrap();
        assert_eq!(reports, 0);
        assert_eq!(reused, built);

        // Forcing a rebuild reports progress again
        let rebuilt = update_bvh(&scene, true, &mut |_: f64| reports += 1).unwrap();
        assert!(reports > 0);
        assert_eq!(rebuilt, built);
    }

    #[test]
    fn test_update_bvh_recovers_from_bad_cache() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("grid.obj");
        let cache = cache_path(&source);

        let scene = grid_scene(5).with_source(&source);

        fs::write(&cache, b"garbage").unwrap();
        let bvh = update_bvh(&scene, false, &mut NoProgress).unwrap();
        bvh.validate(scene.triangle_count()).unwrap();
        assert_eq!(load(&cache).unwrap(), bvh);

        // A well-formed cache for a different scene is also rejected
        let other = grid_scene(3);
        let stale = Bvh::build(&other.triangles, &mut NoProgress).unwrap();
        save(&cache, &stale).unwrap();
        let bvh = update_bvh(&scene, false, &mut NoProgress).unwrap();
        assert_eq!(bvh.triangle_count(), scene.triangle_count());
    }

    #[test]
    fn test_update_bvh_rejects_overlapping_leaves() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("quad.obj");
        let cache = cache_path(&source);
        let scene = grid_scene(1).with_source(&source);

        // Both leaves point at slot 0, so triangle 1 would never be tested
        let bounds = scene.triangles[0].bounds();
        let corrupt = Bvh::from_parts(
            vec![
                CompactNode::inner(&bounds, 1, 2),
                CompactNode::leaf(&bounds, 0, 1),
                CompactNode::leaf(&bounds, 0, 1),
            ],
            vec![0, 1],
        );
        save(&cache, &corrupt).unwrap();

        let bvh = update_bvh(&scene, false, &mut NoProgress).unwrap();
        assert_eq!(bvh, Bvh::build(&scene.triangles, &mut NoProgress).unwrap());
        assert_eq!(load(&cache).unwrap(), bvh);
    }

    #[test]
    fn test_update_bvh_survives_unwritable_cache() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("missing_dir").join("grid.obj");
        let scene = grid_scene(3).with_source(&source);

        let bvh = update_bvh(&scene, false, &mut NoProgress).unwrap();
        bvh.validate(scene.triangle_count()).unwrap();
        assert!(!cache_path(&source).exists());
    }

    #[test]
    fn test_update_bvh_without_source() {
        let scene = grid_scene(2);
        let bvh = update_bvh(&scene, false, &mut NoProgress).unwrap();
        assert_eq!(bvh.triangle_count(), 8);

        assert!(matches!(
            update_bvh(&Scene::new(), false, &mut NoProgress),
            Err(BvhError::EmptyScene)
        ));
    }
}
