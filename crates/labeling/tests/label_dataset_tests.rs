//! End-to-end labeling over a synthetic tile tree.

use std::path::PathBuf;

use labeling::{label_dataset, LabelConfig, LabelError, LabelSummary, ManifestWriter, TerrainMemo};
use test_utils::{assert_manifest_rows, date, gray_from_counts, gray_uniform, layers, rgb_uniform, TileTree};
use tile_common::{Layer, TileExtent};

const RES: u32 = 4;

fn reflectance() -> Layer {
    Layer::daily(layers::REFLECTANCE)
}

fn cloud() -> Layer {
    Layer::daily(layers::CLOUD)
}

fn land_water() -> Layer {
    Layer::fixed(layers::LAND_WATER)
}

fn config(tree: &TileTree) -> LabelConfig {
    LabelConfig {
        images_root: tree.root(),
        reflectance: reflectance(),
        cloud: cloud(),
        land_water: land_water(),
        resolution: RES,
        nodata_fraction: 0.6,
    }
}

fn run(tree: &TileTree, memo: &mut TerrainMemo) -> Result<(LabelSummary, String), LabelError> {
    let mut manifest = ManifestWriter::from_writer(Vec::new())?;
    let summary = label_dataset(&config(tree), memo, &mut manifest)?;
    let body = String::from_utf8(manifest.into_inner()?).unwrap();
    Ok((summary, body))
}

fn show(path: &PathBuf) -> String {
    path.display().to_string()
}

// ============================================================================
// Full scenario
// ============================================================================

#[test]
fn test_labels_two_dates_and_skips_no_data() {
    let tree = TileTree::new();
    let a = TileExtent::new(0, 0, 5);
    let b = TileExtent::new(5, 0, 5);
    let d1 = date("2022-05-01");
    let d2 = date("2022-05-02");

    let a1 = tree.write_tile(&reflectance(), Some(d1), a, gray_uniform(RES, RES, 200));
    tree.write_tile(&reflectance(), Some(d1), b, gray_uniform(RES, RES, 0));
    let a2 = tree.write_tile(&reflectance(), Some(d2), a, gray_uniform(RES, RES, 90));

    // 10 dark vs 6 light => clear
    tree.write_tile(&cloud(), Some(d1), a, gray_from_counts(RES, RES, &[(20, 10)], 240));
    tree.write_tile(&cloud(), Some(d1), b, gray_uniform(RES, RES, 0));
    // 8 vs 8 => cloudy
    tree.write_tile(&cloud(), Some(d2), a, gray_from_counts(RES, RES, &[(127, 8)], 128));

    // 5 water vs 3 land => water
    tree.write_tile(&land_water(), None, a, gray_from_counts(RES, RES, &[(128, 5), (75, 3)], 0));
    tree.write_tile(&land_water(), None, b, gray_uniform(RES, RES, 75));

    let mut memo = TerrainMemo::with_capacity(16);
    let (summary, body) = run(&tree, &mut memo).unwrap();

    assert_manifest_rows!(body, [
        (show(&a1), "clear", "water"),
        (show(&a2), "cloudy", "water"),
    ]);
    assert_eq!(
        summary,
        LabelSummary {
            dates: 2,
            labeled: 2,
            skipped_no_data: 1,
            terrain_computed: 1,
            terrain_reused: 1,
        }
    );
}

#[test]
fn test_no_data_threshold_is_inclusive_at_boundary() {
    // 4x4 at 0.6 => 9.6 valid pixels needed: 10 kept, 9 dropped
    let tree = TileTree::new();
    let d = date("2022-05-01");
    let kept = TileExtent::new(0, 0, 5);
    let dropped = TileExtent::new(0, 5, 5);

    let kept_path = tree.write_tile(&reflectance(), Some(d), kept, gray_from_counts(RES, RES, &[(1, 10)], 0));
    tree.write_tile(&reflectance(), Some(d), dropped, gray_from_counts(RES, RES, &[(1, 9)], 0));
    for extent in [kept, dropped] {
        tree.write_tile(&cloud(), Some(d), extent, gray_uniform(RES, RES, 0));
        tree.write_tile(&land_water(), None, extent, gray_uniform(RES, RES, 128));
    }

    let mut memo = TerrainMemo::with_capacity(16);
    let (summary, body) = run(&tree, &mut memo).unwrap();

    assert_manifest_rows!(body, [(show(&kept_path), "clear", "water")]);
    assert_eq!(summary.skipped_no_data, 1);
}

#[test]
fn test_joins_by_extent_not_listing_position() {
    // The cloud and land/water layers carry extra tiles that sort before the
    // one the reflectance tile needs.
    let tree = TileTree::new();
    let d = date("2022-05-01");
    let target = TileExtent::new(10, 10, 5);

    let path = tree.write_tile(&reflectance(), Some(d), target, gray_uniform(RES, RES, 255));
    tree.write_tile(&cloud(), Some(d), TileExtent::new(-5, -5, 5), gray_uniform(RES, RES, 255));
    tree.write_tile(&cloud(), Some(d), target, gray_uniform(RES, RES, 3));
    tree.write_tile(&land_water(), None, TileExtent::new(-5, -5, 5), gray_uniform(RES, RES, 128));
    tree.write_tile(&land_water(), None, target, gray_uniform(RES, RES, 75));

    let mut memo = TerrainMemo::with_capacity(16);
    let (_, body) = run(&tree, &mut memo).unwrap();
    assert_manifest_rows!(body, [(show(&path), "clear", "land")]);
}

#[test]
fn test_file_with_out_of_range_bbox_token_is_ignored() {
    let tree = TileTree::new();
    let d = date("2022-05-01");
    let e = TileExtent::new(0, 0, 5);
    let path = tree.write_tile(&reflectance(), Some(d), e, gray_uniform(RES, RES, 200));
    tree.write_tile(&cloud(), Some(d), e, gray_uniform(RES, RES, 200));
    tree.write_tile(&land_water(), None, e, gray_uniform(RES, RES, 75));
    let junk = path.with_file_name("junk_-2147483648,0,2147483647,0.png");
    std::fs::write(&junk, b"x").unwrap();

    let mut memo = TerrainMemo::with_capacity(16);
    let (_, body) = run(&tree, &mut memo).unwrap();
    assert_manifest_rows!(body, [(show(&path), "cloudy", "land")]);
}

#[test]
fn test_rgb_land_water_palette_matches_gray_levels() {
    // A gray 128 RGB pixel must still count as water after conversion.
    let tree = TileTree::new();
    let d = date("2022-05-01");
    let e = TileExtent::new(0, 0, 5);
    let path = tree.write_tile(&reflectance(), Some(d), e, rgb_uniform(RES, RES, [30, 60, 90]));
    tree.write_tile(&cloud(), Some(d), e, rgb_uniform(RES, RES, [250, 250, 250]));
    tree.write_tile(&land_water(), None, e, rgb_uniform(RES, RES, [128, 128, 128]));

    let mut memo = TerrainMemo::with_capacity(16);
    let (_, body) = run(&tree, &mut memo).unwrap();
    assert_manifest_rows!(body, [(show(&path), "cloudy", "water")]);
}

// ============================================================================
// Memoization
// ============================================================================

#[test]
fn test_memo_shared_across_runs() {
    let tree = TileTree::new();
    let e = TileExtent::new(0, 0, 5);
    for d in ["2022-05-01", "2022-05-02", "2022-05-03"] {
        tree.write_tile(&reflectance(), Some(date(d)), e, gray_uniform(RES, RES, 50));
        tree.write_tile(&cloud(), Some(date(d)), e, gray_uniform(RES, RES, 200));
    }
    tree.write_tile(&land_water(), None, e, gray_uniform(RES, RES, 128));

    let mut memo = TerrainMemo::with_capacity(16);
    let (first, _) = run(&tree, &mut memo).unwrap();
    assert_eq!(first.terrain_computed, 1);
    assert_eq!(first.terrain_reused, 2);

    let (second, body) = run(&tree, &mut memo).unwrap();
    assert_eq!(second.terrain_computed, 0);
    assert_eq!(second.terrain_reused, 3);
    assert!(body.lines().skip(1).all(|row| row.ends_with(",cloudy,water")));
}

// ============================================================================
// Failures
// ============================================================================

#[test]
fn test_missing_cloud_tile_is_fatal() {
    let tree = TileTree::new();
    let e = TileExtent::new(0, 0, 5);
    tree.write_tile(&reflectance(), Some(date("2022-05-01")), e, gray_uniform(RES, RES, 200));
    tree.write_tile(&land_water(), None, e, gray_uniform(RES, RES, 75));

    let mut memo = TerrainMemo::with_capacity(16);
    let err = run(&tree, &mut memo).unwrap_err();
    match err {
        LabelError::MissingTile { layer, key, .. } => {
            assert_eq!(layer, layers::CLOUD);
            assert_eq!(key, "0,0,5,5");
        }
        other => panic!("expected MissingTile, got {other:?}"),
    }
}

#[test]
fn test_missing_cloud_tile_for_no_data_sample_is_fine() {
    let tree = TileTree::new();
    let e = TileExtent::new(0, 0, 5);
    tree.write_tile(&reflectance(), Some(date("2022-05-01")), e, gray_uniform(RES, RES, 0));
    tree.write_tile(&land_water(), None, e, gray_uniform(RES, RES, 75));

    let mut memo = TerrainMemo::with_capacity(16);
    let (summary, body) = run(&tree, &mut memo).unwrap();
    assert_eq!(summary.skipped_no_data, 1);
    assert_eq!(body, "filepath,weather,terrain\n");
}

#[test]
fn test_corrupt_tile_is_fatal() {
    let tree = TileTree::new();
    let e = TileExtent::new(0, 0, 5);
    tree.write_raw(&reflectance(), Some(date("2022-05-01")), e, b"not a png");
    tree.write_tile(&cloud(), Some(date("2022-05-01")), e, gray_uniform(RES, RES, 0));
    tree.write_tile(&land_water(), None, e, gray_uniform(RES, RES, 75));

    let mut memo = TerrainMemo::with_capacity(16);
    let err = run(&tree, &mut memo).unwrap_err();
    assert!(matches!(err, LabelError::Decode { .. }), "got {err:?}");
}

#[test]
fn test_missing_land_water_dir() {
    let tree = TileTree::new();
    tree.write_tile(&reflectance(), Some(date("2022-05-01")), TileExtent::new(0, 0, 5), gray_uniform(RES, RES, 9));

    let mut memo = TerrainMemo::with_capacity(16);
    let err = run(&tree, &mut memo).unwrap_err();
    assert!(matches!(err, LabelError::MissingLayerDir(_)));
}
