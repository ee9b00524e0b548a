//! Deterministic output names.

use std::path::{Path, PathBuf};

use crate::catalog::{
    parse_s1_title, parse_s2_title, BoundingBox, ProductDescriptor, SatelliteFamily,
};
use crate::stage::{StageName, StageScope};

use super::DispatchError;

/// Base name shared by every stage output of a product.
///
/// S2: `<tile>-<sensing time>Z`; S1: `S1_<start>_<stop>`. Box scope prefixes
/// the region slug so box and tile outputs never collide.
pub fn canonical_name(
    descriptor: &ProductDescriptor,
    scope: StageScope,
) -> Result<String, DispatchError> {
    canonical_name_in(descriptor, scope, descriptor.region)
}

/// [`canonical_name`] for a product cut to `region` rather than the region
/// it was first found under. `region` is ignored in tile scope.
pub fn canonical_name_in(
    descriptor: &ProductDescriptor,
    scope: StageScope,
    region: BoundingBox,
) -> Result<String, DispatchError> {
    let invalid = || DispatchError::InvalidTitle {
        product_id: descriptor.id.clone(),
        title: descriptor.title.clone(),
    };

    let base = match descriptor.family {
        SatelliteFamily::S2 => {
            let t = parse_s2_title(&descriptor.title).ok_or_else(invalid)?;
            format!("{}-{}Z", t.tile, t.sensing_time)
        }
        SatelliteFamily::S1 => {
            let t = parse_s1_title(&descriptor.title).ok_or_else(invalid)?;
            format!("S1_{}_{}", t.start_time, t.stop_time)
        }
    };

    Ok(match scope {
        StageScope::Tile => base,
        StageScope::Box => format!("{}-{}", region.slug(), base),
    })
}

/// `<output>/<s1|s2>/<stage dir>/<name>-<SUFFIX>.tif`
pub fn output_path(
    output_dir: &Path,
    family: SatelliteFamily,
    stage: StageName,
    name: &str,
) -> PathBuf {
    output_dir
        .join(family.dir_name())
        .join(stage.dir_name())
        .join(format!("{}-{}.tif", name, stage.suffix()))
}

/// File-system safe form of a catalogue id.
pub fn scratch_key(product_id: &str) -> String {
    product_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::BoundingBox;
    use crate::testing::fixtures;

    fn region() -> BoundingBox {
        BoundingBox::new(10.0, 45.0, 11.0, 46.0).unwrap()
    }

    #[test]
    fn test_s2_name() {
        let d = fixtures::s2_product("id", region());
        assert_eq!(
            canonical_name(&d, StageScope::Tile).unwrap(),
            "T32TQM-20240614T101031Z"
        );
        assert_eq!(
            canonical_name(&d, StageScope::Box).unwrap(),
            "10_45_11_46-T32TQM-20240614T101031Z"
        );
    }

    #[test]
    fn test_box_name_follows_region() {
        let d = fixtures::s2_product("id", region());
        let other = BoundingBox::new(10.5, 45.5, 11.5, 46.5).unwrap();
        assert_eq!(
            canonical_name_in(&d, StageScope::Box, other).unwrap(),
            "10.5_45.5_11.5_46.5-T32TQM-20240614T101031Z"
        );
        assert_eq!(
            canonical_name_in(&d, StageScope::Tile, other).unwrap(),
            "T32TQM-20240614T101031Z"
        );
    }

    #[test]
    fn test_s1_name() {
        let d = fixtures::s1_product("id", region());
        assert_eq!(
            canonical_name(&d, StageScope::Tile).unwrap(),
            "S1_20240101T053012_20240101T053037"
        );
    }

    #[test]
    fn test_name_is_stable() {
        let d = fixtures::s2_product("id", region());
        assert_eq!(
            canonical_name(&d, StageScope::Tile).unwrap(),
            canonical_name(&d.clone(), StageScope::Tile).unwrap()
        );
    }

    #[test]
    fn test_unparseable_title() {
        let mut d = fixtures::s2_product("id", region());
        d.title = "LC08_L1TP_whatever".to_string();
        assert!(matches!(
            canonical_name(&d, StageScope::Tile),
            Err(DispatchError::InvalidTitle { .. })
        ));
    }

    #[test]
    fn test_output_path_layout() {
        let p = output_path(
            Path::new("/out"),
            SatelliteFamily::S1,
            StageName::Difference,
            "S1_a_b",
        );
        assert_eq!(p, PathBuf::from("/out/s1/diffvvvh/S1_a_b-DIFFERENCE.tif"));

        let p = output_path(Path::new("/out"), SatelliteFamily::S2, StageName::VegetationIndex, "n");
        assert_eq!(p, PathBuf::from("/out/s2/ndvi/n-NDVI.tif"));
    }

    #[test]
    fn test_scratch_key() {
        assert_eq!(scratch_key("a1b2-c3_d4"), "a1b2-c3_d4");
        assert_eq!(scratch_key("../x y"), "___x_y");
    }
}
