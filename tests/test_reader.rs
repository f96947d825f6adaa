mod common;

use rstest::{fixture, rstest};
use std::{fs, sync::Arc};
use tempfile::TempDir;
use test_log::test;

use sensorio::{
    sensors::SensorType, Band, CheckMethod, Config, Reader, SensorioError, SpectralIndex,
};

#[fixture]
fn dir() -> TempDir {
    tempfile::tempdir().unwrap()
}

fn reader(dir: &TempDir) -> Reader {
    let config = Config {
        output_dir: dir.path().join("out"),
        ..Config::default()
    };
    Reader::with_config(config)
        .unwrap()
        .with_sar_processor(common::FakeProcessor::shared())
}

#[rstest]
#[test]
fn sentinel2_directory(dir: TempDir) {
    let path = common::sentinel2(dir.path());
    let product = reader(&dir).open(&path).unwrap();

    let metadata = product.metadata();
    assert_eq!(metadata.id, common::S2_NAME);
    assert_eq!(metadata.platform, "S2B");
    assert_eq!(metadata.sensor_type, SensorType::Optical);
    assert_eq!(product.condensed_name(), "20241126T093239_S2B_33PTM_MSIL2A");
    assert_eq!(product.default_resolution(), 10.);
    assert_eq!(
        product.native_bands(),
        vec![Band::Green, Band::Red, Band::Nir, Band::Swir1]
    );
    assert!(product.has_index(SpectralIndex::Ndvi));
    assert!(product.has_index(SpectralIndex::Mndwi));
    assert!(!product.has_index(SpectralIndex::Nbr));
    assert!(!product.has_band(Band::Dem));
}

#[rstest]
#[test]
fn sentinel2_zip(dir: TempDir) {
    let root = common::sentinel2(dir.path());
    let zipped = common::zip_dir(&root);
    fs::remove_dir_all(&root).unwrap();

    let product = reader(&dir).open(&zipped).unwrap();
    assert_eq!(product.condensed_name(), "20241126T093239_S2B_33PTM_MSIL2A");
    let extent = product.extent().unwrap();
    assert_eq!(extent.width(), common::SIDE);
}

#[rstest]
#[test]
fn theia_directory(dir: TempDir) {
    let product = reader(&dir).open(common::theia(dir.path())).unwrap();
    assert_eq!(product.metadata().platform, "S2B");
    assert_eq!(product.condensed_name(), "20200101T105844_S2B_31TCJ_L2A");
    assert_eq!(product.native_bands(), vec![Band::Green, Band::Red]);
}

#[rstest]
#[test]
fn landsat_directory(dir: TempDir) {
    let product = reader(&dir).open(common::landsat(dir.path())).unwrap();
    assert_eq!(product.metadata().platform, "LC08");
    assert_eq!(product.condensed_name(), "20200101T103215_LC08_198030_L2SP");
    assert_eq!(product.native_bands(), vec![Band::Red, Band::Nir]);
}

#[rstest]
#[test]
fn landsat_tar(dir: TempDir) {
    let root = common::landsat(dir.path());
    let archive = common::tar_dir(&root);
    fs::remove_dir_all(&root).unwrap();

    let product = reader(&dir).open(&archive).unwrap();
    assert_eq!(product.condensed_name(), "20200101T103215_LC08_198030_L2SP");
    assert_eq!(product.native_bands(), vec![Band::Red, Band::Nir]);
    let loaded = product.load(&[Band::Red], &[], 20.).unwrap();
    assert!(loaded.bands[&Band::Red]
        .valid_values()
        .all(|value| (value - 0.075).abs() < 1e-4));
}

#[rstest]
#[test]
fn unreadable_path(dir: TempDir) {
    assert!(matches!(
        reader(&dir).open("dzfdzef"),
        Err(SensorioError::UnrecognizedProduct(_))
    ));
}

#[rstest]
#[test]
fn sentinel1_directory(dir: TempDir) {
    let product = reader(&dir).open(common::sentinel1(dir.path())).unwrap();
    let metadata = product.metadata();
    assert_eq!(metadata.sensor_type, SensorType::Sar);
    assert_eq!(metadata.tile_or_orbit.as_deref(), Some("100"));
    assert_eq!(product.condensed_name(), "20200101T054123_S1A_100_IW_GRDH");
    assert_eq!(
        product.supported_bands(),
        vec![Band::Vv, Band::Vh, Band::VvDspk, Band::VhDspk]
    );
}

#[rstest]
#[test]
fn renamed_product_is_unrecognized(dir: TempDir) {
    let path = common::sentinel2(dir.path());
    let renamed = dir.path().join("my_product");
    fs::rename(&path, &renamed).unwrap();
    assert!(matches!(
        reader(&dir).open(&renamed),
        Err(SensorioError::UnrecognizedProduct(_))
    ));
}

#[rstest]
#[test]
fn renamed_product_by_metadata(dir: TempDir) {
    let path = common::sentinel2(dir.path());
    let renamed = dir.path().join("my_product");
    fs::rename(&path, &renamed).unwrap();
    let config = Config {
        check_method: CheckMethod::Metadata,
        output_dir: dir.path().join("out"),
        ..Config::default()
    };
    let product = Reader::with_config(config).unwrap().open(&renamed).unwrap();
    // identity comes from the product uri of the metadata
    assert_eq!(product.metadata().id, common::S2_NAME);
}

#[rstest]
#[test]
fn shared_reader(dir: TempDir) {
    let reader = Arc::new(reader(&dir));
    let s2 = common::sentinel2(dir.path());
    let landsat = common::landsat(dir.path());
    let names: Vec<String> = std::thread::scope(|scope| {
        [s2, landsat]
            .into_iter()
            .map(|path| {
                let reader = Arc::clone(&reader);
                scope.spawn(move || reader.open(path).unwrap().condensed_name())
            })
            .collect::<Vec<_>>()
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .collect()
    });
    assert_eq!(
        names,
        vec!["20241126T093239_S2B_33PTM_MSIL2A", "20200101T103215_LC08_198030_L2SP"]
    );
}
