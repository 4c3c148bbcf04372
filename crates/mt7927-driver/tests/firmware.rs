// SPDX-License-Identifier: AGPL-3.0-only

//! Firmware sources and containers from disk
//!
//! Files are written to a temporary firmware root and read back through the
//! same paths bring-up uses.

use std::fs;

use bytes::Bytes;
use mt7927_chip::variant::MT7927;
use mt7927_driver::firmware::{
    BundleBuilder, BundleSource, DirectorySource, FirmwareSource, PatchImage, PatchImageBuilder,
    RamImage, RamImageBuilder,
};
use mt7927_driver::sim::Simulator;
use mt7927_driver::{Bringup, BringupConfig, BringupError, RunConfidence, ENV_FIRMWARE_DIR};

fn images() -> (Bytes, Bytes) {
    let patch = PatchImageBuilder::new()
        .platform("ALPS")
        .section(0x20_0000, vec![0xa5u8; 3000])
        .build()
        .expect("patch image");
    let ram = RamImageBuilder::new(0x27, 0x01)
        .fw_ver("1.0.0")
        .region(0x0220_0000, vec![0x5au8; 1000])
        .build()
        .expect("ram image");
    (patch, ram)
}

fn write_tree(root: &std::path::Path, config: &BringupConfig) {
    let (patch, ram) = images();
    for (name, data) in [(&config.patch_name, patch), (&config.ram_name, ram)] {
        let path = root.join(name);
        fs::create_dir_all(path.parent().expect("parent dir")).expect("mkdir");
        fs::write(&path, &data).expect("write firmware");
    }
}

#[test]
fn test_directory_source_reads_nested_names() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = BringupConfig::for_variant(&MT7927).with_firmware_dir(dir.path());
    write_tree(dir.path(), &config);

    let src = config.directory_source();
    let patch = PatchImage::parse(src.load(&config.patch_name).expect("load patch")).expect("parse");
    assert_eq!(patch.header().platform, "ALPS");
    assert_eq!(patch.downloadable().count(), 1);

    let ram = RamImage::parse(src.load(&config.ram_name).expect("load ram")).expect("parse");
    assert_eq!(ram.trailer().fw_ver, "1.0.0");
}

#[test]
fn test_directory_source_missing_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let err = DirectorySource::new(dir.path()).load("mediatek/none.bin").unwrap_err();
    assert!(matches!(err, BringupError::FirmwareNotFound { ref name } if name == "mediatek/none.bin"));
}

#[test]
fn test_bringup_from_directory() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = BringupConfig::for_variant(&MT7927).with_overrides(|key| {
        (key == ENV_FIRMWARE_DIR).then(|| dir.path().display().to_string())
    });
    write_tree(dir.path(), &config);

    let sim = Simulator::new(&MT7927);
    let mut dev = sim.device();
    let report = Bringup::from_config(config).bring_up(&mut dev).expect("bring-up");

    assert_eq!(report.confidence, Some(RunConfidence::Confirmed));
    assert_eq!(sim.scatter_chunks().concat().len(), 4000);
}

#[test]
fn test_bundle_round_trip_from_disk() {
    let (patch, ram) = images();
    let raw = BundleBuilder::new()
        .entry("WIFI_MT6639_PATCH_MCU_2_1_hdr.bin", "20250101", patch.clone())
        .entry("WIFI_RAM_CODE_MT6639_2_1.bin", "20250101", ram)
        .build()
        .expect("bundle");

    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("mt7927.bundle");
    fs::write(&path, &raw).expect("write bundle");

    let src = BundleSource::from_bytes(fs::read(&path).expect("read bundle").into()).expect("parse");
    let config = BringupConfig::for_variant(&MT7927);
    assert_eq!(src.load(&config.patch_name).expect("patch by base name"), patch);

    let sim = Simulator::new(&MT7927);
    let mut dev = sim.device();
    let report = Bringup::new(config, Box::new(src)).bring_up(&mut dev).expect("bring-up");
    assert!(report.outcome.is_ok());
}

#[test]
fn test_corrupt_bundle_rejected() {
    let mut raw = BundleBuilder::new()
        .entry("a.bin", "", vec![1u8; 8])
        .build()
        .expect("bundle")
        .to_vec();
    raw[0] = b'X';
    assert!(matches!(
        BundleSource::from_bytes(raw.into()).unwrap_err(),
        BringupError::Format { image: "bundle", .. }
    ));
}

#[test]
fn test_truncated_patch_rejected_before_download() {
    let (patch, ram) = images();
    let config = BringupConfig::for_variant(&MT7927);
    let src = mt7927_driver::firmware::MemorySource::new()
        .with(&config.patch_name, patch.slice(..patch.len() - 100))
        .with(&config.ram_name, ram);

    let sim = Simulator::new(&MT7927);
    let mut dev = sim.device();
    let err = Bringup::new(config, Box::new(src)).bring_up(&mut dev).unwrap_err();

    assert!(err.is_firmware_fault(), "{err}");
    assert!(sim.frames().is_empty());
    assert!(!dev.is_running());
}
