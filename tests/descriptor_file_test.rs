use cordex_catalog::{ClimateVariable, DatasetCatalog, DatasetDescriptor};
use std::path::Path;

fn descriptor_path(name: &str) -> std::path::PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("descriptors")
        .join(name)
}

#[test]
fn test_bundled_descriptor_matches_preset() {
    let from_file = DatasetDescriptor::from_file(&descriptor_path("barra-r2.yaml")).unwrap();
    let preset = DatasetDescriptor::barra_r2("/g/data/ob53/BARRA2/output");
    assert_eq!(from_file, preset);
}

#[test]
fn test_bundled_descriptor_builds_catalog() {
    let descriptor = DatasetDescriptor::from_file(&descriptor_path("barra-r2.yaml")).unwrap();
    let catalog = DatasetCatalog::new(descriptor).unwrap();
    assert_eq!(catalog.supported_variables().count(), ClimateVariable::ALL.len());
    assert_eq!(
        catalog
            .output_file_name(ClimateVariable::Temperature)
            .unwrap(),
        "tas_AUS-11_ERA5_historical_hres_BOM_BARRA-R2_v1_day.nc"
    );
}

#[test]
fn test_missing_descriptor_file() {
    let result = DatasetDescriptor::from_file(&descriptor_path("missing.yaml"));
    assert!(matches!(
        result,
        Err(cordex_catalog::ConfigError::Io { .. })
    ));
}
