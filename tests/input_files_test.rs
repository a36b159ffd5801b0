use cordex_catalog::plan::{plan_variables, PlanOptions};
use cordex_catalog::{CatalogError, ClimateVariable, DatasetCatalog, DatasetDescriptor};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const TAS_DIR: &str = "reanalysis/AUS-11/BOM/ERA5/historical/hres/BARRA-R2/v1/day/tas/latest";
const PR_DIR: &str = "reanalysis/AUS-11/BOM/ERA5/historical/hres/BARRA-R2/v1/day/pr/latest";

fn touch(path: &Path) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, b"").unwrap();
}

fn tas_file(root: &Path, range: &str) -> PathBuf {
    root.join(TAS_DIR).join(format!(
        "tas_AUS-11_ERA5_historical_hres_BOM_BARRA-R2_v1_day_{}.nc",
        range
    ))
}

/// Archive with two yearly temperature files plus unrelated neighbours
fn sample_archive() -> TempDir {
    let dir = TempDir::new().unwrap();
    touch(&tas_file(dir.path(), "20200101-20201231"));
    touch(&tas_file(dir.path(), "20210101-20211231"));
    touch(&dir.path().join(TAS_DIR).join("README.txt"));
    touch(
        &dir.path()
            .join(PR_DIR)
            .join("pr_AUS-11_ERA5_historical_hres_BOM_BARRA-R2_v1_day_20200101-20201231.nc"),
    );
    dir
}

#[test]
fn test_expansion_returns_matching_files() {
    let archive = sample_archive();
    let catalog = DatasetCatalog::new(DatasetDescriptor::barra_r2(archive.path())).unwrap();

    let files: HashSet<PathBuf> = catalog
        .input_files(ClimateVariable::Temperature, true)
        .unwrap()
        .collect_paths()
        .unwrap()
        .into_iter()
        .collect();

    let expected: HashSet<PathBuf> = [
        tas_file(archive.path(), "20200101-20201231"),
        tas_file(archive.path(), "20210101-20211231"),
    ]
    .into_iter()
    .collect();
    assert_eq!(files, expected);
}

#[test]
fn test_expansion_without_matches_returns_pattern() {
    let archive = sample_archive();
    // The temperature directory exists but holds no humidity files
    let mut descriptor = DatasetDescriptor::barra_r2(archive.path());
    descriptor.directory_template =
        "reanalysis/AUS-11/BOM/ERA5/historical/hres/BARRA-R2/v1/day/tas/latest".to_string();
    let catalog = DatasetCatalog::new(descriptor).unwrap();

    let files = catalog
        .input_files(ClimateVariable::Humidity, true)
        .unwrap()
        .collect_paths()
        .unwrap();
    assert_eq!(
        files,
        vec![catalog.input_pattern(ClimateVariable::Humidity).unwrap()]
    );
}

#[test]
fn test_expansion_of_missing_directory_fails() {
    let archive = sample_archive();
    let catalog = DatasetCatalog::new(DatasetDescriptor::barra_r2(archive.path())).unwrap();

    let result = catalog.input_files(ClimateVariable::Humidity, true);
    assert!(matches!(
        result,
        Err(CatalogError::FilesystemAccess { .. })
    ));

    // Without expansion the filesystem is never touched
    assert!(catalog
        .input_files(ClimateVariable::Humidity, false)
        .is_ok());
}

#[test]
fn test_expansion_sees_new_files() {
    let archive = sample_archive();
    let catalog = DatasetCatalog::new(DatasetDescriptor::barra_r2(archive.path())).unwrap();
    let count = |catalog: &DatasetCatalog| {
        catalog
            .input_files(ClimateVariable::Temperature, true)
            .unwrap()
            .count()
    };

    assert_eq!(count(&catalog), 2);
    touch(&tas_file(archive.path(), "20220101-20221231"));
    assert_eq!(count(&catalog), 3);
}

#[test]
fn test_wildcard_in_data_version() {
    let archive = TempDir::new().unwrap();
    let mut descriptor = DatasetDescriptor::barra_r2(archive.path());
    descriptor.data_version = "v*".to_string();
    let catalog = DatasetCatalog::new(descriptor).unwrap();

    let base = archive
        .path()
        .join("reanalysis/AUS-11/BOM/ERA5/historical/hres/BARRA-R2/v1/day/tas");
    let name = "tas_AUS-11_ERA5_historical_hres_BOM_BARRA-R2_v1_day_20200101-20201231.nc";
    touch(&base.join("v20230101").join(name));
    touch(&base.join("v20240601").join(name));
    fs::create_dir_all(base.join("latest")).unwrap();

    let files = catalog
        .input_files(ClimateVariable::Temperature, true)
        .unwrap()
        .collect_paths()
        .unwrap();
    assert_eq!(
        files,
        vec![
            base.join("v20230101").join(name),
            base.join("v20240601").join(name)
        ]
    );
}

#[test]
fn test_expansion_under_root_with_glob_characters() {
    let archive = TempDir::new().unwrap();
    let root = archive.path().join("run[1]");
    touch(&tas_file(&root, "20200101-20201231"));
    // Would match if the root were read as a character class
    touch(&tas_file(&archive.path().join("run1"), "20210101-20211231"));

    let catalog = DatasetCatalog::new(DatasetDescriptor::barra_r2(&root)).unwrap();
    let files = catalog
        .input_files(ClimateVariable::Temperature, true)
        .unwrap()
        .collect_paths()
        .unwrap();
    assert_eq!(files, vec![tas_file(&root, "20200101-20201231")]);

    // A missing root is still reported rather than silently unmatched
    let missing = archive.path().join("run[2]");
    let catalog = DatasetCatalog::new(DatasetDescriptor::barra_r2(&missing)).unwrap();
    assert!(matches!(
        catalog.input_files(ClimateVariable::Temperature, true),
        Err(CatalogError::FilesystemAccess { .. })
    ));
}

#[test]
fn test_plan_expands_and_skips() {
    let archive = sample_archive();
    let mut descriptor = DatasetDescriptor::barra_r2(archive.path());
    descriptor
        .variables
        .retain(|v, _| matches!(v, ClimateVariable::Temperature | ClimateVariable::Precipitation | ClimateVariable::Humidity));
    let catalog = DatasetCatalog::new(descriptor).unwrap();

    let options = PlanOptions {
        expand: true,
        output_dir: archive.path().join("merged"),
        ..PlanOptions::default()
    };
    let plan = plan_variables(&catalog, &ClimateVariable::ALL, &options).unwrap();

    assert_eq!(plan.jobs.len(), 2);
    assert_eq!(plan.jobs[0].variable, ClimateVariable::Precipitation);
    assert_eq!(plan.jobs[0].inputs.len(), 1);
    assert_eq!(plan.jobs[1].variable, ClimateVariable::Temperature);
    assert_eq!(plan.jobs[1].inputs.len(), 2);
    assert_eq!(
        plan.jobs[1].output_file,
        archive
            .path()
            .join("merged/tas_AUS-11_ERA5_historical_hres_BOM_BARRA-R2_v1_day.nc")
    );

    assert_eq!(
        plan.skipped,
        vec![
            ClimateVariable::Pressure,
            ClimateVariable::Radiation,
            ClimateVariable::WindSpeed
        ]
    );
    // Humidity has no directory in the archive
    assert_eq!(plan.failed.len(), 1);
    assert_eq!(plan.failed[0].0, ClimateVariable::Humidity);
    assert!(!plan.is_complete());
}
