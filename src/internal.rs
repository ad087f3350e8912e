use crate::{formats, utils};
use crate::{MaskedRegionSet, VariantBase};

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

//-----------------------------------------------------------------------------

// Variant-base utilities for tests.

pub(crate) const TEST_SAMPLES: [&str; 3] = ["SampleA", "SampleB", "SampleC"];

pub(crate) fn test_masks() -> BTreeMap<String, MaskedRegionSet> {
    let mut result = BTreeMap::new();
    for (sample, filename) in TEST_SAMPLES.iter().zip(["SampleA.bed", "SampleB.bed", "SampleC.bed"]) {
        let mask = MaskedRegionSet::from_file(utils::get_test_data(filename));
        assert!(mask.is_ok(), "Failed to read the mask for {}: {}", sample, mask.unwrap_err());
        result.insert(sample.to_string(), mask.unwrap());
    }
    result
}

// Creates a database from the test data in the directory and returns its file name.
pub(crate) fn create_test_db(dir: &TempDir) -> PathBuf {
    let db_file = dir.path().join("test.db");
    assert!(!utils::file_exists(&db_file), "Database {} already exists", db_file.display());
    let reference = formats::read_reference(utils::get_test_data("reference.fasta")).unwrap();
    let result = VariantBase::create(&db_file, "reference", &reference);
    assert!(result.is_ok(), "Failed to create the database: {}", result.unwrap_err());

    let calls = formats::read_variant_calls(utils::get_test_data("calls.tsv")).unwrap();
    let result = VariantBase::insert(&db_file, &calls, &test_masks());
    assert!(result.is_ok(), "Failed to insert variant calls: {}", result.unwrap_err());

    let mlst = formats::read_mlst_calls(utils::get_test_data("mlst.tsv")).unwrap();
    let result = VariantBase::insert_mlst(&db_file, &mlst);
    assert!(result.is_ok(), "Failed to insert MLST calls: {}", result.unwrap_err());

    db_file
}

pub(crate) fn open_test_db(db_file: &Path) -> VariantBase {
    let database = VariantBase::open(db_file);
    assert!(database.is_ok(), "Failed to open the database: {}", database.unwrap_err());
    database.unwrap()
}

//-----------------------------------------------------------------------------
