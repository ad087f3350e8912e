use super::*;

use crate::internal::{create_test_db, open_test_db, TEST_SAMPLES};
use crate::variants::VariantKind;

use std::collections::BTreeSet;

use rand::Rng;

//-----------------------------------------------------------------------------

fn compute(database: &VariantBase, names: &[&str], params: &DistanceParams) -> DistanceMatrix {
    let result = pairwise_distance(database, names, params);
    assert!(result.is_ok(), "Failed to compute distances: {}", result.unwrap_err());
    result.unwrap()
}

fn check_matrix(matrix: &DistanceMatrix, truth: &[(&str, &str, f64)], name: &str) {
    for i in 0..matrix.len() {
        assert_eq!(matrix.distance(i, i), 0.0, "[{}] Nonzero diagonal at {}", name, i);
        for j in 0..matrix.len() {
            assert_eq!(matrix.distance(i, j), matrix.distance(j, i), "[{}] Asymmetric distance at ({}, {})", name, i, j);
        }
    }
    for (a, b, distance) in truth {
        assert_eq!(matrix.get(a, b), Some(*distance), "[{}] Wrong distance between {} and {}", name, a, b);
    }
}

//-----------------------------------------------------------------------------

#[test]
fn jaccard_against_sets() {
    let mut rng = rand::thread_rng();
    for _ in 0..100 {
        let a: BTreeSet<u32> = (0..rng.gen_range(0..20)).map(|_| rng.gen_range(0..32)).collect();
        let b: BTreeSet<u32> = (0..rng.gen_range(0..20)).map(|_| rng.gen_range(0..32)).collect();
        let union = a.union(&b).count();
        let truth = if union == 0 { 0.0 } else { 1.0 - (a.intersection(&b).count() as f64) / (union as f64) };
        let a_bits: RoaringBitmap = a.iter().copied().collect();
        let b_bits: RoaringBitmap = b.iter().copied().collect();
        let distance = jaccard_distance(&a_bits, &b_bits);
        assert!((distance - truth).abs() < 1e-12, "Wrong distance between {:?} and {:?}: {} (expected {})", a, b, distance, truth);
        assert_eq!(distance, jaccard_distance(&b_bits, &a_bits), "Asymmetric distance between {:?} and {:?}", a, b);
    }
    assert_eq!(jaccard_distance(&RoaringBitmap::new(), &RoaringBitmap::new()), 0.0, "Nonzero distance between empty sets");
}

#[test]
fn metrics_and_params() {
    assert_eq!("jaccard".parse::<DistanceMetric>().unwrap(), DistanceMetric::Jaccard);
    let result = "hamming".parse::<DistanceMetric>();
    assert!(matches!(result, Err(Error::UnsupportedOperation(ref message)) if message.contains("hamming")), "Accepted an unknown metric");

    let params = DistanceParams::default();
    assert_eq!(params.kind, KindFilter::All);
    assert_eq!(params.metric, DistanceMetric::Jaccard);
    assert!(!params.core_only);
    let params = params.with_kind(KindFilter::Only(VariantKind::Snp)).with_core_only(true);
    assert_eq!(params.kind, KindFilter::Only(VariantKind::Snp));
    assert!(params.core_only);
}

//-----------------------------------------------------------------------------

#[test]
fn all_variants() {
    let dir = tempfile::tempdir().unwrap();
    let database = open_test_db(&create_test_db(&dir));
    let matrix = compute(&database, &TEST_SAMPLES, &DistanceParams::default());
    assert_eq!(matrix.names(), &TEST_SAMPLES, "Wrong sample order");
    let truth = [
        ("SampleA", "SampleC", 0.0),
        ("SampleA", "SampleB", 0.75),
        ("SampleB", "SampleC", 0.75),
    ];
    check_matrix(&matrix, &truth, "all");
}

#[test]
fn snps_only() {
    let dir = tempfile::tempdir().unwrap();
    let database = open_test_db(&create_test_db(&dir));
    let params = DistanceParams::default().with_kind(KindFilter::Only(VariantKind::Snp));
    let matrix = compute(&database, &TEST_SAMPLES, &params);
    let truth = [
        ("SampleA", "SampleC", 0.0),
        ("SampleA", "SampleB", 0.5),
        ("SampleB", "SampleC", 0.5),
    ];
    check_matrix(&matrix, &truth, "snp");

    // SampleB has no deletions.
    let params = DistanceParams::default().with_kind(KindFilter::Only(VariantKind::Deletion));
    let matrix = compute(&database, &TEST_SAMPLES, &params);
    check_matrix(&matrix, &[("SampleA", "SampleB", 1.0), ("SampleA", "SampleC", 0.0)], "del");

    // Nobody has MNPs.
    let params = DistanceParams::default().with_kind(KindFilter::Only(VariantKind::Mnp));
    let matrix = compute(&database, &TEST_SAMPLES, &params);
    check_matrix(&matrix, &[("SampleA", "SampleB", 0.0), ("SampleB", "SampleC", 0.0)], "mnp");
}

#[test]
fn core_genome_only() {
    let dir = tempfile::tempdir().unwrap();
    let database = open_test_db(&create_test_db(&dir));
    let params = DistanceParams::default().with_core_only(true);
    let matrix = compute(&database, &TEST_SAMPLES, &params);
    let truth = [
        ("SampleA", "SampleC", 0.0),
        ("SampleA", "SampleB", 1.0 - 1.0 / 3.0),
        ("SampleB", "SampleC", 0.75),
    ];
    check_matrix(&matrix, &truth, "core");
}

#[test]
fn names_and_errors() {
    let dir = tempfile::tempdir().unwrap();
    let database = open_test_db(&create_test_db(&dir));

    let matrix = compute(&database, &["SampleC", "SampleA", "SampleC"], &DistanceParams::default());
    assert_eq!(matrix.names(), &["SampleC", "SampleA"], "Duplicates were not collapsed");
    assert_eq!(matrix.get("SampleA", "SampleC"), Some(0.0));
    assert_eq!(matrix.get("SampleA", "SampleB"), None, "Found a distance to a sample not in the matrix");

    let matrix = compute(&database, &[], &DistanceParams::default());
    assert!(matrix.is_empty(), "Non-empty matrix without samples");

    let result = pairwise_distance(&database, &["SampleA", "SampleX"], &DistanceParams::default());
    assert!(matches!(result, Err(Error::NotFound(ref message)) if message.contains("SampleX")), "Unknown sample was not reported");
}

#[test]
fn write_matrix() {
    let dir = tempfile::tempdir().unwrap();
    let database = open_test_db(&create_test_db(&dir));
    let matrix = compute(&database, &["SampleA", "SampleB"], &DistanceParams::default());
    let mut output: Vec<u8> = Vec::new();
    let result = matrix.write_tsv(&mut output);
    assert!(result.is_ok(), "Failed to write the matrix: {}", result.unwrap_err());
    let truth = "\tSampleA\tSampleB\nSampleA\t0\t0.75\nSampleB\t0.75\t0\n";
    assert_eq!(String::from_utf8(output).unwrap(), truth, "Wrong TSV output");
}

//-----------------------------------------------------------------------------
