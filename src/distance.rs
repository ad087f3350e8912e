//! Pairwise genomic distances between samples.

use crate::{Error, Result, VariantBase};
use crate::variants::KindFilter;

use std::fmt::Display;
use std::io::Write;
use std::str::FromStr;

use log::{debug, info};

use roaring::RoaringBitmap;

#[cfg(test)]
mod tests;

//-----------------------------------------------------------------------------

/// Set-based distance metrics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DistanceMetric {
    /// Jaccard distance `1 - |A ∩ B| / |A ∪ B|`.
    #[default]
    Jaccard,
}

impl DistanceMetric {
    /// Returns the distance between two sets.
    pub fn distance(&self, a: &RoaringBitmap, b: &RoaringBitmap) -> f64 {
        match self {
            DistanceMetric::Jaccard => jaccard_distance(a, b),
        }
    }
}

impl FromStr for DistanceMetric {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "jaccard" => Ok(DistanceMetric::Jaccard),
            _ => Err(Error::unsupported(format!("Unsupported distance metric {}", s))),
        }
    }
}

impl Display for DistanceMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            DistanceMetric::Jaccard => write!(f, "jaccard"),
        }
    }
}

/// Returns the Jaccard distance between two sets.
///
/// The distance between two empty sets is 0.
pub fn jaccard_distance(a: &RoaringBitmap, b: &RoaringBitmap) -> f64 {
    let union = a.union_len(b);
    if union == 0 {
        return 0.0;
    }
    let intersection = a.intersection_len(b);
    1.0 - (intersection as f64) / (union as f64)
}

//-----------------------------------------------------------------------------

/// Parameters for [`pairwise_distance`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DistanceParams {
    /// Use only variants of this kind.
    pub kind: KindFilter,
    /// Distance metric.
    pub metric: DistanceMetric,
    /// Ignore variants in the masked regions of either sample in a pair.
    pub core_only: bool,
}

impl DistanceParams {
    /// Returns parameters using only variants accepted by the filter.
    pub fn with_kind(self, kind: KindFilter) -> Self {
        DistanceParams { kind, ..self }
    }

    /// Returns parameters using the given metric.
    pub fn with_metric(self, metric: DistanceMetric) -> Self {
        DistanceParams { metric, ..self }
    }

    /// Returns parameters that ignore or use variants in masked regions.
    pub fn with_core_only(self, core_only: bool) -> Self {
        DistanceParams { core_only, ..self }
    }
}

//-----------------------------------------------------------------------------

/// A symmetric matrix of pairwise distances between named samples.
///
/// The diagonal is always 0.
#[derive(Clone, Debug, PartialEq)]
pub struct DistanceMatrix {
    names: Vec<String>,
    distances: Vec<f64>,
}

impl DistanceMatrix {
    // Creates a zero matrix.
    fn new(names: Vec<String>) -> Self {
        let n = names.len();
        DistanceMatrix { names, distances: vec![0.0; n * n] }
    }

    fn set(&mut self, i: usize, j: usize, distance: f64) {
        let n = self.len();
        self.distances[i * n + j] = distance;
        self.distances[j * n + i] = distance;
    }

    /// Returns the number of samples.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Returns `true` if there are no samples.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Returns the sample names in row / column order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Returns the distance between samples by row / column index.
    pub fn distance(&self, i: usize, j: usize) -> f64 {
        self.distances[i * self.len() + j]
    }

    /// Returns the distance between the named samples, or [`None`] if either sample is not in the matrix.
    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.names.iter().position(|x| x == a)?;
        let j = self.names.iter().position(|x| x == b)?;
        Some(self.distance(i, j))
    }

    /// Writes the matrix as a tab-separated table with sample names as the header and the first column.
    pub fn write_tsv<W: Write>(&self, output: &mut W) -> Result<()> {
        for name in self.names.iter() {
            write!(output, "\t{}", name)?;
        }
        writeln!(output)?;
        for (i, name) in self.names.iter().enumerate() {
            write!(output, "{}", name)?;
            for j in 0..self.len() {
                write!(output, "\t{}", self.distance(i, j))?;
            }
            writeln!(output)?;
        }
        Ok(())
    }
}

//-----------------------------------------------------------------------------

/// Computes the pairwise distances between the named samples.
///
/// The variants of each sample are treated as a set of variant identities, optionally restricted to a single kind.
/// With `params.core_only`, variants whose first reference position is masked in either sample of a pair are removed from both sets before computing the distance.
/// Duplicate names are ignored, and the matrix follows the order of first occurrence.
///
/// # Errors
///
/// Returns [`Error::NotFound`] if a sample is not in the database or, with `core_only`, has no core-genome mask.
/// Passes through any database errors.
///
/// # Examples
///
/// ```
/// use variant_base::{VariantBase, MaskedRegionSet};
/// use variant_base::distance::{self, DistanceParams};
/// use variant_base::variants::{ReferenceSequence, VariantCall};
/// use std::collections::BTreeMap;
///
/// let dir = tempfile::tempdir().unwrap();
/// let db_file = dir.path().join("variants.db");
/// VariantBase::create(&db_file, "reference", &[ReferenceSequence::new("chr", 100)]).unwrap();
/// let calls = vec![
///     VariantCall::new("A", "chr", 10, "A", "T"),
///     VariantCall::new("A", "chr", 20, "C", "G"),
///     VariantCall::new("B", "chr", 10, "A", "T"),
///     VariantCall::new("C", "chr", 10, "A", "T"),
///     VariantCall::new("C", "chr", 20, "C", "G"),
/// ];
/// let masks: BTreeMap<String, MaskedRegionSet> = ["A", "B", "C"].iter()
///     .map(|x| (x.to_string(), MaskedRegionSet::empty()))
///     .collect();
/// VariantBase::insert(&db_file, &calls, &masks).unwrap();
///
/// let database = VariantBase::open(&db_file).unwrap();
/// let matrix = distance::pairwise_distance(&database, &["A", "B", "C"], &DistanceParams::default()).unwrap();
/// assert_eq!(matrix.get("A", "C"), Some(0.0));
/// assert_eq!(matrix.get("A", "B"), Some(0.5));
/// assert_eq!(matrix.get("C", "B"), Some(0.5));
/// ```
pub fn pairwise_distance(database: &VariantBase, names: &[&str], params: &DistanceParams) -> Result<DistanceMatrix> {
    let mut unique: Vec<&str> = Vec::with_capacity(names.len());
    for name in names {
        if !unique.contains(name) {
            unique.push(*name);
        }
    }
    info!("Computing {} distances between {} samples", params.metric, unique.len());

    let name_ids = database.find_sample_name_ids(&unique)?;
    if let Some(missing) = unique.iter().find(|x| !name_ids.contains_key(**x)) {
        return Err(Error::not_found(format!("Sample {} is not in the database", missing)));
    }
    let ids: Vec<u32> = unique.iter().map(|x| name_ids[*x]).collect();
    let selected: RoaringBitmap = ids.iter().copied().collect();
    let sample_variants = database.sample_variants(&selected, params.kind)?;
    let empty = RoaringBitmap::new();
    let variant_sets: Vec<&RoaringBitmap> = ids.iter()
        .map(|id| sample_variants.by_sample.get(id).unwrap_or(&empty))
        .collect();

    // Variants in the masked regions of each sample.
    let mut masked: Vec<RoaringBitmap> = vec![RoaringBitmap::new(); unique.len()];
    if params.core_only {
        for (i, name) in unique.iter().enumerate() {
            let mask = database.core_mask(name)?;
            for (index, variant) in sample_variants.variants.iter().enumerate() {
                if mask.contains(&variant.sequence, variant.position.saturating_sub(1)) {
                    masked[i].insert(index as u32);
                }
            }
            debug!("Sample {}: {} variants in masked regions", name, masked[i].len());
        }
    }

    let mut result = DistanceMatrix::new(unique.iter().map(|x| x.to_string()).collect());
    for i in 0..unique.len() {
        for j in (i + 1)..unique.len() {
            let distance = if params.core_only {
                let excluded = &masked[i] | &masked[j];
                let a = variant_sets[i] - &excluded;
                let b = variant_sets[j] - &excluded;
                params.metric.distance(&a, &b)
            } else {
                params.metric.distance(variant_sets[i], variant_sets[j])
            };
            debug!("{} ({} variants) vs {} ({} variants): {}", unique[i], variant_sets[i].len(), unique[j], variant_sets[j].len(), distance);
            result.set(i, j, distance);
        }
    }

    Ok(result)
}

//-----------------------------------------------------------------------------
