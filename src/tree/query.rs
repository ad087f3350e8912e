//! Resolving tree neighborhoods into sample sets.

use crate::{Error, Result, SampleSet};
use super::Tree;

use std::collections::BTreeMap;
use std::fmt::Display;
use std::str::FromStr;
use std::sync::Arc;

use log::debug;

//-----------------------------------------------------------------------------

/// Relative tolerance for comparing scaled tree distances with a threshold.
pub const DISTANCE_TOLERANCE: f64 = 1e-9;

/// Units for distances in a tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DistanceUnit {
    /// Number of substitutions over the entire alignment.
    Substitutions,
    /// Substitutions per alignment site, which is the unit of branch lengths.
    SubstitutionsPerSite,
}

impl FromStr for DistanceUnit {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "substitutions" => Ok(DistanceUnit::Substitutions),
            "substitutions/site" => Ok(DistanceUnit::SubstitutionsPerSite),
            _ => Err(Error::invalid_argument(format!(
                "Invalid distance unit {}, must be one of [substitutions, substitutions/site]", s
            ))),
        }
    }
}

impl Display for DistanceUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            DistanceUnit::Substitutions => write!(f, "substitutions"),
            DistanceUnit::SubstitutionsPerSite => write!(f, "substitutions/site"),
        }
    }
}

//-----------------------------------------------------------------------------

/// A resolver for distance-bounded and MRCA-bounded neighborhoods in a tree.
///
/// Tree leaves are labeled with sample names.
/// Only leaves whose names are known to the caller (usually the samples in the database) are candidates for the result.
/// Every queried name must match exactly one leaf.
///
/// # Examples
///
/// ```
/// use variant_base::tree::Tree;
/// use variant_base::tree::query::{DistanceUnit, TreeQueryEngine};
/// use std::collections::BTreeMap;
/// use std::sync::Arc;
///
/// let tree = Tree::from_newick("((A:0.01,B:0.02):0.1,C:0.2);").unwrap();
/// let engine = TreeQueryEngine::new(Arc::new(tree), 100);
/// let known: BTreeMap<String, u32> = [("A", 1), ("B", 2), ("C", 3)].iter()
///     .map(|(name, id)| (name.to_string(), *id))
///     .collect();
///
/// let near = engine.within_distance(&["A"], 5.0, DistanceUnit::Substitutions, &known).unwrap();
/// assert_eq!(near.to_vec(), Some(vec![1, 2]));
/// let same = engine.within_distance(&["A"], 0.05, DistanceUnit::SubstitutionsPerSite, &known).unwrap();
/// assert_eq!(same, near);
/// let clade = engine.within_mrca(&["A", "C"], &known).unwrap();
/// assert_eq!(clade.to_vec(), Some(vec![1, 2, 3]));
/// ```
#[derive(Clone, Debug)]
pub struct TreeQueryEngine {
    tree: Arc<Tree>,
    alignment_length: usize,
}

impl TreeQueryEngine {
    /// Creates a new engine for the tree built from an alignment of the given length.
    pub fn new(tree: Arc<Tree>, alignment_length: usize) -> Self {
        TreeQueryEngine { tree, alignment_length }
    }

    /// Returns the tree.
    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    /// Returns the alignment length.
    pub fn alignment_length(&self) -> usize {
        self.alignment_length
    }

    /// Returns the identifiers of the known samples that are leaves in the tree.
    pub fn tree_samples(&self, known: &BTreeMap<String, u32>) -> SampleSet {
        self.tree.leaf_names().into_iter().filter_map(|name| known.get(name).copied()).collect()
    }

    // Returns the only leaf with the given name.
    fn unique_leaf(&self, name: &str) -> Result<usize> {
        let leaves = self.tree.find_leaves(name);
        match leaves.len() {
            1 => Ok(leaves[0]),
            0 => Err(Error::ambiguous_match(format!("No leaf in the tree matches sample {}", name))),
            n => Err(Error::ambiguous_match(format!("{} leaves in the tree match sample {}", n, name))),
        }
    }

    /// Returns the known samples within the given distance of the sample.
    ///
    /// A leaf is included if its patristic distance from the sample, multiplied by the alignment length for unit [`DistanceUnit::Substitutions`], is at most `distance`.
    /// The comparison allows a relative error of [`DISTANCE_TOLERANCE`].
    ///
    /// # Errors
    ///
    /// * [`Error::InvalidArgument`]: No sample names were given.
    /// * [`Error::UnsupportedOperation`]: More than one sample name was given.
    /// * [`Error::AmbiguousMatch`]: The name matches zero or several leaves.
    pub fn within_distance(&self, samples: &[&str], distance: f64, unit: DistanceUnit, known: &BTreeMap<String, u32>) -> Result<SampleSet> {
        let sample = match samples {
            [] => return Err(Error::invalid_argument("No sample for a distance query")),
            [sample] => *sample,
            _ => return Err(Error::unsupported(format!("Distance queries from multiple samples {:?} are not supported", samples))),
        };
        let anchor = self.unique_leaf(sample)?;
        let multiplier = match unit {
            DistanceUnit::Substitutions => self.alignment_length as f64,
            DistanceUnit::SubstitutionsPerSite => 1.0,
        };

        let threshold = distance + distance.abs() * DISTANCE_TOLERANCE + f64::EPSILON;
        let mut ids: Vec<u32> = Vec::new();
        for leaf in self.tree.leaves() {
            let id = match self.tree.node(leaf).and_then(|x| x.name.as_ref()).and_then(|name| known.get(name)) {
                Some(id) => *id,
                None => continue,
            };
            if self.tree.distance(anchor, leaf) * multiplier <= threshold {
                ids.push(id);
            }
        }
        let result = SampleSet::from_ids(ids);
        debug!("{} samples within {} {} of {}", result.len().unwrap_or_default(), distance, unit, sample);
        Ok(result)
    }

    /// Returns the known samples in the subtree rooted at the most recent common ancestor of the samples.
    ///
    /// For a single sample, the result contains only that sample.
    ///
    /// # Errors
    ///
    /// * [`Error::InvalidArgument`]: No sample names were given.
    /// * [`Error::AmbiguousMatch`]: A name matches zero or several leaves.
    pub fn within_mrca(&self, samples: &[&str], known: &BTreeMap<String, u32>) -> Result<SampleSet> {
        if samples.is_empty() {
            return Err(Error::invalid_argument("No samples for an MRCA query"));
        }
        let leaves = samples.iter().map(|name| self.unique_leaf(name)).collect::<Result<Vec<usize>>>()?;
        let ancestor = self.tree.common_ancestor(&leaves).ok_or(Error::invalid_argument("No samples for an MRCA query"))?;
        let result: SampleSet = self.tree.leaves_under(ancestor).into_iter()
            .filter_map(|leaf| self.tree.node(leaf).and_then(|x| x.name.as_ref()))
            .filter_map(|name| known.get(name).copied())
            .collect();
        debug!("{} samples under the MRCA of {:?}", result.len().unwrap_or_default(), samples);
        Ok(result)
    }
}

//-----------------------------------------------------------------------------
