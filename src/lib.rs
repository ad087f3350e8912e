//! # Variant-base: sample variation stored in an SQLite database.
//!
//! This is a library for indexing the genomic variation of many bacterial samples against a single reference genome.
//! Each sample contributes a set of variant calls and a core-genome mask, which marks the positions where the sample has no reliable sequence.
//! The variation is stored in a SQLite database, which can be queried for samples carrying given features and for distances between samples.
//!
//! See [`VariantBase`] for the database interface, [`distance`] for pairwise distances, and [`query`] for composable sample queries.
//!
//! ### Basic concepts
//!
//! Samples are identified by unique names and by integer identifiers assigned by the database.
//! Sets of samples are represented as [`SampleSet`]s.
//! A sample set is either an explicit set of identifiers or a co-finite set (every sample except the listed ones).
//! Explicit sets are stored in the database as serialized Roaring bitmaps.
//!
//! Variants are identified by keys `sequence:position:ref:alt` with 1-based positions.
//! Each variant record corresponds to a row in table `Variants`, with the key as its primary key and the set of samples carrying the variant as a blob.
//! Calls for the same variant from different samples are merged into the same record.
//! MLST alleles are stored similarly in table `MlstAlleles` with keys `scheme:locus:allele`.
//!
//! Core-genome masks are [`MaskedRegionSet`]s: sorted sets of disjoint half-open intervals for each reference sequence.
//! They are stored in table `SampleSequences` with one row for each sample and reference sequence.
//!
//! ### Queries
//!
//! A query is a chain of immutable nodes, each restricting the samples of its parent with a predicate.
//! Predicates can select samples by name, by carried variants and MLST alleles, by distance in a phylogenetic tree, or by a common ancestor in the tree.
//! An external table of sample metadata can be joined to a query.
//! See [`SamplesQuery`] for the interface.

pub mod db;
pub mod distance;
pub mod error;
pub mod formats;
pub mod masked_regions;
pub mod query;
pub mod sample_set;
pub mod table;
pub mod tree;
pub mod utils;
pub mod variants;

#[cfg(test)]
mod internal;

pub use db::{SampleVariants, VariantBase};
pub use distance::{DistanceMatrix, DistanceMetric, DistanceParams};
pub use error::{Error, Result};
pub use masked_regions::MaskedRegionSet;
pub use query::{BasicQuery, Predicate, PredicateKind, SampleColumn, SamplesQuery, TableSamplesQuery, TreeSamplesQuery};
pub use sample_set::SampleSet;
pub use table::Table;
pub use tree::Tree;
pub use variants::{KindFilter, QueryFeature, VariantKind};
