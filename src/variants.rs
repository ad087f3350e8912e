//! Variants, MLST allele calls, and the features that can be queried.
//!
//! A variant is identified by an SPDI-style key `sequence:position:ref:alt` with a 1-based position.
//! An MLST allele is identified by a key `scheme:locus:allele`.
//! Identical calls from different samples map to the same identity key, and the database stores one record for each key.

use crate::{Error, Result, SampleSet};

use std::fmt::Display;
use std::str::FromStr;

//-----------------------------------------------------------------------------

/// A sequence (chromosome / contig) in the reference genome.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReferenceSequence {
    /// Sequence name.
    pub name: String,
    /// Sequence length in bp.
    pub length: usize,
}

impl ReferenceSequence {
    /// Creates a new reference sequence.
    pub fn new(name: &str, length: usize) -> Self {
        ReferenceSequence { name: name.to_string(), length }
    }
}

//-----------------------------------------------------------------------------

/// Kind of a variant, inferred from the lengths of the alleles.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum VariantKind {
    /// Single nucleotide polymorphism.
    Snp,
    /// Multi-nucleotide polymorphism with alleles of equal length.
    Mnp,
    /// The alternate allele is longer.
    Insertion,
    /// The reference allele is longer.
    Deletion,
}

impl VariantKind {
    /// All variant kinds.
    pub const ALL: [VariantKind; 4] = [VariantKind::Snp, VariantKind::Mnp, VariantKind::Insertion, VariantKind::Deletion];

    /// Infers the kind from the reference and alternate alleles.
    pub fn from_alleles(reference: &str, alternate: &str) -> Self {
        match reference.len().cmp(&alternate.len()) {
            std::cmp::Ordering::Less => VariantKind::Insertion,
            std::cmp::Ordering::Greater => VariantKind::Deletion,
            std::cmp::Ordering::Equal if reference.len() == 1 => VariantKind::Snp,
            std::cmp::Ordering::Equal => VariantKind::Mnp,
        }
    }

    /// Returns the name of the kind as stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            VariantKind::Snp => "snp",
            VariantKind::Mnp => "mnp",
            VariantKind::Insertion => "ins",
            VariantKind::Deletion => "del",
        }
    }
}

impl Display for VariantKind {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for VariantKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "snp" => Ok(VariantKind::Snp),
            "mnp" => Ok(VariantKind::Mnp),
            "ins" => Ok(VariantKind::Insertion),
            "del" => Ok(VariantKind::Deletion),
            _ => Err(Error::invalid_argument(format!(
                "Unknown variant kind [{}], must be one of {:?}", s, VariantKind::ALL.map(|x| x.as_str())
            ))),
        }
    }
}

/// Filter for variant kinds in distance computations.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum KindFilter {
    /// Use all variants.
    #[default]
    All,
    /// Use only variants of the given kind.
    Only(VariantKind),
}

impl KindFilter {
    /// Returns `true` if variants of the given kind pass the filter.
    pub fn accepts(&self, kind: VariantKind) -> bool {
        match self {
            KindFilter::All => true,
            KindFilter::Only(only) => *only == kind,
        }
    }
}

impl FromStr for KindFilter {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s == "all" {
            Ok(KindFilter::All)
        } else {
            Ok(KindFilter::Only(s.parse()?))
        }
    }
}

impl Display for KindFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            KindFilter::All => write!(f, "all"),
            KindFilter::Only(kind) => write!(f, "{}", kind),
        }
    }
}

//-----------------------------------------------------------------------------

/// Returns the SPDI-style identity key for a variant.
pub fn variant_key(sequence: &str, position: usize, reference: &str, alternate: &str) -> String {
    format!("{}:{}:{}:{}", sequence, position, reference, alternate)
}

/// A variant record.
///
/// The record corresponds to one row in table `Variants`.
/// It stores the set of samples carrying the variant.
#[derive(Clone, Debug, PartialEq)]
pub struct Variant {
    /// Reference sequence name.
    pub sequence: String,
    /// 1-based position in the reference sequence.
    pub position: usize,
    /// Reference allele.
    pub reference: String,
    /// Alternate allele.
    pub alternate: String,
    /// Kind of the variant.
    pub kind: VariantKind,
    /// Samples carrying the variant.
    pub samples: SampleSet,
}

impl Variant {
    /// Returns the identity key of the variant.
    pub fn key(&self) -> String {
        variant_key(&self.sequence, self.position, &self.reference, &self.alternate)
    }
}

/// A variant call for a sample.
///
/// This corresponds to one row in a table of variant calls.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VariantCall {
    /// Sample name.
    pub sample: String,
    /// Reference sequence name.
    pub sequence: String,
    /// 1-based position in the reference sequence.
    pub position: usize,
    /// Reference allele.
    pub reference: String,
    /// Alternate allele.
    pub alternate: String,
    /// Kind of the variant, if reported by the caller.
    pub kind: Option<VariantKind>,
}

impl VariantCall {
    /// Creates a new call without an explicit kind.
    pub fn new(sample: &str, sequence: &str, position: usize, reference: &str, alternate: &str) -> Self {
        VariantCall {
            sample: sample.to_string(),
            sequence: sequence.to_string(),
            position,
            reference: reference.to_string(),
            alternate: alternate.to_string(),
            kind: None,
        }
    }

    /// Returns the identity key of the called variant.
    pub fn key(&self) -> String {
        variant_key(&self.sequence, self.position, &self.reference, &self.alternate)
    }

    /// Returns the kind of the call, inferring it from the alleles if necessary.
    ///
    /// Returns [`Error::ConsistencyViolation`] if the reported kind contradicts the alleles.
    pub fn kind(&self) -> Result<VariantKind> {
        let inferred = VariantKind::from_alleles(&self.reference, &self.alternate);
        match self.kind {
            Some(kind) if kind != inferred => Err(Error::consistency(format!(
                "Variant {} was called as {} but the alleles imply {}", self.key(), kind, inferred
            ))),
            _ => Ok(inferred),
        }
    }
}

//-----------------------------------------------------------------------------

/// Allele name used for missing or invalid MLST allele calls.
pub const MLST_UNKNOWN_ALLELE: &str = "?";

/// Returns the identity key for an MLST allele.
pub fn mlst_key(scheme: &str, locus: &str, allele: &str) -> String {
    format!("{}:{}:{}", scheme, locus, allele)
}

/// An MLST allele call for a sample.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MlstCall {
    /// Sample name.
    pub sample: String,
    /// MLST scheme name.
    pub scheme: String,
    /// Locus name.
    pub locus: String,
    /// Allele identifier.
    pub allele: String,
}

impl MlstCall {
    /// Creates a new allele call.
    ///
    /// Allele identifiers that are not numbers are replaced with [`MLST_UNKNOWN_ALLELE`].
    pub fn new(sample: &str, scheme: &str, locus: &str, allele: &str) -> Self {
        let allele = if !allele.is_empty() && allele.bytes().all(|x| x.is_ascii_digit()) {
            allele
        } else {
            MLST_UNKNOWN_ALLELE
        };
        MlstCall {
            sample: sample.to_string(),
            scheme: scheme.to_string(),
            locus: locus.to_string(),
            allele: allele.to_string(),
        }
    }

    /// Returns the identity key of the allele.
    pub fn key(&self) -> String {
        mlst_key(&self.scheme, &self.locus, &self.allele)
    }
}

//-----------------------------------------------------------------------------

/// Kinds of features that can be queried.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FeatureKind {
    /// A variant identified by `sequence:position:ref:alt`.
    Mutation,
    /// An MLST allele identified by `scheme:locus:allele`.
    Mlst,
}

impl FromStr for FeatureKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "mutation" => Ok(FeatureKind::Mutation),
            "mlst" => Ok(FeatureKind::Mlst),
            _ => Err(Error::invalid_argument(format!("Unknown feature kind [{}], must be one of [mutation, mlst]", s))),
        }
    }
}

/// A feature that a sample may carry.
///
/// # Examples
///
/// ```
/// use variant_base::QueryFeature;
///
/// let feature = QueryFeature::parse("contig1:12:A:T", "mutation").unwrap();
/// assert_eq!(feature.to_string(), "contig1:12:A:T");
/// assert!(QueryFeature::parse("contig1:12:A", "mutation").is_err());
/// assert!(QueryFeature::parse("ecoli:adk:100", "mlst").is_ok());
/// assert!(QueryFeature::parse("ecoli:adk:100", "kmer").is_err());
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum QueryFeature {
    /// A variant identity key.
    Mutation(String),
    /// An MLST allele identity key.
    MlstAllele(String),
}

impl QueryFeature {
    /// Parses a feature of the given kind.
    ///
    /// Returns an error if the kind is unknown or the identifier is malformed.
    pub fn parse(feature: &str, kind: &str) -> Result<Self> {
        let kind: FeatureKind = kind.parse()?;
        let fields: Vec<&str> = feature.split(':').collect();
        match kind {
            FeatureKind::Mutation => {
                let valid = fields.len() == 4 && fields[1].parse::<usize>().is_ok()
                    && fields.iter().all(|x| !x.is_empty());
                if !valid {
                    return Err(Error::invalid_argument(format!("Invalid mutation [{}], expected sequence:position:ref:alt", feature)));
                }
                Ok(QueryFeature::Mutation(feature.to_string()))
            },
            FeatureKind::Mlst => {
                if fields.len() != 3 || fields.iter().any(|x| x.is_empty()) {
                    return Err(Error::invalid_argument(format!("Invalid MLST allele [{}], expected scheme:locus:allele", feature)));
                }
                Ok(QueryFeature::MlstAllele(feature.to_string()))
            },
        }
    }

    /// Returns the kind of the feature.
    pub fn kind(&self) -> FeatureKind {
        match self {
            QueryFeature::Mutation(_) => FeatureKind::Mutation,
            QueryFeature::MlstAllele(_) => FeatureKind::Mlst,
        }
    }

    /// Returns the identity key of the feature.
    pub fn key(&self) -> &str {
        match self {
            QueryFeature::Mutation(key) => key,
            QueryFeature::MlstAllele(key) => key,
        }
    }
}

impl Display for QueryFeature {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.key())
    }
}

//-----------------------------------------------------------------------------


//-----------------------------------------------------------------------------
