//! Immutable sets of sample identifiers.

use crate::{Error, Result};

use roaring::RoaringBitmap;

use std::fmt::Display;


//-----------------------------------------------------------------------------

/// An immutable set of sample identifiers.
///
/// Sample identifiers are the integer keys assigned by the database.
/// The set is either an explicit set of identifiers or a co-finite set containing every sample known to the database except an explicit set.
/// The universal set [`SampleSet::all`] is the co-finite set with nothing excluded.
/// This allows the set algebra to stay closed without knowing the total number of samples, which only the database knows.
/// Use [`SampleSet::resolve`] to materialize a co-finite set against the identifiers known to the database.
///
/// All operations return new sets.
///
/// # Examples
///
/// ```
/// use variant_base::SampleSet;
///
/// let a = SampleSet::from_ids([1, 2, 3]);
/// let b = SampleSet::from_ids([2, 3, 4]);
/// assert_eq!(a.intersection(&b).to_vec(), Some(vec![2, 3]));
/// assert_eq!(a.union(&b).len(), Some(4));
///
/// // The universal set is never materialized.
/// let all = SampleSet::all();
/// assert_eq!(a.intersection(&all), a);
/// assert_eq!(a.union(&all), all);
/// assert!(all.complement(&all).is_empty());
///
/// // The complement within the universal set is co-finite.
/// let not_a = a.complement(&all);
/// assert!(!not_a.contains(1));
/// assert!(not_a.contains(100));
/// assert_eq!(not_a.len(), None);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub enum SampleSet {
    /// An explicit set of sample identifiers.
    Explicit(RoaringBitmap),
    /// All samples known to the database except the given identifiers.
    AllExcept(RoaringBitmap),
}

impl SampleSet {
    /// Returns an empty set.
    pub fn empty() -> Self {
        SampleSet::Explicit(RoaringBitmap::new())
    }

    /// Returns the universal set of all samples.
    pub fn all() -> Self {
        SampleSet::AllExcept(RoaringBitmap::new())
    }

    /// Returns an explicit set containing the given identifiers.
    pub fn from_ids(ids: impl IntoIterator<Item = u32>) -> Self {
        SampleSet::Explicit(ids.into_iter().collect())
    }

    /// Returns `true` if this is the universal set.
    pub fn is_all(&self) -> bool {
        matches!(self, SampleSet::AllExcept(excluded) if excluded.is_empty())
    }

    /// Returns `true` if the set is explicit.
    pub fn is_explicit(&self) -> bool {
        matches!(self, SampleSet::Explicit(_))
    }

    /// Returns the union of the sets.
    pub fn union(&self, other: &SampleSet) -> SampleSet {
        match (self, other) {
            (SampleSet::Explicit(a), SampleSet::Explicit(b)) => SampleSet::Explicit(a | b),
            (SampleSet::Explicit(a), SampleSet::AllExcept(x)) => SampleSet::AllExcept(x - a),
            (SampleSet::AllExcept(x), SampleSet::Explicit(b)) => SampleSet::AllExcept(x - b),
            (SampleSet::AllExcept(x), SampleSet::AllExcept(y)) => SampleSet::AllExcept(x & y),
        }
    }

    /// Returns the intersection of the sets.
    pub fn intersection(&self, other: &SampleSet) -> SampleSet {
        match (self, other) {
            (SampleSet::Explicit(a), SampleSet::Explicit(b)) => SampleSet::Explicit(a & b),
            (SampleSet::Explicit(a), SampleSet::AllExcept(x)) => SampleSet::Explicit(a - x),
            (SampleSet::AllExcept(x), SampleSet::Explicit(b)) => SampleSet::Explicit(b - x),
            (SampleSet::AllExcept(x), SampleSet::AllExcept(y)) => SampleSet::AllExcept(x | y),
        }
    }

    /// Returns the samples in this set but not in the other set.
    pub fn difference(&self, other: &SampleSet) -> SampleSet {
        match (self, other) {
            (SampleSet::Explicit(a), SampleSet::Explicit(b)) => SampleSet::Explicit(a - b),
            (SampleSet::Explicit(a), SampleSet::AllExcept(x)) => SampleSet::Explicit(a & x),
            (SampleSet::AllExcept(x), SampleSet::Explicit(b)) => SampleSet::AllExcept(x | b),
            (SampleSet::AllExcept(x), SampleSet::AllExcept(y)) => SampleSet::Explicit(y - x),
        }
    }

    /// Returns the complement of this set relative to the given universe.
    ///
    /// The caller is responsible for passing a universe that this set was built against.
    pub fn complement(&self, universe: &SampleSet) -> SampleSet {
        universe.difference(self)
    }

    /// Returns `true` if the set contains the given sample.
    pub fn contains(&self, id: u32) -> bool {
        match self {
            SampleSet::Explicit(ids) => ids.contains(id),
            SampleSet::AllExcept(excluded) => !excluded.contains(id),
        }
    }

    /// Returns the number of samples in an explicit set, or [`None`] for a co-finite set.
    pub fn len(&self) -> Option<u64> {
        match self {
            SampleSet::Explicit(ids) => Some(ids.len()),
            SampleSet::AllExcept(_) => None,
        }
    }

    /// Returns `true` if the set is explicit and empty.
    ///
    /// A co-finite set is never considered empty, as the database may always contain more samples.
    pub fn is_empty(&self) -> bool {
        match self {
            SampleSet::Explicit(ids) => ids.is_empty(),
            SampleSet::AllExcept(_) => false,
        }
    }

    /// Returns the identifiers of an explicit set in ascending order, or [`None`] for a co-finite set.
    pub fn to_vec(&self) -> Option<Vec<u32>> {
        match self {
            SampleSet::Explicit(ids) => Some(ids.iter().collect()),
            SampleSet::AllExcept(_) => None,
        }
    }

    /// Materializes the set against the identifiers known to the database.
    pub fn resolve(&self, known: &RoaringBitmap) -> RoaringBitmap {
        match self {
            SampleSet::Explicit(ids) => ids & known,
            SampleSet::AllExcept(excluded) => known - excluded,
        }
    }

    /// Serializes an explicit set for storage.
    ///
    /// Returns an error for a co-finite set.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        match self {
            SampleSet::Explicit(ids) => {
                let mut buffer = Vec::with_capacity(ids.serialized_size());
                ids.serialize_into(&mut buffer)?;
                Ok(buffer)
            },
            SampleSet::AllExcept(_) => Err(Error::unsupported("Cannot serialize a co-finite sample set")),
        }
    }

    /// Deserializes an explicit set serialized with [`SampleSet::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let ids = RoaringBitmap::deserialize_from(bytes)?;
        Ok(SampleSet::Explicit(ids))
    }
}

impl Default for SampleSet {
    fn default() -> Self {
        SampleSet::empty()
    }
}

impl FromIterator<u32> for SampleSet {
    fn from_iter<T: IntoIterator<Item = u32>>(iter: T) -> Self {
        SampleSet::from_ids(iter)
    }
}

impl From<RoaringBitmap> for SampleSet {
    fn from(ids: RoaringBitmap) -> Self {
        SampleSet::Explicit(ids)
    }
}

impl Display for SampleSet {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        fn write_ids(f: &mut std::fmt::Formatter, ids: &RoaringBitmap) -> std::fmt::Result {
            write!(f, "{{")?;
            for (i, id) in ids.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", id)?;
            }
            write!(f, "}}")
        }
        match self {
            SampleSet::Explicit(ids) => write_ids(f, ids),
            SampleSet::AllExcept(excluded) if excluded.is_empty() => write!(f, "ALL"),
            SampleSet::AllExcept(excluded) => {
                write!(f, "ALL - ")?;
                write_ids(f, excluded)
            },
        }
    }
}

//-----------------------------------------------------------------------------
