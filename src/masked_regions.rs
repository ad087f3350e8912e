//! Masked genomic regions: positions considered missing or unreliable for a sample.

use crate::formats::{self, SequenceRecord};
use crate::{utils, Error, Result};

use std::collections::BTreeMap;
use std::io::{BufRead, Write};
use std::ops::Range;
use std::path::Path;


//-----------------------------------------------------------------------------

/// A set of masked genomic regions.
///
/// The regions are stored per sequence (chromosome / contig) as sorted lists of half-open 0-based intervals.
/// Intervals in the same sequence never overlap or touch, and empty intervals are never stored.
/// Every constructor re-establishes these invariants by sorting and merging.
///
/// The complement of the masked regions within a sequence is the core genome of the sample.
///
/// # Examples
///
/// ```
/// use variant_base::MaskedRegionSet;
/// use variant_base::formats::SequenceRecord;
///
/// let record = SequenceRecord::new("contig", b"ACGTNNNNACGT".to_vec());
/// let mask = MaskedRegionSet::from_sequences(&[record]);
/// assert_eq!(mask.intervals("contig"), &[4..8]);
/// assert_eq!(mask.len(), 4);
/// assert_eq!(mask.core_length("contig", 12), 8);
/// assert!(mask.contains("contig", 4));
/// assert!(!mask.contains("contig", 8));
///
/// let other = MaskedRegionSet::new([(String::from("contig"), 6..10)]);
/// assert_eq!(mask.union(&other).intervals("contig"), &[4..10]);
/// assert_eq!(mask.intersect(&other).intervals("contig"), &[6..8]);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MaskedRegionSet {
    regions: BTreeMap<String, Vec<Range<usize>>>,
}

// Sorts the intervals and merges overlapping and adjacent ones.
fn sort_and_merge(mut intervals: Vec<Range<usize>>) -> Vec<Range<usize>> {
    intervals.retain(|x| x.start < x.end);
    intervals.sort_unstable_by_key(|x| (x.start, x.end));
    let mut result: Vec<Range<usize>> = Vec::with_capacity(intervals.len());
    for interval in intervals {
        match result.last_mut() {
            Some(last) if interval.start <= last.end => {
                last.end = last.end.max(interval.end);
            },
            _ => result.push(interval),
        }
    }
    result
}

// Intersects two sorted and merged interval lists.
fn intersect_sorted(a: &[Range<usize>], b: &[Range<usize>]) -> Vec<Range<usize>> {
    let mut result = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        let start = a[i].start.max(b[j].start);
        let end = a[i].end.min(b[j].end);
        if start < end {
            result.push(start..end);
        }
        if a[i].end <= b[j].end {
            i += 1;
        } else {
            j += 1;
        }
    }
    result
}

impl MaskedRegionSet {
    /// Missing symbol other than `N` / `n`.
    pub const GAP: u8 = b'-';

    /// Default symbol used by [`MaskedRegionSet::mask_sequence`].
    pub const MASK_CHAR: u8 = b'?';

    /// Returns `true` if the symbol marks a missing position.
    #[inline]
    pub fn is_missing(symbol: u8) -> bool {
        symbol.to_ascii_uppercase() == b'N' || symbol == Self::GAP
    }

    /// Creates a set of masked regions from `(sequence name, interval)` pairs in any order.
    pub fn new(intervals: impl IntoIterator<Item = (String, Range<usize>)>) -> Self {
        let mut regions: BTreeMap<String, Vec<Range<usize>>> = BTreeMap::new();
        for (name, interval) in intervals {
            regions.entry(name).or_default().push(interval);
        }
        Self::from_map(regions)
    }

    // Re-establishes the invariants for each sequence.
    fn from_map(regions: BTreeMap<String, Vec<Range<usize>>>) -> Self {
        let regions = regions.into_iter()
            .map(|(name, intervals)| (name, sort_and_merge(intervals)))
            .filter(|(_, intervals)| !intervals.is_empty())
            .collect();
        MaskedRegionSet { regions }
    }

    /// Returns an empty set of masked regions.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builds the masked regions from aligned sequences.
    ///
    /// Each maximal run of missing symbols (see [`MaskedRegionSet::is_missing`]) becomes one interval.
    pub fn from_sequences(records: &[SequenceRecord]) -> Self {
        let mut regions: BTreeMap<String, Vec<Range<usize>>> = BTreeMap::new();
        for record in records {
            let mut start: Option<usize> = None;
            let intervals = regions.entry(record.name.clone()).or_default();
            for (offset, symbol) in record.sequence.iter().enumerate() {
                match (start, Self::is_missing(*symbol)) {
                    (None, true) => start = Some(offset),
                    (Some(begin), false) => {
                        intervals.push(begin..offset);
                        start = None;
                    },
                    _ => {},
                }
            }
            if let Some(begin) = start {
                intervals.push(begin..record.sequence.len());
            }
        }
        Self::from_map(regions)
    }

    /// Returns the union of the masked regions.
    pub fn union(&self, other: &MaskedRegionSet) -> MaskedRegionSet {
        let mut regions = self.regions.clone();
        for (name, intervals) in other.regions.iter() {
            regions.entry(name.clone()).or_default().extend(intervals.iter().cloned());
        }
        Self::from_map(regions)
    }

    /// Returns the intersection of the masked regions.
    pub fn intersect(&self, other: &MaskedRegionSet) -> MaskedRegionSet {
        let mut regions = BTreeMap::new();
        for (name, intervals) in self.regions.iter() {
            if let Some(other_intervals) = other.regions.get(name) {
                regions.insert(name.clone(), intersect_sorted(intervals, other_intervals));
            }
        }
        Self::from_map(regions)
    }

    /// Returns the union of all given masked regions.
    ///
    /// Returns an error if the list is empty.
    pub fn union_all(masks: Vec<MaskedRegionSet>) -> Result<MaskedRegionSet> {
        let mut iter = masks.into_iter();
        let first = iter.next().ok_or(Error::invalid_argument("Cannot merge an empty list of masks"))?;
        let mut regions = first.regions;
        for mask in iter {
            for (name, intervals) in mask.regions {
                regions.entry(name).or_default().extend(intervals);
            }
        }
        Ok(Self::from_map(regions))
    }

    /// Returns the masked regions on the given sequence only.
    pub fn for_sequence(&self, name: &str) -> MaskedRegionSet {
        let mut regions = BTreeMap::new();
        if let Some(intervals) = self.regions.get(name) {
            regions.insert(name.to_string(), intervals.clone());
        }
        MaskedRegionSet { regions }
    }

    /// Returns `true` if the 0-based position on the given sequence is masked.
    pub fn contains(&self, sequence: &str, position: usize) -> bool {
        let intervals = self.intervals(sequence);
        let index = intervals.partition_point(|x| x.end <= position);
        index < intervals.len() && intervals[index].start <= position
    }

    /// Returns the sorted and merged intervals for the given sequence.
    pub fn intervals(&self, sequence: &str) -> &[Range<usize>] {
        self.regions.get(sequence).map(|x| x.as_slice()).unwrap_or(&[])
    }

    /// Returns an iterator over `(sequence name, interval)` pairs in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Range<usize>)> + '_ {
        self.regions.iter().flat_map(|(name, intervals)| {
            intervals.iter().map(move |interval| (name.as_str(), interval))
        })
    }

    /// Returns the names of the sequences with masked regions.
    pub fn sequence_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.regions.keys().map(|x| x.as_str())
    }

    /// Returns the total length of the masked regions.
    pub fn len(&self) -> usize {
        self.regions.values().flatten().map(|x| x.len()).sum()
    }

    /// Returns `true` if nothing is masked.
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Returns the total length of the masked regions on the given sequence.
    pub fn masked_length(&self, sequence: &str) -> usize {
        self.intervals(sequence).iter().map(|x| x.len()).sum()
    }

    /// Returns the length of the core genome on a sequence of the given length.
    pub fn core_length(&self, sequence: &str, sequence_length: usize) -> usize {
        sequence_length.saturating_sub(self.masked_length(sequence))
    }

    /// Returns a copy of the sequence with all masked positions replaced by `mask_char`.
    pub fn mask_sequence(&self, record: &SequenceRecord, mask_char: u8) -> SequenceRecord {
        let mut sequence = record.sequence.clone();
        for interval in self.intervals(&record.name) {
            let end = interval.end.min(sequence.len());
            if interval.start < end {
                sequence[interval.start..end].fill(mask_char);
            }
        }
        SequenceRecord::new(&record.name, sequence)
    }
}

//-----------------------------------------------------------------------------

/// Reading and writing BED files.
impl MaskedRegionSet {
    /// Reads masked regions from a BED file, which may be gzip-compressed.
    ///
    /// Only the first three columns are used.
    /// Empty lines, comments, and `track` / `browser` lines are skipped.
    pub fn from_file<P: AsRef<Path>>(filename: P) -> Result<Self> {
        let reader = utils::open_file(filename)?;
        Self::from_reader(reader)
    }

    /// Reads masked regions in the BED format from the given reader.
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut reader = formats::tsv_reader(reader, false);
        let mut intervals = Vec::new();
        for record in reader.records() {
            let record = record?;
            let line = formats::record_line(&record);
            let name = record.get(0).unwrap_or_default();
            if matches!(name.split_whitespace().next(), Some("track") | Some("browser")) {
                continue;
            }
            if name.is_empty() {
                return Err(Error::parse(line, "Empty sequence name"));
            }
            let start = record.get(1).map(|x| x.parse::<usize>());
            let end = record.get(2).map(|x| x.parse::<usize>());
            match (start, end) {
                (Some(Ok(start)), Some(Ok(end))) if start <= end => {
                    intervals.push((name.to_string(), start..end));
                },
                _ => return Err(Error::parse(line, format!("Invalid BED line: {}", record.iter().collect::<Vec<_>>().join("\t")))),
            }
        }
        Ok(Self::new(intervals))
    }

    /// Writes the masked regions to a BED file.
    ///
    /// The file is gzip-compressed if its name ends with `.gz`.
    pub fn write<P: AsRef<Path>>(&self, filename: P) -> Result<()> {
        let mut output = utils::create_file(filename)?;
        self.write_bed(&mut output)?;
        output.flush()?;
        Ok(())
    }

    /// Writes the masked regions in the BED format.
    pub fn write_bed<W: Write>(&self, output: &mut W) -> Result<()> {
        for (name, interval) in self.iter() {
            writeln!(output, "{}\t{}\t{}", name, interval.start, interval.end)?;
        }
        Ok(())
    }
}

//-----------------------------------------------------------------------------
