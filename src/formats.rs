//! Support for reading the input formats of the database.
//!
//! ### FASTA
//!
//! [`read_fasta`] reads all records from a FASTA file, which may be gzip-compressed.
//! The sequence name is the first word of the header line.
//! Reference genomes are read with [`read_reference`], which only keeps the names and lengths.
//!
//! ### Variant calls
//!
//! [`read_variant_calls`] reads a tab-separated table of variant calls with a header line.
//! The table must contain columns `SAMPLE`, `CHROM`, `POS`, `REF`, and `ALT`.
//! Column `TYPE` is optional and may contain the variant kind (`snp`, `mnp`, `ins`, `del`; other values are ignored).
//! A reported kind that contradicts the alleles is an error.
//! Other columns are ignored.
//!
//! ### MLST allele calls
//!
//! [`read_mlst_calls`] reads a tab-separated table with columns `Sample`, `Scheme`, `Locus`, and `Allele`.

use crate::{utils, Error, Result};
use crate::variants::{MlstCall, ReferenceSequence, VariantCall, VariantKind};

use std::io::BufRead;
use std::path::Path;

use bio::io::fasta;
use csv::StringRecord;


//-----------------------------------------------------------------------------

/// A named sequence.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SequenceRecord {
    /// Sequence name.
    pub name: String,
    /// The sequence as bytes.
    pub sequence: Vec<u8>,
}

impl SequenceRecord {
    /// Creates a new sequence record.
    pub fn new(name: &str, sequence: Vec<u8>) -> Self {
        SequenceRecord { name: name.to_string(), sequence }
    }

    /// Returns the length of the sequence.
    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    /// Returns `true` if the sequence is empty.
    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }
}

//-----------------------------------------------------------------------------

/// Reads all FASTA records from the given reader.
///
/// Returns an error if sequence data appears before the first header line or if a record has no name.
pub fn read_fasta_from<R: BufRead>(reader: R) -> Result<Vec<SequenceRecord>> {
    let mut result: Vec<SequenceRecord> = Vec::new();
    for (index, record) in fasta::Reader::new(reader).records().enumerate() {
        let record = record?;
        record.check().map_err(|message| {
            Error::invalid_argument(format!("FASTA record {}: {}", index + 1, message))
        })?;
        result.push(SequenceRecord::new(record.id(), record.seq().to_vec()));
    }
    Ok(result)
}

/// Reads all FASTA records from the given file, which may be gzip-compressed.
pub fn read_fasta<P: AsRef<Path>>(filename: P) -> Result<Vec<SequenceRecord>> {
    let reader = utils::open_file(filename)?;
    read_fasta_from(reader)
}

/// Reads the names and lengths of the sequences in a reference FASTA file.
///
/// Returns an error if the file is empty or if a sequence name occurs twice.
pub fn read_reference<P: AsRef<Path>>(filename: P) -> Result<Vec<ReferenceSequence>> {
    let records = read_fasta(&filename)?;
    if records.is_empty() {
        return Err(Error::invalid_argument(format!("No sequences in reference {}", filename.as_ref().display())));
    }
    let mut result: Vec<ReferenceSequence> = Vec::with_capacity(records.len());
    for record in records {
        if result.iter().any(|x| x.name == record.name) {
            return Err(Error::consistency(format!("Duplicate reference sequence {}", record.name)));
        }
        result.push(ReferenceSequence::new(&record.name, record.len()));
    }
    Ok(result)
}

//-----------------------------------------------------------------------------

// Column lookup in a delimited table with a header line.
struct Columns {
    indexes: Vec<Option<usize>>,
}

impl Columns {
    // Finds the columns in the header. The required columns must all be present.
    fn new(header: &StringRecord, required: &[&str], optional: &[&str]) -> Result<Self> {
        let mut indexes = Vec::with_capacity(required.len() + optional.len());
        for name in required {
            let index = header.iter().position(|x| x == *name).ok_or(
                Error::invalid_argument(format!("Missing column {} in the header", name))
            )?;
            indexes.push(Some(index));
        }
        for name in optional {
            indexes.push(header.iter().position(|x| x == *name));
        }
        Ok(Columns { indexes })
    }

    fn get<'a>(&self, record: &'a StringRecord, column: usize) -> Option<&'a str> {
        self.indexes[column].and_then(|index| record.get(index))
    }

    fn required<'a>(&self, record: &'a StringRecord, column: usize, line: usize) -> Result<&'a str> {
        self.get(record, column).ok_or(Error::parse(line, format!("Missing field {}", column + 1)))
    }
}

// Tab-separated records with optional `#` comment lines.
pub(crate) fn tsv_reader<R: BufRead>(reader: R, has_headers: bool) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(has_headers)
        .flexible(true)
        .comment(Some(b'#'))
        .from_reader(reader)
}

pub(crate) fn record_line(record: &StringRecord) -> usize {
    record.position().map(|x| x.line() as usize).unwrap_or_default()
}

//-----------------------------------------------------------------------------

/// Reads variant calls from a table in the given reader.
pub fn read_variant_calls_from<R: BufRead>(reader: R) -> Result<Vec<VariantCall>> {
    const SAMPLE: usize = 0;
    const CHROM: usize = 1;
    const POS: usize = 2;
    const REF: usize = 3;
    const ALT: usize = 4;
    const TYPE: usize = 5;

    let mut reader = tsv_reader(reader, true);
    let columns = Columns::new(reader.headers()?, &["SAMPLE", "CHROM", "POS", "REF", "ALT"], &["TYPE"])?;
    let mut result = Vec::new();
    for record in reader.records() {
        let record = record?;
        let line = record_line(&record);
        let position = columns.required(&record, POS, line)?;
        let position = position.parse::<usize>().ok().filter(|x| *x > 0).ok_or(
            Error::parse(line, format!("Invalid position {}", position))
        )?;
        let reference = columns.required(&record, REF, line)?;
        let alternate = columns.required(&record, ALT, line)?;
        if reference.is_empty() || alternate.is_empty() {
            return Err(Error::parse(line, "Empty allele"));
        }
        let mut call = VariantCall::new(
            columns.required(&record, SAMPLE, line)?,
            columns.required(&record, CHROM, line)?,
            position, reference, alternate
        );
        call.kind = columns.get(&record, TYPE).and_then(|x| x.parse::<VariantKind>().ok());
        call.kind()?;
        result.push(call);
    }
    Ok(result)
}

/// Reads variant calls from a file, which may be gzip-compressed.
pub fn read_variant_calls<P: AsRef<Path>>(filename: P) -> Result<Vec<VariantCall>> {
    let reader = utils::open_file(filename)?;
    read_variant_calls_from(reader)
}

/// Reads MLST allele calls from a table in the given reader.
///
/// Non-numeric allele calls are replaced with the unknown allele.
pub fn read_mlst_calls_from<R: BufRead>(reader: R) -> Result<Vec<MlstCall>> {
    let mut reader = tsv_reader(reader, true);
    let columns = Columns::new(reader.headers()?, &["Sample", "Scheme", "Locus", "Allele"], &[])?;
    let mut result = Vec::new();
    for record in reader.records() {
        let record = record?;
        let line = record_line(&record);
        result.push(MlstCall::new(
            columns.required(&record, 0, line)?,
            columns.required(&record, 1, line)?,
            columns.required(&record, 2, line)?,
            columns.required(&record, 3, line)?,
        ));
    }
    Ok(result)
}

/// Reads MLST allele calls from a file, which may be gzip-compressed.
pub fn read_mlst_calls<P: AsRef<Path>>(filename: P) -> Result<Vec<MlstCall>> {
    let reader = utils::open_file(filename)?;
    read_mlst_calls_from(reader)
}

//-----------------------------------------------------------------------------
