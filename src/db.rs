//! Variant-base: an SQLite database of deduplicated variant calls, core-genome masks, and MLST allele calls.

use crate::{utils, Error, MaskedRegionSet, Result, SampleSet};
use crate::variants::{KindFilter, MlstCall, QueryFeature, ReferenceSequence, Variant, VariantCall, VariantKind};

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use log::{debug, info};

use roaring::RoaringBitmap;

use rusqlite::{Connection, OpenFlags, OptionalExtension, Row, Statement};


//-----------------------------------------------------------------------------

/// A database connection to a Variant-base database.
///
/// The database stores a reference genome (sequence names and lengths), samples, variants, per-sample core-genome masks, and MLST allele calls.
/// Each distinct variant is stored once, identified by its key `sequence:position:ref:alt`, together with the set of samples carrying it.
///
/// A database is built with [`VariantBase::create`], followed by any number of [`VariantBase::insert`] and [`VariantBase::insert_mlst`] batches.
/// Each batch is inserted in a single transaction.
/// [`VariantBase::open`] opens the database for queries.
/// The connection is protected by a mutex, and the structure can be shared between threads.
///
/// # Examples
///
/// ```
/// use variant_base::{VariantBase, MaskedRegionSet, SampleSet};
/// use variant_base::variants::{ReferenceSequence, VariantCall};
/// use std::collections::BTreeMap;
///
/// let dir = tempfile::tempdir().unwrap();
/// let db_file = dir.path().join("variants.db");
/// let reference = vec![ReferenceSequence::new("chr", 100)];
/// VariantBase::create(&db_file, "reference", &reference).unwrap();
///
/// let calls = vec![
///     VariantCall::new("A", "chr", 10, "A", "T"),
///     VariantCall::new("B", "chr", 10, "A", "T"),
///     VariantCall::new("B", "chr", 20, "C", "CT"),
/// ];
/// let mut masks = BTreeMap::new();
/// masks.insert(String::from("A"), MaskedRegionSet::empty());
/// masks.insert(String::from("B"), MaskedRegionSet::new([(String::from("chr"), 90..100)]));
/// VariantBase::insert(&db_file, &calls, &masks).unwrap();
///
/// let database = VariantBase::open(&db_file).unwrap();
/// assert_eq!(database.samples(), 2);
/// assert_eq!(database.variants(), 2);
/// let samples = database.samples_for_variants(&["chr:10:A:T"]).unwrap();
/// assert_eq!(samples.len(), Some(2));
/// assert_eq!(database.core_length("B").unwrap(), 90);
/// ```
#[derive(Debug)]
pub struct VariantBase {
    connection: Mutex<Connection>,
    version: String,
    reference: String,
    sequences: Vec<ReferenceSequence>,
    known_samples: RoaringBitmap,
    variants: usize,
}

/// Using the database.
impl VariantBase {
    // Key for database version.
    const KEY_VERSION: &'static str = "version";

    /// Current database version.
    pub const VERSION: &'static str = "Variant-base v0.1.0";

    // Key for reference genome name.
    const KEY_REFERENCE: &'static str = "reference";

    // Key for total reference length.
    const KEY_REFERENCE_LENGTH: &'static str = "reference_length";

    /// Opens a read-only connection to the database in the given file.
    ///
    /// Reads the header information and passes through any database errors.
    pub fn open<P: AsRef<Path>>(filename: P) -> Result<Self> {
        if !utils::file_exists(&filename) {
            return Err(Error::not_found(format!("Database {} does not exist", filename.as_ref().display())));
        }
        let flags = OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let connection = Connection::open_with_flags(&filename, flags)?;

        // Get some header information.
        let mut get_tag = connection.prepare(
            "SELECT value FROM Tags WHERE key = ?1"
        )?;
        let version = check_version(&mut get_tag)?;
        let reference = get_string_value(&mut get_tag, Self::KEY_REFERENCE)?;
        drop(get_tag);

        let sequences = read_reference_sequences(&connection)?;
        let known_samples: RoaringBitmap = {
            let mut statement = connection.prepare("SELECT id FROM Samples")?;
            let rows = statement.query_map((), |row| row.get::<_, u32>(0))?;
            let ids = rows.collect::<rusqlite::Result<RoaringBitmap>>()?;
            ids
        };
        let variants: usize = connection.query_row("SELECT COUNT(*) FROM Variants", (), |row| row.get(0))?;
        debug!(
            "Opened {} with {} samples and {} variants over {} reference sequences",
            filename.as_ref().display(), known_samples.len(), variants, sequences.len()
        );

        Ok(VariantBase {
            connection: Mutex::new(connection),
            version,
            reference,
            sequences,
            known_samples,
            variants,
        })
    }

    // Locks the connection for the duration of a query.
    fn connection(&self) -> Result<MutexGuard<'_, Connection>> {
        self.connection.lock().map_err(|_| Error::consistency("Database connection lock is poisoned"))
    }

    /// Returns the filename of the database or [`None`] if there is no filename.
    pub fn filename(&self) -> Option<String> {
        let connection = self.connection.lock().ok()?;
        connection.path().map(String::from)
    }

    /// Returns the size of the database file in a human-readable format.
    pub fn file_size(&self) -> Option<String> {
        let filename = self.filename()?;
        utils::file_size(filename)
    }

    /// Returns the version of the database.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Returns the name of the reference genome.
    pub fn reference_name(&self) -> &str {
        &self.reference
    }

    /// Returns the sequences in the reference genome.
    pub fn reference_sequences(&self) -> &[ReferenceSequence] {
        &self.sequences
    }

    /// Returns the total length of the reference genome.
    pub fn reference_length(&self) -> usize {
        self.sequences.iter().map(|x| x.length).sum()
    }

    /// Returns the number of samples.
    pub fn samples(&self) -> usize {
        self.known_samples.len() as usize
    }

    /// Returns the number of distinct variants.
    pub fn variants(&self) -> usize {
        self.variants
    }

    /// Returns the number of reference sequences.
    pub fn sequences(&self) -> usize {
        self.sequences.len()
    }
}

//-----------------------------------------------------------------------------

/// Creating the database.
impl VariantBase {
    /// Creates a new empty database for the given reference genome.
    ///
    /// # Arguments
    ///
    /// * `filename`: Name of the database file to be created.
    /// * `reference_name`: Name of the reference genome.
    /// * `sequences`: Sequences in the reference genome.
    ///
    /// # Errors
    ///
    /// Returns an error if the database already exists or if the reference genome is empty.
    /// Passes through any database errors.
    pub fn create<P: AsRef<Path>>(filename: P, reference_name: &str, sequences: &[ReferenceSequence]) -> Result<()> {
        info!("Creating database {}", filename.as_ref().display());
        if utils::file_exists(&filename) {
            return Err(Error::invalid_argument(format!("Database {} already exists", filename.as_ref().display())));
        }
        if sequences.is_empty() {
            return Err(Error::invalid_argument(format!("Reference genome {} has no sequences", reference_name)));
        }

        let mut connection = Connection::open(&filename)?;
        Self::create_tables(&connection)?;

        let transaction = connection.transaction()?;
        {
            let mut insert = transaction.prepare(
                "INSERT INTO Tags(key, value) VALUES (?1, ?2)"
            )?;
            let total_length: usize = sequences.iter().map(|x| x.length).sum();
            insert.execute((Self::KEY_VERSION, Self::VERSION))?;
            insert.execute((Self::KEY_REFERENCE, reference_name))?;
            insert.execute((Self::KEY_REFERENCE_LENGTH, total_length.to_string()))?;

            let mut insert = transaction.prepare(
                "INSERT INTO ReferenceSequences(name, length) VALUES (?1, ?2)"
            )?;
            for sequence in sequences {
                insert.execute((&sequence.name, sequence.length))?;
            }
        }
        transaction.commit()?;

        info!("Inserted reference {} with {} sequences", reference_name, sequences.len());
        Ok(())
    }

    fn create_tables(connection: &Connection) -> rusqlite::Result<()> {
        connection.execute_batch(
            "CREATE TABLE Tags (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            ) STRICT;
            CREATE TABLE ReferenceSequences (
                name TEXT PRIMARY KEY,
                length INTEGER NOT NULL
            ) STRICT;
            CREATE TABLE Samples (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL UNIQUE
            ) STRICT;
            CREATE TABLE Variants (
                id TEXT PRIMARY KEY,
                sequence TEXT NOT NULL,
                position INTEGER NOT NULL,
                ref TEXT NOT NULL,
                alt TEXT NOT NULL,
                kind TEXT NOT NULL,
                samples BLOB NOT NULL
            ) STRICT;
            CREATE INDEX VariantPositions ON Variants(sequence, position);
            CREATE TABLE SampleSequences (
                sample_id INTEGER NOT NULL,
                sequence TEXT NOT NULL,
                masked BLOB NOT NULL,
                PRIMARY KEY (sample_id, sequence)
            ) STRICT;
            CREATE TABLE MlstAlleles (
                id TEXT PRIMARY KEY,
                scheme TEXT NOT NULL,
                locus TEXT NOT NULL,
                allele TEXT NOT NULL,
                samples BLOB NOT NULL
            ) STRICT;
            CREATE TABLE SampleMlst (
                sample_id INTEGER NOT NULL,
                scheme TEXT NOT NULL,
                PRIMARY KEY (sample_id, scheme)
            ) STRICT;"
        )
    }

    // Opens a database for inserting records.
    fn open_for_writing<P: AsRef<Path>>(filename: P) -> Result<Connection> {
        if !utils::file_exists(&filename) {
            return Err(Error::not_found(format!("Database {} does not exist", filename.as_ref().display())));
        }
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let connection = Connection::open_with_flags(&filename, flags)?;
        {
            let mut get_tag = connection.prepare("SELECT value FROM Tags WHERE key = ?1")?;
            check_version(&mut get_tag)?;
        }
        Ok(connection)
    }

    /// Inserts a batch of variant calls and core-genome masks.
    ///
    /// Calls with the same key `sequence:position:ref:alt` are stored as a single variant, and the samples are added to the sample set of an existing variant.
    /// Every sample in the batch must have a mask, but a sample may have a mask without any calls.
    /// The batch is inserted in a single transaction: if any part of it fails, nothing is inserted.
    ///
    /// # Errors
    ///
    /// * [`Error::NotFound`]: A sample has no mask, or a call or a mask refers to an unknown reference sequence.
    /// * [`Error::InvalidArgument`]: A call is located past the end of the reference sequence.
    /// * [`Error::ConsistencyViolation`]: A sample has already been inserted, the reported kind of a call contradicts its alleles, or an existing variant is stored with another kind.
    ///
    /// Passes through any database errors.
    pub fn insert<P: AsRef<Path>>(filename: P, calls: &[VariantCall], masks: &BTreeMap<String, MaskedRegionSet>) -> Result<()> {
        info!("Inserting {} variant calls for {} samples into {}", calls.len(), masks.len(), filename.as_ref().display());
        let mut connection = Self::open_for_writing(&filename)?;
        let sequences = read_reference_sequences(&connection)?;

        // Validate the inputs and group the calls by sample.
        let mut by_sample: BTreeMap<&str, Vec<&VariantCall>> = BTreeMap::new();
        for call in calls {
            let sequence = sequences.iter().find(|x| x.name == call.sequence).ok_or(
                Error::not_found(format!("Unknown reference sequence {} in variant {}", call.sequence, call.key()))
            )?;
            let end = call.position.saturating_sub(1) + call.reference.len();
            if call.position == 0 || end > sequence.length {
                return Err(Error::invalid_argument(format!("Variant {} is outside {}", call.key(), sequence.name)));
            }
            by_sample.entry(call.sample.as_str()).or_default().push(call);
        }
        for (sample, mask) in masks.iter() {
            if let Some(name) = mask.sequence_names().find(|name| !sequences.iter().any(|x| x.name == *name)) {
                return Err(Error::not_found(format!("Unknown reference sequence {} in the mask for {}", name, sample)));
            }
            by_sample.entry(sample.as_str()).or_default();
        }
        if let Some(sample) = by_sample.keys().find(|x| !masks.contains_key(**x)) {
            return Err(Error::not_found(format!("No core-genome mask for sample {}", sample)));
        }

        let transaction = connection.transaction()?;
        {
            // Samples and their masks.
            let mut sample_ids: BTreeMap<&str, u32> = BTreeMap::new();
            let mut has_sequences = transaction.prepare(
                "SELECT EXISTS(SELECT 1 FROM SampleSequences JOIN Samples ON sample_id = id WHERE name = ?1)"
            )?;
            let mut insert_mask = transaction.prepare(
                "INSERT INTO SampleSequences(sample_id, sequence, masked) VALUES (?1, ?2, ?3)"
            )?;
            for sample in by_sample.keys() {
                let exists: bool = has_sequences.query_row((sample,), |row| row.get(0))?;
                if exists {
                    return Err(Error::consistency(format!("Sample {} has already been inserted", sample)));
                }
                let id = get_or_insert_sample(&transaction, sample)?;
                let mask = &masks[*sample];
                for sequence in sequences.iter() {
                    let encoded = utils::encode_intervals(mask.intervals(&sequence.name));
                    insert_mask.execute((id, &sequence.name, encoded))?;
                }
                sample_ids.insert(*sample, id);
            }

            // Deduplicate the calls in the batch.
            let mut batch: BTreeMap<String, (&VariantCall, VariantKind, RoaringBitmap)> = BTreeMap::new();
            for (sample, sample_calls) in by_sample.iter() {
                let id = sample_ids[sample];
                for call in sample_calls {
                    let kind = call.kind()?;
                    let entry = batch.entry(call.key()).or_insert((*call, kind, RoaringBitmap::new()));
                    entry.2.insert(id);
                }
            }

            // Merge them with the existing variants.
            let mut get_variant = transaction.prepare(
                "SELECT kind, samples FROM Variants WHERE id = ?1"
            )?;
            let mut insert_variant = transaction.prepare(
                "INSERT INTO Variants(id, sequence, position, ref, alt, kind, samples) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"
            )?;
            let mut update_variant = transaction.prepare(
                "UPDATE Variants SET samples = ?2 WHERE id = ?1"
            )?;
            let (mut inserted, mut updated) = (0, 0);
            for (key, (call, kind, samples)) in batch {
                let existing: Option<(String, Vec<u8>)> = get_variant.query_row(
                    (&key,), |row| Ok((row.get(0)?, row.get(1)?))
                ).optional()?;
                match existing {
                    Some((old_kind, bytes)) => {
                        if old_kind != kind.as_str() {
                            return Err(Error::consistency(format!(
                                "Variant {} is stored with kind {} but was called as {}", key, old_kind, kind
                            )));
                        }
                        let merged = SampleSet::from_bytes(&bytes)?.union(&SampleSet::from(samples));
                        update_variant.execute((&key, merged.to_bytes()?))?;
                        updated += 1;
                    },
                    None => {
                        let bytes = SampleSet::from(samples).to_bytes()?;
                        insert_variant.execute((
                            &key, &call.sequence, call.position, &call.reference, &call.alternate, kind.as_str(), bytes
                        ))?;
                        inserted += 1;
                    },
                }
            }
            info!("Inserted {} new variants and updated {} existing variants", inserted, updated);
        }
        transaction.commit()?;

        Ok(())
    }

    /// Inserts a batch of MLST allele calls.
    ///
    /// Calls with the same key `scheme:locus:allele` are stored as a single allele record.
    /// The batch is inserted in a single transaction.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConsistencyViolation`] if a sample already has allele calls for one of the schemes.
    /// Passes through any database errors.
    pub fn insert_mlst<P: AsRef<Path>>(filename: P, calls: &[MlstCall]) -> Result<()> {
        info!("Inserting {} MLST allele calls into {}", calls.len(), filename.as_ref().display());
        let mut connection = Self::open_for_writing(&filename)?;

        let mut batch: BTreeMap<String, (&MlstCall, RoaringBitmap)> = BTreeMap::new();
        let transaction = connection.transaction()?;
        {
            let mut sample_schemes: BTreeSet<(&str, &str)> = BTreeSet::new();
            let mut check_scheme = transaction.prepare(
                "SELECT EXISTS(SELECT 1 FROM SampleMlst JOIN Samples ON sample_id = id WHERE name = ?1 AND scheme = ?2)"
            )?;
            let mut insert_scheme = transaction.prepare(
                "INSERT INTO SampleMlst(sample_id, scheme) VALUES (?1, ?2)"
            )?;
            for call in calls {
                let id = get_or_insert_sample(&transaction, &call.sample)?;
                if sample_schemes.insert((call.sample.as_str(), call.scheme.as_str())) {
                    let exists: bool = check_scheme.query_row((&call.sample, &call.scheme), |row| row.get(0))?;
                    if exists {
                        return Err(Error::consistency(format!(
                            "Sample {} already has MLST calls for scheme {}", call.sample, call.scheme
                        )));
                    }
                    insert_scheme.execute((id, &call.scheme))?;
                }
                batch.entry(call.key()).or_insert((call, RoaringBitmap::new())).1.insert(id);
            }

            let mut get_allele = transaction.prepare(
                "SELECT samples FROM MlstAlleles WHERE id = ?1"
            )?;
            let mut upsert_allele = transaction.prepare(
                "INSERT OR REPLACE INTO MlstAlleles(id, scheme, locus, allele, samples) VALUES (?1, ?2, ?3, ?4, ?5)"
            )?;
            for (key, (call, samples)) in batch.iter() {
                let existing: Option<Vec<u8>> = get_allele.query_row((key,), |row| row.get(0)).optional()?;
                let mut merged = SampleSet::from(samples.clone());
                if let Some(bytes) = existing {
                    merged = merged.union(&SampleSet::from_bytes(&bytes)?);
                }
                upsert_allele.execute((key, &call.scheme, &call.locus, &call.allele, merged.to_bytes()?))?;
            }
            info!("Inserted calls for {} sample-scheme pairs and {} alleles", sample_schemes.len(), batch.len());
        }
        transaction.commit()?;

        Ok(())
    }
}

//-----------------------------------------------------------------------------

/// Samples.
impl VariantBase {
    /// Returns the identifiers of all samples in the database.
    pub fn all_samples(&self) -> &RoaringBitmap {
        &self.known_samples
    }

    /// Returns a mapping from sample names to identifiers for all samples.
    pub fn sample_name_ids(&self) -> Result<BTreeMap<String, u32>> {
        let connection = self.connection()?;
        let mut statement = connection.prepare_cached("SELECT name, id FROM Samples")?;
        let rows = statement.query_map((), |row| Ok((row.get(0)?, row.get(1)?)))?;
        let result = rows.collect::<rusqlite::Result<_>>()?;
        Ok(result)
    }

    /// Returns a mapping from sample names to identifiers for the given names.
    ///
    /// Names that are not in the database are skipped.
    pub fn find_sample_name_ids(&self, names: &[&str]) -> Result<BTreeMap<String, u32>> {
        let connection = self.connection()?;
        let mut statement = connection.prepare_cached("SELECT id FROM Samples WHERE name = ?1")?;
        let mut result = BTreeMap::new();
        for name in names {
            let id: Option<u32> = statement.query_row((name,), |row| row.get(0)).optional()?;
            if let Some(id) = id {
                result.insert(name.to_string(), id);
            }
        }
        Ok(result)
    }

    /// Returns the identifiers for the given sample names.
    ///
    /// Returns [`Error::NotFound`] if any of the names is not in the database.
    pub fn sample_ids(&self, names: &[&str]) -> Result<SampleSet> {
        let found = self.find_sample_name_ids(names)?;
        if let Some(missing) = names.iter().find(|x| !found.contains_key(**x)) {
            return Err(Error::not_found(format!("Sample {} is not in the database", missing)));
        }
        Ok(found.into_values().collect())
    }

    /// Returns the subset of names that are in the database, in the given order.
    pub fn which_exist(&self, names: &[&str]) -> Result<Vec<String>> {
        let found = self.find_sample_name_ids(names)?;
        let result = names.iter().filter(|x| found.contains_key(**x)).map(|x| x.to_string()).collect();
        Ok(result)
    }

    /// Returns the samples with variant calls and core-genome masks.
    pub fn samples_with_variants(&self) -> Result<SampleSet> {
        let connection = self.connection()?;
        let mut statement = connection.prepare_cached("SELECT DISTINCT sample_id FROM SampleSequences")?;
        let rows = statement.query_map((), |row| row.get::<_, u32>(0))?;
        let result = rows.collect::<rusqlite::Result<SampleSet>>()?;
        Ok(result)
    }

    /// Returns `(identifier, name)` pairs for the samples in the set, ordered by identifier.
    ///
    /// A co-finite set is resolved against the samples in the database.
    pub fn sample_names(&self, samples: &SampleSet) -> Result<Vec<(u32, String)>> {
        let connection = self.connection()?;
        let mut statement = connection.prepare_cached("SELECT id, name FROM Samples ORDER BY id")?;
        let rows = statement.query_map((), |row| Ok((row.get::<_, u32>(0)?, row.get::<_, String>(1)?)))?;
        let mut result = Vec::new();
        for row in rows {
            let (id, name) = row?;
            if samples.contains(id) {
                result.push((id, name));
            }
        }
        Ok(result)
    }
}

//-----------------------------------------------------------------------------

/// Variants and features.
impl VariantBase {
    /// Returns the variant with the given key, or [`None`] if there is no such variant.
    pub fn get_variant(&self, key: &str) -> Result<Option<Variant>> {
        let connection = self.connection()?;
        let mut statement = connection.prepare_cached(
            "SELECT sequence, position, ref, alt, kind, samples FROM Variants WHERE id = ?1"
        )?;
        let row = statement.query_row((key,), variant_row).optional()?;
        row.map(|x| x.into_variant()).transpose()
    }

    /// Returns the samples carrying any of the given variants.
    ///
    /// Unknown variant keys do not contribute any samples.
    pub fn samples_for_variants(&self, keys: &[&str]) -> Result<SampleSet> {
        let connection = self.connection()?;
        let mut statement = connection.prepare_cached("SELECT samples FROM Variants WHERE id = ?1")?;
        union_of_blobs(&mut statement, keys)
    }

    /// Returns the number of samples carrying each of the given variants.
    pub fn count_samples_for_variants(&self, keys: &[&str]) -> Result<BTreeMap<String, usize>> {
        let connection = self.connection()?;
        let mut statement = connection.prepare_cached("SELECT samples FROM Variants WHERE id = ?1")?;
        let mut result = BTreeMap::new();
        for key in keys {
            let count = match statement.query_row((key,), |row| row.get::<_, Vec<u8>>(0)).optional()? {
                Some(bytes) => SampleSet::from_bytes(&bytes)?.len().unwrap_or_default() as usize,
                None => 0,
            };
            result.insert(key.to_string(), count);
        }
        Ok(result)
    }

    /// Returns the samples carrying any of the given MLST alleles.
    pub fn samples_for_mlst_alleles(&self, keys: &[&str]) -> Result<SampleSet> {
        let connection = self.connection()?;
        let mut statement = connection.prepare_cached("SELECT samples FROM MlstAlleles WHERE id = ?1")?;
        union_of_blobs(&mut statement, keys)
    }

    /// Returns the samples carrying the feature.
    pub fn samples_with_feature(&self, feature: &QueryFeature) -> Result<SampleSet> {
        let result = match feature {
            QueryFeature::Mutation(key) => self.samples_for_variants(&[key.as_str()]),
            QueryFeature::MlstAllele(key) => self.samples_for_mlst_alleles(&[key.as_str()]),
        }?;
        debug!("Feature {} is carried by {} samples", feature, result.len().unwrap_or_default());
        Ok(result)
    }

    /// Returns the names of the MLST schemes in sorted order.
    pub fn mlst_schemes(&self) -> Result<Vec<String>> {
        let connection = self.connection()?;
        let mut statement = connection.prepare_cached("SELECT DISTINCT scheme FROM MlstAlleles ORDER BY scheme")?;
        let rows = statement.query_map((), |row| row.get(0))?;
        let result = rows.collect::<rusqlite::Result<_>>()?;
        Ok(result)
    }

    /// Returns the alleles for each locus in the given MLST scheme.
    ///
    /// Returns [`Error::NotFound`] if the scheme is not in the database.
    pub fn mlst_loci_alleles(&self, scheme: &str) -> Result<BTreeMap<String, Vec<String>>> {
        let connection = self.connection()?;
        let mut statement = connection.prepare_cached(
            "SELECT locus, allele FROM MlstAlleles WHERE scheme = ?1 ORDER BY locus, allele"
        )?;
        let rows = statement.query_map((scheme,), |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?;
        let mut result: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for row in rows {
            let (locus, allele) = row?;
            result.entry(locus).or_default().push(allele);
        }
        if result.is_empty() {
            return Err(Error::not_found(format!("MLST scheme {} is not in the database", scheme)));
        }
        Ok(result)
    }

    /// Returns the variants carried by the given samples.
    ///
    /// Only variants accepted by the kind filter and carried by at least one of the samples are included.
    /// See [`SampleVariants`] for details.
    pub fn sample_variants(&self, samples: &RoaringBitmap, kind: KindFilter) -> Result<SampleVariants> {
        let connection = self.connection()?;
        let mut statement = connection.prepare_cached(
            "SELECT sequence, position, ref, alt, kind, samples FROM Variants ORDER BY sequence, position, id"
        )?;
        let rows = statement.query_map((), variant_row)?;
        let mut result = SampleVariants::default();
        for sample in samples.iter() {
            result.by_sample.insert(sample, RoaringBitmap::new());
        }
        for row in rows {
            let mut variant = row?.into_variant()?;
            if !kind.accepts(variant.kind) {
                continue;
            }
            let carriers = variant.samples.resolve(samples);
            if carriers.is_empty() {
                continue;
            }
            let index = result.variants.len() as u32;
            for sample in carriers.iter() {
                if let Some(ids) = result.by_sample.get_mut(&sample) {
                    ids.insert(index);
                }
            }
            variant.samples = SampleSet::from(carriers);
            result.variants.push(variant);
        }
        Ok(result)
    }
}

/// Variants carried by a set of samples.
///
/// Each sample is associated with the set of indexes in `variants` it carries.
/// The sample set of each variant is restricted to the selected samples.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SampleVariants {
    /// Variants ordered by sequence and position.
    pub variants: Vec<Variant>,
    /// Indexes in `variants` for each selected sample.
    pub by_sample: BTreeMap<u32, RoaringBitmap>,
}

//-----------------------------------------------------------------------------

/// Core-genome masks.
impl VariantBase {
    /// Returns the masked regions of the sample.
    ///
    /// Returns [`Error::NotFound`] if the sample has no core-genome mask.
    pub fn core_mask(&self, sample: &str) -> Result<MaskedRegionSet> {
        let connection = self.connection()?;
        let mut statement = connection.prepare_cached(
            "SELECT sequence, masked FROM SampleSequences JOIN Samples ON sample_id = id WHERE name = ?1"
        )?;
        let rows = statement.query_map((sample,), |row| Ok((row.get::<_, String>(0)?, row.get::<_, Vec<u8>>(1)?)))?;
        let mut intervals = Vec::new();
        let mut found = false;
        for row in rows {
            let (sequence, bytes) = row?;
            for interval in utils::decode_intervals(&bytes)? {
                intervals.push((sequence.clone(), interval));
            }
            found = true;
        }
        if !found {
            return Err(Error::not_found(format!("No core-genome mask for sample {}", sample)));
        }
        Ok(MaskedRegionSet::new(intervals))
    }

    /// Returns the length of the core genome of the sample.
    pub fn core_length(&self, sample: &str) -> Result<usize> {
        let mask = self.core_mask(sample)?;
        let result = self.sequences.iter().map(|x| mask.core_length(&x.name, x.length)).sum();
        Ok(result)
    }
}

//-----------------------------------------------------------------------------

// Raw variant row before decoding the kind and the sample set.
struct VariantRow {
    sequence: String,
    position: usize,
    reference: String,
    alternate: String,
    kind: String,
    samples: Vec<u8>,
}

impl VariantRow {
    fn into_variant(self) -> Result<Variant> {
        let kind: VariantKind = self.kind.parse().map_err(|_| {
            Error::consistency(format!("Invalid stored kind {} for a variant at {}:{}", self.kind, self.sequence, self.position))
        })?;
        Ok(Variant {
            sequence: self.sequence,
            position: self.position,
            reference: self.reference,
            alternate: self.alternate,
            kind,
            samples: SampleSet::from_bytes(&self.samples)?,
        })
    }
}

fn variant_row(row: &Row) -> rusqlite::Result<VariantRow> {
    Ok(VariantRow {
        sequence: row.get(0)?,
        position: row.get(1)?,
        reference: row.get(2)?,
        alternate: row.get(3)?,
        kind: row.get(4)?,
        samples: row.get(5)?,
    })
}

// Executes the statement for each key and returns the union of the sample sets.
fn union_of_blobs(statement: &mut Statement, keys: &[&str]) -> Result<SampleSet> {
    let mut result = SampleSet::empty();
    for key in keys {
        let bytes: Option<Vec<u8>> = statement.query_row((key,), |row| row.get(0)).optional()?;
        if let Some(bytes) = bytes {
            result = result.union(&SampleSet::from_bytes(&bytes)?);
        }
    }
    Ok(result)
}

fn get_or_insert_sample(connection: &Connection, name: &str) -> Result<u32> {
    let mut insert = connection.prepare_cached("INSERT OR IGNORE INTO Samples(name) VALUES (?1)")?;
    insert.execute((name,))?;
    let mut get_id = connection.prepare_cached("SELECT id FROM Samples WHERE name = ?1")?;
    let id = get_id.query_row((name,), |row| row.get(0))?;
    Ok(id)
}

fn read_reference_sequences(connection: &Connection) -> Result<Vec<ReferenceSequence>> {
    let mut statement = connection.prepare("SELECT name, length FROM ReferenceSequences ORDER BY rowid")?;
    let rows = statement.query_map((), |row| Ok(ReferenceSequence { name: row.get(0)?, length: row.get(1)? }))?;
    let result = rows.collect::<rusqlite::Result<_>>()?;
    Ok(result)
}

// Checks that the database version is supported and returns it.
fn check_version(get_tag: &mut Statement) -> Result<String> {
    let version = get_string_value(get_tag, VariantBase::KEY_VERSION)?;
    if version != VariantBase::VERSION {
        return Err(Error::consistency(format!(
            "Unsupported database version: {} (expected {})", version, VariantBase::VERSION
        )));
    }
    Ok(version)
}

// Executes the statement, which is expected to return a single string value.
fn get_string_value(statement: &mut Statement, key: &str) -> Result<String> {
    let result: Option<String> = statement.query_row((key,), |row| row.get(0)).optional()?;
    result.ok_or(Error::not_found(format!("Key not found: {}", key)))
}

//-----------------------------------------------------------------------------
