//! Composable sample queries.
//!
//! A query is a chain of immutable [`QueryNode`]s.
//! Each node holds a reference to its parent, the set of samples matching the query so far, the universe of samples the query could ever match, and a message describing the operation that created it.
//! Applying a predicate to a query creates a new node whose sample set is the intersection of the parent's set and the samples matching the predicate.
//! Existing nodes are never modified, so intermediate queries can be reused and shared between threads.
//!
//! Queries come in several flavors, which all implement [`SamplesQuery`]:
//!
//! * [`BasicQuery`]: Predicates on samples and features stored in the database.
//! * [`TreeSamplesQuery`]: Adds distance-bounded and MRCA-bounded predicates over a phylogenetic tree.
//! * [`TableSamplesQuery`]: Overlays an external table of sample data onto the query.
//!
//! The flavors wrap each other, and applying a predicate to a query of some flavor returns a query of the same flavor.
//! Each flavor resolves predicates through a [`ResolverTable`] that maps [`PredicateKind`]s to resolver functions.
//!
//! # Examples
//!
//! ```
//! use variant_base::{VariantBase, MaskedRegionSet, BasicQuery, SamplesQuery};
//! use variant_base::tree::Tree;
//! use variant_base::variants::{ReferenceSequence, VariantCall};
//! use std::collections::BTreeMap;
//! use std::sync::Arc;
//!
//! let dir = tempfile::tempdir().unwrap();
//! let db_file = dir.path().join("variants.db");
//! VariantBase::create(&db_file, "reference", &[ReferenceSequence::new("chr", 100)]).unwrap();
//! let calls = vec![
//!     VariantCall::new("A", "chr", 10, "A", "T"),
//!     VariantCall::new("B", "chr", 10, "A", "T"),
//!     VariantCall::new("C", "chr", 20, "C", "G"),
//! ];
//! let masks: BTreeMap<String, MaskedRegionSet> = ["A", "B", "C"].iter()
//!     .map(|x| (x.to_string(), MaskedRegionSet::empty()))
//!     .collect();
//! VariantBase::insert(&db_file, &calls, &masks).unwrap();
//! let database = Arc::new(VariantBase::open(&db_file).unwrap());
//!
//! let query = BasicQuery::new(database);
//! let carriers = query.has("chr:10:A:T", "mutation").unwrap();
//! assert_eq!(carriers.len().unwrap(), 2);
//! assert_eq!(carriers.query_expression(), "has(chr:10:A:T)");
//!
//! let tree = Tree::from_newick("((A:0.01,B:0.02):0.1,C:0.01);").unwrap();
//! let tree_query = carriers.build_tree(Arc::new(tree), 100, "reference").unwrap();
//! let near = tree_query.within(2.0, "A", "substitutions").unwrap();
//! assert_eq!(near.len().unwrap(), 1);
//! assert_eq!(near.query_expression(), "has(chr:10:A:T) AND mutation_tree(reference) AND within(2 substitutions of A)");
//! ```

use crate::{Error, Result, SampleSet, Table, VariantBase};
use crate::tree::Tree;
use crate::tree::query::{DistanceUnit, TreeQueryEngine};
use crate::variants::QueryFeature;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Display;
use std::str::FromStr;
use std::sync::Arc;

use log::debug;

#[cfg(test)]
mod tests;

//-----------------------------------------------------------------------------

/// A node in a query chain.
///
/// The sample set of a node is always a subset of its universe and a subset of the sample set of its parent.
#[derive(Debug)]
pub struct QueryNode {
    database: Arc<VariantBase>,
    parent: Option<Arc<QueryNode>>,
    sample_set: SampleSet,
    universe: SampleSet,
    message: Option<String>,
}

impl QueryNode {
    /// Creates a root node matching every sample in the universe.
    pub fn root(database: Arc<VariantBase>, universe: SampleSet) -> Arc<Self> {
        Arc::new(QueryNode {
            database,
            parent: None,
            sample_set: universe.clone(),
            universe,
            message: None,
        })
    }

    // Creates a child node. The caller is responsible for the subset invariants.
    fn child(self: &Arc<Self>, sample_set: SampleSet, universe: SampleSet, message: String) -> Arc<Self> {
        Arc::new(QueryNode {
            database: self.database.clone(),
            parent: Some(self.clone()),
            sample_set,
            universe,
            message: Some(message),
        })
    }

    /// Returns the database.
    pub fn database(&self) -> &Arc<VariantBase> {
        &self.database
    }

    /// Returns the parent node, or [`None`] for a root node.
    pub fn parent(&self) -> Option<&Arc<QueryNode>> {
        self.parent.as_ref()
    }

    /// Returns the samples matching the query.
    pub fn sample_set(&self) -> &SampleSet {
        &self.sample_set
    }

    /// Returns the samples the query could ever match.
    pub fn universe(&self) -> &SampleSet {
        &self.universe
    }

    /// Returns the message describing the operation that created the node.
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Returns the messages of the chain from the root to this node.
    pub fn messages(&self) -> Vec<&str> {
        let mut result = Vec::new();
        let mut node = Some(self);
        while let Some(current) = node {
            if let Some(message) = current.message() {
                result.push(message);
            }
            node = current.parent().map(|x| x.as_ref());
        }
        result.reverse();
        result
    }

    /// Returns a description of the entire chain.
    pub fn expression(&self) -> String {
        self.messages().join(" AND ")
    }
}

//-----------------------------------------------------------------------------

/// Kinds of predicates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PredicateKind {
    /// Samples by name.
    Samples,
    /// Samples carrying a variant.
    Mutation,
    /// Samples carrying an MLST allele.
    Mlst,
    /// Samples within a distance of a sample in a tree.
    Distance,
    /// Samples under the most recent common ancestor of samples in a tree.
    Mrca,
}

impl PredicateKind {
    /// Returns the name of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            PredicateKind::Samples => "samples",
            PredicateKind::Mutation => "mutation",
            PredicateKind::Mlst => "mlst",
            PredicateKind::Distance => "distance",
            PredicateKind::Mrca => "mrca",
        }
    }
}

impl FromStr for PredicateKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "sample" | "samples" => Ok(PredicateKind::Samples),
            "mutation" => Ok(PredicateKind::Mutation),
            "mlst" => Ok(PredicateKind::Mlst),
            "distance" => Ok(PredicateKind::Distance),
            "mrca" => Ok(PredicateKind::Mrca),
            _ => Err(Error::invalid_argument(format!(
                "Unknown predicate kind {}, must be one of [samples, mutation, mlst, distance, mrca]", s
            ))),
        }
    }
}

impl Display for PredicateKind {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A predicate on samples.
#[derive(Clone, Debug, PartialEq)]
pub enum Predicate {
    /// Samples carrying the feature.
    Feature(QueryFeature),
    /// Samples with the given names.
    Samples(Vec<String>),
    /// Samples within the distance of the only sample in the list.
    Distance {
        samples: Vec<String>,
        distance: f64,
        unit: DistanceUnit,
    },
    /// Samples under the most recent common ancestor of the samples.
    Mrca(Vec<String>),
}

impl Predicate {
    /// Returns the kind of the predicate.
    pub fn kind(&self) -> PredicateKind {
        match self {
            Predicate::Feature(QueryFeature::Mutation(_)) => PredicateKind::Mutation,
            Predicate::Feature(QueryFeature::MlstAllele(_)) => PredicateKind::Mlst,
            Predicate::Samples(_) => PredicateKind::Samples,
            Predicate::Distance { .. } => PredicateKind::Distance,
            Predicate::Mrca(_) => PredicateKind::Mrca,
        }
    }

    fn mismatch(&self) -> Error {
        Error::invalid_argument(format!("Resolver cannot handle predicate {:?}", self))
    }
}

fn to_strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|x| x.to_string()).collect()
}

fn to_strs(values: &[String]) -> Vec<&str> {
    values.iter().map(|x| x.as_str()).collect()
}

//-----------------------------------------------------------------------------

/// A function resolving a predicate into a sample set and a message.
pub type Resolver<Q> = fn(&Q, &Predicate) -> Result<(SampleSet, String)>;

/// Resolvers for the predicate kinds supported by a query flavor.
pub struct ResolverTable<Q> {
    resolvers: BTreeMap<PredicateKind, Resolver<Q>>,
}

impl<Q> ResolverTable<Q> {
    /// Creates an empty table.
    pub fn new() -> Self {
        ResolverTable { resolvers: BTreeMap::new() }
    }

    /// Registers a resolver for the kind, replacing any earlier resolver.
    pub fn register(&mut self, kind: PredicateKind, resolver: Resolver<Q>) {
        self.resolvers.insert(kind, resolver);
    }

    /// Returns the resolver for the kind.
    pub fn get(&self, kind: PredicateKind) -> Option<Resolver<Q>> {
        self.resolvers.get(&kind).copied()
    }

    /// Returns the registered kinds in sorted order.
    pub fn kinds(&self) -> Vec<PredicateKind> {
        self.resolvers.keys().copied().collect()
    }
}

impl<Q> Default for ResolverTable<Q> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Q> std::fmt::Debug for ResolverTable<Q> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_list().entries(self.resolvers.keys()).finish()
    }
}

// Resolvers for the predicates every flavor supports.

fn resolve_samples<Q: SamplesQuery>(query: &Q, predicate: &Predicate) -> Result<(SampleSet, String)> {
    let names = match predicate {
        Predicate::Samples(names) => names,
        _ => return Err(predicate.mismatch()),
    };
    let samples = query.database().sample_ids(&to_strs(names))?;
    Ok((samples, format!("isin_samples([{}])", names.join(", "))))
}

fn resolve_feature<Q: SamplesQuery>(query: &Q, predicate: &Predicate) -> Result<(SampleSet, String)> {
    let feature = match predicate {
        Predicate::Feature(feature) => feature,
        _ => return Err(predicate.mismatch()),
    };
    let samples = query.database().samples_with_feature(feature)?;
    Ok((samples, format!("has({})", feature)))
}

//-----------------------------------------------------------------------------

/// Column identifying the samples in a table joined to a query.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SampleColumn {
    /// The named column contains sample identifiers.
    Ids(String),
    /// The named column contains sample names.
    Names(String),
}

/// The interface shared by all query flavors.
///
/// A flavor must provide access to its current [`QueryNode`], a way of wrapping a new node into a query of the same flavor, and its [`ResolverTable`].
/// Everything else is provided.
pub trait SamplesQuery: Sized + Clone {
    /// Returns the current node.
    fn node(&self) -> &Arc<QueryNode>;

    /// Returns a query of the same flavor for the node, carrying the flavor state forward.
    fn with_node(&self, node: Arc<QueryNode>) -> Self;

    /// Returns the resolvers of the flavor.
    fn resolvers(&self) -> &ResolverTable<Self>;

    /// Returns `true` if an external table has been joined to the query.
    fn has_table_overlay(&self) -> bool {
        false
    }

    /// Returns a table with columns `Query`, `Sample Name`, and `Sample ID` for the matching samples, ordered by identifier.
    fn to_table(&self) -> Result<Table> {
        query_table(self.node())
    }

    /// Returns the database.
    fn database(&self) -> &Arc<VariantBase> {
        self.node().database()
    }

    /// Returns the samples matching the query.
    fn sample_set(&self) -> &SampleSet {
        self.node().sample_set()
    }

    /// Returns the samples the query could ever match.
    fn universe(&self) -> &SampleSet {
        self.node().universe()
    }

    /// Returns the identifiers of the matching samples in ascending order.
    fn sample_ids(&self) -> Vec<u32> {
        self.sample_set().resolve(self.database().all_samples()).iter().collect()
    }

    /// Returns the number of matching samples.
    fn len(&self) -> Result<usize> {
        Ok(self.sample_set().resolve(self.database().all_samples()).len() as usize)
    }

    /// Returns `true` if no samples match the query.
    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Returns the operations in the chain joined with ` AND `.
    fn query_expression(&self) -> String {
        self.node().expression()
    }

    /// Returns a new query matching the samples in both this query and the given set.
    fn intersect(&self, samples: &SampleSet, message: &str) -> Self {
        let node = self.node();
        let sample_set = node.sample_set().intersection(samples);
        self.with_node(node.child(sample_set, node.universe().clone(), message.to_string()))
    }

    /// Resolves the predicate into a sample set and a message without applying it.
    ///
    /// Returns [`Error::UnsupportedOperation`] if the flavor does not support the kind of the predicate.
    fn resolve(&self, predicate: &Predicate) -> Result<(SampleSet, String)> {
        let kind = predicate.kind();
        let resolver = self.resolvers().get(kind).ok_or_else(|| {
            let kinds: Vec<&str> = self.resolvers().kinds().iter().map(|x| x.as_str()).collect();
            Error::unsupported(format!("Predicate kind {} is not supported by this query, must be one of {:?}", kind, kinds))
        })?;
        resolver(self, predicate)
    }

    /// Returns a new query restricted to the samples matching the predicate.
    fn isin_predicate(&self, predicate: &Predicate) -> Result<Self> {
        let (samples, message) = self.resolve(predicate)?;
        debug!("Predicate {} matches {} samples", message, samples.len().unwrap_or_default());
        Ok(self.intersect(&samples, &message))
    }

    /// Returns a new query restricted by a predicate of the named kind.
    ///
    /// Kind `samples` and `mrca` use all values, while `mutation` and `mlst` expect a single feature.
    /// Distance predicates need a distance and a unit and must be applied with [`SamplesQuery::within`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the kind is unknown or the data does not fit the kind.
    /// Returns [`Error::UnsupportedOperation`] if the flavor does not support the kind.
    fn isin(&self, data: &[&str], kind: &str) -> Result<Self> {
        let kind: PredicateKind = kind.parse()?;
        let predicate = match kind {
            PredicateKind::Samples => Predicate::Samples(to_strings(data)),
            PredicateKind::Mrca => Predicate::Mrca(to_strings(data)),
            PredicateKind::Mutation | PredicateKind::Mlst => {
                let feature = match data {
                    [feature] => *feature,
                    _ => return Err(Error::invalid_argument(format!("Expected a single {} feature, got {:?}", kind, data))),
                };
                Predicate::Feature(QueryFeature::parse(feature, kind.as_str())?)
            },
            PredicateKind::Distance => {
                return Err(Error::invalid_argument("Distance predicates need a distance and a unit"));
            },
        };
        self.isin_predicate(&predicate)
    }

    /// Returns a new query restricted to the named samples.
    fn isin_samples(&self, names: &[&str]) -> Result<Self> {
        self.isin_predicate(&Predicate::Samples(to_strings(names)))
    }

    /// Returns a new query restricted to the samples carrying the feature of the given kind (`mutation` or `mlst`).
    fn has(&self, feature: &str, kind: &str) -> Result<Self> {
        let feature = QueryFeature::parse(feature, kind)?;
        self.isin_predicate(&Predicate::Feature(feature))
    }

    /// Returns a new query restricted to the samples within the distance of the sample.
    ///
    /// The unit must be `substitutions` or `substitutions/site`.
    fn within(&self, distance: f64, sample: &str, unit: &str) -> Result<Self> {
        let unit: DistanceUnit = unit.parse()?;
        self.isin_predicate(&Predicate::Distance { samples: vec![sample.to_string()], distance, unit })
    }

    /// Returns a new query restricted to the samples under the most recent common ancestor of the samples.
    fn within_mrca(&self, samples: &[&str]) -> Result<Self> {
        self.isin_predicate(&Predicate::Mrca(to_strings(samples)))
    }

    /// Returns a new query matching the samples in both queries.
    ///
    /// Returns [`Error::InvalidArgument`] if the queries use different databases.
    fn and<T: SamplesQuery>(&self, other: &T) -> Result<Self> {
        if !Arc::ptr_eq(self.database(), other.database()) {
            return Err(Error::invalid_argument("Cannot combine queries over different databases"));
        }
        Ok(self.intersect(other.sample_set(), &format!("and({})", other.query_expression())))
    }

    /// Returns a new query matching the samples in the universe that do not match this query.
    ///
    /// The result starts a new chain, as its sample set is not a subset of the current one.
    fn complement(&self) -> Self {
        let node = self.node();
        let sample_set = node.sample_set().complement(node.universe());
        let root = Arc::new(QueryNode {
            database: node.database().clone(),
            parent: None,
            sample_set,
            universe: node.universe().clone(),
            message: Some(format!("NOT({})", node.expression())),
        });
        self.with_node(root)
    }

    /// Builds a tree query over the samples in both this query and the tree.
    ///
    /// The universe of the new query is restricted to the samples in the tree.
    fn build_tree(&self, tree: Arc<Tree>, alignment_length: usize, reference: &str) -> Result<TreeSamplesQuery<Self>> {
        TreeSamplesQuery::new(self, TreeQueryEngine::new(tree, alignment_length), reference)
    }

    /// Joins an external table to the query.
    ///
    /// The query is restricted to the samples in the table.
    /// Rows with sample names that are not in the database are dropped.
    ///
    /// # Errors
    ///
    /// * [`Error::UnsupportedOperation`]: The query already has a table overlay.
    /// * [`Error::NotFound`]: The sample column does not exist.
    /// * [`Error::InvalidArgument`]: A sample identifier is not a number, or there is no free name for the identifier column.
    fn join(&self, table: Table, column: SampleColumn) -> Result<TableSamplesQuery<Self>> {
        TableSamplesQuery::new(self, table, column)
    }
}

//-----------------------------------------------------------------------------

// Column names in query tables.
const QUERY_COLUMN: &str = "Query";
const NAME_COLUMN: &str = "Sample Name";
const ID_COLUMN: &str = "Sample ID";
const ALTERNATE_ID_COLUMN: &str = "Sample ID_gdi";

// Suffix for overlay columns with the same name as a query column.
const OVERLAY_SUFFIX: &str = "_table";

fn query_table(node: &QueryNode) -> Result<Table> {
    let expression = node.expression();
    let samples = node.database().sample_names(node.sample_set())?;
    let columns = vec![QUERY_COLUMN.to_string(), NAME_COLUMN.to_string(), ID_COLUMN.to_string()];
    let rows = samples.into_iter().map(|(id, name)| vec![expression.clone(), name, id.to_string()]).collect();
    Table::new(columns, rows)
}

//-----------------------------------------------------------------------------

/// A query over the samples and features in the database.
#[derive(Clone, Debug)]
pub struct BasicQuery {
    node: Arc<QueryNode>,
    resolvers: Arc<ResolverTable<BasicQuery>>,
}

impl BasicQuery {
    /// Creates a query matching every sample in the database.
    pub fn new(database: Arc<VariantBase>) -> Self {
        Self::with_universe(database, SampleSet::all())
    }

    /// Creates a query matching every sample in the given universe.
    pub fn with_universe(database: Arc<VariantBase>, universe: SampleSet) -> Self {
        let mut resolvers: ResolverTable<Self> = ResolverTable::new();
        resolvers.register(PredicateKind::Samples, resolve_samples::<BasicQuery>);
        resolvers.register(PredicateKind::Mutation, resolve_feature::<BasicQuery>);
        resolvers.register(PredicateKind::Mlst, resolve_feature::<BasicQuery>);
        BasicQuery {
            node: QueryNode::root(database, universe),
            resolvers: Arc::new(resolvers),
        }
    }
}

impl SamplesQuery for BasicQuery {
    fn node(&self) -> &Arc<QueryNode> {
        &self.node
    }

    fn with_node(&self, node: Arc<QueryNode>) -> Self {
        BasicQuery { node, resolvers: self.resolvers.clone() }
    }

    fn resolvers(&self) -> &ResolverTable<Self> {
        &self.resolvers
    }
}

//-----------------------------------------------------------------------------

/// A query with a phylogenetic tree over the samples.
///
/// Adds predicate kinds `distance` and `mrca`.
/// Other predicates are resolved by the wrapped query.
#[derive(Clone, Debug)]
pub struct TreeSamplesQuery<Q: SamplesQuery> {
    inner: Q,
    engine: TreeQueryEngine,
    reference: String,
    resolvers: Arc<ResolverTable<TreeSamplesQuery<Q>>>,
}

impl<Q: SamplesQuery> TreeSamplesQuery<Q> {
    fn new(query: &Q, engine: TreeQueryEngine, reference: &str) -> Result<Self> {
        let node = query.node();
        let tree_samples = engine.tree_samples(&query.database().sample_name_ids()?);
        debug!("{} database samples in the tree", tree_samples.len().unwrap_or_default());
        let inner = query.with_node(node.child(
            node.sample_set().intersection(&tree_samples),
            node.universe().intersection(&tree_samples),
            format!("mutation_tree({})", reference),
        ));

        let mut resolvers: ResolverTable<Self> = ResolverTable::new();
        for kind in query.resolvers().kinds() {
            resolvers.register(kind, Self::delegate);
        }
        resolvers.register(PredicateKind::Distance, Self::resolve_distance);
        resolvers.register(PredicateKind::Mrca, Self::resolve_mrca);

        Ok(TreeSamplesQuery { inner, engine, reference: reference.to_string(), resolvers: Arc::new(resolvers) })
    }

    /// Returns the wrapped query.
    pub fn inner(&self) -> &Q {
        &self.inner
    }

    /// Returns the tree.
    pub fn tree(&self) -> &Tree {
        self.engine.tree()
    }

    /// Returns the alignment length the tree was built from.
    pub fn alignment_length(&self) -> usize {
        self.engine.alignment_length()
    }

    /// Returns the name of the reference genome.
    pub fn reference_name(&self) -> &str {
        &self.reference
    }

    fn delegate(query: &Self, predicate: &Predicate) -> Result<(SampleSet, String)> {
        query.inner.resolve(predicate)
    }

    fn resolve_distance(query: &Self, predicate: &Predicate) -> Result<(SampleSet, String)> {
        let (samples, distance, unit) = match predicate {
            Predicate::Distance { samples, distance, unit } => (samples, *distance, *unit),
            _ => return Err(predicate.mismatch()),
        };
        let known = query.database().sample_name_ids()?;
        let result = query.engine.within_distance(&to_strs(samples), distance, unit, &known)?;
        Ok((result, format!("within({} {} of {})", distance, unit, samples.join(", "))))
    }

    fn resolve_mrca(query: &Self, predicate: &Predicate) -> Result<(SampleSet, String)> {
        let samples = match predicate {
            Predicate::Mrca(samples) => samples,
            _ => return Err(predicate.mismatch()),
        };
        let known = query.database().sample_name_ids()?;
        let result = query.engine.within_mrca(&to_strs(samples), &known)?;
        Ok((result, format!("within(mrca of [{}])", samples.join(", "))))
    }
}

impl<Q: SamplesQuery> SamplesQuery for TreeSamplesQuery<Q> {
    fn node(&self) -> &Arc<QueryNode> {
        self.inner.node()
    }

    fn with_node(&self, node: Arc<QueryNode>) -> Self {
        TreeSamplesQuery {
            inner: self.inner.with_node(node),
            engine: self.engine.clone(),
            reference: self.reference.clone(),
            resolvers: self.resolvers.clone(),
        }
    }

    fn resolvers(&self) -> &ResolverTable<Self> {
        &self.resolvers
    }

    fn has_table_overlay(&self) -> bool {
        self.inner.has_table_overlay()
    }

    fn to_table(&self) -> Result<Table> {
        self.inner.to_table()
    }
}

//-----------------------------------------------------------------------------

/// A query with an external table of sample data.
///
/// The table is joined to the query table with inner-join semantics in [`SamplesQuery::to_table`].
/// A query can have at most one table overlay.
#[derive(Clone, Debug)]
pub struct TableSamplesQuery<Q: SamplesQuery> {
    inner: Q,
    table: Arc<Table>,
    id_column: String,
    resolvers: Arc<ResolverTable<TableSamplesQuery<Q>>>,
}

impl<Q: SamplesQuery> TableSamplesQuery<Q> {
    fn new(query: &Q, table: Table, column: SampleColumn) -> Result<Self> {
        if query.has_table_overlay() {
            return Err(Error::unsupported("The query already has a table overlay"));
        }

        let (table, id_column, message) = match column {
            SampleColumn::Ids(name) => {
                for value in table.column_values(&name)? {
                    if value.parse::<u32>().is_err() {
                        return Err(Error::invalid_argument(format!("Invalid sample identifier {} in column {}", value, name)));
                    }
                }
                let message = format!("join(ids_col=[{}])", name);
                (table, name, message)
            },
            SampleColumn::Names(name) => {
                let id_column = [ID_COLUMN, ALTERNATE_ID_COLUMN].into_iter()
                    .find(|x| table.column_index(x).is_none())
                    .ok_or(Error::invalid_argument(format!(
                        "Table already has columns {} and {}", ID_COLUMN, ALTERNATE_ID_COLUMN
                    )))?;
                let name_ids = query.database().sample_name_ids()?;
                let index = table.column_index(&name).ok_or(Error::not_found(format!("No column {} in the table", name)))?;
                let resolved = table.filter(|row| name_ids.contains_key(&row[index]));
                if resolved.len() < table.len() {
                    debug!("Dropped {} table rows with unknown sample names", table.len() - resolved.len());
                }
                let ids = resolved.rows().iter().map(|row| name_ids[&row[index]].to_string()).collect();
                let message = format!("join(names_col=[{}])", name);
                (resolved.with_column(id_column, ids)?, id_column.to_string(), message)
            },
        };

        let mut table_samples: BTreeSet<u32> = BTreeSet::new();
        for value in table.column_values(&id_column)? {
            if let Ok(id) = value.parse::<u32>() {
                table_samples.insert(id);
            }
        }
        let table_samples = SampleSet::from_ids(table_samples);
        let node = query.node();
        let inner = query.with_node(node.child(
            node.sample_set().intersection(&table_samples),
            node.universe().intersection(&table_samples),
            message,
        ));

        let mut resolvers: ResolverTable<Self> = ResolverTable::new();
        for kind in query.resolvers().kinds() {
            resolvers.register(kind, Self::delegate);
        }

        Ok(TableSamplesQuery { inner, table: Arc::new(table), id_column, resolvers: Arc::new(resolvers) })
    }

    /// Returns the wrapped query.
    pub fn inner(&self) -> &Q {
        &self.inner
    }

    /// Returns the joined table, including the identifier column added for a join by names.
    pub fn table(&self) -> &Table {
        &self.table
    }

    /// Returns the name of the column with sample identifiers in the joined table.
    pub fn id_column(&self) -> &str {
        &self.id_column
    }

    fn delegate(query: &Self, predicate: &Predicate) -> Result<(SampleSet, String)> {
        query.inner.resolve(predicate)
    }
}

impl<Q: SamplesQuery> SamplesQuery for TableSamplesQuery<Q> {
    fn node(&self) -> &Arc<QueryNode> {
        self.inner.node()
    }

    fn with_node(&self, node: Arc<QueryNode>) -> Self {
        TableSamplesQuery {
            inner: self.inner.with_node(node),
            table: self.table.clone(),
            id_column: self.id_column.clone(),
            resolvers: self.resolvers.clone(),
        }
    }

    fn resolvers(&self) -> &ResolverTable<Self> {
        &self.resolvers
    }

    fn has_table_overlay(&self) -> bool {
        true
    }

    /// Returns the query table joined with the overlay table.
    ///
    /// Query columns come first.
    /// An overlay identifier column named `Sample ID` is merged with the query column, and other overlay columns with the same name as a query column get suffix `_table`.
    fn to_table(&self) -> Result<Table> {
        let query = self.inner.to_table()?;
        let query_id = query.column_index(ID_COLUMN).ok_or(Error::not_found(format!("No column {} in the query table", ID_COLUMN)))?;
        let overlay_id = self.table.column_index(&self.id_column).ok_or(
            Error::not_found(format!("No column {} in the joined table", self.id_column))
        )?;

        let mut columns: Vec<String> = query.columns().to_vec();
        let mut kept: Vec<usize> = Vec::new();
        for (index, name) in self.table.columns().iter().enumerate() {
            if index == overlay_id && name == ID_COLUMN {
                continue;
            }
            if query.columns().contains(name) {
                columns.push(format!("{}{}", name, OVERLAY_SUFFIX));
            } else {
                columns.push(name.clone());
            }
            kept.push(index);
        }

        let mut overlay_rows: BTreeMap<&str, Vec<&Vec<String>>> = BTreeMap::new();
        for row in self.table.rows() {
            overlay_rows.entry(row[overlay_id].as_str()).or_default().push(row);
        }
        let mut rows = Vec::new();
        for row in query.rows() {
            if let Some(matches) = overlay_rows.get(row[query_id].as_str()) {
                for overlay in matches {
                    let mut joined = row.clone();
                    joined.extend(kept.iter().map(|x| overlay[*x].clone()));
                    rows.push(joined);
                }
            }
        }
        Table::new(columns, rows)
    }
}

//-----------------------------------------------------------------------------
