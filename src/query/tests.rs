use super::*;

use crate::internal::{create_test_db, open_test_db};
use crate::utils;

use std::collections::BTreeMap;

//-----------------------------------------------------------------------------

struct Fixture {
    // Keeps the database file alive.
    _dir: tempfile::TempDir,
    database: Arc<VariantBase>,
    name_ids: BTreeMap<String, u32>,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let db_file = create_test_db(&dir);
        let database = Arc::new(open_test_db(&db_file));
        let name_ids = database.sample_name_ids().unwrap();
        Fixture { _dir: dir, database, name_ids }
    }

    fn query(&self) -> BasicQuery {
        BasicQuery::new(self.database.clone())
    }

    fn ids(&self, names: &[&str]) -> Vec<u32> {
        let mut result: Vec<u32> = names.iter().map(|name| self.name_ids[*name]).collect();
        result.sort_unstable();
        result
    }
}

fn test_tree() -> Arc<Tree> {
    let tree = Tree::from_file(utils::get_test_data("tree.nwk"));
    assert!(tree.is_ok(), "Failed to read the tree: {}", tree.unwrap_err());
    Arc::new(tree.unwrap())
}

fn metadata() -> Table {
    let table = Table::from_file(utils::get_test_data("metadata.tsv"));
    assert!(table.is_ok(), "Failed to read the table: {}", table.unwrap_err());
    table.unwrap()
}

fn new_table(columns: &[&str], rows: &[&[&str]]) -> Table {
    let columns = columns.iter().map(|x| x.to_string()).collect();
    let rows = rows.iter().map(|row| row.iter().map(|x| x.to_string()).collect()).collect();
    Table::new(columns, rows).unwrap()
}

fn check<Q: SamplesQuery>(result: Result<Q>, truth: &[u32], expression: &str) -> Q {
    assert!(result.is_ok(), "Query {} failed: {}", expression, result.as_ref().err().unwrap());
    let query = result.unwrap();
    assert_eq!(query.sample_ids(), truth, "Wrong samples for {}", expression);
    assert_eq!(query.len().unwrap(), truth.len(), "Wrong length for {}", expression);
    assert_eq!(query.query_expression(), expression, "Wrong expression");
    query
}

// Checks that every node in the chain is a subset of its parent and its universe.
fn check_chain(node: &QueryNode, known: &roaring::RoaringBitmap) {
    let samples = node.sample_set().resolve(known);
    assert!(samples.is_subset(&node.universe().resolve(known)), "Node {:?} is not within its universe", node.message());
    if let Some(parent) = node.parent() {
        assert!(samples.is_subset(&parent.sample_set().resolve(known)), "Node {:?} is not within its parent", node.message());
        check_chain(parent, known);
    }
}

//-----------------------------------------------------------------------------

#[test]
fn predicate_kinds() {
    let kinds = [
        ("samples", PredicateKind::Samples),
        ("sample", PredicateKind::Samples),
        ("mutation", PredicateKind::Mutation),
        ("mlst", PredicateKind::Mlst),
        ("distance", PredicateKind::Distance),
        ("mrca", PredicateKind::Mrca),
    ];
    for (name, truth) in kinds {
        assert_eq!(name.parse::<PredicateKind>().unwrap(), truth, "Wrong kind for {}", name);
    }
    let result = "color".parse::<PredicateKind>();
    assert!(matches!(result, Err(Error::InvalidArgument(ref message)) if message.contains("color")), "Accepted an unknown kind");

    let predicate = Predicate::Feature(QueryFeature::parse("ecoli:adk:100", "mlst").unwrap());
    assert_eq!(predicate.kind(), PredicateKind::Mlst);
    let predicate = Predicate::Distance { samples: vec![String::from("A")], distance: 1.0, unit: DistanceUnit::Substitutions };
    assert_eq!(predicate.kind(), PredicateKind::Distance);
}

#[test]
fn basic_chain() {
    let fixture = Fixture::new();
    let query = check(Ok(fixture.query()), &fixture.ids(&["SampleA", "SampleB", "SampleC"]), "");
    assert!(query.sample_set().is_all(), "The initial query is not co-finite");

    let deletion = check(
        query.has("contig1:30:AC:A", "mutation"),
        &fixture.ids(&["SampleA", "SampleC"]),
        "has(contig1:30:AC:A)"
    );
    let narrowed = check(
        deletion.isin_samples(&["SampleA", "SampleB"]),
        &fixture.ids(&["SampleA"]),
        "has(contig1:30:AC:A) AND isin_samples([SampleA, SampleB])"
    );
    check_chain(narrowed.node(), fixture.database.all_samples());
    assert_eq!(narrowed.node().messages().len(), 2, "Wrong number of messages");

    // Earlier queries are not modified.
    assert_eq!(deletion.sample_ids(), fixture.ids(&["SampleA", "SampleC"]), "The parent query changed");
    assert_eq!(query.len().unwrap(), 3, "The root query changed");

    let empty = check(
        narrowed.isin(&["contig2:50:G:GA"], "mutation"),
        &[],
        "has(contig1:30:AC:A) AND isin_samples([SampleA, SampleB]) AND has(contig2:50:G:GA)"
    );
    assert!(empty.is_empty().unwrap(), "The query is not empty");
    let missing = query.has("contig1:21:C:G", "mutation").unwrap();
    assert!(missing.is_empty().unwrap(), "Found samples with a missing variant");
}

#[test]
fn mlst_predicates() {
    let fixture = Fixture::new();
    let query = fixture.query();
    check(query.has("ecoli:adk:100", "mlst"), &fixture.ids(&["SampleA", "SampleB"]), "has(ecoli:adk:100)");
    check(query.isin(&["ecoli:fumC:?"], "mlst"), &fixture.ids(&["SampleB"]), "has(ecoli:fumC:?)");
    check(query.has("ecoli:adk:101", "mlst"), &fixture.ids(&["SampleC"]), "has(ecoli:adk:101)");
}

#[test]
fn invalid_predicates() {
    let fixture = Fixture::new();
    let query = fixture.query();

    let result = query.isin(&["SampleA"], "color");
    assert!(matches!(result, Err(Error::InvalidArgument(_))), "Accepted an unknown kind");
    let result = query.isin(&["SampleA"], "distance");
    assert!(matches!(result, Err(Error::InvalidArgument(_))), "Accepted a distance predicate without a distance");
    let result = query.isin(&["contig1:20:A:T", "contig2:50:G:GA"], "mutation");
    assert!(matches!(result, Err(Error::InvalidArgument(_))), "Accepted multiple features");
    let result = query.has("contig1:20", "mutation");
    assert!(matches!(result, Err(Error::InvalidArgument(_))), "Accepted a malformed feature");
    let result = query.isin_samples(&["SampleA", "SampleX"]);
    assert!(matches!(result, Err(Error::NotFound(ref message)) if message.contains("SampleX")), "Accepted an unknown sample");

    // Tree predicates need a tree.
    let result = query.within(5.0, "SampleA", "substitutions");
    assert!(matches!(result, Err(Error::UnsupportedOperation(_))), "Accepted a distance predicate without a tree");
    let result = query.within_mrca(&["SampleA", "SampleB"]);
    assert!(matches!(result, Err(Error::UnsupportedOperation(_))), "Accepted an MRCA predicate without a tree");
}

#[test]
fn and_and_complement() {
    let fixture = Fixture::new();
    let query = fixture.query();
    let snp = query.has("contig2:97:C:G", "mutation").unwrap();
    let samples = query.isin_samples(&["SampleB", "SampleC"]).unwrap();
    let both = check(
        snp.and(&samples),
        &fixture.ids(&["SampleC"]),
        "has(contig2:97:C:G) AND and(isin_samples([SampleB, SampleC]))"
    );
    check_chain(both.node(), fixture.database.all_samples());

    let complement = snp.complement();
    assert_eq!(complement.sample_ids(), fixture.ids(&["SampleB"]), "Wrong complement");
    assert_eq!(complement.query_expression(), "NOT(has(contig2:97:C:G))", "Wrong complement expression");
    assert!(complement.node().parent().is_none(), "Complement is not a new chain");
    assert_eq!(complement.complement().sample_ids(), snp.sample_ids(), "Double complement changed the samples");

    let other_database = Arc::new(VariantBase::open(fixture.database.filename().unwrap()).unwrap());
    let other = BasicQuery::new(other_database);
    let result = snp.and(&other);
    assert!(matches!(result, Err(Error::InvalidArgument(_))), "Combined queries over different databases");
}

#[test]
fn query_table() {
    let fixture = Fixture::new();
    let query = fixture.query().has("contig1:30:AC:A", "mutation").unwrap();
    let table = query.to_table();
    assert!(table.is_ok(), "Failed to build the table: {}", table.unwrap_err());
    let table = table.unwrap();
    assert_eq!(table.columns(), &["Query", "Sample Name", "Sample ID"]);
    let truth: Vec<Vec<String>> = ["SampleA", "SampleC"].iter().map(|name| {
        vec![String::from("has(contig1:30:AC:A)"), name.to_string(), fixture.name_ids[*name].to_string()]
    }).collect();
    assert_eq!(table.rows(), truth.as_slice(), "Wrong rows");
}

//-----------------------------------------------------------------------------

#[test]
fn explicit_intersections() {
    let fixture = Fixture::new();
    let first = SampleSet::from_ids(fixture.ids(&["SampleA", "SampleB"]));
    let second = SampleSet::all().difference(&SampleSet::from_ids(fixture.ids(&["SampleA"])));
    let known = fixture.database.all_samples();

    let query = fixture.query();
    let narrowed = query.intersect(&first, "first").intersect(&second, "second");
    let truth = query.sample_set().intersection(&first).intersection(&second);
    assert_eq!(narrowed.sample_set().resolve(known), truth.resolve(known), "Wrong samples after two intersections");
    check(Ok(narrowed.clone()), &fixture.ids(&["SampleB"]), "first AND second");
    check_chain(narrowed.node(), known);

    let tree_query = fixture.query().build_tree(test_tree(), 100, "reference").unwrap();
    let narrowed = tree_query.intersect(&first, "first").intersect(&second, "second");
    let truth = tree_query.sample_set().intersection(&first).intersection(&second);
    assert_eq!(narrowed.sample_set().resolve(known), truth.resolve(known), "Wrong tree samples after two intersections");
    check(Ok(narrowed.clone()), &fixture.ids(&["SampleB"]), "mutation_tree(reference) AND first AND second");
    check_chain(narrowed.node(), known);

    // The flavor survives explicit intersections.
    let near = narrowed.within(11.0, "SampleA", "substitutions");
    check(near, &fixture.ids(&["SampleB"]), "mutation_tree(reference) AND first AND second AND within(11 substitutions of SampleA)");
}

#[test]
fn tree_queries() {
    let fixture = Fixture::new();
    let tree_query = fixture.query().build_tree(test_tree(), 100, "reference");
    let tree_query = check(tree_query, &fixture.ids(&["SampleA", "SampleB", "SampleC"]), "mutation_tree(reference)");
    assert_eq!(tree_query.reference_name(), "reference");
    assert_eq!(tree_query.alignment_length(), 100);
    assert_eq!(tree_query.tree().leaf_names().len(), 5);

    // Distances from SampleA: C 3, B 11.
    let near = check(
        tree_query.within(3.5, "SampleA", "substitutions"),
        &fixture.ids(&["SampleA", "SampleC"]),
        "mutation_tree(reference) AND within(3.5 substitutions of SampleA)"
    );
    let per_site = tree_query.within(0.035, "SampleA", "substitutions/site").unwrap();
    assert_eq!(per_site.sample_ids(), near.sample_ids(), "Different results for different units");
    check_chain(near.node(), fixture.database.all_samples());

    check(
        tree_query.within_mrca(&["SampleA", "SampleB"]),
        &fixture.ids(&["SampleA", "SampleB", "SampleC"]),
        "mutation_tree(reference) AND within(mrca of [SampleA, SampleB])"
    );
    check(
        tree_query.isin(&["SampleA", "SampleC"], "mrca"),
        &fixture.ids(&["SampleA", "SampleC"]),
        "mutation_tree(reference) AND within(mrca of [SampleA, SampleC])"
    );

    // Predicates from the wrapped query still work, and the flavor is preserved.
    let chained = tree_query.has("contig1:20:A:T", "mutation").unwrap().within(3.5, "SampleC", "substitutions");
    check(
        chained,
        &fixture.ids(&["SampleA", "SampleC"]),
        "mutation_tree(reference) AND has(contig1:20:A:T) AND within(3.5 substitutions of SampleC)"
    );
}

#[test]
fn tree_universe() {
    let fixture = Fixture::new();
    let tree = Arc::new(Tree::from_newick("(SampleA:0.01,SampleB:0.01,Other:0.5);").unwrap());
    let tree_query = fixture.query().build_tree(tree, 100, "reference").unwrap();
    assert_eq!(tree_query.sample_ids(), fixture.ids(&["SampleA", "SampleB"]), "Wrong tree samples");
    assert_eq!(tree_query.universe().resolve(fixture.database.all_samples()).len(), 2, "Universe was not restricted to the tree");

    let anchor = tree_query.within(0.0, "SampleA", "substitutions").unwrap();
    assert_eq!(anchor.sample_ids(), fixture.ids(&["SampleA"]));
    assert_eq!(anchor.complement().sample_ids(), fixture.ids(&["SampleB"]), "Complement escaped the tree universe");
}

#[test]
fn tree_query_errors() {
    let fixture = Fixture::new();
    let tree_query = fixture.query().build_tree(test_tree(), 100, "reference").unwrap();

    let result = tree_query.within(1.0, "SampleX", "substitutions");
    assert!(matches!(result, Err(Error::AmbiguousMatch(_))), "Accepted a sample missing from the tree");
    let result = tree_query.within(1.0, "SampleA", "sites");
    assert!(matches!(result, Err(Error::InvalidArgument(_))), "Accepted an invalid unit");
    let predicate = Predicate::Distance {
        samples: vec![String::from("SampleA"), String::from("SampleB")],
        distance: 1.0,
        unit: DistanceUnit::Substitutions,
    };
    let result = tree_query.isin_predicate(&predicate);
    assert!(matches!(result, Err(Error::UnsupportedOperation(_))), "Accepted a distance from multiple samples");
    let result = tree_query.within_mrca(&[]);
    assert!(matches!(result, Err(Error::InvalidArgument(_))), "Accepted an MRCA of no samples");
}

//-----------------------------------------------------------------------------

#[test]
fn join_by_names() {
    let fixture = Fixture::new();
    let joined = fixture.query().join(metadata(), SampleColumn::Names(String::from("Strain")));
    let joined = check(joined, &fixture.ids(&["SampleA", "SampleB"]), "join(names_col=[Strain])");
    assert!(joined.has_table_overlay(), "No table overlay");
    assert_eq!(joined.id_column(), "Sample ID");
    assert_eq!(joined.table().len(), 2, "Unknown sample names were not dropped");

    let table = joined.to_table().unwrap();
    assert_eq!(table.columns(), &["Query", "Sample Name", "Sample ID", "Strain", "Color"]);
    assert_eq!(table.column_values("Color").unwrap(), vec!["red", "blue"]);

    let insertion = check(
        joined.has("contig2:50:G:GA", "mutation"),
        &fixture.ids(&["SampleB"]),
        "join(names_col=[Strain]) AND has(contig2:50:G:GA)"
    );
    let table = insertion.to_table().unwrap();
    assert_eq!(table.len(), 1);
    assert_eq!(table.rows()[0][1], "SampleB");
    assert_eq!(table.rows()[0][4], "blue");

    let result = insertion.join(metadata(), SampleColumn::Names(String::from("Strain")));
    assert!(matches!(result, Err(Error::UnsupportedOperation(_))), "Joined a second table");
}

#[test]
fn join_by_ids() {
    let fixture = Fixture::new();
    let a = fixture.name_ids["SampleA"].to_string();
    let c = fixture.name_ids["SampleC"].to_string();
    let (a, c) = (a.as_str(), c.as_str());
    let overlay = new_table(&["id", "Value"], &[&[c, "3"], &[a, "1"], &[a, "2"]]);
    let joined = fixture.query().join(overlay, SampleColumn::Ids(String::from("id")));
    let joined = check(joined, &fixture.ids(&["SampleA", "SampleC"]), "join(ids_col=[id])");

    // Query order first, then overlay order for each sample.
    let table = joined.to_table().unwrap();
    assert_eq!(table.columns(), &["Query", "Sample Name", "Sample ID", "id", "Value"]);
    assert_eq!(table.column_values("Value").unwrap(), vec!["1", "2", "3"]);

    let overlay = new_table(&["Sample ID", "Value"], &[&[a, "1"]]);
    let joined = fixture.query().join(overlay, SampleColumn::Ids(String::from("Sample ID"))).unwrap();
    let table = joined.to_table().unwrap();
    assert_eq!(table.columns(), &["Query", "Sample Name", "Sample ID", "Value"], "Identifier columns were not merged");

    let invalid = new_table(&["id"], &[&["x"]]);
    let result = fixture.query().join(invalid, SampleColumn::Ids(String::from("id")));
    assert!(matches!(result, Err(Error::InvalidArgument(_))), "Accepted an invalid identifier");
    let result = fixture.query().join(metadata(), SampleColumn::Ids(String::from("id")));
    assert!(matches!(result, Err(Error::NotFound(_))), "Accepted a missing column");
}

#[test]
fn join_column_names() {
    let fixture = Fixture::new();
    let overlay = new_table(&["Strain", "Sample ID"], &[&["SampleC", "x"]]);
    let joined = fixture.query().join(overlay, SampleColumn::Names(String::from("Strain"))).unwrap();
    assert_eq!(joined.id_column(), "Sample ID_gdi");
    let table = joined.to_table().unwrap();
    assert_eq!(table.columns(), &["Query", "Sample Name", "Sample ID", "Strain", "Sample ID_table", "Sample ID_gdi"]);
    assert_eq!(table.rows()[0][4], "x");

    let overlay = new_table(&["Strain", "Sample ID", "Sample ID_gdi"], &[&["SampleC", "x", "y"]]);
    let result = fixture.query().join(overlay, SampleColumn::Names(String::from("Strain")));
    assert!(matches!(result, Err(Error::InvalidArgument(_))), "Accepted a table without a free identifier column");
    let result = fixture.query().join(metadata(), SampleColumn::Names(String::from("Name")));
    assert!(matches!(result, Err(Error::NotFound(_))), "Accepted a missing column");
}

#[test]
fn tree_over_table() {
    let fixture = Fixture::new();
    let joined = fixture.query().join(metadata(), SampleColumn::Names(String::from("Strain"))).unwrap();
    let tree_query = joined.build_tree(test_tree(), 100, "reference").unwrap();
    assert!(tree_query.has_table_overlay(), "Table overlay was lost");

    let clade = check(
        tree_query.within_mrca(&["SampleA", "SampleC"]),
        &fixture.ids(&["SampleA"]),
        "join(names_col=[Strain]) AND mutation_tree(reference) AND within(mrca of [SampleA, SampleC])"
    );
    let table = clade.to_table().unwrap();
    assert_eq!(table.column_values("Color").unwrap(), vec!["red"]);

    let result = clade.join(metadata(), SampleColumn::Names(String::from("Strain")));
    assert!(matches!(result, Err(Error::UnsupportedOperation(_))), "Joined a second table through a tree query");
}

#[test]
fn shared_between_threads() {
    let fixture = Fixture::new();
    let query = fixture.query().build_tree(test_tree(), 100, "reference").unwrap();
    let features = ["contig1:20:A:T", "contig1:30:AC:A", "contig2:50:G:GA", "contig2:97:C:G"];
    let truth = [3, 2, 1, 2];
    std::thread::scope(|scope| {
        let handles: Vec<_> = features.iter().map(|feature| {
            let query = &query;
            scope.spawn(move || query.has(feature, "mutation").map(|x| x.len()))
        }).collect();
        for (handle, (feature, expected)) in handles.into_iter().zip(features.iter().zip(truth)) {
            let result = handle.join().unwrap();
            assert_eq!(result.unwrap().unwrap(), expected, "Wrong number of samples with {}", feature);
        }
    });
}

//-----------------------------------------------------------------------------
