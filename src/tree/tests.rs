use super::*;

use super::query::{DistanceUnit, TreeQueryEngine};

use crate::SampleSet;

use std::sync::Arc;

use rand::Rng;

//-----------------------------------------------------------------------------

fn test_tree() -> Tree {
    let tree = Tree::from_file(utils::get_test_data("tree.nwk"));
    assert!(tree.is_ok(), "Failed to read the tree: {}", tree.unwrap_err());
    tree.unwrap()
}

fn leaf(tree: &Tree, name: &str) -> usize {
    let leaves = tree.find_leaves(name);
    assert_eq!(leaves.len(), 1, "Leaf {} is not unique", name);
    leaves[0]
}

fn known_samples() -> BTreeMap<String, u32> {
    [("SampleA", 1), ("SampleB", 2), ("SampleC", 3)].iter()
        .map(|(name, id)| (name.to_string(), *id))
        .collect()
}

fn assert_close(value: f64, truth: f64, message: &str) {
    assert!((value - truth).abs() < 1e-9, "{}: got {}, expected {}", message, value, truth);
}

//-----------------------------------------------------------------------------

#[test]
fn tree_from_file() {
    let tree = test_tree();
    assert_eq!(tree.len(), 8, "Wrong number of nodes");
    assert_eq!(tree.leaves().count(), 5, "Wrong number of leaves");
    assert_eq!(tree.leaf_names(), vec!["SampleA", "SampleC", "SampleB", "SampleD", "reference"], "Wrong leaf names");
    assert_eq!(tree.node(Tree::ROOT).unwrap().children.len(), 3, "Wrong number of children for the root");

    let a = leaf(&tree, "SampleA");
    let truth = [("SampleA", 0.0), ("SampleC", 0.03), ("reference", 0.04), ("SampleD", 0.07), ("SampleB", 0.11)];
    for (name, distance) in truth {
        let other = leaf(&tree, name);
        assert_close(tree.distance(a, other), distance, &format!("Distance from SampleA to {}", name));
        assert_close(tree.distance(other, a), distance, &format!("Distance from {} to SampleA", name));
    }

    let by_name = tree.leaves_by_name();
    assert_eq!(by_name.len(), 5, "Wrong number of leaf names");
    assert_eq!(by_name["SampleB"], vec![leaf(&tree, "SampleB")]);
}

#[test]
fn newick_features() {
    let newick = "[comment] ('sample one':1.5,'it''s'[inner]:2e-1, :0.25,(x,y)label:1) root;\n";
    let tree = Tree::from_newick(newick);
    assert!(tree.is_ok(), "Failed to parse the tree: {}", tree.unwrap_err());
    let tree = tree.unwrap();
    assert_eq!(tree.node(Tree::ROOT).unwrap().name.as_deref(), Some("root"), "Wrong root name");
    assert_eq!(tree.leaf_names(), vec!["sample one", "it's", "x", "y"], "Wrong leaf names");
    assert_eq!(tree.leaves().count(), 5, "Unnamed leaf is missing");

    let one = leaf(&tree, "sample one");
    let quote = leaf(&tree, "it's");
    let x = leaf(&tree, "x");
    assert_close(tree.distance(one, quote), 1.7, "Distance between quoted leaves");
    assert_close(tree.distance(one, x), 2.5, "Distance with a missing branch length");
    let clade = tree.common_ancestor(&[x, leaf(&tree, "y")]).unwrap();
    assert_eq!(tree.node(clade).unwrap().name.as_deref(), Some("label"), "Wrong internal node");

    let single = Tree::from_newick("A;").unwrap();
    assert_eq!(single.leaf_names(), vec!["A"]);
}

#[test]
fn invalid_newick() {
    let invalid = [
        ("", "empty tree"),
        ("(A,B", "unclosed parenthesis"),
        ("(A,B));", "extra parenthesis"),
        ("(A,B);(C,D);", "data after the end"),
        ("(A,B)C(D);", "unexpected parenthesis"),
        ("(A:x,B);", "invalid branch length"),
        ("('A,B);", "unterminated label"),
        ("(A[,B);", "unterminated comment"),
        ("A B;", "multiple labels"),
    ];
    for (newick, description) in invalid {
        let result = Tree::from_newick(newick);
        assert!(matches!(result, Err(Error::InvalidArgument(_))), "Accepted a tree with {}: {}", description, newick);
    }
}

//-----------------------------------------------------------------------------

// Builds a random tree in the Newick format with leaves named by their index.
fn random_newick(rng: &mut impl Rng, leaves: &mut usize, depth: usize) -> String {
    let length = rng.gen_range(1..100) as f64 / 64.0;
    if depth == 0 || rng.gen_bool(0.3) {
        *leaves += 1;
        return format!("L{}:{}", *leaves - 1, length);
    }
    let children: Vec<String> = (0..rng.gen_range(2..4)).map(|_| random_newick(rng, leaves, depth - 1)).collect();
    format!("({}):{}", children.join(","), length)
}

// Returns the path from the node to the root with the distance from the node.
fn path_to_root(tree: &Tree, mut node: usize) -> Vec<(usize, f64)> {
    let mut result = vec![(node, 0.0)];
    let mut distance = 0.0;
    while let Some(parent) = tree.node(node).unwrap().parent {
        distance += tree.node(node).unwrap().branch_length;
        result.push((parent, distance));
        node = parent;
    }
    result
}

#[test]
fn random_trees() {
    let mut rng = rand::thread_rng();
    for _ in 0..20 {
        let mut leaves = 0;
        let newick = format!("{};", random_newick(&mut rng, &mut leaves, 6));
        let tree = Tree::from_newick(&newick);
        assert!(tree.is_ok(), "Failed to parse a random tree {}: {}", newick, tree.unwrap_err());
        let tree = tree.unwrap();
        let leaf_ids: Vec<usize> = tree.leaves().collect();
        assert_eq!(leaf_ids.len(), leaves, "Wrong number of leaves in {}", newick);

        for _ in 0..20 {
            let a = leaf_ids[rng.gen_range(0..leaf_ids.len())];
            let b = leaf_ids[rng.gen_range(0..leaf_ids.len())];
            let a_path = path_to_root(&tree, a);
            let b_path = path_to_root(&tree, b);
            let (ancestor, a_dist, b_dist) = a_path.iter()
                .find_map(|(node, a_dist)| b_path.iter().find(|(x, _)| x == node).map(|(_, b_dist)| (*node, *a_dist, *b_dist)))
                .unwrap();
            assert_eq!(tree.lca(a, b), ancestor, "Wrong LCA for {} and {} in {}", a, b, newick);
            assert_close(tree.distance(a, b), a_dist + b_dist, &format!("Distance between {} and {} in {}", a, b, newick));
            let under = tree.leaves_under(ancestor);
            assert!(under.contains(&a) && under.contains(&b), "LCA subtree does not contain the leaves in {}", newick);
        }
    }
}

//-----------------------------------------------------------------------------

#[test]
fn distance_queries() {
    let engine = TreeQueryEngine::new(Arc::new(test_tree()), 100);
    let known = known_samples();
    assert_eq!(engine.tree_samples(&known).to_vec(), Some(vec![1, 2, 3]));

    // Distances from SampleA in substitutions: C 3, reference 4, D 7, B 11.
    let thresholds = [(0.0, vec![1]), (2.5, vec![1]), (3.5, vec![1, 3]), (7.5, vec![1, 3]), (11.5, vec![1, 2, 3])];
    for (distance, truth) in thresholds {
        let result = engine.within_distance(&["SampleA"], distance, DistanceUnit::Substitutions, &known);
        assert!(result.is_ok(), "Distance query failed: {}", result.unwrap_err());
        let result = result.unwrap();
        assert_eq!(result.to_vec(), Some(truth), "Wrong samples within {} substitutions", distance);

        let per_site = engine.within_distance(&["SampleA"], distance / 100.0, DistanceUnit::SubstitutionsPerSite, &known).unwrap();
        assert_eq!(per_site, result, "Different results for {} substitutions and {} substitutions/site", distance, distance / 100.0);
    }

    // A leaf that is not a known sample can be the anchor.
    let result = engine.within_distance(&["SampleD"], 5.0, DistanceUnit::Substitutions, &known).unwrap();
    assert_eq!(result, SampleSet::empty(), "Wrong samples near an unknown leaf");
}

#[test]
fn leaves_on_distance_threshold() {
    let tree = Tree::from_newick("(A:0.07,B:0);").unwrap();
    let engine = TreeQueryEngine::new(Arc::new(tree), 100);
    let known: BTreeMap<String, u32> = [("A".to_string(), 1), ("B".to_string(), 2)].into_iter().collect();
    let substitutions = engine.within_distance(&["A"], 7.0, DistanceUnit::Substitutions, &known).unwrap();
    let per_site = engine.within_distance(&["A"], 0.07, DistanceUnit::SubstitutionsPerSite, &known).unwrap();
    assert_eq!(substitutions.to_vec(), Some(vec![1, 2]), "Dropped a leaf exactly 7 substitutions away");
    assert_eq!(per_site, substitutions, "Different results for 7 substitutions and 0.07 substitutions/site");

    // Every leaf distance in the test tree is a threshold.
    let engine = TreeQueryEngine::new(Arc::new(test_tree()), 100);
    let known = known_samples();
    let thresholds = [(3.0, vec![1, 3]), (4.0, vec![1, 3]), (7.0, vec![1, 3]), (11.0, vec![1, 2, 3])];
    for (distance, truth) in thresholds {
        let result = engine.within_distance(&["SampleA"], distance, DistanceUnit::Substitutions, &known).unwrap();
        assert_eq!(result.to_vec(), Some(truth), "Wrong samples within {} substitutions", distance);
        let per_site = engine.within_distance(&["SampleA"], distance / 100.0, DistanceUnit::SubstitutionsPerSite, &known).unwrap();
        assert_eq!(per_site, result, "Different results for {} substitutions and {} substitutions/site", distance, distance / 100.0);
    }
}

#[test]
fn distance_query_errors() {
    let engine = TreeQueryEngine::new(Arc::new(test_tree()), 100);
    let known = known_samples();
    let result = engine.within_distance(&["SampleA", "SampleB"], 5.0, DistanceUnit::Substitutions, &known);
    assert!(matches!(result, Err(Error::UnsupportedOperation(_))), "Accepted multiple samples");
    let result = engine.within_distance(&[], 5.0, DistanceUnit::Substitutions, &known);
    assert!(matches!(result, Err(Error::InvalidArgument(_))), "Accepted no samples");
    let result = engine.within_distance(&["SampleX"], 5.0, DistanceUnit::Substitutions, &known);
    assert!(matches!(result, Err(Error::AmbiguousMatch(ref message)) if message.contains("SampleX")), "Accepted a missing leaf");
    let result = "sites".parse::<DistanceUnit>();
    assert!(matches!(result, Err(Error::InvalidArgument(ref message)) if message.contains("sites")), "Accepted an invalid unit");
}

#[test]
fn mrca_queries() {
    let engine = TreeQueryEngine::new(Arc::new(test_tree()), 100);
    let known = known_samples();

    let result = engine.within_mrca(&["SampleA", "SampleC"], &known);
    assert!(result.is_ok(), "MRCA query failed: {}", result.unwrap_err());
    assert_eq!(result.unwrap().to_vec(), Some(vec![1, 3]), "Wrong samples under the MRCA of SampleA and SampleC");

    let result = engine.within_mrca(&["SampleA", "SampleB"], &known).unwrap();
    assert_eq!(result.to_vec(), Some(vec![1, 2, 3]), "Wrong samples under the root");

    // Unknown leaves are included in the subtree but not in the result.
    let result = engine.within_mrca(&["SampleB", "SampleD"], &known).unwrap();
    assert_eq!(result.to_vec(), Some(vec![2]), "Wrong samples under the MRCA of SampleB and SampleD");

    let result = engine.within_mrca(&["SampleC"], &known).unwrap();
    assert_eq!(result.to_vec(), Some(vec![3]), "Wrong result for a single sample");
}

#[test]
fn mrca_query_errors() {
    let known = known_samples();
    let engine = TreeQueryEngine::new(Arc::new(test_tree()), 100);
    let result = engine.within_mrca(&[], &known);
    assert!(matches!(result, Err(Error::InvalidArgument(_))), "Accepted no samples");
    let result = engine.within_mrca(&["SampleA", "SampleX"], &known);
    assert!(matches!(result, Err(Error::AmbiguousMatch(_))), "Accepted a missing leaf");

    let duplicate = Tree::from_newick("((SampleA:1,SampleB:1):1,SampleA:1);").unwrap();
    let engine = TreeQueryEngine::new(Arc::new(duplicate), 100);
    let result = engine.within_mrca(&["SampleA", "SampleB"], &known);
    assert!(matches!(result, Err(Error::AmbiguousMatch(_))), "Accepted a duplicate leaf");
}

//-----------------------------------------------------------------------------
