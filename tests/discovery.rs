use agree_lattice::{
    discover_fds, DelimitedStream, DiscoveryConfig, Error, FunctionalDependency, InMemoryTable,
    NullPolicy, Pli, Relation,
};
use proptest::prelude::*;
use std::collections::HashMap;

fn is_null(value: &str) -> bool {
    value.is_empty() || value == "NULL"
}

fn same(a: &str, b: &str, policy: NullPolicy) -> bool {
    match (is_null(a), is_null(b)) {
        (true, true) => policy == NullPolicy::NullEqualsNull,
        (false, false) => a == b,
        _ => false,
    }
}

fn holds(rows: &[Vec<String>], lhs: u32, rhs: usize, policy: NullPolicy) -> bool {
    let width = rows[0].len();
    for (i, a) in rows.iter().enumerate() {
        for b in &rows[i + 1..] {
            let agree = (0..width)
                .filter(|&c| lhs & (1 << c) != 0)
                .all(|c| same(&a[c], &b[c], policy));
            if agree && !same(&a[rhs], &b[rhs], policy) {
                return false;
            }
        }
    }
    true
}

/// Every minimal, non-trivial FD, by checking every lhs against every pair of rows.
fn brute_force(rows: &[Vec<String>], policy: NullPolicy) -> Vec<FunctionalDependency> {
    let width = rows[0].len();
    let mut fds = Vec::new();
    for rhs in 0..width {
        let mut found = Vec::new();
        for lhs in 0u32..(1 << width) {
            if lhs & (1 << rhs) != 0 || !holds(rows, lhs, rhs, policy) {
                continue;
            }
            let minimal = (0..width)
                .filter(|&c| lhs & (1 << c) != 0)
                .all(|c| !holds(rows, lhs & !(1 << c), rhs, policy));
            if minimal {
                found.push(FunctionalDependency {
                    lhs: (0..width).filter(|&c| lhs & (1 << c) != 0).collect(),
                    rhs,
                });
            }
        }
        found.sort_by(|a, b| a.lhs.cmp(&b.lhs));
        fds.extend(found);
    }
    fds
}

fn strings<T: ToString>(rows: &[Vec<T>]) -> Vec<Vec<String>> {
    rows.iter()
        .map(|row| row.iter().map(ToString::to_string).collect())
        .collect()
}

fn discover(
    rows: &[Vec<String>],
    policy: NullPolicy,
    threads: usize,
) -> agree_lattice::Result<Vec<FunctionalDependency>> {
    let mut table = InMemoryTable::from_values("t", rows);
    let relation = Relation::load(&mut table, policy)?;
    let config = DiscoveryConfig::default()
        .with_threads(threads)
        .with_null_policy(policy);
    discover_fds(&relation, &config)
}

fn fd(lhs: &[usize], rhs: usize) -> FunctionalDependency {
    FunctionalDependency {
        lhs: lhs.to_vec(),
        rhs,
    }
}

/// A table big enough to need several windows and rounds, generated without randomness.
fn mixed_table(rows: usize) -> Vec<Vec<String>> {
    (0..rows)
        .map(|r| {
            vec![
                (r % 7).to_string(),
                (r % 3).to_string(),
                ((r % 7) * 3 + r % 3).to_string(),
                (r / 10).to_string(),
                ((r * r) % 11).to_string(),
                if r % 5 == 0 {
                    String::new()
                } else {
                    (r % 4).to_string()
                },
            ]
        })
        .collect()
}

#[test]
fn paired_columns_determine_each_other() {
    let rows = strings(&[
        vec![1, 1, 1, 1],
        vec![1, 1, 2, 2],
        vec![2, 2, 1, 1],
        vec![2, 2, 2, 2],
    ]);
    let fds = discover(&rows, NullPolicy::NullEqualsNull, 1).unwrap();
    assert!(fds.contains(&fd(&[0], 1)));
    assert!(fds.contains(&fd(&[1], 0)));
    let mixes_pairs = |f: &FunctionalDependency| f.rhs < 2 && f.lhs.iter().any(|&c| c >= 2);
    assert!(!fds.iter().any(mixes_pairs));
    assert_eq!(fds, brute_force(&rows, NullPolicy::NullEqualsNull));
}

#[test]
fn single_unique_column_has_no_dependencies() {
    let rows = strings(&[vec![1], vec![2], vec![3]]);
    assert!(discover(&rows, NullPolicy::NullEqualsNull, 1)
        .unwrap()
        .is_empty());
}

#[test]
fn constant_column_is_found_at_the_root() {
    let rows = strings(&[vec![1, 9], vec![2, 9], vec![3, 9], vec![1, 9]]);
    assert_eq!(
        discover(&rows, NullPolicy::NullEqualsNull, 1).unwrap(),
        vec![fd(&[], 1)]
    );
}

#[test]
fn mixed_table_matches_brute_force() {
    let rows = mixed_table(60);
    for policy in [NullPolicy::NullEqualsNull, NullPolicy::NullNotEqualsNull] {
        assert_eq!(
            discover(&rows, policy, 1).unwrap(),
            brute_force(&rows, policy)
        );
    }
}

#[test]
fn thread_count_does_not_change_the_result() {
    let rows = mixed_table(200);
    for policy in [NullPolicy::NullEqualsNull, NullPolicy::NullNotEqualsNull] {
        let sequential = discover(&rows, policy, 1).unwrap();
        for threads in [2, 4, 8] {
            assert_eq!(discover(&rows, policy, threads).unwrap(), sequential);
        }
    }
}

#[test]
fn repeated_runs_are_identical() {
    let rows = mixed_table(80);
    let mut table = InMemoryTable::from_values("t", &rows);
    let relation = Relation::load(&mut table, NullPolicy::NullEqualsNull).unwrap();
    let config = DiscoveryConfig::default().with_threads(2);
    let first = discover_fds(&relation, &config).unwrap();
    let second = discover_fds(&relation, &config).unwrap();
    assert_eq!(first, second);
}

#[test]
fn reads_csv_with_header() {
    let csv = b"id,name,dept,floor\n1,ann,eng,3\n2,bob,eng,3\n3,cy,ops,1\n4,di,ops,1\n".to_vec();
    let mut stream = DelimitedStream::new("staff", csv, b',', true).unwrap();
    let relation = Relation::load(&mut stream, NullPolicy::NullEqualsNull).unwrap();
    let fds = discover_fds(&relation, &DiscoveryConfig::default().with_threads(1)).unwrap();

    let names = relation.column_names();
    let shown: Vec<String> = fds
        .iter()
        .map(|fd| fd.display_with(&names).to_string())
        .collect();
    assert!(shown.contains(&"[floor] -> dept".to_string()));
    assert!(shown.contains(&"[dept] -> floor".to_string()));
    assert!(shown.contains(&"[name] -> id".to_string()));
}

#[test]
fn degenerate_inputs_are_errors() {
    let mut stream = DelimitedStream::new("one", b"a,b\n1,2\n".to_vec(), b',', true).unwrap();
    assert!(matches!(
        Relation::load(&mut stream, NullPolicy::NullEqualsNull),
        Err(Error::SingleRow)
    ));

    let mut stream = DelimitedStream::new("none", b"a,b\n".to_vec(), b',', true).unwrap();
    assert!(matches!(
        Relation::load(&mut stream, NullPolicy::NullEqualsNull),
        Err(Error::EmptyRelation)
    ));
}

fn table_strategy() -> impl Strategy<Value = Vec<Vec<String>>> {
    (1usize..=6).prop_flat_map(|width| {
        let value = prop_oneof![
            8 => (0u8..3).prop_map(|v| v.to_string()),
            1 => Just(String::new()),
            1 => Just("NULL".to_string()),
        ];
        prop::collection::vec(prop::collection::vec(value, width), 2..30)
    })
}

proptest! {
    #[test]
    fn random_tables_match_brute_force(rows in table_strategy(), distinct in any::<bool>()) {
        let policy = if distinct {
            NullPolicy::NullNotEqualsNull
        } else {
            NullPolicy::NullEqualsNull
        };
        let expected = brute_force(&rows, policy);
        prop_assert_eq!(discover(&rows, policy, 1).unwrap(), expected.clone());
        prop_assert_eq!(discover(&rows, policy, 4).unwrap(), expected);
    }

    #[test]
    fn intersection_is_associative(
        columns in prop::collection::vec(prop::collection::vec(0u32..4, 12), 3)
    ) {
        let plis: Vec<Pli> = columns
            .iter()
            .map(|values| {
                Pli::create_for(values, NullPolicy::NullNotEqualsNull)
            })
            .collect();
        let left = plis[0].intersect(&plis[1]).intersect(&plis[2]);
        let right = plis[0].intersect(&plis[1].intersect(&plis[2]));
        prop_assert_eq!(&left, &right);

        let mut ids = HashMap::new();
        let combined: Vec<u32> = (0..12)
            .map(|row| {
                if columns.iter().any(|column| column[row] == 0) {
                    return 0;
                }
                let key = (columns[0][row], columns[1][row], columns[2][row]);
                let next = ids.len() as u32 + 1;
                *ids.entry(key).or_insert(next)
            })
            .collect();
        let expected = Pli::create_for(&combined, NullPolicy::NullNotEqualsNull);
        prop_assert_eq!(left, expected);
    }
}
