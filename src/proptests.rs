use super::*;

use proptest::prelude::*;
use std::collections::BTreeMap;

fn validate_tree<T>(t: &NameTree<T>, compressed: bool) {
    let issues = t.check_integrity();
    assert!(issues.is_empty(), "integrity: {issues:#?}\n{}", t.dump_string());
    if compressed {
        let issues = t.check_compression();
        assert!(issues.is_empty(), "compression: {issues:#?}\n{}", t.dump_string());
    }
}

/// Data-bearing names in canonical order, walked backwards with a chain.
fn names_backward<T>(t: &NameTree<T>) -> Vec<Name> {
    let mut out = Vec::new();
    let mut chain = NodeChain::new();
    if t.root().is_none() {
        assert_eq!(chain.last(t), Err(Error::NotFound));
        return out;
    }
    let mut step = chain.last(t);
    while step.is_ok() {
        let id = chain.current().expect("positioned chain");
        if t.node(id).is_some_and(|n| n.has_data()) {
            out.push(chain.full_name(t).unwrap());
        }
        step = chain.prev(t);
    }
    assert_eq!(step, Err(Error::NoMore));
    out.reverse();
    out
}

/// Deepest name in `m` that is `name` or one of its superdomains.
fn model_match(m: &BTreeMap<Name, u64>, name: &Name) -> Option<(MatchKind, Name, u64)> {
    (1..=name.label_count()).rev().find_map(|n| {
        let candidate = name.suffix(n).expect("n within label count");
        let kind = if n == name.label_count() {
            MatchKind::Exact
        } else {
            MatchKind::Partial
        };
        m.get(&candidate).map(|&v| (kind, candidate, v))
    })
}

#[derive(Clone, Debug)]
enum Op {
    Insert(Name, u64),
    Delete(Name),
    DeleteRecursive(Name),
    Find(Name),
}

fn name_strategy() -> impl Strategy<Value = Name> + Clone {
    // A tiny alphabet with case variants forces shared suffixes, splits,
    // joins and case-insensitive collisions.
    let label = prop::sample::select(vec!["a", "b", "c", "A", "ab", "ba"]);
    prop::collection::vec(label, 0..=4).prop_map(|labels| {
        let text: String = labels.iter().map(|l| format!("{l}.")).collect();
        if text.is_empty() {
            Name::root()
        } else {
            text.parse().unwrap()
        }
    })
}

fn ops_strategy() -> impl Strategy<Value = Vec<Op>> {
    let name = name_strategy();
    let op = prop_oneof![
        50 => (name.clone(), any::<u64>()).prop_map(|(n, v)| Op::Insert(n, v)),
        25 => name.clone().prop_map(Op::Delete),
        3 => name.clone().prop_map(Op::DeleteRecursive),
        22 => name.clone().prop_map(Op::Find),
    ];
    prop::collection::vec(op, 0..=1000)
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        max_shrink_iters: 50_000,
        .. ProptestConfig::default()
    })]

    #[test]
    fn prop_equivalence(ops in ops_strategy()) {
        let mut t: NameTree<u64> = NameTree::new();
        let mut m: BTreeMap<Name, u64> = BTreeMap::new();

        for op in ops {
            match op {
                Op::Insert(name, value) => {
                    let added = t.add_name(&name, value).is_ok();
                    prop_assert_eq!(added, !m.contains_key(&name));
                    m.entry(name).or_insert(value);
                }
                Op::Delete(name) => {
                    let deleted = t.delete_name(&name, false).is_ok();
                    prop_assert_eq!(deleted, m.remove(&name).is_some());
                }
                Op::DeleteRecursive(name) => {
                    let deleted = t.delete_name(&name, true).is_ok();
                    prop_assert_eq!(deleted, m.contains_key(&name));
                    if deleted {
                        m.retain(|k, _| !k.is_subdomain_of(&name));
                    }
                }
                Op::Find(name) => {
                    let got = t
                        .find_name(&name)
                        .ok()
                        .map(|hit| (hit.kind, hit.name, *hit.data));
                    prop_assert_eq!(got, model_match(&m, &name));
                    prop_assert_eq!(t.get(&name).copied(), m.get(&name).copied());
                }
            }

            prop_assert_eq!(t.len(), m.len());
        }

        validate_tree(&t, true);
        let got: Vec<(Name, u64)> = t.iter().map(|(k, v)| (k, *v)).collect();
        let expected: Vec<(Name, u64)> = m.iter().map(|(k, v)| (k.clone(), *v)).collect();
        prop_assert_eq!(got, expected);
        let backward = names_backward(&t);
        let keys: Vec<Name> = m.keys().cloned().collect();
        prop_assert_eq!(backward, keys);
    }

    #[test]
    fn prop_add_node_keeps_integrity(names in prop::collection::vec(name_strategy(), 0..=200)) {
        let mut t: NameTree<u64> = NameTree::new();
        let mut ids = BTreeMap::new();
        for name in names {
            let id = t.add_node(&name).unwrap();
            if let Some(&prev) = ids.get(&name) {
                prop_assert_eq!(prev, id);
            }
            ids.insert(name, id);
        }
        // Bare nodes are allowed here, so only the structure is checked.
        validate_tree(&t, false);
        for (name, id) in &ids {
            let found = t
                .find_node(name, FindOptions::new().empty_data_ok(true))
                .unwrap();
            prop_assert_eq!(found, Found::Exact(*id));
        }
    }
}

fn for_each_permutation<T: Clone>(items: &[T], mut f: impl FnMut(Vec<T>)) {
    fn rec<T: Clone>(items: &[T], used: &mut [bool], out: &mut Vec<T>, f: &mut impl FnMut(Vec<T>)) {
        if out.len() == items.len() {
            f(out.clone());
            return;
        }
        for i in 0..items.len() {
            if used[i] {
                continue;
            }
            used[i] = true;
            out.push(items[i].clone());
            rec(items, used, out, f);
            out.pop();
            used[i] = false;
        }
    }

    let mut used = vec![false; items.len()];
    let mut out = Vec::with_capacity(items.len());
    rec(items, &mut used, &mut out, &mut f);
}

fn small_set() -> Vec<Name> {
    ["com.", "a.com.", "b.com.", "x.a.com.", "net.", "a.net."]
        .iter()
        .map(|s| s.parse().unwrap())
        .collect()
}

#[test]
fn exhaustive_insert_order_small_set() {
    let names = small_set();

    for_each_permutation(&names, |perm| {
        let mut t: NameTree<u64> = NameTree::new();
        let mut m: BTreeMap<Name, u64> = BTreeMap::new();

        for (i, n) in perm.into_iter().enumerate() {
            let v = i as u64;
            t.add_name(&n, v).unwrap();
            m.insert(n, v);
        }

        validate_tree(&t, true);
        let got: Vec<(Name, u64)> = t.iter().map(|(k, v)| (k, *v)).collect();
        let expected: Vec<(Name, u64)> = m.iter().map(|(k, v)| (k.clone(), *v)).collect();
        assert_eq!(got, expected);
    });
}

#[test]
fn exhaustive_delete_order_small_set() {
    let names = small_set();

    // Insert in a fixed order, then delete in all permutations.
    for_each_permutation(&names, |perm| {
        let mut t: NameTree<u64> = NameTree::new();
        let mut m: BTreeMap<Name, u64> = BTreeMap::new();
        for (i, n) in names.iter().enumerate() {
            t.add_name(n, i as u64).unwrap();
            m.insert(n.clone(), i as u64);
        }

        for n in perm {
            assert_eq!(t.delete_name(&n, false).is_ok(), m.remove(&n).is_some());
            assert_eq!(t.len(), m.len());
            validate_tree(&t, true);
            assert_eq!(names_backward(&t), m.keys().cloned().collect::<Vec<_>>());
        }
        assert_eq!(t.len(), 0);
        assert_eq!(t.node_count(), 0);
        assert!(t.root().is_none());
    });
}
