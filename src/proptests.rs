use super::*;

use proptest::prelude::*;
use proptest_derive::Arbitrary;
use std::collections::BTreeMap;

/// Checks every structural invariant of `t`, panicking on the first breach.
pub(crate) fn validate_tree(t: &CsbTree) {
    let root = match &t.root {
        Root::Leaf(leaf) => {
            assert_eq!(t.height, 0, "leaf root must mean height 0");
            assert!(leaf.len() <= LEAF_CAPACITY);
            assert_strictly_ascending(leaf.keys());
            assert!(leaf.next.is_null(), "root leaf has no sibling");
            assert_eq!(leaf.len(), t.len, "root leaf must hold every entry");
            return;
        }
        Root::Internal(root) => root,
    };
    assert!(t.height >= 1, "internal root must mean height >= 1");

    let mut leaves: Vec<LeafLink> = Vec::new();
    let mut count = 0usize;
    validate_internal(t, root, 1, None, None, &mut leaves, &mut count);
    assert_eq!(count, t.len, "reachable entries must match CsbTree::len");

    // The sibling chain visits exactly the leaves, in key order.
    for pair in leaves.windows(2) {
        let leaf = t.groups.leaf(pair[0]).unwrap().unwrap();
        assert_eq!(leaf.next, pair[1], "sibling link out of order");
    }
    let last = t.groups.leaf(*leaves.last().unwrap()).unwrap().unwrap();
    assert!(last.next.is_null(), "last leaf must end the chain");
}

fn validate_internal(
    t: &CsbTree,
    node: &InternalNode,
    depth: usize,
    low: Option<Key>,
    high: Option<Key>,
    leaves: &mut Vec<LeafLink>,
    count: &mut usize,
) {
    let n = node.child_count();
    assert!((2..=FANOUT).contains(&n), "invalid child count: {n}");
    let seps = node.separators();
    assert_eq!(seps.len(), n - 1);
    assert_strictly_ascending(seps);

    let group = t.groups.get(node.children).unwrap();
    assert_eq!(group.used(), n, "group used count must match child count");
    assert!(group.used() <= GROUP_CAPACITY);

    for slot in 0..n {
        let lo = if slot == 0 { low } else { Some(seps[slot - 1]) };
        let hi = if slot + 1 < n { Some(seps[slot]) } else { high };

        if depth == t.height {
            assert_eq!(group.kind(), NodeKind::Leaf, "leaves must sit at depth == height");
            let leaf = group.leaf(slot).unwrap();
            assert!(
                (1..=LEAF_CAPACITY).contains(&leaf.len()),
                "invalid leaf size: {}",
                leaf.len()
            );
            let keys = leaf.keys();
            assert_strictly_ascending(keys);
            if let Some(lo) = lo {
                assert!(keys[0] > lo, "key {} not above bound {lo}", keys[0]);
            }
            if let Some(hi) = hi {
                assert_eq!(leaf.max_key(), hi, "separator must be the child's max key");
            }
            leaves.push(LeafLink::new(node.children, slot));
            *count += leaf.len();
        } else {
            assert_eq!(group.kind(), NodeKind::Internal);
            let child = group.internal(slot).unwrap();
            if let (Some(lo), Some(&first)) = (lo, child.separators().first()) {
                assert!(first > lo);
            }
            if let (Some(hi), Some(&last)) = (hi, child.separators().last()) {
                assert!(last < hi);
            }
            validate_internal(t, child, depth + 1, lo, hi, leaves, count);
        }
    }
}

fn assert_strictly_ascending(keys: &[Key]) {
    assert!(
        keys.windows(2).all(|w| w[0] < w[1]),
        "keys not strictly ascending: {keys:?}"
    );
}

#[derive(Clone, Debug, Arbitrary)]
enum Op {
    #[proptest(weight = 6)]
    Insert(#[proptest(strategy = "0u64..4096")] Key, Value),
    #[proptest(weight = 2)]
    Get(#[proptest(strategy = "0u64..4096")] Key),
    #[proptest(weight = 1)]
    LowerBound(#[proptest(strategy = "0u64..4096")] Key),
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        max_shrink_iters: 50_000,
        .. ProptestConfig::default()
    })]

    #[test]
    fn prop_equivalence(ops in prop::collection::vec(any::<Op>(), 0..=2000)) {
        let mut t = CsbTree::new();
        let mut m: BTreeMap<Key, Value> = BTreeMap::new();

        for op in ops {
            match op {
                Op::Insert(key, value) => {
                    let fresh = !m.contains_key(&key);
                    m.entry(key).or_insert(value);
                    let (cursor, inserted) = t.insert(key, value).unwrap();
                    prop_assert_eq!(inserted, fresh);
                    prop_assert_eq!(cursor.entry(), m.get(&key).map(|v| (key, *v)));
                }
                Op::Get(key) => {
                    prop_assert_eq!(t.get(key).unwrap(), m.get(&key).copied());
                }
                Op::LowerBound(key) => {
                    let got = t.lower_bound(key).unwrap().entry();
                    let expected = m.range(key..).next().map(|(k, v)| (*k, *v));
                    prop_assert_eq!(got, expected);
                }
            }

            prop_assert_eq!(t.len(), m.len());
        }

        validate_tree(&t);
        let got: Vec<(Key, Value)> = t.iter().unwrap().collect();
        let expected: Vec<(Key, Value)> = m.into_iter().collect();
        prop_assert_eq!(got, expected);
    }

    #[test]
    fn prop_any_order_iterates_sorted(keys in prop::collection::vec(any::<Key>(), 0..3000)) {
        let mut t = CsbTree::new();
        let mut m: BTreeMap<Key, Value> = BTreeMap::new();
        for (i, key) in keys.into_iter().enumerate() {
            let value = i as Value;
            let (_, inserted) = t.insert(key, value).unwrap();
            prop_assert_eq!(inserted, !m.contains_key(&key));
            m.entry(key).or_insert(value);
        }

        validate_tree(&t);
        let got: Vec<(Key, Value)> = t.iter().unwrap().collect();
        let expected: Vec<(Key, Value)> = m.into_iter().collect();
        prop_assert_eq!(got, expected);
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

#[test]
fn exhaustive_insert_order_root_split() {
    let keys: Vec<Key> = (1..=8).collect();

    for_each_permutation(&keys, |perm| {
        let mut t = CsbTree::new();
        for k in perm {
            t.try_insert(k, k).unwrap();
        }

        validate_tree(&t);
        assert_eq!(t.height(), 1);
        let Root::Internal(root) = &t.root else {
            panic!("eight keys must split the root leaf");
        };
        let group = t.groups.get(root.children).unwrap();
        assert_eq!(group.leaf(0).unwrap().keys(), &[1, 2, 3, 4]);
        assert_eq!(group.leaf(1).unwrap().keys(), &[5, 6, 7, 8]);
    });
}

#[test]
fn exhaustive_insert_order_small_set() {
    // One key past the root split, arriving in every order.
    let keys: Vec<Key> = vec![5, 90, 17, 42, 8, 63, 71, 29, 54];

    for_each_permutation(&keys, |perm| {
        let mut t = CsbTree::new();
        let mut m: BTreeMap<Key, Value> = BTreeMap::new();
        for (i, k) in perm.into_iter().enumerate() {
            let v = i as Value;
            t.insert(k, v).unwrap();
            m.insert(k, v);
        }

        validate_tree(&t);
        let got: Vec<(Key, Value)> = t.iter().unwrap().collect();
        let expected: Vec<(Key, Value)> = m.into_iter().collect();
        assert_eq!(got, expected);
    });
}
