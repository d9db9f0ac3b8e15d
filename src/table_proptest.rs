#![cfg(test)]

// Property tests for Table kept inside the crate so they do not require
// feature gates to access internal modules.

use crate::table::Table;
use proptest::prelude::*;
use proptest::test_runner::TestCaseError;
use std::collections::HashMap;

// Pool-indexed operations to improve shrinking: indices shrink to earlier
// keys, pool length shrinks, and op lists shrink in length.
#[derive(Clone, Debug)]
enum OpI {
    Set(usize, i32),
    Remove(usize),
    Get(usize),
    Contains(String),
    Mutate(usize, i32),
    Iterate,
    CursorWalk,
}

fn arb_scenario() -> impl Strategy<Value = (Vec<String>, Vec<OpI>)> {
    proptest::collection::vec("[a-z]{1,5}", 1..=8).prop_flat_map(|pool| {
        let idxs: Vec<usize> = (0..pool.len()).collect();
        let idx = proptest::sample::select(idxs);
        let contains_pool = proptest::sample::select(pool.clone());
        let op = prop_oneof![
            (idx.clone(), any::<i32>()).prop_map(|(i, v)| OpI::Set(i, v)),
            idx.clone().prop_map(OpI::Remove),
            idx.clone().prop_map(OpI::Get),
            prop_oneof![
                contains_pool.prop_map(|s: String| s),
                "[a-z]{1,5}".prop_map(|s| s)
            ]
            .prop_map(OpI::Contains),
            (idx.clone(), any::<i32>()).prop_map(|(i, d)| OpI::Mutate(i, d)),
            Just(OpI::Iterate),
            Just(OpI::CursorWalk),
        ];
        proptest::collection::vec(op, 1..60).prop_map(move |ops| (pool.clone(), ops))
    })
}

// The model: a value map plus the expected insertion order. A set of a new
// key appends to the order; an overwrite leaves it alone; a removal drops
// it; a removed-then-set key re-appends at the tail.
struct Model {
    values: HashMap<String, i32>,
    order: Vec<String>,
}

impl Model {
    fn new() -> Self {
        Self {
            values: HashMap::new(),
            order: Vec::new(),
        }
    }

    fn set(&mut self, key: &str, value: i32) -> Option<i32> {
        let prev = self.values.insert(key.to_string(), value);
        if prev.is_none() {
            self.order.push(key.to_string());
        }
        prev
    }

    fn remove(&mut self, key: &str) -> Option<i32> {
        let prev = self.values.remove(key);
        if prev.is_some() {
            self.order.retain(|k| k != key);
        }
        prev
    }
}

fn run_scenario(pool: Vec<String>, ops: Vec<OpI>, capacity: usize) -> Result<(), TestCaseError> {
    let mut sut: Table<i32> = Table::with_capacity(capacity).expect("create table");
    let mut model = Model::new();

    for op in ops {
        match op {
            OpI::Set(i, v) => {
                let key = &pool[i];
                let got = sut.set(key, v).expect("set with granting policy");
                let want = model.set(key, v);
                prop_assert_eq!(got, want, "set must report the displaced value");
            }
            OpI::Remove(i) => {
                let key = &pool[i];
                prop_assert_eq!(sut.remove(key), model.remove(key));
            }
            OpI::Get(i) => {
                let key = &pool[i];
                prop_assert_eq!(sut.get(key), model.values.get(key.as_str()));
            }
            OpI::Contains(s) => {
                prop_assert_eq!(sut.contains_key(&s), model.values.contains_key(&s));
            }
            OpI::Mutate(i, d) => {
                let key = &pool[i];
                match sut.get_mut(key) {
                    Some(v) => {
                        *v = v.saturating_add(d);
                        let mv = model.values.get_mut(key.as_str()).expect("model in sync");
                        *mv = mv.saturating_add(d);
                    }
                    None => prop_assert!(!model.values.contains_key(key.as_str())),
                }
            }
            OpI::Iterate => {
                let got: Vec<(String, i32)> =
                    sut.iter().map(|(k, v)| (k.to_string(), *v)).collect();
                let want: Vec<(String, i32)> = model
                    .order
                    .iter()
                    .map(|k| (k.clone(), model.values[k]))
                    .collect();
                prop_assert_eq!(got, want, "iter must follow insertion order");
            }
            OpI::CursorWalk => {
                let mut got = Vec::new();
                if let Some(mut cursor) = sut.cursor() {
                    while cursor.is_valid(&sut) {
                        let (k, v) = cursor.entry(&sut).expect("valid cursor resolves");
                        got.push((k.to_string(), *v));
                        cursor.advance(&sut);
                    }
                }
                let want: Vec<(String, i32)> = model
                    .order
                    .iter()
                    .map(|k| (k.clone(), model.values[k]))
                    .collect();
                prop_assert_eq!(got, want, "cursor must follow insertion order");
            }
        }

        // Post-conditions after each op.
        prop_assert_eq!(sut.len(), model.values.len());
        prop_assert_eq!(sut.is_empty(), model.values.is_empty());
        prop_assert!(
            4 * sut.len() <= 3 * sut.capacity(),
            "load factor bound violated: {}/{}",
            sut.len(),
            sut.capacity()
        );
    }
    Ok(())
}

// Property: state-machine equivalence against a HashMap paired with an
// explicit insertion-order list. Invariants exercised across random
// operation sequences:
// - set/get/remove/contains parity with the model, including displaced
//   values reported by overwrites.
// - iter() and a full cursor walk both follow first-insertion order.
// - len/is_empty parity and the 0.75 load-factor bound after every op.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine((pool, ops) in arb_scenario()) {
        run_scenario(pool, ops, 16)?;
    }
}

// Property: the same invariants hold starting from the smallest capacity,
// where nearly every insertion collides or triggers growth. This stresses
// the probe loop, the collision index and the rebuild path.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine_tiny_capacity((pool, ops) in arb_scenario()) {
        run_scenario(pool, ops, 1)?;
    }
}
