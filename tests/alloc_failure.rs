// Allocation-failure suite: every allocating operation is driven through
// an armed FaultAlloc policy and must either complete or leave the table
// in its documented state. The sweep tests deny one allocation at a time
// across a whole operation, the way the original fault-injection harness
// walked failure points.
use probemap::alloc::FaultAlloc;
use probemap::{Table, TableError};

fn filled_table(capacity: usize, keys: &[&str], faults: &FaultAlloc) -> Table<i32, FaultAlloc> {
    let mut table =
        Table::with_capacity_and_policy(capacity, faults.clone()).expect("create table");
    for (i, key) in keys.iter().enumerate() {
        table.set(key, i as i32).expect("fill");
    }
    table
}

fn snapshot(table: &Table<i32, FaultAlloc>) -> Vec<(String, i32)> {
    table.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

// Test: creation fails cleanly.
// Verifies: a denied slot-array allocation yields Err and nothing else;
// disarming makes the same construction succeed.
#[test]
fn denied_creation_returns_error() {
    let faults = FaultAlloc::new();
    faults.fail_after(0);
    assert!(Table::<i32, _>::with_capacity_and_policy(16, faults.clone()).is_err());

    faults.disarm();
    let table = Table::<i32, _>::with_capacity_and_policy(16, faults).expect("create");
    assert_eq!(table.capacity(), 16);
}

// Test: an abandoned insertion does not corrupt existing entries.
// Verifies: after a denied set, count, contents and order are unchanged,
// the new key is absent, and the table keeps working once disarmed.
#[test]
fn denied_insert_leaves_table_intact() {
    let faults = FaultAlloc::new();
    let mut table = filled_table(16, &["a", "b", "c"], &faults);
    let before = snapshot(&table);

    faults.fail_after(0);
    assert!(matches!(table.set("d", 3), Err(TableError::Alloc(_))));

    assert_eq!(snapshot(&table), before);
    assert_eq!(table.len(), 3);
    assert_eq!(table.get("d"), None);

    faults.disarm();
    table.set("d", 3).expect("set after disarm");
    assert_eq!(table.get("d"), Some(&3));
}

// Test: an aborted growth leaves the table completely unmodified.
// Verifies: capacity, contents, order and even outstanding cursors are
// exactly as before the failed call; the same set succeeds after disarm
// and only then invalidates the cursor.
#[test]
fn aborted_growth_leaves_table_untouched() {
    let faults = FaultAlloc::new();
    // 12 entries fill 16 slots to the 0.75 bound: the next set must grow.
    let keys: Vec<String> = (0..12).map(|i| format!("k{i}")).collect();
    let key_refs: Vec<&str> = keys.iter().map(|k| k.as_str()).collect();
    let mut table = filled_table(16, &key_refs, &faults);
    assert_eq!(table.capacity(), 16);

    let before = snapshot(&table);
    let mut cursor = table.cursor().expect("non-empty table");

    faults.fail_after(0);
    assert!(matches!(table.set("overflow", 99), Err(TableError::Alloc(_))));

    assert_eq!(table.capacity(), 16, "growth must have been aborted");
    assert_eq!(snapshot(&table), before);
    assert_eq!(table.get("overflow"), None);
    assert!(
        cursor.is_valid(&table),
        "an aborted growth must not invalidate cursors"
    );

    faults.disarm();
    table.set("overflow", 99).expect("set after disarm");
    assert!(table.capacity() > 16);
    assert_eq!(table.get("overflow"), Some(&99));
    assert!(
        !cursor.is_valid(&table),
        "the completed growth invalidates the cursor"
    );
    cursor.advance(&table);
    assert!(!cursor.is_valid(&table));
}

// Test: sweep every failure point of a single set.
// For each n, allow exactly n grants and then deny. Whatever n, the table
// must end in one of its two documented states: insertion completed, or
// abandoned with nothing changed. Once n reaches the operation's full
// allocation count the set must succeed.
#[test]
fn failure_point_sweep_over_set() {
    // Count the grants a clean run of the same operation performs.
    let probe_faults = FaultAlloc::new();
    let mut probe = filled_table(4, &["seed"], &probe_faults);
    let base = probe_faults.granted();
    probe.set("swept", 1).expect("clean run");
    let grants_needed = (probe_faults.granted() - base) as usize;
    assert!(grants_needed > 0);

    for n in 0..=grants_needed {
        let faults = FaultAlloc::new();
        let mut table = filled_table(4, &["seed"], &faults);
        let before = snapshot(&table);

        faults.fail_after(n);
        match table.set("swept", 1) {
            Ok(None) => {
                assert_eq!(table.get("swept"), Some(&1));
                assert_eq!(table.len(), 2);
            }
            Ok(Some(_)) => panic!("no value to displace"),
            Err(TableError::Alloc(_)) => {
                assert_eq!(snapshot(&table), before, "torn state at failure point {n}");
                assert_eq!(table.len(), 1);
                assert_eq!(table.get("swept"), None);
            }
            Err(TableError::Full) => panic!("growth keeps the table sparse"),
        }

        // The table stays usable either way.
        faults.disarm();
        table.set("after", 2).expect("set after sweep");
        assert_eq!(table.get("after"), Some(&2));
        assert_eq!(table.get("seed"), Some(&0));
    }
}

// Test: removal never allocates.
// Verifies: remove succeeds with a fully denied policy.
#[test]
fn remove_works_with_denied_policy() {
    let faults = FaultAlloc::new();
    let mut table = filled_table(16, &["a", "b"], &faults);

    faults.fail_after(0);
    assert_eq!(table.remove("a"), Some(0));
    assert_eq!(table.len(), 1);
    assert_eq!(table.get("b"), Some(&1));
}

// Test: overwrites never allocate.
// Verifies: updating an existing key's value succeeds with a fully denied
// policy and hands back the displaced value.
#[test]
fn overwrite_works_with_denied_policy() {
    let faults = FaultAlloc::new();
    let mut table = filled_table(16, &["a", "b"], &faults);

    faults.fail_after(0);
    assert_eq!(table.set("b", 42), Ok(Some(1)));
    assert_eq!(table.get("b"), Some(&42));
    assert_eq!(table.len(), 2);
}
