use native_containers::collections::MultiHashMap;

fn sorted<T: Ord>(mut values: Vec<T>) -> Vec<T> {
    values.sort_unstable();
    values
}

#[test]
fn cursor_walks_every_value_of_one_key() {
    let mut map = MultiHashMap::with_capacity(2);
    for value in 0..5u32 {
        map.add("k", value);
    }
    map.add("other", 99);

    let (first, mut cursor) = map.try_get_first_value(&"k").unwrap();
    assert_eq!(cursor.key(), "k");
    let mut seen = vec![first];
    while let Some(value) = map.try_get_next_value(&mut cursor) {
        seen.push(value);
    }
    assert_eq!(sorted(seen), vec![0, 1, 2, 3, 4]);
    assert_eq!(map.count_values_for_key(&"k"), 5);
    assert_eq!(
        sorted(map.get_values_for_key(&"k").copied().collect()),
        vec![0, 1, 2, 3, 4]
    );
    assert!(map.try_get_first_value(&"missing").is_none());
}

#[test]
fn set_value_keeps_the_cursor_usable() {
    let mut map = MultiHashMap::with_capacity(4);
    map.add(1u8, 10u16);
    map.add(1, 20);

    let (_, cursor) = map.try_get_first_value(&1).unwrap();
    map.set_value(30, &cursor);
    let mut cursor = cursor;
    let rest = map.try_get_next_value(&mut cursor);
    assert!(rest.is_some());
    assert_eq!(sorted(map.get_values_for_key(&1).copied().collect()), {
        let mut expected = vec![30, rest.unwrap()];
        expected.sort_unstable();
        expected
    });
}

#[test]
fn remove_at_drops_a_single_entry() {
    let mut map = MultiHashMap::with_capacity(4);
    map.add('a', 1i64);
    map.add('a', 2);
    map.add('a', 3);

    let (removed, cursor) = map.try_get_first_value(&'a').unwrap();
    assert!(map.remove_at(cursor));
    assert_eq!(map.len(), 2);
    let left = sorted(map.get_values_for_key(&'a').copied().collect::<Vec<_>>());
    assert!(!left.contains(&removed));
    assert_eq!(left.len(), 2);
}

#[test]
fn remove_drops_every_value_for_a_key() {
    let mut map = MultiHashMap::new();
    map.extend([(1u32, 'x'), (1, 'y'), (2, 'z'), (1, 'w')]);
    assert_eq!(map.remove(&1), 3);
    assert_eq!(map.remove(&1), 0);
    assert_eq!(map.len(), 1);
    assert!(!map.contains_key(&1));
    assert_eq!(map.unique_keys(), vec![2]);
}

#[test]
fn unique_keys_and_arrays() {
    let mut map = MultiHashMap::with_capacity(1);
    for k in 0..20u16 {
        for v in 0..3u16 {
            map.add(k % 7, v);
        }
    }
    assert_eq!(sorted(map.unique_keys()), (0..7).collect::<Vec<_>>());
    assert_eq!(map.keys_to_vec().len(), 60);
    let arrays = map.to_key_value_arrays();
    assert_eq!(arrays.keys.len(), arrays.values.len());
    assert_eq!(map.iter().count(), 60);
    assert_eq!(map.as_read_only().count_values_for_key(&3), 9);
}

#[test]
fn removed_slots_are_reused() {
    let mut map = MultiHashMap::with_capacity(4);
    map.extend([(1u8, 1u8), (1, 2), (2, 3), (2, 4)]);
    assert_eq!(map.capacity(), 4);
    map.remove(&1);
    map.add(3, 5);
    map.add(3, 6);
    assert_eq!(map.capacity(), 4);
    map.clear();
    assert!(map.is_empty());
    assert!(map.unique_keys().is_empty());
}

#[cfg(debug_assertions)]
#[test]
#[should_panic(expected = "was modified after this view was taken")]
fn stale_cursor_panics_in_debug_builds() {
    let mut map = MultiHashMap::with_capacity(4);
    map.add(1u8, 1u8);
    map.add(1, 2);
    let (_, mut cursor) = map.try_get_first_value(&1).unwrap();
    map.add(2, 3);
    let _ = map.try_get_next_value(&mut cursor);
}

// Debug builds may reject the cursor earlier through the generation check.
#[test]
#[should_panic]
fn cursor_from_a_larger_map_is_rejected() {
    let mut big = MultiHashMap::with_capacity(64);
    for v in 0..40u8 {
        big.add(0u8, v);
    }
    let (_, cursor) = big.try_get_first_value(&0).unwrap();

    let mut small = MultiHashMap::with_capacity(4);
    small.add(0u8, 0u8);
    small.set_value(1, &cursor);
}
