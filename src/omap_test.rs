use std::ops::Bound;
use std::time::{SystemTime, UNIX_EPOCH};

use rand::prelude::random;
use rand::{rngs::SmallRng, SeedableRng};

use crate::error::Error;
use crate::omap::OMap;

#[test]
fn test_len() {
    let omap: OMap<i64, i64> = OMap::new();
    assert_eq!(omap.len(), 0);
    assert!(omap.is_empty());
    assert!(omap.keys().is_empty());
    assert!(omap.level_order().is_empty());
    assert_eq!(omap.height(), 0);
    assert_eq!(omap.iter().next(), None);
    assert!(omap.validate().is_ok());
}

#[test]
fn test_underflow() {
    let mut omap: OMap<i64, i64> = OMap::new();
    assert_eq!(omap.min(), Err(Error::Underflow));
    assert_eq!(omap.max(), Err(Error::Underflow));
    assert_eq!(omap.floor(&10), Err(Error::Underflow));
    assert_eq!(omap.ceil(&10), Err(Error::Underflow));
    assert_eq!(omap.delete_min(), Err(Error::Underflow));
    assert_eq!(omap.delete_max(), Err(Error::Underflow));
    assert_eq!(omap.select(0), Err(Error::RankOutOfBounds(0, 0)));
    assert_eq!(omap.rank(&10), 0);
}

#[test]
fn test_set() {
    let mut omap: OMap<i64, i64> = OMap::new();
    let mut refns = RefNodes::new(10);

    for key in [2, 1, 3, 6, 5, 4, 8, 0, 9, 7].iter() {
        assert!(omap.set(*key, 10).is_none());
        refns.set(*key, 10);
        omap.validate().expect("valid tree");
    }

    assert_eq!(omap.len(), 10);

    // overwrite is an update, not an insert.
    assert_eq!(omap.set(7, 20), Some(10));
    refns.set(7, 20);
    assert_eq!(omap.len(), 10);
    omap.validate().expect("valid tree");

    // test get
    for i in 0..10 {
        let val = omap.get(&i);
        let refval = refns.get(i);
        assert_eq!(val, refval);
        assert!(omap.contains_key(&i));
    }
    // test iter
    let (mut iter, mut iter_ref) = (omap.iter(), refns.iter());
    loop {
        match (iter.next(), iter_ref.next()) {
            (Some(item), Some(ref_item)) => {
                assert_eq!(item.0, ref_item.0);
                assert_eq!(item.1, ref_item.1);
            }
            (None, None) => break,
            (_, _) => panic!("invalid"),
        }
    }
}

#[test]
fn test_delete() {
    let mut omap: OMap<i64, i64> = OMap::new();
    let mut refns = RefNodes::new(11);

    for key in [2, 1, 3, 6, 5, 4, 8, 0, 9, 7].iter() {
        assert!(omap.set(*key, 100).is_none());
        refns.set(*key, 100);
    }

    // delete a missing key is a no-op.
    let keys_before = omap.keys();
    assert!(omap.delete(&10).is_none());
    assert!(refns.delete(10).is_none());
    assert_eq!(omap.len(), 10);
    assert_eq!(omap.keys(), keys_before);
    omap.validate().expect("valid tree");

    // delete all entries in ascending order, validating each step.
    for i in 0..10 {
        let val = omap.delete(&i);
        let refval = refns.delete(i);
        assert_eq!(val, refval);
        assert_eq!(omap.len(), (9 - i) as usize);
        omap.validate().expect("valid tree");
    }
    assert_eq!(omap.len(), 0);
    assert!(omap.iter().next().is_none());
}

#[test]
fn test_delete_min_max() {
    let mut omap: OMap<i64, i64> = OMap::new();

    for key in 1..=1000 {
        omap.set(key, key * 10);
    }
    for key in 1..=1000 {
        assert_eq!(omap.delete_min(), Ok((key, key * 10)));
        if key % 53 == 0 {
            omap.validate().expect("valid tree");
        }
    }
    assert_eq!(omap.len(), 0);
    assert_eq!(omap.delete_min(), Err(Error::Underflow));

    for key in 1..=1000 {
        omap.set(key, key * 10);
    }
    for key in (1..=1000).rev() {
        assert_eq!(omap.delete_max(), Ok((key, key * 10)));
        if key % 53 == 0 {
            omap.validate().expect("valid tree");
        }
    }
    assert_eq!(omap.len(), 0);
    assert_eq!(omap.delete_max(), Err(Error::Underflow));
}

#[test]
fn test_char_table() {
    let input: Vec<(char, i64)> = vec![
        ('L', 11),
        ('P', 10),
        ('M', 9),
        ('X', 7),
        ('H', 5),
        ('C', 4),
        ('R', 3),
        ('A', 8),
        ('E', 12),
        ('S', 0),
    ];
    let mut omap: OMap<char, i64> = OMap::load_from(input.into_iter());
    assert_eq!(omap.len(), 10);
    omap.validate().expect("valid tree");

    assert_eq!(omap.delete(&'E'), Some(12));
    assert_eq!(omap.len(), 9);
    omap.validate().expect("valid tree");

    let keys: Vec<char> = vec!['A', 'C', 'H', 'L', 'M', 'P', 'R', 'S', 'X'];
    assert_eq!(omap.keys(), keys);
    assert_eq!(omap.get(&'A'), Some(8));
    assert_eq!(omap.get(&'S'), Some(0));
    assert!(!omap.contains_key(&'E'));

    assert_eq!(omap.min(), Ok('A'));
    assert_eq!(omap.max(), Ok('X'));

    // four keys, A C H L, sort before M.
    assert_eq!(omap.rank(&'M'), 4);
    assert_eq!(omap.select(4), Ok('M'));
    assert_eq!(omap.select(3), Ok('L'));
    assert_eq!(omap.rank(&'D'), 2);
    assert_eq!(omap.select(9), Err(Error::RankOutOfBounds(9, 9)));

    assert_eq!(omap.floor(&'D'), Ok('C'));
    assert_eq!(omap.ceil(&'D'), Ok('H'));
    assert_eq!(omap.floor(&'M'), Ok('M'));
    assert_eq!(omap.ceil(&'M'), Ok('M'));
    assert_eq!(omap.floor(&'@'), Err(Error::NoFloor));
    assert_eq!(omap.ceil(&'Z'), Err(Error::NoCeil));

    assert_eq!(omap.range_keys(&'C', &'R'), vec!['C', 'H', 'L', 'M', 'P', 'R']);
    assert_eq!(omap.range_count(&'C', &'R'), 6);
    assert_eq!(omap.range_count(&'D', &'G'), 0);
    assert_eq!(omap.range_count(&'R', &'C'), 0);
    assert_eq!(omap.range_count(&'A', &'Z'), 9);

    let levels = vec![
        vec!['M'],
        vec!['H', 'R'],
        vec!['C', 'L', 'P', 'X'],
        vec!['A', 'S'],
    ];
    assert_eq!(omap.level_order(), levels);
    assert_eq!(omap.height(), 4);
}

#[test]
fn test_rank_select() {
    let mut omap: OMap<i64, i64> = OMap::new();
    for _ in 0..1000 {
        let key: i64 = (random::<i64>() % 5000).abs();
        omap.set(key, key * 2);
    }
    omap.validate().expect("valid tree");

    for i in 0..omap.len() {
        let key = omap.select(i).expect("rank in bounds");
        assert_eq!(omap.rank(&key), i);
    }
    for key in omap.keys() {
        assert_eq!(omap.select(omap.rank(&key)), Ok(key));
    }
    let n = omap.len();
    assert_eq!(omap.select(n), Err(Error::RankOutOfBounds(n, n)));
}

#[test]
fn test_height() {
    let mut omap: OMap<i64, i64> = OMap::new();
    for _ in 0..2000 {
        let key: i64 = (random::<i64>() % 4000).abs();
        match random::<u8>() % 3 {
            0 | 1 => {
                omap.set(key, key);
            }
            _ => {
                omap.delete(&key);
            }
        }
        let bound = 2.0 * (((omap.len() + 1) as f64).log2());
        assert!((omap.height() as f64) <= bound + 1e-9, "height {}", omap.height());
        assert_eq!(omap.height(), omap.level_order().len());
    }
}

#[test]
fn test_range() {
    let mut omap: OMap<i64, i64> = OMap::new();
    for key in (0..100).map(|k| k * 2) {
        omap.set(key, key + 1);
    }

    let items: Vec<(i64, i64)> = omap
        .range((Bound::Included(10), Bound::Excluded(20)))
        .collect();
    assert_eq!(items, vec![(10, 11), (12, 13), (14, 15), (16, 17), (18, 19)]);

    let items: Vec<(i64, i64)> = omap
        .range((Bound::Excluded(10), Bound::Included(20)))
        .collect();
    assert_eq!(items, vec![(12, 13), (14, 15), (16, 17), (18, 19), (20, 21)]);

    // bounds need not be present keys.
    let keys: Vec<i64> = omap
        .range((Bound::Included(9), Bound::Included(15)))
        .map(|item| item.0)
        .collect();
    assert_eq!(keys, vec![10, 12, 14]);

    let keys: Vec<i64> = omap
        .range((Bound::Included(10), Bound::Included(14)))
        .rev()
        .map(|item| item.0)
        .collect();
    assert_eq!(keys, vec![14, 12, 10]);

    let all: Vec<i64> = omap.range::<_, i64>(..).map(|item| item.0).collect();
    assert_eq!(all.len(), 100);
}

#[test]
fn test_random() {
    let mut omap: OMap<i64, i64> = OMap::new();
    let mut rng = SmallRng::from_seed(make_seed().to_le_bytes());

    assert_eq!(omap.random(&mut rng), None);

    omap.set(0, 0);
    assert_eq!(omap.random(&mut rng), Some((0, 0)));
    assert_eq!(omap.random(&mut rng), Some((0, 0)));

    for key in 1..10_000 {
        assert!(omap.set(key, key * 10).is_none());
    }
    for _i in 0..20_000 {
        let (key, value) = omap.random(&mut rng).unwrap();
        assert!(key >= 0 && key < 10_000);
        assert_eq!(value, key * 10);
    }
}

#[test]
fn test_stats() {
    let mut omap: OMap<i64, i64> = OMap::new();
    assert_eq!(omap.stats().entries(), 0);

    for key in 0..512 {
        omap.set(key, key);
    }
    assert_eq!(omap.stats().entries(), 512);

    let stats = omap.validate().expect("valid tree");
    assert_eq!(stats.entries(), 512);
    assert!(stats.blacks().unwrap() > 0);
    // a binary tree with n nodes has n+1 empty links.
    let depths = stats.depths().expect("depth samples");
    assert_eq!(depths.samples(), 513);
    assert!(depths.min() <= depths.mean() && depths.mean() <= depths.max());
}

#[test]
fn test_crud() {
    let size = 200;
    let mut omap: OMap<i64, i64> = OMap::new();
    let mut refns = RefNodes::new(size);

    for _ in 0..5_000 {
        let key: i64 = (random::<i64>() % (size as i64)).abs();
        let value: i64 = random();
        match (random::<i64>() % 5).abs() {
            0 | 1 => {
                let val = omap.set(key, value);
                let refval = refns.set(key, value);
                assert_eq!(val, refval);
            }
            2 => {
                let val = omap.delete(&key);
                let refval = refns.delete(key);
                assert_eq!(val, refval);
            }
            3 => {
                let val = omap.get(&key);
                let refval = refns.get(key);
                assert_eq!(val, refval);
            }
            4 => {
                let keys = refns.keys();
                let floor = keys.iter().rev().find(|&&k| k <= key).cloned();
                let ceil = keys.iter().find(|&&k| k >= key).cloned();
                match omap.floor(&key) {
                    Ok(k) => assert_eq!(Some(k), floor),
                    Err(Error::Underflow) => assert!(keys.is_empty()),
                    Err(Error::NoFloor) => assert_eq!(floor, None),
                    Err(err) => panic!("unexpected {:?}", err),
                }
                match omap.ceil(&key) {
                    Ok(k) => assert_eq!(Some(k), ceil),
                    Err(Error::Underflow) => assert!(keys.is_empty()),
                    Err(Error::NoCeil) => assert_eq!(ceil, None),
                    Err(err) => panic!("unexpected {:?}", err),
                }
                let rank = keys.iter().filter(|&&k| k < key).count();
                assert_eq!(omap.rank(&key), rank);
                if !keys.is_empty() {
                    let i = random::<usize>() % keys.len();
                    assert_eq!(omap.select(i), Ok(keys[i]));
                }
            }
            op => panic!("unreachable {}", op),
        };

        assert_eq!(omap.len(), refns.len());
        omap.validate().expect("valid tree");
    }

    // test iter
    let (mut iter, mut iter_ref) = (omap.iter(), refns.iter());
    loop {
        match (iter.next(), iter_ref.next()) {
            (Some(item), Some(ref_item)) => {
                assert_eq!(item.0, ref_item.0);
                assert_eq!(item.1, ref_item.1);
            }
            (None, None) => break,
            (_, _) => panic!("invalid"),
        }
    }

    // ranges and reverses
    for _ in 0..1_000 {
        let (low, high) = random_low_high(size);

        let mut iter = omap.range((low, high));
        let mut iter_ref = refns.range(low, high);
        loop {
            match (iter.next(), iter_ref.next()) {
                (Some(item), Some(ref_item)) => {
                    assert_eq!(item.0, ref_item.0);
                    assert_eq!(item.1, ref_item.1);
                }
                (None, None) => break,
                (Some(item), None) => panic!("invalid item: {:?}", item),
                (None, Some(ref_item)) => panic!("invalid none: {:?}", ref_item),
            }
        }

        let mut iter = omap.range((low, high)).rev();
        let mut iter_ref = refns.reverse(low, high);
        loop {
            match (iter.next(), iter_ref.next()) {
                (Some(item), Some(ref_item)) => {
                    assert_eq!(item.0, ref_item.0);
                    assert_eq!(item.1, ref_item.1);
                }
                (None, None) => break,
                (_, _) => panic!("invalid"),
            }
        }

        // count by rank arithmetic agrees with a walked range.
        let low = (random::<u64>() % (size as u64)) as i64;
        let high = (random::<u64>() % (size as u64)) as i64;
        let walked = omap.range_keys(&low, &high);
        assert_eq!(omap.range_count(&low, &high), walked.len());
        let filtered: Vec<i64> = refns
            .keys()
            .into_iter()
            .filter(|&k| low <= k && k <= high)
            .collect();
        assert_eq!(walked, filtered);
    }
}

fn make_seed() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos()
}

include!("./ref_test.rs");
