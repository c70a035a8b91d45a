// File: src/equality.rs
// Purpose: Shallow structural equality used to suppress redundant notifications

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::hash::{BuildHasher, Hash};

use chrono::{DateTime, Utc};
use serde_json::Value;

/// One-level structural equality.
///
/// Scalars and strings compare by value; containers compare element-wise
/// one level deep; timestamps compare by instant; JSON values compare by
/// top-level shape. This is the default equality for the store bridges —
/// it only suppresses *redundant* notifications, it never reorders
/// distinct ones.
pub trait ShallowEq {
    fn shallow_eq(&self, other: &Self) -> bool;
}

/// Free-function form of [`ShallowEq`], convenient as a default argument.
pub fn shallow_eq<T: ShallowEq>(a: &T, b: &T) -> bool {
    a.shallow_eq(b)
}

macro_rules! shallow_eq_via_partial_eq {
    ($($ty:ty),* $(,)?) => {
        $(
            impl ShallowEq for $ty {
                fn shallow_eq(&self, other: &Self) -> bool {
                    self == other
                }
            }
        )*
    };
}

shallow_eq_via_partial_eq!(
    (),
    bool,
    char,
    i8,
    i16,
    i32,
    i64,
    i128,
    isize,
    u8,
    u16,
    u32,
    u64,
    u128,
    usize,
    f32,
    f64,
    String,
    &str,
);

impl<T: PartialEq> ShallowEq for Vec<T> {
    fn shallow_eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().zip(other).all(|(a, b)| a == b)
    }
}

impl<T: PartialEq> ShallowEq for Option<T> {
    fn shallow_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (None, None) => true,
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }
}

impl<A: PartialEq, B: PartialEq> ShallowEq for (A, B) {
    fn shallow_eq(&self, other: &Self) -> bool {
        self.0 == other.0 && self.1 == other.1
    }
}

impl<K: Eq + Hash, V: PartialEq, S: BuildHasher> ShallowEq for HashMap<K, V, S> {
    fn shallow_eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self.iter().all(|(key, value)| other.get(key) == Some(value))
    }
}

impl<K: Ord, V: PartialEq> ShallowEq for BTreeMap<K, V> {
    fn shallow_eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self.iter().all(|(key, value)| other.get(key) == Some(value))
    }
}

impl<T: Eq + Hash, S: BuildHasher> ShallowEq for HashSet<T, S> {
    fn shallow_eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|item| other.contains(item))
    }
}

impl<T: Ord> ShallowEq for BTreeSet<T> {
    fn shallow_eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|item| other.contains(item))
    }
}

impl ShallowEq for DateTime<Utc> {
    fn shallow_eq(&self, other: &Self) -> bool {
        self == other
    }
}

impl ShallowEq for Value {
    fn shallow_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Object(a), Value::Object(b)) => {
                a.len() == b.len() && a.iter().all(|(key, value)| b.get(key) == Some(value))
            }
            (Value::Array(a), Value::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x == y)
            }
            (a, b) => a == b,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case(json!({"a": 1, "b": 2}), json!({"a": 1, "b": 2}), true)]
    #[case(json!({"a": 1}), json!({"a": 2}), false)]
    #[case(json!({"a": 1}), json!({"a": 1, "b": 2}), false)]
    #[case(json!([1, 2, 3]), json!([1, 2, 3]), true)]
    #[case(json!([1, 2]), json!([2, 1]), false)]
    #[case(json!(null), json!(null), true)]
    fn test_json_shallow_eq(#[case] a: Value, #[case] b: Value, #[case] expected: bool) {
        assert_eq!(shallow_eq(&a, &b), expected);
    }

    #[test]
    fn test_map_set_shallow_eq() {
        let a: HashMap<&str, i32> = [("x", 1), ("y", 2)].into_iter().collect();
        let b: HashMap<&str, i32> = [("y", 2), ("x", 1)].into_iter().collect();
        assert!(shallow_eq(&a, &b));

        let c: HashSet<&str> = ["p", "q"].into_iter().collect();
        let d: HashSet<&str> = ["q", "p"].into_iter().collect();
        assert!(shallow_eq(&c, &d));
        let e: HashSet<&str> = ["p"].into_iter().collect();
        assert!(!shallow_eq(&c, &e));
    }

    #[test]
    fn test_datetime_compares_by_instant() {
        let now = Utc::now();
        assert!(shallow_eq(&now, &now.clone()));
        assert!(!shallow_eq(&now, &(now + chrono::Duration::seconds(1))));
    }
}
