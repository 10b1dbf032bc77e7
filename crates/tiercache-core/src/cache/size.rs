//! Approximate size estimation for cached values.
//!
//! Sizes feed `memory_usage` and per-tier memory stats. They are estimates:
//! length-based for strings, sequences and maps, a fixed constant otherwise.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

/// Fallback estimate for values without a length-based size.
pub const DEFAULT_SIZE_ESTIMATE: usize = 1024;

/// Per-element overhead charged for map and sequence entries.
const SLOT_OVERHEAD: usize = 8;

/// Best-effort byte footprint of a cached value.
///
/// The default method returns [`DEFAULT_SIZE_ESTIMATE`]; implement
/// `estimate_size` for anything with a cheaper, more accurate answer.
pub trait EstimateSize {
    /// Approximate size in bytes.
    fn estimate_size(&self) -> usize {
        DEFAULT_SIZE_ESTIMATE
    }
}

/// Estimates a value's size, falling back to the default constant if the
/// estimator panics.
pub(crate) fn estimate_or_default<V: EstimateSize>(key: &str, value: &V) -> usize {
    match catch_unwind(AssertUnwindSafe(|| value.estimate_size())) {
        Ok(size) => size,
        Err(_) => {
            tracing::warn!(key, "Size estimator panicked, using default estimate");
            DEFAULT_SIZE_ESTIMATE
        }
    }
}

impl EstimateSize for String {
    fn estimate_size(&self) -> usize {
        self.len()
    }
}

impl EstimateSize for str {
    fn estimate_size(&self) -> usize {
        self.len()
    }
}

impl EstimateSize for Vec<u8> {
    fn estimate_size(&self) -> usize {
        self.len()
    }
}

impl EstimateSize for Vec<String> {
    fn estimate_size(&self) -> usize {
        self.iter().map(|s| s.len() + SLOT_OVERHEAD).sum()
    }
}

impl<T> EstimateSize for VecDeque<T> {
    fn estimate_size(&self) -> usize {
        self.len() * SLOT_OVERHEAD
    }
}

impl<T> EstimateSize for HashSet<T> {
    fn estimate_size(&self) -> usize {
        self.len() * SLOT_OVERHEAD
    }
}

impl<K, V, S> EstimateSize for HashMap<K, V, S> {
    fn estimate_size(&self) -> usize {
        self.len() * 2 * SLOT_OVERHEAD
    }
}

impl<K, V> EstimateSize for BTreeMap<K, V> {
    fn estimate_size(&self) -> usize {
        self.len() * 2 * SLOT_OVERHEAD
    }
}

impl<T: EstimateSize> EstimateSize for Option<T> {
    fn estimate_size(&self) -> usize {
        self.as_ref().map_or(0, EstimateSize::estimate_size)
    }
}

impl<T: EstimateSize + ?Sized> EstimateSize for Box<T> {
    fn estimate_size(&self) -> usize {
        (**self).estimate_size()
    }
}

impl<T: EstimateSize + ?Sized> EstimateSize for Arc<T> {
    fn estimate_size(&self) -> usize {
        (**self).estimate_size()
    }
}

impl EstimateSize for serde_json::Value {
    fn estimate_size(&self) -> usize {
        use serde_json::Value;
        match self {
            Value::Null | Value::Bool(_) | Value::Number(_) => SLOT_OVERHEAD,
            Value::String(s) => s.len(),
            Value::Array(items) => items.iter().map(EstimateSize::estimate_size).sum(),
            Value::Object(map) => map
                .iter()
                .map(|(k, v)| k.len() + v.estimate_size())
                .sum(),
        }
    }
}

macro_rules! fixed_size_estimate {
    ($($ty:ty),* $(,)?) => {
        $(impl EstimateSize for $ty {})*
    };
}

// Scalars carry no length; they use the fallback constant.
fixed_size_estimate!(bool, char, u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize, f32, f64);

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Exploding;

    impl EstimateSize for Exploding {
        fn estimate_size(&self) -> usize {
            panic!("cannot size this value")
        }
    }

    #[test]
    fn test_string_is_length_based() {
        assert_eq!("hello".to_string().estimate_size(), 5);
        assert_eq!(String::new().estimate_size(), 0);
    }

    #[test]
    fn test_sequences_and_maps_scale_with_len() {
        let bytes = vec![0u8; 64];
        assert_eq!(bytes.estimate_size(), 64);

        let mut map = HashMap::new();
        map.insert(1, 2);
        map.insert(3, 4);
        assert_eq!(map.estimate_size(), 2 * 2 * SLOT_OVERHEAD);
    }

    #[test]
    fn test_scalars_use_fallback() {
        assert_eq!(42u64.estimate_size(), DEFAULT_SIZE_ESTIMATE);
        assert_eq!(1.5f64.estimate_size(), DEFAULT_SIZE_ESTIMATE);
    }

    #[test]
    fn test_wrappers_delegate() {
        let shared: Arc<String> = Arc::new("abc".to_string());
        assert_eq!(shared.estimate_size(), 3);
        assert_eq!(Some("abcd".to_string()).estimate_size(), 4);
        assert_eq!(None::<String>.estimate_size(), 0);
    }

    #[test]
    fn test_json_value_size() {
        let value = json!({"name": "ab", "tags": ["x", "yz"]});
        // "name" + "ab" + "tags" + "x" + "yz"
        assert_eq!(value.estimate_size(), 4 + 2 + 4 + 1 + 2);
    }

    #[test]
    fn test_panicking_estimator_falls_back() {
        assert_eq!(estimate_or_default("k", &Exploding), DEFAULT_SIZE_ESTIMATE);
    }
}
