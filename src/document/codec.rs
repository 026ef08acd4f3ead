//! Typed metadata codec
//!
//! The graph engine has no heterogeneous map type, so a metadata map is
//! stored as three parallel typed map columns, one per scalar type.
//! `encode` partitions a map by value type; `decode` unions the three
//! buckets back into one map.
//!
//! Round-trip invariant: `decode(encode(m)) == m` for every [`Metadata`]
//! map `m`. Key uniqueness across buckets is guaranteed by `encode` (one
//! key, one value, one type) and assumed by `decode`; a malformed stored
//! row holding a key in several buckets decodes deterministically with
//! string > int > float precedence.

use std::collections::BTreeMap;

use super::{MetaValue, Metadata};

/// Partitions metadata into the three typed column maps.
///
/// Any of the returned maps may be empty.
pub fn encode(
    meta: &Metadata,
) -> (
    BTreeMap<String, String>,
    BTreeMap<String, i64>,
    BTreeMap<String, f64>,
) {
    let mut strings = BTreeMap::new();
    let mut ints = BTreeMap::new();
    let mut floats = BTreeMap::new();

    for (key, value) in meta {
        match value {
            MetaValue::Str(s) => {
                strings.insert(key.clone(), s.clone());
            }
            MetaValue::Int(i) => {
                ints.insert(key.clone(), *i);
            }
            MetaValue::Float(f) => {
                floats.insert(key.clone(), *f);
            }
        }
    }

    (strings, ints, floats)
}

/// Unions the three typed column maps back into one metadata map.
///
/// Insertion order is float, int, string, so on a (malformed) key
/// collision the string bucket wins, then int, then float.
pub fn decode(
    strings: &BTreeMap<String, String>,
    ints: &BTreeMap<String, i64>,
    floats: &BTreeMap<String, f64>,
) -> Metadata {
    let mut meta = Metadata::new();

    for (key, value) in floats {
        meta.insert(key.clone(), MetaValue::Float(*value));
    }
    for (key, value) in ints {
        meta.insert(key.clone(), MetaValue::Int(*value));
    }
    for (key, value) in strings {
        meta.insert(key.clone(), MetaValue::Str(value.clone()));
    }

    meta
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_meta() -> Metadata {
        let mut meta = Metadata::new();
        meta.insert("type".into(), MetaValue::Str("article".into()));
        meta.insert("rating".into(), MetaValue::Int(4));
        meta.insert("score".into(), MetaValue::Float(0.87));
        meta
    }

    #[test]
    fn test_encode_partitions_by_type() {
        let (strings, ints, floats) = encode(&sample_meta());

        assert_eq!(strings.get("type"), Some(&"article".to_string()));
        assert_eq!(ints.get("rating"), Some(&4));
        assert_eq!(floats.get("score"), Some(&0.87));
        assert_eq!(strings.len(), 1);
        assert_eq!(ints.len(), 1);
        assert_eq!(floats.len(), 1);
    }

    #[test]
    fn test_roundtrip() {
        let meta = sample_meta();
        let (strings, ints, floats) = encode(&meta);
        assert_eq!(decode(&strings, &ints, &floats), meta);
    }

    #[test]
    fn test_roundtrip_empty() {
        let meta = Metadata::new();
        let (strings, ints, floats) = encode(&meta);
        assert!(strings.is_empty() && ints.is_empty() && floats.is_empty());
        assert_eq!(decode(&strings, &ints, &floats), meta);
    }

    #[test]
    fn test_decode_collision_precedence() {
        // A malformed row: the same key in all three buckets.
        let mut strings = BTreeMap::new();
        strings.insert("k".to_string(), "s".to_string());
        let mut ints = BTreeMap::new();
        ints.insert("k".to_string(), 1);
        let mut floats = BTreeMap::new();
        floats.insert("k".to_string(), 2.0);

        let meta = decode(&strings, &ints, &floats);
        assert_eq!(meta.get("k"), Some(&MetaValue::Str("s".into())));

        // Without the string bucket, int wins over float.
        strings.clear();
        let meta = decode(&strings, &ints, &floats);
        assert_eq!(meta.get("k"), Some(&MetaValue::Int(1)));
    }
}
