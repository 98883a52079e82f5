//! Weighted relations (Z-sets): multisets of rows where each distinct row carries an integer weight.
//!
//! Weights are stored as `i64`.  The weight type a circuit is compiled for may be narrower (the JIT
//! backend uses 32-bit weights), so arithmetic that produces weights for a circuit goes through
//! `WeightType::check`.

use std::collections::BTreeMap;

use crate::typed_row::Row;

/// Integer representation of weights, chosen once per compilation session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WeightType {
    I32,
    I64,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Weight {weight} does not fit in weight type {ty}")]
    WeightOverflow { weight: i128, ty: WeightType },
}

impl WeightType {
    /// The JIT backend has a hardwired 32-bit weight.
    pub fn for_backend(jit: bool) -> Self {
        if jit {
            WeightType::I32
        } else {
            WeightType::I64
        }
    }

    pub fn bits(&self) -> u32 {
        match self {
            WeightType::I32 => 32,
            WeightType::I64 => 64,
        }
    }

    /// Returns `weight` if it is representable in this weight type.
    pub fn check(&self, weight: i128) -> Result<i64, Error> {
        let fits = match self {
            WeightType::I32 => i32::try_from(weight).is_ok(),
            WeightType::I64 => i64::try_from(weight).is_ok(),
        };
        if fits {
            Ok(weight as i64)
        } else {
            Err(Error::WeightOverflow { weight, ty: *self })
        }
    }

    pub fn add(&self, a: i64, b: i64) -> Result<i64, Error> {
        self.check(a as i128 + b as i128)
    }
}

impl std::fmt::Display for WeightType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WeightType::I32 => "i32".fmt(f),
            WeightType::I64 => "i64".fmt(f),
        }
    }
}

/// A Z-set.  Entries with weight zero are never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ZSet {
    entries: BTreeMap<Row, i64>,
}

impl ZSet {
    pub fn new() -> Self {
        ZSet::default()
    }

    /// A Z-set holding each row once.
    pub fn from_rows(rows: impl IntoIterator<Item = Row>, weight_type: WeightType) -> Result<Self, Error> {
        let mut result = ZSet::new();
        for row in rows {
            result.add(row, 1, weight_type)?;
        }
        Ok(result)
    }

    /// Adds `weight` to the weight of `row`.
    pub fn add(&mut self, row: Row, weight: i64, weight_type: WeightType) -> Result<(), Error> {
        if weight == 0 {
            return Ok(());
        }
        let current = self.entries.get(&row).copied().unwrap_or(0);
        let updated = weight_type.add(current, weight)?;
        if updated == 0 {
            self.entries.remove(&row);
        } else {
            self.entries.insert(row, updated);
        }
        Ok(())
    }

    /// Adds every entry of `other`.  If any resulting weight does not fit, nothing is added.
    pub fn add_zset(&mut self, other: &ZSet, weight_type: WeightType) -> Result<(), Error> {
        for (row, weight) in other.iter() {
            weight_type.add(self.weight(row), *weight)?;
        }
        for (row, weight) in other.iter() {
            self.add(row.clone(), *weight, weight_type)?;
        }
        Ok(())
    }

    pub fn negate(&self) -> ZSet {
        ZSet {
            entries: self
                .entries
                .iter()
                .map(|(row, weight)| (row.clone(), -weight))
                .collect(),
        }
    }

    /// Every row with a positive weight, with weight 1.
    pub fn distinct(&self) -> ZSet {
        ZSet {
            entries: self
                .entries
                .iter()
                .filter(|(_, weight)| **weight > 0)
                .map(|(row, _)| (row.clone(), 1))
                .collect(),
        }
    }

    pub fn weight(&self, row: &Row) -> i64 {
        self.entries.get(row).copied().unwrap_or(0)
    }

    /// The first row whose weight is negative, if any.
    pub fn first_negative(&self) -> Option<(&Row, i64)> {
        self.entries
            .iter()
            .find(|(_, weight)| **weight < 0)
            .map(|(row, weight)| (row, *weight))
    }

    /// Largest absolute weight, used to check that a literal fits a weight type.
    pub fn max_abs_weight(&self) -> i64 {
        self.entries
            .values()
            .map(|w| w.saturating_abs())
            .max()
            .unwrap_or(0)
    }

    pub fn iter(&self) -> std::collections::btree_map::Iter<'_, Row, i64> {
        self.entries.iter()
    }

    /// Number of distinct rows.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<'a> IntoIterator for &'a ZSet {
    type Item = (&'a Row, &'a i64);
    type IntoIter = std::collections::btree_map::Iter<'a, Row, i64>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl std::fmt::Display for ZSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{{{}}}",
            self.entries
                .iter()
                .map(|(row, weight)| format!("{} => {}", row, weight))
                .collect::<Vec<String>>()
                .join(", ")
        )
    }
}

impl serde::Serialize for ZSet {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeSeq;
        let mut seq = serializer.serialize_seq(Some(self.entries.len()))?;
        for (row, weight) in &self.entries {
            seq.serialize_element(&(row, weight))?;
        }
        seq.end()
    }
}

#[cfg(test)]
fn int_row(i: i64) -> Row {
    Row::new(vec![crate::sql_value::SqlValue::Int(i)])
}

#[test]
fn test_add_prunes_zero_weights() {
    let mut z = ZSet::new();
    z.add(int_row(1), 2, WeightType::I64).unwrap();
    z.add(int_row(1), -2, WeightType::I64).unwrap();
    assert!(z.is_empty());
    z.add(int_row(2), -1, WeightType::I64).unwrap();
    assert_eq!(z.first_negative(), Some((&int_row(2), -1)));
}

#[test]
fn test_distinct_and_negate() {
    let mut z = ZSet::new();
    z.add(int_row(1), 3, WeightType::I64).unwrap();
    z.add(int_row(2), -1, WeightType::I64).unwrap();
    let d = z.distinct();
    assert_eq!(d.len(), 1);
    assert_eq!(d.weight(&int_row(1)), 1);
    assert_eq!(z.negate().weight(&int_row(2)), 1);
}

#[test]
fn test_weight_type_overflow() {
    let mut z = ZSet::new();
    z.add(int_row(1), i32::MAX as i64, WeightType::I32).unwrap();
    assert_eq!(
        z.add(int_row(1), 1, WeightType::I32),
        Err(Error::WeightOverflow {
            weight: i32::MAX as i128 + 1,
            ty: WeightType::I32
        })
    );
    assert!(z.add(int_row(1), 1, WeightType::I64).is_ok());
}

#[test]
fn test_add_zset_is_all_or_nothing() {
    let mut z = ZSet::new();
    z.add(int_row(1), 1, WeightType::I32).unwrap();
    z.add(int_row(2), i32::MAX as i64, WeightType::I32).unwrap();
    let delta = ZSet::from_rows(vec![int_row(1), int_row(2)], WeightType::I32).unwrap();
    assert!(z.add_zset(&delta, WeightType::I32).is_err());
    assert_eq!(z.weight(&int_row(1)), 1);
    assert_eq!(z.weight(&int_row(2)), i32::MAX as i64);

    z.add_zset(&delta, WeightType::I64).unwrap();
    assert_eq!(z.weight(&int_row(1)), 2);
}

#[test]
fn test_display() {
    let z = ZSet::from_rows(vec![int_row(1), int_row(1)], WeightType::I64).unwrap();
    assert_eq!(z.to_string(), "{(1) => 2}");
}
