//! Result records.
//!
//! Every finalized query computes one [`RecordShape`] (its output names) when it
//! is built; each decoded row is a [`Record`] sharing that shape.

use crate::error::{DbError, DbResult};
use crate::value::{FromValue, Value};
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::HashMap;
use std::ops::Index;
use std::sync::Arc;

/// Output names of a query, in SELECT-list order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordShape {
    names: Vec<String>,
    index: HashMap<String, usize>,
}

impl RecordShape {
    /// Build the name table from each item's natural name.
    ///
    /// A missing name, a name that is not a plain identifier, a name starting
    /// with `_`, or a repeat of an earlier name becomes `_<position>`.
    pub(crate) fn new(natural: Vec<Option<String>>) -> Self {
        let mut names = Vec::with_capacity(natural.len());
        let mut index = HashMap::with_capacity(natural.len());
        for (i, name) in natural.into_iter().enumerate() {
            let name = match name {
                Some(n) if is_field_name(&n) && !index.contains_key(&n) => n,
                _ => format!("_{i}"),
            };
            index.insert(name.clone(), i);
            names.push(name);
        }
        Self { names, index }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

fn is_field_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
}

/// One result row: values positionally matched to the query's output names.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    shape: Arc<RecordShape>,
    values: Vec<Value>,
}

impl Record {
    pub(crate) fn from_row(shape: Arc<RecordShape>, values: Vec<Value>) -> DbResult<Self> {
        if values.len() != shape.len() {
            return Err(DbError::decode(
                "*",
                format!(
                    "row has {} columns, query selects {}",
                    values.len(),
                    shape.len()
                ),
            ));
        }
        Ok(Self { shape, values })
    }

    /// Value of the named field.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.shape.position(name).map(|i| &self.values[i])
    }

    /// Typed value of the named field.
    pub fn try_get<T: FromValue>(&self, name: &str) -> DbResult<T> {
        let value = self
            .get(name)
            .ok_or_else(|| DbError::decode(name, "no such field"))?;
        T::from_value(value).map_err(|message| DbError::decode(name, message))
    }

    /// Value at a position.
    pub fn value(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn names(&self) -> &[String] {
        self.shape.names()
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn shape(&self) -> &RecordShape {
        &self.shape
    }

    /// `(name, value)` pairs in SELECT-list order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.shape
            .names()
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }
}

impl Index<usize> for Record {
    type Output = Value;

    fn index(&self, index: usize) -> &Value {
        &self.values[index]
    }
}

impl Index<&str> for Record {
    type Output = Value;

    fn index(&self, name: &str) -> &Value {
        match self.get(name) {
            Some(value) => value,
            None => panic!("record has no field '{name}'"),
        }
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (name, value) in self.iter() {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Conversion from a result record.
///
/// Implemented for [`Record`] itself and for tuples of [`FromValue`] types,
/// which are matched by position.
pub trait FromRecord: Sized {
    fn from_record(record: &Record) -> DbResult<Self>;
}

impl FromRecord for Record {
    fn from_record(record: &Record) -> DbResult<Self> {
        Ok(record.clone())
    }
}

macro_rules! tuple_from_record {
    ($len:expr => $($ty:ident $idx:tt),+) => {
        impl<$($ty: FromValue),+> FromRecord for ($($ty,)+) {
            fn from_record(record: &Record) -> DbResult<Self> {
                if record.len() != $len {
                    return Err(DbError::decode(
                        "*",
                        format!("expected {} columns, record has {}", $len, record.len()),
                    ));
                }
                Ok(($(
                    $ty::from_value(&record.values[$idx])
                        .map_err(|m| DbError::decode(record.names()[$idx].clone(), m))?,
                )+))
            }
        }
    };
}

tuple_from_record!(1 => A 0);
tuple_from_record!(2 => A 0, B 1);
tuple_from_record!(3 => A 0, B 1, C 2);
tuple_from_record!(4 => A 0, B 1, C 2, D 3);
tuple_from_record!(5 => A 0, B 1, C 2, D 3, E 4);
tuple_from_record!(6 => A 0, B 1, C 2, D 3, E 4, F 5);
