//! Decoded, typed columns.

use std::cmp::Ordering;
use std::fmt;

/// The literal that marks a missing value.
pub const NULL_MARKER: &str = "NULL";

/// The type inferred for a whole column.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ColumnType {
    /// Every value fits in an `i64`.
    Int,
    /// Every value parses as an `f64`, but not all of them as integers.
    Double,
    /// Anything else.
    String,
    /// The column holds nothing but NULL and empty values.
    Empty,
}

/// One decoded cell.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// The [`NULL_MARKER`].
    Null,
    /// The empty string.
    Empty,
    /// A value from an [`Int`](ColumnType::Int) column.
    Int(i64),
    /// A value from a [`Double`](ColumnType::Double) column.
    Double(f64),
    /// A value from a [`String`](ColumnType::String) column.
    String(String),
}

impl Value {
    /// Returns `true` for both NULL and empty cells, which share the reserved null value id.
    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Null | Value::Empty)
    }

    /// The text that identifies this value for interning: equal values, like `1.5` and `1.50`
    /// in a `Double` column, render the same way. Returns `None` for missing values.
    pub fn canonical(&self) -> Option<String> {
        match self {
            Value::Null | Value::Empty => None,
            Value::Int(i) => Some(i.to_string()),
            // Adding zero turns -0.0 into 0.0 so both intern together.
            Value::Double(d) => Some((d + 0.0).to_string()),
            Value::String(s) => Some(s.clone()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str(NULL_MARKER),
            Value::Empty => Ok(()),
            Value::Int(i) => write!(f, "{}", i),
            Value::Double(d) => write!(f, "{}", d),
            Value::String(s) => f.write_str(s),
        }
    }
}

/// A column of values decoded according to a single inferred [`ColumnType`].
#[derive(Clone, Debug)]
pub struct TypedColumn {
    index: usize,
    name: String,
    ty: ColumnType,
    values: Vec<Value>,
}

impl TypedColumn {
    /// Infers the column type from the raw strings and decodes every value.
    ///
    /// ```
    /// use agree_lattice::{ColumnType, TypedColumn};
    /// use std::cmp::Ordering;
    ///
    /// let column = TypedColumn::decode(0, "n", &["10", "9", "NULL", ""]);
    /// assert_eq!(column.type_id(), ColumnType::Int);
    /// assert_eq!(column.compare(0, 1), Ordering::Greater);
    /// assert!(column.is_null(2));
    /// assert!(column.is_empty(3));
    /// ```
    pub fn decode<S: AsRef<str>>(index: usize, name: &str, raw: &[S]) -> Self {
        let present = || {
            raw.iter()
                .map(AsRef::as_ref)
                .filter(|s| !s.is_empty() && *s != NULL_MARKER)
        };

        let ty = if present().next().is_none() {
            ColumnType::Empty
        } else if present().all(|s| s.parse::<i64>().is_ok()) {
            ColumnType::Int
        } else if present().all(|s| s.parse::<f64>().is_ok()) {
            ColumnType::Double
        } else {
            ColumnType::String
        };

        let values = raw
            .iter()
            .map(|s| {
                let s = s.as_ref();
                if s.is_empty() {
                    return Value::Empty;
                }
                if s == NULL_MARKER {
                    return Value::Null;
                }
                // The type was chosen so that every present value parses.
                match ty {
                    ColumnType::Int => s.parse().map_or(Value::Null, Value::Int),
                    ColumnType::Double => s.parse().map_or(Value::Null, Value::Double),
                    ColumnType::String | ColumnType::Empty => Value::String(s.to_owned()),
                }
            })
            .collect();

        TypedColumn {
            index,
            name: name.to_owned(),
            ty,
            values,
        }
    }

    /// The column's position in its relation.
    pub fn index(&self) -> usize {
        self.index
    }

    /// The header name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The inferred column type.
    pub fn type_id(&self) -> ColumnType {
        self.ty
    }

    /// The number of rows.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if the column has no rows.
    pub fn is_empty_column(&self) -> bool {
        self.values.is_empty()
    }

    /// All decoded values, in row order.
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Returns `true` if the value at `row` is the [`NULL_MARKER`].
    pub fn is_null(&self, row: usize) -> bool {
        matches!(self.values[row], Value::Null)
    }

    /// Returns `true` if the value at `row` is the empty string.
    pub fn is_empty(&self, row: usize) -> bool {
        matches!(self.values[row], Value::Empty)
    }

    /// Compares the values in rows `a` and `b`. Missing values are equal to each other and sort
    /// before everything else.
    pub fn compare(&self, a: usize, b: usize) -> Ordering {
        compare_values(&self.values[a], &self.values[b])
    }
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (a, b) if a.is_missing() && b.is_missing() => Ordering::Equal,
        (a, _) if a.is_missing() => Ordering::Less,
        (_, b) if b.is_missing() => Ordering::Greater,
        (Value::Int(a), Value::Int(b)) => a.cmp(b),
        (Value::Double(a), Value::Double(b)) => a.partial_cmp(b).unwrap_or_else(|| a.total_cmp(b)),
        (Value::String(a), Value::String(b)) => a.cmp(b),
        // A column holds one type only, so this just needs to be consistent.
        (a, b) => a.to_string().cmp(&b.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infers_types() {
        let infer = |raw: &[&str]| TypedColumn::decode(0, "a", raw).type_id();
        assert_eq!(infer(&["1", "-2"]), ColumnType::Int);
        assert_eq!(infer(&["1", "2.5"]), ColumnType::Double);
        assert_eq!(infer(&["1", "x"]), ColumnType::String);
        assert_eq!(infer(&["", "NULL"]), ColumnType::Empty);
    }

    #[test]
    fn doubles_compare_numerically() {
        let column = TypedColumn::decode(0, "d", &["10.0", "9.5", "1.50", "1.5"]);
        assert_eq!(column.compare(0, 1), Ordering::Greater);
        assert_eq!(column.compare(2, 3), Ordering::Equal);
        let values = column.values();
        assert_eq!(values[2].canonical(), values[3].canonical());
    }

    #[test]
    fn negative_zero_interns_with_zero() {
        let column = TypedColumn::decode(0, "d", &["-0.0", "0.0"]);
        assert_eq!(column.values()[0].canonical(), Some("0".to_owned()));
        assert_eq!(column.values()[1].canonical(), Some("0".to_owned()));
    }

    #[test]
    fn missing_values_sort_first() {
        let column = TypedColumn::decode(0, "s", &["b", "", "NULL", "a"]);
        assert_eq!(column.compare(1, 2), Ordering::Equal);
        assert_eq!(column.compare(1, 3), Ordering::Less);
        assert_eq!(column.compare(0, 3), Ordering::Greater);
        assert_eq!(column.values()[1].canonical(), None);
    }
}
