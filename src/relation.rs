//! Loading a relation from a [`TabularStream`] into typed columns and PLIs.

use crate::column::TypedColumn;
use crate::error::{Error, Result};
use crate::input::TabularStream;
use crate::pli::Pli;
use lasso::{Key, Rodeo, Spur};
use tracing::debug;

/// The value id reserved for NULL and empty cells.
pub const NULL_VALUE_ID: u32 = 0;

/// Whether two missing values are considered equal to each other.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum NullPolicy {
    /// All NULL and empty cells in a column share one cluster.
    NullEqualsNull,
    /// Every NULL and empty cell is distinct from every other cell.
    NullNotEqualsNull,
}

/// Dense value ids for one column.
///
/// Values are interned by their canonical rendering, so ids start at 1 in order of first
/// appearance and [`NULL_VALUE_ID`] is never handed out to a present value.
#[derive(Debug)]
pub struct ColumnValueIds {
    ids: Vec<u32>,
    distinct: usize,
}

impl ColumnValueIds {
    /// Assigns an id to every row of `column`.
    ///
    /// ```
    /// use agree_lattice::{ColumnValueIds, TypedColumn, NULL_VALUE_ID};
    ///
    /// let column = TypedColumn::decode(0, "x", &["a", "b", "", "a"]);
    /// let ids = ColumnValueIds::encode(&column);
    /// assert_eq!(ids.ids(), &[1, 2, NULL_VALUE_ID, 1]);
    /// assert_eq!(ids.distinct_values(), 2);
    /// ```
    pub fn encode(column: &TypedColumn) -> Self {
        let mut rodeo: Rodeo<Spur> = Rodeo::new();
        let ids = column
            .values()
            .iter()
            .map(|value| match value.canonical() {
                None => NULL_VALUE_ID,
                Some(text) => rodeo.get_or_intern(text).into_usize() as u32 + 1,
            })
            .collect();
        ColumnValueIds {
            ids,
            distinct: rodeo.len(),
        }
    }

    /// The value id of every row.
    pub fn ids(&self) -> &[u32] {
        &self.ids
    }

    /// The number of distinct present values.
    pub fn distinct_values(&self) -> usize {
        self.distinct
    }
}

/// A fully loaded relation: typed columns and one PLI per column, all indexed by the columns'
/// original positions.
#[derive(Debug)]
pub struct Relation {
    name: String,
    columns: Vec<TypedColumn>,
    plis: Vec<Pli>,
    row_count: usize,
    null_policy: NullPolicy,
}

impl Relation {
    /// Reads every row of `stream` from the start and builds the per-column structures.
    ///
    /// Relations without columns, without rows, or with only one row are rejected, since
    /// dependency discovery has nothing meaningful to say about them. Ragged rows are reported
    /// at [`TabularStream::next_row_line`], or by counting from a one-line header when the
    /// stream has no line numbers of its own.
    pub fn load<S>(stream: &mut S, null_policy: NullPolicy) -> Result<Self>
    where
        S: TabularStream + ?Sized,
    {
        let width = stream.column_count();
        if width == 0 {
            return Err(Error::NoColumns);
        }

        stream.reset();
        let mut raw: Vec<Vec<String>> = vec![Vec::new(); width];
        let mut rows_read = 0;
        while stream.has_next_row() {
            // Streams that don't number their lines are taken to have a one-line header.
            let line = stream.next_row_line().unwrap_or(rows_read + 2);
            let row = stream.next_row()?;
            rows_read += 1;
            if row.len() != width {
                return Err(Error::RaggedRow {
                    line,
                    expected: width,
                    found: row.len(),
                });
            }
            for (column, field) in raw.iter_mut().zip(row) {
                column.push(field);
            }
        }

        let row_count = raw[0].len();
        match row_count {
            0 => return Err(Error::EmptyRelation),
            1 => return Err(Error::SingleRow),
            _ => {}
        }

        let columns: Vec<TypedColumn> = raw
            .iter()
            .enumerate()
            .map(|(index, values)| {
                TypedColumn::decode(index, stream.column_name(index), values)
            })
            .collect();
        drop(raw);

        Ok(Self::from_columns(
            stream.relation_name(),
            columns,
            null_policy,
        ))
    }

    /// Builds a relation from columns which were already decoded. All columns must have the
    /// same length.
    pub fn from_columns(name: &str, columns: Vec<TypedColumn>, null_policy: NullPolicy) -> Self {
        let row_count = columns.first().map_or(0, TypedColumn::len);
        assert!(columns.iter().all(|c| c.len() == row_count));

        let plis = build_plis(&columns, null_policy);
        Relation {
            name: name.to_owned(),
            columns,
            plis,
            row_count,
            null_policy,
        }
    }

    /// The name reported by the input stream.
    pub fn relation_name(&self) -> &str {
        &self.name
    }

    /// The number of attributes.
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// The number of rows.
    pub fn row_count(&self) -> usize {
        self.row_count
    }

    /// The header names, in column order.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(TypedColumn::name).collect()
    }

    /// The decoded columns.
    pub fn columns(&self) -> &[TypedColumn] {
        &self.columns
    }

    /// One PLI per column, in original column order.
    pub fn plis(&self) -> &[Pli] {
        &self.plis
    }

    /// The null semantics the PLIs were built with.
    pub fn null_policy(&self) -> NullPolicy {
        self.null_policy
    }

    /// Builds a fresh set of PLIs under a different null policy.
    pub fn plis_for(&self, null_policy: NullPolicy) -> Vec<Pli> {
        build_plis(&self.columns, null_policy)
    }
}

fn build_plis(columns: &[TypedColumn], null_policy: NullPolicy) -> Vec<Pli> {
    columns
        .iter()
        .map(|column| {
            let ids = ColumnValueIds::encode(column);
            let pli = Pli::create_for(ids.ids(), null_policy);
            debug!(
                column = column.name(),
                ty = ?column.type_id(),
                distinct = ids.distinct_values(),
                clusters = pli.cluster_count(),
                "built column index"
            );
            pli
        })
        .collect()
}
