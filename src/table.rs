//! A typed, schema-driven table.
//!
//! A `Table` holds an ordered list of `Column`s and the
//! `Row`s shaped by it. Columns are addressable by their
//! current position, their name or their permanent id;
//! inserting, moving or removing columns shifts positions
//! but never changes an id.

pub mod column;
pub mod row;
pub mod schema;

use std::ops::{Index, IndexMut};
use std::sync::Arc;

use itertools::Itertools;

pub use column::{Column, ColumnId, ColumnKey};
pub use row::{Field, Row};
pub use schema::Schema;

use crate::error::EmError;
use crate::types::Value;

/// A table of typed rows.
///
/// Ids are handed out by the table itself from a counter
/// that starts at 1 and always moves past the largest id
/// seen, whether assigned or given explicitly. Separate
/// tables keep separate counters.
///
/// ## Example
///
/// ```
/// use emcore::{Column, ColumnId, DataType, Table};
///
/// let mut table = Table::new();
/// assert_eq!(table.add_column(Column::new("first", DataType::Float32)).unwrap(), 0);
/// table.add_column(Column::with_id(100, "second", DataType::Int16)).unwrap();
/// table.add_column(Column::new("third", DataType::String)).unwrap();
///
/// assert_eq!(table.get_column_by_index(0).unwrap().id(), ColumnId(1));
/// assert_eq!(table.get_column_by_index(2).unwrap().id(), ColumnId(101));
/// assert_eq!(table.get_index("third"), Some(2));
/// assert_eq!(table.get_index(ColumnId(7)), None);
/// ```
#[derive(Debug, Clone)]
pub struct Table {
    schema : Arc<Schema>,
    rows : Vec<Row>,
    next_id : u64,
}

impl Default for Table {
    fn default() -> Self {
        Table::new()
    }
}

impl Table {
    pub fn new() -> Self {
        Table {
            schema : Arc::new(Schema::new()),
            rows : Vec::new(),
            next_id : 1,
        }
    }

    /// Builds the schema from `columns` in order, with the same
    /// checks and id assignment as repeated `add_column` calls.
    pub fn from_columns<I : IntoIterator<Item = Column>>(columns : I) -> Result<Self, EmError> {
        let mut table = Table::new();
        for column in columns {
            table.add_column(column)?;
        }
        Ok(table)
    }

    /// Validates `column` against the schema and gives it an
    /// id if it has none. Does not modify the table on failure.
    fn admit(&self, mut column : Column) -> Result<(Column, u64), EmError> {
        self.schema.check(&column)?;
        if !column.id().is_assigned() {
            column.assign_id(ColumnId(self.next_id));
        }
        let after = column.id().0.checked_add(1).ok_or(EmError::IdsExhausted)?;
        Ok((column, self.next_id.max(after)))
    }

    /// Appends `column` to the schema and returns its position.
    /// Rows held by the table get a `Null` field for it.
    ///
    /// ## Errors
    ///
    /// * `EmError::DuplicateName` - the name is already taken
    /// * `EmError::DuplicateId` - the explicit id is already taken
    /// * `EmError::IdsExhausted` - the id is `u64::MAX`, explicit
    /// or the next one to assign
    pub fn add_column(&mut self, column : Column) -> Result<usize, EmError> {
        self.insert_column(column, self.column_count())
    }

    /// As `add_column`, filling the new field of every row held
    /// by the table with `default`.
    pub fn add_column_with_default<V : Into<Value>>(
        &mut self,
        column : Column,
        default : V
    ) -> Result<usize, EmError> {
        self.insert_column_with_default(column, self.column_count(), default)
    }

    /// Inserts `column` at `position`. Columns at or after
    /// `position` move one place to the right; no id changes.
    ///
    /// ## Errors
    ///
    /// As `add_column`, plus `EmError::IndexOutOfRange` if
    /// `position` is past the end of the schema.
    pub fn insert_column(&mut self, column : Column, position : usize) -> Result<usize, EmError> {
        self.insert_column_with_default(column, position, Value::Null)
    }

    pub fn insert_column_with_default<V : Into<Value>>(
        &mut self,
        column : Column,
        position : usize,
        default : V,
    ) -> Result<usize, EmError> {
        if position > self.column_count() {
            return Err(EmError::IndexOutOfRange { index : position, bound : self.column_count() });
        }
        let (column, next_id) = self.admit(column)?;

        let mut field = Field::new(column.data_type());
        let default = default.into();
        if !default.is_null() {
            field.set(default)?;
        }

        log::trace!("Inserting column {} ({}) at {}", column.name(), column.id(), position);
        Arc::make_mut(&mut self.schema).insert(position, column);
        self.next_id = next_id;
        for row in self.rows.iter_mut() {
            row.insert_field(self.schema.clone(), position, field.clone());
        }
        Ok(position)
    }

    /// Removes the column named by `key` from the schema and
    /// from every row held by the table.
    pub fn remove_column<'k, K : Into<ColumnKey<'k>>>(&mut self, key : K) -> Result<Column, EmError> {
        let position = self.schema.require(key)?;
        let column = Arc::make_mut(&mut self.schema).remove(position);
        for row in self.rows.iter_mut() {
            row.remove_field(self.schema.clone(), position);
        }
        Ok(column)
    }

    /// Moves the column named by `key` to `position`, shifting
    /// the columns in between.
    pub fn move_column<'k, K : Into<ColumnKey<'k>>>(
        &mut self,
        key : K,
        position : usize
    ) -> Result<usize, EmError> {
        let from = self.schema.require(key)?;
        if position >= self.column_count() {
            return Err(EmError::IndexOutOfRange { index : position, bound : self.column_count() });
        }
        let schema = Arc::make_mut(&mut self.schema);
        let column = schema.remove(from);
        schema.insert(position, column);
        for row in self.rows.iter_mut() {
            row.move_field(self.schema.clone(), from, position);
        }
        Ok(position)
    }

    /// Current position of a column, or `None` if the name or
    /// id is not in the schema.
    pub fn get_index<'k, K : Into<ColumnKey<'k>>>(&self, key : K) -> Option<usize> {
        self.schema.position(key)
    }

    /// The column at `position`
    pub fn get_column_by_index(&self, position : usize) -> Result<&Column, EmError> {
        self.get_column(position)
    }

    /// The column named by `key`
    ///
    /// ## Errors
    ///
    /// * `EmError::UnknownColumn` - no such column
    pub fn get_column<'k, K : Into<ColumnKey<'k>>>(&self, key : K) -> Result<&Column, EmError> {
        let position = self.schema.require(key)?;
        Ok(&self.schema.columns()[position])
    }

    pub fn columns(&self) -> impl Iterator<Item = &Column> {
        self.schema.columns().iter()
    }

    pub fn column_count(&self) -> usize {
        self.schema.len()
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// A new row with an unset field for each current column.
    /// The row is not part of the table until added.
    pub fn create_row(&self) -> Row {
        Row::new(self.schema.clone())
    }

    fn check_row(&self, row : &Row) -> Result<(), EmError> {
        if Arc::ptr_eq(row.schema_arc(), &self.schema) || *row.schema() == *self.schema {
            Ok(())
        } else {
            Err(EmError::SchemaMismatch)
        }
    }

    /// Appends `row` and returns its position.
    ///
    /// ## Errors
    ///
    /// * `EmError::SchemaMismatch` - the row's columns differ
    /// from the table's
    pub fn add_row(&mut self, row : Row) -> Result<usize, EmError> {
        self.insert_row(row, self.len())
    }

    pub fn insert_row(&mut self, mut row : Row, position : usize) -> Result<usize, EmError> {
        self.check_row(&row)?;
        if position > self.len() {
            return Err(EmError::IndexOutOfRange { index : position, bound : self.len() });
        }
        if !Arc::ptr_eq(row.schema_arc(), &self.schema) {
            row.rebind(self.schema.clone());
        }
        self.rows.insert(position, row);
        Ok(position)
    }

    pub fn remove_row(&mut self, position : usize) -> Result<Row, EmError> {
        if position >= self.len() {
            return Err(EmError::IndexOutOfRange { index : position, bound : self.len() });
        }
        Ok(self.rows.remove(position))
    }

    /// Removes the first row equal to `row`, field by field,
    /// and returns it. `None` if no row matches.
    pub fn delete_row(&mut self, row : &Row) -> Option<Row> {
        let position = self.rows.iter().position(|held| held == row)?;
        Some(self.rows.remove(position))
    }

    /// Replaces the first row whose leading field equals the
    /// leading field of `row`, returning the row it replaced.
    /// The first column acts as the key; `Ok(None)` means no
    /// row holds that key and the table is unchanged.
    ///
    /// ## Errors
    ///
    /// * `EmError::SchemaMismatch` - the row's columns differ
    /// * `EmError::UnknownColumn` - the table has no columns
    pub fn update_row(&mut self, mut row : Row) -> Result<Option<Row>, EmError> {
        self.check_row(&row)?;
        let key = row.field(0)?.value().clone();
        let Some(held) = self.rows.iter_mut().find(|held| held[0].value() == &key) else {
            return Ok(None);
        };
        if !Arc::ptr_eq(row.schema_arc(), &self.schema) {
            row.rebind(self.schema.clone());
        }
        Ok(Some(std::mem::replace(held, row)))
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row(&self, position : usize) -> Option<&Row> {
        self.rows.get(position)
    }

    pub fn row_mut(&mut self, position : usize) -> Option<&mut Row> {
        self.rows.get_mut(position)
    }

    /// Drops every row and column. The id counter keeps its
    /// value, so ids are never handed out twice by one table.
    pub fn clear(&mut self) {
        self.rows.clear();
        Arc::make_mut(&mut self.schema).clear();
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Row> {
        self.rows.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Row> {
        self.rows.iter_mut()
    }
}

impl Index<usize> for Table {
    type Output = Row;

    fn index(&self, position : usize) -> &Row {
        &self.rows[position]
    }
}

impl IndexMut<usize> for Table {
    fn index_mut(&mut self, position : usize) -> &mut Row {
        &mut self.rows[position]
    }
}

impl<'a> IntoIterator for &'a Table {
    type Item = &'a Row;
    type IntoIter = std::slice::Iter<'a, Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

/// Tab-separated: a line of column names, then one line per row
impl std::fmt::Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        writeln!(f, "{}", self.columns().map(|column| column.name()).join("\t"))?;
        for row in &self.rows {
            writeln!(f, "{}", row.fields().iter().join("\t"))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DataType;

    fn three_columns() -> Table {
        Table::from_columns(vec![
            Column::with_id(1, "col1", DataType::Float32),
            Column::with_id(2, "col2", DataType::Int16),
            Column::with_id(3, "col3", DataType::String),
        ]).unwrap()
    }

    #[test]
    fn failed_inserts_leave_the_table_alone() {
        let mut table = three_columns();
        assert!(matches!(
            table.add_column(Column::new("col2", DataType::Int32)),
            Err(EmError::DuplicateName(_))
        ));
        assert!(matches!(
            table.add_column(Column::with_id(3, "col4", DataType::Int32)),
            Err(EmError::DuplicateId(ColumnId(3)))
        ));
        assert!(matches!(
            table.insert_column(Column::new("col4", DataType::Int32), 5),
            Err(EmError::IndexOutOfRange{index : 5, bound : 3})
        ));
        assert_eq!(table.column_count(), 3);
        assert_eq!(table.add_column(Column::new("col4", DataType::Int32)).unwrap(), 3);
        assert_eq!(table.get_column("col4").unwrap().id(), ColumnId(4));
    }

    #[test]
    fn ids_stop_at_the_largest_u64() {
        let mut table = three_columns();
        assert!(matches!(
            table.add_column(Column::with_id(u64::MAX, "last", DataType::Int32)),
            Err(EmError::IdsExhausted)
        ));
        assert_eq!(table.column_count(), 3);
        assert_eq!(table.get_index(ColumnId(u64::MAX)), None);

        table.add_column(Column::with_id(u64::MAX - 1, "penultimate", DataType::Int32)).unwrap();
        assert!(matches!(
            table.add_column(Column::new("auto", DataType::Int32)),
            Err(EmError::IdsExhausted)
        ));
        assert_eq!(table.column_count(), 4);
        // explicit ids below the counter are still free
        table.add_column(Column::with_id(10, "ten", DataType::Int32)).unwrap();
        assert_eq!(table.get_index(ColumnId(10)), Some(4));
    }

    #[test]
    fn owned_rows_follow_the_schema() {
        let mut table = three_columns();
        let mut row = table.create_row();
        row["col2"].set(300).unwrap();
        table.add_row(row).unwrap();

        let detached = table.create_row();
        table.insert_column_with_default(Column::new("first", DataType::Float64), 0, 1.5).unwrap();
        assert_eq!(table[0].len(), 4);
        assert_eq!(table[0]["first"].get::<f64>().unwrap(), 1.5);
        assert_eq!(table[0][2].get::<i16>().unwrap(), 300);
        // rows created before the change keep their shape
        assert_eq!(detached.len(), 3);
        assert!(matches!(table.add_row(detached), Err(EmError::SchemaMismatch)));

        table.move_column("col3", 0).unwrap();
        assert_eq!(table.get_index("col3"), Some(0));
        assert_eq!(table.get_index("first"), Some(1));
        assert_eq!(table[0]["col2"].get::<i16>().unwrap(), 300);

        let removed = table.remove_column(ColumnId(2)).unwrap();
        assert_eq!(removed.name(), "col2");
        assert_eq!(table[0].len(), 3);
        assert!(table[0].field("col2").is_err());

        assert!(table.add_column_with_default(Column::new("bad", DataType::Int8), "x").is_err());
        assert!(table.get_index("bad").is_none());
    }

    #[test]
    fn rows() {
        let mut table = three_columns();
        for i in 0..3 {
            let mut row = table.create_row();
            row["col2"].set(i).unwrap();
            table.add_row(row).unwrap();
        }
        let mut first = table.create_row();
        first["col2"].set(-1).unwrap();
        table.insert_row(first, 0).unwrap();

        assert_eq!(table.len(), 4);
        let values : Vec<i16> = table.iter().map(|row| row["col2"].get().unwrap()).collect();
        assert_eq!(values, vec![-1, 0, 1, 2]);

        let removed = table.remove_row(1).unwrap();
        assert_eq!(removed["col2"].get::<i16>().unwrap(), 0);
        assert!(table.remove_row(3).is_err());

        for row in table.iter_mut() {
            row["col3"].set("name").unwrap();
        }
        assert_eq!(table.to_string().lines().next().unwrap(), "col1\tcol2\tcol3");
        assert_eq!(table.to_string().lines().nth(1).unwrap(), "null\t-1\tname");

        table.clear();
        assert!(table.is_empty());
        assert_eq!(table.column_count(), 0);
        table.add_column(Column::new("again", DataType::Int32)).unwrap();
        assert_eq!(table.get_column("again").unwrap().id(), ColumnId(4));
    }

    #[test]
    fn equal_schemas_accept_rows() {
        let mut one = three_columns();
        let two = three_columns();
        let mut row = two.create_row();
        row[ColumnId(1)].set(2.5).unwrap();
        one.add_row(row).unwrap();
        assert_eq!(one[0]["col1"].get::<f32>().unwrap(), 2.5);
    }

    #[test]
    fn rows_by_value() {
        let mut table = three_columns();
        for i in 0..3 {
            let mut row = table.create_row();
            row["col1"].set(i as f32).unwrap();
            row["col2"].set(i * 10).unwrap();
            table.add_row(row).unwrap();
        }

        let mut update = table.create_row();
        update["col1"].set(1.0).unwrap();
        update["col2"].set(99).unwrap();
        update["col3"].set("updated").unwrap();
        let replaced = table.update_row(update).unwrap().unwrap();
        assert_eq!(replaced["col2"].get::<i16>().unwrap(), 10);
        assert_eq!(table[1]["col2"].get::<i16>().unwrap(), 99);
        assert_eq!(table[1]["col3"].get::<String>().unwrap(), "updated");

        let mut unknown = table.create_row();
        unknown["col1"].set(7.0).unwrap();
        assert!(table.update_row(unknown).unwrap().is_none());
        assert!(matches!(
            table.update_row(Table::new().create_row()),
            Err(EmError::SchemaMismatch)
        ));

        let target = table[2].clone();
        assert_eq!(table.delete_row(&target), Some(target));
        assert_eq!(table.len(), 2);
        // a row matching on the key but not on every field stays
        let mut near = table[0].clone();
        near["col3"].set("other").unwrap();
        assert!(table.delete_row(&near).is_none());
        assert_eq!(table.len(), 2);
    }
}
