//! Rows and their typed fields.

use std::ops::{Index, IndexMut};
use std::sync::Arc;

use itertools::Itertools;

use crate::error::EmError;
use crate::table::column::{Column, ColumnId, ColumnKey};
use crate::table::schema::Schema;
use crate::types::{DataType, FromValue, Value};

/// One typed slot of a `Row`. A field only ever holds a
/// value of its column's type, or `Null` while unset.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    data_type : DataType,
    value : Value,
}

impl Field {
    /// An unset field of type `data_type`
    pub fn new(data_type : DataType) -> Self {
        Field { data_type, value : Value::Null }
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn is_null(&self) -> bool {
        self.value.is_null()
    }

    /// Stores `value`, converted to the field's type.
    ///
    /// ## Errors
    ///
    /// * `EmError::TypeMismatch` - `value` can't be represented
    /// as the field's type (see `Value::cast`)
    pub fn set<V : Into<Value>>(&mut self, value : V) -> Result<(), EmError> {
        self.value = value.into().cast(self.data_type)?;
        Ok(())
    }

    /// Resets the field to `Null`
    pub fn clear(&mut self) {
        self.value = Value::Null;
    }

    /// Reads the value as a `T`, converting it if `T` is
    /// another type than the field's.
    ///
    /// ## Errors
    ///
    /// * `EmError::TypeMismatch` - the field is unset or the
    /// value can't be converted to `T`
    pub fn get<T : FromValue>(&self) -> Result<T, EmError> {
        T::from_value(&self.value)
    }
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.value)
    }
}

/// One record of a `Table`: a field for every column of the
/// schema it was created from, in schema order.
///
/// A row keeps the schema it was created with, so columns
/// added to the table afterwards do not reshape it unless
/// the table owns it.
///
/// ## Example
///
/// ```
/// use emcore::{Column, ColumnId, DataType, Table};
///
/// let mut table = Table::from_columns(vec![
///     Column::with_id(1, "col1", DataType::Float32),
///     Column::with_id(2, "col2", DataType::Int16),
/// ]).unwrap();
///
/// let mut row = table.create_row();
/// row["col1"].set(3.1416).unwrap();
/// row[ColumnId(2)].set(300).unwrap();
/// assert_eq!(row[0].get::<f32>().unwrap(), 3.1416);
/// assert!(row["col2"].set("text").is_err());
/// ```
#[derive(Debug, Clone)]
pub struct Row {
    schema : Arc<Schema>,
    fields : Vec<Field>,
}

impl Row {
    pub (crate) fn new(schema : Arc<Schema>) -> Self {
        let fields = schema.columns()
            .iter()
            .map(|column| Field::new(column.data_type()))
            .collect();
        Row { schema, fields }
    }

    pub (crate) fn schema_arc(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Shares `schema`, which must equal the row's own.
    pub (crate) fn rebind(&mut self, schema : Arc<Schema>) {
        debug_assert!(*self.schema == *schema);
        self.schema = schema;
    }

    /// Re-points the row at `schema` after the owning table
    /// inserted a field at `position`.
    pub (crate) fn insert_field(&mut self, schema : Arc<Schema>, position : usize, field : Field) {
        self.fields.insert(position, field);
        self.schema = schema;
    }

    pub (crate) fn remove_field(&mut self, schema : Arc<Schema>, position : usize) -> Field {
        self.schema = schema;
        self.fields.remove(position)
    }

    pub (crate) fn move_field(&mut self, schema : Arc<Schema>, from : usize, to : usize) {
        let field = self.fields.remove(from);
        self.fields.insert(to, field);
        self.schema = schema;
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// The field for `key`: a position, a `ColumnId`, or a name.
    ///
    /// ## Errors
    ///
    /// * `EmError::UnknownColumn` - no such column in the row's schema
    pub fn field<'k, K : Into<ColumnKey<'k>>>(&self, key : K) -> Result<&Field, EmError> {
        let position = self.schema.require(key)?;
        Ok(&self.fields[position])
    }

    pub fn field_mut<'k, K : Into<ColumnKey<'k>>>(&mut self, key : K) -> Result<&mut Field, EmError> {
        let position = self.schema.require(key)?;
        Ok(&mut self.fields[position])
    }

    /// Shorthand for `row.field(key)?.get::<T>()`
    pub fn get<'k, T : FromValue, K : Into<ColumnKey<'k>>>(&self, key : K) -> Result<T, EmError> {
        self.field(key)?.get()
    }

    /// Shorthand for `row.field_mut(key)?.set(value)`
    pub fn set<'k, K : Into<ColumnKey<'k>>, V : Into<Value>>(
        &mut self,
        key : K,
        value : V
    ) -> Result<(), EmError> {
        self.field_mut(key)?.set(value)
    }

    /// Columns and fields in schema order
    pub fn iter(&self) -> impl Iterator<Item = (&Column, &Field)> {
        self.schema.columns().iter().zip(self.fields.iter())
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }
}

/// Rows compare equal when they have the same columns and
/// the same values.
impl PartialEq for Row {
    fn eq(&self, other : &Self) -> bool {
        (Arc::ptr_eq(&self.schema, &other.schema) || self.schema == other.schema)
        && self.fields == other.fields
    }
}

macro_rules! index_row {
    ($($key : ty),* $(,)?) => {
        $(
            impl Index<$key> for Row {
                type Output = Field;

                /// ## Panics
                ///
                /// If the row has no such column. Use `Row::field`
                /// to handle absent columns.
                fn index(&self, key : $key) -> &Field {
                    match self.field(key) {
                        Ok(field) => field,
                        Err(err) => panic!("{}", err),
                    }
                }
            }

            impl IndexMut<$key> for Row {
                fn index_mut(&mut self, key : $key) -> &mut Field {
                    match self.field_mut(key) {
                        Ok(field) => field,
                        Err(err) => panic!("{}", err),
                    }
                }
            }
        )*
    };
}

index_row!(usize, ColumnId, &str, &String, ColumnKey<'_>);

impl std::fmt::Display for Row {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "{}",
            self.iter()
                .map(|(column, field)| format!("{}: {}", column.name(), field))
                .join(", ")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> Arc<Schema> {
        let mut schema = Schema::new();
        schema.insert(0, Column::with_id(1, "col1", DataType::Float32));
        schema.insert(1, Column::with_id(2, "col2", DataType::Int16));
        schema.insert(2, Column::with_id(3, "col3", DataType::String));
        Arc::new(schema)
    }

    #[test]
    fn fields_are_typed() {
        let mut field = Field::new(DataType::Int16);
        assert!(field.is_null());
        assert!(field.get::<i16>().is_err());

        field.set(300).unwrap();
        assert_eq!(field.value(), &Value::Int16(300));
        assert_eq!(field.get::<i16>().unwrap(), 300);
        assert_eq!(field.get::<f64>().unwrap(), 300.0);
        assert!(field.get::<u8>().is_err());

        assert!(matches!(
            field.set("300"),
            Err(EmError::TypeMismatch{expected : DataType::Int16, found : DataType::String})
        ));
        assert!(field.set(70000).is_err());
        // a failed set leaves the old value
        assert_eq!(field.get::<i16>().unwrap(), 300);

        field.clear();
        assert!(field.is_null());
    }

    #[test]
    fn three_ways_to_a_field() {
        let mut row = Row::new(schema());
        assert_eq!(row.len(), 3);
        row["col1"].set(3.1416).unwrap();
        row[ColumnId(2)].set(300).unwrap();
        row[2].set("My name").unwrap();

        let position = row.schema().position("col1").unwrap();
        assert_eq!(row[ColumnId(1)].get::<f32>().unwrap(), 3.1416);
        assert_eq!(row["col1"].get::<f32>().unwrap(), 3.1416);
        assert_eq!(row[position].get::<f32>().unwrap(), 3.1416);
        assert_eq!(row.get::<String, _>("col3").unwrap(), "My name");
        assert_eq!(row.to_string(), "col1: 3.1416, col2: 300, col3: My name");

        assert!(matches!(row.field("col4"), Err(EmError::UnknownColumn(_))));
        assert!(row.set(ColumnId(9), 1).is_err());
    }

    #[test]
    #[should_panic]
    fn indexing_a_missing_column_panics() {
        let row = Row::new(schema());
        let _ = &row["missing"];
    }

    #[test]
    fn copies_are_independent() {
        let mut row = Row::new(schema());
        row[0].set(1.0).unwrap();
        let mut copy = row.clone();
        copy[0].set(2.0).unwrap();
        assert_eq!(row[0].get::<f32>().unwrap(), 1.0);
        assert_ne!(row, copy);
        copy[0].set(1.0).unwrap();
        assert_eq!(row, copy);
    }
}
