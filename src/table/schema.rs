//! The ordered column list of a table, with the name and
//! id lookups derived from it. The lookups are rebuilt on
//! every mutation; positions are never stored in a `Column`.

use std::collections::HashMap;

use crate::error::EmError;
use crate::table::column::{Column, ColumnId, ColumnKey};

#[derive(Debug, Clone, Default)]
pub struct Schema {
    columns : Vec<Column>,
    by_name : HashMap<String, usize>,
    by_id : HashMap<ColumnId, usize>,
}

impl Schema {
    pub fn new() -> Self {
        Schema::default()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn get(&self, position : usize) -> Option<&Column> {
        self.columns.get(position)
    }

    /// Current position of the column named by `key`, if any
    pub fn position<'k, K : Into<ColumnKey<'k>>>(&self, key : K) -> Option<usize> {
        match key.into() {
            ColumnKey::Position(position) => (position < self.len()).then_some(position),
            ColumnKey::Id(id) => self.by_id.get(&id).copied(),
            ColumnKey::Name(name) => self.by_name.get(name).copied(),
        }
    }

    /// Like `position` but fails on absent keys.
    pub fn require<'k, K : Into<ColumnKey<'k>>>(&self, key : K) -> Result<usize, EmError> {
        let key = key.into();
        self.position(key).ok_or_else(|| EmError::UnknownColumn(key.to_string()))
    }

    /// Fails if `column` would break name or id uniqueness.
    /// An unassigned id never collides.
    pub (crate) fn check(&self, column : &Column) -> Result<(), EmError> {
        if self.by_name.contains_key(column.name()) {
            return Err(EmError::DuplicateName(column.name().to_string()));
        }
        if column.id().is_assigned() && self.by_id.contains_key(&column.id()) {
            return Err(EmError::DuplicateId(column.id()));
        }
        Ok(())
    }

    /// Inserts without checking; `check` first.
    pub (crate) fn insert(&mut self, position : usize, column : Column) {
        self.columns.insert(position, column);
        self.rebuild();
    }

    pub (crate) fn remove(&mut self, position : usize) -> Column {
        let column = self.columns.remove(position);
        self.rebuild();
        column
    }

    pub (crate) fn clear(&mut self) {
        self.columns.clear();
        self.rebuild();
    }

    fn rebuild(&mut self) {
        self.by_name = self.columns.iter()
            .enumerate()
            .map(|(position, column)| (column.name().to_string(), position))
            .collect();
        self.by_id = self.columns.iter()
            .enumerate()
            .map(|(position, column)| (column.id(), position))
            .collect();
    }
}

/// Two schemas are equal when they list the same columns
/// in the same order.
impl PartialEq for Schema {
    fn eq(&self, other : &Self) -> bool {
        self.columns == other.columns
    }
}

impl Eq for Schema {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DataType;

    #[test]
    fn lookups_follow_positions() {
        let mut schema = Schema::new();
        schema.insert(0, Column::with_id(1, "a", DataType::Int32));
        schema.insert(1, Column::with_id(2, "b", DataType::Int32));
        schema.insert(0, Column::with_id(3, "c", DataType::Int32));

        assert_eq!(schema.position("c"), Some(0));
        assert_eq!(schema.position("a"), Some(1));
        assert_eq!(schema.position(ColumnId(2)), Some(2));
        assert_eq!(schema.position(2usize), Some(2));
        assert_eq!(schema.position(3usize), None);
        assert_eq!(schema.position("d"), None);
        assert!(matches!(schema.require(ColumnId(9)), Err(EmError::UnknownColumn(_))));

        assert!(matches!(
            schema.check(&Column::new("a", DataType::Float32)),
            Err(EmError::DuplicateName(_))
        ));
        assert!(matches!(
            schema.check(&Column::with_id(3, "e", DataType::Float32)),
            Err(EmError::DuplicateId(ColumnId(3)))
        ));
        assert!(schema.check(&Column::new("e", DataType::Float32)).is_ok());

        let removed = schema.remove(0);
        assert_eq!(removed.name(), "c");
        assert_eq!(schema.position("a"), Some(0));
        assert_eq!(schema.position(ColumnId(3)), None);
    }
}
