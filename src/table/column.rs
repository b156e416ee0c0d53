use crate::types::DataType;

/// Permanent numeric handle of a column within a `Table`,
/// independent of the column's position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ColumnId(pub u64);

impl ColumnId {
    /// Marks a column whose id has not been assigned yet
    pub const NO_ID : ColumnId = ColumnId(0);

    pub fn is_assigned(&self) -> bool {
        *self != ColumnId::NO_ID
    }
}

impl From<u64> for ColumnId {
    fn from(id : u64) -> Self {
        ColumnId(id)
    }
}

impl std::fmt::Display for ColumnId {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A schema element: id, unique name and element type.
///
/// ## Example
///
/// ```
/// use emcore::{Column, ColumnId, DataType};
///
/// let unassigned = Column::new("defocus", DataType::Float32);
/// assert_eq!(unassigned.id(), ColumnId::NO_ID);
///
/// let fixed = Column::with_id(7, "class", DataType::Int32)
///     .with_description("2D class number");
/// assert_eq!(fixed.id(), ColumnId(7));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Column {
    id : ColumnId,
    name : String,
    data_type : DataType,
    description : String,
}

impl Column {
    /// A column without an id; the `Table` it is added
    /// to assigns one.
    pub fn new<S : Into<String>>(name : S, data_type : DataType) -> Self {
        Column::with_id(ColumnId::NO_ID.0, name, data_type)
    }

    pub fn with_id<S : Into<String>>(id : u64, name : S, data_type : DataType) -> Self {
        Column {
            id : ColumnId(id),
            name : name.into(),
            data_type,
            description : String::new(),
        }
    }

    pub fn with_description<S : Into<String>>(mut self, description : S) -> Self {
        self.description = description.into();
        self
    }

    pub fn id(&self) -> ColumnId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub (crate) fn assign_id(&mut self, id : ColumnId) {
        self.id = id;
    }
}

impl std::fmt::Display for Column {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{:>4} {:<24} {}", self.id, self.name, self.data_type)?;
        if !self.description.is_empty() {
            write!(f, " # {}", self.description)?;
        }
        Ok(())
    }
}

/// Any of the three ways of naming a column: its current
/// position, its id, or its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKey<'a> {
    Position(usize),
    Id(ColumnId),
    Name(&'a str),
}

impl From<usize> for ColumnKey<'_> {
    fn from(position : usize) -> Self {
        ColumnKey::Position(position)
    }
}

impl From<ColumnId> for ColumnKey<'_> {
    fn from(id : ColumnId) -> Self {
        ColumnKey::Id(id)
    }
}

impl<'a> From<&'a str> for ColumnKey<'a> {
    fn from(name : &'a str) -> Self {
        ColumnKey::Name(name)
    }
}

impl<'a> From<&'a String> for ColumnKey<'a> {
    fn from(name : &'a String) -> Self {
        ColumnKey::Name(name)
    }
}

impl<'a> From<&'a Column> for ColumnKey<'a> {
    fn from(column : &'a Column) -> Self {
        ColumnKey::Id(column.id())
    }
}

impl std::fmt::Display for ColumnKey<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            ColumnKey::Position(position) => write!(f, "column at position {}", position),
            ColumnKey::Id(id) => write!(f, "column with id {}", id),
            ColumnKey::Name(name) => write!(f, "column '{}'", name),
        }
    }
}
