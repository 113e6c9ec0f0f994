use crate::data_type::DataType;
use crate::table::ColumnDef;

/// A raw literal as it appeared in the statement text. Classification into
/// a typed [crate::value::Value] happens at dispatch time, not parse time.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Number(i64),
    Quoted(String),
}

/// Conjunctive equality pairs: a row matches when every `column = literal`
/// pair holds.
pub type Predicate = Vec<(String, Literal)>;

#[derive(Debug, PartialEq)]
pub enum Statement {
    CreateTable(CreateTable),
    Insert(Insert),
    Select(Select),
    Update(Update),
    Delete(Delete),
    RenameTable(RenameTable),
    AddColumn(AddColumn),
}

#[derive(Debug, PartialEq)]
pub struct CreateTable {
    pub table: String,
    pub columns: Vec<ColumnDef>,
}

#[derive(Debug, PartialEq)]
pub struct Insert {
    pub table: String,
    pub columns: Vec<String>,
    pub values: Vec<Literal>,
}

#[derive(Debug, PartialEq)]
pub struct Select {
    pub table: String,
    pub columns: Vec<String>,
    /// Empty when no WHERE clause was given.
    pub filters: Predicate,
}

#[derive(Debug, PartialEq)]
pub struct Update {
    pub table: String,
    pub assignments: Vec<(String, Literal)>,
    pub filters: Predicate,
}

#[derive(Debug, PartialEq)]
pub struct Delete {
    pub table: String,
    pub filters: Predicate,
}

#[derive(Debug, PartialEq)]
pub struct RenameTable {
    pub table: String,
    pub new_name: String,
}

#[derive(Debug, PartialEq)]
pub struct AddColumn {
    pub table: String,
    pub column: String,
    pub data_type: DataType,
}
