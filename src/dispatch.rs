use crate::ast::{
    AddColumn, CreateTable, Delete, Insert, Literal, RenameTable, Select, Statement, Update,
};
use crate::engine::{Database, SelectResult};
use crate::error::Result;
use crate::table::Schema;
use crate::value::Value;

/// What running one statement produced.
#[derive(Debug, PartialEq)]
pub enum ExecResult {
    /// DDL and inserts yield no payload.
    Unit,
    /// Rows matched by an update or removed by a delete.
    Count(usize),
    Rows(SelectResult),
}

/// Maps a parsed statement onto one engine call. Pure shape conversion:
/// literals are classified into typed values and argument lists are
/// zipped, nothing else. The match is exhaustive over the closed
/// [Statement] enum, so every statement kind the parser can produce has a
/// handler.
pub(crate) fn dispatch(db: &mut Database, statement: Statement) -> Result<ExecResult> {
    match statement {
        Statement::CreateTable(CreateTable { table, columns }) => {
            db.create_table(&table, Schema { columns })?;
            Ok(ExecResult::Unit)
        }
        Statement::Insert(Insert {
            table,
            columns,
            values,
        }) => {
            let row: Vec<(String, Value)> = columns
                .into_iter()
                .zip(values.into_iter().map(classify))
                .collect();
            db.insert(&table, &row)?;
            Ok(ExecResult::Unit)
        }
        Statement::Select(Select { table, filters, .. }) => db
            .select(&table, &classify_pairs(filters))
            .map(ExecResult::Rows),
        Statement::Update(Update {
            table,
            assignments,
            filters,
        }) => db
            .update(
                &table,
                &classify_pairs(filters),
                &classify_pairs(assignments),
            )
            .map(ExecResult::Count),
        Statement::Delete(Delete { table, filters }) => db
            .delete(&table, &classify_pairs(filters))
            .map(ExecResult::Count),
        Statement::RenameTable(RenameTable { table, new_name }) => {
            db.rename_table(&table, &new_name)?;
            Ok(ExecResult::Unit)
        }
        Statement::AddColumn(AddColumn {
            table,
            column,
            data_type,
        }) => {
            db.add_column(&table, &column, data_type)?;
            Ok(ExecResult::Unit)
        }
    }
}

fn classify_pairs(pairs: Vec<(String, Literal)>) -> Vec<(String, Value)> {
    pairs
        .into_iter()
        .map(|(name, literal)| (name, classify(literal)))
        .collect()
}

/// Classifies a raw literal into a typed value. Integer-shaped text wins
/// over everything else, whether it was quoted or not; date-shaped text
/// stays text here and is coerced by the table against the schema.
fn classify(literal: Literal) -> Value {
    match literal {
        Literal::Number(n) => Value::Int(n),
        Literal::Quoted(text) => {
            if is_integer(&text) {
                if let Ok(n) = text.parse::<i64>() {
                    return Value::Int(n);
                }
            }
            Value::Str(text.into())
        }
    }
}

/// `-?[0-9]+`
fn is_integer(text: &str) -> bool {
    let digits = text.strip_prefix('-').unwrap_or(text);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}
