use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::data_type::DataType;
use crate::error::{Error, Result};
use crate::value::Value;

/// Column definition in the schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    pub data_type: DataType,
}

/// Ordered list of column definitions. Column names are unique and
/// case-sensitive; columns can be appended but never removed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    pub columns: Vec<ColumnDef>,
}

impl Schema {
    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Validates a candidate row against the schema, coercing each value
    /// to its column's type and returning the values in schema order.
    ///
    /// Every schema column must be present in the candidate; keys outside
    /// the schema are dropped without complaint. When a key repeats, the
    /// last occurrence wins.
    ///
    /// # Errors
    /// [Error::MissingColumn] when a schema column is absent, or
    /// [Error::Type] when a supplied value cannot be coerced.
    pub fn validate_row(&self, candidate: &[(String, Value)]) -> Result<Row> {
        let mut row = Vec::with_capacity(self.columns.len());
        for def in &self.columns {
            let (_, value) = candidate
                .iter()
                .rev()
                .find(|(name, _)| *name == def.name)
                .ok_or_else(|| Error::MissingColumn(def.name.clone()))?;
            row.push(def.data_type.coerce(value.clone())?);
        }
        Ok(row)
    }
}

/// A stored row: one value per schema column, in schema order.
pub type Row = Vec<Value>;

/// Per-table permission. `Admin` implies the other two.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum Permission {
    Read,
    Write,
    Admin,
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read => write!(f, "read"),
            Self::Write => write!(f, "write"),
            Self::Admin => write!(f, "admin"),
        }
    }
}

/// One typed record set plus its access-control list.
///
/// Rows keep insertion order. No uniqueness or primary-key constraint is
/// enforced anywhere; duplicate values are legal, including in integer
/// `id` columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
    pub schema: Schema,
    rows: Vec<Row>,
    permissions: BTreeMap<String, BTreeSet<Permission>>,
}

impl Table {
    /// Creates an empty table. The creator, when given, starts with the
    /// full permission set.
    pub fn new(name: String, schema: Schema, creator: Option<&str>) -> Self {
        let mut permissions = BTreeMap::new();
        if let Some(creator) = creator {
            permissions.insert(
                creator.to_string(),
                BTreeSet::from([Permission::Read, Permission::Write, Permission::Admin]),
            );
        }
        Self {
            name,
            schema,
            rows: Vec::new(),
            permissions,
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// True when `perm` is directly granted or the user holds `admin`.
    pub fn has_permission(&self, user: &str, perm: Permission) -> bool {
        self.permissions
            .get(user)
            .is_some_and(|set| set.contains(&perm) || set.contains(&Permission::Admin))
    }

    pub fn grant(&mut self, user: &str, perm: Permission) {
        self.permissions
            .entry(user.to_string())
            .or_default()
            .insert(perm);
    }

    /// Removes one permission; a user whose set becomes empty is dropped
    /// from the ACL entirely.
    pub fn revoke(&mut self, user: &str, perm: Permission) {
        if let Some(set) = self.permissions.get_mut(user) {
            set.remove(&perm);
            if set.is_empty() {
                self.permissions.remove(user);
            }
        }
    }

    /// Validates and appends one row.
    pub fn insert(&mut self, candidate: &[(String, Value)]) -> Result<()> {
        let row = self.schema.validate_row(candidate)?;
        self.rows.push(row);
        Ok(())
    }

    /// Returns every row matching all filter pairs, in insertion order.
    /// An empty filter list returns all rows.
    pub fn select(&self, filters: &[(String, Value)]) -> Vec<Row> {
        if filters.is_empty() {
            return self.rows.clone();
        }
        match self.compile_filters(filters) {
            Some(compiled) => self
                .rows
                .iter()
                .filter(|row| Self::matches(row, &compiled))
                .cloned()
                .collect(),
            None => Vec::new(),
        }
    }

    /// Assigns each listed column's coerced value on every matching row
    /// and returns the number of rows matched (not columns changed).
    ///
    /// Assignments naming columns outside the schema are ignored. Each
    /// assignment is coerced and applied one at a time per row; a coercion
    /// failure surfaces immediately and leaves earlier assignments in
    /// place.
    pub fn update(
        &mut self,
        filters: &[(String, Value)],
        assignments: &[(String, Value)],
    ) -> Result<usize> {
        let Some(compiled) = self.compile_filters(filters) else {
            return Ok(0);
        };
        let targets: Vec<(usize, DataType, Value)> = assignments
            .iter()
            .filter_map(|(name, value)| {
                self.schema
                    .index_of(name)
                    .map(|idx| (idx, self.schema.columns[idx].data_type, value.clone()))
            })
            .collect();
        let mut count = 0;
        for row in &mut self.rows {
            if Self::matches(row, &compiled) {
                for (idx, ty, value) in &targets {
                    row[*idx] = ty.coerce(value.clone())?;
                }
                count += 1;
            }
        }
        Ok(count)
    }

    /// Removes every matching row and returns how many were removed.
    pub fn delete(&mut self, filters: &[(String, Value)]) -> usize {
        let initial = self.rows.len();
        if let Some(compiled) = self.compile_filters(filters) {
            self.rows.retain(|row| !Self::matches(row, &compiled));
        }
        initial - self.rows.len()
    }

    /// Appends a column to the schema. Existing rows receive the unset
    /// marker, not a coerced value of the declared type.
    pub fn add_column(&mut self, name: &str, data_type: DataType) -> Result<()> {
        if self.schema.column(name).is_some() {
            return Err(Error::AlreadyExists(format!("column {name}")));
        }
        self.schema.columns.push(ColumnDef {
            name: name.to_string(),
            data_type,
        });
        for row in &mut self.rows {
            row.push(Value::Null);
        }
        Ok(())
    }

    /// Resolves filter pairs to (column index, coerced value). `None`
    /// means the conjunction can never be satisfied: a pair naming a
    /// column outside the schema, or a literal that cannot coerce to its
    /// column's type, matches nothing.
    fn compile_filters(&self, filters: &[(String, Value)]) -> Option<Vec<(usize, Value)>> {
        let mut compiled = Vec::with_capacity(filters.len());
        for (name, literal) in filters {
            let idx = self.schema.index_of(name)?;
            let coerced = self.schema.columns[idx]
                .data_type
                .coerce(literal.clone())
                .ok()?;
            compiled.push((idx, coerced));
        }
        Some(compiled)
    }

    fn matches(row: &Row, compiled: &[(usize, Value)]) -> bool {
        compiled.iter().all(|(idx, value)| row[*idx] == *value)
    }
}
