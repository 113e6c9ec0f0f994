use std::fs;
use std::path::Path;

use crate::audit::ActivityRecorder;
use crate::auth::{Authenticator, Role};
use crate::data_type::DataType;
use crate::dispatch::{self, ExecResult};
use crate::error::{Error, Result};
use crate::parser::Parser;
use crate::store::{EncryptedStore, TableMap};
use crate::table::{Permission, Row, Schema, Table};
use crate::tokenizer::Tokenizer;
use crate::value::Value;

/// The main entry point of the engine: owns the table set and the current
/// session identity, and gates every operation by login state, global
/// role, and per-table permissions.
///
/// One `Database` serves one logical session at a time; all work is
/// synchronous and runs to completion. Sharing an instance across
/// sessions means wrapping it in a `Mutex` — table storage is a plain
/// sequential container and concurrent mutation during a scan is
/// undefined.
pub struct Database {
    tables: TableMap,
    current_user: Option<String>,
    auth: Box<dyn Authenticator>,
    recorder: Box<dyn ActivityRecorder>,
}

/// The result of a successful select: every schema column, in order, and
/// the matching rows.
#[derive(Debug, PartialEq)]
pub struct SelectResult {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl Database {
    /// Creates an empty engine with injected collaborators. No principal
    /// is set until [Database::login] succeeds.
    pub fn new(auth: Box<dyn Authenticator>, recorder: Box<dyn ActivityRecorder>) -> Self {
        Self {
            tables: TableMap::new(),
            current_user: None,
            auth,
            recorder,
        }
    }

    /// Authenticates and, on success, makes `username` the session
    /// principal. The outcome is recorded either way; a failed login
    /// leaves the previous principal untouched.
    pub fn login(&mut self, username: &str, password: &str) -> bool {
        if self.auth.authenticate(username, password) {
            self.recorder.record(username, "login", "login successful");
            self.current_user = Some(username.to_string());
            true
        } else {
            self.recorder.record(username, "login_fail", "login failed");
            false
        }
    }

    pub fn current_user(&self) -> Option<&str> {
        self.current_user.as_deref()
    }

    pub fn list_tables(&self) -> Vec<&str> {
        self.tables.keys().map(String::as_str).collect()
    }

    pub fn get_table(&self, name: &str) -> Option<&Table> {
        self.tables.get(name)
    }

    /// Parses and runs one statement.
    ///
    /// # Example
    /// ```
    /// use gatedb::{AuthManager, Database, MemoryRecorder, Role, Value};
    ///
    /// let mut auth = AuthManager::new();
    /// auth.add_user("root", "s3cret", Role::Admin).unwrap();
    /// let mut db = Database::new(Box::new(auth), Box::new(MemoryRecorder::new()));
    /// assert!(db.login("root", "s3cret"));
    ///
    /// db.execute("CREATE TABLE users (id INT, name STR)").unwrap();
    /// db.execute("INSERT INTO users (id, name) VALUES (1, 'Alice')").unwrap();
    ///
    /// let result = db.select("users", &[]).unwrap();
    /// assert_eq!(result.rows[0][1], Value::Str("Alice".into()));
    /// ```
    pub fn execute(&mut self, sql: &str) -> Result<ExecResult> {
        tracing::debug!(sql, "executing statement");
        let tokens = Tokenizer::new(sql).tokenize()?;
        let statement = Parser::new(tokens).parse()?;
        dispatch::dispatch(self, statement)
    }

    // --- Gates ---

    fn require_login(&self) -> Result<&str> {
        self.current_user.as_deref().ok_or(Error::AuthRequired)
    }

    /// Global role gate, independent of per-table ACLs. An identity the
    /// authenticator no longer knows counts as not logged in.
    fn require_role(&self, minimum: Role) -> Result<()> {
        let user = self.require_login()?;
        let role = self.auth.role_of(user).ok_or(Error::AuthRequired)?;
        if role < minimum {
            return Err(Error::Forbidden(match minimum {
                Role::Admin => "must be admin".into(),
                _ => "read-only user: modification not allowed".into(),
            }));
        }
        Ok(())
    }

    fn check_table_permission(&self, table: &str, perm: Permission) -> Result<()> {
        let user = self.require_login()?;
        let t = self.table(table)?;
        if !t.has_permission(user, perm) {
            return Err(Error::Forbidden(format!(
                "no {perm} permission on {table} for {user}"
            )));
        }
        Ok(())
    }

    fn table(&self, name: &str) -> Result<&Table> {
        self.tables
            .get(name)
            .ok_or_else(|| Error::NotFound(format!("table {name}")))
    }

    fn table_mut(&mut self, name: &str) -> Result<&mut Table> {
        self.tables
            .get_mut(name)
            .ok_or_else(|| Error::NotFound(format!("table {name}")))
    }

    // --- Operations ---

    /// Creates a table and grants the caller the full permission set on
    /// it. Requires login and a role above readonly.
    pub fn create_table(&mut self, name: &str, schema: Schema) -> Result<()> {
        let user = self.require_login()?.to_string();
        self.require_role(Role::User)?;
        if self.tables.contains_key(name) {
            return Err(Error::AlreadyExists(format!("table {name}")));
        }
        let table = Table::new(name.to_string(), schema, Some(&user));
        self.tables.insert(name.to_string(), table);
        self.recorder.record(&user, "create_table", name);
        Ok(())
    }

    /// Requires table-level write permission.
    pub fn insert(&mut self, table: &str, row: &[(String, Value)]) -> Result<()> {
        let user = self.require_login()?.to_string();
        self.check_table_permission(table, Permission::Write)?;
        self.table_mut(table)?.insert(row)?;
        self.recorder
            .record(&user, "insert", &format!("into {table}: {row:?}"));
        Ok(())
    }

    /// Requires table-level read permission.
    pub fn select(&self, table: &str, filters: &[(String, Value)]) -> Result<SelectResult> {
        let user = self.require_login()?;
        self.check_table_permission(table, Permission::Read)?;
        let t = self.table(table)?;
        let rows = t.select(filters);
        let columns = t.schema.columns.iter().map(|c| c.name.clone()).collect();
        self.recorder
            .record(user, "select", &format!("from {table} ({filters:?})"));
        Ok(SelectResult { columns, rows })
    }

    /// Requires table-level write permission. Returns rows matched.
    pub fn update(
        &mut self,
        table: &str,
        filters: &[(String, Value)],
        assignments: &[(String, Value)],
    ) -> Result<usize> {
        let user = self.require_login()?.to_string();
        self.check_table_permission(table, Permission::Write)?;
        let count = self.table_mut(table)?.update(filters, assignments)?;
        self.recorder.record(
            &user,
            "update",
            &format!("table {table}, set={assignments:?}, where={filters:?}"),
        );
        Ok(count)
    }

    /// Requires table-level write permission. Returns rows removed.
    pub fn delete(&mut self, table: &str, filters: &[(String, Value)]) -> Result<usize> {
        let user = self.require_login()?.to_string();
        self.check_table_permission(table, Permission::Write)?;
        let count = self.table_mut(table)?.delete(filters);
        self.recorder
            .record(&user, "delete", &format!("from {table} where {filters:?}"));
        Ok(count)
    }

    /// Requires table-level admin permission on the target table (global
    /// role does not matter here).
    pub fn grant(&mut self, table: &str, user: &str, perm: Permission) -> Result<()> {
        let actor = self.require_login()?.to_string();
        self.check_table_permission(table, Permission::Admin)?;
        self.table_mut(table)?.grant(user, perm);
        self.recorder
            .record(&actor, "grant", &format!("{perm} on {table} to {user}"));
        Ok(())
    }

    /// Requires table-level admin permission on the target table.
    pub fn revoke(&mut self, table: &str, user: &str, perm: Permission) -> Result<()> {
        let actor = self.require_login()?.to_string();
        self.check_table_permission(table, Permission::Admin)?;
        self.table_mut(table)?.revoke(user, perm);
        self.recorder
            .record(&actor, "revoke", &format!("{perm} on {table} from {user}"));
        Ok(())
    }

    /// Requires login, a role above readonly, and table-level admin.
    pub fn rename_table(&mut self, table: &str, new_name: &str) -> Result<()> {
        let user = self.require_login()?.to_string();
        self.require_role(Role::User)?;
        self.check_table_permission(table, Permission::Admin)?;
        if self.tables.contains_key(new_name) {
            return Err(Error::AlreadyExists(format!("table {new_name}")));
        }
        if let Some(mut t) = self.tables.remove(table) {
            t.name = new_name.to_string();
            self.tables.insert(new_name.to_string(), t);
        }
        self.recorder
            .record(&user, "rename_table", &format!("{table} -> {new_name}"));
        Ok(())
    }

    /// Requires login, a role above readonly, and table-level admin.
    /// Existing rows receive the unset marker for the new column.
    pub fn add_column(&mut self, table: &str, column: &str, data_type: DataType) -> Result<()> {
        let user = self.require_login()?.to_string();
        self.require_role(Role::User)?;
        self.check_table_permission(table, Permission::Admin)?;
        self.table_mut(table)?.add_column(column, data_type)?;
        self.recorder
            .record(&user, "add_column", &format!("to {table}: {column} {data_type}"));
        Ok(())
    }

    /// Assigns a global role through the authenticator. Requires login
    /// and the admin role.
    pub fn set_user_role(&mut self, target: &str, role: Role) -> Result<()> {
        let actor = self.require_login()?.to_string();
        self.require_role(Role::Admin)?;
        self.auth.set_role(&actor, target, role)?;
        self.recorder
            .record(&actor, "set_role", &format!("{target} now {role}"));
        Ok(())
    }

    // --- Persistence ---

    /// Seals the table set with the given store and writes it to `path`.
    pub fn save_encrypted(
        &self,
        store: &dyn EncryptedStore,
        path: impl AsRef<Path>,
        secret: &str,
    ) -> Result<()> {
        let sealed = store.seal(&self.tables, secret)?;
        fs::write(path, sealed)?;
        Ok(())
    }

    /// Replaces the table set with the one sealed at `path`.
    pub fn load_encrypted(
        &mut self,
        store: &dyn EncryptedStore,
        path: impl AsRef<Path>,
        secret: &str,
    ) -> Result<()> {
        let sealed = fs::read(path)?;
        self.tables = store.open(&sealed, secret)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::MemoryRecorder;
    use crate::auth::AuthManager;
    use crate::store::SealedStore;
    use crate::table::ColumnDef;
    use chrono::NaiveDate;
    use std::sync::Arc;

    fn users_schema() -> Schema {
        Schema {
            columns: vec![
                ColumnDef {
                    name: "id".into(),
                    data_type: DataType::Int,
                },
                ColumnDef {
                    name: "name".into(),
                    data_type: DataType::Str,
                },
                ColumnDef {
                    name: "birth".into(),
                    data_type: DataType::Date,
                },
            ],
        }
    }

    fn alice_row() -> Vec<(String, Value)> {
        vec![
            ("id".into(), Value::Int(1)),
            ("name".into(), Value::Str("Alice".into())),
            ("birth".into(), Value::Str("1990-04-10".into())),
        ]
    }

    /// Engine with three users: root (admin), bob (user), viewer
    /// (readonly). Nobody is logged in yet.
    fn test_db() -> (Database, Arc<MemoryRecorder>) {
        let mut auth = AuthManager::new();
        auth.add_user("root", "root-pw", Role::Admin).unwrap();
        auth.add_user("bob", "bob-pw", Role::User).unwrap();
        auth.add_user("viewer", "viewer-pw", Role::Readonly).unwrap();
        let recorder = Arc::new(MemoryRecorder::new());
        let db = Database::new(Box::new(auth), Box::new(recorder.clone()));
        (db, recorder)
    }

    #[test]
    fn test_login_outcomes() {
        let (mut db, recorder) = test_db();

        assert!(!db.login("root", "wrong"));
        assert_eq!(db.current_user(), None);

        assert!(db.login("root", "root-pw"));
        assert_eq!(db.current_user(), Some("root"));

        assert_eq!(recorder.actions(), vec!["login_fail", "login"]);
    }

    #[test]
    fn test_operations_require_login() {
        let (mut db, _) = test_db();

        assert!(matches!(
            db.create_table("users", users_schema()),
            Err(Error::AuthRequired)
        ));
        assert!(matches!(db.select("users", &[]), Err(Error::AuthRequired)));
        assert!(matches!(
            db.insert("users", &alice_row()),
            Err(Error::AuthRequired)
        ));
    }

    #[test]
    fn test_readonly_cannot_create_table() {
        let (mut db, _) = test_db();
        assert!(db.login("viewer", "viewer-pw"));

        let err = db.create_table("users", users_schema()).unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));
        assert!(db.list_tables().is_empty());
    }

    #[test]
    fn test_create_table_collision() {
        let (mut db, _) = test_db();
        assert!(db.login("root", "root-pw"));

        db.create_table("users", users_schema()).unwrap();
        assert!(matches!(
            db.create_table("users", users_schema()),
            Err(Error::AlreadyExists(_))
        ));
    }

    #[test]
    fn test_insert_select_round_trip_with_dates() {
        let (mut db, _) = test_db();
        assert!(db.login("root", "root-pw"));

        db.create_table("users", users_schema()).unwrap();
        db.insert("users", &alice_row()).unwrap();

        let result = db.select("users", &[]).unwrap();
        assert_eq!(result.columns, vec!["id", "name", "birth"]);
        assert_eq!(result.rows.len(), 1);
        assert_eq!(
            result.rows[0][2],
            Value::Date(NaiveDate::from_ymd_opt(1990, 4, 10).unwrap())
        );
    }

    #[test]
    fn test_creator_acl_gates_other_users() {
        let (mut db, _) = test_db();
        assert!(db.login("root", "root-pw"));
        db.create_table("users", users_schema()).unwrap();
        db.insert("users", &alice_row()).unwrap();

        // bob has no permissions on root's table
        assert!(db.login("bob", "bob-pw"));
        assert!(matches!(db.select("users", &[]), Err(Error::Forbidden(_))));
        assert!(matches!(
            db.insert("users", &alice_row()),
            Err(Error::Forbidden(_))
        ));
        assert!(matches!(
            db.grant("users", "bob", Permission::Read),
            Err(Error::Forbidden(_))
        ));

        // until root grants them
        assert!(db.login("root", "root-pw"));
        db.grant("users", "bob", Permission::Read).unwrap();

        assert!(db.login("bob", "bob-pw"));
        assert_eq!(db.select("users", &[]).unwrap().rows.len(), 1);
        // read does not imply write
        assert!(matches!(
            db.delete("users", &[]),
            Err(Error::Forbidden(_))
        ));
    }

    #[test]
    fn test_revoke_cuts_access() {
        let (mut db, _) = test_db();
        assert!(db.login("root", "root-pw"));
        db.create_table("users", users_schema()).unwrap();
        db.grant("users", "bob", Permission::Write).unwrap();
        db.grant("users", "bob", Permission::Read).unwrap();
        db.revoke("users", "bob", Permission::Write).unwrap();

        assert!(db.login("bob", "bob-pw"));
        assert!(db.select("users", &[]).is_ok());
        assert!(matches!(
            db.insert("users", &alice_row()),
            Err(Error::Forbidden(_))
        ));
    }

    #[test]
    fn test_table_write_beats_global_readonly() {
        // per-table write ACL is checked for DML, not the global role
        let (mut db, _) = test_db();
        assert!(db.login("root", "root-pw"));
        db.create_table("users", users_schema()).unwrap();
        db.grant("users", "viewer", Permission::Write).unwrap();

        assert!(db.login("viewer", "viewer-pw"));
        db.insert("users", &alice_row()).unwrap();
    }

    #[test]
    fn test_update_and_delete_counts() {
        let (mut db, _) = test_db();
        assert!(db.login("root", "root-pw"));
        db.create_table("users", users_schema()).unwrap();
        db.insert("users", &alice_row()).unwrap();

        let matched = db
            .update(
                "users",
                &[("id".into(), Value::Int(1))],
                &[("name".into(), Value::Str("Bob".into()))],
            )
            .unwrap();
        assert_eq!(matched, 1);

        let result = db
            .select("users", &[("id".into(), Value::Int(1))])
            .unwrap();
        assert_eq!(result.rows[0][1], Value::Str("Bob".into()));

        assert_eq!(db.delete("users", &[("id".into(), Value::Int(1))]).unwrap(), 1);
        assert_eq!(db.delete("users", &[("id".into(), Value::Int(1))]).unwrap(), 0);
    }

    #[test]
    fn test_unknown_table_is_not_found() {
        let (mut db, _) = test_db();
        assert!(db.login("root", "root-pw"));

        assert!(matches!(db.select("ghost", &[]), Err(Error::NotFound(_))));
        assert!(matches!(
            db.rename_table("ghost", "spirit"),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_rename_table() {
        let (mut db, _) = test_db();
        assert!(db.login("root", "root-pw"));
        db.create_table("users", users_schema()).unwrap();
        db.create_table("taken", users_schema()).unwrap();

        assert!(matches!(
            db.rename_table("users", "taken"),
            Err(Error::AlreadyExists(_))
        ));

        db.rename_table("users", "people").unwrap();
        assert_eq!(db.list_tables(), vec!["people", "taken"]);
        assert_eq!(db.get_table("people").unwrap().name, "people");
    }

    #[test]
    fn test_add_column_backfills_existing_rows() {
        let (mut db, _) = test_db();
        assert!(db.login("root", "root-pw"));
        db.create_table("users", users_schema()).unwrap();
        db.insert("users", &alice_row()).unwrap();

        db.add_column("users", "tag", DataType::Str).unwrap();

        let result = db.select("users", &[]).unwrap();
        assert_eq!(result.columns, vec!["id", "name", "birth", "tag"]);
        assert_eq!(result.rows[0][3], Value::Null);

        assert!(matches!(
            db.add_column("users", "tag", DataType::Str),
            Err(Error::AlreadyExists(_))
        ));
    }

    #[test]
    fn test_ddl_requires_table_admin_and_global_write() {
        let (mut db, _) = test_db();
        assert!(db.login("root", "root-pw"));
        db.create_table("users", users_schema()).unwrap();
        // viewer gets table admin but keeps the readonly global role
        db.grant("users", "viewer", Permission::Admin).unwrap();

        assert!(db.login("viewer", "viewer-pw"));
        assert!(matches!(
            db.rename_table("users", "people"),
            Err(Error::Forbidden(_))
        ));
        assert!(matches!(
            db.add_column("users", "tag", DataType::Str),
            Err(Error::Forbidden(_))
        ));

        // bob has global write but no table admin
        assert!(db.login("bob", "bob-pw"));
        assert!(matches!(
            db.rename_table("users", "people"),
            Err(Error::Forbidden(_))
        ));
    }

    #[test]
    fn test_set_user_role() {
        let (mut db, _) = test_db();

        assert!(db.login("bob", "bob-pw"));
        assert!(matches!(
            db.set_user_role("viewer", Role::User),
            Err(Error::Forbidden(_))
        ));

        assert!(db.login("root", "root-pw"));
        db.set_user_role("viewer", Role::User).unwrap();

        // viewer can create tables now
        assert!(db.login("viewer", "viewer-pw"));
        db.create_table("notes", users_schema()).unwrap();
    }

    #[test]
    fn test_activity_recorded_after_success_only() {
        let (mut db, recorder) = test_db();
        assert!(db.login("root", "root-pw"));
        db.create_table("users", users_schema()).unwrap();
        db.insert("users", &alice_row()).unwrap();

        // a forbidden or invalid operation leaves no record
        let _ = db.create_table("users", users_schema());
        let _ = db.insert("users", &[("id".into(), Value::Int(2))]);

        assert_eq!(
            recorder.actions(),
            vec!["login", "create_table", "insert"]
        );
        let (user, _, detail) = recorder.entries()[2].clone();
        assert_eq!(user, "root");
        assert!(detail.contains("into users"));
    }

    #[test]
    fn test_save_and_load_encrypted() {
        let (mut db, _) = test_db();
        assert!(db.login("root", "root-pw"));
        db.create_table("users", users_schema()).unwrap();
        db.insert("users", &alice_row()).unwrap();
        db.grant("users", "bob", Permission::Read).unwrap();

        let store = SealedStore::new();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.sealed");
        db.save_encrypted(&store, &path, "letmein123").unwrap();

        let (mut restored, _) = test_db();
        assert!(restored.load_encrypted(&store, &path, "nope").is_err());
        restored.load_encrypted(&store, &path, "letmein123").unwrap();

        assert!(restored.login("bob", "bob-pw"));
        let result = restored.select("users", &[]).unwrap();
        assert_eq!(result.rows.len(), 1);
        assert_eq!(
            result.rows[0][2],
            Value::Date(NaiveDate::from_ymd_opt(1990, 4, 10).unwrap())
        );
    }
}
