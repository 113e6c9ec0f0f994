use gatedb::{
    AuthManager, Database, ExecResult, FileRecorder, Permission, Role, SealedStore,
};

fn main() -> gatedb::Result<()> {
    println!("gatedb demo\n");

    // Two users: an admin and a readonly analyst
    let mut auth = AuthManager::new();
    auth.add_user("root", "s3cret", Role::Admin)?;
    auth.add_user("ana", "lyst", Role::Readonly)?;

    let audit_path = std::env::temp_dir().join("gatedb_demo_audit.log");
    let mut db = Database::new(
        Box::new(auth),
        Box::new(FileRecorder::new(&audit_path)),
    );

    assert!(db.login("root", "s3cret"));
    println!("Logged in as root");

    db.execute("CREATE TABLE users (id INT, name STR, birth DATE)")?;
    db.execute("INSERT INTO users (id, name, birth) VALUES (1, 'Alice', '1990-04-10')")?;
    db.execute("INSERT INTO users (id, name, birth) VALUES (2, 'Bob', '1985-12-23')")?;
    println!("Created table 'users' and inserted 2 rows\n");

    // Read and print data
    if let ExecResult::Rows(result) = db.execute("SELECT id, name, birth FROM users")? {
        println!("{:<5} {:<10} {:<12}", "ID", "NAME", "BIRTH");
        println!("{}", "-".repeat(27));
        for row in &result.rows {
            println!("{:<5} {:<10} {:<12}", row[0], row[1], row[2]);
        }
        println!();
    }

    // The analyst cannot see the table until root grants read
    assert!(db.login("ana", "lyst"));
    assert!(db.execute("SELECT id FROM users").is_err());

    assert!(db.login("root", "s3cret"));
    db.grant("users", "ana", Permission::Read)?;
    assert!(db.login("ana", "lyst"));
    assert!(db.execute("SELECT id FROM users").is_ok());
    println!("ana can read 'users' after the grant");

    // Schema evolution
    assert!(db.login("root", "s3cret"));
    db.execute("ALTER TABLE users ADD COLUMN tag STR")?;
    db.execute("UPDATE users SET tag = 'vip' WHERE id = 1")?;
    db.execute("ALTER TABLE users RENAME TO members")?;
    println!("Added a column and renamed the table");

    println!("Tables in database:");
    for table_name in db.list_tables() {
        println!("  - {}", table_name);
    }

    // Sealed save and load
    let store = SealedStore::new();
    let db_path = std::env::temp_dir().join("gatedb_demo.sealed");
    db.save_encrypted(&store, &db_path, "letmein123")?;
    db.load_encrypted(&store, &db_path, "letmein123")?;
    println!("\nSealed table set written to {}", db_path.display());
    println!("Audit trail written to {}", audit_path.display());

    Ok(())
}
