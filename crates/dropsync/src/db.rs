//! Database connection utilities.

use sea_orm::{Database, DatabaseConnection, DbErr};

/// Apply SQLite pragmas suited to a long-running sync process.
///
/// WAL keeps status reads from blocking record writes, the busy timeout
/// rides out short lock contention, and NORMAL synchronous is safe under
/// WAL.
async fn configure_sqlite(db: &DatabaseConnection) -> Result<(), DbErr> {
    use sea_orm::{ConnectionTrait, Statement};

    for pragma in [
        "PRAGMA journal_mode=WAL",
        "PRAGMA busy_timeout=5000",
        "PRAGMA synchronous=NORMAL",
    ] {
        db.execute(Statement::from_string(
            db.get_database_backend(),
            pragma.to_string(),
        ))
        .await?;
    }

    Ok(())
}

/// Establish a connection to the database.
///
/// SQLite connections get WAL mode, a 5 second busy timeout, and NORMAL
/// synchronous mode applied automatically.
///
/// # Errors
/// Returns `DbErr` if the connection cannot be established.
pub async fn connect(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    let db = Database::connect(database_url).await?;

    if database_url.starts_with("sqlite://") {
        configure_sqlite(&db).await?;
    }

    Ok(db)
}

/// Establish a connection and run all pending migrations.
///
/// This is the recommended entry point for applications: the schema is
/// always up to date afterwards.
///
/// # Errors
/// Returns `DbErr` if the connection cannot be established or a migration
/// fails.
#[cfg(feature = "migrate")]
pub async fn connect_and_migrate(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    use sea_orm_migration::MigratorTrait;

    let db = Database::connect(database_url).await?;

    if database_url.starts_with("sqlite://") {
        configure_sqlite(&db).await?;
    }

    crate::migration::Migrator::up(&db, None).await?;
    Ok(db)
}
