use diesel::connection::SimpleConnection;
use diesel::r2d2::{ConnectionManager, CustomizeConnection, Pool, PooledConnection};
use diesel::{Connection, SqliteConnection};
use diesel_migrations::RunMigrationsError;
use dotenv::dotenv;
use std::env;
use std::time::Duration;

pub type InnerConnType = SqliteConnection;
/// Connection handed to transaction closures.
pub type ConnType = InnerConnType;
pub type PooledConnType = PooledConnection<ConnectionManager<InnerConnType>>;
pub type PoolType = Pool<ConnectionManager<InnerConnType>>;

const DEFAULT_DATABASE_URL: &str = "sc-market.db";
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Diesel(#[from] diesel::result::Error),
    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),
    #[error("Blocking task failed: {0}")]
    RuntimeError(#[from] tokio::task::JoinError),
}

pub trait AsDao<'a> {
    fn as_dao(pool: &'a PoolType) -> Self;
}

/// Pragmas applied to every connection handed out by the pool.
/// `foreign_keys` is per-connection in SQLite and can't be changed inside a transaction.
#[derive(Debug, Clone, Copy)]
struct ConnectionOptions {
    wal: bool,
}

impl CustomizeConnection<InnerConnType, diesel::r2d2::Error> for ConnectionOptions {
    fn on_acquire(&self, conn: &mut InnerConnType) -> Result<(), diesel::r2d2::Error> {
        let mut pragmas = format!(
            "PRAGMA busy_timeout = {}; PRAGMA foreign_keys = ON;",
            BUSY_TIMEOUT.as_millis()
        );
        if self.wal {
            pragmas.push_str(" PRAGMA synchronous = NORMAL; PRAGMA journal_mode = WAL;");
        }
        conn.batch_execute(&pragmas)
            .map_err(diesel::r2d2::Error::QueryError)
    }
}

#[derive(Clone)]
pub struct DbExecutor {
    pub pool: PoolType,
}

impl DbExecutor {
    pub fn new<S: Into<String>>(database_url: S) -> Result<Self, Error> {
        let database_url = database_url.into();
        log::info!("Using database at: {}", database_url);

        let manager = ConnectionManager::new(database_url);
        let pool = Pool::builder()
            .connection_customizer(Box::new(ConnectionOptions { wal: true }))
            .build(manager)?;
        Ok(DbExecutor { pool })
    }

    pub fn from_env() -> Result<Self, Error> {
        dotenv().ok();

        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string());
        Self::new(database_url)
    }

    /// Private in-memory database, alive as long as the pool keeps its single connection.
    pub fn in_memory(name: &str) -> Result<Self, Error> {
        let database_url = format!("file:{}?mode=memory&cache=shared", name);
        log::debug!("Using in-memory database: {}", database_url);

        let manager = ConnectionManager::new(database_url);
        let pool = Pool::builder()
            .max_size(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connection_customizer(Box::new(ConnectionOptions { wal: false }))
            .build(manager)?;
        Ok(DbExecutor { pool })
    }

    pub fn conn(&self) -> Result<PooledConnType, Error> {
        Ok(self.pool.get()?)
    }

    pub fn as_dao<'a, T: AsDao<'a>>(&'a self) -> T {
        AsDao::as_dao(&self.pool)
    }

    pub fn apply_migration<F>(&self, migration: F) -> anyhow::Result<()>
    where
        F: FnOnce(&InnerConnType, &mut dyn std::io::Write) -> Result<(), RunMigrationsError>,
    {
        let conn = self.conn()?;
        let mut output = Vec::new();
        migration(&*conn, &mut output).map_err(|e| anyhow::anyhow!("Migration failed: {}", e))?;

        let output = String::from_utf8_lossy(&output);
        if !output.trim().is_empty() {
            log::debug!("Migrations applied:\n{}", output.trim_end());
        }
        Ok(())
    }
}

/// Runs `f` inside an immediate (write-locking) transaction on a blocking thread.
/// Any error returned by `f` rolls the whole transaction back.
pub async fn do_with_transaction<R, E, F>(pool: &PoolType, f: F) -> Result<R, E>
where
    F: FnOnce(&ConnType) -> Result<R, E> + Send + 'static,
    R: Send + 'static,
    E: Send + 'static + From<Error> + From<diesel::result::Error>,
{
    let pool = pool.clone();
    match tokio::task::spawn_blocking(move || {
        let pooled = pool.get().map_err(Error::from)?;
        let conn: &ConnType = &pooled;
        conn.immediate_transaction(|| f(conn))
    })
    .await
    {
        Ok(result) => result,
        Err(e) => Err(Error::from(e).into()),
    }
}

pub async fn readonly_transaction<R, E, F>(pool: &PoolType, f: F) -> Result<R, E>
where
    F: FnOnce(&ConnType) -> Result<R, E> + Send + 'static,
    R: Send + 'static,
    E: Send + 'static + From<Error> + From<diesel::result::Error>,
{
    let pool = pool.clone();
    match tokio::task::spawn_blocking(move || {
        let pooled = pool.get().map_err(Error::from)?;
        let conn: &ConnType = &pooled;
        conn.transaction(|| f(conn))
    })
    .await
    {
        Ok(result) => result,
        Err(e) => Err(Error::from(e).into()),
    }
}
