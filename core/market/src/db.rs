pub mod dao;
pub mod model;
pub mod schema;

pub(crate) mod migrations {
    #[derive(diesel_migrations::EmbedMigrations)]
    struct _Dummy;
}

pub use scm_persistence::executor::Error as DbError;
pub use scm_persistence::executor::{AsDao, DbExecutor};

pub type DbResult<T> = Result<T, DbError>;

pub fn init(db: &DbExecutor) -> anyhow::Result<()> {
    db.apply_migration(migrations::run_with_output)
}
