use quizgate::authz::store::PolicyStore;
use quizgate::authz::types::{GroupingEdge, PolicyRule};
use quizgate::storage::SqlPolicyStore;
use sea_orm::{Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;
use tempfile::NamedTempFile;

/// Test database with automatic cleanup
pub struct TestDb {
    connection: DatabaseConnection,
    _temp_file: NamedTempFile,
}

impl TestDb {
    /// Create a new test database with migrations applied
    pub async fn new() -> Self {
        let temp_file = NamedTempFile::new().expect("Failed to create temp file");
        let db_path = temp_file.path().to_str().expect("Invalid temp file path");
        let db_url = format!("sqlite://{}?mode=rwc", db_path);

        let connection = Database::connect(&db_url)
            .await
            .expect("Failed to connect to test database");

        migration::Migrator::up(&connection, None)
            .await
            .expect("Failed to run migrations");

        Self {
            connection,
            _temp_file: temp_file,
        }
    }

    /// Get database connection
    pub fn connection(&self) -> &DatabaseConnection {
        &self.connection
    }

    pub fn store(&self) -> SqlPolicyStore {
        SqlPolicyStore::new(self.connection.clone())
    }
}

/// Insert rules straight into the store, bypassing the enforcer
pub async fn seed_rules(store: &dyn PolicyStore, rules: &[PolicyRule]) {
    for rule in rules {
        store.add_policy(rule).await.expect("Failed to seed rule");
    }
}

/// Grant `child` each of `parents`
pub async fn seed_roles(store: &dyn PolicyStore, child: &str, parents: &[&str]) {
    for parent in parents {
        store
            .add_grouping(&GroupingEdge::new(child, *parent))
            .await
            .expect("Failed to seed grouping");
    }
}
