//! Database introspection
//!
//! Reads the column metadata for a single table. The read is a fixed sequence
//! of round trips over one connection: database probe, table probe, column
//! listing. Each supported driver implements [`QueryExecutor`] in its own
//! feature-gated submodule.

use tracing::{debug, info, warn};

use crate::prelude::{ColumnMetadata, SqlizerError};

/// Catalog the table-existence probe looks in unless overridden
pub const DEFAULT_LOOKUP_CATALOG: &str = "UserManagement";

/// What to introspect
#[derive(Debug, Clone)]
pub struct TableTarget {
    pub database: String,
    pub table: String,
    /// Catalog whose `INFORMATION_SCHEMA.TABLES` is probed for the table
    pub lookup_catalog: String,
    /// Restrict the column listing to one `TABLE_SCHEMA`
    pub schema: Option<String>,
}

impl TableTarget {
    pub fn new(database: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            table: table.into(),
            lookup_catalog: DEFAULT_LOOKUP_CATALOG.to_string(),
            schema: None,
        }
    }

    pub fn with_lookup_catalog(mut self, catalog: impl Into<String>) -> Self {
        self.lookup_catalog = catalog.into();
        self
    }

    pub fn with_schema(mut self, schema: Option<String>) -> Self {
        self.schema = schema;
        self
    }
}

/// Query capability the reader depends on
///
/// All calls run against one open connection; `close` releases it.
pub trait QueryExecutor {
    fn database_exists(&mut self, database: &str) -> Result<bool, SqlizerError>;

    fn table_exists(&mut self, lookup_catalog: &str, table: &str) -> Result<bool, SqlizerError>;

    fn columns(
        &mut self,
        database: &str,
        table: &str,
        schema: Option<&str>,
    ) -> Result<Vec<ColumnMetadata>, SqlizerError>;

    fn close(&mut self) -> Result<(), SqlizerError>;
}

/// Trait for database introspection implementations
pub trait Introspector {
    /// Read the ordered column metadata of the target table
    fn introspect(&mut self, target: &TableTarget) -> Result<Vec<ColumnMetadata>, SqlizerError>;
}

/// Progress through the read sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadState {
    Connected,
    DatabaseChecked,
    TableChecked,
    ColumnsFetched,
}

/// Reads one table through any [`QueryExecutor`]
pub struct TableIntrospector<E: QueryExecutor> {
    executor: E,
    state: ReadState,
}

impl<E: QueryExecutor> TableIntrospector<E> {
    pub fn new(executor: E) -> Self {
        Self {
            executor,
            state: ReadState::Connected,
        }
    }

    pub fn state(&self) -> ReadState {
        self.state
    }

    pub fn into_inner(self) -> E {
        self.executor
    }

    fn read(&mut self, target: &TableTarget) -> Result<Vec<ColumnMetadata>, SqlizerError> {
        if !self.executor.database_exists(&target.database)? {
            return Err(SqlizerError::DatabaseNotFound {
                database: target.database.clone(),
            });
        }
        self.state = ReadState::DatabaseChecked;
        debug!(database = ?target.database, "Database exists");

        if !self
            .executor
            .table_exists(&target.lookup_catalog, &target.table)?
        {
            return Err(SqlizerError::TableNotFound {
                table: target.table.clone(),
                catalog: target.lookup_catalog.clone(),
            });
        }
        self.state = ReadState::TableChecked;
        debug!(table = ?target.table, catalog = ?target.lookup_catalog, "Table exists");

        let columns =
            self.executor
                .columns(&target.database, &target.table, target.schema.as_deref())?;
        self.state = ReadState::ColumnsFetched;

        Ok(columns)
    }
}

impl<E: QueryExecutor> Introspector for TableIntrospector<E> {
    fn introspect(&mut self, target: &TableTarget) -> Result<Vec<ColumnMetadata>, SqlizerError> {
        info!(database = ?target.database, table = ?target.table, "Starting table introspection");

        let result = self.read(target);
        let closed = self.executor.close();

        match (result, closed) {
            (Ok(columns), Ok(())) => {
                info!(
                    table = ?target.table,
                    columns = ?columns.len(),
                    "Table introspection complete"
                );
                Ok(columns)
            }
            (Ok(_), Err(e)) => Err(e),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(close_err)) => {
                warn!(error = ?close_err, "Failed to close connection after error");
                Err(e)
            }
        }
    }
}

// Feature-gated database implementations
#[cfg(feature = "mssql")]
mod mssql;

#[cfg(feature = "mssql")]
pub use mssql::MssqlExecutor;

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Scripted executor that records every call it receives
    #[derive(Debug, Default)]
    pub struct FakeExecutor {
        pub database_exists: bool,
        pub table_exists: bool,
        pub rows: Vec<ColumnMetadata>,
        pub fail_database: bool,
        pub fail_table: bool,
        pub fail_columns: bool,
        pub fail_close: bool,
        pub calls: Vec<String>,
    }

    impl FakeExecutor {
        pub fn with_rows(rows: Vec<ColumnMetadata>) -> Self {
            Self {
                database_exists: true,
                table_exists: true,
                rows,
                ..Default::default()
            }
        }
    }

    impl QueryExecutor for FakeExecutor {
        fn database_exists(&mut self, database: &str) -> Result<bool, SqlizerError> {
            self.calls.push(format!("database_exists:{}", database));
            if self.fail_database {
                return Err(SqlizerError::Query {
                    step: "checking database",
                    message: "Login failed for database".to_string(),
                });
            }
            Ok(self.database_exists)
        }

        fn table_exists(&mut self, lookup_catalog: &str, table: &str) -> Result<bool, SqlizerError> {
            self.calls
                .push(format!("table_exists:{}:{}", lookup_catalog, table));
            if self.fail_table {
                return Err(SqlizerError::Query {
                    step: "checking table",
                    message: "Invalid object name".to_string(),
                });
            }
            Ok(self.table_exists)
        }

        fn columns(
            &mut self,
            database: &str,
            table: &str,
            schema: Option<&str>,
        ) -> Result<Vec<ColumnMetadata>, SqlizerError> {
            self.calls.push(format!(
                "columns:{}:{}:{}",
                database,
                table,
                schema.unwrap_or("*")
            ));
            if self.fail_columns {
                return Err(SqlizerError::Query {
                    step: "listing columns",
                    message: "Invalid object name".to_string(),
                });
            }
            Ok(self.rows.clone())
        }

        fn close(&mut self) -> Result<(), SqlizerError> {
            self.calls.push("close".to_string());
            if self.fail_close {
                return Err(SqlizerError::Connection("connection reset".to_string()));
            }
            Ok(())
        }
    }
}
