use tiberius::{AuthMethod, Client, Config, Row, ToSql};
use tokio::net::TcpStream;
use tokio::runtime::Runtime;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::{debug, error, info, trace};

use super::QueryExecutor;
use crate::prelude::{ColumnMetadata, ConnectionParams, SqlizerError};

type TcpClient = Client<Compat<TcpStream>>;

/// SQL Server query executor
///
/// Drives a tiberius client on a private current-thread runtime so callers
/// stay synchronous.
pub struct MssqlExecutor {
    runtime: Runtime,
    client: Option<TcpClient>,
}

impl MssqlExecutor {
    /// Open one connection to the server described by `params`
    pub fn connect(params: &ConnectionParams) -> Result<Self, SqlizerError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| SqlizerError::Connection(format!("Failed to start runtime: {}", e)))?;

        let mut config = Config::new();
        config.host(&params.host);
        config.port(params.port);
        config.authentication(AuthMethod::sql_server(&params.user, &params.password));
        config.trust_cert();

        info!(host = ?params.host, port = ?params.port, user = ?params.user, "Connecting to SQL Server");

        let client = runtime.block_on(async {
            let tcp = TcpStream::connect(config.get_addr())
                .await
                .map_err(|e| SqlizerError::Connection(e.to_string()))?;
            tcp.set_nodelay(true)
                .map_err(|e| SqlizerError::Connection(e.to_string()))?;
            Client::connect(config, tcp.compat_write())
                .await
                .map_err(|e| SqlizerError::Connection(e.to_string()))
        })?;

        info!("Connected to database server");

        Ok(Self {
            runtime,
            client: Some(client),
        })
    }

    fn query(
        &mut self,
        step: &'static str,
        sql: &str,
        params: &[&dyn ToSql],
    ) -> Result<Vec<Row>, SqlizerError> {
        trace!(sql = ?sql, "Running query");

        let client = self
            .client
            .as_mut()
            .ok_or_else(|| SqlizerError::Connection("connection already closed".to_string()))?;

        self.runtime
            .block_on(async { client.query(sql, params).await?.into_first_result().await })
            .map_err(|e| {
                error!(step = step, error = ?e, "Query failed");
                SqlizerError::Query {
                    step,
                    message: e.to_string(),
                }
            })
    }
}

impl QueryExecutor for MssqlExecutor {
    fn database_exists(&mut self, database: &str) -> Result<bool, SqlizerError> {
        let rows = self.query(
            "checking database",
            DATABASE_EXISTS_SQL,
            &[&database],
        )?;
        read_flag(&rows, "DatabaseExists", "checking database")
    }

    fn table_exists(&mut self, lookup_catalog: &str, table: &str) -> Result<bool, SqlizerError> {
        let sql = table_exists_sql(lookup_catalog);
        let rows = self.query("checking table", &sql, &[&table])?;
        read_flag(&rows, "TableExists", "checking table")
    }

    fn columns(
        &mut self,
        database: &str,
        table: &str,
        schema: Option<&str>,
    ) -> Result<Vec<ColumnMetadata>, SqlizerError> {
        let sql = columns_sql(database, schema.is_some());
        let rows = match schema {
            Some(schema) => self.query("listing columns", &sql, &[&table, &schema])?,
            None => self.query("listing columns", &sql, &[&table])?,
        };
        debug!(table = ?table, rows = ?rows.len(), "Fetched column rows");

        rows.iter().map(parse_column).collect()
    }

    fn close(&mut self) -> Result<(), SqlizerError> {
        match self.client.take() {
            Some(client) => {
                self.runtime
                    .block_on(client.close())
                    .map_err(|e| SqlizerError::Connection(format!("Failed to close: {}", e)))?;
                debug!("Connection closed");
                Ok(())
            }
            None => Ok(()),
        }
    }
}

const DATABASE_EXISTS_SQL: &str = r#"
    SELECT CAST(CASE WHEN DB_ID(@P1) IS NOT NULL THEN 1 ELSE 0 END AS BIT) AS DatabaseExists
"#;

/// Quote an identifier for SQL Server (`[name]`, with `]` doubled)
fn quote_ident(name: &str) -> String {
    format!("[{}]", name.replace(']', "]]"))
}

fn table_exists_sql(lookup_catalog: &str) -> String {
    format!(
        r#"
    SELECT CAST(CASE WHEN EXISTS (
        SELECT 1
        FROM {}.INFORMATION_SCHEMA.TABLES
        WHERE TABLE_NAME = @P1
    ) THEN 1 ELSE 0 END AS BIT) AS TableExists
"#,
        quote_ident(lookup_catalog)
    )
}

fn columns_sql(database: &str, filter_schema: bool) -> String {
    let schema_filter = if filter_schema {
        "\n        AND TABLE_SCHEMA = @P2"
    } else {
        ""
    };
    format!(
        r#"
    SELECT
        TABLE_CATALOG,
        TABLE_SCHEMA,
        TABLE_NAME,
        COLUMN_NAME,
        CAST(ORDINAL_POSITION AS INT) AS ORDINAL_POSITION,
        COLUMN_DEFAULT,
        IS_NULLABLE,
        DATA_TYPE,
        CAST(CHARACTER_MAXIMUM_LENGTH AS INT) AS CHARACTER_MAXIMUM_LENGTH,
        CAST(CHARACTER_OCTET_LENGTH AS INT) AS CHARACTER_OCTET_LENGTH,
        CAST(NUMERIC_PRECISION AS INT) AS NUMERIC_PRECISION,
        CAST(NUMERIC_PRECISION_RADIX AS INT) AS NUMERIC_PRECISION_RADIX,
        CAST(NUMERIC_SCALE AS INT) AS NUMERIC_SCALE,
        CAST(DATETIME_PRECISION AS INT) AS DATETIME_PRECISION,
        CHARACTER_SET_CATALOG,
        CHARACTER_SET_SCHEMA,
        CHARACTER_SET_NAME,
        COLLATION_CATALOG,
        COLLATION_SCHEMA,
        COLLATION_NAME,
        DOMAIN_CATALOG,
        DOMAIN_SCHEMA,
        DOMAIN_NAME
    FROM {}.INFORMATION_SCHEMA.COLUMNS
    WHERE TABLE_NAME = @P1{}
    ORDER BY ORDINAL_POSITION
"#,
        quote_ident(database),
        schema_filter
    )
}

fn read_flag(rows: &[Row], column: &str, step: &'static str) -> Result<bool, SqlizerError> {
    let row = rows.first().ok_or_else(|| SqlizerError::Query {
        step,
        message: "probe returned no rows".to_string(),
    })?;
    let flag = row
        .try_get::<bool, _>(column)
        .map_err(|e| query_error(step, e))?;
    Ok(flag.unwrap_or(false))
}

fn parse_column(row: &Row) -> Result<ColumnMetadata, SqlizerError> {
    let column = ColumnMetadata {
        table_catalog: required_str(row, "TABLE_CATALOG")?,
        table_schema: required_str(row, "TABLE_SCHEMA")?,
        table_name: required_str(row, "TABLE_NAME")?,
        column_name: required_str(row, "COLUMN_NAME")?,
        ordinal_position: optional_int(row, "ORDINAL_POSITION")?.unwrap_or_default(),
        column_default: optional_str(row, "COLUMN_DEFAULT")?,
        is_nullable: required_str(row, "IS_NULLABLE")?.eq_ignore_ascii_case("YES"),
        data_type: required_str(row, "DATA_TYPE")?,
        character_maximum_length: optional_int(row, "CHARACTER_MAXIMUM_LENGTH")?,
        character_octet_length: optional_int(row, "CHARACTER_OCTET_LENGTH")?,
        numeric_precision: optional_int(row, "NUMERIC_PRECISION")?,
        numeric_precision_radix: optional_int(row, "NUMERIC_PRECISION_RADIX")?,
        numeric_scale: optional_int(row, "NUMERIC_SCALE")?,
        datetime_precision: optional_int(row, "DATETIME_PRECISION")?,
        character_set_catalog: optional_str(row, "CHARACTER_SET_CATALOG")?,
        character_set_schema: optional_str(row, "CHARACTER_SET_SCHEMA")?,
        character_set_name: optional_str(row, "CHARACTER_SET_NAME")?,
        collation_catalog: optional_str(row, "COLLATION_CATALOG")?,
        collation_schema: optional_str(row, "COLLATION_SCHEMA")?,
        collation_name: optional_str(row, "COLLATION_NAME")?,
        domain_catalog: optional_str(row, "DOMAIN_CATALOG")?,
        domain_schema: optional_str(row, "DOMAIN_SCHEMA")?,
        domain_name: optional_str(row, "DOMAIN_NAME")?,
    };

    trace!(
        column = ?column.column_name,
        ordinal = ?column.ordinal_position,
        data_type = ?column.data_type,
        is_nullable = ?column.is_nullable,
        "Parsed column"
    );

    Ok(column)
}

fn optional_str(row: &Row, column: &str) -> Result<Option<String>, SqlizerError> {
    row.try_get::<&str, _>(column)
        .map(|value| value.map(str::to_string))
        .map_err(|e| query_error("reading column metadata", e))
}

fn required_str(row: &Row, column: &str) -> Result<String, SqlizerError> {
    optional_str(row, column)?.ok_or_else(|| SqlizerError::Query {
        step: "reading column metadata",
        message: format!("{} is NULL", column),
    })
}

fn optional_int(row: &Row, column: &str) -> Result<Option<i32>, SqlizerError> {
    row.try_get::<i32, _>(column)
        .map_err(|e| query_error("reading column metadata", e))
}

fn query_error(step: &'static str, e: tiberius::error::Error) -> SqlizerError {
    SqlizerError::Query {
        step,
        message: e.to_string(),
    }
}
