use std::path::PathBuf;

use log::{error, info};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::{
    clickhouse_api::queries_operations::ClickHouseClient,
    config::AppConfig,
    error::ProvisionError,
};

/// 内置建表脚本。
pub const EMBEDDED_SCHEMA: &str = include_str!("../../migration/migration.sql");

static DATABASE_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid database name pattern"));

/// 建表脚本的来源。
#[derive(Clone, Debug, PartialEq)]
pub enum SchemaSource
{
    Embedded,
    File(PathBuf),
    Inline(String),
}

impl SchemaSource
{
    pub fn load(&self) -> Result<String, ProvisionError>
    {
        match self {
            | SchemaSource::Embedded => Ok(EMBEDDED_SCHEMA.to_string()),
            | SchemaSource::Inline(script) => Ok(script.clone()),
            | SchemaSource::File(path) => std::fs::read_to_string(path).map_err(|source| ProvisionError::ScriptRead { path: path.display().to_string(),
                                                                                                                      source }),
        }
    }
}

/// 一次建库的结果。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProvisionReport
{
    pub database: String,
    pub statements: usize,
}

/// 按 `;` 拆分脚本，跳过空语句与 `--` 注释。单引号字符串内的 `;` 与 `--` 不作处理。
pub fn split_statements(script: &str) -> Vec<String>
{
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut in_quote = false;
    let mut chars = script.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            | '\\' if in_quote => {
                current.push(c);
                if let Some(escaped) = chars.next() {
                    current.push(escaped);
                }
            }
            | '\'' => {
                in_quote = !in_quote;
                current.push(c);
            }
            | '-' if !in_quote && chars.peek() == Some(&'-') => {
                // 行注释，丢弃到行尾
                for skipped in chars.by_ref() {
                    if skipped == '\n' {
                        current.push('\n');
                        break;
                    }
                }
            }
            | ';' if !in_quote => {
                push_statement(&mut statements, &current);
                current.clear();
            }
            | _ => current.push(c),
        }
    }
    push_statement(&mut statements, &current);
    statements
}

fn push_statement(statements: &mut Vec<String>, fragment: &str)
{
    let trimmed = fragment.trim();
    if !trimmed.is_empty() {
        statements.push(trimmed.to_string());
    }
}

/// 建库建表。每条语句都带 `IF NOT EXISTS`，重复执行不会出错。
pub struct SchemaProvisioner
{
    bootstrap: ClickHouseClient,
    runtime: ClickHouseClient,
    database: String,
    source: SchemaSource,
}

impl SchemaProvisioner
{
    pub fn new(bootstrap: ClickHouseClient, runtime: ClickHouseClient, database: impl Into<String>, source: SchemaSource) -> Self
    {
        Self { bootstrap,
               runtime,
               database: database.into(),
               source }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, ProvisionError>
    {
        let bootstrap = ClickHouseClient::bootstrap(&config.clickhouse).map_err(|e| ProvisionError::Connection(e.to_string()))?;
        let runtime = ClickHouseClient::runtime(&config.clickhouse).map_err(|e| ProvisionError::Connection(e.to_string()))?;
        let source = config.migration.path.clone().map(SchemaSource::File).unwrap_or(SchemaSource::Embedded);
        Ok(Self::new(bootstrap, runtime, config.clickhouse.database.clone(), source))
    }

    pub fn database(&self) -> &str
    {
        &self.database
    }

    pub async fn provision(&self) -> Result<ProvisionReport, ProvisionError>
    {
        if !DATABASE_NAME.is_match(&self.database) {
            return Err(ProvisionError::InvalidDatabaseName(self.database.clone()));
        }

        self.bootstrap.ping().await.map_err(|e| ProvisionError::Connection(format!("{}: {}", self.bootstrap.url(), e)))?;

        let create_database = format!("CREATE DATABASE IF NOT EXISTS {}", self.database);
        self.bootstrap.execute(&create_database).await.map_err(|source| ProvisionError::CreateDatabase { database: self.database.clone(),
                                                                                                          source })?;
        info!("[OrderStat] : Database {} is present.", self.database);

        let script = self.source.load()?;
        let statements = split_statements(&script);
        for (index, statement) in statements.iter().enumerate() {
            if let Err(source) = self.runtime.execute(statement).await {
                error!("[OrderStat] : Schema statement #{} failed: {}", index, source);
                return Err(ProvisionError::Statement { index,
                                                       statement: statement.clone(),
                                                       source });
            }
        }

        info!("[OrderStat] : Provisioned {} schema statements in {}.", statements.len(), self.database);
        Ok(ProvisionReport { database: self.database.clone(),
                             statements: statements.len() })
    }
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::test_utils::mock_client;
    use clickhouse::test::{handlers, status, Mock};
    use std::io::Write;

    #[test]
    fn split_skips_blank_statements_and_comments()
    {
        let script = "-- header\nCREATE TABLE a (x UInt8) ENGINE = Memory;\n\n;  ;\nCREATE TABLE b (y UInt8) ENGINE = Memory -- trailing\n;";
        assert_eq!(split_statements(script),
                   vec!["CREATE TABLE a (x UInt8) ENGINE = Memory".to_string(), "CREATE TABLE b (y UInt8) ENGINE = Memory".to_string()]);
    }

    #[test]
    fn split_keeps_semicolons_inside_literals()
    {
        let script = "CREATE TABLE t (s String DEFAULT 'a;b') ENGINE = Memory; SELECT 'it\\'s; -- fine'";
        let statements = split_statements(script);
        assert_eq!(statements.len(), 2);
        assert_eq!(statements[0], "CREATE TABLE t (s String DEFAULT 'a;b') ENGINE = Memory");
        assert_eq!(statements[1], "SELECT 'it\\'s; -- fine'");
    }

    #[test]
    fn split_handles_missing_trailing_delimiter()
    {
        assert_eq!(split_statements("SELECT 1"), vec!["SELECT 1".to_string()]);
        assert!(split_statements("  \n-- only a comment\n").is_empty());
    }

    #[test]
    fn embedded_schema_creates_both_tables_idempotently()
    {
        let statements = split_statements(EMBEDDED_SCHEMA);
        assert_eq!(statements.len(), 2);
        assert!(statements.iter().all(|s| s.starts_with("CREATE TABLE IF NOT EXISTS")));
        assert!(statements[0].contains("order_book"));
        assert!(statements[1].contains("order_history"));
        assert!(statements.iter().all(|s| !s.contains('?')));
    }

    #[test]
    fn schema_file_is_read_from_disk()
    {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schema.sql");
        std::fs::File::create(&path).unwrap().write_all(b"CREATE TABLE IF NOT EXISTS x (a UInt8) ENGINE = Memory;").unwrap();
        let script = SchemaSource::File(path).load().unwrap();
        assert_eq!(split_statements(&script).len(), 1);

        let missing = SchemaSource::File(dir.path().join("absent.sql")).load();
        assert!(matches!(missing, Err(ProvisionError::ScriptRead { .. })));
    }

    fn provisioner(mock: &Mock, database: &str, source: SchemaSource) -> SchemaProvisioner
    {
        SchemaProvisioner::new(mock_client(mock), mock_client(mock), database, source)
    }

    #[tokio::test]
    async fn provision_creates_database_then_runs_statements_in_order()
    {
        let mock = Mock::new();
        let source = SchemaSource::Inline("CREATE TABLE IF NOT EXISTS a (x UInt8) ENGINE = Memory; CREATE TABLE IF NOT EXISTS b (y UInt8) ENGINE = Memory;".to_string());

        let ping = mock.add(handlers::record_ddl());
        let create_db = mock.add(handlers::record_ddl());
        let first = mock.add(handlers::record_ddl());
        let second = mock.add(handlers::record_ddl());

        let report = provisioner(&mock, "statistics", source).provision().await.unwrap();
        assert_eq!(report, ProvisionReport { database: "statistics".to_string(),
                                             statements: 2 });

        assert!(ping.query().await.contains("SELECT 1"));
        assert!(create_db.query().await.contains("CREATE DATABASE IF NOT EXISTS statistics"));
        assert!(first.query().await.contains("CREATE TABLE IF NOT EXISTS a"));
        assert!(second.query().await.contains("CREATE TABLE IF NOT EXISTS b"));
    }

    #[tokio::test]
    async fn provision_twice_succeeds()
    {
        let mock = Mock::new();
        let provisioner = provisioner(&mock, "statistics", SchemaSource::Embedded);

        for _ in 0..2 {
            // ping + CREATE DATABASE + 两条建表语句
            let recordings: Vec<_> = (0..4).map(|_| mock.add(handlers::record_ddl())).collect();
            let report = provisioner.provision().await.unwrap();
            assert_eq!(report.statements, 2);

            let mut queries = Vec::new();
            for recording in recordings {
                queries.push(recording.query().await);
            }
            assert!(queries[1].contains("IF NOT EXISTS"));
            assert!(queries[2].contains("CREATE TABLE IF NOT EXISTS order_book"));
            assert!(queries[3].contains("CREATE TABLE IF NOT EXISTS order_history"));
        }
    }

    #[tokio::test]
    async fn failing_statement_is_reported_with_its_text()
    {
        let mock = Mock::new();
        let source = SchemaSource::Inline("CREATE TABLE IF NOT EXISTS a (x UInt8) ENGINE = Memory; CREATE TABLE broken;".to_string());

        let recordings: Vec<_> = (0..3).map(|_| mock.add(handlers::record_ddl())).collect();
        mock.add(handlers::failure(status::BAD_REQUEST));

        let err = provisioner(&mock, "statistics", source).provision().await.unwrap_err();
        for recording in recordings {
            recording.query().await;
        }
        match err {
            | ProvisionError::Statement { index, statement, .. } => {
                assert_eq!(index, 1);
                assert_eq!(statement, "CREATE TABLE broken");
            }
            | other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn unreachable_server_is_a_connection_error()
    {
        let mock = Mock::new();
        mock.add(handlers::failure(status::UNAUTHORIZED));

        let err = provisioner(&mock, "statistics", SchemaSource::Embedded).provision().await.unwrap_err();
        assert!(matches!(err, ProvisionError::Connection(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn invalid_database_name_is_rejected_before_any_request()
    {
        let mock = Mock::new();
        let err = provisioner(&mock, "stats; DROP DATABASE x", SchemaSource::Embedded).provision().await.unwrap_err();
        assert!(matches!(err, ProvisionError::InvalidDatabaseName(_)));
    }
}
