use thiserror::Error;

/// 统计存储的错误。每个变体都带上操作名与关键参数，调用方据此映射为传输层的状态码。
#[derive(Error, Debug)]
pub enum StoreError
{
    #[error("[OrderStat] : failed to reach ClickHouse: {0}")]
    Connection(String),

    #[error("[OrderStat] : {operation} failed for ({params}): {source}")]
    Query
    {
        operation: &'static str,
        params: String,
        #[source]
        source: clickhouse::error::Error,
    },

    #[error("[OrderStat] : {operation} rejected batch for ({params}): row {index} is invalid: {reason}")]
    Batch
    {
        operation: &'static str,
        params: String,
        index: usize,
        reason: String,
    },

    #[error("[OrderStat] : {operation} insert was not committed for ({params}): {source}")]
    Insert
    {
        operation: &'static str,
        params: String,
        #[source]
        source: clickhouse::error::Error,
    },

    #[error("[OrderStat] : {operation} received an empty batch for ({params})")]
    EmptyBatch
    {
        operation: &'static str, params: String
    },

    #[error("[OrderStat] : {operation} order field `{field}` does not match client ({params})")]
    KeyMismatch
    {
        operation: &'static str,
        params: String,
        field: &'static str,
    },

    #[error("[OrderStat] : {operation} could not decode a stored row for ({params}): {reason}")]
    Decode
    {
        operation: &'static str,
        params: String,
        reason: String,
    },

    #[error("[OrderStat] : {operation} timed out after {timeout:?} for ({params})")]
    Timeout
    {
        operation: &'static str,
        params: String,
        timeout: std::time::Duration,
    },

    #[error("[OrderStat] : {operation} query expects {expected} parameters but {given} were bound for ({params})")]
    Binding
    {
        operation: &'static str,
        params: String,
        expected: usize,
        given: usize,
    },

    #[error("[OrderStat] : {0} called after the store was closed")]
    Closed(&'static str),
}

impl StoreError
{
    /// 网络不可达或认证失败（ClickHouse `Code: 516`, AUTHENTICATION_FAILED）都视为连接错误。
    pub fn is_connection_failure(source: &clickhouse::error::Error) -> bool
    {
        match source {
            | clickhouse::error::Error::Network(_) => true,
            | clickhouse::error::Error::BadResponse(reason) => reason.contains("Code: 516.") || reason.contains("AUTHENTICATION_FAILED"),
            | _ => false,
        }
    }

    /// 按 ClickHouse 客户端错误的种类区分连接失败与查询失败。
    pub fn from_query(operation: &'static str, params: String, source: clickhouse::error::Error) -> Self
    {
        if Self::is_connection_failure(&source) {
            return StoreError::Connection(format!("{operation} ({params}): {source}"));
        }
        StoreError::Query { operation, params, source }
    }

    pub fn from_insert(operation: &'static str, params: String, source: clickhouse::error::Error) -> Self
    {
        if Self::is_connection_failure(&source) {
            return StoreError::Connection(format!("{operation} ({params}): {source}"));
        }
        StoreError::Insert { operation, params, source }
    }

    /// 是否由调用方的输入造成（传输层映射为 400）。
    pub fn is_caller_error(&self) -> bool
    {
        matches!(self, StoreError::Batch { .. } | StoreError::EmptyBatch { .. } | StoreError::KeyMismatch { .. })
    }
}

/// 建库建表过程中的错误。任何一个都会终止本次建库。
#[derive(Error, Debug)]
pub enum ProvisionError
{
    #[error("[OrderStat] : provisioning could not reach ClickHouse: {0}")]
    Connection(String),

    #[error("[OrderStat] : invalid database name `{0}`")]
    InvalidDatabaseName(String),

    #[error("[OrderStat] : CREATE DATABASE {database} failed: {source}")]
    CreateDatabase
    {
        database: String,
        #[source]
        source: clickhouse::error::Error,
    },

    #[error("[OrderStat] : failed to read schema script {path}: {source}")]
    ScriptRead
    {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("[OrderStat] : schema statement #{index} failed: {source}\n{statement}")]
    Statement
    {
        index: usize,
        statement: String,
        #[source]
        source: clickhouse::error::Error,
    },
}

#[derive(Error, Debug)]
pub enum ConfigError
{
    #[error("[OrderStat] : configuration file {0} is missing")]
    ConfigMissing(String),

    #[error("[OrderStat] : failed to parse configuration: {0}")]
    ConfigParseError(String),

    #[error("[OrderStat] : invalid configuration: {0}")]
    Invalid(String),

    #[error("[OrderStat] : internal error: {0}")]
    InternalError(String),
}

/// HTTP 服务的启动与退出错误。
#[derive(Error, Debug)]
pub enum ServerError
{
    #[error("[OrderStat] : failed to bind HTTP server: {0}")]
    Bind(#[from] warp::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

// 将`std::io::Error`转换为自定义的`ConfigError`
impl From<std::io::Error> for ConfigError
{
    fn from(err: std::io::Error) -> Self
    {
        ConfigError::InternalError(format!("IO error: {}", err))
    }
}

// 将TOML解析错误转换为自定义的`ConfigError`
impl From<toml::de::Error> for ConfigError
{
    fn from(err: toml::de::Error) -> Self
    {
        ConfigError::ConfigParseError(format!("TOML error: {}", err))
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn caller_errors_are_classified()
    {
        let batch = StoreError::Batch { operation: "save_order_book",
                                        params: "exchange=binance, pair=BTC/USD".to_string(),
                                        index: 2,
                                        reason: "bad".to_string() };
        assert!(batch.is_caller_error());
        assert!(!StoreError::Closed("get_order_book").is_caller_error());
        assert!(!StoreError::Connection("refused".to_string()).is_caller_error());
    }

    #[test]
    fn messages_carry_operation_and_params()
    {
        let err = StoreError::Timeout { operation: "get_order_history",
                                        params: "client_name=c1".to_string(),
                                        timeout: std::time::Duration::from_millis(250) };
        let msg = err.to_string();
        assert!(msg.contains("get_order_history"));
        assert!(msg.contains("client_name=c1"));
        assert!(msg.contains("250ms"), "{msg}");
    }

    #[test]
    fn authentication_failure_is_a_connection_error()
    {
        let denied = || {
            clickhouse::error::Error::BadResponse("Code: 516. DB::Exception: stat_writer: Authentication failed: password is incorrect, or there is no user with such name. (AUTHENTICATION_FAILED)".to_string())
        };
        let read = StoreError::from_query("get_order_book", "exchange=binance, pair=BTC/USD".to_string(), denied());
        assert!(matches!(read, StoreError::Connection(_)), "got {read:?}");
        let write = StoreError::from_insert("save_order", "client_name=c1".to_string(), denied());
        assert!(matches!(write, StoreError::Connection(_)), "got {write:?}");

        let syntax = StoreError::from_query("get_order_book", String::new(), clickhouse::error::Error::BadResponse("Code: 62. Syntax error".to_string()));
        assert!(matches!(syntax, StoreError::Query { .. }));
    }

    #[test]
    fn statement_error_includes_offending_statement()
    {
        let err = ProvisionError::Statement { index: 1,
                                              statement: "CREATE TABLE broken".to_string(),
                                              source: clickhouse::error::Error::BadResponse("Code: 62. Syntax error".to_string()) };
        let msg = err.to_string();
        assert!(msg.contains("#1"));
        assert!(msg.contains("CREATE TABLE broken"));
    }

    #[test]
    fn toml_error_maps_to_parse_error()
    {
        let err: ConfigError = toml::from_str::<toml::Value>("= broken").unwrap_err().into();
        assert!(matches!(err, ConfigError::ConfigParseError(_)));
    }
}
