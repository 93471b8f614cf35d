//! 存储层错误类型
//!
//! - SchemaError（Schema Gate / 迁移错误）
//! - DaoError（业务数据访问错误）
//! - ConfigError（启动配置错误）
//!
//! ## 设计原则
//! - 使用 thiserror 派生 Error trait
//! - 支持 From 转换以便错误传播
//! - HTTP 层按变体映射状态码，消息取自 Display

use thiserror::Error;

// ============================================================================
// Schema 错误
// ============================================================================

/// Schema Gate 执行错误
///
/// 结构性步骤（建表、加列、建索引、写版本号）失败时产生，
/// 会一直传播到 HTTP 层（500）。
#[derive(Error, Debug)]
pub enum SchemaError {
    /// 迁移步骤失败
    #[error("迁移步骤 {step} 失败: {source}")]
    Step {
        step: String,
        #[source]
        source: rusqlite::Error,
    },

    /// 读取或写入版本号失败
    #[error("数据库错误: {0}")]
    DatabaseError(#[from] rusqlite::Error),

    /// 数据库连接锁已损坏
    #[error("数据库连接锁已损坏")]
    Poisoned,

    /// 后台任务异常退出
    #[error("Schema 检查任务异常退出: {0}")]
    Join(String),
}

// ============================================================================
// DAO 错误
// ============================================================================

/// 业务数据访问错误
#[derive(Error, Debug)]
pub enum DaoError {
    /// 记录不存在
    #[error("{0} 不存在")]
    NotFound(String),

    /// 违反业务规则
    #[error("{0}")]
    Invalid(String),

    /// 数据库错误
    #[error("数据库错误: {0}")]
    DatabaseError(#[from] rusqlite::Error),
}

impl DaoError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }
}

// ============================================================================
// 配置错误
// ============================================================================

#[derive(Error, Debug)]
pub enum ConfigError {
    /// 缺少数据库连接串
    #[error("缺少环境变量 DATABASE_URL")]
    MissingDatabaseUrl,

    #[error("配置项 {key} 的值无效: {value}")]
    InvalidValue { key: String, value: String },

    #[error("读取配置文件 {path} 失败: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("解析配置文件失败: {0}")]
    Parse(#[from] serde_yaml::Error),
}

// ============================================================================
// 测试
// ============================================================================
