// ==========================================
// 薪资导入对账系统 - 核心库
// ==========================================
// 技术栈: Rust + SQLite
// 系统定位: 表格导入 + 工资单输入对账（不计算薪资）
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 对账规则
pub mod engine;

// 导入层 - 表格解析与行校验
pub mod importer;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 调用方入口
pub mod api;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{
    ContractState, NotificationLevel, ReconcileOutcome, SheetState, SkipReason,
};

// 领域实体
pub use domain::{
    ApplySummary, ImportLine, ImportRow, ImportSheet, ImportSummary, ImportUpload, LineSkip,
    NewSheet, Notification, RowError, RowWarning, SheetTarget,
};

// 引擎 / 导入
pub use engine::{PayPeriod, PayslipReconciler, ReconcileError};
pub use importer::{EntityResolver, ImportBatch, ImportError, RowParser};

// API
pub use api::{ApiError, ApiResult, PayrollImportApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "薪资导入对账系统";
