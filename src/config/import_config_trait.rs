// ==========================================
// 薪资导入对账系统 - 导入配置读取 Trait
// ==========================================
// 职责: 定义导入/对账所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use crate::config::config_manager::ConfigResult;
use crate::domain::ContractState;

// ==========================================
// ImportConfigReader Trait
// ==========================================
// 用途: 导入与对账所需的配置读取接口
// 实现者: ConfigManager（从 config_kv 表读取）
pub trait ImportConfigReader: Send + Sync {
    /// 获取表头行数（导入时跳过）
    ///
    /// # 默认值
    /// - 1
    fn get_header_rows(&self) -> ConfigResult<usize>;

    /// 获取导入表引用号所用的序列代码
    ///
    /// # 默认值
    /// - "payroll.import"
    fn get_reference_sequence_code(&self) -> ConfigResult<String>;

    /// 获取视为"有效"的合同状态
    ///
    /// # 默认值
    /// - [Open, Close]
    ///
    /// # 用途
    /// - 对账时为员工新建工资单前查找合同
    fn get_contract_states(&self) -> ConfigResult<Vec<ContractState>>;
}
