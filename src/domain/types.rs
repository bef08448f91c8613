// ==========================================
// 薪资导入对账系统 - 领域类型定义
// ==========================================
// 职责: 状态枚举 / 数据库文本编码
// 序列化格式: snake_case (与数据库一致)
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ==========================================
// 导入表状态 (Import Sheet State)
// ==========================================
// 红线: 只允许 draft → done，单向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SheetState {
    Draft, // 草稿（可继续导入）
    Done,  // 已对账
}

impl SheetState {
    /// 状态流转是否合法
    ///
    /// 同状态重入视为合法（对账允许重复执行）
    pub fn can_transition_to(self, next: SheetState) -> bool {
        matches!(
            (self, next),
            (SheetState::Draft, SheetState::Draft)
                | (SheetState::Draft, SheetState::Done)
                | (SheetState::Done, SheetState::Done)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SheetState::Draft => "draft",
            SheetState::Done => "done",
        }
    }
}

impl fmt::Display for SheetState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SheetState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "draft" => Ok(SheetState::Draft),
            "done" => Ok(SheetState::Done),
            other => Err(format!("未知的导入表状态: {}", other)),
        }
    }
}

// ==========================================
// 对账结果 (Reconcile Outcome)
// ==========================================
// 附加字段，不改变 SheetState 的两态语义
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileOutcome {
    Done,          // 全部明细已落到工资单
    DoneWithSkips, // 存在被跳过的明细（如无有效合同）
}

impl ReconcileOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReconcileOutcome::Done => "done",
            ReconcileOutcome::DoneWithSkips => "done_with_skips",
        }
    }
}

impl fmt::Display for ReconcileOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ReconcileOutcome {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "done" => Ok(ReconcileOutcome::Done),
            "done_with_skips" => Ok(ReconcileOutcome::DoneWithSkips),
            other => Err(format!("未知的对账结果: {}", other)),
        }
    }
}

// ==========================================
// 合同状态 (Contract State)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractState {
    Draft,  // 新建
    Open,   // 执行中
    Close,  // 已到期
    Cancel, // 已取消
}

impl ContractState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContractState::Draft => "draft",
            ContractState::Open => "open",
            ContractState::Close => "close",
            ContractState::Cancel => "cancel",
        }
    }
}

impl fmt::Display for ContractState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ContractState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "draft" => Ok(ContractState::Draft),
            "open" => Ok(ContractState::Open),
            "close" => Ok(ContractState::Close),
            "cancel" => Ok(ContractState::Cancel),
            other => Err(format!("未知的合同状态: {}", other)),
        }
    }
}

// ==========================================
// 明细跳过原因 (Skip Reason)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    NoActiveContract, // 需要新建工资单但员工无有效合同
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NoActiveContract => write!(f, "skipped: no active contract"),
        }
    }
}

// ==========================================
// 通知级别 (Notification Level)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationLevel {
    Success,
    Info,
}
