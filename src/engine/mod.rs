// ==========================================
// 薪资导入对账系统 - 引擎层
// ==========================================
// 职责: 实现对账规则,不拼 SQL
// 红线: Engine 不拼 SQL, 跳过的明细必须输出原因
// ==========================================

pub mod pay_period;
pub mod reconciler;

// 重导出核心引擎
pub use pay_period::PayPeriod;
pub use reconciler::{PayslipReconciler, ReconcileError, ReconcileResult};
