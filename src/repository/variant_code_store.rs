// ==========================================
// 条码池分配引擎 - 变体侧条码记录 Trait
// ==========================================
// 职责: 定义变体（外部协作方）需要提供的两项能力
// - 该变体是否已挂载某类型条码
// - 记录 / 清除该变体某类型条码
// 说明: 所有方法接收调用方的连接/事务，使引擎能把池条目变更与
//       变体侧记录变更放进同一事务，避免“半释放”状态
// ==========================================

use crate::domain::allocation::VariantCode;
use crate::domain::types::CodeType;
use crate::repository::error::RepositoryResult;
use chrono::NaiveDateTime;
use rusqlite::Connection;

// ==========================================
// VariantCodeStore Trait
// ==========================================
// 实现者: VariantCodeRepository（variant_code 表）
pub trait VariantCodeStore: Send + Sync {
    /// 查询变体当前挂载的某类型条码
    fn find_code(
        &self,
        conn: &Connection,
        variant_id: &str,
        code_type: CodeType,
    ) -> RepositoryResult<Option<VariantCode>>;

    /// 记录变体挂载的条码（同类型已存在则覆盖）
    fn attach_code(
        &self,
        conn: &Connection,
        variant_id: &str,
        code_type: CodeType,
        code: &str,
        attached_at: NaiveDateTime,
    ) -> RepositoryResult<()>;

    /// 清除变体某类型条码记录
    ///
    /// # 返回
    /// - true: 有记录被删除
    fn detach_code(
        &self,
        conn: &Connection,
        variant_id: &str,
        code_type: CodeType,
    ) -> RepositoryResult<bool>;
}
