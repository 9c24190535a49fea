// ==========================================
// 条码池分配引擎 - 引擎层错误类型
// ==========================================
// 职责: 区分“需要补充条码”、“可重试”与“输入非法”三类失败，
//       错误信息携带 variant_id / code_type / code 便于审计
// ==========================================

use crate::domain::types::CodeType;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// 引擎层错误类型
#[derive(Error, Debug)]
pub enum PoolError {
    // ==========================================
    // 输入错误
    // ==========================================
    #[error("输入校验失败: {0}")]
    Validation(String),

    // ==========================================
    // 池容量错误（触发补充导入，而不是盲目重试）
    // ==========================================
    #[error("条码池耗尽: code_type={code_type}, min_quality={min_quality}")]
    PoolExhausted { code_type: CodeType, min_quality: i32 },

    // ==========================================
    // 并发控制错误（可重试）
    // ==========================================
    #[error("并发冲突: 条目已被其他进程认领 (entry_id={entry_id}, code={code}, variant_id={variant_id})")]
    ConcurrencyConflict {
        entry_id: i64,
        code: String,
        variant_id: String,
    },

    // ==========================================
    // 数据一致性（由释放流程自愈，不向外抛出）
    // ==========================================
    #[error("孤立记录: 变体 {variant_id} 的 {code_type} 条码 {code} 在条码池中不存在")]
    OrphanedRecord {
        variant_id: String,
        code_type: CodeType,
        code: String,
    },

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl PoolError {
    /// 是否可重试（并发冲突 / 数据库繁忙）
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PoolError::ConcurrencyConflict { .. }
                | PoolError::Repository(RepositoryError::DatabaseBusy(_))
        )
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self, PoolError::PoolExhausted { .. })
    }
}

impl From<rusqlite::Error> for PoolError {
    fn from(err: rusqlite::Error) -> Self {
        PoolError::Repository(RepositoryError::from(err))
    }
}

/// Result 类型别名
pub type PoolResult<T> = Result<T, PoolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_and_busy_are_retryable() {
        let conflict = PoolError::ConcurrencyConflict {
            entry_id: 1,
            code: "4006381333931".to_string(),
            variant_id: "v-1".to_string(),
        };
        let exhausted = PoolError::PoolExhausted {
            code_type: CodeType::Ean13,
            min_quality: 7,
        };

        assert!(conflict.is_retryable());
        assert!(!exhausted.is_retryable());
        assert!(exhausted.is_exhausted());
        assert!(!PoolError::Validation("x".to_string()).is_retryable());
        assert!(PoolError::Repository(RepositoryError::DatabaseBusy("locked".to_string()))
            .is_retryable());
        assert!(!PoolError::Repository(RepositoryError::DatabaseQueryError("x".to_string()))
            .is_retryable());
        assert_eq!(
            exhausted.to_string(),
            "条码池耗尽: code_type=EAN13, min_quality=7"
        );
    }
}
