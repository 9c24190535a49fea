// ==========================================
// 条码池分配引擎 - 变体条码记录仓储
// ==========================================
// 存储: variant_code 表（主键 variant_id + code_type）
// ==========================================

use crate::domain::allocation::VariantCode;
use crate::domain::types::CodeType;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::variant_code_store::VariantCodeStore;
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension};

/// 基于 variant_code 表的默认实现
#[derive(Debug, Clone, Copy, Default)]
pub struct VariantCodeRepository;

impl VariantCodeRepository {
    pub fn new() -> Self {
        Self
    }

    /// 查询变体的全部条码记录
    pub fn list_for_variant(
        &self,
        conn: &Connection,
        variant_id: &str,
    ) -> RepositoryResult<Vec<VariantCode>> {
        let mut stmt = conn.prepare(
            r#"SELECT variant_id, code_type, code, attached_at
               FROM variant_code WHERE variant_id = ?1 ORDER BY code_type"#,
        )?;
        let rows = stmt.query_map(params![variant_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, NaiveDateTime>(3)?,
            ))
        })?;

        let mut codes = Vec::new();
        for row in rows {
            let (variant_id, code_type_raw, code, attached_at) = row?;
            codes.push(VariantCode {
                variant_id,
                code_type: parse_code_type(&code_type_raw)?,
                code,
                attached_at,
            });
        }
        Ok(codes)
    }
}

fn parse_code_type(raw: &str) -> RepositoryResult<CodeType> {
    CodeType::parse(raw).ok_or_else(|| RepositoryError::FieldValueError {
        field: "code_type".to_string(),
        message: format!("未知条码类型: {}", raw),
    })
}

impl VariantCodeStore for VariantCodeRepository {
    fn find_code(
        &self,
        conn: &Connection,
        variant_id: &str,
        code_type: CodeType,
    ) -> RepositoryResult<Option<VariantCode>> {
        let row = conn
            .query_row(
                r#"SELECT code, attached_at FROM variant_code
                   WHERE variant_id = ?1 AND code_type = ?2"#,
                params![variant_id, code_type.to_db_str()],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, NaiveDateTime>(1)?)),
            )
            .optional()?;

        Ok(row.map(|(code, attached_at)| VariantCode {
            variant_id: variant_id.to_string(),
            code_type,
            code,
            attached_at,
        }))
    }

    fn attach_code(
        &self,
        conn: &Connection,
        variant_id: &str,
        code_type: CodeType,
        code: &str,
        attached_at: NaiveDateTime,
    ) -> RepositoryResult<()> {
        conn.execute(
            r#"INSERT INTO variant_code (variant_id, code_type, code, attached_at)
               VALUES (?1, ?2, ?3, ?4)
               ON CONFLICT(variant_id, code_type) DO UPDATE SET
                   code = excluded.code,
                   attached_at = excluded.attached_at"#,
            params![variant_id, code_type.to_db_str(), code, attached_at],
        )?;
        Ok(())
    }

    fn detach_code(
        &self,
        conn: &Connection,
        variant_id: &str,
        code_type: CodeType,
    ) -> RepositoryResult<bool> {
        let changed = conn.execute(
            "DELETE FROM variant_code WHERE variant_id = ?1 AND code_type = ?2",
            params![variant_id, code_type.to_db_str()],
        )?;
        Ok(changed > 0)
    }
}
