// ==========================================
// 条码池分配引擎 - 位置列映射器
// ==========================================
// 与历史导入文件保持兼容的固定列位置:
// [0]=code [1]=type [2]=status_hint [3]=legacy_sku [4]=legacy_status
// [5]=legacy_product_name [6]=legacy_brand [7]=legacy_updated [8]=保留 [9]=notes
// ==========================================

use crate::domain::pool_entry::RawPoolRow;
use crate::importer::pool_importer_trait::RowMapper;

pub mod columns {
    pub const CODE: usize = 0;
    pub const TYPE: usize = 1;
    pub const STATUS_HINT: usize = 2;
    pub const LEGACY_SKU: usize = 3;
    pub const LEGACY_STATUS: usize = 4;
    pub const LEGACY_PRODUCT_NAME: usize = 5;
    pub const LEGACY_BRAND: usize = 6;
    pub const LEGACY_UPDATED: usize = 7;
    pub const RESERVED: usize = 8;
    pub const NOTES: usize = 9;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PositionalRowMapper;

fn cell(cells: &[String], idx: usize) -> String {
    cells.get(idx).map(|v| v.trim().to_string()).unwrap_or_default()
}

impl RowMapper for PositionalRowMapper {
    fn map_row(&self, cells: &[String], row_number: i64) -> RawPoolRow {
        RawPoolRow {
            row_number,
            code: cell(cells, columns::CODE),
            type_raw: cell(cells, columns::TYPE),
            status_hint: cell(cells, columns::STATUS_HINT),
            legacy_sku: cell(cells, columns::LEGACY_SKU),
            legacy_status: cell(cells, columns::LEGACY_STATUS),
            legacy_product_name: cell(cells, columns::LEGACY_PRODUCT_NAME),
            legacy_brand: cell(cells, columns::LEGACY_BRAND),
            legacy_updated: cell(cells, columns::LEGACY_UPDATED),
            notes: cell(cells, columns::NOTES),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cells(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_full_row_mapping_ignores_reserved_column() {
        let row = PositionalRowMapper.map_row(
            &cells(&[
                " 4006381333931 ",
                "EAN13",
                "legacy_archive",
                "OLD-1",
                "ok",
                "Widget",
                "Acme",
                "2019-01-01",
                "IGNORED",
                "note",
            ]),
            7,
        );

        assert_eq!(row.row_number, 7);
        assert_eq!(row.code, "4006381333931");
        assert_eq!(row.status_hint, "legacy_archive");
        assert_eq!(row.legacy_updated, "2019-01-01");
        assert_eq!(row.notes, "note");
        assert_eq!(columns::RESERVED, 8);
    }

    #[test]
    fn test_short_row_reads_missing_as_empty() {
        let row = PositionalRowMapper.map_row(&cells(&["123"]), 1);
        assert_eq!(row.code, "123");
        assert!(row.type_raw.is_empty());
        assert!(row.notes.is_empty());
    }
}
