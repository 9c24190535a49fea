// ==========================================
// 导入引擎集成测试
// ==========================================
// 职责: 验证文件解析 → 评分/定状态 → 分块落库的完整链路
// ==========================================


#[cfg(test)]
mod importer_engine_test {
    use barcode_pool::domain::{CodeType, PoolStatus};
    use barcode_pool::importer::{ImportError, ImportOptions, PoolImporter};
    use std::io::Write;
    use std::path::PathBuf;
    use tempfile::Builder;

    use crate::test_helpers::{count_status, raw_row, setup_service};

    fn fixture_path() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/legacy_codes.csv")
    }

    fn no_threshold() -> ImportOptions {
        ImportOptions {
            legacy_row_threshold: Some(0),
            ..ImportOptions::default()
        }
    }

    #[tokio::test]
    async fn test_import_fixture_file() {
        let (_temp, db_path, service) = setup_service();

        let summary = service
            .import_file(&fixture_path(), &no_threshold())
            .await
            .unwrap();

        assert_eq!(summary.total_rows, 8);
        assert_eq!(summary.total_processed, 5);
        assert_eq!(summary.available_count, 2);
        assert_eq!(summary.legacy_count, 1);
        assert_eq!(summary.problematic_count, 2);
        // 空码 + 批内重复 + 未知类型
        assert_eq!(summary.skipped_count, 3);

        let repo = &service.pool_repo;
        let first = repo.find_by_code("4006381333931").unwrap().unwrap();
        assert_eq!(first.status, PoolStatus::Available);
        assert_eq!(first.quality_score, 10);
        assert_eq!(first.row_number, 1);
        assert_eq!(first.legacy_product_name.as_deref(), Some("Widget"));
        assert_eq!(first.import_batch_id, summary.import_batch_id);

        let archived = repo.find_by_code("4006381333948").unwrap().unwrap();
        assert_eq!(archived.status, PoolStatus::LegacyArchive);
        assert!(archived.is_legacy);
        assert_eq!(archived.notes.as_deref(), Some("archived by ops"));

        let broken = repo.find_by_code("4006381333955").unwrap().unwrap();
        assert_eq!(broken.status, PoolStatus::Problematic);
        assert_eq!(broken.quality_score, 6);
        assert_eq!(
            broken.legacy_notes.as_deref(),
            Some("Legacy SKU: OLD-0003 | Product: Gizmo | Last Updated: 2018-03-03 | Original Status: ERROR: checksum")
        );

        let short = repo.find_by_code("12345678").unwrap().unwrap();
        assert_eq!(short.code_type, CodeType::Ean8);
        assert_eq!(short.quality_score, 3);
        assert_eq!(short.legacy_notes.as_deref(), Some("Original Status: invalid"));
        assert_eq!(short.legacy_sku, None);

        let upc = repo.find_by_code("036000291452").unwrap().unwrap();
        assert_eq!(upc.code_type, CodeType::Upc);
        assert_eq!(upc.quality_score, 10);

        assert_eq!(count_status(&db_path, PoolStatus::Available), 2);
        println!("✓ 固定文件导入统计正确");
    }

    #[tokio::test]
    async fn test_default_threshold_archives_early_rows() {
        let (_temp, _db_path, service) = setup_service();

        let summary = service
            .import_file(&fixture_path(), &ImportOptions::default())
            .await
            .unwrap();

        // 所有行号都低于 40000
        assert_eq!(summary.legacy_count, 5);
        assert_eq!(summary.available_count, 0);
        assert_eq!(summary.problematic_count, 0);

        let first = service.pool_repo.find_by_code("4006381333931").unwrap().unwrap();
        assert_eq!(first.quality_score, 7);
        println!("✓ 默认历史阈值生效");
    }

    #[tokio::test]
    async fn test_duplicate_code_in_one_batch() {
        let (_temp, db_path, service) = setup_service();
        let rows = vec![
            raw_row("4006381333931", "EAN13", "active", "Widget", "Acme"),
            raw_row("4006381333931", "EAN13", "active", "Widget", "Acme"),
        ];

        let summary = service.import_rows(rows, &no_threshold()).await.unwrap();

        assert_eq!(summary.total_processed, 1);
        assert_eq!(summary.skipped_count, 1);
        assert_eq!(count_status(&db_path, PoolStatus::Available), 1);
        println!("✓ 批内重复条码只落库一次");
    }

    #[tokio::test]
    async fn test_reimport_skips_persisted_codes() {
        let (_temp, _db_path, service) = setup_service();
        let rows = vec![
            raw_row("4006381333931", "EAN13", "active", "Widget", "Acme"),
            raw_row("4006381333948", "EAN13", "active", "Gadget", "Acme"),
        ];

        let first = service.import_rows(rows.clone(), &no_threshold()).await.unwrap();
        let second = service.import_rows(rows, &no_threshold()).await.unwrap();

        assert_eq!(first.total_processed, 2);
        assert_eq!(second.total_processed, 0);
        assert_eq!(second.skipped_count, 2);
        assert_eq!(service.list_import_batches(10).unwrap().len(), 1);
        println!("✓ 跨批次已存在条码被跳过");
    }

    #[tokio::test]
    async fn test_resume_from_row_number() {
        let (_temp, _db_path, service) = setup_service();
        let rows: Vec<Vec<String>> = (0..6)
            .map(|i| {
                let code = format!("4006381{:06}", i);
                raw_row(&code, "EAN13", "active", "Widget", "Acme")
            })
            .collect();

        // 第一次只导入前 3 行（模拟中断）
        let options = ImportOptions {
            chunk_size: 2,
            start_row_number: 39_998,
            ..ImportOptions::default()
        };
        let first = service
            .import_rows(rows[..3].to_vec(), &options)
            .await
            .unwrap();
        assert_eq!(first.chunks_committed, 2);

        // 从断点行号续传
        let resume = ImportOptions {
            start_row_number: 39_998 + 3,
            ..options.clone()
        };
        let second = service.import_rows(rows[3..].to_vec(), &resume).await.unwrap();
        assert_eq!(second.total_processed, 3);

        let last = service.pool_repo.find_by_code("4006381000005").unwrap().unwrap();
        assert_eq!(last.row_number, 40_003);
        // 39998 / 39999 两行为历史
        assert_eq!(first.legacy_count, 2);
        assert_eq!(first.available_count + second.available_count, 4);
        println!("✓ 续传后行号连续");
    }

    #[tokio::test]
    async fn test_batch_import_isolates_failures() {
        let (_temp, _db_path, service) = setup_service();

        let mut good = Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(good, "code,type").unwrap();
        writeln!(good, "4006381333979,EAN13").unwrap();

        let results = service
            .importer
            .batch_import(
                vec![good.path().to_path_buf(), PathBuf::from("missing_file.csv")],
                &no_threshold(),
            )
            .await;

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].as_ref().unwrap().total_processed, 1);
        assert!(results[1].as_ref().unwrap_err().contains("missing_file.csv"));
        println!("✓ 批量导入单文件失败不影响其他文件");
    }

    #[tokio::test]
    async fn test_blank_lines_keep_row_numbers() {
        let (_temp, _db_path, service) = setup_service();
        let mut file = Builder::new().suffix(".csv").tempfile().unwrap();
        file.write_all(b"code,type\n4006381333931,EAN13\n\n\n4006381333948,EAN13\n")
            .unwrap();

        let summary = service.import_file(file.path(), &no_threshold()).await.unwrap();
        assert_eq!(summary.total_rows, 2);
        assert_eq!(summary.total_processed, 2);
        assert_eq!(summary.skipped_count, 0);

        let entries = service.list_batch_entries(&summary.import_batch_id).unwrap();
        let positions: Vec<(&str, i64)> = entries
            .iter()
            .map(|e| (e.code.as_str(), e.row_number))
            .collect();
        assert_eq!(positions, vec![("4006381333931", 1), ("4006381333948", 4)]);
        println!("✓ 空行不改变后续行号");
    }

    #[tokio::test]
    async fn test_undecodable_bytes_do_not_fail_file() {
        let (_temp, _db_path, service) = setup_service();
        let mut file = Builder::new().suffix(".csv").tempfile().unwrap();
        file.write_all(
            b"code,type,status,legacy_sku,legacy_status,product_name\n\
              4006381333931,EAN13,,,active,Caf\xe9\n\
              40063813\xff3948,EAN13,,,active,Broken\n\
              4006381333955,EAN13,,,active,Tea\n",
        )
        .unwrap();

        let summary = service.import_file(file.path(), &no_threshold()).await.unwrap();
        assert_eq!(summary.total_rows, 3);
        assert_eq!(summary.total_processed, 2);
        // 条码本身无法解码的行跳过并计数
        assert_eq!(summary.skipped_count, 1);

        let entries = service.list_batch_entries(&summary.import_batch_id).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].legacy_product_name.as_deref(), Some("Caf\u{FFFD}"));
        assert_eq!(entries[1].code, "4006381333955");
        assert_eq!(entries[1].row_number, 3);
        println!("✓ 非 UTF-8 字节不导致整文件失败");
    }

    #[tokio::test]
    async fn test_unsupported_extension() {
        let (_temp, _db_path, service) = setup_service();
        let file = Builder::new().suffix(".txt").tempfile().unwrap();

        let result = service.import_file(file.path(), &ImportOptions::default()).await;
        assert!(matches!(result, Err(ImportError::UnsupportedFormat(_))));
    }
}
