// ==========================================
// 条码池分配引擎 - 可用性报表
// ==========================================
// 只读统计（按条码类型范围），不改变池状态
// 一份报表（含 report_all 的全部类型）的所有计数在同一读事务内完成
// 健康标志:
// - sufficient_supply: ready >  sufficient 阈值（默认 1000）
// - low_supply_warning: ready < low 阈值（默认 100）
// - critical_supply:   ready < critical 阈值（默认 10）
// - quality_ratio_good: high / available_total > 0.8（available_total > 0）
// ==========================================

use crate::config::pool_settings::PoolSettings;
use crate::domain::report::{AvailabilityReport, StatusCounts};
use crate::domain::types::{CodeType, SupplyStatus};
use crate::engine::allocator::validate_min_quality;
use crate::engine::error::PoolResult;
use crate::perf::PerfGuard;
use crate::repository::error::RepositoryResult;
use crate::repository::pool_entry_repo::PoolEntryRepository;
use rusqlite::Connection;
use tracing::{debug, instrument};

const GOOD_QUALITY_RATIO: f64 = 0.8;

/// 供给标志
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupplyFlags {
    pub sufficient: bool,
    pub low: bool,
    pub critical: bool,
}

impl SupplyFlags {
    pub fn evaluate(ready: i64, settings: &PoolSettings) -> Self {
        Self {
            sufficient: ready > settings.sufficient_supply_threshold,
            low: ready < settings.low_supply_threshold,
            critical: ready < settings.critical_supply_threshold,
        }
    }

    /// critical > low > excellent > good
    pub fn status(&self) -> SupplyStatus {
        if self.critical {
            SupplyStatus::Critical
        } else if self.low {
            SupplyStatus::Low
        } else if self.sufficient {
            SupplyStatus::Excellent
        } else {
            SupplyStatus::Good
        }
    }
}

fn utilization_rate(counts: &StatusCounts) -> f64 {
    let total = counts.total();
    if total == 0 {
        0.0
    } else {
        counts.assigned as f64 / total as f64 * 100.0
    }
}

fn quality_ratio_good(high: i64, available_total: i64) -> bool {
    available_total > 0 && (high as f64 / available_total as f64) > GOOD_QUALITY_RATIO
}

pub struct AvailabilityReporter {
    repo: PoolEntryRepository,
    settings: PoolSettings,
}

impl AvailabilityReporter {
    pub fn new(repo: PoolEntryRepository, settings: PoolSettings) -> Self {
        Self { repo, settings }
    }

    #[instrument(skip(self), fields(code_type = %code_type))]
    pub fn report(&self, code_type: CodeType, min_quality: i32) -> PoolResult<AvailabilityReport> {
        validate_min_quality(min_quality)?;
        let _perf = PerfGuard::new("availability_report");

        let report = self
            .repo
            .with_read_tx(|conn| self.build_report(conn, code_type, min_quality))?;

        debug!(
            ready = report.ready_for_assignment,
            total = report.total_pool_size,
            supply_status = %report.supply_status,
            "可用性报表已生成"
        );

        Ok(report)
    }

    /// 池中出现过的每种条码类型各一份报表
    pub fn report_all(&self, min_quality: i32) -> PoolResult<Vec<AvailabilityReport>> {
        validate_min_quality(min_quality)?;
        let _perf = PerfGuard::new("availability_report_all");

        Ok(self.repo.with_read_tx(|conn| {
            PoolEntryRepository::list_code_types_tx(conn)?
                .into_iter()
                .map(|code_type| self.build_report(conn, code_type, min_quality))
                .collect::<RepositoryResult<Vec<_>>>()
        })?)
    }

    fn build_report(
        &self,
        conn: &Connection,
        code_type: CodeType,
        min_quality: i32,
    ) -> RepositoryResult<AvailabilityReport> {
        let counts = PoolEntryRepository::count_by_status_tx(conn, code_type)?;
        let ready = PoolEntryRepository::count_ready_tx(conn, code_type, min_quality)?;
        let threshold = self.settings.high_quality_threshold;
        let (high, low) =
            PoolEntryRepository::count_available_quality_split_tx(conn, code_type, threshold)?;
        let next_available =
            PoolEntryRepository::find_next_candidate_tx(conn, code_type, min_quality)?;

        let flags = SupplyFlags::evaluate(ready, &self.settings);

        Ok(AvailabilityReport {
            code_type,
            min_quality,
            ready_for_assignment: ready,
            available_total: counts.available,
            assigned_total: counts.assigned,
            reserved_total: counts.reserved,
            legacy_archive_total: counts.legacy_archive,
            problematic_total: counts.problematic,
            total_pool_size: counts.total(),
            utilization_rate: utilization_rate(&counts),
            high_quality_threshold: threshold,
            available_high_quality: high,
            available_low_quality: low,
            active_pool_size: counts.available + counts.assigned + counts.reserved,
            legacy_pool_size: counts.legacy_archive + counts.problematic,
            sufficient_supply: flags.sufficient,
            low_supply_warning: flags.low,
            critical_supply: flags.critical,
            quality_ratio_good: quality_ratio_good(high, counts.available),
            supply_status: flags.status(),
            next_available,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supply_flag_boundaries() {
        let settings = PoolSettings::default();

        let at_9 = SupplyFlags::evaluate(9, &settings);
        let at_10 = SupplyFlags::evaluate(10, &settings);
        let at_11 = SupplyFlags::evaluate(11, &settings);
        assert!(at_9.critical);
        assert!(!at_10.critical);
        assert!(!at_11.critical);
        assert_eq!(at_9.status(), SupplyStatus::Critical);
        assert_eq!(at_10.status(), SupplyStatus::Low);

        assert!(!SupplyFlags::evaluate(1000, &settings).sufficient);
        assert!(SupplyFlags::evaluate(1001, &settings).sufficient);
        assert_eq!(SupplyFlags::evaluate(1001, &settings).status(), SupplyStatus::Excellent);
        assert_eq!(SupplyFlags::evaluate(500, &settings).status(), SupplyStatus::Good);
        assert!(SupplyFlags::evaluate(99, &settings).low);
        assert!(!SupplyFlags::evaluate(100, &settings).low);
    }

    #[test]
    fn test_utilization_and_quality_ratio() {
        assert_eq!(utilization_rate(&StatusCounts::default()), 0.0);
        let counts = StatusCounts {
            available: 3,
            assigned: 1,
            ..StatusCounts::default()
        };
        assert!((utilization_rate(&counts) - 25.0).abs() < f64::EPSILON);

        assert!(!quality_ratio_good(0, 0));
        assert!(!quality_ratio_good(8, 10));
        assert!(quality_ratio_good(9, 10));
    }
}
