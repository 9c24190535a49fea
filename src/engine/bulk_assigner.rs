// ==========================================
// 条码池分配引擎 - 批量分配器
// ==========================================
// 顺序逐个调用分配器（不做内部并行，统计天然一致）；
// 单个变体失败只记录 {variant_id, sku, error}，不中断批次
// ==========================================

use crate::domain::allocation::{
    AllocateRequest, BulkAssignFailure, BulkAssignRequest, BulkAssignResult,
};
use crate::engine::allocator::{validate_min_quality, Allocator};
use crate::engine::error::PoolResult;
use crate::perf::PerfGuard;
use crate::repository::variant_code_store::VariantCodeStore;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

pub struct BulkAssigner<S: VariantCodeStore> {
    allocator: Arc<Allocator<S>>,
}

impl<S: VariantCodeStore> BulkAssigner<S> {
    pub fn new(allocator: Arc<Allocator<S>>) -> Self {
        Self { allocator }
    }

    /// 批量分配
    ///
    /// # 返回
    /// - Err: 仅批次级参数非法（min_quality 越界）
    /// - Ok: 逐项统计；success = (failed == 0)
    #[instrument(
        skip(self, request),
        fields(count = request.variants.len(), code_type = %request.code_type)
    )]
    pub fn assign(&self, request: &BulkAssignRequest) -> PoolResult<BulkAssignResult> {
        let min_quality = self.allocator.resolve_min_quality(request.min_quality);
        validate_min_quality(min_quality)?;
        let _perf = PerfGuard::new("bulk_assign");

        let mut result = BulkAssignResult::default();

        for variant in &request.variants {
            result.processed += 1;

            let allocate = AllocateRequest::new(variant.clone())
                .with_type(request.code_type)
                .with_min_quality(min_quality);

            match self.allocator.allocate(&allocate) {
                Ok(outcome) if outcome.assigned => {
                    result.assigned += 1;
                }
                Ok(outcome) => {
                    result.skipped_existing += 1;
                    if request.skip_existing {
                        debug!(variant_id = %variant.variant_id, code = %outcome.code, "已持有条码，跳过");
                    } else {
                        info!(
                            variant_id = %variant.variant_id,
                            code = %outcome.code,
                            "已持有条码，保留现有分配"
                        );
                    }
                }
                Err(e) => {
                    warn!(variant_id = %variant.variant_id, error = %e, "变体分配失败，继续处理");
                    result.failed += 1;
                    result.errors.push(BulkAssignFailure {
                        variant_id: variant.variant_id.clone(),
                        sku: variant.sku.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        result.success = result.failed == 0;
        result.summary = format!(
            "Processed {} variants: assigned {}, skipped {} existing, failed {}",
            result.processed, result.assigned, result.skipped_existing, result.failed
        );

        info!(
            assigned = result.assigned,
            skipped_existing = result.skipped_existing,
            failed = result.failed,
            "批量分配完成"
        );

        Ok(result)
    }
}
