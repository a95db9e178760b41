use std::sync::LazyLock;

use prometheus::*;

static METRIC_QUERY_COUNT: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!("imgrec_query_count", "count of the image queries", &["result"])
        .unwrap()
});

static METRIC_QUERY_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    register_histogram_vec!(
        "imgrec_query_duration",
        "duration of each query stage in seconds",
        &["stage"]
    )
    .unwrap()
});

static METRIC_QUERY_BEST_DISTANCE: LazyLock<Histogram> = LazyLock::new(|| {
    register_histogram!(
        "imgrec_query_best_distance",
        "squared l2 distance of the best match",
        exponential_buckets(0.25, 2., 16).unwrap()
    )
    .unwrap()
});

static METRIC_REBUILD_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    register_histogram!("imgrec_rebuild_duration", "duration of the index rebuild in seconds")
        .unwrap()
});

static METRIC_REBUILD_FAILURES: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter!("imgrec_rebuild_failures", "count of the failed index rebuilds").unwrap()
});

static METRIC_INDEXED_VECTORS: LazyLock<IntGauge> = LazyLock::new(|| {
    register_int_gauge!("imgrec_indexed_vectors", "number of vectors in the published snapshot")
        .unwrap()
});

/// 记录一次查询，best 为最佳匹配的距离，没有结果时为 None
pub fn inc_query(best: Option<f32>) {
    match best {
        Some(distance) => {
            METRIC_QUERY_COUNT.with_label_values(&["hit"]).inc();
            METRIC_QUERY_BEST_DISTANCE.observe(distance as f64);
        }
        None => METRIC_QUERY_COUNT.with_label_values(&["empty"]).inc(),
    }
}

/// 记录查询各阶段耗时，stage 为 `embed` 或 `scan`
pub fn observe_query_stage(stage: &str, duration: f32) {
    METRIC_QUERY_DURATION.with_label_values(&[stage]).observe(duration as f64);
}

pub fn observe_rebuild(duration: f32, vectors: usize) {
    METRIC_REBUILD_DURATION.observe(duration as f64);
    METRIC_INDEXED_VECTORS.set(vectors as i64);
}

pub fn inc_rebuild_failure() {
    METRIC_REBUILD_FAILURES.inc();
}

/// 以文本格式导出所有指标
pub fn gather_text() -> Result<String> {
    TextEncoder::new().encode_to_string(&gather())
}
