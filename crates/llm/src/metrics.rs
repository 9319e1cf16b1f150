//! Stream totals recorded to the global OpenTelemetry meter.

use std::sync::LazyLock;

use config::DropPolicy;
use opentelemetry::KeyValue;
use opentelemetry::metrics::Counter;

use crate::stream::StreamStats;

const METER_NAME: &str = "llm";

pub const STREAM_TOKENS_WRITTEN: &str = "llm.stream.tokens.written";
pub const STREAM_TOKENS_DROPPED: &str = "llm.stream.tokens.dropped";
pub const STREAM_TOKENS_READ: &str = "llm.stream.tokens.read";
pub const STREAM_WRITES_BLOCKED: &str = "llm.stream.writes.blocked";

struct StreamCounters {
    written: Counter<u64>,
    dropped: Counter<u64>,
    read: Counter<u64>,
    blocked: Counter<u64>,
}

static COUNTERS: LazyLock<StreamCounters> = LazyLock::new(|| {
    let meter = opentelemetry::global::meter(METER_NAME);

    StreamCounters {
        written: meter.u64_counter(STREAM_TOKENS_WRITTEN).build(),
        dropped: meter.u64_counter(STREAM_TOKENS_DROPPED).build(),
        read: meter.u64_counter(STREAM_TOKENS_READ).build(),
        blocked: meter.u64_counter(STREAM_WRITES_BLOCKED).build(),
    }
});

/// Adds the final totals of one stream to the counters.
pub(crate) fn record_stream(stats: &StreamStats, drop_policy: DropPolicy) {
    let attributes = [KeyValue::new("stream.drop_policy", policy_name(drop_policy))];

    COUNTERS.written.add(stats.written, &attributes);
    COUNTERS.dropped.add(stats.dropped, &attributes);
    COUNTERS.read.add(stats.read, &attributes);
    COUNTERS.blocked.add(stats.blocked, &attributes);
}

fn policy_name(policy: DropPolicy) -> &'static str {
    match policy {
        DropPolicy::Block => "block",
        DropPolicy::DropOldest => "drop_oldest",
        DropPolicy::DropNewest => "drop_newest",
        DropPolicy::Reject => "reject",
    }
}
