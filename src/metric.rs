use opentelemetry::{KeyValue, metrics::UpDownCounter};
use std::sync::LazyLock;

static STATDS: LazyLock<UpDownCounter<i64>> = LazyLock::new(|| {
    logfire::i64_up_down_counter("whatsapp_cloud_statds")
        .with_description("WhatsApp webhook and flow endpoint statistics")
        .with_unit("event")
        .build()
});

fn incr_statds(metric: &'static str, value: String) {
    STATDS.add(1, &[KeyValue::new(metric, value)]);
}

pub fn incr_webhook_message_statds(message_type: &str) {
    incr_statds("webhook_message", message_type.into())
}

pub fn incr_webhook_event_statds(field: &str) {
    incr_statds("webhook_event", field.into())
}

pub fn incr_webhook_failed_entry_statds(reason: &str) {
    incr_statds("webhook_failed_entry", reason.into())
}

pub fn incr_flow_request_statds(outcome: &str) {
    incr_statds("flow_request", outcome.into())
}
