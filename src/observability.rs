use biometrics::{Collector, Counter};

pub(crate) static CLIENT_REQUESTS: Counter = Counter::new("basechat.client.requests");
pub(crate) static CLIENT_REQUEST_ERRORS: Counter = Counter::new("basechat.client.request_errors");

pub(crate) static STREAM_CHUNKS: Counter = Counter::new("basechat.stream.chunks");
pub(crate) static STREAM_MALFORMED_CHUNKS: Counter =
    Counter::new("basechat.stream.malformed_chunks");
pub(crate) static STREAM_ERRORS: Counter = Counter::new("basechat.stream.errors");

pub(crate) static TURN_COMPLETED: Counter = Counter::new("basechat.turn.completed");
pub(crate) static TURN_CANCELLED: Counter = Counter::new("basechat.turn.cancelled");
pub(crate) static TURN_FAILED: Counter = Counter::new("basechat.turn.failed");

pub(crate) static HISTORY_RESETS: Counter = Counter::new("basechat.history.resets");
pub(crate) static HISTORY_TRIMMED_MESSAGES: Counter =
    Counter::new("basechat.history.trimmed_messages");

/// Register this crate's biometrics with the provided collector.
pub fn register_biometrics(collector: Collector) {
    collector.register_counter(&CLIENT_REQUESTS);
    collector.register_counter(&CLIENT_REQUEST_ERRORS);

    collector.register_counter(&STREAM_CHUNKS);
    collector.register_counter(&STREAM_MALFORMED_CHUNKS);
    collector.register_counter(&STREAM_ERRORS);

    collector.register_counter(&TURN_COMPLETED);
    collector.register_counter(&TURN_CANCELLED);
    collector.register_counter(&TURN_FAILED);

    collector.register_counter(&HISTORY_RESETS);
    collector.register_counter(&HISTORY_TRIMMED_MESSAGES);
}
