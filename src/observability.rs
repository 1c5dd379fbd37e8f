use biometrics::{Collector, Counter, Moments};

pub(crate) static STREAM_CONNECTS: Counter = Counter::new("assistant_client.stream.connects");
pub(crate) static STREAM_FAILURES: Counter = Counter::new("assistant_client.stream.failures");
pub(crate) static STREAM_RECONNECTS: Counter = Counter::new("assistant_client.stream.reconnects");
pub(crate) static STREAM_FRAMES: Counter = Counter::new("assistant_client.stream.frames");
pub(crate) static STREAM_DROPPED_FRAMES: Counter =
    Counter::new("assistant_client.stream.dropped_frames");

pub(crate) static ROUTER_STALE_ANSWERS: Counter =
    Counter::new("assistant_client.router.stale_answers");
pub(crate) static ROUTER_ACCEPTED_ANSWERS: Counter =
    Counter::new("assistant_client.router.accepted_answers");

pub(crate) static COMMANDS: Counter = Counter::new("assistant_client.dispatch.commands");
pub(crate) static COMMAND_TRANSPORT_ERRORS: Counter =
    Counter::new("assistant_client.dispatch.transport_errors");
pub(crate) static COMMAND_REJECTIONS: Counter =
    Counter::new("assistant_client.dispatch.rejections");
pub(crate) static COMMAND_DURATION: Moments =
    Moments::new("assistant_client.dispatch.duration_seconds");

/// Register this crate's biometrics with the provided collector.
pub fn register_biometrics(collector: Collector) {
    collector.register_counter(&STREAM_CONNECTS);
    collector.register_counter(&STREAM_FAILURES);
    collector.register_counter(&STREAM_RECONNECTS);
    collector.register_counter(&STREAM_FRAMES);
    collector.register_counter(&STREAM_DROPPED_FRAMES);

    collector.register_counter(&ROUTER_STALE_ANSWERS);
    collector.register_counter(&ROUTER_ACCEPTED_ANSWERS);

    collector.register_counter(&COMMANDS);
    collector.register_counter(&COMMAND_TRANSPORT_ERRORS);
    collector.register_counter(&COMMAND_REJECTIONS);
    collector.register_moments(&COMMAND_DURATION);
}
