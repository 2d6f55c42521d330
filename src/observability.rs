use biometrics::{Collector, Counter, Moments};

pub(crate) static EXCHANGE_REQUESTS: Counter = Counter::new("parley.exchange.requests");
pub(crate) static EXCHANGE_FAILURES: Counter = Counter::new("parley.exchange.failures");
pub(crate) static EXCHANGE_TRANSPORT_ERRORS: Counter =
    Counter::new("parley.exchange.transport_errors");
pub(crate) static EXCHANGE_PROTOCOL_ERRORS: Counter =
    Counter::new("parley.exchange.protocol_errors");
pub(crate) static EXCHANGE_DECODE_ERRORS: Counter = Counter::new("parley.exchange.decode_errors");
pub(crate) static EXCHANGE_DURATION: Moments =
    Moments::new("parley.exchange.duration_seconds");

pub(crate) static SESSION_MESSAGES: Counter = Counter::new("parley.session.messages");
pub(crate) static SESSION_CLEARS: Counter = Counter::new("parley.session.clears");

/// Register this crate's biometrics with the provided collector.
pub fn register_biometrics(collector: Collector) {
    collector.register_counter(&EXCHANGE_REQUESTS);
    collector.register_counter(&EXCHANGE_FAILURES);
    collector.register_counter(&EXCHANGE_TRANSPORT_ERRORS);
    collector.register_counter(&EXCHANGE_PROTOCOL_ERRORS);
    collector.register_counter(&EXCHANGE_DECODE_ERRORS);
    collector.register_moments(&EXCHANGE_DURATION);

    collector.register_counter(&SESSION_MESSAGES);
    collector.register_counter(&SESSION_CLEARS);
}
