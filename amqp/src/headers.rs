//! Message headers carrying redelivery state.
//!
//! Requeued and dead-lettered copies keep the original message's properties
//! and headers; only the redelivery headers are overwritten.

use lapin::BasicProperties;
use lapin::types::{AMQPValue, LongString, ShortString};
use ride_matching_core::message_bus::{DEAD_LETTER_REASON_HEADER, RETRY_COUNT_HEADER};

/// Read the retry counter, treating a missing or unreadable header as zero.
///
/// Publishers other than this worker may encode integers with any AMQP width.
#[must_use]
pub fn retry_count(properties: &BasicProperties) -> u32 {
    properties
        .headers()
        .as_ref()
        .and_then(|headers| headers.inner().get(&ShortString::from(RETRY_COUNT_HEADER)))
        .and_then(as_u32)
        .unwrap_or(0)
}

fn as_u32(value: &AMQPValue) -> Option<u32> {
    match value {
        AMQPValue::ShortShortInt(v) => u32::try_from(*v).ok(),
        AMQPValue::ShortShortUInt(v) => Some(u32::from(*v)),
        AMQPValue::ShortInt(v) => u32::try_from(*v).ok(),
        AMQPValue::ShortUInt(v) => Some(u32::from(*v)),
        AMQPValue::LongInt(v) => u32::try_from(*v).ok(),
        AMQPValue::LongUInt(v) => Some(*v),
        AMQPValue::LongLongInt(v) => u32::try_from(*v).ok(),
        _ => None,
    }
}

/// Properties for a requeued copy of `original`.
#[must_use]
pub fn requeue_properties(original: &BasicProperties, retry_count: u32) -> BasicProperties {
    carry_over(original, retry_count, None)
}

/// Properties for a quarantined copy of `original`.
#[must_use]
pub fn dead_letter_properties(
    original: &BasicProperties,
    retry_count: u32,
    reason: &str,
) -> BasicProperties {
    carry_over(original, retry_count, Some(reason))
}

fn carry_over(original: &BasicProperties, retry_count: u32, reason: Option<&str>) -> BasicProperties {
    let mut table = original.headers().clone().unwrap_or_default();
    table.insert(
        ShortString::from(RETRY_COUNT_HEADER),
        AMQPValue::LongLongInt(i64::from(retry_count)),
    );
    if let Some(reason) = reason {
        table.insert(
            ShortString::from(DEAD_LETTER_REASON_HEADER),
            AMQPValue::LongString(LongString::from(reason)),
        );
    }

    let properties = original.clone().with_delivery_mode(2).with_headers(table);
    if original.content_type().is_some() {
        properties
    } else {
        properties.with_content_type(ShortString::from("application/json"))
    }
}

/// Persistent JSON message properties.
#[must_use]
pub fn persistent_json() -> BasicProperties {
    BasicProperties::default()
        .with_delivery_mode(2)
        .with_content_type(ShortString::from("application/json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use lapin::types::FieldTable;

    fn with_header(value: AMQPValue) -> BasicProperties {
        let mut headers = FieldTable::default();
        headers.insert(ShortString::from(RETRY_COUNT_HEADER), value);
        BasicProperties::default().with_headers(headers)
    }

    #[test]
    fn missing_header_is_zero() {
        assert_eq!(retry_count(&BasicProperties::default()), 0);
        assert_eq!(
            retry_count(&BasicProperties::default().with_headers(FieldTable::default())),
            0
        );
    }

    #[test]
    fn reads_any_integer_width() {
        assert_eq!(retry_count(&with_header(AMQPValue::LongLongInt(3))), 3);
        assert_eq!(retry_count(&with_header(AMQPValue::LongInt(4))), 4);
        assert_eq!(retry_count(&with_header(AMQPValue::ShortShortUInt(2))), 2);
    }

    #[test]
    fn negative_or_non_integer_is_zero() {
        assert_eq!(retry_count(&with_header(AMQPValue::LongInt(-1))), 0);
        assert_eq!(
            retry_count(&with_header(AMQPValue::LongString(LongString::from("5")))),
            0
        );
    }

    fn original() -> BasicProperties {
        let mut headers = FieldTable::default();
        headers.insert(
            ShortString::from("x-trace-id"),
            AMQPValue::LongString(LongString::from("t-1")),
        );
        headers.insert(ShortString::from(RETRY_COUNT_HEADER), AMQPValue::LongInt(1));

        BasicProperties::default()
            .with_message_id(ShortString::from("m-1"))
            .with_correlation_id(ShortString::from("c-1"))
            .with_content_type(ShortString::from("application/vnd.ride+json"))
            .with_headers(headers)
    }

    fn header<'a>(properties: &'a BasicProperties, key: &str) -> Option<&'a AMQPValue> {
        properties
            .headers()
            .as_ref()
            .and_then(|h| h.inner().get(&ShortString::from(key)))
    }

    #[test]
    fn requeue_keeps_original_properties_and_bumps_counter() {
        let properties = requeue_properties(&original(), 2);

        assert_eq!(retry_count(&properties), 2);
        assert_eq!(properties.delivery_mode(), &Some(2));
        assert_eq!(properties.message_id(), &Some(ShortString::from("m-1")));
        assert_eq!(properties.correlation_id(), &Some(ShortString::from("c-1")));
        assert_eq!(
            properties.content_type(),
            &Some(ShortString::from("application/vnd.ride+json"))
        );
        assert_eq!(
            header(&properties, "x-trace-id"),
            Some(&AMQPValue::LongString(LongString::from("t-1")))
        );
    }

    #[test]
    fn requeue_of_bare_message_is_persistent_json() {
        let properties = requeue_properties(&BasicProperties::default(), 1);

        assert_eq!(retry_count(&properties), 1);
        assert_eq!(properties.delivery_mode(), &Some(2));
        assert_eq!(
            properties.content_type(),
            &Some(ShortString::from("application/json"))
        );
    }

    #[test]
    fn dead_letter_carries_reason_and_original_headers() {
        let properties = dead_letter_properties(&original(), 5, "lookup_failed");

        assert_eq!(retry_count(&properties), 5);
        assert_eq!(
            header(&properties, DEAD_LETTER_REASON_HEADER),
            Some(&AMQPValue::LongString(LongString::from("lookup_failed")))
        );
        assert_eq!(
            header(&properties, "x-trace-id"),
            Some(&AMQPValue::LongString(LongString::from("t-1")))
        );
        assert_eq!(properties.message_id(), &Some(ShortString::from("m-1")));
    }
}
