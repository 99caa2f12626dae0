//! Host topic to broker topic translation

/// Separator between levels of a host topic
pub const HOST_SEPARATOR: &str = "::";

/// Separator used in broker topic names
pub const BROKER_SEPARATOR: &str = "-";

/// Translate a host topic into a broker topic name.
///
/// Every `::` is replaced with `-` in a single left-to-right pass. The
/// mapping is lossy, so there is deliberately no inverse: inbound messages
/// are re-emitted under the broker topic name as-is.
pub fn to_broker_topic(host_topic: &str) -> String {
    host_topic.replace(HOST_SEPARATOR, BROKER_SEPARATOR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use test_case::test_case;

    #[test_case("acapy::record::connections::active", "acapy-record-connections-active"; "stateful record")]
    #[test_case("acapy::record::issuer_cred_rev", "acapy-record-issuer_cred_rev"; "stateless record")]
    #[test_case("acapy::webhook::ping", "acapy-webhook-ping"; "webhook")]
    #[test_case("a::record::b::c", "a-record-b-c"; "short")]
    #[test_case("acapy-outbound-thing", "acapy-outbound-thing"; "already flat")]
    #[test_case("", ""; "empty")]
    fn test_to_broker_topic(input: &str, expected: &str) {
        assert_eq!(to_broker_topic(input), expected);
    }

    #[test]
    fn test_single_pass_replacement() {
        // Odd runs of colons leave one colon behind
        assert_eq!(to_broker_topic(":::"), "-:");
        assert_eq!(to_broker_topic("::::"), "--");
        assert_eq!(to_broker_topic("a:b"), "a:b");
    }

    proptest! {
        #[test]
        fn prop_output_has_no_host_separator(topic in "[a-z:_]{0,32}") {
            prop_assert!(!to_broker_topic(&topic).contains(HOST_SEPARATOR));
        }

        #[test]
        fn prop_translation_is_idempotent(topic in "[a-z:_-]{0,32}") {
            let once = to_broker_topic(&topic);
            prop_assert_eq!(to_broker_topic(&once), once);
        }

        #[test]
        fn prop_topics_without_separator_are_unchanged(topic in "[a-z_-]{0,32}") {
            prop_assert_eq!(to_broker_topic(&topic), topic);
        }
    }
}
