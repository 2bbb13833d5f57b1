//! Canned replies served when the SDK rejects a request for auth reasons.
//!
//! Matching is a case-insensitive substring search over the prompt. The
//! first topic whose keywords match wins; otherwise the general reply is used.

use super::types::ParsedResponse;

struct CannedTopic {
    keywords: &'static [&'static str],
    text: &'static str,
}

const TOPICS: &[CannedTopic] = &[
    CannedTopic {
        keywords: &["route", "waypoint", "delivery stops", "itinerary"],
        text: "Live route optimization is temporarily unavailable. As a general rule, \
               group stops by region, schedule time-windowed deliveries first, and avoid \
               peak-hour urban segments. Our dispatch team can review the route on request.",
    },
    CannedTopic {
        keywords: &["freight", "quote", "shipping cost", "tariff", "pricing"],
        text: "Live freight pricing is temporarily unavailable. Estimates depend on \
               distance, chargeable weight, mode and surcharges such as fuel and handling. \
               Please request a formal quote and our team will respond within one business day.",
    },
    CannedTopic {
        keywords: &["document", "invoice", "bill of lading", "customs", "scan"],
        text: "Automatic document analysis is temporarily unavailable. Please make sure the \
               document shows shipper, consignee, cargo description, weights and reference \
               numbers, and upload it again later or send it to our documentation desk.",
    },
    CannedTopic {
        keywords: &["track", "shipment status", "where is"],
        text: "Live tracking answers are temporarily unavailable. You can check your shipment \
               status with the tracking number on the tracking page or contact support.",
    },
];

const GENERAL_TEXT: &str = "Our AI assistant is temporarily unavailable. Please try again \
                            shortly, or contact our logistics team for immediate help.";

/// Pick the canned text for `prompt`.
pub fn canned_text(prompt: &str) -> &'static str {
    let prompt = prompt.to_lowercase();
    TOPICS
        .iter()
        .find(|topic| topic.keywords.iter().any(|kw| prompt.contains(kw)))
        .map_or(GENERAL_TEXT, |topic| topic.text)
}

/// Build the degraded-but-successful response for an auth-rejected request.
pub fn canned_response(prompt: &str, model: &str) -> ParsedResponse {
    let text = canned_text(prompt);
    ParsedResponse {
        text: text.to_string(),
        raw: serde_json::Value::String(text.to_string()),
        model: Some(model.to_string()),
        cached: true,
    }
}
