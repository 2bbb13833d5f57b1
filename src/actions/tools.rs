//! Typed results for the AI-backed logistics tools.
//!
//! Each tool has a cache key, a result type, a tolerant parser and an
//! `ActionSpec` constructor. Models rename fields and mix scalars with lists,
//! so parsers accept several spellings per field and coerce numbers.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ai::extractor::coerce_string_list;
use crate::ai::{extract_json, safe_number, RequestOptions};

use super::orchestrator::ActionSpec;

pub const ROUTE_OPTIMIZER_KEY: &str = "route-optimizer";
pub const FREIGHT_CALCULATOR_KEY: &str = "freight-calculator";
pub const DOCUMENT_SCANNER_KEY: &str = "document-scanner";
pub const CHATBOT_TESTER_KEY: &str = "chatbot-tester";

// ─── Result types ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutePlan {
    pub stops: Vec<String>,
    #[serde(default)]
    pub total_distance_km: f64,
    #[serde(default)]
    pub estimated_hours: f64,
    #[serde(default)]
    pub fuel_cost: f64,
    #[serde(default)]
    pub notes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FreightEstimate {
    #[serde(default)]
    pub base_rate: f64,
    #[serde(default)]
    pub fuel_surcharge: f64,
    #[serde(default)]
    pub other_surcharges: f64,
    pub total: f64,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub transit_days: f64,
    #[serde(default)]
    pub breakdown: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentScan {
    pub document_type: String,
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
    #[serde(default)]
    pub issues: Vec<String>,
    #[serde(default)]
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatbotEvaluation {
    pub reply: String,
    #[serde(default)]
    pub intent: String,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub suggestions: Vec<String>,
}

fn default_currency() -> String {
    "USD".to_string()
}

// ─── Field helpers ──────────────────────────────────────────────────────────

/// First present, non-null value among `keys`.
fn field<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| obj.get(*key))
        .find(|value| !value.is_null())
}

fn number(obj: &Map<String, Value>, keys: &[&str], fallback: f64) -> f64 {
    field(obj, keys).map_or(fallback, |value| safe_number(value, fallback))
}

fn text(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    match field(obj, keys)? {
        Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn list(obj: &Map<String, Value>, keys: &[&str]) -> Vec<String> {
    coerce_string_list(field(obj, keys))
}

/// Confidence as a 0..=1 fraction; percentages above 1 are scaled down.
fn confidence(obj: &Map<String, Value>) -> f64 {
    let raw = number(obj, &["confidence", "confidence_score", "confidenceScore"], 0.0);
    let fraction = if raw > 1.0 { raw / 100.0 } else { raw };
    fraction.clamp(0.0, 1.0)
}

fn json_object(text: &str) -> Option<Map<String, Value>> {
    match extract_json(text)? {
        Value::Object(obj) => Some(obj),
        _ => None,
    }
}

// ─── Parsers ────────────────────────────────────────────────────────────────

/// Stops may be plain names or objects with a name/address field.
pub fn parse_route_plan(reply: &str) -> Option<RoutePlan> {
    let obj = json_object(reply)?;
    let stops: Vec<String> = crate::ai::coerce_array(field(
        &obj,
        &["optimized_route", "optimizedRoute", "route", "stops", "waypoints"],
    ))
    .into_iter()
    .filter_map(|stop| match stop {
        Value::String(name) => Some(name),
        Value::Object(map) => text(&map, &["name", "address", "location", "stop"]),
        _ => None,
    })
    .collect();

    if stops.is_empty() {
        return None;
    }

    Some(RoutePlan {
        stops,
        total_distance_km: number(
            &obj,
            &["total_distance_km", "totalDistance", "total_distance", "distance"],
            0.0,
        ),
        estimated_hours: number(
            &obj,
            &["estimated_hours", "estimatedTime", "estimated_time", "duration_hours", "duration"],
            0.0,
        ),
        fuel_cost: number(&obj, &["fuel_cost", "fuelCost", "fuel"], 0.0),
        notes: list(&obj, &["notes", "recommendations", "tips"]),
    })
}

/// When no total is given it is the sum of the components.
pub fn parse_freight_estimate(reply: &str) -> Option<FreightEstimate> {
    let obj = json_object(reply)?;
    let base_rate = number(&obj, &["base_rate", "baseRate", "base_cost", "baseCost"], 0.0);
    let fuel_surcharge = number(&obj, &["fuel_surcharge", "fuelSurcharge"], 0.0);
    let other_surcharges = number(
        &obj,
        &["other_surcharges", "otherSurcharges", "surcharges", "accessorials"],
        0.0,
    );
    let total = number(
        &obj,
        &["total", "total_cost", "totalCost", "estimated_cost", "estimatedCost"],
        base_rate + fuel_surcharge + other_surcharges,
    );

    if total <= 0.0 {
        return None;
    }

    Some(FreightEstimate {
        base_rate,
        fuel_surcharge,
        other_surcharges,
        total,
        currency: text(&obj, &["currency"]).unwrap_or_else(default_currency),
        transit_days: number(&obj, &["transit_days", "transitDays", "transit_time"], 0.0),
        breakdown: list(&obj, &["breakdown", "line_items", "lineItems"]),
    })
}

pub fn parse_document_scan(reply: &str) -> Option<DocumentScan> {
    let obj = json_object(reply)?;

    let fields: BTreeMap<String, String> = match field(
        &obj,
        &["fields", "extracted_fields", "extractedFields", "extracted_data", "extractedData"],
    ) {
        Some(Value::Object(map)) => map
            .iter()
            .filter(|(_, value)| !value.is_null())
            .map(|(key, value)| {
                let rendered = match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (key.clone(), rendered)
            })
            .collect(),
        _ => BTreeMap::new(),
    };
    let document_type = text(&obj, &["document_type", "documentType", "type"]);

    if document_type.is_none() && fields.is_empty() {
        return None;
    }

    Some(DocumentScan {
        document_type: document_type.unwrap_or_else(|| "unknown".to_string()),
        fields,
        issues: list(&obj, &["issues", "warnings", "missing_fields", "missingFields"]),
        confidence: confidence(&obj),
    })
}

/// Free text without JSON is taken as the bot's reply.
pub fn parse_chatbot_evaluation(reply: &str) -> Option<ChatbotEvaluation> {
    if let Some(obj) = json_object(reply) {
        if let Some(answer) = text(&obj, &["reply", "response", "answer", "message"]) {
            return Some(ChatbotEvaluation {
                reply: answer,
                intent: text(&obj, &["intent", "detected_intent", "detectedIntent"])
                    .unwrap_or_else(|| "unknown".to_string()),
                confidence: confidence(&obj),
                suggestions: list(&obj, &["suggestions", "improvements", "follow_ups"]),
            });
        }
    }

    let trimmed = reply.trim();
    if trimmed.is_empty() || extract_json(trimmed).is_some() {
        return None;
    }
    Some(ChatbotEvaluation {
        reply: trimmed.to_string(),
        intent: "unknown".to_string(),
        confidence: 0.0,
        suggestions: Vec::new(),
    })
}

// ─── Action specs ───────────────────────────────────────────────────────────

fn structured_options() -> RequestOptions {
    RequestOptions {
        temperature: Some(0.3),
        ..Default::default()
    }
}

pub fn route_optimizer<F>(prompt: F) -> ActionSpec<RoutePlan>
where
    F: Fn() -> String + Send + Sync + 'static,
{
    ActionSpec::new(ROUTE_OPTIMIZER_KEY, prompt)
        .with_parser(parse_route_plan)
        .with_options(structured_options())
}

pub fn freight_calculator<F>(prompt: F) -> ActionSpec<FreightEstimate>
where
    F: Fn() -> String + Send + Sync + 'static,
{
    ActionSpec::new(FREIGHT_CALCULATOR_KEY, prompt)
        .with_parser(parse_freight_estimate)
        .with_options(structured_options())
}

pub fn document_scanner<F>(prompt: F) -> ActionSpec<DocumentScan>
where
    F: Fn() -> String + Send + Sync + 'static,
{
    ActionSpec::new(DOCUMENT_SCANNER_KEY, prompt)
        .with_parser(parse_document_scan)
        .with_options(RequestOptions {
            temperature: Some(0.1),
            ..Default::default()
        })
}

pub fn chatbot_tester<F>(prompt: F) -> ActionSpec<ChatbotEvaluation>
where
    F: Fn() -> String + Send + Sync + 'static,
{
    ActionSpec::new(CHATBOT_TESTER_KEY, prompt).with_parser(parse_chatbot_evaluation)
}

// ─── Tests ───────────────────────────────────────────────────────────────────
