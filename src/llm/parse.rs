use crate::core::error::{InferenceError, snippet};
use crate::core::types::{Action, Prediction, PredictionDraft};
use serde::{Deserialize, Deserializer};

#[derive(Debug, Deserialize)]
struct RawPrediction {
    #[serde(deserialize_with = "lenient_f64")]
    market_probability: f64,
    #[serde(deserialize_with = "lenient_f64")]
    fair_probability: f64,
    #[serde(deserialize_with = "lenient_f64")]
    edge_percentage: f64,
    action: String,
    #[serde(deserialize_with = "lenient_f64")]
    confidence: f64,
    edge_quality: String,
    signal_agreement: String,
    reasoning: String,
    key_signals: Vec<String>,
    risk_factors: Vec<String>,
}

/// Accepts `72`, `0.72`, `"72"` and `"72%"`.
fn lenient_f64<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumOrText {
        Num(f64),
        Text(String),
    }
    match NumOrText::deserialize(d)? {
        NumOrText::Num(n) => Ok(n),
        NumOrText::Text(s) => s
            .trim()
            .trim_end_matches('%')
            .trim()
            .parse::<f64>()
            .map_err(serde::de::Error::custom),
    }
}

/// Turns free-form model output into a validated [`Prediction`].
pub fn parse_prediction(raw: &str, simulated: bool) -> Result<Prediction, InferenceError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(InferenceError::EmptyResponse);
    }

    let body = strip_fences(trimmed);
    let object = outermost_object(body)?;
    let json = rewrite_python_literals(object);

    let parsed: RawPrediction =
        serde_json::from_str(&json).map_err(|source| InferenceError::Schema {
            source,
            snippet: snippet(raw),
        })?;

    let action = Action::parse(&parsed.action)
        .ok_or_else(|| InferenceError::UnknownAction(parsed.action.clone()))?;

    let draft = PredictionDraft {
        market_probability: parsed.market_probability,
        fair_probability: parsed.fair_probability,
        edge_percentage: parsed.edge_percentage,
        action: Some(action),
        confidence: parsed.confidence,
        edge_quality: parsed.edge_quality,
        signal_agreement: parsed.signal_agreement,
        reasoning: parsed.reasoning,
        key_signals: parsed.key_signals,
        risk_factors: parsed.risk_factors,
        simulated,
    };
    Ok(Prediction::try_from(draft)?)
}

fn strip_fences(s: &str) -> &str {
    let Some(start) = s.find("```") else {
        return s;
    };
    let after = &s[start + 3..];
    // drop an info string such as `json`
    let after = match after.find('\n') {
        Some(nl) if after[..nl].trim().chars().all(|c| c.is_ascii_alphanumeric()) => {
            &after[nl + 1..]
        }
        _ => after,
    };
    match after.find("```") {
        Some(end) => &after[..end],
        None => after,
    }
}

/// Slice from the first `{` to its matching `}`, honouring string literals.
fn outermost_object(s: &str) -> Result<&str, InferenceError> {
    let Some(start) = s.find('{') else {
        return Err(InferenceError::NotJson { snippet: snippet(s) });
    };

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, ch) in s[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Ok(&s[start..=start + i]);
                }
            }
            _ => {}
        }
    }
    Err(InferenceError::Truncated { snippet: snippet(s) })
}

/// `True` / `False` / `None` outside string literals become JSON literals.
fn rewrite_python_literals(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_string = false;
    let mut escaped = false;
    let mut rest = s;

    while let Some(ch) = rest.chars().next() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            out.push(ch);
            rest = &rest[ch.len_utf8()..];
            continue;
        }
        if ch == '"' {
            in_string = true;
            out.push(ch);
            rest = &rest[1..];
            continue;
        }

        let boundary_before = !out.chars().last().is_some_and(is_ident_char);
        let replaced = [("True", "true"), ("False", "false"), ("None", "null")]
            .iter()
            .find(|(py, _)| {
                boundary_before
                    && rest.starts_with(py)
                    && !rest[py.len()..].chars().next().is_some_and(is_ident_char)
            });
        match replaced {
            Some((py, js)) => {
                out.push_str(js);
                rest = &rest[py.len()..];
            }
            None => {
                out.push(ch);
                rest = &rest[ch.len_utf8()..];
            }
        }
    }
    out
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

#[cfg(test)]
mod tests {
    use super::*;

    const GOOD: &str = r#"{
        "market_probability": 0.58,
        "fair_probability": 0.72,
        "edge_percentage": 14.0,
        "action": "BUY_YES",
        "confidence": 88,
        "edge_quality": "High-Signal",
        "signal_agreement": "Confirmed",
        "reasoning": "Verified sources agree.",
        "key_signals": ["Whale Bid (Tier 1)"],
        "risk_factors": ["Liquidity Depth"]
    }"#;

    #[test]
    fn test_parses_plain_json() {
        let p = parse_prediction(GOOD, false).unwrap();
        assert_eq!(p.action(), Action::BuyYes);
        assert_eq!(p.confidence(), 88);
        assert!(!p.is_simulated());
        assert_eq!(p.key_signals(), ["Whale Bid (Tier 1)".to_string()]);
    }

    #[test]
    fn test_strips_fences_and_chatter() {
        let raw = format!("Sure! Here is my analysis:\n```json\n{GOOD}\n```\nGood luck.");
        let p = parse_prediction(&raw, false).unwrap();
        assert!((p.fair_probability() - 0.72).abs() < 1e-9);
    }

    #[test]
    fn test_python_literals_outside_strings_only() {
        let raw = GOOD
            .replace("\"Confirmed\"", "\"None of the Tier 1 sources disagree\"")
            .replace("\"risk_factors\"", "\"hedged\": False, \"extra\": None, \"risk_factors\"");
        let p = parse_prediction(&raw, false).unwrap();
        assert_eq!(p.signal_agreement(), "None of the Tier 1 sources disagree");
    }

    #[test]
    fn test_rewrite_respects_identifier_boundaries() {
        assert_eq!(
            rewrite_python_literals(r#"{"a": True, "b": NoneSuch, "c": "True"}"#),
            r#"{"a": true, "b": NoneSuch, "c": "True"}"#
        );
    }

    #[test]
    fn test_alias_and_percent_inputs() {
        let raw = GOOD
            .replace("\"BUY_YES\"", "\"sell\"")
            .replace("0.58", "\"58%\"")
            .replace("0.72", "72");
        let p = parse_prediction(&raw, false).unwrap();
        assert_eq!(p.action(), Action::BuyNo);
        assert!((p.market_probability() - 0.58).abs() < 1e-9);
        assert!((p.fair_probability() - 0.72).abs() < 1e-9);
    }

    #[test]
    fn test_error_kinds() {
        assert!(matches!(
            parse_prediction("   ", false),
            Err(InferenceError::EmptyResponse)
        ));
        assert!(matches!(
            parse_prediction("I cannot answer that.", false),
            Err(InferenceError::NotJson { .. })
        ));
        assert!(matches!(
            parse_prediction(&GOOD[..GOOD.len() / 2], false),
            Err(InferenceError::Truncated { .. })
        ));
        assert!(matches!(
            parse_prediction(r#"{"action": "BUY_YES"}"#, false),
            Err(InferenceError::Schema { .. })
        ));
        assert!(matches!(
            parse_prediction(&GOOD.replace("BUY_YES", "MOON"), false),
            Err(InferenceError::UnknownAction(a)) if a == "MOON"
        ));
        assert!(matches!(
            parse_prediction(&GOOD.replace("\"confidence\": 88", "\"confidence\": 250"), false),
            Err(InferenceError::Invalid(_))
        ));
    }

    #[test]
    fn test_braces_inside_strings() {
        let raw = GOOD.replace("Verified sources agree.", "Spread {wide} but \\\"firm\\\"");
        let p = parse_prediction(&raw, false).unwrap();
        assert_eq!(p.reasoning(), "Spread {wide} but \"firm\"");
    }
}
