use crate::core::types::{Prediction, RiskProfile};
use std::fmt;

/// Outcome of checking one prediction against one profile's thresholds.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RiskDecision {
    Pass,
    EdgeBelow { edge: f64, min: f64 },
    ConfidenceBelow { confidence: u8, min: f64 },
}

impl RiskDecision {
    pub fn passed(&self) -> bool {
        matches!(self, RiskDecision::Pass)
    }
}

impl fmt::Display for RiskDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskDecision::Pass => f.write_str("pass"),
            RiskDecision::EdgeBelow { edge, min } => {
                write!(f, "edge {edge:.2}% below minimum {min:.2}%")
            }
            RiskDecision::ConfidenceBelow { confidence, min } => {
                write!(f, "confidence {confidence} below minimum {min}")
            }
        }
    }
}

/// Edge is checked first; the first failing check decides.
pub fn evaluate(profile: &RiskProfile, prediction: &Prediction) -> RiskDecision {
    if prediction.edge_percentage() < profile.min_edge_threshold() {
        return RiskDecision::EdgeBelow {
            edge: prediction.edge_percentage(),
            min: profile.min_edge_threshold(),
        };
    }
    if f64::from(prediction.confidence()) < profile.min_confidence_threshold() {
        return RiskDecision::ConfidenceBelow {
            confidence: prediction.confidence(),
            min: profile.min_confidence_threshold(),
        };
    }
    RiskDecision::Pass
}

/// Linear in confidence, so `max_bet_usd` is the ceiling. No absolute cap beyond it.
pub fn calculate_bet_size(max_bet_usd: f64, confidence: u8) -> f64 {
    if !max_bet_usd.is_finite() || max_bet_usd <= 0.0 {
        return 0.0;
    }
    max_bet_usd * f64::from(confidence.min(100)) / 100.0
}
