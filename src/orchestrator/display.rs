use crate::context::bundle::ContextBundle;
use crate::core::types::{Headline, Signal, SignalOrigin};

const HEADLINE_COUNT: usize = 3;

const PREMIUM_OUTLETS: [&str; 6] = [
    "reuters.com",
    "bloomberg.com",
    "apnews.com",
    "ap.org",
    "wsj.com",
    "ft.com",
];

const BULLISH: [&str; 7] = ["bullish", "high", "rally", "gain", "buy", "success", "yes"];
const BEARISH: [&str; 7] = ["bearish", "low", "dip", "drop", "sell", "fail", "no"];

fn is_premium(domain: &str) -> bool {
    let d = domain.trim_end_matches('.').to_ascii_lowercase();
    PREMIUM_OUTLETS.iter().any(|p| {
        d == *p || d.strip_suffix(p).is_some_and(|rest| rest.ends_with('.'))
    })
}

fn headline(s: &Signal) -> Headline {
    let (source, premium) = match &s.origin {
        SignalOrigin::Social { handle } => (format!("@{handle}"), false),
        SignalOrigin::News { domain } => (domain.clone(), is_premium(domain)),
    };
    Headline {
        source,
        title: s.text.clone(),
        tier: if s.authentic || premium { 1 } else { 3 },
    }
}

/// First items of the bundle in rendered order, for dashboard cards.
pub fn top_headlines(bundle: &ContextBundle) -> Vec<Headline> {
    bundle
        .signals()
        .iter()
        .take(HEADLINE_COUNT)
        .map(headline)
        .collect()
}

/// Rough lexicon score in `[-1, 1]`. Only whole words count, so "now" is not "no".
pub fn sentiment_score(bundle: &ContextBundle) -> f64 {
    let mut score: i64 = 0;
    for s in bundle.signals() {
        let lower = s.text.to_lowercase();
        for word in lower.split(|c: char| !c.is_alphanumeric()) {
            if BULLISH.contains(&word) {
                score += 1;
            } else if BEARISH.contains(&word) {
                score -= 1;
            }
        }
    }
    let score = score as f64;
    (score / (score.abs() + 1.0)).clamp(-1.0, 1.0)
}
