use crate::context::bundle::ContextBundle;
use crate::core::types::Question;
use std::fmt;

/// Bumped whenever the rendered layout changes. Stored with every prediction record.
pub const PROMPT_CONTRACT_VERSION: &str = "market-analysis/v1";

/// Rendered decision-model input. Only [`render`] builds one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PromptText(String);

impl PromptText {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PromptText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Pure: the same inputs always give the same bytes.
pub fn render(question: &str, price: f64, volume: f64, context: &ContextBundle) -> PromptText {
    PromptText(format!(
        "MARKET ANALYSIS REQUEST\nQuestion: {}\nCurrent YES Price: {}%\nVolume: ${}\n\n{}",
        question,
        price_percent(price),
        format_usd(volume),
        context.render()
    ))
}

pub fn render_question(question: &Question, context: &ContextBundle) -> PromptText {
    render(question.text(), question.price(), question.volume(), context)
}

/// YES price as a whole percentage, half away from zero.
pub fn price_percent(price: f64) -> i64 {
    (price * 100.0).round() as i64
}

/// Two decimals with comma thousands separators: `1234567.891` -> `1,234,567.89`.
pub fn format_usd(amount: f64) -> String {
    let fixed = format!("{:.2}", amount.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if amount < 0.0 { "-" } else { "" };
    format!("{sign}{grouped}.{frac_part}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_line_rounds() {
        let p = render("Will X?", 0.44, 0.0, &ContextBundle::empty());
        assert!(p.as_str().contains("Current YES Price: 44%\n"));

        let p = render("Will X?", 0.995, 0.0, &ContextBundle::empty());
        assert!(p.as_str().contains("Current YES Price: 100%\n"));

        assert_eq!(price_percent(0.0), 0);
        assert_eq!(price_percent(0.585), 59);
    }

    #[test]
    fn test_usd_formatting() {
        assert_eq!(format_usd(0.0), "0.00");
        assert_eq!(format_usd(999.999), "1,000.00");
        assert_eq!(format_usd(1000.0), "1,000.00");
        assert_eq!(format_usd(1234567.891), "1,234,567.89");
        assert_eq!(format_usd(12.5), "12.50");
    }

    #[test]
    fn test_header_layout() {
        let p = render(
            "Will BTC reach $100k by March?",
            0.58,
            2_500_000.0,
            &ContextBundle::empty(),
        );
        let expected_head = "MARKET ANALYSIS REQUEST\n\
                             Question: Will BTC reach $100k by March?\n\
                             Current YES Price: 58%\n\
                             Volume: $2,500,000.00\n\
                             \n";
        assert!(p.as_str().starts_with(expected_head));
        assert!(p.as_str().ends_with(&ContextBundle::empty().render()));
    }

    #[test]
    fn test_render_is_idempotent() {
        let q = Question::new("Will the Fed cut in June?", "m-1", 0.31, 1234.5).unwrap();
        let a = render_question(&q, &ContextBundle::empty());
        let b = render_question(&q, &ContextBundle::empty());
        assert_eq!(a, b);
    }
}
