use crate::config::config::EngagementPolicy;
use crate::context::source::{NewsArticle, SocialPost};
use crate::core::types::{Engagement, Signal, SignalOrigin, Tier};
use std::collections::HashMap;

const RULE: &str = "============================================================";

/// Character limit for social text in the trusted sections.
const TRUSTED_TEXT_LIMIT: usize = 200;
const UNTRUSTED_TEXT_LIMIT: usize = 150;

struct Section {
    title: &'static str,
    tiers: &'static [Tier],
    always: bool,
}

const SECTIONS: [Section; 4] = [
    Section {
        title: "TIER 1: VERIFIED SOURCES [WEIGHT: 3x, RELIABILITY: 95%]",
        tiers: &[Tier::Verified],
        always: true,
    },
    Section {
        title: "TIER 2: HIGH ENGAGEMENT [WEIGHT: 2x, RELIABILITY: 65%]",
        tiers: &[Tier::HighEngagement],
        always: false,
    },
    Section {
        title: "TIER 3: PROFESSIONAL NEWS [WEIGHT: 2x, RELIABILITY: 80%]",
        tiers: &[Tier::Professional],
        always: true,
    },
    Section {
        title: "TIER 4/5: REGULAR & SUSPICIOUS [WEIGHT: 0x-1x]",
        tiers: &[Tier::Regular, Tier::Suspicious],
        always: true,
    },
];

/// Tier of a social post under `policy`.
pub fn classify_post(post: &SocialPost, policy: &EngagementPolicy) -> Tier {
    if post.author.is_blue_verified {
        return Tier::Verified;
    }
    match policy {
        EngagementPolicy::Flat => Tier::Regular,
        EngagementPolicy::Engagement {
            min_reposts,
            min_likes,
        } => {
            if post.retweet_count > *min_reposts || post.like_count > *min_likes {
                Tier::HighEngagement
            } else if post.retweet_count == 0 && post.like_count == 0 {
                Tier::Suspicious
            } else {
                Tier::Regular
            }
        }
    }
}

fn one_line(text: &str, limit: usize) -> String {
    text.chars()
        .take(limit)
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .collect()
}

/// Tiered, capped context for one question. Signals are kept in rendered order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ContextBundle {
    signals: Vec<Signal>,
}

impl ContextBundle {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_sources(
        news: Vec<NewsArticle>,
        posts: Vec<SocialPost>,
        policy: &EngagementPolicy,
        per_tier_cap: usize,
    ) -> Self {
        let mut signals = Vec::with_capacity(news.len() + posts.len());

        for post in posts {
            if post.text.trim().is_empty() {
                continue;
            }
            let tier = classify_post(&post, policy);
            let limit = match tier {
                Tier::Verified | Tier::HighEngagement => TRUSTED_TEXT_LIMIT,
                _ => UNTRUSTED_TEXT_LIMIT,
            };
            let handle = if post.author.user_name.is_empty() {
                "unknown".to_string()
            } else {
                post.author.user_name
            };
            signals.push(Signal {
                origin: SignalOrigin::Social { handle },
                text: one_line(&post.text, limit),
                tier,
                authentic: post.author.is_blue_verified,
                engagement: Engagement {
                    reposts: post.retweet_count,
                    likes: post.like_count,
                },
            });
        }

        for article in news {
            if article.title.trim().is_empty() {
                continue;
            }
            signals.push(Signal {
                origin: SignalOrigin::News {
                    domain: article.domain,
                },
                text: one_line(&article.title, usize::MAX),
                tier: Tier::Professional,
                authentic: false,
                engagement: Engagement::default(),
            });
        }

        Self::from_signals(signals, per_tier_cap)
    }

    /// Orders by tier (verified first inside a tier), keeping input order otherwise,
    /// and drops everything past `per_tier_cap` in each tier.
    pub fn from_signals(mut signals: Vec<Signal>, per_tier_cap: usize) -> Self {
        signals.sort_by_key(|s| (s.tier, !s.authentic));
        let mut per_tier: HashMap<Tier, usize> = HashMap::new();
        signals.retain(|s| {
            let n = per_tier.entry(s.tier).or_default();
            *n += 1;
            *n <= per_tier_cap
        });
        Self { signals }
    }

    pub fn signals(&self) -> &[Signal] {
        &self.signals
    }

    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }

    pub fn count(&self, tier: Tier) -> usize {
        self.signals.iter().filter(|s| s.tier == tier).count()
    }

    /// Deterministic text form handed to the prompt builder.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let mut first = true;

        for section in &SECTIONS {
            let items: Vec<&Signal> = self
                .signals
                .iter()
                .filter(|s| section.tiers.contains(&s.tier))
                .collect();
            if items.is_empty() && !section.always {
                continue;
            }
            if !first {
                out.push('\n');
            }
            first = false;

            out.push_str(RULE);
            out.push('\n');
            out.push_str(section.title);
            out.push('\n');
            out.push_str(RULE);
            out.push('\n');
            for s in items {
                out.push_str(&render_item(s));
                out.push('\n');
            }
        }
        out
    }
}

fn render_item(s: &Signal) -> String {
    match &s.origin {
        SignalOrigin::Social { handle } if s.authentic => {
            format!("- @{handle} (verified): \"{}\"", s.text)
        }
        SignalOrigin::Social { handle } => format!("- @{handle}: \"{}\"", s.text),
        SignalOrigin::News { domain } => format!("- {domain}: \"{}\"", s.text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::source::SocialAuthor;

    fn post(user: &str, verified: bool, rts: u64, likes: u64, text: &str) -> SocialPost {
        SocialPost {
            text: text.to_string(),
            retweet_count: rts,
            like_count: likes,
            author: SocialAuthor {
                user_name: user.to_string(),
                is_blue_verified: verified,
            },
        }
    }

    fn article(domain: &str, title: &str) -> NewsArticle {
        NewsArticle {
            title: title.to_string(),
            domain: domain.to_string(),
            url: format!("https://{domain}/x"),
        }
    }

    #[test]
    fn test_classification_under_engagement_policy() {
        let policy = EngagementPolicy::default();
        assert_eq!(classify_post(&post("a", true, 0, 0, "x"), &policy), Tier::Verified);
        assert_eq!(
            classify_post(&post("a", false, 101, 0, "x"), &policy),
            Tier::HighEngagement
        );
        assert_eq!(
            classify_post(&post("a", false, 0, 501, "x"), &policy),
            Tier::HighEngagement
        );
        // thresholds are strict
        assert_eq!(classify_post(&post("a", false, 100, 500, "x"), &policy), Tier::Regular);
        assert_eq!(classify_post(&post("a", false, 0, 0, "x"), &policy), Tier::Suspicious);
    }

    #[test]
    fn test_flat_policy_keeps_unverified_in_tier_four() {
        let p = post("a", false, 5000, 5000, "x");
        assert_eq!(classify_post(&p, &EngagementPolicy::Flat), Tier::Regular);
    }

    #[test]
    fn test_empty_bundle_renders_fixed_sections() {
        let rendered = ContextBundle::empty().render();
        let expected = format!(
            "{RULE}\nTIER 1: VERIFIED SOURCES [WEIGHT: 3x, RELIABILITY: 95%]\n{RULE}\n\
             \n{RULE}\nTIER 3: PROFESSIONAL NEWS [WEIGHT: 2x, RELIABILITY: 80%]\n{RULE}\n\
             \n{RULE}\nTIER 4/5: REGULAR & SUSPICIOUS [WEIGHT: 0x-1x]\n{RULE}\n"
        );
        assert_eq!(rendered, expected);
        assert!(!rendered.contains("TIER 2"));
        assert_eq!(RULE.len(), 60);
    }

    #[test]
    fn test_rendering_orders_tiers_and_formats_items() {
        let bundle = ContextBundle::from_sources(
            vec![article("reuters.com", "Fed holds rates")],
            vec![
                post("anon", false, 0, 0, "rates up??"),
                post("trader", false, 300, 10, "Fed pivot incoming"),
                post("wsj", true, 0, 0, "Fed signals patience"),
            ],
            &EngagementPolicy::default(),
            10,
        );
        let r = bundle.render();

        let t1 = r.find("- @wsj (verified): \"Fed signals patience\"").unwrap();
        let t2 = r.find("- @trader: \"Fed pivot incoming\"").unwrap();
        let t3 = r.find("- reuters.com: \"Fed holds rates\"").unwrap();
        let t5 = r.find("- @anon: \"rates up??\"").unwrap();
        assert!(t1 < t2 && t2 < t3 && t3 < t5);
        assert!(r.contains("TIER 2: HIGH ENGAGEMENT [WEIGHT: 2x, RELIABILITY: 65%]"));

        let tiers: Vec<Tier> = bundle.signals().iter().map(|s| s.tier).collect();
        assert_eq!(
            tiers,
            vec![Tier::Verified, Tier::HighEngagement, Tier::Professional, Tier::Suspicious]
        );
    }

    #[test]
    fn test_per_tier_cap_keeps_input_order() {
        let news = (0..15)
            .map(|i| article("example.com", &format!("headline {i}")))
            .collect();
        let bundle = ContextBundle::from_sources(news, vec![], &EngagementPolicy::Flat, 10);
        assert_eq!(bundle.count(Tier::Professional), 10);
        assert_eq!(bundle.signals()[0].text, "headline 0");
        assert_eq!(bundle.signals()[9].text, "headline 9");
    }

    #[test]
    fn test_social_text_truncation_is_char_safe() {
        let long = "é".repeat(400);
        let bundle = ContextBundle::from_sources(
            vec![],
            vec![post("v", true, 0, 0, &long), post("r", false, 1, 1, &long)],
            &EngagementPolicy::default(),
            10,
        );
        assert_eq!(bundle.signals()[0].text.chars().count(), 200);
        assert_eq!(bundle.signals()[1].text.chars().count(), 150);
    }

    #[test]
    fn test_render_is_stable_and_single_line_per_item() {
        let bundle = ContextBundle::from_sources(
            vec![article("ft.com", "Markets\nslide")],
            vec![post("x", false, 2, 3, "line one\nline two")],
            &EngagementPolicy::default(),
            10,
        );
        assert_eq!(bundle.render(), bundle.render());
        assert!(bundle.render().contains("- ft.com: \"Markets slide\""));
        assert!(bundle.render().contains("- @x: \"line one line two\""));
    }
}
