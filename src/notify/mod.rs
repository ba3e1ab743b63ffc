pub mod alert;
pub mod discord;
pub mod telegram;

use crate::config::config::NotifyCfg;
use crate::core::types::RiskProfile;
use alert::AlertChannel;
use discord::DiscordWebhook;
use reqwest::Client;
use telegram::TelegramBot;

/// Builds the alert channels a profile has configured.
#[derive(Clone)]
pub struct Notifier {
    client: Client,
    cfg: NotifyCfg,
}

impl Notifier {
    pub fn new(client: Client, cfg: NotifyCfg) -> Self {
        Self { client, cfg }
    }

    pub fn reasoning_limit(&self) -> usize {
        self.cfg.reasoning_limit
    }

    pub fn channels_for(&self, profile: &RiskProfile) -> Vec<Box<dyn AlertChannel>> {
        let mut channels: Vec<Box<dyn AlertChannel>> = Vec::new();
        if let Some(url) = profile.discord_webhook.as_deref().filter(|u| !u.is_empty()) {
            channels.push(Box::new(DiscordWebhook::new(self.client.clone(), url)));
        }
        if let Some(tg) = &profile.telegram {
            channels.push(Box::new(TelegramBot::new(
                self.client.clone(),
                &self.cfg.telegram_api_url,
                &tg.bot_token,
                &tg.chat_id,
            )));
        }
        channels
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::TelegramTarget;

    #[test]
    fn test_channels_follow_profile() {
        let notifier = Notifier::new(Client::new(), NotifyCfg::default());
        let mut profile = RiskProfile::new("p1", 5.0, 70.0).unwrap();
        assert!(notifier.channels_for(&profile).is_empty());

        profile.discord_webhook = Some("https://discord.com/api/webhooks/1/x".into());
        profile.telegram = Some(TelegramTarget {
            bot_token: "t".into(),
            chat_id: "c".into(),
        });
        let names: Vec<&str> = notifier.channels_for(&profile).iter().map(|c| c.name()).collect();
        assert_eq!(names, vec!["discord", "telegram"]);
    }
}
