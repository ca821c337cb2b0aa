use async_trait::async_trait;
use serde::Deserialize;

use super::{SendOutcome, WhatsAppProvider};
use crate::models::PhoneNumber;

pub struct TwilioWhatsAppProvider {
    account_sid: String,
    auth_token: String,
    from_number: String,
    client: reqwest::Client,
}

impl TwilioWhatsAppProvider {
    pub fn new(account_sid: String, auth_token: String, from_number: String) -> Self {
        Self {
            account_sid,
            auth_token,
            from_number,
            client: reqwest::Client::new(),
        }
    }
}

#[derive(Deserialize)]
struct TwilioMessageResponse {
    sid: String,
}

#[async_trait]
impl WhatsAppProvider for TwilioWhatsAppProvider {
    async fn send_message(&self, to: &PhoneNumber, body: &str) -> SendOutcome {
        let url = format!(
            "https://api.twilio.com/2010-04-01/Accounts/{}/Messages.json",
            self.account_sid
        );
        let to_addr = to.whatsapp_format();
        let from_addr = format!("whatsapp:{}", self.from_number);

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&[
                ("To", to_addr.as_str()),
                ("From", from_addr.as_str()),
                ("Body", body),
            ])
            .send()
            .await;

        match response {
            Ok(response) if response.status().is_success() => {
                match response.json::<TwilioMessageResponse>().await {
                    Ok(message) => SendOutcome::Sent { sid: message.sid },
                    Err(e) => SendOutcome::Failed {
                        error: format!("failed to decode Twilio response: {e}"),
                    },
                }
            }
            Ok(response) => SendOutcome::Failed {
                error: format!("Twilio API returned {}", response.status()),
            },
            Err(e) => SendOutcome::Failed {
                error: format!("failed to reach Twilio: {e}"),
            },
        }
    }

    async fn is_available(&self) -> bool {
        let url = format!(
            "https://api.twilio.com/2010-04-01/Accounts/{}.json",
            self.account_sid
        );

        self.client
            .get(&url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .send()
            .await
            .map(|response| response.status().is_success())
            .unwrap_or(false)
    }
}
