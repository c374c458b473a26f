use crate::{config::MailingConfig, errors::ServiceError};
use md5::{Digest, Md5};
use serde::Serialize;
use tracing::{error, info, instrument};

/// Computes the mailing-list member key: MD5 of the lowercased address.
///
/// This is the list API's documented contact-addressing convention, not a
/// security measure.
pub fn subscriber_hash(email: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(email.trim().to_lowercase().as_bytes());
    hex::encode(hasher.finalize())
}

#[derive(Debug, Serialize)]
struct MemberUpsert<'a> {
    email_address: &'a str,
    status: &'static str,
    status_if_new: &'static str,
}

/// Client for the mailing-list provider's member API
#[derive(Clone)]
pub struct MailingService {
    client: reqwest::Client,
    config: MailingConfig,
}

impl MailingService {
    pub fn new(client: reqwest::Client, config: MailingConfig) -> Self {
        Self { client, config }
    }

    fn member_url(&self, email: &str) -> String {
        let base = self.config.api_url.clone().unwrap_or_else(|| {
            format!("https://{}.api.mailchimp.com/3.0", self.config.server_prefix)
        });
        format!(
            "{}/lists/{}/members/{}",
            base,
            self.config.list_id,
            subscriber_hash(email)
        )
    }

    /// Upserts the address as a subscribed list member. The PUT-by-hash
    /// addressing makes repeat calls for the same address idempotent.
    #[instrument(skip(self, email))]
    pub async fn upsert_subscriber(&self, email: &str) -> Result<(), ServiceError> {
        let url = self.member_url(email);
        let body = MemberUpsert {
            email_address: email,
            status: "subscribed",
            status_if_new: "subscribed",
        };

        let response = self
            .client
            .put(&url)
            .basic_auth("anystring", Some(&self.config.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "subscriber upsert request failed");
                ServiceError::integration("mailing", e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            error!(%status, %detail, "subscriber upsert rejected");
            return Err(ServiceError::integration(
                "mailing",
                format!("subscriber upsert returned {}", status),
            ));
        }

        info!("subscriber upserted");
        Ok(())
    }
}
