use crate::config::QrzConfig;
use crate::error::{Result, WelcomeError};
use crate::types::{EnrichmentProvider, EnrichmentSession};
use scraper::{Html, Selector};
use std::time::Duration;
use tracing::{debug, instrument};

/// QRZ.com lookup adapter. Logs in once per run; the cookie jar carries the
/// session across every profile fetch.
pub struct QrzProvider {
    config: QrzConfig,
    username: String,
    password: String,
}

impl QrzProvider {
    pub fn new(config: QrzConfig, username: String, password: String) -> Self {
        Self {
            config,
            username,
            password,
        }
    }
}

#[async_trait::async_trait]
impl EnrichmentProvider for QrzProvider {
    #[instrument(skip(self))]
    async fn authenticate(&self) -> Result<Box<dyn EnrichmentSession>> {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(Duration::from_secs(self.config.timeout_seconds))
            .build()?;

        let response = client
            .post(&self.config.login_url)
            .form(&[
                ("username", self.username.as_str()),
                ("password", self.password.as_str()),
            ])
            .send()
            .await
            .map_err(|e| WelcomeError::Auth(format!("login request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(WelcomeError::Auth(format!(
                "login rejected with status {}",
                response.status().as_u16()
            )));
        }

        // A failed login bounces back to the login form rather than erroring.
        let page = response.text().await?;
        if page.contains("name=\"password\"") {
            return Err(WelcomeError::Auth(
                "login page returned; check QRZ credentials".into(),
            ));
        }

        debug!("QRZ session established for {}", self.username);
        Ok(Box::new(QrzSession {
            client,
            profile_url_base: self.config.profile_url_base.clone(),
        }))
    }
}

struct QrzSession {
    client: reqwest::Client,
    profile_url_base: String,
}

/// Pull an email address out of a QRZ profile page. The address lives in the
/// `#qem` element when the profile publishes one; older profiles only carry a
/// mailto link.
fn extract_email(page: &str) -> Option<String> {
    let document = Html::parse_document(page);

    if let Ok(selector) = Selector::parse("#qem") {
        if let Some(element) = document.select(&selector).next() {
            let text = element.text().collect::<String>().trim().to_string();
            if text.contains('@') {
                return Some(text.to_lowercase());
            }
        }
    }

    if let Ok(selector) = Selector::parse("a[href^=\"mailto:\"]") {
        if let Some(element) = document.select(&selector).next() {
            if let Some(href) = element.value().attr("href") {
                let address = href.trim_start_matches("mailto:").trim();
                if address.contains('@') {
                    return Some(address.to_lowercase());
                }
            }
        }
    }

    None
}

#[async_trait::async_trait]
impl EnrichmentSession for QrzSession {
    #[instrument(skip(self))]
    async fn lookup(&self, callsign: &str) -> Result<Option<String>> {
        let url = format!(
            "{}/{}",
            self.profile_url_base.trim_end_matches('/'),
            callsign
        );
        let response = self.client.get(&url).send().await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(WelcomeError::Provider {
                message: format!(
                    "profile fetch for {} returned status {}",
                    callsign,
                    response.status().as_u16()
                ),
            });
        }

        let page = response.text().await?;
        Ok(extract_email(&page))
    }
}
