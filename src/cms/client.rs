use std::time::Duration;

use async_trait::async_trait;
use scraper::{Html, Selector};
use tracing::{debug, info};

use crate::model::Hotel;

use super::form::ListingForm;
use super::{CmsClient, CmsError};

const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Drives the CMS admin web form over HTTP with a cookie session.
///
/// The admin is a standard server-rendered form flow: fetch a page to
/// obtain a CSRF token, post the form back, and read the re-rendered
/// page for an error list. A successful save returns a fresh, empty
/// add-accommodation form ("save and add another" semantics).
pub struct HttpCmsClient {
    http: reqwest::Client,
    base_url: String,
    username: String,
    password: String,
}

impl HttpCmsClient {
    pub fn new(base_url: &str, username: &str, password: &str) -> Result<Self, CmsError> {
        Ok(Self {
            http: session_client()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            username: username.to_string(),
            password: password.to_string(),
        })
    }

    /// Create the session: fetch the login form and post credentials.
    /// A response that still shows the login form means the credentials
    /// were not accepted.
    pub async fn log_in(&mut self) -> Result<(), CmsError> {
        let login_url = format!("{}/login/", self.base_url);
        let token = self.fetch_token(&login_url).await?;
        let body = self
            .post_form(
                &login_url,
                &[
                    ("csrfmiddlewaretoken".to_string(), token),
                    ("username".to_string(), self.username.clone()),
                    ("password".to_string(), self.password.clone()),
                ],
            )
            .await?;
        if contains_element(&body, "#id_username") {
            return Err(CmsError::Login("credentials were not accepted".into()));
        }
        info!("logged in to the cms");
        Ok(())
    }

    fn add_page_url(&self) -> String {
        format!("{}/accommodationpage/add/", self.base_url)
    }

    async fn fetch_token(&self, url: &str) -> Result<String, CmsError> {
        let body = self.get(url).await?;
        let doc = Html::parse_document(&body);
        let selector = Selector::parse("input[name=csrfmiddlewaretoken]").expect("static selector");
        doc.select(&selector)
            .next()
            .and_then(|el| el.value().attr("value"))
            .map(str::to_string)
            .ok_or_else(|| CmsError::Transport(format!("no csrf token on {url}")))
    }

    async fn get(&self, url: &str) -> Result<String, CmsError> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| CmsError::Transport(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(CmsError::Transport(format!("{url} returned HTTP {status}")));
        }
        response
            .text()
            .await
            .map_err(|e| CmsError::Transport(e.to_string()))
    }

    async fn post_form(&self, url: &str, fields: &[(String, String)]) -> Result<String, CmsError> {
        let response = self
            .http
            .post(url)
            .form(fields)
            .send()
            .await
            .map_err(|e| CmsError::Transport(e.to_string()))?;
        let status = response.status();
        if status.is_server_error() {
            return Err(CmsError::Transport(format!("{url} returned HTTP {status}")));
        }
        response
            .text()
            .await
            .map_err(|e| CmsError::Transport(e.to_string()))
    }
}

#[async_trait]
impl CmsClient for HttpCmsClient {
    async fn push(&mut self, hotel: &Hotel) -> Result<(), CmsError> {
        let add_url = self.add_page_url();
        let token = self.fetch_token(&add_url).await?;

        let form = ListingForm::from_hotel(hotel);
        let mut fields = vec![
            ("csrfmiddlewaretoken".to_string(), token),
            ("_addanother".to_string(), "1".to_string()),
        ];
        fields.extend_from_slice(form.fields());

        debug!(hotel = %hotel.name, "submitting listing form");
        let body = self.post_form(&add_url, &fields).await?;

        // The form re-renders with an error list when the remote
        // rejects the record; an accepted save comes back without one.
        let errors = form_errors(&body);
        if !errors.is_empty() {
            return Err(CmsError::Rejected(errors.join("\n")));
        }
        Ok(())
    }

    async fn reset(&mut self) -> Result<(), CmsError> {
        self.get(&self.add_page_url()).await.map(|_| ())
    }

    async fn recycle(&mut self) -> Result<(), CmsError> {
        self.http = session_client()?;
        self.log_in().await
    }
}

fn session_client() -> Result<reqwest::Client, CmsError> {
    reqwest::Client::builder()
        .cookie_store(true)
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .build()
        .map_err(|e| CmsError::Transport(e.to_string()))
}

fn contains_element(body: &str, css: &str) -> bool {
    let doc = Html::parse_document(body);
    let selector = Selector::parse(css).expect("static selector");
    doc.select(&selector).next().is_some()
}

fn form_errors(body: &str) -> Vec<String> {
    let doc = Html::parse_document(body);
    let selector = Selector::parse("ul.errorlist li").expect("static selector");
    doc.select(&selector)
        .map(|li| li.text().collect::<String>().trim().to_string())
        .filter(|msg| !msg.is_empty())
        .collect()
}
