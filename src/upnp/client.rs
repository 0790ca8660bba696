//! HTTP transport with transparent digest authentication.
//!
//! Descriptor fetches and SOAP calls share one [`SoapClient`]. When a
//! username is configured, a 401 response is answered by computing digest
//! credentials from the `WWW-Authenticate` challenge and retrying the request
//! exactly once; without credentials, responses pass through untouched.
//! Network and TLS errors propagate to the caller and are never retried here.

use crate::config::GatewayConfig;
use crate::error::Result;
use digest_auth::{AuthContext, HttpMethod};
use reqwest::header::{AUTHORIZATION, WWW_AUTHENTICATE};
use reqwest::{Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

#[derive(Debug)]
pub struct SoapClient {
    http: reqwest::Client,
    username: String,
    password: SecretString,
}

impl SoapClient {
    pub fn new(config: &GatewayConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(config.allow_self_signed)
            .build()?;

        Ok(Self {
            http,
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }

    pub async fn get(&self, url: &str) -> Result<Response> {
        let request = self.http.get(url);
        self.send(request, HttpMethod::GET, url).await
    }

    pub async fn post_soap(&self, url: &str, soap_action: &str, body: String) -> Result<Response> {
        let request = self
            .http
            .post(url)
            .header("Content-Type", r#"text/xml; charset="utf-8""#)
            .header("SOAPAction", soap_action)
            .body(body);
        self.send(request, HttpMethod::POST, url).await
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        method: HttpMethod<'static>,
        url: &str,
    ) -> Result<Response> {
        let retry = request.try_clone();
        let response = request.send().await?;

        if response.status() != StatusCode::UNAUTHORIZED || self.username.is_empty() {
            return Ok(response);
        }

        // 401 with credentials configured: answer the challenge once.
        let Some(retry) = retry else {
            return Ok(response);
        };
        let Some(challenge) = response
            .headers()
            .get(WWW_AUTHENTICATE)
            .and_then(|value| value.to_str().ok())
        else {
            return Ok(response);
        };

        debug!("answering digest challenge for {}", url);
        let mut prompt = digest_auth::parse(challenge)?;
        let mut context =
            AuthContext::new(&self.username, self.password.expose_secret(), request_path(url));
        context.method = method;
        let answer = prompt.respond(&context)?;

        Ok(retry
            .header(AUTHORIZATION, answer.to_header_string())
            .send()
            .await?)
    }
}

/// Digest credentials hash the request path, not the absolute URL.
fn request_path(url: &str) -> &str {
    url.split_once("://")
        .and_then(|(_, rest)| rest.find('/').map(|slash| &rest[slash..]))
        .unwrap_or("/")
}

#[cfg(test)]
mod tests {
    use super::request_path;

    #[test]
    fn request_path_strips_scheme_and_authority() {
        assert_eq!(request_path("http://fritz.box:49000/igddesc.xml"), "/igddesc.xml");
        assert_eq!(
            request_path("https://fritz.box:49443/upnp/control/wancommonifconfig1"),
            "/upnp/control/wancommonifconfig1"
        );
        assert_eq!(request_path("http://fritz.box:49000"), "/");
    }
}
