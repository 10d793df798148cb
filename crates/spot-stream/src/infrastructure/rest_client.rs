use async_trait::async_trait;
use reqwest::{Client, Method};
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::Value;

use super::signer::SignedRequest;
use crate::domain::{Credentials, ListenKeyApi};
use crate::error::RestError;

const USER_DATA_STREAM_PATH: &str = "/api/v3/userDataStream";
const ACCOUNT_PATH: &str = "/api/v3/account";

/// REST client for the listen-key lifecycle and signed endpoints
/// Infrastructure component - handles HTTP communication
#[derive(Clone)]
pub struct RestClient {
    client: Client,
    base_url: String,
}

impl RestClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        RestClient::with_client(Client::new(), base_url)
    }

    /// Reuse an existing reqwest client (connection pool, proxies, timeouts)
    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        RestClient {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `POST /api/v3/userDataStream`
    pub async fn create_listen_key(&self, credentials: &Credentials) -> Result<String, RestError> {
        #[derive(Deserialize)]
        struct ListenKeyResponse {
            #[serde(rename = "listenKey")]
            listen_key: String,
        }

        let request =
            SignedRequest::prepare(Method::POST, &[] as &[(&str, &str)], credentials, false);
        let resp: ListenKeyResponse = self.send(USER_DATA_STREAM_PATH, request).await?;
        Ok(resp.listen_key)
    }

    /// `PUT /api/v3/userDataStream`
    pub async fn keepalive_listen_key(
        &self,
        listen_key: &str,
        credentials: &Credentials,
    ) -> Result<(), RestError> {
        let request =
            SignedRequest::prepare(Method::PUT, &[("listenKey", listen_key)], credentials, false);
        let _: Value = self.send(USER_DATA_STREAM_PATH, request).await?;
        Ok(())
    }

    /// `DELETE /api/v3/userDataStream`
    pub async fn close_listen_key(
        &self,
        listen_key: &str,
        credentials: &Credentials,
    ) -> Result<(), RestError> {
        let request = SignedRequest::prepare(
            Method::DELETE,
            &[("listenKey", listen_key)],
            credentials,
            false,
        );
        let _: Value = self.send(USER_DATA_STREAM_PATH, request).await?;
        Ok(())
    }

    /// Signed `GET /api/v3/account`
    pub async fn account_info(&self, credentials: &Credentials) -> Result<Value, RestError> {
        self.signed_request(Method::GET, ACCOUNT_PATH, Vec::new(), credentials)
            .await
    }

    /// Call a signed endpoint. A `timestamp` parameter is appended before signing.
    pub async fn signed_request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        mut params: Vec<(String, String)>,
        credentials: &Credentials,
    ) -> Result<T, RestError> {
        params.push((
            "timestamp".to_string(),
            chrono::Utc::now().timestamp_millis().to_string(),
        ));
        let request = SignedRequest::prepare(method, &params, credentials, true);
        self.send(path, request).await
    }

    async fn send<T: DeserializeOwned>(
        &self,
        path: &str,
        request: SignedRequest,
    ) -> Result<T, RestError> {
        let mut url = format!("{}{}", self.base_url, path);
        if !request.has_body() && !request.payload.is_empty() {
            url = format!("{}?{}", url, request.payload);
        }

        let mut builder = self.client.request(request.method.clone(), &url);
        for (name, value) in &request.headers {
            builder = builder.header(*name, value);
        }
        if request.has_body() {
            builder = builder.body(request.payload);
        }

        let resp = builder.send().await?;
        self.handle_response(resp).await
    }

    async fn handle_response<T: DeserializeOwned>(
        &self,
        resp: reqwest::Response,
    ) -> Result<T, RestError> {
        let status = resp.status();
        let text = resp.text().await?;

        if !status.is_success() {
            if let Ok(err) = serde_json::from_str::<ApiError>(&text) {
                return Err(RestError::Api {
                    code: err.code,
                    msg: err.msg,
                });
            }
            return Err(RestError::Parse(format!("HTTP {}: {}", status, text)));
        }

        serde_json::from_str(&text).map_err(|e| RestError::Parse(e.to_string()))
    }
}

#[derive(Deserialize)]
struct ApiError {
    code: i32,
    msg: String,
}

#[async_trait]
impl ListenKeyApi for RestClient {
    async fn create(&self, credentials: &Credentials) -> Result<String, RestError> {
        self.create_listen_key(credentials).await
    }

    async fn keepalive(
        &self,
        listen_key: &str,
        credentials: &Credentials,
    ) -> Result<(), RestError> {
        self.keepalive_listen_key(listen_key, credentials).await
    }

    async fn close(&self, listen_key: &str, credentials: &Credentials) -> Result<(), RestError> {
        self.close_listen_key(listen_key, credentials).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trimmed() {
        let client = RestClient::new("https://api.binance.com/");
        assert_eq!(client.base_url(), "https://api.binance.com");
    }

    #[test]
    fn test_api_error_shape() {
        let err: ApiError =
            serde_json::from_str(r#"{"code":-2015,"msg":"Invalid API-key, IP, or permissions for action."}"#)
                .unwrap();
        assert_eq!(err.code, -2015);
        assert!(err.msg.starts_with("Invalid API-key"));
    }
}
