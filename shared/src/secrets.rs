//! AWS Secrets Manager integration.

use aws_sdk_secretsmanager::Client as SecretsClient;
use serde::Deserialize;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::{Error, Result};

/// Database credentials from Secrets Manager.
#[derive(Debug, Deserialize)]
pub struct DatabaseCredentials {
    pub username: String,
    pub password: String,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub dbname: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TwilioSecret {
    auth_token: String,
}

/// Secrets Manager client with an in-process cache.
///
/// Lambda containers are reused between invocations, so each secret is
/// fetched once per container.
#[derive(Debug)]
pub struct SecretStore {
    client: SecretsClient,
    cache: RwLock<HashMap<String, String>>,
}

impl SecretStore {
    pub fn new(client: SecretsClient) -> Self {
        Self {
            client,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Get a secret value with caching.
    pub async fn get(&self, secret_arn: &str) -> Result<String> {
        {
            let cache = self.cache.read().await;
            if let Some(value) = cache.get(secret_arn) {
                return Ok(value.clone());
            }
        }

        let response = self
            .client
            .get_secret_value()
            .secret_id(secret_arn)
            .send()
            .await
            .map_err(|e| Error::Aws(format!("Failed to get secret: {}", e)))?;

        let secret_string = response
            .secret_string()
            .ok_or_else(|| Error::Aws("Secret has no string value".to_string()))?
            .to_string();

        {
            let mut cache = self.cache.write().await;
            cache.insert(secret_arn.to_string(), secret_string.clone());
        }

        Ok(secret_string)
    }

    pub async fn database_credentials(&self, secret_arn: &str) -> Result<DatabaseCredentials> {
        let secret_string = self.get(secret_arn).await?;
        parse_database_credentials(&secret_string)
    }

    pub async fn twilio_auth_token(&self, secret_arn: &str) -> Result<String> {
        let secret_string = self.get(secret_arn).await?;
        Ok(parse_twilio_auth_token(&secret_string))
    }
}

fn parse_database_credentials(secret: &str) -> Result<DatabaseCredentials> {
    serde_json::from_str(secret)
        .map_err(|e| Error::Aws(format!("Failed to parse database credentials: {}", e)))
}

/// The token is stored either bare or as `{"auth_token": "..."}`.
fn parse_twilio_auth_token(secret: &str) -> String {
    match serde_json::from_str::<TwilioSecret>(secret) {
        Ok(parsed) => parsed.auth_token,
        Err(_) => secret.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_credentials() {
        let json = r#"{"username":"nutrition","password":"secret123","host":"db.example.com","port":5432,"dbname":"nutrition"}"#;
        let creds = parse_database_credentials(json).unwrap();
        assert_eq!(creds.username, "nutrition");
        assert_eq!(creds.password, "secret123");
        assert_eq!(creds.host, Some("db.example.com".to_string()));
    }

    #[test]
    fn test_parse_credentials_rejects_garbage() {
        assert!(matches!(parse_database_credentials("nope"), Err(Error::Aws(_))));
    }

    #[test]
    fn test_twilio_token_formats() {
        assert_eq!(parse_twilio_auth_token("abc123\n"), "abc123");
        assert_eq!(parse_twilio_auth_token(r#"{"auth_token":"xyz"}"#), "xyz");
    }
}
