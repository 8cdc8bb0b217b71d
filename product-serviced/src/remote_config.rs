//! One-shot bootstrap from a Spring Cloud Config compatible server.
//!
//! `GET {url}/{app}/{profile}/{branch}` returns a list of property sources;
//! the first one takes precedence and its recognised keys override the
//! local file. Keys are matched case-insensitively.

use std::time::Duration;
use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::{Map, Value};
use crate::config::{Config, ConfigServerConfig};

const KEY_REGISTRY_URL: &str = "eureka.client.service-url.defaultzone";
const KEY_HOSTNAME: &str = "server.hostname";
const KEY_PORT: &str = "server.port";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Environment {
    #[serde(default)]
    name: String,
    #[serde(default)]
    property_sources: Vec<PropertySource>,
}

#[derive(Debug, Deserialize)]
struct PropertySource {
    #[serde(default)]
    name: String,
    #[serde(default)]
    source: Map<String, Value>,
}

fn environment_url(server: &ConfigServerConfig, app: &str) -> String {
    format!(
        "{}/{}/{}/{}",
        server.url.trim_end_matches('/'),
        app,
        server.profile,
        server.branch
    )
}

/// Fetch remote configuration and merge it into `config`.
/// Does nothing when no config server is configured.
pub async fn apply_remote(config: &mut Config, timeout: Duration) -> Result<()> {
    let Some(server) = config.config_server.clone() else {
        return Ok(());
    };

    let url = environment_url(&server, &config.application.name);
    tracing::info!("Loading configuration from {}", url);

    let env: Environment = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .context("Failed to build HTTP client")?
        .get(&url)
        .send()
        .await
        .with_context(|| format!("Failed to reach config server at {}", url))?
        .error_for_status()
        .with_context(|| format!("Config server rejected {}", url))?
        .json::<Environment>()
        .await
        .with_context(|| format!("Failed to parse configuration from {}", url))?;

    let Some(source) = env.property_sources.into_iter().next() else {
        tracing::warn!("Config server returned no property sources for {}", url);
        return Ok(());
    };

    let applied = merge(config, &source.source)?;
    tracing::info!(
        "Applied {} properties from {} for service {}",
        applied,
        source.name,
        env.name
    );
    Ok(())
}

/// Merge recognised keys, returning how many were applied
fn merge(config: &mut Config, source: &Map<String, Value>) -> Result<usize> {
    let mut applied = 0;

    for (key, value) in source {
        let Some(text) = scalar(value) else {
            tracing::debug!("Skipping non-scalar property {}", key);
            continue;
        };

        match key.to_ascii_lowercase().as_str() {
            KEY_REGISTRY_URL => config.registry.url = text,
            KEY_HOSTNAME => config.server.hostname = text,
            KEY_PORT => {
                let port: u16 = text
                    .parse()
                    .with_context(|| format!("Invalid {} value: {}", key, text))?;
                config.server.set_port(port);
            }
            _ => {
                tracing::debug!("Ignoring unrecognised property {}", key);
                continue;
            }
        }
        applied += 1;
    }

    Ok(applied)
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn config_with_server(url: Option<&str>) -> Config {
        let mut config = Config::parse(
            r#"
            [application]
            name = "product-service"
            "#,
        )
        .unwrap();
        config.config_server = url.map(|url| ConfigServerConfig {
            url: url.to_string(),
            profile: "dev".to_string(),
            branch: "main".to_string(),
        });
        config
    }

    #[test]
    fn test_merge_matches_keys_case_insensitively() {
        let mut config = config_with_server(None);
        let source = json!({
            "eureka.client.service-url.defaultZone": "http://registry:8761/eureka",
            "SERVER.HOSTNAME": "products.internal",
            "server.port": 9000,
            "spring.data.mongodb.uri": "mongodb://db",
            "nested": {"a": 1}
        });

        let applied = merge(&mut config, source.as_object().unwrap()).unwrap();

        assert_eq!(applied, 3);
        assert_eq!(config.registry.url, "http://registry:8761/eureka");
        assert_eq!(config.server.hostname, "products.internal");
        assert_eq!(config.server.listen, "0.0.0.0:9000");
    }

    #[test]
    fn test_merge_rejects_bad_port() {
        let mut config = config_with_server(None);
        let source = json!({"server.port": "eighty"});
        assert!(merge(&mut config, source.as_object().unwrap()).is_err());
    }

    #[tokio::test]
    async fn test_no_config_server_is_a_no_op() {
        let mut config = config_with_server(None);
        apply_remote(&mut config, Duration::from_secs(1)).await.unwrap();
        assert_eq!(config.registry.url, "http://localhost:8761/eureka");
    }

    #[tokio::test]
    async fn test_apply_remote_uses_first_source() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/config/product-service/dev/main");
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!({
                    "name": "product-service",
                    "profiles": ["dev"],
                    "label": "main",
                    "propertySources": [
                        {
                            "name": "git:main:product-service-dev.yml",
                            "source": {"eureka.client.service-url.defaultZone": "http://first/eureka"}
                        },
                        {
                            "name": "git:main:application.yml",
                            "source": {"eureka.client.service-url.defaultZone": "http://second/eureka"}
                        }
                    ]
                }));
        });

        let mut config = config_with_server(Some(&server.url("/config/")));
        apply_remote(&mut config, Duration::from_secs(5)).await.unwrap();

        mock.assert();
        assert_eq!(config.registry.url, "http://first/eureka");
    }

    #[tokio::test]
    async fn test_empty_sources_leave_config_unchanged() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/product-service/dev/main");
            then.status(200).json_body(json!({"name": "product-service", "propertySources": []}));
        });

        let mut config = config_with_server(Some(&server.base_url()));
        apply_remote(&mut config, Duration::from_secs(5)).await.unwrap();
        assert_eq!(config.registry.url, "http://localhost:8761/eureka");
    }

    #[tokio::test]
    async fn test_server_error_is_fatal() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/product-service/dev/main");
            then.status(500);
        });

        let mut config = config_with_server(Some(&server.base_url()));
        assert!(apply_remote(&mut config, Duration::from_secs(5)).await.is_err());
    }
}
