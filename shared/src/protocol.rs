/// Registry base URL used when none is configured
pub const DEFAULT_REGISTRY_URL: &str = "http://localhost:8761/eureka";

/// Path segment under the registry base URL that holds application entries
pub const APPS_PATH: &str = "apps";

/// Data-center descriptor sent with every registration
pub const DATA_CENTER_CLASS: &str = "com.netflix.appinfo.InstanceInfo$DefaultDataCenterInfo";
pub const DATA_CENTER_NAME: &str = "MyOwn";

/// Paths served by the host and published in the instance record
pub const HOME_PAGE_PATH: &str = "/";
pub const STATUS_PAGE_PATH: &str = "/info";
pub const HEALTH_CHECK_PATH: &str = "/health";

/// `POST`/collection path for an application: `{base}/apps/{app}`
pub fn app_url(base: &str, app: &str) -> String {
    format!("{}/{}/{}", base.trim_end_matches('/'), APPS_PATH, app)
}

/// Per-instance path: `{base}/apps/{app}/{instance_id}`
pub fn instance_url(base: &str, app: &str, instance_id: &str) -> String {
    format!("{}/{}", app_url(base, app), instance_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls_trim_trailing_slash() {
        assert_eq!(
            app_url("http://localhost:8761/eureka/", "order-service"),
            "http://localhost:8761/eureka/apps/order-service"
        );
        assert_eq!(
            instance_url(DEFAULT_REGISTRY_URL, "order-service", "abc-123"),
            "http://localhost:8761/eureka/apps/order-service/abc-123"
        );
    }
}
