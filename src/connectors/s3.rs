//! Connector for S3-compatible object storage.

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::{Credentials, Region};

use crate::connectors::{Connector, check_required, kerberos, parse_setting};
use crate::error::{AppError, Result};
use crate::models::DataSourceDefinition;

pub const BACKEND: &str = "s3";

const REQUIRED: &[&str] = &[
    "endpoint",
    "access_key_id",
    "secret_access_key",
    "use_ssl",
    "bucket",
];

const DEFAULT_REGION: &str = "us-east-1";

/// S3 client bound to one bucket.
#[derive(Default)]
pub struct S3Connector {
    client: Option<Client>,
    bucket: String,
}

impl S3Connector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Client of the open connection.
    pub fn client(&self) -> Result<&Client> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::connection(BACKEND, "connection is not open"))
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

/// Add a scheme to a bare `host:port` endpoint according to `use_ssl`.
pub fn endpoint_url(endpoint: &str, use_ssl: bool) -> String {
    if endpoint.contains("://") {
        endpoint.to_string()
    } else if use_ssl {
        format!("https://{}", endpoint)
    } else {
        format!("http://{}", endpoint)
    }
}

#[async_trait]
impl Connector for S3Connector {
    fn backend(&self) -> &'static str {
        BACKEND
    }

    fn required_settings(&self) -> &'static [&'static str] {
        REQUIRED
    }

    fn validate_definition(&self, def: &DataSourceDefinition) -> Result<()> {
        check_required(BACKEND, REQUIRED, def)?;
        parse_setting::<bool>(def, "use_ssl", true)?;
        Ok(())
    }

    async fn init_connection(&mut self, def: &DataSourceDefinition) -> Result<()> {
        self.validate_definition(def)?;
        kerberos::authenticate_if_configured(BACKEND, def).await?;

        let use_ssl = parse_setting::<bool>(def, "use_ssl", true)?;
        let endpoint = endpoint_url(def.required("endpoint")?, use_ssl);
        let region = def.setting("region").unwrap_or(DEFAULT_REGION).to_string();
        let credentials = Credentials::new(
            def.required("access_key_id")?,
            def.required("secret_access_key")?,
            None,
            None,
            "static",
        );

        let shared = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region))
            .credentials_provider(credentials)
            .endpoint_url(&endpoint)
            .load()
            .await;
        let config = aws_sdk_s3::config::Builder::from(&shared)
            .force_path_style(true)
            .build();
        let client = Client::from_conf(config);

        let bucket = def.required("bucket")?.to_string();
        client
            .head_bucket()
            .bucket(&bucket)
            .send()
            .await
            .map_err(|e| {
                AppError::connection(
                    BACKEND,
                    format!("bucket {} at {}: {}", bucket, endpoint, e.into_service_error()),
                )
            })?;

        log::debug!("S3 connector bound to s3://{} at {}", bucket, endpoint);
        self.client = Some(client);
        self.bucket = bucket;
        Ok(())
    }

    async fn close_connection(&mut self) {
        self.client = None;
    }
}
