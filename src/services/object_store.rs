//! Crawler for S3-compatible object storage.
//!
//! Keys under the root prefix are listed page by page; matching objects are
//! then fetched with bounded concurrency and parsed as manifests.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use glob::Pattern;
use tokio_util::sync::CancellationToken;

use crate::connectors::Connector;
use crate::error::{ErrorKind, Result};
use crate::models::{CrawlScope, Discovery, parse_manifest};
use crate::services::Crawler;

const FETCH_CONCURRENCY: usize = 8;

/// Object operations a bucket must answer.
#[async_trait]
pub trait ObjectStoreClient: Send + Sync {
    /// Every key under `prefix`, across all listing pages.
    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>>;

    /// Body of one object. A problem with the object itself is an entry
    /// error; losing the store is a connection error.
    async fn fetch(&self, key: &str) -> Result<Vec<u8>>;

    /// Bucket name shown in logs.
    fn bucket(&self) -> &str;
}

/// Walks objects under a prefix of one bucket.
pub struct ObjectStoreCrawler<C> {
    client: C,
}

/// Keys that are leaf objects whose base name matches the filter.
///
/// Keys ending in `/` are prefix markers, not objects.
pub fn select_keys<'a>(keys: impl IntoIterator<Item = &'a str>, matcher: &Pattern) -> Vec<String> {
    keys.into_iter()
        .filter(|key| !key.is_empty() && !key.ends_with('/'))
        .filter(|key| matcher.matches(key.rsplit('/').next().unwrap_or(key)))
        .map(str::to_string)
        .collect()
}

fn prefix_for(scope: &CrawlScope) -> String {
    let levels = scope.levels();
    if levels.is_empty() {
        String::new()
    } else {
        format!("{}/", levels.join("/"))
    }
}

impl<C> ObjectStoreCrawler<C>
where
    C: ObjectStoreClient + Connector,
{
    /// Wrap a client whose connection is already open.
    pub fn new(client: C) -> Self {
        Self { client }
    }
}

#[async_trait]
impl<C> Crawler for ObjectStoreCrawler<C>
where
    C: ObjectStoreClient + Connector,
{
    fn backend(&self) -> &'static str {
        self.client.backend()
    }

    async fn walk_with_filter(
        &self,
        root: &str,
        filter: &str,
        shutdown: &CancellationToken,
    ) -> Result<Discovery> {
        let scope = CrawlScope::new(root, filter);
        let matcher = scope.matcher()?;
        let prefix = prefix_for(&scope);

        let listed = self.client.list_keys(&prefix).await?;
        let keys = select_keys(listed.iter().map(String::as_str), &matcher);
        log::debug!(
            "Found {} candidate objects under s3://{}/{}",
            keys.len(),
            self.client.bucket(),
            prefix
        );

        let client = &self.client;
        let mut discovery = Discovery::default();
        let mut fetches = stream::iter(keys)
            .map(|key| async move {
                let result = client.fetch(&key).await;
                (key, result)
            })
            .buffered(FETCH_CONCURRENCY);

        loop {
            if shutdown.is_cancelled() {
                discovery.interrupted = true;
                break;
            }
            let Some((key, result)) = fetches.next().await else {
                break;
            };

            match result.and_then(|bytes| parse_manifest(&key, &bytes)) {
                Ok(asset) => discovery.assets.push(asset),
                Err(err) if err.kind() == ErrorKind::Connection => return Err(err),
                Err(err) => {
                    log::warn!("Skipping s3://{}/{}: {}", self.client.bucket(), key, err);
                    discovery.errors.push(err.into());
                }
            }
        }

        Ok(discovery)
    }

    async fn close(&mut self) {
        self.client.close_connection().await;
    }
}

#[cfg(feature = "s3")]
mod s3 {
    use std::fmt;

    use aws_sdk_s3::error::SdkError;

    use super::*;
    use crate::connectors::S3Connector;
    use crate::connectors::s3::BACKEND;
    use crate::error::AppError;
    use crate::models::DataSourceDefinition;

    /// Service errors concern the object itself (gone, forbidden) and skip
    /// it. Transport and timeout errors mean the store is unreachable.
    pub(super) fn fetch_error<E: fmt::Display, R>(key: &str, err: SdkError<E, R>) -> AppError
    where
        SdkError<E, R>: fmt::Display,
    {
        match err {
            SdkError::ServiceError(err) => AppError::entry_parse(key, err.into_err()),
            other => AppError::connection(BACKEND, other),
        }
    }

    #[async_trait]
    impl ObjectStoreClient for S3Connector {
        async fn list_keys(&self, prefix: &str) -> Result<Vec<String>> {
            let client = self.client()?;
            let mut keys = Vec::new();
            let mut token: Option<String> = None;

            loop {
                let page = client
                    .list_objects_v2()
                    .bucket(S3Connector::bucket(self))
                    .prefix(prefix)
                    .set_continuation_token(token.take())
                    .send()
                    .await
                    .map_err(|e| AppError::connection(BACKEND, e.into_service_error()))?;

                keys.extend(
                    page.contents()
                        .iter()
                        .filter_map(|o| o.key())
                        .map(str::to_string),
                );

                match (page.is_truncated(), page.next_continuation_token()) {
                    (Some(true), Some(next)) => token = Some(next.to_string()),
                    _ => break,
                }
            }

            Ok(keys)
        }

        async fn fetch(&self, key: &str) -> Result<Vec<u8>> {
            let output = self
                .client()?
                .get_object()
                .bucket(S3Connector::bucket(self))
                .key(key)
                .send()
                .await
                .map_err(|e| fetch_error(key, e))?;

            let bytes = output
                .body
                .collect()
                .await
                .map_err(|e| AppError::connection(BACKEND, e))?;
            Ok(bytes.into_bytes().to_vec())
        }

        fn bucket(&self) -> &str {
            S3Connector::bucket(self)
        }
    }

    impl ObjectStoreCrawler<S3Connector> {
        pub async fn connect(def: &DataSourceDefinition) -> Result<Self> {
            let mut connector = S3Connector::new();
            connector.init_connection(def).await?;
            Ok(Self::new(connector))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::models::DataSourceDefinition;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[test]
    fn test_select_keys_skips_prefix_markers() {
        let matcher = Pattern::new("MANIFEST.yaml").unwrap();
        let keys = [
            "landing/",
            "landing/orders/",
            "landing/orders/MANIFEST.yaml",
            "landing/orders/part-0000.parquet",
            "landing/MANIFEST.yaml",
            "MANIFEST.yaml",
        ];
        assert_eq!(
            select_keys(keys, &matcher),
            vec![
                "landing/orders/MANIFEST.yaml",
                "landing/MANIFEST.yaml",
                "MANIFEST.yaml"
            ]
        );
    }

    #[test]
    fn test_select_keys_matches_base_name_only() {
        let matcher = Pattern::new("*.yaml").unwrap();
        let keys = ["cfg.yaml/data.bin", "a/b.yaml"];
        assert_eq!(select_keys(keys, &matcher), vec!["a/b.yaml"]);
    }

    #[test]
    fn test_prefix_for_root() {
        assert_eq!(prefix_for(&CrawlScope::new("", "*")), "");
        assert_eq!(prefix_for(&CrawlScope::new("/landing/orders", "*")), "landing/orders/");
    }

    enum Object {
        Body(&'static str),
        /// The store refuses this one object
        Refused,
        /// The store drops the connection while serving it
        Lost,
    }

    /// In-memory bucket: key -> object.
    #[derive(Default)]
    struct FakeBucket {
        objects: BTreeMap<String, Object>,
        listing_fails: bool,
        fetched: AtomicUsize,
        closed: AtomicBool,
    }

    impl FakeBucket {
        fn with(mut self, key: &str, object: Object) -> Self {
            self.objects.insert(key.to_string(), object);
            self
        }
    }

    #[async_trait]
    impl ObjectStoreClient for FakeBucket {
        async fn list_keys(&self, prefix: &str) -> Result<Vec<String>> {
            if self.listing_fails {
                return Err(AppError::connection("fake", "bucket unreachable"));
            }
            Ok(self
                .objects
                .keys()
                .filter(|k| k.starts_with(prefix))
                .cloned()
                .collect())
        }

        async fn fetch(&self, key: &str) -> Result<Vec<u8>> {
            self.fetched.fetch_add(1, Ordering::SeqCst);
            match self.objects.get(key) {
                Some(Object::Body(body)) => Ok(body.as_bytes().to_vec()),
                Some(Object::Refused) => Err(AppError::entry_parse(key, "AccessDenied")),
                Some(Object::Lost) => Err(AppError::connection("fake", "connection reset")),
                None => Err(AppError::entry_parse(key, "NoSuchKey")),
            }
        }

        fn bucket(&self) -> &str {
            "datalake"
        }
    }

    #[async_trait]
    impl Connector for FakeBucket {
        fn backend(&self) -> &'static str {
            "fake"
        }

        fn required_settings(&self) -> &'static [&'static str] {
            &[]
        }

        async fn init_connection(&mut self, _def: &DataSourceDefinition) -> Result<()> {
            Ok(())
        }

        async fn close_connection(&mut self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    fn datasets() -> FakeBucket {
        FakeBucket::default()
            .with("datasets/", Object::Body(""))
            .with("datasets/orders/MANIFEST.yaml", Object::Body("name: orders\n"))
            .with("datasets/orders/part-0.parquet", Object::Body("PAR1"))
            .with("datasets/users/MANIFEST.yaml", Object::Body("name: users\n"))
            .with("datasets/events/MANIFEST.yaml", Object::Body("name: events\n"))
            .with("datasets/broken/MANIFEST.yaml", Object::Body("name: [unclosed\n"))
            .with("datasets/locked/MANIFEST.yaml", Object::Refused)
            .with("other/MANIFEST.yaml", Object::Body("name: elsewhere\n"))
    }

    async fn walk(bucket: FakeBucket, shutdown: &CancellationToken) -> Result<Discovery> {
        ObjectStoreCrawler::new(bucket)
            .walk_with_filter("datasets", "MANIFEST.yaml", shutdown)
            .await
    }

    #[tokio::test]
    async fn test_bad_objects_are_skipped_and_reported() {
        let discovery = walk(datasets(), &CancellationToken::new()).await.unwrap();

        let mut names: Vec<_> = discovery.assets.iter().map(|a| a.name.as_str()).collect();
        names.sort();
        assert_eq!(names, vec!["events", "orders", "users"]);

        let mut locations: Vec<_> = discovery.errors.iter().map(|e| e.location.as_str()).collect();
        locations.sort();
        assert_eq!(
            locations,
            vec!["datasets/broken/MANIFEST.yaml", "datasets/locked/MANIFEST.yaml"]
        );
        assert!(!discovery.interrupted);
    }

    #[tokio::test]
    async fn test_lost_connection_aborts_walk() {
        let bucket = datasets().with("datasets/zeta/MANIFEST.yaml", Object::Lost);
        let err = walk(bucket, &CancellationToken::new()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Connection);
    }

    #[tokio::test]
    async fn test_failed_listing_aborts_walk() {
        let mut bucket = datasets();
        bucket.listing_fails = true;
        let err = walk(bucket, &CancellationToken::new()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Connection);
    }

    #[tokio::test]
    async fn test_shutdown_marks_walk_interrupted() {
        let shutdown = CancellationToken::new();
        shutdown.cancel();
        let discovery = walk(datasets(), &shutdown).await.unwrap();
        assert!(discovery.interrupted);
        assert!(discovery.assets.is_empty());
    }

    #[tokio::test]
    async fn test_close_closes_connector() {
        let mut crawler = ObjectStoreCrawler::new(FakeBucket::default());
        crawler.close().await;
        assert!(crawler.client.closed.load(Ordering::SeqCst));
        assert_eq!(crawler.client.fetched.load(Ordering::SeqCst), 0);
    }

    #[cfg(feature = "s3")]
    #[test]
    fn test_service_error_skips_object_other_errors_abort() {
        use aws_sdk_s3::error::SdkError;
        use aws_sdk_s3::operation::get_object::GetObjectError;
        use aws_sdk_s3::types::error::NoSuchKey;

        let missing: SdkError<GetObjectError, ()> =
            SdkError::service_error(GetObjectError::NoSuchKey(NoSuchKey::builder().build()), ());
        let err = s3::fetch_error("datasets/gone/MANIFEST.yaml", missing);
        assert_eq!(err.kind(), ErrorKind::EntryParse);

        let timeout: SdkError<GetObjectError, ()> = SdkError::timeout_error("read timed out");
        assert_eq!(
            s3::fetch_error("datasets/slow/MANIFEST.yaml", timeout).kind(),
            ErrorKind::Connection
        );
    }
}
