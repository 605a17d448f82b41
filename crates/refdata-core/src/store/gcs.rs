//! Google Cloud Storage through its JSON API.

use std::fs::File;
use std::io;
use std::path::Path;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, info};
use url::Url;

use super::{join_remote, BlobLookup, BlobMetadata, BlobStore, StoreConfig};

const USER_AGENT: &str = concat!("refdata/", env!("CARGO_PKG_VERSION"));
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct GcsBlobStore {
    client: Client,
    endpoint: Url,
    bucket: String,
    object_prefix: String,
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObjectResource {
    size: String,
    md5_hash: Option<String>,
}

impl GcsBlobStore {
    /// `prefix` has the form `gs://bucket/optional/dir/`.
    pub fn new(prefix: &str, config: &StoreConfig) -> Result<Self> {
        let url = Url::parse(prefix).with_context(|| format!("invalid remote prefix {prefix}"))?;
        if url.scheme() != "gs" {
            bail!("remote prefix {prefix} is not a gs:// location");
        }
        let bucket = url
            .host_str()
            .filter(|host| !host.is_empty())
            .ok_or_else(|| anyhow!("remote prefix {prefix} does not name a bucket"))?
            .to_string();
        let object_prefix = url.path().trim_matches('/').to_string();
        let endpoint = Url::parse(&config.gcs_endpoint)
            .with_context(|| format!("invalid storage endpoint {}", config.gcs_endpoint))?;
        Ok(Self {
            client: http_client()?,
            endpoint,
            bucket,
            object_prefix,
            token: config.gcs_token.clone(),
        })
    }

    fn object_name(&self, relative_path: &str) -> String {
        join_remote(&self.object_prefix, relative_path)
    }

    /// `{endpoint}/storage/v1/b/{bucket}/o/{object}` with the object name
    /// encoded as a single path segment.
    fn object_url(&self, relative_path: &str) -> Result<Url> {
        let object = self.object_name(relative_path);
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|()| anyhow!("storage endpoint {} can not be a base", self.endpoint))?
            .pop_if_empty()
            .extend(["storage", "v1", "b", self.bucket.as_str(), "o", object.as_str()]);
        Ok(url)
    }

    fn upload_url(&self, relative_path: &str) -> Result<Url> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|()| anyhow!("storage endpoint {} can not be a base", self.endpoint))?
            .pop_if_empty()
            .extend(["upload", "storage", "v1", "b", self.bucket.as_str(), "o"]);
        url.query_pairs_mut()
            .append_pair("uploadType", "media")
            .append_pair("name", &self.object_name(relative_path));
        Ok(url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    fn send(&self, request: RequestBuilder, relative_path: &str) -> Result<Response> {
        self.authorize(request)
            .send()
            .with_context(|| format!("request for {} failed", self.location(relative_path)))
    }
}

impl BlobStore for GcsBlobStore {
    fn location(&self, relative_path: &str) -> String {
        format!("gs://{}/{}", self.bucket, self.object_name(relative_path))
    }

    fn metadata(&self, relative_path: &str) -> Result<BlobLookup> {
        let url = self.object_url(relative_path)?;
        let response = self.send(self.client.get(url), relative_path)?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(BlobLookup::NotFound);
        }
        let resource: ObjectResource = response
            .error_for_status()
            .with_context(|| {
                format!("metadata lookup failed for {}", self.location(relative_path))
            })?
            .json()
            .with_context(|| format!("invalid metadata for {}", self.location(relative_path)))?;
        let size = resource.size.parse::<u64>().with_context(|| {
            format!(
                "invalid size '{}' for {}",
                resource.size,
                self.location(relative_path)
            )
        })?;
        debug!(location = %self.location(relative_path), size, "fetched object metadata");
        Ok(BlobLookup::Found(BlobMetadata {
            md5sum: resource.md5_hash,
            size,
        }))
    }

    fn upload(&self, relative_path: &str, local_file: &Path) -> Result<()> {
        let url = self.upload_url(relative_path)?;
        let file = File::open(local_file)
            .with_context(|| format!("failed to open {}", local_file.display()))?;
        info!(
            source = %local_file.display(),
            location = %self.location(relative_path),
            "uploading"
        );
        let request = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(file);
        self.send(request, relative_path)?
            .error_for_status()
            .with_context(|| format!("upload failed for {}", self.location(relative_path)))?;
        Ok(())
    }

    fn download(&self, relative_path: &str, dest: &Path) -> Result<()> {
        let mut url = self.object_url(relative_path)?;
        url.query_pairs_mut().append_pair("alt", "media");
        let mut response = self
            .send(self.client.get(url), relative_path)?
            .error_for_status()
            .with_context(|| format!("download failed for {}", self.location(relative_path)))?;
        let mut file =
            File::create(dest).with_context(|| format!("failed to create {}", dest.display()))?;
        io::copy(&mut response, &mut file)
            .with_context(|| format!("failed to write {}", dest.display()))?;
        file.sync_all()
            .with_context(|| format!("failed to flush {}", dest.display()))?;
        Ok(())
    }

    fn delete(&self, relative_path: &str) -> Result<()> {
        let url = self.object_url(relative_path)?;
        self.send(self.client.delete(url), relative_path)?
            .error_for_status()
            .with_context(|| format!("delete failed for {}", self.location(relative_path)))?;
        Ok(())
    }
}

fn http_client() -> Result<Client> {
    // Reference files can be large, so only the connect phase is bounded.
    Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(None)
        .build()
        .context("failed to build http client")
}

#[cfg(test)]
mod tests {
    use super::*;
    use httptest::{matchers::*, responders::*, Expectation, Server};
    use std::fs;
    use std::panic;
    use tempfile::tempdir;

    fn store_for(server: &Server) -> Result<GcsBlobStore> {
        let config = StoreConfig {
            gcs_endpoint: server.url_str("/"),
            gcs_token: Some("secret-token".into()),
        };
        GcsBlobStore::new("gs://balrog/reference-data/", &config)
    }

    fn start_server() -> Option<Server> {
        match panic::catch_unwind(Server::run) {
            Ok(server) => Some(server),
            Err(_) => {
                eprintln!("skipping gcs test (httptest server unavailable)");
                None
            }
        }
    }

    #[test]
    fn object_names_are_a_single_encoded_segment() -> Result<()> {
        let store = GcsBlobStore::new("gs://balrog/reference-data", &StoreConfig::default())?;
        let url = store.object_url("grch38/eight_As.fa")?;
        assert_eq!(
            url.as_str(),
            "https://storage.googleapis.com/storage/v1/b/balrog/o/reference-data%2Fgrch38%2Feight_As.fa"
        );
        assert_eq!(
            store.location("grch38/eight_As.fa"),
            "gs://balrog/reference-data/grch38/eight_As.fa"
        );
        Ok(())
    }

    #[test]
    fn missing_object_is_not_found() -> Result<()> {
        let Some(server) = start_server() else {
            return Ok(());
        };
        server.expect(
            Expectation::matching(all_of![
                request::method_path(
                    "GET",
                    "/storage/v1/b/balrog/o/reference-data%2Fmissing.fa"
                ),
                request::headers(contains(("authorization", "Bearer secret-token"))),
            ])
            .respond_with(status_code(404)),
        );
        let store = store_for(&server)?;
        assert_eq!(store.metadata("missing.fa")?, BlobLookup::NotFound);
        Ok(())
    }

    #[test]
    fn metadata_reads_size_and_md5() -> Result<()> {
        let Some(server) = start_server() else {
            return Ok(());
        };
        server.expect(
            Expectation::matching(request::method_path(
                "GET",
                "/storage/v1/b/balrog/o/reference-data%2Feight_As.fa",
            ))
            .respond_with(json_encoded(serde_json::json!({
                "name": "reference-data/eight_As.fa",
                "size": "8",
                "md5Hash": "d2HoSgsZLMYwSzP8/nY4Ag==",
            }))),
        );
        let store = store_for(&server)?;
        assert_eq!(
            store.metadata("eight_As.fa")?,
            BlobLookup::Found(BlobMetadata {
                md5sum: Some("d2HoSgsZLMYwSzP8/nY4Ag==".into()),
                size: 8,
            })
        );
        Ok(())
    }

    #[test]
    fn upload_posts_media_with_object_name() -> Result<()> {
        let Some(server) = start_server() else {
            return Ok(());
        };
        server.expect(
            Expectation::matching(all_of![
                request::method_path("POST", "/upload/storage/v1/b/balrog/o"),
                request::query(url_decoded(contains(("uploadType", "media")))),
                request::query(url_decoded(contains((
                    "name",
                    "reference-data/eight_As.fa"
                )))),
                request::body(matches("^AAAAAAAA$")),
            ])
            .respond_with(status_code(200).body("{}")),
        );
        let tmp = tempdir()?;
        let source = tmp.path().join("eight_As.fa");
        fs::write(&source, b"AAAAAAAA")?;
        store_for(&server)?.upload("eight_As.fa", &source)?;
        Ok(())
    }

    #[test]
    fn download_writes_media_to_destination() -> Result<()> {
        let Some(server) = start_server() else {
            return Ok(());
        };
        server.expect(
            Expectation::matching(all_of![
                request::method_path(
                    "GET",
                    "/storage/v1/b/balrog/o/reference-data%2Feight_As.fa"
                ),
                request::query(url_decoded(contains(("alt", "media")))),
            ])
            .respond_with(status_code(200).body("AAAAAAAA")),
        );
        let tmp = tempdir()?;
        let dest = tmp.path().join("eight_As.fa");
        store_for(&server)?.download("eight_As.fa", &dest)?;
        assert_eq!(fs::read(&dest)?, b"AAAAAAAA");
        Ok(())
    }

    #[test]
    fn server_errors_surface_with_location() -> Result<()> {
        let Some(server) = start_server() else {
            return Ok(());
        };
        server.expect(
            Expectation::matching(request::method("GET")).respond_with(status_code(403)),
        );
        let err = store_for(&server)?.metadata("eight_As.fa").unwrap_err();
        assert!(
            format!("{err:#}").contains("gs://balrog/reference-data/eight_As.fa"),
            "{err:#}"
        );
        Ok(())
    }
}
