//! Source acquisition.
//!
//! The [`SourceFetcher`] downloads the declared sources of a job into its
//! workspace. Locators with an unsupported scheme are skipped, supported ones
//! are streamed to disk concurrently while preserving declared order.

use std::path::{Path, PathBuf};

use futures::stream::{self, StreamExt};
use mf_core::config::FetchConfig;
use mf_core::{Error, Result};
use reqwest::{Client, Url};
use tokio::io::AsyncWriteExt;

/// Extension used when a locator's path does not carry a usable one.
const DEFAULT_INPUT_EXTENSION: &str = "mp4";

/// What a fetch pass produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchReport {
    /// Fetched files, in declared source order.
    pub inputs: Vec<PathBuf>,
    /// Locators that were skipped because their scheme is not supported.
    pub skipped: Vec<String>,
}

/// One source scheduled for download.
struct Planned {
    locator: String,
    url: Url,
    dest: PathBuf,
}

/// Downloads job sources over HTTP(S).
#[derive(Debug, Clone)]
pub struct SourceFetcher {
    client: Client,
    allowed_schemes: Vec<String>,
    max_concurrent: usize,
}

impl SourceFetcher {
    pub fn new(config: &FetchConfig) -> Self {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Failed to build fetch HTTP client: {e}");
                Client::new()
            });

        Self {
            client,
            allowed_schemes: config
                .allowed_schemes
                .iter()
                .map(|s| s.to_ascii_lowercase())
                .collect(),
            max_concurrent: config.max_concurrent.max(1),
        }
    }

    /// Download every supported source into `dir`.
    ///
    /// The i-th declared source lands at `input_<i>.<ext>`. All downloads are
    /// allowed to finish before the result is decided.
    ///
    /// # Errors
    ///
    /// - [`Error::Fetch`] for the first supported source (in declared order)
    ///   that could not be downloaded.
    /// - [`Error::NoValidInputs`] when no source was fetched.
    pub async fn fetch_all(&self, dir: &Path, sources: &[String]) -> Result<FetchReport> {
        let mut report = FetchReport::default();
        let mut planned = Vec::new();

        for (index, locator) in sources.iter().enumerate() {
            match self.classify(locator) {
                Some(url) => {
                    let dest = dir.join(format!("input_{index}.{}", input_extension(&url)));
                    planned.push(Planned {
                        locator: locator.clone(),
                        url,
                        dest,
                    });
                }
                None => {
                    tracing::warn!(source = %locator, "Skipping unsupported source");
                    report.skipped.push(locator.clone());
                }
            }
        }

        let results: Vec<(Planned, Result<()>)> = stream::iter(planned)
            .map(|p| async move {
                let result = self.fetch_one(&p).await;
                (p, result)
            })
            .buffered(self.max_concurrent)
            .collect()
            .await;

        let mut first_error = None;
        for (p, result) in results {
            match result {
                Ok(()) => report.inputs.push(p.dest),
                Err(e) => {
                    tracing::warn!(source = %p.locator, error = %e, "Source download failed");
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }

        if let Some(e) = first_error {
            return Err(e);
        }
        if report.inputs.is_empty() {
            return Err(Error::NoValidInputs);
        }

        tracing::info!(
            fetched = report.inputs.len(),
            skipped = report.skipped.len(),
            "Sources fetched"
        );
        Ok(report)
    }

    /// Parse `locator` and return it if its scheme is supported.
    fn classify(&self, locator: &str) -> Option<Url> {
        let url = Url::parse(locator.trim()).ok()?;
        self.allowed_schemes
            .iter()
            .any(|s| s == url.scheme())
            .then_some(url)
    }

    async fn fetch_one(&self, p: &Planned) -> Result<()> {
        let result = self.stream_to_file(p).await;
        if result.is_err() {
            if let Err(e) = tokio::fs::remove_file(&p.dest).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(
                        file = %p.dest.display(),
                        error = %e,
                        "Failed to remove partial download"
                    );
                }
            }
        }
        result
    }

    async fn stream_to_file(&self, p: &Planned) -> Result<()> {
        tracing::debug!(source = %p.locator, dest = %p.dest.display(), "Downloading source");

        let mut resp = self
            .client
            .get(p.url.clone())
            .send()
            .await
            .map_err(|e| Error::fetch(&p.locator, e))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(Error::fetch(&p.locator, format!("HTTP status {status}")));
        }

        // `File::create` truncates whatever a previous attempt left behind.
        let mut file = tokio::fs::File::create(&p.dest).await?;
        while let Some(chunk) = resp.chunk().await.map_err(|e| Error::fetch(&p.locator, e))? {
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        Ok(())
    }
}

/// Extension for a downloaded source, taken from the last path segment.
fn input_extension(url: &Url) -> String {
    url.path_segments()
        .and_then(|segments| segments.last())
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .filter(|ext| {
            !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric())
        })
        .map(str::to_ascii_lowercase)
        .unwrap_or_else(|| DEFAULT_INPUT_EXTENSION.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher() -> SourceFetcher {
        SourceFetcher::new(&FetchConfig::default())
    }

    async fn serve(server: &MockServer, at: &str, body: &[u8]) {
        Mock::given(method("GET"))
            .and(path(at))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body.to_vec()))
            .mount(server)
            .await;
    }

    #[test]
    fn extension_from_locator() {
        let ext = |s: &str| input_extension(&Url::parse(s).unwrap());
        assert_eq!(ext("http://h/clip.MOV"), "mov");
        assert_eq!(ext("http://h/photo.jpeg?x=1"), "jpeg");
        assert_eq!(ext("http://h/download"), "mp4");
        assert_eq!(ext("http://h/"), "mp4");
        assert_eq!(ext("http://h/weird.ext-with-dash"), "mp4");
    }

    #[tokio::test]
    async fn fetches_in_declared_order() {
        let server = MockServer::start().await;
        serve(&server, "/a.mp4", b"AAA").await;
        serve(&server, "/b.mp4", b"BBB").await;
        let dir = tempfile::tempdir().unwrap();

        let sources = vec![
            format!("{}/b.mp4", server.uri()),
            format!("{}/a.mp4", server.uri()),
        ];
        let report = fetcher().fetch_all(dir.path(), &sources).await.unwrap();

        assert_eq!(
            report.inputs,
            vec![dir.path().join("input_0.mp4"), dir.path().join("input_1.mp4")]
        );
        assert_eq!(std::fs::read(&report.inputs[0]).unwrap(), b"BBB");
        assert_eq!(std::fs::read(&report.inputs[1]).unwrap(), b"AAA");
    }

    #[tokio::test]
    async fn unsupported_sources_are_skipped() {
        let server = MockServer::start().await;
        serve(&server, "/a.png", b"PNG").await;
        let dir = tempfile::tempdir().unwrap();

        let sources = vec![
            "ftp://files.local/a.mp4".to_string(),
            format!("{}/a.png", server.uri()),
            "/etc/passwd".to_string(),
        ];
        let report = fetcher().fetch_all(dir.path(), &sources).await.unwrap();

        assert_eq!(report.inputs, vec![dir.path().join("input_1.png")]);
        assert_eq!(report.skipped, vec!["ftp://files.local/a.mp4", "/etc/passwd"]);
    }

    #[tokio::test]
    async fn all_unsupported_is_no_valid_inputs() {
        let dir = tempfile::tempdir().unwrap();
        let sources = vec!["s3://bucket/a.mp4".to_string(), "not a url".to_string()];
        let err = fetcher().fetch_all(dir.path(), &sources).await.unwrap_err();
        assert_matches!(err, Error::NoValidInputs);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn http_error_is_fetch_error_and_leaves_no_partial() {
        let server = MockServer::start().await;
        serve(&server, "/ok.mp4", b"OK").await;
        Mock::given(method("GET"))
            .and(path("/missing.mp4"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        let dir = tempfile::tempdir().unwrap();

        let missing = format!("{}/missing.mp4", server.uri());
        let sources = vec![format!("{}/ok.mp4", server.uri()), missing.clone()];
        let err = fetcher().fetch_all(dir.path(), &sources).await.unwrap_err();

        assert_matches!(err, Error::Fetch { ref locator, .. } if *locator == missing);
        assert!(err.to_string().contains("404"));
        assert!(!dir.path().join("input_1.mp4").exists());
    }

    #[tokio::test]
    async fn refetch_truncates_previous_attempt() {
        let server = MockServer::start().await;
        serve(&server, "/a.mp4", b"new").await;
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("input_0.mp4"), b"stale leftover bytes").unwrap();

        let sources = vec![format!("{}/a.mp4", server.uri())];
        let report = fetcher().fetch_all(dir.path(), &sources).await.unwrap();
        assert_eq!(std::fs::read(&report.inputs[0]).unwrap(), b"new");
    }

    #[tokio::test]
    async fn custom_scheme_list_is_honoured() {
        let server = MockServer::start().await;
        serve(&server, "/a.mp4", b"A").await;
        let dir = tempfile::tempdir().unwrap();
        let cfg = FetchConfig {
            allowed_schemes: vec!["https".into()],
            ..FetchConfig::default()
        };

        let sources = vec![format!("{}/a.mp4", server.uri())];
        let err = SourceFetcher::new(&cfg)
            .fetch_all(dir.path(), &sources)
            .await
            .unwrap_err();
        assert_matches!(err, Error::NoValidInputs);
    }
}
