//! HTTP fetching and the download cache.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use reqwest::header::REFERER;
use reqwest::StatusCode;
use serde_json::Value;
use tracing::{debug, trace};
use url::Url;

use bullion_core::models::FetchConfig;

/// Shared HTTP client with the configured User-Agent and timeouts.
#[derive(Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    timeout: Duration,
    download_timeout: Duration,
    delay: Duration,
}

impl HttpClient {
    pub fn new(config: &FetchConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .cookie_store(true)
            .build()?;

        Ok(Self {
            client,
            timeout: Duration::from_secs(config.timeout_secs),
            download_timeout: Duration::from_secs(config.download_timeout_secs),
            delay: Duration::from_millis(config.delay_ms),
        })
    }

    /// Override the per-request timeout for pages and feeds.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Polite pause between sequential requests.
    pub async fn pause(&self) {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }

    /// Fetch a page as text, failing on non-success status.
    pub async fn get_text(&self, url: &str) -> anyhow::Result<String> {
        Ok(self.get_page(url).await?.1)
    }

    /// Fetch a page, returning the URL it was served from after redirects.
    ///
    /// The body is decoded with the Content-Type charset, UTF-8 when absent.
    pub async fn get_page(&self, url: &str) -> anyhow::Result<(Url, String)> {
        trace!("GET {}", url);
        let response = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await?
            .error_for_status()?;
        let final_url = response.url().clone();
        Ok((final_url, response.text_with_charset("utf-8").await?))
    }

    /// Submit a urlencoded form, following redirects, and return the final page.
    pub async fn post_form(
        &self,
        url: &str,
        referer: &str,
        fields: &[(&str, &str)],
    ) -> anyhow::Result<(Url, String)> {
        trace!("POST {}", url);
        let response = self
            .client
            .post(url)
            .header(REFERER, referer)
            .form(fields)
            .timeout(self.timeout)
            .send()
            .await?
            .error_for_status()?;
        let final_url = response.url().clone();
        Ok((final_url, response.text_with_charset("utf-8").await?))
    }

    /// Fetch a document body, failing on non-success status.
    pub async fn get_bytes(&self, url: &str) -> anyhow::Result<Vec<u8>> {
        trace!("GET {}", url);
        let response = self
            .client
            .get(url)
            .timeout(self.download_timeout)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.bytes().await?.to_vec())
    }

    /// Fetch a JSON feed. Non-200 responses, empty bodies and invalid JSON are absent.
    pub async fn get_json_status(&self, url: &str, referer: Option<&str>) -> anyhow::Result<Option<Value>> {
        let mut request = self.client.get(url).timeout(self.timeout);
        if let Some(referer) = referer {
            request = request.header(REFERER, referer);
        }

        let response = request.send().await?;
        let status = response.status();
        if status != StatusCode::OK {
            debug!("{} -> HTTP {}", url, status);
            return Ok(None);
        }

        let body = response.text_with_charset("utf-8").await?;
        if body.trim().is_empty() {
            return Ok(None);
        }
        match serde_json::from_str(&body) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                debug!("{} is not JSON: {}", url, e);
                Ok(None)
            }
        }
    }

    /// Download `url` into `dir`, reusing a non-empty cached copy.
    pub async fn download_cached(&self, url: &str, dir: &Path) -> anyhow::Result<PathBuf> {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create cache directory {}", dir.display()))?;
        let target = dir.join(cache_file_name(url));

        if let Ok(metadata) = fs::metadata(&target) {
            if metadata.len() > 0 {
                debug!("Using cached {}", target.display());
                return Ok(target);
            }
        }

        let data = self.get_bytes(url).await?;

        // Never leave a partial PDF under the final name.
        let temp_path = target.with_extension("tmp");
        fs::write(&temp_path, &data)?;
        fs::rename(&temp_path, &target)?;

        debug!("Downloaded {} ({} bytes)", target.display(), data.len());
        Ok(target)
    }
}

/// Local file name for a downloaded document.
pub fn cache_file_name(url: &str) -> String {
    let basename = match Url::parse(url) {
        Ok(parsed) => parsed
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .unwrap_or("")
            .to_string(),
        Err(_) => url
            .split(['?', '#'])
            .next()
            .and_then(|path| path.rsplit('/').next())
            .unwrap_or("")
            .to_string(),
    };

    let mut name: String = basename
        .chars()
        .map(|c| match c {
            '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            other => other,
        })
        .collect();

    if name.is_empty() {
        return "report.pdf".to_string();
    }
    if !name.to_lowercase().ends_with(".pdf") {
        name.push_str(".pdf");
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_cache_file_name_keeps_basename() {
        assert_eq!(
            cache_file_name("https://www.sge.com.cn/upload/resources/file/2024/01/08/20240101-20240107.pdf"),
            "20240101-20240107.pdf"
        );
        assert_eq!(
            cache_file_name("https://en.sge.com.cn/upload/Data%20Highlights--March,%202018.PDF"),
            "Data%20Highlights--March,%202018.PDF"
        );
    }

    #[test]
    fn test_cache_file_name_appends_extension_and_drops_query() {
        assert_eq!(cache_file_name("https://example.com/files/report?id=3"), "report.pdf");
        assert_eq!(cache_file_name("https://example.com/"), "report.pdf");
        assert_eq!(cache_file_name("https://example.com"), "report.pdf");
    }

    #[test]
    fn test_cache_file_name_replaces_unsafe_characters() {
        assert_eq!(cache_file_name("https://example.com/a:b*c|d.pdf"), "a_b_c_d.pdf");
        assert_eq!(cache_file_name("relative/a\"b.pdf?x=1"), "a_b.pdf");
    }

    #[tokio::test]
    async fn test_download_cached_reuses_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let cached = dir.path().join("weekly.pdf");
        fs::write(&cached, b"%PDF-1.5").unwrap();

        let http = HttpClient::new(&FetchConfig::default()).unwrap();
        // Never contacted: the cached copy is returned first.
        let path = http
            .download_cached("http://127.0.0.1:9/files/weekly.pdf", dir.path())
            .await
            .unwrap();

        assert_eq!(path, cached);
    }

    #[tokio::test]
    async fn test_get_text_honors_declared_charset() {
        let mut server = mockito::Server::new_async().await;
        // 白银 in GBK
        let mock = server
            .mock("GET", "/list.html")
            .with_header("content-type", "text/html; charset=gbk")
            .with_body([0xB0u8, 0xD7, 0xD2, 0xF8])
            .create_async()
            .await;

        let http = HttpClient::new(&FetchConfig::default()).unwrap();
        let text = http.get_text(&format!("{}/list.html", server.url())).await.unwrap();

        assert_eq!(text, "白银");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_get_text_defaults_to_utf8() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/list.html")
            .with_header("content-type", "text/html")
            .with_body("周报 – 白银")
            .create_async()
            .await;

        let http = HttpClient::new(&FetchConfig::default()).unwrap();
        let text = http.get_text(&format!("{}/list.html", server.url())).await.unwrap();

        assert_eq!(text, "周报 – 白银");
    }

    #[tokio::test]
    async fn test_post_form_keeps_session_cookie() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/accept")
            .match_header("referer", "https://example.com/terms")
            .match_body(mockito::Matcher::UrlEncoded("accept_terms".into(), "1".into()))
            .with_header("set-cookie", "session=agreed; Path=/")
            .with_body("ok")
            .create_async()
            .await;
        let page = server
            .mock("GET", "/data")
            .match_header("cookie", "session=agreed")
            .with_body("tables")
            .create_async()
            .await;

        let http = HttpClient::new(&FetchConfig::default()).unwrap();
        let (_, body) = http
            .post_form(
                &format!("{}/accept", server.url()),
                "https://example.com/terms",
                &[("accept_terms", "1")],
            )
            .await
            .unwrap();
        assert_eq!(body, "ok");

        let text = http.get_text(&format!("{}/data", server.url())).await.unwrap();
        assert_eq!(text, "tables");
        page.assert_async().await;
    }
}
