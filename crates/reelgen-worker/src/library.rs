//! Stock-footage library acquisition.
//!
//! One search per segment, a random sample of the ranked results, then a
//! greedy trim that drops last-ranked candidates while the rest still cover
//! the budget. Survivors are downloaded in rank order.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use reqwest::header::COOKIE;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use reelgen_models::{ClipCandidate, ClipFile, ClipKey, TimeBudget};

use crate::config::LibraryConfig;
use crate::error::{PipelineError, PipelineResult};

/// Minimum page size asked of the library, so sampling has a pool to draw from.
pub const MIN_REQUESTED_RESULTS: usize = 10;

/// One library candidate is requested per this many budget seconds.
pub const SECONDS_PER_RESULT: f64 = 5.0;

/// Per-candidate duration window passed to the search, in seconds.
pub const MIN_CANDIDATE_SECONDS: u32 = 5;
pub const MAX_CANDIDATE_SECONDS: u32 = 60;

const SEARCH_PATH: &str = "/api/video/search";

/// Search-and-download capability of a stock-footage library.
#[async_trait]
pub trait LibrarySource: Send + Sync {
    /// Ranked candidates for `query`, asking for `requested` results.
    async fn search(&self, query: &str, requested: usize) -> PipelineResult<Vec<ClipCandidate>>;

    /// Fetch `candidate` to `dest`.
    async fn download(&self, candidate: &ClipCandidate, dest: &Path) -> PipelineResult<()>;
}

/// Load a browser cookie export (`[{"name": .., "value": ..}, ..]`).
pub async fn load_cookies(path: impl AsRef<Path>) -> PipelineResult<BTreeMap<String, String>> {
    #[derive(Deserialize)]
    struct CookieEntry {
        name: String,
        value: String,
    }

    let path = path.as_ref();
    let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
        PipelineError::config_error(format!("cannot read cookies {}: {}", path.display(), e))
    })?;
    let entries: Vec<CookieEntry> = serde_json::from_str(&raw)?;

    Ok(entries.into_iter().map(|c| (c.name, c.value)).collect())
}

fn cookie_header(cookies: &BTreeMap<String, String>) -> String {
    cookies
        .iter()
        .map(|(name, value)| format!("{}={}", name, value))
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    data: SearchData,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchData {
    #[serde(default)]
    stock_items: Vec<StockItemEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StockItemEntry {
    stock_item: StockItem,
    #[serde(default)]
    stock_item_formats: Vec<StockItemFormat>,
}

#[derive(Debug, Deserialize)]
struct StockItem {
    #[serde(default)]
    title: String,
    duration: RawDuration,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StockItemFormat {
    download_url: String,
}

/// The API reports durations as numbers or numeric strings.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawDuration {
    Int(u64),
    Float(f64),
    Text(String),
}

impl RawDuration {
    fn whole_seconds(&self) -> Option<u32> {
        let secs = match self {
            RawDuration::Int(v) => *v as f64,
            RawDuration::Float(v) => *v,
            RawDuration::Text(s) => s.trim().parse::<f64>().ok()?,
        };
        (secs.is_finite() && secs >= 0.0).then(|| secs.trunc() as u32)
    }
}

/// HTTP client for the stock-footage library.
pub struct StockLibraryClient {
    http: Client,
    base_url: String,
    cookie_header: String,
}

impl StockLibraryClient {
    pub fn new(
        config: &LibraryConfig,
        timeout: Duration,
        cookies: &BTreeMap<String, String>,
    ) -> PipelineResult<Self> {
        let http = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            cookie_header: cookie_header(cookies),
        })
    }

    fn with_cookies(&self, request: RequestBuilder) -> RequestBuilder {
        if self.cookie_header.is_empty() {
            request
        } else {
            request.header(COOKIE, &self.cookie_header)
        }
    }

    fn absolute_url(&self, url: &str) -> String {
        if url.starts_with("http://") || url.starts_with("https://") {
            url.to_string()
        } else {
            format!("{}{}", self.base_url, url)
        }
    }

    fn search_params(query: &str, requested: usize) -> Vec<(&'static str, String)> {
        let term = query.split_whitespace().collect::<Vec<_>>().join("-");
        vec![
            ("categories", String::new()),
            ("templateType", String::new()),
            ("searchTerm", term),
            ("video_quality", "HD".to_string()),
            ("sort", "most_relevant".to_string()),
            ("page", "1".to_string()),
            ("results_per_page", requested.to_string()),
            ("load-more", "false".to_string()),
            ("search-origin", "search_bar".to_string()),
            ("min_duration", MIN_CANDIDATE_SECONDS.to_string()),
            ("max_duration", MAX_CANDIDATE_SECONDS.to_string()),
            ("has_talent_released", String::new()),
            ("has_property_released", String::new()),
        ]
    }
}

#[async_trait]
impl LibrarySource for StockLibraryClient {
    async fn search(&self, query: &str, requested: usize) -> PipelineResult<Vec<ClipCandidate>> {
        let url = format!("{}{}", self.base_url, SEARCH_PATH);
        debug!(query = query, requested = requested, "Library search");

        let request = self
            .http
            .get(&url)
            .query(&Self::search_params(query, requested));
        let response = self
            .with_cookies(request)
            .send()
            .await
            .map_err(|e| {
                warn!("Library search request failed: {}", e);
                PipelineError::source_unavailable("library", None)
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(PipelineError::source_unavailable("library", Some(status.as_u16())));
        }

        let body: SearchResponse = response.json().await.map_err(|e| {
            warn!("Library search returned an unreadable body: {}", e);
            PipelineError::source_unavailable("library", Some(status.as_u16()))
        })?;

        let candidates: Vec<ClipCandidate> = body
            .data
            .stock_items
            .into_iter()
            .filter_map(|entry| {
                let format = entry.stock_item_formats.last()?;
                let duration = entry.stock_item.duration.whole_seconds()?;
                Some(ClipCandidate::new(
                    entry.stock_item.title,
                    duration,
                    self.absolute_url(&format.download_url),
                ))
            })
            .collect();

        info!(query = query, results = candidates.len(), "Library search complete");
        Ok(candidates)
    }

    async fn download(&self, candidate: &ClipCandidate, dest: &Path) -> PipelineResult<()> {
        let mut response = self
            .with_cookies(self.http.get(&candidate.source_url))
            .send()
            .await
            .map_err(|e| PipelineError::download_failed(format!("{}: {}", candidate.source_url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PipelineError::download_failed(format!(
                "status {} for {}",
                status.as_u16(),
                candidate.source_url
            )));
        }

        let mut file = tokio::fs::File::create(dest).await?;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| PipelineError::download_failed(format!("{}: {}", candidate.source_url, e)))?
        {
            file.write_all(&chunk).await?;
        }
        file.flush().await?;

        Ok(())
    }
}

/// Number of library results wanted for a budget: one per five seconds.
pub fn results_wanted(budget_seconds: f64) -> usize {
    if budget_seconds.is_finite() && budget_seconds > 0.0 {
        (budget_seconds / SECONDS_PER_RESULT).floor() as usize
    } else {
        0
    }
}

/// Sample `wanted` candidates without replacement, keeping their rank order.
pub fn sample_candidates<R: Rng + ?Sized>(
    rng: &mut R,
    candidates: Vec<ClipCandidate>,
    wanted: usize,
) -> Vec<ClipCandidate> {
    let amount = wanted.min(candidates.len());
    let mut picked = rand::seq::index::sample(rng, candidates.len(), amount).into_vec();
    picked.sort_unstable();

    let mut slots: Vec<Option<ClipCandidate>> = candidates.into_iter().map(Some).collect();
    picked
        .into_iter()
        .filter_map(|index| slots[index].take())
        .collect()
}

/// Drop last-ranked candidates while the others alone exceed `target_seconds`.
///
/// Never empties a non-empty list.
pub fn greedy_trim(mut candidates: Vec<ClipCandidate>, target_seconds: f64) -> Vec<ClipCandidate> {
    let mut total: u64 = candidates.iter().map(|c| c.duration_seconds as u64).sum();

    while candidates.len() > 1 {
        let last = candidates
            .last()
            .map(|c| c.duration_seconds as u64)
            .unwrap_or_default();
        if (total - last) as f64 > target_seconds {
            candidates.pop();
            total -= last;
        } else {
            break;
        }
    }

    candidates
}

/// Library side of segment acquisition.
pub struct LibraryAcquirer {
    source: Arc<dyn LibrarySource>,
}

impl LibraryAcquirer {
    pub fn new(source: Arc<dyn LibrarySource>) -> Self {
        Self { source }
    }

    /// Search, sample and trim: the candidates that will be downloaded.
    pub async fn select<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        query: &str,
        target_seconds: f64,
        wanted: usize,
    ) -> PipelineResult<Vec<ClipCandidate>> {
        let requested = wanted.max(MIN_REQUESTED_RESULTS);
        let ranked = self.source.search(query, requested).await?;

        let sampled = sample_candidates(rng, ranked, wanted);
        let kept = greedy_trim(sampled, target_seconds);
        debug!(
            query = query,
            kept = kept.len(),
            kept_seconds = kept.iter().map(|c| c.duration_seconds).sum::<u32>(),
            target_seconds = target_seconds,
            "Library selection"
        );
        Ok(kept)
    }

    /// Select candidates for `budget` and download them into `videos_dir`.
    ///
    /// An empty result means nothing usable was found. A failed download
    /// aborts and leaves earlier files in place.
    pub async fn acquire<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        query: &str,
        budget: TimeBudget,
        videos_dir: &Path,
    ) -> PipelineResult<Vec<ClipFile>> {
        let wanted = results_wanted(budget.seconds);
        if wanted == 0 {
            debug!(query = query, budget = budget.seconds, "Budget too small for a library clip");
            return Ok(Vec::new());
        }
        let selected = self.select(rng, query, budget.seconds, wanted).await?;

        let mut clips = Vec::with_capacity(selected.len());
        for (sequence, candidate) in selected.iter().enumerate() {
            let key = ClipKey::new(budget.segment_index, sequence);
            let path = key.path_in(videos_dir);
            info!(
                clip = %key,
                title = %candidate.title,
                duration = candidate.duration_seconds,
                "Downloading library clip"
            );
            self.source.download(candidate, &path).await?;
            clips.push(ClipFile::new(key, path, candidate.duration_seconds as f64));
        }

        Ok(clips)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::sync::Mutex;
    use tempfile::TempDir;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn candidates(durations: &[u32]) -> Vec<ClipCandidate> {
        durations
            .iter()
            .enumerate()
            .map(|(i, d)| ClipCandidate::new(format!("clip {}", i), *d, format!("https://lib/{}", i)))
            .collect()
    }

    fn durations(candidates: &[ClipCandidate]) -> Vec<u32> {
        candidates.iter().map(|c| c.duration_seconds).collect()
    }

    #[test]
    fn test_greedy_trim_keeps_all_at_exact_cover() {
        let kept = greedy_trim(candidates(&[10, 10, 15]), 20.0);
        assert_eq!(durations(&kept), vec![10, 10, 15]);
    }

    #[test]
    fn test_greedy_trim_drops_last_ranked() {
        let kept = greedy_trim(candidates(&[10, 10, 10]), 15.0);
        assert_eq!(durations(&kept), vec![10, 10]);
    }

    #[test]
    fn test_greedy_trim_never_empties() {
        let kept = greedy_trim(candidates(&[60, 60, 60]), 1.0);
        assert_eq!(durations(&kept), vec![60]);
        assert!(greedy_trim(Vec::new(), 10.0).is_empty());
    }

    #[test]
    fn test_results_wanted() {
        assert_eq!(results_wanted(40.0), 8);
        assert_eq!(results_wanted(4.9), 0);
        assert_eq!(results_wanted(-3.0), 0);
    }

    #[test]
    fn test_sample_keeps_rank_order() {
        let pool = candidates(&[1, 2, 3, 4, 5, 6, 7, 8, 9, 10]);
        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            let picked = sample_candidates(&mut rng, pool.clone(), 4);
            assert_eq!(picked.len(), 4);
            let d = durations(&picked);
            assert!(d.windows(2).all(|w| w[0] < w[1]), "not in rank order: {:?}", d);
        }
    }

    #[test]
    fn test_sample_capped_by_available() {
        let mut rng = StdRng::seed_from_u64(3);
        let picked = sample_candidates(&mut rng, candidates(&[5, 6]), 8);
        assert_eq!(durations(&picked), vec![5, 6]);
    }

    #[test]
    fn test_sample_is_reproducible() {
        let pool = candidates(&[1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12]);
        let a = sample_candidates(&mut StdRng::seed_from_u64(11), pool.clone(), 5);
        let b = sample_candidates(&mut StdRng::seed_from_u64(11), pool, 5);
        assert_eq!(a, b);
    }

    #[test]
    fn test_raw_duration_forms() {
        let parse = |v: &str| serde_json::from_str::<RawDuration>(v).unwrap().whole_seconds();
        assert_eq!(parse("12"), Some(12));
        assert_eq!(parse("12.9"), Some(12));
        assert_eq!(parse("\"17\""), Some(17));
        assert_eq!(parse("\"n/a\""), None);
    }

    struct FakeLibrary {
        results: Vec<ClipCandidate>,
        requested: Mutex<Vec<usize>>,
        downloaded: Mutex<Vec<String>>,
        fail_download_at: Option<usize>,
    }

    impl FakeLibrary {
        fn new(results: Vec<ClipCandidate>) -> Self {
            Self {
                results,
                requested: Mutex::new(Vec::new()),
                downloaded: Mutex::new(Vec::new()),
                fail_download_at: None,
            }
        }
    }

    #[async_trait]
    impl LibrarySource for FakeLibrary {
        async fn search(&self, _query: &str, requested: usize) -> PipelineResult<Vec<ClipCandidate>> {
            self.requested.lock().unwrap().push(requested);
            Ok(self.results.clone())
        }

        async fn download(&self, candidate: &ClipCandidate, dest: &Path) -> PipelineResult<()> {
            let mut downloaded = self.downloaded.lock().unwrap();
            if Some(downloaded.len()) == self.fail_download_at {
                return Err(PipelineError::download_failed("status 404"));
            }
            downloaded.push(candidate.source_url.clone());
            std::fs::write(dest, b"clip")?;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_acquire_downloads_in_order() {
        let dir = TempDir::new().unwrap();
        let fake = Arc::new(FakeLibrary::new(candidates(&[10, 12, 14, 16, 18])));
        let acquirer = LibraryAcquirer::new(fake.clone());
        let mut rng = StdRng::seed_from_u64(5);

        // 25s budget wants 5 results, so the whole pool is sampled.
        let clips = acquirer
            .acquire(&mut rng, "ocean waves", TimeBudget::new(2, 25.0), dir.path())
            .await
            .unwrap();

        assert_eq!(*fake.requested.lock().unwrap(), vec![10]);
        let d: Vec<f64> = clips.iter().map(|c| c.duration_seconds).collect();
        assert_eq!(d, vec![10.0, 12.0, 14.0]);
        for (i, clip) in clips.iter().enumerate() {
            assert_eq!(clip.key, ClipKey::new(2, i));
            assert_eq!(clip.path, dir.path().join(format!("2_{}.mp4", i)));
            assert!(clip.path.exists());
        }
    }

    #[tokio::test]
    async fn test_acquire_small_budget_yields_nothing() {
        let dir = TempDir::new().unwrap();
        let fake = Arc::new(FakeLibrary::new(candidates(&[10, 12])));
        let acquirer = LibraryAcquirer::new(fake.clone());
        let mut rng = StdRng::seed_from_u64(5);

        let clips = acquirer
            .acquire(&mut rng, "q", TimeBudget::new(0, 3.0), dir.path())
            .await
            .unwrap();
        assert!(clips.is_empty());
        assert!(fake.requested.lock().unwrap().is_empty(), "no search for a sub-clip budget");
        assert!(fake.downloaded.lock().unwrap().is_empty());

        let clips = acquirer
            .acquire(&mut rng, "q", TimeBudget::new(1, -4.0), dir.path())
            .await
            .unwrap();
        assert!(clips.is_empty());
        assert!(fake.requested.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_acquire_download_failure_keeps_partial_files() {
        let dir = TempDir::new().unwrap();
        let mut fake = FakeLibrary::new(candidates(&[10, 10, 10, 10]));
        fake.fail_download_at = Some(1);
        let acquirer = LibraryAcquirer::new(Arc::new(fake));
        let mut rng = StdRng::seed_from_u64(1);

        let err = acquirer
            .acquire(&mut rng, "q", TimeBudget::new(0, 20.0), dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::DownloadFailed(_)));
        assert!(dir.path().join("0_0.mp4").exists());
        assert!(!dir.path().join("0_1.mp4").exists());
    }

    fn client_for(server: &MockServer) -> StockLibraryClient {
        let config = LibraryConfig {
            base_url: server.uri(),
            cookies_path: "unused.json".into(),
        };
        let mut cookies = BTreeMap::new();
        cookies.insert("session".to_string(), "abc".to_string());
        cookies.insert("csrf".to_string(), "xyz".to_string());
        StockLibraryClient::new(&config, Duration::from_secs(5), &cookies).unwrap()
    }

    #[tokio::test]
    async fn test_client_search_parses_items() {
        let server = MockServer::start().await;
        let body = serde_json::json!({
            "data": {
                "stockItems": [
                    {
                        "stockItem": {"title": "Waves at dusk", "duration": 14},
                        "stockItemFormats": [
                            {"downloadUrl": "/download/1/sd"},
                            {"downloadUrl": "/download/1/hd"}
                        ]
                    },
                    {
                        "stockItem": {"title": "No formats", "duration": 9},
                        "stockItemFormats": []
                    },
                    {
                        "stockItem": {"title": "Surf", "duration": "21"},
                        "stockItemFormats": [{"downloadUrl": "/download/2"}]
                    }
                ]
            }
        });

        Mock::given(method("GET"))
            .and(path("/api/video/search"))
            .and(query_param("searchTerm", "ocean-waves-sunset"))
            .and(query_param("video_quality", "HD"))
            .and(query_param("sort", "most_relevant"))
            .and(query_param("page", "1"))
            .and(query_param("results_per_page", "10"))
            .and(query_param("min_duration", "5"))
            .and(query_param("max_duration", "60"))
            .and(header("cookie", "csrf=xyz; session=abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let results = client.search("ocean  waves sunset", 10).await.unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].title, "Waves at dusk");
        assert_eq!(results[0].duration_seconds, 14);
        assert_eq!(results[0].source_url, format!("{}/download/1/hd", server.uri()));
        assert_eq!(results[1].duration_seconds, 21);
    }

    #[tokio::test]
    async fn test_client_search_bad_status_is_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/video/search"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = client_for(&server).search("cats", 10).await.unwrap_err();
        assert!(err.is_segment_recoverable());
        match err {
            PipelineError::SourceUnavailable { status, .. } => assert_eq!(status, Some(503)),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_client_download_writes_file() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/download/7"))
            .and(header("cookie", "csrf=xyz; session=abc"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"fake mp4 bytes".to_vec()))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("0_0.mp4");
        let candidate = ClipCandidate::new("x", 10, format!("{}/download/7", server.uri()));
        client_for(&server).download(&candidate, &dest).await.unwrap();

        assert_eq!(std::fs::read(&dest).unwrap(), b"fake mp4 bytes");
    }

    #[tokio::test]
    async fn test_client_download_bad_status_fails() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/download/8"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let candidate = ClipCandidate::new("x", 10, format!("{}/download/8", server.uri()));
        let err = client_for(&server)
            .download(&candidate, &dir.path().join("0_0.mp4"))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::DownloadFailed(_)));
        assert!(!err.is_segment_recoverable());
    }

    #[tokio::test]
    async fn test_load_cookies() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cookies.json");
        std::fs::write(
            &path,
            r#"[{"name": "cookie_name", "value": "cookie_value", "domain": ".example.com"}]"#,
        )
        .unwrap();

        let cookies = load_cookies(&path).await.unwrap();
        assert_eq!(cookies.get("cookie_name").map(String::as_str), Some("cookie_value"));

        let missing = load_cookies(dir.path().join("nope.json")).await;
        assert!(matches!(missing, Err(PipelineError::Config(_))));
    }
}
