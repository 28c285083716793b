//! External vulnerability correlation.
//!
//! Two feeds run under a shared discipline: the OSV batch feed resolves
//! deduplicated coordinates to vulnerabilities, then the NVD feed is queried
//! once per CVE identifier those results surfaced. Each feed owns a single
//! shared backoff state, a per-run cache, and a bounded retry budget; a
//! failed lookup degrades to a partial-result note and never aborts the
//! scan.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use futures::future::join_all;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::Semaphore;

use crate::models::{
    Coordinate, CoordinateRef, CveInfo, CveRecord, PartialFailure, ScoredDependency,
    VersionKind, VulnerabilityInfo, VulnerabilityRecord,
};

pub mod limiter;
mod nvd;
mod osv;
mod transport;

pub use transport::{FeedError, HttpResponse, ReqwestTransport, Transport};

use limiter::RateLimiter;
use osv::OsvVuln;

/// Attempts per request before a coordinate degrades to a partial failure.
const MAX_ATTEMPTS: u32 = 4;
/// Coordinates grouped into one batch-feed request.
const BATCH_SIZE: usize = 100;

#[derive(Debug, Default)]
pub struct CorrelatorOutcome {
    pub vulnerabilities: Vec<VulnerabilityRecord>,
    pub cves: Vec<CveRecord>,
    pub failures: Vec<PartialFailure>,
}

pub struct Correlator {
    transport: Arc<dyn Transport>,
    concurrency: usize,
    deadline: Option<Instant>,
}

impl Correlator {
    pub fn new(
        transport: Arc<dyn Transport>,
        concurrency: usize,
        deadline: Option<Instant>,
    ) -> Self {
        Correlator {
            transport,
            concurrency,
            deadline,
        }
    }

    /// Correlate every queryable coordinate in the scan, fanning results
    /// back out to each manifest occurrence.
    pub async fn correlate(&self, deps: &[ScoredDependency], quiet: bool) -> CorrelatorOutcome {
        // Exact pins only: ranges and wildcards have no concrete version for
        // a feed to match, and skipping them is policy rather than failure.
        let mut occurrences: BTreeMap<Coordinate, BTreeSet<String>> = BTreeMap::new();
        for scored in deps {
            let dep = &scored.dep;
            if dep.manifest_scope
                || dep.version_kind != VersionKind::Exact
                || osv::osv_ecosystem(dep.ecosystem).is_none()
            {
                continue;
            }
            occurrences
                .entry(dep.coordinate())
                .or_default()
                .insert(dep.manifest_path.clone());
        }
        let coordinates: Vec<Coordinate> = occurrences.keys().cloned().collect();
        if coordinates.is_empty() {
            return CorrelatorOutcome::default();
        }

        let vuln_progress = progress_bar(quiet, coordinates.len() as u64, "vulnerabilities");
        let vuln_feed = OsvFeed::new(self.transport.clone());
        let (vuln_map, mut failures) = vuln_feed
            .query(
                &coordinates,
                self.concurrency,
                self.deadline,
                vuln_progress.as_ref(),
            )
            .await;
        if let Some(pb) = vuln_progress {
            pb.finish_and_clear();
        }

        let mut vulnerabilities = Vec::new();
        let mut cve_targets: BTreeMap<String, BTreeSet<Coordinate>> = BTreeMap::new();
        for (coordinate, manifests) in &occurrences {
            let Some(vulns) = vuln_map.get(coordinate) else {
                continue;
            };
            for vuln in vulns {
                for cve_id in vuln.cve_ids() {
                    cve_targets
                        .entry(cve_id)
                        .or_default()
                        .insert(coordinate.clone());
                }
                for manifest in manifests {
                    vulnerabilities.push(VulnerabilityRecord {
                        dependency: coordinate_ref(coordinate, manifest),
                        vulnerability: VulnerabilityInfo {
                            id: vuln.id.clone(),
                            summary: vuln.summary.clone(),
                            aliases: vuln.aliases.clone(),
                        },
                    });
                }
            }
        }

        // CVE lookups start only after the vulnerability phase settled the
        // identifiers; one request per id, sequential by design.
        let cve_ids: Vec<String> = cve_targets.keys().cloned().collect();
        let cve_progress = progress_bar(quiet, cve_ids.len() as u64, "CVEs");
        let cve_feed = NvdFeed::new(self.transport.clone());
        let (cve_map, cve_failures) = cve_feed
            .query(&cve_ids, self.deadline, cve_progress.as_ref())
            .await;
        failures.extend(cve_failures);
        if let Some(pb) = cve_progress {
            pb.finish_and_clear();
        }

        let mut cves = Vec::new();
        for (cve_id, targets) in &cve_targets {
            let Some(infos) = cve_map.get(cve_id) else {
                continue;
            };
            for info in infos {
                for coordinate in targets {
                    for manifest in &occurrences[coordinate] {
                        cves.push(CveRecord {
                            dependency: coordinate_ref(coordinate, manifest),
                            cve: info.clone(),
                        });
                    }
                }
            }
        }

        CorrelatorOutcome {
            vulnerabilities,
            cves,
            failures,
        }
    }
}

fn coordinate_ref(coordinate: &Coordinate, manifest: &str) -> CoordinateRef {
    CoordinateRef {
        ecosystem: coordinate.ecosystem,
        name: coordinate.name.clone(),
        version: coordinate.version.clone(),
        manifest_path: manifest.to_string(),
    }
}

fn progress_bar(quiet: bool, len: u64, what: &str) -> Option<ProgressBar> {
    if quiet || len == 0 {
        return None;
    }
    let pb = ProgressBar::new(len);
    if let Ok(style) =
        ProgressStyle::default_bar().template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
    {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb.set_message(format!("checking {}", what));
    Some(pb)
}

fn expired(deadline: Option<Instant>) -> bool {
    deadline.is_some_and(|d| Instant::now() >= d)
}

/// The batch vulnerability feed: coordinates grouped into one request per
/// batch, answered positionally.
struct OsvFeed {
    transport: Arc<dyn Transport>,
    limiter: Mutex<RateLimiter>,
    cache: Mutex<HashMap<Coordinate, Vec<OsvVuln>>>,
}

impl OsvFeed {
    fn new(transport: Arc<dyn Transport>) -> Self {
        OsvFeed {
            transport,
            limiter: Mutex::new(RateLimiter::new()),
            cache: Mutex::new(HashMap::new()),
        }
    }

    async fn query(
        &self,
        coordinates: &[Coordinate],
        concurrency: usize,
        deadline: Option<Instant>,
        progress: Option<&ProgressBar>,
    ) -> (HashMap<Coordinate, Vec<OsvVuln>>, Vec<PartialFailure>) {
        let uncached: Vec<Coordinate> = {
            let cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
            coordinates
                .iter()
                .filter(|c| !cache.contains_key(*c))
                .cloned()
                .collect()
        };

        let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
        let chunk_futures = uncached.chunks(BATCH_SIZE).map(|chunk| {
            let semaphore = semaphore.clone();
            async move {
                let _permit = semaphore
                    .acquire()
                    .await
                    .map_err(|_| FeedError::Transport("request pool closed".to_string()))?;
                if expired(deadline) {
                    return Err(FeedError::Deadline);
                }
                let results = self.request_chunk(chunk).await?;
                Ok::<_, FeedError>(results)
            }
        });

        let mut failures = Vec::new();
        let outcomes = join_all(chunk_futures).await;
        for (chunk, outcome) in uncached.chunks(BATCH_SIZE).zip(outcomes) {
            if let Some(pb) = progress {
                pb.inc(chunk.len() as u64);
            }
            match outcome {
                Ok(results) => {
                    let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
                    for (coordinate, result) in chunk.iter().zip(results) {
                        cache.insert(coordinate.clone(), result.vulns);
                    }
                }
                Err(err) => {
                    for coordinate in chunk {
                        failures.push(PartialFailure::new(
                            "vulnerability_feed",
                            coordinate.to_string(),
                            err.to_string(),
                        ));
                    }
                }
            }
        }

        let cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        let map = coordinates
            .iter()
            .filter_map(|c| cache.get(c).map(|vulns| (c.clone(), vulns.clone())))
            .collect();
        (map, failures)
    }

    async fn request_chunk(&self, chunk: &[Coordinate]) -> Result<Vec<osv::BatchResult>, FeedError> {
        let body = osv::batch_body(chunk);
        let mut last_err = FeedError::RateLimited(MAX_ATTEMPTS);

        for _ in 0..MAX_ATTEMPTS {
            let pace = self
                .limiter
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .pre_request_delay();
            if let Some(delay) = pace {
                tokio::time::sleep(delay).await;
            }
            match self.transport.post_json(osv::QUERYBATCH_URL, body.clone()).await {
                Ok(response) if response.status == 200 => {
                    self.limiter.lock().unwrap_or_else(|e| e.into_inner()).on_success();
                    let parsed: osv::BatchResponse = serde_json::from_str(&response.body)
                        .map_err(|e| FeedError::Decode(e.to_string()))?;
                    let mut results = parsed.results;
                    results.resize_with(chunk.len(), Default::default);
                    return Ok(results);
                }
                Ok(response) if response.status == 429 || response.status >= 500 => {
                    let delay = self.limiter.lock().unwrap_or_else(|e| e.into_inner()).on_throttled();
                    last_err = FeedError::Status(response.status);
                    tokio::time::sleep(delay).await;
                }
                Ok(response) => return Err(FeedError::Status(response.status)),
                Err(err) => {
                    let delay = self.limiter.lock().unwrap_or_else(|e| e.into_inner()).on_throttled();
                    last_err = err;
                    tokio::time::sleep(delay).await;
                }
            }
        }
        Err(last_err)
    }
}

/// The per-identifier CVE feed. Identifiers are only known once the
/// vulnerability feed answered, so queries are issued one at a time.
struct NvdFeed {
    transport: Arc<dyn Transport>,
    limiter: Mutex<RateLimiter>,
    cache: Mutex<HashMap<String, Vec<CveInfo>>>,
}

impl NvdFeed {
    fn new(transport: Arc<dyn Transport>) -> Self {
        NvdFeed {
            transport,
            limiter: Mutex::new(RateLimiter::new()),
            cache: Mutex::new(HashMap::new()),
        }
    }

    async fn query(
        &self,
        cve_ids: &[String],
        deadline: Option<Instant>,
        progress: Option<&ProgressBar>,
    ) -> (HashMap<String, Vec<CveInfo>>, Vec<PartialFailure>) {
        let mut failures = Vec::new();

        for (idx, cve_id) in cve_ids.iter().enumerate() {
            if self.cache.lock().unwrap_or_else(|e| e.into_inner()).contains_key(cve_id) {
                if let Some(pb) = progress {
                    pb.inc(1);
                }
                continue;
            }
            if expired(deadline) {
                // Stop issuing new requests; everything already attached
                // stays in the report.
                for remaining in &cve_ids[idx..] {
                    failures.push(PartialFailure::new(
                        "cve_feed",
                        remaining.clone(),
                        FeedError::Deadline.to_string(),
                    ));
                }
                break;
            }
            match self.request_cve(cve_id).await {
                Ok(infos) => {
                    self.cache
                        .lock()
                        .unwrap_or_else(|e| e.into_inner())
                        .insert(cve_id.clone(), infos);
                }
                Err(err) => {
                    failures.push(PartialFailure::new("cve_feed", cve_id.clone(), err.to_string()));
                }
            }
            if let Some(pb) = progress {
                pb.inc(1);
            }
        }

        let cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        let map = cve_ids
            .iter()
            .filter_map(|id| cache.get(id).map(|infos| (id.clone(), infos.clone())))
            .collect();
        (map, failures)
    }

    async fn request_cve(&self, cve_id: &str) -> Result<Vec<CveInfo>, FeedError> {
        let url = nvd::cve_url(cve_id);
        let mut last_err = FeedError::RateLimited(MAX_ATTEMPTS);

        for _ in 0..MAX_ATTEMPTS {
            let pace = self
                .limiter
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .pre_request_delay();
            if let Some(delay) = pace {
                tokio::time::sleep(delay).await;
            }
            match self.transport.get(&url).await {
                Ok(response) if response.status == 200 => {
                    self.limiter.lock().unwrap_or_else(|e| e.into_inner()).on_success();
                    let parsed: nvd::NvdResponse = serde_json::from_str(&response.body)
                        .map_err(|e| FeedError::Decode(e.to_string()))?;
                    return Ok(parsed
                        .vulnerabilities
                        .into_iter()
                        .map(|entry| entry.cve.into_info())
                        .collect());
                }
                Ok(response) if response.status == 429 || response.status >= 500 => {
                    let delay = self.limiter.lock().unwrap_or_else(|e| e.into_inner()).on_throttled();
                    last_err = FeedError::Status(response.status);
                    tokio::time::sleep(delay).await;
                }
                Ok(response) => return Err(FeedError::Status(response.status)),
                Err(err) => {
                    let delay = self.limiter.lock().unwrap_or_else(|e| e.into_inner()).on_throttled();
                    last_err = err;
                    tokio::time::sleep(delay).await;
                }
            }
        }
        Err(last_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Dependency, Ecosystem};
    use crate::normalizer;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubTransport {
        posts: AtomicUsize,
        gets: AtomicUsize,
        post_responses: Vec<HttpResponse>,
        get_body: String,
    }

    impl StubTransport {
        fn new(post_responses: Vec<HttpResponse>, get_body: &str) -> Self {
            StubTransport {
                posts: AtomicUsize::new(0),
                gets: AtomicUsize::new(0),
                post_responses,
                get_body: get_body.to_string(),
            }
        }

        fn ok(post_body: &str, get_body: &str) -> Self {
            Self::new(
                vec![HttpResponse {
                    status: 200,
                    body: post_body.to_string(),
                }],
                get_body,
            )
        }
    }

    #[async_trait]
    impl Transport for StubTransport {
        async fn get(&self, _url: &str) -> Result<HttpResponse, FeedError> {
            self.gets.fetch_add(1, Ordering::SeqCst);
            Ok(HttpResponse {
                status: 200,
                body: self.get_body.clone(),
            })
        }

        async fn post_json(
            &self,
            _url: &str,
            _body: serde_json::Value,
        ) -> Result<HttpResponse, FeedError> {
            let n = self.posts.fetch_add(1, Ordering::SeqCst);
            let response = self
                .post_responses
                .get(n)
                .or_else(|| self.post_responses.last())
                .cloned()
                .unwrap_or(HttpResponse {
                    status: 200,
                    body: r#"{"results": []}"#.to_string(),
                });
            Ok(response)
        }
    }

    fn coordinate(name: &str) -> Coordinate {
        Coordinate {
            ecosystem: Ecosystem::Npm,
            name: name.to_string(),
            version: "1.0.0".to_string(),
        }
    }

    fn scored(name: &str, manifest: &str) -> ScoredDependency {
        let mut dep = Dependency::new(Ecosystem::Npm, manifest, name, "1.0.0");
        normalizer::normalize(&mut dep);
        ScoredDependency {
            dep,
            signals: Vec::new(),
            risk_score: 0.0,
        }
    }

    const ONE_VULN: &str = r#"{
      "results": [
        {"vulns": [{"id": "GHSA-abcd", "summary": "bad", "aliases": ["CVE-2020-1111"]}]}
      ]
    }"#;

    const ONE_CVE: &str = r#"{
      "vulnerabilities": [
        {"cve": {
          "id": "CVE-2020-1111",
          "descriptions": [{"lang": "en", "value": "boom"}],
          "metrics": {"cvssMetricV31": [{"cvssData": {"baseScore": 7.5}}]}
        }}
      ]
    }"#;

    #[tokio::test]
    async fn test_same_coordinate_queried_once() {
        let transport = Arc::new(StubTransport::ok(ONE_VULN, ONE_CVE));
        let feed = OsvFeed::new(transport.clone());
        let coords = vec![coordinate("left-pad")];

        let (first, failures) = feed.query(&coords, 4, None, None).await;
        assert!(failures.is_empty());
        assert_eq!(first[&coords[0]].len(), 1);

        let (second, _) = feed.query(&coords, 4, None, None).await;
        assert_eq!(second[&coords[0]].len(), 1);
        assert_eq!(transport.posts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_correlate_fans_out_to_every_occurrence() {
        let transport = Arc::new(StubTransport::ok(ONE_VULN, ONE_CVE));
        let correlator = Correlator::new(transport.clone(), 4, None);
        // Same coordinate declared in two manifests.
        let deps = vec![
            scored("left-pad", "web/package.json"),
            scored("left-pad", "api/package.json"),
        ];

        let outcome = correlator.correlate(&deps, true).await;
        assert!(outcome.failures.is_empty());
        assert_eq!(outcome.vulnerabilities.len(), 2);
        assert_eq!(outcome.cves.len(), 2);
        assert_eq!(transport.posts.load(Ordering::SeqCst), 1);
        assert_eq!(transport.gets.load(Ordering::SeqCst), 1);
        assert_eq!(outcome.cves[0].cve.severity, "HIGH");

        let mut manifests: Vec<&str> = outcome
            .vulnerabilities
            .iter()
            .map(|v| v.dependency.manifest_path.as_str())
            .collect();
        manifests.sort();
        assert_eq!(manifests, vec!["api/package.json", "web/package.json"]);
    }

    #[tokio::test]
    async fn test_non_exact_coordinates_are_skipped() {
        let transport = Arc::new(StubTransport::ok(ONE_VULN, ONE_CVE));
        let correlator = Correlator::new(transport.clone(), 4, None);
        let mut dep = Dependency::new(Ecosystem::Npm, "package.json", "express", "^4.18.2");
        normalizer::normalize(&mut dep);
        let deps = vec![ScoredDependency {
            dep,
            signals: Vec::new(),
            risk_score: 0.0,
        }];

        let outcome = correlator.correlate(&deps, true).await;
        assert!(outcome.vulnerabilities.is_empty());
        assert!(outcome.failures.is_empty());
        assert_eq!(transport.posts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttled_requests_retry_then_succeed() {
        let throttled = HttpResponse {
            status: 429,
            body: String::new(),
        };
        let ok = HttpResponse {
            status: 200,
            body: ONE_VULN.to_string(),
        };
        let transport = Arc::new(StubTransport::new(
            vec![throttled.clone(), throttled.clone(), throttled, ok],
            ONE_CVE,
        ));
        let feed = OsvFeed::new(transport.clone());
        let coords = vec![coordinate("left-pad")];

        let (map, failures) = feed.query(&coords, 4, None, None).await;
        assert!(failures.is_empty());
        assert_eq!(map[&coords[0]].len(), 1);
        // Initial attempt plus one retry per 429.
        assert_eq!(transport.posts.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_degrade_to_partial_failure() {
        let error = HttpResponse {
            status: 500,
            body: String::new(),
        };
        let transport = Arc::new(StubTransport::new(vec![error], ONE_CVE));
        let correlator = Correlator::new(transport.clone(), 4, None);
        let deps = vec![scored("left-pad", "package.json")];

        let outcome = correlator.correlate(&deps, true).await;
        assert!(outcome.vulnerabilities.is_empty());
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].stage, "vulnerability_feed");
        assert_eq!(transport.posts.load(Ordering::SeqCst), MAX_ATTEMPTS as usize);
    }

    #[tokio::test]
    async fn test_expired_deadline_stops_new_requests() {
        let transport = Arc::new(StubTransport::ok(ONE_VULN, ONE_CVE));
        let deadline = Instant::now() - std::time::Duration::from_secs(1);
        let correlator = Correlator::new(transport.clone(), 4, Some(deadline));
        let deps = vec![scored("left-pad", "package.json")];

        let outcome = correlator.correlate(&deps, true).await;
        assert!(outcome.vulnerabilities.is_empty());
        assert!(!outcome.failures.is_empty());
        assert_eq!(transport.posts.load(Ordering::SeqCst), 0);
        assert_eq!(transport.gets.load(Ordering::SeqCst), 0);
    }
}
