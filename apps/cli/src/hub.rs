//! Hugging Face hub fetchers.
//!
//! Datasets are paged through the datasets-server row API, models are listed
//! through the hub model API and downloaded file by file. When a request names
//! a cache directory, every downloaded file is also kept there and copied from
//! it on later fetches.

use anyhow::Context;
use async_trait::async_trait;
use experiments_cache::layout::{is_model_file, is_weights_file, split_data_path};
use experiments_cache::{
    ArtifactKind, CacheError, CacheResult, DatasetFetcher, DatasetRequest, FetchedDataset, FetchedModel,
    ModelFetcher, ModelRequest, ProgressEvent, ProgressSink, Settings,
};
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt};
use tracing::{debug, info};

/// Largest page the datasets-server row API serves.
const ROWS_PAGE_SIZE: u64 = 100;

/// Weight formats in order of preference; only the first one present is downloaded.
const WEIGHT_PREFERENCE: &[&str] = &["safetensors", "bin", "pt", "pth", "h5", "msgpack", "gguf"];

#[derive(Debug, Deserialize)]
struct SplitsResponse {
    splits: Vec<SplitEntry>,
}

#[derive(Debug, Deserialize)]
struct SplitEntry {
    config: String,
    split: String,
}

#[derive(Debug, Deserialize)]
struct RowsResponse {
    rows: Vec<RowEntry>,
    num_rows_total: u64,
}

#[derive(Debug, Deserialize)]
struct RowEntry {
    row: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ModelInfo {
    #[serde(default)]
    siblings: Vec<Sibling>,
}

#[derive(Debug, Deserialize)]
struct Sibling {
    rfilename: String,
}

/// HTTP access to the hub, authenticated when a token is configured.
#[derive(Clone)]
pub struct HubClient {
    http: reqwest::Client,
    endpoint: String,
    datasets_endpoint: String,
    token: Option<String>,
}

impl HubClient {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("model-experiments/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            endpoint: settings.hub.endpoint.trim_end_matches('/').to_string(),
            datasets_endpoint: settings.hub.datasets_endpoint.trim_end_matches('/').to_string(),
            token: settings.hub_token(),
        })
    }

    fn get(&self, url: &str) -> reqwest::RequestBuilder {
        let request = self.http.get(url);
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, url: &str) -> CacheResult<reqwest::Response> {
        debug!(url = %url, "GET");
        let response = self.get(url).send().await.map_err(http_error)?;
        response.error_for_status().map_err(http_error)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> CacheResult<T> {
        self.send(url).await?.json().await.map_err(http_error)
    }

    /// Stream `url` into `dest`, replacing it only once the body is complete.
    async fn download(&self, url: &str, dest: &Path) -> CacheResult<u64> {
        let response = self.send(url).await?;
        let partial = partial_path(dest);

        let mut file = tokio::fs::File::create(&partial).await?;
        let mut stream = response.bytes_stream();
        let mut written = 0u64;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(http_error)?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&partial, dest).await?;
        Ok(written)
    }
}

pub struct HubDatasetFetcher {
    hub: HubClient,
}

impl HubDatasetFetcher {
    pub fn new(hub: HubClient) -> Self {
        Self { hub }
    }

    async fn list_splits(&self, dataset: &str) -> CacheResult<(String, Vec<String>)> {
        let url = format!("{}/splits?dataset={}", self.hub.datasets_endpoint, urlencoding::encode(dataset));
        let response: SplitsResponse = self.hub.get_json(&url).await?;

        let Some(config) = response.splits.first().map(|s| s.config.clone()) else {
            return Err(CacheError::Dataset(format!("dataset {dataset} has no splits")));
        };
        let splits = response.splits.into_iter().filter(|s| s.config == config).map(|s| s.split).collect();
        Ok((config, splits))
    }

    /// Page rows of one split into `dest`, stopping at `cap` rows.
    async fn fetch_split(
        &self,
        dataset: &str,
        config: &str,
        split: &str,
        cap: Option<u64>,
        dest: &Path,
    ) -> CacheResult<u64> {
        let partial = partial_path(dest);
        let mut writer = tokio::io::BufWriter::new(tokio::fs::File::create(&partial).await?);
        let mut written = 0u64;

        loop {
            let length = cap.map_or(ROWS_PAGE_SIZE, |cap| cap.saturating_sub(written).min(ROWS_PAGE_SIZE));
            if length == 0 {
                break;
            }
            let url = format!(
                "{}/rows?dataset={}&config={}&split={}&offset={}&length={}",
                self.hub.datasets_endpoint,
                urlencoding::encode(dataset),
                urlencoding::encode(config),
                urlencoding::encode(split),
                written,
                length
            );
            let page: RowsResponse = self.hub.get_json(&url).await?;
            if page.rows.is_empty() {
                break;
            }

            for entry in &page.rows {
                let mut line = serde_json::to_vec(&entry.row)?;
                line.push(b'\n');
                writer.write_all(&line).await?;
            }
            written += page.rows.len() as u64;
            debug!(split = %split, rows = written, total = page.num_rows_total, "fetched page");

            if written >= page.num_rows_total {
                break;
            }
        }

        writer.flush().await?;
        drop(writer);
        tokio::fs::rename(&partial, dest).await?;
        Ok(written)
    }
}

#[async_trait]
impl DatasetFetcher for HubDatasetFetcher {
    fn id(&self) -> &'static str {
        "hub"
    }

    async fn fetch(&self, request: &DatasetRequest, progress: &dyn ProgressSink) -> CacheResult<FetchedDataset> {
        let (config, splits) = self.list_splits(&request.name).await?;
        info!(dataset = %request.name, config = %config, splits = splits.len(), "listing splits");

        let mut total_samples = 0;
        for split in &splits {
            let dest = split_data_path(&request.output_dir, split);
            if let Some(parent) = dest.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }

            let slot = request
                .cache_dir
                .as_deref()
                .map(|cache| dataset_slot(cache, &request.name, &config, split, request.max_samples));

            let rows = match slot.as_deref().filter(|slot| slot.is_file()) {
                Some(slot) => {
                    tokio::fs::copy(slot, &dest).await?;
                    let rows = count_lines(&dest).await?;
                    progress.on_event(ProgressEvent::Message {
                        kind: ArtifactKind::Dataset,
                        message: format!("{split}: {rows} rows (from cache)"),
                    });
                    rows
                }
                None => {
                    let rows = self.fetch_split(&request.name, &config, split, request.max_samples, &dest).await?;
                    if let Some(slot) = &slot {
                        store_in_cache(&dest, slot).await?;
                    }
                    progress.on_event(ProgressEvent::Message {
                        kind: ArtifactKind::Dataset,
                        message: format!("{split}: {rows} rows"),
                    });
                    rows
                }
            };
            total_samples += rows;
        }

        Ok(FetchedDataset { splits, total_samples })
    }
}

pub struct HubModelFetcher {
    hub: HubClient,
}

impl HubModelFetcher {
    pub fn new(hub: HubClient) -> Self {
        Self { hub }
    }

    async fn list_files(&self, model: &str) -> CacheResult<Vec<String>> {
        let url = format!("{}/api/models/{}", self.hub.endpoint, encode_repo(model));
        let info: ModelInfo = self.hub.get_json(&url).await?;

        let available: Vec<String> = info.siblings.into_iter().map(|s| s.rfilename).collect();
        let files = select_model_files(&available);
        if files.is_empty() {
            return Err(CacheError::produce(
                ArtifactKind::Model,
                format!("{model} has no config, weights or tokenizer files"),
            ));
        }
        Ok(files)
    }
}

#[async_trait]
impl ModelFetcher for HubModelFetcher {
    fn id(&self) -> &'static str {
        "hub"
    }

    async fn fetch(&self, request: &ModelRequest, progress: &dyn ProgressSink) -> CacheResult<FetchedModel> {
        let cache = request.cache_dir.as_deref();
        let cached = match cache {
            Some(cache) => cached_listing(cache, &request.name).await,
            None => None,
        };
        let files = match cached {
            Some(files) => {
                debug!(model = %request.name, "file listing served from cache");
                files
            }
            None => self.list_files(&request.name).await?,
        };
        let repo = encode_repo(&request.name);
        info!(model = %request.name, files = files.len(), "downloading model files");

        let total = files.len() as u64;
        for (index, file) in files.iter().enumerate() {
            let dest = request.output_dir.join(file);
            let slot = cache.map(|cache| model_slot(cache, &request.name, file));

            let message = match slot.as_deref().filter(|slot| slot.is_file()) {
                Some(slot) => {
                    tokio::fs::copy(slot, &dest).await?;
                    format!("{file} (from cache)")
                }
                None => {
                    let url = format!("{}/{}/resolve/main/{}", self.hub.endpoint, repo, urlencoding::encode(file));
                    let bytes = self.hub.download(&url, &dest).await?;
                    if let Some(slot) = &slot {
                        store_in_cache(&dest, slot).await?;
                    }
                    format!("{file} ({bytes} bytes)")
                }
            };

            progress.on_event(ProgressEvent::Message { kind: ArtifactKind::Model, message });
            progress.on_event(ProgressEvent::Step { kind: ArtifactKind::Model, step: index as u64 + 1, total: Some(total) });
        }

        if let Some(cache) = cache {
            store_listing(cache, &request.name, &files).await?;
        }
        Ok(FetchedModel { files })
    }
}

/// Top-level config, tokenizer and weight files, keeping a single weight format.
fn select_model_files(available: &[String]) -> Vec<String> {
    let top_level: Vec<&String> = available.iter().filter(|f| !f.contains('/') && is_model_file(f)).collect();

    let preferred = WEIGHT_PREFERENCE
        .iter()
        .find(|ext| top_level.iter().any(|f| is_weights_file(f) && f.ends_with(&format!(".{ext}"))));

    let mut files: Vec<String> = top_level
        .into_iter()
        .filter(|f| {
            let Some(ext) = preferred else {
                return true;
            };
            if is_weights_file(f) {
                f.ends_with(&format!(".{ext}"))
            } else if f.ends_with(".index.json") {
                f.ends_with(&format!(".{ext}.index.json"))
            } else {
                true
            }
        })
        .cloned()
        .collect();
    files.sort();
    files
}

/// Repository names keep their `/` separator; each segment is encoded.
fn encode_repo(name: &str) -> String {
    name.split('/').map(|segment| urlencoding::encode(segment).into_owned()).collect::<Vec<_>>().join("/")
}

fn cache_key(name: &str) -> String {
    name.replace('/', "--")
}

fn dataset_slot(cache: &Path, dataset: &str, config: &str, split: &str, cap: Option<u64>) -> PathBuf {
    let cap = cap.map_or_else(|| "all".to_string(), |cap| cap.to_string());
    cache
        .join("datasets")
        .join(cache_key(dataset))
        .join(cache_key(config))
        .join(cap)
        .join(format!("{}.jsonl", cache_key(split)))
}

fn model_slot(cache: &Path, model: &str, file: &str) -> PathBuf {
    cache.join("models").join(cache_key(model)).join(file)
}

fn listing_slot(cache: &Path, model: &str) -> PathBuf {
    cache.join("models").join(format!("{}.files.json", cache_key(model)))
}

/// The recorded file selection, only while every listed file is still cached.
async fn cached_listing(cache: &Path, model: &str) -> Option<Vec<String>> {
    let raw = tokio::fs::read(listing_slot(cache, model)).await.ok()?;
    let files: Vec<String> = serde_json::from_slice(&raw).ok()?;
    if files.is_empty() || !files.iter().all(|file| model_slot(cache, model, file).is_file()) {
        return None;
    }
    Some(files)
}

async fn store_listing(cache: &Path, model: &str, files: &[String]) -> CacheResult<()> {
    let slot = listing_slot(cache, model);
    if let Some(parent) = slot.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let partial = partial_path(&slot);
    tokio::fs::write(&partial, serde_json::to_vec(files)?).await?;
    tokio::fs::rename(&partial, &slot).await?;
    Ok(())
}

async fn store_in_cache(src: &Path, slot: &Path) -> CacheResult<()> {
    if let Some(parent) = slot.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let partial = partial_path(slot);
    tokio::fs::copy(src, &partial).await?;
    tokio::fs::rename(&partial, slot).await?;
    Ok(())
}

fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".part");
    dest.with_file_name(name)
}

async fn count_lines(path: &Path) -> CacheResult<u64> {
    let mut lines = tokio::io::BufReader::new(tokio::fs::File::open(path).await?).lines();
    let mut count = 0;
    while let Some(line) = lines.next_line().await? {
        if !line.trim().is_empty() {
            count += 1;
        }
    }
    Ok(count)
}

fn http_error(error: reqwest::Error) -> CacheError {
    CacheError::Other(anyhow::Error::new(error))
}
