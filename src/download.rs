//! Searches the ESGF index for CORDEX datasets and fetches their download
//! scripts.

use std::{
    fs::File,
    io::Write,
    path::Path,
};

use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, warn};
use reqwest::{Client, Url};
use serde::Deserialize;

use crate::{
    catalog::{listing::list_files, Facets, Level},
    config,
    errors::{CatalogError, SearchError},
    tool::Invocation,
};

/// Facet values to search for. Empty lists are left out of the query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchQuery {
    pub domains: Vec<String>,
    pub variables: Vec<String>,
    pub time_frequencies: Vec<String>,
    pub experiments: Vec<String>,
    pub driving_models: Vec<String>,
    pub rcm_names: Vec<String>,
}

impl SearchQuery {
    fn facet_params(&self) -> Vec<(&'static str, String)> {
        [
            (Level::Domain, &self.domains),
            (Level::Variable, &self.variables),
            (Level::TimeFrequency, &self.time_frequencies),
            (Level::Experiment, &self.experiments),
            (Level::DrivingModel, &self.driving_models),
            (Level::RcmName, &self.rcm_names),
        ]
        .into_iter()
        .filter(|(_, values)| !values.is_empty())
        .map(|(level, values)| (level.name(), values.join(",")))
        .collect()
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    response: ResponseBody,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponseBody {
    num_found: u64,
    #[serde(default)]
    docs: Vec<DatasetDoc>,
}

/// Metadata of one dataset found by a search.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DatasetDoc {
    pub id: String,
    pub number_of_files: u64,
    #[serde(default)]
    pub time_frequency: Vec<String>,
    #[serde(default)]
    pub domain: Vec<String>,
    #[serde(default)]
    pub variable: Vec<String>,
    #[serde(default)]
    pub experiment: Vec<String>,
    #[serde(default)]
    pub driving_model: Vec<String>,
    #[serde(default)]
    pub rcm_name: Vec<String>,
}

impl DatasetDoc {
    /// Facet tuple of the dataset, from the first value of each facet.
    pub fn facets(&self) -> Result<Facets, CatalogError> {
        let first = |level: Level, values: &[String]| {
            values.first().cloned().ok_or(CatalogError::BadFacet {
                level: level.name(),
                value: String::new(),
            })
        };

        let facets = Facets {
            time_frequency: first(Level::TimeFrequency, &self.time_frequency)?,
            domain: first(Level::Domain, &self.domain)?,
            variable: first(Level::Variable, &self.variable)?,
            experiment: first(Level::Experiment, &self.experiment)?,
            driving_model: first(Level::DrivingModel, &self.driving_model)?,
            rcm_name: first(Level::RcmName, &self.rcm_name)?,
        };
        facets.validate()?;

        Ok(facets)
    }
}

fn parse_response(text: &str) -> Result<ResponseBody, SearchError> {
    serde_json::from_str::<SearchResponse>(text)
        .map(|r| r.response)
        .map_err(|e| SearchError::Response(e.to_string()))
}

/// Client for the search API of one ESGF index node.
#[derive(Debug, Clone)]
pub struct SearchClient {
    client: Client,
    node: String,
    distrib: bool,
    page_size: u32,
}

impl SearchClient {
    pub fn new(search: &config::Search) -> Self {
        SearchClient::with_client(Client::new(), search)
    }

    pub fn with_client(client: Client, search: &config::Search) -> Self {
        SearchClient {
            client,
            node: search.node.trim_end_matches('/').to_string(),
            distrib: search.distrib,
            page_size: search.page_size,
        }
    }

    /// Every dataset matching `query`, with the hit count reported by the
    /// index.
    pub async fn search(&self, query: &SearchQuery) -> Result<(u64, Vec<DatasetDoc>), SearchError> {
        let first = self.page_with_retry(query, 0).await?;
        let hits = first.num_found;
        let mut docs = first.docs;

        while (docs.len() as u64) < hits {
            let page = self.page_with_retry(query, docs.len() as u64).await?;
            if page.docs.is_empty() {
                warn!(
                    "Search stopped after {} of {} datasets: empty page",
                    docs.len(),
                    hits
                );
                break;
            }
            docs.extend(page.docs);
        }

        Ok((hits, docs))
    }

    async fn page_with_retry(&self, query: &SearchQuery, offset: u64) -> Result<ResponseBody, SearchError> {
        match self.page(query, offset).await {
            Ok(body) => Ok(body),
            Err(e) => {
                warn!("Search request failed, retrying once: {}", e);
                self.page(query, offset).await
            }
        }
    }

    async fn page(&self, query: &SearchQuery, offset: u64) -> Result<ResponseBody, SearchError> {
        let mut params: Vec<(&str, String)> = vec![
            ("project", "CORDEX".to_string()),
            ("type", "Dataset".to_string()),
            ("format", "application/solr+json".to_string()),
            ("distrib", self.distrib.to_string()),
            ("limit", self.page_size.to_string()),
            ("offset", offset.to_string()),
        ];
        params.extend(query.facet_params());

        let url = format!("{}/search", self.node);
        debug!("Searching {} at offset {}", url, offset);

        let response = self.client.get(&url).query(&params).send().await?;
        if !response.status().is_success() {
            return Err(SearchError::Status(response.status()));
        }

        parse_response(&response.text().await?)
    }

    /// Address of the wget script that downloads every file of a dataset.
    pub fn script_url(&self, dataset_id: &str) -> Result<Url, SearchError> {
        Url::parse_with_params(
            &format!("{}/wget", self.node),
            &[("dataset_id", dataset_id)],
        )
        .map_err(|e| SearchError::Response(e.to_string()))
    }

    /// Streams the document at `url` into `file_path`.
    pub async fn fetch_to_file(&self, url: Url, file_path: &Path, progress_bar: &ProgressBar) -> Result<(), SearchError> {
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(SearchError::Status(response.status()));
        }

        // switch the spinner to a byte counter when the size is known
        let total_size = response.content_length().unwrap_or(0);
        if total_size > 0 {
            if let Ok(style) = ProgressStyle::with_template(
                "{msg} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({percent}%) {eta}",
            ) {
                progress_bar.set_length(total_size);
                progress_bar.set_style(style.progress_chars("=> "));
            }
        }

        let mut file = File::create(file_path)?;
        let mut downloaded = 0u64;
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk)?;
            downloaded += chunk.len() as u64;
            progress_bar.set_position(downloaded);
        }

        Ok(())
    }
}

/// What to do with a dataset directory before downloading into it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadPlan {
    AlreadyDownloaded,
    Fetch,
    /// Partially downloaded; left for a human to sort out.
    Mismatch { present: u64, expected: u64 },
}

impl DownloadPlan {
    pub fn new(present: u64, expected: u64) -> Self {
        if present == expected {
            DownloadPlan::AlreadyDownloaded
        } else if present == 0 {
            DownloadPlan::Fetch
        } else {
            DownloadPlan::Mismatch { present, expected }
        }
    }
}

/// Number of NetCDF files in a dataset directory.
pub fn count_nc_files(dir: &Path) -> Result<u64, CatalogError> {
    let files = list_files(dir)?;
    Ok(files.iter().filter(|name| name.contains(".nc")).count() as u64)
}

/// Runs a downloaded wget script inside the dataset directory, so the files
/// land where they belong.
pub fn script_invocation(shell: &str, script: &Path, dataset_dir: &Path) -> Invocation {
    Invocation::new(shell)
        .path(script)
        .in_dir(dataset_dir)
        .interactive()
}


// -- Tests -------------------------------------------------------------------
