//! # Image Audit
//!
//! Checks what visitors actually get for a list of stored image references.
//!
//! ## Flow
//! 1. Resolve every reference with the same [`UrlBuilder`] the pages use.
//! 2. Request the resolved path from the running site.
//! 3. Sort the answer into a real image, a placeholder (with the `x-image-fallback` code) or a hard failure.
//!
//! Placeholders are expected for empty references. Anything else falling back
//! usually means a dead upload or a partner CDN blocking us.
//!
//! ## Example
//! ```sh
//! cargo run -p audit -- --site http://localhost:1111 --file references.txt --strict
//! ```
use std::{collections::BTreeMap, path::Path, time::Duration};

use imaging::{ResolvedTarget, UrlBuilder};
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::{Client, header::CONTENT_TYPE};
use url::Url;

pub const FALLBACK_HEADER: &str = "x-image-fallback";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Image { content_type: String, bytes: usize },
    Placeholder { reason: Option<String> },
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct Probe {
    pub reference: String,
    pub target: ResolvedTarget,
    pub outcome: ProbeOutcome,
}

impl Probe {
    /// Empty references are meant to render the placeholder.
    pub fn is_expected(&self) -> bool {
        match (&self.target, &self.outcome) {
            (_, ProbeOutcome::Image { .. }) => true,
            (ResolvedTarget::Placeholder(_), ProbeOutcome::Placeholder { .. }) => {
                self.reference.trim().is_empty()
            }
            _ => false,
        }
    }
}

#[derive(Debug, Default)]
pub struct Report {
    pub probes: Vec<Probe>,
}

impl Report {
    pub fn all_served(&self) -> bool {
        self.probes.iter().all(Probe::is_expected)
    }

    /// Count of probes per target kind.
    pub fn by_target(&self) -> BTreeMap<&'static str, usize> {
        let mut counts = BTreeMap::new();
        for probe in &self.probes {
            *counts.entry(probe.target.kind()).or_default() += 1;
        }
        counts
    }

    /// Count of placeholder fallbacks per reason code.
    pub fn fallbacks(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for probe in &self.probes {
            if let ProbeOutcome::Placeholder { reason } = &probe.outcome {
                let reason = reason.clone().unwrap_or_else(|| "placeholder-asset".to_string());
                *counts.entry(reason).or_default() += 1;
            }
        }
        counts
    }

    pub fn print(&self) {
        for probe in self.probes.iter().filter(|probe| !probe.is_expected()) {
            println!("{:?} -> {}", probe.reference, probe.target);
            match &probe.outcome {
                ProbeOutcome::Placeholder { reason } => {
                    println!("  placeholder ({})", reason.as_deref().unwrap_or("none"))
                }
                ProbeOutcome::Failed(e) => println!("  failed: {e}"),
                ProbeOutcome::Image { .. } => {}
            }
        }

        println!("\nReferences: {}", self.probes.len());
        for (kind, count) in self.by_target() {
            println!("  {kind}: {count}");
        }

        let fallbacks = self.fallbacks();
        if fallbacks.is_empty() {
            println!("No placeholders served.");
        } else {
            println!("Placeholders:");
            for (reason, count) in fallbacks {
                println!("  {reason}: {count}");
            }
        }
    }
}

pub struct Audit {
    client: Client,
    site: Url,
    builder: UrlBuilder,
}

impl Audit {
    pub fn new(site: Url, builder: UrlBuilder) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        Ok(Self {
            client,
            site,
            builder,
        })
    }

    pub async fn run(&self, references: &[String]) -> Report {
        let pb = ProgressBar::new(references.len() as u64);
        if let Ok(style) = ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
        ) {
            pb.set_style(style.progress_chars("=> "));
        }

        let mut report = Report::default();

        for reference in references {
            pb.set_message(format!("Probing {reference}"));
            report.probes.push(self.probe(reference).await);
            pb.inc(1);
        }

        pb.finish_with_message("Done");
        report
    }

    pub async fn probe(&self, reference: &str) -> Probe {
        let target = self.builder.target(Some(reference));

        let outcome = match self.site.join(target.path()) {
            Ok(url) => self.fetch(&target, url).await,
            Err(e) => ProbeOutcome::Failed(format!("cannot build request url: {e}")),
        };

        Probe {
            reference: reference.to_string(),
            target,
            outcome,
        }
    }

    async fn fetch(&self, target: &ResolvedTarget, url: Url) -> ProbeOutcome {
        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(e) => return ProbeOutcome::Failed(e.to_string()),
        };

        let status = response.status();
        if !status.is_success() {
            return ProbeOutcome::Failed(format!("status {status}"));
        }

        let header = |name: &str| {
            response
                .headers()
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string)
        };

        let reason = header(FALLBACK_HEADER);
        let content_type = header(CONTENT_TYPE.as_str()).unwrap_or_default();

        let bytes = match response.bytes().await {
            Ok(bytes) => bytes.len(),
            Err(e) => return ProbeOutcome::Failed(e.to_string()),
        };

        if reason.is_some() || matches!(target, ResolvedTarget::Placeholder(_)) {
            ProbeOutcome::Placeholder { reason }
        } else {
            ProbeOutcome::Image {
                content_type,
                bytes,
            }
        }
    }
}

pub async fn read_references(path: &Path) -> std::io::Result<Vec<String>> {
    let contents = tokio::fs::read_to_string(path).await?;

    Ok(contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}
