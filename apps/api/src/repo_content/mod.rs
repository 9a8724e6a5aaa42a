//! Fetches a bounded, ranked slice of a project's source from the repository host.
//!
//! Ranking and bounding are pure (`rank_paths`, `bound_contents`); the GitHub
//! fetcher only lists the tree and downloads raw blobs in ranked order.
//! Credential refresh for the hosting integration is handled elsewhere; this
//! module takes whatever token it is given.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::models::project::Project;

pub const MAX_TOTAL_CHARS: usize = 100_000;
pub const MAX_FILE_CHARS: usize = 8_000;
pub const MAX_FILES: usize = 75;

/// Blobs larger than this are skipped before download.
const MAX_BLOB_BYTES: u64 = 200_000;
const GITHUB_API_URL: &str = "https://api.github.com";
const GITHUB_RAW_URL: &str = "https://raw.githubusercontent.com";
const USER_AGENT: &str = "assess-api";

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Repository host returned {status} for {repo}: {message}")]
    Api {
        status: u16,
        repo: String,
        message: String,
    },

    #[error("No analyzable files found in {0}")]
    NoAnalyzableFiles(String),
}

/// One file handed to the analysis prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceFile {
    pub path: String,
    pub content: String,
}

/// "Fetch file content for project X". Returns files in priority order,
/// already filtered and size-bounded.
#[async_trait]
pub trait RepoContentSource: Send + Sync {
    async fn fetch_files(&self, project: &Project) -> Result<Vec<SourceFile>, ContentError>;
}

// ────────────────────────────────────────────────────────────────────────────
// Ranking
// ────────────────────────────────────────────────────────────────────────────

const EXCLUDED_DIRS: &[&str] = &[
    "node_modules",
    "vendor",
    "dist",
    "build",
    "target",
    "out",
    ".git",
    ".next",
    "__pycache__",
    "coverage",
    ".venv",
    "venv",
    "obj",
];

const LOCKFILES: &[&str] = &[
    "package-lock.json",
    "yarn.lock",
    "pnpm-lock.yaml",
    "cargo.lock",
    "poetry.lock",
    "gemfile.lock",
    "composer.lock",
    "go.sum",
];

const SOURCE_EXTENSIONS: &[&str] = &[
    "rs", "py", "js", "jsx", "ts", "tsx", "go", "java", "kt", "swift", "rb", "php", "cs", "c",
    "cc", "cpp", "h", "hpp", "scala", "ex", "exs", "dart", "vue", "svelte", "sql",
];

const CONFIG_EXTENSIONS: &[&str] = &["toml", "json", "yaml", "yml", "ini", "cfg", "xml", "gradle"];

const ENTRY_POINT_STEMS: &[&str] = &["main", "index", "app", "server", "lib", "program", "manage"];

const MANIFESTS: &[&str] = &[
    "cargo.toml",
    "package.json",
    "pyproject.toml",
    "requirements.txt",
    "go.mod",
    "pom.xml",
    "build.gradle",
    "gemfile",
    "composer.json",
];

const DOMAIN_DIRS: &[&str] = &[
    "src",
    "lib",
    "app",
    "core",
    "domain",
    "services",
    "service",
    "api",
    "handlers",
    "controllers",
    "models",
    "components",
    "pkg",
    "internal",
];

const TEST_DIRS: &[&str] = &["test", "tests", "__tests__", "spec", "specs", "e2e"];

/// Priority tier of a path; lower is fetched first. `None` means skip.
///
/// 0 entry points, 1 manifest/readme, 2 domain source folders,
/// 3 other source, 4 tests and config.
pub fn path_priority(path: &str) -> Option<u8> {
    let lower = path.to_lowercase();
    let segments: Vec<&str> = lower.split('/').collect();
    let file_name = *segments.last()?;
    let dirs = &segments[..segments.len() - 1];

    if dirs.iter().any(|d| EXCLUDED_DIRS.contains(d)) || LOCKFILES.contains(&file_name) {
        return None;
    }
    // Dotfiles may carry secrets (.env) and say little about the code.
    if file_name.starts_with('.') || file_name.ends_with(".min.js") || file_name.ends_with(".map") {
        return None;
    }

    let (stem, ext) = match file_name.rsplit_once('.') {
        Some((stem, ext)) => (stem, ext),
        None => (file_name, ""),
    };

    if file_name.starts_with("readme") || MANIFESTS.contains(&file_name) {
        return Some(1);
    }

    let is_source = SOURCE_EXTENSIONS.contains(&ext);
    let is_config = CONFIG_EXTENSIONS.contains(&ext);
    if !is_source && !is_config {
        return None;
    }

    let is_test = dirs.iter().any(|d| TEST_DIRS.contains(d))
        || stem.ends_with(".test")
        || stem.ends_with(".spec")
        || stem.ends_with("_test")
        || stem.starts_with("test_");
    if is_test || !is_source {
        return Some(4);
    }
    if ENTRY_POINT_STEMS.contains(&stem) {
        return Some(0);
    }
    if dirs.iter().any(|d| DOMAIN_DIRS.contains(d)) {
        return Some(2);
    }
    Some(3)
}

/// Filters and orders candidate paths, shallow paths first within a tier,
/// capped at `MAX_FILES`.
pub fn rank_paths<I, S>(paths: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut ranked: Vec<(u8, usize, String)> = paths
        .into_iter()
        .map(Into::into)
        .filter_map(|p| {
            let tier = path_priority(&p)?;
            let depth = p.matches('/').count();
            Some((tier, depth, p))
        })
        .collect();

    ranked.sort();
    ranked.into_iter().take(MAX_FILES).map(|(_, _, p)| p).collect()
}

/// Applies the per-file and total character limits, preserving order.
/// The file that crosses the total limit is cut to fit; later files are dropped.
pub fn bound_contents(files: Vec<SourceFile>) -> Vec<SourceFile> {
    let mut remaining = MAX_TOTAL_CHARS;
    let mut bounded = Vec::new();

    for file in files.into_iter().take(MAX_FILES) {
        if remaining == 0 {
            break;
        }
        let limit = MAX_FILE_CHARS.min(remaining);
        let content = truncate_chars(&file.content, limit);
        let used = content.chars().count();
        if used == 0 {
            continue;
        }
        remaining -= used;
        bounded.push(SourceFile {
            path: file.path,
            content,
        });
    }

    bounded
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => text[..byte_idx].to_string(),
        None => text.to_string(),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// GitHub implementation
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct TreeResponse {
    tree: Vec<TreeEntry>,
    #[serde(default)]
    truncated: bool,
}

#[derive(Debug, Deserialize)]
struct TreeEntry {
    path: String,
    #[serde(rename = "type")]
    entry_type: String,
    size: Option<u64>,
}

/// Reads repositories through the GitHub REST API.
#[derive(Clone)]
pub struct GithubContentSource {
    client: Client,
    token: Option<String>,
}

impl GithubContentSource {
    pub fn new(token: Option<String>) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .user_agent(USER_AGENT)
                .build()
                .expect("Failed to build HTTP client"),
            token,
        }
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn list_tree(&self, project: &Project) -> Result<Vec<String>, ContentError> {
        let url = format!(
            "{GITHUB_API_URL}/repos/{}/{}/git/trees/{}?recursive=1",
            project.repo_owner, project.repo_name, project.branch
        );
        let response = self
            .authorized(self.client.get(&url))
            .header("accept", "application/vnd.github+json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ContentError::Api {
                status: status.as_u16(),
                repo: project.source_ref(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        let tree: TreeResponse = response.json().await?;
        if tree.truncated {
            warn!("Tree listing for {} was truncated", project.source_ref());
        }

        Ok(tree
            .tree
            .into_iter()
            .filter(|e| e.entry_type == "blob" && e.size.unwrap_or(0) <= MAX_BLOB_BYTES)
            .map(|e| e.path)
            .collect())
    }

    async fn fetch_raw(&self, project: &Project, path: &str) -> Result<String, ContentError> {
        let url = format!(
            "{GITHUB_RAW_URL}/{}/{}/{}/{}",
            project.repo_owner, project.repo_name, project.branch, path
        );
        let response = self.authorized(self.client.get(&url)).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ContentError::Api {
                status: status.as_u16(),
                repo: project.source_ref(),
                message: format!("failed to fetch {path}"),
            });
        }
        Ok(response.text().await?)
    }
}

#[async_trait]
impl RepoContentSource for GithubContentSource {
    async fn fetch_files(&self, project: &Project) -> Result<Vec<SourceFile>, ContentError> {
        let paths = rank_paths(self.list_tree(project).await?);
        debug!("{} ranked paths for {}", paths.len(), project.source_ref());

        let mut files = Vec::with_capacity(paths.len());
        let mut total = 0usize;
        for path in paths {
            if total >= MAX_TOTAL_CHARS {
                break;
            }
            match self.fetch_raw(project, &path).await {
                Ok(content) => {
                    total += content.chars().count().min(MAX_FILE_CHARS);
                    files.push(SourceFile { path, content });
                }
                // One unreadable file should not sink the whole project.
                Err(e) => warn!("Skipping {path} in {}: {e}", project.source_ref()),
            }
        }

        let files = bound_contents(files);
        if files.is_empty() {
            return Err(ContentError::NoAnalyzableFiles(project.source_ref()));
        }

        info!(
            "Fetched {} files for {}",
            files.len(),
            project.source_ref()
        );
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_points_rank_before_manifests_and_domain_source() {
        let ranked = rank_paths([
            "src/services/billing.rs",
            "README.md",
            "src/main.rs",
            "Cargo.toml",
            "scripts/deploy.py",
        ]);
        assert_eq!(ranked[0], "src/main.rs");
        assert_eq!(&ranked[1..3], ["Cargo.toml", "README.md"]);
        assert_eq!(ranked[3], "src/services/billing.rs");
        assert_eq!(ranked[4], "scripts/deploy.py");
    }

    #[test]
    fn test_tests_and_config_rank_last() {
        let ranked = rank_paths(["tests/api_test.rs", "config/settings.yaml", "utils/strings.go"]);
        assert_eq!(ranked[0], "utils/strings.go");
        assert_eq!(path_priority("tests/api_test.rs"), Some(4));
        assert_eq!(path_priority("config/settings.yaml"), Some(4));
        assert_eq!(path_priority("web/button.spec.ts"), Some(4));
    }

    #[test]
    fn test_vendored_lock_and_binary_paths_are_excluded() {
        assert_eq!(path_priority("node_modules/react/index.js"), None);
        assert_eq!(path_priority("Cargo.lock"), None);
        assert_eq!(path_priority("assets/logo.png"), None);
        assert_eq!(path_priority("public/app.min.js"), None);
        assert_eq!(path_priority("target/debug/build.rs"), None);
        assert_eq!(path_priority(".env"), None);
    }

    #[test]
    fn test_rank_paths_caps_file_count() {
        let paths: Vec<String> = (0..200).map(|i| format!("src/module_{i}.rs")).collect();
        assert_eq!(rank_paths(paths).len(), MAX_FILES);
    }

    #[test]
    fn test_bound_contents_truncates_each_file() {
        let files = vec![SourceFile {
            path: "src/main.rs".to_string(),
            content: "x".repeat(MAX_FILE_CHARS + 500),
        }];
        let bounded = bound_contents(files);
        assert_eq!(bounded[0].content.len(), MAX_FILE_CHARS);
    }

    #[test]
    fn test_bound_contents_respects_total_budget() {
        let files: Vec<SourceFile> = (0..20)
            .map(|i| SourceFile {
                path: format!("src/f{i}.rs"),
                content: "y".repeat(MAX_FILE_CHARS),
            })
            .collect();
        let bounded = bound_contents(files);
        let total: usize = bounded.iter().map(|f| f.content.chars().count()).sum();
        assert_eq!(total, MAX_TOTAL_CHARS);
        // 12 full files + one cut to 4,000 characters.
        assert_eq!(bounded.len(), 13);
        assert_eq!(bounded[12].content.len(), 4_000);
    }

    #[test]
    fn test_truncate_chars_respects_utf8_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }
}
