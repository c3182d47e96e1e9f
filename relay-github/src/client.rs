//! GitHub API client using octocrab

use octocrab::Octocrab;
use relay_core::Secrets;
use tracing::info;

use crate::{Error, Result};

/// Page size for every paginated listing
pub(crate) const PER_PAGE: u8 = 100;

/// A page shorter than [`PER_PAGE`] is the last one
pub(crate) fn is_last_page(items: usize) -> bool {
    items < PER_PAGE as usize
}

/// GitHub client scoped to one repository
pub struct GitHubClient {
    client: Octocrab,
    owner: String,
    repo: String,
}

impl GitHubClient {
    /// Create a client authenticated with `token`
    pub fn new(owner: impl Into<String>, repo: impl Into<String>, token: String) -> Result<Self> {
        let owner = owner.into();
        let repo = repo.into();

        let client = Octocrab::builder()
            .personal_token(token)
            .build()
            .map_err(|e| Error::Auth(format!("Failed to create GitHub client: {}", e)))?;

        info!(owner = %owner, repo = %repo, "Created GitHub client");

        Ok(Self {
            client,
            owner,
            repo,
        })
    }

    /// Create a client for `owner/repo`, a GitHub URL or an SSH remote
    ///
    /// The token comes from `GITHUB_TOKEN` or `~/.config/relay/secrets.toml`.
    pub fn from_repo(repo: &str, secrets: &Secrets) -> Result<Self> {
        let (owner, name) = parse_github_url(repo)?;
        let token = secrets.github_token().ok_or_else(|| {
            Error::Auth(
                "GitHub token not found. Set GITHUB_TOKEN or add it to \
                 ~/.config/relay/secrets.toml (relay secrets init)"
                    .to_string(),
            )
        })?;
        Self::new(owner, name, token)
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn repo(&self) -> &str {
        &self.repo
    }

    pub(crate) fn client(&self) -> &Octocrab {
        &self.client
    }

    /// REST path under this repository, e.g. `pulls/1/commits`
    pub(crate) fn route(&self, path: &str) -> String {
        format!("/repos/{}/{}/{}", self.owner, self.repo, path)
    }
}

impl std::fmt::Debug for GitHubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubClient")
            .field("owner", &self.owner)
            .field("repo", &self.repo)
            .finish_non_exhaustive()
    }
}

/// Split a repository reference into owner and name
///
/// Accepts `owner/repo`, `https://github.com/owner/repo[.git]` and
/// `git@github.com:owner/repo.git`.
pub fn parse_github_url(input: &str) -> Result<(String, String)> {
    let input = input.trim();
    let invalid = || Error::Parse(format!("Invalid repository: {}. Expected owner/repo", input));

    let path = if input.starts_with("https://") || input.starts_with("http://") {
        let url = url::Url::parse(input).map_err(|e| Error::Parse(e.to_string()))?;
        url.path().trim_matches('/').to_string()
    } else if let Some(rest) = input.strip_prefix("git@") {
        rest.split_once(':').map(|(_, p)| p.to_string()).ok_or_else(invalid)?
    } else if input.contains(':') {
        return Err(invalid());
    } else {
        input.to_string()
    };

    let mut parts = path.trim_end_matches(".git").split('/');
    match (parts.next(), parts.next()) {
        (Some(owner), Some(repo)) if !owner.is_empty() && !repo.is_empty() => {
            Ok((owner.to_string(), repo.to_string()))
        }
        _ => Err(invalid()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_shorthand() {
        let (owner, repo) = parse_github_url("acme/widgets").unwrap();
        assert_eq!(owner, "acme");
        assert_eq!(repo, "widgets");
    }

    #[test]
    fn test_parse_https_url() {
        let parsed = parse_github_url("https://github.com/acme/widgets.git").unwrap();
        assert_eq!(parsed, ("acme".to_string(), "widgets".to_string()));

        let deep = parse_github_url("https://github.com/acme/widgets/pull/3").unwrap();
        assert_eq!(deep.1, "widgets");
    }

    #[test]
    fn test_parse_ssh_url() {
        let (owner, repo) = parse_github_url("git@github.com:acme/widgets.git").unwrap();
        assert_eq!(owner, "acme");
        assert_eq!(repo, "widgets");
    }

    #[test]
    fn test_parse_invalid() {
        assert!(parse_github_url("widgets").is_err());
        assert!(parse_github_url("/widgets").is_err());
        assert!(parse_github_url("ftp:acme/widgets").is_err());
    }

    #[test]
    fn test_last_page_detection() {
        assert!(is_last_page(0));
        assert!(is_last_page(30));
        assert!(!is_last_page(100));
    }

    #[tokio::test]
    async fn test_route() {
        let client = GitHubClient::new("acme", "widgets", "t".to_string()).unwrap();
        assert_eq!(client.route("pulls/1/reviews"), "/repos/acme/widgets/pulls/1/reviews");
    }
}
