//! Parsing of user-supplied repository references.
//!
//! Accepts `owner/repo` or a `github.com` URL such as
//! `https://github.com/owner/repo.git`.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;
use url::Url;

static NAME_SEGMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_.-]+$").unwrap_or_else(|err| panic!("invalid name pattern: {err}"))
});

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepoRefError {
    #[error("Invalid GitHub URL")]
    InvalidUrl,

    #[error("Invalid repository format. Use owner/repo format")]
    InvalidFormat,

    #[error("Could not extract owner and repository name")]
    MissingParts,
}

/// Owner and name of an upstream repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoRef {
    pub owner: String,
    pub name: String,
}

impl RepoRef {
    pub fn parse(input: &str) -> Result<Self, RepoRefError> {
        let input = input.trim();

        let (owner, name) = if input.contains("github.com") {
            Self::parts_from_url(input)?
        } else {
            let parts: Vec<&str> = input.split('/').collect();
            if parts.len() != 2 {
                return Err(RepoRefError::InvalidFormat);
            }
            (parts[0].to_string(), parts[1].to_string())
        };

        let name = name.strip_suffix(".git").map(str::to_string).unwrap_or(name);
        if owner.is_empty() || name.is_empty() {
            return Err(RepoRefError::MissingParts);
        }
        if !NAME_SEGMENT.is_match(&owner) || !NAME_SEGMENT.is_match(&name) {
            return Err(RepoRefError::InvalidFormat);
        }

        Ok(Self { owner, name })
    }

    fn parts_from_url(input: &str) -> Result<(String, String), RepoRefError> {
        let with_scheme = if input.contains("://") {
            input.to_string()
        } else {
            format!("https://{}", input)
        };
        let url = Url::parse(&with_scheme).map_err(|_| RepoRefError::InvalidUrl)?;

        let segments: Vec<&str> = url
            .path_segments()
            .map(|segments| segments.filter(|s| !s.is_empty()).collect())
            .unwrap_or_default();
        match segments.as_slice() {
            [owner, name, ..] => Ok((owner.to_string(), name.to_string())),
            _ => Err(RepoRefError::InvalidUrl),
        }
    }

    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}
