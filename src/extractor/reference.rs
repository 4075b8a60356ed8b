//! Shape rules for embedded repository references

use crate::core::{RmuError, RmuResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// `/`-separated pieces after the scheme: the empty piece, host, owner, repo
/// and at least one more, so bare repository roots are rejected.
const MIN_SEGMENTS_AFTER_SCHEME: usize = 5;

/// Check that `candidate` is an absolute http(s) URL on `domain` pointing
/// below a repository root. Returns the URL unchanged on success.
pub fn validate_reference(candidate: &str, domain: &str) -> RmuResult<String> {
    let invalid = |reason: &str| RmuError::ReferenceInvalid {
        url: candidate.to_string(),
        reason: reason.to_string(),
    };

    let parsed = Url::parse(candidate).map_err(|_| invalid("not an absolute URL"))?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(invalid("scheme is not http or https"));
    }

    let host = parsed.host_str().ok_or_else(|| invalid("missing host"))?;
    if !host.ends_with(&domain.to_ascii_lowercase()) {
        return Err(invalid("not hosted on the expected domain"));
    }

    let segments = candidate.trim_end_matches('/').split('/').skip(1).count();
    if segments < MIN_SEGMENTS_AFTER_SCHEME {
        return Err(invalid("too few path segments"));
    }

    Ok(candidate.to_string())
}

/// Owner and name of a hosted repository
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepositoryRef {
    pub owner: String,
    pub name: String,
}

impl RepositoryRef {
    pub fn new(owner: &str, name: &str) -> RmuResult<Self> {
        if owner.is_empty() || name.is_empty() {
            return Err(RmuError::ReferenceInvalid {
                url: format!("{}/{}", owner, name),
                reason: "empty owner or repository name".to_string(),
            });
        }
        Ok(Self {
            owner: owner.to_string(),
            name: name.to_string(),
        })
    }

    /// Derive owner/repo from the 4th and 5th `/`-separated pieces of a reference URL
    pub fn from_url(url: &str) -> RmuResult<Self> {
        let parts: Vec<&str> = url.split('/').collect();
        match (parts.get(3), parts.get(4)) {
            (Some(owner), Some(name)) => Self::new(owner, name),
            _ => Err(RmuError::ReferenceInvalid {
                url: url.to_string(),
                reason: "no owner/repository in path".to_string(),
            }),
        }
    }
}

impl fmt::Display for RepositoryRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}
