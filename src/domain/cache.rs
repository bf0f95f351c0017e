/// Validators captured from the upstream response, to be replayed by the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheMetadata {
    pub etag: String,
    pub last_modified: String,
}

impl CacheMetadata {
    pub fn is_empty(&self) -> bool {
        self.etag.is_empty() && self.last_modified.is_empty()
    }
}

/// Caller-supplied validators sent as `If-None-Match` / `If-Modified-Since`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConditionalRequest {
    pub if_none_match: Option<String>,
    pub if_modified_since: Option<String>,
}

impl ConditionalRequest {
    pub fn new(if_none_match: Option<String>, if_modified_since: Option<String>) -> Self {
        Self {
            if_none_match: if_none_match.filter(|v| !v.is_empty()),
            if_modified_since: if_modified_since.filter(|v| !v.is_empty()),
        }
    }

    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.if_none_match.is_none() && self.if_modified_since.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_validators_are_dropped() {
        let conditional = ConditionalRequest::new(Some(String::new()), Some(String::new()));
        assert!(conditional.is_empty());

        let conditional = ConditionalRequest::new(Some("\"abc\"".into()), None);
        assert_eq!(conditional.if_none_match.as_deref(), Some("\"abc\""));
        assert!(!conditional.is_empty());
    }
}
