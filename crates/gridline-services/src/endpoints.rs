//! URL construction for the backend REST contract

use gridline_core::{Endpoint, GridError, QueryParams, Result};
use url::Url;

/// Normalized API root (no trailing slash)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiBase {
    root: Url,
}

impl ApiBase {
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            return Err(GridError::Configuration(
                "API base URL must not be empty".to_string(),
            ));
        }
        let root = Url::parse(trimmed)?;
        if root.cannot_be_a_base() {
            return Err(GridError::Configuration(format!(
                "API base URL '{}' cannot carry a path",
                trimmed
            )));
        }
        Ok(Self { root })
    }

    /// The base URL as configured, without trailing slash
    pub fn as_str(&self) -> &str {
        self.root.as_str().trim_end_matches('/')
    }

    /// `GET /api/tables`
    pub fn tables_url(&self) -> Result<Url> {
        self.with_segments(&["api", "tables"])
    }

    /// `/api/tables/{name}`, name encoded as a single path segment
    pub fn table_url(&self, table_name: &str) -> Result<Url> {
        self.with_segments(&["api", "tables", table_name])
    }

    pub fn endpoint_url(&self, endpoint: &Endpoint) -> Result<Url> {
        match endpoint {
            Endpoint::Table(name) => self.table_url(name),
            Endpoint::Custom(path) => self.join_path(path),
        }
    }

    /// Export endpoint for a list endpoint.
    ///
    /// Custom endpoints get `/export` appended unless they already end in it.
    pub fn export_url(&self, endpoint: &Endpoint) -> Result<Url> {
        match endpoint {
            Endpoint::Table(name) => self.with_segments(&["api", "tables", name, "export"]),
            Endpoint::Custom(path) => {
                let trimmed = path.trim_end_matches('/');
                if trimmed.ends_with("/export") {
                    self.join_path(trimmed)
                } else {
                    self.join_path(&format!("{}/export", trimmed))
                }
            }
        }
    }

    pub fn device_details_url(&self, device_id: &str) -> Result<Url> {
        self.with_segments(&["api", "devices", device_id, "details"])
    }

    pub fn device_url(&self, device_id: &str) -> Result<Url> {
        self.with_segments(&["api", "devices", device_id])
    }

    /// Join a relative path onto the base; absolute URLs are used as given.
    pub fn join_path(&self, path: &str) -> Result<Url> {
        if path.starts_with("http://") || path.starts_with("https://") {
            return Ok(Url::parse(path)?);
        }
        if path.is_empty() {
            return Ok(self.root.clone());
        }
        let separator = if path.starts_with('/') { "" } else { "/" };
        Ok(Url::parse(&format!("{}{}{}", self.as_str(), separator, path))?)
    }

    fn with_segments(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.root.clone();
        url.path_segments_mut()
            .map_err(|_| {
                GridError::Configuration(format!("'{}' cannot carry a path", self.root))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

/// Append list/export parameters to a URL
pub fn with_query(mut url: Url, params: &QueryParams) -> Url {
    let pairs = params.to_pairs();
    if !pairs.is_empty() {
        url.query_pairs_mut().extend_pairs(pairs);
    }
    url
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> ApiBase {
        ApiBase::parse("http://localhost:8000/").unwrap()
    }

    #[test]
    fn trailing_slash_is_stripped() {
        assert_eq!(base().as_str(), "http://localhost:8000");
    }

    #[test]
    fn empty_base_is_rejected() {
        assert!(matches!(
            ApiBase::parse("  "),
            Err(GridError::Configuration(_))
        ));
    }

    #[test]
    fn table_names_are_path_encoded() {
        let url = base().table_url("MT spec/sheet").unwrap();
        assert_eq!(url.as_str(), "http://localhost:8000/api/tables/MT%20spec%2Fsheet");
    }

    #[test]
    fn base_with_prefix_keeps_prefix() {
        let base = ApiBase::parse("https://example.com/grid/").unwrap();
        assert_eq!(
            base.table_url("MT_device").unwrap().as_str(),
            "https://example.com/grid/api/tables/MT_device"
        );
        assert_eq!(
            base.join_path("/api/user/devices").unwrap().as_str(),
            "https://example.com/grid/api/user/devices"
        );
    }

    #[test]
    fn absolute_custom_endpoints_are_used_verbatim() {
        let url = base()
            .endpoint_url(&Endpoint::Custom("http://other:9000/api/audit-logs".into()))
            .unwrap();
        assert_eq!(url.as_str(), "http://other:9000/api/audit-logs");
    }

    #[test]
    fn export_url_variants() {
        let b = base();
        assert_eq!(
            b.export_url(&Endpoint::Table("MT_device".into())).unwrap().as_str(),
            "http://localhost:8000/api/tables/MT_device/export"
        );
        assert_eq!(
            b.export_url(&Endpoint::Custom("/api/user/devices/".into()))
                .unwrap()
                .as_str(),
            "http://localhost:8000/api/user/devices/export"
        );
        assert_eq!(
            b.export_url(&Endpoint::Custom("/api/user/devices/export".into()))
                .unwrap()
                .as_str(),
            "http://localhost:8000/api/user/devices/export"
        );
    }

    #[test]
    fn query_is_form_encoded() {
        let params = QueryParams {
            page: Some(1),
            limit: Some(100),
            search: Some("a b".into()),
            ..Default::default()
        };
        let url = with_query(b_url(), &params);
        assert_eq!(
            url.as_str(),
            "http://localhost:8000/api/tables/t?page=1&limit=100&search=a+b"
        );
        let bare = with_query(b_url(), &QueryParams::default());
        assert_eq!(bare.as_str(), "http://localhost:8000/api/tables/t");
    }

    fn b_url() -> Url {
        base().table_url("t").unwrap()
    }
}
