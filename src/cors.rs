use axum::http::{
    HeaderMap, HeaderValue,
    header::{
        ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
        ORIGIN,
    },
};

use crate::error::AppError;

/// Fixed allow-list of browser origins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginPolicy {
    allowed: Vec<String>,
}

impl OriginPolicy {
    // None when the list is empty, which turns origin checking off
    pub fn from_list(list: &str) -> Option<Self> {
        let allowed: Vec<String> = list
            .split(',')
            .map(|s| s.trim().trim_end_matches('/'))
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();

        (!allowed.is_empty()).then_some(Self { allowed })
    }

    pub fn allows(&self, origin: &str) -> bool {
        self.allowed.iter().any(|allowed| allowed == origin)
    }

    /// Returns the headers to attach to the response, or rejects a foreign origin.
    /// Requests without an `Origin` header pass with no headers.
    pub fn check(&self, request_headers: &HeaderMap) -> Result<HeaderMap, AppError> {
        let mut headers = HeaderMap::new();

        let Some(origin) = request_headers.get(ORIGIN) else {
            return Ok(headers);
        };

        let allowed = origin.to_str().map(|o| self.allows(o)).unwrap_or(false);
        if !allowed {
            return Err(AppError::OriginNotAllowed);
        }

        headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, origin.clone());
        headers.insert(ACCESS_CONTROL_ALLOW_METHODS, HeaderValue::from_static("POST"));
        headers.insert(ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_static("Content-Type"));
        Ok(headers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> OriginPolicy {
        OriginPolicy::from_list("https://feedback.example, https://www.feedback.example/").unwrap()
    }

    #[test]
    fn empty_list_disables_checking() {
        assert!(OriginPolicy::from_list("").is_none());
        assert!(OriginPolicy::from_list(" , ").is_none());
    }

    #[test]
    fn allowed_origin_is_echoed() {
        let mut request = HeaderMap::new();
        request.insert(ORIGIN, HeaderValue::from_static("https://www.feedback.example"));

        let headers = policy().check(&request).unwrap();

        assert_eq!(headers[ACCESS_CONTROL_ALLOW_ORIGIN], "https://www.feedback.example");
        assert_eq!(headers[ACCESS_CONTROL_ALLOW_METHODS], "POST");
        assert_eq!(headers[ACCESS_CONTROL_ALLOW_HEADERS], "Content-Type");
    }

    #[test]
    fn foreign_origin_is_rejected() {
        let mut request = HeaderMap::new();
        request.insert(ORIGIN, HeaderValue::from_static("https://evil.example"));

        assert!(matches!(policy().check(&request), Err(AppError::OriginNotAllowed)));
    }

    #[test]
    fn missing_origin_passes_without_headers() {
        assert!(policy().check(&HeaderMap::new()).unwrap().is_empty());
    }
}
