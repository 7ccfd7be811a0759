//! Shared User-Agent string for upstream HTTP clients.

/// Default User-Agent for every upstream request (auth, manifest and page hosts).
#[must_use]
pub(crate) fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("chapter-stitch/{version}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_agent_is_product_and_version() {
        assert_eq!(
            default_user_agent(),
            format!("chapter-stitch/{}", env!("CARGO_PKG_VERSION"))
        );
        assert!(!default_user_agent().contains("http"));
    }
}
