//! Append-only route table.

use crate::routing::matcher::{compile, split_segments, strip_query, CompiledRoute};

/// A compiled pattern together with its handler.
#[derive(Debug, Clone)]
pub struct Route<H> {
    compiled: CompiledRoute,
    handler: H,
}

impl<H> Route<H> {
    pub fn compiled(&self) -> &CompiledRoute {
        &self.compiled
    }

    pub fn pattern(&self) -> &str {
        self.compiled.pattern()
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }
}

/// Ordered routes; the first registered match wins.
#[derive(Debug, Clone)]
pub struct Router<H> {
    routes: Vec<Route<H>>,
}

impl<H> Default for Router<H> {
    fn default() -> Self {
        Self { routes: Vec::new() }
    }
}

impl<H> Router<H> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pattern. Duplicates are allowed; the earlier one shadows the later.
    pub fn add_route(&mut self, pattern: &str, handler: H) {
        let compiled = compile(pattern);
        tracing::debug!(
            pattern = %pattern,
            depth = compiled.depth(),
            params = compiled.params().len(),
            "Route registered"
        );
        self.routes.push(Route { compiled, handler });
    }

    /// Find the first route matching `path` (query string ignored).
    pub fn match_path(&self, path: &str) -> Option<&Route<H>> {
        let segments = split_segments(strip_query(path));
        self.routes
            .iter()
            .filter(|route| route.compiled.depth() == segments.len())
            .find(|route| route.compiled.matches(&segments))
    }

    pub fn routes(&self) -> &[Route<H>] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SUPI_URL: &str = "example.com/nudm-sdm/v1/imsi-23591000001?dataset-names=name1,name2,name3&other-param=value-23591000001";

    fn router() -> Router<&'static str> {
        let mut router = Router::new();
        router.add_route("example.com/nudm-sdm/v1/{supi}", "supi");
        router.add_route("example.com/namf-comm/v1/ue-contexts/{ueContextId}", "context");
        router.add_route(
            "example.com/namf-comm/v1/ue-contexts/{ueContextId}/release",
            "release",
        );
        router
    }

    #[test]
    fn routes_by_depth_and_literals() {
        let router = router();
        assert_eq!(*router.match_path(SUPI_URL).unwrap().handler(), "supi");
        assert_eq!(
            *router
                .match_path("example.com/namf-comm/v1/ue-contexts/5g-guti-000001111111")
                .unwrap()
                .handler(),
            "context"
        );
        assert_eq!(
            *router
                .match_path("example.com/namf-comm/v1/ue-contexts/5g-guti-000001111111/release")
                .unwrap()
                .handler(),
            "release"
        );
        assert!(router
            .match_path("example.com/nudm-sdm/v2/imsi-23591000001")
            .is_none());
    }

    #[test]
    fn first_registration_wins() {
        let mut router = Router::new();
        router.add_route("/api/{a}", 1);
        router.add_route("/api/{b}", 2);
        router.add_route("/api/fixed", 3);
        assert_eq!(*router.match_path("/api/fixed").unwrap().handler(), 1);
        assert_eq!(router.len(), 3);
    }

    #[test]
    fn depth_must_be_equal() {
        let mut router = Router::new();
        router.add_route("/api/v1/ping", ());
        assert!(router.match_path("/api/v1/ping").is_some());
        assert!(router.match_path("/api/v1/ping?x=1").is_some());
        assert!(router.match_path("/api/v1").is_none());
        assert!(router.match_path("/api/v1/ping/more").is_none());
        assert!(Router::<()>::new().match_path("/").is_none());
    }
}
