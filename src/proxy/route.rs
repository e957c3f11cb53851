//! Route table and path matching.
//!
//! Routes are built once from configuration and immutable afterwards.
//! Matching walks the table in declaration order and stops at the first
//! pattern that applies.

use crate::config::{Config, RouteRule};
use crate::proxy::target::Target;
use anyhow::Context;
use url::Url;

/// A path-matching expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pattern {
    /// A literal, segment-aligned prefix: `/api` matches `/api` and
    /// `/api/items` but never `/apiary`.
    Prefix(String),

    /// A named single-segment capture: matches exactly one leading path
    /// segment, never zero and never more.
    Capture(String),
}

/// The outcome of a successful pattern match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathMatch {
    /// Value bound by a `Capture` pattern.
    pub captured: Option<String>,

    /// Unmatched path suffix; empty or starting with `/`.
    pub remainder: String,
}

impl Pattern {
    /// Tests this pattern against a query-less request path.
    pub fn matches(&self, path: &str) -> Option<PathMatch> {
        match self {
            Pattern::Prefix(prefix) => {
                if prefix == "/" {
                    // Catch-all: the whole path is the remainder.
                    return Some(PathMatch {
                        captured: None,
                        remainder: path.to_string(),
                    });
                }

                let rest = path.strip_prefix(prefix.as_str())?;
                if rest.is_empty() || rest.starts_with('/') {
                    Some(PathMatch {
                        captured: None,
                        remainder: rest.to_string(),
                    })
                } else {
                    // Raw string prefix but not segment-aligned
                    None
                }
            }

            Pattern::Capture(_) => {
                let rest = path.strip_prefix('/')?;
                let (segment, remainder) = match rest.find('/') {
                    Some(i) => (&rest[..i], &rest[i..]),
                    None => (rest, ""),
                };

                if segment.is_empty() {
                    return None;
                }

                Some(PathMatch {
                    captured: Some(segment.to_string()),
                    remainder: remainder.to_string(),
                })
            }
        }
    }

    /// The capture variable name, if any.
    pub fn capture_name(&self) -> Option<&str> {
        match self {
            Pattern::Capture(name) => Some(name.as_str()),
            Pattern::Prefix(_) => None,
        }
    }
}

/// A rule mapping a path pattern to an upstream target.
#[derive(Debug, Clone)]
pub struct Route {
    pub pattern: Pattern,
    pub target: Target,
}

impl Route {
    /// Builds a route from one config rule, rejecting malformed rules.
    pub fn from_rule(rule: &RouteRule) -> anyhow::Result<Self> {
        match (&rule.prefix, &rule.capture) {
            (Some(prefix), None) => {
                if !prefix.starts_with('/') {
                    anyhow::bail!("prefix {prefix:?} must start with '/'");
                }
                if prefix.len() > 1 && prefix.ends_with('/') {
                    anyhow::bail!("prefix {prefix:?} must not end with '/'");
                }

                let origin = rule
                    .origin
                    .as_deref()
                    .with_context(|| format!("prefix route {prefix:?} needs an origin"))?;

                Ok(Route {
                    pattern: Pattern::Prefix(prefix.clone()),
                    target: Target::origin(origin, rule.strip_prefix)?,
                })
            }

            (None, Some(capture)) => {
                let name = capture.trim_start_matches(':');
                if name.is_empty() {
                    anyhow::bail!("capture name cannot be empty");
                }

                let template = rule
                    .target
                    .as_deref()
                    .with_context(|| format!("capture route {name:?} needs a target template"))?;

                Ok(Route {
                    pattern: Pattern::Capture(name.to_string()),
                    target: Target::template(template, name)?,
                })
            }

            _ => anyhow::bail!("route must set exactly one of `prefix` or `capture`"),
        }
    }

    /// Computes the upstream URL for a request this route matched.
    pub fn resolve(
        &self,
        path: &str,
        m: &PathMatch,
        query: Option<&str>,
    ) -> Result<Url, crate::proxy::target::ResolveError> {
        match (self.pattern.capture_name(), m.captured.as_deref()) {
            (Some(name), Some(value)) => {
                self.target.resolve(path, &[(name, value)], &m.remainder, query)
            }
            _ => self.target.resolve(path, &[], &m.remainder, query),
        }
    }
}

/// The ordered route table. Read-only after startup, shared across
/// connection tasks without locking.
#[derive(Debug, Clone)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    /// Builds a table from routes in declaration order. A fallback origin,
    /// when present, becomes a terminal catch-all that forwards the full
    /// original path.
    pub fn new(routes: Vec<Route>, fallback: Option<Target>) -> Self {
        let mut routes = routes;
        if let Some(target) = fallback {
            routes.push(Route {
                pattern: Pattern::Prefix("/".to_string()),
                target,
            });
        }
        Self { routes }
    }

    pub fn from_config(cfg: &Config) -> anyhow::Result<Self> {
        let mut routes = Vec::with_capacity(cfg.routes.len());
        for (i, rule) in cfg.routes.iter().enumerate() {
            let route = Route::from_rule(rule).with_context(|| format!("route #{}", i + 1))?;
            routes.push(route);
        }

        let fallback = match &cfg.fallback {
            Some(origin) => Some(
                Target::origin(origin, false).context("fallback origin")?,
            ),
            None => None,
        };

        Ok(Self::new(routes, fallback))
    }

    /// Returns the first route whose pattern matches `path`, or `None`
    /// when the path matches no rule.
    pub fn find(&self, path: &str) -> Option<(&Route, PathMatch)> {
        self.routes
            .iter()
            .find_map(|route| route.pattern.matches(path).map(|m| (route, m)))
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
