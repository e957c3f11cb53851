//! Upstream target resolution.
//!
//! A target is either a constant origin or a URL template over the
//! segments a route captured. Resolution produces the full upstream URL
//! for one request and fails fast on anything that would not be a valid
//! `http` URL.

use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("target URL is not valid: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("target URL has no host")]
    MissingHost,

    #[error("scheme {0:?} is not allowed for upstream targets")]
    DisallowedScheme(String),

    #[error("origin {0:?} must be scheme://host[:port] with no path or query")]
    OriginNotBare(String),

    #[error("template placeholder {{{0}}} is not bound by the route pattern")]
    UnboundPlaceholder(String),

    #[error("malformed target template: {0}")]
    BadTemplate(String),
}

/// Where a matched request is forwarded.
#[derive(Debug, Clone)]
pub enum Target {
    /// A fixed origin. The forwarded path is the unmatched remainder when
    /// `strip_prefix` is set, the full original path otherwise.
    Origin { origin: Url, strip_prefix: bool },

    /// A URL template over captured segments, e.g. `http://{host}:9100`.
    /// The unmatched remainder is appended to the rendered URL's path.
    Template { template: String },
}

impl Target {
    /// Parses and validates a constant origin.
    pub fn origin(origin: &str, strip_prefix: bool) -> Result<Self, ResolveError> {
        let url = Url::parse(origin)?;
        validate_upstream(&url)?;

        if url.path() != "/" || url.query().is_some() || url.fragment().is_some() {
            return Err(ResolveError::OriginNotBare(origin.to_string()));
        }

        Ok(Target::Origin {
            origin: url,
            strip_prefix,
        })
    }

    /// Validates a URL template against the route's capture name, then
    /// stores it. Rendering with a probe value catches templates that could
    /// never produce a valid upstream URL before the proxy starts serving.
    /// The probe is `0`, which is valid in host, port, and path position.
    pub fn template(template: &str, capture_name: &str) -> Result<Self, ResolveError> {
        let rendered = render(template, &[(capture_name, "0")])?;
        let url = Url::parse(&rendered)?;
        validate_upstream(&url)?;

        Ok(Target::Template {
            template: template.to_string(),
        })
    }

    /// Computes the upstream URL for one request.
    ///
    /// `path` is the original query-less request path, `captures` the
    /// segments bound by the pattern, `remainder` the unmatched suffix,
    /// and `query` the original query string, carried over verbatim.
    pub fn resolve(
        &self,
        path: &str,
        captures: &[(&str, &str)],
        remainder: &str,
        query: Option<&str>,
    ) -> Result<Url, ResolveError> {
        let mut url = match self {
            Target::Origin { origin, strip_prefix } => {
                let forward_path = if *strip_prefix { remainder } else { path };
                let mut url = origin.clone();
                url.set_path(if forward_path.is_empty() { "/" } else { forward_path });
                url
            }

            Target::Template { template } => {
                let rendered = render(template, captures)?;
                let mut url = Url::parse(&rendered)?;
                validate_upstream(&url)?;

                if !remainder.is_empty() {
                    let base = url.path().trim_end_matches('/').to_string();
                    url.set_path(&format!("{base}{remainder}"));
                }
                url
            }
        };

        url.set_query(query);
        Ok(url)
    }
}

fn validate_upstream(url: &Url) -> Result<(), ResolveError> {
    if url.scheme() != "http" {
        return Err(ResolveError::DisallowedScheme(url.scheme().to_string()));
    }

    if url.host_str().map(str::is_empty).unwrap_or(true) {
        return Err(ResolveError::MissingHost);
    }

    Ok(())
}

/// Substitutes `{name}` placeholders with captured segment values.
fn render(template: &str, captures: &[(&str, &str)]) -> Result<String, ResolveError> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];

        let close = after
            .find('}')
            .ok_or_else(|| ResolveError::BadTemplate("unclosed '{'".to_string()))?;

        let name = &after[..close];
        let value = captures
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| *v)
            .ok_or_else(|| ResolveError::UnboundPlaceholder(name.to_string()))?;

        out.push_str(value);
        rest = &after[close + 1..];
    }

    out.push_str(rest);
    Ok(out)
}
