//! Console routes and the login guard.
//!
//! Routes live under the configured base path (`/ui` by default). The guard
//! decides, from the session alone, whether a route is shown or redirected.

use std::fmt;

use crate::session::Session;

/// A console route.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Route {
    /// `/`
    Root,
    /// `/login`
    Login,
    /// `/login/oauth-callback`
    OAuthCallback,
    /// `/app`, the dashboard of releases and bundles.
    App,
    /// `/app/release/create`
    CreateRelease,
    /// `/app/release/{id}/update`
    UpdateRelease {
        /// Release id.
        id: String,
    },
    /// `/app/upload-bundle`
    UploadBundle,
}

impl Route {
    /// Parses a path relative to the base path. Returns `None` for paths
    /// that are not console routes.
    ///
    /// ```
    /// use otaconsole_client::Route;
    ///
    /// assert_eq!(Route::parse("/app/release/abc/update"), Some(Route::UpdateRelease { id: "abc".into() }));
    /// assert_eq!(Route::parse("/nope"), None);
    /// ```
    #[must_use]
    pub fn parse(path: &str) -> Option<Self> {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        match segments.as_slice() {
            [] => Some(Self::Root),
            ["login"] => Some(Self::Login),
            ["login", "oauth-callback"] => Some(Self::OAuthCallback),
            ["app"] => Some(Self::App),
            ["app", "release", "create"] => Some(Self::CreateRelease),
            ["app", "release", id, "update"] => Some(Self::UpdateRelease {
                id: (*id).to_string(),
            }),
            ["app", "upload-bundle"] => Some(Self::UploadBundle),
            _ => None,
        }
    }

    /// Parses an absolute path under `base_path`.
    #[must_use]
    pub fn parse_under(base_path: &str, path: &str) -> Option<Self> {
        let base = base_path.trim_end_matches('/');
        let rest = path.strip_prefix(base)?;
        if !rest.is_empty() && !rest.starts_with(['/', '?', '#']) {
            return None;
        }
        Self::parse(rest)
    }

    /// Returns the path relative to the base path.
    #[must_use]
    pub fn path(&self) -> String {
        match self {
            Self::Root => "/".to_string(),
            Self::Login => "/login".to_string(),
            Self::OAuthCallback => "/login/oauth-callback".to_string(),
            Self::App => "/app".to_string(),
            Self::CreateRelease => "/app/release/create".to_string(),
            Self::UpdateRelease { id } => format!("/app/release/{id}/update"),
            Self::UploadBundle => "/app/upload-bundle".to_string(),
        }
    }

    /// Returns the absolute path under `base_path`.
    #[must_use]
    pub fn path_under(&self, base_path: &str) -> String {
        let base = base_path.trim_end_matches('/');
        match self {
            Self::Root if !base.is_empty() => base.to_string(),
            _ => format!("{base}{}", self.path()),
        }
    }

    /// Returns true for routes under `/app`.
    #[must_use]
    pub const fn is_app(&self) -> bool {
        matches!(
            self,
            Self::App | Self::CreateRelease | Self::UpdateRelease { .. } | Self::UploadBundle
        )
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

/// Returns where `route` redirects for the given session, or `None` if it is
/// shown as is.
#[must_use]
pub fn guard(session: &Session, route: &Route) -> Option<Route> {
    guard_for(session.is_logged_in(), route)
}

fn guard_for(logged_in: bool, route: &Route) -> Option<Route> {
    match route {
        Route::Root if logged_in => Some(Route::App),
        Route::Root => Some(Route::Login),
        Route::Login if logged_in => Some(Route::App),
        r if r.is_app() && !logged_in => Some(Route::Login),
        _ => None,
    }
}
