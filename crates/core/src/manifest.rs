//! Static asset manifest and cache generation tag.
//!
//! The manifest is fixed at build time and injected into the agent at
//! construction. It is never read from configuration.

use url::Url;

use crate::Error;

/// Generation tag of the job tracker's current cache.
pub const BUILTIN_GENERATION: &str = "job-tracker-cache-v1";

/// Deployment base path of the job tracker.
pub const BUILTIN_BASE_PATH: &str = "/job-tracker";

const BUILTIN_CDN_ASSETS: &[&str] = &[
    "https://cdn.jsdelivr.net/npm/dexie@3.2.2/dist/dexie.min.js",
    "https://cdn.jsdelivr.net/npm/bootstrap@5.3.0/dist/css/bootstrap.min.css",
    "https://cdn.jsdelivr.net/npm/bootstrap@5.3.0/dist/js/bootstrap.bundle.min.js",
    "https://cdnjs.cloudflare.com/ajax/libs/font-awesome/6.4.0/css/all.min.css",
    "https://cdnjs.cloudflare.com/ajax/libs/Chart.js/4.4.0/chart.umd.min.js",
    "https://cdnjs.cloudflare.com/ajax/libs/jspdf/2.5.1/jspdf.umd.min.js",
    "https://cdnjs.cloudflare.com/ajax/libs/jspdf-autotable/3.5.28/jspdf.plugin.autotable.min.js",
    "https://cdn.jsdelivr.net/npm/canvas-confetti@1.6.0/dist/confetti.browser.min.js",
    "https://cdn.jsdelivr.net/npm/hammerjs@2.0.8/hammer.min.js",
];

/// Ordered list of asset identifiers plus the generation they live in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    generation: String,
    assets: Vec<String>,
}

impl Manifest {
    pub fn new<I, S>(generation: impl Into<String>, assets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { generation: generation.into(), assets: assets.into_iter().map(Into::into).collect() }
    }

    /// The job tracker's manifest.
    pub fn builtin() -> Self {
        let base = BUILTIN_BASE_PATH;
        let mut assets = vec![format!("{base}/"), format!("{base}/index.html")];
        assets.extend(BUILTIN_CDN_ASSETS.iter().map(|s| s.to_string()));
        assets.extend([
            format!("{base}/manifest.json"),
            format!("{base}/icon-192x192.png"),
            format!("{base}/icon-512x512.png"),
        ]);
        Self::new(BUILTIN_GENERATION, assets)
    }

    pub fn generation(&self) -> &str {
        &self.generation
    }

    pub fn assets(&self) -> &[String] {
        &self.assets
    }

    /// Exact match of either the URL's path or its full serialization.
    pub fn contains(&self, url: &Url) -> bool {
        let path = url.path();
        let href = url.as_str();
        self.assets.iter().any(|a| a == path || a == href)
    }

    /// Absolute URLs for every asset, relative entries joined onto `origin`.
    ///
    /// Order follows the manifest.
    pub fn resolve(&self, origin: &Url) -> Result<Vec<Url>, Error> {
        self.assets
            .iter()
            .map(|asset| {
                origin
                    .join(asset)
                    .map_err(|e| Error::InvalidUrl(format!("{asset}: {e}")))
            })
            .collect()
    }
}
