use std::fmt;

/// Where a stored reference should actually be requested from.
///
/// Derived on every render or request and never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedTarget {
    /// Requested as-is, either a same-origin path or an external URL.
    Direct(String),
    /// Routed through the image proxy endpoint.
    Proxied(String),
    /// Routed through the upload relay endpoint.
    LocalRelay(String),
    /// The generated placeholder asset.
    Placeholder(String),
}

impl ResolvedTarget {
    pub fn path(&self) -> &str {
        match self {
            Self::Direct(path)
            | Self::Proxied(path)
            | Self::LocalRelay(path)
            | Self::Placeholder(path) => path,
        }
    }

    pub fn into_path(self) -> String {
        match self {
            Self::Direct(path)
            | Self::Proxied(path)
            | Self::LocalRelay(path)
            | Self::Placeholder(path) => path,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Direct(_) => "direct",
            Self::Proxied(_) => "proxied",
            Self::LocalRelay(_) => "relay",
            Self::Placeholder(_) => "placeholder",
        }
    }
}

impl fmt::Display for ResolvedTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}
