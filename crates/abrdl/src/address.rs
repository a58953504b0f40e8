use url::Url;

use crate::{catalog::Representation, error::AbrResult, template::Template};

pub(crate) fn is_absolute_url(s: &str) -> bool {
    s.starts_with("http://")
        || s.starts_with("https://")
        || s.starts_with("file://")
        || s.starts_with("ftp://")
}

pub(crate) fn merge_baseurls(current: &Url, new: &str) -> AbrResult<Url> {
    if is_absolute_url(new) {
        Ok(Url::parse(new)?)
    } else {
        // The query of the current URL is carried over unless the new one has its own.
        //
        // merge_baseurls(https://example.com/manifest.mpd?auth=secret, /video42.mp4) =>
        //   https://example.com/video42.mp4?auth=secret
        let mut merged = current.join(new)?;
        if merged.query().is_none() {
            merged.set_query(current.query());
        }
        Ok(merged)
    }
}

/// Concatenates `base` and `path` with exactly one `/` between them.
pub fn join_path(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    if base.is_empty() {
        return path.to_string();
    }
    format!("{base}/{path}")
}

/// Joins `path` below `base`. Absolute bases are joined as URLs so their query survives.
fn join_url(base: &str, path: &str) -> String {
    if !is_absolute_url(base) {
        return join_path(base, path);
    }
    let Ok(mut base_url) = Url::parse(base) else {
        return join_path(base, path);
    };
    if !base_url.path().ends_with('/') {
        let directory = format!("{}/", base_url.path());
        base_url.set_path(&directory);
    }
    match merge_baseurls(&base_url, path.trim_start_matches('/')) {
        Ok(url) => url.to_string(),
        Err(_) => join_path(base, path),
    }
}

/// A fetchable segment address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentAddress {
    /// Full address passed to the transport.
    pub url: String,
    /// Rendered template, used as the storage name.
    pub name: String,
}

/// Renders segment addresses from representation templates.
#[derive(Debug, Clone, Default)]
pub struct AddressResolver {
    default_root: Option<String>,
}

impl AddressResolver {
    /// `default_root` is used for representations whose manifest carries no `BaseURL`.
    pub fn new(default_root: Option<String>) -> Self {
        Self { default_root }
    }

    /// Root derived from the manifest location: its directory, keeping the query.
    pub fn from_manifest_url(manifest_url: &Url) -> Self {
        let root = manifest_url.join("./").ok().map(|mut root| {
            root.set_query(manifest_url.query());
            root.to_string()
        });
        Self::new(root)
    }

    pub fn default_root(&self) -> Option<&str> {
        self.default_root.as_deref()
    }

    pub fn resolve(&self, representation: &Representation, number: u64) -> SegmentAddress {
        self.render(representation, &representation.media, number)
    }

    /// Address of the initialization segment, if the representation has one.
    pub fn resolve_initialization(&self, representation: &Representation) -> Option<SegmentAddress> {
        let initialization = representation.initialization.as_deref()?;
        Some(self.render(representation, initialization, representation.start_number))
    }

    fn render(&self, representation: &Representation, pattern: &str, number: u64) -> SegmentAddress {
        let mut template = Template::new();
        template.insert(Template::REPRESENTATION_ID, representation.id.clone());
        template.insert(Template::NUMBER, number.to_string());
        template.insert(Template::BANDWIDTH, representation.bandwidth.to_string());
        let name = template.resolve(pattern);

        let url = if is_absolute_url(&name) {
            name.clone()
        } else {
            match self.base_for(representation) {
                Some(base) => join_url(&base, &name),
                None => name.clone(),
            }
        };

        SegmentAddress { url, name }
    }

    fn base_for(&self, representation: &Representation) -> Option<String> {
        match (representation.base_url.as_deref(), self.default_root.as_deref()) {
            (Some(base), _) if is_absolute_url(base) => Some(base.to_string()),
            (Some(base), Some(root)) => Some(join_url(root, base)),
            (Some(base), None) => Some(base.to_string()),
            (None, root) => root.map(str::to_string),
        }
    }
}
