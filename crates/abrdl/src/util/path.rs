use std::path::{Component, Path, PathBuf};

pub trait SegmentPathExt {
    /// Joins a storage name below `self`, keeping only its normal components.
    ///
    /// Names are derived from manifest templates, so `..`, roots and prefixes are dropped
    /// to keep every segment inside the output directory.
    fn join_segment_name(&self, name: &str) -> PathBuf;
}

impl SegmentPathExt for Path {
    fn join_segment_name(&self, name: &str) -> PathBuf {
        let mut path = self.to_path_buf();
        for component in Path::new(name).components() {
            if let Component::Normal(part) = component {
                path.push(part);
            }
        }
        path
    }
}
