//! Path types used to pair entries of the source and replica trees.

use std::ffi::{OsStr, OsString};
use std::fmt;
use std::path::{Component, Path, PathBuf};

/// Top of a directory tree taking part in a synchronization pass.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TreeRoot(PathBuf);

impl TreeRoot {
    /// Create a new TreeRoot from a path.
    ///
    /// # Preconditions
    /// - `path` must be non-empty
    ///
    /// # Postconditions
    /// - Returns a TreeRoot; the location itself is not required to exist
    ///
    /// # Errors
    /// - Returns error if path is empty
    pub fn new(path: impl Into<PathBuf>) -> crate::Result<Self> {
        let path = path.into();
        if path.as_os_str().is_empty() {
            return Err(crate::Error::InvalidInput(
                "Tree root cannot be empty".to_string(),
            ));
        }
        Ok(Self(path))
    }

    /// Get the root path.
    pub fn path(&self) -> &Path {
        &self.0
    }

    /// Express `path` relative to this root.
    pub fn relative_of(&self, path: &Path) -> crate::Result<RelativePath> {
        RelativePath::between(&self.0, path)
    }

    /// Map a relative path onto this root.
    pub fn resolve(&self, relative: &RelativePath) -> PathBuf {
        relative.resolve(&self.0)
    }
}

impl fmt::Display for TreeRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// A path relative to a tree root.
///
/// The same relative path identifies "the same" entry in the source and the
/// replica tree. The root itself is the empty relative path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RelativePath {
    components: Vec<OsString>,
}

impl RelativePath {
    /// Create a root path.
    pub fn root() -> Self {
        Self {
            components: Vec::new(),
        }
    }

    /// Create a path from name components.
    ///
    /// # Preconditions
    /// - Components must not contain path separators
    /// - Components must not be empty, `.` or `..`
    ///
    /// # Errors
    /// - Returns error if any component is invalid
    pub fn from_components<I, S>(components: I) -> crate::Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        let mut path = Self::root();
        for comp in components {
            path = path.join(comp.into())?;
        }
        Ok(path)
    }

    /// Compute the path of `path` relative to `root`.
    ///
    /// # Errors
    /// - `path` is not located under `root`
    /// - The remainder contains `..` or another non-name component
    pub fn between(root: &Path, path: &Path) -> crate::Result<Self> {
        let rest = path.strip_prefix(root).map_err(|_| {
            crate::Error::InvalidInput(format!(
                "'{}' is not inside '{}'",
                path.display(),
                root.display()
            ))
        })?;

        let mut components = Vec::new();
        for component in rest.components() {
            match component {
                Component::Normal(name) => components.push(name.to_os_string()),
                Component::CurDir => {}
                _ => {
                    return Err(crate::Error::InvalidInput(format!(
                        "'{}' cannot be expressed relative to '{}'",
                        path.display(),
                        root.display()
                    )));
                }
            }
        }

        Ok(Self { components })
    }

    /// Check if this is the root path.
    pub fn is_root(&self) -> bool {
        self.components.is_empty()
    }

    /// Get the parent path, if any.
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            None
        } else {
            let mut components = self.components.clone();
            components.pop();
            Some(Self { components })
        }
    }

    /// Get the file/directory name (last component).
    pub fn name(&self) -> Option<&OsStr> {
        self.components.last().map(|s| s.as_os_str())
    }

    /// Join this path with a child component.
    pub fn join(&self, child: impl AsRef<OsStr>) -> crate::Result<Self> {
        let child = child.as_ref();
        let mut parsed = Path::new(child).components();
        match (parsed.next(), parsed.next()) {
            (Some(Component::Normal(name)), None) if name == child => {}
            _ => {
                return Err(crate::Error::InvalidInput(format!(
                    "Invalid path component: {:?}",
                    child
                )));
            }
        }
        let mut components = self.components.clone();
        components.push(child.to_os_string());
        Ok(Self { components })
    }

    /// Get the path components.
    pub fn components(&self) -> &[OsString] {
        &self.components
    }

    /// Map this relative path onto `root`.
    ///
    /// The root path maps to `root` itself.
    pub fn resolve(&self, root: &Path) -> PathBuf {
        let mut path = root.to_path_buf();
        for component in &self.components {
            path.push(component);
        }
        path
    }
}

impl fmt::Display for RelativePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            return write!(f, ".");
        }
        let parts: Vec<_> = self
            .components
            .iter()
            .map(|c| c.to_string_lossy())
            .collect();
        write!(f, "{}", parts.join("/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_tree_root_creation() {
        let root = TreeRoot::new("/Source").unwrap();
        assert_eq!(root.path(), Path::new("/Source"));
    }

    #[test]
    fn test_tree_root_empty_fails() {
        assert!(TreeRoot::new("").is_err());
    }

    #[test]
    fn test_relative_path_root() {
        let path = RelativePath::root();
        assert!(path.is_root());
        assert_eq!(path.to_string(), ".");
        assert_eq!(path.resolve(Path::new("/Replica")), PathBuf::from("/Replica"));
    }

    #[test]
    fn test_relative_path_between() {
        let path =
            RelativePath::between(Path::new("/Source"), Path::new("/Source/a/b/c.txt")).unwrap();
        assert_eq!(path.components(), &["a", "b", "c.txt"]);
        assert_eq!(path.to_string(), "a/b/c.txt");
    }

    #[test]
    fn test_relative_path_between_root_is_root() {
        let path = RelativePath::between(Path::new("/Source"), Path::new("/Source")).unwrap();
        assert!(path.is_root());
    }

    #[test]
    fn test_relative_path_outside_root_fails() {
        assert!(RelativePath::between(Path::new("/Source"), Path::new("/Other/x")).is_err());
        assert!(RelativePath::between(Path::new("/Source"), Path::new("/Sourcex/x")).is_err());
    }

    #[test]
    fn test_relative_path_parent_dir_fails() {
        assert!(RelativePath::between(Path::new("/Source"), Path::new("/Source/../etc")).is_err());
    }

    #[test]
    fn test_relative_path_join() {
        let path = RelativePath::root().join("foo").unwrap().join("bar").unwrap();
        assert_eq!(path.resolve(Path::new("/Replica")), PathBuf::from("/Replica/foo/bar"));
    }

    #[test]
    fn test_relative_path_join_rejects_separators() {
        assert!(RelativePath::root().join("a/b").is_err());
        assert!(RelativePath::root().join("..").is_err());
        assert!(RelativePath::root().join("").is_err());
    }

    #[test]
    fn test_relative_path_parent_and_name() {
        let path = RelativePath::from_components(["foo", "bar"]).unwrap();
        assert_eq!(path.name(), Some(OsStr::new("bar")));
        assert_eq!(path.parent().unwrap().to_string(), "foo");
        assert!(RelativePath::root().parent().is_none());
    }

    #[test]
    fn test_tree_root_maps_between_trees() {
        let source = TreeRoot::new("/Source").unwrap();
        let replica = TreeRoot::new("/Replica").unwrap();

        let relative = source.relative_of(Path::new("/Source/NewFolder/file1.txt")).unwrap();
        assert_eq!(
            replica.resolve(&relative),
            PathBuf::from("/Replica/NewFolder/file1.txt")
        );
    }

    proptest! {
        #[test]
        fn prop_resolve_then_between_is_identity(
            names in proptest::collection::vec("[a-zA-Z0-9_][a-zA-Z0-9_.-]{0,11}", 0..6)
        ) {
            prop_assume!(names.iter().all(|n| n != "." && n != ".."));
            let relative = RelativePath::from_components(names.clone()).unwrap();
            let root = Path::new("/replica/root");
            let resolved = relative.resolve(root);
            let back = RelativePath::between(root, &resolved).unwrap();
            prop_assert_eq!(back, relative);
        }
    }
}
