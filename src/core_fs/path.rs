use std::fmt;

/// An absolute, normalized path as FTP clients see it: rooted at the
/// configured storage root, `.` and `..` resolved, never escaping `/`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VirtualPath(String);

impl VirtualPath {
    pub fn root() -> Self {
        VirtualPath("/".to_string())
    }

    /// Resolves client-supplied `input` against `cwd`. Absolute input
    /// replaces the base; traversal above the root clamps at the root.
    pub fn from_user(cwd: &VirtualPath, input: &str) -> Self {
        let combined = if input.starts_with('/') {
            input.to_string()
        } else if input.is_empty() {
            cwd.0.clone()
        } else {
            format!("{}/{}", cwd.0, input)
        };

        let mut parts: Vec<&str> = Vec::new();
        for segment in combined.split('/') {
            match segment {
                "" | "." => {}
                ".." => {
                    parts.pop();
                }
                other => parts.push(other),
            }
        }
        if parts.is_empty() {
            VirtualPath::root()
        } else {
            VirtualPath(format!("/{}", parts.join("/")))
        }
    }

    pub fn join(&self, segment: &str) -> VirtualPath {
        VirtualPath::from_user(self, segment)
    }

    pub fn parent(&self) -> VirtualPath {
        match self.0.rfind('/') {
            Some(0) | None => VirtualPath::root(),
            Some(pos) => VirtualPath(self.0[..pos].to_string()),
        }
    }

    pub fn basename(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or("")
    }

    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VirtualPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_relative_against_cwd() {
        let cwd = VirtualPath::from_user(&VirtualPath::root(), "/pub");
        assert_eq!(VirtualPath::from_user(&cwd, "file.txt").as_str(), "/pub/file.txt");
        assert_eq!(VirtualPath::from_user(&cwd, "/other").as_str(), "/other");
        assert_eq!(VirtualPath::from_user(&cwd, "").as_str(), "/pub");
    }

    #[test]
    fn traversal_clamps_at_root() {
        let cwd = VirtualPath::from_user(&VirtualPath::root(), "/pub");
        assert_eq!(VirtualPath::from_user(&cwd, "../../../etc").as_str(), "/etc");
        assert_eq!(VirtualPath::from_user(&cwd, "..").as_str(), "/");
        assert_eq!(VirtualPath::from_user(&cwd, "a/./b//c").as_str(), "/pub/a/b/c");
    }

    #[test]
    fn parent_and_basename() {
        let path = VirtualPath::from_user(&VirtualPath::root(), "/pub/dir/file");
        assert_eq!(path.parent().as_str(), "/pub/dir");
        assert_eq!(path.basename(), "file");
        assert_eq!(VirtualPath::root().parent().as_str(), "/");
    }
}
