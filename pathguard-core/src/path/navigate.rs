//! Moving around the tree: ancestors, children, walks and link resolution.

use std::collections::{HashSet, VecDeque};
use std::fmt;

use tracing::{debug, warn};

use super::{glob, os_to_raw, resolver, FilePath};
use crate::error::{is_missing, PathError, Result};
use crate::types::{PathString, RepresentationMode};

impl FilePath {
    /// The containing directory. The root is its own parent.
    pub fn parent(&self) -> FilePath {
        self.derive_piece(resolver::dirname(self.style(), self.repr.as_bytes()))
    }

    /// Ancestors from the parent upwards, excluding the filesystem root.
    pub fn parents(&self) -> Parents {
        let next = if self.is_root() { None } else { Some(self.parent()) };
        Parents { next }
    }

    /// The segments leading from `ancestor` down to this path.
    ///
    /// Fails with `NotAncestor` unless `ancestor` is this path or one of its
    /// ancestors. Segments come back in this path's mode.
    pub fn segments_from(&self, ancestor: &FilePath) -> Result<Vec<PathString>> {
        let style = self.style();
        let anchor = self.coerce(ancestor.path())?;
        let (anchor, path) = (anchor.as_bytes(), self.repr.as_bytes());

        if !resolver::is_same_or_descendant(style, anchor, path) {
            return Err(PathError::NotAncestor {
                ancestor: ancestor.to_string(),
                path: self.to_string(),
            });
        }
        Ok(path[anchor.len()..]
            .split(|b| style.is_separator(*b))
            .filter(|segment| !segment.is_empty())
            .map(|segment| self.piece(segment.to_vec()))
            .collect())
    }

    /// Names of the entries in this directory, sorted as the provider
    /// returns them.
    pub fn list_dir(&self) -> Result<Vec<PathString>> {
        let names = self
            .provider()
            .list_dir(&self.to_path_buf())
            .map_err(|e| self.io_error(e))?;
        names
            .into_iter()
            .map(|name| {
                let raw = self.raw_from_os(name)?;
                PathString::from_raw(self.mode(), raw)
            })
            .collect()
    }

    /// The entries of this directory.
    pub fn children(&self) -> Result<Vec<FilePath>> {
        self.list_dir()?
            .into_iter()
            .map(|name| self.child(name))
            .collect()
    }

    /// Every entry of this directory, whatever its name.
    ///
    /// Entries are in this path's mode when their names fit its codec and in
    /// bytes mode otherwise, so recursive operations never stop at a name
    /// they cannot decode.
    pub(crate) fn entries(&self) -> Result<Vec<FilePath>> {
        let names = self
            .provider()
            .list_dir(&self.to_path_buf())
            .map_err(|e| self.io_error(e))?;
        names
            .into_iter()
            .map(|name| match self.raw_from_os(name.clone()) {
                Ok(raw) => self.child(self.piece(raw)),
                Err(PathError::Encoding { .. }) => {
                    let encoding = self.config().default_encoding;
                    let raw = os_to_raw(name, RepresentationMode::Bytes, encoding)?;
                    let entry = self.os_child(&raw)?;
                    debug!("Keeping undecodable entry {:?} in bytes mode", entry);
                    Ok(entry)
                }
                Err(e) => Err(e),
            })
            .collect()
    }

    /// The child of this directory that corresponds to `entry`, an entry of
    /// some other directory.
    pub(crate) fn counterpart(&self, entry: &FilePath) -> Result<FilePath> {
        let name = entry.basename();
        match self.child(&name) {
            Err(PathError::Encoding { .. }) => self.os_child(name.as_bytes()),
            other => other,
        }
    }

    /// Children whose names match a `*`/`?` pattern.
    pub fn glob_children(&self, pattern: impl Into<PathString>) -> Result<Vec<FilePath>> {
        let pattern = self.coerce(pattern)?;
        self.list_dir()?
            .into_iter()
            .filter(|name| glob::matches(&pattern, name))
            .map(|name| self.child(name))
            .collect()
    }

    /// The first existing sibling formed by appending one of `extensions`.
    ///
    /// `*` stands for any extension: the first entry named
    /// `<basename>.<something>` is returned.
    pub fn sibling_extension_search<I, S>(&self, extensions: I) -> Result<Option<FilePath>>
    where
        I: IntoIterator<Item = S>,
        S: Into<PathString>,
    {
        for extension in extensions {
            let extension = self.coerce(extension)?;
            if extension.as_bytes() == b"*" {
                let mut prefix = self.basename().as_bytes().to_vec();
                prefix.push(b'.');
                let parent = self.parent();
                for name in parent.list_dir()? {
                    if name.as_bytes().starts_with(&prefix) {
                        return parent.child(name).map(Some);
                    }
                }
                continue;
            }
            let candidate = self.sibling_extension(extension)?;
            if candidate.exists()? {
                return Ok(Some(candidate));
            }
        }
        Ok(None)
    }

    /// The first of `paths`, resolved with `preauth_child`, that exists.
    pub fn child_search_preauth<I, S>(&self, paths: I) -> Result<Option<FilePath>>
    where
        I: IntoIterator<Item = S>,
        S: Into<PathString>,
    {
        for path in paths {
            let candidate = self.preauth_child(path)?;
            if candidate.exists()? {
                return Ok(Some(candidate));
            }
        }
        Ok(None)
    }

    /// Every path in the tree below and including this one, pre-order.
    ///
    /// Directories, and links to them, are always descended. Descending into
    /// a directory that is already being walked fails with `LinkCycle`.
    /// Entries whose names the text codec cannot hold are yielded in bytes
    /// mode.
    pub fn walk(&self) -> Walk<'static> {
        Walk::new(self.clone(), None)
    }

    /// Like [`walk`](Self::walk), descending only into directories for which
    /// `descend` returns true. Directories it rejects are still yielded.
    pub fn walk_with<'a, F>(&self, descend: F) -> Walk<'a>
    where
        F: FnMut(&FilePath) -> bool + 'a,
    {
        Walk::new(self.clone(), Some(Box::new(descend)))
    }

    /// Resolves every symbolic link in the path.
    ///
    /// Missing trailing segments are kept as they are. A chain that revisits
    /// a resolution state, or takes more than the configured number of hops,
    /// fails with `LinkCycle`.
    pub fn realpath(&self) -> Result<FilePath> {
        let style = self.style();
        let max_hops = self.config().max_link_hops;
        let (mut resolved, parts) = resolver::split_components(style, self.repr.as_bytes());
        let mut pending: VecDeque<Vec<u8>> = parts.into();
        let mut seen: HashSet<(Vec<u8>, VecDeque<Vec<u8>>)> = HashSet::new();
        let mut hops = 0;

        while let Some(part) = pending.pop_front() {
            match part.as_slice() {
                b"." => continue,
                b".." => {
                    resolved = resolver::dirname(style, &resolved);
                    continue;
                }
                _ => {}
            }

            let candidate = resolver::join(style, &resolved, &part);
            let os_candidate = self.os_path(&candidate);
            match self.provider().lstat(&os_candidate) {
                Ok(stat) if stat.is_symlink() => {
                    hops += 1;
                    if hops > max_hops || !seen.insert((candidate.clone(), pending.clone())) {
                        let path = String::from_utf8_lossy(&candidate).into_owned();
                        warn!("Symbolic link cycle at {}", path);
                        return Err(PathError::LinkCycle { path });
                    }
                    let target = self
                        .provider()
                        .read_link(&os_candidate)
                        .map_err(|e| PathError::from_io(String::from_utf8_lossy(&candidate), e))?;
                    let target = self.raw_from_os(target.into_os_string())?;

                    let (target_root, target_parts) = resolver::split_components(style, &target);
                    if !target_root.is_empty() {
                        resolved = target_root;
                    }
                    for target_part in target_parts.into_iter().rev() {
                        pending.push_front(target_part);
                    }
                }
                Ok(_) => resolved = candidate,
                Err(e) if is_missing(&e) => resolved = candidate,
                Err(e) => return Err(PathError::from_io(String::from_utf8_lossy(&candidate), e)),
            }
        }

        self.derive(resolver::normalize(style, &resolved))
    }
}

/// Iterator over the ancestors of a path. See [`FilePath::parents`].
#[derive(Clone)]
pub struct Parents {
    next: Option<FilePath>,
}

impl Iterator for Parents {
    type Item = FilePath;

    fn next(&mut self) -> Option<FilePath> {
        let current = self.next.take()?;
        if current.is_root() {
            return None;
        }
        let parent = current.parent();
        if parent != current {
            self.next = Some(parent);
        }
        Some(current)
    }
}

impl std::iter::FusedIterator for Parents {}

/// A directory being walked.
struct Frame {
    /// Resolved location, used to spot cycles.
    real: Vec<u8>,
    children: std::vec::IntoIter<FilePath>,
}

/// Pre-order iterator over a tree. See [`FilePath::walk`].
pub struct Walk<'a> {
    descend: Option<Box<dyn FnMut(&FilePath) -> bool + 'a>>,
    start: Option<FilePath>,
    /// Directory yielded last whose children are still to be listed.
    expand: Option<FilePath>,
    stack: Vec<Frame>,
    done: bool,
}

impl<'a> Walk<'a> {
    fn new(start: FilePath, descend: Option<Box<dyn FnMut(&FilePath) -> bool + 'a>>) -> Self {
        Self {
            descend,
            start: Some(start),
            expand: None,
            stack: Vec::new(),
            done: false,
        }
    }

    fn should_descend(&mut self, path: &FilePath) -> Result<bool> {
        if !path.is_dir()? {
            return Ok(false);
        }
        Ok(match self.descend.as_mut() {
            Some(descend) => descend(path),
            None => true,
        })
    }

    fn push_frame(&mut self, dir: FilePath) -> Result<()> {
        let style = dir.style();
        let real = match self.stack.last() {
            Some(parent) if !dir.is_symbolic_link()? => {
                resolver::join(style, &parent.real, dir.basename().as_bytes())
            }
            _ => dir.realpath()?.repr.as_bytes().to_vec(),
        };

        if self.stack.iter().any(|frame| frame.real == real) {
            warn!("Walk of {} re-enters a directory it is already in", dir);
            return Err(PathError::LinkCycle { path: dir.to_string() });
        }

        debug!("Walking into {}", dir);
        let children = dir.entries()?;
        self.stack.push(Frame { real, children: children.into_iter() });
        Ok(())
    }

    fn fail(&mut self, err: PathError) -> Option<Result<FilePath>> {
        self.done = true;
        self.stack.clear();
        Some(Err(err))
    }
}

impl Iterator for Walk<'_> {
    type Item = Result<FilePath>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if let Some(dir) = self.expand.take() {
            if let Err(e) = self.push_frame(dir) {
                return self.fail(e);
            }
        }

        let path = match self.start.take() {
            Some(start) => start,
            None => loop {
                let frame = match self.stack.last_mut() {
                    Some(frame) => frame,
                    None => {
                        self.done = true;
                        return None;
                    }
                };
                match frame.children.next() {
                    Some(child) => break child,
                    None => {
                        self.stack.pop();
                    }
                }
            },
        };

        match self.should_descend(&path) {
            Ok(true) => self.expand = Some(path.clone()),
            Ok(false) => {}
            Err(e) => return self.fail(e),
        }
        Some(Ok(path))
    }
}

impl std::iter::FusedIterator for Walk<'_> {}

impl fmt::Debug for Walk<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Walk")
            .field("depth", &self.stack.len())
            .field("done", &self.done)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use std::fs;
    use tempfile::TempDir;

    /// A small tree:
    /// root/file1, root/sub1/file2, root/sub3/file3.ext{1,2,3}
    fn setup() -> (TempDir, FilePath) {
        let temp_dir = TempDir::new().unwrap();
        let base = temp_dir.path();
        fs::write(base.join("file1"), b"file 1").unwrap();
        fs::create_dir(base.join("sub1")).unwrap();
        fs::write(base.join("sub1").join("file2"), b"file 2").unwrap();
        fs::create_dir(base.join("sub3")).unwrap();
        for ext in ["ext1", "ext2", "ext3"] {
            fs::write(base.join("sub3").join(format!("file3.{ext}")), b"").unwrap();
        }
        let root = FilePath::new(base.to_str().unwrap()).unwrap();
        (temp_dir, root)
    }

    fn names(paths: &[FilePath], root: &FilePath) -> BTreeSet<String> {
        paths
            .iter()
            .map(|p| {
                p.segments_from(root)
                    .unwrap()
                    .iter()
                    .map(|s| s.to_string())
                    .collect::<Vec<_>>()
                    .join("/")
            })
            .collect()
    }

    fn expected_tree() -> BTreeSet<String> {
        ["", "file1", "sub1", "sub1/file2", "sub3", "sub3/file3.ext1", "sub3/file3.ext2", "sub3/file3.ext3"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    #[test]
    fn test_parent() {
        let (_temp_dir, root) = setup();
        let child = root.child("sub1").unwrap();
        assert_eq!(child.parent(), root);
        let top = FilePath::new("/").unwrap();
        assert_eq!(top.parent(), top);
    }

    #[test]
    fn test_parents_excludes_root_and_restarts() {
        let (_temp_dir, root) = setup();
        let deep = root.descendant(["a", "b", "c"]).unwrap();
        let parents = deep.parents();

        let mut expected = Vec::new();
        let mut current = deep.parent();
        while !current.is_root() {
            expected.push(current.clone());
            current = current.parent();
        }
        assert_eq!(parents.clone().collect::<Vec<_>>(), expected);
        assert_eq!(parents.collect::<Vec<_>>(), expected);
        assert_eq!(expected[0], root.descendant(["a", "b"]).unwrap());
        assert_eq!(FilePath::new("/").unwrap().parents().count(), 0);
    }

    #[test]
    fn test_segments_from() {
        let (_temp_dir, root) = setup();
        let deep = root.descendant(["a", "b", "c"]).unwrap();
        assert_eq!(
            deep.segments_from(&root).unwrap(),
            vec![PathString::from("a"), PathString::from("b"), PathString::from("c")]
        );
        assert!(deep.segments_from(&deep).unwrap().is_empty());

        let other = root.descendant(["d", "c", "e"]).unwrap();
        assert!(matches!(deep.segments_from(&other), Err(PathError::NotAncestor { .. })));

        let lookalike = root.child("a").unwrap().sibling_extension("x").unwrap();
        assert!(deep.segments_from(&lookalike).is_err());
    }

    #[test]
    fn test_segments_from_in_bytes_mode() {
        let (_temp_dir, root) = setup();
        let root = root.as_bytes_mode(None).unwrap();
        let deep = root.descendant([b"a", b"b"]).unwrap();
        assert_eq!(
            deep.segments_from(&root).unwrap(),
            vec![PathString::from(b"a"), PathString::from(b"b")]
        );
    }

    #[test]
    fn test_children_and_list_dir() {
        let (_temp_dir, root) = setup();
        assert_eq!(
            root.list_dir().unwrap(),
            vec![PathString::from("file1"), PathString::from("sub1"), PathString::from("sub3")]
        );
        let children = root.children().unwrap();
        assert_eq!(children[1], root.child("sub1").unwrap());
    }

    #[test]
    fn test_children_errors_are_typed() {
        let (_temp_dir, root) = setup();
        let missing = root.child("missing").unwrap().children().unwrap_err();
        assert!(missing.is_not_found());
        #[cfg(unix)]
        {
            let not_dir = root.child("file1").unwrap().children().unwrap_err();
            assert!(matches!(not_dir, PathError::NotADirectory { .. }));
        }
    }

    #[test]
    fn test_glob_children() {
        let (_temp_dir, root) = setup();
        let sub3 = root.child("sub3").unwrap();
        let matched = sub3.glob_children("file3.ext?").unwrap();
        assert_eq!(matched.len(), 3);
        assert_eq!(root.glob_children("sub*").unwrap().len(), 2);
        assert!(root.glob_children("nothing*").unwrap().is_empty());
    }

    #[test]
    fn test_sibling_extension_search() {
        let (_temp_dir, root) = setup();
        let f3 = root.descendant(["sub3", "file3"]).unwrap();
        let exts = [".foo", ".bar", "ext1", "ext2", "ext3"];
        assert!(f3.sibling_extension_search(exts).unwrap().is_none());

        let f3e = f3.sibling_extension(".foo").unwrap();
        f3e.touch().unwrap();
        let found = f3.sibling_extension_search(exts).unwrap().unwrap();
        assert_eq!(found, f3e);
        assert!(f3.sibling_extension_search(["*"]).unwrap().unwrap().exists().unwrap());

        f3e.remove().unwrap();
        assert!(f3.sibling_extension_search(exts).unwrap().is_none());
    }

    #[test]
    fn test_child_search_preauth() {
        let (_temp_dir, root) = setup();
        let found = root
            .child_search_preauth(["nope", "sub1/file2", "file1"])
            .unwrap()
            .unwrap();
        assert_eq!(found, root.descendant(["sub1", "file2"]).unwrap());
        assert!(root.child_search_preauth(["nope"]).unwrap().is_none());
        assert!(root.child_search_preauth(["../escape"]).is_err());
    }

    #[test]
    fn test_walk() {
        let (_temp_dir, root) = setup();
        let walked: Vec<FilePath> = root.walk().collect::<Result<_>>().unwrap();
        assert_eq!(walked[0], root);
        assert_eq!(names(&walked, &root), expected_tree());
    }

    #[test]
    fn test_walk_is_pre_order() {
        let (_temp_dir, root) = setup();
        let walked: Vec<FilePath> = root.walk().collect::<Result<_>>().unwrap();
        let sub1 = walked.iter().position(|p| p.basename() == PathString::from("sub1")).unwrap();
        let file2 = walked.iter().position(|p| p.basename() == PathString::from("file2")).unwrap();
        assert_eq!(file2, sub1 + 1);
    }

    #[test]
    fn test_walk_of_a_file_yields_itself() {
        let (_temp_dir, root) = setup();
        let file = root.child("file1").unwrap();
        let walked: Vec<FilePath> = file.walk().collect::<Result<_>>().unwrap();
        assert_eq!(walked, vec![file]);
    }

    #[test]
    fn test_walk_with_skips_rejected_directories() {
        let (_temp_dir, root) = setup();
        let walked: Vec<FilePath> = root
            .walk_with(|p| p.basename() != PathString::from("sub3"))
            .collect::<Result<_>>()
            .unwrap();
        let names = names(&walked, &root);
        assert!(names.contains("sub3"));
        assert!(!names.contains("sub3/file3.ext1"));
        assert!(names.contains("sub1/file2"));
    }

    #[cfg(unix)]
    fn create_links(root: &FilePath) {
        use std::os::unix::fs::symlink;
        let base = root.to_path_buf();
        symlink(base.join("sub1"), base.join("sub1.link")).unwrap();
        symlink(base.join("sub1").join("file2"), base.join("file2.link")).unwrap();
        symlink(base.join("sub1").join("file2"), base.join("sub1").join("sub1.file2.link")).unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn test_walk_detects_cycles() {
        let (temp_dir, root) = setup();
        create_links(&root);
        std::os::unix::fs::symlink(
            temp_dir.path().join("sub1"),
            temp_dir.path().join("sub1").join("sub1.loopylink"),
        )
        .unwrap();

        let mut results: Vec<Result<FilePath>> = root.walk().collect();
        let last = results.pop().unwrap();
        assert!(matches!(last, Err(PathError::LinkCycle { .. })));
        assert!(results.iter().all(|r| r.is_ok()));

        let mut walk = root.walk();
        while let Some(Ok(_)) = walk.next() {}
        assert!(walk.next().is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_walk_obeys_descend_with_cycles() {
        let (temp_dir, root) = setup();
        create_links(&root);
        std::os::unix::fs::symlink(
            temp_dir.path().join("sub1"),
            temp_dir.path().join("sub1").join("sub1.loopylink"),
        )
        .unwrap();

        let walked: Vec<FilePath> = root
            .walk_with(|p| !p.is_symbolic_link().unwrap())
            .collect::<Result<_>>()
            .unwrap();
        let non_links: Vec<&FilePath> = walked
            .iter()
            .filter(|p| !p.is_symbolic_link().unwrap())
            .collect();
        assert_eq!(non_links.len(), expected_tree().len());
        assert!(names(&walked, &root).contains("sub1/sub1.loopylink"));
    }

    #[cfg(unix)]
    #[test]
    fn test_walk_follows_non_cyclic_links() {
        let (_temp_dir, root) = setup();
        create_links(&root);
        let walked: Vec<FilePath> = root.walk().collect::<Result<_>>().unwrap();
        assert!(names(&walked, &root).contains("sub1.link/file2"));
    }

    #[cfg(unix)]
    #[test]
    fn test_realpath() {
        let (_temp_dir, root) = setup();
        create_links(&root);
        std::os::unix::fs::symlink(
            root.child("file2.link").unwrap().to_path_buf(),
            root.child("link.link").unwrap().to_path_buf(),
        )
        .unwrap();

        let real_root = root.realpath().unwrap();
        assert_eq!(
            root.child("link.link").unwrap().realpath().unwrap(),
            real_root.descendant(["sub1", "file2"]).unwrap()
        );
        assert_eq!(
            root.child("sub1.link").unwrap().child("missing").unwrap().realpath().unwrap(),
            real_root.descendant(["sub1", "missing"]).unwrap()
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_realpath_relative_link() {
        let (temp_dir, root) = setup();
        std::os::unix::fs::symlink("sub1/../sub3", temp_dir.path().join("rel")).unwrap();
        let real_root = root.realpath().unwrap();
        assert_eq!(
            root.child("rel").unwrap().realpath().unwrap(),
            real_root.child("sub3").unwrap()
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_realpath_cycle() {
        let (_temp_dir, root) = setup();
        let link1 = root.child("link1").unwrap();
        let link2 = root.child("link2").unwrap();
        std::os::unix::fs::symlink(link1.to_path_buf(), link2.to_path_buf()).unwrap();
        std::os::unix::fs::symlink(link2.to_path_buf(), link1.to_path_buf()).unwrap();
        assert!(matches!(link2.realpath(), Err(PathError::LinkCycle { .. })));

        let selfish = root.child("self").unwrap();
        std::os::unix::fs::symlink(selfish.to_path_buf(), selfish.to_path_buf()).unwrap();
        assert!(matches!(selfish.realpath(), Err(PathError::LinkCycle { .. })));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_walk_keeps_undecodable_names() {
        use std::os::unix::ffi::OsStrExt;

        let (temp_dir, root) = setup();
        let bad = temp_dir.path().join("sub1").join(std::ffi::OsStr::from_bytes(b"bad\xff"));
        fs::write(&bad, b"").unwrap();

        let walked: Vec<FilePath> = root.walk().map(|p| p.unwrap()).collect();
        assert_eq!(walked.len(), expected_tree().len() + 1);
        let entry = walked
            .iter()
            .find(|p| p.mode() == RepresentationMode::Bytes)
            .unwrap();
        assert_eq!(entry.basename().as_bytes(), b"bad\xff");
        assert_eq!(entry.to_path_buf(), bad);
        assert!(entry.is_file().unwrap());

        let sub1 = root.child("sub1").unwrap();
        assert!(matches!(sub1.children(), Err(PathError::Encoding { .. })));
        assert_eq!(sub1.entries().unwrap().len(), 2);
    }

    #[test]
    fn test_realpath_without_links() {
        let (_temp_dir, root) = setup();
        let real_root = root.realpath().unwrap();
        assert_eq!(real_root.realpath().unwrap(), real_root);
        let sub1 = real_root.child("sub1").unwrap();
        assert_eq!(sub1.realpath().unwrap(), sub1);
    }
}
