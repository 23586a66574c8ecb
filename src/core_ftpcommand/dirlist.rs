//! ls-style directory listings for LIST, NLST and STAT.

use crate::config::Config;
use crate::constants::LIST_MAX_RECURSION;
use crate::core_acl::user::User;
use crate::core_fs::{DirEntryInfo, FileSystem, FsError, VirtualPath};
use crate::helpers::wildcard_match;
use chrono::{DateTime, Datelike, Local};
use std::future::Future;
use std::pin::Pin;
use std::time::SystemTime;

/// Options parsed from an `ls`-style option word.
#[derive(Debug, Clone, Copy, Default)]
pub struct ListOptions {
    /// -a: do not ignore entries starting with `.`
    pub all: bool,
    /// -A: like -a, but the implied `.` and `..` stay suppressed.
    pub almost_all: bool,
    /// -l
    pub long_format: bool,
    /// -p: append slash to directories
    pub slash_dirs: bool,
    /// -r
    pub reverse: bool,
    /// -R
    pub recursive: bool,
    /// -S: sort by size
    pub size_sort: bool,
    /// -t: sort by modification time, newest first
    pub mod_time_sort: bool,
    /// -o: skip group in long format
    pub no_group: bool,
    /// -z: size and name only
    pub size_name: bool,
}

impl ListOptions {
    pub fn parse_option(&mut self, option: char) {
        match option {
            'a' => self.all = true,
            'A' => {
                self.all = true;
                self.almost_all = true;
            }
            'l' => self.long_format = true,
            'p' => self.slash_dirs = true,
            'r' => self.reverse = true,
            'R' => self.recursive = true,
            'S' => {
                self.size_sort = true;
                self.mod_time_sort = false;
            }
            't' => {
                self.mod_time_sort = true;
                self.size_sort = false;
            }
            'o' => self.no_group = true,
            'z' => self.size_name = true,
            _ => {}
        }
    }

    /// Splits a LIST/NLST argument into options and the path remainder.
    pub fn from_arg(arg_str: &str) -> (ListOptions, String) {
        let mut options = ListOptions::default();
        let mut path_words = Vec::new();
        for word in arg_str.split_whitespace() {
            match word.strip_prefix('-') {
                Some(letters) if !letters.is_empty() && path_words.is_empty() => {
                    for ch in letters.chars() {
                        options.parse_option(ch);
                    }
                }
                _ => path_words.push(word),
            }
        }
        (options, path_words.join(" "))
    }
}

/// The `ls -l` permission field from Unix mode bits.
pub fn permissions(mode: u32, is_dir: bool, is_symlink: bool) -> String {
    let mut perms = String::with_capacity(10);
    perms.push(if is_symlink {
        'l'
    } else if is_dir {
        'd'
    } else {
        '-'
    });
    for shift in [6u32, 3, 0] {
        let bits = (mode >> shift) & 0o7;
        perms.push(if bits & 0o4 != 0 { 'r' } else { '-' });
        perms.push(if bits & 0o2 != 0 { 'w' } else { '-' });
        perms.push(if bits & 0o1 != 0 { 'x' } else { '-' });
    }
    perms
}

/// `Mon DD HH:MM` for entries modified in the current year, `Mon DD  YYYY`
/// otherwise.
pub fn format_timestamp(modified: DateTime<Local>, now: DateTime<Local>) -> String {
    if modified.year() == now.year() {
        modified.format("%b %d %H:%M").to_string()
    } else {
        modified.format("%b %d  %Y").to_string()
    }
}

/// One long-format line. Owner and group are truncated to ten characters.
#[allow(clippy::too_many_arguments)]
pub fn format_long_line(
    perms: &str,
    nlink: u64,
    owner: &str,
    group: Option<&str>,
    size: u64,
    timestamp: &str,
    name: &str,
    link_target: Option<&str>,
    slash: bool,
) -> String {
    let owner: String = owner.chars().take(10).collect();
    let mut line = format!("{} {:>3} {:<10} ", perms, nlink, owner);
    if let Some(group) = group {
        let group: String = group.chars().take(10).collect();
        line.push_str(&format!("{:<10} ", group));
    }
    line.push_str(&format!("{:>10} {} {}", size, timestamp, name));
    if let Some(target) = link_target {
        line.push_str(&format!(" -> {}", target));
    }
    if slash {
        line.push('/');
    }
    line
}

fn mtime_local(modified: SystemTime) -> DateTime<Local> {
    DateTime::<Local>::from(modified)
}

/// Builds listings for one user under one config snapshot.
pub struct DirectoryList<'a> {
    fs: &'a FileSystem,
    user: &'a User,
    config: &'a Config,
    options: ListOptions,
    max_recursion: usize,
}

impl<'a> DirectoryList<'a> {
    pub fn new(
        fs: &'a FileSystem,
        user: &'a User,
        config: &'a Config,
        options: ListOptions,
    ) -> Self {
        Self {
            fs,
            user,
            config,
            options,
            max_recursion: LIST_MAX_RECURSION,
        }
    }

    /// Resolves glob masks in the final path component, then lists.
    pub async fn build(&self, path: &VirtualPath) -> Result<String, FsError> {
        let (parent, mask) = self.split_mask(path).await;
        let mut out = String::new();
        self.list_path(&parent, mask.as_deref(), 1, &mut out).await?;
        Ok(out)
    }

    async fn split_mask(&self, path: &VirtualPath) -> (VirtualPath, Option<String>) {
        let basename = path.basename();
        if basename.contains(['*', '?', '[']) {
            return (path.parent(), Some(basename.to_string()));
        }
        // A regular file is listed as a single-entry match in its parent.
        if let Ok(meta) = self.fs.status(self.user, path, self.config).await {
            if !meta.is_dir() {
                return (path.parent(), Some(basename.to_string()));
            }
        }
        (path.clone(), None)
    }

    fn visible(&self, name: &str) -> bool {
        !name.starts_with('.') || self.options.all
    }

    fn sort(&self, entries: &mut [DirEntryInfo]) {
        if self.options.size_sort {
            entries.sort_by(|a, b| a.size.cmp(&b.size));
        } else if self.options.mod_time_sort {
            entries.sort_by(|a, b| b.modified.cmp(&a.modified));
        } else {
            entries.sort_by(|a, b| a.name.cmp(&b.name));
        }
        if self.options.reverse {
            entries.reverse();
        }
    }

    fn owner_names(&self, uid: u32, gid: u32) -> (String, String) {
        (uid.to_string(), gid.to_string())
    }

    fn format_entry(&self, entry: &DirEntryInfo, now: DateTime<Local>) -> String {
        if !self.options.long_format {
            return format!("{}\r\n", entry.name);
        }
        if self.options.size_name {
            return format!("{:<10} {}\r\n", entry.size, entry.name);
        }
        let (owner, group) = self.owner_names(entry.uid, entry.gid);
        let line = format_long_line(
            &permissions(entry.mode, entry.is_dir, entry.is_symlink),
            entry.nlink,
            &owner,
            if self.options.no_group {
                None
            } else {
                Some(group.as_str())
            },
            entry.size,
            &format_timestamp(mtime_local(entry.modified), now),
            &entry.name,
            entry.link_target.as_deref(),
            self.options.slash_dirs && entry.is_dir,
        );
        format!("{}\r\n", line)
    }

    fn list_path<'b>(
        &'b self,
        path: &'b VirtualPath,
        mask: Option<&'b str>,
        depth: usize,
        out: &'b mut String,
    ) -> Pin<Box<dyn Future<Output = Result<(), FsError>> + Send + 'b>> {
        Box::pin(async move {
            if depth > self.max_recursion {
                return Ok(());
            }
            // A directory that fails to enumerate lists as empty.
            let mut entries = match self.fs.read_dir(self.user, path, self.config).await {
                Ok(entries) => entries,
                Err(_) => return Ok(()),
            };
            self.sort(&mut entries);

            if depth > 1 {
                out.push_str(&format!("\r\n{}:\r\n", path));
            }
            if self.options.long_format && !self.options.size_name {
                let total: u64 = entries.iter().map(|e| e.size).sum();
                out.push_str(&format!("total {}\r\n", total / 1024));
            }

            let now = Local::now();
            if self.options.all && !self.options.almost_all && mask.is_none() {
                for name in [".", ".."] {
                    let target = if name == "." { path.clone() } else { path.parent() };
                    if let Ok(meta) = self.fs.status(self.user, &target, self.config).await {
                        use std::os::unix::fs::MetadataExt;
                        let entry = DirEntryInfo {
                            name: name.to_string(),
                            size: meta.len(),
                            modified: meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
                            is_dir: true,
                            is_symlink: false,
                            mode: meta.mode(),
                            nlink: meta.nlink(),
                            uid: meta.uid(),
                            gid: meta.gid(),
                            link_target: None,
                        };
                        out.push_str(&self.format_entry(&entry, now));
                    }
                }
            }

            for entry in &entries {
                if !self.visible(&entry.name) {
                    continue;
                }
                if let Some(mask) = mask {
                    if !wildcard_match(mask, &entry.name, false) {
                        continue;
                    }
                }
                out.push_str(&self.format_entry(entry, now));
            }

            if self.options.recursive {
                for entry in &entries {
                    if !entry.is_dir || entry.is_symlink || !self.visible(&entry.name) {
                        continue;
                    }
                    let child = path.join(&entry.name);
                    self.list_path(&child, mask, depth + 1, out).await?;
                }
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_acl::user::test_user;
    use chrono::TimeZone;

    #[test]
    fn option_parsing() {
        let (options, path) = ListOptions::from_arg("-la /pub");
        assert!(options.all && options.long_format && !options.almost_all);
        assert_eq!(path, "/pub");

        let (options, path) = ListOptions::from_arg("-A");
        assert!(options.all && options.almost_all);
        assert_eq!(path, "");

        // Sort options displace each other; the last one wins.
        let (options, _) = ListOptions::from_arg("-St");
        assert!(options.mod_time_sort && !options.size_sort);

        // A dash inside the path is not an option word.
        let (options, path) = ListOptions::from_arg("my-file");
        assert!(!options.long_format);
        assert_eq!(path, "my-file");
    }

    #[test]
    fn permission_field() {
        assert_eq!(permissions(0o644, false, false), "-rw-r--r--");
        assert_eq!(permissions(0o755, true, false), "drwxr-xr-x");
        assert_eq!(permissions(0o777, false, true), "lrwxrwxrwx");
        assert_eq!(permissions(0o000, false, false), "----------");
    }

    #[test]
    fn long_line_matches_ls_layout() {
        // A regular 17-byte file owned by alice:staff at 2013-06-15 09:04.
        let modified = Local.with_ymd_and_hms(2013, 6, 15, 9, 4, 0).unwrap();
        let now = Local.with_ymd_and_hms(2013, 8, 1, 12, 0, 0).unwrap();
        let line = format_long_line(
            "-rw-r--r--",
            1,
            "alice",
            Some("staff"),
            17,
            &format_timestamp(modified, now),
            "file",
            None,
            false,
        );
        assert_eq!(
            line,
            "-rw-r--r--   1 alice      staff              17 Jun 15 09:04 file"
        );
    }

    #[test]
    fn old_entries_show_the_year() {
        let modified = Local.with_ymd_and_hms(2013, 6, 15, 9, 4, 0).unwrap();
        let now = Local.with_ymd_and_hms(2026, 8, 1, 12, 0, 0).unwrap();
        assert_eq!(format_timestamp(modified, now), "Jun 15  2013");
    }

    #[test]
    fn symlink_and_slash_decorations() {
        let line = format_long_line(
            "lrwxrwxrwx",
            1,
            "0",
            Some("0"),
            4,
            "Jan 01 00:00",
            "link",
            Some("target"),
            false,
        );
        assert!(line.ends_with("link -> target"));

        let line = format_long_line(
            "drwxr-xr-x",
            2,
            "0",
            Some("0"),
            4096,
            "Jan 01 00:00",
            "dir",
            None,
            true,
        );
        assert!(line.ends_with("dir/"));
    }

    #[test]
    fn owner_names_truncate_to_ten() {
        let line = format_long_line(
            "-rw-r--r--",
            1,
            "averylongusername",
            Some("g"),
            1,
            "Jan 01 00:00",
            "f",
            None,
            false,
        );
        assert!(line.starts_with("-rw-r--r--   1 averylongu "));
    }

    #[tokio::test]
    async fn build_lists_files_and_masks() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("alpha.txt"), b"aaaa").unwrap();
        std::fs::write(dir.path().join("beta.log"), b"bb").unwrap();
        std::fs::write(dir.path().join(".hidden"), b"h").unwrap();
        let config = crate::config::test_config(dir.path().to_str().unwrap());
        let fs = FileSystem::new(dir.path());
        let user = test_user(1, "alice", "pw");

        let (options, _) = ListOptions::from_arg("");
        let list = DirectoryList::new(&fs, &user, &config, options);
        let out = list.build(&VirtualPath::root()).await.unwrap();
        assert_eq!(out, "alpha.txt\r\nbeta.log\r\n");

        let (options, _) = ListOptions::from_arg("-a");
        let list = DirectoryList::new(&fs, &user, &config, options);
        let out = list.build(&VirtualPath::root()).await.unwrap();
        assert!(out.contains(".hidden\r\n"));
        assert!(out.contains(".\r\n"));

        // -A shows dotfiles but keeps . and .. suppressed.
        let (options, _) = ListOptions::from_arg("-A");
        let list = DirectoryList::new(&fs, &user, &config, options);
        let out = list.build(&VirtualPath::root()).await.unwrap();
        assert!(out.contains(".hidden\r\n"));
        assert!(!out.starts_with(".\r\n"));

        let (options, path) = ListOptions::from_arg("*.log");
        let list = DirectoryList::new(&fs, &user, &config, options);
        let target = VirtualPath::from_user(&VirtualPath::root(), &path);
        let out = list.build(&target).await.unwrap();
        assert_eq!(out, "beta.log\r\n");
    }

    #[tokio::test]
    async fn long_format_has_total_header() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("data.bin"), vec![0u8; 2048]).unwrap();
        let config = crate::config::test_config(dir.path().to_str().unwrap());
        let fs = FileSystem::new(dir.path());
        let user = test_user(1, "alice", "pw");

        let (options, _) = ListOptions::from_arg("-l");
        let list = DirectoryList::new(&fs, &user, &config, options);
        let out = list.build(&VirtualPath::root()).await.unwrap();
        assert!(out.starts_with("total 2\r\n"));
        assert!(out.contains("data.bin\r\n"));
    }
}
