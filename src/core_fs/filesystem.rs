//! The virtual filesystem mapped onto the storage root.
//!
//! Every operation takes the acting user and re-checks path visibility, so a
//! handler cannot reach a hidden path by constructing it directly.

use crate::config::Config;
use crate::core_acl::user::User;
use crate::core_fs::error::FsError;
use crate::core_fs::path::VirtualPath;
use crate::helpers::wildcard_match;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncSeekExt;

#[derive(Debug, Clone)]
pub struct DirEntryInfo {
    pub name: String,
    pub size: u64,
    pub modified: SystemTime,
    pub is_dir: bool,
    pub is_symlink: bool,
    pub mode: u32,
    pub nlink: u64,
    pub uid: u32,
    pub gid: u32,
    pub link_target: Option<String>,
}

pub struct FileSystem {
    root: PathBuf,
}

impl FileSystem {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    /// Maps a virtual path to its on-disk location.
    pub fn real(&self, path: &VirtualPath) -> PathBuf {
        self.root.join(path.as_str().trim_start_matches('/'))
    }

    fn check_access(&self, user: &User, path: &VirtualPath, config: &Config) -> Result<(), FsError> {
        if user.is_siteop() {
            return Ok(());
        }
        for mask in &config.server.hidden_paths {
            if wildcard_match(mask, path.as_str(), false) {
                return Err(FsError::NotFound);
            }
        }
        Ok(())
    }

    /// Resolves `path` for `user`, enforcing visibility rules.
    pub fn resolve(
        &self,
        user: &User,
        path: &VirtualPath,
        config: &Config,
    ) -> Result<PathBuf, FsError> {
        self.check_access(user, path, config)?;
        Ok(self.real(path))
    }

    pub async fn status(
        &self,
        user: &User,
        path: &VirtualPath,
        config: &Config,
    ) -> Result<std::fs::Metadata, FsError> {
        let real = self.resolve(user, path, config)?;
        Ok(tokio::fs::metadata(real).await?)
    }

    pub async fn open_read(
        &self,
        user: &User,
        path: &VirtualPath,
        offset: u64,
        config: &Config,
    ) -> Result<File, FsError> {
        let real = self.resolve(user, path, config)?;
        let meta = tokio::fs::metadata(&real).await?;
        if meta.is_dir() {
            return Err(FsError::NotFound);
        }
        let mut file = File::open(real).await?;
        if offset > 0 {
            file.seek(SeekFrom::Start(offset)).await.map_err(FsError::Io)?;
        }
        Ok(file)
    }

    /// Opens for writing. `offset > 0` resumes at that point, `append` is the
    /// APPE variant; otherwise the file is truncated.
    pub async fn open_write(
        &self,
        user: &User,
        path: &VirtualPath,
        offset: u64,
        append: bool,
        config: &Config,
    ) -> Result<File, FsError> {
        let real = self.resolve(user, path, config)?;
        let mut options = OpenOptions::new();
        options.write(true).create(true);
        if append {
            options.append(true);
        } else if offset == 0 {
            options.truncate(true);
        }
        let mut file = options.open(real).await?;
        if !append && offset > 0 {
            file.seek(SeekFrom::Start(offset)).await.map_err(FsError::Io)?;
        }
        Ok(file)
    }

    pub async fn make_directory(
        &self,
        user: &User,
        path: &VirtualPath,
        config: &Config,
    ) -> Result<(), FsError> {
        let real = self.resolve(user, path, config)?;
        Ok(tokio::fs::create_dir(real).await?)
    }

    pub async fn remove_directory(
        &self,
        user: &User,
        path: &VirtualPath,
        config: &Config,
    ) -> Result<(), FsError> {
        let real = self.resolve(user, path, config)?;
        Ok(tokio::fs::remove_dir(real).await?)
    }

    pub async fn rename(
        &self,
        user: &User,
        from: &VirtualPath,
        to: &VirtualPath,
        config: &Config,
    ) -> Result<(), FsError> {
        let real_from = self.resolve(user, from, config)?;
        let real_to = self.resolve(user, to, config)?;
        Ok(tokio::fs::rename(real_from, real_to).await?)
    }

    pub async fn unlink(
        &self,
        user: &User,
        path: &VirtualPath,
        config: &Config,
    ) -> Result<(), FsError> {
        let real = self.resolve(user, path, config)?;
        let meta = tokio::fs::symlink_metadata(&real).await?;
        if meta.is_dir() {
            return Err(FsError::NotDirectory);
        }
        Ok(tokio::fs::remove_file(real).await?)
    }

    /// Enumerates a directory, skipping entries hidden from `user`.
    pub async fn read_dir(
        &self,
        user: &User,
        path: &VirtualPath,
        config: &Config,
    ) -> Result<Vec<DirEntryInfo>, FsError> {
        use std::os::unix::fs::MetadataExt;

        let real = self.resolve(user, path, config)?;
        let mut reader = tokio::fs::read_dir(real).await?;
        let mut entries = Vec::new();
        while let Some(entry) = reader.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if self.check_access(user, &path.join(&name), config).is_err() {
                continue;
            }
            let meta = match tokio::fs::symlink_metadata(entry.path()).await {
                Ok(meta) => meta,
                Err(_) => continue,
            };
            let link_target = if meta.is_symlink() {
                tokio::fs::read_link(entry.path())
                    .await
                    .ok()
                    .map(|t| t.to_string_lossy().into_owned())
            } else {
                None
            };
            entries.push(DirEntryInfo {
                name,
                size: meta.len(),
                modified: meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
                is_dir: meta.is_dir(),
                is_symlink: meta.is_symlink(),
                mode: meta.mode(),
                nlink: meta.nlink(),
                uid: meta.uid(),
                gid: meta.gid(),
                link_target,
            });
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_acl::user::test_user;

    fn fixture() -> (FileSystem, Config, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("pub")).unwrap();
        std::fs::write(dir.path().join("pub/file.txt"), b"hello").unwrap();
        let config = crate::config::test_config(dir.path().to_str().unwrap());
        (FileSystem::new(dir.path()), config, dir)
    }

    #[tokio::test]
    async fn status_and_readdir() {
        let (fs, config, _dir) = fixture();
        let user = test_user(1, "alice", "pw");
        let path = VirtualPath::from_user(&VirtualPath::root(), "/pub/file.txt");
        let meta = fs.status(&user, &path, &config).await.unwrap();
        assert_eq!(meta.len(), 5);

        let entries = fs
            .read_dir(&user, &VirtualPath::from_user(&VirtualPath::root(), "/pub"), &config)
            .await
            .unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "file.txt");
        assert!(!entries[0].is_dir);
    }

    #[tokio::test]
    async fn hidden_paths_are_invisible_to_plain_users() {
        let (fs, mut config, _dir) = fixture();
        config.server.hidden_paths = vec!["/pub*".to_string()];
        let user = test_user(1, "alice", "pw");
        let mut siteop = test_user(2, "root", "pw");
        siteop.flags = "S".to_string();

        let path = VirtualPath::from_user(&VirtualPath::root(), "/pub/file.txt");
        assert!(matches!(
            fs.status(&user, &path, &config).await,
            Err(FsError::NotFound)
        ));
        assert!(fs.status(&siteop, &path, &config).await.is_ok());
    }

    #[tokio::test]
    async fn open_write_resume_and_append() {
        let (fs, config, _dir) = fixture();
        let user = test_user(1, "alice", "pw");
        let path = VirtualPath::from_user(&VirtualPath::root(), "/pub/new.bin");

        use tokio::io::AsyncWriteExt;
        let mut file = fs.open_write(&user, &path, 0, false, &config).await.unwrap();
        file.write_all(b"0123456789").await.unwrap();
        file.flush().await.unwrap();
        drop(file);

        let mut file = fs.open_write(&user, &path, 5, false, &config).await.unwrap();
        file.write_all(b"XYZ").await.unwrap();
        file.flush().await.unwrap();
        drop(file);

        let contents = std::fs::read(fs.real(&path)).unwrap();
        assert_eq!(contents, b"01234XYZ89");
    }

    #[tokio::test]
    async fn unlink_refuses_directories() {
        let (fs, config, _dir) = fixture();
        let user = test_user(1, "alice", "pw");
        let path = VirtualPath::from_user(&VirtualPath::root(), "/pub");
        assert!(matches!(
            fs.unlink(&user, &path, &config).await,
            Err(FsError::NotDirectory)
        ));
    }
}
