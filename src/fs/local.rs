use std::{
    fs::{self, File},
    path::{Path, PathBuf},
};

use super::FileSystem;
use crate::{
    content::{Section, Sections},
    error::Error,
    protocol::{Drive, ErrorKind, FileDescriptor, FolderDescriptor},
};

/// [`FileSystem`] backed by `std::fs`
#[derive(Debug, Clone, Default)]
pub struct LocalFileSystem {
    drives: Option<Vec<Drive>>,
}

impl LocalFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reports `drives` instead of the detected ones
    pub fn with_drives(drives: Vec<Drive>) -> Self {
        Self {
            drives: Some(drives),
        }
    }

    fn describe_folder(path: &Path) -> FolderDescriptor {
        match fs::metadata(path) {
            Ok(metadata) => FolderDescriptor::from_metadata(path, &metadata),
            Err(err) => {
                warn!("unable to read folder {}: {}", path.display(), err);
                FolderDescriptor::unreadable(path)
            }
        }
    }

    fn list(path: &Path, get_files: bool, recurse_sub_folders: bool) -> FolderDescriptor {
        let mut folder = Self::describe_folder(path);
        if folder.errors.as_ref().is_some_and(|e| e.error_reading_self) {
            return folder;
        }

        let entries = match fs::read_dir(path) {
            Ok(entries) => entries,
            Err(err) => {
                warn!("unable to list {}: {}", path.display(), err);
                let errors = folder.errors_mut();
                errors.error_reading_sub_folders = true;
                errors.error_reading_files = get_files;
                return folder;
            }
        };

        let mut sub_folders = Vec::new();
        let mut files = Vec::new();

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!("unable to read entry in {}: {}", path.display(), err);
                    folder.errors_mut().error_reading_sub_folders = true;
                    continue;
                }
            };

            let entry_path = entry.path();
            match fs::metadata(&entry_path) {
                Ok(metadata) if metadata.is_dir() => sub_folders.push(entry_path),
                Ok(metadata) if get_files && metadata.is_file() => {
                    files.push(FileDescriptor::from_metadata(&entry_path, &metadata));
                }
                Ok(_) => (),
                Err(err) => {
                    warn!("unable to read {}: {}", entry_path.display(), err);
                    if get_files {
                        folder.errors_mut().error_reading_files = true;
                    }
                }
            }
        }

        sub_folders.sort();
        files.sort_by(|a, b| a.name.cmp(&b.name));

        folder.folders = sub_folders
            .iter()
            .map(|sub| {
                if recurse_sub_folders {
                    Self::list(sub, get_files, true)
                } else {
                    Self::describe_folder(sub)
                }
            })
            .collect();
        folder.length = files.iter().map(|f| f.length).sum();
        folder.files = files;

        folder
    }

    #[cfg(windows)]
    fn detect_drives() -> Vec<Drive> {
        ('A'..='Z')
            .map(|letter| format!("{letter}:\\"))
            .filter(|root| Path::new(root).exists())
            .map(|root| Drive {
                name: root.clone(),
                path: root,
            })
            .collect()
    }

    #[cfg(not(windows))]
    fn detect_drives() -> Vec<Drive> {
        vec![Drive {
            name: "/".to_owned(),
            path: "/".to_owned(),
        }]
    }
}

impl FileSystem for LocalFileSystem {
    fn get_drives(&self) -> Result<Vec<Drive>, Error> {
        Ok(self.drives.clone().unwrap_or_else(Self::detect_drives))
    }

    fn get_folder(
        &self,
        path: &Path,
        get_files: bool,
        recurse_sub_folders: bool,
    ) -> Result<Option<FolderDescriptor>, Error> {
        if !path.is_dir() {
            return Ok(None);
        }

        Ok(Some(Self::list(path, get_files, recurse_sub_folders)))
    }

    fn get_file(&self, path: &Path) -> Result<Option<FileDescriptor>, Error> {
        if !path.is_file() {
            return Ok(None);
        }

        let metadata = fs::metadata(path)?;
        Ok(Some(FileDescriptor::from_metadata(path, &metadata)))
    }

    fn read_sections(
        &self,
        path: &Path,
        section_bytes: u64,
        on_section: &mut dyn FnMut(Section) -> Result<(), Error>,
    ) -> Result<(), Error> {
        if !path.is_file() {
            return Err(Error::status(
                ErrorKind::FileDoesNotExist,
                "File does not exist",
            ));
        }

        let file = File::open(path)?;
        let length = file.metadata()?.len();

        for section in Sections::new(file, length, section_bytes) {
            on_section(section?)?;
        }

        Ok(())
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn is_folder(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn delete_file(&self, path: &Path) -> Result<(), Error> {
        Ok(fs::remove_file(path)?)
    }

    fn delete_folder(&self, path: &Path) -> Result<(), Error> {
        Ok(fs::remove_dir_all(path)?)
    }

    fn move_file(&self, old_path: &Path, new_path: &Path) -> Result<(), Error> {
        create_parent(new_path)?;
        Ok(fs::rename(old_path, new_path)?)
    }

    fn move_folder(&self, old_path: &Path, new_path: &Path) -> Result<(), Error> {
        create_parent(new_path)?;
        Ok(fs::rename(old_path, new_path)?)
    }

    fn create_folder(&self, path: &Path) -> Result<(), Error> {
        if path.is_dir() {
            return Err(Error::status(
                ErrorKind::FolderAlreadyExists,
                "Folder already exists",
            ));
        }

        Ok(fs::create_dir_all(path)?)
    }
}

fn create_parent(path: &Path) -> Result<(), Error> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

/// Parent folder of `path`, or the current folder for a bare name
pub(crate) fn parent_of(path: &Path) -> PathBuf {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
}

#[cfg(test)]
mod test_local {
    use super::*;

    fn tree() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();

        fs::write(root.join("b.txt"), vec![1u8; 300]).unwrap();
        fs::write(root.join("a.txt"), vec![2u8; 200]).unwrap();
        fs::create_dir_all(root.join("sub/deeper")).unwrap();
        fs::write(root.join("sub/c.txt"), b"c").unwrap();
        fs::write(root.join("sub/deeper/d.txt"), b"d").unwrap();

        dir
    }

    #[test]
    fn test_missing_folder() {
        let dir = tempfile::tempdir().unwrap();
        let fs = LocalFileSystem::new();
        assert!(fs
            .get_folder(&dir.path().join("nope"), true, false)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_flat_listing() {
        let dir = tree();
        let fs = LocalFileSystem::new();

        let folder = fs.get_folder(dir.path(), true, false).unwrap().unwrap();
        assert_eq!(folder.path, dir.path().to_string_lossy());
        assert_eq!(
            folder.files.iter().map(|f| f.name.as_str()).collect::<Vec<_>>(),
            vec!["a.txt", "b.txt"]
        );
        assert_eq!(folder.length, 500);
        assert_eq!(folder.folders.len(), 1);
        assert_eq!(folder.folders[0].name, "sub");
        assert!(folder.folders[0].folders.is_empty());
        assert!(folder.folders[0].files.is_empty());
        assert!(folder.errors.is_none());
    }

    #[test]
    fn test_recursive_listing() {
        let dir = tree();
        let fs = LocalFileSystem::new();

        let folder = fs.get_folder(dir.path(), true, true).unwrap().unwrap();
        let sub = &folder.folders[0];
        assert_eq!(sub.files.len(), 1);
        assert_eq!(sub.folders[0].name, "deeper");
        assert_eq!(sub.folders[0].files[0].name, "d.txt");
    }

    #[test]
    fn test_listing_without_files() {
        let dir = tree();
        let folder = LocalFileSystem::new()
            .get_folder(dir.path(), false, false)
            .unwrap()
            .unwrap();

        assert!(folder.files.is_empty());
        assert_eq!(folder.folders.len(), 1);
    }

    #[test]
    fn test_listing_is_repeatable() {
        let dir = tree();
        let fs = LocalFileSystem::new();

        let first = fs.get_folder(dir.path(), true, true).unwrap();
        let second = fs.get_folder(dir.path(), true, true).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_read_sections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.bin");
        let source = (0..2_500u32).map(|i| (i % 7) as u8).collect::<Vec<_>>();
        fs::write(&path, &source).unwrap();

        let mut received = Vec::new();
        let mut count = 0;
        LocalFileSystem::new()
            .read_sections(&path, 1_000, &mut |section: Section| {
                count += 1;
                received.extend_from_slice(&section.data);
                Ok(())
            })
            .unwrap();

        assert_eq!(count, 3);
        assert_eq!(received, source);
    }

    #[test]
    fn test_read_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut ignore = |_: Section| -> Result<(), Error> { Ok(()) };
        let result = LocalFileSystem::new().read_sections(&dir.path().join("x"), 1_000, &mut ignore);

        assert!(matches!(
            result,
            Err(Error::Status {
                kind: ErrorKind::FileDoesNotExist,
                ..
            })
        ));
    }

    #[test]
    fn test_create_existing_folder() {
        let dir = tree();
        let fs = LocalFileSystem::new();

        fs.create_folder(&dir.path().join("new/inner")).unwrap();
        assert!(dir.path().join("new/inner").is_dir());
        assert!(matches!(
            fs.create_folder(&dir.path().join("sub")),
            Err(Error::Status {
                kind: ErrorKind::FolderAlreadyExists,
                ..
            })
        ));
    }

    #[test]
    fn test_move_and_delete() {
        let dir = tree();
        let fs = LocalFileSystem::new();
        let root = dir.path();

        fs.move_file(&root.join("a.txt"), &root.join("moved/a.txt"))
            .unwrap();
        assert!(root.join("moved/a.txt").is_file());

        fs.move_folder(&root.join("sub"), &root.join("sub2")).unwrap();
        assert!(root.join("sub2/deeper/d.txt").is_file());

        fs.delete_folder(&root.join("sub2")).unwrap();
        assert!(!root.join("sub2").exists());

        fs.delete_file(&root.join("b.txt")).unwrap();
        assert!(!fs.is_file(&root.join("b.txt")));
    }

    #[test]
    fn test_drive_override() {
        let drives = vec![Drive {
            name: "data".to_owned(),
            path: "/data".to_owned(),
        }];
        assert_eq!(
            LocalFileSystem::with_drives(drives.clone())
                .get_drives()
                .unwrap(),
            drives
        );
        assert!(!LocalFileSystem::new().get_drives().unwrap().is_empty());
    }

    #[test]
    fn test_parent_of() {
        assert_eq!(parent_of(Path::new("/data/a.txt")), PathBuf::from("/data"));
        assert_eq!(parent_of(Path::new("a.txt")), PathBuf::from("."));
    }
}
