//! Access to the machine's own file system on behalf of remote clients.

mod local;

use std::path::Path;

pub use self::local::LocalFileSystem;
pub(crate) use self::local::parent_of;

use crate::{
    content::Section,
    error::Error,
    protocol::{Drive, FileDescriptor, FolderDescriptor},
};

/// Blocking file system operations used by the request dispatcher. All
/// methods are called from tokio's blocking pool.
pub trait FileSystem: Send + Sync {
    fn get_drives(&self) -> Result<Vec<Drive>, Error>;

    /// `Ok(None)` when `path` is not a folder. Entries that cannot be read are
    /// flagged in the descriptor's errors rather than failing the call.
    fn get_folder(
        &self,
        path: &Path,
        get_files: bool,
        recurse_sub_folders: bool,
    ) -> Result<Option<FolderDescriptor>, Error>;

    /// `Ok(None)` when `path` is not a file
    fn get_file(&self, path: &Path) -> Result<Option<FileDescriptor>, Error>;

    /// Streams the file at `path` to `on_section` one section at a time.
    /// Stops at the first error from either side.
    fn read_sections(
        &self,
        path: &Path,
        section_bytes: u64,
        on_section: &mut dyn FnMut(Section) -> Result<(), Error>,
    ) -> Result<(), Error>;

    fn is_file(&self, path: &Path) -> bool;

    fn is_folder(&self, path: &Path) -> bool;

    fn delete_file(&self, path: &Path) -> Result<(), Error>;

    /// Removes the folder and everything below it
    fn delete_folder(&self, path: &Path) -> Result<(), Error>;

    fn move_file(&self, old_path: &Path, new_path: &Path) -> Result<(), Error>;

    fn move_folder(&self, old_path: &Path, new_path: &Path) -> Result<(), Error>;

    fn create_folder(&self, path: &Path) -> Result<(), Error>;

    fn path_combine(&self, base: &str, name: &str) -> String {
        Path::new(base).join(name).to_string_lossy().into_owned()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::path::Path;

    use super::FileSystem;
    use crate::{
        content::Section,
        error::Error,
        protocol::{Drive, FileDescriptor, FolderDescriptor},
    };

    /// Hands out a few full sections of any file, then fails the read
    pub(crate) struct FailingReads {
        sections: u64,
    }

    impl FailingReads {
        pub(crate) fn after(sections: u64) -> Self {
            Self { sections }
        }
    }

    impl FileSystem for FailingReads {
        fn get_drives(&self) -> Result<Vec<Drive>, Error> {
            Ok(Vec::new())
        }

        fn get_folder(&self, _: &Path, _: bool, _: bool) -> Result<Option<FolderDescriptor>, Error> {
            Ok(None)
        }

        fn get_file(&self, _: &Path) -> Result<Option<FileDescriptor>, Error> {
            Ok(None)
        }

        fn read_sections(
            &self,
            _: &Path,
            section_bytes: u64,
            on_section: &mut dyn FnMut(Section) -> Result<(), Error>,
        ) -> Result<(), Error> {
            for sequence in 0..self.sections {
                on_section(Section {
                    sequence,
                    data: vec![sequence as u8; section_bytes as usize],
                    is_more: true,
                })?;
            }

            Err(Error::IO("device went away".to_owned()))
        }

        fn is_file(&self, _: &Path) -> bool {
            true
        }

        fn is_folder(&self, _: &Path) -> bool {
            false
        }

        fn delete_file(&self, _: &Path) -> Result<(), Error> {
            Ok(())
        }

        fn delete_folder(&self, _: &Path) -> Result<(), Error> {
            Ok(())
        }

        fn move_file(&self, _: &Path, _: &Path) -> Result<(), Error> {
            Ok(())
        }

        fn move_folder(&self, _: &Path, _: &Path) -> Result<(), Error> {
            Ok(())
        }

        fn create_folder(&self, _: &Path) -> Result<(), Error> {
            Ok(())
        }
    }
}
