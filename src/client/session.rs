use std::{sync::Arc, time::Duration};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};

use super::{error::Error, rawsession::RawSession};
use crate::{
    config::ClientConfig,
    content::{Assembler, Section, MAX_SECTION_BYTES},
    protocol::{Drive, FileDescriptor, FolderDescriptor, Response},
    utils::new_id,
};

/// High-level client for interaction with a remote file system.
/// Contains methods similar to the native [filesystem](std::fs), plus
/// section-by-section variants for large files.
pub struct RemoteFileSystem {
    session: Arc<RawSession>,
    section_bytes: u64,
}

impl RemoteFileSystem {
    pub fn new<S>(stream: S, config: &ClientConfig) -> Self
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let session = RawSession::new(stream, config.security_key.as_str())
            .with_timeout(config.response_timeout());

        Self {
            session: Arc::new(session),
            section_bytes: config.section_bytes.min(MAX_SECTION_BYTES),
        }
    }

    /// The underlying request-response session
    pub fn session(&self) -> &Arc<RawSession> {
        &self.session
    }

    pub const fn section_bytes(&self) -> u64 {
        self.section_bytes
    }

    /// Size of the sections requested on read and sent on write, capped at
    /// [`MAX_SECTION_BYTES`]
    pub fn set_section_bytes(&mut self, section_bytes: u64) {
        self.section_bytes = section_bytes.min(MAX_SECTION_BYTES);
    }

    /// Set the overall response deadline of each request.
    /// Default: 30 seconds
    pub async fn set_timeout(&self, timeout: Duration) {
        self.session.set_timeout(timeout).await;
    }

    /// Closes the inner channel stream.
    pub fn close(&self) -> Result<(), Error> {
        self.session.close_session()
    }

    /// Drives the user may see
    pub async fn get_drives(&self) -> Result<Vec<Drive>, Error> {
        Ok(self.session.get_drives().await?.drives)
    }

    /// Describes a folder. `None` means the server sent no descriptor.
    pub async fn get_folder<P: Into<String>>(
        &self,
        path: P,
        get_files: bool,
        recurse_sub_folders: bool,
    ) -> Result<Option<FolderDescriptor>, Error> {
        Ok(self
            .session
            .get_folder(path, get_files, recurse_sub_folders)
            .await?
            .folder)
    }

    pub async fn get_file<P: Into<String>>(&self, path: P) -> Result<Option<FileDescriptor>, Error> {
        Ok(self.session.get_file(path).await?.file)
    }

    /// Calls `on_section` for every section of the file in order. An error
    /// status in the middle of the stream is returned as an error and every
    /// section handed out before it must be thrown away.
    pub async fn read_by_section<P, F>(&self, path: P, mut on_section: F) -> Result<(), Error>
    where
        P: Into<String>,
        F: FnMut(Section) -> Result<(), Error> + Send,
    {
        let mut responses = self
            .session
            .get_file_content(path, self.section_bytes)
            .await?;

        let mut expected = 0;
        while let Some(response) = responses.next().await {
            let Response::GetFileContent(response) = response? else {
                return Err(Error::UnexpectedPacket);
            };

            if response.status.is_error() {
                return Err(Error::from(&response.status));
            }

            on_section(Section {
                sequence: response.status.sequence.unwrap_or(expected),
                data: response.content,
                is_more: response.status.is_more,
            })?;

            expected += 1;
        }

        Ok(())
    }

    /// Reads the whole file into memory.
    pub async fn read<P: Into<String>>(&self, path: P) -> Result<Vec<u8>, Error> {
        let mut assembler = Assembler::new();

        self.read_by_section(path, |section| {
            assembler
                .push(Some(section.sequence), &section.data, section.is_more)
                .map_err(Error::from)
        })
        .await?;

        if !assembler.is_complete() {
            return Err(Error::UnexpectedBehavior(
                "content ended before the final section".to_owned(),
            ));
        }

        Ok(assembler.into_inner())
    }

    /// Uploads `length` bytes from `reader` to `path` in sections of
    /// [`section_bytes`](Self::section_bytes). An empty source is sent as one
    /// empty final section.
    pub async fn write_by_section<P, R>(&self, path: P, mut reader: R, length: u64) -> Result<(), Error>
    where
        P: Into<String>,
        R: AsyncRead + Unpin + Send,
    {
        let file = FileDescriptor::for_upload(path, length);
        let session_id = new_id();
        let section_bytes = self.section_bytes.max(1);

        debug!("upload {} of {} bytes as {}", file.path, length, session_id);

        let mut remaining = length;
        loop {
            let size = remaining.min(section_bytes);
            let mut content = vec![0; size as usize];
            reader.read_exact(&mut content).await?;

            remaining -= size;
            let is_more = remaining > 0;

            let _ = self
                .session
                .write_file(session_id.as_str(), file.clone(), content, is_more)
                .await?;

            if !is_more {
                return Ok(());
            }
        }
    }

    /// Writes the contents to a file whose path is specified, replacing it
    /// if it exists.
    pub async fn write<P: Into<String>>(&self, path: P, data: &[u8]) -> Result<(), Error> {
        self.write_by_section(path, data, data.len() as u64).await
    }

    pub async fn delete_file<P: Into<String>>(&self, path: P) -> Result<(), Error> {
        self.session.delete(path).await.map(|_| ())
    }

    /// Removes a folder with everything in it
    pub async fn delete_folder<P: Into<String>>(&self, path: P) -> Result<(), Error> {
        self.session.delete(path).await.map(|_| ())
    }

    pub async fn move_file<O, N>(&self, old_path: O, new_path: N) -> Result<(), Error>
    where
        O: Into<String>,
        N: Into<String>,
    {
        self.session.move_path(old_path, new_path).await.map(|_| ())
    }

    pub async fn move_folder<O, N>(&self, old_path: O, new_path: N) -> Result<(), Error>
    where
        O: Into<String>,
        N: Into<String>,
    {
        self.session.move_path(old_path, new_path).await.map(|_| ())
    }

    pub async fn create_folder<P: Into<String>>(&self, path: P) -> Result<(), Error> {
        self.session.create_folder(path).await.map(|_| ())
    }
}

#[cfg(test)]
mod test_session {
    use std::sync::Arc;
    use tokio::io::duplex;

    use super::*;
    use crate::{
        auth::{MemoryUserDirectory, Permissions, Roles, User},
        config::ServerConfig,
        fs::{test_support::FailingReads, LocalFileSystem},
        protocol::ErrorKind,
        server::Server,
    };

    fn client(server: &Server, key: &str) -> RemoteFileSystem {
        let (client, remote) = duplex(1024 * 1024);
        let _handle = server.serve(remote, "test");

        let mut config = ClientConfig::new("in-process", key);
        config.section_bytes = 1000;
        RemoteFileSystem::new(client, &config)
    }

    fn server(root: &str) -> Server {
        let directory = MemoryUserDirectory::new(vec![
            User::new("admin", "admin-key", Roles::READ | Roles::WRITE),
            User::new("reader", "reader-key", Roles::READ),
            User::new("elsewhere", "elsewhere-key", Roles::READ | Roles::WRITE)
                .with_permissions(Permissions::paths(["/other"])),
            User::new("scoped", "scoped-key", Roles::READ | Roles::WRITE)
                .with_permissions(Permissions::paths([root])),
        ]);

        Server::new(
            &ServerConfig::default(),
            Arc::new(LocalFileSystem::new()),
            Arc::new(directory),
        )
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_string_lossy().into_owned();
        let server = server(&root);
        let fs = client(&server, "admin-key");

        let path = format!("{root}/nested/data.bin");
        let data: Vec<u8> = (0..4321u32).map(|i| (i % 251) as u8).collect();
        fs.write(path.as_str(), &data).await.unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), data);
        assert_eq!(fs.read(path.as_str()).await.unwrap(), data);

        let file = fs.get_file(path.as_str()).await.unwrap().unwrap();
        assert_eq!(file.length, 4321);
        assert!(server.sessions().is_empty());
    }

    #[tokio::test]
    async fn test_read_by_section() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.bin");
        std::fs::write(&path, vec![7; 2500]).unwrap();

        let server = server("/");
        let fs = client(&server, "reader-key");

        let mut sections = Vec::new();
        fs.read_by_section(path.to_string_lossy(), |section| {
            sections.push((section.sequence, section.data.len(), section.is_more));
            Ok(())
        })
        .await
        .unwrap();

        assert_eq!(
            sections,
            vec![(0, 1000, true), (1, 1000, true), (2, 500, false)]
        );
    }

    #[tokio::test]
    async fn test_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty").to_string_lossy().into_owned();
        let server = server("/");
        let fs = client(&server, "admin-key");

        fs.write(path.as_str(), &[]).await.unwrap();
        assert!(fs.read(path.as_str()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_small_section_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.bin");
        std::fs::write(&path, vec![1; 10]).unwrap();

        let server = server("/");
        let mut fs = client(&server, "reader-key");
        fs.set_section_bytes(500);

        let error = fs.read(path.to_string_lossy()).await.unwrap_err();
        assert_eq!(error.kind(), Some(ErrorKind::FileSystemError));
    }

    #[tokio::test]
    async fn test_section_size_is_capped() {
        let server = server("/");
        let mut config = ClientConfig::new("in-process", "admin-key");
        config.section_bytes = u64::MAX;

        let (client, _remote) = duplex(1024);
        let mut fs = RemoteFileSystem::new(client, &config);
        assert_eq!(fs.section_bytes(), MAX_SECTION_BYTES);

        fs.set_section_bytes(MAX_SECTION_BYTES * 2);
        assert_eq!(fs.section_bytes(), MAX_SECTION_BYTES);

        let mut fs = self::client(&server, "admin-key");
        fs.set_section_bytes(MAX_SECTION_BYTES);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.bin");
        std::fs::write(&path, vec![3; 2000]).unwrap();
        assert_eq!(fs.read(path.to_string_lossy()).await.unwrap(), vec![3; 2000]);
    }

    #[tokio::test]
    async fn test_read_failure_midway() {
        let directory =
            MemoryUserDirectory::new(vec![User::new("admin", "admin-key", Roles::READ)]);
        let server = Server::new(
            &ServerConfig::default(),
            Arc::new(FailingReads::after(2)),
            Arc::new(directory),
        );
        let fs = client(&server, "admin-key");

        let mut sections = Vec::new();
        let error = fs
            .read_by_section("/flaky.bin", |section| {
                sections.push(section.sequence);
                Ok(())
            })
            .await
            .unwrap_err();
        assert_eq!(error.kind(), Some(ErrorKind::FileSystemError));
        assert_eq!(sections, vec![0, 1]);

        let error = fs.read("/flaky.bin").await.unwrap_err();
        assert_eq!(error.kind(), Some(ErrorKind::FileSystemError));
    }

    #[tokio::test]
    async fn test_folder_operations() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_string_lossy().into_owned();
        let server = server(&root);
        let fs = client(&server, "scoped-key");

        let folder = format!("{root}/a");
        fs.create_folder(folder.as_str()).await.unwrap();
        assert_eq!(
            fs.create_folder(folder.as_str()).await.unwrap_err().kind(),
            Some(ErrorKind::FolderAlreadyExists)
        );

        fs.write(format!("{folder}/x.txt"), b"hello").await.unwrap();
        fs.move_folder(folder.as_str(), format!("{root}/b"))
            .await
            .unwrap();

        let listing = fs.get_folder(root.as_str(), true, true).await.unwrap().unwrap();
        assert_eq!(listing.folders.len(), 1);
        assert_eq!(listing.folders[0].name, "b");
        assert_eq!(listing.folders[0].files[0].name, "x.txt");

        fs.move_file(format!("{root}/b/x.txt"), format!("{root}/y.txt"))
            .await
            .unwrap();
        fs.delete_file(format!("{root}/y.txt")).await.unwrap();
        fs.delete_folder(format!("{root}/b")).await.unwrap();

        let listing = fs.get_folder(root.as_str(), true, false).await.unwrap().unwrap();
        assert!(listing.folders.is_empty());
        assert!(listing.files.is_empty());
    }

    #[tokio::test]
    async fn test_permissions() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_string_lossy().into_owned();
        let server = server(&root);

        let reader = client(&server, "reader-key");
        assert_eq!(
            reader
                .create_folder(format!("{root}/a"))
                .await
                .unwrap_err()
                .kind(),
            Some(ErrorKind::PermissionDenied)
        );

        let elsewhere = client(&server, "elsewhere-key");
        assert_eq!(
            elsewhere
                .get_folder(root.as_str(), true, false)
                .await
                .unwrap_err()
                .kind(),
            Some(ErrorKind::PermissionDenied)
        );

        let stranger = client(&server, "no-such-key");
        assert_eq!(
            stranger.get_drives().await.unwrap_err().kind(),
            Some(ErrorKind::PermissionDenied)
        );
    }

    #[tokio::test]
    async fn test_close() {
        let server = server("/");
        let fs = client(&server, "admin-key");
        fs.close().unwrap();

        for _ in 0..100 {
            if fs.get_drives().await.is_err() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        panic!("session still usable after close");
    }
}
