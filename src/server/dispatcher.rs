use std::{path::Path, sync::Arc};

use super::sessions::{WriteProgress, WriteSessions};
use crate::{
    auth::{AuthorizationGate, Roles},
    content::{check_section_bytes, Section},
    error::Error,
    fs::FileSystem,
    protocol::{
        CreateFolderRequest, CreateFolderResponse, DeleteRequest, DeleteResponse, ErrorKind,
        GetDrivesRequest, GetDrivesResponse, GetFileContentRequest, GetFileContentResponse,
        GetFileRequest, GetFileResponse, GetFolderRequest, GetFolderResponse, MoveRequest,
        MoveResponse, Request, Response, ResponseStatus, WriteFileRequest, WriteFileResponse,
    },
};

/// Hands one response to the connection. Fails once the connection is gone.
pub type Reply<'a> = dyn FnMut(Response) -> Result<(), Error> + 'a;

/// Authorizes and executes requests. Holds no per-request state; uploads in
/// progress live in [`WriteSessions`].
pub struct Dispatcher {
    fs: Arc<dyn FileSystem>,
    gate: Arc<AuthorizationGate>,
    sessions: Arc<WriteSessions>,
}

impl Dispatcher {
    pub fn new(
        fs: Arc<dyn FileSystem>,
        gate: Arc<AuthorizationGate>,
        sessions: Arc<WriteSessions>,
    ) -> Self {
        Self { fs, gate, sessions }
    }

    pub fn gate(&self) -> &Arc<AuthorizationGate> {
        &self.gate
    }

    pub fn sessions(&self) -> &Arc<WriteSessions> {
        &self.sessions
    }

    /// Executes `request` and passes every response to `reply`. Blocks on
    /// file system work. Exactly one response with `is_more == false` is
    /// produced unless the connection goes away first.
    pub fn dispatch(&self, request: Request, reply: &mut Reply<'_>) -> Result<(), Error> {
        let type_tag = request.type_tag();
        let request_id = request.get_request_id().to_owned();
        let session_id = match &request {
            Request::WriteFile(write) => Some(write.session_id.clone()),
            _ => None,
        };

        let result = match request {
            Request::GetDrives(request) => self.get_drives(&request).map(Response::from),
            Request::GetFolder(request) => self.get_folder(&request).map(Response::from),
            Request::GetFile(request) => self.get_file(&request).map(Response::from),
            Request::GetFileContent(request) => match self.get_file_content(&request, reply) {
                Ok(()) => return Ok(()),
                Err(error) => Err(error),
            },
            Request::WriteFile(request) => self.write_file(&request).map(Response::from),
            Request::Delete(request) => self.delete(&request).map(Response::from),
            Request::Move(request) => self.move_path(&request).map(Response::from),
            Request::CreateFolder(request) => self.create_folder(&request).map(Response::from),
        };

        let response = match result {
            Ok(response) => response,
            Err(Error::Closed) => return Err(Error::Closed),
            Err(error) => {
                let (kind, message) = error.into_status();
                Response::error(
                    type_tag,
                    &request_id,
                    session_id.as_deref(),
                    kind,
                    &message,
                )
                .ok_or_else(|| Error::BadMessage(format!("no response type for {type_tag}")))?
            }
        };

        reply(response)
    }

    fn get_drives(&self, request: &GetDrivesRequest) -> Result<GetDrivesResponse, Error> {
        let user = self
            .gate
            .authorize_role(&request.security_key, Roles::READ)?;

        let drives = self
            .fs
            .get_drives()?
            .into_iter()
            .filter(|drive| user.can_access(&drive.path))
            .collect();

        Ok(GetDrivesResponse::new(
            ResponseStatus::ok(&request.id),
            drives,
        ))
    }

    fn get_folder(&self, request: &GetFolderRequest) -> Result<GetFolderResponse, Error> {
        let _ = self
            .gate
            .authorize(&request.security_key, Roles::READ, &request.path)?;

        let folder = self
            .fs
            .get_folder(
                Path::new(&request.path),
                request.get_files,
                request.recurse_sub_folders,
            )?
            .ok_or_else(|| {
                Error::status(ErrorKind::DirectoryDoesNotExist, "Folder does not exist")
            })?;

        Ok(GetFolderResponse::new(
            ResponseStatus::ok(&request.id),
            Some(folder),
        ))
    }

    fn get_file(&self, request: &GetFileRequest) -> Result<GetFileResponse, Error> {
        let _ = self
            .gate
            .authorize(&request.security_key, Roles::READ, &request.path)?;

        let file = self
            .fs
            .get_file(Path::new(&request.path))?
            .ok_or_else(|| Error::status(ErrorKind::FileDoesNotExist, "File does not exist"))?;

        Ok(GetFileResponse::new(ResponseStatus::ok(&request.id), Some(file)))
    }

    fn get_file_content(
        &self,
        request: &GetFileContentRequest,
        reply: &mut Reply<'_>,
    ) -> Result<(), Error> {
        let _ = self
            .gate
            .authorize(&request.security_key, Roles::READ, &request.path)?;
        check_section_bytes(request.section_bytes)?;

        self.fs.read_sections(
            Path::new(&request.path),
            request.section_bytes,
            &mut |section: Section| {
                reply(
                    GetFileContentResponse::new(
                        ResponseStatus::section(&request.id, section.sequence, section.is_more),
                        section.data,
                    )
                    .into(),
                )
            },
        )
    }

    fn write_file(&self, request: &WriteFileRequest) -> Result<WriteFileResponse, Error> {
        let user = self
            .gate
            .authorize(&request.security_key, Roles::WRITE, &request.file.path)?;

        let progress = self.sessions.write(
            &request.session_id,
            &user.id,
            &request.file,
            &request.content,
            request.is_more,
        )?;

        if progress == WriteProgress::Completed {
            debug!("upload {} to {} complete", request.session_id, request.file.path);
        }

        Ok(WriteFileResponse::new(
            ResponseStatus::ok(&request.id),
            request.session_id.clone(),
        ))
    }

    fn delete(&self, request: &DeleteRequest) -> Result<DeleteResponse, Error> {
        let _ = self
            .gate
            .authorize(&request.security_key, Roles::WRITE, &request.path)?;

        let path = Path::new(&request.path);
        if self.fs.is_file(path) {
            self.fs.delete_file(path)?;
        } else if self.fs.is_folder(path) {
            self.fs.delete_folder(path)?;
        } else {
            return Err(Error::status(
                ErrorKind::Unknown,
                "File or folder does not exist",
            ));
        }

        Ok(DeleteResponse::new(ResponseStatus::ok(&request.id)))
    }

    fn move_path(&self, request: &MoveRequest) -> Result<MoveResponse, Error> {
        let _ = self
            .gate
            .authorize(&request.security_key, Roles::WRITE, &request.old_path)?;
        let _ = self
            .gate
            .authorize(&request.security_key, Roles::WRITE, &request.new_path)?;

        let old_path = Path::new(&request.old_path);
        let new_path = Path::new(&request.new_path);

        if self.fs.is_file(old_path) {
            if self.fs.is_file(new_path) {
                return Err(Error::status(ErrorKind::Unknown, "New file already exists"));
            }
            self.fs.move_file(old_path, new_path)?;
        } else if self.fs.is_folder(old_path) {
            if self.fs.is_folder(new_path) {
                return Err(Error::status(
                    ErrorKind::Unknown,
                    "New folder already exists",
                ));
            }
            self.fs.move_folder(old_path, new_path)?;
        } else {
            return Err(Error::status(
                ErrorKind::Unknown,
                "File or folder does not exist",
            ));
        }

        Ok(MoveResponse::new(ResponseStatus::ok(&request.id)))
    }

    fn create_folder(&self, request: &CreateFolderRequest) -> Result<CreateFolderResponse, Error> {
        let _ = self
            .gate
            .authorize(&request.security_key, Roles::WRITE, &request.path)?;

        self.fs.create_folder(Path::new(&request.path))?;

        Ok(CreateFolderResponse::new(ResponseStatus::ok(&request.id)))
    }
}
