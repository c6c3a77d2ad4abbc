use super::error::Error;
use crate::protocol::{
    CreateFolderResponse, DeleteResponse, GetDrivesResponse, GetFileContentResponse,
    GetFileResponse, GetFolderResponse, MoveResponse, WriteFileResponse,
};

/// Client stream handler. This is `async_trait`
#[async_trait]
pub trait Handler: Sized {
    type Error: Into<Error>;

    /// Called on `GetDrivesResponse`.
    #[allow(unused_variables)]
    async fn get_drives(&mut self, response: GetDrivesResponse) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Called on `GetFolderResponse`.
    #[allow(unused_variables)]
    async fn get_folder(&mut self, response: GetFolderResponse) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Called on `GetFileResponse`.
    #[allow(unused_variables)]
    async fn get_file(&mut self, response: GetFileResponse) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Called on every `GetFileContentResponse` section.
    #[allow(unused_variables)]
    async fn get_file_content(
        &mut self,
        response: GetFileContentResponse,
    ) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Called on `WriteFileResponse`.
    #[allow(unused_variables)]
    async fn write_file(&mut self, response: WriteFileResponse) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Called on `DeleteResponse`.
    #[allow(unused_variables)]
    async fn delete(&mut self, response: DeleteResponse) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Called on `MoveResponse`.
    #[allow(unused_variables)]
    async fn move_path(&mut self, response: MoveResponse) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Called on `CreateFolderResponse`.
    #[allow(unused_variables)]
    async fn create_folder(&mut self, response: CreateFolderResponse) -> Result<(), Self::Error> {
        Ok(())
    }

    /// Called once the read half of the stream has ended.
    async fn disconnected(&mut self) {}
}
