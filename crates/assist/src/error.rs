pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("nothing to process: {0}")]
    NothingToProcess(String),
    #[error("no collaborator configured for {0}")]
    NoCollaborator(crate::suggestion::AssistFeature),
    #[error(transparent)]
    Document(#[from] emend_document::Error),
}
