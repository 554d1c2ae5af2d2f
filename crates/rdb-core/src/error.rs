use thiserror::Error;

pub type CoreResult<T> = Result<T, CoreError>;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid owner id: {value}")]
    InvalidOwnerId { value: u32 },

    #[error("Invalid task directory name: {name}")]
    InvalidTaskDir { name: String },

    #[error("Path is not valid UTF-8: {path}")]
    NonUtf8Path { path: String },
}
