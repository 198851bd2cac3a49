mod client;
mod error;
mod types;

pub mod prelude {
    pub use crate::client::LibraryClient;
    pub use crate::error::LibraryApiError;
    pub use crate::types::{
        ApiId, ApiResponse, BookSummary, BooksPage, BorrowBody, BorrowRecord, LoginBody,
        SessionToken,
    };
}
