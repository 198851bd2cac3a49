use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use serde::de::DeserializeOwned;
use serde_json::json;
use stacklift_instruments::{OperationRecord, Reporter};
use url::Url;

use crate::error::LibraryApiError;
use crate::types::{ApiId, ApiResponse, BooksPage, BorrowBody, LoginBody, SessionToken};

/// Request timeout. Responses this slow count against the latency thresholds long before the
/// timeout fires.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Header carrying the session token, as expected by the API.
const TOKEN_HEADER: &str = "x-access-token";

/// An instrumented client for the library-management API.
///
/// Every call records one timed operation and one named status check with the run's reporter.
/// Business-logic rejections are valid responses here, not errors; only transport-level failures
/// surface as `Err`, and those fail the call's check as well.
#[derive(Clone)]
pub struct LibraryClient {
    base_url: Url,
    http: reqwest::Client,
    reporter: Arc<Reporter>,
}

impl fmt::Debug for LibraryClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LibraryClient")
            .field("base_url", &self.base_url.as_str())
            .finish_non_exhaustive()
    }
}

impl LibraryClient {
    pub fn new(base_url: &str, reporter: Arc<Reporter>) -> Result<Self, LibraryApiError> {
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        Ok(Self {
            base_url: Url::parse(base_url)?,
            http,
            reporter,
        })
    }

    /// POST `/api/login`, expecting `{"token": "..."}` back on success.
    pub async fn login(
        &self,
        username: &str,
        password: &str,
    ) -> Result<ApiResponse<LoginBody>, LibraryApiError> {
        let url = self.endpoint("api/login")?;
        let request = self
            .http
            .post(url)
            .json(&json!({ "username": username, "password": password }));

        self.call("login", "login status is 200", &[200], request)
            .await
    }

    /// GET `/api/books` with pagination, expecting `{"data": [...]}`.
    pub async fn list_books(
        &self,
        token: &SessionToken,
        page: u32,
        limit: u32,
    ) -> Result<ApiResponse<BooksPage>, LibraryApiError> {
        let mut url = self.endpoint("api/books")?;
        url.query_pairs_mut()
            .append_pair("page", &page.to_string())
            .append_pair("limit", &limit.to_string());

        let request = self
            .http
            .get(url)
            .header(CONTENT_TYPE, "application/json")
            .header(TOKEN_HEADER, token.as_str());

        self.call("list_books", "books status is 200", &[200], request)
            .await
    }

    /// POST `/api/borrow-records` to borrow one book.
    ///
    /// 400 (already borrowed) and 404 (no longer available) are accepted outcomes alongside
    /// 201; the API refusing a borrow is business as usual under load.
    pub async fn borrow_book(
        &self,
        token: &SessionToken,
        book_id: &ApiId,
    ) -> Result<ApiResponse<BorrowBody>, LibraryApiError> {
        let url = self.endpoint("api/borrow-records")?;
        let request = self
            .http
            .post(url)
            .header(TOKEN_HEADER, token.as_str())
            .json(&json!({ "book_id": book_id }));

        self.call(
            "borrow_book",
            "borrow status is 201, 400 or 404",
            &[201, 400, 404],
            request,
        )
        .await
    }

    /// PUT `/api/borrow-records/{record_id}` with an empty body to return a borrowed book.
    pub async fn return_book(
        &self,
        token: &SessionToken,
        record_id: &ApiId,
    ) -> Result<ApiResponse<serde_json::Value>, LibraryApiError> {
        let url = self.endpoint(&format!("api/borrow-records/{record_id}"))?;
        let request = self.http.put(url).header(TOKEN_HEADER, token.as_str());

        self.call("return_book", "return status is 200", &[200], request)
            .await
    }

    async fn call<T: DeserializeOwned>(
        &self,
        operation_id: &str,
        check_name: &str,
        accepted_statuses: &[u16],
        request: reqwest::RequestBuilder,
    ) -> Result<ApiResponse<T>, LibraryApiError> {
        let record = OperationRecord::new(operation_id);

        let result = async {
            let response = request.send().await?;
            let status = response.status().as_u16();
            let bytes = response.bytes().await?;
            Ok::<_, reqwest::Error>((status, bytes))
        }
        .await;

        match result {
            Ok((status, bytes)) => {
                self.reporter.add_operation(record.finish(false));
                self.reporter
                    .add_check(check_name, accepted_statuses.contains(&status));

                let body = serde_json::from_slice::<T>(&bytes).ok();
                Ok(ApiResponse { status, body })
            }
            Err(e) => {
                log::debug!("Request [{operation_id}] failed in transport: {e}");
                self.reporter.add_operation(record.finish(true));
                self.reporter.add_check(check_name, false);
                Err(e.into())
            }
        }
    }

    fn endpoint(&self, path: &str) -> Result<Url, LibraryApiError> {
        Ok(self.base_url.join(path)?)
    }
}
