//! The borrow/return cycle that each virtual user repeats.

use std::time::Duration;

use anyhow::Context;
use library_client_instrumented::prelude::{
    ApiResponse, LibraryClient, LoginBody, SessionToken,
};

/// Pagination for the catalog listing; the first page is enough to find a borrowable book.
const PAGE: u32 = 1;
const PAGE_LIMIT: u32 = 20;

/// How one iteration ended. The variants matter to tests and debug logs, not to control flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterationOutcome {
    /// The catalog gave us nothing to borrow: an empty page, a malformed body, or a failed call.
    NoBookAvailable,
    /// A borrow was attempted but no record id came back, so there was nothing to return.
    BorrowedWithoutRecord,
    /// The full cycle ran and a return was issued for the borrow record.
    Returned,
}

/// Pull the session token out of a login response.
///
/// A missing or malformed token is fatal: no iteration can run without it, so the caller should
/// let this error abort the run.
pub fn extract_token(response: ApiResponse<LoginBody>) -> anyhow::Result<SessionToken> {
    response
        .body
        .and_then(|body| body.token)
        .map(SessionToken::new)
        .context("Login response did not contain a token")
}

/// Run one borrow/return cycle.
///
/// Every step is defensive: a failed or malformed response disables the dependent downstream
/// steps and the iteration ends normally. Errors never escape to the caller, and the
/// `think_time` pause runs on every path to pace the virtual user.
pub async fn borrow_return_cycle(
    client: &LibraryClient,
    token: &SessionToken,
    think_time: Duration,
) -> IterationOutcome {
    let outcome = run_steps(client, token).await;
    tokio::time::sleep(think_time).await;
    outcome
}

async fn run_steps(client: &LibraryClient, token: &SessionToken) -> IterationOutcome {
    let book_id = match client.list_books(token, PAGE, PAGE_LIMIT).await {
        Ok(response) => response.body.and_then(|page| page.first_book_id()),
        Err(e) => {
            log::warn!("Book list request failed: {e}");
            None
        }
    };

    let Some(book_id) = book_id else {
        log::warn!("No book available to borrow this iteration");
        return IterationOutcome::NoBookAvailable;
    };

    // Absence of a record id is a valid outcome: another agent may have taken the book between
    // the listing and this call.
    let record_id = match client.borrow_book(token, &book_id).await {
        Ok(response) => response.body.and_then(|body| body.record_id()),
        Err(e) => {
            log::warn!("Borrow request failed: {e}");
            None
        }
    };

    let Some(record_id) = record_id else {
        return IterationOutcome::BorrowedWithoutRecord;
    };

    if let Err(e) = client.return_book(token, &record_id).await {
        log::warn!("Return request failed: {e}");
    }

    IterationOutcome::Returned
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use serde_json::json;
    use stacklift_instruments::ReportConfig;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> LibraryClient {
        LibraryClient::new(&server.uri(), Arc::new(ReportConfig::default().init())).unwrap()
    }

    fn token() -> SessionToken {
        SessionToken::new("abc123")
    }

    async fn run_cycle(server: &MockServer) -> IterationOutcome {
        borrow_return_cycle(&client_for(server), &token(), Duration::ZERO).await
    }

    fn books_page(ids: &[serde_json::Value]) -> serde_json::Value {
        json!({
            "data": ids
                .iter()
                .map(|id| json!({ "id": id, "title": "A Book" }))
                .collect::<Vec<_>>(),
        })
    }

    #[tokio::test]
    async fn empty_catalog_ends_the_iteration_before_borrowing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/books"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [] })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/borrow-records"))
            .respond_with(ResponseTemplate::new(201))
            .expect(0)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let outcome = run_cycle(&server).await;

        assert_eq!(IterationOutcome::NoBookAvailable, outcome);
    }

    #[tokio::test]
    async fn malformed_catalog_body_ends_the_iteration_before_borrowing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/books"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(201))
            .expect(0)
            .mount(&server)
            .await;

        let outcome = run_cycle(&server).await;

        assert_eq!(IterationOutcome::NoBookAvailable, outcome);
    }

    #[tokio::test]
    async fn a_listed_book_is_always_borrowed_and_a_record_is_always_returned() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/books"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(books_page(&[json!(42), json!(43)])),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/borrow-records"))
            .and(body_json(json!({ "book_id": 42 })))
            .and(header("x-access-token", "abc123"))
            .respond_with(
                ResponseTemplate::new(201).set_body_json(json!({ "record": { "id": 7 } })),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/api/borrow-records/7"))
            .and(header("x-access-token", "abc123"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = run_cycle(&server).await;

        assert_eq!(IterationOutcome::Returned, outcome);
    }

    #[tokio::test]
    async fn borrow_rejection_without_a_record_skips_the_return_step() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/books"))
            .respond_with(ResponseTemplate::new(200).set_body_json(books_page(&[json!(42)])))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/borrow-records"))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_json(json!({ "error": "Book already borrowed" })),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let outcome = run_cycle(&server).await;

        assert_eq!(IterationOutcome::BorrowedWithoutRecord, outcome);
    }

    #[tokio::test]
    async fn object_id_strings_flow_through_the_whole_cycle() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/books"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(books_page(&[json!("64f0a1")])),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/borrow-records"))
            .and(body_json(json!({ "book_id": "64f0a1" })))
            .respond_with(
                ResponseTemplate::new(201)
                    .set_body_json(json!({ "record": { "id": "64fb77" } })),
            )
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/api/borrow-records/64fb77"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = run_cycle(&server).await;

        assert_eq!(IterationOutcome::Returned, outcome);
    }

    #[tokio::test]
    async fn failed_return_still_completes_the_iteration() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/books"))
            .respond_with(ResponseTemplate::new(200).set_body_json(books_page(&[json!(42)])))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/borrow-records"))
            .respond_with(
                ResponseTemplate::new(201).set_body_json(json!({ "record": { "id": 7 } })),
            )
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/api/borrow-records/7"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let outcome = run_cycle(&server).await;

        assert_eq!(IterationOutcome::Returned, outcome);
    }

    #[test]
    fn token_extraction_succeeds_for_a_well_formed_login() {
        let response = ApiResponse {
            status: 200,
            body: Some(LoginBody {
                token: Some("abc123".to_string()),
            }),
        };

        let token = extract_token(response).unwrap();

        assert_eq!("abc123", token.as_str());
    }

    #[test]
    fn token_extraction_fails_when_the_token_is_missing() {
        let response = ApiResponse {
            status: 200,
            body: Some(LoginBody { token: None }),
        };

        assert!(extract_token(response).is_err());
    }

    #[test]
    fn token_extraction_fails_for_an_unparseable_body() {
        let response = ApiResponse::<LoginBody> {
            status: 200,
            body: None,
        };

        assert!(extract_token(response).is_err());
    }
}
