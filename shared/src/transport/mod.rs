//! Transport boundary: the request/response value types and the trait the
//! rest of the crate sends them through.
//!
//! Production code uses [`ReqwestTransport`]; tests substitute a scripted
//! implementation of [`HttpTransport`].

pub mod http;
mod reqwest_transport;

pub use self::http::{
    FilePart, HttpError, HttpHeaders, HttpMethod, HttpRequest, HttpResponse, MultipartForm,
    RequestBody, ValidatedUrl,
};
pub use self::reqwest_transport::ReqwestTransport;

pub type HttpResult = Result<HttpResponse, HttpError>;

/// Executes one HTTP exchange. Implementations never interpret status codes:
/// any response that arrives, 4xx and 5xx included, is returned as `Ok`.
#[async_trait::async_trait]
pub trait HttpTransport: Send + Sync {
    async fn execute(&self, request: HttpRequest) -> HttpResult;
}
