pub mod error;
pub mod request;
pub mod sse;
pub mod stream;

pub use error::UpstreamError;
pub use request::{ProviderRequest, Requester, ResponseShape, build_request};
pub use sse::SseParser;
pub use stream::{StreamEvent, open_stream};
