//! Request ids: taken from the client or generated, echoed on the response
//! and exposed through CORS so the storefront can quote them in bug reports.

use axum::http::HeaderName;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};

pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

pub fn request_id_layer() -> (SetRequestIdLayer<MakeRequestUuid>, PropagateRequestIdLayer) {
    (
        SetRequestIdLayer::new(REQUEST_ID_HEADER, MakeRequestUuid),
        PropagateRequestIdLayer::new(REQUEST_ID_HEADER),
    )
}
