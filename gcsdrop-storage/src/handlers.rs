//! Download HTTP handler

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use futures::TryStreamExt;
use gcsdrop_core::{DownloadError, RequestId, REQUEST_ID_HEADER};
use std::sync::Arc;
use tracing::{error, info, info_span, warn, Instrument};

use crate::disposition;
use crate::storage::{locate, Lookup, ObjectStore};

/// Shared state for the download handler
pub struct DownloadState {
    pub store: Arc<dyn ObjectStore>,
}

impl DownloadState {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }
}

/// `GET /download/:filename`
pub async fn download(
    State(state): State<Arc<DownloadState>>,
    Path(filename): Path<String>,
) -> Response {
    let request_id = RequestId::new();
    let span = info_span!(
        "download",
        request_id = %request_id,
        bucket = %state.store.bucket(),
        filename = %filename
    );

    let mut response = serve(&state, filename, &request_id).instrument(span).await;
    if let Ok(value) = HeaderValue::from_str(request_id.as_str()) {
        response
            .headers_mut()
            .insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
    }
    response
}

async fn serve(state: &DownloadState, filename: String, request_id: &RequestId) -> Response {
    match locate(state.store.as_ref(), &filename).await {
        Ok(Lookup::Found(stream)) => {
            info!("Streaming object");

            let disposition = disposition::attachment(&filename);
            let request_id = request_id.clone();
            let stream = stream.inspect_err(move |e| {
                error!(
                    request_id = %request_id,
                    filename = %filename,
                    error = %e,
                    "Object stream failed mid-transfer"
                );
            });

            let mut response = Body::from_stream(stream).into_response();
            response
                .headers_mut()
                .insert(header::CONTENT_DISPOSITION, disposition);
            response
        }
        Ok(Lookup::NotFound) => {
            info!("Object not found");
            error_response(
                &DownloadError::not_found(filename).with_request_id(request_id.as_str()),
            )
        }
        Err(e) => {
            let err = DownloadError::new(e.code(), e.to_string())
                .with_resource(filename)
                .with_request_id(request_id.as_str());
            error!(code = %err.code, error = %err.detail, "Storage backend error");
            error_response(&err)
        }
    }
}

fn error_response(err: &DownloadError) -> Response {
    let status = StatusCode::from_u16(err.status()).unwrap_or_else(|_| {
        warn!(status = err.status(), "Invalid status code for error");
        StatusCode::INTERNAL_SERVER_ERROR
    });
    (status, err.body()).into_response()
}
