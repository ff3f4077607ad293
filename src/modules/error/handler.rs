//
// Copyright (c) 2025 rustmailer.com (https://rustmailer.com)
//
// This file is part of the Onebox Email Triage Project
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

use poem::{http::StatusCode, Body, IntoResponse, Response};
use tracing::warn;

use super::code::ErrorCode;

/// Turns any error that escaped the endpoints into the `{code, message}`
/// body every API response uses.
pub async fn error_handler(err: poem::Error) -> Response {
    let status = err.status();
    let code = match status {
        StatusCode::NOT_FOUND => ErrorCode::ResourceNotFound,
        StatusCode::METHOD_NOT_ALLOWED => ErrorCode::MethodNotAllowed,
        StatusCode::PAYLOAD_TOO_LARGE => ErrorCode::PayloadTooLarge,
        StatusCode::REQUEST_TIMEOUT => ErrorCode::RequestTimeout,
        s if s.is_client_error() => ErrorCode::InvalidParameter,
        _ => ErrorCode::UnhandledPoemError,
    };
    if status.is_server_error() {
        warn!("Unhandled error response ({}): {}", status, err);
    }
    let body = Body::from_json(serde_json::json!({
        "code": code as u32,
        "message": err.to_string(),
    }))
    .unwrap_or_else(|_| Body::from_string(err.to_string()));
    Response::builder().status(status).body(body).into_response()
}
