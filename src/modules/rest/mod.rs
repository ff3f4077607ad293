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

use std::time::Duration;

use http::Method;
use poem::{
    listener::TcpListener,
    middleware::{CatchPanic, Compression, Cors, Tracing},
    Endpoint, EndpointExt, Route, Server,
};

use crate::{
    modules::{
        common::signal::SignalManager,
        error::{code::ErrorCode, handler::error_handler, ApiErrorResponse, OneboxResult},
        message::service::EmailService,
        settings::cli::SETTINGS,
    },
    raise_error,
};
use api::create_openapi_service;

pub mod api;

pub type ApiResult<T, E = ApiErrorResponse> = std::result::Result<T, E>;

/// The full HTTP application: API, OpenAPI documents and middleware.
pub fn build_app(service: EmailService) -> impl Endpoint {
    let api_service = create_openapi_service()
        .summary("Multi-account email ingestion, triage and search");

    let swagger = api_service.swagger_ui();
    let spec_json = api_service.spec_endpoint();

    let cors_origins: Vec<String> = SETTINGS.onebox_cors_origins.iter().cloned().collect();
    let cors = Cors::new()
        .allow_origins_fn(move |origin| {
            if cors_origins.is_empty() {
                return true;
            }
            cors_origins.iter().any(|o| o == origin)
        })
        .allow_credentials(true)
        .allow_methods(&[
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::OPTIONS,
            Method::HEAD,
        ])
        .allow_headers(vec!["Content-Type", "Authorization"])
        .max_age(SETTINGS.onebox_cors_max_age);

    Route::new()
        .nest("/api-docs/swagger", swagger)
        .nest("/api-docs/spec.json", spec_json)
        .nest_no_strip("/api", api_service)
        .data(service)
        .with(Tracing)
        .with(cors)
        .with_if(SETTINGS.onebox_http_compression_enabled, Compression::new())
        .with(CatchPanic::new())
        .catch_all_error(error_handler)
}

pub async fn start_http_server(service: EmailService, signals: SignalManager) -> OneboxResult<()> {
    let listener = TcpListener::bind((
        SETTINGS
            .onebox_bind_ip
            .clone()
            .unwrap_or_else(|| "0.0.0.0".into()),
        SETTINGS.onebox_http_port,
    ));

    let server = Server::new(listener)
        .name("Onebox Service")
        .idle_timeout(Duration::from_secs(60))
        .run_with_graceful_shutdown(
            build_app(service),
            signals.wait(),
            Some(Duration::from_secs(5)),
        );
    tracing::info!(
        "Onebox Service is now running on port {}.",
        SETTINGS.onebox_http_port
    );
    server
        .await
        .map_err(|e| raise_error!(format!("{:#?}", e), ErrorCode::InternalError))
}
