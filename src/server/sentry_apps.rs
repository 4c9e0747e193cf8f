use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{
        Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};

use crate::apps::{self, Page};
use crate::auth::RequireCaller;
use crate::server::AppState;
use crate::server::dto::{CreateSentryAppRequest, ListParams, SentryAppResponse};
use crate::server::features::require_feature;
use crate::server::response::{
    ApiError, ApiResponse, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE, PaginatedResponse, StoreResultExt,
    paginate,
};
use crate::server::validation::validate_create;
use crate::types::feature::INTERNAL_CATCHALL;

pub fn sentry_apps_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/sentry-apps", get(list_sentry_apps).post(create_sentry_app))
        .route("/sentry-apps/", get(list_sentry_apps).post(create_sentry_app))
}

fn parse_page(params: &ListParams) -> Result<Page, ApiError> {
    let offset = match params.cursor.as_deref() {
        None | Some("") => 0,
        Some(cursor) => cursor
            .parse::<i64>()
            .ok()
            .filter(|offset| *offset >= 0)
            .ok_or_else(|| ApiError::bad_request("Invalid cursor"))?,
    };

    let limit = params
        .per_page
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);

    Ok(Page { offset, limit })
}

pub async fn list_sentry_apps(
    RequireCaller(caller): RequireCaller,
    State(state): State<Arc<AppState>>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> impl IntoResponse {
    require_feature(&state, &caller, INTERNAL_CATCHALL)?;

    let Query(params) = params.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let page = parse_page(&params)?;
    let apps = apps::list_visible(
        state.store.as_ref(),
        &caller,
        Page {
            limit: page.limit + 1,
            ..page
        },
    )
    .api_err("Failed to list sentry apps")?;

    let (apps, next_cursor, has_more) = paginate(apps, page.limit as usize, page.offset);

    let render = if caller.is_superuser() {
        SentryAppResponse::detailed
    } else {
        SentryAppResponse::public
    };
    let data: Vec<SentryAppResponse> = apps.into_iter().map(render).collect();

    Ok::<_, ApiError>(Json(PaginatedResponse::new(data, next_cursor, has_more)))
}

pub async fn create_sentry_app(
    RequireCaller(caller): RequireCaller,
    State(state): State<Arc<AppState>>,
    body: Result<Json<CreateSentryAppRequest>, JsonRejection>,
) -> impl IntoResponse {
    require_feature(&state, &caller, INTERNAL_CATCHALL)?;

    let Json(req) = body.map_err(|e| ApiError::bad_request(e.body_text()))?;

    let new_app = validate_create(&req, &caller).map_err(ApiError::validation)?;

    let app = apps::create(state.store.as_ref(), new_app)
        .api_err("Failed to create sentry app")?;

    Ok::<_, ApiError>((
        StatusCode::CREATED,
        Json(ApiResponse::success(SentryAppResponse::detailed(app))),
    ))
}
