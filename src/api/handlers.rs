use std::sync::Arc;

use axum::{
    extract::{Json, Multipart, Path, Query, Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Local;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{DeskError, DeskResult};
use crate::service::grouped::write_staggered;
use crate::service::search::split_terms;
use crate::service::{CrmSubView, Notice, Notices, Prompt, ScrollMetrics, View};
use crate::state::AppState;

type AppStateRef = State<Arc<AppState>>;

/// 操作类接口的统一响应体
#[derive(Debug, Serialize)]
pub struct ActionResponse<T> {
    pub success: bool,
    pub message: String,
    /// 操作过程中产生的确认/提示文案
    pub notices: Vec<Notice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

fn action<T: Serialize>(result: DeskResult<T>, notices: Notices, message: &str) -> Response {
    let notices = notices.into_vec();
    match result {
        Ok(data) => {
            let response = ActionResponse {
                success: true,
                message: message.to_string(),
                notices,
                data: Some(data),
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(e) => {
            let response = ActionResponse::<T> {
                success: false,
                message: e.to_string(),
                notices,
                data: None,
            };
            (e.status_code(), Json(response)).into_response()
        }
    }
}

/// 未登录时拒绝
pub async fn require_login(State(state): AppStateRef, request: Request, next: Next) -> Response {
    if state.gate.is_logged_in() {
        next.run(request).await
    } else {
        DeskError::Unauthorized.into_response()
    }
}

/// 健康检查
pub async fn health_check() -> &'static str {
    "OK"
}

// ---- 会话 ----

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct SessionStatus {
    pub logged_in: bool,
}

pub async fn session_status(State(state): AppStateRef) -> Json<SessionStatus> {
    Json(SessionStatus {
        logged_in: state.gate.is_logged_in(),
    })
}

pub async fn login(State(state): AppStateRef, Json(req): Json<LoginRequest>) -> Response {
    let result = state.login(&req.email, &req.password).await;
    action(result, Notices::default(), "Logged in")
}

pub async fn logout(State(state): AppStateRef) -> Response {
    action(state.logout(), Notices::default(), "Logged out")
}

// ---- 导航 ----

#[derive(Debug, Deserialize)]
pub struct ViewRequest {
    pub view: View,
    pub sub_view: Option<CrmSubView>,
}

pub async fn nav_snapshot(State(state): AppStateRef) -> Response {
    Json(state.shell.snapshot()).into_response()
}

pub async fn select_view(State(state): AppStateRef, Json(req): Json<ViewRequest>) -> Response {
    match (req.view, req.sub_view) {
        (View::Matching, _) => state.shell.show_matching(),
        (View::VendorCrm, Some(sub_view)) => {
            state.shell.show_crm(sub_view);
        }
        (View::VendorCrm, None) => state.shell.toggle_crm(),
    }
    Json(state.shell.snapshot()).into_response()
}

pub async fn menu_enter(State(state): AppStateRef) -> Response {
    state.shell.pointer_enter();
    StatusCode::NO_CONTENT.into_response()
}

pub async fn menu_leave(State(state): AppStateRef) -> Response {
    state.shell.pointer_leave();
    StatusCode::NO_CONTENT.into_response()
}

// ---- 商品库 ----

#[derive(Debug, Deserialize)]
pub struct FilterRequest {
    #[serde(default)]
    pub search: String,
    #[serde(default = "all_statuses")]
    pub status: String,
}

fn all_statuses() -> String {
    crate::service::catalog::ALL_STATUSES.to_string()
}

/// 首次访问时拉取，之后只读缓存
pub async fn products_snapshot(State(state): AppStateRef) -> Response {
    let snapshot = state.catalog.snapshot();
    if !snapshot.loaded && !snapshot.loading && snapshot.error.is_none() {
        if let Err(e) = state.catalog.fetch_all(false).await {
            warn!("Initial product fetch failed: {}", e);
        }
    }
    Json(state.catalog.snapshot()).into_response()
}

pub async fn refresh_products(State(state): AppStateRef) -> Response {
    let result = state
        .catalog
        .fetch_all(true)
        .await
        .map(|()| state.catalog.snapshot());
    action(result, Notices::default(), "Products refreshed")
}

pub async fn filter_products(State(state): AppStateRef, Json(req): Json<FilterRequest>) -> Response {
    state.catalog.set_filter(req.search, req.status);
    let response = ActionResponse::<()> {
        success: true,
        message: "Filter scheduled".to_string(),
        notices: Vec::new(),
        data: None,
    };
    (StatusCode::ACCEPTED, Json(response)).into_response()
}

pub async fn scroll_products(State(state): AppStateRef, Json(metrics): Json<ScrollMetrics>) -> Response {
    let loaded = state.catalog.on_scroll(metrics);
    let message = if loaded { "Loaded more" } else { "Nothing to load" };
    action(Ok(state.catalog.snapshot()), Notices::default(), message)
}

pub async fn upload_products(State(state): AppStateRef, multipart: Multipart) -> Response {
    let notices = Notices::default();
    let result = match read_csv_field(multipart).await {
        Ok((file_name, bytes)) => {
            info!("Uploading {} ({} bytes)", file_name, bytes.len());
            state.catalog.upload_csv(file_name, bytes).await
        }
        Err(e) => Err(e),
    };
    if result.is_ok() {
        notices.alert("CSV uploaded successfully! Refreshing data...");
    }
    action(result, notices, "CSV uploaded")
}

async fn read_csv_field(mut multipart: Multipart) -> DeskResult<(String, Vec<u8>)> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| DeskError::Validation(e.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or("upload.csv").to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| DeskError::Validation(e.to_string()))?;
        return Ok((file_name, bytes.to_vec()));
    }
    Err(DeskError::Validation("No file selected.".to_string()))
}

// ---- 多词搜索 ----

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub input: String,
}

#[derive(Debug, Deserialize)]
pub struct GroupRequest {
    pub term: String,
}

pub async fn search_snapshot(State(state): AppStateRef) -> Response {
    Json(state.search.aggregator().snapshot()).into_response()
}

/// 后台逐词搜索，进度通过 GET /api/search 查看
pub async fn start_search(State(state): AppStateRef, Json(req): Json<SearchRequest>) -> Response {
    let terms = split_terms(&req.input);
    if terms.is_empty() {
        let result = state.search.search(&req.input).await;
        return action(result, Notices::default(), "");
    }
    if state.search.aggregator().is_running() {
        let err: DeskResult<()> =
            Err(DeskError::Validation("A search is already running.".to_string()));
        return action(err, Notices::default(), "");
    }

    let workspace = Arc::clone(&state.search);
    let input = req.input;
    tokio::spawn(async move {
        if let Err(e) = workspace.search(&input).await {
            warn!("Search did not start: {}", e);
        }
    });

    let response = ActionResponse {
        success: true,
        message: format!("Searching {} terms", terms.len()),
        notices: Vec::new(),
        data: Some(terms),
    };
    (StatusCode::ACCEPTED, Json(response)).into_response()
}

pub async fn grouped_snapshot(State(state): AppStateRef) -> Response {
    Json(state.search.snapshot()).into_response()
}

pub async fn open_group(State(state): AppStateRef, Json(req): Json<GroupRequest>) -> Response {
    action(state.search.open_group(&req.term), Notices::default(), "Group opened")
}

pub async fn close_group(State(state): AppStateRef) -> Response {
    state.search.close_group();
    Json(state.search.snapshot()).into_response()
}

pub async fn detail_scroll(State(state): AppStateRef, Json(metrics): Json<ScrollMetrics>) -> Response {
    state.search.detail_scroll(metrics);
    Json(state.search.snapshot()).into_response()
}

pub async fn group_csv(State(state): AppStateRef, Path(term): Path<String>) -> Response {
    match state.search.export_term(&term, Local::now().date_naive()) {
        Ok(export) => (
            [
                (header::CONTENT_TYPE, "text/csv;charset=utf-8".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", export.file_name),
                ),
            ],
            export.contents,
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

/// 每个搜索词一个文件，间隔 200ms 写入导出目录
pub async fn export_all(State(state): AppStateRef) -> Response {
    let notices = Notices::default();
    let result = state
        .search
        .export_all(Local::now().date_naive())
        .map(|exports| {
            let count = exports.len();
            tokio::spawn(write_staggered(exports, Arc::clone(&state.exports)));
            notices.alert(&format!(
                "Exporting {count} separate CSV files. Check your downloads."
            ));
            count
        });
    if let Err(e) = &result {
        notices.alert(&e.to_string());
    }
    action(result, notices, "Export started")
}

// ---- 匹配看板 ----

#[derive(Debug, Deserialize)]
pub struct BoardQuery {
    #[serde(default)]
    pub q: String,
}

#[derive(Debug, Deserialize)]
pub struct ConfirmRequest {
    #[serde(default)]
    pub confirmed: bool,
}

#[derive(Debug, Deserialize)]
pub struct OfferRequest {
    #[serde(default)]
    pub price: String,
    #[serde(default)]
    pub confirmed: bool,
}

pub async fn matching_snapshot(State(state): AppStateRef, Query(query): Query<BoardQuery>) -> Response {
    Json(state.board.snapshot(&query.q)).into_response()
}

pub async fn refresh_matching(State(state): AppStateRef) -> Response {
    action(state.board.fetch().await, Notices::default(), "Customer requests refreshed")
}

pub async fn customer_details(State(state): AppStateRef, Path(match_id): Path<String>) -> Response {
    action(state.board.customer_details(&match_id), Notices::default(), "")
}

pub async fn toggle_select(
    State(state): AppStateRef,
    Path((match_id, vendor)): Path<(String, usize)>,
) -> Response {
    action(state.board.toggle_select(&match_id, vendor), Notices::default(), "")
}

pub async fn send_rfq(
    State(state): AppStateRef,
    Path((match_id, vendor)): Path<(String, usize)>,
) -> Response {
    let notices = Notices::new(true);
    let result = state.board.send_rfq(&match_id, vendor, &notices).await;
    action(result, notices, "RFQ sent")
}

pub async fn send_all_rfq(
    State(state): AppStateRef,
    Path(match_id): Path<String>,
    Json(req): Json<ConfirmRequest>,
) -> Response {
    let notices = Notices::new(req.confirmed);
    let result = state.board.send_all(&match_id, &notices).await;
    let message = bulk_message(&result);
    action(result, notices, message)
}

pub async fn send_selected_rfq(
    State(state): AppStateRef,
    Path(match_id): Path<String>,
    Json(req): Json<ConfirmRequest>,
) -> Response {
    let notices = Notices::new(req.confirmed);
    let result = state.board.send_selected(&match_id, &notices).await;
    let message = bulk_message(&result);
    action(result, notices, message)
}

fn bulk_message<T>(result: &DeskResult<Option<T>>) -> &'static str {
    match result {
        Ok(Some(_)) => "RFQ sending complete",
        _ => "Confirmation required",
    }
}

pub async fn open_response(
    State(state): AppStateRef,
    Path((match_id, vendor)): Path<(String, usize)>,
) -> Response {
    action(state.board.open_response(&match_id, vendor), Notices::default(), "")
}

pub async fn send_offer(State(state): AppStateRef, Json(req): Json<OfferRequest>) -> Response {
    let notices = Notices::new(req.confirmed);
    let result = state.board.send_offer(&req.price, &notices).await;
    let message = match result {
        Ok(true) => "Offer sent",
        _ => "Confirmation required",
    };
    action(result, notices, message)
}

pub async fn close_response(State(state): AppStateRef) -> Response {
    state.board.close_response();
    StatusCode::NO_CONTENT.into_response()
}
