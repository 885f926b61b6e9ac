pub mod handlers;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};
use tower::ServiceBuilder;

use crate::state::AppState;
pub use handlers::*;

/// 组装全部路由；除健康检查和会话接口外都需要登录
pub fn router(state: Arc<AppState>) -> Router {
    // 导航
    let nav_routes = Router::new()
        .route("/api/nav", get(nav_snapshot))
        .route("/api/nav/view", post(select_view))
        .route("/api/nav/menu/enter", post(menu_enter))
        .route("/api/nav/menu/leave", post(menu_leave));

    // 供应商商品库
    let product_routes = Router::new()
        .route("/api/products", get(products_snapshot))
        .route("/api/products/refresh", post(refresh_products))
        .route("/api/products/filter", post(filter_products))
        .route("/api/products/scroll", post(scroll_products))
        .route("/api/products/upload", post(upload_products));

    // 多词搜索
    let search_routes = Router::new()
        .route("/api/search", get(search_snapshot).post(start_search))
        .route("/api/search/groups", get(grouped_snapshot))
        .route("/api/search/groups/open", post(open_group))
        .route("/api/search/groups/close", post(close_group))
        .route("/api/search/groups/:term/csv", get(group_csv))
        .route("/api/search/detail/scroll", post(detail_scroll))
        .route("/api/search/export-all", post(export_all));

    // 客户需求匹配
    let matching_routes = Router::new()
        .route("/api/matching", get(matching_snapshot))
        .route("/api/matching/refresh", post(refresh_matching))
        .route("/api/matching/offer", post(send_offer).delete(close_response))
        .route("/api/matching/:match_id/customer", get(customer_details))
        .route("/api/matching/:match_id/select/:vendor", post(toggle_select))
        .route("/api/matching/:match_id/rfq/:vendor", post(send_rfq))
        .route("/api/matching/:match_id/rfq-all", post(send_all_rfq))
        .route("/api/matching/:match_id/rfq-selected", post(send_selected_rfq))
        .route("/api/matching/:match_id/response/:vendor", post(open_response));

    let protected = Router::new()
        .merge(nav_routes)
        .merge(product_routes)
        .merge(search_routes)
        .merge(matching_routes)
        .route_layer(middleware::from_fn_with_state(Arc::clone(&state), require_login));

    Router::new()
        .route("/health", get(health_check))
        .route("/api/session", get(session_status))
        .route("/api/session/login", post(login))
        .route("/api/session/logout", post(logout))
        .merge(protected)
        .layer(ServiceBuilder::new())
        .with_state(state)
}
