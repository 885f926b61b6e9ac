use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::storage::KeyValueStore;
use super::timers::Timer;
use crate::config::AuthConfig;
use crate::error::{DeskError, DeskResult};

/// 登录标记的存储键
pub const LOGIN_KEY: &str = "isLoggedIn";
/// 模拟网络延迟
pub const LOGIN_DELAY: Duration = Duration::from_millis(1500);
/// 指针离开后延迟关闭下拉菜单
pub const MENU_CLOSE_DELAY: Duration = Duration::from_millis(300);

/// 导航栏上的计数，由各视图回写
#[derive(Debug, Clone, Default)]
pub struct Counter(Arc<AtomicUsize>);

impl Counter {
    pub fn set(&self, value: usize) {
        self.0.store(value, Ordering::SeqCst);
    }

    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Default)]
pub struct NavCounters {
    pub products: Counter,
    pub search: Counter,
    pub matching: Counter,
}

/// 登录门禁: 固定延迟后比对配置中的账号
pub struct LoginGate {
    store: Arc<dyn KeyValueStore>,
    email: String,
    password: String,
    delay: Duration,
    logged_in: AtomicBool,
}

impl LoginGate {
    /// 启动时从存储恢复登录标记
    pub fn new(store: Arc<dyn KeyValueStore>, auth: &AuthConfig) -> Self {
        let logged_in = match store.get(LOGIN_KEY) {
            Ok(value) => value.as_deref() == Some("true"),
            Err(e) => {
                warn!("Could not read login flag: {}", e);
                false
            }
        };
        Self {
            store,
            email: auth.email.clone(),
            password: auth.password.clone(),
            delay: LOGIN_DELAY,
            logged_in: AtomicBool::new(logged_in),
        }
    }

    pub fn is_logged_in(&self) -> bool {
        self.logged_in.load(Ordering::SeqCst)
    }

    pub async fn login(&self, email: &str, password: &str) -> DeskResult<()> {
        if email.is_empty() || password.is_empty() {
            return Err(DeskError::Validation(
                "Please enter both email and password.".to_string(),
            ));
        }

        tokio::time::sleep(self.delay).await;

        if email != self.email || password != self.password {
            return Err(DeskError::Validation("Invalid email or password.".to_string()));
        }

        self.store.set(LOGIN_KEY, "true")?;
        self.logged_in.store(true, Ordering::SeqCst);
        info!("Operator logged in");
        Ok(())
    }

    pub fn logout(&self) -> DeskResult<()> {
        self.logged_in.store(false, Ordering::SeqCst);
        self.store.remove(LOGIN_KEY)?;
        info!("Operator logged out");
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum View {
    Matching,
    VendorCrm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CrmSubView {
    AllProducts,
    SearchApi,
}

/// 主区域实际展示的面板
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Panel {
    Matching,
    AllProducts,
    SearchApi,
}

#[derive(Debug, Clone, Copy)]
struct NavState {
    view: View,
    sub_view: CrmSubView,
    sub_selected: bool,
    menu_open: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct NavSnapshot {
    pub view: View,
    pub sub_view: CrmSubView,
    pub panel: Panel,
    pub menu_open: bool,
    pub matching_count: usize,
    pub products_count: usize,
    pub search_count: usize,
}

/// 左侧导航: 匹配需求 / 供应商 CRM (含两个子视图)
pub struct Shell {
    state: Mutex<NavState>,
    menu_timer: Timer,
    counters: NavCounters,
}

impl Shell {
    pub fn new(counters: NavCounters) -> Self {
        Self {
            state: Mutex::new(NavState {
                view: View::Matching,
                sub_view: CrmSubView::AllProducts,
                sub_selected: false,
                menu_open: false,
            }),
            menu_timer: Timer::new(),
            counters,
        }
    }

    pub fn counters(&self) -> &NavCounters {
        &self.counters
    }

    pub fn show_matching(&self) {
        let mut state = self.state.lock();
        state.view = View::Matching;
        state.menu_open = false;
        state.sub_selected = false;
    }

    /// 点击 CRM 主按钮只切换下拉菜单
    pub fn toggle_crm(&self) {
        let mut state = self.state.lock();
        state.view = View::VendorCrm;
        state.menu_open = !state.menu_open;
    }

    pub fn show_crm(&self, sub_view: CrmSubView) -> Panel {
        let mut state = self.state.lock();
        state.view = View::VendorCrm;
        state.sub_view = sub_view;
        state.menu_open = true;
        state.sub_selected = true;
        Self::panel_of(&state)
    }

    pub fn pointer_enter(&self) {
        self.menu_timer.cancel();
        self.state.lock().menu_open = true;
    }

    pub fn pointer_leave(self: &Arc<Self>) {
        let shell = Arc::clone(self);
        self.menu_timer.schedule(MENU_CLOSE_DELAY, async move {
            shell.state.lock().menu_open = false;
        });
    }

    /// 选中 CRM 但尚未选子视图时仍展示匹配需求
    pub fn active_panel(&self) -> Panel {
        Self::panel_of(&self.state.lock())
    }

    fn panel_of(state: &NavState) -> Panel {
        if state.view == View::Matching || !state.sub_selected {
            return Panel::Matching;
        }
        match state.sub_view {
            CrmSubView::AllProducts => Panel::AllProducts,
            CrmSubView::SearchApi => Panel::SearchApi,
        }
    }

    pub fn snapshot(&self) -> NavSnapshot {
        let state = *self.state.lock();
        NavSnapshot {
            view: state.view,
            sub_view: state.sub_view,
            panel: Self::panel_of(&state),
            menu_open: state.menu_open,
            matching_count: self.counters.matching.get(),
            products_count: self.counters.products.get(),
            search_count: self.counters.search.get(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::service::storage::MemoryStore;
    use crate::test_support::settle;
    use tokio::time::Instant;

    fn gate(store: Arc<MemoryStore>) -> LoginGate {
        LoginGate::new(store, &AppConfig::default().auth)
    }

    /// 写入总是失败的存储
    struct ReadOnlyStore;

    impl KeyValueStore for ReadOnlyStore {
        fn get(&self, _key: &str) -> DeskResult<Option<String>> {
            Ok(None)
        }

        fn set(&self, _key: &str, _value: &str) -> DeskResult<()> {
            Err(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only").into())
        }

        fn remove(&self, _key: &str) -> DeskResult<()> {
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn unpersisted_login_stays_logged_out() {
        let gate = LoginGate::new(Arc::new(ReadOnlyStore), &AppConfig::default().auth);
        let err = gate.login("admin@gmail.com", "1234").await.unwrap_err();
        assert!(matches!(err, DeskError::Io(_)));
        assert!(!gate.is_logged_in());
    }

    #[tokio::test(start_paused = true)]
    async fn login_waits_then_persists_flag() {
        let store = Arc::new(MemoryStore::new());
        let gate = gate(store.clone());
        assert!(!gate.is_logged_in());

        let started = Instant::now();
        gate.login("admin@gmail.com", "1234").await.unwrap();
        assert!(started.elapsed() >= LOGIN_DELAY);
        assert!(gate.is_logged_in());
        assert_eq!(store.get(LOGIN_KEY).unwrap().as_deref(), Some("true"));

        gate.logout().unwrap();
        assert!(!gate.is_logged_in());
        assert_eq!(store.get(LOGIN_KEY).unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn login_rejects_blank_fields_without_waiting() {
        let gate = gate(Arc::new(MemoryStore::new()));
        let started = Instant::now();
        let err = gate.login("", "1234").await.unwrap_err();
        assert_eq!(err.to_string(), "Please enter both email and password.");
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn wrong_credentials_show_literal_error() {
        let gate = gate(Arc::new(MemoryStore::new()));
        let err = gate.login("admin@gmail.com", "nope").await.unwrap_err();
        assert_eq!(err.to_string(), "Invalid email or password.");
        assert!(!gate.is_logged_in());
    }

    #[test]
    fn stored_flag_restores_session() {
        let store = Arc::new(MemoryStore::new());
        store.set(LOGIN_KEY, "true").unwrap();
        assert!(gate(store).is_logged_in());
    }

    #[test]
    fn crm_without_sub_view_still_shows_matching() {
        let shell = Shell::new(NavCounters::default());
        shell.toggle_crm();
        let snap = shell.snapshot();
        assert_eq!(snap.view, View::VendorCrm);
        assert!(snap.menu_open);
        assert_eq!(snap.panel, Panel::Matching);

        assert_eq!(shell.show_crm(CrmSubView::SearchApi), Panel::SearchApi);
        shell.show_matching();
        let snap = shell.snapshot();
        assert_eq!(snap.panel, Panel::Matching);
        assert!(!snap.menu_open);
    }

    #[tokio::test(start_paused = true)]
    async fn menu_closes_after_pointer_leaves() {
        let shell = Arc::new(Shell::new(NavCounters::default()));
        shell.pointer_enter();
        shell.pointer_leave();

        tokio::time::advance(Duration::from_millis(200)).await;
        settle().await;
        // 短暂离开后回来，菜单保持打开
        shell.pointer_enter();
        tokio::time::advance(Duration::from_millis(500)).await;
        settle().await;
        assert!(shell.snapshot().menu_open);

        shell.pointer_leave();
        tokio::time::advance(MENU_CLOSE_DELAY).await;
        settle().await;
        assert!(!shell.snapshot().menu_open);
    }

    #[test]
    fn counters_are_shared_with_views() {
        let counters = NavCounters::default();
        let shell = Shell::new(counters.clone());
        counters.products.set(12);
        counters.search.set(3);
        let snap = shell.snapshot();
        assert_eq!(snap.products_count, 12);
        assert_eq!(snap.search_count, 3);
    }
}
