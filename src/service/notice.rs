use parking_lot::Mutex;
use serde::Serialize;

/// 面向操作员的阻塞式提示 (alert / confirm)
pub trait Prompt: Send + Sync {
    /// 展示确认文案，返回操作员是否同意
    fn confirm(&self, message: &str) -> bool;

    fn alert(&self, message: &str);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeKind {
    Confirm,
    Alert,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub kind: NoticeKind,
    pub text: String,
}

/// HTTP 请求内的提示收集器
///
/// 确认结果由请求体里的 `confirmed` 预先给出；所有文案按顺序记录并随响应返回。
#[derive(Debug, Default)]
pub struct Notices {
    confirmed: bool,
    entries: Mutex<Vec<Notice>>,
}

impl Notices {
    pub fn new(confirmed: bool) -> Self {
        Self {
            confirmed,
            entries: Mutex::new(Vec::new()),
        }
    }

    pub fn into_vec(self) -> Vec<Notice> {
        self.entries.into_inner()
    }

    pub fn snapshot(&self) -> Vec<Notice> {
        self.entries.lock().clone()
    }

    fn push(&self, kind: NoticeKind, message: &str) {
        self.entries.lock().push(Notice {
            kind,
            text: message.to_string(),
        });
    }
}

impl Prompt for Notices {
    fn confirm(&self, message: &str) -> bool {
        self.push(NoticeKind::Confirm, message);
        self.confirmed
    }

    fn alert(&self, message: &str) {
        self.push(NoticeKind::Alert, message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_in_order_and_answers_with_preset_choice() {
        let notices = Notices::new(false);
        assert!(!notices.confirm("Send?"));
        notices.alert("done");
        let entries = notices.into_vec();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].kind, NoticeKind::Confirm);
        assert_eq!(entries[1].text, "done");
    }
}
