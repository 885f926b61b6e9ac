use serde::{Deserialize, Serialize};

/// 滚动容器的当前位置 (像素)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScrollMetrics {
    pub scroll_top: f64,
    pub scroll_height: f64,
    pub client_height: f64,
}

impl ScrollMetrics {
    /// 距离底部的剩余像素
    pub fn remaining(&self) -> f64 {
        self.scroll_height - self.scroll_top - self.client_height
    }
}

/// 无限滚动分页: 只记录已展示的条数，数据由调用方持有
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pager {
    page_size: usize,
    shown: usize,
}

impl Pager {
    /// 回到第一页
    pub fn first_page(page_size: usize, total: usize) -> Self {
        let page_size = page_size.max(1);
        Self {
            page_size,
            shown: page_size.min(total),
        }
    }

    pub fn empty(page_size: usize) -> Self {
        Self::first_page(page_size, 0)
    }

    pub fn shown(&self) -> usize {
        self.shown
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn has_more(&self, total: usize) -> bool {
        self.shown < total
    }

    /// 追加下一页；已全部展示时不做任何事，返回是否有变化
    pub fn load_more(&mut self, total: usize) -> bool {
        if !self.has_more(total) {
            return false;
        }
        self.shown = (self.shown + self.page_size).min(total);
        true
    }

    pub fn window<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        &items[..self.shown.min(items.len())]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grows_monotonically_until_exhausted() {
        let items: Vec<u32> = (0..123).collect();
        let page = 50;
        let mut pager = Pager::first_page(page, items.len());
        let mut last = pager.shown();
        let pages = items.len().div_ceil(page);

        for _ in 1..pages {
            assert!(pager.has_more(items.len()));
            assert!(pager.load_more(items.len()));
            assert!(pager.shown() > last);
            assert!(pager.shown() <= items.len());
            last = pager.shown();
        }
        assert!(!pager.has_more(items.len()));
        assert_eq!(pager.window(&items).len(), 123);
        assert!(!pager.load_more(items.len()));
        assert_eq!(pager.shown(), 123);
    }

    #[test]
    fn small_sets_fit_in_first_page() {
        let pager = Pager::first_page(50, 7);
        assert_eq!(pager.shown(), 7);
        assert!(!pager.has_more(7));
        assert!(Pager::empty(50).window::<u8>(&[]).is_empty());
    }

    #[test]
    fn window_clamps_when_items_shrink() {
        let pager = Pager::first_page(10, 10);
        assert_eq!(pager.window(&[1, 2, 3]).len(), 3);
    }

    #[test]
    fn remaining_distance() {
        let m = ScrollMetrics {
            scroll_top: 900.0,
            scroll_height: 1500.0,
            client_height: 560.0,
        };
        assert_eq!(m.remaining(), 40.0);
    }
}
