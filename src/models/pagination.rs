//! 表格分页
//! 为列表视图计算 start/end/total/next/previous

use crate::views::Model;

/// 一页数据在总记录中的位置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub total: usize,
    pub start: usize,
    pub page_size: usize,
}

impl Pagination {
    pub fn new(total: usize, start: usize, page_size: usize) -> Self {
        Self {
            total,
            start,
            page_size,
        }
    }

    /// 面向用户的起始序号（从 1 开始，空表时为 0）
    pub fn display_start(&self) -> usize {
        if self.total == 0 {
            0
        } else {
            self.start.saturating_add(1)
        }
    }

    pub fn end(&self) -> usize {
        self.start.saturating_add(self.page_size).min(self.total)
    }

    pub fn next(&self) -> Option<usize> {
        let next = self.start.saturating_add(self.page_size);
        (next < self.total).then_some(next)
    }

    pub fn previous(&self) -> Option<usize> {
        (self.start > 0).then(|| self.start.saturating_sub(self.page_size))
    }

    /// 以 `start{suffix}`、`total{suffix}s` 等键写入模型
    pub fn apply(&self, model: &mut Model, suffix: &str) {
        model.insert_value(format!("start{}", suffix), self.display_start().into());
        model.insert_value(format!("end{}", suffix), self.end().into());
        model.insert_value(format!("total{}s", suffix), self.total.into());
        if let Some(next) = self.next() {
            model.insert_value(format!("next{}", suffix), next.into());
        }
        if let Some(previous) = self.previous() {
            model.insert_value(format!("previous{}", suffix), previous.into());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_page() {
        let page = Pagination::new(45, 0, 20);
        assert_eq!(page.display_start(), 1);
        assert_eq!(page.end(), 20);
        assert_eq!(page.next(), Some(20));
        assert_eq!(page.previous(), None);
    }

    #[test]
    fn test_middle_page() {
        let page = Pagination::new(45, 20, 20);
        assert_eq!(page.display_start(), 21);
        assert_eq!(page.end(), 40);
        assert_eq!(page.next(), Some(40));
        assert_eq!(page.previous(), Some(0));
    }

    #[test]
    fn test_last_page() {
        let page = Pagination::new(45, 40, 20);
        assert_eq!(page.end(), 45);
        assert_eq!(page.next(), None);
        assert_eq!(page.previous(), Some(20));
    }

    #[test]
    fn test_unaligned_start_clamps_previous_to_zero() {
        let page = Pagination::new(45, 5, 20);
        assert_eq!(page.previous(), Some(0));
        assert_eq!(page.next(), Some(25));
    }

    #[test]
    fn test_empty_table() {
        let page = Pagination::new(0, 0, 20);
        assert_eq!(page.display_start(), 0);
        assert_eq!(page.end(), 0);
        assert_eq!(page.next(), None);
        assert_eq!(page.previous(), None);
    }

    #[test]
    fn test_start_beyond_total() {
        let page = Pagination::new(3, 40, 20);
        assert_eq!(page.end(), 3);
        assert_eq!(page.next(), None);
        assert_eq!(page.previous(), Some(20));
    }

    #[test]
    fn test_apply_writes_suffixed_keys() {
        let mut model = Model::new();
        Pagination::new(45, 20, 20).apply(&mut model, "JobInstance");

        assert_eq!(model.get("startJobInstance"), Some(&21.into()));
        assert_eq!(model.get("endJobInstance"), Some(&40.into()));
        assert_eq!(model.get("totalJobInstances"), Some(&45.into()));
        assert_eq!(model.get("nextJobInstance"), Some(&40.into()));
        assert_eq!(model.get("previousJobInstance"), Some(&0.into()));
    }

    #[test]
    fn test_apply_omits_missing_links() {
        let mut model = Model::new();
        Pagination::new(3, 0, 20).apply(&mut model, "Job");

        assert!(model.contains("totalJobs"));
        assert!(!model.contains("nextJob"));
        assert!(!model.contains("previousJob"));
    }
}
