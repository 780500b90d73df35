use std::collections::VecDeque;

/// Pending files to compile.
///
/// `SOURCE` appends, `INCLUDE` prepends so included files are read before anything already
/// queued. The driver drains it iteratively, so include depth never grows the stack.
#[derive(Debug, Default, Clone)]
pub struct WorkQueue {
    pending: VecDeque<String>,
}

impl WorkQueue {
    pub fn new() -> Self {
        WorkQueue::default()
    }

    pub fn push_back(&mut self, path: impl Into<String>) {
        self.pending.push_back(path.into());
    }

    pub fn push_front(&mut self, path: impl Into<String>) {
        self.pending.push_front(path.into());
    }

    /// Prepends several paths keeping their relative order.
    pub fn push_front_all<I>(&mut self, paths: I)
    where
        I: IntoIterator<Item = String>,
        I::IntoIter: DoubleEndedIterator,
    {
        for path in paths.into_iter().rev() {
            self.pending.push_front(path);
        }
    }

    pub fn pop(&mut self) -> Option<String> {
        self.pending.pop_front()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_push_front_all_keeps_order() {
        let mut q = WorkQueue::new();
        q.push_back("z");
        q.push_front_all(vec!["a".to_owned(), "b".to_owned()]);
        assert_eq!(q.len(), 3);
        let order: Vec<String> = std::iter::from_fn(|| q.pop()).collect();
        assert_eq!(order, vec!["a", "b", "z"]);
        assert!(q.is_empty());
    }
}
