/// 状态变更通知
///
/// 通知不携带任何数据，观察者收到后自行读取当前快照
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;
use uuid::Uuid;

/// 状态变更监听器
///
/// 回调在管理器的写锁内同步执行，回调中不能直接调用管理器的修改操作，
/// 需要的话请 spawn 一个任务
pub trait StatusListener: Send + Sync {
    fn on_status_changed(&self);
}

impl<F> StatusListener for F
where
    F: Fn() + Send + Sync,
{
    fn on_status_changed(&self) {
        self()
    }
}

/// 订阅句柄
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle(Uuid);

impl fmt::Display for SubscriptionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// 订阅者列表，按订阅顺序通知
#[derive(Default)]
pub struct Subscribers {
    listeners: Mutex<Vec<(SubscriptionHandle, Arc<dyn StatusListener>)>>,
}

impl Subscribers {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<(SubscriptionHandle, Arc<dyn StatusListener>)>> {
        self.listeners
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn subscribe(&self, listener: Arc<dyn StatusListener>) -> SubscriptionHandle {
        let handle = SubscriptionHandle(Uuid::new_v4());
        self.lock().push((handle, listener));
        debug!("新增订阅: {}", handle);
        handle
    }

    /// 取消订阅，句柄不存在时返回 false
    pub fn unsubscribe(&self, handle: SubscriptionHandle) -> bool {
        let mut listeners = self.lock();
        let before = listeners.len();
        listeners.retain(|(h, _)| *h != handle);
        let removed = listeners.len() != before;
        if removed {
            debug!("取消订阅: {}", handle);
        }
        removed
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// 通知所有订阅者一次
    pub fn notify(&self) {
        // 先复制列表再回调，回调内可以订阅/取消订阅
        let listeners: Vec<Arc<dyn StatusListener>> =
            self.lock().iter().map(|(_, l)| l.clone()).collect();
        for listener in listeners {
            listener.on_status_changed();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_notify_and_unsubscribe() {
        let subscribers = Subscribers::new();
        let count = Arc::new(AtomicUsize::new(0));

        let c = count.clone();
        let handle = subscribers.subscribe(Arc::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        }));

        subscribers.notify();
        subscribers.notify();
        assert_eq!(count.load(Ordering::SeqCst), 2);

        assert!(subscribers.unsubscribe(handle));
        assert!(!subscribers.unsubscribe(handle));
        subscribers.notify();
        assert_eq!(count.load(Ordering::SeqCst), 2);
        assert!(subscribers.is_empty());
    }

    #[test]
    fn test_notify_in_subscription_order() {
        let subscribers = Subscribers::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for id in 0..3 {
            let order = order.clone();
            subscribers.subscribe(Arc::new(move || order.lock().unwrap().push(id)));
        }

        subscribers.notify();
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
    }
}
