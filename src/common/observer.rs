use std::sync::{Arc, RwLock};

/// Notified after every structural change so the shell can repaint.
/// The core never draws; this is the whole rendering contract.
pub trait RedrawObserver: Send + Sync {
    fn request_redraw(&mut self);
}

pub trait RedrawObservable {
    fn notify_redraw(&mut self);
    fn register_observer(&mut self, observer: Arc<RwLock<dyn RedrawObserver>>);
    fn unregister_observer(&mut self, observer: &Arc<RwLock<dyn RedrawObserver>>);
}

// Macro for generating RedrawObservable implementations
macro_rules! impl_redraw_observable {
    ($observable:ty) => {
        impl crate::common::observer::RedrawObservable for $observable {
            fn notify_redraw(&mut self) {
                for observer in self.observers.iter() {
                    observer.write().unwrap().request_redraw();
                }
            }
            fn register_observer(
                &mut self,
                observer: std::sync::Arc<
                    std::sync::RwLock<dyn crate::common::observer::RedrawObserver>,
                >,
            ) {
                self.observers.push_back(observer);
            }
            fn unregister_observer(
                &mut self,
                observer: &std::sync::Arc<
                    std::sync::RwLock<dyn crate::common::observer::RedrawObserver>,
                >,
            ) {
                self.observers.retain(|o| {
                    !std::ptr::addr_eq(std::sync::Arc::as_ptr(o), std::sync::Arc::as_ptr(observer))
                });
            }
        }
    };
}
pub(crate) use impl_redraw_observable;
