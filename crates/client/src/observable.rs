//! A current value plus change listeners.
//!
//! Listeners run synchronously on the thread that publishes, after the
//! internal lock has been released, so a listener may read the observable it
//! is subscribed to. A new subscriber is called once with the current value.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Shared<T> {
    value: T,
    listeners: Vec<(u64, Listener<T>)>,
    next_id: u64,
}

/// Shared, observable state. Clones observe the same value.
pub struct Observable<T> {
    shared: Arc<Mutex<Shared<T>>>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Clone + Send + 'static> Observable<T> {
    pub fn new(value: T) -> Self {
        Self {
            shared: Arc::new(Mutex::new(Shared {
                value,
                listeners: Vec::new(),
                next_id: 0,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Shared<T>> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// A copy of the current value.
    pub fn get(&self) -> T {
        self.lock().value.clone()
    }

    /// Notify listeners of the value in `shared`, after releasing the lock.
    fn publish(shared: MutexGuard<'_, Shared<T>>) {
        let value = shared.value.clone();
        let listeners = shared
            .listeners
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect::<Vec<_>>();
        drop(shared);
        for listener in listeners {
            listener(&value);
        }
    }

    /// Replace the value and notify every listener.
    pub fn set(&self, value: T) {
        let mut shared = self.lock();
        shared.value = value;
        Self::publish(shared);
    }

    /// Mutate the value in place while holding the lock, then notify.
    ///
    /// Concurrent updates are applied one after the other, so none is lost.
    pub fn update<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut shared = self.lock();
        let result = f(&mut shared.value);
        Self::publish(shared);
        result
    }

    /// Like [`Observable::update`], but `f` works on a copy that only
    /// replaces the value when `f` succeeds. Nothing is published on error.
    ///
    /// # Errors
    ///
    /// Returns whatever `f` returns.
    pub fn try_update<R, E>(&self, f: impl FnOnce(&mut T) -> Result<R, E>) -> Result<R, E> {
        let mut shared = self.lock();
        let mut value = shared.value.clone();
        let result = f(&mut value)?;
        shared.value = value;
        Self::publish(shared);
        Ok(result)
    }

    /// Register `listener`. It is called immediately with the current value.
    pub fn subscribe(&self, listener: impl Fn(&T) + Send + Sync + 'static) -> Subscription {
        let listener: Listener<T> = Arc::new(listener);
        let (id, current) = {
            let mut shared = self.lock();
            let id = shared.next_id;
            shared.next_id += 1;
            shared.listeners.push((id, Arc::clone(&listener)));
            (id, shared.value.clone())
        };
        listener(&current);

        let weak: Weak<Mutex<Shared<T>>> = Arc::downgrade(&self.shared);
        Subscription {
            cancel: Some(Box::new(move || {
                if let Some(shared) = weak.upgrade() {
                    shared
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .listeners
                        .retain(|(other, _)| *other != id);
                }
            })),
        }
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.lock().listeners.len()
    }
}

/// Handle returned by [`Observable::subscribe`]. Dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    /// Stop receiving notifications.
    pub fn unsubscribe(mut self) {
        self.cancel_now();
    }

    fn cancel_now(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel_now();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn test_subscriber_sees_current_then_updates() {
        let observable = Observable::new(1);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _sub = observable.subscribe(move |v| sink.lock().unwrap().push(*v));

        observable.set(2);
        observable.update(|v| *v += 5);

        assert_eq!(*seen.lock().unwrap(), vec![1, 2, 7]);
        assert_eq!(observable.get(), 7);
    }

    #[test]
    fn test_drop_unsubscribes() {
        let observable = Observable::new(0);
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let sub = observable.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(observable.listener_count(), 1);

        drop(sub);
        observable.set(1);

        assert_eq!(observable.listener_count(), 0);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_explicit_unsubscribe() {
        let observable = Observable::new(String::new());
        let sub = observable.subscribe(|_| {});
        sub.unsubscribe();
        assert_eq!(observable.listener_count(), 0);
    }

    #[test]
    fn test_listener_may_read_observable() {
        let observable = Observable::new(0);
        let reader = observable.clone();
        let seen = Arc::new(AtomicUsize::new(0));
        let sink = Arc::clone(&seen);
        let _sub = observable.subscribe(move |_| {
            sink.store(reader.get(), Ordering::SeqCst);
        });
        observable.set(9);
        assert_eq!(seen.load(Ordering::SeqCst), 9);
    }

    #[test]
    fn test_concurrent_updates_are_not_lost() {
        let observable = Observable::new(Vec::<usize>::new());
        let threads: Vec<_> = (0..8)
            .map(|worker| {
                let observable = observable.clone();
                std::thread::spawn(move || {
                    for n in 0..250 {
                        observable.update(|values| values.push(worker * 1000 + n));
                    }
                })
            })
            .collect();
        for thread in threads {
            thread.join().unwrap();
        }
        assert_eq!(observable.get().len(), 2000);
    }

    #[test]
    fn test_failed_try_update_changes_nothing() {
        let observable = Observable::new(1);
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let _sub = observable.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let result: Result<(), &str> = observable.try_update(|v| {
            *v = 2;
            Err("disk full")
        });
        assert_eq!(result, Err("disk full"));
        assert_eq!(observable.get(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        assert_eq!(observable.try_update(|v| {
            *v = 3;
            Ok::<_, &str>(*v * 2)
        }), Ok(6));
        assert_eq!(observable.get(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_subscription_outliving_observable() {
        let observable = Observable::new(0);
        let sub = observable.subscribe(|_| {});
        drop(observable);
        drop(sub);
    }
}
