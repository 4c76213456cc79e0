/// Handle returned by [`ListenerRegistry::register`], used to unregister.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerId(pub u64);

#[derive(Debug, Clone)]
struct Registered<K> {
    id: ListenerId,
    /// Smaller values run earlier.
    priority: i32,
    key: K,
}

/// Listeners bound to one map signal (e.g. "view settled").
///
/// Invocation order is total and deterministic: `(priority, registration order)`.
/// The same key may be registered more than once; it then runs once per
/// registration, matching how the map library treats duplicate bindings.
#[derive(Debug, Clone)]
pub struct ListenerRegistry<K> {
    next_id: u64,
    listeners: Vec<Registered<K>>,
}

impl<K> Default for ListenerRegistry<K> {
    fn default() -> Self {
        Self {
            next_id: 0,
            listeners: Vec::new(),
        }
    }
}

impl<K: Copy + PartialEq> ListenerRegistry<K> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, key: K) -> ListenerId {
        self.register_with_priority(key, 0)
    }

    pub fn register_with_priority(&mut self, key: K, priority: i32) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);
        self.listeners.push(Registered { id, priority, key });
        id
    }

    /// Returns `true` if the listener was still registered.
    pub fn unregister(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|l| l.id != id);
        self.listeners.len() != before
    }

    /// Remove every registration of `key`; returns how many were removed.
    pub fn unregister_key(&mut self, key: K) -> usize {
        let before = self.listeners.len();
        self.listeners.retain(|l| l.key != key);
        before - self.listeners.len()
    }

    pub fn is_registered(&self, key: K) -> bool {
        self.listeners.iter().any(|l| l.key == key)
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Keys in invocation order.
    pub fn ordered(&self) -> Vec<K> {
        let mut sorted: Vec<&Registered<K>> = self.listeners.iter().collect();
        sorted.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.id.cmp(&b.id)));
        sorted.into_iter().map(|l| l.key).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::ListenerRegistry;

    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    enum Key {
        Heat,
        Markers,
    }

    #[test]
    fn runs_in_registration_order() {
        let mut reg = ListenerRegistry::new();
        reg.register(Key::Heat);
        reg.register(Key::Markers);
        assert_eq!(reg.ordered(), vec![Key::Heat, Key::Markers]);
    }

    #[test]
    fn priority_overrides_registration_order() {
        let mut reg = ListenerRegistry::new();
        reg.register_with_priority(Key::Heat, 10);
        reg.register_with_priority(Key::Markers, -1);
        assert_eq!(reg.ordered(), vec![Key::Markers, Key::Heat]);
    }

    #[test]
    fn unregister_by_id_and_key() {
        let mut reg = ListenerRegistry::new();
        let heat = reg.register(Key::Heat);
        reg.register(Key::Markers);
        reg.register(Key::Markers);

        assert!(reg.unregister(heat));
        assert!(!reg.unregister(heat));
        assert!(!reg.is_registered(Key::Heat));

        assert_eq!(reg.unregister_key(Key::Markers), 2);
        assert!(reg.is_empty());
    }
}
