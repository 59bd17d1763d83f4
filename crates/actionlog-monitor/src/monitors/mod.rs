//! Monitors and their registry.
//!
//! A monitor subscribes to a fixed set of `EventKind`s, translates each
//! change notification into one or more action descriptors and logs them
//! through its `MonitorBase`. The registry holds the known constructors and
//! builds a fresh `MonitorSet` for every request lifetime.

pub mod base;
pub mod media;
pub mod nav_menu;
pub mod post;
pub mod schema;
pub mod settings;
pub mod term;
pub mod user;

use std::any::Any;
use std::sync::Arc;

use tracing::debug;

use actionlog_core::events::{ChangeEvent, EventKind};

use crate::engine::ActionMonitor;

pub use base::MonitorBase;
pub use media::MediaMonitor;
pub use nav_menu::NavMenuMonitor;
pub use post::PostMonitor;
pub use schema::SchemaMonitor;
pub use settings::SettingsMonitor;
pub use term::TermMonitor;
pub use user::UserMonitor;

/// Translates change notifications for one area of the host into actions.
pub trait Monitor: Send + Sync {
    /// Registry name.
    fn name(&self) -> &str;

    /// Event kinds this monitor handles.
    fn subscriptions(&self) -> &'static [EventKind];

    /// Handle one event. Events outside `subscriptions()` are ignored.
    fn on_event(&self, event: &ChangeEvent);

    fn base(&self) -> &MonitorBase;

    fn as_any(&self) -> &dyn Any;
}

type MonitorConstructor = Arc<dyn Fn(MonitorBase) -> Box<dyn Monitor> + Send + Sync>;

/// Known monitors, by name, in registration order.
#[derive(Clone, Default)]
pub struct MonitorRegistry {
    entries: Vec<(String, MonitorConstructor)>,
}

impl std::fmt::Debug for MonitorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonitorRegistry")
            .field("monitors", &self.names())
            .finish()
    }
}

impl MonitorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the built-in monitors.
    pub fn register_defaults(&mut self) {
        self.register(media::NAME, |base| Box::new(MediaMonitor::new(base)));
        self.register(nav_menu::NAME, |base| Box::new(NavMenuMonitor::new(base)));
        self.register(post::NAME, |base| Box::new(PostMonitor::new(base)));
        self.register(schema::NAME, |base| Box::new(SchemaMonitor::new(base)));
        self.register(settings::NAME, |base| Box::new(SettingsMonitor::new(base)));
        self.register(term::NAME, |base| Box::new(TermMonitor::new(base)));
        self.register(user::NAME, |base| Box::new(UserMonitor::new(base)));
    }

    /// Registry with the built-in monitors.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register_defaults();
        registry
    }

    /// Add a monitor constructor. A constructor registered under an existing
    /// name replaces it in place.
    pub fn register<F>(&mut self, name: &str, constructor: F)
    where
        F: Fn(MonitorBase) -> Box<dyn Monitor> + Send + Sync + 'static,
    {
        let constructor: MonitorConstructor = Arc::new(constructor);
        match self.entries.iter_mut().find(|(n, _)| n == name) {
            Some(entry) => entry.1 = constructor,
            None => self.entries.push((name.to_string(), constructor)),
        }
    }

    /// Remove a monitor. Returns whether it was registered.
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(n, _)| n != name);
        self.entries.len() != before
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|(n, _)| n.as_str()).collect()
    }

    /// Instantiate every registered monitor against `engine`.
    pub fn build(&self, engine: &Arc<ActionMonitor>) -> MonitorSet {
        let monitors = self
            .entries
            .iter()
            .map(|(_, constructor)| constructor(MonitorBase::new(engine.clone())))
            .collect();
        MonitorSet {
            engine: engine.clone(),
            monitors,
        }
    }
}

/// Monitors instantiated for one request lifetime.
pub struct MonitorSet {
    engine: Arc<ActionMonitor>,
    monitors: Vec<Box<dyn Monitor>>,
}

impl MonitorSet {
    pub fn engine(&self) -> &Arc<ActionMonitor> {
        &self.engine
    }

    /// Route an event to every monitor subscribed to its kind. Returns how
    /// many monitors received it.
    pub fn handle(&self, event: &ChangeEvent) -> usize {
        let kind = event.kind();
        let mut delivered = 0;
        for monitor in &self.monitors {
            if monitor.subscriptions().contains(&kind) {
                monitor.on_event(event);
                delivered += 1;
            }
        }
        debug!(?kind, delivered, "Change event routed");
        delivered
    }

    pub fn get(&self, name: &str) -> Option<&dyn Monitor> {
        self.monitors
            .iter()
            .find(|m| m.name() == name)
            .map(|m| m.as_ref())
    }

    /// Concrete monitor by name.
    pub fn get_as<T: 'static>(&self, name: &str) -> Option<&T> {
        self.get(name).and_then(|m| m.as_any().downcast_ref::<T>())
    }

    pub fn len(&self) -> usize {
        self.monitors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.monitors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use actionlog_storage::{ActionRecordRepository, Database};

    use crate::host::InMemoryHost;
    use crate::policy::Policies;

    fn make_engine() -> Arc<ActionMonitor> {
        let repo = Arc::new(ActionRecordRepository::new(Arc::new(
            Database::in_memory().unwrap(),
        )));
        Arc::new(ActionMonitor::new(
            repo,
            Arc::new(InMemoryHost::with_core_types()),
            Arc::new(Policies::new()),
        ))
    }

    /// Counts the menu events it sees.
    struct CountingMonitor {
        base: MonitorBase,
        seen: AtomicUsize,
    }

    impl Monitor for CountingMonitor {
        fn name(&self) -> &str {
            nav_menu::NAME
        }
        fn subscriptions(&self) -> &'static [EventKind] {
            &[EventKind::MenuUpdated]
        }
        fn on_event(&self, _event: &ChangeEvent) {
            self.seen.fetch_add(1, Ordering::SeqCst);
        }
        fn base(&self) -> &MonitorBase {
            &self.base
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[test]
    fn test_defaults_registered() {
        let registry = MonitorRegistry::with_defaults();
        assert_eq!(
            registry.names(),
            vec!["media", "nav_menu", "post", "schema", "settings", "term", "user"]
        );
    }

    #[test]
    fn test_register_overrides_by_name() {
        let mut registry = MonitorRegistry::with_defaults();
        registry.register(nav_menu::NAME, |base| {
            Box::new(CountingMonitor {
                base,
                seen: AtomicUsize::new(0),
            })
        });
        assert_eq!(registry.names().len(), 7);

        let set = registry.build(&make_engine());
        set.handle(&ChangeEvent::MenuUpdated { menu_id: 1 });
        set.handle(&ChangeEvent::MenuDeleted { menu_id: 1 });

        let counting = set.get_as::<CountingMonitor>(nav_menu::NAME).unwrap();
        assert_eq!(counting.seen.load(Ordering::SeqCst), 1);
        assert!(set.get_as::<NavMenuMonitor>(nav_menu::NAME).is_none());
    }

    #[test]
    fn test_remove() {
        let mut registry = MonitorRegistry::with_defaults();
        assert!(registry.remove(schema::NAME));
        assert!(!registry.remove(schema::NAME));

        let set = registry.build(&make_engine());
        assert_eq!(set.len(), 6);
        assert_eq!(
            set.handle(&ChangeEvent::ContentModelChanged { description: None }),
            0
        );
    }

    #[test]
    fn test_handle_routes_by_subscription() {
        let set = MonitorRegistry::with_defaults().build(&make_engine());
        assert_eq!(set.handle(&ChangeEvent::MediaAdded { attachment_id: 9 }), 1);
        assert_eq!(
            set.handle(&ChangeEvent::TermCreated {
                term_id: 1,
                taxonomy: "category".to_string(),
            }),
            1
        );
        assert!(set.get(user::NAME).is_some());
        assert!(set.get("acf").is_none());
    }

    #[test]
    fn test_monitors_share_engine() {
        let engine = make_engine();
        let set = MonitorRegistry::with_defaults().build(&engine);
        set.handle(&ChangeEvent::MenuDeleted { menu_id: 4 });
        set.handle(&ChangeEvent::ContentModelChanged { description: None });
        assert_eq!(engine.logged_count(), 2);
        assert!(Arc::ptr_eq(set.engine(), &engine));
    }
}
