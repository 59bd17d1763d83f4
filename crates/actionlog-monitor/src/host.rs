//! Read-only view of the host content repository.
//!
//! Monitors never touch host data directly. They ask a `ContentHost` for
//! snapshots of entities, terms, users and menus while translating a change
//! notification into action descriptors.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use tracing::debug;

use actionlog_core::events::ChangeEvent;
use actionlog_core::types::{
    ContentEntity, NavMenu, PostTypeInfo, TaxonomyInfo, Term, UserProfile,
};

/// Queries monitors may issue against the host repository.
pub trait ContentHost: Send + Sync {
    fn entity(&self, id: u64) -> Option<ContentEntity>;

    /// Type name of a stored entity.
    fn entity_type(&self, id: u64) -> Option<String> {
        self.entity(id).map(|e| e.entity_type)
    }

    fn post_types(&self) -> Vec<PostTypeInfo>;

    fn taxonomies(&self) -> Vec<TaxonomyInfo>;

    fn taxonomy(&self, name: &str) -> Option<TaxonomyInfo> {
        self.taxonomies().into_iter().find(|t| t.name == name)
    }

    fn post_type(&self, name: &str) -> Option<PostTypeInfo> {
        self.post_types().into_iter().find(|p| p.name == name)
    }

    fn term(&self, id: u64, taxonomy: &str) -> Option<Term>;

    /// Find a term when only its id is known.
    fn term_by_id(&self, id: u64) -> Option<Term> {
        self.taxonomies()
            .iter()
            .find_map(|t| self.term(id, &t.name))
    }

    /// Every descendant of a term, depth first.
    fn term_children(&self, id: u64, taxonomy: &str) -> Vec<u64>;

    fn user(&self, id: u64) -> Option<UserProfile>;

    /// Ids of published entities authored by `author` among `types`.
    fn published_posts_by_author(&self, author: u64, types: &[String]) -> Vec<u64>;

    fn menu(&self, id: u64) -> Option<NavMenu>;
}

/// Serializable snapshot pushed by the host alongside its events.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HostCatalog {
    pub post_types: Vec<PostTypeInfo>,
    pub taxonomies: Vec<TaxonomyInfo>,
    pub entities: Vec<ContentEntity>,
    pub terms: Vec<Term>,
    pub users: Vec<UserProfile>,
    pub menus: Vec<NavMenu>,
}

impl HostCatalog {
    pub fn is_empty(&self) -> bool {
        self.post_types.is_empty()
            && self.taxonomies.is_empty()
            && self.entities.is_empty()
            && self.terms.is_empty()
            && self.users.is_empty()
            && self.menus.is_empty()
    }
}

#[derive(Debug, Default)]
struct HostState {
    post_types: BTreeMap<String, PostTypeInfo>,
    taxonomies: BTreeMap<String, TaxonomyInfo>,
    entities: HashMap<u64, ContentEntity>,
    terms: HashMap<(String, u64), Term>,
    users: HashMap<u64, UserProfile>,
    menus: HashMap<u64, NavMenu>,
}

/// In-memory `ContentHost`, used as the service's mirror of the host and in
/// tests.
#[derive(Debug, Default)]
pub struct InMemoryHost {
    state: RwLock<HostState>,
}

impl InMemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Host with the built-in document types and taxonomies registered.
    pub fn with_core_types() -> Self {
        let host = Self::new();
        for (name, rest_base) in [("post", "posts"), ("page", "pages"), ("attachment", "media")] {
            host.insert_post_type(PostTypeInfo {
                name: name.to_string(),
                public: true,
                publicly_queryable: true,
                show_in_rest: true,
                rest_base: Some(rest_base.to_string()),
            });
        }
        host.insert_taxonomy(TaxonomyInfo {
            name: "category".to_string(),
            public: true,
            show_in_rest: true,
            hierarchical: true,
            rest_base: Some("categories".to_string()),
        });
        host.insert_taxonomy(TaxonomyInfo {
            name: "post_tag".to_string(),
            public: true,
            show_in_rest: true,
            hierarchical: false,
            rest_base: Some("tags".to_string()),
        });
        host
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HostState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HostState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    pub fn insert_post_type(&self, info: PostTypeInfo) {
        self.write().post_types.insert(info.name.clone(), info);
    }

    pub fn insert_taxonomy(&self, info: TaxonomyInfo) {
        self.write().taxonomies.insert(info.name.clone(), info);
    }

    pub fn insert_entity(&self, entity: ContentEntity) {
        self.write().entities.insert(entity.id, entity);
    }

    pub fn insert_term(&self, term: Term) {
        self.write()
            .terms
            .insert((term.taxonomy.clone(), term.id), term);
    }

    pub fn insert_user(&self, user: UserProfile) {
        self.write().users.insert(user.id, user);
    }

    pub fn insert_menu(&self, menu: NavMenu) {
        self.write().menus.insert(menu.id, menu);
    }

    pub fn remove_entity(&self, id: u64) -> Option<ContentEntity> {
        self.write().entities.remove(&id)
    }

    pub fn remove_term(&self, id: u64, taxonomy: &str) -> Option<Term> {
        self.write().terms.remove(&(taxonomy.to_string(), id))
    }

    pub fn remove_user(&self, id: u64) -> Option<UserProfile> {
        self.write().users.remove(&id)
    }

    pub fn remove_menu(&self, id: u64) -> Option<NavMenu> {
        self.write().menus.remove(&id)
    }

    /// Upsert everything in `catalog`.
    pub fn merge(&self, catalog: HostCatalog) {
        let mut state = self.write();
        for info in catalog.post_types {
            state.post_types.insert(info.name.clone(), info);
        }
        for info in catalog.taxonomies {
            state.taxonomies.insert(info.name.clone(), info);
        }
        for entity in catalog.entities {
            state.entities.insert(entity.id, entity);
        }
        for term in catalog.terms {
            state.terms.insert((term.taxonomy.clone(), term.id), term);
        }
        for user in catalog.users {
            state.users.insert(user.id, user);
        }
        for menu in catalog.menus {
            state.menus.insert(menu.id, menu);
        }
    }

    /// Drop whatever a deletion event removed on the host side.
    ///
    /// Call after the event has been routed to monitors, which may still
    /// need the snapshot while handling it.
    pub fn forget(&self, event: &ChangeEvent) {
        match event {
            ChangeEvent::EntityDeleted { entity_id }
            | ChangeEvent::MediaDeleted {
                attachment_id: entity_id,
            } => {
                self.remove_entity(*entity_id);
            }
            ChangeEvent::TermDeleted { term_id, taxonomy } => {
                self.remove_term(*term_id, taxonomy);
            }
            ChangeEvent::UserDeleted { user_id } => {
                self.remove_user(*user_id);
            }
            ChangeEvent::MenuDeleted { menu_id } => {
                self.remove_menu(*menu_id);
            }
            _ => return,
        }
        debug!(kind = ?event.kind(), "Host mirror dropped deleted object");
    }
}

impl ContentHost for InMemoryHost {
    fn entity(&self, id: u64) -> Option<ContentEntity> {
        self.read().entities.get(&id).cloned()
    }

    fn post_types(&self) -> Vec<PostTypeInfo> {
        self.read().post_types.values().cloned().collect()
    }

    fn taxonomies(&self) -> Vec<TaxonomyInfo> {
        self.read().taxonomies.values().cloned().collect()
    }

    fn term(&self, id: u64, taxonomy: &str) -> Option<Term> {
        self.read().terms.get(&(taxonomy.to_string(), id)).cloned()
    }

    fn term_children(&self, id: u64, taxonomy: &str) -> Vec<u64> {
        let state = self.read();
        let mut children = Vec::new();
        let mut pending = vec![id];
        while let Some(parent) = pending.pop() {
            let mut direct: Vec<u64> = state
                .terms
                .values()
                .filter(|t| t.taxonomy == taxonomy && t.parent == Some(parent))
                .map(|t| t.id)
                .collect();
            direct.sort_unstable();
            for child in direct {
                // Guard against parent cycles in pushed catalogs.
                if child != id && !children.contains(&child) {
                    children.push(child);
                    pending.push(child);
                }
            }
        }
        children
    }

    fn user(&self, id: u64) -> Option<UserProfile> {
        self.read().users.get(&id).cloned()
    }

    fn published_posts_by_author(&self, author: u64, types: &[String]) -> Vec<u64> {
        let mut ids: Vec<u64> = self
            .read()
            .entities
            .values()
            .filter(|e| {
                e.author == Some(author) && e.is_published() && types.contains(&e.entity_type)
            })
            .map(|e| e.id)
            .collect();
        ids.sort_unstable();
        ids
    }

    fn menu(&self, id: u64) -> Option<NavMenu> {
        self.read().menus.get(&id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn term(id: u64, parent: Option<u64>) -> Term {
        Term {
            id,
            taxonomy: "category".to_string(),
            name: format!("Term {}", id),
            parent,
        }
    }

    fn entity(id: u64, entity_type: &str, status: &str, author: Option<u64>) -> ContentEntity {
        ContentEntity {
            id,
            entity_type: entity_type.to_string(),
            title: format!("Entity {}", id),
            status: status.to_string(),
            author,
        }
    }

    #[test]
    fn test_core_types_registered() {
        let host = InMemoryHost::with_core_types();
        assert_eq!(host.post_types().len(), 3);
        assert!(host.taxonomy("category").unwrap().hierarchical);
        assert_eq!(
            host.taxonomy("post_tag").unwrap().rest_base.as_deref(),
            Some("tags")
        );
        assert!(host.post_type("page").is_some());
    }

    #[test]
    fn test_entity_type_defaults_through_entity() {
        let host = InMemoryHost::new();
        host.insert_entity(entity(42, "page", "publish", None));
        assert_eq!(host.entity_type(42).as_deref(), Some("page"));
        assert_eq!(host.entity_type(43), None);
    }

    #[test]
    fn test_term_children_are_all_descendants() {
        let host = InMemoryHost::with_core_types();
        host.insert_term(term(1, None));
        host.insert_term(term(2, Some(1)));
        host.insert_term(term(3, Some(1)));
        host.insert_term(term(4, Some(2)));
        host.insert_term(term(5, None));
        assert_eq!(host.term_by_id(4).unwrap().parent, Some(2));

        let mut children = host.term_children(1, "category");
        children.sort_unstable();
        assert_eq!(children, vec![2, 3, 4]);
        assert!(host.term_children(5, "category").is_empty());
        assert!(host.term_children(1, "post_tag").is_empty());
    }

    #[test]
    fn test_term_children_survives_cycle() {
        let host = InMemoryHost::new();
        host.insert_term(term(1, Some(2)));
        host.insert_term(term(2, Some(1)));
        assert_eq!(host.term_children(1, "category"), vec![2]);
    }

    #[test]
    fn test_published_posts_by_author() {
        let host = InMemoryHost::new();
        host.insert_entity(entity(10, "post", "publish", Some(7)));
        host.insert_entity(entity(11, "post", "draft", Some(7)));
        host.insert_entity(entity(12, "page", "publish", Some(7)));
        host.insert_entity(entity(13, "post", "publish", Some(8)));

        let types = vec!["post".to_string()];
        assert_eq!(host.published_posts_by_author(7, &types), vec![10]);

        let types = vec!["post".to_string(), "page".to_string()];
        assert_eq!(host.published_posts_by_author(7, &types), vec![10, 12]);
    }

    #[test]
    fn test_merge_catalog_and_forget() {
        let host = InMemoryHost::new();
        let catalog: HostCatalog = serde_json::from_value(serde_json::json!({
            "entities": [{"id": 42, "entity_type": "post", "title": "Hello", "status": "publish"}],
            "menus": [{"id": 3, "name": "Main"}]
        }))
        .unwrap();
        assert!(!catalog.is_empty());
        host.merge(catalog);

        assert_eq!(host.entity(42).unwrap().title, "Hello");
        assert_eq!(host.menu(3).unwrap().name, "Main");

        host.forget(&ChangeEvent::EntityDeleted { entity_id: 42 });
        host.forget(&ChangeEvent::MenuUpdated { menu_id: 3 });
        assert!(host.entity(42).is_none());
        assert!(host.menu(3).is_some());
    }
}
