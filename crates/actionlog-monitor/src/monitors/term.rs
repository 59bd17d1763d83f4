//! Taxonomy terms, including parent/child propagation in hierarchical
//! taxonomies.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Mutex;

use serde_json::Value;
use tracing::debug;

use actionlog_core::events::{ChangeEvent, EventKind};
use actionlog_core::types::{ActionDescriptor, ActionType, TaxonomyInfo, Term};

use super::{Monitor, MonitorBase};
use crate::policy::MetaOwner;
use crate::types::LogOutcome;

pub const NAME: &str = "term";

const SUBSCRIPTIONS: &[EventKind] = &[
    EventKind::TermCreated,
    EventKind::TermEdited,
    EventKind::TermAboutToDelete,
    EventKind::TermDeleted,
    EventKind::TermMetaChanged,
];

/// A term and its descendants, captured before deletion.
#[derive(Debug, Clone)]
struct DeletedTerm {
    term: Term,
    children: Vec<Term>,
}

pub struct TermMonitor {
    base: MonitorBase,
    before_delete: Mutex<HashMap<(String, u64), DeletedTerm>>,
}

impl TermMonitor {
    pub fn new(base: MonitorBase) -> Self {
        Self {
            base,
            before_delete: Mutex::new(HashMap::new()),
        }
    }

    fn tracked_taxonomy(&self, taxonomy: &str) -> Option<TaxonomyInfo> {
        let engine = self.base.engine();
        let info = engine.host().taxonomy(taxonomy)?;
        if !engine.is_taxonomy_tracked(taxonomy) {
            debug!(taxonomy, "Untracked taxonomy");
            return None;
        }
        Some(info)
    }

    fn descriptor(
        action_type: ActionType,
        title: String,
        term_id: u64,
        status: &str,
        tax: &TaxonomyInfo,
    ) -> ActionDescriptor {
        let descriptor =
            ActionDescriptor::new(action_type, title, term_id, status).with_node_type(tax.name.clone());
        match &tax.rest_base {
            Some(rest_base) => descriptor.with_rest_base(rest_base.clone()),
            None => descriptor,
        }
    }

    /// UPDATE "{name} Parent" for a related term.
    fn log_relative(&self, relative: &Term, tax: &TaxonomyInfo) {
        self.base.log_action(Self::descriptor(
            ActionType::Update,
            format!("{} Parent", relative.name),
            relative.id,
            "publish",
            tax,
        ));
    }

    /// Touch the parent and every descendant of `term`.
    ///
    /// `captured` supplies the descendants when the term is already gone on
    /// the host side.
    fn update_hierarchical_relatives(
        &self,
        term: &Term,
        tax: &TaxonomyInfo,
        captured: Option<&[Term]>,
    ) {
        if !tax.hierarchical {
            return;
        }
        let host = self.base.engine().host();

        if let Some(parent) = term
            .parent
            .filter(|p| *p != 0)
            .and_then(|p| host.term(p, &tax.name))
        {
            self.log_relative(&parent, tax);
        }

        match captured {
            Some(children) => {
                for child in children {
                    self.log_relative(child, tax);
                }
            }
            None => {
                for child_id in host.term_children(term.id, &tax.name) {
                    if let Some(child) = host.term(child_id, &tax.name) {
                        self.log_relative(&child, tax);
                    }
                }
            }
        }
    }

    pub fn on_term_created(&self, term_id: u64, taxonomy: &str) -> Option<LogOutcome> {
        let tax = self.tracked_taxonomy(taxonomy)?;
        let term = self.base.engine().host().term(term_id, taxonomy)?;

        let outcome = self.base.log_action(Self::descriptor(
            ActionType::Create,
            term.name.clone(),
            term.id,
            "publish",
            &tax,
        ));
        self.update_hierarchical_relatives(&term, &tax, None);
        Some(outcome)
    }

    /// Capture the term and its descendants while they still exist.
    pub fn on_term_about_to_delete(&self, term_id: u64, taxonomy: &str) {
        let host = self.base.engine().host();
        let Some(term) = host.term(term_id, taxonomy) else {
            return;
        };
        let hierarchical = host.taxonomy(taxonomy).is_some_and(|t| t.hierarchical);
        let children = if hierarchical {
            host.term_children(term_id, taxonomy)
                .into_iter()
                .filter_map(|id| host.term(id, taxonomy))
                .collect()
        } else {
            Vec::new()
        };

        self.before_delete
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert((taxonomy.to_string(), term_id), DeletedTerm { term, children });
    }

    pub fn on_term_deleted(&self, term_id: u64, taxonomy: &str) -> Option<LogOutcome> {
        let captured = self
            .before_delete
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&(taxonomy.to_string(), term_id));
        let tax = self.tracked_taxonomy(taxonomy)?;

        let (term, children) = match captured {
            Some(DeletedTerm { term, children }) => (term, Some(children)),
            None => {
                let term = self.base.engine().host().term(term_id, taxonomy).unwrap_or(Term {
                    id: term_id,
                    taxonomy: taxonomy.to_string(),
                    name: format!("#{}", term_id),
                    parent: None,
                });
                (term, None)
            }
        };

        let outcome = self.base.log_action(Self::descriptor(
            ActionType::Delete,
            term.name.clone(),
            term.id,
            "trash",
            &tax,
        ));
        self.update_hierarchical_relatives(&term, &tax, children.as_deref());
        Some(outcome)
    }

    /// A term was edited. `parent_before` is its parent prior to the edit;
    /// when that differs from the current parent the old parent is touched
    /// too.
    pub fn on_term_edited(
        &self,
        term_id: u64,
        taxonomy: &str,
        parent_before: Option<u64>,
    ) -> Option<LogOutcome> {
        let tax = self.tracked_taxonomy(taxonomy)?;
        let host = self.base.engine().host();
        let term = host.term(term_id, taxonomy)?;

        let outcome = self.base.log_action(Self::descriptor(
            ActionType::Update,
            term.name.clone(),
            term.id,
            "publish",
            &tax,
        ));

        if tax.hierarchical {
            self.update_hierarchical_relatives(&term, &tax, None);

            let moved_from = parent_before.filter(|p| *p != 0 && Some(*p) != term.parent);
            if let Some(original) = moved_from.and_then(|p| host.term(p, taxonomy)) {
                self.log_relative(&original, &tax);
            }
        }
        Some(outcome)
    }

    pub fn on_term_meta_changed(&self, term_id: u64, key: &str, value: &Value) -> Option<LogOutcome> {
        let term = self.base.engine().host().term_by_id(term_id)?;
        let tax = self.tracked_taxonomy(&term.taxonomy)?;
        if !self.base.should_track_meta(key, value, MetaOwner::Term(term_id)) {
            return None;
        }
        Some(self.base.log_action(Self::descriptor(
            ActionType::Update,
            term.name.clone(),
            term.id,
            "publish",
            &tax,
        )))
    }
}

impl Monitor for TermMonitor {
    fn name(&self) -> &str {
        NAME
    }

    fn subscriptions(&self) -> &'static [EventKind] {
        SUBSCRIPTIONS
    }

    fn on_event(&self, event: &ChangeEvent) {
        match event {
            ChangeEvent::TermCreated { term_id, taxonomy } => {
                self.on_term_created(*term_id, taxonomy);
            }
            ChangeEvent::TermEdited {
                term_id,
                taxonomy,
                parent_before,
            } => {
                self.on_term_edited(*term_id, taxonomy, *parent_before);
            }
            ChangeEvent::TermAboutToDelete { term_id, taxonomy } => {
                self.on_term_about_to_delete(*term_id, taxonomy);
            }
            ChangeEvent::TermDeleted { term_id, taxonomy } => {
                self.on_term_deleted(*term_id, taxonomy);
            }
            ChangeEvent::TermMetaChanged {
                term_id,
                meta_key,
                meta_value,
            } => {
                self.on_term_meta_changed(*term_id, meta_key, meta_value);
            }
            _ => {}
        }
    }

    fn base(&self) -> &MonitorBase {
        &self.base
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
