//! Injectable veto and override points.
//!
//! Every hook is optional. Predicates returning `Option<bool>` follow the
//! same precedence: `Some(_)` from the hook wins, `None` falls through to
//! the built-in rule.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use actionlog_core::types::ActionDescriptor;

use crate::types::WebhookRequest;

/// Option names tracked by the settings monitor unless overridden.
pub const DEFAULT_TRACKED_OPTIONS: [&str; 31] = [
    "siteurl",
    "home",
    "blogname",
    "blogdescription",
    "start_of_week",
    "default_category",
    "default_comment_status",
    "posts_per_page",
    "date_format",
    "time_format",
    "blog_charset",
    "active_plugins",
    "category_base",
    "gmt_offset",
    "template",
    "stylesheet",
    "comment_registration",
    "default_role",
    "show_on_front",
    "tag_base",
    "show_avatars",
    "avatar_rating",
    "upload_url_path",
    "comments_per_page",
    "default_comments_page",
    "comment_order",
    "sticky_posts",
    "timezone_string",
    "default_post_format",
    "site_icon",
    "current_theme",
];

/// User meta keys tracked by the user monitor unless overridden.
pub const DEFAULT_TRACKED_USER_META: [&str; 4] = ["description", "nickname", "firstName", "lastName"];

/// What a metadata change is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetaOwner {
    Entity(u64),
    Term(u64),
    User(u64),
}

type PreLogHook = Arc<dyn Fn(&ActionDescriptor) -> Option<bool> + Send + Sync>;
type MetaHook = Arc<dyn Fn(&str, &Value, MetaOwner) -> Option<bool> + Send + Sync>;
type OptionHook = Arc<dyn Fn(&str, &Value, &Value) -> Option<bool> + Send + Sync>;
type ListFilter = Arc<dyn Fn(Vec<String>) -> Vec<String> + Send + Sync>;
type WebhookFilter = Arc<dyn Fn(WebhookRequest) -> WebhookRequest + Send + Sync>;

/// Caller-supplied hooks consulted by the engine, the monitors and the
/// dispatcher.
#[derive(Clone, Default)]
pub struct Policies {
    pre_log: Option<PreLogHook>,
    should_track_meta: Option<MetaHook>,
    should_track_option: Option<OptionHook>,
    tracked_post_types: Option<ListFilter>,
    tracked_taxonomies: Option<ListFilter>,
    tracked_option_names: Option<ListFilter>,
    tracked_user_meta_keys: Option<ListFilter>,
    webhook_request: Option<WebhookFilter>,
}

impl fmt::Debug for Policies {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Policies")
            .field("pre_log", &self.pre_log.is_some())
            .field("should_track_meta", &self.should_track_meta.is_some())
            .field("should_track_option", &self.should_track_option.is_some())
            .field("tracked_post_types", &self.tracked_post_types.is_some())
            .field("tracked_taxonomies", &self.tracked_taxonomies.is_some())
            .field("tracked_option_names", &self.tracked_option_names.is_some())
            .field("tracked_user_meta_keys", &self.tracked_user_meta_keys.is_some())
            .field("webhook_request", &self.webhook_request.is_some())
            .finish()
    }
}

impl Policies {
    pub fn new() -> Self {
        Self::default()
    }

    /// Veto hook run before anything is written. `Some(false)` drops the
    /// action.
    pub fn with_pre_log<F>(mut self, hook: F) -> Self
    where
        F: Fn(&ActionDescriptor) -> Option<bool> + Send + Sync + 'static,
    {
        self.pre_log = Some(Arc::new(hook));
        self
    }

    pub fn with_should_track_meta<F>(mut self, hook: F) -> Self
    where
        F: Fn(&str, &Value, MetaOwner) -> Option<bool> + Send + Sync + 'static,
    {
        self.should_track_meta = Some(Arc::new(hook));
        self
    }

    pub fn with_should_track_option<F>(mut self, hook: F) -> Self
    where
        F: Fn(&str, &Value, &Value) -> Option<bool> + Send + Sync + 'static,
    {
        self.should_track_option = Some(Arc::new(hook));
        self
    }

    pub fn with_tracked_post_types<F>(mut self, filter: F) -> Self
    where
        F: Fn(Vec<String>) -> Vec<String> + Send + Sync + 'static,
    {
        self.tracked_post_types = Some(Arc::new(filter));
        self
    }

    pub fn with_tracked_taxonomies<F>(mut self, filter: F) -> Self
    where
        F: Fn(Vec<String>) -> Vec<String> + Send + Sync + 'static,
    {
        self.tracked_taxonomies = Some(Arc::new(filter));
        self
    }

    pub fn with_tracked_option_names<F>(mut self, filter: F) -> Self
    where
        F: Fn(Vec<String>) -> Vec<String> + Send + Sync + 'static,
    {
        self.tracked_option_names = Some(Arc::new(filter));
        self
    }

    pub fn with_tracked_user_meta_keys<F>(mut self, filter: F) -> Self
    where
        F: Fn(Vec<String>) -> Vec<String> + Send + Sync + 'static,
    {
        self.tracked_user_meta_keys = Some(Arc::new(filter));
        self
    }

    /// Rewrites the argument bag of every outbound webhook.
    pub fn with_webhook_request<F>(mut self, filter: F) -> Self
    where
        F: Fn(WebhookRequest) -> WebhookRequest + Send + Sync + 'static,
    {
        self.webhook_request = Some(Arc::new(filter));
        self
    }

    pub fn pre_log(&self, descriptor: &ActionDescriptor) -> Option<bool> {
        self.pre_log.as_ref().and_then(|hook| hook(descriptor))
    }

    pub fn meta_override(&self, key: &str, value: &Value, owner: MetaOwner) -> Option<bool> {
        self.should_track_meta
            .as_ref()
            .and_then(|hook| hook(key, value, owner))
    }

    pub fn option_override(&self, name: &str, old: &Value, new: &Value) -> Option<bool> {
        self.should_track_option
            .as_ref()
            .and_then(|hook| hook(name, old, new))
    }

    pub fn filter_post_types(&self, types: Vec<String>) -> Vec<String> {
        apply_filter(&self.tracked_post_types, types)
    }

    pub fn filter_taxonomies(&self, taxonomies: Vec<String>) -> Vec<String> {
        apply_filter(&self.tracked_taxonomies, taxonomies)
    }

    /// The settings allow-list after the caller's filter.
    pub fn tracked_option_names(&self) -> Vec<String> {
        apply_filter(&self.tracked_option_names, to_owned(&DEFAULT_TRACKED_OPTIONS))
    }

    /// The user meta allow-list after the caller's filter.
    pub fn tracked_user_meta_keys(&self) -> Vec<String> {
        apply_filter(
            &self.tracked_user_meta_keys,
            to_owned(&DEFAULT_TRACKED_USER_META),
        )
    }

    pub fn webhook_request(&self, request: WebhookRequest) -> WebhookRequest {
        match &self.webhook_request {
            Some(filter) => filter(request),
            None => request,
        }
    }
}

fn apply_filter(filter: &Option<ListFilter>, values: Vec<String>) -> Vec<String> {
    match filter {
        Some(f) => f(values),
        None => values,
    }
}

fn to_owned(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}
