use std::collections::HashMap;

use super::{rule::FilterRule, selector::Selector};
use crate::config::{FilterActionConfig, FilterConfig, FilterRuleConfig};

/// Immutable table of redaction rules keyed by resource kind.
///
/// Built once at start-up and shared read-only (behind an `Arc`) by every
/// request; there is no way to mutate a registry after [`FilterRegistryBuilder::build`].
#[derive(Debug, Default)]
pub struct FilterRegistry {
    rules: HashMap<String, Vec<FilterRule>>,
}

impl FilterRegistry {
    pub fn builder() -> FilterRegistryBuilder {
        FilterRegistryBuilder::default()
    }

    /// The built-in node/host scrubbing rules.
    pub fn with_builtin_rules(placeholder_host: &str, placeholder_ip: &str) -> Self {
        Self::builder()
            .builtin_rules(placeholder_host, placeholder_ip)
            .build()
    }

    /// Built-in rules followed by any extra rules declared in configuration.
    pub fn from_config(config: &FilterConfig) -> Self {
        let mut builder = Self::builder();
        if config.builtin_rules {
            builder = builder.builtin_rules(&config.placeholder_host, &config.placeholder_ip);
        }
        for rule in &config.rules {
            builder = builder.configured_rule(rule);
        }

        let registry = builder.build();
        tracing::info!(
            kinds = registry.rules.len(),
            rules = registry.rule_count(),
            "Response filter registry built"
        );
        registry
    }

    /// Rules registered for exactly `kind`, in registration order.
    pub fn rules_for(&self, kind: &str) -> &[FilterRule] {
        self.rules.get(kind).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn has_rules(&self, kind: &str) -> bool {
        !self.rules_for(kind).is_empty()
    }

    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.rules.keys().map(String::as_str)
    }

    pub fn rule_count(&self) -> usize {
        self.rules.values().map(Vec::len).sum()
    }
}

#[derive(Debug, Default)]
pub struct FilterRegistryBuilder {
    rules: HashMap<String, Vec<FilterRule>>,
}

impl FilterRegistryBuilder {
    /// Append `rule` to the rule set of `kind`.
    pub fn rule(mut self, kind: impl Into<String>, rule: FilterRule) -> Self {
        self.rules.entry(kind.into()).or_default().push(rule);
        self
    }

    /// Hide scheduling placement: node names, host IPs and the node mentioned in
    /// scheduler event messages.
    pub fn builtin_rules(self, placeholder_host: &str, placeholder_ip: &str) -> Self {
        self.rule(
            "Pod",
            FilterRule::replace(
                Selector::exists(["spec", "nodeName"]),
                "nodeName",
                placeholder_host,
            ),
        )
        .rule(
            "Pod",
            FilterRule::replace(
                Selector::exists(["status", "hostIP"]),
                "hostIP",
                placeholder_ip,
            ),
        )
        .rule(
            "Event",
            FilterRule::replace(
                Selector::exists(["source", "host"]),
                "host",
                placeholder_host,
            ),
        )
        .rule(
            "Event",
            FilterRule::regex_replace(
                Selector::equals("Scheduled", ["reason"]),
                "message",
                r"\sto\s.+$",
                format!(" to {placeholder_host}"),
            ),
        )
        .rule(
            "Event",
            FilterRule::regex_replace(
                Selector::equals("FailedScheduling", ["reason"]),
                "message",
                r"\snode\s\([^)]+\)",
                format!(" node ({placeholder_host})"),
            ),
        )
    }

    fn configured_rule(self, config: &FilterRuleConfig) -> Self {
        let selector = config.selector.clone();
        let rule = match &config.action {
            FilterActionConfig::Remove => FilterRule::remove(selector, &config.field),
            FilterActionConfig::Blank => FilterRule::blank(selector, &config.field),
            FilterActionConfig::Replace { value } => {
                FilterRule::replace(selector, &config.field, value.clone())
            }
            FilterActionConfig::RegexReplace {
                pattern,
                replacement,
            } => FilterRule::regex_replace(selector, &config.field, pattern, replacement),
        };
        self.rule(config.kind.clone(), rule)
    }

    pub fn build(self) -> FilterRegistry {
        FilterRegistry { rules: self.rules }
    }
}
