//! Name disambiguation
//!
//! Turns ideal identifiers into collision-free, backend-legal ones. Both
//! operations are deterministic and total: they always produce a name.
//!
//! Policy, in order:
//! 1. The literal name, if free.
//! 2. The semantic suffix ("Service" for services, "Operation" for
//!    operations) when the literal name hits a backend-forbidden word.
//! 3. Ascending numeric suffixes starting at 2 — the unsuffixed name counts
//!    as occurrence 1.
//!
//! Scope discipline: service names share one registry per generation run;
//! operation names are scoped per service but still checked against the
//! backend's forbidden-word set (language keywords, reserved member names).

use std::collections::HashSet;

/// Committed identifiers for one namespace within a generation run.
///
/// Mutated only by successful disambiguation calls; never shared across runs.
#[derive(Debug, Default)]
pub struct NameRegistry {
    committed: HashSet<String>,
}

impl NameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Case-sensitive exact-match lookup.
    pub fn contains(&self, name: &str) -> bool {
        self.committed.contains(name)
    }

    fn commit(&mut self, name: &str) {
        self.committed.insert(name.to_string());
    }
}

/// Produce a unique service identifier and register it.
///
/// `taken` answers whether a candidate collides with anything the backend
/// already claims that is *not* a service name — forbidden identifiers and
/// names the type renderer will declare. Registered service names are
/// consulted separately so the semantic suffix is only triggered by
/// backend collisions, never by sibling services.
pub fn disambiguate_service_name(
    ideal: &str,
    taken: impl Fn(&str) -> bool,
    services: &mut NameRegistry,
) -> String {
    let mut name = ideal.to_string();
    if taken(&name) {
        name.push_str("Service");
    }
    if taken(&name) || services.contains(&name) {
        for index in 2usize.. {
            let candidate = format!("{}{}", name, index);
            if !taken(&candidate) && !services.contains(&candidate) {
                name = candidate;
                break;
            }
        }
    }
    services.commit(&name);
    name
}

/// Produce a unique operation identifier within one service scope.
///
/// `forbidden` is the backend's operation-level forbidden-word predicate
/// (keywords, base-object member names). The numeric fallback resolves
/// collisions with sibling operations only.
pub fn disambiguate_operation_name(
    ideal: &str,
    forbidden: impl Fn(&str) -> bool,
    scope: &mut NameRegistry,
) -> String {
    let mut name = ideal.to_string();
    if forbidden(&name) {
        name.push_str("Operation");
    }
    if scope.contains(&name) {
        for index in 2usize.. {
            let candidate = format!("{}{}", name, index);
            if !scope.contains(&candidate) {
                name = candidate;
                break;
            }
        }
    }
    scope.commit(&name);
    name
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_free_name_is_untouched() {
        let mut registry = NameRegistry::new();
        let name = disambiguate_service_name("UserService", |_| false, &mut registry);
        assert_eq!(name, "UserService");
        assert!(registry.contains("UserService"));
    }

    #[test]
    fn test_forbidden_service_gets_semantic_suffix() {
        let mut registry = NameRegistry::new();
        let name = disambiguate_service_name("Foo", |n| n == "Foo", &mut registry);
        assert_eq!(name, "FooService");
    }

    #[test]
    fn test_numeric_fallback_keeps_semantic_suffix() {
        // Both Foo and FooService taken: expect FooService2, never Foo2.
        let mut registry = NameRegistry::new();
        let name =
            disambiguate_service_name("Foo", |n| n == "Foo" || n == "FooService", &mut registry);
        assert_eq!(name, "FooService2");
    }

    #[test]
    fn test_sibling_service_collision_goes_numeric() {
        // A sibling service (not a forbidden word) holding the name skips the
        // semantic suffix and goes straight to numbering.
        let mut registry = NameRegistry::new();
        assert_eq!(
            disambiguate_service_name("Users", |_| false, &mut registry),
            "Users"
        );
        assert_eq!(
            disambiguate_service_name("Users", |_| false, &mut registry),
            "Users2"
        );
        assert_eq!(
            disambiguate_service_name("Users", |_| false, &mut registry),
            "Users3"
        );
    }

    #[test]
    fn test_forbidden_operation_gets_semantic_suffix() {
        let mut scope = NameRegistry::new();
        let name = disambiguate_operation_name("toString", |n| n == "toString", &mut scope);
        assert_eq!(name, "toStringOperation");
    }

    #[test]
    fn test_operation_numbering_starts_at_two() {
        let mut scope = NameRegistry::new();
        assert_eq!(
            disambiguate_operation_name("get", |_| false, &mut scope),
            "get"
        );
        assert_eq!(
            disambiguate_operation_name("get", |_| false, &mut scope),
            "get2"
        );
    }

    #[test]
    fn test_operation_scopes_are_independent() {
        let mut scope_a = NameRegistry::new();
        let mut scope_b = NameRegistry::new();
        assert_eq!(
            disambiguate_operation_name("get", |_| false, &mut scope_a),
            "get"
        );
        // Same ideal name in a different service keeps the literal form.
        assert_eq!(
            disambiguate_operation_name("get", |_| false, &mut scope_b),
            "get"
        );
    }
}
