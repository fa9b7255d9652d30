//! Stale-response guard for overlapping requests.
//!
//! Each logical resource (for example `assignments:group:<id>`) carries a
//! generation counter. Issuing a ticket supersedes every earlier ticket for
//! that resource; results presented with a superseded ticket are dropped.

use std::collections::HashMap;

/// Proof of one issued request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestTicket {
    resource: String,
    generation: u64,
}

impl RequestTicket {
    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Generation tracker owned by one screen.
#[derive(Debug, Default)]
pub struct RequestGuard {
    generations: HashMap<String, u64>,
}

impl RequestGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a request for `resource`, superseding earlier ones.
    pub fn issue(&mut self, resource: impl Into<String>) -> RequestTicket {
        let resource = resource.into();
        let generation = self.generations.entry(resource.clone()).or_insert(0);
        *generation += 1;
        RequestTicket {
            resource,
            generation: *generation,
        }
    }

    pub fn is_current(&self, ticket: &RequestTicket) -> bool {
        self.generations.get(&ticket.resource) == Some(&ticket.generation)
    }

    /// Returns `value` only when `ticket` is still the latest for its
    /// resource.
    pub fn accept<T>(&self, ticket: &RequestTicket, value: T) -> Option<T> {
        self.is_current(ticket).then_some(value)
    }

    /// Supersedes outstanding tickets for `resource`.
    pub fn invalidate(&mut self, resource: &str) {
        if let Some(generation) = self.generations.get_mut(resource) {
            *generation += 1;
        }
    }

    /// Supersedes every outstanding ticket. Called when the screen unmounts.
    pub fn invalidate_all(&mut self) {
        for generation in self.generations.values_mut() {
            *generation += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::RequestGuard;

    #[test]
    fn newer_ticket_supersedes_older_one() {
        let mut guard = RequestGuard::new();
        let first = guard.issue("assignments:group:a");
        let second = guard.issue("assignments:group:a");
        assert_eq!(guard.accept(&first, "old"), None);
        assert_eq!(guard.accept(&second, "new"), Some("new"));
    }

    #[test]
    fn resources_are_tracked_independently() {
        let mut guard = RequestGuard::new();
        let groups = guard.issue("groups");
        let _yachts = guard.issue("yachts");
        guard.issue("yachts");
        assert!(guard.is_current(&groups));
    }

    #[test]
    fn invalidation_drops_in_flight_results() {
        let mut guard = RequestGuard::new();
        let groups = guard.issue("groups");
        let yachts = guard.issue("yachts");
        guard.invalidate("groups");
        assert!(!guard.is_current(&groups));
        assert!(guard.is_current(&yachts));

        guard.invalidate_all();
        assert!(!guard.is_current(&yachts));
        guard.invalidate("never-issued");
    }
}
