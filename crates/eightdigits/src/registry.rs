// Copyright (c) 2026 Epigraf. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Append-only registry of hits and events for one visit.
//!
//! Hits and events share a single creation-ordered sequence so the
//! registration pipeline can replay them FIFO regardless of kind. Appends and
//! state transitions take the write lock; accessors return cloned snapshots
//! so reads never observe a half-applied transition. Records are never
//! removed while the visit lives.

use std::sync::RwLock;

use eightdigits_core::{Event, Hit, HitId, RegistrationState};

/// A record in creation order: either a hit or an event.
#[derive(Debug, Clone)]
pub(crate) enum Record {
	Hit(Hit),
	Event(Event),
}

impl Record {
	fn state(&self) -> RegistrationState {
		match self {
			Record::Hit(hit) => hit.state,
			Record::Event(event) => event.state,
		}
	}

	fn created_at(&self) -> chrono::DateTime<chrono::Utc> {
		match self {
			Record::Hit(hit) => hit.created_at,
			Record::Event(event) => event.created_at,
		}
	}
}

/// Ordered collection of hit and event records scoped to one visit.
pub(crate) struct Registry {
	records: RwLock<Vec<Record>>,
}

impl Registry {
	pub(crate) fn new() -> Self {
		Self {
			records: RwLock::new(Vec::new()),
		}
	}

	/// Rebuilds a registry from persisted hits and events, re-interleaving
	/// them by creation time to restore the original sequence.
	pub(crate) fn from_records(hits: Vec<Hit>, events: Vec<Event>) -> Self {
		let mut records: Vec<Record> = hits
			.into_iter()
			.map(Record::Hit)
			.chain(events.into_iter().map(Record::Event))
			.collect();
		records.sort_by_key(Record::created_at);
		Self {
			records: RwLock::new(records),
		}
	}

	/// Appends a new pending hit and returns it.
	pub(crate) fn append_hit(&self, screen: Option<String>) -> Hit {
		let hit = Hit::new(screen);
		let mut records = self.records.write().expect("registry lock poisoned");
		records.push(Record::Hit(hit.clone()));
		hit
	}

	/// Appends a validated pending event.
	pub(crate) fn append_event(&self, event: Event) {
		let mut records = self.records.write().expect("registry lock poisoned");
		records.push(Record::Event(event));
	}

	pub(crate) fn contains_hit(&self, id: HitId) -> bool {
		let records = self.records.read().expect("registry lock poisoned");
		records
			.iter()
			.any(|r| matches!(r, Record::Hit(hit) if hit.id == id))
	}

	/// Ordered snapshot of all hits.
	pub(crate) fn hits(&self) -> Vec<Hit> {
		let records = self.records.read().expect("registry lock poisoned");
		records
			.iter()
			.filter_map(|r| match r {
				Record::Hit(hit) => Some(hit.clone()),
				Record::Event(_) => None,
			})
			.collect()
	}

	/// Hits still pending or failed, in creation order.
	pub(crate) fn non_registered_hits(&self) -> Vec<Hit> {
		self
			.hits()
			.into_iter()
			.filter(|h| h.state.needs_registration())
			.collect()
	}

	/// Ordered snapshot of all events.
	pub(crate) fn events(&self) -> Vec<Event> {
		let records = self.records.read().expect("registry lock poisoned");
		records
			.iter()
			.filter_map(|r| match r {
				Record::Event(event) => Some(event.clone()),
				Record::Hit(_) => None,
			})
			.collect()
	}

	/// Events still pending or failed, in creation order.
	pub(crate) fn non_registered_events(&self) -> Vec<Event> {
		self
			.events()
			.into_iter()
			.filter(|e| e.state.needs_registration())
			.collect()
	}

	/// First record at or after `from` that needs registration. Returns its
	/// index and a clone for submission; indices are stable because records
	/// are only ever appended.
	pub(crate) fn next_needing_registration(&self, from: usize) -> Option<(usize, Record)> {
		let records = self.records.read().expect("registry lock poisoned");
		records
			.iter()
			.enumerate()
			.skip(from)
			.find(|(_, r)| r.state().needs_registration())
			.map(|(i, r)| (i, r.clone()))
	}

	/// Marks the record at `index` registered.
	pub(crate) fn mark_registered(&self, index: usize) {
		let mut records = self.records.write().expect("registry lock poisoned");
		match &mut records[index] {
			Record::Hit(hit) => hit.mark_registered(),
			Record::Event(event) => event.mark_registered(),
		}
	}

	/// Marks the record at `index` failed (no-op once registered).
	pub(crate) fn mark_failed(&self, index: usize) {
		let mut records = self.records.write().expect("registry lock poisoned");
		match &mut records[index] {
			Record::Hit(hit) => hit.mark_failed(),
			Record::Event(event) => event.mark_failed(),
		}
	}

	/// Demotes every non-registered record back to pending, used when the
	/// session lost authorization and must retry after re-auth.
	pub(crate) fn demote_non_registered(&self) {
		let mut records = self.records.write().expect("registry lock poisoned");
		for record in records.iter_mut() {
			match record {
				Record::Hit(hit) => hit.demote_to_pending(),
				Record::Event(event) => event.demote_to_pending(),
			}
		}
	}

	pub(crate) fn has_unregistered(&self) -> bool {
		let records = self.records.read().expect("registry lock poisoned");
		records.iter().any(|r| r.state().needs_registration())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn hits_preserve_creation_order() {
		let registry = Registry::new();
		let first = registry.append_hit(Some("a".to_string()));
		let second = registry.append_hit(Some("b".to_string()));
		let third = registry.append_hit(Some("c".to_string()));

		let hits = registry.hits();
		assert_eq!(
			hits.iter().map(|h| h.id).collect::<Vec<_>>(),
			vec![first.id, second.id, third.id]
		);
	}

	#[test]
	fn non_registered_is_ordered_subset() {
		let registry = Registry::new();
		registry.append_hit(None);
		let second = registry.append_hit(None);
		registry.append_hit(None);

		// Register the middle hit.
		registry.mark_registered(1);

		let all = registry.hits();
		let non_registered = registry.non_registered_hits();
		assert_eq!(non_registered.len(), 2);
		assert_eq!(non_registered[0].id, all[0].id);
		assert_eq!(non_registered[1].id, all[2].id);
		assert!(non_registered.iter().all(|h| h.id != second.id));
	}

	#[test]
	fn events_interleave_with_hits_in_one_sequence() {
		let registry = Registry::new();
		registry.append_hit(None);
		registry.append_event(Event::new("score", "42", None).unwrap());
		registry.append_hit(None);

		let (first, record) = registry.next_needing_registration(0).unwrap();
		assert_eq!(first, 0);
		assert!(matches!(record, Record::Hit(_)));

		registry.mark_registered(0);
		let (second, record) = registry.next_needing_registration(0).unwrap();
		assert_eq!(second, 1);
		assert!(matches!(record, Record::Event(_)));
	}

	#[test]
	fn mark_failed_keeps_record_for_retry() {
		let registry = Registry::new();
		registry.append_hit(None);
		registry.mark_failed(0);

		assert_eq!(registry.hits()[0].state, RegistrationState::Failed);
		assert!(registry.has_unregistered());
		assert!(registry.next_needing_registration(0).is_some());
	}

	#[test]
	fn demote_resets_failed_but_not_registered() {
		let registry = Registry::new();
		registry.append_hit(None);
		registry.append_hit(None);
		registry.mark_registered(0);
		registry.mark_failed(1);

		registry.demote_non_registered();

		let hits = registry.hits();
		assert_eq!(hits[0].state, RegistrationState::Registered);
		assert_eq!(hits[1].state, RegistrationState::Pending);
	}

	#[test]
	fn next_needing_registration_skips_settled_prefix() {
		let registry = Registry::new();
		registry.append_hit(None);
		registry.append_hit(None);
		registry.mark_registered(0);

		let (index, _) = registry.next_needing_registration(0).unwrap();
		assert_eq!(index, 1);
		assert!(registry.next_needing_registration(2).is_none());
	}

	#[test]
	fn from_records_restores_interleaved_order() {
		let registry = Registry::new();
		registry.append_hit(Some("a".to_string()));
		registry.append_event(Event::new("k", "v", None).unwrap());
		registry.append_hit(Some("b".to_string()));

		let restored = Registry::from_records(registry.hits(), registry.events());
		let records = restored.records.read().unwrap();
		assert!(matches!(records[0], Record::Hit(_)));
		assert!(matches!(records[1], Record::Event(_)));
		assert!(matches!(records[2], Record::Hit(_)));
	}

	#[test]
	fn contains_hit_finds_appended_hits() {
		let registry = Registry::new();
		let hit = registry.append_hit(None);
		assert!(registry.contains_hit(hit.id));
		assert!(!registry.contains_hit(HitId::new()));
	}

	proptest::proptest! {
		// Whatever interleaving of appends and registrations happens, the
		// non-registered view stays an ordered subset of the full view.
		#[test]
		fn non_registered_is_always_ordered_subset(
			appends in 1..20usize,
			registered in proptest::collection::vec(proptest::bool::ANY, 20),
		) {
			let registry = Registry::new();
			for _ in 0..appends {
				registry.append_hit(None);
			}
			for (i, mark) in registered.iter().take(appends).enumerate() {
				if *mark {
					registry.mark_registered(i);
				}
			}

			let all: Vec<_> = registry.hits().iter().map(|h| h.id).collect();
			let non_registered: Vec<_> =
				registry.non_registered_hits().iter().map(|h| h.id).collect();

			// Subset check that also verifies relative order.
			let mut cursor = all.iter();
			for id in &non_registered {
				proptest::prop_assert!(cursor.any(|candidate| candidate == id));
			}
			let expected = appends - registered.iter().take(appends).filter(|m| **m).count();
			proptest::prop_assert_eq!(non_registered.len(), expected);
		}
	}
}
