//! Per-cycle retention of response and notification payloads
//!
//! Payloads live in two arenas that are emptied at the start of every update
//! cycle. Each clear moves the cache to a new generation; handles carry the
//! generation they were issued in, so a handle from an earlier cycle is
//! detected and reported instead of resolving to whatever now occupies its
//! slot. Generations come from one process-wide counter, so a handle from a
//! shut down client never matches a cycle of a later one.

use std::sync::atomic::{AtomicU64, Ordering};

use psmove_protocol::{Notification, Response};

use crate::error::PayloadError;
use crate::message::{PayloadHandle, PayloadKind};

static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

fn next_generation() -> u64 {
    NEXT_GENERATION.fetch_add(1, Ordering::Relaxed)
}

#[derive(Debug)]
pub struct PayloadCache {
    generation: u64,
    responses: Vec<Response>,
    events: Vec<Notification>,
}

impl Default for PayloadCache {
    fn default() -> Self {
        Self {
            generation: next_generation(),
            responses: Vec::new(),
            events: Vec::new(),
        }
    }
}

impl PayloadCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn retain_response(&mut self, response: Response) -> PayloadHandle {
        let slot = self.responses.len() as u32;
        self.responses.push(response);
        PayloadHandle::new(PayloadKind::Response, self.generation, slot)
    }

    pub fn retain_event(&mut self, notification: Notification) -> PayloadHandle {
        let slot = self.events.len() as u32;
        self.events.push(notification);
        PayloadHandle::new(PayloadKind::Event, self.generation, slot)
    }

    pub fn response(&self, handle: PayloadHandle) -> Result<&Response, PayloadError> {
        let slot = self.check(handle, PayloadKind::Response)?;
        self.responses
            .get(slot)
            .ok_or(PayloadError::OutOfRange { slot: handle.slot() })
    }

    pub fn event(&self, handle: PayloadHandle) -> Result<&Notification, PayloadError> {
        let slot = self.check(handle, PayloadKind::Event)?;
        self.events
            .get(slot)
            .ok_or(PayloadError::OutOfRange { slot: handle.slot() })
    }

    fn check(&self, handle: PayloadHandle, expected: PayloadKind) -> Result<usize, PayloadError> {
        if handle.generation() != self.generation {
            return Err(PayloadError::Expired {
                handle_generation: handle.generation(),
                current_generation: self.generation,
            });
        }
        if handle.kind() != expected {
            return Err(PayloadError::WrongKind {
                expected,
                actual: handle.kind(),
            });
        }
        Ok(handle.slot() as usize)
    }

    /// Release everything retained and invalidate all outstanding handles
    pub fn clear(&mut self) {
        self.responses.clear();
        self.events.clear();
        self.generation = next_generation();
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn response_count(&self) -> usize {
        self.responses.len()
    }

    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.responses.is_empty() && self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use psmove_protocol::{NotificationType, ResultCode};

    #[test]
    fn test_retained_payloads_resolve() {
        let mut cache = PayloadCache::new();
        let first = cache.retain_response(Response::new(1, ResultCode::Ok));
        let second = cache.retain_response(Response::new(2, ResultCode::Error));
        let event = cache.retain_event(Notification::new(NotificationType::HmdListUpdated));

        assert_eq!(cache.response(first).unwrap().request_id, 1);
        assert_eq!(cache.response(second).unwrap().result_code, ResultCode::Error);
        assert_eq!(
            cache.event(event).unwrap().notification_type,
            NotificationType::HmdListUpdated
        );
    }

    #[test]
    fn test_clear_expires_handles() {
        let mut cache = PayloadCache::new();
        let handle = cache.retain_response(Response::new(1, ResultCode::Ok));
        cache.clear();

        // A new payload lands in the same slot; the old handle must not see it
        cache.retain_response(Response::new(2, ResultCode::Ok));
        assert_eq!(
            cache.response(handle).unwrap_err(),
            PayloadError::Expired {
                handle_generation: handle.generation(),
                current_generation: cache.generation(),
            }
        );
    }

    #[test]
    fn test_wrong_kind_rejected() {
        let mut cache = PayloadCache::new();
        let handle = cache.retain_event(Notification::new(NotificationType::TrackerListUpdated));

        assert_eq!(
            cache.response(handle).unwrap_err(),
            PayloadError::WrongKind {
                expected: PayloadKind::Response,
                actual: PayloadKind::Event,
            }
        );
    }

    #[test]
    fn test_out_of_range_slot() {
        let cache = PayloadCache::new();
        let forged = PayloadHandle::new(PayloadKind::Event, cache.generation(), 3);
        assert_eq!(
            cache.event(forged).unwrap_err(),
            PayloadError::OutOfRange { slot: 3 }
        );
    }

    #[test]
    fn test_counts() {
        let mut cache = PayloadCache::new();
        assert!(cache.is_empty());
        cache.retain_response(Response::new(1, ResultCode::Ok));
        cache.retain_event(Notification::new(NotificationType::ControllerListUpdated));
        assert_eq!((cache.response_count(), cache.event_count()), (1, 1));
        let before = cache.generation();
        cache.clear();
        assert!(cache.is_empty());
        assert!(cache.generation() > before);
    }

    #[test]
    fn test_handles_do_not_resolve_in_another_cache() {
        let mut first = PayloadCache::new();
        let handle = first.retain_event(Notification::new(NotificationType::TrackerListUpdated));

        let mut second = PayloadCache::new();
        second.retain_event(Notification::new(NotificationType::HmdListUpdated));

        assert_ne!(first.generation(), second.generation());
        assert!(matches!(
            second.event(handle),
            Err(PayloadError::Expired { .. })
        ));
    }
}
