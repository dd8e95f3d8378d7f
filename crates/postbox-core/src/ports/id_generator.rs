//! IdGenerator port - mints poll-cycle ids.
//!
//! # Implementation
//! - **UlidGenerator**: ULID whose timestamp part comes from a [`Clock`]

use crate::domain::CycleId;
use crate::ports::Clock;
use ulid::Ulid;

pub trait IdGenerator: Send + Sync {
    fn generate_cycle_id(&self) -> CycleId;
}

/// ULID-based generator.
///
/// Using the injected clock keeps the timestamp part deterministic under
/// `FixedClock`; the random part still differs per id.
pub struct UlidGenerator<C> {
    clock: C,
}

impl<C: Clock> UlidGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }
}

impl<C: Clock> IdGenerator for UlidGenerator<C> {
    fn generate_cycle_id(&self) -> CycleId {
        let timestamp_ms = self.clock.now().timestamp_millis() as u64;
        let ulid = Ulid::from_parts(timestamp_ms, rand::random());
        CycleId::from(ulid)
    }
}
