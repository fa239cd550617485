//! IBC fee weight stubs.
//!
//! These are placeholder weights. Real weights should be determined through
//! benchmarking using the `runtime-benchmarks` feature.

use frame_support::weights::Weight;

// =========================================================
// Weight Info Trait
// =========================================================

pub trait WeightInfo {
    // Registry
    fn register_counterparty_address() -> Weight;

    // Escrow
    fn pay_packet_fee() -> Weight;
    fn pay_packet_fee_async() -> Weight;

    // Administration
    // TODO: take the number of deferred resolutions once replay is benchmarked per packet.
    fn unlock_fee_module() -> Weight;
}

// =========================================================
// Default Stub Implementation
// =========================================================

// Placeholder until the pallet is benchmarked against a real runtime.
impl WeightInfo for () {
    fn register_counterparty_address() -> Weight {
        Weight::from_parts(10_000, 0)
    }

    fn pay_packet_fee() -> Weight {
        Weight::from_parts(25_000, 0)
    }

    fn pay_packet_fee_async() -> Weight {
        Weight::from_parts(25_000, 0)
    }

    fn unlock_fee_module() -> Weight {
        Weight::from_parts(50_000, 0)
    }
}
