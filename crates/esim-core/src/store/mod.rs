// # Fulfillment Store Implementations
//
// This module provides implementations of the FulfillmentStore trait.

pub mod memory;

pub use memory::MemoryFulfillmentStore;
