//! Tests for pallet-ibc-fee


mod test_lifecycle;
mod test_queries;
