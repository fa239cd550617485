//! IBC fee pallet benchmarks.

#![cfg(feature = "runtime-benchmarks")]

use super::*;
use crate::traits::BenchmarkHelper;
use crate::types::{Coin, Coins, Fee, PacketFee, PacketId, TerminalEvent};
use alloc::{vec, vec::Vec};
use frame_benchmarking::v2::*;
use frame_support::traits::EnsureOrigin;
use frame_system::RawOrigin;

const PORT: &[u8] = b"transfer";
const CHANNEL: &[u8] = b"channel-0";

fn coins<T: Config>(amount: u32) -> Coins<T> {
    let coin = Coin {
        asset: T::BenchmarkHelper::fee_asset(),
        amount: T::Balance::from(amount),
    };
    Coins::<T>::truncate_from(vec![coin])
}

fn fee<T: Config>() -> Fee<T> {
    Fee::new(coins::<T>(1_000), coins::<T>(500), coins::<T>(300))
}

/// Fee-enable the benchmark channel and fund `payer`.
fn setup<T: Config>(payer: &T::AccountId) -> Result<(), BenchmarkError> {
    let port_id = types::port_id(PORT.to_vec()).ok_or(BenchmarkError::Weightless)?;
    let channel_id = types::channel_id(CHANNEL.to_vec()).ok_or(BenchmarkError::Weightless)?;
    FeeEnabledChannels::<T>::insert(port_id, channel_id, ());
    T::BenchmarkHelper::fund(
        T::BenchmarkHelper::fee_asset(),
        payer,
        T::Balance::from(1_000_000u32),
    );
    Ok(())
}

fn relayers<T: Config>() -> Vec<T::AccountId> {
    (0..T::MaxRelayers::get())
        .map(|i| account("relayer", i, 0))
        .collect()
}

#[benchmarks]
mod benchmarks {
    use super::*;

    #[benchmark]
    fn register_counterparty_address() -> Result<(), BenchmarkError> {
        let relayer: T::AccountId = whitelisted_caller();
        let counterparty: T::AccountId = account("counterparty", 0, 0);

        #[extrinsic_call]
        _(
            RawOrigin::Signed(relayer.clone()),
            CHANNEL.to_vec(),
            counterparty.clone(),
        );

        let channel_id = types::channel_id(CHANNEL.to_vec()).ok_or(BenchmarkError::Weightless)?;
        assert_eq!(
            CounterpartyAddresses::<T>::get(channel_id, relayer),
            Some(counterparty)
        );
        Ok(())
    }

    /// Allow-list at capacity.
    #[benchmark]
    fn pay_packet_fee() -> Result<(), BenchmarkError> {
        let payer: T::AccountId = whitelisted_caller();
        setup::<T>(&payer)?;

        #[extrinsic_call]
        _(
            RawOrigin::Signed(payer),
            PORT.to_vec(),
            CHANNEL.to_vec(),
            fee::<T>(),
            relayers::<T>(),
        );

        assert_eq!(Pallet::<T>::incentivized_packets().len(), 1);
        Ok(())
    }

    #[benchmark]
    fn pay_packet_fee_async() -> Result<(), BenchmarkError> {
        let payer: T::AccountId = whitelisted_caller();
        setup::<T>(&payer)?;
        let packet_id = PacketId::new(
            types::port_id(PORT.to_vec()).ok_or(BenchmarkError::Weightless)?,
            types::channel_id(CHANNEL.to_vec()).ok_or(BenchmarkError::Weightless)?,
            1,
        );

        #[extrinsic_call]
        _(
            RawOrigin::Signed(payer),
            packet_id.clone(),
            fee::<T>(),
            relayers::<T>(),
        );

        assert!(Pallet::<T>::incentivized_packet(&packet_id).is_some());
        Ok(())
    }

    /// One deferred abandonment of a packet carrying the maximum number of fees.
    #[benchmark]
    fn unlock_fee_module() -> Result<(), BenchmarkError> {
        let payer: T::AccountId = whitelisted_caller();
        setup::<T>(&payer)?;
        let packet_id = PacketId::new(
            types::port_id(PORT.to_vec()).ok_or(BenchmarkError::Weightless)?,
            types::channel_id(CHANNEL.to_vec()).ok_or(BenchmarkError::Weightless)?,
            1,
        );
        for _ in 0..T::MaxFeesPerPacket::get() {
            let packet_fee = PacketFee {
                fee: fee::<T>(),
                refund_address: payer.clone(),
                relayers: Default::default(),
            };
            Pallet::<T>::escrow_packet_fee(&packet_id, packet_fee)
                .map_err(|_| BenchmarkError::Weightless)?;
        }
        FeeModuleLocked::<T>::put(true);
        Pallet::<T>::resolve_packet(&packet_id, TerminalEvent::Abandoned);

        let origin =
            T::AdminOrigin::try_successful_origin().map_err(|_| BenchmarkError::Weightless)?;

        #[extrinsic_call]
        _(origin as T::RuntimeOrigin);

        assert!(!Pallet::<T>::is_locked());
        assert!(Pallet::<T>::is_resolved(&packet_id));
        Ok(())
    }

    impl_benchmark_test_suite!(
        Pallet,
        crate::tests::mock::new_test_ext(),
        crate::tests::mock::Test
    );
}
