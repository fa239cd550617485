//! Fee escrow: locking payer funds against packets and returning them.

use crate::{
    pallet::*,
    traits::FeeLedger,
    types::{self, CoinOf, CoinTotals, FeeComponent, PacketFee, PacketId},
    LOG_TARGET,
};
use frame_support::{pallet_prelude::*, storage::with_storage_layer, traits::Contains};
use sp_runtime::traits::AccountIdConversion;

impl<T: Config> Pallet<T> {
    /// Module-owned account holding every escrowed fee.
    pub fn escrow_account() -> T::AccountId {
        T::PalletId::get().into_account_truncating()
    }

    /// Addresses that may neither pay nor receive fees.
    pub fn is_blocked_address(who: &T::AccountId) -> bool {
        T::BlockedAddresses::contains(who) || *who == Self::escrow_account()
    }

    /// Escrow one payer's fee against a packet.
    ///
    /// Either the payer is debited and the fee appended to the packet, or
    /// nothing changes.
    pub fn escrow_packet_fee(packet_id: &PacketId, packet_fee: PacketFee<T>) -> DispatchResult {
        ensure!(!Self::is_locked(), Error::<T>::FeeModuleLocked);
        ensure!(
            !Self::is_resolved(packet_id),
            Error::<T>::PacketAlreadyResolved
        );
        ensure!(
            Self::is_fee_enabled(&packet_id.port_id, &packet_id.channel_id),
            Error::<T>::ChannelNotFeeEnabled
        );
        packet_fee.fee.validate()?;
        ensure!(
            !Self::is_blocked_address(&packet_fee.refund_address),
            Error::<T>::InvalidAddress
        );
        ensure!(
            !packet_fee.relayers.iter().any(Self::is_blocked_address),
            Error::<T>::InvalidAddress
        );

        let total = packet_fee.fee.total()?;
        let payer = packet_fee.refund_address.clone();
        let escrow = Self::escrow_account();

        with_storage_layer(|| -> DispatchResult {
            FeesInEscrow::<T>::try_mutate(
                packet_id.channel_key(),
                packet_id.sequence,
                |fees| {
                    fees.try_push(packet_fee)
                        .map_err(|_| Error::<T>::TooManyFeesForPacket)
                },
            )?;

            for (asset, amount) in total.iter() {
                ensure!(
                    T::Ledger::balance(*asset, &payer) >= *amount,
                    Error::<T>::InsufficientFunds
                );
                T::Ledger::transfer(*asset, &payer, &escrow, *amount)
                    .map_err(|_| Error::<T>::InsufficientFunds)?;
                EscrowedAssets::<T>::insert(asset, ());
            }
            Ok(())
        })?;

        log::debug!(
            target: LOG_TARGET,
            "escrowed fee for packet {:?} from {:?}",
            packet_id,
            payer,
        );

        Self::deposit_event(Event::IncentivizedPacket {
            packet_id: packet_id.clone(),
            payer,
            total_recv_fee: Self::total_recv_fees(packet_id),
            total_ack_fee: Self::total_ack_fees(packet_id),
            total_timeout_fee: Self::total_timeout_fees(packet_id),
        });

        Ok(())
    }

    /// Return every fee on the packet to its payer in full and clear the entry.
    ///
    /// Returns the number of fees refunded. If any refund fails nothing moves
    /// and the entry is kept.
    pub fn refund_packet_fees(packet_id: &PacketId) -> Result<u32, DispatchError> {
        with_storage_layer(|| -> Result<u32, DispatchError> {
            let fees = FeesInEscrow::<T>::take(packet_id.channel_key(), packet_id.sequence);
            for packet_fee in fees.iter() {
                Self::refund_packet_fee(packet_id, packet_fee)?;
            }
            Ok(fees.len() as u32)
        })
    }

    pub(crate) fn refund_packet_fee(
        packet_id: &PacketId,
        packet_fee: &PacketFee<T>,
    ) -> DispatchResult {
        for component in [FeeComponent::Recv, FeeComponent::Ack, FeeComponent::Timeout] {
            Self::refund_component(packet_id, packet_fee, component)?;
        }
        Ok(())
    }

    /// Whether escrow holds enough of every asset to settle `fees`.
    pub fn escrow_covers(fees: &[PacketFee<T>]) -> bool {
        let mut needed = CoinTotals::<T>::new();
        for packet_fee in fees {
            let fee = &packet_fee.fee;
            let summed = types::accumulate::<T>(&mut needed, &fee.recv_fee)
                .and_then(|_| types::accumulate::<T>(&mut needed, &fee.ack_fee))
                .and_then(|_| types::accumulate::<T>(&mut needed, &fee.timeout_fee));
            if summed.is_err() {
                return false;
            }
        }

        let escrow = Self::escrow_account();
        needed
            .iter()
            .all(|(asset, amount)| T::Ledger::balance(*asset, &escrow) >= *amount)
    }

    /// Move a multi-asset amount. All assets move or none do.
    pub(crate) fn transfer_coins(
        from: &T::AccountId,
        to: &T::AccountId,
        coins: &[CoinOf<T>],
    ) -> DispatchResult {
        with_storage_layer(|| -> DispatchResult {
            for coin in coins {
                T::Ledger::transfer(coin.asset, from, to, coin.amount)?;
            }
            Ok(())
        })
    }
}
