//! Read-only projections over fee state.

use crate::{
    pallet::*,
    types::{
        self, ChannelId, ChannelKey, CoinOf, CoinTotals, FeeComponent, IdentifiedPacketFees, PacketFee,
        PacketFeeState, PacketId, PortId,
    },
};
use alloc::vec::Vec;
use sp_runtime::traits::Saturating;

impl<T: Config> Pallet<T> {
    /// Every packet with fees in escrow.
    pub fn incentivized_packets() -> Vec<IdentifiedPacketFees<T>> {
        FeesInEscrow::<T>::iter()
            .map(|((port_id, channel_id), sequence, fees)| IdentifiedPacketFees {
                packet_id: PacketId::new(port_id, channel_id, sequence),
                packet_fees: fees.into_inner(),
            })
            .collect()
    }

    /// Packets with fees in escrow on one channel.
    pub fn incentivized_packets_for_channel(
        port_id: &PortId,
        channel_id: &ChannelId,
    ) -> Vec<IdentifiedPacketFees<T>> {
        let key: ChannelKey = (port_id.clone(), channel_id.clone());
        FeesInEscrow::<T>::iter_prefix(&key)
            .map(|(sequence, fees)| IdentifiedPacketFees {
                packet_id: PacketId::new(port_id.clone(), channel_id.clone(), sequence),
                packet_fees: fees.into_inner(),
            })
            .collect()
    }

    pub fn incentivized_packet(packet_id: &PacketId) -> Option<IdentifiedPacketFees<T>> {
        let fees = FeesInEscrow::<T>::get(packet_id.channel_key(), packet_id.sequence);
        if fees.is_empty() {
            return None;
        }
        Some(IdentifiedPacketFees {
            packet_id: packet_id.clone(),
            packet_fees: fees.into_inner(),
        })
    }

    pub fn total_recv_fees(packet_id: &PacketId) -> Vec<CoinOf<T>> {
        Self::total_component(packet_id, FeeComponent::Recv)
    }

    pub fn total_ack_fees(packet_id: &PacketId) -> Vec<CoinOf<T>> {
        Self::total_component(packet_id, FeeComponent::Ack)
    }

    pub fn total_timeout_fees(packet_id: &PacketId) -> Vec<CoinOf<T>> {
        Self::total_component(packet_id, FeeComponent::Timeout)
    }

    /// Everything held in escrow, per asset.
    pub fn total_escrowed() -> Vec<CoinOf<T>> {
        let mut totals = CoinTotals::<T>::new();
        for (_, _, fees) in FeesInEscrow::<T>::iter() {
            add_fees::<T>(&mut totals, fees.iter());
        }
        types::into_coins::<T>(totals)
    }

    /// Everything `payer` currently has in escrow, per asset.
    pub fn total_escrowed_by_payer(payer: &T::AccountId) -> Vec<CoinOf<T>> {
        let mut totals = CoinTotals::<T>::new();
        for (_, _, fees) in FeesInEscrow::<T>::iter() {
            add_fees::<T>(
                &mut totals,
                fees.iter().filter(|fee| fee.refund_address == *payer),
            );
        }
        types::into_coins::<T>(totals)
    }

    /// Everything escrowed against packets on one channel, per asset.
    pub fn total_escrowed_for_channel(port_id: &PortId, channel_id: &ChannelId) -> Vec<CoinOf<T>> {
        let key: ChannelKey = (port_id.clone(), channel_id.clone());
        let mut totals = CoinTotals::<T>::new();
        for (_, fees) in FeesInEscrow::<T>::iter_prefix(&key) {
            add_fees::<T>(&mut totals, fees.iter());
        }
        types::into_coins::<T>(totals)
    }

    pub fn fee_enabled_channels() -> Vec<(PortId, ChannelId)> {
        FeeEnabledChannels::<T>::iter_keys().collect()
    }

    pub fn is_fee_enabled(port_id: &PortId, channel_id: &ChannelId) -> bool {
        FeeEnabledChannels::<T>::contains_key(port_id, channel_id)
    }

    pub fn packet_state(packet_id: &PacketId) -> PacketFeeState {
        let key = packet_id.channel_key();
        if let Some(record) = ResolvedPackets::<T>::get(&key, packet_id.sequence) {
            return PacketFeeState::Resolved(record.outcome);
        }
        if FeesInEscrow::<T>::contains_key(&key, packet_id.sequence) {
            PacketFeeState::Escrowed
        } else {
            PacketFeeState::Unincentivized
        }
    }

    fn total_component(packet_id: &PacketId, component: FeeComponent) -> Vec<CoinOf<T>> {
        let mut totals = CoinTotals::<T>::new();
        for packet_fee in FeesInEscrow::<T>::get(packet_id.channel_key(), packet_id.sequence) {
            add_coins::<T>(&mut totals, packet_fee.fee.component(component));
        }
        types::into_coins::<T>(totals)
    }

    /// Escrow account holds exactly the unresolved fees, asset by asset.
    ///
    /// Every asset ever escrowed is checked, so funds left behind after their
    /// fees were cleared show up as a mismatch against a zero total.
    #[cfg(any(feature = "try-runtime", test))]
    pub fn do_try_state() -> frame_support::dispatch::DispatchResult {
        use crate::traits::FeeLedger;

        let mut tracked = CoinTotals::<T>::new();
        for (_, _, fees) in FeesInEscrow::<T>::iter() {
            frame_support::ensure!(!fees.is_empty(), "empty fee entry left in escrow");
            add_fees::<T>(&mut tracked, fees.iter());
        }

        let escrow = Self::escrow_account();
        for asset in tracked.keys() {
            frame_support::ensure!(
                EscrowedAssets::<T>::contains_key(asset),
                "escrowed fee in an unrecorded asset"
            );
        }
        for asset in EscrowedAssets::<T>::iter_keys() {
            let expected = tracked.get(&asset).copied().unwrap_or_default();
            frame_support::ensure!(
                T::Ledger::balance(asset, &escrow) == expected,
                "escrow balance does not match escrowed fees"
            );
        }

        for ((port_id, channel_id), sequence, _) in DeferredResolutions::<T>::iter() {
            let packet_id = PacketId::new(port_id, channel_id, sequence);
            frame_support::ensure!(
                Self::packet_state(&packet_id) == PacketFeeState::Escrowed,
                "deferred resolution for a packet without escrowed fees"
            );
        }
        frame_support::ensure!(
            Self::is_locked() || DeferredResolutions::<T>::iter().next().is_none(),
            "deferred resolutions left behind while unlocked"
        );
        Ok(())
    }
}

// Escrowed sums are bounded by each asset's issuance, so saturation never bites.
fn add_coins<T: Config>(totals: &mut CoinTotals<T>, coins: &[CoinOf<T>]) {
    for coin in coins {
        let entry = totals.entry(coin.asset).or_default();
        *entry = entry.saturating_add(coin.amount);
    }
}

fn add_fees<'a, T: Config + 'a>(
    totals: &mut CoinTotals<T>,
    fees: impl Iterator<Item = &'a PacketFee<T>>,
) {
    for packet_fee in fees {
        add_coins::<T>(totals, &packet_fee.fee.recv_fee);
        add_coins::<T>(totals, &packet_fee.fee.ack_fee);
        add_coins::<T>(totals, &packet_fee.fee.timeout_fee);
    }
}

