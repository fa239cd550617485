//! Fee distribution: resolving a packet's escrowed fees on a terminal event.
//!
//! A component that cannot be paid to its relayer is refunded to the payer
//! instead. Each packet settles in one storage layer: if a refund itself
//! fails, or escrow cannot cover the fees, nothing moves, the terminal event
//! is deferred and the module locks. `unlock_fee_module` replays deferred
//! events, so every packet still reaches Resolved.

use crate::{
    pallet::*,
    types::{
        ChannelId, FeeComponent, PacketFee, PacketId, PortId, ResolutionRecord, TerminalEvent,
    },
    LOG_TARGET,
};
use alloc::vec::Vec;
use frame_support::storage::with_storage_layer;
use sp_runtime::DispatchResult;

impl<T: Config> Pallet<T> {
    /// Settle every fee escrowed against `packet_id` according to `event`.
    ///
    /// Fees are processed in insertion order, each against its own payer's
    /// allow-list. Calling this for an already resolved packet, or one with
    /// no fees, does nothing.
    pub fn resolve_packet(packet_id: &PacketId, event: TerminalEvent<T::AccountId>) {
        if Self::is_resolved(packet_id) {
            log::debug!(
                target: LOG_TARGET,
                "packet {:?} already resolved, ignoring {:?}",
                packet_id,
                event.outcome(),
            );
            return;
        }

        let key = packet_id.channel_key();
        let fees = FeesInEscrow::<T>::get(&key, packet_id.sequence);
        if fees.is_empty() {
            return;
        }

        if Self::is_locked() {
            log::warn!(
                target: LOG_TARGET,
                "fee module locked, deferring {:?} of packet {:?}",
                event.outcome(),
                packet_id,
            );
            DeferredResolutions::<T>::insert(&key, packet_id.sequence, event);
            return;
        }

        if !Self::escrow_covers(&fees) {
            log::error!(
                target: LOG_TARGET,
                "escrow cannot cover fees for packet {:?}, locking fee module",
                packet_id,
            );
            DeferredResolutions::<T>::insert(&key, packet_id.sequence, event);
            Self::lock_fee_module();
            return;
        }

        let outcome = event.outcome();
        let settled = with_storage_layer(|| -> DispatchResult {
            let fee_count = match &event {
                TerminalEvent::Acknowledged {
                    forward_relayer,
                    reverse_relayer,
                } => {
                    FeesInEscrow::<T>::remove(&key, packet_id.sequence);
                    for packet_fee in fees.iter() {
                        Self::distribute_on_acknowledgement(
                            packet_id,
                            packet_fee,
                            forward_relayer.as_ref(),
                            reverse_relayer,
                        )?;
                    }
                    fees.len() as u32
                }
                TerminalEvent::TimedOut { reverse_relayer } => {
                    FeesInEscrow::<T>::remove(&key, packet_id.sequence);
                    for packet_fee in fees.iter() {
                        Self::distribute_on_timeout(packet_id, packet_fee, reverse_relayer)?;
                    }
                    fees.len() as u32
                }
                TerminalEvent::Abandoned => Self::refund_packet_fees(packet_id)?,
            };

            DeferredResolutions::<T>::remove(&key, packet_id.sequence);
            ResolvedPackets::<T>::insert(
                &key,
                packet_id.sequence,
                ResolutionRecord {
                    outcome,
                    resolved_at: frame_system::Pallet::<T>::block_number(),
                },
            );

            Self::deposit_event(Event::PacketFeesResolved {
                packet_id: packet_id.clone(),
                outcome,
                fee_count,
            });
            Ok(())
        });

        if let Err(e) = settled {
            log::error!(
                target: LOG_TARGET,
                "settling packet {:?} failed: {:?}, deferring and locking fee module",
                packet_id,
                e,
            );
            DeferredResolutions::<T>::insert(&key, packet_id.sequence, event);
            Self::lock_fee_module();
        }
    }

    /// Refund every pending packet on a channel. Returns the number of packets resolved.
    pub fn abandon_channel(port_id: &PortId, channel_id: &ChannelId) -> u32 {
        let key = (port_id.clone(), channel_id.clone());
        let pending: Vec<_> = FeesInEscrow::<T>::iter_key_prefix(&key).collect();

        let mut resolved = 0u32;
        for sequence in pending {
            let packet_id = PacketId::new(port_id.clone(), channel_id.clone(), sequence);
            Self::resolve_packet(&packet_id, TerminalEvent::Abandoned);
            if Self::is_resolved(&packet_id) {
                resolved = resolved.saturating_add(1);
            }
        }

        log::debug!(
            target: LOG_TARGET,
            "abandoned {} incentivized packets on {:?}/{:?}",
            resolved,
            port_id,
            channel_id,
        );
        resolved
    }

    /// Re-run every deferred terminal event. Returns the number of packets resolved.
    pub(crate) fn replay_deferred_resolutions() -> u32 {
        let deferred: Vec<_> = DeferredResolutions::<T>::drain().collect();

        let mut resolved = 0u32;
        for ((port_id, channel_id), sequence, event) in deferred {
            let packet_id = PacketId::new(port_id, channel_id, sequence);
            Self::resolve_packet(&packet_id, event);
            if Self::is_resolved(&packet_id) {
                resolved = resolved.saturating_add(1);
            }
        }

        log::info!(
            target: LOG_TARGET,
            "replayed deferred resolutions, {} packets resolved",
            resolved,
        );
        resolved
    }

    fn distribute_on_acknowledgement(
        packet_id: &PacketId,
        packet_fee: &PacketFee<T>,
        forward_relayer: Option<&T::AccountId>,
        reverse_relayer: &T::AccountId,
    ) -> DispatchResult {
        if !packet_fee.permits(forward_relayer) && !packet_fee.permits(Some(reverse_relayer)) {
            log::debug!(
                target: LOG_TARGET,
                "no relayer of packet {:?} on allow-list of {:?}, refunding",
                packet_id,
                packet_fee.refund_address,
            );
            return Self::refund_packet_fee(packet_id, packet_fee);
        }

        let recv_payee = forward_relayer
            .and_then(|relayer| Self::counterparty_address(&packet_id.channel_id, relayer).ok());
        match recv_payee {
            Some(payee) => {
                Self::pay_component(packet_id, packet_fee, FeeComponent::Recv, &payee)?
            }
            None => {
                log::debug!(
                    target: LOG_TARGET,
                    "forward relayer {:?} of packet {:?} has no counterparty address, refunding recv fee",
                    forward_relayer,
                    packet_id,
                );
                Self::refund_component(packet_id, packet_fee, FeeComponent::Recv)?;
            }
        }

        Self::pay_component(packet_id, packet_fee, FeeComponent::Ack, reverse_relayer)?;
        Self::refund_component(packet_id, packet_fee, FeeComponent::Timeout)
    }

    fn distribute_on_timeout(
        packet_id: &PacketId,
        packet_fee: &PacketFee<T>,
        reverse_relayer: &T::AccountId,
    ) -> DispatchResult {
        Self::refund_component(packet_id, packet_fee, FeeComponent::Recv)?;
        Self::refund_component(packet_id, packet_fee, FeeComponent::Ack)?;

        if packet_fee.permits(Some(reverse_relayer)) {
            Self::pay_component(packet_id, packet_fee, FeeComponent::Timeout, reverse_relayer)
        } else {
            Self::refund_component(packet_id, packet_fee, FeeComponent::Timeout)
        }
    }

    /// Pay one component to `recipient`, refunding it to the payer if the payout fails.
    pub(crate) fn pay_component(
        packet_id: &PacketId,
        packet_fee: &PacketFee<T>,
        component: FeeComponent,
        recipient: &T::AccountId,
    ) -> DispatchResult {
        let amount = packet_fee.fee.component(component);
        if amount.is_empty() {
            return Ok(());
        }

        if Self::is_blocked_address(recipient) {
            log::warn!(
                target: LOG_TARGET,
                "recipient {:?} of {:?} fee for packet {:?} is blocked, refunding",
                recipient,
                component,
                packet_id,
            );
            return Self::refund_component(packet_id, packet_fee, component);
        }

        match Self::transfer_coins(&Self::escrow_account(), recipient, amount) {
            Ok(()) => {
                Self::deposit_event(Event::FeeDistributed {
                    packet_id: packet_id.clone(),
                    component,
                    recipient: recipient.clone(),
                    amount: amount.clone(),
                });
                Ok(())
            }
            Err(e) => {
                log::warn!(
                    target: LOG_TARGET,
                    "paying {:?} fee for packet {:?} to {:?} failed: {:?}, refunding",
                    component,
                    packet_id,
                    recipient,
                    e,
                );
                Self::refund_component(packet_id, packet_fee, component)
            }
        }
    }

    /// Return one component to the payer. A failed refund has nowhere left to
    /// go and aborts the packet's settlement.
    pub(crate) fn refund_component(
        packet_id: &PacketId,
        packet_fee: &PacketFee<T>,
        component: FeeComponent,
    ) -> DispatchResult {
        let amount = packet_fee.fee.component(component);
        if amount.is_empty() {
            return Ok(());
        }

        let payer = &packet_fee.refund_address;
        Self::transfer_coins(&Self::escrow_account(), payer, amount).inspect_err(|e| {
            log::error!(
                target: LOG_TARGET,
                "refunding {:?} fee for packet {:?} to {:?} failed: {:?}",
                component,
                packet_id,
                payer,
                e,
            );
        })?;

        Self::deposit_event(Event::FeeRefunded {
            packet_id: packet_id.clone(),
            component,
            payer: payer.clone(),
            amount: amount.clone(),
        });
        Ok(())
    }
}
