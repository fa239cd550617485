//! Counterparty address registry.
//!
//! A relayer declares, per channel, the address it wants to be paid at for
//! packets it delivers. The source chain looks it up when the packet's
//! acknowledgement comes back.

use crate::{pallet::*, types::ChannelId, LOG_TARGET};
use frame_support::pallet_prelude::*;

impl<T: Config> Pallet<T> {
    /// Insert or overwrite the counterparty address for `(channel_id, relayer)`.
    pub fn do_register_counterparty_address(
        channel_id: ChannelId,
        relayer: T::AccountId,
        counterparty_address: T::AccountId,
    ) -> DispatchResult {
        ensure!(
            !Self::is_blocked_address(&counterparty_address),
            Error::<T>::InvalidAddress
        );

        CounterpartyAddresses::<T>::insert(&channel_id, &relayer, &counterparty_address);

        log::debug!(
            target: LOG_TARGET,
            "relayer {:?} registered counterparty address {:?}",
            relayer,
            counterparty_address,
        );

        Self::deposit_event(Event::CounterpartyAddressRegistered {
            channel_id,
            relayer,
            counterparty_address,
        });

        Ok(())
    }

    /// Registered payout address of `relayer` on `channel_id`.
    pub fn counterparty_address(
        channel_id: &ChannelId,
        relayer: &T::AccountId,
    ) -> Result<T::AccountId, Error<T>> {
        CounterpartyAddresses::<T>::get(channel_id, relayer).ok_or(Error::<T>::RelayerNotRegistered)
    }
}
