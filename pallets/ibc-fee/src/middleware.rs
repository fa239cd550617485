//! Packet lifecycle callbacks wrapping the application in `Config::App`.
//!
//! Every callback runs the application first. On fee-enabled channels the
//! settlement step then runs with the application's result as input, and
//! that result is handed back to the transport unchanged. Channels that did
//! not negotiate fees pass straight through to the application.

use crate::{
    pallet::*,
    traits::PacketApp,
    types::{
        Acknowledgement, AppAcknowledgement, ChannelId, ChannelVersion,
        IncentivizedAcknowledgement, PacketId, PortId, TerminalEvent,
    },
    LOG_TARGET,
};
use frame_support::{pallet_prelude::*, storage::with_storage_layer};

/// Outcome of the wrapped application's callback.
pub type AppResult = DispatchResult;

impl<T: Config> Pallet<T> {
    /// Channel handshake: negotiate the application version and record
    /// whether the channel carries fees.
    pub fn on_chan_open(
        port_id: &PortId,
        channel_id: &ChannelId,
        version: ChannelVersion,
    ) -> Result<ChannelVersion, DispatchError> {
        let app_version = T::App::on_chan_open(port_id, channel_id, version.app_version())?;

        if !version.is_incentivized() {
            return Ok(ChannelVersion::Plain(app_version));
        }

        FeeEnabledChannels::<T>::insert(port_id, channel_id, ());
        Self::deposit_event(Event::FeeEnabledChannel {
            port_id: port_id.clone(),
            channel_id: channel_id.clone(),
        });

        Ok(ChannelVersion::Incentivized(app_version))
    }

    /// Both ends must agree on whether the channel carries fees.
    pub fn on_chan_open_ack(
        port_id: &PortId,
        channel_id: &ChannelId,
        counterparty_version: &ChannelVersion,
    ) -> DispatchResult {
        ensure!(
            Self::is_fee_enabled(port_id, channel_id) == counterparty_version.is_incentivized(),
            Error::<T>::InvalidVersion
        );
        Ok(())
    }

    pub fn on_send_packet(packet_id: &PacketId, data: &[u8]) -> AppResult {
        T::App::on_send_packet(packet_id, data)
    }

    /// Destination side. Returns the acknowledgement to write, or `None` if
    /// the application will write it later through
    /// [`Pallet::write_acknowledgement`].
    pub fn on_recv_packet(
        packet_id: &PacketId,
        data: &[u8],
        relayer: &T::AccountId,
    ) -> Option<Acknowledgement<T::AccountId>> {
        let app_ack = T::App::on_recv_packet(packet_id, data, relayer);

        if !Self::is_fee_enabled(&packet_id.port_id, &packet_id.channel_id) {
            return app_ack.map(Acknowledgement::Plain);
        }

        match app_ack {
            Some(app_acknowledgement) => {
                Some(Acknowledgement::Incentivized(IncentivizedAcknowledgement {
                    app_acknowledgement,
                    forward_relayer: Some(relayer.clone()),
                }))
            }
            None => {
                ForwardRelayers::<T>::insert(
                    packet_id.channel_key(),
                    packet_id.sequence,
                    relayer,
                );
                None
            }
        }
    }

    /// Complete an asynchronous acknowledgement, attaching the relayer that
    /// delivered the packet.
    pub fn write_acknowledgement(
        packet_id: &PacketId,
        app_acknowledgement: AppAcknowledgement,
    ) -> Acknowledgement<T::AccountId> {
        if !Self::is_fee_enabled(&packet_id.port_id, &packet_id.channel_id) {
            return Acknowledgement::Plain(app_acknowledgement);
        }

        let forward_relayer =
            ForwardRelayers::<T>::take(packet_id.channel_key(), packet_id.sequence);
        Acknowledgement::Incentivized(IncentivizedAcknowledgement {
            app_acknowledgement,
            forward_relayer,
        })
    }

    /// Source side. The outer error rejects the acknowledgement before the
    /// application sees it. Otherwise fees are settled and the application's
    /// own result is returned.
    pub fn on_acknowledgement_packet(
        packet_id: &PacketId,
        acknowledgement: Acknowledgement<T::AccountId>,
        relayer: &T::AccountId,
    ) -> Result<AppResult, DispatchError> {
        if !Self::is_fee_enabled(&packet_id.port_id, &packet_id.channel_id) {
            let app_acknowledgement = match acknowledgement {
                Acknowledgement::Plain(ack) => ack,
                Acknowledgement::Incentivized(ack) => ack.app_acknowledgement,
            };
            return Ok(Self::run_app(|| {
                T::App::on_acknowledgement_packet(packet_id, &app_acknowledgement, relayer)
            }));
        }

        let Acknowledgement::Incentivized(ack) = acknowledgement else {
            return Err(Error::<T>::InvalidAcknowledgement.into());
        };

        let app_result = Self::run_app(|| {
            T::App::on_acknowledgement_packet(packet_id, &ack.app_acknowledgement, relayer)
        });

        Ok(Self::settle(
            packet_id,
            TerminalEvent::Acknowledged {
                forward_relayer: ack.forward_relayer,
                reverse_relayer: relayer.clone(),
            },
            app_result,
        ))
    }

    pub fn on_timeout_packet(packet_id: &PacketId, relayer: &T::AccountId) -> AppResult {
        let app_result = Self::run_app(|| T::App::on_timeout_packet(packet_id, relayer));

        if !Self::is_fee_enabled(&packet_id.port_id, &packet_id.channel_id) {
            return app_result;
        }

        Self::settle(
            packet_id,
            TerminalEvent::TimedOut {
                reverse_relayer: relayer.clone(),
            },
            app_result,
        )
    }

    /// Channel close. If the application refuses, the channel stays open and
    /// its fees stay escrowed. Otherwise every pending fee is refunded, or
    /// deferred until unlock if the module is locked.
    pub fn on_chan_close(port_id: &PortId, channel_id: &ChannelId) -> DispatchResult {
        Self::run_app(|| T::App::on_chan_close(port_id, channel_id))?;

        if FeeEnabledChannels::<T>::take(port_id, channel_id).is_some() {
            Self::abandon_channel(port_id, channel_id);

            // Async acknowledgements that were never written.
            let key = (port_id.clone(), channel_id.clone());
            let _ = ForwardRelayers::<T>::clear_prefix(&key, u32::MAX, None);
        }
        Ok(())
    }

    /// Resolve the packet's fees after the application has run, passing its
    /// result through.
    pub fn settle(
        packet_id: &PacketId,
        event: TerminalEvent<T::AccountId>,
        app_result: AppResult,
    ) -> AppResult {
        if let Err(e) = app_result {
            log::debug!(
                target: LOG_TARGET,
                "application failed on packet {:?}: {:?}, settling fees anyway",
                packet_id,
                e,
            );
        }

        Self::resolve_packet(packet_id, event);
        app_result
    }

    /// Run an application callback so that a failure leaves no partial writes.
    fn run_app(f: impl FnOnce() -> DispatchResult) -> AppResult {
        with_storage_layer(f)
    }
}
