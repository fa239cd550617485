//! IBC fee traits and interfaces.
//!
//! Everything the fee pallet needs from outside itself comes through one of
//! these handles: balances, transport state, and the wrapped application.

use crate::types::{AppAcknowledgement, AppVersion, ChannelId, PacketId, PortId, Sequence};
use frame_support::pallet_prelude::*;

// =========================================================
// Ledger
// =========================================================

/// Balance primitive for every asset a fee may be denominated in.
///
/// `transfer` must either move the full amount or fail without side effects.
pub trait FeeLedger<AccountId, AssetId, Balance> {
    /// Spendable balance of `who` in `asset`.
    fn balance(asset: AssetId, who: &AccountId) -> Balance;

    /// Move `amount` of `asset` from `from` to `to`.
    fn transfer(asset: AssetId, from: &AccountId, to: &AccountId, amount: Balance)
        -> DispatchResult;
}

// =========================================================
// Transport
// =========================================================

/// Read-only view of the packet transport.
pub trait ChannelInspector {
    /// Sequence the next packet sent on this channel will carry, or `None` if
    /// the channel does not exist.
    fn next_sequence_send(port_id: &PortId, channel_id: &ChannelId) -> Option<Sequence>;

    /// Whether the packet has been sent and is still awaiting ack or timeout.
    fn has_packet_commitment(packet_id: &PacketId) -> bool;
}

// =========================================================
// Wrapped application
// =========================================================

/// Packet callbacks of the application the fee middleware sits on top of.
pub trait PacketApp<AccountId> {
    /// Negotiate the application's own version during the channel handshake.
    fn on_chan_open(
        port_id: &PortId,
        channel_id: &ChannelId,
        version: &AppVersion,
    ) -> Result<AppVersion, DispatchError>;

    fn on_chan_close(port_id: &PortId, channel_id: &ChannelId) -> DispatchResult;

    fn on_send_packet(packet_id: &PacketId, data: &[u8]) -> DispatchResult;

    /// Process a received packet. `None` means the acknowledgement will be
    /// written asynchronously.
    fn on_recv_packet(
        packet_id: &PacketId,
        data: &[u8],
        relayer: &AccountId,
    ) -> Option<AppAcknowledgement>;

    fn on_acknowledgement_packet(
        packet_id: &PacketId,
        acknowledgement: &AppAcknowledgement,
        relayer: &AccountId,
    ) -> DispatchResult;

    fn on_timeout_packet(packet_id: &PacketId, relayer: &AccountId) -> DispatchResult;
}

/// No-op application: accepts every version and callback.
impl<AccountId> PacketApp<AccountId> for () {
    fn on_chan_open(
        _port_id: &PortId,
        _channel_id: &ChannelId,
        version: &AppVersion,
    ) -> Result<AppVersion, DispatchError> {
        Ok(version.clone())
    }

    fn on_chan_close(_port_id: &PortId, _channel_id: &ChannelId) -> DispatchResult {
        Ok(())
    }

    fn on_send_packet(_packet_id: &PacketId, _data: &[u8]) -> DispatchResult {
        Ok(())
    }

    fn on_recv_packet(
        _packet_id: &PacketId,
        _data: &[u8],
        _relayer: &AccountId,
    ) -> Option<AppAcknowledgement> {
        Some(AppAcknowledgement {
            success: true,
            result: Default::default(),
        })
    }

    fn on_acknowledgement_packet(
        _packet_id: &PacketId,
        _acknowledgement: &AppAcknowledgement,
        _relayer: &AccountId,
    ) -> DispatchResult {
        Ok(())
    }

    fn on_timeout_packet(_packet_id: &PacketId, _relayer: &AccountId) -> DispatchResult {
        Ok(())
    }
}

// =========================================================
// Benchmarking
// =========================================================

/// Funds accounts for benchmarks.
#[cfg(feature = "runtime-benchmarks")]
pub trait BenchmarkHelper<AccountId, AssetId, Balance> {
    /// Asset to denominate benchmark fees in.
    fn fee_asset() -> AssetId;

    /// Credit `who` with `amount` of `asset`.
    fn fund(asset: AssetId, who: &AccountId, amount: Balance);
}
