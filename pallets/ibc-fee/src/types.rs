//! IBC fee types and data structures.

use super::{Config, Error};
use alloc::{collections::btree_map::BTreeMap, vec::Vec};
use codec::{Decode, Encode, MaxEncodedLen};
use frame_support::pallet_prelude::*;
use sp_runtime::{
    traits::{CheckedAdd, Zero},
    ArithmeticError,
};

// =========================================================
// Identifiers
// =========================================================

/// Upper bound on any ICS-24 identifier stored by this pallet.
pub const MAX_IDENTIFIER_LEN: u32 = 128;

/// Maximum byte length of an application acknowledgement payload.
pub const MAX_ACK_LEN: u32 = 1024;

/// Maximum byte length of an application channel version string.
pub const MAX_VERSION_LEN: u32 = 64;

pub type Sequence = u64;
pub type Identifier = BoundedVec<u8, ConstU32<MAX_IDENTIFIER_LEN>>;
pub type PortId = Identifier;
pub type ChannelId = Identifier;
pub type AppVersion = BoundedVec<u8, ConstU32<MAX_VERSION_LEN>>;
pub type AckData = BoundedVec<u8, ConstU32<MAX_ACK_LEN>>;

/// Storage prefix shared by every per-packet map.
pub type ChannelKey = (PortId, ChannelId);

const PORT_ID_LEN: (usize, usize) = (2, 128);
const CHANNEL_ID_LEN: (usize, usize) = (8, 64);

fn is_valid_identifier(id: &[u8], (min, max): (usize, usize)) -> bool {
    (min..=max).contains(&id.len())
        && id.iter().all(|c| {
            c.is_ascii_alphanumeric()
                || matches!(c, b'.' | b'_' | b'+' | b'-' | b'#' | b'[' | b']' | b'<' | b'>')
        })
}

/// Parse a raw port identifier, enforcing the ICS-24 character set and length.
pub fn port_id(raw: Vec<u8>) -> Option<PortId> {
    if !is_valid_identifier(&raw, PORT_ID_LEN) {
        return None;
    }
    raw.try_into().ok()
}

/// Parse a raw channel identifier, enforcing the ICS-24 character set and length.
pub fn channel_id(raw: Vec<u8>) -> Option<ChannelId> {
    if !is_valid_identifier(&raw, CHANNEL_ID_LEN) {
        return None;
    }
    raw.try_into().ok()
}

/// Unique identifier of one packet instance on one channel.
#[derive(
    Clone,
    Encode,
    Decode,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
    RuntimeDebug,
    TypeInfo,
    MaxEncodedLen,
    codec::DecodeWithMemTracking,
)]
pub struct PacketId {
    pub port_id: PortId,
    pub channel_id: ChannelId,
    pub sequence: Sequence,
}

impl PacketId {
    pub fn new(port_id: PortId, channel_id: ChannelId, sequence: Sequence) -> Self {
        Self {
            port_id,
            channel_id,
            sequence,
        }
    }

    /// Storage prefix under which this packet's entries live.
    pub fn channel_key(&self) -> ChannelKey {
        (self.port_id.clone(), self.channel_id.clone())
    }

    pub fn is_well_formed(&self) -> bool {
        is_valid_identifier(&self.port_id, PORT_ID_LEN)
            && is_valid_identifier(&self.channel_id, CHANNEL_ID_LEN)
    }
}

// =========================================================
// Amounts
// =========================================================

/// A single-asset amount.
#[derive(
    Clone,
    Encode,
    Decode,
    Eq,
    PartialEq,
    RuntimeDebug,
    TypeInfo,
    MaxEncodedLen,
    codec::DecodeWithMemTracking,
)]
pub struct Coin<AssetId, Balance> {
    pub asset: AssetId,
    pub amount: Balance,
}

pub type CoinOf<T> = Coin<<T as Config>::AssetId, <T as Config>::Balance>;

/// A multi-asset amount: at most one entry per asset, every amount positive.
pub type Coins<T> = BoundedVec<CoinOf<T>, <T as Config>::MaxFeeAssets>;

/// Per-asset running totals.
pub type CoinTotals<T> = BTreeMap<<T as Config>::AssetId, <T as Config>::Balance>;

fn coins_are_valid<T: Config>(coins: &[CoinOf<T>]) -> bool {
    let mut seen = alloc::collections::btree_set::BTreeSet::new();
    coins
        .iter()
        .all(|coin| !coin.amount.is_zero() && seen.insert(coin.asset))
}

/// Add `coins` into `totals`, failing on overflow.
pub fn accumulate<T: Config>(
    totals: &mut CoinTotals<T>,
    coins: &[CoinOf<T>],
) -> Result<(), ArithmeticError> {
    for coin in coins {
        let entry = totals.entry(coin.asset).or_default();
        *entry = entry
            .checked_add(&coin.amount)
            .ok_or(ArithmeticError::Overflow)?;
    }
    Ok(())
}

/// Flatten totals into a list of coins ordered by asset.
pub fn into_coins<T: Config>(totals: CoinTotals<T>) -> Vec<CoinOf<T>> {
    totals
        .into_iter()
        .map(|(asset, amount)| Coin { asset, amount })
        .collect()
}

// =========================================================
// Fee
// =========================================================

/// Which of the three fee components a payout or refund belongs to.
#[derive(
    Clone,
    Copy,
    Encode,
    Decode,
    Eq,
    PartialEq,
    RuntimeDebug,
    TypeInfo,
    MaxEncodedLen,
    codec::DecodeWithMemTracking,
)]
pub enum FeeComponent {
    /// Paid to the forward relayer for delivering the packet.
    Recv,
    /// Paid to the reverse relayer for delivering the acknowledgement.
    Ack,
    /// Paid to the reverse relayer for delivering a timeout proof.
    Timeout,
}

/// The three independent amounts a payer escrows against a packet.
#[derive(
    Encode,
    Decode,
    CloneNoBound,
    EqNoBound,
    PartialEqNoBound,
    RuntimeDebugNoBound,
    TypeInfo,
    MaxEncodedLen,
)]
#[scale_info(skip_type_params(T))]
pub struct Fee<T: Config> {
    pub recv_fee: Coins<T>,
    pub ack_fee: Coins<T>,
    pub timeout_fee: Coins<T>,
}

impl<T: Config> codec::DecodeWithMemTracking for Fee<T> {}

impl<T: Config> Fee<T> {
    pub fn new(recv_fee: Coins<T>, ack_fee: Coins<T>, timeout_fee: Coins<T>) -> Self {
        Self {
            recv_fee,
            ack_fee,
            timeout_fee,
        }
    }

    pub fn component(&self, component: FeeComponent) -> &Coins<T> {
        match component {
            FeeComponent::Recv => &self.recv_fee,
            FeeComponent::Ack => &self.ack_fee,
            FeeComponent::Timeout => &self.timeout_fee,
        }
    }

    /// A fee is valid when every component is well formed and at least one is non-empty.
    pub fn validate(&self) -> Result<(), Error<T>> {
        let components = [&self.recv_fee, &self.ack_fee, &self.timeout_fee];
        ensure!(
            components.iter().all(|c| coins_are_valid::<T>(c)),
            Error::<T>::InvalidFee
        );
        ensure!(
            components.iter().any(|c| !c.is_empty()),
            Error::<T>::InvalidFee
        );
        Ok(())
    }

    /// Sum of all three components, per asset.
    pub fn total(&self) -> Result<CoinTotals<T>, ArithmeticError> {
        let mut totals = CoinTotals::<T>::new();
        accumulate::<T>(&mut totals, &self.recv_fee)?;
        accumulate::<T>(&mut totals, &self.ack_fee)?;
        accumulate::<T>(&mut totals, &self.timeout_fee)?;
        Ok(totals)
    }
}

/// A fee escrowed by one payer against one packet. Immutable once stored.
#[derive(
    Encode,
    Decode,
    CloneNoBound,
    EqNoBound,
    PartialEqNoBound,
    RuntimeDebugNoBound,
    TypeInfo,
    MaxEncodedLen,
)]
#[scale_info(skip_type_params(T))]
pub struct PacketFee<T: Config> {
    pub fee: Fee<T>,
    /// Payer; receives every refunded component.
    pub refund_address: T::AccountId,
    /// Relayers allowed to be paid. Empty means any relayer.
    pub relayers: BoundedVec<T::AccountId, T::MaxRelayers>,
}

impl<T: Config> PacketFee<T> {
    /// Whether `relayer` may be paid out of this fee.
    pub fn permits(&self, relayer: Option<&T::AccountId>) -> bool {
        if self.relayers.is_empty() {
            return true;
        }
        relayer.map_or(false, |r| self.relayers.contains(r))
    }
}

/// All fees attached to one packet, in insertion order.
#[derive(CloneNoBound, EqNoBound, PartialEqNoBound, RuntimeDebugNoBound)]
pub struct IdentifiedPacketFees<T: Config> {
    pub packet_id: PacketId,
    pub packet_fees: Vec<PacketFee<T>>,
}

// =========================================================
// Resolution
// =========================================================

/// The terminal event that resolved a packet's fees.
#[derive(
    Clone,
    Copy,
    Encode,
    Decode,
    Eq,
    PartialEq,
    RuntimeDebug,
    TypeInfo,
    MaxEncodedLen,
    codec::DecodeWithMemTracking,
)]
pub enum ResolutionOutcome {
    Acknowledged,
    TimedOut,
    Abandoned,
}

#[derive(Clone, Encode, Decode, Eq, PartialEq, RuntimeDebug, TypeInfo, MaxEncodedLen)]
pub struct ResolutionRecord<BlockNumber> {
    pub outcome: ResolutionOutcome,
    pub resolved_at: BlockNumber,
}

/// Fee state of a packet.
#[derive(Clone, Copy, Eq, PartialEq, RuntimeDebug)]
pub enum PacketFeeState {
    /// No fee has been escrowed yet.
    Unincentivized,
    /// At least one fee is held in escrow.
    Escrowed,
    /// Terminal. Every fee has been paid out or refunded.
    Resolved(ResolutionOutcome),
}

/// A terminal transport event, carrying the relayer identities distribution needs.
///
/// Stored while the fee module is locked so the resolution can be replayed.
#[derive(Clone, Encode, Decode, Eq, PartialEq, RuntimeDebug, TypeInfo, MaxEncodedLen)]
pub enum TerminalEvent<AccountId> {
    Acknowledged {
        /// Relayer that delivered the packet on the destination chain, if known.
        forward_relayer: Option<AccountId>,
        /// Signer that submitted the acknowledgement here.
        reverse_relayer: AccountId,
    },
    TimedOut {
        /// Signer that submitted the timeout proof here.
        reverse_relayer: AccountId,
    },
    Abandoned,
}

impl<AccountId> TerminalEvent<AccountId> {
    pub fn outcome(&self) -> ResolutionOutcome {
        match self {
            Self::Acknowledged { .. } => ResolutionOutcome::Acknowledged,
            Self::TimedOut { .. } => ResolutionOutcome::TimedOut,
            Self::Abandoned => ResolutionOutcome::Abandoned,
        }
    }
}

// =========================================================
// Channel versions and acknowledgements
// =========================================================

/// Channel version negotiated during the handshake.
#[derive(Clone, Encode, Decode, Eq, PartialEq, RuntimeDebug, TypeInfo, MaxEncodedLen)]
pub enum ChannelVersion {
    /// Fee middleware enabled on top of the wrapped application version.
    Incentivized(AppVersion),
    /// Bare application version; fees are not tracked on this channel.
    Plain(AppVersion),
}

impl ChannelVersion {
    pub fn app_version(&self) -> &AppVersion {
        match self {
            Self::Incentivized(v) | Self::Plain(v) => v,
        }
    }

    pub fn is_incentivized(&self) -> bool {
        matches!(self, Self::Incentivized(_))
    }
}

/// Acknowledgement produced by the wrapped application.
#[derive(Clone, Encode, Decode, Eq, PartialEq, RuntimeDebug, TypeInfo, MaxEncodedLen)]
pub struct AppAcknowledgement {
    pub success: bool,
    pub result: AckData,
}

/// Acknowledgement as written on a fee-enabled channel.
#[derive(Clone, Encode, Decode, Eq, PartialEq, RuntimeDebug, TypeInfo, MaxEncodedLen)]
pub struct IncentivizedAcknowledgement<AccountId> {
    pub app_acknowledgement: AppAcknowledgement,
    /// Relayer that submitted the packet on the destination chain.
    pub forward_relayer: Option<AccountId>,
}

impl<AccountId> IncentivizedAcknowledgement<AccountId> {
    pub fn underlying_app_success(&self) -> bool {
        self.app_acknowledgement.success
    }
}

#[derive(Clone, Encode, Decode, Eq, PartialEq, RuntimeDebug, TypeInfo, MaxEncodedLen)]
pub enum Acknowledgement<AccountId> {
    Incentivized(IncentivizedAcknowledgement<AccountId>),
    Plain(AppAcknowledgement),
}
