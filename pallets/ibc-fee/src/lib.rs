//! # IBC Fee Pallet
//!
//! Relayer incentivization for IBC-lite packets.
//!
//! ## Overview
//!
//! Payers escrow fees against a specific packet. When the packet reaches a
//! terminal outcome (acknowledged, timed out, or abandoned when its channel
//! closes) every escrowed fee is resolved exactly once into relayer payouts
//! and payer refunds. Nothing is ever left behind in escrow.
//!
//! A fee has three components:
//! - `recv_fee` goes to the forward relayer's registered counterparty address
//!   on acknowledgement.
//! - `ack_fee` goes to the relayer that submitted the acknowledgement.
//! - `timeout_fee` goes to the relayer that submitted the timeout proof.
//!
//! Components that are not earned, or cannot be paid, are refunded to the
//! payer.
//!
//! ## Dispatchable Functions
//!
//! - `register_counterparty_address` - Declare where a relayer is paid on a channel
//! - `pay_packet_fee` - Escrow a fee for the next packet sent on a channel
//! - `pay_packet_fee_async` - Escrow a fee for a packet already in flight
//! - `unlock_fee_module` - Re-enable fee handling after an escrow shortfall and
//!   settle the packets that were held back
//!
//! ## Packet Callbacks
//!
//! The transport drives fee resolution through the callbacks in [`middleware`].
//! Each one runs the wrapped application first and settles fees afterwards,
//! whatever the application's outcome.

#![cfg_attr(not(feature = "std"), no_std)]
#![allow(deprecated, clippy::let_unit_value)]

extern crate alloc;

pub use pallet::*;

pub mod distribution;
pub mod escrow;
pub mod middleware;
pub mod queries;
pub mod registry;
pub mod traits;
pub mod types;
pub mod weights;

#[cfg(test)]
mod tests;

#[cfg(feature = "runtime-benchmarks")]
mod benchmarking;

pub use weights::WeightInfo;

pub(crate) const LOG_TARGET: &str = "runtime::ibc-fee";

#[frame_support::pallet]
pub mod pallet {
    use super::*;
    use crate::traits::{ChannelInspector, FeeLedger, PacketApp};
    use alloc::vec::Vec;
    use frame_support::{
        pallet_prelude::*,
        traits::{Contains, EnsureOrigin},
        PalletId,
    };
    use frame_system::pallet_prelude::*;
    use sp_runtime::traits::AtLeast32BitUnsigned;

    pub use crate::types::{
        ChannelId, ChannelKey, CoinOf, Coins, Fee, FeeComponent, PacketFee, PacketId, PortId,
        ResolutionOutcome, ResolutionRecord, Sequence, TerminalEvent,
    };

    // =========================================================
    // Config
    // =========================================================

    #[pallet::config]
    pub trait Config: frame_system::Config {
        type RuntimeEvent: From<Event<Self>> + IsType<<Self as frame_system::Config>::RuntimeEvent>;
        type WeightInfo: WeightInfo;

        /// Identifier of an asset a fee may be denominated in.
        type AssetId: Parameter + Member + MaxEncodedLen + Copy + Ord;

        /// Amount of a single asset.
        type Balance: Parameter + Member + AtLeast32BitUnsigned + MaxEncodedLen + Copy + Default;

        /// Moves funds between payers, the escrow account and relayers.
        type Ledger: FeeLedger<Self::AccountId, Self::AssetId, Self::Balance>;

        /// Read-only view of channel sequences and packet commitments.
        type Channels: ChannelInspector;

        /// Application wrapped by the fee middleware.
        type App: PacketApp<Self::AccountId>;

        /// Accounts that may never receive fees (module accounts and the like).
        type BlockedAddresses: Contains<Self::AccountId>;

        /// Origin allowed to unlock the fee module after an escrow shortfall.
        type AdminOrigin: EnsureOrigin<Self::RuntimeOrigin>;

        /// Pallet ID for escrow account derivation.
        #[pallet::constant]
        type PalletId: Get<PalletId>;

        /// Maximum number of distinct assets in one fee component.
        #[pallet::constant]
        type MaxFeeAssets: Get<u32>;

        /// Maximum size of a payer's relayer allow-list.
        #[pallet::constant]
        type MaxRelayers: Get<u32>;

        /// Maximum number of independent fees attached to one packet.
        #[pallet::constant]
        type MaxFeesPerPacket: Get<u32>;

        #[cfg(feature = "runtime-benchmarks")]
        type BenchmarkHelper: crate::traits::BenchmarkHelper<
            Self::AccountId,
            Self::AssetId,
            Self::Balance,
        >;
    }

    // =========================================================
    // Pallet
    // =========================================================

    #[pallet::pallet]
    pub struct Pallet<T>(_);

    #[pallet::hooks]
    impl<T: Config> Hooks<BlockNumberFor<T>> for Pallet<T> {
        fn integrity_test() {
            assert!(T::MaxFeeAssets::get() > 0, "MaxFeeAssets must be positive");
            assert!(
                T::MaxFeesPerPacket::get() > 0,
                "MaxFeesPerPacket must be positive"
            );
        }

        #[cfg(feature = "try-runtime")]
        fn try_state(_n: BlockNumberFor<T>) -> Result<(), sp_runtime::TryRuntimeError> {
            Self::do_try_state()
        }
    }

    // =========================================================
    // Storage
    // =========================================================

    /// Channels that negotiated the fee middleware during their handshake.
    #[pallet::storage]
    pub type FeeEnabledChannels<T: Config> =
        StorageDoubleMap<_, Blake2_128Concat, PortId, Blake2_128Concat, ChannelId, (), OptionQuery>;

    /// (channel, relayer) → address the relayer is paid at on this chain.
    #[pallet::storage]
    pub type CounterpartyAddresses<T: Config> = StorageDoubleMap<
        _,
        Blake2_128Concat,
        ChannelId,
        Blake2_128Concat,
        T::AccountId,
        T::AccountId,
        OptionQuery,
    >;

    /// Fees escrowed per packet, in insertion order. Removed on resolution.
    #[pallet::storage]
    pub type FeesInEscrow<T: Config> = StorageDoubleMap<
        _,
        Blake2_128Concat,
        ChannelKey,
        Twox64Concat,
        Sequence,
        BoundedVec<PacketFee<T>, T::MaxFeesPerPacket>,
        ValueQuery,
    >;

    /// Relayer that delivered a packet here, held until its acknowledgement is
    /// written or the channel closes.
    #[pallet::storage]
    pub type ForwardRelayers<T: Config> = StorageDoubleMap<
        _,
        Blake2_128Concat,
        ChannelKey,
        Twox64Concat,
        Sequence,
        T::AccountId,
        OptionQuery,
    >;

    /// Packets whose escrowed fees have been resolved. Terminal. Packets that
    /// never carried a fee get no record.
    #[pallet::storage]
    pub type ResolvedPackets<T: Config> = StorageDoubleMap<
        _,
        Blake2_128Concat,
        ChannelKey,
        Twox64Concat,
        Sequence,
        ResolutionRecord<BlockNumberFor<T>>,
        OptionQuery,
    >;

    /// Terminal events that arrived while fees could not be settled. Replayed
    /// by `unlock_fee_module`.
    #[pallet::storage]
    pub type DeferredResolutions<T: Config> = StorageDoubleMap<
        _,
        Blake2_128Concat,
        ChannelKey,
        Twox64Concat,
        Sequence,
        TerminalEvent<T::AccountId>,
        OptionQuery,
    >;

    /// Every asset that has ever been escrowed.
    #[pallet::storage]
    pub type EscrowedAssets<T: Config> =
        StorageMap<_, Blake2_128Concat, T::AssetId, (), OptionQuery>;

    /// Set when escrow cannot cover the fees it is supposed to hold.
    #[pallet::storage]
    pub type FeeModuleLocked<T: Config> = StorageValue<_, bool, ValueQuery>;

    // =========================================================
    // Genesis
    // =========================================================

    #[pallet::genesis_config]
    #[derive(frame_support::DefaultNoBound)]
    pub struct GenesisConfig<T: Config> {
        /// `(port, channel)` pairs that start out fee-enabled.
        pub fee_enabled_channels: Vec<(Vec<u8>, Vec<u8>)>,
        /// `(channel, relayer, counterparty_address)` registrations.
        pub counterparty_addresses: Vec<(Vec<u8>, T::AccountId, T::AccountId)>,
    }

    #[pallet::genesis_build]
    impl<T: Config> BuildGenesisConfig for GenesisConfig<T> {
        fn build(&self) {
            for (port, channel) in &self.fee_enabled_channels {
                let port = crate::types::port_id(port.clone()).expect("invalid genesis port id");
                let channel = crate::types::channel_id(channel.clone())
                    .expect("invalid genesis channel id");
                FeeEnabledChannels::<T>::insert(port, channel, ());
            }
            for (channel, relayer, counterparty) in &self.counterparty_addresses {
                let channel = crate::types::channel_id(channel.clone())
                    .expect("invalid genesis channel id");
                CounterpartyAddresses::<T>::insert(channel, relayer, counterparty);
            }
        }
    }

    // =========================================================
    // Events
    // =========================================================

    #[pallet::event]
    #[pallet::generate_deposit(pub(super) fn deposit_event)]
    pub enum Event<T: Config> {
        /// A fee was escrowed. Totals cover every fee on the packet so far.
        IncentivizedPacket {
            packet_id: PacketId,
            payer: T::AccountId,
            total_recv_fee: Vec<CoinOf<T>>,
            total_ack_fee: Vec<CoinOf<T>>,
            total_timeout_fee: Vec<CoinOf<T>>,
        },
        CounterpartyAddressRegistered {
            channel_id: ChannelId,
            relayer: T::AccountId,
            counterparty_address: T::AccountId,
        },
        FeeEnabledChannel {
            port_id: PortId,
            channel_id: ChannelId,
        },
        /// A fee component was paid to a relayer.
        FeeDistributed {
            packet_id: PacketId,
            component: FeeComponent,
            recipient: T::AccountId,
            amount: Coins<T>,
        },
        /// A fee component was returned to its payer.
        FeeRefunded {
            packet_id: PacketId,
            component: FeeComponent,
            payer: T::AccountId,
            amount: Coins<T>,
        },
        /// Every fee on the packet has been resolved.
        PacketFeesResolved {
            packet_id: PacketId,
            outcome: ResolutionOutcome,
            fee_count: u32,
        },
        FeeModuleLocked,
        FeeModuleUnlocked,
    }

    // =========================================================
    // Errors
    // =========================================================

    #[pallet::error]
    pub enum Error<T> {
        /// Every fee component is empty, or one holds a zero or duplicated asset.
        InvalidFee,
        /// The payer cannot cover the fee.
        InsufficientFunds,
        /// The channel did not negotiate the fee middleware.
        ChannelNotFeeEnabled,
        /// The packet's fees were already resolved.
        PacketAlreadyResolved,
        /// The address may not take part in fee payments.
        InvalidAddress,
        /// No counterparty address is registered for the relayer on this channel.
        RelayerNotRegistered,
        /// A port or channel identifier is malformed.
        InvalidIdentifier,
        /// The transport does not know the channel.
        ChannelNotFound,
        /// The packet is not in flight.
        PacketNotFound,
        TooManyFeesForPacket,
        TooManyRelayers,
        /// Fee handling is suspended until the escrow shortfall is resolved.
        FeeModuleLocked,
        /// The counterparty negotiated a different fee version.
        InvalidVersion,
        /// A fee-enabled channel received an acknowledgement without fee metadata.
        InvalidAcknowledgement,
    }

    // =========================================================
    // Extrinsics
    // =========================================================

    #[pallet::call]
    impl<T: Config> Pallet<T> {
        /// Register the address the caller is paid at for packets it delivers
        /// on `channel_id`. Overwrites any earlier registration.
        #[pallet::call_index(0)]
        #[pallet::weight(T::WeightInfo::register_counterparty_address())]
        pub fn register_counterparty_address(
            origin: OriginFor<T>,
            channel_id: Vec<u8>,
            counterparty_address: T::AccountId,
        ) -> DispatchResult {
            let relayer = ensure_signed(origin)?;
            let channel_id =
                crate::types::channel_id(channel_id).ok_or(Error::<T>::InvalidIdentifier)?;

            Self::do_register_counterparty_address(channel_id, relayer, counterparty_address)
        }

        /// Escrow a fee for the next packet to be sent on a channel.
        #[pallet::call_index(1)]
        #[pallet::weight(T::WeightInfo::pay_packet_fee())]
        pub fn pay_packet_fee(
            origin: OriginFor<T>,
            port_id: Vec<u8>,
            channel_id: Vec<u8>,
            fee: Fee<T>,
            relayers: Vec<T::AccountId>,
        ) -> DispatchResult {
            let payer = ensure_signed(origin)?;
            let port_id = crate::types::port_id(port_id).ok_or(Error::<T>::InvalidIdentifier)?;
            let channel_id =
                crate::types::channel_id(channel_id).ok_or(Error::<T>::InvalidIdentifier)?;

            let sequence = T::Channels::next_sequence_send(&port_id, &channel_id)
                .ok_or(Error::<T>::ChannelNotFound)?;
            let packet_id = PacketId::new(port_id, channel_id, sequence);
            let packet_fee = Self::build_packet_fee(fee, payer, relayers)?;

            Self::escrow_packet_fee(&packet_id, packet_fee)
        }

        /// Escrow a fee for a packet that has already been sent.
        ///
        /// Any number of payers may fund the same packet while it is in flight.
        #[pallet::call_index(2)]
        #[pallet::weight(T::WeightInfo::pay_packet_fee_async())]
        pub fn pay_packet_fee_async(
            origin: OriginFor<T>,
            packet_id: PacketId,
            fee: Fee<T>,
            relayers: Vec<T::AccountId>,
        ) -> DispatchResult {
            let payer = ensure_signed(origin)?;
            ensure!(packet_id.is_well_formed(), Error::<T>::InvalidIdentifier);
            ensure!(
                !Self::is_resolved(&packet_id),
                Error::<T>::PacketAlreadyResolved
            );
            ensure!(
                T::Channels::has_packet_commitment(&packet_id),
                Error::<T>::PacketNotFound
            );
            let packet_fee = Self::build_packet_fee(fee, payer, relayers)?;

            Self::escrow_packet_fee(&packet_id, packet_fee)
        }

        /// Resume fee handling after an escrow shortfall has been investigated.
        ///
        /// Resolutions deferred while locked are replayed immediately. If one
        /// of them still cannot settle, the module locks again.
        #[pallet::call_index(3)]
        #[pallet::weight(T::WeightInfo::unlock_fee_module())]
        pub fn unlock_fee_module(origin: OriginFor<T>) -> DispatchResult {
            T::AdminOrigin::ensure_origin(origin)?;

            if FeeModuleLocked::<T>::take() {
                Self::deposit_event(Event::FeeModuleUnlocked);
                Self::replay_deferred_resolutions();
            }
            Ok(())
        }
    }

    // =========================================================
    // Internal Functions
    // =========================================================

    impl<T: Config> Pallet<T> {
        pub fn is_locked() -> bool {
            FeeModuleLocked::<T>::get()
        }

        pub fn is_resolved(packet_id: &PacketId) -> bool {
            ResolvedPackets::<T>::contains_key(packet_id.channel_key(), packet_id.sequence)
        }

        /// Suspend fee handling. Idempotent.
        pub(crate) fn lock_fee_module() {
            if !FeeModuleLocked::<T>::get() {
                FeeModuleLocked::<T>::put(true);
                Self::deposit_event(Event::FeeModuleLocked);
            }
        }

        fn build_packet_fee(
            fee: Fee<T>,
            payer: T::AccountId,
            relayers: Vec<T::AccountId>,
        ) -> Result<PacketFee<T>, DispatchError> {
            let mut relayers = relayers;
            relayers.sort();
            relayers.dedup();
            let relayers: BoundedVec<_, T::MaxRelayers> = relayers
                .try_into()
                .map_err(|_| Error::<T>::TooManyRelayers)?;

            Ok(PacketFee {
                fee,
                refund_address: payer,
                relayers,
            })
        }
    }
}
