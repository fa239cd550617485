use crate::{
    pallet::{Error, Event, FeeModuleLocked, ForwardRelayers},
    tests::mock::*,
    types::{
        self, Acknowledgement, AppVersion, ChannelVersion, IncentivizedAcknowledgement, PacketFeeState,
        PacketId, ResolutionOutcome,
    },
};
use frame_support::{assert_err, assert_ok};
use sp_runtime::DispatchError;

fn ics20() -> AppVersion {
    b"ics20-1".to_vec().try_into().unwrap()
}

fn plain_packet(sequence: u64) -> PacketId {
    PacketId::new(port(), plain_channel(), sequence)
}

fn incentivized_ack(success: bool, forward_relayer: Option<u64>) -> Acknowledgement<u64> {
    Acknowledgement::Incentivized(IncentivizedAcknowledgement {
        app_acknowledgement: app_ack(success),
        forward_relayer,
    })
}

// =========================================================
// Channel handshake
// =========================================================

#[test]
fn incentivized_handshake_enables_fees() {
    new_test_ext().execute_with(|| {
        let channel = types::channel_id(b"channel-7".to_vec()).unwrap();

        assert_eq!(
            IbcFee::on_chan_open(&port(), &channel, ChannelVersion::Incentivized(ics20())),
            Ok(ChannelVersion::Incentivized(ics20()))
        );

        assert!(IbcFee::is_fee_enabled(&port(), &channel));
        System::assert_last_event(
            Event::FeeEnabledChannel {
                port_id: port(),
                channel_id: channel,
            }
            .into(),
        );
    });
}

#[test]
fn plain_handshake_leaves_fees_disabled() {
    new_test_ext().execute_with(|| {
        let channel = types::channel_id(b"channel-8".to_vec()).unwrap();

        assert_eq!(
            IbcFee::on_chan_open(&port(), &channel, ChannelVersion::Plain(ics20())),
            Ok(ChannelVersion::Plain(ics20()))
        );
        assert!(!IbcFee::is_fee_enabled(&port(), &channel));
        assert_eq!(app_calls(), vec![AppCall::ChanOpen]);
    });
}

#[test]
fn application_version_rejection_aborts_handshake() {
    new_test_ext().execute_with(|| {
        let channel = types::channel_id(b"channel-9".to_vec()).unwrap();
        let unknown: AppVersion = b"ics721-1".to_vec().try_into().unwrap();

        assert!(IbcFee::on_chan_open(&port(), &channel, ChannelVersion::Incentivized(unknown))
            .is_err());
        assert!(!IbcFee::is_fee_enabled(&port(), &channel));
    });
}

#[test]
fn counterparty_must_agree_on_fees() {
    new_test_ext().execute_with(|| {
        assert_ok!(IbcFee::on_chan_open_ack(
            &port(),
            &fee_channel(),
            &ChannelVersion::Incentivized(ics20())
        ));
        assert_ok!(IbcFee::on_chan_open_ack(
            &port(),
            &plain_channel(),
            &ChannelVersion::Plain(ics20())
        ));

        assert_err!(
            IbcFee::on_chan_open_ack(&port(), &fee_channel(), &ChannelVersion::Plain(ics20())),
            Error::<Test>::InvalidVersion
        );
        assert_err!(
            IbcFee::on_chan_open_ack(
                &port(),
                &plain_channel(),
                &ChannelVersion::Incentivized(ics20())
            ),
            Error::<Test>::InvalidVersion
        );
    });
}

// =========================================================
// Send and receive
// =========================================================

#[test]
fn send_passes_through_to_application() {
    new_test_ext().execute_with(|| {
        assert_ok!(IbcFee::on_send_packet(&packet(10), b"payload"));
        assert_eq!(app_calls(), vec![AppCall::Send(10)]);
    });
}

#[test]
fn recv_wraps_ack_with_forward_relayer() {
    new_test_ext().execute_with(|| {
        assert_eq!(
            IbcFee::on_recv_packet(&packet(1), b"payload", &R1),
            Some(incentivized_ack(true, Some(R1)))
        );
        assert_eq!(app_calls(), vec![AppCall::Recv(1)]);
    });
}

#[test]
fn failed_application_ack_still_carries_forward_relayer() {
    new_test_ext().execute_with(|| {
        set_app_fails(true);

        let ack = IbcFee::on_recv_packet(&packet(1), b"payload", &R1);

        let Some(Acknowledgement::Incentivized(ack)) = ack else {
            panic!("expected incentivized acknowledgement");
        };
        assert!(!ack.underlying_app_success());
        assert_eq!(ack.forward_relayer, Some(R1));
    });
}

#[test]
fn recv_on_plain_channel_returns_plain_ack() {
    new_test_ext().execute_with(|| {
        assert_eq!(
            IbcFee::on_recv_packet(&plain_packet(1), b"payload", &R1),
            Some(Acknowledgement::Plain(app_ack(true)))
        );
        assert_eq!(ForwardRelayers::<Test>::iter().count(), 0);
    });
}

#[test]
fn async_ack_picks_up_recorded_forward_relayer() {
    new_test_ext().execute_with(|| {
        set_app_async_acks(true);

        assert_eq!(IbcFee::on_recv_packet(&packet(3), b"payload", &R1), None);
        assert_eq!(
            ForwardRelayers::<Test>::get(packet(3).channel_key(), 3),
            Some(R1)
        );

        assert_eq!(
            IbcFee::write_acknowledgement(&packet(3), app_ack(true)),
            incentivized_ack(true, Some(R1))
        );
        assert_eq!(ForwardRelayers::<Test>::get(packet(3).channel_key(), 3), None);
    });
}

#[test]
fn async_ack_on_plain_channel_is_plain() {
    new_test_ext().execute_with(|| {
        assert_eq!(
            IbcFee::write_acknowledgement(&plain_packet(3), app_ack(false)),
            Acknowledgement::Plain(app_ack(false))
        );
    });
}

// =========================================================
// Acknowledgement and timeout
// =========================================================

#[test]
fn relayed_round_trip_settles_fees() {
    new_test_ext().execute_with(|| {
        register(R1, C1);
        assert_ok!(pay(PAYER_A, 1, fee(10, 5, 3), vec![]));

        // Counterparty side: R1 delivers the packet.
        let ack = IbcFee::on_recv_packet(&packet(1), b"payload", &R1).unwrap();

        // Source side: R2 relays the acknowledgement back.
        assert_eq!(IbcFee::on_acknowledgement_packet(&packet(1), ack, &R2), Ok(Ok(())));

        assert_eq!(native_balance(C1), 10);
        assert_eq!(native_balance(R2), 5);
        assert_eq!(native_balance(PAYER_A), INITIAL_BALANCE - 15);
        assert_eq!(app_calls(), vec![AppCall::Recv(1), AppCall::Ack(1, true)]);
        assert_conserved();
    });
}

#[test]
fn plain_ack_on_fee_channel_is_rejected_before_application() {
    new_test_ext().execute_with(|| {
        assert_ok!(pay(PAYER_A, 1, fee(10, 5, 3), vec![]));

        assert_eq!(
            IbcFee::on_acknowledgement_packet(&packet(1), Acknowledgement::Plain(app_ack(true)), &R2),
            Err(Error::<Test>::InvalidAcknowledgement.into())
        );
        assert!(app_calls().is_empty());
        assert_eq!(IbcFee::packet_state(&packet(1)), PacketFeeState::Escrowed);
    });
}

#[test]
fn application_failure_does_not_block_settlement() {
    new_test_ext().execute_with(|| {
        register(R1, C1);
        assert_ok!(pay(PAYER_A, 1, fee(10, 5, 3), vec![]));
        set_app_fails(true);

        assert_eq!(
            IbcFee::on_acknowledgement_packet(&packet(1), incentivized_ack(false, Some(R1)), &R2),
            Ok(Err(DispatchError::Other("application failure")))
        );

        // The application's own writes were rolled back; the payouts were not.
        assert_eq!(AppWrites::get(), 0);
        assert_eq!(native_balance(C1), 10);
        assert_eq!(native_balance(R2), 5);
        assert_eq!(
            IbcFee::packet_state(&packet(1)),
            PacketFeeState::Resolved(ResolutionOutcome::Acknowledged)
        );
        assert_conserved();
    });
}

#[test]
fn timeout_settles_after_application_runs() {
    new_test_ext().execute_with(|| {
        assert_ok!(pay(PAYER_A, 2, fee(10, 5, 3), vec![]));

        assert_ok!(IbcFee::on_timeout_packet(&packet(2), &R3));

        assert_eq!(app_calls(), vec![AppCall::Timeout(2)]);
        assert_eq!(native_balance(R3), 3);
        assert_eq!(native_balance(PAYER_A), INITIAL_BALANCE - 3);
        assert_conserved();
    });
}

#[test]
fn failing_timeout_handler_still_pays_relayer() {
    new_test_ext().execute_with(|| {
        assert_ok!(pay(PAYER_A, 2, fee(10, 5, 3), vec![]));
        set_app_fails(true);

        assert!(IbcFee::on_timeout_packet(&packet(2), &R3).is_err());

        assert_eq!(native_balance(R3), 3);
        assert_eq!(
            IbcFee::packet_state(&packet(2)),
            PacketFeeState::Resolved(ResolutionOutcome::TimedOut)
        );
    });
}

#[test]
fn plain_channel_never_touches_fee_state() {
    new_test_ext().execute_with(|| {
        assert_eq!(
            IbcFee::on_acknowledgement_packet(
                &plain_packet(1),
                Acknowledgement::Plain(app_ack(true)),
                &R2
            ),
            Ok(Ok(()))
        );
        assert_ok!(IbcFee::on_timeout_packet(&plain_packet(2), &R3));

        assert_eq!(
            app_calls(),
            vec![AppCall::Ack(1, true), AppCall::Timeout(2)]
        );
        assert_eq!(
            IbcFee::packet_state(&plain_packet(1)),
            PacketFeeState::Unincentivized
        );
        assert_eq!(
            IbcFee::packet_state(&plain_packet(2)),
            PacketFeeState::Unincentivized
        );
    });
}

// =========================================================
// Channel close
// =========================================================

#[test]
fn closing_channel_refunds_fees_and_disables_them() {
    new_test_ext().execute_with(|| {
        assert_ok!(pay(PAYER_A, 1, fee(10, 5, 3), vec![]));
        assert_ok!(pay(PAYER_B, 2, fee(4, 4, 4), vec![]));

        assert_ok!(IbcFee::on_chan_close(&port(), &fee_channel()));

        assert_eq!(app_calls(), vec![AppCall::ChanClose]);
        assert!(!IbcFee::is_fee_enabled(&port(), &fee_channel()));
        assert_eq!(native_balance(PAYER_A), INITIAL_BALANCE);
        assert_eq!(native_balance(PAYER_B), INITIAL_BALANCE);
        assert_eq!(
            IbcFee::packet_state(&packet(2)),
            PacketFeeState::Resolved(ResolutionOutcome::Abandoned)
        );
        assert_conserved();
    });
}

#[test]
fn refused_close_keeps_fees_escrowed() {
    new_test_ext().execute_with(|| {
        assert_ok!(pay(PAYER_A, 1, fee(10, 5, 3), vec![]));
        set_app_fails(true);

        assert!(IbcFee::on_chan_close(&port(), &fee_channel()).is_err());

        assert!(IbcFee::is_fee_enabled(&port(), &fee_channel()));
        assert_eq!(IbcFee::packet_state(&packet(1)), PacketFeeState::Escrowed);
        assert_eq!(native_balance(escrow()), 18);
    });
}

#[test]
fn close_while_locked_refunds_on_unlock() {
    new_test_ext().execute_with(|| {
        assert_ok!(pay(PAYER_A, 1, fee(10, 5, 3), vec![]));
        assert_ok!(pay(PAYER_B, 2, fee(4, 4, 4), vec![]));
        FeeModuleLocked::<Test>::put(true);

        assert_ok!(IbcFee::on_chan_close(&port(), &fee_channel()));

        assert!(!IbcFee::is_fee_enabled(&port(), &fee_channel()));
        assert_eq!(IbcFee::packet_state(&packet(1)), PacketFeeState::Escrowed);
        assert_eq!(native_balance(escrow()), 30);
        assert_conserved();

        // A late timeout on the closed channel no longer reaches fee state.
        assert_ok!(IbcFee::on_timeout_packet(&packet(1), &R3));
        assert_eq!(native_balance(R3), 0);

        assert_ok!(IbcFee::unlock_fee_module(RuntimeOrigin::root()));

        assert_eq!(native_balance(PAYER_A), INITIAL_BALANCE);
        assert_eq!(native_balance(PAYER_B), INITIAL_BALANCE);
        assert_eq!(native_balance(escrow()), 0);
        for sequence in [1, 2] {
            assert_eq!(
                IbcFee::packet_state(&packet(sequence)),
                PacketFeeState::Resolved(ResolutionOutcome::Abandoned)
            );
        }
        assert_conserved();
    });
}

#[test]
fn close_during_shortfall_refunds_once_escrow_recovers() {
    new_test_ext().execute_with(|| {
        let foreign =
            types::Fee::new(coins(&[(FOREIGN, 50)]), Default::default(), Default::default());
        assert_ok!(pay(PAYER_A, 1, foreign, vec![]));
        ForeignBalances::insert(FOREIGN, escrow(), 20);

        assert_ok!(IbcFee::on_chan_close(&port(), &fee_channel()));

        assert!(IbcFee::is_locked());
        assert_eq!(IbcFee::packet_state(&packet(1)), PacketFeeState::Escrowed);

        ForeignBalances::insert(FOREIGN, escrow(), 50);
        assert_ok!(IbcFee::unlock_fee_module(RuntimeOrigin::root()));

        assert!(!IbcFee::is_locked());
        assert_eq!(balance(FOREIGN, PAYER_A), INITIAL_BALANCE);
        assert_eq!(
            IbcFee::packet_state(&packet(1)),
            PacketFeeState::Resolved(ResolutionOutcome::Abandoned)
        );
        assert_conserved();
    });
}

#[test]
fn close_drops_unwritten_async_acknowledgements() {
    new_test_ext().execute_with(|| {
        set_app_async_acks(true);
        assert_eq!(IbcFee::on_recv_packet(&packet(3), b"payload", &R1), None);
        assert_eq!(IbcFee::on_recv_packet(&packet(4), b"payload", &R2), None);
        assert_eq!(ForwardRelayers::<Test>::iter().count(), 2);

        assert_ok!(IbcFee::on_chan_close(&port(), &fee_channel()));

        assert_eq!(ForwardRelayers::<Test>::iter().count(), 0);
    });
}
