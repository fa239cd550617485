use crate::{
    tests::mock::*,
    types::{Fee, PacketFeeState, PacketId},
};
use frame_support::assert_ok;

#[test]
fn incentivized_packets_are_listed_per_channel() {
    new_test_ext().execute_with(|| {
        assert_ok!(pay(PAYER_A, 1, fee(10, 5, 3), vec![]));
        assert_ok!(pay(PAYER_B, 1, fee(1, 1, 1), vec![]));
        assert_ok!(pay(PAYER_A, 2, fee(4, 0, 0), vec![]));

        let mut all = IbcFee::incentivized_packets();
        all.sort_by_key(|p| p.packet_id.sequence);
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].packet_id, packet(1));
        assert_eq!(all[0].packet_fees.len(), 2);
        assert_eq!(all[1].packet_id, packet(2));

        assert_eq!(
            IbcFee::incentivized_packets_for_channel(&port(), &fee_channel()).len(),
            2
        );
        assert!(IbcFee::incentivized_packets_for_channel(&port(), &plain_channel()).is_empty());

        let single = IbcFee::incentivized_packet(&packet(1)).unwrap();
        assert_eq!(single.packet_fees[0].refund_address, PAYER_A);
        assert_eq!(single.packet_fees[1].refund_address, PAYER_B);
        assert!(IbcFee::incentivized_packet(&packet(5)).is_none());
    });
}

#[test]
fn component_totals_sum_across_payers() {
    new_test_ext().execute_with(|| {
        assert_ok!(pay(PAYER_A, 1, fee(10, 5, 0), vec![]));
        let foreign = Fee::new(
            coins(&[(FOREIGN, 8), (NATIVE, 2)]),
            Default::default(),
            coins(&[(FOREIGN, 6)]),
        );
        assert_ok!(pay(PAYER_B, 1, foreign, vec![]));

        assert_eq!(
            IbcFee::total_recv_fees(&packet(1)),
            coins(&[(NATIVE, 12), (FOREIGN, 8)]).into_inner()
        );
        assert_eq!(
            IbcFee::total_ack_fees(&packet(1)),
            coins(&[(NATIVE, 5)]).into_inner()
        );
        assert_eq!(
            IbcFee::total_timeout_fees(&packet(1)),
            coins(&[(FOREIGN, 6)]).into_inner()
        );
        assert!(IbcFee::total_recv_fees(&packet(2)).is_empty());
    });
}

#[test]
fn escrow_totals_by_payer_and_channel() {
    new_test_ext().execute_with(|| {
        assert_ok!(pay(PAYER_A, 1, fee(10, 5, 3), vec![]));
        assert_ok!(pay(PAYER_B, 1, fee(1, 1, 1), vec![]));
        assert_ok!(pay(PAYER_A, 2, fee(4, 0, 0), vec![]));

        assert_eq!(IbcFee::total_escrowed(), coins(&[(NATIVE, 25)]).into_inner());
        assert_eq!(
            IbcFee::total_escrowed_by_payer(&PAYER_A),
            coins(&[(NATIVE, 22)]).into_inner()
        );
        assert_eq!(
            IbcFee::total_escrowed_by_payer(&PAYER_B),
            coins(&[(NATIVE, 3)]).into_inner()
        );
        assert!(IbcFee::total_escrowed_by_payer(&R1).is_empty());
        assert_eq!(
            IbcFee::total_escrowed_for_channel(&port(), &fee_channel()),
            coins(&[(NATIVE, 25)]).into_inner()
        );
        assert!(IbcFee::total_escrowed_for_channel(&port(), &plain_channel()).is_empty());
    });
}

#[test]
fn fee_enabled_channels_include_genesis_and_handshakes() {
    new_test_ext().execute_with(|| {
        assert_eq!(IbcFee::fee_enabled_channels(), vec![(port(), fee_channel())]);
        assert!(IbcFee::is_fee_enabled(&port(), &fee_channel()));
        assert!(!IbcFee::is_fee_enabled(&port(), &plain_channel()));
    });
}

#[test]
fn packet_state_follows_lifecycle() {
    new_test_ext().execute_with(|| {
        assert_eq!(
            IbcFee::packet_state(&packet(1)),
            PacketFeeState::Unincentivized
        );

        assert_ok!(pay(PAYER_A, 1, fee(10, 5, 3), vec![]));
        assert_eq!(IbcFee::packet_state(&packet(1)), PacketFeeState::Escrowed);

        assert_ok!(IbcFee::on_timeout_packet(&packet(1), &R3));
        assert!(matches!(
            IbcFee::packet_state(&packet(1)),
            PacketFeeState::Resolved(_)
        ));
        assert!(IbcFee::is_resolved(&packet(1)));
    });
}

#[test]
fn packets_are_keyed_by_full_identifier() {
    new_test_ext().execute_with(|| {
        assert_ok!(pay(PAYER_A, 1, fee(10, 5, 3), vec![]));

        let other_port = PacketId::new(
            crate::types::port_id(b"oracle".to_vec()).unwrap(),
            fee_channel(),
            1,
        );
        assert_eq!(IbcFee::packet_state(&other_port), PacketFeeState::Unincentivized);
        assert!(IbcFee::incentivized_packet(&other_port).is_none());
    });
}
