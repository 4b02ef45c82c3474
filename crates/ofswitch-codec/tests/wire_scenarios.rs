//! End-to-end encode/validate scenarios over complete messages.

use ofswitch_codec::{
    actions, build_add_flow, build_flow_mod, build_packet_out, check_packet_out, encode_actions,
    validate_actions, Action, BadRequestCode, Flow, FlowModCommand, Instruction, OfpError,
    OfpMessage, ETH_TYPE_ARP, NO_BUFFER, OFP_FLOW_PERMANENT, OUTPUT_LEN,
};
use ofswitch_types::{port_no, MacAddress};
use pretty_assertions::assert_eq;
use std::net::Ipv4Addr;

#[test]
fn add_flow_for_tcp_flow_decodes_to_single_output() {
    let flow = Flow::tcp(Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(10, 0, 0, 2));
    let msg = build_add_flow(&flow, NO_BUFFER, 0, 0, 10, &[Action::output(3)]).unwrap();

    let fm = match msg.unpack().unwrap() {
        OfpMessage::FlowMod(fm) => fm,
        other => panic!("unexpected message {:?}", other),
    };
    assert_eq!(fm.command, FlowModCommand::Add);
    assert_eq!(fm.hard_timeout, OFP_FLOW_PERMANENT);
    assert_eq!(fm.priority, 10);
    assert_eq!(fm.idle_timeout, 0);
    assert_eq!(fm.instructions.len(), 1);

    let Instruction::ApplyActions(list) = &fm.instructions[0];
    assert_eq!(list.len(), 1);
    assert_eq!(list[0].len(), OUTPUT_LEN);
    assert!(matches!(list[0], Action::Output { port: 3, .. }));
    assert_eq!(fm.flow(), flow);
}

#[test]
fn flow_mod_round_trip_preserves_length_and_flow() {
    let mut arp = Flow::arp(Ipv4Addr::new(172, 16, 0, 1));
    arp.in_port = 2;
    arp.dl_dst = MacAddress::new([2, 0, 0, 0, 0, 1]);
    let mut tcp = Flow::tcp(Ipv4Addr::new(1, 2, 3, 4), Ipv4Addr::new(5, 6, 7, 8));
    tcp.in_port = 9;
    let bare = Flow {
        dl_type: ETH_TYPE_ARP,
        ..Flow::default()
    };

    let instructions = [Instruction::ApplyActions(vec![
        Action::output(1),
        Action::SetQueue { queue_id: 3 },
    ])];

    for flow in [arp, tcp, bare] {
        for command in [FlowModCommand::Add, FlowModCommand::Modify, FlowModCommand::Delete] {
            let msg = build_flow_mod(command, 5, &flow, &instructions).unwrap();
            assert_eq!(usize::from(msg.header().length), msg.len());
            match msg.unpack().unwrap() {
                OfpMessage::FlowMod(fm) => {
                    assert_eq!(fm.flow(), flow);
                    assert_eq!(fm.command, command);
                    assert_eq!(fm.instructions, instructions.to_vec());
                }
                other => panic!("unexpected message {:?}", other),
            }
        }
    }
}

#[test]
fn accepted_action_array_is_partitioned_by_lengths() {
    let list = vec![
        Action::output(port_no::CONTROLLER),
        Action::SetQueue { queue_id: 7 },
        Action::output(4),
        Action::output(port_no::IN_PORT),
    ];
    let bytes = encode_actions(&list);
    validate_actions(&bytes, 8, false).unwrap();

    let mut offset = 0;
    for (raw, expected) in actions(&bytes).zip(&list) {
        assert_eq!(raw.bytes.as_ptr(), bytes[offset..].as_ptr());
        assert_eq!(&raw.decode().unwrap(), expected);
        offset += raw.len();
    }
    assert_eq!(offset, bytes.len());
    assert_eq!(actions(&bytes).count(), list.len());
}

#[test]
fn packet_out_with_overlong_actions_len_is_bad_len() {
    let mut bytes = build_packet_out(Some(&[0u8; 8]), NO_BUFFER, 1, &[Action::output(2)])
        .unwrap()
        .into_bytes();
    // 16 bytes of actions and 8 of payload are present; claim 40.
    bytes[16..18].copy_from_slice(&40u16.to_be_bytes());

    assert_eq!(
        check_packet_out(&bytes, 16),
        Err(OfpError::BadRequest(BadRequestCode::BadLen))
    );
}
