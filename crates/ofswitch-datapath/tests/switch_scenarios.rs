//! End-to-end scenarios driving a datapath over fake devices.

use ofswitch_datapath::testing::{datapath, datapath_with, FakeNetwork, RecordingPipeline, RecordingSink};
use ofswitch_datapath::{
    ControllerMessage, DatapathConfig, HwFrame, LocalPortState, MigrationNotice, PacketInReason,
    PortMod, Role, Sender,
};
use ofswitch_types::{LinkState, MacAddress, PortConfig, PortFeatures};
use pretty_assertions::assert_eq;
use std::net::Ipv4Addr;

const LOCAL_ADDR: Ipv4Addr = Ipv4Addr::new(192, 168, 1, 20);

fn mac(last: u8) -> MacAddress {
    MacAddress::new([2, 0, 0, 0, 0, last])
}

fn announcement(level: u8, path: &[u8]) -> Vec<u8> {
    let mut chain = [0u8; ofswitch_datapath::amaru::AMAC_LEN];
    chain[..path.len()].copy_from_slice(path);
    ofswitch_datapath::amaru::encode_announcement(
        mac(0xee),
        &ofswitch_datapath::AmaruHeader { level, chain },
    )
}

#[test]
fn local_port_fails_over_to_amac_ingress_port() {
    let net = FakeNetwork::new();
    let devs: Vec<_> = (1..=2).map(|i| net.add_device(&format!("eth{}", i), mac(i))).collect();
    let sink = RecordingSink::default();
    let config = DatapathConfig {
        datapath_id: 0x42,
        root_datapath_id: 1,
        ..DatapathConfig::default()
    };
    let (mut dp, _) = datapath(config, &net, &sink);
    dp.ports_mut().add_port("eth1").unwrap();
    dp.ports_mut().add_port("eth2").unwrap();
    dp.ports_mut().add_local_port("eth1").unwrap();
    dp.ports_mut()
        .set_local_address(LOCAL_ADDR, Ipv4Addr::new(255, 255, 255, 0))
        .unwrap();

    // the parent announces itself on eth2
    devs[1].borrow_mut().rx.push_back(announcement(1, &[3]));
    dp.run();
    assert_eq!(dp.amacs().len(), 1);
    assert!(dp.local_port_ok());
    sink.clear();

    devs[0].borrow_mut().link = LinkState::Down;
    dp.run();

    assert!(!dp.local_port_ok());
    assert_eq!(dp.local_state(), LocalPortState::Pending);
    let local = dp.ports().local_port().unwrap();
    assert_eq!(local.name(), "eth2");
    assert_eq!(local.hw_addr(), MacAddress::from_u64(0x42));
    assert_eq!(devs[0].borrow().hw_addr, mac(1));
    assert_eq!(devs[1].borrow().in4, Some(LOCAL_ADDR));

    let packet_ins: Vec<_> = sink
        .messages()
        .into_iter()
        .filter_map(|m| match m {
            ControllerMessage::PacketIn(pi) => Some(pi),
            _ => None,
        })
        .collect();
    assert_eq!(packet_ins.len(), 1);
    assert_eq!(packet_ins[0].reason, PacketInReason::Action);
    assert_eq!(packet_ins[0].in_port, 2);
    assert_eq!(
        MigrationNotice::decode(&packet_ins[0].data).unwrap(),
        MigrationNotice {
            new_port: 2,
            name: "eth2".to_string(),
            address: LOCAL_ADDR,
            old_port: 1,
        }
    );

    devs[1].borrow_mut().rx.push_back(vec![0u8; 64]);
    dp.run();
    assert!(dp.local_port_ok());
}

#[test]
fn flood_skips_ingress_and_no_forward_ports() {
    let net = FakeNetwork::new();
    let devs: Vec<_> = (1..=4).map(|i| net.add_device(&format!("eth{}", i), mac(i))).collect();
    let sink = RecordingSink::default();
    let (mut dp, _) = datapath(DatapathConfig::default(), &net, &sink);
    for i in 1..=4 {
        dp.ports_mut().add_port(&format!("eth{}", i)).unwrap();
    }

    let eth3 = dp.ports().lookup(3).unwrap().hw_addr();
    dp.ports_mut()
        .handle_port_mod(
            &Sender::default(),
            &PortMod {
                port_no: 3,
                hw_addr: eth3,
                config: PortConfig::NO_FWD,
                mask: PortConfig::NO_FWD,
                advertise: PortFeatures::empty(),
            },
        )
        .unwrap();

    assert_eq!(dp.ports_mut().output_all(&[0u8; 60], 1, true), 2);
    let sent: Vec<usize> = devs.iter().map(|d| d.borrow().sent.len()).collect();
    assert_eq!(sent, vec![0, 1, 0, 1]);
}

#[test]
fn frames_reach_pipeline_unless_port_refuses_input() {
    let net = FakeNetwork::new();
    let devs: Vec<_> = (1..=3).map(|i| net.add_device(&format!("eth{}", i), mac(i))).collect();
    let sink = RecordingSink::default();
    let (mut dp, pipeline) =
        datapath_with(DatapathConfig::default(), &net, &sink, RecordingPipeline::flooding());
    for i in 1..=3 {
        dp.ports_mut().add_port(&format!("eth{}", i)).unwrap();
    }

    devs[0].borrow_mut().rx.push_back(vec![1u8; 80]);
    dp.run();
    assert_eq!(pipeline.seen(), vec![(1, vec![1u8; 80])]);
    assert_eq!(devs[1].borrow().sent.len(), 1);
    assert_eq!(devs[2].borrow().sent.len(), 1);

    let eth2 = dp.ports().lookup(2).unwrap().hw_addr();
    let master = Sender {
        xid: 7,
        role: Role::Master,
    };
    dp.ports_mut()
        .handle_port_mod(
            &master,
            &PortMod {
                port_no: 2,
                hw_addr: eth2,
                config: PortConfig::NO_RECV,
                mask: PortConfig::NO_RECV,
                advertise: PortFeatures::empty(),
            },
        )
        .unwrap();
    devs[1].borrow_mut().rx.push_back(vec![2u8; 80]);
    dp.run();
    assert_eq!(pipeline.seen().len(), 1);
    assert_eq!(dp.ports().lookup(2).unwrap().stats().rx_dropped, 1);
}

#[test]
fn announcements_propagate_down_a_chain_of_switches() {
    // root -> middle -> leaf, each link one fake device pair
    let root_net = FakeNetwork::new();
    let root_up = root_net.add_device("mgmt", mac(1));
    let root_down = root_net.add_device("down", mac(2));
    let sink = RecordingSink::default();
    let (mut root, _) = datapath(
        DatapathConfig {
            datapath_id: 1,
            root_datapath_id: 1,
            ..DatapathConfig::default()
        },
        &root_net,
        &sink,
    );
    root.ports_mut().add_port("mgmt").unwrap();
    root.ports_mut().add_port("down").unwrap();
    root.ports_mut().add_local_port("mgmt").unwrap();
    assert_eq!(root.announce_as_root(), 1);
    assert!(root_up.borrow().sent.is_empty());
    let from_root = root_down.borrow().sent[0].0.clone();

    let mid_net = FakeNetwork::new();
    let mid_up = mid_net.add_device("up", mac(3));
    let mid_down = mid_net.add_device("down", mac(4));
    let (mut middle, _) = datapath(
        DatapathConfig {
            datapath_id: 2,
            root_datapath_id: 1,
            ..DatapathConfig::default()
        },
        &mid_net,
        &sink,
    );
    middle.ports_mut().add_port("up").unwrap();
    middle.ports_mut().add_port("down").unwrap();
    mid_up.borrow_mut().rx.push_back(from_root);
    middle.run();

    let entry = middle.amacs().iter().next().unwrap().clone();
    assert_eq!(entry.path(), &[2]);
    assert_eq!(entry.ingress_port, 1);

    let leaf_link = mid_down.borrow();
    let to_leaf = &leaf_link.sent;
    assert_eq!(to_leaf.len(), 1);
    let view = ofswitch_datapath::ParsedView::parse(&to_leaf[0].0);
    let header = view.amaru.unwrap();
    assert_eq!(header.level, 2);
    assert_eq!(header.path(), &[2, 2]);
    assert_eq!(view.eth.unwrap().src, mac(4));
}

#[test]
fn hardware_frames_are_drained_each_iteration() {
    let net = FakeNetwork::new();
    net.add_device("eth1", mac(1));
    let hw = net.add_device("asic0", mac(2));
    let sink = RecordingSink::default();
    let (mut dp, pipeline) = datapath(DatapathConfig::default(), &net, &sink);
    dp.ports_mut().add_port("eth1").unwrap();
    let hw_port = dp.ports_mut().add_hw_port("asic0").unwrap();
    let tx = dp.attach_hw_queue();

    // hardware ports are never polled
    hw.borrow_mut().rx.push_back(vec![9u8; 60]);
    tx.try_send(HwFrame {
        port_no: hw_port,
        data: vec![5u8; 60],
    })
    .unwrap();
    tx.try_send(HwFrame {
        port_no: 77,
        data: vec![6u8; 60],
    })
    .unwrap();
    dp.run();

    assert_eq!(pipeline.seen(), vec![(hw_port, vec![5u8; 60])]);
    assert_eq!(hw.borrow().rx.len(), 1);
    assert_eq!(dp.ports().lookup(hw_port).unwrap().stats().rx_packets, 1);
}
