mod support;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use csm::{
    ChatMessageCommand, Command, CommandKind, ConnectionRequestCommand, DisconnectReason,
    DispatchError, DlcMask, Envelope, PlayerJoinedCommand, ServerConfig, SessionEvent,
};
use support::{Harness, SERVER_DLC, WORLD, host_config, request};

#[test]
fn game_version_mismatch_names_both_versions() {
    let harness = Harness::server(host_config());

    for (peer, client_version) in (10..).zip(["1.16.0-f3", "1.17.1-f5", "", "1.17.1-F4"]) {
        let result = harness.connect(
            peer,
            &ConnectionRequestCommand {
                game_version: client_version.to_string(),
                ..request("alice")
            },
        );

        assert!(!result.success);
        assert_eq!(result.client_id, None);
        let reason = result.reason.expect("reason");
        assert!(reason.contains("different game versions"), "{reason}");
        assert!(reason.contains(&format!("Client: {client_version},")), "{reason}");
        assert!(reason.contains("Server: 1.17.1-f4"), "{reason}");
    }
    assert_eq!(harness.session.server().unwrap().player_count(), 0);
}

#[test]
fn mod_version_mismatch_is_rejected() {
    let harness = Harness::server(host_config());

    let result = harness.connect(
        2,
        &ConnectionRequestCommand {
            mod_version: "0.0".to_string(),
            ..request("alice")
        },
    );

    assert!(!result.success);
    let reason = result.reason.unwrap();
    assert!(reason.contains("CSM Mod versions"));
    assert!(reason.contains("Client: 0.0"));
    assert!(reason.contains(&format!("Server: {}", csm::MOD_VERSION)));
}

#[test]
fn taken_username_is_rejected_and_others_pass() {
    let harness = Harness::server(host_config());
    harness.join(2, "alice");

    let taken = harness.connect(3, &request("alice"));
    assert!(!taken.success);
    assert_eq!(taken.reason.as_deref(), Some("This username is already in use."));

    let host = harness.connect(4, &request("Host"));
    assert!(!host.success);

    let other = harness.connect(5, &request("Alice"));
    assert!(other.success);
    assert_eq!(other.client_id, Some(5));

    let server = harness.session.server().unwrap();
    assert_eq!(server.player_count(), 2);
    assert!(!server.is_admitted(3));
}

#[test]
fn open_server_ignores_client_password() {
    for server_password in [None, Some(String::new())] {
        let harness = Harness::server(ServerConfig {
            password: server_password,
            ..host_config()
        });

        for (peer, password) in [(2, None), (3, Some("")), (4, Some("anything"))] {
            let result = harness.connect(
                peer,
                &ConnectionRequestCommand {
                    password: password.map(str::to_string),
                    ..request(&format!("player{peer}"))
                },
            );
            assert!(result.success, "{password:?}: {:?}", result.reason);
        }
    }
}

#[test]
fn protected_server_requires_exact_password() {
    let harness = Harness::server(ServerConfig {
        password: Some("hunter2".to_string()),
        ..host_config()
    });

    let attempts = [
        (2, None),
        (3, Some("")),
        (4, Some("Hunter2")),
        (5, Some("hunter2 ")),
    ];
    for (peer, password) in attempts {
        let result = harness.connect(
            peer,
            &ConnectionRequestCommand {
                password: password.map(str::to_string),
                ..request("alice")
            },
        );
        assert!(!result.success);
        assert_eq!(result.reason.as_deref(), Some("Invalid password for this server."));
    }

    let result = harness.connect(
        6,
        &ConnectionRequestCommand {
            password: Some("hunter2".to_string()),
            ..request("alice")
        },
    );
    assert!(result.success);
}

#[test]
fn any_differing_dlc_bit_is_rejected_with_server_mask() {
    let harness = Harness::server(host_config());

    let mut peer = 100;
    for bit in 0..16 {
        let client_mask = DlcMask::from_wire(SERVER_DLC.bits() ^ (1 << bit));
        peer += 1;
        let result = harness.connect(
            peer,
            &ConnectionRequestCommand {
                dlc_mask: client_mask,
                ..request("alice")
            },
        );

        assert!(!result.success, "bit {bit}");
        assert_eq!(result.dlc_mask, Some(SERVER_DLC));
        let reason = result.reason.unwrap();
        assert!(reason.starts_with("DLCs don't match"), "{reason}");
        assert!(reason.contains(&format!("Client: {:#x}", client_mask.bits())));
        assert!(reason.contains(&format!("Server: {:#x}", SERVER_DLC.bits())));
    }
    assert_eq!(harness.session.server().unwrap().player_count(), 0);
}

#[test]
fn world_is_attached_only_when_requested() {
    let harness = Harness::server(host_config());

    let with_world = harness.connect(2, &request("alice"));
    assert!(with_world.success);
    assert_eq!(with_world.client_id, Some(2));
    assert_eq!(with_world.world.as_deref(), Some(WORLD));

    let without_world = harness.connect(
        3,
        &ConnectionRequestCommand {
            request_world: false,
            ..request("bob")
        },
    );
    assert!(without_world.success);
    assert_eq!(without_world.client_id, Some(3));
    assert_eq!(without_world.world, None);
}

#[test]
fn admission_sends_world_info_and_announces_player() {
    let harness = Harness::server(host_config());
    harness.join(2, "alice");

    harness.connect(3, &request("bob"));

    let sent = harness.transport.take();
    let kinds: Vec<(u32, u16)> = sent.iter().map(|(peer, e)| (*peer, e.type_id)).collect();
    assert_eq!(
        kinds,
        vec![
            (3, CommandKind::ConnectionResult.id()),
            (3, CommandKind::WorldInfo.id()),
            (2, CommandKind::PlayerJoined.id()),
        ]
    );
    let joined = PlayerJoinedCommand::from_envelope(&sent[2].1).unwrap();
    assert_eq!(joined.username, "bob");

    let events = harness.drain_events();
    assert!(matches!(
        events.as_slice(),
        [SessionEvent::PlayerConnected { player }]
            if player.username == "bob" && player.peer_id == 3
    ));
}

#[test]
fn relays_reach_a_new_player_only_after_its_result() {
    let harness = Harness::server(host_config());
    harness.join(2, "alice");
    harness.join(4, "carol");

    // Carol's chat is relayed from another thread while bob's result is
    // about to go out.
    let session = Arc::clone(&harness.session);
    let outbox = Arc::clone(&harness.dispatcher.services().outbox);
    let relayed = AtomicBool::new(false);
    harness.transport.before_send(move |peer, bytes| {
        let is_result = Envelope::decode(bytes)
            .is_ok_and(|envelope| envelope.type_id == CommandKind::ConnectionResult.id());
        if peer == 3 && is_result && !relayed.swap(true, Ordering::SeqCst) {
            let chat = ChatMessageCommand {
                username: "carol".to_string(),
                message: "who is joining?".to_string(),
            };
            let server = session.server().expect("server session");
            server.broadcast(&chat, Some(4), &outbox);
        }
    });

    let result = harness.connect(3, &request("bob"));
    assert!(result.success);

    let sent = harness.transport.take();
    let to_bob: Vec<u16> = sent
        .iter()
        .filter(|(peer, _)| *peer == 3)
        .map(|(_, envelope)| envelope.type_id)
        .collect();
    assert_eq!(
        to_bob,
        vec![
            CommandKind::ConnectionResult.id(),
            CommandKind::WorldInfo.id()
        ]
    );
    assert!(sent.iter().any(|(peer, envelope)| {
        *peer == 2 && envelope.type_id == CommandKind::ChatMessage.id()
    }));
}

#[test]
fn full_server_rejects_new_players() {
    let harness = Harness::server(ServerConfig {
        max_players: 2,
        ..host_config()
    });
    harness.join(2, "alice");

    let result = harness.connect(3, &request("bob"));

    assert!(!result.success);
    assert_eq!(result.reason.as_deref(), Some("The server is full."));
}

#[test]
fn failed_result_send_rolls_back_admission() {
    let harness = Harness::server(host_config());
    harness.transport.fail_sends_to(2);

    let err = harness.send(2, &request("alice")).unwrap_err();

    assert!(matches!(err, DispatchError::HandlerFailed { .. }));
    assert!(!harness.session.server().unwrap().is_admitted(2));
    assert!(harness.drain_events().is_empty());
}

#[test]
fn concurrent_requests_for_one_name_admit_at_most_one() {
    let harness = Harness::server(host_config());

    thread::scope(|scope| {
        for peer in 2..18 {
            let harness = &harness;
            scope.spawn(move || {
                let _ = harness.send(peer, &request("alice"));
            });
        }
    });

    let server = harness.session.server().unwrap();
    let alices = server
        .players()
        .into_iter()
        .filter(|p| p.username == "alice")
        .count();
    assert_eq!(alices, 1);

    let accepted = (2..18)
        .filter_map(|peer| harness.result_for(peer))
        .filter(|result| result.success)
        .count();
    assert_eq!(accepted, 1);
}

#[test]
fn repeated_request_from_admitted_peer_is_refused() {
    let harness = Harness::server(host_config());
    harness.join(2, "alice");

    let err = harness.send(2, &request("alice2")).unwrap_err();

    assert!(matches!(err, DispatchError::DuplicateHandshake { peer: 2, .. }));
    assert!(harness.transport.take().is_empty());
}

#[test]
fn disconnect_is_idempotent() {
    let harness = Harness::server(host_config());
    harness.join(2, "alice");
    harness.join(3, "bob");
    let server = harness.session.server().unwrap();
    let outbox = &harness.dispatcher.services().outbox;

    let first = server.disconnect(2, DisconnectReason::Graceful, outbox);
    assert_eq!(first.map(|p| p.username), Some("alice".to_string()));
    let left: Vec<_> = harness.transport.take();
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].0, 3);
    assert_eq!(left[0].1.type_id, CommandKind::PlayerLeft.id());

    assert!(server.disconnect(2, DisconnectReason::Graceful, outbox).is_none());
    assert!(server.disconnect(99, DisconnectReason::Dropped, outbox).is_none());
    assert_eq!(server.player_count(), 1);
    assert!(harness.transport.take().is_empty());

    let events = harness.drain_events();
    assert_eq!(events.len(), 1);
}

#[test]
fn transport_disconnect_removes_player() {
    let harness = Harness::server(host_config());
    harness.join(2, "alice");

    harness.dispatcher.handle_transport_event(csm::TransportEvent::Disconnected {
        peer: 2,
        reason: DisconnectReason::Dropped,
    });
    harness.dispatcher.handle_transport_event(csm::TransportEvent::Disconnected {
        peer: 2,
        reason: DisconnectReason::Dropped,
    });

    assert!(!harness.session.server().unwrap().is_admitted(2));
    let events = harness.drain_events();
    assert!(matches!(
        events.as_slice(),
        [SessionEvent::PlayerDisconnected {
            player,
            reason: DisconnectReason::Dropped,
        }] if player.username == "alice"
    ));
}

#[test]
fn player_leaving_mid_handshake_is_never_announced() {
    let harness = Harness::server(host_config());
    harness.join(2, "alice");
    let server = harness.session.server().unwrap();
    server.admit(3, "bob").unwrap();

    harness.dispatcher.handle_transport_event(csm::TransportEvent::Disconnected {
        peer: 3,
        reason: DisconnectReason::Dropped,
    });

    assert!(harness.transport.take().is_empty());
    assert!(harness.drain_events().is_empty());
    assert!(!server.is_username_taken("bob"));
    assert_eq!(server.publish(3), None);
}
