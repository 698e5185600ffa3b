//! Integration tests for the X-line commands and the insane-ban check.

mod common;

use common::{Harness, Observed};
use slircd_gate::message::{Command, Response};
use slircd_gate::security::{XLine, XLineKind};
use slircd_gate::state::UserRef;
use slircd_gate::state::outbox::Outgoing;

/// An operator plus `n` users on 10.0.0.2 .. 10.0.0.(n+1).
fn network(n: u8) -> (Harness, UserRef, Vec<UserRef>) {
    let mut h = Harness::new();
    let oper = h.register("oper", "192.0.2.1");
    h.oper(oper, &[]);
    let users = (0..n)
        .map(|i| h.register(&format!("user{i}"), &format!("10.0.0.{}", i + 2)))
        .collect();
    h.clear();
    (h, oper, users)
}

#[test]
fn test_xlines_need_oper() {
    let (mut h, _oper, users) = network(1);

    h.command(users[0], "KLINE *@10.0.0.2 :nope");
    assert_eq!(h.numerics(users[0]), vec![Response::ERR_NOPRIVILEGES]);
    assert!(h.matrix.xlines.is_empty());

    h.command(users[0], "UNKLINE *@10.0.0.2");
    assert_eq!(
        h.numerics(users[0]),
        vec![Response::ERR_NOPRIVILEGES, Response::ERR_NOPRIVILEGES]
    );
}

#[test]
fn test_kline_disconnects_matching_users() {
    let (mut h, oper, users) = network(2);
    let victim = users[0];
    let victim_uid = h.uid(victim);

    h.command(oper, "KLINE *@10.0.0.2 :spamming");

    assert!(!h.is_alive(victim));
    assert!(h.is_alive(users[1]));
    assert!(
        h.notices(oper)
            .contains(&"*** Added K-line on *@10.0.0.2 (1 affected)".to_string())
    );

    let events = h.outbox.events_for(&victim_uid);
    let Some(Outgoing::Message(error)) = events.first() else {
        panic!("expected ERROR first, got {events:?}");
    };
    assert_eq!(
        error.command,
        Command::Error("Closing link: (user0@10.0.0.2) [K-Lined: spamming]".into())
    );
    assert_eq!(events.last(), Some(&Outgoing::Close));

    // K-lines stay on this server.
    assert!(
        !h.observer
            .seen()
            .iter()
            .any(|event| matches!(event, Observed::BanAdd { .. }))
    );
}

#[test]
fn test_gline_is_propagated() {
    let (mut h, oper, _users) = network(1);

    h.command(oper, "GLINE *@203.0.113.* 1d :botnet");
    assert!(h.observer.seen().contains(&Observed::BanAdd {
        kind: XLineKind::G,
        mask: "*@203.0.113.*".into(),
    }));

    h.command(oper, "UNGLINE *@203.0.113.*");
    assert!(h.observer.seen().contains(&Observed::BanRemove {
        kind: XLineKind::G,
        mask: "*@203.0.113.*".into(),
    }));
    assert!(h.matrix.xlines.is_empty());
}

#[test]
fn test_insane_mask_rejected() {
    let (mut h, oper, users) = network(5);

    h.command(oper, "GLINE * 1h :everyone");

    assert!(h.matrix.xlines.is_empty());
    assert!(users.iter().all(|user| h.is_alive(*user)));
    let notices = h.notices(oper);
    assert!(notices.contains(
        &"*** WARNING: oper tried to set a G-line mask of *@*, which covers 100.00% of the network!"
            .to_string()
    ));
    assert!(notices.contains(
        &"*** G-line mask *@* covers 100.00% of the network and was not added".to_string()
    ));
    assert!(h.observer.seen().is_empty());
}

#[test]
fn test_mask_under_trigger_is_sane() {
    // 5 of 6 identities is 83.33%, under the default trigger.
    let (mut h, oper, users) = network(5);

    h.command(oper, "KLINE *@10.0.0.* :subnet");
    assert_eq!(h.matrix.xlines.len(), 1);
    assert!(users.iter().all(|user| !h.is_alive(*user)));
    assert!(h.is_alive(oper));
}

#[test]
fn test_insane_bypass() {
    let mut config = Harness::config();
    config.insane.hostmasks = true;
    let mut h = Harness::with_config(config);
    let oper = h.register("oper", "192.0.2.1");
    h.oper(oper, &[]);

    h.command(oper, "ELINE *@* :trust everyone");
    assert_eq!(h.matrix.xlines.len(), 1);
    assert!(h.user(oper).exempt);
}

#[test]
fn test_peer_rules_skip_insane_check() {
    let (mut h, _oper, users) = network(2);
    let line = XLine::new(XLineKind::G, "*@*", "network wide", "peer", h.matrix.now(), 0).unwrap();

    let applied = h.matrix.add_xline(line, false).unwrap();
    h.matrix.cull();

    assert_eq!(applied.affected, 3);
    assert!(users.iter().all(|user| !h.is_alive(*user)));
    // Rules from peers are not sent back.
    assert!(
        !h.observer
            .seen()
            .iter()
            .any(|event| matches!(event, Observed::BanAdd { .. }))
    );
}

#[test]
fn test_nick_expands_to_host() {
    let (mut h, oper, users) = network(2);

    h.command(oper, "KLINE user0 1h :bye");
    assert!(h.matrix.xlines.get(XLineKind::K, "*@10.0.0.2").is_some());
    assert!(!h.is_alive(users[0]));

    h.command(oper, "ZLINE user1 :bye");
    assert!(h.matrix.xlines.get(XLineKind::Z, "10.0.0.3").is_some());

    // Unknown nicks are taken as host masks.
    h.command(oper, "KLINE nobody :bye");
    assert!(h.matrix.xlines.get(XLineKind::K, "*@nobody").is_some());
}

#[test]
fn test_invalid_masks_and_durations() {
    let (mut h, oper, _users) = network(1);

    h.command(oper, "ZLINE bob@198.51.100.1 :x");
    h.command(oper, "QLINE nick!*@* :x");
    h.command(oper, "KLINE *@198.51.100.1 soon :x");
    h.command(oper, "RLINE (unclosed :x");

    let notices = h.notices(oper);
    assert_eq!(notices.len(), 4, "{notices:?}");
    assert_eq!(
        notices[0],
        "*** invalid Z-line mask: Z-lines cannot include a username"
    );
    assert_eq!(notices[1], "*** invalid Q-line mask: Q-lines match nicknames only");
    assert_eq!(notices[2], "*** Invalid duration for kline");
    assert!(notices[3].starts_with("*** invalid regular expression"));
    assert!(h.matrix.xlines.is_empty());

    h.command(oper, "KLINE");
    assert!(h.numerics(oper).contains(&Response::ERR_NEEDMOREPARAMS));
}

#[test]
fn test_replacing_a_rule() {
    let (mut h, oper, _users) = network(1);

    h.command(oper, "KLINE *@198.51.100.1 1h :first");
    h.command(oper, "KLINE 198.51.100.1 :second");

    assert_eq!(h.matrix.xlines.len(), 1);
    let line = h.matrix.xlines.get(XLineKind::K, "*@198.51.100.1").unwrap();
    assert_eq!(line.reason, "second");
    assert_eq!(line.duration, 0);
    assert!(
        h.notices(oper)
            .contains(&"*** Updated K-line on *@198.51.100.1".to_string())
    );
}

#[test]
fn test_unkline() {
    let (mut h, oper, _users) = network(1);
    h.command(oper, "KLINE *@198.51.100.1 :x");
    h.clear();

    h.command(oper, "UNKLINE *@198.51.100.9");
    h.command(oper, "UNKLINE 198.51.100.1");

    let notices = h.notices(oper);
    assert!(notices.contains(&"*** K-line *@198.51.100.9 not found on the list.".to_string()));
    assert!(notices.contains(&"*** Removed K-line on *@198.51.100.1".to_string()));
    assert!(h.matrix.xlines.is_empty());
}

#[test]
fn test_kline_refuses_new_connections_until_expiry() {
    let (mut h, oper, _users) = network(0);
    h.command(oper, "KLINE *@10.0.0.9 60 :later");

    let admission = h.connect("10.0.0.9");
    assert!(!admission.is_accepted());
    assert_eq!(h.matrix.stats.refused, 1);

    h.clock.advance(60);
    let report = h.matrix.maintenance();
    assert_eq!(report.xlines_expired, 1);
    assert!(h.matrix.xlines.is_empty());
    assert!(
        h.notices(oper)
            .iter()
            .any(|text| text.starts_with("*** Removing expired K-line *@10.0.0.9 (set by oper"))
    );

    assert!(h.connect("10.0.0.9").is_accepted());
}

#[test]
fn test_zline_applies_before_registration() {
    let (mut h, oper, _users) = network(0);
    h.command(oper, "ZLINE 198.51.100.0/24 :range");

    match h.connect("198.51.100.77") {
        slircd_gate::state::Admission::Refused { reason, .. } => {
            assert_eq!(reason, "Z-Lined: range");
        }
        other => panic!("expected refusal, got {other:?}"),
    }
}

#[test]
fn test_kline_checked_at_registration() {
    let (mut h, oper, _users) = network(0);
    h.command(oper, "KLINE baduser@* :ident ban");

    // The ident is unknown until USER arrives.
    let admission = h.connect("10.0.0.20");
    assert!(admission.is_accepted());
    let r = admission.user();
    h.command(r, "NICK someone");
    h.command(r, "USER baduser 0 * :Some One");

    assert!(!h.is_alive(r));
}

#[test]
fn test_qline_renames_and_blocks_nick() {
    let (mut h, oper, users) = network(2);
    h.command(users[0], "NICK Reserved");
    h.clear();

    h.command(oper, "QLINE reserved :services only");

    let uid = h.uid(users[0]);
    assert_eq!(h.user(users[0]).nick.as_deref(), Some(uid.as_str()));
    assert!(h.sent(users[0]).iter().any(|msg| msg.command == Command::Nick(uid.clone())));

    h.command(users[1], "NICK RESERVED");
    let reply = h
        .find_numeric(users[1], Response::ERR_ERRONEUSNICKNAME)
        .expect("432 expected");
    assert_eq!(reply.trailing(), Some("Invalid nickname: services only"));
    assert_eq!(h.user(users[1]).nick.as_deref(), Some("user1"));
}

#[test]
fn test_eline_exempts_until_removed() {
    let (mut h, oper, users) = network(2);

    h.command(oper, "ELINE *@10.0.0.2 :trusted");
    assert!(h.user(users[0]).exempt);

    h.command(oper, "KLINE *@10.0.0.* :subnet");
    assert!(h.is_alive(users[0]));
    assert!(!h.is_alive(users[1]));

    h.command(oper, "UNELINE *@10.0.0.2");
    assert!(!h.is_alive(users[0]));
}

#[test]
fn test_rline_matches_realname() {
    let (mut h, oper, users) = network(1);
    let bot = h.register("spambot", "10.0.0.50");

    h.command(oper, "RLINE ^spambot!.*\\stest$ :bots");

    assert!(!h.is_alive(bot));
    assert!(h.is_alive(users[0]));
    assert!(h.observer.seen().contains(&Observed::BanAdd {
        kind: XLineKind::R,
        mask: "^spambot!.*\\stest$".into(),
    }));
}

#[test]
fn test_stats_lists_lines() {
    let (mut h, oper, _users) = network(0);
    h.oper(oper, &["servers/auspex"]);
    h.command(oper, "KLINE *@198.51.100.1 1h :first");
    h.clear();

    h.command(oper, "STATS k");

    let row = h.find_numeric(oper, Response::RPL_STATSXLINE).expect("223");
    assert_eq!(
        row.to_string(),
        format!(
            ":irc.test.net 223 oper K *@198.51.100.1 {} 3600 oper first",
            common::harness::START
        )
    );
}
