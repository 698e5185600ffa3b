//! Integration tests for STATS.

mod common;

use std::sync::Arc;

use common::Harness;
use slircd_gate::message::Response;
use slircd_gate::state::hooks::{AdmissionHook, ModResult, StatsRows};
use slircd_gate::state::{OperInfo, PeerServer, User, UserRef};

/// `oper` holds servers/auspex, `bob` is a plain user.
fn setup() -> (Harness, UserRef, UserRef) {
    let mut h = Harness::new();
    let oper = h.register("oper", "192.0.2.1");
    h.oper(oper, &["servers/auspex"]);
    let bob = h.register("bob", "10.0.0.2");
    h.clear();
    (h, oper, bob)
}

/// Trailing texts of every `response` sent to `r`.
fn rows(h: &Harness, r: UserRef, response: Response) -> Vec<String> {
    h.sent(r)
        .iter()
        .filter(|msg| msg.response() == Some(response))
        .filter_map(|msg| msg.trailing().map(str::to_string))
        .collect()
}

#[test]
fn test_denied_symbol() {
    let (mut h, oper, bob) = setup();

    h.command(bob, "STATS k");

    assert_eq!(h.numerics(bob), vec![Response::ERR_NOPRIVILEGES]);
    let reply = h.find_numeric(bob, Response::ERR_NOPRIVILEGES).unwrap();
    assert_eq!(
        reply.trailing(),
        Some("Permission Denied - STATS k requires the servers/auspex priv.")
    );
    assert!(
        h.notices(oper)
            .contains(&"*** Stats 'k' denied for bob (bob@10.0.0.2)".to_string())
    );
}

#[test]
fn test_oper_without_auspex_is_denied() {
    let (mut h, oper, _bob) = setup();
    h.oper(oper, &[]);

    h.command(oper, "STATS z");
    assert_eq!(h.numerics(oper), vec![Response::ERR_NOPRIVILEGES]);
}

#[test]
fn test_public_uptime() {
    let (mut h, oper, bob) = setup();
    h.clock.advance(86_400 + 3600 + 60 + 1);

    h.command(bob, "STATS u");

    assert_eq!(
        h.sent(bob).iter().map(ToString::to_string).collect::<Vec<_>>(),
        vec![
            ":irc.test.net 242 bob :Server up 1 days, 01:01:01".to_string(),
            ":irc.test.net 219 bob u :End of /STATS report".to_string(),
        ]
    );
    assert!(
        h.notices(oper)
            .contains(&"*** Stats 'u' requested by bob (bob@10.0.0.2)".to_string())
    );
}

#[test]
fn test_operators_listing() {
    let (mut h, _oper, bob) = setup();
    let far = h.remote("farop", "198.51.100.1");
    h.matrix.set_oper(far, Some(OperInfo::new("NetAdmin")), "");
    let services = Arc::new(PeerServer::services("services.test.net", "2CC"));
    let nickserv = h
        .matrix
        .introduce_remote(User::remote(
            "2CCAAAAAA",
            "NickServ",
            "services",
            "services.test.net",
            "192.0.2.200".parse().unwrap(),
            services,
            common::harness::START,
        ))
        .unwrap();
    h.matrix.set_oper(nickserv, Some(OperInfo::new("Service")), "");
    h.clock.advance(90);

    h.command(bob, "STATS P");

    let listed = rows(&h, bob, Response::RPL_STATSDEBUG);
    assert_eq!(
        listed,
        vec![
            "oper (oper@192.0.2.1) Idle: 1m30s".to_string(),
            "farop (farop@farop.peer.example) Idle: unavailable".to_string(),
            "2 OPER(s)".to_string(),
        ]
    );
}

#[test]
fn test_counters() {
    let (mut h, oper, _bob) = setup();
    h.command(oper, "BOGUS");
    h.matrix.config.limits.max_clients = 2;
    h.connect("10.0.0.3");
    h.clear();

    h.command(oper, "STATS T");

    assert_eq!(
        rows(&h, oper, Response::RPL_STATSDEBUG),
        vec![
            "accepts 2 refused 1",
            "unknown commands 1",
            "nick collisions 0",
            "connection count 3",
        ]
    );
}

#[test]
fn test_store_sizes() {
    let (mut h, oper, bob) = setup();
    h.command(bob, "JOIN #c");
    h.command(oper, "KLINE *@198.51.100.1 :x");
    h.clear();

    h.command(oper, "STATS z");

    let listed = rows(&h, oper, Response::RPL_STATSDEBUG);
    assert_eq!(listed[0], "Users: 2");
    assert_eq!(listed[1], "Channels: 1");
    assert_eq!(listed[2], "Clone ranges: 2");
    assert_eq!(listed[3], "Invites: 0");
    assert_eq!(listed[4], "X-lines: 1");
    assert!(listed[5].starts_with("Commands: "));
}

#[test]
fn test_command_usage() {
    let (mut h, oper, bob) = setup();
    h.command(bob, "JOIN #a");
    h.command(bob, "JOIN #b");

    h.command(oper, "STATS m");

    let usage: Vec<Vec<String>> = h
        .sent(oper)
        .iter()
        .filter(|msg| msg.response() == Some(Response::RPL_STATSCOMMANDS))
        .map(|msg| match &msg.command {
            slircd_gate::message::Command::Response(_, params) => params[1..].to_vec(),
            _ => unreachable!(),
        })
        .collect();
    assert!(usage.contains(&vec!["JOIN".to_string(), "2".to_string()]));
    // NICK and USER from both registrations, STATS counted before it runs.
    assert!(usage.contains(&vec!["NICK".to_string(), "2".to_string()]));
    assert!(usage.contains(&vec!["STATS".to_string(), "1".to_string()]));
}

#[test]
fn test_link_info() {
    let (mut h, oper, _bob) = setup();
    h.clock.advance(30);

    h.command(oper, "STATS L");

    let listed = rows(&h, oper, Response::RPL_STATSLINKINFO);
    assert_eq!(
        listed[0],
        "nick[ident@ip] sendq cmds_out bytes_out cmds_in bytes_in time_open"
    );
    assert_eq!(listed.len(), 3);
    let fields: Vec<&str> = listed[2].split(' ').collect();
    assert_eq!(fields[0], "bob[bob@10.0.0.2]");
    assert_eq!(fields[1], "0");
    assert_eq!(fields[4], "2", "cmds_in");
    assert_eq!(fields[6], "30", "time_open");
}

#[test]
fn test_remote_requests() {
    let (mut h, oper, _bob) = setup();
    let eve = h.remote("eve", "198.51.100.8");
    let far = h.remote("farop", "198.51.100.9");
    h.matrix.set_oper(far, Some(OperInfo::new("NetAdmin")), "");
    h.clear();

    h.command(eve, "STATS k");
    assert_eq!(h.numerics(eve), vec![Response::ERR_NOPRIVILEGES]);
    assert!(
        h.notices(oper)
            .contains(&"*** Remote stats 'k' denied for eve (eve@eve.peer.example)".to_string())
    );

    // Remote operators need no specific privilege.
    h.command(far, "STATS k");
    assert_eq!(h.numerics(far), vec![Response::RPL_ENDOFSTATS]);
}

#[test]
fn test_other_server() {
    let (mut h, oper, bob) = setup();
    let penalty = |h: &Harness, r: UserRef| h.user(r).local.as_ref().unwrap().penalty;
    let before = penalty(&h, bob);

    h.command(bob, "STATS u elsewhere.test.net");
    assert!(h.sent(bob).is_empty());
    assert_eq!(penalty(&h, bob), before + 1000 + 2000);

    let before = penalty(&h, oper);
    h.command(oper, "STATS u elsewhere.test.net");
    assert_eq!(penalty(&h, oper), before + 1000);

    h.command(bob, "STATS u IRC.TEST.NET");
    assert!(h.numerics(bob).contains(&Response::RPL_ENDOFSTATS));
}

#[test]
fn test_hook_answers() {
    struct Motd;

    impl AdmissionHook for Motd {
        fn name(&self) -> &'static str {
            "stats-motd"
        }

        fn on_stats(&self, symbol: char, _source: &User, rows: &mut StatsRows) -> ModResult {
            if symbol != 'u' {
                return ModResult::Passthrough;
            }
            rows.push((Response::RPL_STATSDEBUG, vec!["custom".into()]));
            ModResult::Allow
        }
    }

    let (mut h, _oper, bob) = setup();
    h.matrix.hooks.register(Arc::new(Motd));

    h.command(bob, "STATS u");
    assert_eq!(
        h.numerics(bob),
        vec![Response::RPL_STATSDEBUG, Response::RPL_ENDOFSTATS]
    );
    assert_eq!(rows(&h, bob, Response::RPL_STATSDEBUG), vec!["custom".to_string()]);
}

#[test]
fn test_missing_symbol() {
    let (mut h, _oper, bob) = setup();
    h.command(bob, "STATS");
    assert_eq!(h.numerics(bob), vec![Response::ERR_NEEDMOREPARAMS]);
}
