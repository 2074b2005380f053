//! Pattern engine semantics over the in-process transport.

use filament::{FilamentError, Flags, Pattern, Socket, SocketOption};
use std::time::Duration;

fn recv_now(socket: &Socket) -> Option<Vec<u8>> {
    socket
        .recv(Flags::DONTWAIT)
        .unwrap()
        .map(|m| m.as_ref().to_vec())
}

#[test]
fn pair_exchanges_both_ways() {
    filament::dev_tracing::init_tracing();
    let a = Socket::open(Pattern::Pair);
    a.bind("inproc://pattern-pair").unwrap();
    let b = Socket::open(Pattern::Pair);
    b.connect("inproc://pattern-pair").unwrap();

    b.send("ping", Flags::NONE).unwrap();
    assert_eq!(a.recv(Flags::NONE).unwrap().unwrap().as_ref(), b"ping");

    a.send("pong", Flags::NONE).unwrap();
    assert_eq!(b.recv(Flags::NONE).unwrap().unwrap().as_ref(), b"pong");
}

#[test]
fn send_with_no_peers_would_blocks_for_every_sending_pattern() {
    filament::dev_tracing::init_tracing();
    for pattern in [
        Pattern::Pair,
        Pattern::Pub,
        Pattern::Push,
        Pattern::Req,
        Pattern::Bus,
        Pattern::Surveyor,
    ] {
        let socket = Socket::open(pattern);
        assert_eq!(
            socket.send("orphan", Flags::DONTWAIT).unwrap(),
            None,
            "{pattern} should report would-block, not an error"
        );
    }
}

#[test]
fn pub_broadcasts_to_all_subscribers() {
    filament::dev_tracing::init_tracing();
    let publisher = Socket::open(Pattern::Pub);
    publisher.bind("inproc://pattern-pub-fanout").unwrap();

    let sub_a = Socket::open(Pattern::Sub);
    sub_a.connect("inproc://pattern-pub-fanout").unwrap();
    sub_a
        .set_option(SocketOption::Subscribe(bytes::Bytes::new()))
        .unwrap();

    let sub_b = Socket::open(Pattern::Sub);
    sub_b.connect("inproc://pattern-pub-fanout").unwrap();
    sub_b
        .set_option(SocketOption::Subscribe(bytes::Bytes::new()))
        .unwrap();

    publisher.send("news", Flags::NONE).unwrap();
    assert_eq!(recv_now(&sub_a).unwrap(), b"news");
    assert_eq!(recv_now(&sub_b).unwrap(), b"news");
}

#[test]
fn sub_filters_by_topic_prefix() {
    filament::dev_tracing::init_tracing();
    let publisher = Socket::open(Pattern::Pub);
    publisher.bind("inproc://pattern-sub-filter").unwrap();

    let subscriber = Socket::open(Pattern::Sub);
    subscriber.connect("inproc://pattern-sub-filter").unwrap();
    subscriber
        .set_option(SocketOption::Subscribe(bytes::Bytes::from_static(b"topic")))
        .unwrap();

    publisher.send("other.ignored", Flags::NONE).unwrap();
    publisher.send("topic.kept", Flags::NONE).unwrap();

    // the non-matching message is dropped silently, never surfaced
    assert_eq!(recv_now(&subscriber).unwrap(), b"topic.kept");
    assert_eq!(recv_now(&subscriber), None);
}

#[test]
fn unsubscribe_removes_exactly_that_prefix() {
    filament::dev_tracing::init_tracing();
    let publisher = Socket::open(Pattern::Pub);
    publisher.bind("inproc://pattern-sub-unsub").unwrap();

    let subscriber = Socket::open(Pattern::Sub);
    subscriber.connect("inproc://pattern-sub-unsub").unwrap();
    subscriber
        .set_option(SocketOption::Subscribe(bytes::Bytes::from_static(b"a.")))
        .unwrap();
    subscriber
        .set_option(SocketOption::Subscribe(bytes::Bytes::from_static(b"b.")))
        .unwrap();
    subscriber
        .set_option(SocketOption::Unsubscribe(bytes::Bytes::from_static(b"a.")))
        .unwrap();

    publisher.send("a.dropped", Flags::NONE).unwrap();
    publisher.send("b.kept", Flags::NONE).unwrap();

    assert_eq!(recv_now(&subscriber).unwrap(), b"b.kept");
    assert_eq!(recv_now(&subscriber), None);
}

#[test]
fn subscribe_on_non_sub_socket_is_unsupported() {
    filament::dev_tracing::init_tracing();
    let publisher = Socket::open(Pattern::Pub);
    let err = publisher
        .set_option(SocketOption::Subscribe(bytes::Bytes::new()))
        .unwrap_err();
    assert!(matches!(err, FilamentError::UnsupportedOption(_)));
}

#[test]
fn push_round_robins_across_pull_peers() {
    filament::dev_tracing::init_tracing();
    let push = Socket::open(Pattern::Push);
    push.bind("inproc://pattern-push-rr").unwrap();

    let pulls: Vec<Socket> = (0..3)
        .map(|_| {
            let pull = Socket::open(Pattern::Pull);
            pull.connect("inproc://pattern-push-rr").unwrap();
            pull
        })
        .collect();

    // force the accept of all three links before distributing
    push.send("m0", Flags::NONE).unwrap();
    push.send("m1", Flags::NONE).unwrap();
    push.send("m2", Flags::NONE).unwrap();

    // assignment starts from the first connected peer
    for (i, pull) in pulls.iter().enumerate() {
        let expected = format!("m{i}");
        assert_eq!(recv_now(pull).unwrap(), expected.as_bytes());
        assert_eq!(recv_now(pull), None, "peer {i} got more than one message");
    }
}

#[test]
fn pull_fair_queues_across_push_peers() {
    filament::dev_tracing::init_tracing();
    let pull = Socket::open(Pattern::Pull);
    pull.bind("inproc://pattern-pull-fq").unwrap();

    let push_a = Socket::open(Pattern::Push);
    push_a.connect("inproc://pattern-pull-fq").unwrap();
    let push_b = Socket::open(Pattern::Push);
    push_b.connect("inproc://pattern-pull-fq").unwrap();

    push_a.send("a1", Flags::NONE).unwrap();
    push_a.send("a2", Flags::NONE).unwrap();
    push_b.send("b1", Flags::NONE).unwrap();

    let mut got = vec![
        recv_now(&pull).unwrap(),
        recv_now(&pull).unwrap(),
        recv_now(&pull).unwrap(),
    ];
    got.sort();
    assert_eq!(got, vec![b"a1".to_vec(), b"a2".to_vec(), b"b1".to_vec()]);
    assert_eq!(recv_now(&pull), None);
}

#[test]
fn req_enforces_strict_alternation() {
    filament::dev_tracing::init_tracing();
    let rep = Socket::open(Pattern::Rep);
    rep.bind("inproc://pattern-req-alt").unwrap();
    let req = Socket::open(Pattern::Req);
    req.connect("inproc://pattern-req-alt").unwrap();

    // recv before any send is a state machine violation
    assert!(matches!(
        req.recv(Flags::DONTWAIT),
        Err(FilamentError::ProtocolViolation(_))
    ));

    req.send("question", Flags::NONE).unwrap();
    let err = req.send("again", Flags::DONTWAIT).unwrap_err();
    assert!(matches!(err, FilamentError::ProtocolViolation(_)));

    assert_eq!(rep.recv(Flags::NONE).unwrap().unwrap().as_ref(), b"question");
    rep.send("answer", Flags::NONE).unwrap();
    assert_eq!(req.recv(Flags::NONE).unwrap().unwrap().as_ref(), b"answer");

    // alternation resets after the reply arrives
    req.send("next", Flags::NONE).unwrap();
}

#[test]
fn rep_routes_replies_to_the_originating_peer() {
    filament::dev_tracing::init_tracing();
    let rep = Socket::open(Pattern::Rep);
    rep.bind("inproc://pattern-rep-route").unwrap();

    let req_a = Socket::open(Pattern::Req);
    req_a.connect("inproc://pattern-rep-route").unwrap();
    let req_b = Socket::open(Pattern::Req);
    req_b.connect("inproc://pattern-rep-route").unwrap();

    req_a.send("from-a", Flags::NONE).unwrap();
    req_b.send("from-b", Flags::NONE).unwrap();

    // serve both requests, interleaved across peers
    for _ in 0..2 {
        let request = rep.recv(Flags::NONE).unwrap().unwrap();
        let mut reply = b"re:".to_vec();
        reply.extend_from_slice(request.as_ref());
        rep.send(reply, Flags::NONE).unwrap();
    }

    assert_eq!(req_a.recv(Flags::NONE).unwrap().unwrap().as_ref(), b"re:from-a");
    assert_eq!(req_b.recv(Flags::NONE).unwrap().unwrap().as_ref(), b"re:from-b");
}

#[test]
fn rep_recv_with_an_unanswered_request_is_a_violation() {
    filament::dev_tracing::init_tracing();
    let rep = Socket::open(Pattern::Rep);
    rep.bind("inproc://pattern-rep-alt").unwrap();

    let req_a = Socket::open(Pattern::Req);
    req_a.connect("inproc://pattern-rep-alt").unwrap();
    let req_b = Socket::open(Pattern::Req);
    req_b.connect("inproc://pattern-rep-alt").unwrap();

    req_a.send("from-a", Flags::NONE).unwrap();
    req_b.send("from-b", Flags::NONE).unwrap();

    assert_eq!(rep.recv(Flags::NONE).unwrap().unwrap().as_ref(), b"from-a");

    // pulling a second request would discard the first correlation
    assert!(matches!(
        rep.recv(Flags::DONTWAIT),
        Err(FilamentError::ProtocolViolation(_))
    ));

    // the first requester still gets its reply, then the second is served
    rep.send("re:from-a", Flags::NONE).unwrap();
    assert_eq!(
        req_a.recv(Flags::NONE).unwrap().unwrap().as_ref(),
        b"re:from-a"
    );
    assert_eq!(rep.recv(Flags::NONE).unwrap().unwrap().as_ref(), b"from-b");
    rep.send("re:from-b", Flags::NONE).unwrap();
    assert_eq!(
        req_b.recv(Flags::NONE).unwrap().unwrap().as_ref(),
        b"re:from-b"
    );
}

#[test]
fn reply_to_a_departed_requester_is_dropped_silently() {
    filament::dev_tracing::init_tracing();
    let rep = Socket::open(Pattern::Rep);
    rep.bind("inproc://pattern-rep-departed").unwrap();

    let req = Socket::open(Pattern::Req);
    req.connect("inproc://pattern-rep-departed").unwrap();
    req.send("doomed", Flags::NONE).unwrap();
    assert_eq!(rep.recv(Flags::NONE).unwrap().unwrap().as_ref(), b"doomed");

    // requester leaves before the reply; the send still succeeds
    req.close();
    assert_eq!(rep.send("into the void", Flags::DONTWAIT).unwrap(), Some(13));

    // the server is free to serve the next request
    let next = Socket::open(Pattern::Req);
    next.connect("inproc://pattern-rep-departed").unwrap();
    next.send("alive", Flags::NONE).unwrap();
    assert_eq!(rep.recv(Flags::NONE).unwrap().unwrap().as_ref(), b"alive");
    rep.send("welcome", Flags::NONE).unwrap();
    assert_eq!(next.recv(Flags::NONE).unwrap().unwrap().as_ref(), b"welcome");
}

#[test]
fn rep_send_without_request_is_a_violation() {
    filament::dev_tracing::init_tracing();
    let rep = Socket::open(Pattern::Rep);
    rep.bind("inproc://pattern-rep-norequest").unwrap();
    let err = rep.send("unprompted", Flags::DONTWAIT).unwrap_err();
    assert!(matches!(err, FilamentError::ProtocolViolation(_)));
}

#[test]
fn bus_broadcasts_without_loop_back() {
    filament::dev_tracing::init_tracing();
    let hub = Socket::open(Pattern::Bus);
    hub.bind("inproc://pattern-bus").unwrap();

    let spoke_a = Socket::open(Pattern::Bus);
    spoke_a.connect("inproc://pattern-bus").unwrap();
    let spoke_b = Socket::open(Pattern::Bus);
    spoke_b.connect("inproc://pattern-bus").unwrap();

    hub.send("from-hub", Flags::NONE).unwrap();
    assert_eq!(recv_now(&spoke_a).unwrap(), b"from-hub");
    assert_eq!(recv_now(&spoke_b).unwrap(), b"from-hub");

    // the sender never sees its own message
    assert_eq!(recv_now(&hub), None);

    spoke_a.send("from-a", Flags::NONE).unwrap();
    assert_eq!(recv_now(&hub).unwrap(), b"from-a");
    assert_eq!(recv_now(&spoke_a), None);
}

#[test]
fn surveyor_collects_responses_within_the_deadline() {
    filament::dev_tracing::init_tracing();
    let surveyor = Socket::open(Pattern::Surveyor);
    surveyor.bind("inproc://pattern-survey").unwrap();
    surveyor
        .set_option(SocketOption::SurveyDeadline(Duration::from_secs(5)))
        .unwrap();

    let resp_a = Socket::open(Pattern::Respondent);
    resp_a.connect("inproc://pattern-survey").unwrap();
    let resp_b = Socket::open(Pattern::Respondent);
    resp_b.connect("inproc://pattern-survey").unwrap();

    surveyor.send("vote?", Flags::NONE).unwrap();

    for (resp, answer) in [(&resp_a, "yes"), (&resp_b, "no")] {
        assert_eq!(resp.recv(Flags::NONE).unwrap().unwrap().as_ref(), b"vote?");
        resp.send(answer, Flags::NONE).unwrap();
    }

    let mut answers = vec![
        surveyor.recv(Flags::NONE).unwrap().unwrap().as_ref().to_vec(),
        surveyor.recv(Flags::NONE).unwrap().unwrap().as_ref().to_vec(),
    ];
    answers.sort();
    assert_eq!(answers, vec![b"no".to_vec(), b"yes".to_vec()]);
}

#[test]
fn survey_responses_after_the_deadline_are_dropped() {
    filament::dev_tracing::init_tracing();
    let surveyor = Socket::open(Pattern::Surveyor);
    surveyor.bind("inproc://pattern-survey-late").unwrap();
    surveyor
        .set_option(SocketOption::SurveyDeadline(Duration::from_millis(20)))
        .unwrap();

    let respondent = Socket::open(Pattern::Respondent);
    respondent.connect("inproc://pattern-survey-late").unwrap();

    surveyor.send("quick!", Flags::NONE).unwrap();
    assert_eq!(
        respondent.recv(Flags::NONE).unwrap().unwrap().as_ref(),
        b"quick!"
    );

    std::thread::sleep(Duration::from_millis(40));
    respondent.send("too-late", Flags::NONE).unwrap();

    assert!(matches!(
        surveyor.recv(Flags::DONTWAIT),
        Err(FilamentError::ProtocolViolation(_))
    ));
}

#[test]
fn surveyor_recv_without_survey_is_a_violation() {
    filament::dev_tracing::init_tracing();
    let surveyor = Socket::open(Pattern::Surveyor);
    assert!(matches!(
        surveyor.recv(Flags::DONTWAIT),
        Err(FilamentError::ProtocolViolation(_))
    ));
}

#[test]
fn stale_survey_responses_are_discarded() {
    filament::dev_tracing::init_tracing();
    let surveyor = Socket::open(Pattern::Surveyor);
    surveyor.bind("inproc://pattern-survey-stale").unwrap();
    surveyor
        .set_option(SocketOption::SurveyDeadline(Duration::from_secs(5)))
        .unwrap();

    let respondent = Socket::open(Pattern::Respondent);
    respondent.connect("inproc://pattern-survey-stale").unwrap();

    // first survey gets answered, but a second survey supersedes it
    surveyor.send("round-1", Flags::NONE).unwrap();
    assert_eq!(
        respondent.recv(Flags::NONE).unwrap().unwrap().as_ref(),
        b"round-1"
    );
    surveyor.send("round-2", Flags::NONE).unwrap();
    respondent.send("answer-1", Flags::NONE).unwrap();

    // the answer to round-1 carries a stale id and never surfaces
    assert_eq!(surveyor.recv(Flags::DONTWAIT).unwrap(), None);
}
