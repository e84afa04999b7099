use arbor_peer_service::{LinkState, Route, route};
use codec::{Address, Payload};

fn address(last: u8) -> Address {
    Address::new([10, 0, 0, last].into(), 20_000)
}

fn client_link() -> LinkState {
    let mut link = LinkState::default();
    link.attach(address(1));
    link.add_child(address(3));
    link.add_child(address(4));
    link
}

fn root_link() -> LinkState {
    let mut link = LinkState::default();
    link.add_child(address(2));
    link.add_child(address(5));
    link
}

fn hello() -> Payload {
    Payload::ReunionHello {
        path: vec![address(9)],
    }
}

fn helloback() -> Payload {
    Payload::ReunionHelloBack {
        path: vec![address(9)],
    }
}

fn message() -> Payload {
    Payload::Message {
        text: "HELLO".to_string(),
    }
}

#[test]
fn hellos_rise_to_the_parent_only() {
    assert_eq!(
        route(&hello(), false, &client_link(), None),
        Route::Targets(vec![address(1)])
    );

    // The root is the terminus.
    assert_eq!(route(&hello(), true, &root_link(), None), Route::Drop);

    // No parent, nowhere to rise.
    assert_eq!(route(&hello(), false, &LinkState::default(), None), Route::Drop);
}

#[test]
fn hellobacks_fall_to_the_children() {
    assert_eq!(
        route(&helloback(), false, &client_link(), None),
        Route::Targets(vec![address(3), address(4)])
    );
    assert_eq!(
        route(&helloback(), true, &root_link(), None),
        Route::Targets(vec![address(2), address(5)])
    );
}

#[test]
fn messages_spread_both_ways() {
    assert_eq!(
        route(&message(), false, &client_link(), None),
        Route::Targets(vec![address(1), address(3), address(4)])
    );

    // The root has no parent to include.
    assert_eq!(
        route(&message(), true, &root_link(), None),
        Route::Targets(vec![address(2), address(5)])
    );
}

#[test]
fn arrival_link_is_excluded_from_the_spread() {
    // Arrived from the parent: forwarded downward only.
    assert_eq!(
        route(&message(), false, &client_link(), Some(address(1))),
        Route::Targets(vec![address(3), address(4)])
    );

    // Arrived from a child: forwarded up and to the sibling.
    assert_eq!(
        route(&message(), false, &client_link(), Some(address(3))),
        Route::Targets(vec![address(1), address(4)])
    );

    // A leaf that heard it from its parent has nowhere left to send.
    let mut leaf = LinkState::default();
    leaf.attach(address(1));
    assert_eq!(route(&message(), false, &leaf, Some(address(1))), Route::Drop);
}

#[test]
fn control_requests_stay_on_the_register_link() {
    let requests = [
        Payload::RegisterReq {
            address: address(9),
        },
        Payload::AdvertiseReq,
    ];

    for request in &requests {
        assert_eq!(
            route(request, false, &client_link(), None),
            Route::RegisterLink
        );
        assert_eq!(route(request, true, &root_link(), None), Route::Drop);
    }
}

#[test]
fn data_traffic_never_touches_the_register_link() {
    // Every broadcastable data payload resolves to explicit data-link
    // targets, never to the register link.
    let data = [hello(), helloback(), message(), Payload::Join];

    for payload in &data {
        for (is_root, link) in [(false, client_link()), (true, root_link())] {
            assert_ne!(route(payload, is_root, &link, None), Route::RegisterLink);
        }
    }
}

#[test]
fn responses_are_never_broadcast() {
    let responses = [
        Payload::RegisterRes,
        Payload::AdvertiseRes {
            neighbor: address(9),
        },
        Payload::Join,
    ];

    for response in &responses {
        assert_eq!(route(response, false, &client_link(), None), Route::Drop);
    }
}
