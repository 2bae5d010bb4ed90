// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use super::*;

fn dispatcher() -> RouteDispatcher {
    RouteDispatcher::new().expect("default pattern compiles")
}

#[test]
fn test_pattern_to_regex() {
    assert_eq!(
        pattern_to_regex("/*/voip/turnServer"),
        "^/([^/].*)/voip/turnServer$"
    );
    assert_eq!(pattern_to_regex("/a.b"), "^/a\\.b$");
}

#[test]
fn test_matrix_turn_server_paths_match() {
    let dispatcher = dispatcher();

    assert_eq!(
        dispatcher.dispatch(&Method::GET, "/_matrix/voip/turnServer"),
        Route::TurnServer {
            prefix: "_matrix".to_string()
        }
    );
    assert_eq!(
        dispatcher.dispatch(&Method::GET, "/_matrix/client/v3/voip/turnServer"),
        Route::TurnServer {
            prefix: "_matrix/client/v3".to_string()
        }
    );
    assert_eq!(
        dispatcher.dispatch(&Method::GET, "/_matrix/client/r0/voip/turnServer"),
        Route::TurnServer {
            prefix: "_matrix/client/r0".to_string()
        }
    );
}

#[test]
fn test_prefix_must_be_non_empty() {
    let dispatcher = dispatcher();

    assert_eq!(dispatcher.dispatch(&Method::GET, "/voip/turnServer"), Route::Forward);
    assert_eq!(dispatcher.dispatch(&Method::GET, "//voip/turnServer"), Route::Forward);
}

#[test]
fn test_near_misses_are_forwarded() {
    let dispatcher = dispatcher();

    for path in [
        "/_matrix/voip/turnServer/",
        "/_matrix/voip/turnserver",
        "/_matrix/voip/turnServerX",
        "/_matrix/client/v3/sync",
        "/",
        "",
    ] {
        assert_eq!(dispatcher.dispatch(&Method::GET, path), Route::Forward, "{path}");
    }
}

#[test]
fn test_only_get_is_credential_bearing() {
    let dispatcher = dispatcher();
    let path = "/_matrix/client/v3/voip/turnServer";

    for method in [
        Method::POST,
        Method::PUT,
        Method::DELETE,
        Method::PATCH,
        Method::HEAD,
        Method::OPTIONS,
    ] {
        assert_eq!(dispatcher.dispatch(&method, path), Route::Forward, "{method}");
    }
}

#[test]
fn test_route_names() {
    assert_eq!(Route::Forward.name(), "forward");
    assert_eq!(
        Route::TurnServer {
            prefix: String::new()
        }
        .name(),
        "turn_server"
    );
}
