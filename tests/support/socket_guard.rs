//! Mock server startup for tests that need a localhost socket.

use std::net::TcpListener;

use wiremock::MockServer;

const REQUIRE_ENV: &str = "HARVESTER_REQUIRE_SOCKET_TESTS";

/// Starts a wiremock server, or returns `None` when the sandbox forbids
/// binding localhost. Panics instead of skipping when `REQUIRE_ENV` is set.
#[track_caller]
pub fn start_mock_server_or_skip() -> impl std::future::Future<Output = Option<MockServer>> {
    let bindable = TcpListener::bind("127.0.0.1:0").is_ok();
    let caller = std::panic::Location::caller();
    async move {
        if bindable {
            return Some(MockServer::start().await);
        }
        let required = std::env::var(REQUIRE_ENV)
            .is_ok_and(|value| matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes"));
        assert!(
            !required,
            "no localhost socket for {caller} while {REQUIRE_ENV} is set"
        );
        eprintln!("skipping {caller}: no localhost socket");
        None
    }
}
