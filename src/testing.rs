use axum::Router;
use url::Url;

/// Serves `router` on an ephemeral local port for the lifetime of the test
/// runtime and returns its base url.
pub(crate) fn spawn(router: Router) -> Url {
    let addr = std::net::SocketAddr::from(([127, 0, 0, 1], 0));
    let server = axum::Server::bind(&addr).serve(router.into_make_service());
    let addr = server.local_addr();

    tokio::spawn(async move {
        server.await.unwrap();
    });

    Url::parse(&format!("http://{}/", addr)).unwrap()
}
