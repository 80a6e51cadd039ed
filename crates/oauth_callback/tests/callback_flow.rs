use hyper::Client;
use oauth_callback::{CallbackError, CallbackServer, Grant};

const STATE: &str = "01HZY3N4Q6K0J8V6W1Z9C2D3E4";

fn spawn(server: CallbackServer) -> std::net::SocketAddr {
    let addr = std::net::SocketAddr::from(([127, 0, 0, 1], 0));
    let server = axum::Server::bind(&addr).serve(server.start().into_make_service());
    let addr = server.local_addr();

    tokio::spawn(async move {
        server.await.unwrap();
    });

    addr
}

#[tokio::test]
async fn delivers_code_to_subscriber() -> Result<(), Box<dyn std::error::Error>> {
    let server = CallbackServer::new(STATE);
    let mut on_grant = server.on_grant();
    let addr = spawn(server);

    let client = Client::new();
    let url = format!("http://{}/callback?code=auth-code-1&state={}", addr, STATE).parse()?;
    let resp = client.get(url).await?;

    assert_eq!(resp.status(), 200);
    assert_eq!(
        on_grant.recv().await?,
        Ok(Grant {
            code: "auth-code-1".to_string(),
            state: STATE.to_string(),
        })
    );

    Ok(())
}

#[tokio::test]
async fn rejects_mismatched_state() -> Result<(), Box<dyn std::error::Error>> {
    let server = CallbackServer::new(STATE);
    let mut on_grant = server.on_grant();
    let addr = spawn(server);

    let client = Client::new();
    let url = format!("http://{}/callback?code=auth-code-1&state=forged", addr).parse()?;
    let resp = client.get(url).await?;

    assert_eq!(resp.status(), 400);
    assert!(on_grant.try_recv().is_err());

    Ok(())
}

#[tokio::test]
async fn publishes_denial() -> Result<(), Box<dyn std::error::Error>> {
    let server = CallbackServer::new(STATE);
    let mut on_grant = server.on_grant();
    let addr = spawn(server);

    let client = Client::new();
    let url = format!(
        "http://{}/callback?error=access_denied&error_description=user%20cancelled&state={}",
        addr, STATE
    )
    .parse()?;
    let resp = client.get(url).await?;

    assert_eq!(resp.status(), 400);
    assert_eq!(
        on_grant.recv().await?,
        Err(CallbackError::Denied("user cancelled".to_string()))
    );

    Ok(())
}

#[tokio::test]
async fn malformed_request_is_not_published() -> Result<(), Box<dyn std::error::Error>> {
    let server = CallbackServer::new(STATE);
    let mut on_grant = server.on_grant();
    let addr = spawn(server);

    let client = Client::new();
    let url = format!("http://{}/callback?state={}", addr, STATE).parse()?;
    let resp = client.get(url).await?;

    assert_eq!(resp.status(), 400);
    assert!(on_grant.try_recv().is_err());

    Ok(())
}
