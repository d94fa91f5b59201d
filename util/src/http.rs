use reqwest::{Client, StatusCode};
use std::time::Duration;

/// Builds the shared HTTP client with a whole-request timeout.
pub fn build_client(timeout_secs: u64) -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs.max(1)))
        .redirect(reqwest::redirect::Policy::limited(5))
        .build()
}

/// Returns true if the URL appears reachable (2xx/3xx considered alive).
///  - HEAD first (fast), fall back to GET on 405/501 or a transport error.
///  - `timeout_secs` caps the whole request timeout.
pub async fn is_url_alive(url: &str, timeout_secs: u64) -> Result<bool, reqwest::Error> {
    let client = build_client(timeout_secs)?;

    match client.head(url).send().await {
        Ok(resp) => {
            let code = resp.status();
            if is_alive_status(code) {
                return Ok(true);
            }
            // Some hosts disallow HEAD
            if code != StatusCode::METHOD_NOT_ALLOWED && code != StatusCode::NOT_IMPLEMENTED {
                return Ok(false);
            }
        }
        Err(e) => tracing::debug!("HEAD {url} failed, retrying with GET: {e}"),
    }

    let get = client.get(url).send().await?;
    Ok(is_alive_status(get.status()))
}

fn is_alive_status(code: StatusCode) -> bool {
    code.is_success() || code.is_redirection() || code == StatusCode::NOT_MODIFIED
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Router, http::StatusCode as AxStatus, routing::get};
    use tokio::net::TcpListener;

    async fn spawn(app: Router) -> std::net::SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    #[tokio::test]
    async fn healthy_endpoint_is_alive() {
        let addr = spawn(Router::new().route("/health", get(|| async { "ok" }))).await;
        assert!(is_url_alive(&format!("http://{addr}/health"), 2).await.unwrap());
    }

    #[tokio::test]
    async fn server_error_is_not_alive() {
        let app = Router::new().route(
            "/health",
            get(|| async { (AxStatus::INTERNAL_SERVER_ERROR, "down") }),
        );
        let addr = spawn(app).await;
        assert!(!is_url_alive(&format!("http://{addr}/health"), 2).await.unwrap());
    }
}
