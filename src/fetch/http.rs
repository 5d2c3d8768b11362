// src/fetch/http.rs
use anyhow::{Context, Result};
use reqwest::Client;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, warn};
use url::Url;

/// GET `url` and return the body, failing on any non-success status.
pub async fn get_text(client: &Client, url: &Url) -> Result<String> {
    debug!("Fetching text from {}", url);
    client
        .get(url.clone())
        .send()
        .await
        .with_context(|| format!("GET {} failed", url))?
        .error_for_status()
        .with_context(|| format!("Non-success status {}", url))?
        .text()
        .await
        .with_context(|| format!("Reading text from {}", url))
}

/// [`get_text`] with up to `max_retries` extra attempts and doubling backoff.
pub async fn get_text_with_retry(
    client: &Client,
    url: &Url,
    max_retries: u32,
    initial_backoff_ms: u64,
) -> Result<String> {
    let mut attempts = 0;
    loop {
        match get_text(client, url).await {
            Ok(t) => return Ok(t),
            Err(e) if attempts < max_retries => {
                attempts += 1;
                let backoff = initial_backoff_ms * 2u64.pow(attempts - 1);
                warn!(%url, attempt = attempts, delay_ms = backoff, error = %e, "Retrying");
                sleep(Duration::from_millis(backoff)).await;
            }
            Err(e) => {
                error!(%url, error = %e, "Exhausted retries");
                return Err(e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn local_client() -> Result<Client> {
        Ok(Client::builder().no_proxy().build()?)
    }

    /// Serve the canned `(status line, body)` responses, one per connection.
    async fn serve(responses: Vec<(&'static str, &'static str)>) -> Result<Url> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        tokio::spawn(async move {
            for (status, body) in responses {
                let Ok((mut sock, _)) = listener.accept().await else {
                    return;
                };
                let mut buf = [0u8; 2048];
                let _ = sock.read(&mut buf).await;
                let resp = format!(
                    "{}\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                let _ = sock.write_all(resp.as_bytes()).await;
                let _ = sock.shutdown().await;
            }
        });
        Ok(Url::parse(&format!("http://{}/treaty/", addr))?)
    }

    #[tokio::test]
    async fn get_text_returns_body() -> Result<()> {
        let url = serve(vec![("HTTP/1.1 200 OK", "<p>ok</p>")]).await?;
        let body = get_text(&local_client()?, &url).await?;
        assert_eq!(body, "<p>ok</p>");
        Ok(())
    }

    #[tokio::test]
    async fn get_text_fails_fast_on_status() -> Result<()> {
        let url = serve(vec![("HTTP/1.1 404 Not Found", "gone")]).await?;
        let err = get_text(&local_client()?, &url).await.unwrap_err();
        assert!(format!("{:#}", err).contains("Non-success status"));
        Ok(())
    }

    #[tokio::test]
    async fn retry_recovers_after_server_error() -> Result<()> {
        let url = serve(vec![
            ("HTTP/1.1 503 Service Unavailable", ""),
            ("HTTP/1.1 200 OK", "second"),
        ])
        .await?;
        let body = get_text_with_retry(&local_client()?, &url, 2, 1).await?;
        assert_eq!(body, "second");
        Ok(())
    }
}
