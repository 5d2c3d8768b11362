use anyhow::Result;
use calamine::{open_workbook_auto, Reader};
use capscrape::config::OutputConfig;
use capscrape::sources::ect;
use capscrape::table::Cell;
use reqwest::Client;
use std::collections::HashMap;
use tempfile::tempdir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

const INDEX: &str = r#"<html><body>
  <figure class="image"><a title="Albania" href="/treaty/albania/"><img/></a></figure>
  <figure class="image"><a title="Chile" href="/treaty/chile/"><img/></a></figure>
  <figure class="image"><a title="Italy" href="/treaty/italy/"><img/></a></figure>
</body></html>"#;

const ALBANIA: &str = r#"<html><body>
  <p><strong>1994 Energy Charter Treaty</strong></p>
  <ul>
    <li>signed on 17 December 1994</li>
    <li>ratified on 05 December 1997</li>
    <li>deposited on 13 February 1998</li>
    <li>entered into force on 16 April 1998</li>
  </ul>
  <p><strong>Energy Charter Protocol</strong></p>
  <ul><li>signed on 17 December 1994</li></ul>
</body></html>"#;

const ITALY: &str = r#"<html><body>
  <p><strong>1994 Energy Charter Treaty</strong></p>
  <ul><li>signed on 17 December 1994</li></ul>
</body></html>"#;

/// Serve fixed pages by path until the test ends; unknown paths are 404.
async fn serve(pages: HashMap<&'static str, &'static str>) -> Result<String> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        while let Ok((mut sock, _)) = listener.accept().await {
            let mut buf = vec![0u8; 4096];
            let n = sock.read(&mut buf).await.unwrap_or(0);
            let request = String::from_utf8_lossy(&buf[..n]);
            let path = request.split_whitespace().nth(1).unwrap_or("/").to_string();
            let (status, body) = match pages.get(path.as_str()) {
                Some(body) => ("200 OK", *body),
                None => ("404 Not Found", "missing"),
            };
            let resp = format!(
                "HTTP/1.1 {}\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            let _ = sock.write_all(resp.as_bytes()).await;
            let _ = sock.shutdown().await;
        }
    });
    Ok(format!("http://{}", addr))
}

#[tokio::test]
async fn scrape_merge_withdrawals_and_export() -> Result<()> {
    capscrape::logging::init_for_tests();
    let base = serve(HashMap::from([
        ("/treaty/contracting-parties-and-signatories/", INDEX),
        ("/treaty/albania/", ALBANIA),
        ("/treaty/italy/", ITALY),
    ]))
    .await?;

    let dir = tempdir()?;
    let cfg = ect::Config {
        index_url: format!("{}/treaty/contracting-parties-and-signatories/", base),
        base_url: base.clone(),
        output: OutputConfig::new(dir.path().join("ect.xlsx")),
        ..ect::Config::default()
    };
    let client = Client::builder().no_proxy().build()?;
    let table = ect::run_with_client(&client, &cfg).await?;

    // Chile's page is missing and dropped; seven withdrawal-only rows appended
    assert_eq!(table.len(), 2 + 7);
    let row = |name: &str| {
        (0..table.len())
            .find(|&i| table.get(i, ect::COUNTRY) == Some(&Cell::Text(name.into())))
            .expect("country present")
    };
    let albania = row("Albania");
    assert_eq!(table.get(albania, "date_entry_force"), Some(&Cell::Int(1998)));
    assert_eq!(table.get(albania, ect::WITHDRAWAL_EFFECT), Some(&Cell::Empty));

    let italy = row("Italy");
    assert_eq!(table.get(italy, "date_sign"), Some(&Cell::Int(1994)));
    assert_eq!(table.get(italy, "date_ratification"), Some(&Cell::Int(1997)));
    assert_eq!(table.get(italy, ect::WITHDRAWAL_NOTIFICATION), Some(&Cell::Int(2014)));

    let mut book = open_workbook_auto(dir.path().join("ect.xlsx"))?;
    assert_eq!(book.sheet_names(), vec!["Readme", "Energy_charter_treaty_2024"]);
    let data = book.worksheet_range("Energy_charter_treaty_2024")?;
    assert_eq!(data.rows().count(), 10);
    Ok(())
}

#[tokio::test]
async fn unreachable_index_is_fatal() -> Result<()> {
    let base = serve(HashMap::new()).await?;
    let dir = tempdir()?;
    let cfg = ect::Config {
        index_url: format!("{}/treaty/contracting-parties-and-signatories/", base),
        base_url: base,
        output: OutputConfig::new(dir.path().join("ect.xlsx")),
        ..ect::Config::default()
    };
    let client = Client::builder().no_proxy().build()?;
    assert!(ect::run_with_client(&client, &cfg).await.is_err());
    assert!(!dir.path().join("ect.xlsx").exists());
    Ok(())
}
