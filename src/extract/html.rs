// src/extract/html.rs
use anyhow::{anyhow, Result};
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, trace};
use url::Url;

pub fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow!("invalid CSS selector {:?}: {:?}", css, e))
}

/// Whitespace-normalised text content of an element.
pub fn element_text(el: &ElementRef<'_>) -> String {
    el.text()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// `(title, absolute href)` of the first `<a>` inside each element matching
/// `container_css`, in document order. Containers without a titled link are
/// skipped; a repeated title keeps its first position and takes the later href.
pub fn title_links(html: &str, container_css: &str, base: &Url) -> Result<Vec<(String, Url)>> {
    let doc = Html::parse_document(html);
    let container = selector(container_css)?;
    let anchor = selector("a")?;

    let mut links: Vec<(String, Url)> = Vec::new();
    for fig in doc.select(&container) {
        let Some(a) = fig.select(&anchor).next() else {
            continue;
        };
        let (Some(title), Some(href)) = (a.value().attr("title"), a.value().attr("href")) else {
            continue;
        };
        match base.join(href) {
            Ok(u) => {
                trace!(title, url = %u, "found entity link");
                let title = title.trim();
                match links.iter_mut().find(|(t, _)| t == title) {
                    Some(entry) => entry.1 = u,
                    None => links.push((title.to_string(), u)),
                }
            }
            Err(e) => debug!(title, href, error = %e, "unjoinable href"),
        }
    }
    Ok(links)
}

/// Labelled block found by [`items_after_anchor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnchorSection {
    /// Text of the anchor element itself.
    pub title: String,
    /// Item texts in document order, padded with `None` to the minimum.
    pub items: Vec<Option<String>>,
}

/// Where to look for a labelled list in a page.
#[derive(Debug, Clone)]
pub struct AnchorScan<'a> {
    /// Tag of the label element; the next element with this tag ends the scan.
    pub anchor_tag: &'a str,
    /// Substring the label must contain.
    pub anchor_text: &'a str,
    /// Tag of the items to collect (only those directly inside a `<ul>`).
    pub item_tag: &'a str,
    /// Pad the result up to this many items.
    pub min_items: usize,
}

/// Locate the first `anchor_tag` element containing `anchor_text`, then walk
/// the following elements in document order collecting list items until the
/// next `anchor_tag` element.
pub fn items_after_anchor(html: &str, scan: &AnchorScan<'_>) -> Result<Option<AnchorSection>> {
    let doc = Html::parse_document(html);
    let all = selector("*")?;
    let mut elements = doc.select(&all);

    // 1) find the anchor
    let Some(anchor) = elements
        .by_ref()
        .find(|el| el.value().name() == scan.anchor_tag && element_text(el).contains(scan.anchor_text))
    else {
        return Ok(None);
    };

    // 2) collect items until the terminator
    let mut items = Vec::new();
    for el in elements {
        let name = el.value().name();
        if name == scan.anchor_tag {
            break;
        }
        if name == scan.item_tag && parent_is(&el, "ul") {
            items.push(Some(element_text(&el)));
        }
    }
    while items.len() < scan.min_items {
        items.push(None);
    }

    Ok(Some(AnchorSection {
        title: element_text(&anchor),
        items,
    }))
}

fn parent_is(el: &ElementRef<'_>, tag: &str) -> bool {
    el.parent()
        .and_then(ElementRef::wrap)
        .map(|p| p.value().name() == tag)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    const INDEX: &str = r#"
        <html><body>
          <figure class="image"><a title="Zimbabwe" href="/treaty/zimbabwe/"><img/></a></figure>
          <figure class="image"><a title="Albania" href="/treaty/albania-old/"><img/></a></figure>
          <figure class="image"><a title="Austria" href="https://example.org/austria/"></a></figure>
          <figure class="image"><a title="Albania" href="/treaty/albania/"><img/></a></figure>
          <figure class="image"><a href="/no-title/"></a></figure>
          <figure class="other"><a title="Ignored" href="/ignored/"></a></figure>
        </body></html>"#;

    const COUNTRY: &str = r#"
        <html><body>
          <p><strong>Energy Charter Protocol on Energy Efficiency</strong></p>
          <ul><li>signed on 17 December 1994</li></ul>
          <p><strong>1994 Energy Charter Treaty</strong></p>
          <ul>
            <li>signed on 17 December 1994</li>
            <li>ratified on 05 December 1997</li>
          </ul>
          <p><strong>1998 Trade Amendment</strong></p>
          <ul><li>ratified on 01 January 2001</li></ul>
        </body></html>"#;

    fn scan() -> AnchorScan<'static> {
        AnchorScan {
            anchor_tag: "strong",
            anchor_text: "1994 Energy Charter Treaty",
            item_tag: "li",
            min_items: 4,
        }
    }

    #[test]
    fn title_links_keep_page_order_and_resolve() -> Result<()> {
        let base = Url::parse("https://www.energychartertreaty.org/treaty/")?;
        let links = title_links(INDEX, "figure.image", &base)?;
        let titles: Vec<&str> = links.iter().map(|(t, _)| t.as_str()).collect();
        assert_eq!(titles, vec!["Zimbabwe", "Albania", "Austria"]);
        assert_eq!(
            links[1].1.as_str(),
            "https://www.energychartertreaty.org/treaty/albania/"
        );
        assert_eq!(links[2].1.as_str(), "https://example.org/austria/");
        Ok(())
    }

    #[test]
    fn anchor_scan_stops_at_next_label_and_pads() -> Result<()> {
        let section = items_after_anchor(COUNTRY, &scan())?.expect("section present");
        assert_eq!(section.title, "1994 Energy Charter Treaty");
        assert_eq!(
            section.items,
            vec![
                Some("signed on 17 December 1994".to_string()),
                Some("ratified on 05 December 1997".to_string()),
                None,
                None,
            ]
        );
        Ok(())
    }

    #[test]
    fn anchor_scan_missing_label() -> Result<()> {
        assert!(items_after_anchor("<p>nothing here</p>", &scan())?.is_none());
        Ok(())
    }
}
