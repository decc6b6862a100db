//! Report link discovery on the exchange listing pages.

use std::cmp::Reverse;
use std::collections::{BTreeSet, HashSet, VecDeque};

use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, warn};
use url::Url;

use bullion_core::models::{SourceDocument, SourcesConfig};
use bullion_core::report::rules::parse_week_range;

use crate::net::HttpClient;

lazy_static! {
    static ref ANCHOR: Selector = Selector::parse("a[href]").unwrap();
    static ref ONCLICK: Selector = Selector::parse("[onclick]").unwrap();
    static ref TITLE_SPAN: Selector = Selector::parse("span.txt").unwrap();
    static ref MONTHLY_ARTICLE: Regex = Regex::new(r"/data_MonthlyReport/\d+").unwrap();
    static ref QUOTED: Regex = Regex::new(r#"['"]([^'"]+)['"]"#).unwrap();
    static ref ONCLICK_PATH: Regex = Regex::new(r#"/sjzx/hqzb[^'" )]*"#).unwrap();
    static ref TEXT_PATH: Regex = Regex::new(r#"/sjzx/hqzb[^'"<>\s]*"#).unwrap();
    static ref TOTAL_PAGE: Regex = Regex::new(r"totalPage\s*=\s*(\d+)").unwrap();
    static ref GOTO_PAGE: Regex = Regex::new(r"gotoPage\('([^']*?/sjzx/hqzb\?p=)'").unwrap();
    static ref PAGE_QUERY: Regex = Regex::new(r"^p=\d+$").unwrap();
}

const WEEKLY_PATH: &str = "/sjzx/hqzb";

/// Whitespace-normalized text content of an element.
fn element_text(element: &ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Absolute URLs of every anchor pointing at a PDF, in page order.
pub fn pdf_links(html: &str, base: &Url) -> Vec<String> {
    let document = Html::parse_document(html);
    document
        .select(&ANCHOR)
        .filter_map(|a| a.value().attr("href"))
        .filter(|href| href.to_lowercase().contains(".pdf"))
        .filter_map(|href| base.join(href.trim()).ok())
        .map(String::from)
        .collect()
}

/// Monthly article pages that embed a data highlights PDF.
pub fn monthly_articles(html: &str, base: &Url) -> Vec<String> {
    let document = Html::parse_document(html);
    document
        .select(&ANCHOR)
        .filter(|a| a.value().attr("href").is_some_and(|href| MONTHLY_ARTICLE.is_match(href)))
        .filter(|a| {
            let title = a.select(&TITLE_SPAN).next().map(|s| element_text(&s)).unwrap_or_default();
            title.contains("Monthly Report") || title.contains("Data Highlights")
        })
        .filter_map(|a| a.value().attr("href"))
        .filter_map(|href| base.join(href.trim()).ok())
        .map(String::from)
        .collect()
}

/// Crawl the monthly listing and return unique PDF links in discovery order.
///
/// Stops at the first listing page without any PDF or when a page fails.
pub async fn discover_monthly(http: &HttpClient, sources: &SourcesConfig) -> anyhow::Result<Vec<SourceDocument>> {
    let base = Url::parse(&sources.sge_monthly_base)?;
    let mut seen = HashSet::new();
    let mut documents = Vec::new();

    for page in 1..=sources.sge_monthly_max_pages {
        let listing_url = format!("{}?p={}", sources.sge_monthly_listing, page);
        info!("Listing page {}: {}", page, listing_url);

        let html = match http.get_text(&listing_url).await {
            Ok(html) => html,
            Err(e) => {
                warn!("Failed to fetch listing page {}: {}", page, e);
                break;
            }
        };

        let mut page_pdfs = pdf_links(&html, &base);
        for article in monthly_articles(&html, &base) {
            match http.get_text(&article).await {
                Ok(article_html) => page_pdfs.extend(pdf_links(&article_html, &base)),
                Err(e) => warn!("Failed to fetch article {}: {}", article, e),
            }
            http.pause().await;
        }

        if page_pdfs.is_empty() {
            info!("No PDFs on page {}, stopping crawl", page);
            break;
        }

        let before = documents.len();
        for url in page_pdfs {
            if seen.insert(url.clone()) {
                documents.push(SourceDocument::new(url).with_source_page(listing_url.clone()));
            }
        }
        debug!("{} new PDFs on page {} ({} total)", documents.len() - before, page, documents.len());

        http.pause().await;
    }

    Ok(documents)
}

/// Weekly report links on one listing page, unique by URL.
pub fn weekly_report_links(html: &str, page_url: &Url) -> Vec<SourceDocument> {
    let document = Html::parse_document(html);
    let mut seen = HashSet::new();
    let mut reports = Vec::new();

    for anchor in document.select(&ANCHOR) {
        let Some(href) = anchor.value().attr("href").map(str::trim).filter(|h| !h.is_empty()) else {
            continue;
        };
        let Ok(absolute) = page_url.join(href) else {
            continue;
        };
        if !absolute.as_str().to_lowercase().contains(".pdf") {
            continue;
        }
        if !seen.insert(absolute.to_string()) {
            continue;
        }

        let mut title = element_text(&anchor);
        if title.is_empty() {
            title = absolute
                .path_segments()
                .and_then(|mut segments| segments.next_back())
                .unwrap_or_default()
                .to_string();
        }
        let week = parse_week_range(&format!("{} {}", title, absolute));

        reports.push(
            SourceDocument::new(absolute.to_string())
                .with_title(title)
                .with_source_page(page_url.to_string())
                .with_week(week),
        );
    }

    reports
}

/// Accept only listing pages: same site, the weekly path, no query or `p=N`.
fn listing_page(page_url: &Url, candidate: &str) -> Option<String> {
    let candidate = candidate.trim();
    if candidate.is_empty() {
        return None;
    }
    let mut absolute = page_url.join(candidate).ok()?;

    let host = absolute.host_str()?;
    if !host.ends_with("sge.com.cn") || absolute.path() != WEEKLY_PATH {
        return None;
    }
    if let Some(query) = absolute.query() {
        if !PAGE_QUERY.is_match(query) {
            return None;
        }
    }
    absolute.set_fragment(None);

    Some(absolute.to_string())
}

/// Further weekly listing pages referenced from one page, sorted.
pub fn weekly_pagination(html: &str, page_url: &Url) -> Vec<String> {
    let document = Html::parse_document(html);
    let mut candidates: Vec<String> = Vec::new();

    candidates.extend(
        document
            .select(&ANCHOR)
            .filter_map(|a| a.value().attr("href"))
            .map(str::to_string),
    );

    for element in document.select(&ONCLICK) {
        let onclick = element.value().attr("onclick").unwrap_or_default();
        candidates.extend(QUOTED.captures_iter(onclick).map(|c| c[1].to_string()));
        candidates.extend(ONCLICK_PATH.find_iter(onclick).map(|m| m.as_str().to_string()));
    }

    candidates.extend(TEXT_PATH.find_iter(html).map(|m| m.as_str().to_string()));

    if let (Some(total), Some(base)) = (TOTAL_PAGE.captures(html), GOTO_PAGE.captures(html)) {
        let total: usize = total[1].parse().unwrap_or(0);
        candidates.extend((1..=total).map(|page| format!("{}{}", &base[1], page)));
    }

    let pages: BTreeSet<String> = candidates
        .iter()
        .filter_map(|candidate| listing_page(page_url, candidate))
        .collect();
    pages.into_iter().collect()
}

/// Breadth-first crawl of the weekly listing pages.
///
/// Reports come back newest first, ordered by `(week_end, title)`.
pub async fn discover_weekly(http: &HttpClient, sources: &SourcesConfig) -> anyhow::Result<Vec<SourceDocument>> {
    let start = Url::parse(&sources.sge_weekly_start)?;
    let max_pages = sources.sge_weekly_max_pages.max(1);

    let mut queue = VecDeque::from([start.to_string()]);
    let mut visited = HashSet::new();
    let mut seen_reports = HashSet::new();
    let mut reports = Vec::new();

    while visited.len() < max_pages {
        let Some(page) = queue.pop_front() else {
            break;
        };
        if !visited.insert(page.clone()) {
            continue;
        }
        info!("Crawling {}", page);

        let html = match http.get_text(&page).await {
            Ok(html) => html,
            Err(e) => {
                warn!("Failed to fetch listing page {}: {}", page, e);
                continue;
            }
        };
        let page_url = Url::parse(&page)?;

        for report in weekly_report_links(&html, &page_url) {
            if seen_reports.insert(report.url.clone()) {
                reports.push(report);
            }
        }
        for next in weekly_pagination(&html, &page_url) {
            if !visited.contains(&next) && !queue.contains(&next) {
                queue.push_back(next);
            }
        }

        http.pause().await;
    }

    sort_weekly(&mut reports);
    info!("Visited {} listing pages, found {} reports", visited.len(), reports.len());
    Ok(reports)
}

/// Newest first by `(week_end, title)`; undated reports last.
pub fn sort_weekly(reports: &mut [SourceDocument]) {
    reports.sort_by_key(|report| {
        Reverse((report.week.map(|(_, end)| end), report.title.clone().unwrap_or_default()))
    });
}

/// Keep reports whose week falls in `[from, to]`, newest `max` of them.
///
/// Reports without a parsed week are dropped.
pub fn filter_weekly(
    reports: Vec<SourceDocument>,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    max: Option<usize>,
) -> Vec<SourceDocument> {
    let filtered = reports.into_iter().filter(|report| {
        let Some((_, end)) = report.week else {
            return false;
        };
        from.is_none_or(|from| end >= from) && to.is_none_or(|to| end <= to)
    });

    match max {
        Some(max) if max > 0 => filtered.take(max).collect(),
        _ => filtered.collect(),
    }
}
