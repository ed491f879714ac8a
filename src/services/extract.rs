// src/services/extract.rs

//! Row extraction from course page HTML.
//!
//! Three passes run over the main region in a fixed order so that the
//! snapshot builder's first-wins deduplication keeps the specific kinds:
//! headings, then activity tiles, then every link as a fallback.

use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{ItemKind, RawRow};
use crate::utils::resolve_url;

const REGION_SELECTORS: [&str; 2] = ["#region-main", "#page-content"];
const HEADING_SELECTOR: &str = "h1, h2, h3";
const ACTIVITY_SELECTOR: &str = "li.activity, div.activity, .activityinstance, .activityname";
const LINK_SELECTOR: &str = "a[href]";
const SECTION_SELECTOR: &str = "li.section, [data-for=\"section\"]";
const SECTION_NAME_SELECTOR: &str = ".sectionname";
const SIGNED_IN_SELECTOR: &str = "#user-menu-toggle, a[href*=\"logout\"]";
const LOGIN_FORM_SELECTOR: &str = "form#login, input#username";

/// Parse a CSS selector, mapping failures to [`AppError::Selector`].
pub fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
}

/// Compiled selectors for one portal layout.
#[derive(Debug)]
pub struct PageExtractor {
    regions: Vec<Selector>,
    heading: Selector,
    activity: Selector,
    anchor: Selector,
    link: Selector,
    section: Selector,
    section_name: Selector,
    signed_in: Selector,
    login_form: Selector,
}

impl PageExtractor {
    pub fn new() -> Result<Self> {
        Ok(Self {
            regions: REGION_SELECTORS
                .iter()
                .map(|s| parse_selector(s))
                .collect::<Result<_>>()?,
            heading: parse_selector(HEADING_SELECTOR)?,
            activity: parse_selector(ACTIVITY_SELECTOR)?,
            anchor: parse_selector("a")?,
            link: parse_selector(LINK_SELECTOR)?,
            section: parse_selector(SECTION_SELECTOR)?,
            section_name: parse_selector(SECTION_NAME_SELECTOR)?,
            signed_in: parse_selector(SIGNED_IN_SELECTOR)?,
            login_form: parse_selector(LOGIN_FORM_SELECTOR)?,
        })
    }

    /// Extract raw rows from a course page fetched from `page_url`.
    pub fn extract(&self, html: &str, page_url: &Url) -> Vec<RawRow> {
        let document = Html::parse_document(html);
        let region = self
            .regions
            .iter()
            .find_map(|sel| document.select(sel).next())
            .unwrap_or_else(|| document.root_element());

        let mut rows = Vec::new();

        for el in region.select(&self.heading) {
            push_row(&mut rows, RawRow::new(ItemKind::Heading, element_text(&el)));
        }

        for el in region.select(&self.activity) {
            let anchor = el.select(&self.anchor).next();
            let href = anchor
                .and_then(|a| a.value().attr("href"))
                .filter(|h| !h.trim().is_empty())
                .map(|h| resolve_url(page_url, h));
            let title = anchor
                .map(|a| element_text(&a))
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| element_text(&el));

            let mut row = match href {
                Some(href) => RawRow::new(ItemKind::File, title).with_href(href),
                None => RawRow::new(ItemKind::Text, title),
            };
            if let Some(section) = self.section_name_of(&el) {
                row = row.with_context(section);
            }
            push_row(&mut rows, row);
        }

        for a in region.select(&self.link) {
            let Some(raw_href) = a.value().attr("href") else {
                continue;
            };
            let href = resolve_url(page_url, raw_href);
            let title = Some(element_text(&a))
                .filter(|t| !t.is_empty())
                .or_else(|| a.value().attr("title").map(|t| t.trim().to_string()))
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| href.clone());
            push_row(&mut rows, RawRow::new(ItemKind::Link, title).with_href(href));
        }

        rows
    }

    /// Whether a page shows a signed-in user menu.
    pub fn is_signed_in(&self, html: &str) -> bool {
        Html::parse_document(html).select(&self.signed_in).next().is_some()
    }

    /// Whether a fetched page is the login form rather than the requested page.
    pub fn is_login_page(&self, final_url: &Url, html: &str) -> bool {
        if final_url.path().contains("/login/") {
            return true;
        }
        let document = Html::parse_document(html);
        document.select(&self.login_form).next().is_some()
            && document.select(&self.signed_in).next().is_none()
    }

    fn section_name_of(&self, el: &ElementRef) -> Option<String> {
        el.ancestors()
            .filter_map(ElementRef::wrap)
            .find(|ancestor| self.section.matches(ancestor))
            .and_then(|section| section.select(&self.section_name).next())
            .map(|name| element_text(&name))
            .filter(|name| !name.is_empty())
    }
}

/// Visible text of an element with whitespace collapsed.
fn element_text(el: &ElementRef) -> String {
    el.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

fn push_row(rows: &mut Vec<RawRow>, row: RawRow) {
    if !row.title.trim().is_empty() {
        rows.push(row);
    }
}
