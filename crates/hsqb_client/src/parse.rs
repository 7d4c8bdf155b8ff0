//! HTML → [`Snapshot`] parsing.
//!
//! The front page carries two lists: recent tournament stats (each item a
//! tournament link followed by a nested list of report links) and recently
//! posted question sets (each item a single link). Any item that does not
//! have that shape fails the whole parse so layout changes surface as errors
//! instead of silently dropped records.

use chrono::{DateTime, Utc};
use common::config::SourceConfig;
use common::{Error, PostedSet, Result, Snapshot, StatReport, TournamentStats};
use scraper::{ElementRef, Html, Selector};
use tracing::debug;
use url::Url;

/// Compiled selectors plus the link-resolution base.
#[derive(Debug, Clone)]
pub struct PageParser {
    base: Url,
    stats: Selector,
    sets: Selector,
    anchor: Selector,
}

impl PageParser {
    pub fn new(source: &SourceConfig) -> Result<Self> {
        let base = Url::parse(&source.base_url)
            .map_err(|e| Error::Config(format!("invalid base_url {}: {}", source.base_url, e)))?;

        Ok(Self {
            base,
            stats: compile(&source.stats_selector)?,
            sets: compile(&source.sets_selector)?,
            anchor: compile("a[href]")?,
        })
    }

    /// Parse a document into a snapshot stamped with `captured_at`.
    ///
    /// Pure: the same document always yields the same records.
    pub fn parse(&self, html: &str, captured_at: DateTime<Utc>) -> Result<Snapshot> {
        let document = Html::parse_document(html);

        let stats_list = document
            .select(&self.stats)
            .next()
            .ok_or_else(|| Error::Parse("recent stats section not found".into()))?;
        let sets_list = document
            .select(&self.sets)
            .next()
            .ok_or_else(|| Error::Parse("recently posted sets section not found".into()))?;

        let stats = list_items(stats_list)
            .enumerate()
            .map(|(i, item)| self.parse_tournament(i, item))
            .collect::<Result<Vec<_>>>()?;

        let sets = list_items(sets_list)
            .enumerate()
            .map(|(i, item)| {
                let ctx = format!("sets item {}", i);
                if child_elements(item).any(|el| is_list(&el)) {
                    return Err(Error::Parse(format!("{}: unexpected nested list", ctx)));
                }
                let (name, link) = self.lead_link(item, &ctx)?;
                Ok(PostedSet { name, link })
            })
            .collect::<Result<Vec<_>>>()?;

        debug!(
            "Parsed {} tournaments ({} reports) and {} sets",
            stats.len(),
            stats.iter().map(|t| t.stat_reports.len()).sum::<usize>(),
            sets.len()
        );

        Ok(Snapshot::new(stats, sets, captured_at))
    }

    fn parse_tournament(&self, index: usize, item: ElementRef<'_>) -> Result<TournamentStats> {
        let ctx = format!("stats item {}", index);
        let (tournament_name, tournament_link) = self.lead_link(item, &ctx)?;

        let reports_list = child_elements(item)
            .find(|el| is_list(el))
            .ok_or_else(|| {
                Error::Parse(format!("{} ({}): no report list", ctx, tournament_name))
            })?;

        let stat_reports = list_items(reports_list)
            .enumerate()
            .map(|(j, report)| {
                let (name, link) =
                    self.lead_link(report, &format!("{} ({}) report {}", ctx, tournament_name, j))?;
                Ok(StatReport { name, link })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(TournamentStats {
            tournament_name,
            tournament_link,
            stat_reports,
        })
    }

    /// First link of an item that is not inside one of its nested lists.
    fn lead_link(&self, item: ElementRef<'_>, ctx: &str) -> Result<(String, Url)> {
        let anchor = child_elements(item)
            .filter(|el| !is_list(el))
            .find_map(|el| {
                if el.value().name() == "a" && el.value().attr("href").is_some() {
                    Some(el)
                } else {
                    el.select(&self.anchor).next()
                }
            })
            .ok_or_else(|| Error::Parse(format!("{}: no link", ctx)))?;

        let name = collapse_ws(anchor.text());
        if name.is_empty() {
            return Err(Error::Parse(format!("{}: link has no text", ctx)));
        }

        let href = anchor
            .value()
            .attr("href")
            .ok_or_else(|| Error::Parse(format!("{}: link has no href", ctx)))?;
        let link = self
            .base
            .join(href.trim())
            .map_err(|e| Error::Parse(format!("{}: bad href {:?}: {}", ctx, href, e)))?;

        Ok((name, link))
    }
}

fn compile(selector: &str) -> Result<Selector> {
    Selector::parse(selector)
        .map_err(|e| Error::Parse(format!("invalid selector {:?}: {:?}", selector, e)))
}

fn child_elements<'a>(parent: ElementRef<'a>) -> impl Iterator<Item = ElementRef<'a>> {
    parent.children().filter_map(ElementRef::wrap)
}

fn list_items<'a>(list: ElementRef<'a>) -> impl Iterator<Item = ElementRef<'a>> {
    child_elements(list).filter(|el| el.value().name() == "li")
}

fn is_list(el: &ElementRef<'_>) -> bool {
    matches!(el.value().name(), "ul" | "ol")
}

fn collapse_ws<'a>(parts: impl Iterator<Item = &'a str>) -> String {
    parts
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}
