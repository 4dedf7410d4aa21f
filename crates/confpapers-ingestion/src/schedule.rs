//! Schedule snippet parsing: session headers and paper rows.
//!
//! A snippet is a flat table of `tr.agenda-item` rows. Session headers carry
//! `ssid="none"` and their own `psid`; paper rows carry a concrete `ssid`
//! and point at their session through `psid`. Session identifiers are only
//! unique within one snippet, so the lookup is built and discarded per call.

use std::collections::HashMap;

use confpapers_common::text::element_text;
use lazy_static::lazy_static;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::markup::{has_ancestor_with_class, resolve, FAST_FORWARD_PRESENTER_CLASS};
use crate::models::{PaperRecord, SessionInfo};

/// Sub-session value marking a row as a session container.
const NO_SUB_SESSION: &str = "none";

lazy_static! {
    static ref AGENDA_ROW: Selector =
        Selector::parse("tr.agenda-item").expect("valid agenda row selector");
    static ref PRESENTATION_TYPE: Selector =
        Selector::parse("span.presentation-type").expect("valid type selector");
    static ref PRESENTATION_TITLE: Selector =
        Selector::parse("span.presentation-title").expect("valid title selector");
    static ref PRESENTATION_LOCATION: Selector =
        Selector::parse("span.presentation-location").expect("valid location selector");
    static ref PRESENTATION_LINK: Selector =
        Selector::parse("a[data-link-type*='.presentation']").expect("valid presentation link selector");
    static ref PERSON_LINK: Selector =
        Selector::parse("a[data-link-type*='.person']").expect("valid person link selector");
}

/// How excluded session titles are compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExclusionMatch {
    Exact,
    #[default]
    Contains,
}

/// Row filters applied while parsing a snippet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleFilters {
    /// Substring the presentation-type label must contain for a session row.
    pub session_type_keyword: String,
    /// Non-paper sessions (fast forward, town hall, ...).
    pub excluded_session_titles: Vec<String>,
    pub exclusion_match: ExclusionMatch,
    /// Paper rows whose title contains any of these are dropped.
    pub excluded_paper_titles: Vec<String>,
    /// Paper rows whose URL `id` parameter starts with this are dropped.
    pub misc_id_prefix: Option<String>,
    pub fast_forward_class: String,
}

impl Default for ScheduleFilters {
    fn default() -> Self {
        Self {
            session_type_keyword: "Technical Paper".to_string(),
            excluded_session_titles: vec![
                "Papers Fast Forward".to_string(),
                "Technical Papers Town Hall".to_string(),
                "Technical Papers Closing Session".to_string(),
                "Technical Papers Interactive Discussion".to_string(),
            ],
            exclusion_match: ExclusionMatch::Contains,
            excluded_paper_titles: vec!["Interactive Discussion".to_string()],
            misc_id_prefix: Some("misc_".to_string()),
            fast_forward_class: FAST_FORWARD_PRESENTER_CLASS.to_string(),
        }
    }
}

impl ScheduleFilters {
    pub fn is_excluded_session(&self, title: &str) -> bool {
        self.excluded_session_titles.iter().any(|kw| match self.exclusion_match {
            ExclusionMatch::Exact => title == kw,
            ExclusionMatch::Contains => title.contains(kw.as_str()),
        })
    }

    pub fn is_excluded_paper_title(&self, title: &str) -> bool {
        self.excluded_paper_titles.iter().any(|kw| title.contains(kw.as_str()))
    }

    pub fn is_misc_item(&self, url: &Url) -> bool {
        let Some(prefix) = self.misc_id_prefix.as_deref().filter(|p| !p.is_empty()) else {
            return false;
        };
        url.query_pairs()
            .find(|(k, _)| k == "id")
            .is_some_and(|(_, v)| v.starts_with(prefix))
    }
}

/// HTML5 parsing discards `<tr>` outside a table, so bare row fragments
/// get a table wrapper before parsing.
fn snippet_document(html: &str) -> Html {
    if html.to_ascii_lowercase().contains("<table") {
        Html::parse_document(html)
    } else {
        Html::parse_document(&format!("<table>{html}</table>"))
    }
}

fn first_text(row: ElementRef<'_>, selector: &Selector) -> Option<String> {
    row.select(selector).next().map(element_text)
}

/// Session-identifier → metadata for every technical-paper session header.
pub fn parse_sessions(doc: &Html, filters: &ScheduleFilters) -> HashMap<String, SessionInfo> {
    let mut sessions = HashMap::new();

    for row in doc.select(&AGENDA_ROW) {
        let attrs = row.value();
        if attrs.attr("ssid") != Some(NO_SUB_SESSION) {
            continue;
        }
        let Some(psid) = attrs.attr("psid").filter(|s| !s.is_empty()) else {
            continue;
        };
        let is_paper_session = row
            .select(&PRESENTATION_TYPE)
            .next()
            .is_some_and(|t| t.text().collect::<String>().contains(&filters.session_type_keyword));
        if !is_paper_session {
            continue;
        }

        let title = first_text(row, &PRESENTATION_TITLE).unwrap_or_default();
        if filters.is_excluded_session(&title) {
            debug!(psid, title = %title, "Skipping excluded session");
            continue;
        }
        let location = first_text(row, &PRESENTATION_LOCATION).unwrap_or_default();

        sessions.insert(psid.to_string(), SessionInfo { title, location });
    }

    sessions
}

/// Paper rows joined to their session. Rows pointing at an unknown or
/// excluded session, or without a presentation link, are dropped.
pub fn parse_paper_rows(
    doc: &Html,
    sessions: &HashMap<String, SessionInfo>,
    base: &Url,
    filters: &ScheduleFilters,
) -> Vec<PaperRecord> {
    let mut papers = Vec::new();

    for row in doc.select(&AGENDA_ROW) {
        let attrs = row.value();
        let Some(psid) = attrs.attr("psid").filter(|s| !s.is_empty()) else {
            continue;
        };
        let Some(ssid) = attrs.attr("ssid").filter(|s| !s.is_empty() && *s != NO_SUB_SESSION) else {
            continue;
        };
        let Some(session) = sessions.get(psid) else {
            continue;
        };
        let Some(link) = row.select(&PRESENTATION_LINK).next() else {
            continue;
        };

        let title = element_text(link);
        let Some(url) = resolve(base, link.value().attr("href").unwrap_or("")) else {
            continue;
        };

        if filters.is_excluded_paper_title(&title) || filters.is_misc_item(&url) {
            debug!(ssid, title = %title, "Skipping non-paper schedule item");
            continue;
        }

        let authors = row
            .select(&PERSON_LINK)
            .filter(|a| !has_ancestor_with_class(*a, &filters.fast_forward_class))
            .map(element_text)
            .collect();

        papers.push(PaperRecord {
            paper_id: Some(ssid.to_string()),
            session_id: Some(psid.to_string()),
            title,
            url: url.into(),
            authors,
            session: session.title.clone(),
            location: session.location.clone(),
            start: attrs.attr("s_utc").unwrap_or_default().to_string(),
            end: attrs.attr("e_utc").unwrap_or_default().to_string(),
            ..Default::default()
        });
    }

    papers
}

/// Parse one snippet into paper records (not yet enriched).
pub fn parse_snippet(html: &str, base: &Url, filters: &ScheduleFilters) -> Vec<PaperRecord> {
    let doc = snippet_document(html);
    let sessions = parse_sessions(&doc, filters);
    let papers = parse_paper_rows(&doc, &sessions, base, filters);
    debug!(sessions = sessions.len(), papers = papers.len(), "Snippet parsed");
    papers
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const BASE: &str = "https://sa2025.conference-schedule.org/";

    fn base() -> Url {
        Url::parse(BASE).unwrap()
    }

    fn session_row(psid: &str, kind: &str, title: &str, location: &str) -> String {
        format!(
            r#"<tr class="agenda-item" psid="{psid}" ssid="none" s_utc="2025-12-16T01:00Z" e_utc="2025-12-16T02:45Z">
                 <td><span class="presentation-type">{kind}</span>
                     <span class="presentation-title">{title}</span>
                     <span class="presentation-location">{location}</span></td></tr>"#
        )
    }

    fn paper_row(psid: &str, ssid: &str, title: &str, href: &str, authors: &[&str]) -> String {
        let people: String = authors
            .iter()
            .map(|a| format!(r#"<a data-link-type="presentation.person" href="/p">{a}</a>"#))
            .collect();
        format!(
            r#"<tr class="agenda-item" psid="{psid}" ssid="{ssid}" s_utc="2025-12-16T01:00Z" e_utc="2025-12-16T01:12Z">
                 <td><a data-link-type="sub.presentation" href="{href}">{title}</a>{people}</td></tr>"#
        )
    }

    fn snippet(rows: &[String]) -> String {
        format!("<table><tbody>{}</tbody></table>", rows.concat())
    }

    #[test]
    fn test_sessions_require_technical_paper_type() {
        let html = snippet(&[
            session_row("S1", "Technical Paper", "Fluid Simulation", "Hall A"),
            session_row("S2", "Course", "Intro to Rendering", "Hall B"),
        ]);
        let sessions = parse_sessions(&Html::parse_document(&html), &ScheduleFilters::default());
        assert_eq!(sessions.len(), 1);
        assert_eq!(
            sessions["S1"],
            SessionInfo { title: "Fluid Simulation".into(), location: "Hall A".into() }
        );
    }

    #[test]
    fn test_session_title_is_normalized() {
        let html = snippet(&[session_row(
            "S1",
            "Technical Paper",
            "  Fluid\u{a0}\u{a0}Simulation \n ",
            " Hall\u{a0}A ",
        )]);
        let sessions = parse_sessions(&Html::parse_document(&html), &ScheduleFilters::default());
        assert_eq!(sessions["S1"].title, "Fluid Simulation");
        assert_eq!(sessions["S1"].location, "Hall A");
    }

    #[test]
    fn test_excluded_sessions_never_resolve() {
        let html = snippet(&[
            session_row("S1", "Technical Paper", "SIGGRAPH Asia 2025 Technical Papers Town Hall", "Hall A"),
            session_row("S2", "Technical Paper", "Papers Fast Forward", "Hall B"),
            session_row("S3", "Technical Paper", "Geometry", "Hall C"),
            paper_row("S1", "P1", "Ignored", "/?id=papers_1", &["A"]),
            paper_row("S2", "P2", "Ignored too", "/?id=papers_2", &["B"]),
            paper_row("S3", "P3", "Kept", "/?id=papers_3", &["C"]),
        ]);
        let papers = parse_snippet(&html, &base(), &ScheduleFilters::default());
        assert_eq!(papers.len(), 1);
        assert_eq!(papers[0].title, "Kept");
    }

    #[test]
    fn test_exact_matching_only_drops_identical_titles() {
        let filters = ScheduleFilters {
            exclusion_match: ExclusionMatch::Exact,
            excluded_session_titles: vec!["Technical Papers Town Hall".to_string()],
            ..Default::default()
        };
        assert!(filters.is_excluded_session("Technical Papers Town Hall"));
        assert!(!filters.is_excluded_session("SIGGRAPH 2025 Technical Papers Town Hall"));

        let contains = ScheduleFilters::default();
        assert!(contains.is_excluded_session("SIGGRAPH 2025 Technical Papers Town Hall"));
    }

    #[test]
    fn test_papers_join_their_own_session() {
        let html = snippet(&[
            session_row("S1", "Technical Paper", "Fluids", "Hall A"),
            session_row("S2", "Technical Paper", "Rendering", "Hall B"),
            paper_row("S2", "P20", "Path Guiding", "/?id=papers_20", &["Ann"]),
            paper_row("S1", "P10", "Vortex Sheets", "/?id=papers_10", &["Bob"]),
        ]);
        let papers = parse_snippet(&html, &base(), &ScheduleFilters::default());
        assert_eq!(papers.len(), 2);

        let pg = &papers[0];
        assert_eq!(pg.paper_id.as_deref(), Some("P20"));
        assert_eq!(pg.session_id.as_deref(), Some("S2"));
        assert_eq!(pg.session, "Rendering");
        assert_eq!(pg.location, "Hall B");

        let vs = &papers[1];
        assert_eq!(vs.session, "Fluids");
        assert_eq!(vs.location, "Hall A");
    }

    #[test]
    fn test_unresolved_session_rows_are_dropped() {
        let html = snippet(&[
            session_row("S1", "Technical Paper", "Fluids", "Hall A"),
            paper_row("S9", "P1", "Orphan", "/?id=papers_1", &["Ann"]),
        ]);
        assert!(parse_snippet(&html, &base(), &ScheduleFilters::default()).is_empty());
    }

    #[test]
    fn test_paper_fields_extracted() {
        let html = snippet(&[
            session_row("S1", "Technical Paper", "Fluids", "Hall A"),
            paper_row(
                "S1",
                "P1",
                "Foo\u{a0} Bar",
                "/?post_type=page&p=14&id=papers_101&sess=sess108",
                &["Jane\u{a0}Doe", "John  Roe"],
            ),
        ]);
        let papers = parse_snippet(&html, &base(), &ScheduleFilters::default());
        assert_eq!(papers.len(), 1);
        let p = &papers[0];
        assert_eq!(p.title, "Foo Bar");
        assert_eq!(
            p.url,
            "https://sa2025.conference-schedule.org/?post_type=page&p=14&id=papers_101&sess=sess108"
        );
        assert_eq!(p.authors, vec!["Jane Doe", "John Roe"]);
        assert_eq!(p.start, "2025-12-16T01:00Z");
        assert_eq!(p.end, "2025-12-16T01:12Z");
        assert_eq!(p.description, None);
    }

    #[test]
    fn test_rows_without_presentation_link_are_skipped() {
        let no_link = r#"<tr class="agenda-item" psid="S1" ssid="B1"><td>Coffee break</td></tr>"#;
        let html = snippet(&[
            session_row("S1", "Technical Paper", "Fluids", "Hall A"),
            no_link.to_string(),
        ]);
        assert!(parse_snippet(&html, &base(), &ScheduleFilters::default()).is_empty());
    }

    #[test]
    fn test_bare_row_fragment_parses() {
        let html = [
            session_row("S1", "Technical Paper", "Fluids", "Hall A"),
            paper_row("S1", "P1", "Foo", "/?id=papers_1", &["Ann"]),
        ]
        .concat();
        let papers = parse_snippet(&html, &base(), &ScheduleFilters::default());
        assert_eq!(papers.len(), 1);
        assert_eq!(papers[0].session, "Fluids");
    }

    #[test]
    fn test_misc_and_discussion_rows_are_skipped() {
        let html = snippet(&[
            session_row("S1", "Technical Paper", "Fluids", "Hall A"),
            paper_row("S1", "M1", "Welcome", "/?id=misc_12", &[]),
            paper_row("S1", "D1", "Technical Papers Interactive Discussion", "/?id=papers_9", &[]),
            paper_row("S1", "P1", "Real Paper", "/?id=papers_10", &["Ann"]),
        ]);
        let papers = parse_snippet(&html, &base(), &ScheduleFilters::default());
        assert_eq!(papers.len(), 1);
        assert_eq!(papers[0].paper_id.as_deref(), Some("P1"));
    }

    #[test]
    fn test_fast_forward_authors_are_excluded() {
        let row = r#"<tr class="agenda-item" psid="S1" ssid="P1">
            <td><a data-link-type="sub.presentation" href="/?id=papers_1">Foo</a>
                <a data-link-type="presentation.person">Jane Doe</a>
                <div class="technical-papers-fast-forward-presenter">
                    <a data-link-type="presentation.person">Jane Doe</a>
                    <a data-link-type="presentation.person">Speaker Only</a>
                </div>
                <a data-link-type="presentation.person">John Roe</a></td></tr>"#;
        let html = snippet(&[session_row("S1", "Technical Paper", "Fluids", "Hall A"), row.to_string()]);
        let papers = parse_snippet(&html, &base(), &ScheduleFilters::default());
        assert_eq!(papers[0].authors, vec!["Jane Doe", "John Roe"]);
    }

    #[test]
    fn test_misc_prefix_can_be_disabled() {
        let filters = ScheduleFilters { misc_id_prefix: None, ..Default::default() };
        let url = Url::parse("https://example.org/?id=misc_1").unwrap();
        assert!(!filters.is_misc_item(&url));
        assert!(ScheduleFilters::default().is_misc_item(&url));
    }
}
