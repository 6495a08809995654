// Copyright (C) 2025  Tom Waddington
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published
// by the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Cast catalog: listing and filtering of available scripts

use crate::types::Script;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CastRecord {
    pub id: String,
    pub title: String,
    pub channel: Option<String>,
    pub tags: Vec<String>,
    pub description: Option<String>,
}

pub fn records(scripts: &[Script]) -> Vec<CastRecord> {
    scripts
        .iter()
        .map(|script| CastRecord {
            id: script.meta.id.clone(),
            title: script.meta.title.clone(),
            channel: script.meta.channel.clone(),
            tags: script.meta.tags.clone(),
            description: script.meta.description.clone(),
        })
        .collect()
}

/// Records whose text fields contain `query` (case-insensitive) and whose
/// tag set covers every required tag. Relative order is preserved; any
/// display ordering is applied by the caller.
pub fn search<'a>(
    records: &'a [CastRecord],
    query: &str,
    required_tags: &[String],
) -> Vec<&'a CastRecord> {
    let query = query.to_lowercase();

    records
        .iter()
        .filter(|record| {
            let text_match = query.is_empty()
                || record.id.to_lowercase().contains(&query)
                || record.title.to_lowercase().contains(&query)
                || record
                    .channel
                    .as_deref()
                    .unwrap_or("")
                    .to_lowercase()
                    .contains(&query)
                || record
                    .description
                    .as_deref()
                    .unwrap_or("")
                    .to_lowercase()
                    .contains(&query)
                || record.tags.iter().any(|tag| tag.to_lowercase().contains(&query));

            let tags_match = required_tags.iter().all(|required| {
                record
                    .tags
                    .iter()
                    .any(|tag| tag.eq_ignore_ascii_case(required))
            });

            text_match && tags_match
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, title: &str, tags: &[&str]) -> CastRecord {
        CastRecord {
            id: id.to_string(),
            title: title.to_string(),
            channel: None,
            tags: tags.iter().map(|t| t.to_string()).collect(),
            description: None,
        }
    }

    fn ids<'a>(matches: &[&'a CastRecord]) -> Vec<&'a str> {
        matches.iter().map(|r| r.id.as_str()).collect()
    }

    #[test]
    fn empty_query_and_no_tags_match_everything() {
        let records = vec![record("a", "One", &[]), record("b", "Two", &[])];
        assert_eq!(search(&records, "", &[]).len(), 2);
    }

    #[test]
    fn query_matches_title_case_insensitively() {
        let records = vec![
            record("file-processing", "Spreadsheet completion", &["files"]),
            record("api-debugging", "Payment API debugging", &["devops"]),
        ];
        assert_eq!(ids(&search(&records, "SPREAD", &[])), vec!["file-processing"]);
        assert_eq!(ids(&search(&records, "api", &[])), vec!["api-debugging"]);
    }

    #[test]
    fn query_matches_tags_too() {
        let records = vec![
            record("a", "One", &["files", "enrichment"]),
            record("b", "Two", &["devops"]),
        ];
        assert_eq!(ids(&search(&records, "enrich", &[])), vec!["a"]);
    }

    #[test]
    fn required_tags_are_a_superset_test() {
        let records = vec![
            record("a", "One", &["files", "enrichment"]),
            record("b", "Two", &["files"]),
        ];
        let required = vec!["files".to_string(), "enrichment".to_string()];
        assert_eq!(ids(&search(&records, "", &required)), vec!["a"]);
    }

    #[test]
    fn query_and_tags_combine_with_and() {
        let records = vec![
            record("a", "Spreadsheet completion", &["files"]),
            record("b", "Spreadsheet import", &["devops"]),
        ];
        let required = vec!["files".to_string()];
        assert_eq!(ids(&search(&records, "spreadsheet", &required)), vec!["a"]);
    }

    #[test]
    fn relative_order_is_stable() {
        let records = vec![
            record("c", "match three", &[]),
            record("a", "match one", &[]),
            record("b", "match two", &[]),
        ];
        assert_eq!(ids(&search(&records, "match", &[])), vec!["c", "a", "b"]);
    }

    #[test]
    fn no_match_returns_empty() {
        let records = vec![record("a", "One", &["files"])];
        assert!(search(&records, "zzz", &[]).is_empty());
        assert!(search(&records, "", &["missing".to_string()]).is_empty());
    }
}
