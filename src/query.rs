use crate::models::{SearchCriteria, SourceQuery};

const MAX_DAYS_OLD: u32 = 21;
const RESULTS_PER_PAGE: u32 = 20;

/// Spellings the job sources index under.
const LOCATION_ALIASES: &[(&str, &str)] = &[("Gurugram", "Gurgaon"), ("Bengaluru", "Bangalore")];

fn apply_alias(location: &str) -> &str {
    LOCATION_ALIASES
        .iter()
        .find(|(from, _)| location.eq_ignore_ascii_case(from))
        .map(|(_, to)| *to)
        .unwrap_or(location)
}

fn title_case(location: &str) -> String {
    location
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Cross every keyword with every location. Aliasing happens before the
/// cross product so "Bengaluru" and "Bangalore" collapse to one query set.
pub fn build_queries(keywords: &[String], criteria: &SearchCriteria) -> Vec<SourceQuery> {
    let mut locations: Vec<String> = Vec::new();
    let raw_locations: Vec<String> = if criteria.locations.is_empty() {
        vec!["India".to_string()]
    } else {
        criteria.locations.clone()
    };
    for loc in &raw_locations {
        let mapped = title_case(apply_alias(loc));
        if !locations.contains(&mapped) {
            locations.push(mapped);
        }
    }

    let mut queries = Vec::with_capacity(keywords.len() * locations.len());
    for keyword in keywords {
        for location in &locations {
            queries.push(SourceQuery {
                what: keyword.clone(),
                location: location.clone(),
                max_days_old: MAX_DAYS_OLD,
                results_per_page: RESULTS_PER_PAGE,
            });
        }
    }
    queries
}

#[cfg(test)]
mod tests {
    use super::*;

    fn criteria(locations: &[&str]) -> SearchCriteria {
        SearchCriteria {
            locations: locations.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn queries_are_the_keyword_location_product() {
        let keywords = vec!["React".to_string(), "Node.js".to_string()];
        let queries = build_queries(&keywords, &criteria(&["Bangalore", "Pune"]));
        assert_eq!(queries.len(), 4);
        assert_eq!(queries[0].what, "React");
        assert_eq!(queries[0].location, "Bangalore");
        assert_eq!(queries[0].max_days_old, 21);
        assert_eq!(queries[0].results_per_page, 20);
    }

    #[test]
    fn aliases_collapse_duplicate_locations() {
        let keywords = vec!["React".to_string()];
        let queries = build_queries(&keywords, &criteria(&["Bengaluru", "Bangalore", "Gurugram"]));
        let locations: Vec<&str> = queries.iter().map(|q| q.location.as_str()).collect();
        assert_eq!(locations, vec!["Bangalore", "Gurgaon"]);
    }

    #[test]
    fn lowercase_locations_are_title_cased() {
        let keywords = vec!["React".to_string()];
        let queries = build_queries(&keywords, &criteria(&["bangalore", "new delhi"]));
        assert_eq!(queries[0].location, "Bangalore");
        assert_eq!(queries[1].location, "New Delhi");
    }

    #[test]
    fn missing_locations_default_to_india() {
        let keywords = vec!["React".to_string()];
        let queries = build_queries(&keywords, &criteria(&[]));
        assert_eq!(queries.len(), 1);
        assert_eq!(queries[0].location, "India");
    }
}
