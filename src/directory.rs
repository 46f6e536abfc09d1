//! Club directory search.
//!
//! The same predicate is evaluated by [`ClubFilter::matches`] over fetched
//! rows and pushed into the store query by [`crate::store::Store::list_clubs`].

use crate::models::Club;
use serde::Deserialize;

/// Wildcard category accepted from clients.
pub const ALL_CATEGORIES: &str = "All";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CategoryFilter {
    #[default]
    All,
    Only(String),
}

impl CategoryFilter {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            None | Some("") | Some(ALL_CATEGORIES) => CategoryFilter::All,
            Some(name) => CategoryFilter::Only(name.to_string()),
        }
    }

    pub fn matches(&self, category: &str) -> bool {
        match self {
            CategoryFilter::All => true,
            CategoryFilter::Only(name) => name == category,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClubFilter {
    /// Lowercased search term; `None` matches every club.
    search: Option<String>,
    pub category: CategoryFilter,
}

impl ClubFilter {
    pub fn new(search: Option<&str>, category: CategoryFilter) -> Self {
        let search = search
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase);
        Self { search, category }
    }

    pub fn search(&self) -> Option<&str> {
        self.search.as_deref()
    }

    pub fn matches_search(&self, club: &Club) -> bool {
        match &self.search {
            None => true,
            Some(term) => {
                club.name.to_lowercase().contains(term)
                    || club.short_description.to_lowercase().contains(term)
            }
        }
    }

    pub fn matches_category(&self, club: &Club) -> bool {
        self.category.matches(&club.category)
    }

    pub fn matches(&self, club: &Club) -> bool {
        self.matches_search(club) && self.matches_category(club)
    }
}

/// Query parameters of the public directory.
#[derive(Debug, Default, Deserialize)]
pub struct DirectoryParams {
    pub search: Option<String>,
    pub category: Option<String>,
}

impl From<DirectoryParams> for ClubFilter {
    fn from(params: DirectoryParams) -> Self {
        ClubFilter::new(
            params.search.as_deref(),
            CategoryFilter::parse(params.category.as_deref()),
        )
    }
}

/// What the store should return from the clubs table.
#[derive(Debug, Clone, Default)]
pub struct ClubQuery {
    pub filter: ClubFilter,
    pub active_only: bool,
    pub verified_only: bool,
    pub limit: Option<i64>,
}

impl ClubQuery {
    pub fn directory(filter: ClubFilter) -> Self {
        Self {
            filter,
            active_only: true,
            ..Self::default()
        }
    }

    pub fn featured(limit: i64) -> Self {
        Self {
            verified_only: true,
            active_only: true,
            limit: Some(limit),
            ..Self::default()
        }
    }

    pub fn matches(&self, club: &Club) -> bool {
        (!self.active_only || club.is_active)
            && (!self.verified_only || club.is_verified)
            && self.filter.matches(club)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rstest::rstest;

    fn club(id: i32, name: &str, category: &str, description: &str) -> Club {
        Club {
            id,
            name: name.to_string(),
            slug: crate::slug::slugify(name),
            category: category.to_string(),
            short_description: description.to_string(),
            long_description: None,
            logo_url: None,
            banner_url: None,
            website_url: None,
            social_facebook: None,
            social_instagram: None,
            social_twitter: None,
            email: None,
            phone: None,
            is_verified: true,
            is_active: true,
            website_clicks: 0,
            created_by: None,
            created_at: Utc::now(),
        }
    }

    fn registry() -> Vec<Club> {
        vec![
            club(1, "GECP Robotics Society", "Technical", "Bots and drones"),
            club(2, "Literary Circle", "Literary", "Poetry, debate and robotics fiction"),
            club(3, "AI & Data Club", "Technical", "Machine learning study group"),
            club(4, "Rhythm Collective", "Cultural", "Music and dance"),
        ]
    }

    fn filter_clubs<'a>(clubs: &'a [Club], filter: &ClubFilter) -> Vec<&'a Club> {
        clubs.iter().filter(|club| filter.matches(club)).collect()
    }

    fn ids(clubs: &[&Club]) -> Vec<i32> {
        clubs.iter().map(|c| c.id).collect()
    }

    #[rstest]
    #[case(None, "All", vec![1, 2, 3, 4])]
    #[case(Some("ROBOTICS"), "All", vec![1, 2])]
    #[case(Some("robotics"), "Technical", vec![1])]
    #[case(Some("  "), "Cultural", vec![4])]
    #[case(Some("learning"), "Technical", vec![3])]
    #[case(Some("chess"), "All", vec![])]
    #[case(None, "Sports", vec![])]
    fn filters_by_search_and_category(
        #[case] search: Option<&str>,
        #[case] category: &str,
        #[case] expected: Vec<i32>,
    ) {
        let clubs = registry();
        let filter = ClubFilter::new(search, CategoryFilter::parse(Some(category)));
        assert_eq!(ids(&filter_clubs(&clubs, &filter)), expected);
    }

    #[rstest]
    #[case(Some("o"), "Technical")]
    #[case(Some("club"), "All")]
    #[case(None, "Literary")]
    #[case(Some("music"), "Technical")]
    fn predicate_order_commutes(#[case] search: Option<&str>, #[case] category: &str) {
        let clubs = registry();
        let filter = ClubFilter::new(search, CategoryFilter::parse(Some(category)));

        let search_first: Vec<i32> = clubs
            .iter()
            .filter(|c| filter.matches_search(c))
            .filter(|c| filter.matches_category(c))
            .map(|c| c.id)
            .collect();
        let category_first: Vec<i32> = clubs
            .iter()
            .filter(|c| filter.matches_category(c))
            .filter(|c| filter.matches_search(c))
            .map(|c| c.id)
            .collect();

        assert_eq!(search_first, category_first);
        assert_eq!(search_first, ids(&filter_clubs(&clubs, &filter)));
    }

    #[test]
    fn empty_or_wildcard_category_means_all() {
        assert_eq!(CategoryFilter::parse(None), CategoryFilter::All);
        assert_eq!(CategoryFilter::parse(Some("")), CategoryFilter::All);
        assert_eq!(CategoryFilter::parse(Some("All")), CategoryFilter::All);
        assert_eq!(
            CategoryFilter::parse(Some("Sports")),
            CategoryFilter::Only("Sports".to_string())
        );
    }

    #[test]
    fn query_respects_active_and_verified_flags() {
        let mut clubs = registry();
        clubs[0].is_active = false;
        clubs[1].is_verified = false;

        let directory = ClubQuery::directory(ClubFilter::default());
        let featured = ClubQuery::featured(10);

        let listed: Vec<i32> = clubs.iter().filter(|c| directory.matches(c)).map(|c| c.id).collect();
        let shown: Vec<i32> = clubs.iter().filter(|c| featured.matches(c)).map(|c| c.id).collect();
        assert_eq!(listed, vec![2, 3, 4]);
        assert_eq!(shown, vec![3, 4]);
    }
}
