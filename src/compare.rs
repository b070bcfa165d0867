//! Region comparison.
//!
//! Composes resolution, fetching, aggregation and scoring into the single
//! `compare_regions` operation. This is the boundary where every failure
//! becomes report text; callers always get a displayable string.

use crate::analysis::{aggregate, score};
use crate::config::Config;
use crate::dataset::{DatasetFetcher, FetchError};
use crate::models::{DatasetTable, ScoredGroup};
use crate::region::RegionResolver;
use anyhow::Result;
use tracing::{info, warn};

/// Report text when either dataset cannot be loaded.
pub const LOAD_ERROR_MESSAGE: &str = "Error loading data for one or both regions.";

/// Report text when no group is significant.
pub const NO_DIFFERENCES_MESSAGE: &str = "No significant demographic differences found.";

/// Header preceding the list of significant groups.
pub const DIFFERENCES_HEADER: &str = "Significant demographic differences (z > 2):";

/// Transport-agnostic implementation of the `compare_regions` tool.
#[derive(Debug, Clone)]
pub struct RegionComparator {
    resolver: RegionResolver,
    fetcher: DatasetFetcher,
}

impl RegionComparator {
    pub fn new(resolver: RegionResolver, fetcher: DatasetFetcher) -> Self {
        Self { resolver, fetcher }
    }

    /// Build the comparator and its HTTP clients from configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(
            RegionResolver::new(&config.lookup)?,
            DatasetFetcher::new(&config.dataset)?,
        ))
    }

    /// Compare two zip codes and return the report text.
    pub async fn compare_regions(&self, zip_a: &str, zip_b: &str) -> String {
        info!("Comparing regions {} and {}", zip_a, zip_b);

        let loaded = tokio::try_join!(self.load_region(zip_a), self.load_region(zip_b));
        let (table_a, table_b) = match loaded {
            Ok(tables) => tables,
            Err(e) => {
                warn!("Comparison of {} and {} aborted: {}", zip_a, zip_b, e);
                return LOAD_ERROR_MESSAGE.to_string();
            }
        };

        let flagged = score(&aggregate(&table_a), &aggregate(&table_b));
        info!(
            "Found {} significant groups between {} and {}",
            flagged.len(),
            zip_a,
            zip_b
        );

        format_report(&flagged)
    }

    /// Resolve one zip code and fetch its dataset.
    async fn load_region(&self, zip_code: &str) -> Result<DatasetTable, FetchError> {
        let resolution = self.resolver.resolve(zip_code).await;
        if !resolution.is_resolved() {
            warn!(
                "Fetching {} with unresolved state ({})",
                zip_code, resolution
            );
        }

        self.fetcher.fetch(resolution.dataset_key(), zip_code).await
    }
}

/// Render the significant difference set as report text.
pub fn format_report(flagged: &[ScoredGroup]) -> String {
    if flagged.is_empty() {
        return NO_DIFFERENCES_MESSAGE.to_string();
    }

    let mut lines = Vec::with_capacity(flagged.len() + 1);
    lines.push(DIFFERENCES_HEADER.to_string());
    for group in flagged {
        lines.push(format!(" - {}: z={:.2}", group.key, group.z_score));
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DatasetConfig, LookupConfig};
    use crate::models::GroupKey;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const BASE_ROWS: &[(i64, &str, &str, usize)] = &[
        (20, "M", "X", 8),
        (40, "F", "Y", 6),
        (50, "M", "Y", 4),
        (60, "F", "X", 9),
        (70, "M", "Z", 2),
    ];

    fn csv_dataset(extra: &[(i64, &'static str, &'static str, usize)]) -> String {
        let mut csv = String::from("household_id,age,gender,ethnicity\n");
        let mut id = 0;
        for (age, gender, ethnicity, n) in BASE_ROWS.iter().chain(extra) {
            for _ in 0..*n {
                id += 1;
                csv.push_str(&format!("{},{},{},{}\n", id, age, gender, ethnicity));
            }
        }
        csv
    }

    /// The base rows as a float-typed age column with one missing age,
    /// the way pandas writes an integer column that has a gap.
    fn float_age_dataset(extra: &[(i64, &'static str, &'static str, usize)]) -> String {
        let mut csv = String::from("household_id,age,gender,ethnicity\n");
        let mut id = 0;
        for (age, gender, ethnicity, n) in BASE_ROWS.iter().chain(extra) {
            for _ in 0..*n {
                id += 1;
                csv.push_str(&format!("{},{:.1},{},{}\n", id, *age as f64, gender, ethnicity));
            }
        }
        csv.push_str(&format!("{},,F,X\n", id + 1));
        csv
    }

    async fn mock_state(server: &MockServer, zip: &str, state: &str) {
        Mock::given(method("GET"))
            .and(path("/v1/zipcode"))
            .and(query_param("zip", zip))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "state": state }])))
            .mount(server)
            .await;
    }

    async fn mock_dataset(server: &MockServer, state: &str, zip: &str, status: u16, body: String) {
        Mock::given(method("GET"))
            .and(path(format!("/household/{}/{}_household.csv", state, zip)))
            .respond_with(ResponseTemplate::new(status).set_body_string(body))
            .mount(server)
            .await;
    }

    fn comparator(server: &MockServer) -> RegionComparator {
        RegionComparator::new(
            RegionResolver::new(&LookupConfig {
                url: format!("{}/v1/zipcode", server.uri()),
                api_key: Some("test-key".to_string()),
            })
            .unwrap(),
            DatasetFetcher::new(&DatasetConfig {
                base_url: format!("{}/household", server.uri()),
                extension: "csv".to_string(),
                timeout_seconds: 5,
            })
            .unwrap(),
        )
    }

    #[test]
    fn test_format_report_empty() {
        assert_eq!(format_report(&[]), NO_DIFFERENCES_MESSAGE);
    }

    #[test]
    fn test_format_report_lines() {
        let flagged = vec![
            ScoredGroup {
                key: GroupKey::new(30, "F", "X"),
                z_score: 2.23606797749979,
            },
            ScoredGroup {
                key: GroupKey::new(80, "M", "Y"),
                z_score: -2.005,
            },
        ];

        assert_eq!(
            format_report(&flagged),
            "Significant demographic differences (z > 2):\n - (30, 'F', 'X'): z=2.24\n - (80, 'M', 'Y'): z=-2.00"
        );
    }

    #[tokio::test]
    async fn test_identical_distributions_report_no_differences() {
        let server = MockServer::start().await;
        mock_state(&server, "02139", "Massachusetts").await;
        mock_state(&server, "94110", "California").await;
        mock_dataset(&server, "Massachusetts", "02139", 200, csv_dataset(&[])).await;
        mock_dataset(&server, "California", "94110", 200, csv_dataset(&[])).await;

        let report = comparator(&server).compare_regions("02139", "94110").await;

        assert_eq!(report, NO_DIFFERENCES_MESSAGE);
    }

    #[tokio::test]
    async fn test_float_typed_ages_align_with_integer_ages() {
        let server = MockServer::start().await;
        mock_state(&server, "02139", "Massachusetts").await;
        mock_state(&server, "94110", "California").await;
        // Split by column type, the large group alone would score |z| > 2.
        let large_group = [(30, "F", "X", 100)];
        mock_dataset(&server, "Massachusetts", "02139", 200, csv_dataset(&large_group)).await;
        mock_dataset(&server, "California", "94110", 200, float_age_dataset(&large_group)).await;

        let report = comparator(&server).compare_regions("02139", "94110").await;

        assert_eq!(report, NO_DIFFERENCES_MESSAGE);
    }

    #[tokio::test]
    async fn test_outlier_group_is_reported() {
        let server = MockServer::start().await;
        mock_state(&server, "02139", "Massachusetts").await;
        mock_state(&server, "94110", "California").await;
        mock_dataset(
            &server,
            "Massachusetts",
            "02139",
            200,
            csv_dataset(&[(30, "F", "X", 100)]),
        )
        .await;
        mock_dataset(
            &server,
            "California",
            "94110",
            200,
            csv_dataset(&[(30, "F", "X", 10)]),
        )
        .await;

        let report = comparator(&server).compare_regions("02139", "94110").await;

        assert_eq!(
            report,
            "Significant demographic differences (z > 2):\n - (30, 'F', 'X'): z=2.24"
        );
    }

    #[tokio::test]
    async fn test_missing_dataset_reports_load_error() {
        let server = MockServer::start().await;
        mock_state(&server, "02139", "Massachusetts").await;
        mock_state(&server, "94110", "California").await;
        mock_dataset(&server, "Massachusetts", "02139", 200, csv_dataset(&[])).await;
        mock_dataset(&server, "California", "94110", 404, String::new()).await;

        let report = comparator(&server).compare_regions("02139", "94110").await;

        assert_eq!(report, LOAD_ERROR_MESSAGE);
    }

    #[tokio::test]
    async fn test_unresolved_state_reports_load_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/zipcode"))
            .and(query_param("zip", "00000"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;
        mock_state(&server, "94110", "California").await;
        mock_dataset(&server, "California", "94110", 200, csv_dataset(&[])).await;
        // The sentinel-keyed URL is requested and falls through to a 404.
        Mock::given(method("GET"))
            .and(path("/household/State%20not%20found/00000_household.csv"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let report = comparator(&server).compare_regions("00000", "94110").await;

        assert_eq!(report, LOAD_ERROR_MESSAGE);
    }

    #[tokio::test]
    async fn test_lookup_outage_reports_load_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/zipcode"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let report = comparator(&server).compare_regions("02139", "94110").await;

        assert_eq!(report, LOAD_ERROR_MESSAGE);
    }
}
