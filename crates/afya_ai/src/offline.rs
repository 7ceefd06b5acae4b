//! Offline responder.
//!
//! Last entry of every cascade. Matches the most recent user question
//! against an ordered pattern table and answers from canned, historical
//! content under a fixed degraded-mode banner. No network, no clock, no
//! randomness: identical input yields byte-identical output.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::warn;

use crate::providers::{ProviderClient, ProviderError};
use crate::types::{Conversation, ProviderIdentity};

/// Prepended to every offline answer.
pub const DEGRADED_BANNER: &str =
    "[DEGRADED MODE] Live AI providers are unavailable. The answer below comes from cached historical data.";

/// Appended after the canned content.
const DEGRADED_FOOTER: &str =
    "Figures are indicative only. Retry later for real-time data and full functionality.";

/// Used when the conversation has no user turn.
const DEFAULT_QUERY: &str = "system status";

// ---------------------------------------------------------------------------
// Categories
// ---------------------------------------------------------------------------

/// Canned answer categories, in match priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OfflineCategory {
    TotalChws,
    CountyPerformance,
    FamilyPlanning,
    Immunization,
    MaternalHealth,
    Comparison,
    TopPerformers,
    Trends,
    Dashboard,
    Report,
    GeneralUnavailable,
}

impl OfflineCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TotalChws => "total_chws",
            Self::CountyPerformance => "county_performance",
            Self::FamilyPlanning => "family_planning",
            Self::Immunization => "immunization",
            Self::MaternalHealth => "maternal_health",
            Self::Comparison => "comparison",
            Self::TopPerformers => "top_performers",
            Self::Trends => "trends",
            Self::Dashboard => "dashboard",
            Self::Report => "report",
            Self::GeneralUnavailable => "general_unavailable",
        }
    }

    fn canned(&self) -> &'static CannedAnswer {
        match self {
            Self::TotalChws => &TOTAL_CHWS,
            Self::CountyPerformance => &COUNTY_PERFORMANCE,
            Self::FamilyPlanning => &FAMILY_PLANNING,
            Self::Immunization => &IMMUNIZATION,
            Self::MaternalHealth => &MATERNAL_HEALTH,
            Self::Comparison => &COMPARISON,
            Self::TopPerformers => &TOP_PERFORMERS,
            Self::Trends => &TRENDS,
            Self::Dashboard => &DASHBOARD,
            Self::Report => &REPORT,
            Self::GeneralUnavailable => &GENERAL_UNAVAILABLE,
        }
    }
}

impl std::fmt::Display for OfflineCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Pattern table
// ---------------------------------------------------------------------------

/// Ordered `(category, pattern)` table. First match wins.
static PATTERNS: Lazy<Vec<(OfflineCategory, Regex)>> = Lazy::new(|| {
    [
        (
            OfflineCategory::TotalChws,
            r"(?i)\b(total|count|how many|number of)\b.*\bchws?\b",
        ),
        (
            OfflineCategory::CountyPerformance,
            r"(?i)\bperformance\b.*\bcount(y|ies)\b|\bcount(y|ies)\b.*\bperformance\b",
        ),
        (
            OfflineCategory::FamilyPlanning,
            r"(?i)\bfamily\s+planning\b|\bfp\b|\bcontracepti(ve|ves|on)\b",
        ),
        (
            OfflineCategory::Immunization,
            r"(?i)\bimmuni[sz]ation\b|\bvaccinations?\b|\bvaccines?\b",
        ),
        (
            OfflineCategory::MaternalHealth,
            r"(?i)\bmaternal\b|\bpregnan(cy|t)\b|\banc\b|\bantenatal\b",
        ),
        (
            OfflineCategory::Comparison,
            r"(?i)\bcompare\b|\bcomparison\b|\bbetween\b|\bversus\b|\bvs\.?\b",
        ),
        (
            OfflineCategory::TopPerformers,
            r"(?i)\btop\b|\bbest\b|\bhighest\b|\bperforming\b",
        ),
        (
            OfflineCategory::Trends,
            r"(?i)\btrends?\b|\bover time\b|\bmonthly\b|\bquarterly\b",
        ),
        (
            OfflineCategory::Dashboard,
            r"(?i)\bdashboard\b|\breal[\s-]?time\b|\bmonitor(ing)?\b",
        ),
        (
            OfflineCategory::Report,
            r"(?i)\breports?\b|\bgenerate\b|\bsummary\b",
        ),
    ]
    .into_iter()
    .filter_map(|(category, pattern)| match Regex::new(pattern) {
        Ok(re) => Some((category, re)),
        Err(e) => {
            warn!(category = %category, error = %e, "Invalid offline pattern skipped");
            None
        }
    })
    .collect()
});

/// Match a question against the pattern table.
pub fn match_category(query: &str) -> OfflineCategory {
    PATTERNS
        .iter()
        .find(|(_, re)| re.is_match(query))
        .map(|(category, _)| *category)
        .unwrap_or(OfflineCategory::GeneralUnavailable)
}

// ---------------------------------------------------------------------------
// Canned content
// ---------------------------------------------------------------------------

struct CannedAnswer {
    summary: &'static str,
    sql_query: &'static str,
    chart_suggestion: &'static str,
}

static TOTAL_CHWS: CannedAnswer = CannedAnswer {
    summary: "Total community health workers: approximately 107,000 active CHWs nationally \
across 47 counties. Focus counties are Kisumu, Busia and Vihiga.",
    sql_query: "SELECT COUNT(*) AS total_chws FROM chw_master WHERE active = true;",
    chart_suggestion: "Bar chart showing CHW distribution by county",
};

static COUNTY_PERFORMANCE: CannedAnswer = CannedAnswer {
    summary: "County performance overview: Kisumu leads on family planning and immunization, \
Vihiga on maternal health indicators and Busia on community engagement. Historical coverage \
ranges from 70-85% for family planning and 80-90% for immunization.",
    sql_query: "SELECT county, AVG(performance_score) AS avg_performance FROM chw_performance GROUP BY county;",
    chart_suggestion: "Horizontal bar chart comparing county performance scores",
};

static FAMILY_PLANNING: CannedAnswer = CannedAnswer {
    summary: "Family planning services: historical coverage is about 78% in Kisumu, 72% in Busia \
and 80% in Vihiga against an 85% national target. Services include contraceptive distribution, \
counseling and facility referrals.",
    sql_query: "SELECT county, SUM(fp_services) AS total_fp FROM family_planning_data GROUP BY county;",
    chart_suggestion: "Line chart showing family planning trends by county",
};

static IMMUNIZATION: CannedAnswer = CannedAnswer {
    summary: "Immunization: historical coverage in the focus counties sits between 80% and 90%. \
Defaulter tracing by CHWs accounts for a large share of catch-up doses.",
    sql_query: "SELECT county, SUM(immunizations_given) AS total_immunizations FROM immunization_data GROUP BY county;",
    chart_suggestion: "Stacked bar chart of immunizations by vaccine and county",
};

static MATERNAL_HEALTH: CannedAnswer = CannedAnswer {
    summary: "Maternal health: historical antenatal care coverage is 75-85% in the focus counties. \
CHW home visits and referrals for facility delivery are the main tracked services.",
    sql_query: "SELECT county, SUM(anc_visits) AS total_anc, SUM(facility_referrals) AS referrals FROM maternal_health_data GROUP BY county;",
    chart_suggestion: "Grouped bar chart of ANC visits and referrals by county",
};

static COMPARISON: CannedAnswer = CannedAnswer {
    summary: "Comparison: across cached indicators Vihiga and Kisumu perform similarly on \
coverage while Busia trails slightly on family planning. A live comparison needs current data.",
    sql_query: "SELECT county, AVG(performance_score) AS avg_score, COUNT(DISTINCT chw_id) AS chws FROM chw_performance GROUP BY county ORDER BY avg_score DESC;",
    chart_suggestion: "Side-by-side bar chart comparing the selected counties",
};

static TOP_PERFORMERS: CannedAnswer = CannedAnswer {
    summary: "Top performers: cached rankings place Kisumu first on service volume and Vihiga \
first on coverage rates. Individual CHW rankings are not available offline.",
    sql_query: "SELECT chw_id, county, performance_score FROM chw_performance ORDER BY performance_score DESC LIMIT 10;",
    chart_suggestion: "Ranked horizontal bar chart of the top 10 CHWs",
};

static TRENDS: CannedAnswer = CannedAnswer {
    summary: "Trends: service volumes for December 2024 to June 2025 rose steadily in all three \
focus counties, with a seasonal dip in immunization during the first quarter.",
    sql_query: "SELECT DATE_TRUNC('month', report_date) AS month, SUM(services) AS total FROM chw_activity GROUP BY month ORDER BY month;",
    chart_suggestion: "Line chart of monthly service totals",
};

static DASHBOARD: CannedAnswer = CannedAnswer {
    summary: "Dashboard: real-time monitoring is unavailable while the AI providers are down. \
Cached county summaries can still be viewed.",
    sql_query: "SELECT county, COUNT(*) AS records, MAX(report_date) AS last_update FROM chw_activity GROUP BY county;",
    chart_suggestion: "KPI cards with last-updated timestamps per county",
};

static REPORT: CannedAnswer = CannedAnswer {
    summary: "Reports: narrative report generation needs a live AI provider. A summary of cached \
indicators for Kisumu, Busia and Vihiga is available in the meantime.",
    sql_query: "SELECT county, SUM(services) AS total_services, AVG(performance_score) AS avg_score FROM chw_performance GROUP BY county;",
    chart_suggestion: "Summary table with a coverage bar chart per county",
};

static GENERAL_UNAVAILABLE: CannedAnswer = CannedAnswer {
    summary: "System status: emergency mode. Both AI providers are temporarily unavailable and \
only cached answers are served. Cached data covers national CHW totals, county performance, \
family planning and immunization. Try again in a few minutes; for urgent questions contact the \
county health management team.",
    sql_query: "SELECT 1 AS status;",
    chart_suggestion: "Status indicator showing system availability",
};

// ---------------------------------------------------------------------------
// Responder
// ---------------------------------------------------------------------------

/// Structured offline answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OfflineAnswer {
    pub category: OfflineCategory,
    /// Banner, summary and footer as shown to the user.
    pub text: String,
    /// Illustrative only; never executed.
    pub sql_query: String,
    pub chart_suggestion: String,
}

/// Deterministic responder used when every network provider has failed.
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineResponder;

impl OfflineResponder {
    pub fn new() -> Self {
        Self
    }

    /// Full structured answer for `conversation`.
    pub fn answer(&self, conversation: &Conversation) -> OfflineAnswer {
        let query = conversation
            .last_user_text()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or(DEFAULT_QUERY);
        let category = match_category(query);
        let canned = category.canned();

        OfflineAnswer {
            category,
            text: format!(
                "{DEGRADED_BANNER}\n\n{}\n\nIllustrative query: {}\nSuggested chart: {}\n\n{DEGRADED_FOOTER}",
                canned.summary, canned.sql_query, canned.chart_suggestion
            ),
            sql_query: canned.sql_query.to_string(),
            chart_suggestion: canned.chart_suggestion.to_string(),
        }
    }

    /// Banner-prefixed answer text for `conversation`.
    pub fn respond(&self, conversation: &Conversation) -> String {
        self.answer(conversation).text
    }
}

#[async_trait]
impl ProviderClient for OfflineResponder {
    fn identity(&self) -> ProviderIdentity {
        ProviderIdentity::Offline
    }

    fn name(&self) -> &str {
        "Offline"
    }

    async fn complete(&self, conversation: &Conversation) -> Result<String, ProviderError> {
        Ok(self.respond(conversation))
    }
}
