//! crates/research_assistant_core/src/report.rs
//!
//! Builds the report and citations for a finished query. Every field is a fixed
//! template; the question is the only input that varies the text.

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::domain::{CitationRecord, ReportDepth, ResultRecord, SourceType};

/// Sources reported as found by the search stage.
pub const SIMULATED_SOURCES_FOUND: u32 = 18;

/// Intermediate counts displayed while the search stage runs.
pub const SOURCE_COUNT_STEPS: [u32; 5] = [5, 8, 12, 15, 18];

/// Spacing between the intermediate counts, in milliseconds.
pub const SOURCE_COUNT_INTERVAL_MS: u64 = 800;

/// Seconds added to the estimate per staged file.
pub const SECONDS_PER_FILE: u32 = 10;

const WORDS_PER_MINUTE: u32 = 200;

/// Reading time in whole minutes, rounded up.
pub fn reading_time(word_count: u32) -> u32 {
    word_count.div_ceil(WORDS_PER_MINUTE)
}

/// Advisory completion estimate in seconds. Does not influence stage timing.
pub fn estimate_seconds(depth: ReportDepth, file_count: usize) -> u32 {
    let files = u32::try_from(file_count).unwrap_or(u32::MAX);
    depth
        .base_estimate_secs()
        .saturating_add(files.saturating_mul(SECONDS_PER_FILE))
}

/// Renders an estimate as `"{minutes}m {seconds}s"`.
pub fn format_estimate(seconds: u32) -> String {
    format!("{}m {}s", seconds / 60, seconds % 60)
}

pub fn new_result_id() -> String {
    format!("result_{}", Uuid::new_v4().simple())
}

/// Builds the report for `question` at `depth`.
pub fn build_result(
    result_id: &str,
    query_id: &str,
    question: &str,
    depth: ReportDepth,
    now: DateTime<Utc>,
) -> ResultRecord {
    let word_count = depth.word_count();
    ResultRecord {
        id: result_id.to_string(),
        query_id: query_id.to_string(),
        title: format!("Research Report: {question}"),
        summary: format!(
            "This comprehensive research report examines \"{question}\" through analysis of \
             multiple sources including academic papers, industry reports, and recent \
             developments. Our investigation reveals key insights and actionable \
             recommendations based on current evidence and expert analysis."
        ),
        key_findings: to_strings(&[
            "Market analysis shows significant growth potential in the target sector",
            "Current technology trends indicate strong adoption rates",
            "Regulatory environment remains favorable for innovation",
            "Consumer sentiment research reveals positive reception",
            "Competitive landscape analysis identifies key opportunities",
        ]),
        detailed_analysis: detailed_analysis(question),
        conclusions: "Based on our comprehensive analysis, the research indicates strong \
                      potential for growth and innovation in this space. Key success factors \
                      include strategic positioning, technological adaptation, and \
                      customer-centric approaches. Organizations should consider both \
                      opportunities and risks when developing implementation strategies."
            .to_string(),
        recommendations: to_strings(&[
            "Develop a comprehensive market entry strategy based on identified opportunities",
            "Invest in technology infrastructure to support scalable operations",
            "Build strategic partnerships with key industry players",
            "Monitor regulatory developments and ensure compliance readiness",
            "Implement customer feedback systems for continuous improvement",
        ]),
        word_count,
        reading_time: reading_time(word_count),
        created_at: now,
        updated_at: now,
    }
}

fn detailed_analysis(question: &str) -> String {
    let sections = [
        (
            "Executive Summary".to_string(),
            format!(
                "Our comprehensive analysis of \"{question}\" reveals significant opportunities \
                 and important considerations for stakeholders. Based on extensive research \
                 across multiple credible sources, this report provides actionable insights and \
                 strategic recommendations."
            ),
        ),
        (
            "Key Market Insights".to_string(),
            "The current market landscape demonstrates robust growth potential, driven by \
             technological advancement and changing consumer preferences. Industry experts \
             predict continued expansion over the next 3-5 years, with particular strength in \
             emerging market segments."
                .to_string(),
        ),
        (
            "Technology and Innovation Trends".to_string(),
            "Recent technological developments have created new possibilities for market \
             expansion and operational efficiency. Leading organizations are investing heavily \
             in research and development to maintain competitive advantages."
                .to_string(),
        ),
        (
            "Regulatory and Policy Considerations".to_string(),
            "The regulatory environment continues to evolve, with recent policy changes \
             creating both opportunities and challenges. Compliance requirements are becoming \
             more standardized across jurisdictions."
                .to_string(),
        ),
        (
            "Competitive Analysis".to_string(),
            "Market leaders are differentiating through innovation, customer experience, and \
             strategic partnerships. New entrants are finding success by focusing on \
             underserved market segments and leveraging emerging technologies."
                .to_string(),
        ),
    ];

    sections
        .iter()
        .map(|(heading, body)| format!("<h3>{heading}</h3>\n<p>{body}</p>"))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Builds the three citations attached to every result, in the order
/// academic, news, blog.
pub fn build_citations(result_id: &str, now: DateTime<Utc>) -> Vec<CitationRecord> {
    let batch = Uuid::new_v4().simple().to_string();
    let templates = [
        (
            SourceType::Academic,
            "Market Research Analysis and Trends",
            "https://example.com/research-paper-1",
            "Dr. Sarah Johnson",
            30,
            "The analysis reveals significant growth patterns in the target market, with \
             adoption rates exceeding initial projections by 25%.",
            95,
        ),
        (
            SourceType::News,
            "Industry Report: Latest Developments",
            "https://example.com/industry-news",
            "TechNews Editorial",
            7,
            "Recent industry developments suggest a shift toward more sustainable and \
             efficient practices across the sector.",
            88,
        ),
        (
            SourceType::Blog,
            "Expert Opinion: Future Outlook",
            "https://example.com/expert-blog",
            "Michael Chen",
            14,
            "Industry experts predict continued growth driven by technological innovation \
             and changing consumer preferences.",
            82,
        ),
    ];

    templates
        .into_iter()
        .enumerate()
        .map(
            |(i, (source_type, title, url, author, days_old, excerpt, relevance_score))| {
                CitationRecord {
                    id: format!("citation_{}_{}", batch, i + 1),
                    result_id: result_id.to_string(),
                    source_type,
                    title: title.to_string(),
                    url: url.to_string(),
                    author: author.to_string(),
                    publication_date: now - Duration::days(days_old),
                    excerpt: excerpt.to_string(),
                    relevance_score,
                    created_at: now,
                }
            },
        )
        .collect()
}

/// Label shown next to a citation's author.
pub fn source_label(source_type: SourceType) -> &'static str {
    match source_type {
        SourceType::Academic => "Academic Research",
        SourceType::News => "Industry News",
        SourceType::Blog => "Expert Blog",
    }
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn word_count_and_reading_time_follow_depth() {
        let now = Utc::now();
        let got: Vec<(u32, u32)> = ReportDepth::ALL
            .iter()
            .map(|d| {
                let r = build_result("result_1", "query_1", "q", *d, now);
                (r.word_count, r.reading_time)
            })
            .collect();
        assert_eq!(got, vec![(500, 3), (1500, 8), (3000, 15)]);
    }

    #[test]
    fn reading_time_rounds_up() {
        assert_eq!(reading_time(0), 0);
        assert_eq!(reading_time(1), 1);
        assert_eq!(reading_time(200), 1);
        assert_eq!(reading_time(201), 2);
    }

    #[test]
    fn estimate_matches_table() {
        assert_eq!(estimate_seconds(ReportDepth::Brief, 0), 30);
        assert_eq!(estimate_seconds(ReportDepth::Detailed, 2), 80);
        assert_eq!(estimate_seconds(ReportDepth::Comprehensive, 3), 150);
    }

    #[test]
    fn estimate_never_decreases_with_more_files() {
        for depth in ReportDepth::ALL {
            let values: Vec<u32> = (0..50).map(|n| estimate_seconds(depth, n)).collect();
            assert!(values.windows(2).all(|w| w[0] <= w[1]), "{depth}: {values:?}");
        }
        assert_eq!(estimate_seconds(ReportDepth::Brief, usize::MAX), u32::MAX);
    }

    #[test]
    fn estimate_formats_as_minutes_and_seconds() {
        assert_eq!(format_estimate(80), "1m 20s");
        assert_eq!(format_estimate(30), "0m 30s");
        assert_eq!(format_estimate(120), "2m 0s");
    }

    #[test]
    fn result_interpolates_the_question_verbatim() {
        let question = "How do <b>tariffs</b> affect \"chip\" supply?";
        let r = build_result("result_1", "query_1", question, ReportDepth::Brief, Utc::now());
        assert_eq!(r.title, format!("Research Report: {question}"));
        assert!(r.summary.contains(question));
        assert!(r.detailed_analysis.contains(question));
        assert_eq!(r.key_findings.len(), 5);
        assert_eq!(r.recommendations.len(), 5);
        assert_eq!(r.query_id, "query_1");
        assert_eq!(r.created_at, r.updated_at);
    }

    #[test]
    fn three_citations_one_per_source_type() {
        let now = Utc::now();
        let citations = build_citations("result_9", now);
        let types: Vec<SourceType> = citations.iter().map(|c| c.source_type).collect();
        assert_eq!(
            types,
            vec![SourceType::Academic, SourceType::News, SourceType::Blog]
        );
        assert!(citations.iter().all(|c| c.result_id == "result_9"));
        assert!(citations.iter().all(|c| c.relevance_score <= 100));
        assert_eq!(citations[0].publication_date, now - Duration::days(30));
        assert!(citations[2].id.ends_with("_3"));

        let mut ids: Vec<&str> = citations.iter().map(|c| c.id.as_str()).collect();
        ids.dedup();
        assert_eq!(ids.len(), 3);
    }
}
