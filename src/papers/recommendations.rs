//! Static corpus of expert sleep recommendations.
//!
//! Four read-only sources: Bryan Johnson's Blueprint protocol, the Huberman
//! Lab, EightSleep, and the CDC clinical guidelines. Every retrieval
//! annotates the entry with its source name so callers can attribute it.

use serde::{Deserialize, Serialize};

/// How strongly a source pushes a recommendation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recommendation, annotated with its source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub id: String,
    pub title: String,
    pub content: String,
    pub category: String,
    pub priority: Priority,
    /// Source key, e.g. `"cdc"`.
    pub source: String,
    /// Human-readable source name, e.g. `"CDC - Sleep Guidelines"`.
    pub source_name: String,
}

struct SourceGuide {
    key: &'static str,
    name: &'static str,
    entries: Vec<Entry>,
}

struct Entry {
    id: &'static str,
    title: &'static str,
    content: &'static str,
    category: &'static str,
    priority: Priority,
}

/// The in-process recommendation corpus.
pub struct RecommendationLibrary {
    sources: Vec<SourceGuide>,
}

impl RecommendationLibrary {
    pub fn new() -> Self {
        Self {
            sources: build_corpus(),
        }
    }

    /// Keyword search over titles, contents, and categories.
    pub fn search(&self, query: &str, max_results: usize) -> Vec<Recommendation> {
        let needle = query.to_lowercase();
        let mut results = Vec::new();

        for source in &self.sources {
            for entry in &source.entries {
                if entry.title.to_lowercase().contains(&needle)
                    || entry.content.to_lowercase().contains(&needle)
                    || entry.category.to_lowercase().contains(&needle)
                {
                    results.push(annotate(source, entry));
                    if results.len() >= max_results {
                        return results;
                    }
                }
            }
        }

        results
    }

    /// All recommendations in a category, optionally restricted to a source.
    pub fn by_category(&self, category: &str, source: Option<&str>) -> Vec<Recommendation> {
        self.sources
            .iter()
            .filter(|s| source.is_none_or(|key| s.key == key))
            .flat_map(|s| {
                s.entries
                    .iter()
                    .filter(|e| e.category == category)
                    .map(move |e| annotate(s, e))
            })
            .collect()
    }

    /// Every recommendation, optionally restricted to a source.
    pub fn all(&self, source: Option<&str>) -> Vec<Recommendation> {
        self.sources
            .iter()
            .filter(|s| source.is_none_or(|key| s.key == key))
            .flat_map(|s| s.entries.iter().map(move |e| annotate(s, e)))
            .collect()
    }

    /// A single recommendation by id, if it exists.
    pub fn by_id(&self, id: &str) -> Option<Recommendation> {
        self.sources.iter().find_map(|s| {
            s.entries
                .iter()
                .find(|e| e.id == id)
                .map(|e| annotate(s, e))
        })
    }

    /// The categories recommendations are tagged with.
    pub fn categories(&self) -> Vec<&'static str> {
        vec![
            "sleep_schedule",
            "sleep_environment",
            "sleep_hygiene",
            "sleep_monitoring",
            "circadian_rhythm",
            "sleep_physiology",
            "exercise",
            "sleep_stages",
            "sleep_duration",
            "diet",
        ]
    }
}

impl Default for RecommendationLibrary {
    fn default() -> Self {
        Self::new()
    }
}

fn annotate(source: &SourceGuide, entry: &Entry) -> Recommendation {
    Recommendation {
        id: entry.id.to_string(),
        title: entry.title.to_string(),
        content: entry.content.to_string(),
        category: entry.category.to_string(),
        priority: entry.priority,
        source: source.key.to_string(),
        source_name: source.name.to_string(),
    }
}

fn build_corpus() -> Vec<SourceGuide> {
    vec![
        SourceGuide {
            key: "bryan_johnson",
            name: "Bryan Johnson - Blueprint Protocol",
            entries: vec![
                Entry {
                    id: "bj_001",
                    title: "Sleep Schedule Optimization",
                    content: "Maintain a consistent sleep schedule with 8-9 hours of sleep per night. Go to bed between 9-10 PM and wake up between 5-6 AM to align with natural circadian rhythms.",
                    category: "sleep_schedule",
                    priority: Priority::High,
                },
                Entry {
                    id: "bj_002",
                    title: "Sleep Environment",
                    content: "Keep bedroom temperature between 65-67°F (18-19°C), use blackout curtains, and eliminate all light sources. Consider using a sleep mask and earplugs for optimal conditions.",
                    category: "sleep_environment",
                    priority: Priority::High,
                },
                Entry {
                    id: "bj_003",
                    title: "Pre-Sleep Routine",
                    content: "Avoid screens 2-3 hours before bed, engage in relaxing activities like reading or meditation, and avoid caffeine after 2 PM.",
                    category: "sleep_hygiene",
                    priority: Priority::Medium,
                },
                Entry {
                    id: "bj_004",
                    title: "Sleep Tracking",
                    content: "Use sleep tracking devices to monitor sleep quality, duration, and patterns. Aim for consistent deep sleep and REM cycles.",
                    category: "sleep_monitoring",
                    priority: Priority::Medium,
                },
            ],
        },
        SourceGuide {
            key: "andrew_huberman",
            name: "Andrew Huberman - Huberman Lab",
            entries: vec![
                Entry {
                    id: "ah_001",
                    title: "Morning Light Exposure",
                    content: "Get 10-30 minutes of bright light exposure within 30-60 minutes of waking up. This helps set your circadian rhythm and improves sleep quality later.",
                    category: "circadian_rhythm",
                    priority: Priority::High,
                },
                Entry {
                    id: "ah_002",
                    title: "Evening Light Management",
                    content: "Avoid bright light exposure 2-3 hours before bed. Use dim, warm lighting and consider blue light blocking glasses if using screens.",
                    category: "circadian_rhythm",
                    priority: Priority::High,
                },
                Entry {
                    id: "ah_003",
                    title: "Temperature Regulation",
                    content: "Your body temperature naturally drops 2-3 degrees before sleep. Take a hot bath or shower 1-2 hours before bed to facilitate this drop.",
                    category: "sleep_physiology",
                    priority: Priority::Medium,
                },
                Entry {
                    id: "ah_004",
                    title: "Caffeine Timing",
                    content: "Avoid caffeine 8-10 hours before bed. Caffeine has a half-life of 5-6 hours, so it can significantly impact sleep quality.",
                    category: "sleep_hygiene",
                    priority: Priority::High,
                },
                Entry {
                    id: "ah_005",
                    title: "Exercise Timing",
                    content: "Exercise in the morning or early afternoon. Avoid intense exercise within 3-4 hours of bedtime as it can raise body temperature and delay sleep.",
                    category: "exercise",
                    priority: Priority::Medium,
                },
            ],
        },
        SourceGuide {
            key: "eightsleep",
            name: "EightSleep - Sleep Optimization",
            entries: vec![
                Entry {
                    id: "es_001",
                    title: "Temperature Control",
                    content: "Use temperature regulation technology to maintain optimal sleep temperature. Cool your body to 65-67°F during sleep for better quality rest.",
                    category: "sleep_environment",
                    priority: Priority::High,
                },
                Entry {
                    id: "es_002",
                    title: "Sleep Stages Optimization",
                    content: "Focus on getting adequate deep sleep (20-25% of total sleep) and REM sleep (20-25% of total sleep). These stages are crucial for recovery and cognitive function.",
                    category: "sleep_stages",
                    priority: Priority::High,
                },
                Entry {
                    id: "es_003",
                    title: "Heart Rate Variability",
                    content: "Monitor heart rate variability (HRV) as it's a key indicator of recovery and sleep quality. Higher HRV generally indicates better sleep and recovery.",
                    category: "sleep_monitoring",
                    priority: Priority::Medium,
                },
                Entry {
                    id: "es_004",
                    title: "Sleep Consistency",
                    content: "Maintain consistent sleep and wake times, even on weekends. This helps regulate your circadian rhythm and improves overall sleep quality.",
                    category: "sleep_schedule",
                    priority: Priority::High,
                },
            ],
        },
        SourceGuide {
            key: "cdc",
            name: "CDC - Sleep Guidelines",
            entries: vec![
                Entry {
                    id: "cdc_001",
                    title: "Sleep Duration Guidelines",
                    content: "Adults should get 7 or more hours of sleep per night. Teenagers need 8-10 hours, and school-age children need 9-12 hours.",
                    category: "sleep_duration",
                    priority: Priority::High,
                },
                Entry {
                    id: "cdc_002",
                    title: "Sleep Hygiene Practices",
                    content: "Go to bed and wake up at the same time every day, including weekends. Make sure your bedroom is quiet, dark, and at a comfortable temperature.",
                    category: "sleep_hygiene",
                    priority: Priority::High,
                },
                Entry {
                    id: "cdc_003",
                    title: "Electronic Device Management",
                    content: "Remove electronic devices from the bedroom, including TVs, computers, and smartphones. The light from these devices can interfere with sleep.",
                    category: "sleep_environment",
                    priority: Priority::Medium,
                },
                Entry {
                    id: "cdc_004",
                    title: "Physical Activity",
                    content: "Be physically active during the day, which can help you fall asleep more easily at night. However, avoid vigorous exercise close to bedtime.",
                    category: "exercise",
                    priority: Priority::Medium,
                },
                Entry {
                    id: "cdc_005",
                    title: "Diet and Sleep",
                    content: "Avoid large meals, caffeine, and alcohol before bedtime. These can interfere with your ability to fall asleep and stay asleep.",
                    category: "diet",
                    priority: Priority::Medium,
                },
            ],
        },
    ]
}
